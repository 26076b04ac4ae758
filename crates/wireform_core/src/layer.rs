//! The layer stack: per-level parsing context threaded through a pack/unpack/sizeof traversal.
//!
//! [`crate::state::State`] owns a `Vec<LayerFrame>` and hands out [`LayerId`] handles, so the
//! parent chain is just indices into that vec rather than `Rc`/`RefCell` plumbing.

use crate::value::Value;

/// Index into [`crate::state::State::layers`]. Cheap to copy, stays valid for the lifetime of the
/// `State` even after the frame it names has been "invalidated" (its fields just read back as
/// empty).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerId(pub(crate) usize);

/// A reference to the field currently being processed, used for diagnostics and for struct-model
/// bindings that want to know which declared field a layer belongs to.
#[derive(Debug, Clone)]
pub struct FieldRef {
    pub name: String,
}

/// A single stack frame holding the per-level parsing context: the current field, the
/// struct/map being assembled, and sequence-loop bookkeeping.
#[derive(Debug, Clone)]
pub struct LayerFrame {
    pub(crate) parent: Option<LayerId>,
    pub path: String,
    pub field: Option<FieldRef>,
    /// The struct/map currently being read or written at this level, used by `ContextPath`
    /// resolution and by `StructAtom` to expose sibling fields to later fields.
    pub obj: Option<Value>,
    pub value: Option<Value>,
    pub sequence: Option<Vec<Value>>,
    pub index: i64,
    pub length: i64,
    pub greedy: bool,
    pub sequential: bool,
}

impl LayerFrame {
    pub(crate) fn root() -> Self {
        Self {
            parent: None,
            path: "<root>".to_owned(),
            field: None,
            obj: None,
            value: None,
            sequence: None,
            index: 0,
            length: 0,
            greedy: false,
            sequential: false,
        }
    }

    pub(crate) fn child(parent: LayerId, parent_path: &str, segment: &str) -> Self {
        Self {
            parent: Some(parent),
            path: format!("{parent_path}.{segment}"),
            field: None,
            obj: None,
            value: None,
            sequence: None,
            index: 0,
            length: 0,
            greedy: false,
            sequential: false,
        }
    }

    /// Clears this frame's mutable content and unlinks its parent on exit. The path and index are
    /// left intact since they're cheap, immutable, and useful in postmortem diagnostics.
    pub(crate) fn invalidate(&mut self) {
        self.parent = None;
        self.obj = None;
        self.value = None;
        self.sequence = None;
    }
}

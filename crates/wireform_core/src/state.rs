//! Per-call state: the stream, the global context, the offset table and the layer arena.

use std::collections::BTreeMap;

use crate::context::Context;
use crate::endian::Endian;
use crate::error::{with_path, Error, Result};
use crate::layer::{FieldRef, LayerFrame, LayerId};
use crate::stream::{Stream, Whence};
use crate::value::Value;

/// Owns everything that's scoped to one top-level `pack`/`unpack`/`sizeof` call.
pub struct State {
    stream: Option<Box<dyn Stream>>,
    pub globals: Context,
    /// Deferred writes staged by `OffsetAtom`-like consumers, keyed by absolute offset. The
    /// simple save/seek/write/restore path doesn't need this; it exists for host bindings that
    /// want to stage a write instead of performing it immediately.
    pub offset_table: BTreeMap<u64, Vec<u8>>,
    pub default_byteorder: Endian,
    layers: Vec<LayerFrame>,
}

impl State {
    pub fn new(stream: Box<dyn Stream>, globals: Context) -> Self {
        let mut state = Self {
            stream: Some(stream),
            globals,
            offset_table: BTreeMap::new(),
            default_byteorder: Endian::default(),
            layers: Vec::new(),
        };
        state.layers.push(LayerFrame::root());
        state
    }

    /// Builds a state with no backing stream, for `sizeof` calls that never touch I/O.
    pub fn sizeof_only(globals: Context) -> Self {
        let mut state = Self {
            stream: None,
            globals,
            offset_table: BTreeMap::new(),
            default_byteorder: Endian::default(),
            layers: Vec::new(),
        };
        state.layers.push(LayerFrame::root());
        state
    }

    pub fn root(&self) -> LayerId {
        LayerId(0)
    }

    pub fn layer(&self, id: LayerId) -> &LayerFrame {
        &self.layers[id.0]
    }

    pub fn layer_mut(&mut self, id: LayerId) -> &mut LayerFrame {
        &mut self.layers[id.0]
    }

    /// Pushes a new child frame under `parent`, returning its id. Entering a struct field or a
    /// sequence element allocates a child layer this way.
    pub fn push_child(&mut self, parent: LayerId, segment: &str) -> LayerId {
        let parent_path = self.layers[parent.0].path.clone();
        self.layers.push(LayerFrame::child(parent, &parent_path, segment));
        LayerId(self.layers.len() - 1)
    }

    pub fn set_field(&mut self, id: LayerId, name: impl Into<String>) {
        self.layers[id.0].field = Some(FieldRef { name: name.into() });
    }

    /// Invalidates a layer on exit. Handles remain valid afterwards; their fields just read back
    /// as empty.
    pub fn pop_child(&mut self, id: LayerId) {
        self.layers[id.0].invalidate();
    }

    pub fn path_of(&self, id: LayerId) -> &str {
        &self.layers[id.0].path
    }

    /// Resolves a dotted `ContextPath` against `layer`: its own `obj`, then each ancestor's `obj`
    /// up the parent chain, then `state.globals`. A leading `"<root>"` segment jumps straight to
    /// the root layer's `obj` first.
    pub fn resolve_path(&self, layer: LayerId, segments: &[String]) -> Result<Value> {
        if segments.is_empty() {
            return Err(Error::ContextLookupFailure {
                path: self.path_of(layer).to_owned(),
                name: String::new(),
            });
        }

        if segments[0] == "<root>" {
            return self.resolve_in_obj(self.root(), &segments[1..], layer);
        }

        let mut current = Some(layer);
        while let Some(id) = current {
            if let Some(value) = self.lookup_obj(id, &segments[0]) {
                return self.descend(value, &segments[1..], layer);
            }
            current = self.layers[id.0].parent;
        }

        match self.globals.get(&segments[0]) {
            Some(value) => self.descend(value.clone(), &segments[1..], layer),
            None => Err(Error::ContextLookupFailure {
                path: self.path_of(layer).to_owned(),
                name: segments[0].clone(),
            }),
        }
    }

    fn resolve_in_obj(&self, root: LayerId, segments: &[String], error_layer: LayerId) -> Result<Value> {
        if segments.is_empty() {
            return self.layers[root.0]
                .obj
                .clone()
                .ok_or_else(|| Error::ContextLookupFailure {
                    path: self.path_of(error_layer).to_owned(),
                    name: "<root>".to_owned(),
                });
        }
        match self.lookup_obj(root, &segments[0]) {
            Some(value) => self.descend(value, &segments[1..], error_layer),
            None => Err(Error::ContextLookupFailure {
                path: self.path_of(error_layer).to_owned(),
                name: segments[0].clone(),
            }),
        }
    }

    fn lookup_obj(&self, id: LayerId, name: &str) -> Option<Value> {
        match &self.layers[id.0].obj {
            Some(Value::Map(map)) => map.get(name).cloned(),
            _ => None,
        }
    }

    fn descend(&self, mut value: Value, segments: &[String], error_layer: LayerId) -> Result<Value> {
        for segment in segments {
            value = match &value {
                Value::Map(map) => map.get(segment).cloned().ok_or_else(|| {
                    Error::ContextLookupFailure {
                        path: self.path_of(error_layer).to_owned(),
                        name: segment.clone(),
                    }
                })?,
                _ => {
                    return Err(Error::ContextLookupFailure {
                        path: self.path_of(error_layer).to_owned(),
                        name: segment.clone(),
                    })
                }
            };
        }
        Ok(value)
    }

    fn stream_mut(&mut self, layer: LayerId) -> Result<&mut (dyn Stream + '_)> {
        match self.stream.as_deref_mut() {
            Some(stream) => Ok(stream),
            None => Err(Error::NotImplemented {
                path: self.layers[layer.0].path.clone(),
                capability: "stream",
            }),
        }
    }

    pub fn read_exact(&mut self, layer: LayerId, n: usize) -> Result<Vec<u8>> {
        let path = self.path_of(layer).to_owned();
        let stream = self.stream_mut(layer)?;
        stream
            .read_exact(n)
            .map_err(|e| with_path(Error::from(e), &path))
    }

    pub fn read_all(&mut self, layer: LayerId) -> Result<Vec<u8>> {
        let path = self.path_of(layer).to_owned();
        let stream = self.stream_mut(layer)?;
        stream
            .read_all()
            .map_err(|e| with_path(Error::from(e), &path))
    }

    pub fn write_bytes(&mut self, layer: LayerId, buf: &[u8]) -> Result<usize> {
        let path = self.path_of(layer).to_owned();
        let stream = self.stream_mut(layer)?;
        stream
            .write_bytes(buf)
            .map_err(|e| with_path(Error::from(e), &path))
    }

    pub fn tell(&mut self, layer: LayerId) -> Result<u64> {
        let path = self.path_of(layer).to_owned();
        let stream = self.stream_mut(layer)?;
        stream.tell().map_err(|e| with_path(Error::from(e), &path))
    }

    pub fn seek_to(&mut self, layer: LayerId, offset: i64, whence: Whence) -> Result<u64> {
        let path = self.path_of(layer).to_owned();
        let stream = self.stream_mut(layer)?;
        stream
            .seek_to(offset, whence)
            .map_err(|e| with_path(Error::from(e), &path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::memory_stream;
    use std::collections::BTreeMap;

    #[test]
    fn child_path_follows_dot_invariant() {
        let mut state = State::new(Box::new(memory_stream()), Context::new());
        let root = state.root();
        let a = state.push_child(root, "a");
        let b = state.push_child(a, "0");
        assert_eq!(state.path_of(root), "<root>");
        assert_eq!(state.path_of(a), "<root>.a");
        assert_eq!(state.path_of(b), "<root>.a.0");
    }

    #[test]
    fn resolves_sibling_field_via_parent_obj() {
        let mut state = State::new(Box::new(memory_stream()), Context::new());
        let root = state.root();
        let mut fields = BTreeMap::new();
        fields.insert("kind".to_owned(), Value::Int(7));
        state.layer_mut(root).obj = Some(Value::Map(fields));

        let child = state.push_child(root, "payload");
        let resolved = state
            .resolve_path(child, &["kind".to_owned()])
            .unwrap();
        assert_eq!(resolved, Value::Int(7));
    }

    #[test]
    fn invalidated_layer_loses_obj_but_keeps_path() {
        let mut state = State::new(Box::new(memory_stream()), Context::new());
        let root = state.root();
        let child = state.push_child(root, "x");
        state.layer_mut(child).obj = Some(Value::Int(1));
        state.pop_child(child);
        assert!(state.layer(child).obj.is_none());
        assert_eq!(state.path_of(child), "<root>.x");
    }
}

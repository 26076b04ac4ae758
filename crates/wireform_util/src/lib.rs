//! Small helpers shared across the wireform workspace.
//!
//! Nothing in here knows about atoms, layers or the wireform error taxonomy; it's the same kind
//! of grab-bag a leaf utility crate ends up being in any workspace.

mod ascii_display;
pub use ascii_display::AsciiDisplay;

mod seekable_span;
pub use seekable_span::{SeekableSpan, SeekableSpanExt};

/// Shorthand for `Ok(())`, cause it looks ugly otherwise.
pub const fn ok<E>() -> Result<(), E> {
    Ok(())
}

//! The error taxonomy atoms and drivers report through.
//!
//! Every variant carries the dotted `path` of the layer active when the failure happened (see
//! [`crate::layer`]), so a caller doesn't have to reconstruct "where did this go wrong" by hand.

use std::io;

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An input value's type is incompatible with the atom packing it.
    #[error("{path}: type mismatch, expected {expected}, got {value}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        value: String,
    },

    /// A packed value's length didn't match the declared/evaluated length.
    #[error("{path}: length mismatch, expected {expected}, got {actual}")]
    LengthMismatch {
        path: String,
        expected: i64,
        actual: i64,
    },

    /// A const/padding/enum constraint was violated.
    #[error("{path}: invalid value: {message}")]
    InvalidValue { path: String, message: String },

    /// `sizeof` was requested on an atom whose size depends on runtime data.
    #[error("{path}: size is dynamic and can't be computed statically")]
    DynamicSize { path: String },

    /// A stream read/write/seek/tell failed.
    #[error("{path}: io failure: {source}")]
    Io { path: String, source: io::Error },

    /// A context path or attribute resolution failed.
    #[error("{path}: failed to resolve `{name}`")]
    ContextLookupFailure { path: String, name: String },

    /// An atom was asked for a capability it doesn't provide.
    #[error("{path}: atom doesn't implement `{capability}`")]
    NotImplemented {
        path: String,
        capability: &'static str,
    },
}

impl Error {
    pub fn path(&self) -> &str {
        match self {
            Error::TypeMismatch { path, .. }
            | Error::LengthMismatch { path, .. }
            | Error::InvalidValue { path, .. }
            | Error::DynamicSize { path }
            | Error::Io { path, .. }
            | Error::ContextLookupFailure { path, .. }
            | Error::NotImplemented { path, .. } => path,
        }
    }

    /// True for failures that look like "the stream ran out of data", which is the only kind of
    /// error a greedy `Repeated`/`CString` unpack loop is allowed to swallow. Any other error
    /// (a type mismatch, a genuine I/O fault) still propagates instead of ending the loop quietly.
    pub fn is_eof_like(&self) -> bool {
        matches!(self, Error::Io { source, .. } if source.kind() == io::ErrorKind::UnexpectedEof)
    }
}

impl From<io::Error> for Error {
    fn from(source: io::Error) -> Self {
        Error::Io {
            path: String::new(),
            source,
        }
    }
}

/// Rewrites the `path` field of an [`Error`] that was built without layer context (e.g. via `?`
/// from a raw [`io::Error`]) to the path of the layer that was active when it surfaced.
pub fn with_path(mut err: Error, path: &str) -> Error {
    if err.path().is_empty() {
        match &mut err {
            Error::TypeMismatch { path: p, .. }
            | Error::LengthMismatch { path: p, .. }
            | Error::InvalidValue { path: p, .. }
            | Error::DynamicSize { path: p }
            | Error::Io { path: p, .. }
            | Error::ContextLookupFailure { path: p, .. }
            | Error::NotImplemented { path: p, .. } => *p = path.to_owned(),
        }
    }
    err
}

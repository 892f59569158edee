use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// Snapshots must be JSON objects (or null, read as an empty snapshot).
    #[error("invalid state: expected an object, found {kind}")]
    InvalidState { kind: &'static str },

    #[error("invalid proof-of-work prefix {prefix:?}: must be at most 64 lowercase hex digits")]
    InvalidPrefix { prefix: String },
}

pub type Result<T> = std::result::Result<T, ChainError>;

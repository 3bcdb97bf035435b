use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid content id: {0}")]
    InvalidContentId(String),

    #[error("invalid entity tag: {0}")]
    InvalidEntityTag(String),
}

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("invalid {header} header: {reason}")]
    InvalidHeader { header: &'static str, reason: String },

    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;

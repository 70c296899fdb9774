use thiserror::Error;

/// Errors produced by type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid owner id: {0:?}")]
    InvalidOwner(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

use bookshelf_store::StoreError;
use bookshelf_types::TypeError;

/// How a failure should be reported to the outside world.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller sent missing or malformed input.
    InvalidArgument,
    /// Storage or messaging failed.
    Internal,
}

/// Errors raised by actor operations.
#[derive(Debug, thiserror::Error)]
pub enum ActorError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("{0} mailbox closed")]
    MailboxClosed(&'static str),

    #[error("{0} dropped the reply")]
    ReplyDropped(&'static str),

    #[error("registry lock poisoned")]
    LockPoisoned,
}

impl ActorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            _ => ErrorKind::Internal,
        }
    }
}

impl From<TypeError> for ActorError {
    fn from(e: TypeError) -> Self {
        Self::InvalidArgument(e.to_string())
    }
}

pub type ActorResult<T> = Result<T, ActorError>;

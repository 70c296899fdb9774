use thiserror::Error;

/// Errors raised while configuring or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("actor error: {0}")]
    Actor(#[from] bookshelf_actors::ActorError),

    #[error("store error: {0}")]
    Store(#[from] bookshelf_store::StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

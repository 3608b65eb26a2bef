use thiserror::Error;

pub type ChatResult<T> = Result<T, ChatError>;

/// What the engine can tell a caller about a refused operation. Store-level
/// failures stay opaque and bubble up through the `Store` variant.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("room name is empty")]
    InvalidName,
    #[error("no room named '{0}'")]
    RoomNotFound(String),
    #[error("only the room's creator can do that")]
    Forbidden,
    #[error("message text is empty")]
    EmptyMessage,
    #[error("corrupt id in store: {0}")]
    CorruptId(#[from] uuid::Error),
    #[error(transparent)]
    Store(#[from] sqlx::Error),
}

//! Error taxonomy shared by the repository, router, bridge and runtime.

use crate::runtime::RuntimeState;

/// Failure of the durable content store.
#[derive(Debug, thiserror::Error)]
#[error("storage error: {0}")]
pub struct StorageError(#[from] pub sqlx::Error);

#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Bad webhook payload, empty keyword, unparsable id.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Update from a chat outside the allow-list. Never surfaced to users.
    #[error("chat {chat_id} is not authorized")]
    Unauthorized { chat_id: i64 },

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Webhook registration failed; the process must not accept traffic.
    #[error("webhook registration failed: {0}")]
    Registration(String),

    #[error("runtime is not accepting updates (state: {0})")]
    NotRunning(RuntimeState),

    #[error("update queue is full")]
    QueueFull,
}

impl From<sqlx::Error> for BotError {
    fn from(err: sqlx::Error) -> Self {
        BotError::Storage(StorageError(err))
    }
}

pub type BotResult<T> = Result<T, BotError>;

//! Error types shared by every layer of the bot.

use crate::lifecycle::LifecycleState;
use thiserror::Error;

pub type Result<T, E = BotError> = std::result::Result<T, E>;

/// Failures surfaced by the storage collaborator.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage handle used before init")]
    NotConnected,
    #[error("storage connect timed out after {0}s")]
    Timeout(u64),
    #[error("invalid collection name `{0}`")]
    InvalidCollection(String),
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
    #[error("profile document is malformed: {0}")]
    Document(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum BotError {
    /// Required configuration is missing or unusable. Raised before any network I/O.
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("invalid lifecycle transition {from:?} -> {to:?}")]
    Lifecycle {
        from: LifecycleState,
        to: LifecycleState,
    },
    #[error("dependency `{0}` is not registered")]
    MissingDependency(&'static str),
    #[error("`{0}` is registered twice")]
    DuplicateRegistration(String),
    #[error("command client was already created")]
    ClientExists,
    #[error("command modules must be loaded before the command client opens")]
    ClientOpen,
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Gateway(#[from] serenity::Error),
    #[error("gateway task failed: {0}")]
    GatewayTask(#[from] tokio::task::JoinError),
}

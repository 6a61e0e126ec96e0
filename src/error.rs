//! Error types for the mailflow router.

use std::path::PathBuf;

use crate::queue::QueueType;

/// Top-level error type for the daemon.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Message error: {0}")]
    Message(#[from] MessageError),

    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Watch error: {0}")]
    Watch(#[from] WatchError),
}

/// Configuration-related errors.
///
/// Only file-level problems surface as errors; a malformed individual
/// entry is skipped during load and reported, never fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Unknown queue type name: {0}")]
    UnknownQueueType(String),

    #[error("Configuration defines no input queues")]
    NoInputQueues,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Message container parsing errors.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Message container {} could not be parsed", .0.display())]
    Unparseable(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Lock marker errors.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("A lock {} already exists for {}", .lock.display(), .file.display())]
    Duplicate { file: PathBuf, lock: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Routing failures.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("No routing rule found for {} in the {} queue", .file.display(), .queue)]
    RuleNotFound { file: PathBuf, queue: QueueType },

    #[error("Message error: {0}")]
    Message(#[from] MessageError),
}

/// Output dispatch failures.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("No output queue is configured for the {0} queue type")]
    UndefinedOutputQueue(QueueType),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Directory watcher failures.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Failed to register watch on {}: {}", .path.display(), .source)]
    Register {
        path: PathBuf,
        source: notify::Error,
    },
}

/// Result type alias for the daemon.
pub type Result<T> = std::result::Result<T, Error>;

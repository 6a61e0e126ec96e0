//! Spool supervision: lock markers, tasks, directory watching and the
//! per-queue supervisor loop.

pub mod lock;
pub mod supervisor;
pub mod task;
pub mod watcher;

pub use lock::LockHandle;
pub use supervisor::QueueSupervisor;
pub use task::{Task, TaskQueue};
pub use watcher::DirectoryWatcher;

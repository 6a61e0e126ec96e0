//! Routing tasks and the per-queue priority task queue.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use crate::error::LockError;
use crate::queue::QueueType;
use crate::spool::lock::{self, LockHandle};

/// One message file awaiting or undergoing routing.
///
/// A task exists exactly while its lock marker is held; constructing one
/// requires the acquired [`LockHandle`], and the handle is surrendered for
/// release when processing finishes.
#[derive(Debug)]
pub struct Task {
    lock: LockHandle,
    input: QueueType,
    /// Priority key: the source file's last-modified time. Older files
    /// drain first, approximating arrival order.
    modified: DateTime<Utc>,
    output: Option<QueueType>,
    routed: bool,
}

impl Task {
    /// Build a task for a freshly locked message file.
    pub fn new(lock: LockHandle, input: QueueType, modified: SystemTime) -> Self {
        Self {
            lock,
            input,
            modified: DateTime::<Utc>::from(modified),
            output: None,
            routed: false,
        }
    }

    /// Stat a message file and atomically claim it.
    ///
    /// The stat runs before the lock is created, so a vanished file never
    /// leaves a marker behind; a duplicate marker surfaces as
    /// [`LockError::Duplicate`].
    pub fn claim(source: &Path, input: QueueType) -> Result<Self, LockError> {
        let modified = std::fs::metadata(source)?.modified()?;
        let handle = lock::acquire(source)?;
        Ok(Self::new(handle, input, modified))
    }

    pub fn source(&self) -> &Path {
        self.lock.source()
    }

    pub fn input(&self) -> QueueType {
        self.input
    }

    pub fn modified(&self) -> DateTime<Utc> {
        self.modified
    }

    /// Output queue assigned by routing, once routed.
    pub fn output(&self) -> Option<QueueType> {
        self.output
    }

    pub fn is_routed(&self) -> bool {
        self.routed
    }

    /// Record the routing decision.
    pub fn mark_routed(&mut self, output: QueueType) {
        self.output = Some(output);
        self.routed = true;
    }

    /// Surrender the lock handle for release.
    pub fn into_lock(self) -> LockHandle {
        self.lock
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Task {}

impl PartialOrd for Task {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Task {
    /// Ascending by modification time; colliding timestamps are ordered
    /// deterministically by source path.
    fn cmp(&self, other: &Self) -> Ordering {
        self.modified
            .cmp(&other.modified)
            .then_with(|| self.lock.source().cmp(other.lock.source()))
    }
}

/// Unbounded priority queue handing tasks from the watcher and the backlog
/// scan to the queue's single consumer.
#[derive(Default)]
pub struct TaskQueue {
    heap: Mutex<BinaryHeap<Reverse<Task>>>,
    notify: Notify,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a task; never blocks.
    pub fn push(&self, task: Task) {
        self.heap
            .lock()
            .expect("task queue lock poisoned")
            .push(Reverse(task));
        self.notify.notify_one();
    }

    /// Remove and return the lowest-priority-key task, suspending until
    /// one is available.
    pub async fn pop(&self) -> Task {
        loop {
            if let Some(Reverse(task)) = self
                .heap
                .lock()
                .expect("task queue lock poisoned")
                .pop()
            {
                return task;
            }
            self.notify.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.heap.lock().expect("task queue lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

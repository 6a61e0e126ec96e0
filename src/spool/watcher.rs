//! Per-queue directory watcher.
//!
//! One watcher per input queue, registered non-recursively for creation
//! events at construction. Events cross from the notify callback thread
//! into the async event loop over an mpsc channel. Missed events are
//! tolerated: anything a running watcher drops is picked up by the next
//! startup's backlog reconciliation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::error::{LockError, WatchError};
use crate::message;
use crate::queue::QueueType;
use crate::spool::task::{Task, TaskQueue};

/// Converts filesystem creation events in one input queue directory into
/// locked routing tasks.
pub struct DirectoryWatcher {
    queue_type: QueueType,
    dir: PathBuf,
    tasks: Arc<TaskQueue>,
    events: mpsc::Receiver<notify::Result<Event>>,
    /// Held to keep the watch registration alive.
    _watcher: RecommendedWatcher,
}

impl DirectoryWatcher {
    /// Register a watch on the queue directory. The single registration
    /// lives as long as the returned watcher.
    pub fn register(
        queue_type: QueueType,
        dir: &Path,
        tasks: Arc<TaskQueue>,
    ) -> Result<Self, WatchError> {
        let (tx, events) = mpsc::channel(256);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.blocking_send(res);
        })
        .map_err(|source| WatchError::Register {
            path: dir.to_path_buf(),
            source,
        })?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Register {
                path: dir.to_path_buf(),
                source,
            })?;

        info!(queue = %queue_type, dir = %dir.display(), "watching input queue directory");

        Ok(Self {
            queue_type,
            dir: dir.to_path_buf(),
            tasks,
            events,
            _watcher: watcher,
        })
    }

    /// Run the event loop until shutdown or until the watch fails.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(Ok(event)) => self.handle_event(&event),
                    Some(Err(e)) => {
                        // The backend reported a watch failure; live
                        // monitoring for this queue ends here, backlog
                        // reconciliation covers the gap after a restart.
                        error!(
                            queue = %self.queue_type,
                            dir = %self.dir.display(),
                            error = %e,
                            "directory watch failed"
                        );
                        break;
                    }
                    None => {
                        error!(
                            queue = %self.queue_type,
                            dir = %self.dir.display(),
                            "directory watch event channel closed"
                        );
                        break;
                    }
                },
                _ = shutdown.changed() => {
                    info!(queue = %self.queue_type, "stopping directory watcher");
                    break;
                }
            }
        }
    }

    fn handle_event(&self, event: &Event) {
        // A rescan notification carries no file information of its own;
        // later events for genuinely new files still arrive.
        if event.need_rescan() {
            return;
        }
        // A file renamed into the directory arrives as a rename event,
        // not a create; both mean a new entry may have appeared. The
        // from-side path of a rename fails the is-file check below.
        let arrived = matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(_))
        );
        if !arrived {
            return;
        }
        for path in &event.paths {
            self.observe_created(path);
        }
    }

    /// Claim a newly created entry when it is a regular message container.
    fn observe_created(&self, path: &Path) {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return;
        };
        if !message::is_container_name(name) || !path.is_file() {
            return;
        }

        match Task::claim(path, self.queue_type) {
            Ok(task) => {
                info!(
                    file = %task.source().display(),
                    queue = %self.queue_type,
                    "new message added to the process queue"
                );
                self.tasks.push(task);
            }
            Err(LockError::Duplicate { file, .. }) => {
                // Another path (usually the backlog scan) already claimed it.
                warn!(
                    file = %file.display(),
                    queue = %self.queue_type,
                    "message is already locked, skipping"
                );
            }
            Err(e) => {
                error!(
                    file = %path.display(),
                    queue = %self.queue_type,
                    error = %e,
                    "failed to claim new message"
                );
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn dir(&self) -> &Path {
        &self.dir
    }
}

//! Per-queue supervision: bootstrap, reconciliation, watching, draining.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::{LockError, RoutingError};
use crate::message;
use crate::queue::InputQueueSpec;
use crate::routing::{OutputDispatcher, RoutingEngine};
use crate::spool::lock::{self, LOCK_SUFFIX};
use crate::spool::task::{Task, TaskQueue};
use crate::spool::watcher::DirectoryWatcher;

/// Supervises one active input queue for the process lifetime.
///
/// On startup the supervisor ensures the queue directory exists,
/// reconciles leftovers of an unclean shutdown, starts the directory
/// watcher, and then drains the task queue as its single consumer. A
/// failing task never stops the loop; only the shutdown signal does.
pub struct QueueSupervisor {
    spec: InputQueueSpec,
    tasks: Arc<TaskQueue>,
    engine: Arc<RoutingEngine>,
    dispatcher: Arc<OutputDispatcher>,
}

impl QueueSupervisor {
    pub fn new(
        spec: InputQueueSpec,
        engine: Arc<RoutingEngine>,
        dispatcher: Arc<OutputDispatcher>,
    ) -> Self {
        Self {
            spec,
            tasks: Arc::new(TaskQueue::new()),
            engine,
            dispatcher,
        }
    }

    /// Run the supervisor until the shutdown signal fires.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let queue = self.spec.queue_type;
        info!(queue = %queue, "starting input queue monitoring");

        let created = match self.ensure_directory().await {
            Ok(created) => created,
            Err(e) => {
                error!(
                    queue = %queue,
                    dir = %self.spec.dir.display(),
                    error = %e,
                    "could not create input queue directory"
                );
                return;
            }
        };

        // A freshly created directory cannot hold stale locks or backlog.
        if !created {
            self.reconcile().await;
        }

        let watcher_task = match DirectoryWatcher::register(queue, &self.spec.dir, self.tasks.clone())
        {
            Ok(watcher) => Some(tokio::spawn(watcher.run(shutdown.clone()))),
            Err(e) => {
                // Already-queued backlog still drains; live monitoring for
                // this queue resumes only on restart.
                error!(queue = %queue, error = %e, "failed to start directory watcher");
                None
            }
        };

        loop {
            tokio::select! {
                task = self.tasks.pop() => self.process(task).await,
                _ = shutdown.changed() => {
                    info!(queue = %queue, "stopping input queue processing");
                    break;
                }
            }
        }

        if let Some(handle) = watcher_task {
            let _ = handle.await;
        }
    }

    /// Ensure the queue directory exists. Returns whether it was created.
    async fn ensure_directory(&self) -> std::io::Result<bool> {
        if self.spec.dir.is_dir() {
            info!(
                queue = %self.spec.queue_type,
                dir = %self.spec.dir.display(),
                "input queue directory already exists"
            );
            return Ok(false);
        }
        tokio::fs::create_dir_all(&self.spec.dir).await?;
        info!(
            queue = %self.spec.queue_type,
            dir = %self.spec.dir.display(),
            "created input queue directory"
        );
        Ok(true)
    }

    /// Recover from a prior unclean shutdown: clear every stale lock
    /// marker, then re-claim and enqueue the backlog of container files.
    async fn reconcile(&self) {
        self.clear_stale_locks().await;
        self.enqueue_backlog().await;
    }

    async fn clear_stale_locks(&self) {
        for name in self.directory_entries(|name| name.ends_with(LOCK_SUFFIX)).await {
            let path = self.spec.dir.join(&name);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!(lock = %path.display(), "stale lock removed"),
                Err(e) => warn!(lock = %path.display(), error = %e, "stale lock could not be removed"),
            }
        }
    }

    async fn enqueue_backlog(&self) {
        let queue = self.spec.queue_type;
        let mut names = self.directory_entries(message::is_container_name).await;
        names.sort();

        match names.len() {
            0 => {
                info!(queue = %queue, "no pending messages");
                return;
            }
            1 => info!(queue = %queue, "1 pending message will be added to the process queue"),
            n => info!(queue = %queue, "{n} pending messages will be added to the process queue"),
        }

        for name in names {
            let path = self.spec.dir.join(&name);
            match Task::claim(&path, queue) {
                Ok(task) => {
                    info!(
                        file = %task.source().display(),
                        queue = %queue,
                        "pending message added to the process queue"
                    );
                    self.tasks.push(task);
                }
                Err(LockError::Duplicate { file, .. }) => {
                    // Impossible right after clearing, kept as a guard
                    // against a racing watcher event.
                    warn!(
                        file = %file.display(),
                        queue = %queue,
                        "pending message is already locked, skipping"
                    );
                }
                Err(e) => {
                    error!(
                        file = %path.display(),
                        queue = %queue,
                        error = %e,
                        "failed to claim pending message"
                    );
                }
            }
        }
    }

    /// Regular-file names in the queue directory passing `filter`.
    async fn directory_entries(&self, filter: impl Fn(&str) -> bool) -> Vec<String> {
        let mut names = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.spec.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    dir = %self.spec.dir.display(),
                    error = %e,
                    "failed to read input queue directory"
                );
                return names;
            }
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if !is_file {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string()
                && filter(&name)
            {
                names.push(name);
            }
        }
        names
    }

    /// Route and deliver one task, always releasing its lock afterwards.
    async fn process(&self, mut task: Task) {
        match self.engine.route(task.source(), task.input()).await {
            Ok(output) => {
                task.mark_routed(output);
                match self.dispatcher.deliver(task.source(), output).await {
                    Ok(destination) => {
                        info!(
                            file = %destination.display(),
                            queue = %output,
                            "message sent to output queue"
                        );
                    }
                    Err(e) => {
                        // The message stays in the input directory until a
                        // restart re-attempts it.
                        warn!(
                            file = %task.source().display(),
                            queue = %task.input(),
                            error = %e,
                            "message could not be delivered"
                        );
                    }
                }
            }
            Err(RoutingError::RuleNotFound { file, queue }) => {
                warn!(
                    file = %file.display(),
                    queue = %queue,
                    "no routing rule matches, message left in place"
                );
            }
            Err(RoutingError::Message(e)) => {
                warn!(
                    file = %task.source().display(),
                    queue = %task.input(),
                    error = %e,
                    "message could not be read, task abandoned"
                );
            }
        }

        lock::release(task.into_lock());
    }

    #[cfg(test)]
    pub(crate) fn tasks(&self) -> &Arc<TaskQueue> {
        &self.tasks
    }

    #[cfg(test)]
    pub(crate) async fn reconcile_for_test(&self) {
        self.reconcile().await;
    }

    #[cfg(test)]
    pub(crate) async fn process_for_test(&self, task: Task) {
        self.process(task).await;
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use super::*;
    use crate::queue::{OutputQueueSpec, OutputQueues, QueueType};
    use crate::routing::{Rule, RuleTable};

    /// Drop a message in atomically (tmp write + rename), the way real
    /// producers hand files to a spool directory.
    fn write_message(dir: &Path, name: &str) {
        let tmp = dir.join(format!("{name}.tmp"));
        std::fs::write(&tmp, "From: a@x.com\r\nTo: b@y.com\r\nSubject: t\r\n\r\nbody\r\n")
            .unwrap();
        std::fs::rename(tmp, dir.join(name)).unwrap();
    }

    fn supervisor(input_dir: &Path, output_dir: &Path) -> QueueSupervisor {
        let rules = Arc::new(RuleTable::new(vec![Rule {
            set: 0,
            order: 1,
            from: None,
            to: None,
            input: QueueType::Csi,
            output: QueueType::Cso,
        }]));
        let outputs = Arc::new(OutputQueues::new(vec![OutputQueueSpec {
            queue_type: QueueType::Cso,
            dir: output_dir.to_path_buf(),
        }]));
        QueueSupervisor::new(
            InputQueueSpec {
                queue_type: QueueType::Csi,
                dir: input_dir.to_path_buf(),
                active: true,
            },
            Arc::new(RoutingEngine::new(rules, outputs.clone())),
            Arc::new(OutputDispatcher::new(outputs)),
        )
    }

    #[tokio::test]
    async fn reconciliation_clears_stale_locks_and_enqueues_backlog() {
        let root = tempfile::tempdir().unwrap();
        let input = root.path().join("csi");
        std::fs::create_dir_all(&input).unwrap();

        // A stale marker with its message still present, plus one without.
        write_message(&input, "stuck.eml");
        std::fs::write(input.join("stuck.eml.lock"), "").unwrap();
        std::fs::write(input.join("gone.eml.lock"), "").unwrap();
        write_message(&input, "fresh.eml");

        let supervisor = supervisor(&input, &root.path().join("cso"));
        supervisor.reconcile_for_test().await;

        // Both markers cleared, both message files re-claimed.
        assert!(!input.join("gone.eml.lock").exists());
        assert_eq!(supervisor.tasks().len(), 2);
        assert!(input.join("stuck.eml.lock").is_file());
        assert!(input.join("fresh.eml.lock").is_file());
    }

    #[tokio::test]
    async fn reconciliation_is_idempotent_for_held_locks() {
        let root = tempfile::tempdir().unwrap();
        let input = root.path().join("csi");
        std::fs::create_dir_all(&input).unwrap();
        write_message(&input, "m.eml");

        let supervisor = supervisor(&input, &root.path().join("cso"));
        supervisor.reconcile_for_test().await;
        assert_eq!(supervisor.tasks().len(), 1);

        // A second backlog pass must not double-enqueue the held file.
        supervisor.enqueue_backlog().await;
        assert_eq!(supervisor.tasks().len(), 1);
    }

    #[tokio::test]
    async fn processing_moves_the_file_and_releases_the_lock() {
        let root = tempfile::tempdir().unwrap();
        let input = root.path().join("csi");
        let output = root.path().join("cso");
        std::fs::create_dir_all(&input).unwrap();
        write_message(&input, "m.eml");

        let supervisor = supervisor(&input, &output);
        supervisor.reconcile_for_test().await;

        let task = supervisor.tasks().pop().await;
        supervisor.process_for_test(task).await;

        assert!(output.join("m.eml").is_file());
        assert!(!input.join("m.eml").exists());
        assert!(!input.join("m.eml.lock").exists());
    }

    #[tokio::test]
    async fn rule_not_found_leaves_the_file_and_releases_the_lock() {
        let root = tempfile::tempdir().unwrap();
        let input = root.path().join("fli");
        std::fs::create_dir_all(&input).unwrap();
        write_message(&input, "m.eml");

        // Supervisor for FLI, but the table only covers CSI: no rule matches.
        let mut supervisor = supervisor(&input, &root.path().join("cso"));
        supervisor.spec.queue_type = QueueType::Fli;
        supervisor.reconcile_for_test().await;

        let task = supervisor.tasks().pop().await;
        supervisor.process_for_test(task).await;

        assert!(input.join("m.eml").is_file());
        assert!(!input.join("m.eml.lock").exists());
    }

    #[tokio::test]
    async fn run_creates_missing_directory_and_processes_new_files() {
        let root = tempfile::tempdir().unwrap();
        let input = root.path().join("csi");
        let output = root.path().join("cso");

        let supervisor = supervisor(&input, &output);
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(supervisor.run(stop_rx));

        // Wait for the freshly created directory and its watch, then drop
        // a message in.
        for _ in 0..50 {
            if input.is_dir() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        write_message(&input, "live.eml");

        for _ in 0..100 {
            if output.join("live.eml").is_file() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(output.join("live.eml").is_file());
        assert!(!input.join("live.eml.lock").exists());

        stop_tx.send(true).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("supervisor should stop on shutdown")
            .unwrap();
    }
}

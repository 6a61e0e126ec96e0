//! Output dispatch: moving routed messages into their destination queue.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::DispatchError;
use crate::queue::{OutputQueues, QueueType};

/// Moves a routed message file into the directory configured for its
/// output queue type. The move is a rename; the source and destination
/// are assumed to live on the same filesystem.
pub struct OutputDispatcher {
    outputs: Arc<OutputQueues>,
}

impl OutputDispatcher {
    pub fn new(outputs: Arc<OutputQueues>) -> Self {
        Self { outputs }
    }

    /// Move `source` into the directory of `output`, creating the
    /// directory on demand. Returns the destination path.
    pub async fn deliver(
        &self,
        source: &Path,
        output: QueueType,
    ) -> Result<PathBuf, DispatchError> {
        let dir = self
            .outputs
            .dir(output)
            .ok_or(DispatchError::UndefinedOutputQueue(output))?;

        if dir.is_dir() {
            debug!(dir = %dir.display(), queue = %output, "output directory already exists");
        } else {
            tokio::fs::create_dir_all(dir).await?;
            info!(dir = %dir.display(), queue = %output, "created output queue directory");
        }

        let file_name = source
            .file_name()
            .ok_or_else(|| DispatchError::Io(std::io::Error::other("source has no file name")))?;
        let destination = dir.join(file_name);

        tokio::fs::rename(source, &destination).await?;
        Ok(destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::OutputQueueSpec;

    fn dispatcher(queue_type: QueueType, dir: &Path) -> OutputDispatcher {
        OutputDispatcher::new(Arc::new(OutputQueues::new(vec![OutputQueueSpec {
            queue_type,
            dir: dir.to_path_buf(),
        }])))
    }

    #[tokio::test]
    async fn moves_file_and_creates_missing_directory() {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("m.eml");
        std::fs::write(&source, "x").unwrap();

        let out_dir = root.path().join("out/cso");
        let dispatcher = dispatcher(QueueType::Cso, &out_dir);

        let destination = dispatcher.deliver(&source, QueueType::Cso).await.unwrap();
        assert_eq!(destination, out_dir.join("m.eml"));
        assert!(destination.is_file());
        assert!(!source.exists());
    }

    #[tokio::test]
    async fn unconfigured_output_queue_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("m.eml");
        std::fs::write(&source, "x").unwrap();

        let dispatcher = dispatcher(QueueType::Cso, &root.path().join("out"));
        let err = dispatcher.deliver(&source, QueueType::Flo).await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::UndefinedOutputQueue(QueueType::Flo)
        ));
        // The message stays in place.
        assert!(source.is_file());
    }
}

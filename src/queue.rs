//! Queue type vocabulary and queue specifications.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::ConfigError;

/// The classified message queue types handled by the daemon.
///
/// Input types end in `I`, output types in `O`. The vocabulary is closed:
/// configuration entries naming anything else are rejected at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueueType {
    /// Canonical simple input.
    Csi,
    /// Canonical simple output.
    Cso,
    /// Flash heavy input.
    Fhi,
    /// Flash heavy output.
    Fho,
    /// Flash light input.
    Fli,
    /// Flash light output.
    Flo,
}

impl QueueType {
    /// Upper-case wire/display name of the queue type.
    pub fn name(self) -> &'static str {
        match self {
            QueueType::Csi => "CSI",
            QueueType::Cso => "CSO",
            QueueType::Fhi => "FHI",
            QueueType::Fho => "FHO",
            QueueType::Fli => "FLI",
            QueueType::Flo => "FLO",
        }
    }
}

impl fmt::Display for QueueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for QueueType {
    type Err = ConfigError;

    /// Parse a queue type name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csi" => Ok(QueueType::Csi),
            "cso" => Ok(QueueType::Cso),
            "fhi" => Ok(QueueType::Fhi),
            "fho" => Ok(QueueType::Fho),
            "fli" => Ok(QueueType::Fli),
            "flo" => Ok(QueueType::Flo),
            _ => Err(ConfigError::UnknownQueueType(s.to_string())),
        }
    }
}

/// A watched input queue directory.
#[derive(Debug, Clone)]
pub struct InputQueueSpec {
    pub queue_type: QueueType,
    pub dir: PathBuf,
    /// Inactive queues stay in the configuration but are not supervised.
    pub active: bool,
}

/// A routing destination directory.
#[derive(Debug, Clone)]
pub struct OutputQueueSpec {
    pub queue_type: QueueType,
    pub dir: PathBuf,
}

/// The set of configured output queues, keyed by queue type.
#[derive(Debug, Default)]
pub struct OutputQueues {
    dirs: HashMap<QueueType, PathBuf>,
}

impl OutputQueues {
    pub fn new(specs: impl IntoIterator<Item = OutputQueueSpec>) -> Self {
        let mut dirs = HashMap::new();
        for spec in specs {
            // First definition of a type wins; the loader warns on duplicates.
            dirs.entry(spec.queue_type).or_insert(spec.dir);
        }
        Self { dirs }
    }

    /// Whether an output queue of the given type is configured.
    pub fn contains(&self, queue_type: QueueType) -> bool {
        self.dirs.contains_key(&queue_type)
    }

    /// Directory configured for the given output queue type.
    pub fn dir(&self, queue_type: QueueType) -> Option<&Path> {
        self.dirs.get(&queue_type).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("csi".parse::<QueueType>().unwrap(), QueueType::Csi);
        assert_eq!("CSO".parse::<QueueType>().unwrap(), QueueType::Cso);
        assert_eq!("Flo".parse::<QueueType>().unwrap(), QueueType::Flo);
        assert!("bulk".parse::<QueueType>().is_err());
    }

    #[test]
    fn display_is_upper_case() {
        assert_eq!(QueueType::Fhi.to_string(), "FHI");
    }

    #[test]
    fn first_output_definition_wins() {
        let outputs = OutputQueues::new(vec![
            OutputQueueSpec {
                queue_type: QueueType::Cso,
                dir: PathBuf::from("/a"),
            },
            OutputQueueSpec {
                queue_type: QueueType::Cso,
                dir: PathBuf::from("/b"),
            },
        ]);
        assert_eq!(outputs.dir(QueueType::Cso), Some(Path::new("/a")));
        assert!(!outputs.contains(QueueType::Flo));
    }
}

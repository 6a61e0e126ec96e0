//! Daemon configuration: TOML file loading and per-entry validation.
//!
//! A malformed individual entry (unknown queue type, half-specified rule
//! addresses, duplicate rule identity) is skipped and reported; only
//! file-level problems — missing file, TOML syntax errors, no input queues
//! at all — abort the load.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::queue::{InputQueueSpec, OutputQueueSpec, QueueType};
use crate::routing::Rule;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "MAILFLOW_CONFIG";

/// Default configuration file path, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/mailflow.toml";

/// Validated daemon configuration.
#[derive(Debug)]
pub struct Config {
    /// Optional log file; stdout when absent.
    pub log_file: Option<PathBuf>,
    /// Default severity filter when `RUST_LOG` is not set.
    pub log_level: String,
    pub inputs: Vec<InputQueueSpec>,
    pub outputs: Vec<OutputQueueSpec>,
    /// Sorted ascending by `(set, order)`, identity-deduplicated.
    pub rules: Vec<Rule>,
}

impl Config {
    /// Resolve the configuration path from the environment.
    pub fn path_from_env() -> PathBuf {
        std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Load and validate the configuration file.
    ///
    /// Returns the validated configuration together with a report line for
    /// every skipped entry, so the caller can log them once the log sink is
    /// up.
    pub fn load(path: &Path) -> Result<(Self, Vec<String>), ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    /// Validate configuration from TOML text.
    pub fn from_toml(raw: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let parsed: RawConfig =
            toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut skipped = Vec::new();

        let mut inputs: Vec<InputQueueSpec> = Vec::new();
        for entry in parsed.inputs {
            let queue_type = match entry.queue.parse::<QueueType>() {
                Ok(t) => t,
                Err(e) => {
                    skipped.push(format!("input queue entry skipped: {e}"));
                    continue;
                }
            };
            if inputs.iter().any(|q| q.queue_type == queue_type) {
                skipped.push(format!(
                    "duplicate input queue definition for {queue_type} skipped"
                ));
                continue;
            }
            inputs.push(InputQueueSpec {
                queue_type,
                dir: PathBuf::from(entry.dir),
                active: entry.active,
            });
        }

        let mut outputs: Vec<OutputQueueSpec> = Vec::new();
        for entry in parsed.outputs {
            let queue_type = match entry.queue.parse::<QueueType>() {
                Ok(t) => t,
                Err(e) => {
                    skipped.push(format!("output queue entry skipped: {e}"));
                    continue;
                }
            };
            if outputs.iter().any(|q| q.queue_type == queue_type) {
                skipped.push(format!(
                    "duplicate output queue definition for {queue_type} skipped"
                ));
                continue;
            }
            outputs.push(OutputQueueSpec {
                queue_type,
                dir: PathBuf::from(entry.dir),
            });
        }

        let mut rules: Vec<Rule> = Vec::new();
        let mut identities: HashSet<(u32, u32)> = HashSet::new();
        for entry in parsed.rules {
            match validate_rule(&entry) {
                Ok(rule) => {
                    if !identities.insert((rule.set, rule.order)) {
                        skipped.push(format!(
                            "duplicate rule {}.{} skipped",
                            rule.set, rule.order
                        ));
                        continue;
                    }
                    rules.push(rule);
                }
                Err(reason) => {
                    skipped.push(format!(
                        "rule {}.{} skipped: {reason}",
                        entry.set, entry.order
                    ));
                }
            }
        }

        // Rule-table order is the single precedence signal during routing.
        rules.sort_by_key(|r| (r.set, r.order));

        if inputs.is_empty() {
            return Err(ConfigError::NoInputQueues);
        }

        Ok((
            Self {
                log_file: parsed.log_file.map(PathBuf::from),
                log_level: parsed.log_level,
                inputs,
                outputs,
                rules,
            },
            skipped,
        ))
    }

    /// Input queues that should be supervised.
    pub fn active_inputs(&self) -> impl Iterator<Item = &InputQueueSpec> {
        self.inputs.iter().filter(|q| q.active)
    }
}

fn validate_rule(entry: &RawRule) -> Result<Rule, String> {
    let input = entry
        .input
        .parse::<QueueType>()
        .map_err(|e| e.to_string())?;
    let output = entry
        .output
        .parse::<QueueType>()
        .map_err(|e| e.to_string())?;

    // A rule is either general (no addresses) or specific (both addresses).
    let (from, to) = match (&entry.from, &entry.to) {
        (Some(from), Some(to)) => (Some(from.trim().to_string()), Some(to.trim().to_string())),
        (None, None) => (None, None),
        _ => {
            return Err("a rule must set both of from/to or neither".to_string());
        }
    };

    Ok(Rule {
        set: entry.set,
        order: entry.order,
        from,
        to,
        input,
        output,
    })
}

// ── Raw deserialization shapes ──────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    log_file: Option<String>,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default)]
    inputs: Vec<RawInput>,
    #[serde(default)]
    outputs: Vec<RawOutput>,
    #[serde(default)]
    rules: Vec<RawRule>,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize)]
struct RawInput {
    queue: String,
    dir: String,
    #[serde(default = "default_active")]
    active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct RawOutput {
    queue: String,
    dir: String,
}

#[derive(Debug, Deserialize)]
struct RawRule {
    set: u32,
    order: u32,
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    to: Option<String>,
    input: String,
    output: String,
}

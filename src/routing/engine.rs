//! Routing decision engine.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::RoutingError;
use crate::message::{self, MODE_CANONICAL, MODE_FLASH};
use crate::queue::{OutputQueues, QueueType};
use crate::routing::RuleTable;

/// Selects the output queue for a message, using the rule table and the
/// configured output queue set. Read-only after construction; safe to
/// share across queue supervisors.
pub struct RoutingEngine {
    rules: Arc<RuleTable>,
    outputs: Arc<OutputQueues>,
}

impl RoutingEngine {
    pub fn new(rules: Arc<RuleTable>, outputs: Arc<OutputQueues>) -> Self {
        Self { rules, outputs }
    }

    /// Decide the output queue for the message at `source`, read from the
    /// `input` queue.
    ///
    /// Evaluation order, short-circuiting on first success:
    /// 1. preliminary routing by the message's routing-mode tag, accepted
    ///    only when the tagged output queue is actually configured;
    /// 2. specific rules matching both addresses, first match in table
    ///    order (a warning is logged when the match is ambiguous);
    /// 3. the first general rule for the input queue;
    /// 4. `RuleNotFound`.
    pub async fn route(&self, source: &Path, input: QueueType) -> Result<QueueType, RoutingError> {
        debug!(file = %source.display(), queue = %input, "processing message");

        let facts = message::read_facts(source).await?;

        if let Some(mode) = facts.mode.as_deref()
            && let Some(output) = self.preliminary_route(mode)
        {
            debug!(
                file = %source.display(),
                queue = %input,
                mode,
                output = %output,
                "routing by mode tag"
            );
            return Ok(output);
        }

        if let (Some(from), Some(to)) = (facts.from.as_deref(), facts.to.as_deref()) {
            let matches = self.rules.specific_matches(from, to, input);
            if let Some(first) = matches.first() {
                debug!(
                    file = %source.display(),
                    queue = %input,
                    rule = %first.label(),
                    output = %first.output,
                    "routing by specific rule"
                );
                if matches.len() > 1 {
                    warn!(
                        file = %source.display(),
                        rule = %first.label(),
                        candidates = matches.len(),
                        "more than one rule matches this sender/recipient pair"
                    );
                }
                return Ok(first.output);
            }
        }

        if let Some(rule) = self.rules.general_rule(input) {
            debug!(
                file = %source.display(),
                queue = %input,
                rule = %rule.label(),
                output = %rule.output,
                "routing by general rule"
            );
            return Ok(rule.output);
        }

        Err(RoutingError::RuleNotFound {
            file: source.to_path_buf(),
            queue: input,
        })
    }

    /// Output queue selected by a recognized mode tag, when configured.
    ///
    /// An unconfigured target is skipped silently so evaluation falls
    /// through to the rule scans.
    fn preliminary_route(&self, mode: &str) -> Option<QueueType> {
        let target = match mode {
            MODE_CANONICAL => QueueType::Cso,
            MODE_FLASH => QueueType::Fho,
            _ => return None,
        };
        self.outputs.contains(target).then_some(target)
    }
}

//! Routing rules and the ordered rule table.

use crate::queue::QueueType;

/// One routing directive.
///
/// Identity is `(set, order)`; the loader rejects duplicates. A rule with
/// both addresses set is *specific* (matched against the message's sender
/// and recipient); a rule with neither is *general* (fallback for its
/// input queue type). Half-addressed rules never reach the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub set: u32,
    pub order: u32,
    pub from: Option<String>,
    pub to: Option<String>,
    pub input: QueueType,
    pub output: QueueType,
}

impl Rule {
    /// Whether the rule carries a sender/recipient address pair.
    pub fn is_specific(&self) -> bool {
        self.from.is_some() && self.to.is_some()
    }

    /// Whether the rule is an address-free fallback.
    pub fn is_general(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    /// Compact identity label used in log messages, e.g. `0.3`.
    pub fn label(&self) -> String {
        format!("{}.{}", self.set, self.order)
    }
}

/// The immutable, priority-ordered rule table.
///
/// The table trusts the loader's contract: rules arrive sorted ascending
/// by `(set, order)` and that pair is unique. Scan order is the single
/// precedence signal; both scan methods preserve it.
#[derive(Debug, Default)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// All specific rules matching the given addresses and input queue,
    /// comparing both addresses case-insensitively, in table order.
    pub fn specific_matches(&self, from: &str, to: &str, input: QueueType) -> Vec<&Rule> {
        self.rules
            .iter()
            .filter(|rule| rule.input == input)
            .filter(|rule| {
                if let (Some(rule_from), Some(rule_to)) = (&rule.from, &rule.to) {
                    rule_from.eq_ignore_ascii_case(from) && rule_to.eq_ignore_ascii_case(to)
                } else {
                    false
                }
            })
            .collect()
    }

    /// First general rule for the given input queue, in table order.
    pub fn general_rule(&self, input: QueueType) -> Option<&Rule> {
        self.rules
            .iter()
            .find(|rule| rule.input == input && rule.is_general())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specific(set: u32, order: u32, from: &str, to: &str, output: QueueType) -> Rule {
        Rule {
            set,
            order,
            from: Some(from.to_string()),
            to: Some(to.to_string()),
            input: QueueType::Csi,
            output,
        }
    }

    fn general(set: u32, order: u32, input: QueueType, output: QueueType) -> Rule {
        Rule {
            set,
            order,
            from: None,
            to: None,
            input,
            output,
        }
    }

    #[test]
    fn specific_match_is_case_insensitive() {
        let table = RuleTable::new(vec![specific(
            0,
            1,
            "A@x.com",
            "B@y.com",
            QueueType::Flo,
        )]);
        let matches = table.specific_matches("a@X.com", "b@Y.com", QueueType::Csi);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].output, QueueType::Flo);
    }

    #[test]
    fn specific_match_requires_matching_input_queue() {
        let table = RuleTable::new(vec![specific(0, 1, "a@x.com", "b@y.com", QueueType::Flo)]);
        assert!(
            table
                .specific_matches("a@x.com", "b@y.com", QueueType::Fli)
                .is_empty()
        );
    }

    #[test]
    fn table_order_is_preserved_across_matches() {
        let table = RuleTable::new(vec![
            specific(0, 1, "a@x.com", "b@y.com", QueueType::Flo),
            specific(0, 2, "a@x.com", "b@y.com", QueueType::Cso),
        ]);
        let matches = table.specific_matches("a@x.com", "b@y.com", QueueType::Csi);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].label(), "0.1");
    }

    #[test]
    fn general_rule_skips_specific_rules() {
        let table = RuleTable::new(vec![
            specific(0, 1, "a@x.com", "b@y.com", QueueType::Flo),
            general(0, 2, QueueType::Csi, QueueType::Cso),
            general(0, 3, QueueType::Csi, QueueType::Fho),
        ]);
        let rule = table.general_rule(QueueType::Csi).unwrap();
        assert_eq!(rule.label(), "0.2");
        assert_eq!(rule.output, QueueType::Cso);
        assert!(table.general_rule(QueueType::Fli).is_none());
    }
}

//! Rule-based routing: the rule table, the decision engine and output
//! dispatch.

pub mod dispatch;
pub mod engine;
pub mod rules;

pub use dispatch::OutputDispatcher;
pub use engine::RoutingEngine;
pub use rules::{Rule, RuleTable};

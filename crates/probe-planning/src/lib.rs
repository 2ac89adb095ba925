//! Probe Planning - natural-language goals to ordered actions
//!
//! This crate turns goal text into structured intents ([`GoalParser`]) and
//! ordered action lists ([`WorkflowDecomposer`]), and rewrites action lists
//! into equivalent shorter ones ([`optimize`]).
//!
//! Classification is an ordered rule table: the first matching rule wins,
//! so precedence is the table order and each rule is testable alone.

pub mod decomposer;
pub mod optimizer;
pub mod parser;
pub mod rules;
pub mod vocabulary;

pub use decomposer::WorkflowDecomposer;
pub use optimizer::optimize;
pub use parser::GoalParser;
pub use rules::{Rule, RuleTable};

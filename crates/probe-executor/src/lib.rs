//! Probe Executor - run action lists against a live page
//!
//! [`AdaptiveExecutor`] executes one [`Action`](probe_core::Action) at a
//! time. Each attempt is a transition of a pure state machine
//! ([`state_machine::transition`]); the executor performs the effects:
//!
//! - stale element: short wait, same selector
//! - not found: next candidate (or a model-suggested selector), then the
//!   one-shot rescues (iframes, then shadow roots)
//! - timeout / unknown: back off and retry until the budget runs out
//!
//! [`AdaptiveExecutor::execute_sequence`] runs actions in order with a
//! shared [`ExecutionContext`](probe_core::ExecutionContext), and
//! [`run_flow`] goes from goal text to a [`FlowReport`].
//!
//! # Example
//!
//! ```no_run
//! use probe_browser::{MockDriver, PageBuilder};
//! use probe_core::config::ExecutorConfig;
//! use probe_core::{Action, ExecutionContext};
//! use probe_executor::AdaptiveExecutor;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let page = PageBuilder::new("http://localhost/")
//!     .button("Save")
//!     .build();
//! let executor = AdaptiveExecutor::new(Arc::new(MockDriver::with_page(page)), ExecutorConfig::default());
//! let result = executor
//!     .execute(&Action::click("Save button"), &mut ExecutionContext::new())
//!     .await;
//! assert!(result.success);
//! # }
//! ```

mod executor;
mod flow;
pub mod rescue;
pub mod state_machine;
pub mod targeting;

pub use executor::{AdaptiveExecutor, SequenceOptions};
pub use flow::{plan_flow, run_flow, FlowReport};
pub use probe_browser::{analyze_ui, verify_page, PageVerification, UiAnalysis};
pub use state_machine::{transition, AttemptEvent, AttemptState, Effect, RetryPolicy};

//! Goal-to-report flow runner

use crate::executor::{AdaptiveExecutor, SequenceOptions};
use chrono::{DateTime, Utc};
use probe_core::{Action, SequenceResult};
use probe_planning::{optimize, WorkflowDecomposer};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Everything one flow run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowReport {
    pub run_id: Uuid,
    pub goal: String,
    /// Optimized action list that was executed
    pub actions: Vec<Action>,
    pub result: SequenceResult,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
}

impl FlowReport {
    pub fn success(&self) -> bool {
        self.result.success
    }
}

/// Actions for `goal`, preceded by a visit to `start_url` when given
pub fn plan_flow(goal: &str, start_url: Option<&str>) -> Vec<Action> {
    let mut actions = Vec::new();
    if let Some(url) = start_url {
        actions.push(Action::navigate(url));
    }
    actions.extend(WorkflowDecomposer::new().decompose(goal));
    optimize(&actions)
}

/// Decompose `goal`, execute it with a fresh context and report.
///
/// ```no_run
/// use probe_browser::BrowserSession;
/// use probe_core::config::{BrowserSettings, ExecutorConfig};
/// use probe_executor::{run_flow, AdaptiveExecutor, SequenceOptions};
/// use std::sync::Arc;
///
/// # async fn example() -> probe_core::Result<()> {
/// let session = BrowserSession::launch(&BrowserSettings::default()).await?;
/// let executor = AdaptiveExecutor::new(Arc::new(session), ExecutorConfig::default());
/// let report = run_flow(
///     &executor,
///     "Sign up with email test@example.com and password SecurePass123, then submit",
///     Some("http://localhost:3000"),
///     SequenceOptions::default(),
/// )
/// .await;
/// println!("{}", serde_json::to_string_pretty(&report)?);
/// # Ok(())
/// # }
/// ```
pub async fn run_flow(
    executor: &AdaptiveExecutor,
    goal: &str,
    start_url: Option<&str>,
    options: SequenceOptions,
) -> FlowReport {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    let actions = plan_flow(goal, start_url);
    info!(%run_id, steps = actions.len(), "Running flow: {}", goal);

    let result = executor.execute_sequence(&actions, options).await;
    let final_url = executor.current_url().await;
    let finished_at = Utc::now();
    info!(
        %run_id,
        success = result.success,
        elapsed_ms = (finished_at - started_at).num_milliseconds(),
        "Flow finished"
    );

    FlowReport {
        run_id,
        goal: goal.to_string(),
        actions,
        result,
        started_at,
        finished_at,
        final_url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_core::ActionKind;

    #[test]
    fn test_plan_flow_starts_at_url() {
        let actions = plan_flow("click the Save button", Some("http://localhost:3000"));
        assert_eq!(actions[0].kind, ActionKind::Navigate);
        assert_eq!(actions[0].value.as_deref(), Some("http://localhost:3000"));
        assert_eq!(actions.last().map(|a| a.kind), Some(ActionKind::Click));
    }

    #[test]
    fn test_plan_flow_without_url() {
        let actions = plan_flow("click the Save button", None);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].target.as_deref(), Some("Save button"));
    }
}

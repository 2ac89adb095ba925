//! Scripted language model for tests

use crate::strategy::{interpret_by_text, LanguageModel};
use crate::types::ErrorInterpretation;
use async_trait::async_trait;
use parking_lot::Mutex;
use probe_core::{Action, FieldKind, ParsedGoal, ProbeError, Result};
use probe_planning::GoalParser;
use std::collections::VecDeque;

/// Answers from queues; every call is recorded by operation name.
///
/// A failing mock returns an API error from every operation.
#[derive(Default)]
pub struct MockLanguageModel {
    fail: bool,
    selectors: Mutex<VecDeque<Vec<String>>>,
    mappings: Mutex<VecDeque<Option<String>>>,
    completions: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<String>>,
}

impl MockLanguageModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn push_selectors(&self, selectors: Vec<String>) {
        self.selectors.lock().push_back(selectors);
    }

    pub fn push_mapping(&self, value: Option<String>) {
        self.mappings.lock().push_back(value);
    }

    pub fn push_completion(&self, text: impl Into<String>) {
        self.completions.lock().push_back(text.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, operation: &str) -> Result<()> {
        self.calls.lock().push(operation.to_string());
        if self.fail {
            Err(ProbeError::Api(format!("mock {} failure", operation)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn parse_goal(&self, goal: &str) -> Result<ParsedGoal> {
        self.record("parse_goal")?;
        Ok(GoalParser::new().parse(goal))
    }

    async fn interpret_error(&self, error: &str, action: &Action) -> Result<ErrorInterpretation> {
        self.record("interpret_error")?;
        Ok(interpret_by_text(error, action))
    }

    async fn suggest_selectors(&self, _description: &str, _html: &str) -> Result<Vec<String>> {
        self.record("suggest_selectors")?;
        Ok(self.selectors.lock().pop_front().unwrap_or_default())
    }

    async fn map_value(
        &self,
        _label: &str,
        _kind: FieldKind,
        _name: &str,
        _candidates: &[String],
    ) -> Result<Option<String>> {
        self.record("map_value")?;
        Ok(self.mappings.lock().pop_front().flatten())
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        self.record("complete")?;
        self.completions
            .lock()
            .pop_front()
            .ok_or_else(|| ProbeError::Api("no scripted completion".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completions_replay_then_error() {
        let model = MockLanguageModel::new();
        model.push_completion("{\"kind\": \"timeout\"}");
        assert_eq!(model.complete("why?").await.unwrap(), "{\"kind\": \"timeout\"}");
        assert!(model.complete("again?").await.is_err());
        assert_eq!(model.calls(), vec!["complete", "complete"]);
    }

    #[tokio::test]
    async fn test_failing_mock_records_and_errors() {
        let model = MockLanguageModel::failing();
        assert!(model.parse_goal("click Save").await.is_err());
        assert!(model.suggest_selectors("click Save", "<body></body>").await.is_err());
        assert_eq!(model.calls(), vec!["parse_goal", "suggest_selectors"]);
    }
}

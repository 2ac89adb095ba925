//! The browser capability the engine consumes

use crate::scripts::{self, ElementAction, RescueScope};
use async_trait::async_trait;
use probe_core::{DomSnapshot, ProbeError, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// Page automation backend.
///
/// Implementations report missing elements as [`ProbeError::ElementNotFound`]
/// and detached ones as [`ProbeError::StaleElement`] so the executor can
/// classify failures without parsing messages.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;

    async fn click(&self, selector: &str) -> Result<()>;

    /// Replace the element's value with `value`
    async fn fill(&self, selector: &str, value: &str) -> Result<()>;

    /// Choose the option whose value (or visible text) is `value`
    async fn select_option(&self, selector: &str, value: &str) -> Result<()>;

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()>;

    async fn element_exists(&self, selector: &str) -> Result<bool>;

    /// Evaluate a script in the page
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;

    async fn snapshot(&self) -> Result<DomSnapshot>;

    async fn current_url(&self) -> Result<String>;

    async fn page_html(&self) -> Result<String>;

    async fn page_text(&self) -> Result<String>;

    /// PNG bytes of the viewport
    async fn screenshot(&self) -> Result<Vec<u8>>;

    async fn console_errors(&self) -> Result<Vec<String>>;

    /// Look for `selector` inside `scope` and perform `action` on the first
    /// hit. `Ok(false)` when nothing in the scope matched.
    async fn act_in(&self, scope: RescueScope, selector: &str, action: &ElementAction) -> Result<bool> {
        #[derive(Deserialize)]
        struct Outcome {
            found: bool,
        }
        let value = self
            .evaluate(&scripts::rescue_script(scope, selector, action))
            .await?;
        let outcome: Outcome = decode_script_value(value)?;
        Ok(outcome.found)
    }
}

/// Decode a script result that may arrive as a JSON string or a value
pub fn decode_script_value<T: DeserializeOwned>(value: serde_json::Value) -> Result<T> {
    match value {
        serde_json::Value::String(text) => serde_json::from_str(&text).map_err(|e| {
            ProbeError::Browser(format!("Script returned malformed JSON: {}", e))
        }),
        other => Ok(serde_json::from_value(other)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_string_or_value() {
        let from_string: Vec<String> = decode_script_value(json!("[\"a\",\"b\"]")).unwrap();
        assert_eq!(from_string, vec!["a", "b"]);
        let from_value: Vec<String> = decode_script_value(json!(["c"])).unwrap();
        assert_eq!(from_value, vec!["c"]);
        assert!(decode_script_value::<Vec<String>>(json!("not json")).is_err());
    }
}

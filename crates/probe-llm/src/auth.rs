//! Credential lookup for the Anthropic API
//!
//! `CLAUDE_CODE_OAUTH_TOKEN` wins when set; otherwise the variable named by
//! `llm.api_key_env` (default `ANTHROPIC_API_KEY`) is used.

use probe_core::{ProbeError, Result};
use std::env;

pub const OAUTH_TOKEN_ENV: &str = "CLAUDE_CODE_OAUTH_TOKEN";

/// Resolve the token to send, or an auth error naming both variables
pub fn get_auth_token(api_key_env: &str) -> Result<String> {
    if let Some(token) = env::var(OAUTH_TOKEN_ENV).ok().filter(|t| !t.is_empty()) {
        tracing::debug!("Using OAuth token from {}", OAUTH_TOKEN_ENV);
        return Ok(token);
    }

    if let Some(key) = env::var(api_key_env).ok().filter(|k| !k.is_empty()) {
        tracing::debug!("Using API key from {}", api_key_env);
        return Ok(key);
    }

    Err(ProbeError::Auth(format!(
        "No credentials found. Set {} or {}",
        OAUTH_TOKEN_ENV, api_key_env
    )))
}

/// Whether credentials are present, without logging
pub fn has_credentials(api_key_env: &str) -> bool {
    [OAUTH_TOKEN_ENV, api_key_env]
        .iter()
        .any(|var| env::var(var).map(|v| !v.is_empty()).unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests in this module mutate process environment
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_env_vars<F, R>(vars: &[(&str, Option<&str>)], f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let originals: Vec<_> = vars.iter().map(|(k, _)| (*k, env::var(k).ok())).collect();
        for (key, value) in vars {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
        let result = f();
        for (key, original) in originals {
            match original {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
        result
    }

    #[test]
    fn test_oauth_token_wins() {
        with_env_vars(
            &[(OAUTH_TOKEN_ENV, Some("oauth")), ("PROBE_TEST_KEY_A", Some("key"))],
            || assert_eq!(get_auth_token("PROBE_TEST_KEY_A").unwrap(), "oauth"),
        );
    }

    #[test]
    fn test_configured_variable_is_used() {
        with_env_vars(
            &[(OAUTH_TOKEN_ENV, None), ("PROBE_TEST_KEY_B", Some("key-b"))],
            || {
                assert_eq!(get_auth_token("PROBE_TEST_KEY_B").unwrap(), "key-b");
                assert!(has_credentials("PROBE_TEST_KEY_B"));
            },
        );
    }

    #[test]
    fn test_missing_credentials() {
        with_env_vars(
            &[(OAUTH_TOKEN_ENV, None), ("PROBE_TEST_KEY_C", Some(""))],
            || {
                let err = get_auth_token("PROBE_TEST_KEY_C").unwrap_err();
                assert!(matches!(err, ProbeError::Auth(_)));
                assert!(err.to_string().contains("PROBE_TEST_KEY_C"));
                assert!(!has_credentials("PROBE_TEST_KEY_C"));
            },
        );
    }
}

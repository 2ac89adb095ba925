//! Configuration management for UI-probe
//!
//! Tunables for the executor, resolver, form inference, language-model
//! assist and browser launch. The resolver's fuzzy threshold and partial
//! prefix length are empirical, so they live here rather than in code.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{ProbeError, Result};

/// Root configuration
///
/// Loaded from `.probe/config.toml` under the given root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub inference: InferenceConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub browser: BrowserSettings,
}

/// Adaptive executor tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Pause between ordinary retries
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Pause before retrying a stale/detached element
    #[serde(default = "default_stale_wait_ms")]
    pub stale_wait_ms: u64,

    #[serde(default = "default_selector_timeout_ms")]
    pub selector_timeout_ms: u64,

    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,

    /// Page markup sent with alternative-selector requests is cut to this
    #[serde(default = "default_max_html_chars")]
    pub max_html_chars: usize,

    #[serde(default = "default_true")]
    pub enable_rescues: bool,

    #[serde(default)]
    pub screenshot_on_failure: bool,

    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
}

/// Field resolver tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Fuzzy label matches must score strictly above this
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,

    /// Prefix length for the abbreviation heuristic
    #[serde(default = "default_partial_prefix_len")]
    pub partial_prefix_len: usize,
}

/// Form inference tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Confidence under this logs a warning (never an error)
    #[serde(default = "default_low_confidence")]
    pub low_confidence_threshold: f64,
}

/// Language-model assist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable containing the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Goal-parse cache entries, capped at 100
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

/// Browser launch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSettings {
    #[serde(default = "default_true")]
    pub headless: bool,

    #[serde(default = "default_window_width")]
    pub window_width: u32,

    #[serde(default = "default_window_height")]
    pub window_height: u32,

    #[serde(default)]
    pub user_agent: Option<String>,
}

// Default value providers
fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_stale_wait_ms() -> u64 {
    300
}

fn default_selector_timeout_ms() -> u64 {
    5_000
}

fn default_navigation_timeout_ms() -> u64 {
    30_000
}

fn default_max_html_chars() -> usize {
    5_000
}

fn default_true() -> bool {
    true
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from(".probe/artifacts")
}

fn default_fuzzy_threshold() -> f64 {
    0.6
}

fn default_partial_prefix_len() -> usize {
    3
}

fn default_low_confidence() -> f64 {
    0.3
}

fn default_model() -> String {
    "sonnet".to_string()
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_max_tokens() -> usize {
    1024
}

fn default_cache_capacity() -> usize {
    100
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_window_width() -> u32 {
    1920
}

fn default_window_height() -> u32 {
    1080
}

impl ProbeConfig {
    /// Load configuration from `.probe/config.toml` or use defaults
    pub fn load_or_default(root: &Path) -> Result<Self> {
        let config_path = root.join(".probe/config.toml");

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)
                .map_err(|e| ProbeError::Config(format!("Failed to parse config file: {}", e)))
        } else {
            Ok(Self::default())
        }
    }

    /// Write default configuration to `.probe/config.toml`
    pub fn write_default(root: &Path) -> Result<PathBuf> {
        let config_dir = root.join(".probe");
        std::fs::create_dir_all(&config_dir)?;

        let config_path = config_dir.join("config.toml");
        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| ProbeError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(&config_path, content)?;
        Ok(config_path)
    }
}

impl ExecutorConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn stale_wait(&self) -> Duration {
        Duration::from_millis(self.stale_wait_ms)
    }

    pub fn selector_timeout(&self) -> Duration {
        Duration::from_millis(self.selector_timeout_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            stale_wait_ms: default_stale_wait_ms(),
            selector_timeout_ms: default_selector_timeout_ms(),
            navigation_timeout_ms: default_navigation_timeout_ms(),
            max_html_chars: default_max_html_chars(),
            enable_rescues: true,
            screenshot_on_failure: false,
            artifacts_dir: default_artifacts_dir(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: default_fuzzy_threshold(),
            partial_prefix_len: default_partial_prefix_len(),
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            low_confidence_threshold: default_low_confidence(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: default_model(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            cache_capacity: default_cache_capacity(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: default_window_width(),
            window_height: default_window_height(),
            user_agent: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProbeConfig::default();
        assert_eq!(config.executor.max_retries, 3);
        assert_eq!(config.resolver.fuzzy_threshold, 0.6);
        assert_eq!(config.resolver.partial_prefix_len, 3);
        assert_eq!(config.llm.cache_capacity, 100);
        assert_eq!(config.llm.cache_ttl_secs, 300);
        assert!(!config.llm.enabled);
        assert_eq!(config.executor.navigation_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProbeConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(config.executor.retry_delay_ms, 500);
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = ProbeConfig::write_default(dir.path()).unwrap();
        assert!(path.ends_with(".probe/config.toml"));

        let loaded = ProbeConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(loaded.executor.max_retries, 3);
        assert!(loaded.browser.headless);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".probe")).unwrap();
        std::fs::write(
            dir.path().join(".probe/config.toml"),
            "[executor]\nmax_retries = 5\n\n[resolver]\nfuzzy_threshold = 0.75\n",
        )
        .unwrap();

        let config = ProbeConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(config.executor.max_retries, 5);
        assert_eq!(config.executor.stale_wait_ms, 300);
        assert_eq!(config.resolver.fuzzy_threshold, 0.75);
        assert_eq!(config.resolver.partial_prefix_len, 3);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".probe")).unwrap();
        std::fs::write(dir.path().join(".probe/config.toml"), "executor = [").unwrap();

        let err = ProbeConfig::load_or_default(dir.path()).unwrap_err();
        assert!(matches!(err, ProbeError::Config(_)));
    }
}

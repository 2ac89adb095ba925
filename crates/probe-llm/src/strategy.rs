//! Language-model strategies
//!
//! Every operation the executor and resolver may ask of a model has a
//! deterministic answer in [`HeuristicStrategy`]. [`ClaudeStrategy`] asks the
//! Messages API instead, and [`AssistedStrategy`] tries the model first and
//! falls back per call.

use crate::cache::TtlCache;
use crate::client::ClaudeClient;
use crate::types::ErrorInterpretation;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use probe_core::config::LlmConfig;
use probe_core::fail_open::{fail_open_or, fail_open_with_retries};
use probe_core::{Action, FailureKind, FieldKind, ParsedGoal, ProbeError, Result};
use probe_planning::GoalParser;
use probe_resolver::{normalize, partial_match, similarity, ValueMapper};
use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Minimum similarity for the heuristic value mapping
const MAP_THRESHOLD: f64 = 0.6;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));
static ROLE_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:the|a|an|button|link|field|input|box|dropdown|checkbox|tab)\b")
        .expect("valid regex")
});

/// Semantic assist operations
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Short name for logs and reports
    fn name(&self) -> &str;

    /// Structured intent for a goal sentence
    async fn parse_goal(&self, goal: &str) -> Result<ParsedGoal>;

    /// Explain a failed action
    async fn interpret_error(&self, error: &str, action: &Action) -> Result<ErrorInterpretation>;

    /// Alternative selectors for a described element, best first
    async fn suggest_selectors(&self, description: &str, html: &str) -> Result<Vec<String>>;

    /// Technical value among `candidates` that a human label most likely means
    async fn map_value(
        &self,
        label: &str,
        kind: FieldKind,
        name: &str,
        candidates: &[String],
    ) -> Result<Option<String>>;

    /// Free-text completion
    async fn complete(&self, prompt: &str) -> Result<String>;
}

// ============================================================================
// Heuristic
// ============================================================================

/// Deterministic strategy: rule-table parsing and text heuristics
#[derive(Default)]
pub struct HeuristicStrategy {
    parser: GoalParser,
}

impl HeuristicStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Interpret a failure from its message alone
pub fn interpret_by_text(error: &str, action: &Action) -> ErrorInterpretation {
    let kind = FailureKind::classify(error);
    let target = action.target.as_deref().unwrap_or("the element");
    let (explanation, suggestion) = match kind {
        FailureKind::StaleElement => (
            format!("{} was re-rendered while being used", target),
            Some("wait briefly and retry with the same selector".to_string()),
        ),
        FailureKind::NotFound => (
            format!("no element matched {}", target),
            Some("try an alternative selector or look inside frames".to_string()),
        ),
        FailureKind::Timeout => (
            format!("{} did not become available in time", target),
            Some("check that the page finished loading".to_string()),
        ),
        FailureKind::Unknown => (error.to_string(), None),
    };
    ErrorInterpretation {
        kind,
        explanation,
        suggestion,
        retryable: kind.is_recoverable(),
    }
}

/// Selector variations derived from an element description
pub fn selector_variations(description: &str, html: &str) -> Vec<String> {
    let text = ROLE_WORDS.replace_all(description, " ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return Vec::new();
    }
    let lower = text.to_lowercase();
    let kebab = NON_WORD.replace_all(&lower, "-").trim_matches('-').to_string();
    let snake = kebab.replace('-', "_");
    let compact = kebab.replace('-', "");

    let mut suggestions = vec![
        format!("#{}", kebab),
        format!("[name=\"{}\"]", snake),
        format!("[data-testid=\"{}\"]", kebab),
        format!("[aria-label=\"{}\"]", text),
        format!("[placeholder=\"{}\"]", text),
        format!("#{}", compact),
    ];
    suggestions.dedup();

    // Selectors whose token appears in the markup go first
    if !html.is_empty() {
        let markup = html.to_lowercase();
        let token_of = |s: &str| -> String {
            s.trim_start_matches('#')
                .split('"')
                .nth(1)
                .unwrap_or_else(|| s.trim_start_matches('#'))
                .to_lowercase()
        };
        suggestions.sort_by_key(|s| !markup.contains(&token_of(s)));
    }
    suggestions
}

/// Best candidate by normalized similarity or shared prefix
pub fn map_by_similarity(label: &str, name: &str, candidates: &[String]) -> Option<String> {
    let mut best: Option<(&String, f64)> = None;
    for candidate in candidates {
        let score = similarity(label, candidate).max(similarity(name, candidate));
        let score = if score < MAP_THRESHOLD && partial_match(label, candidate, 3) {
            MAP_THRESHOLD
        } else {
            score
        };
        if score >= MAP_THRESHOLD && best.map_or(true, |(_, s)| score > s) {
            best = Some((candidate, score));
        }
    }
    best.map(|(c, _)| c.clone())
        .filter(|c| normalize(c) != normalize(label))
}

#[async_trait]
impl LanguageModel for HeuristicStrategy {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn parse_goal(&self, goal: &str) -> Result<ParsedGoal> {
        Ok(self.parser.parse(goal))
    }

    async fn interpret_error(&self, error: &str, action: &Action) -> Result<ErrorInterpretation> {
        Ok(interpret_by_text(error, action))
    }

    async fn suggest_selectors(&self, description: &str, html: &str) -> Result<Vec<String>> {
        Ok(selector_variations(description, html))
    }

    async fn map_value(
        &self,
        label: &str,
        _kind: FieldKind,
        name: &str,
        candidates: &[String],
    ) -> Result<Option<String>> {
        Ok(map_by_similarity(label, name, candidates))
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        Err(ProbeError::Api(
            "no language model configured for free-text completion".to_string(),
        ))
    }
}

// ============================================================================
// Claude
// ============================================================================

const SYSTEM_PROMPT: &str = "You help automate web UI tests. \
Answer with exactly the JSON requested and nothing else.";

/// Messages API strategy with a bounded goal-parse cache
pub struct ClaudeStrategy {
    client: ClaudeClient,
    parse_cache: TtlCache<String, ParsedGoal>,
}

impl ClaudeStrategy {
    pub fn new(client: ClaudeClient, cache_capacity: usize, cache_ttl: Duration) -> Self {
        Self {
            client,
            parse_cache: TtlCache::new(cache_capacity, cache_ttl),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(
            ClaudeClient::from_config(config),
            config.cache_capacity,
            Duration::from_secs(config.cache_ttl_secs),
        )
    }

    pub fn client(&self) -> &ClaudeClient {
        &self.client
    }

    async fn ask(&self, prompt: &str) -> Result<String> {
        Ok(self.client.complete(Some(SYSTEM_PROMPT), prompt).await?.text)
    }

    async fn ask_json<T: DeserializeOwned>(&self, prompt: &str) -> Result<T> {
        let text = self.ask(prompt).await?;
        parse_json(&text)
    }
}

/// Extract the first JSON value from model text, tolerating code fences
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find(|c: char| c == '{' || c == '[')?;
    let close = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    let json = extract_json(text)
        .ok_or_else(|| ProbeError::Api(format!("No JSON in model response: {}", text)))?;
    Ok(serde_json::from_str(json)?)
}

fn cache_key(goal: &str) -> String {
    goal.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[async_trait]
impl LanguageModel for ClaudeStrategy {
    fn name(&self) -> &str {
        "claude"
    }

    #[instrument(skip(self))]
    async fn parse_goal(&self, goal: &str) -> Result<ParsedGoal> {
        let key = cache_key(goal);
        if let Some(hit) = self.parse_cache.get(&key) {
            debug!("Goal parse cache hit");
            return Ok(hit);
        }

        let prompt = format!(
            "Parse this UI testing goal into JSON with fields: \
             action (navigate|click|fill|submit|verify), target, \
             target_type (button|link|input|select|checkbox|form|element), \
             value, url, form_data (object of field to value), submit (bool).\n\n\
             Goal: {}",
            goal
        );
        let mut parsed: ParsedGoal = self.ask_json(&prompt).await?;
        parsed
            .metadata
            .insert("rule".to_string(), "model".to_string());
        parsed.metadata.insert("raw".to_string(), goal.to_string());

        self.parse_cache.put(key, parsed.clone());
        Ok(parsed)
    }

    async fn interpret_error(&self, error: &str, action: &Action) -> Result<ErrorInterpretation> {
        let prompt = format!(
            "A browser action failed.\nAction: {}\nError: {}\n\n\
             Reply with JSON: {{\"kind\": \"stale_element|not_found|timeout|unknown\", \
             \"explanation\": string, \"suggestion\": string or null, \"retryable\": bool}}",
            serde_json::to_string(action)?,
            error
        );
        self.ask_json(&prompt).await
    }

    async fn suggest_selectors(&self, description: &str, html: &str) -> Result<Vec<String>> {
        let prompt = format!(
            "Suggest up to 3 CSS selectors for: {}\n\nPage HTML:\n{}\n\n\
             Reply with a JSON array of strings, best first.",
            description, html
        );
        let selectors: Vec<String> = self.ask_json(&prompt).await?;
        Ok(selectors
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect())
    }

    async fn map_value(
        &self,
        label: &str,
        kind: FieldKind,
        name: &str,
        candidates: &[String],
    ) -> Result<Option<String>> {
        let prompt = format!(
            "A form {} group named \"{}\" offers these values: {}.\n\
             Which value does the user mean by \"{}\"? \
             Reply with JSON: {{\"value\": string or null}}",
            kind,
            name,
            serde_json::to_string(candidates)?,
            label
        );

        #[derive(serde::Deserialize)]
        struct Mapped {
            value: Option<String>,
        }
        let mapped: Mapped = self.ask_json(&prompt).await?;
        Ok(mapped.value.filter(|v| candidates.contains(v)))
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.ask(prompt).await
    }
}

// ============================================================================
// Assisted
// ============================================================================

/// Model attempts at a goal parse before the heuristic answer is used
const PARSE_ATTEMPTS: usize = 2;

/// Primary model with a per-call heuristic fallback
pub struct AssistedStrategy {
    primary: Option<Arc<dyn LanguageModel>>,
    fallback: HeuristicStrategy,
}

impl AssistedStrategy {
    pub fn new(primary: Option<Arc<dyn LanguageModel>>) -> Self {
        Self {
            primary,
            fallback: HeuristicStrategy::new(),
        }
    }

    /// Claude when enabled in config, heuristic-only otherwise
    pub fn from_config(config: &LlmConfig) -> Self {
        let primary: Option<Arc<dyn LanguageModel>> = if config.enabled {
            Some(Arc::new(ClaudeStrategy::from_config(config)))
        } else {
            None
        };
        Self::new(primary)
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }
}

#[async_trait]
impl LanguageModel for AssistedStrategy {
    fn name(&self) -> &str {
        self.primary
            .as_ref()
            .map_or("heuristic", |primary| primary.name())
    }

    async fn parse_goal(&self, goal: &str) -> Result<ParsedGoal> {
        let heuristic = self.fallback.parser.parse(goal);
        let Some(primary) = &self.primary else {
            return Ok(heuristic);
        };
        Ok(fail_open_with_retries("parse_goal", || primary.parse_goal(goal), PARSE_ATTEMPTS)
            .await
            .unwrap_or(heuristic))
    }

    async fn interpret_error(&self, error: &str, action: &Action) -> Result<ErrorInterpretation> {
        let Some(primary) = &self.primary else {
            return Ok(interpret_by_text(error, action));
        };
        Ok(fail_open_or(
            "interpret_error",
            || primary.interpret_error(error, action),
            || interpret_by_text(error, action),
        )
        .await)
    }

    async fn suggest_selectors(&self, description: &str, html: &str) -> Result<Vec<String>> {
        let Some(primary) = &self.primary else {
            return Ok(selector_variations(description, html));
        };
        let suggested = fail_open_or(
            "suggest_selectors",
            || primary.suggest_selectors(description, html),
            Vec::new,
        )
        .await;
        if suggested.is_empty() {
            Ok(selector_variations(description, html))
        } else {
            Ok(suggested)
        }
    }

    async fn map_value(
        &self,
        label: &str,
        kind: FieldKind,
        name: &str,
        candidates: &[String],
    ) -> Result<Option<String>> {
        let Some(primary) = &self.primary else {
            return Ok(map_by_similarity(label, name, candidates));
        };
        Ok(fail_open_or(
            "map_value",
            || primary.map_value(label, kind, name, candidates),
            || map_by_similarity(label, name, candidates),
        )
        .await)
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        match &self.primary {
            Some(primary) => primary.complete(prompt).await,
            None => self.fallback.complete(prompt).await,
        }
    }
}

// ============================================================================
// Resolver bridge
// ============================================================================

/// Exposes a [`LanguageModel`] as the resolver's semantic tier
pub struct ModelValueMapper {
    model: Arc<dyn LanguageModel>,
}

impl ModelValueMapper {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl ValueMapper for ModelValueMapper {
    async fn map_value(
        &self,
        label: &str,
        kind: FieldKind,
        name: &str,
        candidates: &[String],
    ) -> Result<Option<String>> {
        self.model.map_value(label, kind, name, candidates).await
    }
}

//! # probe-llm
//!
//! Optional language-model assist for UI-probe.
//!
//! The engine never depends on a model: every operation here has a
//! deterministic answer in [`HeuristicStrategy`], and [`AssistedStrategy`]
//! falls back to it per call when the model fails, times out, or the
//! circuit breaker is open.
//!
//! ## Authentication
//!
//! Credentials come from `CLAUDE_CODE_OAUTH_TOKEN`, then the configured API
//! key variable (`ANTHROPIC_API_KEY` by default).

pub mod auth;
mod cache;
mod circuit_breaker;
mod client;
mod mock;
mod strategy;
mod types;

pub use cache::TtlCache;
pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use client::ClaudeClient;
pub use mock::MockLanguageModel;
pub use strategy::{
    extract_json, interpret_by_text, map_by_similarity, selector_variations, AssistedStrategy,
    ClaudeStrategy, HeuristicStrategy, LanguageModel, ModelValueMapper,
};
pub use types::{Completion, ErrorInterpretation, Model, Usage};

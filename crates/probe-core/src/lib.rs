//! # probe-core
//!
//! Core types for the UI-probe engine.
//!
//! A natural-language testing goal becomes an ordered list of [`Action`]s.
//! The executor runs them against a live page, resolving human-visible
//! labels to selectors against a [`DomSnapshot`] and threading values
//! between steps through an [`ExecutionContext`].
//!
//! ## Core Paradigm
//!
//! - Action lists are immutable once decomposed (optimizing yields a new list)
//! - One run owns one context; nothing is persisted by the engine
//! - Every failure path returns a result object, never a panic

pub mod config;
mod context;
pub mod dom;
mod error;
pub mod fail_open;
mod types;

pub use config::ProbeConfig;
pub use context::ExecutionContext;
pub use dom::{DomElement, DomSnapshot, FormFieldSnapshot, FormSnapshot};
pub use error::{ProbeError, Result};
pub use types::*;

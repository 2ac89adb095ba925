//! Fail-open helpers for optional collaborators
//!
//! The language-model strategy is an assist, never a dependency: when a call
//! fails or stalls, the caller falls back to its deterministic path.
//!
//! DO NOT use fail-open for:
//! - Driver calls (their failures feed retry classification)
//! - Form inference on a page with no forms (a hard error)

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::Result;

/// Run an optional operation; log and swallow any error.
///
/// ```no_run
/// use probe_core::fail_open::fail_open;
/// use probe_core::Result;
///
/// async fn suggest() -> Result<Vec<String>> {
///     Ok(vec!["#email".to_string()])
/// }
///
/// async fn example() {
///     let suggestions = fail_open("suggest_selectors", || suggest()).await;
///     // None when the assist failed
/// }
/// ```
pub async fn fail_open<F, Fut, T>(operation_name: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match f().await {
        Ok(val) => Some(val),
        Err(e) => {
            warn!("{} failed (fail-open): {}", operation_name, e);
            None
        }
    }
}

/// Run the primary operation, using `fallback` when it fails
pub async fn fail_open_or<F, Fut, T, G>(operation_name: &str, f: F, fallback: G) -> T
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
    G: FnOnce() -> T,
{
    match fail_open(operation_name, f).await {
        Some(val) => val,
        None => fallback(),
    }
}

/// Run an optional operation up to `attempts` times, pausing 100ms, 200ms, ...
/// between tries. `None` once every attempt failed.
pub async fn fail_open_with_retries<F, Fut, T>(operation_name: &str, mut f: F, attempts: usize) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        match f().await {
            Ok(val) => return Some(val),
            Err(e) if attempt == attempts => {
                warn!("{} failed after {} attempts (fail-open): {}", operation_name, attempts, e);
            }
            Err(e) => {
                warn!("{} failed (attempt {}/{}): {}", operation_name, attempt, attempts, e);
                tokio::time::sleep(Duration::from_millis(100 * attempt as u64)).await;
            }
        }
    }
    None
}

//! Headless Chrome driver over the DevTools protocol

use crate::driver::{decode_script_value, Driver};
use crate::scripts;
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use probe_core::config::BrowserSettings;
use probe_core::{DomSnapshot, FailureKind, ProbeError, Result};
use serde::de::DeserializeOwned;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

const DEFAULT_SELECTOR_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Active browser session with one tab
pub struct BrowserSession {
    // Keeps the browser process alive for the tab's lifetime
    #[allow(dead_code)]
    browser: Browser,
    tab: Arc<Tab>,
    selector_timeout: Duration,
}

/// Map a CDP failure onto the engine's error classes
fn driver_error(context: &str, selector: &str, err: impl std::fmt::Display) -> ProbeError {
    let message = format!("{} {}: {}", context, selector, err);
    match FailureKind::classify(&message) {
        FailureKind::StaleElement => ProbeError::StaleElement(message),
        FailureKind::NotFound => ProbeError::ElementNotFound(selector.to_string()),
        FailureKind::Timeout => ProbeError::Timeout(message),
        FailureKind::Unknown => ProbeError::Browser(message),
    }
}

impl BrowserSession {
    /// Launch a new browser instance
    ///
    /// # Example
    /// ```no_run
    /// use probe_browser::{BrowserSession, Driver};
    /// use probe_core::config::BrowserSettings;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let session = BrowserSession::launch(&BrowserSettings::default()).await.unwrap();
    ///     session.navigate("https://example.com").await.unwrap();
    /// }
    /// ```
    pub async fn launch(settings: &BrowserSettings) -> Result<Self> {
        info!(
            "Launching browser (headless: {}, size: {}x{})",
            settings.headless, settings.window_width, settings.window_height
        );

        let mut launch_options = LaunchOptions::default_builder()
            .headless(settings.headless)
            .window_size(Some((settings.window_width, settings.window_height)))
            .build()
            .map_err(|e| ProbeError::Browser(format!("Failed to launch browser: {}", e)))?;

        let user_agent_arg = settings
            .user_agent
            .as_ref()
            .map(|ua| format!("--user-agent={}", ua));
        if let Some(ref ua_arg) = user_agent_arg {
            launch_options.args.push(OsStr::new(ua_arg));
        }

        let browser = Browser::new(launch_options)
            .map_err(|e| ProbeError::Browser(format!("Failed to launch browser: {}", e)))?;
        let tab = browser
            .new_tab()
            .map_err(|e| ProbeError::Browser(format!("Failed to create tab: {}", e)))?;
        tab.set_default_timeout(DEFAULT_NAVIGATION_TIMEOUT);

        info!("Browser launched");
        Ok(Self {
            browser,
            tab,
            selector_timeout: DEFAULT_SELECTOR_TIMEOUT,
        })
    }

    /// Attach to a browser started with `--remote-debugging-port`
    pub async fn connect(port: u16) -> Result<Self> {
        info!("Connecting to existing browser on port {}", port);

        let browser = Browser::connect(format!("http://127.0.0.1:{}", port))
            .map_err(|e| ProbeError::Browser(format!("Failed to connect to browser: {}", e)))?;
        let tab = browser
            .new_tab()
            .map_err(|e| ProbeError::Browser(format!("Failed to create tab: {}", e)))?;
        tab.set_default_timeout(DEFAULT_NAVIGATION_TIMEOUT);

        Ok(Self {
            browser,
            tab,
            selector_timeout: DEFAULT_SELECTOR_TIMEOUT,
        })
    }

    /// Per-operation limits: element lookups and page loads
    pub fn with_timeouts(mut self, selector: Duration, navigation: Duration) -> Self {
        self.tab.set_default_timeout(navigation);
        self.selector_timeout = selector;
        self
    }

    pub fn tab(&self) -> &Arc<Tab> {
        &self.tab
    }

    fn find(&self, selector: &str) -> Result<Element<'_>> {
        self.tab
            .wait_for_element_with_custom_timeout(selector, self.selector_timeout)
            .map_err(|_| ProbeError::ElementNotFound(selector.to_string()))
    }

    async fn evaluate_json<T: DeserializeOwned>(&self, script: &str) -> Result<T> {
        decode_script_value(self.evaluate(script).await?)
    }

    /// Set a form control's value through a JS function bound to the element
    fn assign(element: &Element<'_>, selector: &str, function: &str, value: &str) -> Result<()> {
        element
            .call_js_fn(function, vec![serde_json::Value::String(value.to_string())], false)
            .map_err(|e| driver_error("Failed to set value on", selector, e))?;
        Ok(())
    }
}

const CLEAR_VALUE_FN: &str = "function() { this.value = ''; }";

const NOTIFY_FN: &str = r#"function() {
  this.dispatchEvent(new Event('input', { bubbles: true }));
  this.dispatchEvent(new Event('change', { bubbles: true }));
}"#;

const SELECT_OPTION_FN: &str = r#"function(wanted) {
  const options = Array.from(this.options || []);
  const hit = options.find((o) => o.value === wanted)
    || options.find((o) => o.textContent.trim().toLowerCase() === wanted.toLowerCase());
  if (!hit) throw new Error('option not found: ' + wanted);
  this.value = hit.value;
  this.dispatchEvent(new Event('input', { bubbles: true }));
  this.dispatchEvent(new Event('change', { bubbles: true }));
}"#;

#[async_trait]
impl Driver for BrowserSession {
    #[instrument(skip(self))]
    async fn navigate(&self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .map_err(|e| ProbeError::Navigation(format!("Failed to navigate to {}: {}", url, e)))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| ProbeError::Timeout(format!("Navigation timeout for {}: {}", url, e)))?;

        // Hook console errors on every new document
        self.evaluate(scripts::CONSOLE_HOOK_SCRIPT).await?;
        info!("Navigated to {}", url);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn click(&self, selector: &str) -> Result<()> {
        let element = self.find(selector)?;
        element
            .click()
            .map_err(|e| driver_error("Failed to click", selector, e))?;
        Ok(())
    }

    #[instrument(skip(self, value))]
    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        let element = self.find(selector)?;
        element
            .call_js_fn(CLEAR_VALUE_FN, vec![], false)
            .map_err(|e| driver_error("Failed to clear", selector, e))?;
        element
            .click()
            .map_err(|e| driver_error("Failed to focus", selector, e))?;
        element
            .type_into(value)
            .map_err(|e| driver_error("Failed to type into", selector, e))?;
        element
            .call_js_fn(NOTIFY_FN, vec![], false)
            .map_err(|e| driver_error("Failed to notify", selector, e))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn select_option(&self, selector: &str, value: &str) -> Result<()> {
        let element = self.find(selector)?;
        Self::assign(&element, selector, SELECT_OPTION_FN, value)
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()> {
        debug!("Waiting for {} ({:?})", selector, timeout);
        self.tab
            .wait_for_element_with_custom_timeout(selector, timeout)
            .map_err(|_| {
                ProbeError::Timeout(format!(
                    "Timed out after {}ms waiting for {}",
                    timeout.as_millis(),
                    selector
                ))
            })?;
        Ok(())
    }

    async fn element_exists(&self, selector: &str) -> Result<bool> {
        let script = format!(
            "JSON.stringify(document.querySelector({}) !== null)",
            scripts::js_string(selector)
        );
        self.evaluate_json(&script).await
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .tab
            .evaluate(script, false)
            .map_err(|e| ProbeError::Browser(format!("JavaScript evaluation failed: {}", e)))?;
        Ok(result.value.unwrap_or(serde_json::Value::Null))
    }

    #[instrument(skip(self))]
    async fn snapshot(&self) -> Result<DomSnapshot> {
        let snapshot: DomSnapshot = self.evaluate_json(scripts::SNAPSHOT_SCRIPT).await?;
        debug!(
            elements = snapshot.elements.len(),
            forms = snapshot.forms.len(),
            "Captured DOM snapshot"
        );
        Ok(snapshot)
    }

    async fn current_url(&self) -> Result<String> {
        self.evaluate_json(scripts::CURRENT_URL_SCRIPT).await
    }

    async fn page_html(&self) -> Result<String> {
        self.evaluate_json(scripts::PAGE_HTML_SCRIPT).await
    }

    async fn page_text(&self) -> Result<String> {
        self.evaluate_json(scripts::PAGE_TEXT_SCRIPT).await
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| ProbeError::Browser(format!("Screenshot capture failed: {}", e)))
    }

    async fn console_errors(&self) -> Result<Vec<String>> {
        self.evaluate_json(scripts::CONSOLE_ERRORS_SCRIPT).await
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        debug!("BrowserSession dropped, browser will be cleaned up");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_classes() {
        assert!(matches!(
            driver_error("Failed to click", "#go", "Node is detached from document"),
            ProbeError::StaleElement(_)
        ));
        assert!(matches!(
            driver_error("Failed to click", "#go", "No node found"),
            ProbeError::ElementNotFound(sel) if sel == "#go"
        ));
        assert!(matches!(
            driver_error("Failed to click", "#go", "connection closed"),
            ProbeError::Browser(_)
        ));
    }
}

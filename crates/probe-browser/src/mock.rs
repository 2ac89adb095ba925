//! In-memory driver for tests
//!
//! Holds one page at a time as a [`DomSnapshot`], matches selectors against
//! it, and replays scripted failures per operation.

use crate::driver::Driver;
use crate::scripts::{ElementAction, RescueScope};
use crate::selector::select_all;
use async_trait::async_trait;
use parking_lot::Mutex;
use probe_core::{DomSnapshot, ProbeError, Result};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Failure the mock replays instead of performing an operation
#[derive(Debug, Clone, PartialEq)]
pub enum MockFailure {
    Stale,
    NotFound,
    Timeout,
    Other(String),
}

impl MockFailure {
    fn into_error(self, target: &str) -> ProbeError {
        match self {
            Self::Stale => ProbeError::StaleElement(format!(
                "Element {} is detached from the document",
                target
            )),
            Self::NotFound => ProbeError::ElementNotFound(target.to_string()),
            Self::Timeout => ProbeError::Timeout(format!("Timed out waiting for {}", target)),
            Self::Other(message) => ProbeError::Browser(message),
        }
    }
}

/// One recorded driver call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverCall {
    pub op: String,
    pub target: String,
    pub value: Option<String>,
}

impl std::fmt::Display for DriverCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{} {} = {}", self.op, self.target, value),
            None => write!(f, "{} {}", self.op, self.target),
        }
    }
}

#[derive(Default)]
struct MockState {
    page: DomSnapshot,
    routes: HashMap<String, DomSnapshot>,
    click_routes: HashMap<String, String>,
    failures: HashMap<String, VecDeque<MockFailure>>,
    frame_selectors: HashSet<String>,
    stalled: HashSet<String>,
    shadow_selectors: HashSet<String>,
    console: Vec<String>,
    evaluations: VecDeque<serde_json::Value>,
    calls: Vec<DriverCall>,
}

impl MockState {
    fn record(&mut self, op: &str, target: &str, value: Option<&str>) {
        self.calls.push(DriverCall {
            op: op.to_string(),
            target: target.to_string(),
            value: value.map(String::from),
        });
    }

    fn scripted(&mut self, op: &str, target: &str) -> Result<()> {
        match self.failures.get_mut(op).and_then(VecDeque::pop_front) {
            Some(failure) => Err(failure.into_error(target)),
            None => Ok(()),
        }
    }

    fn find(&self, selector: &str) -> Result<usize> {
        select_all(&self.page, selector)
            .first()
            .map(|e| e.index)
            .ok_or_else(|| ProbeError::ElementNotFound(selector.to_string()))
    }

    fn load(&mut self, url: &str) {
        self.page = match self.routes.get(url) {
            Some(page) => page.clone(),
            None => DomSnapshot {
                url: url.to_string(),
                ..DomSnapshot::default()
            },
        };
        self.page.url = url.to_string();
    }

    fn position(&self, index: usize) -> Option<usize> {
        self.page.elements.iter().position(|e| e.index == index)
    }
}

/// Scripted [`Driver`] over an in-memory page
#[derive(Default)]
pub struct MockDriver {
    state: Mutex<MockState>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start on `page`
    pub fn with_page(page: DomSnapshot) -> Self {
        let driver = Self::new();
        driver.route(page.url.clone(), page.clone());
        driver.state.lock().page = page;
        driver
    }

    /// Serve `page` when `url` is navigated to
    pub fn route(&self, url: impl Into<String>, page: DomSnapshot) {
        self.state.lock().routes.insert(url.into(), page);
    }

    /// Clicking `selector` loads `url`
    pub fn route_click(&self, selector: impl Into<String>, url: impl Into<String>) {
        self.state
            .lock()
            .click_routes
            .insert(selector.into(), url.into());
    }

    /// The next calls of `op` fail with `failures`, in order
    pub fn fail_with(&self, op: &str, failures: Vec<MockFailure>) {
        self.state
            .lock()
            .failures
            .entry(op.to_string())
            .or_default()
            .extend(failures);
    }

    /// The next `times` calls of `op` fail with `failure`
    pub fn fail_times(&self, op: &str, failure: MockFailure, times: usize) {
        self.fail_with(op, vec![failure; times]);
    }

    /// Calls of `op` never complete
    pub fn stall(&self, op: &str) {
        self.state.lock().stalled.insert(op.to_string());
    }

    /// `selector` exists only inside an iframe
    pub fn place_in_frame(&self, selector: impl Into<String>) {
        self.state.lock().frame_selectors.insert(selector.into());
    }

    /// `selector` exists only inside a shadow root
    pub fn place_in_shadow_root(&self, selector: impl Into<String>) {
        self.state.lock().shadow_selectors.insert(selector.into());
    }

    pub fn push_console_error(&self, message: impl Into<String>) {
        self.state.lock().console.push(message.into());
    }

    pub fn push_evaluation(&self, value: serde_json::Value) {
        self.state.lock().evaluations.push_back(value);
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.state.lock().calls.clone()
    }

    pub fn calls_to(&self, op: &str) -> Vec<DriverCall> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.op == op)
            .cloned()
            .collect()
    }

    /// Current value of the first element matching `selector`
    pub fn value_of(&self, selector: &str) -> Option<String> {
        let state = self.state.lock();
        select_all(&state.page, selector)
            .first()
            .and_then(|e| e.value.clone())
    }

    pub fn is_checked(&self, selector: &str) -> bool {
        let state = self.state.lock();
        select_all(&state.page, selector)
            .first()
            .is_some_and(|e| e.checked)
    }

    pub fn url(&self) -> String {
        self.state.lock().page.url.clone()
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.record("navigate", url, None);
        state.scripted("navigate", url)?;
        state.load(url);
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.record("click", selector, None);
        state.scripted("click", selector)?;
        let index = state.find(selector)?;

        if let Some(pos) = state.position(index) {
            let elem = state.page.elements[pos].clone();
            if elem.is_checkbox() {
                state.page.elements[pos].checked = !elem.checked;
            } else if elem.is_radio() {
                for other in state.page.elements.iter_mut() {
                    if other.is_radio() && other.name == elem.name {
                        other.checked = other.index == index;
                    }
                }
            }
        }

        if let Some(url) = state.click_routes.get(selector).cloned() {
            state.load(&url);
        }
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.record("fill", selector, Some(value));
        state.scripted("fill", selector)?;
        let index = state.find(selector)?;
        let pos = state
            .position(index)
            .ok_or_else(|| ProbeError::ElementNotFound(selector.to_string()))?;
        let elem = &mut state.page.elements[pos];
        if !elem.is_fillable() {
            return Err(ProbeError::Browser(format!(
                "Element {} is not an editable field",
                selector
            )));
        }
        elem.value = Some(value.to_string());
        Ok(())
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.record("select", selector, Some(value));
        state.scripted("select", selector)?;
        let index = state.find(selector)?;
        let chosen = state
            .page
            .children(index)
            .filter(|o| o.is_option())
            .find(|o| {
                o.value.as_deref() == Some(value) || o.text.trim().eq_ignore_ascii_case(value)
            })
            .map(|o| o.value.clone().unwrap_or_else(|| o.text.clone()))
            .ok_or_else(|| ProbeError::Browser(format!("option not found: {}", value)))?;
        if let Some(pos) = state.position(index) {
            state.page.elements[pos].value = Some(chosen);
        }
        Ok(())
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()> {
        let mut state = self.state.lock();
        state.record("wait_for", selector, None);
        state.scripted("wait_for", selector)?;
        if select_all(&state.page, selector).is_empty() {
            return Err(ProbeError::Timeout(format!(
                "Timed out after {}ms waiting for {}",
                timeout.as_millis(),
                selector
            )));
        }
        Ok(())
    }

    async fn element_exists(&self, selector: &str) -> Result<bool> {
        let mut state = self.state.lock();
        state.record("element_exists", selector, None);
        Ok(!select_all(&state.page, selector).is_empty())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let mut state = self.state.lock();
        state.record("evaluate", &script.chars().take(40).collect::<String>(), None);
        state.scripted("evaluate", "script")?;
        Ok(state
            .evaluations
            .pop_front()
            .unwrap_or(serde_json::Value::Null))
    }

    async fn snapshot(&self) -> Result<DomSnapshot> {
        let mut state = self.state.lock();
        state.record("snapshot", "page", None);
        state.scripted("snapshot", "page")?;
        Ok(state.page.clone())
    }

    async fn current_url(&self) -> Result<String> {
        let stalled = self.state.lock().stalled.contains("current_url");
        if stalled {
            std::future::pending::<()>().await;
        }
        Ok(self.state.lock().page.url.clone())
    }

    async fn page_html(&self) -> Result<String> {
        let state = self.state.lock();
        Ok(render_html(&state.page))
    }

    async fn page_text(&self) -> Result<String> {
        let state = self.state.lock();
        Ok(state
            .page
            .elements
            .iter()
            .map(|e| e.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n"))
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let mut state = self.state.lock();
        state.record("screenshot", "page", None);
        state.scripted("screenshot", "page")?;
        Ok(PNG_MAGIC.to_vec())
    }

    async fn console_errors(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().console.clone())
    }

    async fn act_in(&self, scope: RescueScope, selector: &str, action: &ElementAction) -> Result<bool> {
        let mut state = self.state.lock();
        let op = format!("act_in:{}", scope);
        let value = match action {
            ElementAction::Click => None,
            ElementAction::Fill(v) | ElementAction::Select(v) => Some(v.as_str()),
        };
        state.record(&op, selector, value);
        state.scripted(&op, selector)?;
        let placed = match scope {
            RescueScope::Frames => &state.frame_selectors,
            RescueScope::ShadowRoots => &state.shadow_selectors,
        };
        Ok(placed.contains(selector))
    }
}

/// Flat markup rendering of a snapshot, enough for selector suggestions
fn render_html(page: &DomSnapshot) -> String {
    let mut html = String::new();
    for elem in &page.elements {
        html.push('<');
        html.push_str(&elem.tag);
        for (name, value) in [
            ("id", elem.id.as_deref()),
            ("name", elem.name.as_deref()),
            ("type", elem.input_type.as_deref()),
            ("value", elem.value.as_deref()),
            ("placeholder", elem.placeholder.as_deref()),
        ] {
            if let Some(value) = value {
                html.push_str(&format!(" {}=\"{}\"", name, value));
            }
        }
        for (name, value) in &elem.attributes {
            html.push_str(&format!(" {}=\"{}\"", name, value));
        }
        html.push('>');
        html.push_str(elem.text.trim());
        html.push_str(&format!("</{}>", elem.tag));
    }
    html
}

//! Page analysis and text verification

use crate::driver::Driver;
use probe_core::{DomSnapshot, FormSnapshot, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Clickable or typeable element summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementSummary {
    pub tag: String,
    pub text: Option<String>,
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

/// What a page offers to interact with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiAnalysis {
    pub url: String,
    pub title: String,
    pub forms: Vec<FormSnapshot>,
    pub buttons: Vec<ElementSummary>,
    pub inputs: Vec<ElementSummary>,
    pub links: Vec<ElementSummary>,
}

impl UiAnalysis {
    pub fn from_snapshot(page: &DomSnapshot) -> Self {
        let summary = |e: &probe_core::DomElement| ElementSummary {
            tag: e.tag.clone(),
            text: e.visible_text().map(String::from),
            selector: match e.id.as_deref().filter(|id| !id.is_empty()) {
                Some(id) => format!("#{}", id),
                None => format!("[data-probe-index=\"{}\"]", e.index),
            },
            input_type: e.input_type.clone(),
            name: e.name.clone(),
            href: e.attr("href").map(String::from),
        };

        let buttons = page
            .elements
            .iter()
            .filter(|e| e.is_clickable() && e.tag != "a" && !e.is_checkbox() && !e.is_radio())
            .map(summary)
            .collect();
        let inputs = page
            .elements
            .iter()
            .filter(|e| e.is_form_control())
            .map(summary)
            .collect();
        let links = page
            .elements
            .iter()
            .filter(|e| e.tag == "a")
            .map(summary)
            .collect();

        Self {
            url: page.url.clone(),
            title: page.title.clone(),
            forms: page.forms.clone(),
            buttons,
            inputs,
            links,
        }
    }
}

/// Summarize the current page
#[instrument(skip(driver))]
pub async fn analyze_ui(driver: &dyn Driver) -> Result<UiAnalysis> {
    let snapshot = driver.snapshot().await?;
    let analysis = UiAnalysis::from_snapshot(&snapshot);
    info!(
        forms = analysis.forms.len(),
        buttons = analysis.buttons.len(),
        inputs = analysis.inputs.len(),
        links = analysis.links.len(),
        "Analyzed {}",
        analysis.url
    );
    Ok(analysis)
}

/// Outcome of checking page text against expectations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageVerification {
    pub passed: bool,
    pub missing: Vec<String>,
    pub unexpected_found: Vec<String>,
    pub console_errors: Vec<String>,
}

/// Case-insensitive containment check of `expected` and `unexpected` texts
pub fn check_text(page_text: &str, expected: &[String], unexpected: &[String]) -> (Vec<String>, Vec<String>) {
    let haystack = page_text.to_lowercase();
    let missing = expected
        .iter()
        .filter(|t| !haystack.contains(&t.to_lowercase()))
        .cloned()
        .collect();
    let found = unexpected
        .iter()
        .filter(|t| haystack.contains(&t.to_lowercase()))
        .cloned()
        .collect();
    (missing, found)
}

/// Verify the current page shows every `expected` text and none of the
/// `unexpected` ones
#[instrument(skip(driver))]
pub async fn verify_page(
    driver: &dyn Driver,
    expected: &[String],
    unexpected: &[String],
) -> Result<PageVerification> {
    let text = driver.page_text().await?;
    let (missing, unexpected_found) = check_text(&text, expected, unexpected);
    let console_errors = driver.console_errors().await.unwrap_or_default();

    let passed = missing.is_empty() && unexpected_found.is_empty();
    if passed {
        info!("Page verification passed");
    } else {
        debug!(?missing, ?unexpected_found, "Page verification failed");
    }

    Ok(PageVerification {
        passed,
        missing,
        unexpected_found,
        console_errors,
    })
}

//! Click-target lookup by visible text

use crate::labels::recover_label;
use crate::similarity::similarity;
use crate::tiers::{id_selector, index_selector};
use probe_core::{DomElement, DomSnapshot};

/// Trailing words that name a role rather than the element's text
const ROLE_WORDS: &[&str] = &[
    "button", "btn", "link", "checkbox", "box", "tab", "icon", "radio", "option", "menu", "item",
];

const SUBMIT_WORDS: &[&str] = &["submit", "send", "continue", "sign up", "register", "log in", "login", "sign in"];

/// Role hinted by a trailing word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleHint {
    Button,
    Link,
    Checkbox,
    Radio,
    Any,
}

/// Split "Sign In button" into ("sign in", Button)
pub fn strip_role(target: &str) -> (String, RoleHint) {
    let lowered = target.trim().to_lowercase();
    let mut words: Vec<&str> = lowered.split_whitespace().collect();
    let mut hint = RoleHint::Any;
    while words.len() > 1 {
        let Some(last) = words.last().copied() else { break };
        if !ROLE_WORDS.contains(&last) {
            break;
        }
        if hint == RoleHint::Any {
            hint = match last {
                "button" | "btn" => RoleHint::Button,
                "link" => RoleHint::Link,
                "checkbox" | "box" => RoleHint::Checkbox,
                "radio" | "option" => RoleHint::Radio,
                _ => RoleHint::Any,
            };
        }
        words.pop();
    }
    (words.join(" "), hint)
}

/// Strings that are already selectors rather than human text
pub fn looks_like_selector(target: &str) -> bool {
    let t = target.trim();
    t.starts_with('#')
        || t.starts_with('.')
        || t.starts_with('[')
        || t.starts_with("//")
        || t.contains("[")
        || t.contains(" > ")
        || (t.contains(':') && !t.contains(' '))
}

fn role_fits(elem: &DomElement, hint: RoleHint) -> bool {
    match hint {
        RoleHint::Any => elem.is_clickable(),
        RoleHint::Button => {
            elem.is_submit()
                || elem.tag == "button"
                || (elem.tag == "input" && matches!(elem.declared_type().as_str(), "button" | "reset" | "image"))
                || elem.attr("role") == Some("button")
        }
        RoleHint::Link => elem.tag == "a" || elem.attr("role") == Some("link"),
        RoleHint::Checkbox => elem.is_checkbox() || elem.attr("role") == Some("checkbox"),
        RoleHint::Radio => elem.is_radio(),
    }
}

/// Text a user would use to name this element
fn names(page: &DomSnapshot, elem: &DomElement) -> Vec<String> {
    let mut names = Vec::new();
    if let Some(text) = elem.visible_text() {
        names.push(text.to_string());
    }
    let deep = page.deep_text(elem.index);
    if !deep.is_empty() {
        names.push(deep);
    }
    if elem.is_checkbox() || elem.is_radio() {
        if let Some(label) = recover_label(page, elem.index) {
            names.push(label);
        }
    }
    for attr in ["aria-label", "title", "name", "id", "value"] {
        if let Some(v) = elem.attr(attr).filter(|v| !v.is_empty()) {
            names.push(v.replace(|c: char| c == '-' || c == '_', " "));
        }
    }
    names
}

fn score(page: &DomSnapshot, elem: &DomElement, wanted: &str) -> f64 {
    let best = names(page, elem)
        .iter()
        .map(|name| {
            let name = name.to_lowercase();
            if name == wanted {
                1.0
            } else if name.contains(wanted) || (wanted.contains(name.as_str()) && name.len() > 2) {
                0.8
            } else {
                similarity(&name, wanted) * 0.7
            }
        })
        .fold(0.0, f64::max);
    let submit_bonus = if elem.is_submit() && SUBMIT_WORDS.contains(&wanted) {
        0.5
    } else {
        0.0
    };
    best.max(submit_bonus)
}

/// Primary selector for an element
pub fn element_selector(elem: &DomElement) -> String {
    match elem.id.as_deref().filter(|id| !id.is_empty()) {
        Some(id) => id_selector(id),
        None => index_selector(elem.index),
    }
}

/// Selectors for the elements best matching `target`, best first.
///
/// Selector-looking targets pass through unchanged.
pub fn resolve_clickable(page: &DomSnapshot, target: &str) -> Vec<String> {
    if looks_like_selector(target) {
        return vec![target.trim().to_string()];
    }
    let (wanted, hint) = strip_role(target);
    if wanted.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(f64, &DomElement)> = page
        .elements
        .iter()
        .filter(|e| role_fits(e, hint))
        .map(|e| (score(page, e, &wanted), e))
        .filter(|(s, _)| *s >= 0.5)
        .collect();
    // Stable sort keeps document order among equal scores
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut selectors = Vec::new();
    for (_, elem) in scored.into_iter().take(3) {
        let sel = element_selector(elem);
        if !selectors.contains(&sel) {
            selectors.push(sel);
        }
        let fallback = index_selector(elem.index);
        if !selectors.contains(&fallback) {
            selectors.push(fallback);
        }
    }
    selectors
}

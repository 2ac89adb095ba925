//! Multi-step goal decomposition into ordered atomic actions

use crate::parser::{expected_text, first_clause, GoalParser, VERIFY};
use crate::vocabulary::{
    clean_value, extract_form_data, extract_url, implies_submission, is_submit_like,
    page_path_for, references_prior_value,
};
use once_cell::sync::Lazy;
use probe_core::{Action, ActionKind, Condition};
use regex::Regex;
use tracing::{debug, instrument};

static CONDITIONAL_THEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^\s*if\s+(.+?)\s*,?\s+then\s+(.+?)(?:\s*[,;]?\s+(?:else|otherwise)\s*,?\s+(.+))?\s*$")
        .expect("valid regex")
});

static CONDITIONAL_COMMA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^\s*if\s+(.+?)\s*,\s*(.+?)(?:\s*[,;]?\s+(?:else|otherwise)\s*,?\s+(.+))?\s*$")
        .expect("valid regex")
});

static SEQUENCE_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:\s*[,;.]\s*(?:and\s+)?(?:then|next|after\s+that|afterwards|finally)|\s+(?:and\s+)?(?:then|after\s+that|afterwards))\b,?\s*")
        .expect("valid regex")
});

static LEADING_ORDINAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:first(?:ly)?|to\s+start)\s*,?\s+").expect("valid regex")
});

static CLICK_SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:click|press|tap|hit)(?:\s+on)?\s+(?:the\s+)?(.+?)(?:\s*,|\s*;|\s+and\b|$)")
        .expect("valid regex")
});

static CHECK_SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:check|tick)\s+(?:the\s+)?(.+?\s+(?:checkbox|check\s+box|box))\b")
        .expect("valid regex")
});

static ACCEPT_SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:accept|agree\s+to)\s+(?:the\s+)?(terms(?:\s+(?:and|&)\s+conditions)?|conditions|privacy\s+policy|policy)\b")
        .expect("valid regex")
});

static SUBMIT_SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:submit|send)\b(?:\s+(?:the\s+)?(?:form|message|request|application))?")
        .expect("valid regex")
});

static SELECT_SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(?:select|choose|pick)\s+(?:"([^"]+)"|'([^']+)'|(.+?))\s+(?:from|in)\s+(?:the\s+)?(.+?)(?:\s+(?:dropdown|menu|list|select))?(?:\s*,|\s*;|\s+and\b|$)"#)
        .expect("valid regex")
});

static WAIT_DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bwait\s+(?:for\s+)?(\d+)\s*(ms|milliseconds?|s|secs?|seconds?)\b")
        .expect("valid regex")
});

static WAIT_FOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bwait\s+for\s+(?:the\s+)?(.+?)(?:\s+to\s+(?:appear|load|be\s+visible))?(?:\s*,|\s*;|\s+and\b|$)")
        .expect("valid regex")
});

static SHOULD_SEE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bshould\s+(?:see|show|display)\s+(.+)$").expect("valid regex")
});

/// Interaction found inside a phrase, keyed by its byte span
struct Span {
    start: usize,
    end: usize,
    action: Action,
}

/// Splits goals into an ordered action list.
///
/// Three shapes are recognised: explicit sequences ("then", "next",
/// "after that"), conditionals ("if X then Y else Z"), and implicit
/// composites whose actions follow the canonical order navigation, fill,
/// interactions, assertion.
pub struct WorkflowDecomposer {
    parser: GoalParser,
}

impl Default for WorkflowDecomposer {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowDecomposer {
    pub fn new() -> Self {
        Self {
            parser: GoalParser::new(),
        }
    }

    /// Decompose `goal` into actions. An empty goal yields no actions.
    #[instrument(skip(self), level = "debug")]
    pub fn decompose(&self, goal: &str) -> Vec<Action> {
        let goal = goal.trim();
        if goal.is_empty() {
            return Vec::new();
        }

        if let Some(conditional) = self.conditional(goal) {
            return vec![conditional];
        }

        let phrases = split_phrases(goal);
        debug!(count = phrases.len(), "Split goal into phrases");

        let mut actions: Vec<Action> = Vec::new();
        let mut phrase_of: Vec<usize> = Vec::new();
        for (idx, phrase) in phrases.iter().enumerate() {
            let has_navigation = actions.iter().any(|a| a.kind == ActionKind::Navigate);
            for action in self.phrase_actions(phrase, has_navigation) {
                actions.push(action);
                phrase_of.push(idx);
            }
        }

        insert_auto_submit(goal, &mut actions, &mut phrase_of);
        link_stored_values(&phrases, &mut actions, &phrase_of);
        actions
    }

    fn conditional(&self, goal: &str) -> Option<Action> {
        let caps = CONDITIONAL_THEN
            .captures(goal)
            .or_else(|| CONDITIONAL_COMMA.captures(goal))?;
        let predicate = clean_value(&caps[1]);
        let then_branch = self.decompose(&caps[2]);
        let else_branch = caps
            .get(3)
            .map(|m| self.decompose(m.as_str()))
            .unwrap_or_default();
        Some(Action::conditional(Condition {
            predicate,
            then_branch,
            else_branch,
        }))
    }

    /// Actions for a single marker-delimited phrase, in canonical order
    fn phrase_actions(&self, phrase: &str, has_navigation: bool) -> Vec<Action> {
        let mut actions = Vec::new();
        let verify_claim = VERIFY.captures(phrase).map(|caps| caps[1].to_string());

        if let Some(url) = extract_url(phrase) {
            actions.push(Action::navigate(url));
        } else if !has_navigation {
            if let Some(path) = page_path_for(phrase) {
                actions.push(Action::navigate(path).inferred());
            }
        }

        if verify_claim.is_none() {
            let form = extract_form_data(phrase);
            if !form.is_empty() {
                let mut fill = Action::fill(form.data);
                if let Some(first) = form.generated.first() {
                    fill = fill.store_as(format!("generated_{}", first));
                }
                actions.push(fill);
            }
        }

        actions.extend(interactions(phrase).into_iter().map(|span| span.action));

        if let Some(claim) = verify_claim {
            actions.push(Action::assert_text(expected_text(&claim)));
        } else if let Some(caps) = SHOULD_SEE.captures(phrase) {
            actions.push(Action::assert_text(expected_text(&caps[1])));
        }

        if actions.is_empty() {
            let parsed = self.parser.parse(phrase);
            debug!(phrase, rule = ?parsed.metadata.get("rule"), "Phrase fell back to parser");
            actions = GoalParser::to_actions(&parsed)
                .into_iter()
                .filter(|a| !a.inferred)
                .collect();
        }
        actions
    }
}

/// Split on explicit sequence markers, preserving phrase order
fn split_phrases(goal: &str) -> Vec<String> {
    let goal = LEADING_ORDINAL.replace(goal, "");
    SEQUENCE_MARKER
        .split(&goal)
        .map(|p| p.trim().trim_end_matches('.').trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Clicks, selects and waits in textual order; overlapping matches keep the earliest
fn interactions(phrase: &str) -> Vec<Span> {
    let mut spans = Vec::new();

    for caps in CLICK_SPAN.captures_iter(phrase) {
        let whole = &caps[0];
        let start = caps.get(0).map_or(0, |m| m.start());
        let target = first_clause(&caps[1]);
        if !target.is_empty() {
            spans.push(Span {
                start,
                end: start + whole.len(),
                action: Action::click(target),
            });
        }
    }
    for caps in CHECK_SPAN.captures_iter(phrase) {
        if let Some(m) = caps.get(0) {
            spans.push(Span {
                start: m.start(),
                end: m.end(),
                action: Action::click(clean_value(&caps[1])),
            });
        }
    }
    for caps in ACCEPT_SPAN.captures_iter(phrase) {
        if let Some(m) = caps.get(0) {
            let subject = caps[1].to_lowercase();
            let target = if subject.starts_with("terms") || subject == "conditions" {
                "terms checkbox".to_string()
            } else {
                format!("{} checkbox", subject)
            };
            spans.push(Span {
                start: m.start(),
                end: m.end(),
                action: Action::click(target),
            });
        }
    }
    for m in SUBMIT_SPAN.find_iter(phrase) {
        spans.push(Span {
            start: m.start(),
            end: m.end(),
            action: Action::click("submit button"),
        });
    }
    for caps in SELECT_SPAN.captures_iter(phrase) {
        let Some(m) = caps.get(0) else { continue };
        let label = caps
            .get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .map(|v| clean_value(v.as_str()))
            .unwrap_or_default();
        spans.push(Span {
            start: m.start(),
            end: m.end(),
            action: Action::select(clean_value(&caps[4]), label),
        });
    }
    for caps in WAIT_DURATION.captures_iter(phrase) {
        let Some(m) = caps.get(0) else { continue };
        let amount: u64 = caps[1].parse().unwrap_or(0);
        let ms = if caps[2].to_lowercase().starts_with('m') {
            amount
        } else {
            amount.saturating_mul(1000)
        };
        spans.push(Span {
            start: m.start(),
            end: m.end(),
            action: Action::wait_ms(ms),
        });
    }
    for caps in WAIT_FOR.captures_iter(phrase) {
        let Some(m) = caps.get(0) else { continue };
        let target = clean_value(&caps[1]);
        if target.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            continue;
        }
        spans.push(Span {
            start: m.start(),
            end: m.end(),
            action: Action::wait_for_selector(target),
        });
    }

    spans.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
    let mut kept: Vec<Span> = Vec::new();
    for span in spans {
        if kept.last().is_some_and(|prev| span.start < prev.end) {
            continue;
        }
        kept.push(span);
    }
    kept
}

/// Insert a submit click after the last fill when the goal implies one and none was declared
fn insert_auto_submit(goal: &str, actions: &mut Vec<Action>, phrase_of: &mut Vec<usize>) {
    if !implies_submission(goal) {
        return;
    }
    let declared = actions.iter().any(|a| {
        a.kind == ActionKind::Click && a.target.as_deref().is_some_and(is_submit_like)
    });
    if declared {
        return;
    }
    if let Some(last_fill) = actions.iter().rposition(|a| a.kind == ActionKind::Fill) {
        debug!(after = last_fill, "Auto-inserting submit");
        actions.insert(last_fill + 1, Action::click("submit button").inferred());
        let phrase = phrase_of[last_fill];
        phrase_of.insert(last_fill + 1, phrase);
    }
}

/// Link steps whose phrase says "that" to the nearest earlier `store_as`
fn link_stored_values(phrases: &[String], actions: &mut [Action], phrase_of: &[usize]) {
    for idx in 0..actions.len() {
        let phrase = &phrases[phrase_of[idx]];
        let reference_text = match VERIFY.captures(phrase) {
            Some(caps) => caps[1].to_string(),
            None => phrase.clone(),
        };
        if !references_prior_value(&reference_text) || actions[idx].store_as.is_some() {
            continue;
        }
        let source = actions[..idx]
            .iter()
            .rev()
            .find_map(|a| a.store_as.clone());
        if let Some(key) = source {
            debug!(step = idx, key = %key, "Linked step to stored value");
            actions[idx].use_stored = Some(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decompose(goal: &str) -> Vec<Action> {
        WorkflowDecomposer::new().decompose(goal)
    }

    fn kinds(actions: &[Action]) -> Vec<ActionKind> {
        actions.iter().map(|a| a.kind).collect()
    }

    #[test]
    fn test_signup_scenario() {
        let actions = decompose(
            "Sign up for a new account with email test@example.com and password SecurePass123, then accept terms and submit",
        );
        assert_eq!(actions.len(), 4, "{:#?}", actions);

        assert_eq!(actions[0].kind, ActionKind::Navigate);
        assert!(actions[0].value.as_deref().is_some_and(|u| u.contains("signup")));

        assert_eq!(actions[1].kind, ActionKind::Fill);
        assert_eq!(
            actions[1].data.keys().collect::<Vec<_>>(),
            vec!["email", "password"]
        );
        assert_eq!(actions[1].data["email"], "test@example.com");

        assert_eq!(actions[2].kind, ActionKind::Click);
        assert_eq!(actions[2].target.as_deref(), Some("terms checkbox"));

        assert_eq!(actions[3].kind, ActionKind::Click);
        assert!(is_submit_like(actions[3].target.as_deref().unwrap_or("")));
    }

    #[test]
    fn test_sequence_preserves_phrase_order() {
        let actions = decompose(
            "go to https://shop.test, then click the Cart link, after that wait 2 seconds, next verify that the page shows Your cart",
        );
        assert_eq!(
            kinds(&actions),
            vec![
                ActionKind::Navigate,
                ActionKind::Click,
                ActionKind::Wait,
                ActionKind::Assert
            ]
        );
        assert_eq!(actions[1].target.as_deref(), Some("Cart link"));
        assert_eq!(actions[2].value.as_deref(), Some("2000"));
        assert_eq!(actions[3].value.as_deref(), Some("Your cart"));
    }

    #[test]
    fn test_implicit_composite_canonical_order() {
        let actions = decompose(
            "verify that the page shows Thanks after you log in at https://app.test/login with email a@b.co and password Pw123456",
        );
        // verification phrase: only the assertion and the URL are taken
        assert_eq!(kinds(&actions)[0], ActionKind::Navigate);
        assert_eq!(actions.last().map(|a| a.kind), Some(ActionKind::Assert));
    }

    #[test]
    fn test_auto_submit_inserted_after_last_fill() {
        let actions = decompose("Log in with email a@b.co and password Pw123456");
        assert_eq!(
            kinds(&actions),
            vec![ActionKind::Navigate, ActionKind::Fill, ActionKind::Click]
        );
        assert!(actions[2].inferred);
        assert_eq!(actions[2].target.as_deref(), Some("submit button"));
    }

    #[test]
    fn test_no_auto_submit_without_submission_wording() {
        let actions = decompose("fill the name field with Bob");
        assert_eq!(kinds(&actions), vec![ActionKind::Fill]);
    }

    #[test]
    fn test_explicit_url_suppresses_inferred_page() {
        let actions = decompose(
            "go to http://localhost:3000/auth, then sign in with email a@b.co and password Pw123456",
        );
        let navigations: Vec<_> = actions
            .iter()
            .filter(|a| a.kind == ActionKind::Navigate)
            .collect();
        assert_eq!(navigations.len(), 1);
        assert_eq!(navigations[0].value.as_deref(), Some("http://localhost:3000/auth"));
    }

    #[test]
    fn test_conditional_goal() {
        let actions =
            decompose("if the cookie banner is visible then click Accept else click Continue");
        assert_eq!(actions.len(), 1);
        let condition = actions[0].condition.as_ref().expect("condition");
        assert_eq!(condition.predicate, "the cookie banner is visible");
        assert_eq!(condition.then_branch[0].target.as_deref(), Some("Accept"));
        assert_eq!(condition.else_branch[0].target.as_deref(), Some("Continue"));
    }

    #[test]
    fn test_data_linking_scans_backward() {
        let actions = decompose(
            "register with a random email and password Secret99, then log in with that email and password Secret99",
        );
        let stored = actions
            .iter()
            .position(|a| a.store_as.as_deref() == Some("generated_email"))
            .expect("generating step");
        let linked = actions
            .iter()
            .position(|a| a.use_stored.as_deref() == Some("generated_email"))
            .expect("linked step");
        assert!(linked > stored);
    }

    #[test]
    fn test_that_without_producer_stays_unlinked() {
        let actions = decompose("click the Save button, then verify that it worked");
        assert!(actions.iter().all(|a| a.use_stored.is_none()));
    }

    #[test]
    fn test_select_and_check_spans() {
        let actions =
            decompose("select Canada from the country dropdown and check the newsletter checkbox");
        assert_eq!(kinds(&actions), vec![ActionKind::Select, ActionKind::Click]);
        assert_eq!(actions[0].target.as_deref(), Some("country"));
        assert_eq!(actions[0].value.as_deref(), Some("Canada"));
        assert_eq!(actions[1].target.as_deref(), Some("newsletter checkbox"));
    }

    #[test]
    fn test_inferred_steps_are_marked_in_json() {
        let actions = decompose("Log in with email a@b.co and password Pw123456");
        let json = serde_json::to_value(&actions).unwrap();
        assert_eq!(json[0]["inferred"], true);
        assert_eq!(json[0]["value"], "/login");
        assert!(json[1].get("inferred").is_none());
    }

    #[test]
    fn test_empty_goal() {
        assert!(decompose("").is_empty());
        assert!(decompose("   ").is_empty());
    }

    #[test]
    fn test_unrecognised_phrase_falls_back_to_parser() {
        let actions = decompose("do something unusual");
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind, ActionKind::Fill);
        assert_eq!(actions[0].value.as_deref(), Some("do something unusual"));
    }
}

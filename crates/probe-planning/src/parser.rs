//! Natural-language goal to a single structured intent

use crate::rules::{Rule, RuleTable};
use crate::vocabulary::{
    clean_value, extract_form_data, extract_url, implies_submission, page_path_for,
    split_role_word,
};
use once_cell::sync::Lazy;
use probe_core::{Action, GoalAction, ParsedGoal, TargetType};
use regex::Regex;
use tracing::debug;

static NAV_VERB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:please\s+)?(?:go\s+to|navigate(?:\s+to)?|browse\s+to|head\s+to|open|visit|load)\b")
        .expect("valid regex")
});

static CLICK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:please\s+)?(?:click|press|tap|hit)(?:\s+on)?\s+(?:the\s+)?(.+)$")
        .expect("valid regex")
});

static CHECK_BOX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:please\s+)?(?:check|tick)\s+(?:the\s+)?(.+?\s+(?:checkbox|check\s+box|box))\b")
        .expect("valid regex")
});

static FORM_VERB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:fill|complete|enter|type|submit|sign\s*up|register|log\s*in|sign\s*in|subscribe)\b")
        .expect("valid regex")
});

static FORM_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bthe\s+([a-z][a-z -]*?)\s+form\b").expect("valid regex")
});

pub(crate) static VERIFY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:please\s+)?(?:and\s+)?(?:verify|check\s+(?:that|if|whether)|assert|ensure|confirm\s+that|make\s+sure|expect)\b\s*(?:that\s+)?(.*)$")
        .expect("valid regex")
});

static QUOTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([^"]+)"|'([^']+)'"#).expect("valid regex"));

static SHOWS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:shows?|displays?|contains?|says?|reads?|see|includes?)\s+(?:the\s+text\s+|a\s+|an\s+)?(.+)$")
        .expect("valid regex")
});

static IS_SHOWN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:the\s+)?(.+?)\s+(?:is|are)\s+(?:displayed|shown|visible|present)$")
        .expect("valid regex")
});

/// Cut a capture at the first clause boundary so one intent stays one intent
pub(crate) fn first_clause(text: &str) -> String {
    let lower = text.to_lowercase();
    let end = [" and ", " then ", ",", ";"]
        .iter()
        .filter_map(|sep| lower.find(sep))
        .min()
        .unwrap_or(text.len());
    clean_value(&text[..end])
}

/// Text an assertion should find, pulled from a verification phrase
pub(crate) fn expected_text(claim: &str) -> String {
    let claim = claim.trim();
    if let Some(caps) = QUOTED.captures(claim) {
        if let Some(m) = caps.get(1).or_else(|| caps.get(2)) {
            return m.as_str().to_string();
        }
    }
    if let Some(caps) = SHOWS.captures(claim) {
        return clean_value(&caps[1]);
    }
    let claim = clean_value(claim);
    if let Some(caps) = IS_SHOWN.captures(&claim) {
        return caps[1].trim().to_string();
    }
    claim
}

fn is_navigation(text: &str) -> bool {
    NAV_VERB.is_match(text) && (extract_url(text).is_some() || page_path_for(text).is_some())
}

fn parse_navigation(text: &str) -> ParsedGoal {
    let mut goal = ParsedGoal::new(GoalAction::Navigate);
    goal.url = extract_url(text).or_else(|| page_path_for(text));
    goal.target = goal.url.clone();
    goal.target_type = Some(TargetType::Page);
    goal
}

fn is_click(text: &str) -> bool {
    CLICK.is_match(text) || CHECK_BOX.is_match(text)
}

fn parse_click(text: &str) -> ParsedGoal {
    let mut goal = ParsedGoal::new(GoalAction::Click);
    if let Some(caps) = CHECK_BOX.captures(text) {
        goal.target = Some(clean_value(&caps[1]));
        goal.target_type = Some(TargetType::Checkbox);
        return goal;
    }
    if let Some(caps) = CLICK.captures(text) {
        let target = first_clause(&caps[1]);
        let (_, role) = split_role_word(&target);
        goal.target_type = Some(role.unwrap_or(TargetType::Button));
        goal.target = Some(target);
    }
    goal
}

fn is_form(text: &str) -> bool {
    FORM_VERB.is_match(text)
}

fn parse_form(text: &str) -> ParsedGoal {
    let form = extract_form_data(text);
    let submit = implies_submission(text);
    let mut goal = ParsedGoal::new(if form.is_empty() && submit {
        GoalAction::Submit
    } else {
        GoalAction::Fill
    });
    goal.url = extract_url(text);
    if let Some(caps) = FORM_NAME.captures(text) {
        goal.target = Some(caps[1].trim().to_string());
        goal.target_type = Some(TargetType::Form);
    }
    if !form.generated.is_empty() {
        goal.metadata
            .insert("generated".to_string(), form.generated.join(","));
    }
    if !form.referenced.is_empty() {
        goal.metadata
            .insert("referenced".to_string(), form.referenced.join(","));
    }
    goal.form_data = form.data;
    goal.submit = submit;
    goal
}

fn is_verify(text: &str) -> bool {
    VERIFY.is_match(text)
}

fn parse_verify(text: &str) -> ParsedGoal {
    let mut goal = ParsedGoal::new(GoalAction::Verify);
    let claim = VERIFY
        .captures(text)
        .map(|caps| caps[1].to_string())
        .unwrap_or_default();
    goal.value = Some(expected_text(&claim));
    goal.target_type = Some(TargetType::Text);
    goal
}

fn parse_fallback(text: &str) -> ParsedGoal {
    let mut goal = ParsedGoal::new(GoalAction::Fill);
    goal.value = Some(text.trim().to_string());
    goal
}

/// Regex-backed classifier for single-intent goals.
///
/// Precedence is the rule order: navigation, click, form, verify. Anything
/// else degrades to a generic fill tagged `rule = fallback`.
pub struct GoalParser {
    rules: RuleTable<ParsedGoal>,
}

impl Default for GoalParser {
    fn default() -> Self {
        Self::new()
    }
}

impl GoalParser {
    pub fn new() -> Self {
        Self {
            rules: RuleTable::new(vec![
                Rule::new("navigation", is_navigation, parse_navigation),
                Rule::new("click", is_click, parse_click),
                Rule::new("form", is_form, parse_form),
                Rule::new("verify", is_verify, parse_verify),
            ]),
        }
    }

    /// Classify `goal`. Never fails.
    pub fn parse(&self, goal: &str) -> ParsedGoal {
        let (rule, mut parsed) = self
            .rules
            .apply(goal)
            .unwrap_or_else(|| ("fallback", parse_fallback(goal)));
        parsed.metadata.insert("rule".to_string(), rule.to_string());
        parsed.metadata.insert("raw".to_string(), goal.to_string());
        debug!(rule, action = %parsed.action, "Parsed goal");
        parsed
    }

    /// Rule names in precedence order
    pub fn rule_names(&self) -> Vec<&'static str> {
        let mut names = self.rules.names();
        names.push("fallback");
        names
    }

    /// Expand one intent into the actions that carry it out
    pub fn to_actions(parsed: &ParsedGoal) -> Vec<Action> {
        match parsed.action {
            GoalAction::Navigate => parsed
                .url
                .iter()
                .map(|url| Action::navigate(url.clone()))
                .collect(),
            GoalAction::Click => parsed
                .target
                .iter()
                .map(|target| Action::click(target.clone()))
                .collect(),
            GoalAction::Submit => vec![Action::click("submit button")],
            GoalAction::Verify => parsed
                .value
                .iter()
                .map(|expected| Action::assert_text(expected.clone()))
                .collect(),
            GoalAction::Fill => {
                let mut actions = Vec::new();
                if let Some(url) = &parsed.url {
                    actions.push(Action::navigate(url.clone()));
                }
                let mut fill = Action::fill(parsed.form_data.clone());
                if let Some(target) = &parsed.target {
                    fill = fill.with_target(target.clone());
                }
                if parsed.form_data.is_empty() {
                    // Empty data means "fill the best-matching form with synthesized values"
                    if let Some(raw) = &parsed.value {
                        fill = fill.with_value(raw.clone()).with_description(format!("Fill form for: {}", raw));
                    }
                }
                if let Some(first) = parsed
                    .metadata
                    .get("generated")
                    .and_then(|keys| keys.split(',').next())
                {
                    fill = fill.store_as(format!("generated_{}", first));
                }
                actions.push(fill);
                if parsed.submit {
                    actions.push(Action::click("submit button").inferred());
                }
                actions
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_core::ActionKind;

    fn parse(goal: &str) -> ParsedGoal {
        GoalParser::new().parse(goal)
    }

    #[test]
    fn test_navigation_rule() {
        let goal = parse("Go to http://localhost:8081/test/forms");
        assert_eq!(goal.action, GoalAction::Navigate);
        assert_eq!(goal.url.as_deref(), Some("http://localhost:8081/test/forms"));
        assert_eq!(goal.metadata["rule"], "navigation");
    }

    #[test]
    fn test_navigation_beats_form() {
        // "login" in the URL would also satisfy the form rule
        let goal = parse("open https://example.com/login and log in");
        assert_eq!(goal.action, GoalAction::Navigate);
        assert_eq!(
            GoalParser::new().rules.matching("open https://example.com/login and log in"),
            vec!["navigation", "form"]
        );
    }

    #[test]
    fn test_click_rule() {
        let goal = parse("Click the Sign In button and wait");
        assert_eq!(goal.action, GoalAction::Click);
        assert_eq!(goal.target.as_deref(), Some("Sign In button"));
        assert_eq!(goal.target_type, Some(TargetType::Button));

        let goal = parse("check the newsletter checkbox");
        assert_eq!(goal.action, GoalAction::Click);
        assert_eq!(goal.target.as_deref(), Some("newsletter checkbox"));
        assert_eq!(goal.target_type, Some(TargetType::Checkbox));
    }

    #[test]
    fn test_form_rule() {
        let goal = parse("Log in with email admin@example.com and password hunter22");
        assert_eq!(goal.action, GoalAction::Fill);
        assert!(goal.submit);
        assert_eq!(goal.form_data["email"], "admin@example.com");
        assert_eq!(goal.form_data["password"], "hunter22");

        let goal = parse("submit the contact form");
        assert_eq!(goal.action, GoalAction::Submit);
        assert_eq!(goal.target.as_deref(), Some("contact"));
        assert_eq!(goal.target_type, Some(TargetType::Form));
    }

    #[test]
    fn test_verify_rule() {
        let goal = parse("verify that the page shows Welcome back");
        assert_eq!(goal.action, GoalAction::Verify);
        assert_eq!(goal.value.as_deref(), Some("Welcome back"));

        let goal = parse("make sure 'Order placed' is displayed");
        assert_eq!(goal.value.as_deref(), Some("Order placed"));

        let goal = parse("ensure the success banner is visible");
        assert_eq!(goal.value.as_deref(), Some("success banner"));
    }

    #[test]
    fn test_fallback_never_fails() {
        for text in ["", "   ", "do a barrel roll", "😀"] {
            let goal = parse(text);
            assert!(goal.is_fallback(), "{:?}", text);
            assert_eq!(goal.action, GoalAction::Fill);
            assert_eq!(goal.metadata["raw"], text);
        }
    }

    #[test]
    fn test_to_actions_for_form_goal() {
        let parsed = parse("register with a random email and password Secret99");
        let actions = GoalParser::to_actions(&parsed);
        let kinds: Vec<_> = actions.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![ActionKind::Fill, ActionKind::Click]);
        assert_eq!(actions[0].store_as.as_deref(), Some("generated_email"));
        assert!(actions[1].inferred);
    }

    #[test]
    fn test_rule_names_in_precedence_order() {
        assert_eq!(
            GoalParser::new().rule_names(),
            vec!["navigation", "click", "form", "verify", "fallback"]
        );
    }
}

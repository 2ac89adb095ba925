//! Executable steps and the selector queue each one works through

use once_cell::sync::Lazy;
use probe_browser::ElementAction;
use probe_core::FieldType;
use regex::Regex;
use std::collections::VecDeque;
use std::time::Duration;
use url::Url;

static PRESENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:the\s+)?(.+?)\s+(?:is|are)\s+(not\s+)?(?:visible|shown|present|displayed|there)\s*$",
    )
    .expect("valid regex")
});

static EXISTENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:the\s+)?(.+?)\s+(exists|appears|does\s+not\s+exist|doesn't\s+exist)\s*$")
        .expect("valid regex")
});

/// One driver-level unit of work. A multi-field fill expands to several.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Navigate {
        url: String,
    },
    Click {
        target: String,
    },
    /// Put `value` into the field called `key`. `selector` is set when form
    /// inference already located it.
    Field {
        key: String,
        value: String,
        selector: Option<String>,
        field_type: Option<FieldType>,
    },
    Select {
        target: String,
        label: String,
    },
    Assert {
        expected: String,
    },
    Pause(Duration),
    WaitFor {
        selector: String,
    },
}

impl Step {
    /// Steps that act on an element have selectors to work through
    pub fn is_targeted(&self) -> bool {
        matches!(
            self,
            Self::Click { .. } | Self::Field { .. } | Self::Select { .. }
        )
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Navigate { url } => format!("navigate to {}", url),
            Self::Click { target } => format!("click {}", target),
            Self::Field { key, .. } => format!("fill {}", key),
            Self::Select { target, label } => format!("select {} in {}", label, target),
            Self::Assert { expected } => format!("verify {}", expected),
            Self::Pause(d) => format!("wait {}ms", d.as_millis()),
            Self::WaitFor { selector } => format!("wait for {}", selector),
        }
    }
}

/// What to do with the element once located
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    Click,
    Fill(String),
    /// Choose the option with this value on the located `<select>`
    Select(String),
    /// Element is already in the requested state
    Noop,
}

impl Interaction {
    /// Equivalent in-page action for rescue scripts
    pub fn rescue_action(&self) -> Option<ElementAction> {
        match self {
            Self::Click => Some(ElementAction::Click),
            Self::Fill(v) => Some(ElementAction::Fill(v.clone())),
            Self::Select(v) => Some(ElementAction::Select(v.clone())),
            Self::Noop => None,
        }
    }
}

/// Selectors located for a step plus the interaction they support
#[derive(Debug, Clone, PartialEq)]
pub struct Located {
    pub selectors: Vec<String>,
    pub interaction: Interaction,
}

/// Selector queue for one step across its attempts.
///
/// Starts unresolved. Locating loads a queue, [`advance`](Self::advance)
/// moves to the next candidate and running out resets to unresolved so the
/// next attempt locates again against a fresh snapshot.
#[derive(Debug, Default)]
pub struct Targeting {
    queue: VecDeque<String>,
    current: Option<String>,
    interaction: Option<Interaction>,
    attempted: Vec<String>,
}

impl Targeting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_resolved(&self) -> bool {
        self.current.is_some() && self.interaction.is_some()
    }

    pub fn load(&mut self, located: Located) {
        self.queue = located.selectors.into();
        self.current = self.queue.pop_front();
        self.interaction = Some(located.interaction);
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn interaction(&self) -> Option<&Interaction> {
        self.interaction.as_ref()
    }

    /// Remember that `selector` was tried
    pub fn record(&mut self, selector: &str) {
        if !self.attempted.iter().any(|s| s == selector) {
            self.attempted.push(selector.to_string());
        }
    }

    /// Move to the next queued selector. Returns false, and drops back to
    /// unresolved, when the queue is empty.
    pub fn advance(&mut self) -> bool {
        match self.queue.pop_front() {
            Some(next) => {
                self.current = Some(next);
                true
            }
            None => {
                self.current = None;
                self.interaction = None;
                false
            }
        }
    }

    /// Put suggested selectors ahead of the queue and switch to the first
    /// one not tried yet
    pub fn substitute(&mut self, suggestions: Vec<String>) -> bool {
        let fresh: Vec<String> = suggestions
            .into_iter()
            .filter(|s| !self.attempted.contains(s))
            .collect();
        if fresh.is_empty() || self.interaction.is_none() {
            return false;
        }
        for selector in fresh.into_iter().rev() {
            self.queue.push_front(selector);
        }
        self.advance()
    }

    pub fn attempted(&self) -> &[String] {
        &self.attempted
    }

    pub fn into_attempted(self) -> Vec<String> {
        self.attempted
    }
}

/// Whether a fill value asks for a toggle to be on
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "yes" | "on" | "checked" | "check" | "1" | "y"
    )
}

pub fn is_falsy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "false" | "no" | "off" | "unchecked" | "uncheck" | "0" | "n"
    )
}

/// Presence test parsed from a conditional predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presence {
    pub subject: String,
    pub expected: bool,
}

/// "the cookie banner is visible" ⇒ subject "cookie banner", expected present.
/// Anything else tests for the whole predicate as page text.
pub fn parse_predicate(predicate: &str) -> Presence {
    if let Some(caps) = PRESENCE.captures(predicate) {
        return Presence {
            subject: caps[1].trim().to_string(),
            expected: caps.get(2).is_none(),
        };
    }
    if let Some(caps) = EXISTENCE.captures(predicate) {
        let verb = caps[2].to_lowercase();
        return Presence {
            subject: caps[1].trim().to_string(),
            expected: !verb.contains("not") && !verb.contains("n't"),
        };
    }
    Presence {
        subject: predicate.trim().to_string(),
        expected: true,
    }
}

/// Resolve a navigation target against the current page.
///
/// Absolute URLs pass through; relative ones need a parseable base.
pub fn join_url(base: &str, target: &str) -> String {
    // "localhost:3000/x" parses with "localhost" as its scheme
    if target.to_lowercase().starts_with("localhost") {
        return format!("http://{}", target);
    }
    if Url::parse(target).is_ok() {
        return target.to_string();
    }
    match Url::parse(base).and_then(|b| b.join(target)) {
        Ok(joined) if !joined.cannot_be_a_base() => joined.to_string(),
        _ => target.to_string(),
    }
}

/// First `max` characters, on a char boundary
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn located(selectors: &[&str]) -> Located {
        Located {
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
            interaction: Interaction::Click,
        }
    }

    #[test]
    fn test_targeting_walks_queue_then_unresolves() {
        let mut targeting = Targeting::new();
        assert!(!targeting.is_resolved());

        targeting.load(located(&["#a", "#b"]));
        assert_eq!(targeting.current(), Some("#a"));
        targeting.record("#a");
        assert!(targeting.advance());
        assert_eq!(targeting.current(), Some("#b"));
        targeting.record("#b");
        assert!(!targeting.advance());
        assert!(!targeting.is_resolved());
        assert_eq!(targeting.attempted(), ["#a", "#b"]);
    }

    #[test]
    fn test_substitute_skips_tried_selectors() {
        let mut targeting = Targeting::new();
        targeting.load(located(&["#a", "#b"]));
        targeting.record("#a");

        assert!(targeting.substitute(vec!["#a".to_string(), "#x".to_string()]));
        assert_eq!(targeting.current(), Some("#x"));
        assert!(targeting.advance());
        assert_eq!(targeting.current(), Some("#b"));
        assert!(!targeting.substitute(vec!["#a".to_string()]));
    }

    #[test]
    fn test_parse_predicate() {
        assert_eq!(
            parse_predicate("the cookie banner is visible"),
            Presence {
                subject: "cookie banner".to_string(),
                expected: true
            }
        );
        assert_eq!(
            parse_predicate("error message is not shown"),
            Presence {
                subject: "error message".to_string(),
                expected: false
            }
        );
        assert!(!parse_predicate("#promo doesn't exist").expected);
        assert_eq!(parse_predicate("Welcome back").subject, "Welcome back");
    }

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("http://localhost:3000/home", "/signup"),
            "http://localhost:3000/signup"
        );
        assert_eq!(
            join_url("http://localhost/", "https://example.com/login"),
            "https://example.com/login"
        );
        assert_eq!(join_url("about:blank", "/signup"), "/signup");
        assert_eq!(
            join_url("about:blank", "localhost:3000/login"),
            "http://localhost:3000/login"
        );
        assert_eq!(join_url("", "/signup"), "/signup");
    }

    #[test]
    fn test_truthiness_and_truncation() {
        assert!(is_truthy("Yes"));
        assert!(is_falsy("off"));
        assert!(!is_truthy("Technology"));
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }
}

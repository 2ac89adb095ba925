//! Word lists and extraction patterns shared by the parser and decomposer

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use probe_core::TargetType;
use regex::Regex;

/// Field names recognised in goal text, longest alternatives first
const FIELD_KEYS: &str = r"email\s+address|e-mail|email|confirm(?:ation)?\s+password|password\s+confirmation|repeat\s+password|password|passcode|user\s?name|first\s+name|last\s+name|full\s+name|display\s+name|name|phone\s+number|telephone|phone|mobile|street\s+address|address|city|state|zip\s+code|zip|postal\s+code|postcode|country|company|organization|website|url|message|comments?|subject|search|query|age|quantity|card\s+number|cvv|expiry|birthday|date\s+of\s+birth";

const VALUE: &str = r#"(?:"([^"]*)"|'([^']*)'|(\S+))"#;

static URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b((?:https?://|www\.)[^\s,;]+|localhost(?::\d+)?(?:/[^\s,;]*)?)")
        .expect("valid regex")
});

static FIELD_WITH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b({})\s+(?:field|input|box|textbox)\s+(?:with|to|as)\s+{}",
        FIELD_KEYS, VALUE
    ))
    .expect("valid regex")
});

static ENTER_INTO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:enter|type|input|put|use)\s+{}\s+(?:in|into|as|for)\s+(?:the\s+)?({})\b",
        VALUE, FIELD_KEYS
    ))
    .expect("valid regex")
});

static KEY_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b({})\b\s*(?:(?:is|as|of|to|for)\s+|[=:]\s*)?{}",
        FIELD_KEYS, VALUE
    ))
    .expect("valid regex")
});

static GENERATED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:an?\s+)?(?:random|generated|fake|unique|new\s+random)\s+({})\b",
        FIELD_KEYS
    ))
    .expect("valid regex")
});

static REFERENCED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b(?:that|the\s+same|this)\s+({})\b", FIELD_KEYS))
        .expect("valid regex")
});

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid regex")
});

static SUBMISSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(submit|sign\s*up|register|log\s*in|sign\s*in|subscribe|send|check\s*out|checkout|place\s+(?:an?\s+|the\s+)?order)\b")
        .expect("valid regex")
});

static SUBMIT_LIKE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(submit|sign\s*up|register|log\s*in|login|sign\s*in|send|continue|place\s+order|save|create\s+account)\b")
        .expect("valid regex")
});

static THAT_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bthat\b").expect("valid regex"));

static ROLE_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(.*?)\s+(button|btn|link|check\s?box|box|tab|icon|field|input|radio|option|dropdown)$")
        .expect("valid regex")
});

static PAGE_INTENTS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (
            r"(?i)^(?:please\s+)?(?:sign\s*up|register|create\s+(?:a\s+)?(?:new\s+)?account)\b",
            "/signup",
        ),
        (r"(?i)^(?:please\s+)?(?:log\s*in|sign\s*in)\b", "/login"),
        (r"(?i)^(?:please\s+)?(?:check\s*out|checkout)\b", "/checkout"),
        (r"(?i)^(?:please\s+)?contact\b", "/contact"),
    ]
    .into_iter()
    .map(|(pattern, path)| (Regex::new(pattern).expect("valid regex"), path))
    .collect()
});

static NAMED_PAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:please\s+)?(?:go|navigate|browse|head)\s+to\s+(?:the\s+)?([a-z][a-z0-9 -]*?)\s+page\b")
        .expect("valid regex")
});

/// Unquoted tokens that can never be a field value
const STOPWORDS: &[&str] = &[
    "and", "with", "field", "the", "a", "an", "then", "input", "box", "random", "generated",
    "fake", "unique", "new", "into", "in", "on", "for", "to", "is", "as", "of", "from", "that",
    "it", "this", "some", "any", "dropdown", "menu", "list", "checkbox", "button", "link",
];

/// Field data found in goal text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormData {
    /// Normalized key to value; empty value means "generate one"
    pub data: IndexMap<String, String>,
    /// Keys whose values must be synthesized, in order of mention
    pub generated: Vec<String>,
    /// Keys whose values come from an earlier step ("that email")
    pub referenced: Vec<String>,
}

impl FormData {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// First URL-like token in the text, with a scheme added when it had none
pub fn extract_url(text: &str) -> Option<String> {
    URL.captures(text)
        .map(|caps| clean_value(&caps[1]))
        .filter(|url| !url.is_empty())
        .map(|url| with_scheme(&url))
}

fn with_scheme(url: &str) -> String {
    let lower = url.to_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        url.to_string()
    } else if lower.starts_with("localhost") {
        format!("http://{}", url)
    } else {
        format!("https://{}", url)
    }
}

/// Relative path implied by a leading page verb ("Sign up ..." ⇒ `/signup`)
pub fn page_path_for(phrase: &str) -> Option<String> {
    let phrase = phrase.trim();
    if let Some((_, path)) = PAGE_INTENTS.iter().find(|(re, _)| re.is_match(phrase)) {
        return Some((*path).to_string());
    }
    NAMED_PAGE.captures(phrase).map(|caps| {
        let slug = caps[1].trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join("-");
        format!("/{}", slug)
    })
}

/// Canonical key for a field name as written in a goal
pub fn normalize_field_key(raw: &str) -> String {
    let key = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let canonical = match key.as_str() {
        "email address" | "e-mail" | "email" => "email",
        "confirm password" | "confirmation password" | "password confirmation"
        | "repeat password" => "confirm_password",
        "password" | "passcode" => "password",
        "user name" | "username" => "username",
        "full name" | "display name" | "name" => "name",
        "phone number" | "telephone" | "phone" | "mobile" => "phone",
        "street address" | "address" => "address",
        "zip code" | "zip" | "postal code" | "postcode" => "zip",
        "comment" | "comments" | "message" => "message",
        "query" | "search" => "search",
        "organization" | "company" => "company",
        "url" | "website" => "website",
        "birthday" | "date of birth" => "birthdate",
        other => return other.replace(' ', "_"),
    };
    canonical.to_string()
}

/// Strip wrapping punctuation a sentence leaves on a token
pub fn clean_value(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('(')
        .trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | ')'))
        .to_string()
}

fn captured_value(caps: &regex::Captures<'_>, first: usize) -> Option<(String, bool)> {
    if let Some(m) = caps.get(first).or_else(|| caps.get(first + 1)) {
        return Some((m.as_str().to_string(), true));
    }
    caps.get(first + 2)
        .map(|m| (clean_value(m.as_str()), false))
}

fn is_stopword(value: &str) -> bool {
    STOPWORDS.contains(&value.to_lowercase().as_str())
}

/// Pull field/value pairs out of goal text.
///
/// Explicit forms win over loose `key value` adjacency: `the email field
/// with x`, `enter x into the email`, then `email x` / `email: x`.
pub fn extract_form_data(text: &str) -> FormData {
    let mut form = FormData::default();
    let mut taken: Vec<(usize, usize)> = Vec::new();

    for caps in FIELD_WITH.captures_iter(text) {
        let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or_default();
        if let Some((value, _)) = captured_value(&caps, 2) {
            form.data.insert(normalize_field_key(&caps[1]), value);
            taken.push(whole);
        }
    }

    for caps in ENTER_INTO.captures_iter(text) {
        let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or_default();
        if overlaps(&taken, whole) {
            continue;
        }
        if let Some((value, quoted)) = captured_value(&caps, 1) {
            if quoted || !is_stopword(&value) {
                form.data.insert(normalize_field_key(&caps[4]), value);
                taken.push(whole);
            }
        }
    }

    for caps in GENERATED.captures_iter(text) {
        let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or_default();
        if overlaps(&taken, whole) {
            continue;
        }
        let key = normalize_field_key(&caps[1]);
        if !form.data.contains_key(&key) {
            form.data.insert(key.clone(), String::new());
            form.generated.push(key);
        }
        taken.push(whole);
    }

    for caps in REFERENCED.captures_iter(text) {
        let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or_default();
        if overlaps(&taken, whole) {
            continue;
        }
        let key = normalize_field_key(&caps[1]);
        if !form.data.contains_key(&key) {
            form.data.insert(key.clone(), String::new());
            form.referenced.push(key);
        }
        taken.push(whole);
    }

    for caps in KEY_VALUE.captures_iter(text) {
        let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or_default();
        if overlaps(&taken, whole) {
            continue;
        }
        let key = normalize_field_key(&caps[1]);
        if form.data.contains_key(&key) {
            continue;
        }
        if let Some((value, quoted)) = captured_value(&caps, 2) {
            if quoted || (!value.is_empty() && !is_stopword(&value)) {
                form.data.insert(key, value);
                taken.push(whole);
            }
        }
    }

    if !form.data.contains_key("email") {
        if let Some(m) = EMAIL.find(text) {
            form.data.insert("email".to_string(), clean_value(m.as_str()));
        }
    }

    form
}

fn overlaps(taken: &[(usize, usize)], (start, end): (usize, usize)) -> bool {
    taken.iter().any(|&(s, e)| start < e && s < end)
}

/// Goal wording implies a form gets submitted
pub fn implies_submission(text: &str) -> bool {
    SUBMISSION.is_match(text)
}

/// Click target that already performs a submission
pub fn is_submit_like(target: &str) -> bool {
    SUBMIT_LIKE.is_match(target)
}

/// Step refers back to a value produced earlier ("use that email")
pub fn references_prior_value(text: &str) -> bool {
    THAT_REFERENCE.is_match(text)
}

/// Split a trailing role word off a target ("terms checkbox" ⇒ ("terms", Checkbox))
pub fn split_role_word(target: &str) -> (String, Option<TargetType>) {
    let target = target.trim();
    match ROLE_SUFFIX.captures(target) {
        Some(caps) if !caps[1].trim().is_empty() => {
            let role = caps[2].to_lowercase().replace(' ', "");
            let kind = match role.as_str() {
                "checkbox" | "box" => Some(TargetType::Checkbox),
                "dropdown" => Some(TargetType::Field),
                other => TargetType::from_role_word(other),
            };
            (caps[1].trim().to_string(), kind)
        }
        _ => (target.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_key_value_pairs() {
        let form = extract_form_data(
            "Sign up for a new account with email test@example.com and password SecurePass123",
        );
        assert_eq!(form.data.get("email").map(String::as_str), Some("test@example.com"));
        assert_eq!(form.data.get("password").map(String::as_str), Some("SecurePass123"));
        assert_eq!(form.data.len(), 2);
        assert!(form.generated.is_empty());
    }

    #[test]
    fn test_extract_field_with_and_quoted() {
        let form = extract_form_data(r#"fill the email field with a@b.co and name "Jane Doe""#);
        assert_eq!(form.data["email"], "a@b.co");
        assert_eq!(form.data["name"], "Jane Doe");
    }

    #[test]
    fn test_extract_enter_into() {
        let form = extract_form_data("enter shoes into the search box");
        assert_eq!(form.data["search"], "shoes");
    }

    #[test]
    fn test_extract_generated_values() {
        let form = extract_form_data("register with a random email and password \"Secret1!\"");
        assert_eq!(form.data["email"], "");
        assert_eq!(form.generated, vec!["email".to_string()]);
        assert_eq!(form.data["password"], "Secret1!");
    }

    #[test]
    fn test_extract_referenced_values() {
        let form = extract_form_data("log in with that email and password hunter22");
        assert_eq!(form.data["email"], "");
        assert_eq!(form.referenced, vec!["email".to_string()]);
        assert!(form.generated.is_empty());
        assert_eq!(form.data["password"], "hunter22");
    }

    #[test]
    fn test_trailing_punctuation_is_trimmed() {
        let form = extract_form_data("login with email me@x.io, password hunter2.");
        assert_eq!(form.data["email"], "me@x.io");
        assert_eq!(form.data["password"], "hunter2");
    }

    #[test]
    fn test_stopwords_are_not_values() {
        let form = extract_form_data("fill in the email and password");
        assert!(form.is_empty());
    }

    #[test]
    fn test_normalize_field_key() {
        assert_eq!(normalize_field_key("E-mail"), "email");
        assert_eq!(normalize_field_key("Zip  Code"), "zip");
        assert_eq!(normalize_field_key("first name"), "first_name");
        assert_eq!(normalize_field_key("Confirm Password"), "confirm_password");
    }

    #[test]
    fn test_page_paths() {
        assert_eq!(page_path_for("Sign up for an account"), Some("/signup".to_string()));
        assert_eq!(page_path_for("log in as admin"), Some("/login".to_string()));
        assert_eq!(page_path_for("go to the order history page"), Some("/order-history".to_string()));
        assert_eq!(page_path_for("accept terms and submit"), None);
    }

    #[test]
    fn test_urls() {
        assert_eq!(
            extract_url("open http://localhost:8081/test/forms."),
            Some("http://localhost:8081/test/forms".to_string())
        );
        assert_eq!(
            extract_url("visit localhost:3000/login"),
            Some("http://localhost:3000/login".to_string())
        );
        assert_eq!(
            extract_url("open www.example.com/pricing"),
            Some("https://www.example.com/pricing".to_string())
        );
        assert_eq!(extract_url("no url here"), None);
    }

    #[test]
    fn test_role_words() {
        assert_eq!(
            split_role_word("terms checkbox"),
            ("terms".to_string(), Some(TargetType::Checkbox))
        );
        assert_eq!(
            split_role_word("Sign In button"),
            ("Sign In".to_string(), Some(TargetType::Button))
        );
        assert_eq!(split_role_word("submit"), ("submit".to_string(), None));
    }

    #[test]
    fn test_submission_wording() {
        assert!(implies_submission("Sign up with email a@b.co"));
        assert!(implies_submission("log in"));
        assert!(!implies_submission("fill the name field with Bob"));
        assert!(is_submit_like("submit button"));
        assert!(!is_submit_like("terms checkbox"));
    }
}

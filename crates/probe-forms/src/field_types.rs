//! Semantic field types and the validation rules they imply

use once_cell::sync::Lazy;
use probe_core::{FieldPolicy, FieldType, ValidationRules};
use regex::Regex;

/// Families applied to name/placeholder/label text, first match wins
static FAMILIES: Lazy<Vec<(FieldType, Regex)>> = Lazy::new(|| {
    [
        (FieldType::Email, r"e-?mail"),
        (FieldType::Password, r"pass(?:word|wd|code)?|\bpwd\b|\bpin\b"),
        (FieldType::Phone, r"phone|\btel\b|mobile|\bcell\b"),
        (
            FieldType::Name,
            r"\b(?:first|last|full|given|family|sur|display)?[_ ]?name\b|\b[fl]name\b",
        ),
        (
            FieldType::Address,
            r"address|street|\bcity\b|\bzip\b|postal|postcode|\bstate\b|country",
        ),
        (FieldType::Url, r"\burl\b|website|homepage"),
        (FieldType::Number, r"\b(?:age|qty|quantity|amount|count|number|num)\b"),
    ]
    .into_iter()
    .map(|(ty, pattern)| (ty, Regex::new(pattern).expect("valid regex")))
    .collect()
});

static STRONG_CONTEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:strong|secure|confirm)").expect("valid regex"));

static CONFIRMATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)confirm|repeat|again|verify|re-?enter|_2$").expect("valid regex"));

/// Infer the semantic type of a field.
///
/// Explicit non-generic declared types pass through untouched; a generic
/// `text` input is refined from its name, placeholder and label.
pub fn infer_field_type(declared: &str, descriptive_text: &str) -> FieldType {
    let declared_type = FieldType::from_declared(declared);
    if !declared_type.is_generic() {
        return declared_type;
    }
    let text = descriptive_text.to_lowercase();
    FAMILIES
        .iter()
        .find(|(_, re)| re.is_match(&text))
        .map(|(ty, _)| ty.clone())
        .unwrap_or(declared_type)
}

/// Validation rules and content policy for a field, deterministic in its inputs.
///
/// `context` is goal plus field text; it decides password strength.
pub fn validation_for(
    field_type: &FieldType,
    field_name: &str,
    required: bool,
    context: &str,
) -> (ValidationRules, Option<FieldPolicy>) {
    let mut rules = ValidationRules {
        required,
        ..ValidationRules::default()
    };
    let mut policy = None;

    match field_type {
        FieldType::Email => {
            rules.pattern = Some(r"^[^@\s]+@[^@\s]+\.[^@\s]+$".to_string());
        }
        FieldType::Password => {
            rules.min_length = Some(8);
            let mut p = if STRONG_CONTEXT.is_match(context) {
                FieldPolicy::strong()
            } else {
                FieldPolicy::default()
            };
            if CONFIRMATION.is_match(field_name) {
                p.must_match = Some("password".to_string());
            }
            if p != FieldPolicy::default() {
                policy = Some(p);
            }
        }
        FieldType::Phone => {
            rules.min_length = Some(7);
            rules.pattern = Some(r"^[+()\d\s.-]{7,}$".to_string());
        }
        FieldType::Url => {
            rules.pattern = Some(r"^https?://\S+$".to_string());
        }
        FieldType::Name => {
            rules.min_length = Some(1);
            rules.max_length = Some(100);
        }
        FieldType::Date => {
            rules.pattern = Some(r"^\d{4}-\d{2}-\d{2}$".to_string());
        }
        FieldType::Number => {
            rules.pattern = Some(r"^-?\d+(?:\.\d+)?$".to_string());
        }
        _ => {}
    }
    (rules, policy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_types_pass_through() {
        assert_eq!(infer_field_type("email", "whatever"), FieldType::Email);
        assert_eq!(infer_field_type("password", "email"), FieldType::Password);
        assert_eq!(infer_field_type("checkbox", "phone"), FieldType::Checkbox);
    }

    #[test]
    fn test_generic_types_are_refined() {
        assert_eq!(infer_field_type("text", "user_email Email address"), FieldType::Email);
        assert_eq!(infer_field_type("", "pwd"), FieldType::Password);
        assert_eq!(infer_field_type("text", "Mobile number"), FieldType::Phone);
        assert_eq!(infer_field_type("text", "first_name"), FieldType::Name);
        assert_eq!(infer_field_type("text", "Street"), FieldType::Address);
        assert_eq!(infer_field_type("text", "Your website"), FieldType::Url);
        assert_eq!(infer_field_type("text", "age"), FieldType::Number);
        assert_eq!(infer_field_type("text", "favourite colour"), FieldType::Text);
    }

    #[test]
    fn test_username_is_not_a_person_name() {
        assert_eq!(infer_field_type("text", "username"), FieldType::Text);
    }

    #[test]
    fn test_password_rules() {
        let (rules, policy) = validation_for(&FieldType::Password, "password", true, "log in");
        assert_eq!(rules.min_length, Some(8));
        assert!(rules.required);
        assert!(policy.is_none());

        let (_, policy) = validation_for(&FieldType::Password, "password", true, "use a strong password");
        assert_eq!(policy, Some(FieldPolicy::strong()));

        let (_, policy) = validation_for(&FieldType::Password, "confirm_password", false, "Confirm password");
        let policy = policy.unwrap();
        assert!(policy.require_symbol);
        assert_eq!(policy.must_match.as_deref(), Some("password"));
    }

    #[test]
    fn test_rules_are_deterministic() {
        let a = validation_for(&FieldType::Email, "email", false, "");
        let b = validation_for(&FieldType::Email, "email", false, "");
        assert_eq!(a, b);
        assert!(a.0.pattern.is_some());
    }
}

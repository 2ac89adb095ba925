//! Core type definitions for goal resolution and execution

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Kind of atomic interaction an [`Action`] performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Navigate,
    Click,
    Fill,
    Select,
    Assert,
    Wait,
    Conditional,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Navigate => write!(f, "navigate"),
            Self::Click => write!(f, "click"),
            Self::Fill => write!(f, "fill"),
            Self::Select => write!(f, "select"),
            Self::Assert => write!(f, "assert"),
            Self::Wait => write!(f, "wait"),
            Self::Conditional => write!(f, "conditional"),
        }
    }
}

impl std::str::FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "navigate" | "goto" => Ok(Self::Navigate),
            "click" => Ok(Self::Click),
            "fill" | "type" => Ok(Self::Fill),
            "select" => Ok(Self::Select),
            "assert" | "verify" => Ok(Self::Assert),
            "wait" => Ok(Self::Wait),
            "conditional" | "if" => Ok(Self::Conditional),
            _ => Err(format!("Invalid action kind: {}", s)),
        }
    }
}

/// Branches of a conditional action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Human predicate, e.g. "cookie banner is visible"
    pub predicate: String,
    pub then_branch: Vec<Action>,
    #[serde(default)]
    pub else_branch: Vec<Action>,
}

/// One atomic intended interaction
///
/// `target` stays an opaque string (human label or selector) until the
/// executor resolves it against the live page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Field name to value; insertion order is fill order
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub data: IndexMap<String, String>,
    #[serde(default)]
    pub optional: bool,
    /// `Some(false)` marks a step that may fail without aborting the run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_as: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_stored: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(default)]
    pub description: String,
    /// Step guessed from wording rather than stated ("Sign up" ⇒ `/signup`)
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub inferred: bool,
}

impl Action {
    fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            target: None,
            value: None,
            data: IndexMap::new(),
            optional: false,
            critical: None,
            wait_for: None,
            store_as: None,
            use_stored: None,
            condition: None,
            description: String::new(),
            inferred: false,
        }
    }

    pub fn navigate(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            description: format!("Navigate to {}", url),
            value: Some(url),
            ..Self::new(ActionKind::Navigate)
        }
    }

    pub fn click(target: impl Into<String>) -> Self {
        let target = target.into();
        Self {
            description: format!("Click {}", target),
            target: Some(target),
            ..Self::new(ActionKind::Click)
        }
    }

    pub fn fill(data: IndexMap<String, String>) -> Self {
        let keys = data.keys().cloned().collect::<Vec<_>>().join(", ");
        Self {
            description: format!("Fill {}", keys),
            data,
            ..Self::new(ActionKind::Fill)
        }
    }

    /// Fill a single field addressed by label or selector
    pub fn fill_field(target: impl Into<String>, value: impl Into<String>) -> Self {
        let target = target.into();
        Self {
            description: format!("Fill {}", target),
            target: Some(target),
            value: Some(value.into()),
            ..Self::new(ActionKind::Fill)
        }
    }

    pub fn select(target: impl Into<String>, label: impl Into<String>) -> Self {
        let target = target.into();
        let label = label.into();
        Self {
            description: format!("Select {} in {}", label, target),
            target: Some(target),
            value: Some(label),
            ..Self::new(ActionKind::Select)
        }
    }

    pub fn assert_text(expected: impl Into<String>) -> Self {
        let expected = expected.into();
        Self {
            description: format!("Verify {}", expected),
            value: Some(expected),
            ..Self::new(ActionKind::Assert)
        }
    }

    pub fn wait_ms(ms: u64) -> Self {
        Self {
            description: format!("Wait {}ms", ms),
            value: Some(ms.to_string()),
            ..Self::new(ActionKind::Wait)
        }
    }

    pub fn wait_for_selector(selector: impl Into<String>) -> Self {
        let selector = selector.into();
        Self {
            description: format!("Wait for {}", selector),
            target: Some(selector),
            ..Self::new(ActionKind::Wait)
        }
    }

    pub fn conditional(condition: Condition) -> Self {
        Self {
            description: format!("If {}", condition.predicate),
            condition: Some(condition),
            ..Self::new(ActionKind::Conditional)
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_critical(mut self, critical: bool) -> Self {
        self.critical = Some(critical);
        self
    }

    pub fn with_wait_for(mut self, selector: impl Into<String>) -> Self {
        self.wait_for = Some(selector.into());
        self
    }

    pub fn inferred(mut self) -> Self {
        self.inferred = true;
        self
    }

    pub fn store_as(mut self, key: impl Into<String>) -> Self {
        self.store_as = Some(key.into());
        self
    }

    pub fn use_stored(mut self, key: impl Into<String>) -> Self {
        self.use_stored = Some(key.into());
        self
    }

    /// Whether a failure of this step halts the sequence.
    ///
    /// Unmarked steps are critical.
    pub fn aborts_on_failure(&self) -> bool {
        !self.optional && self.critical != Some(false)
    }
}

/// Intent classes the goal parser distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalAction {
    Navigate,
    Click,
    Fill,
    Submit,
    Verify,
}

impl std::fmt::Display for GoalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Navigate => write!(f, "navigate"),
            Self::Click => write!(f, "click"),
            Self::Fill => write!(f, "fill"),
            Self::Submit => write!(f, "submit"),
            Self::Verify => write!(f, "verify"),
        }
    }
}

/// What kind of element a goal's target names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Button,
    Link,
    Checkbox,
    Radio,
    Field,
    Form,
    Page,
    Text,
}

impl TargetType {
    /// Map a trailing role word ("button", "link", ...) to a target type
    pub fn from_role_word(word: &str) -> Option<Self> {
        match word.to_lowercase().as_str() {
            "button" | "btn" => Some(Self::Button),
            "link" => Some(Self::Link),
            "checkbox" | "box" | "check box" => Some(Self::Checkbox),
            "radio" | "option" => Some(Self::Radio),
            "field" | "input" => Some(Self::Field),
            "form" => Some(Self::Form),
            "page" => Some(Self::Page),
            _ => None,
        }
    }
}

/// Single structured intent extracted from goal text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedGoal {
    pub action: GoalAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_type: Option<TargetType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub form_data: IndexMap<String, String>,
    #[serde(default)]
    pub submit: bool,
    #[serde(default)]
    pub metadata: IndexMap<String, String>,
}

impl ParsedGoal {
    pub fn new(action: GoalAction) -> Self {
        Self {
            action,
            target: None,
            target_type: None,
            value: None,
            url: None,
            form_data: IndexMap::new(),
            submit: false,
            metadata: IndexMap::new(),
        }
    }

    /// True when the parser fell through every rule
    pub fn is_fallback(&self) -> bool {
        self.metadata.get("rule").map(String::as_str) == Some("fallback")
    }
}

/// Field families the resolver distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Checkbox,
    Radio,
    Select,
    Generic,
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Checkbox => write!(f, "checkbox"),
            Self::Radio => write!(f, "radio"),
            Self::Select => write!(f, "select"),
            Self::Generic => write!(f, "generic"),
        }
    }
}

impl std::str::FromStr for FieldKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "checkbox" => Ok(Self::Checkbox),
            "radio" => Ok(Self::Radio),
            "select" | "dropdown" => Ok(Self::Select),
            "generic" | "text" | "input" => Ok(Self::Generic),
            _ => Err(format!("Invalid field kind: {}", s)),
        }
    }
}

/// Field resolver strategy that produced a mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    ExactValue = 1,
    NormalizedValue = 2,
    LabelText = 3,
    FuzzyLabel = 4,
    Partial = 5,
    LabelContainment = 6,
    Semantic = 7,
    AriaAttribute = 8,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExactValue => write!(f, "exact_value"),
            Self::NormalizedValue => write!(f, "normalized_value"),
            Self::LabelText => write!(f, "label_text"),
            Self::FuzzyLabel => write!(f, "fuzzy_label"),
            Self::Partial => write!(f, "partial"),
            Self::LabelContainment => write!(f, "label_containment"),
            Self::Semantic => write!(f, "semantic"),
            Self::AriaAttribute => write!(f, "aria_attribute"),
        }
    }
}

/// Intermediate result of a resolution tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Technical value (or name, for generic fields) of the matched element
    pub raw_value: String,
    pub recovered_label: Option<String>,
    pub selector: String,
    /// Document-order index of the matched element
    pub position_index: usize,
    pub tier: Tier,
}

/// Semantic type of a form field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Email,
    Password,
    Phone,
    Name,
    Address,
    Url,
    Number,
    Date,
    Checkbox,
    Radio,
    Select,
    Textarea,
    Hidden,
    File,
    Other(String),
}

impl FieldType {
    /// Map a declared `type` attribute (or tag) to a field type
    pub fn from_declared(declared: &str) -> Self {
        match declared.trim().to_lowercase().as_str() {
            "" | "text" | "search" => Self::Text,
            "email" => Self::Email,
            "password" => Self::Password,
            "tel" | "phone" => Self::Phone,
            "url" => Self::Url,
            "number" | "range" => Self::Number,
            "date" | "datetime-local" | "month" | "week" | "time" => Self::Date,
            "checkbox" => Self::Checkbox,
            "radio" => Self::Radio,
            "select" | "select-one" | "select-multiple" => Self::Select,
            "textarea" => Self::Textarea,
            "hidden" => Self::Hidden,
            "file" => Self::File,
            other => Self::Other(other.to_string()),
        }
    }

    /// Generic declared types are refined from name/label text
    pub fn is_generic(&self) -> bool {
        matches!(self, Self::Text)
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Email => write!(f, "email"),
            Self::Password => write!(f, "password"),
            Self::Phone => write!(f, "phone"),
            Self::Name => write!(f, "name"),
            Self::Address => write!(f, "address"),
            Self::Url => write!(f, "url"),
            Self::Number => write!(f, "number"),
            Self::Date => write!(f, "date"),
            Self::Checkbox => write!(f, "checkbox"),
            Self::Radio => write!(f, "radio"),
            Self::Select => write!(f, "select"),
            Self::Textarea => write!(f, "textarea"),
            Self::Hidden => write!(f, "hidden"),
            Self::File => write!(f, "file"),
            Self::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Validation constraints derived from a field's inferred type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRules {
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// Content policy for generated values (password strength, confirmation)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPolicy {
    pub require_uppercase: bool,
    pub require_digit: bool,
    pub require_symbol: bool,
    /// Name of the field this one must repeat (password confirmation)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub must_match: Option<String>,
}

impl FieldPolicy {
    pub fn strong() -> Self {
        Self {
            require_uppercase: true,
            require_digit: true,
            require_symbol: true,
            must_match: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormFieldSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub inferred_type: FieldType,
    pub selector: String,
    pub required: bool,
    pub validation: ValidationRules,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<FieldPolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmitDescriptor {
    pub selector: Option<String>,
    pub text: Option<String>,
}

/// Inferred structure of one form; field order is fill order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub selector: String,
    pub fields: Vec<FormFieldSchema>,
    pub submit: SubmitDescriptor,
}

/// Classified cause of a failed action attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    StaleElement,
    NotFound,
    Timeout,
    Unknown,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StaleElement => write!(f, "stale_element"),
            Self::NotFound => write!(f, "not_found"),
            Self::Timeout => write!(f, "timeout"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl FailureKind {
    /// Classify a driver error message by its wording
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if ["stale", "detached", "no longer attached", "node with given id"]
            .iter()
            .any(|m| lower.contains(m))
        {
            Self::StaleElement
        } else if [
            "not found",
            "no such element",
            "could not find",
            "no node found",
            "failed to find",
            "unable to locate",
        ]
        .iter()
        .any(|m| lower.contains(m))
        {
            Self::NotFound
        } else if lower.contains("timeout") || lower.contains("timed out") {
            Self::Timeout
        } else {
            Self::Unknown
        }
    }

    /// Whether a plain retry can recover this failure
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::StaleElement | Self::NotFound)
    }
}

/// Outcome of executing one action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub kind: ActionKind,
    pub description: String,
    pub success: bool,
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
    /// Context contents after the action ran
    #[serde(default)]
    pub context: IndexMap<String, String>,
    #[serde(default)]
    pub attempted_selectors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Rescue strategy that completed the action, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rescued_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub console_errors: Vec<String>,
    pub duration_ms: u64,
}

impl ExecutionResult {
    pub fn succeeded(action: &Action, retry_count: u32, attempted_selectors: Vec<String>) -> Self {
        Self {
            kind: action.kind,
            description: action.description.clone(),
            success: true,
            retry_count,
            error: None,
            failure_kind: None,
            context: IndexMap::new(),
            attempted_selectors,
            url: None,
            rescued_by: None,
            screenshot: None,
            console_errors: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn failed(
        action: &Action,
        retry_count: u32,
        error: impl Into<String>,
        failure_kind: FailureKind,
        attempted_selectors: Vec<String>,
    ) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            failure_kind: Some(failure_kind),
            ..Self::succeeded(action, retry_count, attempted_selectors)
        }
    }
}

/// A step that failed without aborting the sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFailure {
    pub index: usize,
    pub description: String,
    pub error: String,
    /// Optional steps never affect overall success
    pub optional: bool,
}

/// Outcome of executing an ordered action list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceResult {
    pub success: bool,
    pub results: Vec<ExecutionResult>,
    #[serde(default)]
    pub non_fatal_errors: Vec<StepFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted_at: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub context: IndexMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmarked_action_is_critical() {
        let action = Action::click("submit button");
        assert!(action.aborts_on_failure());
        assert!(!action.clone().optional().aborts_on_failure());
        assert!(!action.clone().with_critical(false).aborts_on_failure());
        assert!(action.with_critical(true).aborts_on_failure());
    }

    #[test]
    fn test_action_kind_roundtrip() {
        for kind in [
            ActionKind::Navigate,
            ActionKind::Click,
            ActionKind::Fill,
            ActionKind::Select,
            ActionKind::Assert,
            ActionKind::Wait,
            ActionKind::Conditional,
        ] {
            assert_eq!(kind.to_string().parse::<ActionKind>().unwrap(), kind);
        }
        assert!("dance".parse::<ActionKind>().is_err());
    }

    #[test]
    fn test_field_type_from_declared() {
        assert_eq!(FieldType::from_declared("TEXT"), FieldType::Text);
        assert_eq!(FieldType::from_declared("tel"), FieldType::Phone);
        assert_eq!(FieldType::from_declared("select-one"), FieldType::Select);
        assert_eq!(
            FieldType::from_declared("color"),
            FieldType::Other("color".to_string())
        );
        assert!(FieldType::from_declared("").is_generic());
        assert!(!FieldType::Email.is_generic());
    }

    #[test]
    fn test_tier_ordering() {
        assert!(Tier::ExactValue < Tier::Partial);
        assert!(Tier::Semantic < Tier::AriaAttribute);
        assert_eq!(Tier::Partial as u8, 5);
    }

    #[test]
    fn test_failure_classification() {
        assert_eq!(
            FailureKind::classify("Element is detached from document"),
            FailureKind::StaleElement
        );
        assert_eq!(
            FailureKind::classify("No node found for selector: #email"),
            FailureKind::NotFound
        );
        assert_eq!(
            FailureKind::classify("Timed out waiting for #submit"),
            FailureKind::Timeout
        );
        assert_eq!(FailureKind::classify("net::ERR_ABORTED"), FailureKind::Unknown);
        assert!(FailureKind::NotFound.is_recoverable());
        assert!(!FailureKind::Timeout.is_recoverable());
    }

    #[test]
    fn test_action_serialization_skips_empty() {
        let json = serde_json::to_value(Action::navigate("/signup")).unwrap();
        assert_eq!(json["kind"], "navigate");
        assert_eq!(json["value"], "/signup");
        assert!(json.get("data").is_none());
        assert!(json.get("store_as").is_none());
    }
}

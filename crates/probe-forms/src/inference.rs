//! Goal-directed form selection and schema inference

use crate::field_types::{infer_field_type, validation_for};
use probe_core::config::InferenceConfig;
use probe_core::{
    DomSnapshot, FieldType, FormFieldSchema, FormSchema, FormSnapshot, ProbeError, Result,
    SubmitDescriptor,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

const BASE_SCORE: f64 = 0.5;
const NAME_MATCH: f64 = 0.3;
const SUBMIT_MATCH: f64 = 0.2;
const FIELD_OVERLAP: f64 = 0.2;
const PER_FIELD: f64 = 0.05;
const FIELD_CAP: f64 = 0.2;
const PER_REQUIRED: f64 = 0.1;
const REQUIRED_CAP: f64 = 0.15;
const EMAIL_BONUS: f64 = 0.1;
const PASSWORD_BONUS: f64 = 0.1;

/// Highest score any form can reach; confidence is score over this
pub const MAX_SCORE: f64 = BASE_SCORE
    + NAME_MATCH
    + SUBMIT_MATCH
    + FIELD_OVERLAP
    + FIELD_CAP
    + REQUIRED_CAP
    + EMAIL_BONUS
    + PASSWORD_BONUS;

/// What the user is trying to do with a form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalCategory {
    Signup,
    Login,
    Checkout,
    Newsletter,
    Contact,
    Search,
}

impl GoalCategory {
    /// Detection order; the first category with a keyword in the text wins
    pub const ALL: [GoalCategory; 6] = [
        Self::Signup,
        Self::Login,
        Self::Checkout,
        Self::Newsletter,
        Self::Contact,
        Self::Search,
    ];

    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Signup => &["signup", "sign up", "sign-up", "register", "registration", "create account", "join"],
            Self::Login => &["login", "log in", "log-in", "signin", "sign in", "sign-in", "auth"],
            Self::Checkout => &["checkout", "check out", "payment", "billing", "shipping", "order", "purchase", "cart"],
            Self::Newsletter => &["newsletter", "subscribe", "subscription", "mailing"],
            Self::Contact => &["contact", "message", "feedback", "support", "enquiry", "inquiry"],
            Self::Search => &["search", "find", "query", "lookup"],
        }
    }

    fn submit_words(&self) -> &'static [&'static str] {
        match self {
            Self::Signup => &["sign up", "register", "create", "join", "get started"],
            Self::Login => &["log in", "login", "sign in", "continue"],
            Self::Checkout => &["pay", "place order", "buy", "checkout", "purchase", "complete order"],
            Self::Newsletter => &["subscribe", "sign up", "join"],
            Self::Contact => &["send", "submit", "contact"],
            Self::Search => &["search", "go", "find"],
        }
    }

    pub fn expected_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Signup => &["email", "password", "name", "username", "confirm", "first", "last"],
            Self::Login => &["email", "username", "user", "password", "login"],
            Self::Checkout => &["email", "address", "city", "zip", "card", "cvv", "expiry", "name", "phone", "country"],
            Self::Newsletter => &["email", "name"],
            Self::Contact => &["name", "email", "message", "subject", "phone"],
            Self::Search => &["search", "q", "query", "keyword"],
        }
    }

    pub fn detect(text: &str) -> Option<Self> {
        let text = text.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|cat| cat.keywords().iter().any(|k| text.contains(k)))
    }

    fn expects(&self, field: &str) -> bool {
        self.expected_fields().contains(&field)
    }
}

/// Caller-supplied context for inference
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InferenceContext {
    pub goal: String,
    #[serde(default)]
    pub hints: Vec<String>,
}

impl InferenceContext {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            hints: Vec::new(),
        }
    }

    fn text(&self) -> String {
        std::iter::once(self.goal.as_str())
            .chain(self.hints.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Chosen form, its schema and how sure we are
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferredForm {
    pub schema: FormSchema,
    /// Heuristic certainty in `[0, 1]`
    pub confidence: f64,
    pub category: Option<GoalCategory>,
    /// Index of the winning form in the snapshot
    pub form_index: usize,
}

fn tokens(text: &str) -> Vec<String> {
    // split camelCase before lower-casing so "firstName" yields "first"
    let mut spaced = String::with_capacity(text.len());
    let mut prev_lower = false;
    for c in text.chars() {
        if c.is_uppercase() && prev_lower {
            spaced.push(' ');
        }
        prev_lower = c.is_lowercase();
        spaced.push(c);
    }
    spaced
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

fn contains_keyword(haystack: &str, keywords: &[&str]) -> bool {
    let squashed: String = haystack.chars().filter(|c| !c.is_whitespace()).collect();
    keywords.iter().any(|k| {
        let k_squashed: String = k.chars().filter(|c| !c.is_whitespace()).collect();
        haystack.contains(k) || squashed.contains(&k_squashed)
    })
}

/// Score one form against a goal category
pub fn score_form(form: &FormSnapshot, category: Option<GoalCategory>) -> f64 {
    let mut score = BASE_SCORE;

    let identity = [
        form.name.as_deref(),
        form.id.as_deref(),
        form.action.as_deref(),
        Some(form.selector.as_str()),
    ]
    .iter()
    .flatten()
    .copied()
    .collect::<Vec<_>>()
    .join(" ")
    .to_lowercase();
    let submit_text = form.submit_text.as_deref().unwrap_or("").to_lowercase();
    let field_words: Vec<String> = form
        .fields
        .iter()
        .flat_map(|f| {
            let mut words = tokens(&f.name);
            if let Some(label) = &f.label {
                words.extend(tokens(label));
            }
            words
        })
        .collect();

    if let Some(cat) = category {
        if contains_keyword(&identity, cat.keywords()) {
            score += NAME_MATCH;
        }
        if !submit_text.is_empty() && contains_keyword(&submit_text, cat.submit_words()) {
            score += SUBMIT_MATCH;
        }
        if field_words.iter().any(|w| cat.expects(w)) {
            score += FIELD_OVERLAP;
        }
    }

    score += (PER_FIELD * form.fields.len() as f64).min(FIELD_CAP);
    let required = form.fields.iter().filter(|f| f.required).count();
    score += (PER_REQUIRED * required as f64).min(REQUIRED_CAP);

    let has_type = |wanted: FieldType| {
        form.fields.iter().any(|f| {
            let text = format!("{} {}", f.name, f.label.as_deref().unwrap_or(""));
            infer_field_type(&f.field_type, &text) == wanted
        })
    };
    if has_type(FieldType::Email) {
        score += EMAIL_BONUS;
    }
    if has_type(FieldType::Password) {
        score += PASSWORD_BONUS;
    }
    score
}

/// Build the schema for one form snapshot
pub fn build_schema(form: &FormSnapshot, context_text: &str) -> FormSchema {
    let fields = form
        .fields
        .iter()
        .filter(|f| !matches!(f.field_type.to_lowercase().as_str(), "submit" | "button" | "reset" | "image"))
        .map(|f| {
            let descriptive = [
                Some(f.name.as_str()),
                f.placeholder.as_deref(),
                f.label.as_deref(),
            ]
            .iter()
            .flatten()
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
            let inferred_type = infer_field_type(&f.field_type, &descriptive);
            let policy_context = format!("{} {}", context_text, descriptive);
            let (validation, policy) =
                validation_for(&inferred_type, &f.name, f.required, &policy_context);
            FormFieldSchema {
                name: f.name.clone(),
                label: f.label.clone(),
                inferred_type,
                selector: f.selector.clone(),
                required: f.required,
                validation,
                policy,
            }
        })
        .collect();

    FormSchema {
        name: form.name.clone().or_else(|| form.id.clone()),
        selector: form.selector.clone(),
        fields,
        submit: SubmitDescriptor {
            selector: form.submit_selector.clone(),
            text: form.submit_text.clone(),
        },
    }
}

/// Picks the form a goal is about and infers its schema
pub struct FormInferenceEngine {
    config: InferenceConfig,
}

impl Default for FormInferenceEngine {
    fn default() -> Self {
        Self::new(InferenceConfig::default())
    }
}

impl FormInferenceEngine {
    pub fn new(config: InferenceConfig) -> Self {
        Self { config }
    }

    /// Choose the best form for `context` and infer its schema.
    ///
    /// Fails only when the page has no forms. Low confidence is a warning.
    #[instrument(skip(self, snapshot), fields(forms = snapshot.forms.len()))]
    pub fn infer(&self, snapshot: &DomSnapshot, context: &InferenceContext) -> Result<InferredForm> {
        if snapshot.forms.is_empty() {
            return Err(ProbeError::FormInference(format!(
                "no forms found on {}",
                if snapshot.url.is_empty() { "page" } else { snapshot.url.as_str() }
            )));
        }

        let text = context.text();
        let category = GoalCategory::detect(&text);

        let mut best: Option<(usize, f64)> = None;
        for (idx, form) in snapshot.forms.iter().enumerate() {
            let score = score_form(form, category);
            debug!(form = idx, score, "Scored form");
            // strict comparison keeps the earliest form on ties
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((idx, score));
            }
        }
        let (form_index, score) = best.unwrap_or((0, BASE_SCORE));
        let confidence = (score / MAX_SCORE).clamp(0.0, 1.0);

        if confidence < self.config.low_confidence_threshold {
            warn!(
                confidence,
                threshold = self.config.low_confidence_threshold,
                "Low confidence form match; returning best effort"
            );
        }

        Ok(InferredForm {
            schema: build_schema(&snapshot.forms[form_index], &text),
            confidence,
            category,
            form_index,
        })
    }
}

//! Plausible fill values per semantic field type

use crate::field_types::infer_field_type;
use indexmap::IndexMap;
use probe_core::{FieldPolicy, FieldType, FormFieldSchema, FormSchema};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const FIRST_NAMES: &[&str] = &["Alex", "Jordan", "Taylor", "Morgan", "Casey", "Riley", "Sam", "Jamie"];
const LAST_NAMES: &[&str] = &["Smith", "Garcia", "Chen", "Okafor", "Novak", "Silva", "Patel", "Jones"];
const STREETS: &[&str] = &["Main Street", "Oak Avenue", "Maple Road", "Cedar Lane", "Park Place"];
const CITIES: &[&str] = &["Springfield", "Riverton", "Fairview", "Lakeside", "Greenville"];
const SYMBOLS: &[u8] = b"!@#$%&*";

/// Generates test data; seed it for reproducible runs
pub struct DataSynthesizer {
    rng: StdRng,
}

impl Default for DataSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl DataSynthesizer {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn pick(&mut self, items: &[&'static str]) -> &'static str {
        items.choose(&mut self.rng).copied().unwrap_or_default()
    }

    /// Always meets the strong policy
    fn password(&mut self, min_length: usize) -> String {
        let mut out = String::new();
        out.push(self.rng.gen_range(b'A'..=b'Z') as char);
        let lower = min_length.max(8).saturating_sub(4);
        for _ in 0..lower {
            out.push(self.rng.gen_range(b'a'..=b'z') as char);
        }
        out.push_str(&format!("{:02}", self.rng.gen_range(0..100)));
        let symbol = SYMBOLS[self.rng.gen_range(0..SYMBOLS.len())];
        out.push(symbol as char);
        out
    }

    /// Value for a semantic type; `hint` is the field name or key
    pub fn value_for_type(&mut self, field_type: &FieldType, hint: &str) -> String {
        let hint = hint.to_lowercase();
        match field_type {
            FieldType::Email => format!("probe.user{}@example.com", self.rng.gen_range(1000..10000)),
            FieldType::Password => self.password(8),
            FieldType::Phone => format!(
                "555-{:03}-{:04}",
                self.rng.gen_range(100..1000),
                self.rng.gen_range(0..10000)
            ),
            FieldType::Name => {
                if hint.contains("first") || hint.contains("given") || hint == "fname" {
                    self.pick(FIRST_NAMES).to_string()
                } else if hint.contains("last") || hint.contains("family") || hint.contains("sur") || hint == "lname" {
                    self.pick(LAST_NAMES).to_string()
                } else {
                    format!("{} {}", self.pick(FIRST_NAMES), self.pick(LAST_NAMES))
                }
            }
            FieldType::Address => {
                if hint.contains("city") {
                    self.pick(CITIES).to_string()
                } else if hint.contains("zip") || hint.contains("postal") || hint.contains("postcode") {
                    format!("{:05}", self.rng.gen_range(10000..100000))
                } else if hint.contains("country") {
                    "United States".to_string()
                } else if hint.contains("state") {
                    "CA".to_string()
                } else {
                    format!("{} {}", self.rng.gen_range(1..2000), self.pick(STREETS))
                }
            }
            FieldType::Url => "https://example.com".to_string(),
            FieldType::Number => self.rng.gen_range(1..100).to_string(),
            FieldType::Date => format!(
                "{}-{:02}-{:02}",
                self.rng.gen_range(1970..2001),
                self.rng.gen_range(1..=12),
                self.rng.gen_range(1..=28)
            ),
            FieldType::Checkbox => "true".to_string(),
            FieldType::Textarea => "This is an automated test message.".to_string(),
            // Empty means "first available option"
            FieldType::Radio | FieldType::Select | FieldType::Hidden | FieldType::File => String::new(),
            FieldType::Text | FieldType::Other(_) => self.text_for(&hint),
        }
    }

    fn text_for(&mut self, hint: &str) -> String {
        if hint.contains("user") || hint.contains("login") {
            format!("probe_user{}", self.rng.gen_range(1000..10000))
        } else if hint.contains("company") || hint.contains("organization") {
            "Acme Testing Inc".to_string()
        } else if hint.contains("search") || hint == "q" || hint.contains("query") {
            "test".to_string()
        } else if hint.contains("subject") {
            "Test inquiry".to_string()
        } else if hint.contains("message") || hint.contains("comment") {
            "This is an automated test message.".to_string()
        } else {
            "test value".to_string()
        }
    }

    /// Value for one schema field, respecting its rules
    pub fn value_for(&mut self, field: &FormFieldSchema) -> String {
        if field.inferred_type == FieldType::Password {
            let min = field.validation.min_length.unwrap_or(8);
            return self.password(min);
        }
        let mut value = self.value_for_type(&field.inferred_type, &field.name);
        if field.inferred_type == FieldType::Number {
            if let (Some(min), Ok(n)) = (field.validation.min, value.parse::<f64>()) {
                if n < min {
                    value = min.to_string();
                }
            }
            if let (Some(max), Ok(n)) = (field.validation.max, value.parse::<f64>()) {
                if n > max {
                    value = max.to_string();
                }
            }
        }
        if let Some(max) = field.validation.max_length {
            value = value.chars().take(max).collect();
        }
        value
    }

    /// Value for a goal-level key such as `email` or `first_name`
    pub fn value_for_key(&mut self, key: &str) -> String {
        let field_type = infer_field_type("text", &key.replace('_', " "));
        self.value_for_type(&field_type, key)
    }

    /// Values for every field of `schema`. Provided values win; empty ones are generated.
    pub fn fill_schema(
        &mut self,
        schema: &FormSchema,
        provided: &IndexMap<String, String>,
    ) -> IndexMap<String, String> {
        let mut values: IndexMap<String, String> = IndexMap::new();
        for field in &schema.fields {
            if matches!(field.inferred_type, FieldType::Hidden | FieldType::File) {
                continue;
            }
            let given = provided
                .get(&field.name)
                .filter(|v| !v.is_empty())
                .cloned();
            let value = match (given, field.policy.as_ref().and_then(|p| p.must_match.as_ref())) {
                (Some(v), _) => v,
                (None, Some(source)) => match values.get(source) {
                    Some(v) => v.clone(),
                    None => self.value_for(field),
                },
                (None, None) => self.value_for(field),
            };
            values.insert(field.name.clone(), value);
        }
        values
    }
}

/// Password satisfies a content policy
pub fn satisfies_policy(value: &str, policy: &FieldPolicy) -> bool {
    (!policy.require_uppercase || value.chars().any(|c| c.is_ascii_uppercase()))
        && (!policy.require_digit || value.chars().any(|c| c.is_ascii_digit()))
        && (!policy.require_symbol || value.chars().any(|c| !c.is_alphanumeric()))
}

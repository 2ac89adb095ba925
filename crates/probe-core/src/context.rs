//! Run-scoped key/value store bridging values between steps

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static VARIABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{\s*([A-Za-z_][A-Za-z0-9_.-]*)\s*\}").expect("valid regex"));

/// Values produced by one step and consumed by a later one.
///
/// Created at flow start, mutated by `storeAs` writes, dropped at flow end.
/// Keys are unique; a second write to the same key replaces the value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionContext {
    values: IndexMap<String, String>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, returning the one it replaced
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.values.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn snapshot(&self) -> IndexMap<String, String> {
        self.values.clone()
    }

    /// Replace `${name}` references with stored values.
    ///
    /// Unknown names are left verbatim so the failure stays visible.
    pub fn substitute(&self, text: &str) -> String {
        VARIABLE
            .replace_all(text, |caps: &Captures| match self.values.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }
}

impl From<IndexMap<String, String>> for ExecutionContext {
    fn from(values: IndexMap<String, String>) -> Self {
        Self { values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_known_and_unknown() {
        let mut ctx = ExecutionContext::new();
        ctx.set("generated_email", "a@b.co");

        assert_eq!(ctx.substitute("user ${generated_email}!"), "user a@b.co!");
        assert_eq!(ctx.substitute("${ generated_email }"), "a@b.co");
        assert_eq!(ctx.substitute("${missing}"), "${missing}");
        assert_eq!(ctx.substitute("no vars"), "no vars");
    }

    #[test]
    fn test_set_replaces_and_keeps_keys_unique() {
        let mut ctx = ExecutionContext::new();
        assert_eq!(ctx.set("k", "1"), None);
        assert_eq!(ctx.set("k", "2"), Some("1".to_string()));
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.get("k"), Some("2"));
    }
}

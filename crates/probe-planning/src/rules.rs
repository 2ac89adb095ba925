//! Ordered (predicate, transform) rule tables

/// One classification rule
pub struct Rule<T> {
    pub name: &'static str,
    pub predicate: fn(&str) -> bool,
    pub transform: fn(&str) -> T,
}

impl<T> Rule<T> {
    pub const fn new(name: &'static str, predicate: fn(&str) -> bool, transform: fn(&str) -> T) -> Self {
        Self {
            name,
            predicate,
            transform,
        }
    }
}

/// Rules evaluated in order; the first whose predicate holds wins
pub struct RuleTable<T> {
    rules: Vec<Rule<T>>,
}

impl<T> RuleTable<T> {
    pub fn new(rules: Vec<Rule<T>>) -> Self {
        Self { rules }
    }

    /// Apply the first matching rule, returning its name and output
    pub fn apply(&self, input: &str) -> Option<(&'static str, T)> {
        self.rules
            .iter()
            .find(|rule| (rule.predicate)(input))
            .map(|rule| (rule.name, (rule.transform)(input)))
    }

    /// Names of every rule that would match, in precedence order
    pub fn matching(&self, input: &str) -> Vec<&'static str> {
        self.rules
            .iter()
            .filter(|rule| (rule.predicate)(input))
            .map(|rule| rule.name)
            .collect()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RuleTable<usize> {
        RuleTable::new(vec![
            Rule::new("short", |s| s.len() < 4, |s| s.len()),
            Rule::new("has_x", |s| s.contains('x'), |_| 100),
        ])
    }

    #[test]
    fn test_first_match_wins() {
        assert_eq!(table().apply("xy"), Some(("short", 2)));
        assert_eq!(table().apply("xxxxx"), Some(("has_x", 100)));
        assert_eq!(table().apply("longer"), None);
    }

    #[test]
    fn test_matching_lists_precedence() {
        assert_eq!(table().matching("ax"), vec!["short", "has_x"]);
        assert_eq!(table().names(), vec!["short", "has_x"]);
    }
}

//! String similarity used by the fuzzy and partial tiers

/// Lower-case and drop whitespace, `_` and `-`
pub fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Case-insensitive similarity in `[0, 1]`.
///
/// Identical strings score 1, containment scores 0.8, anything else
/// `1 - levenshtein / max_len`. An empty string is similar to nothing
/// but another empty string.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a.contains(&b) || b.contains(&a) {
        return 0.8;
    }
    let max_len = a.chars().count().max(b.chars().count());
    1.0 - strsim::levenshtein(&a, &b) as f64 / max_len as f64
}

fn prefix(s: &str, len: usize) -> String {
    s.chars().take(len).collect()
}

/// Abbreviation heuristic: either string's first `prefix_len` characters
/// occur somewhere in the other
pub fn partial_match(a: &str, b: &str, prefix_len: usize) -> bool {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() || prefix_len == 0 {
        return false;
    }
    b.contains(&prefix(&a, prefix_len)) || a.contains(&prefix(&b, prefix_len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_anchor_values() {
        assert_eq!(similarity("technology", "technology"), 1.0);
        assert_eq!(similarity("tech", "technology"), 0.8);
        assert_eq!(similarity("", "x"), 0.0);
        assert_eq!(similarity("x", ""), 0.0);
    }

    #[test]
    fn test_similarity_is_case_insensitive() {
        assert_eq!(similarity("Technology", "technology"), 1.0);
    }

    #[test]
    fn test_similarity_levenshtein_branch() {
        // kitten -> sitting is 3 edits over 7 chars
        let score = similarity("kitten", "sitting");
        assert!((score - (1.0 - 3.0 / 7.0)).abs() < 1e-9);
        assert!(similarity("travel", "sports") < 0.6);
    }

    #[test]
    fn test_partial_match() {
        assert!(partial_match("Technology", "tech", 3));
        assert!(!partial_match("Technology", "travel", 3));
        assert!(!partial_match("Technology", "sports", 3));
        assert!(partial_match("Sports & Fitness", "sports", 3));
        assert!(!partial_match("", "sports", 3));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(" First Name "), "firstname");
        assert_eq!(normalize("first_name"), "firstname");
        assert_eq!(normalize("Opt-In"), "optin");
    }
}

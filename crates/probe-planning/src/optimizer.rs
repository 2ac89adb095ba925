//! Action-list rewriting

use probe_core::{Action, ActionKind};
use tracing::trace;

/// Plain data fills with matching flags can be folded into one
fn mergeable_fills(prev: &Action, next: &Action) -> bool {
    let plain = |a: &Action| {
        a.kind == ActionKind::Fill
            && a.target.is_none()
            && a.condition.is_none()
            && a.store_as.is_none()
            && a.use_stored.is_none()
            && !a.data.is_empty()
    };
    plain(prev)
        && plain(next)
        && prev.optional == next.optional
        && prev.critical == next.critical
        && prev.inferred == next.inferred
}

fn repeated_navigation(prev: &Action, next: &Action) -> bool {
    prev.kind == ActionKind::Navigate
        && next.kind == ActionKind::Navigate
        && next.condition.is_none()
        && prev.value == next.value
}

/// Merge consecutive fills (later value wins on a key collision) and drop
/// an immediately repeated navigation to the same URL.
///
/// A single left fold, so `optimize(&optimize(x)) == optimize(x)`.
pub fn optimize(actions: &[Action]) -> Vec<Action> {
    actions
        .iter()
        .cloned()
        .fold(Vec::with_capacity(actions.len()), |mut out: Vec<Action>, action| {
            match out.last_mut() {
                Some(prev) if mergeable_fills(prev, &action) => {
                    trace!(keys = action.data.len(), "Merging consecutive fills");
                    prev.data.extend(action.data);
                    let keys = prev.data.keys().cloned().collect::<Vec<_>>().join(", ");
                    prev.description = format!("Fill {}", keys);
                }
                Some(prev) if repeated_navigation(prev, &action) => {
                    trace!(url = ?action.value, "Dropping repeated navigation");
                }
                _ => out.push(action),
            }
            out
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn fill(pairs: &[(&str, &str)]) -> Action {
        Action::fill(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<IndexMap<_, _>>(),
        )
    }

    #[test]
    fn test_merges_consecutive_fills_later_wins() {
        let actions = vec![
            fill(&[("email", "a@b.co"), ("name", "Ann")]),
            fill(&[("name", "Bob"), ("password", "pw")]),
        ];
        let out = optimize(&actions);
        assert_eq!(out.len(), 1);
        assert_eq!(
            out[0].data.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect::<Vec<_>>(),
            vec![("email", "a@b.co"), ("name", "Bob"), ("password", "pw")]
        );
        assert_eq!(out[0].description, "Fill email, name, password");
    }

    #[test]
    fn test_drops_repeated_navigation() {
        let actions = vec![
            Action::navigate("/signup"),
            Action::navigate("/signup"),
            Action::navigate("/login"),
            Action::navigate("/signup"),
        ];
        let out = optimize(&actions);
        let urls: Vec<_> = out.iter().filter_map(|a| a.value.as_deref()).collect();
        assert_eq!(urls, vec!["/signup", "/login", "/signup"]);
    }

    #[test]
    fn test_non_adjacent_fills_stay_apart() {
        let actions = vec![
            fill(&[("email", "a@b.co")]),
            Action::click("next button"),
            fill(&[("password", "pw")]),
        ];
        assert_eq!(optimize(&actions).len(), 3);
    }

    #[test]
    fn test_linked_fills_are_not_merged() {
        let actions = vec![
            fill(&[("email", "")]).store_as("generated_email"),
            fill(&[("email", "")]).use_stored("generated_email"),
        ];
        assert_eq!(optimize(&actions).len(), 2);
    }

    #[test]
    fn test_optimize_is_idempotent() {
        let actions = vec![
            Action::navigate("/a"),
            Action::navigate("/a"),
            fill(&[("x", "1")]),
            fill(&[("y", "2")]),
            fill(&[("x", "3")]).optional(),
            fill(&[("z", "4")]).optional(),
            Action::navigate("/a"),
            Action::click("go"),
            Action::navigate("/b"),
            Action::navigate("/b"),
        ];
        let once = optimize(&actions);
        assert_eq!(optimize(&once), once);
        assert_eq!(once.len(), 6);
    }

    #[test]
    fn test_empty_input() {
        assert!(optimize(&[]).is_empty());
    }
}

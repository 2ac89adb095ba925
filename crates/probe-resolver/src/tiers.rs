//! Resolution tiers
//!
//! Each tier is a pure function of (page, query) returning the first
//! matching candidate. [`first_match`] runs them in order and stops at the
//! first hit; ties inside a tier go to document order.

use crate::labels::{caption_groups, recover_label};
use crate::similarity::{normalize, partial_match, similarity};
use probe_core::config::ResolverConfig;
use probe_core::{DomElement, DomSnapshot, FieldKind, FieldMapping, Tier};
use serde::{Deserialize, Serialize};

/// What to resolve: a control family, its group name, and the human label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldQuery {
    pub kind: FieldKind,
    /// Group name (`name` attribute) for checkbox, radio and select; unused for generic fields
    pub name: String,
    pub label: String,
}

impl FieldQuery {
    pub fn new(kind: FieldKind, name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            label: label.into(),
        }
    }

    pub fn generic(label: impl Into<String>) -> Self {
        Self::new(FieldKind::Generic, "", label)
    }
}

/// A control that could satisfy the query
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub element: &'a DomElement,
    /// Technical value: `value` for toggles and options, name or id for generic fields
    pub value: String,
    pub label: Option<String>,
}

/// Everything a tier may look at
pub struct TierInput<'a> {
    pub page: &'a DomSnapshot,
    pub query: &'a FieldQuery,
    pub candidates: Vec<Candidate<'a>>,
    pub config: &'a ResolverConfig,
}

pub type TierFn = for<'a> fn(&TierInput<'a>) -> Option<usize>;

/// Collect candidates of the query's kind in document order
pub fn candidates<'a>(page: &'a DomSnapshot, query: &FieldQuery) -> Vec<Candidate<'a>> {
    let same_group = |e: &DomElement| query.name.is_empty() || e.name.as_deref() == Some(query.name.as_str());
    let elements: Vec<&DomElement> = match query.kind {
        FieldKind::Checkbox => page
            .elements
            .iter()
            .filter(|e| e.is_checkbox() && same_group(*e))
            .collect(),
        FieldKind::Radio => page
            .elements
            .iter()
            .filter(|e| e.is_radio() && same_group(*e))
            .collect(),
        FieldKind::Select => page
            .elements
            .iter()
            .filter(|e| e.is_select() && same_group(*e))
            .flat_map(|select| {
                page.elements
                    .iter()
                    .filter(move |o| o.is_option() && page.is_descendant(o.index, select.index))
            })
            .collect(),
        FieldKind::Generic => page.elements.iter().filter(|e| e.is_fillable()).collect(),
    };

    elements
        .into_iter()
        .filter_map(|element| {
            let value = match query.kind {
                FieldKind::Generic => element
                    .name
                    .clone()
                    .filter(|n| !n.is_empty())
                    .or_else(|| element.id.clone())?,
                FieldKind::Select => element
                    .value
                    .clone()
                    .unwrap_or_else(|| element.text.trim().to_string()),
                _ => element.value.clone().unwrap_or_else(|| "on".to_string()),
            };
            Some(Candidate {
                element,
                label: recover_label(page, element.index),
                value,
            })
        })
        .collect()
}

/// Run tiers in order; first hit wins
pub fn first_match(input: &TierInput<'_>, tiers: &[(Tier, TierFn)]) -> Option<(Tier, usize)> {
    tiers
        .iter()
        .find_map(|(tier, run)| run(input).map(|idx| (*tier, idx)))
}

fn eq_ci(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

pub fn exact_value(input: &TierInput<'_>) -> Option<usize> {
    input
        .candidates
        .iter()
        .position(|c| c.value == input.query.label)
}

pub fn normalized_value(input: &TierInput<'_>) -> Option<usize> {
    let wanted = normalize(&input.query.label);
    if wanted.is_empty() {
        return None;
    }
    input
        .candidates
        .iter()
        .position(|c| normalize(&c.value) == wanted)
}

pub fn label_text(input: &TierInput<'_>) -> Option<usize> {
    input.candidates.iter().position(|c| {
        c.label
            .as_deref()
            .is_some_and(|label| eq_ci(label, &input.query.label))
    })
}

pub fn fuzzy_label(input: &TierInput<'_>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, candidate) in input.candidates.iter().enumerate() {
        let Some(label) = candidate.label.as_deref() else {
            continue;
        };
        let score = similarity(label, &input.query.label);
        if score > input.config.fuzzy_threshold && best.map_or(true, |(_, s)| score > s) {
            best = Some((idx, score));
        }
    }
    best.map(|(idx, _)| idx)
}

pub fn partial(input: &TierInput<'_>) -> Option<usize> {
    let len = input.config.partial_prefix_len;
    let wanted = &input.query.label;
    input.candidates.iter().position(|c| {
        partial_match(wanted, &c.value, len)
            || c.label
                .as_deref()
                .is_some_and(|label| partial_match(wanted, label, len))
    })
}

pub fn label_containment(input: &TierInput<'_>) -> Option<usize> {
    let wanted = input.query.label.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    input.candidates.iter().position(|c| {
        caption_groups(input.page, c.element.index)
            .iter()
            .any(|group| input.page.deep_text(group.index).to_lowercase().contains(&wanted))
    })
}

const DESCRIPTIVE_ATTRS: &[&str] = &["aria-label", "data-label", "data-value", "title", "placeholder"];

pub fn aria_attribute(input: &TierInput<'_>) -> Option<usize> {
    let wanted = input.query.label.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    input.candidates.iter().position(|c| {
        DESCRIPTIVE_ATTRS.iter().any(|attr| {
            c.element
                .attr(attr)
                .is_some_and(|v| v.to_lowercase().contains(&wanted))
        })
    })
}

/// Semantic tier body: the mapped value must differ from the label and name a real candidate
pub fn mapped_value(input: &TierInput<'_>, mapped: &str) -> Option<usize> {
    if mapped.trim().is_empty() || eq_ci(mapped, &input.query.label) {
        return None;
    }
    let wanted = normalize(mapped);
    input
        .candidates
        .iter()
        .position(|c| c.value == mapped || normalize(&c.value) == wanted)
}

/// Tiers before the semantic step
pub const LEXICAL_TIERS: &[(Tier, TierFn)] = &[
    (Tier::ExactValue, exact_value),
    (Tier::NormalizedValue, normalized_value),
    (Tier::LabelText, label_text),
    (Tier::FuzzyLabel, fuzzy_label),
    (Tier::Partial, partial),
    (Tier::LabelContainment, label_containment),
];

/// Tiers after the semantic step
pub const ATTRIBUTE_TIERS: &[(Tier, TierFn)] = &[(Tier::AriaAttribute, aria_attribute)];

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn is_css_ident(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Selector for an element by id, robust to ids that are not CSS identifiers
pub fn id_selector(id: &str) -> String {
    if is_css_ident(id) {
        format!("#{}", id)
    } else {
        format!("[id={}]", quote(id))
    }
}

pub fn index_selector(index: usize) -> String {
    format!("[data-probe-index=\"{}\"]", index)
}

/// Priority-ordered selectors for a resolved candidate
pub fn selectors_for(page: &DomSnapshot, kind: FieldKind, candidate: &Candidate<'_>) -> Vec<String> {
    let elem = candidate.element;
    let mut selectors = Vec::new();
    match kind {
        FieldKind::Checkbox | FieldKind::Radio => {
            let mut sel = format!("input[type=\"{}\"]", kind);
            if let Some(name) = elem.name.as_deref() {
                sel.push_str(&format!("[name={}]", quote(name)));
            }
            if let Some(value) = elem.value.as_deref() {
                sel.push_str(&format!("[value={}]", quote(value)));
            }
            selectors.push(sel);
        }
        FieldKind::Select => {
            let select = page
                .ancestors(elem.index)
                .into_iter()
                .find(|a| a.is_select());
            if let Some(select) = select {
                let parent = match select.name.as_deref() {
                    Some(name) => format!("select[name={}]", quote(name)),
                    None => index_selector(select.index),
                };
                selectors.push(format!("{} option[value={}]", parent, quote(&candidate.value)));
            }
        }
        FieldKind::Generic => {
            if let Some(name) = elem.name.as_deref().filter(|n| !n.is_empty()) {
                selectors.push(format!("{}[name={}]", elem.tag, quote(name)));
            }
        }
    }
    if let Some(id) = elem.id.as_deref().filter(|id| !id.is_empty()) {
        selectors.push(id_selector(id));
    }
    selectors.push(index_selector(elem.index));
    selectors
}

/// Build the mapping record for a winning candidate
pub fn mapping_for(candidate: &Candidate<'_>, selector: String, tier: Tier) -> FieldMapping {
    FieldMapping {
        raw_value: candidate.value.clone(),
        recovered_label: candidate.label.clone(),
        selector,
        position_index: candidate.element.index,
        tier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(index: usize, kind: &str, name: &str, value: &str) -> DomElement {
        let mut e = DomElement::new(index, "input");
        e.input_type = Some(kind.to_string());
        e.name = Some(name.to_string());
        e.value = Some(value.to_string());
        e.parent = Some(0);
        e
    }

    fn page(elements: Vec<DomElement>) -> DomSnapshot {
        let mut all = vec![DomElement::new(0, "form")];
        all.extend(elements);
        DomSnapshot {
            elements: all,
            ..DomSnapshot::default()
        }
    }

    fn run(page: &DomSnapshot, query: &FieldQuery, tier: TierFn) -> Option<usize> {
        let config = ResolverConfig::default();
        let input = TierInput {
            page,
            query,
            candidates: candidates(page, query),
            config: &config,
        };
        tier(&input)
    }

    #[test]
    fn test_exact_value_tier() {
        let page = page(vec![
            input(1, "radio", "plan", "basic"),
            input(2, "radio", "plan", "pro"),
        ]);
        let query = FieldQuery::new(FieldKind::Radio, "plan", "pro");
        assert_eq!(run(&page, &query, exact_value), Some(1));
        let query = FieldQuery::new(FieldKind::Radio, "plan", "Pro");
        assert_eq!(run(&page, &query, exact_value), None);
        assert_eq!(run(&page, &query, normalized_value), Some(1));
    }

    #[test]
    fn test_candidates_respect_group_name() {
        let page = page(vec![
            input(1, "checkbox", "interests", "tech"),
            input(2, "checkbox", "newsletter", "yes"),
        ]);
        let query = FieldQuery::new(FieldKind::Checkbox, "interests", "x");
        let found = candidates(&page, &query);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value, "tech");
    }

    #[test]
    fn test_fuzzy_prefers_highest_score() {
        let mut first_label = DomElement::new(3, "span");
        first_label.text = "Colour".to_string();
        first_label.parent = Some(0);
        let mut second_label = DomElement::new(5, "span");
        second_label.text = "Color".to_string();
        second_label.parent = Some(0);
        let page = page(vec![
            input(1, "checkbox", "prefs", "c1"),
            DomElement {
                parent: Some(0),
                ..DomElement::new(2, "br")
            },
            first_label,
            input(4, "checkbox", "prefs", "c2"),
            second_label,
        ]);
        // c1 reads "Colour" (0.67), c2 reads "Color" (containment, 0.8)
        let query = FieldQuery::new(FieldKind::Checkbox, "prefs", "Colors");
        assert_eq!(run(&page, &query, fuzzy_label), Some(1));
    }

    #[test]
    fn test_aria_attribute_tier() {
        let mut field = input(1, "text", "q1", "");
        field.attributes.insert("aria-label".to_string(), "Your favourite colour".to_string());
        let page = page(vec![field]);
        let query = FieldQuery::generic("favourite colour");
        assert_eq!(run(&page, &query, aria_attribute), Some(0));
        assert_eq!(run(&page, &query, label_text), None);
    }

    #[test]
    fn test_selectors_are_priority_ordered() {
        let mut elem = input(7, "checkbox", "interests", "tech");
        elem.id = Some("interest-tech".to_string());
        let page = page(vec![elem]);
        let query = FieldQuery::new(FieldKind::Checkbox, "interests", "tech");
        let found = candidates(&page, &query);
        assert_eq!(
            selectors_for(&page, FieldKind::Checkbox, &found[0]),
            vec![
                r#"input[type="checkbox"][name="interests"][value="tech"]"#.to_string(),
                "#interest-tech".to_string(),
                r#"[data-probe-index="7"]"#.to_string(),
            ]
        );
    }

    #[test]
    fn test_id_selector_escapes_non_identifiers() {
        assert_eq!(id_selector("email"), "#email");
        assert_eq!(id_selector("1st"), r#"[id="1st"]"#);
    }
}

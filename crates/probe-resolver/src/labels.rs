//! Human label recovery for form controls
//!
//! Association order: a wrapping `<label>`, a `<label for=id>`, then the
//! nearest sibling text, then the parent's own text when the parent holds
//! no other control.

use probe_core::{DomElement, DomSnapshot};

/// Elements that group a control with its caption
const GROUPING_TAGS: &[&str] = &[
    "label", "fieldset", "div", "li", "p", "span", "td", "th", "section", "legend",
];

fn non_empty(text: String) -> Option<String> {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

fn wrapping_label(page: &DomSnapshot, elem: &DomElement) -> Option<String> {
    page.ancestors(elem.index)
        .into_iter()
        .find(|a| a.tag == "label")
        .and_then(|label| non_empty(page.deep_text(label.index)))
}

fn label_for(page: &DomSnapshot, elem: &DomElement) -> Option<String> {
    let id = elem.id.as_deref().filter(|id| !id.is_empty())?;
    page.elements
        .iter()
        .find(|e| e.tag == "label" && e.attr("for") == Some(id))
        .and_then(|label| non_empty(page.deep_text(label.index)))
}

fn is_caption(elem: &DomElement) -> bool {
    !elem.is_form_control() && !elem.is_submit()
}

fn sibling_text(page: &DomSnapshot, elem: &DomElement) -> Option<String> {
    let parent = elem.parent?;
    let siblings: Vec<&DomElement> = page.children(parent).collect();
    let pos = siblings.iter().position(|s| s.index == elem.index)?;

    let next = siblings[pos + 1..]
        .iter()
        .take_while(|s| !s.is_form_control())
        .filter(|s| is_caption(s))
        .find_map(|s| non_empty(page.deep_text(s.index)));
    if next.is_some() {
        return next;
    }
    let previous = siblings[..pos]
        .iter()
        .rev()
        .take_while(|s| !s.is_form_control())
        .filter(|s| is_caption(s))
        .find_map(|s| non_empty(page.deep_text(s.index)));
    if previous.is_some() {
        return previous;
    }

    let parent_elem = page.element(parent)?;
    if matches!(parent_elem.tag.as_str(), "form" | "body" | "html") {
        return None;
    }
    let controls = siblings.iter().filter(|s| s.is_form_control()).count();
    if controls == 1 {
        non_empty(parent_elem.text.clone())
    } else {
        None
    }
}

/// Recover the label a user sees next to the control at `index`
pub fn recover_label(page: &DomSnapshot, index: usize) -> Option<String> {
    let elem = page.element(index)?;
    if elem.is_option() {
        return non_empty(elem.text.clone());
    }
    wrapping_label(page, elem)
        .or_else(|| label_for(page, elem))
        .or_else(|| sibling_text(page, elem))
}

/// Nearest grouping element around the control, including a `for` label
pub fn caption_groups<'a>(page: &'a DomSnapshot, index: usize) -> Vec<&'a DomElement> {
    let mut groups = Vec::new();
    if let Some(elem) = page.element(index) {
        if let Some(id) = elem.id.as_deref().filter(|id| !id.is_empty()) {
            groups.extend(
                page.elements
                    .iter()
                    .filter(|e| e.tag == "label" && e.attr("for") == Some(id)),
            );
        }
    }
    if let Some(nearest) = page
        .ancestors(index)
        .into_iter()
        .find(|a| GROUPING_TAGS.contains(&a.tag.as_str()))
    {
        groups.push(nearest);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elem(index: usize, tag: &str, parent: Option<usize>) -> DomElement {
        let mut e = DomElement::new(index, tag);
        e.parent = parent;
        e
    }

    fn checkbox(index: usize, parent: Option<usize>, value: &str) -> DomElement {
        let mut e = elem(index, "input", parent);
        e.input_type = Some("checkbox".to_string());
        e.name = Some("interests".to_string());
        e.value = Some(value.to_string());
        e
    }

    #[test]
    fn test_wrapping_label() {
        let mut label = elem(1, "label", Some(0));
        label.text = "Technology".to_string();
        let page = DomSnapshot {
            elements: vec![elem(0, "form", None), label, checkbox(2, Some(1), "tech")],
            ..DomSnapshot::default()
        };
        assert_eq!(recover_label(&page, 2).as_deref(), Some("Technology"));
    }

    #[test]
    fn test_label_for_association() {
        let mut input = checkbox(1, Some(0), "tech");
        input.id = Some("i-tech".to_string());
        let mut label = elem(2, "label", Some(0));
        label.text = "Tech & Gadgets".to_string();
        label.attributes.insert("for".to_string(), "i-tech".to_string());
        let page = DomSnapshot {
            elements: vec![elem(0, "form", None), input, label],
            ..DomSnapshot::default()
        };
        assert_eq!(recover_label(&page, 1).as_deref(), Some("Tech & Gadgets"));
        assert_eq!(caption_groups(&page, 1)[0].index, 2);
    }

    #[test]
    fn test_nearest_sibling_text_stops_at_next_control() {
        let mut first_text = elem(2, "span", Some(0));
        first_text.text = "Travel".to_string();
        let mut second_text = elem(4, "span", Some(0));
        second_text.text = "Sports".to_string();
        let page = DomSnapshot {
            elements: vec![
                elem(0, "div", None),
                checkbox(1, Some(0), "travel"),
                first_text,
                checkbox(3, Some(0), "sports"),
                second_text,
            ],
            ..DomSnapshot::default()
        };
        assert_eq!(recover_label(&page, 1).as_deref(), Some("Travel"));
        assert_eq!(recover_label(&page, 3).as_deref(), Some("Sports"));
    }

    #[test]
    fn test_bare_controls_have_no_label() {
        let page = DomSnapshot {
            elements: vec![
                elem(0, "form", None),
                checkbox(1, Some(0), "tech"),
                checkbox(2, Some(0), "travel"),
            ],
            ..DomSnapshot::default()
        };
        assert_eq!(recover_label(&page, 1), None);
    }
}

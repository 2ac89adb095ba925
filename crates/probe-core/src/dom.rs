//! Serializable DOM snapshot model
//!
//! The browser crate captures a page into this shape with one in-page
//! script. Every resolution tier and the form inference engine are pure
//! functions over it, so they can be tested without a browser.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One element, in document order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomElement {
    /// Position in document order; also the `data-probe-index` stamp
    pub index: usize,
    /// Lower-case tag name
    pub tag: String,
    #[serde(default, rename = "type")]
    pub input_type: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    /// Own trimmed text content
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub parent: Option<usize>,
    #[serde(default)]
    pub checked: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub form: Option<usize>,
    /// Element lives inside an open shadow root
    #[serde(default)]
    pub in_shadow: bool,
}

impl DomElement {
    pub fn new(index: usize, tag: &str) -> Self {
        Self {
            index,
            tag: tag.to_lowercase(),
            ..Self::default()
        }
    }

    /// Look up an attribute, falling back to the first-class fields
    pub fn attr(&self, name: &str) -> Option<&str> {
        if let Some(value) = self.attributes.get(name) {
            return Some(value.as_str());
        }
        match name {
            "id" => self.id.as_deref(),
            "name" => self.name.as_deref(),
            "value" => self.value.as_deref(),
            "type" => self.input_type.as_deref(),
            "placeholder" => self.placeholder.as_deref(),
            _ => None,
        }
    }

    /// Declared type, lower-cased; `text` for bare inputs
    pub fn declared_type(&self) -> String {
        match (self.tag.as_str(), self.input_type.as_deref()) {
            ("input", Some(t)) if !t.is_empty() => t.to_lowercase(),
            ("input", _) => "text".to_string(),
            ("select", _) => "select".to_string(),
            ("textarea", _) => "textarea".to_string(),
            ("button", Some(t)) => t.to_lowercase(),
            ("button", None) => "submit".to_string(),
            (tag, _) => tag.to_string(),
        }
    }

    pub fn is_checkbox(&self) -> bool {
        self.tag == "input" && self.declared_type() == "checkbox"
    }

    pub fn is_radio(&self) -> bool {
        self.tag == "input" && self.declared_type() == "radio"
    }

    pub fn is_select(&self) -> bool {
        self.tag == "select"
    }

    pub fn is_option(&self) -> bool {
        self.tag == "option"
    }

    /// Accepts typed text
    pub fn is_fillable(&self) -> bool {
        match self.tag.as_str() {
            "textarea" => true,
            "input" => !matches!(
                self.declared_type().as_str(),
                "checkbox" | "radio" | "submit" | "button" | "reset" | "image" | "hidden" | "file"
            ),
            _ => self.attr("contenteditable") == Some("true"),
        }
    }

    /// Form control of any sort (text, toggle, select)
    pub fn is_form_control(&self) -> bool {
        self.is_fillable() || self.is_checkbox() || self.is_radio() || self.is_select()
    }

    pub fn is_submit(&self) -> bool {
        matches!(self.tag.as_str(), "button" | "input") && self.declared_type() == "submit"
    }

    pub fn is_clickable(&self) -> bool {
        match self.tag.as_str() {
            "button" | "a" | "summary" => true,
            "input" => matches!(
                self.declared_type().as_str(),
                "submit" | "button" | "reset" | "image" | "checkbox" | "radio"
            ),
            _ => matches!(
                self.attr("role"),
                Some("button") | Some("link") | Some("checkbox") | Some("tab") | Some("menuitem")
            ),
        }
    }

    /// Text a user would read on the element itself
    pub fn visible_text(&self) -> Option<&str> {
        let text = self.text.trim();
        if !text.is_empty() {
            return Some(text);
        }
        if self.tag == "input" && matches!(self.declared_type().as_str(), "submit" | "button") {
            return self.value.as_deref();
        }
        self.attr("aria-label")
    }
}

/// Field summary inside a [`FormSnapshot`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormFieldSnapshot {
    pub name: String,
    #[serde(default, rename = "type")]
    pub field_type: String,
    pub selector: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub required: bool,
}

/// One `<form>` (or form-like container) on the page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSnapshot {
    pub index: usize,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    pub selector: String,
    #[serde(default)]
    pub fields: Vec<FormFieldSnapshot>,
    #[serde(default)]
    pub submit_text: Option<String>,
    #[serde(default)]
    pub submit_selector: Option<String>,
}

/// Whole-page capture
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomSnapshot {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub elements: Vec<DomElement>,
    #[serde(default)]
    pub forms: Vec<FormSnapshot>,
    #[serde(default)]
    pub frame_count: usize,
}

impl DomSnapshot {
    pub fn element(&self, index: usize) -> Option<&DomElement> {
        self.elements.get(index).filter(|e| e.index == index).or_else(|| {
            self.elements.iter().find(|e| e.index == index)
        })
    }

    pub fn children(&self, index: usize) -> impl Iterator<Item = &DomElement> {
        self.elements
            .iter()
            .filter(move |e| e.parent == Some(index))
    }

    /// Walk from the element's parent up to the root
    pub fn ancestors(&self, index: usize) -> Vec<&DomElement> {
        let mut chain = Vec::new();
        let mut current = self.element(index).and_then(|e| e.parent);
        while let Some(idx) = current {
            let Some(elem) = self.element(idx) else {
                break;
            };
            // Malformed parent links must not loop forever
            if chain.len() > self.elements.len() {
                break;
            }
            chain.push(elem);
            current = elem.parent;
        }
        chain
    }

    pub fn is_descendant(&self, index: usize, ancestor: usize) -> bool {
        self.ancestors(index).iter().any(|a| a.index == ancestor)
    }

    /// Full text of an element including descendants, space-joined
    pub fn deep_text(&self, index: usize) -> String {
        let mut parts = Vec::new();
        if let Some(elem) = self.element(index) {
            if !elem.text.trim().is_empty() {
                parts.push(elem.text.trim().to_string());
            }
        }
        for child in self.children(index) {
            let text = self.deep_text(child.index);
            if !text.is_empty() {
                parts.push(text);
            }
        }
        parts.join(" ")
    }

    /// All visible text on the page, lower-cased, for containment checks
    pub fn page_text(&self) -> String {
        self.elements
            .iter()
            .filter(|e| !matches!(e.tag.as_str(), "script" | "style"))
            .map(|e| e.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label_wrapping_input() -> DomSnapshot {
        let mut label = DomElement::new(0, "label");
        label.text = "Email".to_string();
        let mut input = DomElement::new(1, "input");
        input.input_type = Some("email".to_string());
        input.name = Some("email".to_string());
        input.parent = Some(0);
        let mut hint = DomElement::new(2, "span");
        hint.text = "required".to_string();
        hint.parent = Some(0);
        DomSnapshot {
            elements: vec![label, input, hint],
            ..DomSnapshot::default()
        }
    }

    #[test]
    fn test_tree_navigation() {
        let snap = label_wrapping_input();
        assert!(snap.is_descendant(1, 0));
        assert!(!snap.is_descendant(0, 1));
        assert_eq!(snap.children(0).count(), 2);
        assert_eq!(snap.deep_text(0), "Email required");
    }

    #[test]
    fn test_element_classification() {
        let snap = label_wrapping_input();
        let input = snap.element(1).unwrap();
        assert!(input.is_fillable());
        assert!(!input.is_checkbox());
        assert_eq!(input.attr("name"), Some("email"));

        let mut button = DomElement::new(3, "button");
        button.text = "Sign up".to_string();
        assert!(button.is_submit());
        assert!(button.is_clickable());
        assert_eq!(button.visible_text(), Some("Sign up"));
    }

    #[test]
    fn test_snapshot_deserializes_camel_case() {
        let json = serde_json::json!({
            "url": "http://localhost/test",
            "elements": [
                {"index": 0, "tag": "input", "type": "checkbox", "name": "interests",
                 "value": "tech", "inShadow": false}
            ],
            "frameCount": 1
        });
        let snap: DomSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(snap.frame_count, 1);
        assert!(snap.elements[0].is_checkbox());
    }
}

//! Builder for in-memory pages used with [`MockDriver`](crate::MockDriver)

use probe_core::{DomElement, DomSnapshot, FormFieldSnapshot, FormSnapshot};

/// Builds a [`DomSnapshot`] the way the snapshot script would capture it:
/// document-ordered elements under a `body`, plus form summaries.
///
/// ```
/// use probe_browser::PageBuilder;
///
/// let page = PageBuilder::new("http://localhost/signup")
///     .title("Sign up")
///     .begin_form("signup")
///     .labeled_input("Email", "email", "email")
///     .button("Create account")
///     .end_form()
///     .build();
/// assert_eq!(page.forms.len(), 1);
/// ```
pub struct PageBuilder {
    snapshot: DomSnapshot,
    open_form: Option<(usize, usize)>,
    last_control: Option<usize>,
}

impl PageBuilder {
    pub fn new(url: impl Into<String>) -> Self {
        let body = DomElement::new(0, "body");
        Self {
            snapshot: DomSnapshot {
                url: url.into(),
                elements: vec![body],
                ..DomSnapshot::default()
            },
            open_form: None,
            last_control: None,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.snapshot.title = title.into();
        self
    }

    pub fn frames(mut self, count: usize) -> Self {
        self.snapshot.frame_count = count;
        self
    }

    fn container(&self) -> usize {
        self.open_form.map_or(0, |(elem, _)| elem)
    }

    fn push(&mut self, tag: &str, parent: usize) -> usize {
        let index = self.snapshot.elements.len();
        let mut elem = DomElement::new(index, tag);
        elem.parent = Some(parent);
        elem.form = self.open_form.map(|(_, form)| form);
        self.snapshot.elements.push(elem);
        index
    }

    fn elem(&mut self, index: usize) -> &mut DomElement {
        &mut self.snapshot.elements[index]
    }

    fn add_field(&mut self, field: FormFieldSnapshot) {
        if let Some((_, form)) = self.open_form {
            self.snapshot.forms[form].fields.push(field);
        }
    }

    /// Any element with text, e.g. a heading or status message
    pub fn text(mut self, tag: &str, text: &str) -> Self {
        let parent = self.container();
        let index = self.push(tag, parent);
        self.elem(index).text = text.to_string();
        self
    }

    pub fn begin_form(mut self, id: &str) -> Self {
        let index = self.push("form", 0);
        self.elem(index).id = Some(id.to_string());
        let form = self.snapshot.forms.len();
        self.snapshot.forms.push(FormSnapshot {
            index: form,
            id: Some(id.to_string()),
            selector: format!("#{}", id),
            ..FormSnapshot::default()
        });
        self.elem(index).form = Some(form);
        self.open_form = Some((index, form));
        self
    }

    pub fn end_form(mut self) -> Self {
        self.open_form = None;
        self
    }

    /// `<label for=name>` followed by `<input id=name name=name>`
    pub fn labeled_input(mut self, label: &str, input_type: &str, name: &str) -> Self {
        let parent = self.container();
        let label_idx = self.push("label", parent);
        self.elem(label_idx).text = label.to_string();
        self.elem(label_idx)
            .attributes
            .insert("for".to_string(), name.to_string());

        let input = self.push("input", parent);
        let elem = self.elem(input);
        elem.input_type = Some(input_type.to_string());
        elem.id = Some(name.to_string());
        elem.name = Some(name.to_string());
        self.last_control = Some(input);

        self.add_field(FormFieldSnapshot {
            name: name.to_string(),
            field_type: input_type.to_string(),
            selector: format!("#{}", name),
            id: Some(name.to_string()),
            label: Some(label.to_string()),
            ..FormFieldSnapshot::default()
        });
        self
    }

    /// Unlabeled input identified only by name and placeholder
    pub fn input(mut self, input_type: &str, name: &str, placeholder: Option<&str>) -> Self {
        let parent = self.container();
        let input = self.push("input", parent);
        let elem = self.elem(input);
        elem.input_type = Some(input_type.to_string());
        elem.name = Some(name.to_string());
        elem.placeholder = placeholder.map(String::from);
        self.last_control = Some(input);

        self.add_field(FormFieldSnapshot {
            name: name.to_string(),
            field_type: input_type.to_string(),
            selector: format!("input[name=\"{}\"]", name),
            placeholder: placeholder.map(String::from),
            ..FormFieldSnapshot::default()
        });
        self
    }

    fn toggle(mut self, kind: &str, name: &str, value: &str, label: &str) -> Self {
        let parent = self.container();
        let wrapper = self.push("label", parent);
        self.elem(wrapper).text = label.to_string();
        let input = self.push("input", wrapper);
        let elem = self.elem(input);
        elem.input_type = Some(kind.to_string());
        elem.name = Some(name.to_string());
        elem.value = Some(value.to_string());
        self.last_control = Some(input);

        self.add_field(FormFieldSnapshot {
            name: name.to_string(),
            field_type: kind.to_string(),
            selector: format!("input[type=\"{}\"][name=\"{}\"][value=\"{}\"]", kind, name, value),
            label: Some(label.to_string()),
            ..FormFieldSnapshot::default()
        });
        self
    }

    /// `<label><input type=checkbox name value> label</label>`
    pub fn checkbox(self, name: &str, value: &str, label: &str) -> Self {
        self.toggle("checkbox", name, value, label)
    }

    pub fn radio(self, name: &str, value: &str, label: &str) -> Self {
        self.toggle("radio", name, value, label)
    }

    /// `<select name>` with `(value, text)` options
    pub fn select(mut self, name: &str, label: &str, options: &[(&str, &str)]) -> Self {
        let parent = self.container();
        let label_idx = self.push("label", parent);
        self.elem(label_idx).text = label.to_string();
        self.elem(label_idx)
            .attributes
            .insert("for".to_string(), name.to_string());

        let select = self.push("select", parent);
        let elem = self.elem(select);
        elem.id = Some(name.to_string());
        elem.name = Some(name.to_string());
        elem.value = options.first().map(|(v, _)| v.to_string());
        self.last_control = Some(select);

        for (value, text) in options {
            let option = self.push("option", select);
            let elem = self.elem(option);
            elem.value = Some(value.to_string());
            elem.text = text.to_string();
        }

        self.add_field(FormFieldSnapshot {
            name: name.to_string(),
            field_type: "select".to_string(),
            selector: format!("#{}", name),
            id: Some(name.to_string()),
            label: Some(label.to_string()),
            ..FormFieldSnapshot::default()
        });
        self
    }

    /// Mark the most recently added control required
    pub fn required(mut self) -> Self {
        if let Some(index) = self.last_control {
            self.elem(index).required = true;
            let name = self.snapshot.elements[index].name.clone();
            if let Some((_, form)) = self.open_form {
                if let Some(field) = self.snapshot.forms[form]
                    .fields
                    .iter_mut()
                    .rev()
                    .find(|f| Some(&f.name) == name.as_ref())
                {
                    field.required = true;
                }
            }
        }
        self
    }

    /// A button; inside a form it becomes the form's submit control
    pub fn button(mut self, text: &str) -> Self {
        let parent = self.container();
        let index = self.push("button", parent);
        self.elem(index).text = text.to_string();
        if let Some((_, form)) = self.open_form {
            let summary = &mut self.snapshot.forms[form];
            if summary.submit_text.is_none() {
                summary.submit_text = Some(text.to_string());
                summary.submit_selector = Some(format!("[data-probe-index=\"{}\"]", index));
            }
        } else {
            self.elem(index).input_type = Some("button".to_string());
        }
        self
    }

    /// Give the most recent element an id
    pub fn with_id(mut self, id: &str) -> Self {
        if let Some(last) = self.snapshot.elements.last_mut() {
            last.id = Some(id.to_string());
        }
        self
    }

    pub fn link(mut self, text: &str, href: &str) -> Self {
        let parent = self.container();
        let index = self.push("a", parent);
        let elem = self.elem(index);
        elem.text = text.to_string();
        elem.attributes.insert("href".to_string(), href.to_string());
        self
    }

    pub fn build(self) -> DomSnapshot {
        self.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_summary_tracks_fields() {
        let page = PageBuilder::new("http://localhost/signup")
            .begin_form("signup")
            .labeled_input("Email", "email", "email")
            .required()
            .checkbox("interests", "tech", "Technology")
            .select("country", "Country", &[("us", "United States"), ("ca", "Canada")])
            .button("Sign up")
            .end_form()
            .text("p", "Already registered?")
            .build();

        let form = &page.forms[0];
        assert_eq!(form.fields.len(), 3);
        assert!(form.fields[0].required);
        assert_eq!(form.submit_text.as_deref(), Some("Sign up"));

        let email = page.elements.iter().find(|e| e.id.as_deref() == Some("email")).unwrap();
        assert_eq!(email.form, Some(0));
        assert!(email.required);
        let note = page.elements.last().unwrap();
        assert_eq!(note.form, None);
        assert_eq!(note.parent, Some(0));
    }

    #[test]
    fn test_button_outside_form_is_not_submit() {
        let page = PageBuilder::new("http://localhost/").button("Menu").build();
        assert!(!page.elements[1].is_submit());
        assert!(page.elements[1].is_clickable());
    }
}

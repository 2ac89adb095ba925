//! Minimal CSS selector matching over a [`DomSnapshot`]
//!
//! Covers what the resolver emits: tag names, `#id`, `.class`, attribute
//! tests (`[a]`, `[a="v"]`, `[a=v]`) and the descendant combinator.
//! Anything else fails to parse and matches nothing.

use probe_core::{DomElement, DomSnapshot};

#[derive(Debug, Clone, PartialEq)]
enum Test {
    Tag(String),
    Id(String),
    Class(String),
    HasAttr(String),
    AttrEq(String, String),
}

#[derive(Debug, Clone, PartialEq)]
struct Compound(Vec<Test>);

/// Parsed selector: compounds joined by descendant combinators
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    parts: Vec<Compound>,
}

impl Selector {
    pub fn parse(input: &str) -> Option<Self> {
        let mut parts = Vec::new();
        for chunk in split_descendants(input.trim())? {
            parts.push(parse_compound(&chunk)?);
        }
        (!parts.is_empty()).then_some(Self { parts })
    }

    /// Whether `elem` is matched (right-most compound binds to it)
    pub fn matches(&self, page: &DomSnapshot, elem: &DomElement) -> bool {
        let Some((last, rest)) = self.parts.split_last() else {
            return false;
        };
        if !compound_matches(last, elem) {
            return false;
        }
        // Greedy right-to-left walk up the ancestor chain
        let ancestors = page.ancestors(elem.index);
        let mut pos = 0;
        for compound in rest.iter().rev() {
            match ancestors[pos..]
                .iter()
                .position(|a| compound_matches(compound, a))
            {
                Some(offset) => pos += offset + 1,
                None => return false,
            }
        }
        true
    }
}

/// Every element `selector` matches, in document order
pub fn select_all<'a>(page: &'a DomSnapshot, selector: &str) -> Vec<&'a DomElement> {
    match Selector::parse(selector) {
        Some(sel) => page
            .elements
            .iter()
            .filter(|e| sel.matches(page, e))
            .collect(),
        None => Vec::new(),
    }
}

fn split_descendants(input: &str) -> Option<Vec<String>> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    for c in input.chars() {
        match (c, quote) {
            ('"' | '\'', None) => {
                quote = Some(c);
                current.push(c);
            }
            (c, Some(q)) if c == q => {
                quote = None;
                current.push(c);
            }
            ('[', None) => {
                depth += 1;
                current.push(c);
            }
            (']', None) => {
                depth = depth.checked_sub(1)?;
                current.push(c);
            }
            (c, None) if c.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                }
            }
            ('>' | '+' | '~' | ',', None) if depth == 0 => return None,
            (c, _) => current.push(c),
        }
    }
    if quote.is_some() || depth != 0 {
        return None;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    Some(chunks)
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn take_ident(chars: &[char], mut i: usize) -> (String, usize) {
    let start = i;
    while i < chars.len() && is_ident_char(chars[i]) {
        i += 1;
    }
    (chars[start..i].iter().collect(), i)
}

fn parse_compound(chunk: &str) -> Option<Compound> {
    let chars: Vec<char> = chunk.chars().collect();
    let mut tests = Vec::new();
    let mut i = 0;

    if chars.first() == Some(&'*') {
        i = 1;
    } else if chars.first().is_some_and(|c| c.is_ascii_alphabetic()) {
        let (tag, next) = take_ident(&chars, 0);
        tests.push(Test::Tag(tag.to_lowercase()));
        i = next;
    }

    while i < chars.len() {
        match chars[i] {
            '#' => {
                let (id, next) = take_ident(&chars, i + 1);
                if id.is_empty() {
                    return None;
                }
                tests.push(Test::Id(id));
                i = next;
            }
            '.' => {
                let (class, next) = take_ident(&chars, i + 1);
                if class.is_empty() {
                    return None;
                }
                tests.push(Test::Class(class));
                i = next;
            }
            '[' => {
                let close = chars[i..].iter().position(|&c| c == ']')? + i;
                tests.push(parse_attribute(&chars[i + 1..close].iter().collect::<String>())?);
                i = close + 1;
            }
            _ => return None,
        }
    }
    Some(Compound(tests))
}

fn parse_attribute(body: &str) -> Option<Test> {
    match body.split_once('=') {
        None => {
            let name = body.trim();
            (!name.is_empty()).then(|| Test::HasAttr(name.to_string()))
        }
        Some((name, raw)) => {
            // Operators other than plain equality are unsupported
            if name.ends_with(|c: char| "*^$~|".contains(c)) {
                return None;
            }
            let raw = raw.trim();
            let value = if raw.len() >= 2
                && ((raw.starts_with('"') && raw.ends_with('"'))
                    || (raw.starts_with('\'') && raw.ends_with('\'')))
            {
                raw[1..raw.len() - 1].replace("\\\"", "\"").replace("\\\\", "\\")
            } else {
                raw.to_string()
            };
            Some(Test::AttrEq(name.trim().to_string(), value))
        }
    }
}

fn compound_matches(compound: &Compound, elem: &DomElement) -> bool {
    compound.0.iter().all(|test| match test {
        Test::Tag(tag) => elem.tag == *tag,
        Test::Id(id) => elem.attr("id") == Some(id.as_str()),
        Test::Class(class) => elem
            .attr("class")
            .is_some_and(|c| c.split_whitespace().any(|part| part == class)),
        Test::HasAttr(name) => attribute(elem, name).is_some(),
        Test::AttrEq(name, value) => attribute(elem, name).as_deref() == Some(value.as_str()),
    })
}

fn attribute(elem: &DomElement, name: &str) -> Option<String> {
    match name {
        "data-probe-index" => Some(elem.index.to_string()),
        // Inputs without a type attribute behave as text inputs
        "type" if elem.tag == "input" => Some(elem.declared_type()),
        _ => elem.attr(name).map(String::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> DomSnapshot {
        let mut form = DomElement::new(0, "form");
        form.id = Some("signup".to_string());
        let mut email = DomElement::new(1, "input");
        email.name = Some("email".to_string());
        email.input_type = Some("email".to_string());
        email.parent = Some(0);
        let mut select = DomElement::new(2, "select");
        select.name = Some("country".to_string());
        select.parent = Some(0);
        let mut option = DomElement::new(3, "option");
        option.value = Some("us".to_string());
        option.text = "United States".to_string();
        option.parent = Some(2);
        let mut button = DomElement::new(4, "button");
        button.attributes.insert("class".to_string(), "btn primary".to_string());
        button.parent = Some(0);
        DomSnapshot {
            elements: vec![form, email, select, option, button],
            ..DomSnapshot::default()
        }
    }

    fn indexes(page: &DomSnapshot, selector: &str) -> Vec<usize> {
        select_all(page, selector).iter().map(|e| e.index).collect()
    }

    #[test]
    fn test_simple_selectors() {
        let page = page();
        assert_eq!(indexes(&page, "#signup"), vec![0]);
        assert_eq!(indexes(&page, "input[name=\"email\"]"), vec![1]);
        assert_eq!(indexes(&page, "[name=email]"), vec![1]);
        assert_eq!(indexes(&page, "[data-probe-index=\"4\"]"), vec![4]);
        assert_eq!(indexes(&page, ".primary"), vec![4]);
        assert_eq!(indexes(&page, "button.btn.primary"), vec![4]);
    }

    #[test]
    fn test_descendant_combinator() {
        let page = page();
        assert_eq!(indexes(&page, "select[name=\"country\"] option[value=\"us\"]"), vec![3]);
        assert_eq!(indexes(&page, "form#signup option"), vec![3]);
        assert!(indexes(&page, "#missing option").is_empty());
    }

    #[test]
    fn test_unsupported_syntax_matches_nothing() {
        let page = page();
        assert!(Selector::parse("form > input").is_none());
        assert!(Selector::parse("[name*=\"mail\"]").is_none());
        assert!(indexes(&page, "input:checked").is_empty());
        assert!(Selector::parse("").is_none());
    }
}

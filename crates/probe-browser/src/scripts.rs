//! In-page scripts
//!
//! Every script evaluates to a JSON string so results survive the CDP
//! round trip regardless of how the runtime serializes objects.

use serde::Serialize;

/// Element interaction performed inside a rescue scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ElementAction {
    Click,
    Fill(String),
    Select(String),
}

impl std::fmt::Display for ElementAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Click => write!(f, "click"),
            Self::Fill(_) => write!(f, "fill"),
            Self::Select(_) => write!(f, "select"),
        }
    }
}

/// Where a rescue looks for the element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RescueScope {
    /// Same-origin iframes, first element found wins
    Frames,
    /// Open shadow roots, first match wins
    ShadowRoots,
}

impl std::fmt::Display for RescueScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Frames => write!(f, "iframe"),
            Self::ShadowRoots => write!(f, "shadow_root"),
        }
    }
}

/// Captures the page into the `DomSnapshot` shape and stamps every element
/// with `data-probe-index`
pub const SNAPSHOT_SCRIPT: &str = r#"
JSON.stringify((() => {
  const elements = [];
  const forms = Array.from(document.forms);
  const skip = new Set(['SCRIPT', 'STYLE', 'NOSCRIPT', 'TEMPLATE']);
  const ownText = (el) => Array.from(el.childNodes)
    .filter((n) => n.nodeType === Node.TEXT_NODE)
    .map((n) => n.textContent.trim())
    .filter((t) => t.length > 0)
    .join(' ');
  const visit = (el, parent, inShadow) => {
    if (skip.has(el.tagName)) return;
    const index = elements.length;
    el.setAttribute('data-probe-index', String(index));
    const attributes = {};
    for (const a of Array.from(el.attributes)) {
      if (a.name !== 'data-probe-index') attributes[a.name] = a.value;
    }
    const owner = el.form || el.closest('form');
    elements.push({
      index,
      tag: el.tagName.toLowerCase(),
      type: el.getAttribute('type'),
      id: el.id || null,
      name: el.getAttribute('name'),
      value: ('value' in el && typeof el.value === 'string') ? el.value : el.getAttribute('value'),
      text: ownText(el),
      placeholder: el.getAttribute('placeholder'),
      attributes,
      parent,
      checked: !!el.checked,
      required: !!el.required,
      form: owner ? forms.indexOf(owner) : null,
      inShadow,
    });
    for (const child of Array.from(el.children)) visit(child, index, inShadow);
    if (el.shadowRoot) {
      for (const child of Array.from(el.shadowRoot.children)) visit(child, index, true);
    }
  };
  if (document.body) visit(document.body, null, false);

  const selectorFor = (el) => {
    if (el.id) return '#' + CSS.escape(el.id);
    const name = el.getAttribute('name');
    if (name) return el.tagName.toLowerCase() + '[name="' + name.replace(/"/g, '\\"') + '"]';
    return '[data-probe-index="' + el.getAttribute('data-probe-index') + '"]';
  };
  const labelFor = (el) => {
    if (el.id) {
      const l = document.querySelector('label[for="' + CSS.escape(el.id) + '"]');
      if (l) return l.textContent.trim();
    }
    const wrap = el.closest('label');
    if (wrap) return wrap.textContent.trim();
    return el.getAttribute('aria-label');
  };
  const formSummaries = forms.map((form, index) => {
    const fields = Array.from(form.elements)
      .filter((f) => !['submit', 'button', 'reset', 'hidden', 'image'].includes(f.type)
        && ['INPUT', 'SELECT', 'TEXTAREA'].includes(f.tagName))
      .map((f) => ({
        name: f.getAttribute('name') || f.id || '',
        type: f.tagName === 'INPUT' ? (f.getAttribute('type') || 'text') : f.tagName.toLowerCase(),
        selector: selectorFor(f),
        id: f.id || null,
        label: labelFor(f),
        placeholder: f.getAttribute('placeholder'),
        required: !!f.required,
      }));
    const submit = form.querySelector('button[type="submit"], input[type="submit"], button:not([type])');
    return {
      index,
      name: form.getAttribute('name'),
      id: form.id || null,
      action: form.getAttribute('action'),
      method: form.getAttribute('method'),
      selector: form.id ? '#' + CSS.escape(form.id)
        : '[data-probe-index="' + form.getAttribute('data-probe-index') + '"]',
      fields,
      submitText: submit ? (submit.textContent.trim() || submit.value || null) : null,
      submitSelector: submit ? selectorFor(submit) : null,
    };
  });

  return {
    url: window.location.href,
    title: document.title,
    elements,
    forms: formSummaries,
    frameCount: document.querySelectorAll('iframe').length,
  };
})())
"#;

/// Records `console.error` calls and uncaught errors into a page global
pub const CONSOLE_HOOK_SCRIPT: &str = r#"
JSON.stringify((() => {
  if (window.__probeConsoleErrors) return true;
  window.__probeConsoleErrors = [];
  const original = console.error.bind(console);
  console.error = (...args) => {
    window.__probeConsoleErrors.push(args.map((a) => String(a)).join(' '));
    original(...args);
  };
  window.addEventListener('error', (e) => window.__probeConsoleErrors.push(String(e.message)));
  window.addEventListener('unhandledrejection', (e) => window.__probeConsoleErrors.push(String(e.reason)));
  return true;
})())
"#;

pub const CONSOLE_ERRORS_SCRIPT: &str = "JSON.stringify(window.__probeConsoleErrors || [])";

pub const PAGE_TEXT_SCRIPT: &str = "JSON.stringify(document.body ? document.body.innerText : '')";

pub const PAGE_HTML_SCRIPT: &str = "JSON.stringify(document.documentElement.outerHTML)";

pub const CURRENT_URL_SCRIPT: &str = "JSON.stringify(window.location.href)";

/// Find `selector` inside the given scope and perform `action` on it.
/// Evaluates to `{"found": bool}`.
pub fn rescue_script(scope: RescueScope, selector: &str, action: &ElementAction) -> String {
    let selector = js_string(selector);
    let action = serde_json::to_string(action).unwrap_or_else(|_| "{\"kind\":\"click\"}".into());
    let roots = match scope {
        RescueScope::Frames => {
            r#"Array.from(document.querySelectorAll('iframe')).map((f) => {
      try { return f.contentDocument; } catch (_) { return null; }
    }).filter((d) => d)"#
        }
        RescueScope::ShadowRoots => {
            r#"(() => {
      const found = [];
      const walk = (root) => {
        for (const el of Array.from(root.querySelectorAll('*'))) {
          if (el.shadowRoot) { found.push(el.shadowRoot); walk(el.shadowRoot); }
        }
      };
      walk(document);
      return found;
    })()"#
        }
    };
    format!(
        r#"
JSON.stringify((() => {{
  const selector = {selector};
  const action = {action};
  const roots = {roots};
  for (const root of roots) {{
    const el = root.querySelector(selector);
    if (!el) continue;
    if (action.kind === 'click') {{
      el.click();
    }} else {{
      el.focus();
      el.value = action.value;
      el.dispatchEvent(new Event('input', {{ bubbles: true }}));
      el.dispatchEvent(new Event('change', {{ bubbles: true }}));
    }}
    return {{ found: true }};
  }}
  return {{ found: false }};
}})())
"#
    )
}

/// Quote a Rust string as a JavaScript string literal
pub fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

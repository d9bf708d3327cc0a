use std::sync::LazyLock;

use regex::Regex;

/// Attribute that repeats its element once per list item.
pub const EACH_ATTR: &str = "each";

/// `data-*` names that toggle a class of the same name.
const CLASS_TOGGLES: &[&str] = &["visible", "hidden"];

/// `data-*` names that set or remove a boolean attribute of the same name.
const BOOLEAN_PROPERTIES: &[&str] = &["checked", "disabled", "selected"];

static EVENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^on-([a-z][a-z0-9_-]*)$").unwrap());
static DATA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^data-([a-z][a-z0-9_-]*)$").unwrap());
static SPAN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{([^{}]*[^{}\s][^{}]*)\}").unwrap());

/// A malformed directive or expression, reported at compile time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyntaxError {
    #[error("empty filter name in expression `{expr}`")]
    EmptyFilter { expr: String },
    #[error("event directive `{attr}` names no handler")]
    EmptyHandler { attr: String },
}

/// One piece of a `"literal {expr} literal"` template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    /// Raw expression text between braces, trimmed.
    Expr(String),
}

/// A directive recognized on an element attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `each="todos"`: repeat the element per list item.
    Each { path: String },
    /// `on-click="clicked"`: call a named handler.
    Event { event: String, handler: String },
    /// `data-text="name | uppercase"`: write the element's text content.
    Text { expr: String },
    /// `data-visible="done"`: add the class while the value is truthy.
    ClassToggle { class: String, expr: String },
    /// `data-checked="done"`: set the boolean attribute while the value is truthy.
    Property { name: String, expr: String },
    /// `data-href="/item/{id}"` or `title="{name}"`: write an attribute.
    Attribute { name: String, template: Vec<Segment> },
}

impl Directive {
    /// Short label used in diagnostics, e.g. `on-click` or `data-text`.
    pub fn label(&self) -> String {
        match self {
            Directive::Each { .. } => EACH_ATTR.to_string(),
            Directive::Event { event, .. } => format!("on-{event}"),
            Directive::Text { .. } => "data-text".to_string(),
            Directive::ClassToggle { class, .. } => format!("data-{class}"),
            Directive::Property { name, .. } => format!("data-{name}"),
            Directive::Attribute { name, .. } => name.clone(),
        }
    }
}

/// Recognize a directive from one attribute.
///
/// Returns `Ok(None)` for ordinary attributes that carry no binding.
pub fn parse_directive(name: &str, value: &str) -> Result<Option<Directive>, SyntaxError> {
    if name == EACH_ATTR {
        return Ok(Some(Directive::Each {
            path: value.trim().to_string(),
        }));
    }

    if let Some(cap) = EVENT_RE.captures(name) {
        let handler = value.trim();
        if handler.is_empty() {
            return Err(SyntaxError::EmptyHandler {
                attr: name.to_string(),
            });
        }
        return Ok(Some(Directive::Event {
            event: cap[1].to_string(),
            handler: handler.to_string(),
        }));
    }

    if let Some(cap) = DATA_RE.captures(name) {
        let target = &cap[1];
        let expr = value.trim().to_string();
        let directive = if target == "text" {
            Directive::Text { expr }
        } else if CLASS_TOGGLES.contains(&target) {
            Directive::ClassToggle {
                class: target.to_string(),
                expr,
            }
        } else if BOOLEAN_PROPERTIES.contains(&target) {
            Directive::Property {
                name: target.to_string(),
                expr,
            }
        } else {
            let template = if has_interpolation(value) {
                split_template(value)
            } else {
                vec![Segment::Expr(expr)]
            };
            Directive::Attribute {
                name: target.to_string(),
                template,
            }
        };
        return Ok(Some(directive));
    }

    if has_interpolation(value) {
        return Ok(Some(Directive::Attribute {
            name: name.to_string(),
            template: split_template(value),
        }));
    }

    Ok(None)
}

/// True if `text` contains at least one `{expr}` span.
pub fn has_interpolation(text: &str) -> bool {
    SPAN_RE.is_match(text)
}

/// Split `"Hello {user.name}!"` into literal and expression segments.
///
/// Braces that do not enclose an expression (`{}`, `{ }`, an unclosed `{`)
/// stay in the literal text.
pub fn split_template(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last = 0;
    for cap in SPAN_RE.captures_iter(text) {
        let Some(whole) = cap.get(0) else { continue };
        if whole.start() > last {
            segments.push(Segment::Literal(text[last..whole.start()].to_string()));
        }
        segments.push(Segment::Expr(cap[1].trim().to_string()));
        last = whole.end();
    }
    if last < text.len() {
        segments.push(Segment::Literal(text[last..].to_string()));
    }
    segments
}

/// Split `"name | trim | uppercase"` into the path and its filter names.
///
/// The path is returned as written (trimmed); validating it is left to the
/// caller. An empty filter name (`"name |"`, `"a || b"`) is a syntax error.
pub fn split_expression(expr: &str) -> Result<(String, Vec<String>), SyntaxError> {
    let mut parts = expr.split('|').map(str::trim);
    let path = parts.next().unwrap_or_default().to_string();
    let mut filters = Vec::new();
    for filter in parts {
        if filter.is_empty() {
            return Err(SyntaxError::EmptyFilter {
                expr: expr.to_string(),
            });
        }
        filters.push(filter.to_string());
    }
    Ok((path, filters))
}

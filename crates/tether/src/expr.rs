//! Expression parsing and evaluation.
//!
//! An expression is a path followed by zero or more filters:
//! `$parent.user.name | trim | uppercase`. Expressions are parsed once when a
//! template is compiled and evaluated against a [`Scope`] every time one of
//! their dependencies changes.

use serde_json::Value;
use tether_parser::{split_expression, Segment};

use crate::error::Result;
use crate::model::INDEX_KEY;
use crate::path::Path;
use crate::scope::{Context, Scope};

const PARENT_TOKEN: &str = "$parent";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    Model(Path),
    Index,
}

/// A compiled `path | filter | ...` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    raw: String,
    /// How many `$parent.` qualifiers precede the path.
    hops: usize,
    source: Source,
    filters: Vec<String>,
}

impl Expression {
    pub fn parse(raw: &str) -> Result<Expression> {
        let (mut path, filters) = split_expression(raw)?;
        let mut hops = 0;
        loop {
            if path == PARENT_TOKEN {
                hops += 1;
                path = "this".to_string();
                break;
            }
            match path.strip_prefix("$parent.") {
                Some(rest) => {
                    hops += 1;
                    path = rest.to_string();
                }
                None => break,
            }
        }
        let source = if path == INDEX_KEY {
            Source::Index
        } else {
            Source::Model(Path::parse(&path)?)
        };
        Ok(Expression {
            raw: raw.trim().to_string(),
            hops,
            source,
            filters,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn filters(&self) -> &[String] {
        &self.filters
    }

    /// `(hops, key)` pairs whose change can alter this expression's value.
    ///
    /// A model path depends on itself and every prefix, so replacing `user`
    /// refreshes `user.name`.
    pub(crate) fn dependencies(&self) -> Vec<(usize, String)> {
        match &self.source {
            Source::Index => vec![(self.hops, INDEX_KEY.to_string())],
            Source::Model(path) => path
                .with_ancestors()
                .iter()
                .map(|p| (self.hops, p.key()))
                .collect(),
        }
    }

    /// Resolve against `scope` and run the filter pipeline.
    pub fn evaluate(&self, scope: &Scope) -> Value {
        let value = match scope.ancestor(self.hops) {
            Some(target) => self.resolve(&target),
            None => {
                tracing::debug!(expr = %self.raw, hops = self.hops, "no such parent scope");
                Value::Null
            }
        };
        self.filters.iter().fold(value, |value, name| match scope.behavior().filter(name) {
            Some(filter) => filter(&value),
            None => {
                tracing::debug!(filter = %name, expr = %self.raw, "missing filter, passing value through");
                value
            }
        })
    }

    fn resolve(&self, target: &Scope) -> Value {
        match &self.source {
            Source::Index => target.index().map(Value::from).unwrap_or(Value::Null),
            Source::Model(path) => match target.model().get_path(path) {
                Some(value) => value,
                None => match target.behavior().getter(&path.key()) {
                    Some(getter) => getter(&Context::new(target.clone())),
                    None => Value::Null,
                },
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Expr(Expression),
}

/// Literal text interleaved with expressions, e.g. `"Hi {name}!"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    parts: Vec<Part>,
}

impl Template {
    pub fn compile(segments: &[Segment]) -> Result<Template> {
        let parts = segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => Ok(Part::Literal(text.clone())),
                Segment::Expr(raw) => Expression::parse(raw).map(Part::Expr),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Template { parts })
    }

    /// A template consisting of one bare expression.
    pub fn single(raw: &str) -> Result<Template> {
        Ok(Template {
            parts: vec![Part::Expr(Expression::parse(raw)?)],
        })
    }

    pub fn expressions(&self) -> impl Iterator<Item = &Expression> {
        self.parts.iter().filter_map(|part| match part {
            Part::Expr(expr) => Some(expr),
            Part::Literal(_) => None,
        })
    }

    /// Distinct dependencies of every expression, in first-seen order.
    pub(crate) fn dependencies(&self) -> Vec<(usize, String)> {
        let mut deps: Vec<(usize, String)> = Vec::new();
        for dep in self.expressions().flat_map(Expression::dependencies) {
            if !deps.contains(&dep) {
                deps.push(dep);
            }
        }
        deps
    }

    pub fn render(&self, scope: &Scope) -> String {
        self.parts
            .iter()
            .map(|part| match part {
                Part::Literal(text) => text.clone(),
                Part::Expr(expr) => render_value(&expr.evaluate(scope)),
            })
            .collect()
    }

    /// The raw value for a lone expression, otherwise the rendered string.
    pub fn value(&self, scope: &Scope) -> Value {
        match self.parts.as_slice() {
            [Part::Expr(expr)] => expr.evaluate(scope),
            _ => Value::String(self.render(scope)),
        }
    }
}

/// Text form of a value. `Null` renders as nothing.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

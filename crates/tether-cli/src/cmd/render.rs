use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tether::{builtin_filter, Behavior, SiteKind, View, BUILTIN_FILTERS};
use tether_context::{TetherConfig, TetherProject};
use tether_dom::Node;

/// One step of a mutation script.
///
/// ```json
/// [
///   { "op": "push", "path": "todos", "value": "milk" },
///   { "op": "splice", "path": "todos", "start": 0, "delete": 1, "items": ["eggs"] },
///   { "op": "dispatch", "target": [0, 1], "event": "click" }
/// ]
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Op {
    Set { path: String, value: Value },
    Push { path: String, value: Value },
    Unshift { path: String, value: Value },
    Pop { path: String },
    Shift { path: String },
    Splice {
        path: String,
        start: usize,
        #[serde(default)]
        delete: usize,
        #[serde(default)]
        items: Vec<Value>,
    },
    /// Fire `event` on the element reached by following child-element indices from the root.
    Dispatch {
        #[serde(default)]
        target: Vec<usize>,
        #[serde(default = "default_event")]
        event: String,
    },
}

fn default_event() -> String {
    "click".to_string()
}

pub fn run(project: &TetherProject, template: Option<&Path>, model: Option<&Path>, ops: Option<&Path>) -> Result<()> {
    let html = project.read_template(template)?;
    let model = project.load_model(model)?;
    let ops = match project.load_ops(ops)? {
        Some(raw) => serde_json::from_value(raw).context("Failed to parse mutation script")?,
        None => Vec::new(),
    };
    println!("{}", render(&html, model, &ops, &project.config)?);
    Ok(())
}

/// Bind `html` to `model`, apply `ops` in order and serialize the result.
pub fn render(html: &str, model: Value, ops: &[Op], config: &TetherConfig) -> Result<String> {
    let root = tether::parse_html(html).context("Template contains no element")?;
    let behavior = behavior_for(&root, config)?;
    let view = tether::attach(&root, model, behavior).context("Failed to bind template")?;
    for (i, op) in ops.iter().enumerate() {
        apply_op(&view, op).with_context(|| format!("Mutation #{} failed", i + 1))?;
    }
    Ok(root.to_html())
}

/// Apply one scripted mutation to a live view.
pub fn apply_op(view: &View, op: &Op) -> Result<()> {
    match op {
        Op::Set { path, value } => view.set(path, value.clone())?,
        Op::Push { path, value } => {
            view.list(path)?.push(value.clone())?;
        }
        Op::Unshift { path, value } => {
            view.list(path)?.unshift(value.clone())?;
        }
        Op::Pop { path } => {
            view.list(path)?.pop()?;
        }
        Op::Shift { path } => {
            view.list(path)?.shift()?;
        }
        Op::Splice {
            path,
            start,
            delete,
            items,
        } => {
            view.list(path)?.splice(*start, *delete, items.iter().cloned())?;
        }
        Op::Dispatch { target, event } => element_at(view.root(), target)?.dispatch_event(event),
    }
    Ok(())
}

fn element_at(root: &Node, target: &[usize]) -> Result<Node> {
    let mut node = root.clone();
    for (depth, &i) in target.iter().enumerate() {
        let Some(child) = node.children().get(i).cloned() else {
            bail!("No element at {:?}", &target[..=depth]);
        };
        node = child;
    }
    Ok(node)
}

/// Enabled builtin filters, plus a logging handler for every handler name the
/// template refers to, so scripted events can be traced.
fn behavior_for(root: &Node, config: &TetherConfig) -> Result<Behavior> {
    let mut behavior = Behavior::new();
    for name in BUILTIN_FILTERS.iter().filter(|n| config.filter_enabled(n)) {
        if let Some(filter) = builtin_filter(name) {
            behavior = behavior.with_filter_rc(name, filter);
        }
    }
    for site in tether::scan(root)? {
        if let SiteKind::Directive(tether::Directive::Event { handler, .. }) = site.kind {
            let name = handler.clone();
            behavior = behavior.with_handler(&handler, move |event, ctx| {
                tracing::info!(
                    handler = %name,
                    event = event.event_type(),
                    index = ?ctx.index(),
                    model = %ctx.model().snapshot(),
                    "handler called"
                );
            });
        }
    }
    Ok(behavior)
}

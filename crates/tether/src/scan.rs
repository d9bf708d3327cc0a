use std::fmt;

use tether_dom::Node;
use tether_parser::{has_interpolation, parse_directive, split_template, Directive, Segment, EACH_ATTR};

use crate::error::{BindError, Result};
use crate::expr::{Expression, Template};
use crate::path::Path;

/// What was found at a [`DirectiveSite`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteKind {
    Directive(Directive),
    /// `{expr}` spans inside a text node.
    Interpolation(Vec<Segment>),
}

/// A directive located by its position in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveSite {
    /// Child-node indices from the scanned root down to the node.
    pub path: Vec<usize>,
    pub kind: SiteKind,
}

impl fmt::Display for DirectiveSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path: Vec<String> = self.path.iter().map(usize::to_string).collect();
        let at = if path.is_empty() { "root".to_string() } else { path.join(".") };
        match &self.kind {
            SiteKind::Directive(d) => write!(f, "{at}\t{}", d.label()),
            SiteKind::Interpolation(segments) => {
                let exprs: Vec<&str> = segments
                    .iter()
                    .filter_map(|s| match s {
                        Segment::Expr(e) => Some(e.as_str()),
                        Segment::Literal(_) => None,
                    })
                    .collect();
                write!(f, "{at}\ttext {{{}}}", exprs.join("} {"))
            }
        }
    }
}

/// Find and validate every directive under `root` without binding anything.
///
/// Every expression and path is parsed, so a tree that scans cleanly also
/// compiles. An `each` on the root itself is [`BindError::OrphanTemplate`],
/// whether or not the root has a parent: the reconciler would swap the root
/// out for an anchor and leave the view holding a detached template.
pub fn scan(root: &Node) -> Result<Vec<DirectiveSite>> {
    let mut sites = Vec::new();
    if root.has_attribute(EACH_ATTR) {
        return Err(BindError::OrphanTemplate {
            tag: root.tag().unwrap_or_default(),
        });
    }
    walk(root, &mut Vec::new(), &mut sites)?;
    Ok(sites)
}

fn walk(node: &Node, path: &mut Vec<usize>, sites: &mut Vec<DirectiveSite>) -> Result<()> {
    if node.is_text() {
        let text = node.text_content();
        if has_interpolation(&text) {
            let segments = split_template(&text);
            Template::compile(&segments)?;
            sites.push(DirectiveSite {
                path: path.clone(),
                kind: SiteKind::Interpolation(segments),
            });
        }
        return Ok(());
    }
    if !node.is_element() {
        return Ok(());
    }

    let mut owns_text = false;
    for (name, value) in node.attributes() {
        let Some(directive) = parse_directive(&name, &value)? else {
            continue;
        };
        validate(&directive)?;
        owns_text |= matches!(directive, Directive::Text { .. });
        sites.push(DirectiveSite {
            path: path.clone(),
            kind: SiteKind::Directive(directive),
        });
    }
    if owns_text {
        return Ok(());
    }
    for (i, child) in node.child_nodes().iter().enumerate() {
        path.push(i);
        walk(child, path, sites)?;
        path.pop();
    }
    Ok(())
}

fn validate(directive: &Directive) -> Result<()> {
    match directive {
        Directive::Each { path } => {
            Path::parse(path)?;
        }
        Directive::Event { .. } => {}
        Directive::Text { expr } | Directive::ClassToggle { expr, .. } | Directive::Property { expr, .. } => {
            Expression::parse(expr)?;
        }
        Directive::Attribute { template, .. } => {
            Template::compile(template)?;
        }
    }
    Ok(())
}

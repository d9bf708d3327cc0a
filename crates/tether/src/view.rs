use std::rc::Rc;

use serde_json::Value;
use tether_dom::Node;
use tether_parser::{has_interpolation, parse_directive, split_template, Directive, EACH_ATTR};

use crate::behavior::Behavior;
use crate::binding::{Binding, Write};
use crate::each::Each;
use crate::error::Result;
use crate::events::bind_event;
use crate::expr::Template;
use crate::list::ObservedList;
use crate::model::Model;
use crate::scan::scan;
use crate::scope::Scope;

/// A node tree bound to a model.
///
/// Created by [`attach`]. The view keeps its bindings alive; destroying it
/// (or dropping the last handle to its scope) releases every subscription
/// and listener it installed.
#[derive(Debug)]
pub struct View {
    root: Node,
    scope: Scope,
}

/// Bind `root` and its subtree to `model`, resolving filters, handlers and
/// getters through `behavior`.
///
/// The whole tree is validated before anything is bound, so an authoring
/// error leaves the tree untouched.
pub fn attach(root: &Node, model: impl Into<Model>, behavior: impl Into<Rc<Behavior>>) -> Result<View> {
    View::attach(root, model, behavior)
}

impl View {
    pub fn attach(root: &Node, model: impl Into<Model>, behavior: impl Into<Rc<Behavior>>) -> Result<View> {
        scan(root)?;
        let scope = Scope::new(model.into(), behavior.into());
        scope.set_root(root);
        if let Err(err) = compile(root, &scope) {
            scope.teardown();
            return Err(err);
        }
        tracing::debug!(root = ?root.tag(), "view attached");
        Ok(View {
            root: root.clone(),
            scope,
        })
    }

    pub fn get(&self, path: &str) -> Result<Option<Value>> {
        self.scope.model().get(path)
    }

    /// Write through to the model. Does nothing once the view is destroyed.
    pub fn set(&self, path: &str, value: impl Into<Value>) -> Result<()> {
        if self.is_destroyed() {
            tracing::debug!(path, "set on a destroyed view ignored");
            return Ok(());
        }
        self.scope.model().set(path, value)
    }

    pub fn list(&self, path: &str) -> Result<ObservedList> {
        self.scope.model().list(path)
    }

    pub fn model(&self) -> &Model {
        self.scope.model()
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Unbind everything and detach the root from its parent. Idempotent.
    pub fn destroy(&self) {
        self.scope.destroy();
    }

    pub fn is_destroyed(&self) -> bool {
        self.scope.is_destroyed()
    }
}

/// Install every directive on `node` and its subtree into `scope`.
pub(crate) fn compile(node: &Node, scope: &Scope) -> Result<()> {
    if node.is_text() {
        let text = node.text_content();
        if has_interpolation(&text) {
            let template = Template::compile(&split_template(&text))?;
            Binding::install(scope, node, template, Write::Text);
        }
        return Ok(());
    }
    if !node.is_element() {
        return Ok(());
    }
    if let Some(path) = node.attribute(EACH_ATTR) {
        // The reconciler compiles each clone in its own item scope
        return Each::adopt(scope, node, &path);
    }

    let mut owns_text = false;
    for (name, value) in node.attributes() {
        let Some(directive) = parse_directive(&name, &value)? else {
            continue;
        };
        match directive {
            Directive::Each { .. } => {}
            Directive::Event { event, handler } => bind_event(scope, node, &event, &handler),
            Directive::Text { expr } => {
                owns_text = true;
                Binding::install(scope, node, Template::single(&expr)?, Write::Text);
            }
            Directive::ClassToggle { class, expr } => {
                Binding::install(scope, node, Template::single(&expr)?, Write::Class(class));
            }
            Directive::Property { name, expr } => {
                Binding::install(scope, node, Template::single(&expr)?, Write::Property(name));
            }
            Directive::Attribute { name, template } => {
                Binding::install(scope, node, Template::compile(&template)?, Write::Attribute(name));
            }
        }
    }
    if owns_text {
        return Ok(());
    }
    for child in node.child_nodes() {
        compile(&child, scope)?;
    }
    Ok(())
}

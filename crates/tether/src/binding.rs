use std::rc::Rc;

use serde_json::Value;
use tether_dom::Node;

use crate::expr::{is_truthy, render_value, Template};
use crate::scope::{Scope, Teardown};

/// Where a binding writes its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Write {
    /// Text node data, or the whole text content of an element.
    Text,
    Attribute(String),
    /// Add the class while the value is truthy.
    Class(String),
    /// Boolean attribute, present while the value is truthy.
    Property(String),
}

/// One directive instance: a node, a compiled template and a write kind.
#[derive(Debug)]
pub(crate) struct Binding {
    node: Node,
    template: Template,
    write: Write,
}

impl Binding {
    /// Write the current value once, then keep the node in sync with every
    /// dependency of the template for as long as `scope` lives.
    pub(crate) fn install(scope: &Scope, node: &Node, template: Template, write: Write) {
        let binding = Rc::new(Binding {
            node: node.clone(),
            template,
            write,
        });
        binding.apply(scope);

        for (hops, key) in binding.template.dependencies() {
            let Some(target) = scope.ancestor(hops) else {
                continue;
            };
            let on_value = {
                let (scope, binding) = (scope.downgrade(), Rc::clone(&binding));
                move |_: &Value, _: &Value| {
                    if let Some(scope) = scope.upgrade() {
                        binding.refresh(&scope);
                    }
                }
            };
            let on_splice = {
                let (scope, binding) = (scope.downgrade(), Rc::clone(&binding));
                move |_: &crate::Splice| {
                    if let Some(scope) = scope.upgrade() {
                        binding.refresh(&scope);
                    }
                }
            };
            scope.hold(Teardown::Subscription(target.model().subscribe_key(&key, on_value)));
            scope.hold(Teardown::Subscription(target.model().observe_key(&key, on_splice)));
        }
    }

    fn refresh(&self, scope: &Scope) {
        if !scope.is_destroyed() {
            self.apply(scope);
        }
    }

    fn apply(&self, scope: &Scope) {
        match &self.write {
            Write::Text => self.node.set_text_content(&self.template.render(scope)),
            Write::Attribute(name) => match self.template.value(scope) {
                Value::Null => {
                    self.node.remove_attribute(name);
                }
                value => self.node.set_attribute(name, &render_value(&value)),
            },
            Write::Class(class) => self.node.toggle_class(class, is_truthy(&self.template.value(scope))),
            Write::Property(name) => {
                if is_truthy(&self.template.value(scope)) {
                    self.node.set_attribute(name, "");
                } else {
                    self.node.remove_attribute(name);
                }
            }
        }
        tracing::trace!(write = ?self.write, "binding applied");
    }
}

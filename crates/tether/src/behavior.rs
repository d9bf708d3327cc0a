use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use tether_dom::Event;

use crate::expr::{is_truthy, render_value};
use crate::scope::Context;

/// A filter maps one value to another. `Null` stands for "undefined" both
/// ways: filters must accept it and may return it.
pub type Filter = Rc<dyn Fn(&Value) -> Value>;

/// An event handler, called with the event and the context of the scope the
/// listener was bound in.
pub type Handler = Rc<dyn Fn(&Event, &Context)>;

/// A computed property, consulted when the model has no value at a path.
pub type Getter = Rc<dyn Fn(&Context) -> Value>;

/// Names of the filters available through [`builtin_filter`].
pub const BUILTIN_FILTERS: &[&str] = &["uppercase", "lowercase", "trim", "length", "not", "json"];

/// The named functions a view may call: filters, event handlers and getters.
///
/// Lookups are explicit per kind; a name that is absent is not an error
/// (missing filters pass values through, missing handlers do nothing).
#[derive(Clone, Default)]
pub struct Behavior {
    filters: HashMap<String, Filter>,
    handlers: HashMap<String, Handler>,
    getters: HashMap<String, Getter>,
}

impl Behavior {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with every builtin filter.
    pub fn with_builtins() -> Self {
        BUILTIN_FILTERS.iter().fold(Self::new(), |behavior, name| {
            match builtin_filter(name) {
                Some(filter) => behavior.with_filter_rc(name, filter),
                None => behavior,
            }
        })
    }

    pub fn with_filter(self, name: &str, filter: impl Fn(&Value) -> Value + 'static) -> Self {
        self.with_filter_rc(name, Rc::new(filter))
    }

    pub fn with_filter_rc(mut self, name: &str, filter: Filter) -> Self {
        self.filters.insert(name.to_string(), filter);
        self
    }

    pub fn with_handler(mut self, name: &str, handler: impl Fn(&Event, &Context) + 'static) -> Self {
        self.handlers.insert(name.to_string(), Rc::new(handler));
        self
    }

    pub fn with_getter(mut self, name: &str, getter: impl Fn(&Context) -> Value + 'static) -> Self {
        self.getters.insert(name.to_string(), Rc::new(getter));
        self
    }

    pub fn filter(&self, name: &str) -> Option<Filter> {
        self.filters.get(name).cloned()
    }

    pub fn handler(&self, name: &str) -> Option<Handler> {
        self.handlers.get(name).cloned()
    }

    pub fn getter(&self, name: &str) -> Option<Getter> {
        self.getters.get(name).cloned()
    }
}

impl fmt::Debug for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Behavior")
            .field("filters", &sorted_keys(&self.filters))
            .field("handlers", &sorted_keys(&self.handlers))
            .field("getters", &sorted_keys(&self.getters))
            .finish()
    }
}

fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<&str> {
    let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
    keys.sort_unstable();
    keys
}

/// Look up one of the builtin filters by name.
pub fn builtin_filter(name: &str) -> Option<Filter> {
    let filter: Filter = match name {
        "uppercase" => Rc::new(|v: &Value| map_str(v, str::to_uppercase)),
        "lowercase" => Rc::new(|v: &Value| map_str(v, str::to_lowercase)),
        "trim" => Rc::new(|v: &Value| map_str(v, |s| s.trim().to_string())),
        "length" => Rc::new(|v: &Value| match v {
            Value::Array(items) => Value::from(items.len()),
            Value::Object(map) => Value::from(map.len()),
            Value::String(s) => Value::from(s.chars().count()),
            _ => Value::from(0),
        }),
        "not" => Rc::new(|v: &Value| Value::Bool(!is_truthy(v))),
        "json" => Rc::new(|v: &Value| match v {
            Value::Null => Value::Null,
            other => Value::String(other.to_string()),
        }),
        _ => return None,
    };
    Some(filter)
}

/// Apply a string transform to a string or scalar; `Null` stays `Null`.
fn map_str(value: &Value, f: impl Fn(&str) -> String) -> Value {
    match value {
        Value::Null => Value::Null,
        other => Value::String(f(&render_value(other))),
    }
}

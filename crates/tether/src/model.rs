//! The model adapter: a shared, observable handle over a JSON value.
//!
//! # Invariants
//!
//! 1. `set(path, v)` mutates the value before any subscriber runs, so a
//!    subscriber (or the caller, after `set` returns) always reads `v`.
//! 2. Subscribers of a path are notified in registration order.
//! 3. No borrow of the model is held while a subscriber runs; subscribers may
//!    read, write, subscribe and unsubscribe freely.
//! 4. A notification raised while another is being delivered is queued and
//!    delivered afterwards (FIFO), still before the outermost call returns.
//! 5. A cancelled subscription never fires again, even if it was cancelled
//!    halfway through a notification pass that had already snapshotted it.
//! 6. A write never turns an existing list or scalar into an object. A list
//!    index may address an existing item or append at the end, nothing else.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::{Map, Value};

use crate::error::{BindError, Result};
use crate::list::ObservedList;
use crate::path::{Path, SELF_TOKEN};

/// Key under which item models announce index changes.
pub(crate) const INDEX_KEY: &str = "$index";

/// An in-place edit of a list: `removed` were taken out at `start` and
/// `inserted` were put in their place.
#[derive(Debug, Clone, PartialEq)]
pub struct Splice {
    pub start: usize,
    pub removed: Vec<Value>,
    pub inserted: Vec<Value>,
}

type ValueListener = Rc<dyn Fn(&Value, &Value)>;
type ListListener = Rc<dyn Fn(&Splice)>;
type NestedListener = Rc<dyn Fn(&Path, &Change)>;

#[derive(Clone)]
enum Listener {
    Value(ValueListener),
    List(ListListener),
    /// Any change strictly below the registered key, with the path relative to it.
    Nested(NestedListener),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Change {
    Value { value: Value, previous: Value },
    List(Splice),
}

struct Registration {
    id: u64,
    key: String,
    listener: Listener,
}

struct Pending {
    key: String,
    change: Change,
}

/// Where an item model lives inside its parent model.
struct ItemLink {
    parent: Weak<RefCell<ModelInner>>,
    list: Path,
    index: Rc<Cell<usize>>,
}

struct ModelInner {
    data: Value,
    registrations: Vec<Registration>,
    next_id: u64,
    queue: VecDeque<Pending>,
    dispatching: bool,
    link: Option<ItemLink>,
}

/// A shared, observable model.
///
/// Cloning a `Model` shares the same underlying value and subscriber list.
/// Wrap a plain value with `Model::from(value)`; pass an existing `Model`
/// to share an already observable one.
#[derive(Clone)]
pub struct Model {
    inner: Rc<RefCell<ModelInner>>,
}

/// RAII registration handle. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    model: Weak<RefCell<ModelInner>>,
    id: u64,
}

impl Subscription {
    /// Unsubscribe now. Cancelling twice, or after the model is gone, is a no-op.
    pub fn cancel(&self) {
        if let Some(inner) = self.model.upgrade() {
            inner.borrow_mut().registrations.retain(|r| r.id != self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Default for Model {
    /// An empty object model.
    fn default() -> Self {
        Model::new(Value::Object(Map::new()))
    }
}

impl From<Value> for Model {
    fn from(value: Value) -> Self {
        Model::new(value)
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Model")
            .field("data", &inner.data)
            .field("subscribers", &inner.registrations.len())
            .finish()
    }
}

impl Model {
    pub fn new(data: Value) -> Self {
        Model {
            inner: Rc::new(RefCell::new(ModelInner {
                data,
                registrations: Vec::new(),
                next_id: 0,
                queue: VecDeque::new(),
                dispatching: false,
                link: None,
            })),
        }
    }

    /// A model over one list item that writes changes back into `parent`
    /// at `list.<index>` without notifying the parent's subscribers.
    pub(crate) fn item(parent: &Model, list: Path, index: Rc<Cell<usize>>, data: Value) -> Self {
        let model = Model::new(data);
        model.inner.borrow_mut().link = Some(ItemLink {
            parent: Rc::downgrade(&parent.inner),
            list,
            index,
        });
        model
    }

    /// True when both handles share the same model.
    pub fn ptr_eq(&self, other: &Model) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// A copy of the whole model value.
    pub fn snapshot(&self) -> Value {
        self.inner.borrow().data.clone()
    }

    /// Read a dotted path. `Ok(None)` means some segment is absent.
    pub fn get(&self, path: &str) -> Result<Option<Value>> {
        Ok(self.get_path(&Path::parse(path)?))
    }

    pub fn get_path(&self, path: &Path) -> Option<Value> {
        lookup(&self.inner.borrow().data, path.segments()).cloned()
    }

    /// Write a dotted path, creating intermediate objects, then notify the
    /// path's subscribers with `(value, previous)`.
    ///
    /// A path that runs through a scalar, or through a list at an index
    /// other than an existing item or the end, is [`BindError::Unwritable`]
    /// and leaves the model untouched.
    pub fn set(&self, path: &str, value: impl Into<Value>) -> Result<()> {
        self.set_path(&Path::parse(path)?, value.into())
    }

    pub fn set_path(&self, path: &Path, value: Value) -> Result<()> {
        let previous = write(&mut self.inner.borrow_mut().data, path.segments(), value.clone())?;
        self.write_back(path);
        self.emit(
            path.key(),
            Change::Value {
                value,
                previous: previous.unwrap_or(Value::Null),
            },
        );
        Ok(())
    }

    /// An observed handle on the list at `path`.
    pub fn list(&self, path: &str) -> Result<ObservedList> {
        Ok(ObservedList::new(self.clone(), Path::parse(path)?))
    }

    /// Register a value listener for `path`, called with `(value, previous)`.
    pub fn subscribe(&self, path: &str, f: impl Fn(&Value, &Value) + 'static) -> Result<Subscription> {
        Ok(self.subscribe_key(&Path::parse(path)?.key(), f))
    }

    /// Register a list listener for `path`, called once per in-place list edit.
    pub fn observe(&self, path: &str, f: impl Fn(&Splice) + 'static) -> Result<Subscription> {
        Ok(self.observe_key(&Path::parse(path)?.key(), f))
    }

    pub(crate) fn subscribe_key(&self, key: &str, f: impl Fn(&Value, &Value) + 'static) -> Subscription {
        self.register(key, Listener::Value(Rc::new(f)))
    }

    pub(crate) fn observe_key(&self, key: &str, f: impl Fn(&Splice) + 'static) -> Subscription {
        self.register(key, Listener::List(Rc::new(f)))
    }

    /// Register a listener for every value write or list edit addressed
    /// strictly below `key`. It receives the path relative to `key`.
    pub(crate) fn watch_below(&self, key: &str, f: impl Fn(&Path, &Change) + 'static) -> Subscription {
        self.register(key, Listener::Nested(Rc::new(f)))
    }

    fn register(&self, key: &str, listener: Listener) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.registrations.push(Registration {
            id,
            key: key.to_string(),
            listener,
        });
        Subscription {
            model: Rc::downgrade(&self.inner),
            id,
        }
    }

    /// Number of live registrations, across all paths.
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().registrations.len()
    }

    /// Apply a splice to the list at `path` and emit exactly one list change.
    ///
    /// An absent (or null) list is created empty first. `start` is clamped to
    /// the list length and `delete_count` to what remains after `start`.
    pub(crate) fn splice_path(
        &self,
        path: &Path,
        start: usize,
        delete_count: usize,
        inserted: Vec<Value>,
    ) -> Result<Vec<Value>> {
        let (start, removed) = {
            let mut inner = self.inner.borrow_mut();
            let exists = match lookup(&inner.data, path.segments()) {
                Some(Value::Array(_)) => true,
                None | Some(Value::Null) => false,
                Some(other) => {
                    return Err(BindError::NotAList {
                        path: path.key(),
                        found: type_name(other),
                    })
                }
            };
            if !exists {
                write(&mut inner.data, path.segments(), Value::Array(Vec::new()))?;
            }
            let Some(Value::Array(list)) = lookup_mut(&mut inner.data, path.segments()) else {
                return Err(BindError::NotAList {
                    path: path.key(),
                    found: "nothing",
                });
            };
            let start = start.min(list.len());
            let end = start + delete_count.min(list.len() - start);
            let removed: Vec<Value> = list.splice(start..end, inserted.iter().cloned()).collect();
            (start, removed)
        };
        self.write_back(path);
        tracing::trace!(path = %path, start, removed = removed.len(), inserted = inserted.len(), "list splice");
        self.emit(
            path.key(),
            Change::List(Splice {
                start,
                removed: removed.clone(),
                inserted,
            }),
        );
        Ok(removed)
    }

    /// Replay a change the parent model made inside this item, without
    /// writing it back, and notify this model's subscribers.
    pub(crate) fn mirror(&self, path: &Path, change: &Change) {
        let applied = {
            let mut inner = self.inner.borrow_mut();
            let applied = match change {
                Change::Value { value, .. } => write(&mut inner.data, path.segments(), value.clone()).map(|_| ()),
                Change::List(splice) => apply_splice(&mut inner.data, path, splice),
            };
            applied
        };
        match applied {
            Ok(()) => self.emit(path.key(), change.clone()),
            Err(err) => tracing::debug!(%path, %err, "item model out of step, change not mirrored"),
        }
    }

    /// Current index of an item model inside its parent list.
    pub fn index(&self) -> Option<usize> {
        self.inner.borrow().link.as_ref().map(|l| l.index.get())
    }

    /// Tell `$index` subscribers that this item moved.
    pub(crate) fn notify_index(&self, previous: usize, current: usize) {
        self.emit(
            INDEX_KEY.to_string(),
            Change::Value {
                value: Value::from(current),
                previous: Value::from(previous),
            },
        );
    }

    /// Mirror the value at `path` into the parent model, if this is an item model.
    fn write_back(&self, path: &Path) {
        let (parent, slot, value) = {
            let inner = self.inner.borrow();
            let Some(link) = inner.link.as_ref() else {
                return;
            };
            let Some(parent) = link.parent.upgrade() else {
                return;
            };
            let slot = link.list.child(&link.index.get().to_string());
            let value = lookup(&inner.data, path.segments()).cloned().unwrap_or(Value::Null);
            (parent, slot, value)
        };
        let parent = Model { inner: parent };
        let full = slot.join(path);
        {
            let mut inner = parent.inner.borrow_mut();
            // The parent list may have been replaced; only write into a slot that still exists
            if lookup(&inner.data, slot.segments()).is_none() {
                return;
            }
            if let Err(err) = write(&mut inner.data, full.segments(), value) {
                tracing::debug!(path = %full, %err, "item write not mirrored into parent");
                return;
            }
        }
        parent.write_back(&full);
    }

    fn emit(&self, key: String, change: Change) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.queue.push_back(Pending { key, change });
            if inner.dispatching {
                return;
            }
            inner.dispatching = true;
        }
        let _guard = DispatchGuard(&self.inner);
        loop {
            let next = self.inner.borrow_mut().queue.pop_front();
            let Some(pending) = next else { break };
            self.deliver(&pending);
        }
    }

    fn deliver(&self, pending: &Pending) {
        let wants_list = matches!(pending.change, Change::List(_));
        let targets: Vec<(u64, Option<Path>, Listener)> = self
            .inner
            .borrow()
            .registrations
            .iter()
            .filter_map(|r| {
                let below = match &r.listener {
                    Listener::Value(_) => (!wants_list && r.key == pending.key).then_some(None),
                    Listener::List(_) => (wants_list && r.key == pending.key).then_some(None),
                    Listener::Nested(_) => relative(&r.key, &pending.key).map(Some),
                }?;
                Some((r.id, below, r.listener.clone()))
            })
            .collect();
        for (id, below, listener) in targets {
            if !self.is_registered(id) {
                continue;
            }
            match (&listener, &pending.change, below) {
                (Listener::Value(f), Change::Value { value, previous }, _) => f(value, previous),
                (Listener::List(f), Change::List(splice), _) => f(splice),
                (Listener::Nested(f), change, Some(below)) => f(&below, change),
                _ => {}
            }
        }
    }

    fn is_registered(&self, id: u64) -> bool {
        self.inner.borrow().registrations.iter().any(|r| r.id == id)
    }
}

/// Clears the dispatching flag even if a listener panics.
struct DispatchGuard<'a>(&'a Rc<RefCell<ModelInner>>);

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.0.borrow_mut();
        inner.dispatching = false;
        inner.queue.clear();
    }
}

pub(crate) fn lookup<'a>(value: &'a Value, segments: &[String]) -> Option<&'a Value> {
    let mut current = value;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn lookup_mut<'a>(value: &'a mut Value, segments: &[String]) -> Option<&'a mut Value> {
    let mut current = value;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// `key` relative to `ancestor`, if `key` lies strictly below it.
fn relative(ancestor: &str, key: &str) -> Option<Path> {
    let rest = if ancestor == SELF_TOKEN {
        Some(key).filter(|k| *k != SELF_TOKEN)?
    } else {
        key.strip_prefix(ancestor)?.strip_prefix('.')?
    };
    Some(Path::from_segments(rest.split('.').map(str::to_string).collect()))
}

/// Fail unless `write` can place a value at `segments` by only creating
/// objects where nothing (or null) is.
fn check_writable(data: &Value, segments: &[String]) -> Result<()> {
    let mut current = Some(data);
    for (depth, segment) in segments.iter().enumerate() {
        let Some(value) = current else {
            return Ok(());
        };
        let last = depth + 1 == segments.len();
        current = match value {
            Value::Null => None,
            Value::Object(map) => map.get(segment),
            Value::Array(items) => match segment.parse::<usize>() {
                Ok(index) if index < items.len() => items.get(index),
                Ok(index) if index == items.len() && last => None,
                _ => {
                    return Err(BindError::Unwritable {
                        path: segments[..=depth].join("."),
                        found: format!("a list of {} items", items.len()),
                    })
                }
            },
            other => {
                return Err(BindError::Unwritable {
                    path: segments[..=depth].join("."),
                    found: type_name(other).to_string(),
                })
            }
        };
    }
    Ok(())
}

/// Write `value` at `segments`, creating objects along the way. Returns the previous value.
fn write(data: &mut Value, segments: &[String], value: Value) -> Result<Option<Value>> {
    check_writable(data, segments)?;
    let Some((last, parents)) = segments.split_last() else {
        return Ok(Some(std::mem::replace(data, value)));
    };
    let mut current = data;
    for segment in parents {
        current = child_mut(current, segment);
    }
    if let Value::Array(items) = current {
        // Checked above: an existing item or the end
        let index = last.parse::<usize>().unwrap_or(items.len());
        if index < items.len() {
            return Ok(Some(std::mem::replace(&mut items[index], value)));
        }
        items.push(value);
        return Ok(None);
    }
    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    Ok(current.as_object_mut().and_then(|map| map.insert(last.clone(), value)))
}

/// Apply `splice` to the list at `path`, creating it if absent.
fn apply_splice(data: &mut Value, path: &Path, splice: &Splice) -> Result<()> {
    if matches!(lookup(data, path.segments()), None | Some(Value::Null)) {
        write(data, path.segments(), Value::Array(Vec::new()))?;
    }
    match lookup(data, path.segments()) {
        Some(Value::Array(_)) => {}
        other => {
            return Err(BindError::NotAList {
                path: path.key(),
                found: other.map_or("nothing", type_name),
            })
        }
    }
    let Some(Value::Array(items)) = lookup_mut(data, path.segments()) else {
        return Ok(());
    };
    let start = splice.start.min(items.len());
    let end = (start + splice.removed.len()).min(items.len());
    items.splice(start..end, splice.inserted.iter().cloned());
    Ok(())
}

/// Only called on segments `check_writable` accepted.
fn child_mut<'a>(current: &'a mut Value, segment: &str) -> &'a mut Value {
    let index = match current {
        Value::Array(items) => segment.parse::<usize>().ok().filter(|i| *i < items.len()),
        _ => None,
    };
    if let Some(index) = index {
        return &mut current[index];
    }
    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    &mut current[segment]
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recorder() -> (Rc<RefCell<Vec<String>>>, impl Fn(&str) -> Box<dyn Fn(&Value, &Value)>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let make = move |tag: &str| -> Box<dyn Fn(&Value, &Value)> {
            let sink = Rc::clone(&sink);
            let tag = tag.to_string();
            Box::new(move |v: &Value, p: &Value| sink.borrow_mut().push(format!("{tag}:{v}<-{p}")))
        };
        (log, make)
    }

    #[test]
    fn test_get_nested_and_missing() {
        let model = Model::from(json!({"user": {"name": "Alice"}, "todos": ["a", "b"]}));
        assert_eq!(model.get("user.name").unwrap(), Some(json!("Alice")));
        assert_eq!(model.get("todos.1").unwrap(), Some(json!("b")));
        assert_eq!(model.get("user.age").unwrap(), None);
        assert_eq!(model.get("nope.deeper").unwrap(), None);
        assert_eq!(model.get("this").unwrap(), Some(model.snapshot()));
    }

    #[test]
    fn test_empty_path_is_invalid() {
        let model = Model::default();
        assert_eq!(model.get(""), Err(BindError::InvalidPath(String::new())));
        assert_eq!(model.set("", 1), Err(BindError::InvalidPath(String::new())));
    }

    #[test]
    fn test_set_creates_intermediate_objects() {
        let model = Model::default();
        model.set("user.address.city", "Oslo").unwrap();
        assert_eq!(model.snapshot(), json!({"user": {"address": {"city": "Oslo"}}}));
    }

    #[test]
    fn test_set_notifies_in_registration_order() {
        let model = Model::from(json!({"name": "a"}));
        let (log, make) = recorder();
        let _s1 = model.subscribe("name", make("first")).unwrap();
        let _s2 = model.subscribe("name", make("second")).unwrap();
        let _other = model.subscribe("other", make("other")).unwrap();

        model.set("name", "b").unwrap();
        assert_eq!(*log.borrow(), vec![r#"first:"b"<-"a""#, r#"second:"b"<-"a""#]);
    }

    #[test]
    fn test_same_value_still_notifies() {
        let model = Model::from(json!({"n": 1}));
        let (log, make) = recorder();
        let _s = model.subscribe("n", make("n")).unwrap();
        model.set("n", 1).unwrap();
        assert_eq!(*log.borrow(), vec!["n:1<-1"]);
    }

    #[test]
    fn test_cancel_is_idempotent_and_drop_unsubscribes() {
        let model = Model::default();
        let (log, make) = recorder();
        let sub = model.subscribe("x", make("x")).unwrap();
        sub.cancel();
        sub.cancel();
        model.set("x", 1).unwrap();
        assert!(log.borrow().is_empty());

        {
            let _scoped = model.subscribe("x", make("scoped")).unwrap();
            assert_eq!(model.subscriber_count(), 1);
        }
        assert_eq!(model.subscriber_count(), 0);
    }

    #[test]
    fn test_reentrant_set_is_queued() {
        let model = Model::from(json!({"a": 0, "b": 0}));
        let log = Rc::new(RefCell::new(Vec::new()));

        let m = model.clone();
        let l = Rc::clone(&log);
        let _a = model
            .subscribe("a", move |v, _| {
                l.borrow_mut().push(format!("a={v} start"));
                m.set("b", v.clone()).unwrap();
                // The nested notification has not been delivered yet
                l.borrow_mut().push(format!("a={v} end"));
            })
            .unwrap();
        let l = Rc::clone(&log);
        let _b = model
            .subscribe("b", move |v, _| l.borrow_mut().push(format!("b={v}")))
            .unwrap();

        model.set("a", 7).unwrap();
        assert_eq!(*log.borrow(), vec!["a=7 start", "a=7 end", "b=7"]);
    }

    #[test]
    fn test_unsubscribe_during_dispatch_prevents_later_call() {
        let model = Model::default();
        let log = Rc::new(RefCell::new(Vec::new()));
        let victim: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let v = Rc::clone(&victim);
        let l = Rc::clone(&log);
        let _killer = model
            .subscribe("x", move |_, _| {
                l.borrow_mut().push("killer");
                v.borrow_mut().take();
            })
            .unwrap();
        let l = Rc::clone(&log);
        *victim.borrow_mut() = Some(
            model
                .subscribe("x", move |_, _| l.borrow_mut().push("victim"))
                .unwrap(),
        );

        model.set("x", 1).unwrap();
        assert_eq!(*log.borrow(), vec!["killer"]);
    }

    #[test]
    fn test_set_never_coerces_a_list() {
        let model = Model::from(json!({"todos": [{"name": "a"}, {"name": "b"}]}));
        let (log, make) = recorder();
        let _s = model.subscribe("todos.5.name", make("name")).unwrap();

        assert_eq!(
            model.set("todos.5.name", "x"),
            Err(BindError::Unwritable {
                path: "todos.5".into(),
                found: "a list of 2 items".into(),
            })
        );
        assert_eq!(model.set("todos.name", "x").unwrap_err().to_string(), "cannot write `todos.name` into a list of 2 items");
        assert_eq!(model.snapshot(), json!({"todos": [{"name": "a"}, {"name": "b"}]}));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_set_never_coerces_a_scalar() {
        let model = Model::from(json!({"name": "ann", "gone": null}));
        assert_eq!(
            model.set("name.first", "x"),
            Err(BindError::Unwritable {
                path: "name.first".into(),
                found: "a string".into(),
            })
        );
        model.set("gone.now", 1).unwrap();
        assert_eq!(model.snapshot(), json!({"name": "ann", "gone": {"now": 1}}));
    }

    #[test]
    fn test_set_list_index_replaces_or_appends_only() {
        let model = Model::from(json!({"todos": ["a"]}));
        model.set("todos.0", "z").unwrap();
        model.set("todos.1", "b").unwrap();
        assert_eq!(model.get("todos").unwrap(), Some(json!(["z", "b"])));

        assert!(matches!(model.set("todos.3", "c"), Err(BindError::Unwritable { .. })));
        assert!(matches!(
            model.set("todos.18446744073709551615", 1),
            Err(BindError::Unwritable { .. })
        ));
        assert!(matches!(model.set("todos.99999999999999999999", 1), Err(BindError::Unwritable { .. })));
        assert_eq!(model.get("todos").unwrap(), Some(json!(["z", "b"])));
    }

    #[test]
    fn test_list_edit_inside_a_scalar_is_refused() {
        let model = Model::from(json!({"name": "ann"}));
        assert!(matches!(model.list("name.items").unwrap().push(1), Err(BindError::Unwritable { .. })));
        assert_eq!(model.snapshot(), json!({"name": "ann"}));
    }

    #[test]
    fn test_watch_below_sees_descendant_changes_only() {
        let model = Model::from(json!({"todos": ["a"], "other": 1}));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _w = model.watch_below("todos", move |path, change| sink.borrow_mut().push((path.key(), change.clone())));

        model.set("todos", json!(["b"])).unwrap();
        model.set("other", 2).unwrap();
        model.set("todos.0", "c").unwrap();
        model.list("todos.1.tags").unwrap().push("x").unwrap_err();
        model.set("todos.1", json!({"tags": []})).unwrap();
        model.list("todos.1.tags").unwrap().push("x").unwrap();

        let seen = seen.borrow();
        let keys: Vec<&str> = seen.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["0", "1", "1.tags"]);
        assert_eq!(
            seen[2].1,
            Change::List(Splice {
                start: 0,
                removed: vec![],
                inserted: vec![json!("x")],
            })
        );
    }

    #[test]
    fn test_watch_below_root_sees_everything_but_root() {
        let model = Model::from(json!({"a": 1}));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _w = model.watch_below("this", move |path, _| sink.borrow_mut().push(path.key()));
        model.set("this", json!({})).unwrap();
        model.set("a.b", 2).unwrap();
        assert_eq!(*seen.borrow(), vec!["a.b"]);
    }

    #[test]
    fn test_mirror_updates_item_without_writing_back() {
        let parent = Model::from(json!({"todos": [{"name": "milk", "tags": []}]}));
        let item = Model::item(
            &parent,
            Path::parse("todos").unwrap(),
            Rc::new(Cell::new(0)),
            json!({"name": "milk", "tags": []}),
        );
        let (log, make) = recorder();
        let _s = item.subscribe("name", make("name")).unwrap();

        let name = Path::parse("name").unwrap();
        item.mirror(
            &name,
            &Change::Value {
                value: json!("eggs"),
                previous: json!("milk"),
            },
        );
        item.mirror(
            &Path::parse("tags").unwrap(),
            &Change::List(Splice {
                start: 0,
                removed: vec![],
                inserted: vec![json!("x")],
            }),
        );

        assert_eq!(*log.borrow(), vec![r#"name:"eggs"<-"milk""#]);
        assert_eq!(item.snapshot(), json!({"name": "eggs", "tags": ["x"]}));
        // The parent already holds its own change; the mirror does not touch it
        assert_eq!(parent.snapshot(), json!({"todos": [{"name": "milk", "tags": []}]}));
    }

    #[test]
    fn test_item_model_writes_back_quietly() {
        let parent = Model::from(json!({"todos": [{"name": "milk"}, {"name": "eggs"}]}));
        let (log, make) = recorder();
        let _s = parent.subscribe("todos", make("todos")).unwrap();

        let index = Rc::new(Cell::new(1));
        let item = Model::item(&parent, Path::parse("todos").unwrap(), Rc::clone(&index), json!({"name": "eggs"}));
        item.set("name", "bread").unwrap();

        assert_eq!(parent.get("todos.1.name").unwrap(), Some(json!("bread")));
        assert_eq!(item.index(), Some(1));
        assert!(log.borrow().is_empty());
    }
}

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;
use tether_dom::{ListenerId, Node};

use crate::behavior::Behavior;
use crate::each::Each;
use crate::error::Result;
use crate::model::{Model, Subscription};

/// Something a scope must release when it is torn down.
pub(crate) enum Teardown {
    Subscription(Subscription),
    Listener(Node, ListenerId),
    Reconciler(Rc<Each>),
}

impl Teardown {
    fn release(self) {
        match self {
            Teardown::Subscription(sub) => sub.cancel(),
            Teardown::Listener(node, id) => {
                node.remove_event_listener(id);
            }
            Teardown::Reconciler(each) => each.destroy(),
        }
    }
}

struct ScopeInner {
    model: Model,
    behavior: Rc<Behavior>,
    parent: Option<Weak<ScopeInner>>,
    index: Option<Rc<Cell<usize>>>,
    root: RefCell<Option<Node>>,
    destroyed: Cell<bool>,
    teardown: RefCell<Vec<Teardown>>,
}

/// The evaluation context of a bound subtree: its model, behavior, optional
/// parent scope and, inside an `each` item, the item's index.
///
/// Expressions resolve against the scope's own model only. Parent scopes are
/// reached explicitly with `$parent.`.
#[derive(Clone)]
pub struct Scope(Rc<ScopeInner>);

/// A non-owning scope handle for listeners stored inside models.
#[derive(Clone)]
pub(crate) struct WeakScope(Weak<ScopeInner>);

impl WeakScope {
    pub(crate) fn upgrade(&self) -> Option<Scope> {
        self.0.upgrade().map(Scope)
    }
}

impl Scope {
    pub fn new(model: Model, behavior: Rc<Behavior>) -> Scope {
        Scope(Rc::new(ScopeInner {
            model,
            behavior,
            parent: None,
            index: None,
            root: RefCell::new(None),
            destroyed: Cell::new(false),
            teardown: RefCell::new(Vec::new()),
        }))
    }

    /// An item scope under `self`, sharing its behavior.
    pub(crate) fn child(&self, model: Model, index: Rc<Cell<usize>>) -> Scope {
        Scope(Rc::new(ScopeInner {
            model,
            behavior: Rc::clone(&self.0.behavior),
            parent: Some(Rc::downgrade(&self.0)),
            index: Some(index),
            root: RefCell::new(None),
            destroyed: Cell::new(false),
            teardown: RefCell::new(Vec::new()),
        }))
    }

    pub fn model(&self) -> &Model {
        &self.0.model
    }

    pub fn behavior(&self) -> &Behavior {
        &self.0.behavior
    }

    pub fn parent(&self) -> Option<Scope> {
        self.0.parent.as_ref()?.upgrade().map(Scope)
    }

    /// Position of this item in its list, or `None` outside an `each`.
    pub fn index(&self) -> Option<usize> {
        self.0.index.as_ref().map(|i| i.get())
    }

    /// The scope `hops` levels up; `ancestor(0)` is `self`.
    pub fn ancestor(&self, hops: usize) -> Option<Scope> {
        let mut scope = self.clone();
        for _ in 0..hops {
            scope = scope.parent()?;
        }
        Some(scope)
    }

    pub fn root(&self) -> Option<Node> {
        self.0.root.borrow().clone()
    }

    pub(crate) fn set_root(&self, node: &Node) {
        *self.0.root.borrow_mut() = Some(node.clone());
    }

    pub fn is_destroyed(&self) -> bool {
        self.0.destroyed.get()
    }

    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn downgrade(&self) -> WeakScope {
        WeakScope(Rc::downgrade(&self.0))
    }

    /// Register a teardown entry. A scope that is already destroyed releases it at once.
    pub(crate) fn hold(&self, entry: Teardown) {
        if self.is_destroyed() {
            entry.release();
            return;
        }
        self.0.teardown.borrow_mut().push(entry);
    }

    /// Tear down and then detach this scope's root node.
    pub fn destroy(&self) {
        if self.is_destroyed() {
            return;
        }
        self.teardown();
        if let Some(root) = self.root() {
            root.remove();
        }
    }

    /// Release every binding, listener and nested reconciler, newest first.
    /// Nodes are left where they are.
    pub(crate) fn teardown(&self) {
        if self.0.destroyed.replace(true) {
            return;
        }
        // Released one at a time: releasing may run code that inspects the scope
        loop {
            let entry = self.0.teardown.borrow_mut().pop();
            match entry {
                Some(entry) => entry.release(),
                None => break,
            }
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("index", &self.index())
            .field("destroyed", &self.is_destroyed())
            .field("entries", &self.0.teardown.borrow().len())
            .finish()
    }
}

/// What a handler or getter sees: the scope it was bound in.
#[derive(Clone, Debug)]
pub struct Context {
    scope: Scope,
}

impl Context {
    pub(crate) fn new(scope: Scope) -> Context {
        Context { scope }
    }

    pub fn model(&self) -> &Model {
        self.scope.model()
    }

    pub fn index(&self) -> Option<usize> {
        self.scope.index()
    }

    /// Context of the enclosing scope, e.g. the view around an `each` item.
    pub fn parent(&self) -> Option<Context> {
        self.scope.parent().map(Context::new)
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn behavior(&self) -> &Behavior {
        self.scope.behavior()
    }

    /// Shorthand for `self.model().get(path)`.
    pub fn get(&self, path: &str) -> Result<Option<Value>> {
        self.model().get(path)
    }

    /// Shorthand for `self.model().set(path, value)`.
    pub fn set(&self, path: &str, value: impl Into<Value>) -> Result<()> {
        self.model().set(path, value)
    }
}

//! The `each` list reconciler.
//!
//! A reconciler owns one anchor comment where its template element used to
//! be, and a run of item nodes directly before that anchor. After every step
//! the run holds exactly one node per list item, in list order.
//!
//! ```text
//!   <ul>                          <ul>
//!     <li each="todos">     =>      <li>milk</li>      record 0
//!   </ul>                           <li>eggs</li>      record 1
//!                                   <!-- each todos -->
//!                                 </ul>
//! ```
//!
//! Steps come from two kinds of model notification:
//!
//! - a value change of the list path or one of its prefixes rebuilds the run
//!   from the new value;
//! - a [`Splice`] on the list path edits only the records it names and
//!   re-indexes the records after it;
//! - a write or edit addressed inside the list (`todos.1.name`,
//!   `groups.0.items`) is replayed on that record's item model. A write at
//!   the index just past the end appends a record.
//!
//! A step that arrives while another is being applied is queued and applied
//! afterwards.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use serde_json::Value;
use tether_dom::Node;
use tether_parser::EACH_ATTR;

use crate::error::{BindError, Result};
use crate::model::{lookup, Change, Model, Splice, Subscription};
use crate::path::Path;
use crate::scan::scan;
use crate::scope::{Scope, Teardown, WeakScope};
use crate::view::compile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EachState {
    Uninitialized,
    Synced,
    Reconciling,
    Destroyed,
}

enum Step {
    /// The list was replaced; `None` means the path is now absent.
    Rebuild(Option<Value>),
    Splice(Splice),
    /// A change at `<index>[.rest]` inside the list.
    Item(Path, Change),
}

/// One materialized list item.
struct Record {
    scope: Scope,
    node: Node,
    model: Model,
    index: Rc<Cell<usize>>,
}

pub(crate) struct Each {
    scope: WeakScope,
    path: Path,
    template: Node,
    anchor: Node,
    records: RefCell<Vec<Record>>,
    state: Cell<EachState>,
    pending: RefCell<VecDeque<Step>>,
    subscriptions: RefCell<Vec<Subscription>>,
}

impl Each {
    /// Take over `node` as the template for the list at `raw_path`.
    ///
    /// The node is swapped for an anchor comment, loses its `each`
    /// attribute, and is cloned once per item from then on.
    pub(crate) fn adopt(scope: &Scope, node: &Node, raw_path: &str) -> Result<()> {
        let path = Path::parse(raw_path)?;
        if node.parent().is_none() {
            return Err(BindError::OrphanTemplate {
                tag: node.tag().unwrap_or_default(),
            });
        }
        node.remove_attribute(EACH_ATTR);
        // Item clones are compiled lazily; validate the template up front
        scan(node)?;

        let anchor = Node::comment(&format!(" each {path} "));
        node.replace_with(&anchor);

        let each = Rc::new(Each {
            scope: scope.downgrade(),
            path: path.clone(),
            template: node.clone(),
            anchor,
            records: RefCell::new(Vec::new()),
            state: Cell::new(EachState::Uninitialized),
            pending: RefCell::new(VecDeque::new()),
            subscriptions: RefCell::new(Vec::new()),
        });

        let model = scope.model();
        let mut subscriptions = Vec::new();
        for prefix in path.with_ancestors() {
            // Where the list sits inside a value published for `prefix`
            let tail = path.segments()[prefix.segments().len()..].to_vec();
            let weak = Rc::downgrade(&each);
            subscriptions.push(model.subscribe_key(&prefix.key(), move |value, _| {
                if let Some(each) = weak.upgrade() {
                    each.run(Step::Rebuild(lookup(value, &tail).cloned()));
                }
            }));
        }
        let weak = Rc::downgrade(&each);
        subscriptions.push(model.observe_key(&path.key(), move |splice| {
            if let Some(each) = weak.upgrade() {
                each.run(Step::Splice(splice.clone()));
            }
        }));
        let weak = Rc::downgrade(&each);
        subscriptions.push(model.watch_below(&path.key(), move |below, change| {
            if let Some(each) = weak.upgrade() {
                each.run(Step::Item(below.clone(), change.clone()));
            }
        }));
        *each.subscriptions.borrow_mut() = subscriptions;

        each.run(Step::Rebuild(model.get_path(&path)));
        scope.hold(Teardown::Reconciler(Rc::clone(&each)));
        Ok(())
    }

    fn run(self: &Rc<Self>, step: Step) {
        match self.state.get() {
            EachState::Destroyed => return,
            EachState::Reconciling => {
                self.pending.borrow_mut().push_back(step);
                return;
            }
            EachState::Uninitialized | EachState::Synced => {}
        }
        self.state.set(EachState::Reconciling);
        let mut next = Some(step);
        while let Some(step) = next {
            match step {
                Step::Rebuild(value) => self.rebuild(value),
                Step::Splice(splice) => self.splice(splice),
                Step::Item(below, change) => self.item(&below, &change),
            }
            if self.state.get() == EachState::Destroyed {
                return;
            }
            next = self.pending.borrow_mut().pop_front();
        }
        self.state.set(EachState::Synced);
    }

    fn rebuild(&self, value: Option<Value>) {
        let items = match value {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items,
            Some(other) => {
                tracing::warn!(path = %self.path, found = %other, "each source is not a list, rendering nothing");
                Vec::new()
            }
        };
        tracing::trace!(path = %self.path, items = items.len(), "each rebuild");
        let old = std::mem::take(&mut *self.records.borrow_mut());
        for record in old {
            record.scope.destroy();
        }
        self.insert(0, items);
    }

    fn splice(&self, splice: Splice) {
        let Splice {
            start,
            removed,
            inserted,
        } = splice;
        let gone: Vec<Record> = {
            let mut records = self.records.borrow_mut();
            let start = start.min(records.len());
            let end = (start + removed.len()).min(records.len());
            records.drain(start..end).collect()
        };
        tracing::trace!(path = %self.path, start, removed = gone.len(), inserted = inserted.len(), "each splice");
        for record in gone {
            record.scope.destroy();
        }
        let start = start.min(self.records.borrow().len());
        let after = start + inserted.len();
        self.insert(start, inserted);
        self.reindex(after);
    }

    fn item(&self, below: &Path, change: &Change) {
        let Some((first, rest)) = below.segments().split_first() else {
            return;
        };
        let Ok(index) = first.parse::<usize>() else {
            return;
        };
        let rest = Path::from_segments(rest.to_vec());
        let len = self.records.borrow().len();
        match change {
            Change::Value { value, .. } if index == len && rest.is_root() => self.splice(Splice {
                start: len,
                removed: Vec::new(),
                inserted: vec![value.clone()],
            }),
            _ if index >= len => {
                tracing::debug!(path = %self.path, index, len, "change past the last record ignored");
            }
            _ => {
                let model = self.records.borrow()[index].model.clone();
                model.mirror(&rest, change);
            }
        }
    }

    /// Materialize `items` as records `start..`, placed before the record
    /// currently at `start` (or the anchor).
    fn insert(&self, start: usize, items: Vec<Value>) {
        if items.is_empty() {
            return;
        }
        let Some(scope) = self.scope.upgrade() else {
            return;
        };
        let Some(parent) = self.anchor.parent() else {
            tracing::debug!(path = %self.path, "each anchor is detached, skipping insert");
            return;
        };
        let reference = self
            .records
            .borrow()
            .get(start)
            .map(|r| r.node.clone())
            .unwrap_or_else(|| self.anchor.clone());

        for (offset, value) in items.into_iter().enumerate() {
            let index = Rc::new(Cell::new(start + offset));
            let model = Model::item(scope.model(), self.path.clone(), Rc::clone(&index), value);
            let item_scope = scope.child(model.clone(), Rc::clone(&index));
            let node = self.template.deep_clone();
            parent.insert_before(&node, Some(&reference));
            item_scope.set_root(&node);
            if let Err(err) = compile(&node, &item_scope) {
                tracing::warn!(path = %self.path, %err, "each item failed to compile");
            }
            self.records.borrow_mut().insert(
                start + offset,
                Record {
                    scope: item_scope,
                    node,
                    model,
                    index,
                },
            );
        }
    }

    /// Bring index cells from `from` onward in line with record positions and
    /// tell `$index` dependents of every record that moved.
    fn reindex(&self, from: usize) {
        let moved: Vec<(Model, usize, usize)> = self
            .records
            .borrow()
            .iter()
            .enumerate()
            .skip(from)
            .filter_map(|(i, record)| {
                let previous = record.index.replace(i);
                (previous != i).then(|| (record.model.clone(), previous, i))
            })
            .collect();
        for (model, previous, current) in moved {
            model.notify_index(previous, current);
        }
    }

    /// Stop listening and tear down every item scope. Item nodes stay in place.
    pub(crate) fn destroy(&self) {
        if self.state.replace(EachState::Destroyed) == EachState::Destroyed {
            return;
        }
        self.pending.borrow_mut().clear();
        drop(std::mem::take(&mut *self.subscriptions.borrow_mut()));
        let records = std::mem::take(&mut *self.records.borrow_mut());
        for record in records {
            record.scope.teardown();
        }
    }
}

impl Drop for Each {
    fn drop(&mut self) {
        self.destroy();
    }
}

use std::fmt;
use std::ops::Range;

use serde_json::Value;

use crate::error::Result;
use crate::model::Model;
use crate::path::Path;

/// An observed list inside a [`Model`].
///
/// Every mutating call edits the list in place and then emits exactly one
/// [`Splice`](crate::Splice) to the path's list observers, which is how `each`
/// reconcilers learn about the edit. An absent list is created empty on the
/// first mutation; a path holding some other value yields
/// [`BindError::NotAList`](crate::BindError::NotAList).
#[derive(Clone)]
pub struct ObservedList {
    model: Model,
    path: Path,
}

impl ObservedList {
    pub(crate) fn new(model: Model, path: Path) -> Self {
        ObservedList { model, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current items; empty if the path is absent or not a list.
    pub fn to_vec(&self) -> Vec<Value> {
        match self.model.get_path(&self.path) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.to_vec().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.model.get_path(&self.path.child(&index.to_string()))
    }

    /// Append one item. Returns the new length.
    pub fn push(&self, item: impl Into<Value>) -> Result<usize> {
        self.extend([item.into()])
    }

    /// Append several items as a single edit. Returns the new length.
    pub fn extend(&self, items: impl IntoIterator<Item = Value>) -> Result<usize> {
        let len = self.len();
        self.splice(len, 0, items)?;
        Ok(self.len())
    }

    /// Prepend one item. Returns the new length.
    pub fn unshift(&self, item: impl Into<Value>) -> Result<usize> {
        self.splice(0, 0, [item.into()])?;
        Ok(self.len())
    }

    pub fn pop(&self) -> Result<Option<Value>> {
        let len = self.len();
        let removed = self.splice(len.saturating_sub(1), 1, std::iter::empty())?;
        Ok(removed.into_iter().next())
    }

    pub fn shift(&self) -> Result<Option<Value>> {
        let removed = self.splice(0, 1, std::iter::empty())?;
        Ok(removed.into_iter().next())
    }

    pub fn insert_at(&self, index: usize, item: impl Into<Value>) -> Result<()> {
        self.splice(index, 0, [item.into()])?;
        Ok(())
    }

    /// Replace the item at `index`, returning the old one.
    pub fn replace_at(&self, index: usize, item: impl Into<Value>) -> Result<Option<Value>> {
        let removed = self.splice(index, 1, [item.into()])?;
        Ok(removed.into_iter().next())
    }

    pub fn remove_range(&self, range: Range<usize>) -> Result<Vec<Value>> {
        self.splice(range.start, range.end.saturating_sub(range.start), std::iter::empty())
    }

    /// Remove `delete_count` items at `start` and insert `items` there.
    ///
    /// Follows `Array.prototype.splice` truncation: `start` past the end
    /// appends, and `delete_count` past the end removes what is left.
    pub fn splice(
        &self,
        start: usize,
        delete_count: usize,
        items: impl IntoIterator<Item = Value>,
    ) -> Result<Vec<Value>> {
        self.model
            .splice_path(&self.path, start, delete_count, items.into_iter().collect())
    }
}

impl fmt::Debug for ObservedList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservedList")
            .field("path", &self.path.key())
            .field("items", &self.to_vec())
            .finish()
    }
}

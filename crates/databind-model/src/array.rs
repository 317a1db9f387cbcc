#![forbid(unsafe_code)]

//! Observable handles to arrays stored in a [`Model`].
//!
//! An [`ObservableArray`] is bound to the concrete path its array lives at.
//! Every structural mutation goes through [`ObservableArray::mutate`], which
//! applies the change to the stored sequence and then notifies the owning
//! path followed by each of its ancestors, exactly like a direct
//! [`Model::attr`] write would. Reads never notify.
//!
//! Mutators always notify once they succeed, even when the change is a no-op
//! such as popping an empty array.

use std::cmp::Ordering;
use std::ops::{Bound, RangeBounds};

use serde_json::Value;
use tracing::trace;

use crate::error::{ModelError, Result};
use crate::model::Model;
use crate::path::{Key, PathError, ResolutionFailure, ResolvedPath};

/// A handle to the array stored at one path of a [`Model`].
#[derive(Debug, Clone)]
pub struct ObservableArray {
    model: Model,
    owner: ResolvedPath,
}

impl ObservableArray {
    pub(crate) fn new(model: Model, owner: ResolvedPath) -> Self {
        Self { model, owner }
    }

    /// The path this array is bound to.
    #[must_use]
    pub fn path(&self) -> &ResolvedPath {
        &self.owner
    }

    /// A snapshot of the underlying sequence.
    pub fn value(&self) -> Result<Vec<Value>> {
        self.model
            .with_stored_array(&self.owner, |items| Ok(items.clone()))
    }

    pub fn len(&self) -> Result<usize> {
        self.model.with_stored_array(&self.owner, |items| Ok(items.len()))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn get(&self, index: usize) -> Result<Option<Value>> {
        self.model
            .with_stored_array(&self.owner, |items| Ok(items.get(index).cloned()))
    }

    pub fn contains(&self, value: &Value) -> Result<bool> {
        self.model
            .with_stored_array(&self.owner, |items| Ok(items.contains(value)))
    }

    pub fn push(&self, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.mutate("push", |items| {
            items.push(value);
            Ok(())
        })
    }

    pub fn pop(&self) -> Result<Option<Value>> {
        self.mutate("pop", |items| Ok(items.pop()))
    }

    /// Insert at `index`, shifting later elements. `index` may equal the
    /// length.
    pub fn insert(&self, index: usize, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let owner = &self.owner;
        self.mutate("insert", |items| {
            if index > items.len() {
                return Err(out_of_range(owner, index, items.len()));
            }
            items.insert(index, value);
            Ok(())
        })
    }

    pub fn remove(&self, index: usize) -> Result<Value> {
        let owner = &self.owner;
        self.mutate("remove", |items| {
            if index >= items.len() {
                return Err(out_of_range(owner, index, items.len()));
            }
            Ok(items.remove(index))
        })
    }

    /// Replace the element at `index`, returning the previous one.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> Result<Value> {
        let value = value.into();
        let owner = &self.owner;
        self.mutate("set", |items| {
            let len = items.len();
            let slot = items
                .get_mut(index)
                .ok_or_else(|| out_of_range(owner, index, len))?;
            Ok(std::mem::replace(slot, value))
        })
    }

    pub fn clear(&self) -> Result<()> {
        self.mutate("clear", |items| {
            items.clear();
            Ok(())
        })
    }

    pub fn truncate(&self, len: usize) -> Result<()> {
        self.mutate("truncate", |items| {
            items.truncate(len);
            Ok(())
        })
    }

    pub fn extend<I>(&self, values: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.mutate("extend", |items| {
            items.extend(values);
            Ok(())
        })
    }

    pub fn reverse(&self) -> Result<()> {
        self.mutate("reverse", |items| {
            items.reverse();
            Ok(())
        })
    }

    /// Replace `range` with `replacement`, returning the removed elements.
    pub fn splice<R, I>(&self, range: R, replacement: I) -> Result<Vec<Value>>
    where
        R: RangeBounds<usize>,
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let replacement: Vec<Value> = replacement.into_iter().map(Into::into).collect();
        let owner = &self.owner;
        self.mutate("splice", |items| {
            let len = items.len();
            let start = match range.start_bound() {
                Bound::Included(&start) => Some(start),
                Bound::Excluded(&start) => start.checked_add(1),
                Bound::Unbounded => Some(0),
            };
            let end = match range.end_bound() {
                Bound::Included(&end) => end.checked_add(1),
                Bound::Excluded(&end) => Some(end),
                Bound::Unbounded => Some(len),
            };
            let (Some(start), Some(end)) = (start, end) else {
                return Err(out_of_range(owner, usize::MAX, len));
            };
            if start > end || end > len {
                return Err(out_of_range(owner, end.max(start), len));
            }
            Ok(items.splice(start..end, replacement).collect())
        })
    }

    /// Keep only the elements matching `keep`.
    ///
    /// `keep` runs against a snapshot, so it may read the model.
    pub fn retain(&self, mut keep: impl FnMut(&Value) -> bool) -> Result<()> {
        let mut snapshot = self.value()?;
        snapshot.retain(|value| keep(value));
        self.replace_with(snapshot, "retain")
    }

    /// Sort with `compare`.
    ///
    /// `compare` runs against a snapshot, so it may read the model.
    pub fn sort_by(&self, compare: impl FnMut(&Value, &Value) -> Ordering) -> Result<()> {
        let mut snapshot = self.value()?;
        snapshot.sort_by(compare);
        self.replace_with(snapshot, "sort_by")
    }

    fn replace_with(&self, items: Vec<Value>, op: &'static str) -> Result<()> {
        self.mutate(op, |stored| {
            *stored = items;
            Ok(())
        })
    }

    /// Apply `f` to the stored sequence, then notify the owner and its
    /// ancestors. Nothing is notified if `f` fails.
    ///
    /// `f` runs while the model is borrowed and must not call back into it.
    fn mutate<R>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut Vec<Value>) -> Result<R>,
    ) -> Result<R> {
        let out = self.model.with_stored_array(&self.owner, f)?;
        trace!(message = "model.array.mutate", op, path = %self.owner);
        self.model.propagate_array_change(&self.owner);
        Ok(out)
    }
}

fn out_of_range(owner: &ResolvedPath, index: usize, len: usize) -> ModelError {
    PathError::resolution(
        Key::Index(index),
        owner,
        ResolutionFailure::OutOfRange { index, len },
    )
    .into()
}

#![forbid(unsafe_code)]

//! Traversal and assignment primitives over a value graph.
//!
//! [`ValueGraph`] is the explicit interface the resolver walks: a value
//! either exposes a child for a [`Key`] or reports why it cannot. The model
//! stores `serde_json::Value` graphs, so that is the implementation provided
//! here; the free functions are generic so the resolver never reaches into a
//! concrete representation.

use serde_json::Value;

use crate::path::{Key, PathError, ResolutionFailure, ResolvedPath};

/// A node of a graph addressable by [`Key`]s.
pub trait ValueGraph: Sized {
    /// Borrow the child at `key`.
    fn child(&self, key: &Key) -> Result<&Self, ResolutionFailure>;

    /// Mutably borrow the child at `key`.
    fn child_mut(&mut self, key: &Key) -> Result<&mut Self, ResolutionFailure>;

    /// Store `value` at `key`, creating the entry when the container allows it.
    fn assign(&mut self, key: &Key, value: Self) -> Result<(), ResolutionFailure>;

    /// Interpret this value as a sequence index.
    fn as_index(&self) -> Option<usize>;
}

impl ValueGraph for Value {
    fn child(&self, key: &Key) -> Result<&Self, ResolutionFailure> {
        match (self, key) {
            (Value::Object(map), Key::Field(name)) => {
                map.get(name).ok_or(ResolutionFailure::MissingKey)
            }
            (Value::Object(map), Key::Index(index)) => map
                .get(&index.to_string())
                .ok_or(ResolutionFailure::MissingKey),
            (Value::Array(items), Key::Index(index)) => {
                items.get(*index).ok_or(ResolutionFailure::OutOfRange {
                    index: *index,
                    len: items.len(),
                })
            }
            (_, Key::Field(_)) => Err(ResolutionFailure::NotAnObject),
            (_, Key::Index(_)) => Err(ResolutionFailure::NotIndexable),
        }
    }

    fn child_mut(&mut self, key: &Key) -> Result<&mut Self, ResolutionFailure> {
        match (self, key) {
            (Value::Object(map), Key::Field(name)) => {
                map.get_mut(name).ok_or(ResolutionFailure::MissingKey)
            }
            (Value::Object(map), Key::Index(index)) => map
                .get_mut(&index.to_string())
                .ok_or(ResolutionFailure::MissingKey),
            (Value::Array(items), Key::Index(index)) => {
                let len = items.len();
                items
                    .get_mut(*index)
                    .ok_or(ResolutionFailure::OutOfRange { index: *index, len })
            }
            (_, Key::Field(_)) => Err(ResolutionFailure::NotAnObject),
            (_, Key::Index(_)) => Err(ResolutionFailure::NotIndexable),
        }
    }

    fn assign(&mut self, key: &Key, value: Self) -> Result<(), ResolutionFailure> {
        match (self, key) {
            (Value::Object(map), Key::Field(name)) => {
                map.insert(name.clone(), value);
                Ok(())
            }
            (Value::Object(map), Key::Index(index)) => {
                map.insert(index.to_string(), value);
                Ok(())
            }
            (Value::Array(items), Key::Index(index)) => {
                let len = items.len();
                if *index < len {
                    items[*index] = value;
                } else if *index == len {
                    items.push(value);
                } else {
                    return Err(ResolutionFailure::OutOfRange { index: *index, len });
                }
                Ok(())
            }
            (_, Key::Field(_)) => Err(ResolutionFailure::NotAnObject),
            (_, Key::Index(_)) => Err(ResolutionFailure::NotIndexable),
        }
    }

    fn as_index(&self) -> Option<usize> {
        match self {
            Value::Number(n) => {
                if let Some(index) = n.as_u64() {
                    return usize::try_from(index).ok();
                }
                let float = n.as_f64()?;
                (float >= 0.0 && float.fract() == 0.0 && float <= usize::MAX as f64)
                    .then_some(float as usize)
            }
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

/// An empty container suitable for holding `key`.
#[must_use]
pub fn container_for(key: &Key) -> Value {
    match key {
        Key::Field(_) => Value::Object(Default::default()),
        Key::Index(_) => Value::Array(Vec::new()),
    }
}

/// Walk `path.keys()[start..end]` from `value`.
///
/// `value` is the node addressed by the first `start` keys of `path`; errors
/// report the offending key and the prefix resolved before it.
pub fn traverse<'a, G: ValueGraph>(
    value: &'a G,
    path: &ResolvedPath,
    start: usize,
    end: usize,
) -> Result<&'a G, PathError> {
    let mut current = value;
    for depth in start..end {
        let key = &path.keys()[depth];
        current = current
            .child(key)
            .map_err(|reason| PathError::resolution(key, &path.prefix(depth), reason))?;
    }
    Ok(current)
}

/// Mutable counterpart of [`traverse`].
pub fn traverse_mut<'a, G: ValueGraph>(
    value: &'a mut G,
    path: &ResolvedPath,
    start: usize,
    end: usize,
) -> Result<&'a mut G, PathError> {
    let mut current = value;
    for depth in start..end {
        let key = &path.keys()[depth];
        current = current
            .child_mut(key)
            .map_err(|reason| PathError::resolution(key, &path.prefix(depth), reason))?;
    }
    Ok(current)
}

/// Read the node at the full `path`, starting below its first `start` keys.
pub fn read<'a, G: ValueGraph>(
    value: &'a G,
    path: &ResolvedPath,
    start: usize,
) -> Result<&'a G, PathError> {
    traverse(value, path, start, path.len())
}

/// Assign `new_value` at the last key of `path`.
///
/// All keys from `start` up to the last must already resolve; the last key is
/// created if its container allows it. `path` must be longer than `start`.
pub fn assign<G: ValueGraph>(
    value: &mut G,
    path: &ResolvedPath,
    start: usize,
    new_value: G,
) -> Result<(), PathError> {
    let last = path.len() - 1;
    let parent = traverse_mut(value, path, start, last)?;
    let key = &path.keys()[last];
    parent
        .assign(key, new_value)
        .map_err(|reason| PathError::resolution(key, &path.prefix(last), reason))
}

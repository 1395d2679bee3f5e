//! Structural diff and patch over state snapshots.
//!
//! The entity core treats a [`Changeset`] as opaque: it only asks whether
//! one is empty, and hands it back to the same [`ChangesetEngine`] that
//! produced it. [`StructuralDiff`] is the engine used unless another one is
//! injected through [`EntityBuilder`](crate::EntityBuilder).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PatchError;

/// An entity's state snapshot: field name to arbitrarily nested value.
pub type State = Map<String, Value>;

/// A single structural edit, addressed by a path of object keys from the
/// snapshot root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Insert or replace the value at `path`.
    Set {
        /// Object keys from the root to the target field.
        path: Vec<String>,
        /// The new value.
        value: Value,
    },
    /// Delete the key at `path`.
    Remove {
        /// Object keys from the root to the removed field.
        path: Vec<String>,
    },
}

impl Operation {
    /// Path addressed by this operation.
    pub fn path(&self) -> &[String] {
        match self {
            Operation::Set { path, .. } | Operation::Remove { path } => path,
        }
    }
}

/// An ordered list of operations that turns one snapshot into another.
///
/// Serializes as a plain JSON array of operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Changeset {
    operations: Vec<Operation>,
}

impl Changeset {
    /// Build a changeset from explicit operations.
    pub fn new(operations: Vec<Operation>) -> Self {
        Self { operations }
    }

    /// `true` when the changeset has no effective operations.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// The operations, in application order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }
}

/// Computes and applies changesets between state snapshots.
///
/// # Contract
///
/// - Both functions must be pure.
/// - `patch(before, &diff(before, after))` must return `Ok(after.clone())`.
/// - A changeset describing no change must report [`Changeset::is_empty`].
pub trait ChangesetEngine: Send + Sync + 'static {
    /// Describe how to get from `before` to `after`.
    fn diff(&self, before: &State, after: &State) -> Changeset;

    /// Apply `changeset` to a copy of `base` and return the result.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError`] when an operation does not fit `base`.
    fn patch(&self, base: &State, changeset: &Changeset) -> Result<State, PatchError>;
}

/// Default [`ChangesetEngine`] that recurses into nested objects.
///
/// Objects present on both sides are compared key by key. Anything else
/// (scalars, arrays, or a change of kind) is replaced wholesale with a
/// `Set`. Keys are visited in the map's iteration order, so diffs are
/// deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralDiff;

impl StructuralDiff {
    fn diff_objects(
        prefix: &mut Vec<String>,
        before: &Map<String, Value>,
        after: &Map<String, Value>,
        ops: &mut Vec<Operation>,
    ) {
        for key in before.keys() {
            if !after.contains_key(key) {
                ops.push(Operation::Remove {
                    path: child_path(prefix, key),
                });
            }
        }

        for (key, new) in after {
            match (before.get(key), new) {
                (Some(old), new) if old == new => {}
                (Some(Value::Object(old)), Value::Object(new)) => {
                    prefix.push(key.clone());
                    Self::diff_objects(prefix, old, new, ops);
                    prefix.pop();
                }
                _ => ops.push(Operation::Set {
                    path: child_path(prefix, key),
                    value: new.clone(),
                }),
            }
        }
    }
}

impl ChangesetEngine for StructuralDiff {
    fn diff(&self, before: &State, after: &State) -> Changeset {
        let mut ops = Vec::new();
        Self::diff_objects(&mut Vec::new(), before, after, &mut ops);
        Changeset::new(ops)
    }

    fn patch(&self, base: &State, changeset: &Changeset) -> Result<State, PatchError> {
        let mut next = base.clone();
        for op in changeset.operations() {
            let Some((key, parents)) = op.path().split_last() else {
                return Err(PatchError::EmptyPath);
            };
            let parent = walk_mut(&mut next, parents, op.path())?;
            match op {
                Operation::Set { value, .. } => {
                    parent.insert(key.clone(), value.clone());
                }
                Operation::Remove { .. } => {
                    if parent.remove(key).is_none() {
                        return Err(PatchError::MissingKey {
                            path: render_path(op.path()),
                        });
                    }
                }
            }
        }
        Ok(next)
    }
}

fn child_path(prefix: &[String], key: &str) -> Vec<String> {
    let mut path = prefix.to_vec();
    path.push(key.to_owned());
    path
}

/// Descend through `parents`, requiring every step to be an existing object.
fn walk_mut<'a>(
    root: &'a mut Map<String, Value>,
    parents: &[String],
    full: &[String],
) -> Result<&'a mut Map<String, Value>, PatchError> {
    let mut current = root;
    for key in parents {
        current = match current.get_mut(key) {
            Some(Value::Object(child)) => child,
            Some(_) => {
                return Err(PatchError::NotAnObject {
                    path: render_path(full),
                });
            }
            None => {
                return Err(PatchError::MissingParent {
                    path: render_path(full),
                });
            }
        };
    }
    Ok(current)
}

pub(crate) fn render_path(path: &[String]) -> String {
    path.join(".")
}

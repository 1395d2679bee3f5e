//! Uniform accessor layer over an entity's state and commands.
//!
//! Reads go through [`Entity::get`], which resolves a key to either a
//! registered [`Command`] or a field value. Writes only happen inside a
//! behavior, through the [`Fields`] draft it is handed; the draft is the
//! same structural map the wrapper diffs, so there is no second copy of
//! the fields that could drift from the snapshot.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::changeset::State;
use crate::command::Command;
use crate::entity::Entity;
use crate::error::EntityError;

static NULL: Value = Value::Null;

/// Error raised when a behavior reads an argument or field with the wrong
/// shape, or writes a value that cannot be represented as JSON.
///
/// Converts into [`BehaviorError`](crate::BehaviorError) through `?`.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    /// The call supplied fewer arguments than the behavior reads.
    #[error("missing argument at position {index}")]
    MissingArgument {
        /// Zero-based argument position.
        index: usize,
    },

    /// An argument could not be decoded into the requested type.
    #[error("argument at position {index} has the wrong type: {source}")]
    InvalidArgument {
        /// Zero-based argument position.
        index: usize,
        /// Decoding failure.
        #[source]
        source: serde_json::Error,
    },

    /// A field could not be decoded into the requested type.
    #[error("field `{key}` has the wrong type: {source}")]
    InvalidField {
        /// Field name.
        key: String,
        /// Decoding failure.
        #[source]
        source: serde_json::Error,
    },

    /// A value written to a field could not be encoded.
    #[error("cannot encode value for field `{key}`: {source}")]
    Encode {
        /// Field name.
        key: String,
        /// Encoding failure.
        #[source]
        source: serde_json::Error,
    },
}

/// Mutable draft of an entity's state, handed to a behavior.
///
/// Absent fields read as `null`. The draft only becomes the entity's state
/// if the wrapper records an event from it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    map: State,
}

impl Fields {
    pub(crate) fn new(map: State) -> Self {
        Self { map }
    }

    pub(crate) fn into_state(self) -> State {
        self.map
    }

    /// The value of `key`, or `null` if it is not set.
    pub fn get(&self, key: &str) -> &Value {
        self.map.get(key).unwrap_or(&NULL)
    }

    /// Decode the value of `key` into `T`. Absent fields decode from
    /// `null`, so `Option<T>` yields `None` for them.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::InvalidField`] if the value does not fit `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T, AccessError> {
        T::deserialize(self.get(key)).map_err(|source| AccessError::InvalidField {
            key: key.to_owned(),
            source,
        })
    }

    /// Write `value` to `key`.
    ///
    /// JSON has no representation for NaN or infinite floats; they are
    /// stored (and recorded) as `null`, as `serde_json` encodes them.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Encode`] if `value` cannot be represented as
    /// JSON (e.g. a map with non-string keys).
    pub fn set<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: T,
    ) -> Result<(), AccessError> {
        let key = key.into();
        match serde_json::to_value(value) {
            Ok(value) => {
                self.map.insert(key, value);
                Ok(())
            }
            Err(source) => Err(AccessError::Encode { key, source }),
        }
    }

    /// Write an already-encoded value to `key`.
    pub fn set_value(&mut self, key: impl Into<String>, value: Value) {
        self.map.insert(key.into(), value);
    }

    /// Remove `key`, returning its previous value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.map.remove(key)
    }

    /// `true` if `key` is set (even to `null`).
    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Read-only view of the whole draft.
    pub fn as_state(&self) -> &State {
        &self.map
    }
}

/// Positional arguments for a command call.
///
/// Converts from a JSON array (one argument per element), `null` (no
/// arguments), any other JSON value (a single argument), or a `Vec<Value>`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args(Vec<Value>);

impl Args {
    /// Arguments from an explicit list.
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// No arguments.
    pub fn none() -> Self {
        Self::default()
    }

    /// Decode the argument at `index` into `T`.
    ///
    /// # Errors
    ///
    /// [`AccessError::MissingArgument`] past the end of the list,
    /// [`AccessError::InvalidArgument`] if the value does not fit `T`.
    pub fn get<T: DeserializeOwned>(&self, index: usize) -> Result<T, AccessError> {
        let value = self.0.get(index).ok_or(AccessError::MissingArgument { index })?;
        T::deserialize(value).map_err(|source| AccessError::InvalidArgument { index, source })
    }

    /// The raw argument at `index`.
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` if no arguments were supplied.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Value>> for Args {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl From<Value> for Args {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::none(),
            Value::Array(values) => Self(values),
            other => Self(vec![other]),
        }
    }
}

impl From<()> for Args {
    fn from(_: ()) -> Self {
        Self::none()
    }
}

/// What a key resolves to on an entity.
#[derive(Clone)]
pub enum Member {
    /// A registered command; shadows any field with the same name.
    Command(Command),
    /// A field value, `null` when the field is absent.
    Field(Value),
}

impl std::fmt::Debug for Member {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Member::Command(cmd) => f.debug_tuple("Command").field(&cmd.name()).finish(),
            Member::Field(value) => f.debug_tuple("Field").field(value).finish(),
        }
    }
}

impl Member {
    /// The command, if this member is one.
    pub fn as_command(&self) -> Option<&Command> {
        match self {
            Member::Command(cmd) => Some(cmd),
            Member::Field(_) => None,
        }
    }

    /// The field value, if this member is one.
    pub fn as_field(&self) -> Option<&Value> {
        match self {
            Member::Field(value) => Some(value),
            Member::Command(_) => None,
        }
    }
}

impl Entity {
    /// Resolve `key`: a registered command wins over a same-named field;
    /// otherwise the field's value, or `null` if absent.
    pub fn get(&self, key: &str) -> Member {
        match self.commands.get(key) {
            Some(cmd) => Member::Command(cmd.clone()),
            None => Member::Field(self.field(key).clone()),
        }
    }

    /// The value of field `key` in the current state, `null` if absent.
    pub fn field(&self, key: &str) -> &Value {
        self.state.get(key).unwrap_or(&NULL)
    }

    /// Decode field `key` of the current state into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::InvalidField`] if the value does not fit `T`.
    pub fn field_as<T: DeserializeOwned>(&self, key: &str) -> Result<T, AccessError> {
        T::deserialize(self.field(key)).map_err(|source| AccessError::InvalidField {
            key: key.to_owned(),
            source,
        })
    }

    /// Resolve `name` to a command and invoke it.
    ///
    /// # Returns
    ///
    /// `Ok(None)` for commands, `Ok(Some(value))` for queries.
    ///
    /// # Errors
    ///
    /// [`EntityError::UnknownCommand`] if `name` is not registered, plus
    /// anything [`Command::invoke`] returns.
    pub fn call(
        &mut self,
        name: &str,
        args: impl Into<Args>,
    ) -> Result<Option<Value>, EntityError> {
        let cmd = self
            .commands
            .get(name)
            .cloned()
            .ok_or_else(|| EntityError::UnknownCommand(name.to_owned()))?;
        cmd.invoke(self, args.into())
    }
}

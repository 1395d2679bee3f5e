//! Event records and the shapes accepted as construction-time history.
//!
//! An [`Event`] is immutable once created. Events are produced by the
//! command wrapper or the snapshot manager, or decoded from event-shaped
//! JSON records when an entity is rebuilt from an exported history.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::changeset::Changeset;
use crate::error::EntityError;

/// Name reserved for synthetic snapshot events.
///
/// When an event with this name is applied, its changeset is applied to
/// an empty snapshot rather than to the current state.
pub const SNAPSHOT_EVENT: &str = "snapshot";

/// One immutable entry in an entity's history.
///
/// Serialized as `{"name": ..., "version": ..., "changeset": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    name: String,
    version: u64,
    changeset: Changeset,
}

impl Event {
    /// Create an event.
    ///
    /// # Arguments
    ///
    /// * `name` - Event name (mapped, derived, or [`SNAPSHOT_EVENT`]).
    /// * `version` - The entity version this event produces when applied.
    /// * `changeset` - Structural edits that the event carries.
    pub fn new(name: impl Into<String>, version: u64, changeset: Changeset) -> Self {
        Self {
            name: name.into(),
            version,
            changeset,
        }
    }

    /// The event name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The version the entity holds after this event is applied.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The structural edits carried by this event.
    pub fn changeset(&self) -> &Changeset {
        &self.changeset
    }

    /// `true` for synthetic snapshot events, which replace state wholesale
    /// when applied.
    pub fn is_snapshot(&self) -> bool {
        self.name == SNAPSHOT_EVENT
    }

    /// Decode one event-shaped JSON record.
    ///
    /// The record must be an object with a string `name`, an unsigned
    /// integer `version`, and a `changeset` array.
    ///
    /// # Arguments
    ///
    /// * `index` - Position of the record in its history, used in errors.
    /// * `record` - The JSON record.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::MalformedEvent`] naming the first missing or
    /// mistyped field.
    pub fn from_record(index: usize, record: &Value) -> Result<Self, EntityError> {
        let malformed = |reason: String| EntityError::MalformedEvent { index, reason };

        let obj = record
            .as_object()
            .ok_or_else(|| malformed(format!("expected an object, got {}", kind_of(record))))?;

        let name = match obj.get("name") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => {
                return Err(malformed(format!(
                    "`name` must be a string, got {}",
                    kind_of(other)
                )));
            }
            None => return Err(malformed("missing `name`".into())),
        };

        let version = match obj.get("version") {
            Some(v) => v.as_u64().ok_or_else(|| {
                malformed(format!("`version` must be an unsigned integer, got {v}"))
            })?,
            None => return Err(malformed("missing `version`".into())),
        };

        let changeset = match obj.get("changeset") {
            Some(v) => serde_json::from_value::<Changeset>(v.clone())
                .map_err(|e| malformed(format!("invalid `changeset`: {e}")))?,
            None => return Err(malformed("missing `changeset`".into())),
        };

        Ok(Self::new(name, version, changeset))
    }

    /// Decode a JSON history: a single record (object) or a sequence of
    /// records (array), in order.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::MalformedEvent`] for the first bad record, or
    /// when `records` is neither an object, an array, nor `null`.
    pub fn from_records(records: &Value) -> Result<Vec<Self>, EntityError> {
        match records {
            Value::Null => Ok(Vec::new()),
            Value::Object(_) => Ok(vec![Self::from_record(0, records)?]),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, record)| Self::from_record(i, record))
                .collect(),
            other => Err(EntityError::MalformedEvent {
                index: 0,
                reason: format!("expected an event or a list of events, got {}", kind_of(other)),
            }),
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// History handed to an entity at construction.
///
/// Either nothing, one event, or an ordered sequence. Each is applied in
/// order as if it had just been recorded.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum InitialEvents {
    /// Start from the empty snapshot at version 0.
    #[default]
    None,
    /// A single event.
    One(Event),
    /// An ordered sequence of events.
    Many(Vec<Event>),
}

impl InitialEvents {
    /// Flatten into an ordered list.
    pub fn into_vec(self) -> Vec<Event> {
        match self {
            InitialEvents::None => Vec::new(),
            InitialEvents::One(event) => vec![event],
            InitialEvents::Many(events) => events,
        }
    }
}

impl From<()> for InitialEvents {
    fn from(_: ()) -> Self {
        InitialEvents::None
    }
}

impl From<Event> for InitialEvents {
    fn from(event: Event) -> Self {
        InitialEvents::One(event)
    }
}

impl From<Vec<Event>> for InitialEvents {
    fn from(events: Vec<Event>) -> Self {
        InitialEvents::Many(events)
    }
}

impl From<&[Event]> for InitialEvents {
    fn from(events: &[Event]) -> Self {
        InitialEvents::Many(events.to_vec())
    }
}

impl From<Option<Event>> for InitialEvents {
    fn from(event: Option<Event>) -> Self {
        event.map_or(InitialEvents::None, InitialEvents::One)
    }
}

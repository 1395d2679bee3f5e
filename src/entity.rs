//! The aggregate root: state store, event log, and command table.
//!
//! An [`Entity`] is built from an [`EntityDefinition`], an initial history,
//! and an [`EntityConfig`]. Its fields are private; everything the outside
//! world can do goes through the dispatch layer ([`Entity::get`],
//! [`Entity::call`]) or the free operations re-exported at the crate root.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::apply::{rebuild, replay};
use crate::bus::{EventBus, ListenerId};
use crate::changeset::{ChangesetEngine, State, StructuralDiff};
use crate::command::{Command, EntityDefinition, register_commands};
use crate::config::EntityConfig;
use crate::event::{Event, InitialEvents};
use crate::error::EntityError;
use crate::naming::{EventNamer, PastTense};

/// An event-sourced entity whose commands are recorded by diffing state.
///
/// # Examples
///
/// ```
/// use eventfold_entity::{Entity, EntityConfig, EntityDefinition};
/// use serde_json::json;
///
/// let person = EntityDefinition::new("person").command("rename", |fields, args| {
///     fields.set("name", args.get::<String>(0)?)?;
///     Ok(None)
/// });
///
/// let mut ada = Entity::new(&person, (), EntityConfig::default()).unwrap();
/// ada.call("rename", json!(["Ada"])).unwrap();
///
/// assert_eq!(ada.version(), 1);
/// assert_eq!(ada.history()[0].name(), "renamed");
/// assert_eq!(ada.field("name"), &json!("Ada"));
///
/// // A second entity rebuilt from the first one's history.
/// let copy = Entity::new(&person, ada.history(), EntityConfig::default()).unwrap();
/// assert_eq!(copy.state(), ada.state());
/// assert_eq!(copy.version(), 1);
/// ```
#[derive(Clone)]
pub struct Entity {
    pub(crate) kind: String,
    pub(crate) version: u64,
    pub(crate) state: State,
    pub(crate) history: Vec<Event>,
    pub(crate) mappings: BTreeMap<String, String>,
    pub(crate) commands: BTreeMap<String, Command>,
    pub(crate) bus: EventBus,
    pub(crate) engine: Arc<dyn ChangesetEngine>,
    pub(crate) namer: Arc<dyn EventNamer>,
}

// Manual `Debug` because the engine, namer, and behaviors are trait objects.
impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("kind", &self.kind)
            .field("version", &self.version)
            .field("state", &self.state)
            .field("history_len", &self.history.len())
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Entity {
    /// Build an entity and replay `events` into it.
    ///
    /// Uses [`StructuralDiff`] and [`PastTense`]; see [`Entity::builder`]
    /// to supply other collaborators.
    ///
    /// # Arguments
    ///
    /// * `definition` - Declared behaviors; each becomes a command.
    /// * `events` - Initial history: `()`, one [`Event`], or a sequence.
    /// * `config` - Command-to-event-name mappings.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::ChangesetApplication`] if an initial event
    /// does not apply.
    pub fn new(
        definition: &EntityDefinition,
        events: impl Into<InitialEvents>,
        config: EntityConfig,
    ) -> Result<Self, EntityError> {
        Self::builder(definition).config(config).events(events).build()
    }

    /// Build an entity from an exported JSON history: one event record
    /// (object), a list of records (array), or `null` for none.
    ///
    /// # Errors
    ///
    /// [`EntityError::MalformedEvent`] for a record missing `name`,
    /// `version`, or `changeset`, plus anything [`Entity::new`] returns.
    pub fn from_records(
        definition: &EntityDefinition,
        records: &Value,
        config: EntityConfig,
    ) -> Result<Self, EntityError> {
        let events = Event::from_records(records)?;
        Self::new(definition, events, config)
    }

    /// Start configuring an entity with non-default collaborators.
    pub fn builder(definition: &EntityDefinition) -> EntityBuilder<'_> {
        EntityBuilder::new(definition)
    }

    /// The entity kind from its definition.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Version of the most recently applied event, 0 if none.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The current state snapshot.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Decode the whole state into `T`.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if the state does not fit `T`.
    pub fn state_as<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&Value::Object(self.state.clone()))
    }

    /// Every event applied to this entity, oldest first.
    pub fn history(&self) -> &[Event] {
        &self.history
    }

    /// Explicit command-to-event-name mappings in effect.
    pub fn mappings(&self) -> &BTreeMap<String, String> {
        &self.mappings
    }

    /// Register a listener for events emitted under `name`.
    pub fn on<F>(&mut self, name: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.bus.on(name, listener)
    }

    /// Unregister a listener. Returns `true` if it was registered.
    pub fn off(&mut self, id: ListenerId) -> bool {
        self.bus.off(id)
    }

    /// Deliver `event` to the listeners registered under `name`.
    ///
    /// Pass-through to the notification bus; does not touch history.
    pub fn emit(&self, name: &str, event: &Event) {
        self.bus.emit(name, event);
    }

    /// Replay history from scratch and compare with the live state.
    ///
    /// # Returns
    ///
    /// `true` when the replayed state and version equal the current ones.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::ChangesetApplication`] if history no longer
    /// replays.
    pub fn verify(&self) -> Result<bool, EntityError> {
        let (state, version) = rebuild(self.engine.as_ref(), &self.history)?;
        Ok(state == self.state && version == self.version)
    }

    /// Event name recorded for `command`: the configured mapping if one
    /// exists, else the derived name.
    pub(crate) fn event_name_for(&self, command: &str) -> String {
        match self.mappings.get(command) {
            Some(name) => name.clone(),
            None => self.namer.event_name(command),
        }
    }
}

/// Builder for an [`Entity`] with custom collaborators.
///
/// # Examples
///
/// ```
/// use eventfold_entity::{Entity, EntityConfig, EntityDefinition, EventNamer};
///
/// struct Shouting;
///
/// impl EventNamer for Shouting {
///     fn event_name(&self, command: &str) -> String {
///         command.to_uppercase()
///     }
/// }
///
/// let def = EntityDefinition::new("counter").command("bump", |fields, _| {
///     let n = fields.get_as::<Option<u64>>("n")?.unwrap_or(0);
///     fields.set("n", n + 1)?;
///     Ok(None)
/// });
///
/// let mut counter = Entity::builder(&def).namer(Shouting).build().unwrap();
/// counter.call("bump", ()).unwrap();
/// assert_eq!(counter.history()[0].name(), "BUMP");
/// ```
pub struct EntityBuilder<'a> {
    definition: &'a EntityDefinition,
    config: EntityConfig,
    events: InitialEvents,
    engine: Arc<dyn ChangesetEngine>,
    namer: Arc<dyn EventNamer>,
}

impl<'a> EntityBuilder<'a> {
    fn new(definition: &'a EntityDefinition) -> Self {
        Self {
            definition,
            config: EntityConfig::default(),
            events: InitialEvents::None,
            engine: Arc::new(StructuralDiff),
            namer: Arc::new(PastTense),
        }
    }

    /// Set the configuration (event-name mappings).
    ///
    /// # Returns
    ///
    /// `self` for method chaining.
    pub fn config(mut self, config: EntityConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the initial history replayed by [`build`](EntityBuilder::build).
    ///
    /// # Returns
    ///
    /// `self` for method chaining.
    pub fn events(mut self, events: impl Into<InitialEvents>) -> Self {
        self.events = events.into();
        self
    }

    /// Use `engine` to diff and patch state instead of [`StructuralDiff`].
    ///
    /// # Returns
    ///
    /// `self` for method chaining.
    pub fn engine(mut self, engine: impl ChangesetEngine) -> Self {
        self.engine = Arc::new(engine);
        self
    }

    /// Use `namer` to derive event names instead of [`PastTense`].
    ///
    /// # Returns
    ///
    /// `self` for method chaining.
    pub fn namer(mut self, namer: impl EventNamer) -> Self {
        self.namer = Arc::new(namer);
        self
    }

    /// Register the definition's commands and replay the initial history.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::ChangesetApplication`] if an initial event
    /// does not apply.
    pub fn build(self) -> Result<Entity, EntityError> {
        let mut entity = Entity {
            kind: self.definition.kind().to_owned(),
            version: 0,
            state: State::new(),
            history: Vec::new(),
            mappings: BTreeMap::new(),
            commands: BTreeMap::new(),
            bus: EventBus::new(),
            engine: self.engine,
            namer: self.namer,
        };

        register_commands(&mut entity, self.definition, &self.config);

        let events = self.events.into_vec();
        let count = events.len();
        replay(&mut entity, events)?;
        tracing::debug!(
            kind = %entity.kind,
            replayed = count,
            version = entity.version,
            "entity constructed"
        );
        Ok(entity)
    }
}

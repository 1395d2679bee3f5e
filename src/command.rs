//! Command declaration, registration, and the diff-driven wrapper.
//!
//! Behaviors are ordinary functions that read and write a [`Fields`]
//! draft. The wrapper turns each call into at most one [`Event`] by
//! diffing the entity's state against the draft once the behavior returns.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::apply::apply;
use crate::config::EntityConfig;
use crate::dispatch::{Args, Fields};
use crate::entity::Entity;
use crate::error::{BehaviorError, EntityError};
use crate::event::Event;

/// A command body.
///
/// Returns `Ok(None)` (or `Ok(Some(Value::Null))`) to act as a command,
/// `Ok(Some(value))` to act as a query.
pub type Behavior =
    Arc<dyn Fn(&mut Fields, &Args) -> Result<Option<Value>, BehaviorError> + Send + Sync + 'static>;

/// The declared shape of an entity type: its kind and its behaviors.
///
/// Behaviors are listed explicitly rather than discovered. Declaring the
/// same name twice replaces the earlier behavior, keeping its position.
///
/// # Examples
///
/// ```
/// use eventfold_entity::{EntityDefinition, methods_of};
///
/// let person = EntityDefinition::new("person")
///     .command("rename", |fields, args| {
///         fields.set("name", args.get::<String>(0)?)?;
///         Ok(None)
///     })
///     .command("touch", |_, _| Ok(None));
///
/// assert_eq!(methods_of(&person), vec!["rename", "touch"]);
/// ```
#[derive(Clone)]
pub struct EntityDefinition {
    kind: String,
    behaviors: Vec<(String, Behavior)>,
}

impl fmt::Debug for EntityDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDefinition")
            .field("kind", &self.kind)
            .field("behaviors", &methods_of(self))
            .finish()
    }
}

impl EntityDefinition {
    /// Start a definition for entities of type `kind` (e.g. `"account"`).
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            behaviors: Vec::new(),
        }
    }

    /// Declare a behavior under `name`.
    ///
    /// # Returns
    ///
    /// `self` for method chaining.
    pub fn command<F>(mut self, name: impl Into<String>, behavior: F) -> Self
    where
        F: Fn(&mut Fields, &Args) -> Result<Option<Value>, BehaviorError> + Send + Sync + 'static,
    {
        let name = name.into();
        let behavior: Behavior = Arc::new(behavior);
        match self.behaviors.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = behavior,
            None => self.behaviors.push((name, behavior)),
        }
        self
    }

    /// The entity kind.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Declared behaviors in declaration order.
    pub fn behaviors(&self) -> impl Iterator<Item = (&str, &Behavior)> {
        self.behaviors.iter().map(|(n, b)| (n.as_str(), b))
    }
}

/// Names of the behaviors declared on `definition`, in declaration order.
pub fn methods_of(definition: &EntityDefinition) -> Vec<&str> {
    definition.behaviors().map(|(name, _)| name).collect()
}

/// A wrapped behavior, as stored in an entity's command table.
///
/// Cheap to clone.
#[derive(Clone)]
pub struct Command {
    name: Arc<str>,
    behavior: Behavior,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command").field("name", &self.name).finish()
    }
}

impl Command {
    /// The name this command is registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the behavior against `entity` and record what it changed.
    ///
    /// 1. The behavior runs on a draft copy of the current state.
    /// 2. If it returned a value, the call is a query: the value is
    ///    handed back and the draft is dropped.
    /// 3. Otherwise the draft is diffed against the current state. A
    ///    non-empty changeset becomes an event at `version + 1`, named by
    ///    the configured mapping or the derived past-tense name. The event
    ///    is applied, appended to history, and emitted under its name.
    ///
    /// # Returns
    ///
    /// `Ok(None)` for commands, `Ok(Some(value))` for queries.
    ///
    /// # Errors
    ///
    /// - [`EntityError::Behavior`] if the behavior fails; nothing changes.
    /// - [`EntityError::ChangesetApplication`] if the engine cannot apply
    ///   the diff it just produced.
    /// - [`EntityError::VersionOverflow`] if state changed but the entity
    ///   is already at `u64::MAX`; nothing changes.
    pub fn invoke(
        &self,
        entity: &mut Entity,
        args: impl Into<Args>,
    ) -> Result<Option<Value>, EntityError> {
        let _span =
            tracing::debug_span!("command", kind = %entity.kind, command = %self.name).entered();

        let args = args.into();
        let mut draft = Fields::new(entity.state.clone());
        let value = (self.behavior)(&mut draft, &args)
            .map_err(|source| EntityError::Behavior {
                command: self.name.to_string(),
                source,
            })?
            .filter(|v| !v.is_null());

        let after = draft.into_state();
        let changeset = entity.engine.diff(&entity.state, &after);

        if let Some(value) = value {
            if !changeset.is_empty() {
                tracing::warn!(
                    discarded = changeset.len(),
                    "query wrote to state; writes discarded"
                );
            }
            tracing::debug!("query answered, no event recorded");
            return Ok(Some(value));
        }

        if changeset.is_empty() {
            tracing::debug!("state unchanged, no event recorded");
            return Ok(None);
        }

        let version = entity
            .version
            .checked_add(1)
            .ok_or_else(|| EntityError::VersionOverflow {
                command: self.name.to_string(),
                version: entity.version,
            })?;
        let event = Event::new(entity.event_name_for(&self.name), version, changeset);
        apply(&event, entity)?;
        tracing::info!(event = event.name(), version = event.version(), "event recorded");
        entity.history.push(event);

        if let Some(recorded) = entity.history.last() {
            entity.bus.emit(recorded.name(), recorded);
        }
        Ok(None)
    }
}

/// Wrap `behavior` and store it under `name` in `entity`'s command table,
/// replacing any command already registered under that name.
pub fn register_command(entity: &mut Entity, name: impl Into<String>, behavior: Behavior) {
    let name: String = name.into();
    let command = Command {
        name: Arc::from(name.as_str()),
        behavior,
    };
    if entity.commands.insert(name.clone(), command).is_some() {
        tracing::debug!(command = %name, "replaced registered command");
    }
}

/// Register every behavior of `definition` on `entity`, then merge the
/// configured event-name mappings.
///
/// # Returns
///
/// The registered command names, in declaration order.
pub fn register_commands(
    entity: &mut Entity,
    definition: &EntityDefinition,
    config: &EntityConfig,
) -> Vec<String> {
    let mut names = Vec::with_capacity(definition.behaviors.len());
    for (name, behavior) in definition.behaviors() {
        register_command(entity, name, Arc::clone(behavior));
        names.push(name.to_owned());
    }
    entity.mappings.extend(
        config
            .mappings
            .iter()
            .map(|(cmd, event)| (cmd.clone(), event.clone())),
    );
    tracing::debug!(kind = %entity.kind, commands = names.len(), "commands registered");
    names
}

/// Names of the commands registered on `entity`, sorted.
pub fn registered_commands_of(entity: &Entity) -> Vec<&str> {
    entity.commands.keys().map(String::as_str).collect()
}

#[cfg(test)]
pub(crate) mod test_fixtures {
    use serde_json::json;

    use super::EntityDefinition;
    use crate::config::EntityConfig;
    use crate::entity::Entity;

    /// Domain error returned by the fixture's `withdraw` behavior.
    #[derive(Debug, thiserror::Error)]
    #[error("insufficient funds: balance {balance}, requested {requested}")]
    pub(crate) struct InsufficientFunds {
        pub balance: u64,
        pub requested: u64,
    }

    /// A small bank-account definition covering commands, queries, no-ops,
    /// and failing behaviors.
    pub(crate) fn account() -> EntityDefinition {
        EntityDefinition::new("account")
            .command("rename", |fields, args| {
                fields.set("name", args.get::<String>(0)?)?;
                Ok(None)
            })
            .command("deposit", |fields, args| {
                let balance = fields.get_as::<Option<u64>>("balance")?.unwrap_or(0);
                fields.set("balance", balance + args.get::<u64>(0)?)?;
                Ok(None)
            })
            .command("withdraw", |fields, args| {
                let balance = fields.get_as::<Option<u64>>("balance")?.unwrap_or(0);
                let requested = args.get::<u64>(0)?;
                // Write first so a failure after a partial write is observable.
                fields.set("last_withdrawal", requested)?;
                if requested > balance {
                    return Err(InsufficientFunds { balance, requested }.into());
                }
                fields.set("balance", balance - requested)?;
                Ok(None)
            })
            .command("label", |fields, args| {
                fields.set("label", args.get::<String>(0)?)?;
                Ok(None)
            })
            .command("close", |fields, _| {
                fields.remove("label");
                fields.set("closed", true)?;
                Ok(None)
            })
            .command("touch", |_, _| Ok(None))
            .command("balance", |fields, _| {
                Ok(Some(json!(fields.get_as::<Option<u64>>("balance")?.unwrap_or(0))))
            })
            .command("audit", |fields, _| {
                fields.set("audited", true)?;
                Ok(Some(json!("ok")))
            })
    }

    /// An account entity with no history and default configuration.
    pub(crate) fn empty_account() -> Entity {
        Entity::new(&account(), (), EntityConfig::default()).expect("empty history replays")
    }
}

#[cfg(test)]
mod tests {
    use super::test_fixtures::{InsufficientFunds, account, empty_account};
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn definition_replaces_duplicate_behavior_in_place() {
        let def = EntityDefinition::new("thing")
            .command("a", |_, _| Ok(None))
            .command("b", |_, _| Ok(None))
            .command("a", |_, _| Ok(Some(json!(1))));
        assert_eq!(methods_of(&def), vec!["a", "b"]);

        let (_, behavior) = def.behaviors().next().unwrap();
        let result = behavior(&mut Fields::default(), &Args::none()).unwrap();
        assert_eq!(result, Some(json!(1)));
    }

    #[test]
    fn register_commands_wraps_each_declared_behavior() {
        let entity = empty_account();
        let def = account();
        let mut expected = methods_of(&def);
        expected.sort_unstable();
        assert_eq!(registered_commands_of(&entity), expected);
    }

    #[test]
    fn register_commands_returns_declaration_order_and_merges_mappings() {
        let mut entity = empty_account();
        let def = EntityDefinition::new("account")
            .command("zeta", |_, _| Ok(None))
            .command("alpha", |_, _| Ok(None));
        let config = EntityConfig::default().with_mapping("zeta", "ZetaHappened");

        let names = register_commands(&mut entity, &def, &config);
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert_eq!(entity.mappings().get("zeta").map(String::as_str), Some("ZetaHappened"));
    }

    #[test]
    fn register_command_replaces_existing() {
        let mut entity = empty_account();
        let before = registered_commands_of(&entity).len();
        let behavior: Behavior = Arc::new(
            |f: &mut Fields, _: &Args| -> Result<Option<Value>, BehaviorError> {
                f.set("touched", true)?;
                Ok(None)
            },
        );
        register_command(&mut entity, "touch", behavior);
        assert_eq!(registered_commands_of(&entity).len(), before);

        entity.call("touch", ()).unwrap();
        assert_eq!(entity.history().len(), 1);
    }

    #[test]
    fn command_records_event_with_derived_name() {
        let mut entity = empty_account();
        let out = entity.call("rename", json!(["Ada"])).unwrap();

        assert_eq!(out, None);
        assert_eq!(entity.version(), 1);
        assert_eq!(entity.history().len(), 1);
        assert_eq!(entity.history()[0].name(), "renamed");
        assert_eq!(entity.history()[0].version(), 1);
        assert_eq!(entity.field("name"), &json!("Ada"));
    }

    #[test]
    fn each_event_version_is_previous_plus_one() {
        let mut entity = empty_account();
        entity.call("deposit", json!([10])).unwrap();
        entity.call("deposit", json!([5])).unwrap();
        entity.call("withdraw", json!([3])).unwrap();

        let versions: Vec<u64> = entity.history().iter().map(Event::version).collect();
        assert_eq!(versions, vec![1, 2, 3]);
        assert_eq!(entity.field_as::<u64>("balance").unwrap(), 12);
    }

    #[test]
    fn empty_diff_records_nothing() {
        let mut entity = empty_account();
        entity.call("touch", ()).unwrap();
        assert_eq!(entity.version(), 0);
        assert!(entity.history().is_empty());

        entity.call("rename", json!(["Ada"])).unwrap();
        entity.call("rename", json!(["Ada"])).unwrap();
        assert_eq!(entity.version(), 1, "renaming to the same value changes nothing");
    }

    #[test]
    fn query_returns_value_without_recording() {
        let mut entity = empty_account();
        entity.call("deposit", json!([40])).unwrap();

        let out = entity.call("balance", ()).unwrap();
        assert_eq!(out, Some(json!(40)));
        assert_eq!(entity.version(), 1);
        assert_eq!(entity.history().len(), 1);
    }

    #[test]
    fn query_writes_are_discarded() {
        let mut entity = empty_account();
        let out = entity.call("audit", ()).unwrap();
        assert_eq!(out, Some(json!("ok")));
        assert_eq!(entity.version(), 0);
        assert_eq!(entity.field("audited"), &Value::Null);
    }

    #[test]
    fn null_return_counts_as_command() {
        let def = EntityDefinition::new("thing").command("mark", |f, _| {
            f.set("marked", true)?;
            Ok(Some(Value::Null))
        });
        let mut entity = Entity::new(&def, (), EntityConfig::default()).unwrap();
        assert_eq!(entity.call("mark", ()).unwrap(), None);
        assert_eq!(entity.version(), 1);
    }

    #[test]
    fn failed_behavior_leaves_entity_untouched() {
        let mut entity = empty_account();
        entity.call("deposit", json!([5])).unwrap();
        let state_before = entity.state().clone();

        let err = entity.call("withdraw", json!([50])).unwrap_err();
        match err {
            EntityError::Behavior { command, source } => {
                assert_eq!(command, "withdraw");
                let inner = source
                    .downcast_ref::<InsufficientFunds>()
                    .expect("domain error should be preserved");
                assert_eq!(inner.requested, 50);
            }
            other => panic!("expected Behavior error, got {other:?}"),
        }
        assert_eq!(entity.state(), &state_before);
        assert_eq!(entity.version(), 1);
        assert_eq!(entity.field("last_withdrawal"), &Value::Null);
    }

    #[test]
    fn bad_argument_is_a_behavior_error() {
        let mut entity = empty_account();
        let err = entity.call("deposit", json!(["ten"])).unwrap_err();
        assert!(matches!(err, EntityError::Behavior { ref command, .. } if command == "deposit"));
        assert!(entity.history().is_empty());
    }

    #[test]
    fn mapping_overrides_derived_name_every_time() {
        let config = EntityConfig::default().with_mapping("deposit", "FundsAdded");
        let mut entity = Entity::new(&account(), (), config).unwrap();
        entity.call("deposit", json!([1])).unwrap();
        entity.call("deposit", json!([2])).unwrap();
        entity.call("rename", json!(["Ada"])).unwrap();

        let names: Vec<&str> = entity.history().iter().map(Event::name).collect();
        assert_eq!(names, vec!["FundsAdded", "FundsAdded", "renamed"]);
    }

    #[test]
    fn recorded_event_is_emitted_under_its_name() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut entity = empty_account();
        let sink = Arc::clone(&seen);
        entity.on("renamed", move |e| sink.lock().unwrap().push(e.clone()));

        entity.call("rename", json!(["Ada"])).unwrap();
        entity.call("touch", ()).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], entity.history()[0]);
    }

    #[test]
    fn failed_behavior_emits_nothing() {
        let count = Arc::new(Mutex::new(0));
        let mut entity = empty_account();
        let sink = Arc::clone(&count);
        entity.on("withdrew", move |_| *sink.lock().unwrap() += 1);

        assert!(entity.call("withdraw", json!([1])).is_err());
        assert_eq!(*count.lock().unwrap(), 0);
    }

    #[test]
    fn removed_field_is_recorded() {
        let mut entity = empty_account();
        entity.call("label", json!(["vip"])).unwrap();
        entity.call("close", ()).unwrap();

        assert_eq!(entity.field("label"), &Value::Null);
        assert_eq!(entity.field("closed"), &json!(true));
        assert_eq!(entity.history()[1].name(), "closed");
        assert_eq!(entity.history()[1].changeset().len(), 2);
    }

    #[test]
    fn invoke_through_member_handle() {
        let mut entity = empty_account();
        let cmd = entity.get("rename").as_command().cloned().unwrap();
        cmd.invoke(&mut entity, json!(["Grace"])).unwrap();
        assert_eq!(entity.field("name"), &json!("Grace"));
    }
}

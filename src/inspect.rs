//! Read-only diagnostic view of an entity.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::changeset::State;
use crate::command::registered_commands_of;
use crate::entity::Entity;
use crate::event::Event;

/// Borrowed snapshot of an entity's internals for diagnostics and tests.
///
/// Serializes to JSON for dumping.
#[derive(Debug, Clone, Serialize)]
pub struct Inspection<'a> {
    /// Entity kind.
    pub kind: &'a str,
    /// Current version.
    pub version: u64,
    /// Full history, oldest first.
    pub history: &'a [Event],
    /// Current state.
    pub state: &'a State,
    /// Registered command names, sorted.
    pub commands: Vec<&'a str>,
    /// Explicit command-to-event-name mappings.
    pub mappings: &'a BTreeMap<String, String>,
}

/// Inspect `entity` without side effects.
pub fn inspect(entity: &Entity) -> Inspection<'_> {
    Inspection {
        kind: &entity.kind,
        version: entity.version,
        history: &entity.history,
        state: &entity.state,
        commands: registered_commands_of(entity),
        mappings: &entity.mappings,
    }
}

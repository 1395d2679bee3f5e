//! Diff-sourced entities: event sourcing where commands are plain
//! behaviors and events are derived by comparing state before and after.
//!
//! An [`Entity`] owns an immutable state snapshot, a version, and the
//! history of [`Event`]s that produced them. Behaviors declared on an
//! [`EntityDefinition`] become commands; calling one runs the behavior on
//! a draft, diffs the draft against the current state, and records a
//! single event when something changed. Behaviors that return a value are
//! queries and never record.

mod apply;
pub use apply::{apply, rebuild, replay};
mod bus;
pub use bus::{EventBus, Listener, ListenerId};
mod changeset;
pub use changeset::{Changeset, ChangesetEngine, Operation, State, StructuralDiff};
mod command;
pub use command::{
    Behavior, Command, EntityDefinition, methods_of, register_command, register_commands,
    registered_commands_of,
};
mod config;
mod dispatch;
mod entity;
mod error;
mod event;
mod inspect;
mod naming;
mod snapshot;

pub use config::EntityConfig;
pub use dispatch::{AccessError, Args, Fields, Member};
pub use entity::{Entity, EntityBuilder};
pub use error::{BehaviorError, EntityError, PatchError};
pub use event::{Event, InitialEvents, SNAPSHOT_EVENT};
pub use inspect::{Inspection, inspect};
pub use naming::{EventNamer, PastTense};
pub use snapshot::{snapshot, snapshot_event};

//! Applying events to an entity and replaying histories.
//!
//! Every state transition, whether recorded by a command or replayed at
//! construction, goes through [`apply`]. Snapshot events are the one
//! special case: their changeset is patched onto an empty snapshot, so a
//! snapshot event replaces state wholesale.

use crate::changeset::{ChangesetEngine, State};
use crate::entity::Entity;
use crate::error::EntityError;
use crate::event::Event;

/// Patch `event` onto `state` (or onto the empty snapshot for snapshot
/// events) and return the next state.
fn next_state(
    engine: &dyn ChangesetEngine,
    state: &State,
    event: &Event,
) -> Result<State, EntityError> {
    let empty;
    let base = if event.is_snapshot() {
        empty = State::new();
        &empty
    } else {
        state
    };

    engine
        .patch(base, event.changeset())
        .map_err(|source| EntityError::ChangesetApplication {
            event: event.name().to_owned(),
            version: event.version(),
            source,
        })
}

/// Apply one event to `entity`: patch its state and adopt the event's
/// version.
///
/// Does not append to history. Applying an event that is already
/// reflected in the entity's state is not idempotent; callers must apply
/// each event exactly once.
///
/// # Errors
///
/// Returns [`EntityError::ChangesetApplication`] if the changeset does not
/// fit the base snapshot. The entity is left unchanged.
pub fn apply(event: &Event, entity: &mut Entity) -> Result<(), EntityError> {
    let next = next_state(entity.engine.as_ref(), &entity.state, event)?;
    entity.state = next;
    entity.version = event.version();
    tracing::debug!(
        event = event.name(),
        version = event.version(),
        snapshot = event.is_snapshot(),
        "event applied"
    );
    Ok(())
}

/// Reject an event whose version is below the one already reached.
fn check_version(index: usize, current: u64, event: &Event) -> Result<(), EntityError> {
    if event.version() < current {
        return Err(EntityError::MalformedEvent {
            index,
            reason: format!(
                "version {} of `{}` is below current version {current}",
                event.version(),
                event.name()
            ),
        });
    }
    Ok(())
}

/// Apply `events` to `entity` in order, appending each to its history.
///
/// Stops at the first event that fails; events before it remain applied
/// and recorded.
///
/// # Errors
///
/// - [`EntityError::MalformedEvent`] if an event's version is lower than
///   the entity's current version.
/// - [`EntityError::ChangesetApplication`] for an event that does not
///   apply.
pub fn replay(
    entity: &mut Entity,
    events: impl IntoIterator<Item = Event>,
) -> Result<(), EntityError> {
    for (index, event) in events.into_iter().enumerate() {
        check_version(index, entity.version, &event)?;
        apply(&event, entity)?;
        entity.history.push(event);
    }
    Ok(())
}

/// Replay `events` from the empty snapshot without an entity.
///
/// # Returns
///
/// The resulting state and the version of the last event (0 for an empty
/// history).
///
/// # Errors
///
/// Same as [`replay`]: [`EntityError::MalformedEvent`] for a version that
/// goes backwards, [`EntityError::ChangesetApplication`] for the first
/// event that does not apply.
pub fn rebuild(
    engine: &dyn ChangesetEngine,
    events: &[Event],
) -> Result<(State, u64), EntityError> {
    events
        .iter()
        .enumerate()
        .try_fold((State::new(), 0), |(state, version), (index, event)| {
            check_version(index, version, event)?;
            Ok((next_state(engine, &state, event)?, event.version()))
        })
}

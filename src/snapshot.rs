//! Snapshot production and history compaction.
//!
//! A snapshot event carries the diff from the empty snapshot to the
//! current state. Producing or emitting one never mutates the entity;
//! only [`apply`](crate::apply) (during replay) gives it effect, by
//! resetting state to empty before patching. [`Entity::compact`] is the
//! explicit operation that swaps history for a single snapshot event.

use crate::changeset::State;
use crate::entity::Entity;
use crate::event::{Event, SNAPSHOT_EVENT};

/// Build the synthetic snapshot event for `entity` without emitting it.
///
/// The event carries the entity's current version, so replaying it alone
/// reproduces both state and version.
pub fn snapshot_event(entity: &Entity) -> Event {
    let changeset = entity.engine.diff(&State::new(), &entity.state);
    Event::new(SNAPSHOT_EVENT, entity.version, changeset)
}

/// Emit a snapshot of `entity` to listeners of `"snapshot"` and return a
/// plain copy of its state.
///
/// Leaves history and version untouched.
pub fn snapshot(entity: &Entity) -> State {
    let event = snapshot_event(entity);
    tracing::debug!(
        kind = %entity.kind,
        version = event.version(),
        fields = entity.state.len(),
        "snapshot emitted"
    );
    entity.bus.emit(SNAPSHOT_EVENT, &event);
    entity.state.clone()
}

impl Entity {
    /// Replace history with a single snapshot event.
    ///
    /// State and version are unchanged, and replaying the compacted
    /// history reproduces them. Nothing is emitted.
    ///
    /// # Returns
    ///
    /// The number of events folded into the snapshot (0 when history was
    /// already empty, in which case nothing changes).
    pub fn compact(&mut self) -> usize {
        if self.history.is_empty() {
            return 0;
        }
        let folded = self.history.len();
        let event = snapshot_event(self);
        self.history = vec![event];
        tracing::info!(kind = %self.kind, folded, version = self.version, "history compacted");
        folded
    }
}

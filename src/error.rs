//! Crate-level error types for command invocation, replay, and patching.

/// Error produced by a behavior body.
///
/// Behaviors are user code, so any `std::error::Error` is accepted.
/// Argument and field access failures ([`AccessError`](crate::AccessError))
/// box into this type as well.
pub type BehaviorError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error returned by an operation on an [`Entity`](crate::Entity).
///
/// Every variant is fatal to the operation in progress and nothing is
/// retried. Only [`replay`](crate::replay) keeps partial work: events
/// before the failing one stay applied.
#[derive(Debug, thiserror::Error)]
pub enum EntityError {
    /// A command's behavior returned an error.
    ///
    /// The behavior wrote to a draft that has been discarded, so state,
    /// version, and history are exactly as they were before the call.
    #[error("command `{command}` failed: {source}")]
    Behavior {
        /// Name of the command whose behavior failed.
        command: String,
        /// The error returned by the behavior.
        #[source]
        source: BehaviorError,
    },

    /// A replay input record is missing `name`, `version`, or `changeset`,
    /// or one of them has the wrong shape.
    #[error("malformed event at position {index}: {reason}")]
    MalformedEvent {
        /// Zero-based position of the record in the supplied history.
        index: usize,
        /// What was wrong with the record.
        reason: String,
    },

    /// The changeset engine could not apply an event's changeset.
    ///
    /// Raised instead of skipping the event, since skipping would leave
    /// state out of step with history.
    #[error("cannot apply changeset of event `{event}` (version {version}): {source}")]
    ChangesetApplication {
        /// Name of the event whose changeset failed to apply.
        event: String,
        /// Version carried by that event.
        version: u64,
        /// The underlying patch failure.
        #[source]
        source: PatchError,
    },

    /// No command is registered under the requested name.
    #[error("no command registered as `{0}`")]
    UnknownCommand(String),

    /// The entity's version is already `u64::MAX`, so a command cannot
    /// record another event.
    #[error("command `{command}` cannot record an event past version {version}")]
    VersionOverflow {
        /// Name of the command that changed state.
        command: String,
        /// Current version of the entity.
        version: u64,
    },
}

/// Error returned when a [`Changeset`](crate::Changeset) does not fit the
/// snapshot it is applied to.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    /// An operation carried an empty path; the root cannot be replaced.
    #[error("operation path is empty")]
    EmptyPath,

    /// An intermediate key along the path does not exist.
    #[error("parent of `{path}` does not exist")]
    MissingParent {
        /// Dotted rendering of the offending path.
        path: String,
    },

    /// An intermediate value along the path is not an object.
    #[error("parent of `{path}` is not an object")]
    NotAnObject {
        /// Dotted rendering of the offending path.
        path: String,
    },

    /// A remove operation targeted a key that is not present.
    #[error("cannot remove `{path}`: key not present")]
    MissingKey {
        /// Dotted rendering of the offending path.
        path: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[derive(Debug, thiserror::Error)]
    #[error("insufficient funds")]
    struct InsufficientFunds;

    #[test]
    fn behavior_error_displays_command_and_inner() {
        let err = EntityError::Behavior {
            command: "withdraw".into(),
            source: Box::new(InsufficientFunds),
        };
        assert_eq!(err.to_string(), "command `withdraw` failed: insufficient funds");
    }

    #[test]
    fn behavior_error_exposes_source() {
        let err = EntityError::Behavior {
            command: "withdraw".into(),
            source: Box::new(InsufficientFunds),
        };
        let source = err.source().expect("source should be set");
        assert_eq!(source.to_string(), "insufficient funds");
    }

    #[test]
    fn malformed_event_display() {
        let err = EntityError::MalformedEvent {
            index: 2,
            reason: "missing `version`".into(),
        };
        assert_eq!(
            err.to_string(),
            "malformed event at position 2: missing `version`"
        );
    }

    #[test]
    fn changeset_application_chains_patch_error() {
        let err = EntityError::ChangesetApplication {
            event: "renamed".into(),
            version: 3,
            source: PatchError::MissingKey {
                path: "profile.name".into(),
            },
        };
        assert!(err.to_string().contains("renamed"));
        let source = err.source().expect("source should be set");
        assert_eq!(source.to_string(), "cannot remove `profile.name`: key not present");
    }

    #[test]
    fn unknown_command_display() {
        let err = EntityError::UnknownCommand("launch".into());
        assert_eq!(err.to_string(), "no command registered as `launch`");
    }

    #[test]
    fn version_overflow_display() {
        let err = EntityError::VersionOverflow {
            command: "rename".into(),
            version: u64::MAX,
        };
        assert_eq!(
            err.to_string(),
            format!("command `rename` cannot record an event past version {}", u64::MAX)
        );
    }

    // Errors must cross thread boundaries so an entity can be driven from
    // whichever thread owns it.
    const _: () = {
        #[allow(dead_code)]
        fn assert_send_sync<T: Send + Sync>() {}

        #[allow(dead_code)]
        fn check() {
            assert_send_sync::<EntityError>();
            assert_send_sync::<PatchError>();
        }
    };
}

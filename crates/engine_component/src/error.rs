//! Contract-violation error types.
//!
//! Every variant describes a bug in calling code or in registration order.
//! The core never recovers from one: [`violation`] logs it and aborts the
//! current thread of execution by panicking.

use crate::component::ComponentTypeId;
use crate::entity::Entity;

/// Contract violations detected by the component core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EcsError {
    /// A component type was used before its column was registered.
    #[error("no column registered for component type {0}")]
    MissingColumn(ComponentTypeId),

    /// A non-multi component type appeared twice in one signature.
    #[error("component `{name}` appears more than once in a signature but is not multi")]
    DuplicateComponent {
        /// Name of the offending component type.
        name: &'static str,
    },

    /// A typed write supplied a different number of instances than the
    /// entity currently holds.
    #[error("arity mismatch for `{name}` on {entity}: entity holds {expected}, got {actual}")]
    ArityMismatch {
        /// Name of the component type.
        name: &'static str,
        /// The entity being written.
        entity: Entity,
        /// Number of instances the entity holds.
        expected: usize,
        /// Number of instances supplied.
        actual: usize,
    },

    /// Two columns of different concrete types were combined.
    #[error("column type mismatch: expected `{expected}`, got `{actual}`")]
    ColumnTypeMismatch {
        /// Type name of the receiving column.
        expected: &'static str,
        /// Type name of the other column.
        actual: &'static str,
    },

    /// A single-instance column received a second instance for an entity.
    #[error("{entity} already holds a `{name}`")]
    DuplicateEntity {
        /// Name of the component type.
        name: &'static str,
        /// The entity that already has the component.
        entity: Entity,
    },

    /// A component was read from or removed off an entity that lacks it.
    #[error("{entity} has no `{name}`")]
    MissingComponent {
        /// Name of the component type.
        name: &'static str,
        /// The entity that lacks the component.
        entity: Entity,
    },

    /// A gathered buffer no longer matches its claimed id list.
    #[error("buffer for `{name}` holds {actual} values for {expected} ids")]
    BufferLength {
        /// Name of the component type.
        name: &'static str,
        /// Number of claimed ids.
        expected: usize,
        /// Number of values in the buffer.
        actual: usize,
    },

    /// The id↔index maps of a column disagree with each other or with the
    /// dense array.
    #[error("index corruption in `{name}`: {detail}")]
    IndexCorruption {
        /// Name of the component type.
        name: &'static str,
        /// What was found to be inconsistent.
        detail: String,
    },

    /// Two distinct component types hash to the same identifier.
    #[error("component type id {id} is shared by `{existing}` and `{incoming}`")]
    TypeIdCollision {
        /// The colliding identifier.
        id: ComponentTypeId,
        /// Name already registered under the identifier.
        existing: &'static str,
        /// Name being registered.
        incoming: &'static str,
    },

    /// An operation named an entity that is not stored anywhere.
    #[error("{0} is not alive")]
    UnknownEntity(Entity),
}

/// Reports a contract violation and panics.
///
/// The error is logged with the caller's source location before the panic so
/// the diagnostic survives even when the panic message is swallowed.
#[track_caller]
#[cold]
pub fn violation(err: EcsError) -> ! {
    let location = std::panic::Location::caller();
    tracing::error!(
        file = location.file(),
        line = location.line(),
        error = %err,
        "ecs contract violation"
    );
    panic!("ecs contract violation at {location}: {err}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let err = EcsError::ArityMismatch {
            name: "Waypoint",
            entity: Entity(7),
            expected: 3,
            actual: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("Waypoint"));
        assert!(msg.contains("Entity(7)"));
        assert!(msg.contains("holds 3, got 2"));
    }

    #[test]
    #[should_panic(expected = "Entity(3) is not alive")]
    fn test_violation_panics_with_message() {
        violation(EcsError::UnknownEntity(Entity(3)));
    }
}

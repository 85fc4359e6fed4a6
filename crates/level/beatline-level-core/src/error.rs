//! Error types for the level runtime

use beatline_sequence::SequenceError;

use crate::ids::{InstanceId, ObjectId, PrefabId};

/// Result alias that carries [`LevelError`].
pub type Result<T> = std::result::Result<T, LevelError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum LevelError {
    /// Object referenced by id is not in the level
    #[error("object not found: {id}")]
    ObjectNotFound { id: ObjectId },

    /// Prefab template referenced by an instance is gone
    #[error("prefab template {prefab} not found for instance {instance}")]
    PrefabNotFound {
        prefab: PrefabId,
        instance: InstanceId,
    },

    /// Prefab instance referenced by id is not in the level
    #[error("prefab instance not found: {id}")]
    InstanceNotFound { id: InstanceId },

    /// Walking an object's parents came back to an object already in the chain
    #[error("parent cycle: {object} reaches {repeated} twice")]
    ParentCycle { object: ObjectId, repeated: ObjectId },

    /// Parent chain exceeds the configured cap
    #[error("parent chain of {object} exceeds {limit} links")]
    ChainTooDeep { object: ObjectId, limit: usize },

    /// A prefab template contains itself, directly or through sub-prefabs
    #[error("prefab {prefab} contains itself (depth {depth})")]
    PrefabRecursion { prefab: PrefabId, depth: usize },

    /// Generated id already belongs to another live object
    #[error("generated id {id} collides with an existing object")]
    IdCollision { id: ObjectId },

    /// Authored id uses the prefix reserved for nested prefab runners
    #[error("object id {id} uses a reserved prefix")]
    ReservedId { id: ObjectId },

    /// Authored keyframes failed validation
    #[error("invalid {channel} keyframes on {object}: {source}")]
    InvalidSequence {
        object: ObjectId,
        channel: &'static str,
        #[source]
        source: SequenceError,
    },
}

impl LevelError {
    /// Get error category for logging.
    /// `data`: bad references; `structure`: malformed graphs; `runtime`: construction failures.
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::ObjectNotFound { .. }
            | Self::PrefabNotFound { .. }
            | Self::InstanceNotFound { .. }
            | Self::ReservedId { .. }
            | Self::InvalidSequence { .. } => "data",
            Self::ParentCycle { .. } | Self::ChainTooDeep { .. } | Self::PrefabRecursion { .. } => {
                "structure"
            }
            Self::IdCollision { .. } => "runtime",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories() {
        let cycle = LevelError::ParentCycle {
            object: ObjectId::from("a"),
            repeated: ObjectId::from("b"),
        };
        assert_eq!(cycle.category(), "structure");
        assert!(cycle.to_string().contains("reaches b twice"));

        let missing = LevelError::ObjectNotFound {
            id: ObjectId::from("x"),
        };
        assert_eq!(missing.category(), "data");
    }
}

//! Error taxonomy for scenario definition and execution.
//!
//! Three families share one enum:
//!
//! - **Definition errors** -- name collisions, unparseable kind tags,
//!   dynamics without a usable domain.
//! - **Reference errors** -- a condition or action names an entity,
//!   storyboard element, or parameter that does not exist.
//! - **Unsupported-feature errors** -- a condition, action, or position
//!   variant the type system knows about but the engine does not evaluate.
//!
//! All of them abort the current tick and propagate to the caller. Entity
//! state written before the failing node stays as written.

use crate::id::NameKind;

/// Errors raised while building or running a scenario.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScenarioError {
    /// A name was registered twice for the same kind.
    #[error("{kind} name '{name}' is already in use")]
    NameCollision { kind: NameKind, name: String },

    /// A textual kind tag (shape, rule, edge, ...) did not match any variant.
    #[error("unknown {category}: '{value}'")]
    UnknownKind {
        category: &'static str,
        value: String,
    },

    /// Dynamics that cannot be interpolated (no time/distance/rate, or a
    /// non-positive one).
    #[error("invalid dynamics on action '{action}': {reason}")]
    InvalidDynamics { action: String, reason: String },

    /// A referenced entity does not exist.
    #[error("entity not found: {0}")]
    EntityNotFound(String),

    /// A referenced storyboard element does not exist.
    #[error("storyboard element not found: {0}")]
    ElementNotFound(String),

    /// A referenced parameter was never declared.
    #[error("parameter not found: {0}")]
    ParameterNotFound(String),

    /// A parameter was used with a value of the wrong type.
    #[error("parameter '{parameter}' type mismatch: {detail}")]
    ParameterType { parameter: String, detail: String },

    /// A private action has neither sequence actors nor a story owner.
    #[error("private action '{action}' has no actor")]
    NoActor { action: String },

    /// Recognised but not implemented.
    #[error("not supported: {feature}")]
    Unsupported { feature: String },

    /// Lane arithmetic left the representable lane ids.
    #[error("lane {lane} offset by {delta} is out of range")]
    LaneOutOfRange { lane: i32, delta: i32 },

    /// The road-network collaborator could not answer a lane query.
    #[error("road query failed for road {road}, lane {lane}: {reason}")]
    RoadQuery { road: u32, lane: i32, reason: String },
}

impl ScenarioError {
    /// Shorthand for an [`ScenarioError::Unsupported`] error.
    pub fn unsupported(feature: impl Into<String>) -> Self {
        Self::Unsupported {
            feature: feature.into(),
        }
    }

    /// Shorthand for an [`ScenarioError::UnknownKind`] error.
    pub fn unknown_kind(category: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownKind {
            category,
            value: value.into(),
        }
    }

    /// Returns true for errors caused by the scenario definition itself.
    pub fn is_definition_error(&self) -> bool {
        matches!(
            self,
            Self::NameCollision { .. } | Self::UnknownKind { .. } | Self::InvalidDynamics { .. }
        )
    }
}

/// Convenience alias used throughout the crate.
pub type ScenarioResult<T> = Result<T, ScenarioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collision_message_names_kind_and_name() {
        let err = ScenarioError::NameCollision {
            kind: NameKind::Entity,
            name: "Ego".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("entity"), "got: {msg}");
        assert!(msg.contains("Ego"), "got: {msg}");
    }

    #[test]
    fn definition_errors_are_classified() {
        assert!(ScenarioError::unknown_kind("dynamics shape", "bouncy").is_definition_error());
        assert!(!ScenarioError::EntityNotFound("Lead".into()).is_definition_error());
        assert!(!ScenarioError::unsupported("Collision condition").is_definition_error());
    }
}

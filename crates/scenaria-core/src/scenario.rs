//! The scenario root aggregate.
//!
//! A [`Scenario`] owns its name registry, entities, parameters,
//! storyboard and the element-state table. Every insertion goes through
//! the registry first, so a failed insertion leaves the scenario as it was.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::action::Action;
use crate::condition::ConditionGroup;
use crate::entity::{Entity, EntityStore};
use crate::error::ScenarioResult;
use crate::id::{EntityId, NameKind};
use crate::parameter::{ParameterValue, Parameters};
use crate::registry::NameRegistry;
use crate::storyboard::{ElementStates, Story, Storyboard};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scenario {
    pub(crate) registry: NameRegistry,
    pub(crate) entities: EntityStore,
    pub(crate) parameters: Parameters,
    pub(crate) storyboard: Storyboard,
    pub(crate) elements: ElementStates,
}

impl Scenario {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Building
    // -----------------------------------------------------------------------

    /// Add an entity together with the init actions already attached to
    /// it. Fails with `NameCollision` if any of those names is taken, in
    /// which case nothing is registered.
    pub fn add_entity(&mut self, entity: Entity) -> ScenarioResult<EntityId> {
        let mut names = vec![(NameKind::Entity, entity.name().to_string())];
        for action in &entity.init_actions {
            names.extend(action_names(action));
        }
        self.registry.add_all(&names)?;
        debug!(entity = entity.name(), init_actions = entity.init_actions.len(), "entity added");
        Ok(self.entities.insert(entity))
    }

    /// Add a story with its whole subtree. Every name in the subtree is
    /// registered atomically; on a collision nothing is added.
    pub fn add_story(&mut self, story: Story) -> ScenarioResult<()> {
        let names = story.names();
        self.registry.add_all(&names)?;
        debug!(story = %story.name, names = names.len(), "story added");
        self.storyboard.stories.push(story);
        Ok(())
    }

    /// Add a group to the storyboard's end conditions.
    pub fn add_end_condition_group(&mut self, group: ConditionGroup) {
        self.storyboard.end_conditions.push(group);
    }

    /// Append an init action to an existing entity.
    pub fn add_init_action(&mut self, entity: &str, action: Action) -> ScenarioResult<()> {
        let names = action_names(&action);
        let target = self.entities.require_mut(entity)?;
        self.registry.add_all(&names)?;
        target.init_actions.push(action);
        Ok(())
    }

    pub fn declare_parameter(&mut self, name: impl Into<String>, value: impl Into<ParameterValue>) {
        self.parameters.declare(name, value);
    }

    /// Empty the scenario, registry first. Used when a scenario is replaced
    /// wholesale.
    pub fn clear(&mut self) {
        self.registry.clear();
        self.entities.clear();
        self.parameters.clear();
        self.storyboard.clear();
        self.elements.clear();
    }

    // -----------------------------------------------------------------------
    // Access
    // -----------------------------------------------------------------------

    pub fn registry(&self) -> &NameRegistry {
        &self.registry
    }

    pub fn entities(&self) -> &EntityStore {
        &self.entities
    }

    /// Entity state may be edited freely; entity names cannot change.
    pub fn entities_mut(&mut self) -> &mut EntityStore {
        &mut self.entities
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut Parameters {
        &mut self.parameters
    }

    pub fn storyboard(&self) -> &Storyboard {
        &self.storyboard
    }

    pub fn elements(&self) -> &ElementStates {
        &self.elements
    }

    // -----------------------------------------------------------------------
    // Reset
    // -----------------------------------------------------------------------

    /// Restore every node's run state without touching the definition:
    /// entities back to the kinematics they were added with,
    /// all node flags, latches and cursors cleared, parameters back to
    /// their defaults, element-state table emptied.
    pub fn reset(&mut self) {
        self.entities.reset();
        self.storyboard.reset();
        self.parameters.reset();
        self.elements.clear();
    }
}

/// Registry entries for one action: its own name and its trajectory's.
fn action_names(action: &Action) -> Vec<(NameKind, String)> {
    let mut names = vec![(NameKind::Action, action.name().to_string())];
    if let Some(trajectory) = action.trajectory_name() {
        names.push((NameKind::Trajectory, trajectory.to_string()));
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScenarioError;
    use crate::test_utils;

    #[test]
    fn duplicate_entity_is_rejected() {
        let mut scenario = Scenario::new();
        scenario.add_entity(Entity::new("Ego")).unwrap();
        let err = scenario.add_entity(Entity::new("Ego")).unwrap_err();
        assert!(err.is_definition_error());
        assert_eq!(scenario.entities().len(), 1);
        assert_eq!(scenario.registry().count(NameKind::Entity), 1);
    }

    #[test]
    fn story_names_are_registered_atomically() {
        let mut scenario = Scenario::new();
        scenario.add_entity(Entity::new("Ego")).unwrap();
        scenario
            .add_story(test_utils::one_event_story("Ego", test_utils::step_speed("Go", 20.0)))
            .unwrap();
        assert!(scenario.registry().has(NameKind::Action, "Go"));

        // Same story names again, different action name: collides on the
        // story name and registers nothing.
        let err = scenario
            .add_story(test_utils::one_event_story("Ego", test_utils::step_speed("Stop", 0.0)))
            .unwrap_err();
        assert!(matches!(err, ScenarioError::NameCollision { kind: NameKind::Story, .. }));
        assert!(!scenario.registry().has(NameKind::Action, "Stop"));
        assert_eq!(scenario.storyboard().stories.len(), 1);
    }

    #[test]
    fn attached_init_actions_are_registered() {
        let mut scenario = Scenario::new();
        scenario
            .add_entity(Entity::new("Ego").with_init_action(test_utils::step_speed("Go", 3.0)))
            .unwrap();
        assert!(scenario.registry().has(NameKind::Action, "Go"));

        let err = scenario
            .add_story(test_utils::one_event_story("Ego", test_utils::step_speed("Go", 5.0)))
            .unwrap_err();
        assert!(matches!(err, ScenarioError::NameCollision { kind: NameKind::Action, .. }));
        assert!(scenario.storyboard().stories.is_empty());
    }

    #[test]
    fn entity_with_clashing_init_action_is_not_added() {
        let mut scenario = Scenario::new();
        scenario.add_entity(Entity::new("Ego")).unwrap();
        scenario
            .add_init_action("Ego", test_utils::step_speed("Launch", 10.0))
            .unwrap();

        let err = scenario
            .add_entity(Entity::new("Lead").with_init_action(test_utils::step_speed("Launch", 8.0)))
            .unwrap_err();
        assert!(matches!(err, ScenarioError::NameCollision { kind: NameKind::Action, .. }));
        assert!(!scenario.registry().has(NameKind::Entity, "Lead"));
        assert!(scenario.entity("Lead").is_none());
    }

    #[test]
    fn init_action_requires_entity() {
        let mut scenario = Scenario::new();
        let err = scenario
            .add_init_action("Ghost", test_utils::step_speed("Init", 5.0))
            .unwrap_err();
        assert_eq!(err, ScenarioError::EntityNotFound("Ghost".into()));
        assert!(!scenario.registry().has(NameKind::Action, "Init"));
    }

    #[test]
    fn clear_empties_registry_and_content() {
        let mut scenario = Scenario::new();
        scenario.add_entity(Entity::new("Ego")).unwrap();
        scenario.declare_parameter("Gap", 10.0);
        scenario.clear();
        assert!(scenario.registry().is_empty());
        assert!(scenario.entities().is_empty());
        assert!(scenario.parameters().is_empty());
        scenario.add_entity(Entity::new("Ego")).unwrap();
    }
}

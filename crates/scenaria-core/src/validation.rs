//! Pre-flight checks over a built scenario.
//!
//! [`validate`] walks the whole definition and reports every problem that
//! would otherwise only surface mid-run as a tick error. It never mutates.

use crate::action::{Action, ActionKind, PrivateAction, Target};
use crate::condition::{Condition, ConditionGroup, ConditionKind, StateCondition, ValueCondition};
use crate::error::ScenarioError;
use crate::scenario::Scenario;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationIssue {
    #[error("{referenced_by} references unknown entity '{entity}'")]
    UnknownEntity { entity: String, referenced_by: String },
    #[error("{referenced_by} references unknown storyboard element '{element}'")]
    UnknownElement { element: String, referenced_by: String },
    #[error("sequence '{sequence}' has an execution count of zero")]
    ZeroExecutionCount { sequence: String },
    #[error("{0}")]
    Dynamics(ScenarioError),
    #[error("action '{action}' follows empty trajectory '{trajectory}'")]
    EmptyTrajectory { action: String, trajectory: String },
}

/// Every issue found, in storyboard order. An empty list means the
/// scenario is runnable as far as static checks can tell.
pub fn validate(scenario: &Scenario) -> Vec<ValidationIssue> {
    let mut checker = Checker {
        scenario,
        issues: Vec::new(),
    };
    checker.run();
    checker.issues
}

struct Checker<'a> {
    scenario: &'a Scenario,
    issues: Vec<ValidationIssue>,
}

impl Checker<'_> {
    fn run(&mut self) {
        let scenario = self.scenario;
        for entity in scenario.entities().iter() {
            for action in &entity.init_actions {
                self.action(action);
            }
        }

        for story in &scenario.storyboard().stories {
            if let Some(owner) = &story.owner {
                self.entity(owner, || format!("story '{}'", story.name));
            }
            for act in &story.acts {
                self.groups(&act.start_conditions);
                for sequence in &act.sequences {
                    if sequence.execution_count == 0 {
                        self.issues.push(ValidationIssue::ZeroExecutionCount {
                            sequence: sequence.name.clone(),
                        });
                    }
                    for actor in &sequence.actors {
                        self.entity(actor, || format!("sequence '{}'", sequence.name));
                    }
                    for maneuver in &sequence.maneuvers {
                        for event in &maneuver.events {
                            self.groups(&event.start_conditions);
                            for action in &event.actions {
                                self.action(action);
                            }
                        }
                    }
                }
            }
        }
        self.groups(&scenario.storyboard().end_conditions);
    }

    fn entity(&mut self, name: &str, referenced_by: impl FnOnce() -> String) {
        if !self.scenario.entities().contains(name) {
            self.issues.push(ValidationIssue::UnknownEntity {
                entity: name.to_string(),
                referenced_by: referenced_by(),
            });
        }
    }

    fn element(&mut self, name: &str, condition: &str) {
        if !self.scenario.registry().has_element(name) {
            self.issues.push(ValidationIssue::UnknownElement {
                element: name.to_string(),
                referenced_by: format!("condition '{condition}'"),
            });
        }
    }

    fn groups(&mut self, groups: &[ConditionGroup]) {
        for group in groups {
            for condition in &group.conditions {
                self.condition(condition);
            }
        }
    }

    fn condition(&mut self, condition: &Condition) {
        let who = || format!("condition '{}'", condition.name);
        match &condition.kind {
            ConditionKind::ByEntity(by_entity) => {
                for entity in &by_entity.triggering_entities {
                    self.entity(entity, who);
                }
                if let Some(reference) = by_entity.kind.reference_entity() {
                    self.entity(reference, who);
                }
            }
            ConditionKind::ByValue(ValueCondition::StoryboardElementState { element, .. })
            | ConditionKind::ByState(StateCondition::AfterTermination { element }) => {
                self.element(element, &condition.name);
            }
            ConditionKind::ByValue(_) | ConditionKind::ByState(_) => {}
        }
    }

    fn action(&mut self, action: &Action) {
        let ActionKind::Private(private) = &action.kind else {
            return;
        };
        let who = || format!("action '{}'", action.name());
        let dynamics = match private {
            PrivateAction::Speed { dynamics, target } => {
                if let Target::Relative { entity, .. } = target {
                    self.entity(entity, who);
                }
                Some(dynamics)
            }
            PrivateAction::LaneChange {
                dynamics, target, ..
            } => {
                if let Target::Relative { entity, .. } = target {
                    self.entity(entity, who);
                }
                Some(dynamics)
            }
            PrivateAction::LaneOffset { dynamics, .. } => Some(dynamics),
            PrivateAction::Position { position } => {
                if let Some(reference) = position.reference_entity() {
                    self.entity(reference, who);
                }
                None
            }
            PrivateAction::FollowTrajectory { trajectory, .. } => {
                if trajectory.waypoints.is_empty() {
                    self.issues.push(ValidationIssue::EmptyTrajectory {
                        action: action.name().to_string(),
                        trajectory: trajectory.name.clone(),
                    });
                }
                None
            }
        };
        if let Some(dynamics) = dynamics {
            if let Err(err) = dynamics.domain(action.name()) {
                self.issues.push(ValidationIssue::Dynamics(err));
            }
        }
    }
}

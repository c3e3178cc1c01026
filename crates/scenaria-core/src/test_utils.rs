//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`.

use nalgebra::Vector3;

use crate::action::{Action, SpeedTarget, Trajectory, TrajectoryPurpose};
use crate::condition::{
    Condition, ConditionGroup, EntityConditionKind, Rule, StateCondition, TriggeringRule,
    ValueCondition,
};
use crate::dynamics::{Dynamics, DynamicsShape};
use crate::entity::Entity;
use crate::scenario::Scenario;
use crate::storyboard::{Act, Event, Maneuver, Sequence, Story};

// ===========================================================================
// Node names used by `one_event_story`
// ===========================================================================

pub const STORY: &str = "Story";
pub const ACT: &str = "Act";
pub const SEQUENCE: &str = "Sequence";
pub const MANEUVER: &str = "Maneuver";
pub const EVENT: &str = "Event";

// ===========================================================================
// Entities
// ===========================================================================

pub fn vehicle(name: &str, speed: f64) -> Entity {
    Entity::new(name).with_speed(speed)
}

pub fn vehicle_in_lane(name: &str, speed: f64, lane: i32) -> Entity {
    Entity::new(name).with_speed(speed).with_lane(1, lane, 0.0)
}

// ===========================================================================
// Conditions
// ===========================================================================

/// A condition that holds on every evaluation.
pub fn always(name: &str) -> Condition {
    Condition::by_state(name, StateCondition::AtStart)
}

/// A condition that never holds in any realistic run.
pub fn never(name: &str) -> Condition {
    Condition::by_value(
        name,
        ValueCondition::SimulationTime {
            value: 1e9,
            rule: Rule::GreaterThan,
        },
    )
}

pub fn after_seconds(name: &str, seconds: f64) -> Condition {
    Condition::by_value(
        name,
        ValueCondition::SimulationTime {
            value: seconds,
            rule: Rule::GreaterThan,
        },
    )
}

pub fn traveled(name: &str, entity: &str, metres: f64) -> Condition {
    Condition::by_entity(
        name,
        &[entity],
        TriggeringRule::Any,
        EntityConditionKind::TraveledDistance { value: metres },
    )
}

pub fn group(condition: Condition) -> ConditionGroup {
    ConditionGroup::new().with(condition)
}

// ===========================================================================
// Actions
// ===========================================================================

/// Instant absolute speed change.
pub fn step_speed(name: &str, speed: f64) -> Action {
    Action::speed(name, Dynamics::step(), SpeedTarget::Absolute(speed))
}

/// Linear absolute speed change over `seconds`.
pub fn linear_speed(name: &str, speed: f64, seconds: f64) -> Action {
    Action::speed(
        name,
        Dynamics::timed(DynamicsShape::Linear, seconds),
        SpeedTarget::Absolute(speed),
    )
}

pub fn trajectory(name: &str, action: &str, points: &[(f64, f64)]) -> Action {
    let waypoints = points.iter().map(|&(x, y)| Vector3::new(x, y, 0.0)).collect();
    Action::follow_trajectory(
        action,
        Trajectory::new(name, waypoints),
        TrajectoryPurpose::Steering,
    )
}

// ===========================================================================
// Storyboard
// ===========================================================================

/// Story → Act → Sequence → Maneuver → Event → `action`, owned by `owner`,
/// with no start conditions anywhere. Node names are the constants above.
pub fn one_event_story(owner: &str, action: Action) -> Story {
    Story::new(STORY).with_owner(owner).with_act(
        Act::new(ACT).with_sequence(
            Sequence::new(SEQUENCE)
                .with_maneuver(Maneuver::new(MANEUVER).with_event(Event::new(EVENT).with_action(action))),
        ),
    )
}

/// A scenario with one vehicle `owner` and a one-event story around `action`.
pub fn one_event_scenario(owner: &str, action: Action) -> Scenario {
    let mut scenario = Scenario::new();
    scenario
        .add_entity(Entity::new(owner))
        .expect("fresh scenario accepts the owner");
    scenario
        .add_story(one_event_story(owner, action))
        .expect("story names must not clash with the owner or its action");
    scenario
}

//! Condition evaluation.
//!
//! A [`Condition`] is a predicate over the current world plus a latch: once
//! [`Condition::has_passed`] returns true it keeps returning true, without
//! re-evaluating, until [`Condition::reset`]. Conditions are combined into
//! groups (AND) and group lists (OR), see [`evaluate_groups`].
//!
//! Delay and edge are applied on top of the raw predicate:
//!
//! - `edge` selects which observation of the predicate counts as a trigger
//!   (level, rising, falling, either). Before the first evaluation the
//!   predicate is taken to be false.
//! - `delay` holds the pass back until `delay` seconds after the first
//!   trigger.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::entity::{Entity, EntityStore};
use crate::error::{ScenarioError, ScenarioResult};
use crate::id::normalize_tag;
use crate::parameter::{ParameterValue, Parameters};
use crate::position::{Position, PositionStore, entity_position};
use crate::registry::NameRegistry;
use crate::storyboard::{ElementState, ElementStates};

/// Read-only view of everything a condition may look at.
#[derive(Clone, Copy)]
pub struct WorldView<'a> {
    pub entities: &'a EntityStore,
    pub positions: &'a dyn PositionStore,
    pub parameters: &'a Parameters,
    pub elements: &'a ElementStates,
    pub registry: &'a NameRegistry,
    pub clock: &'a dyn Clock,
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// Comparison between an observed value (left) and a threshold (right).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rule {
    GreaterThan,
    LessThan,
    EqualTo,
}

impl Rule {
    pub fn passes(self, left: f64, right: f64) -> bool {
        match self {
            Rule::GreaterThan => left > right,
            Rule::LessThan => left < right,
            Rule::EqualTo => left == right,
        }
    }
}

impl FromStr for Rule {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_tag(s).as_str() {
            "greaterthan" => Ok(Rule::GreaterThan),
            "lessthan" => Ok(Rule::LessThan),
            "equalto" => Ok(Rule::EqualTo),
            _ => Err(ScenarioError::unknown_kind("rule", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConditionEdge {
    #[default]
    None,
    Rising,
    Falling,
    RisingOrFalling,
}

impl FromStr for ConditionEdge {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_tag(s).as_str() {
            "none" => Ok(ConditionEdge::None),
            "rising" => Ok(ConditionEdge::Rising),
            "falling" => Ok(ConditionEdge::Falling),
            "risingorfalling" => Ok(ConditionEdge::RisingOrFalling),
            _ => Err(ScenarioError::unknown_kind("condition edge", s)),
        }
    }
}

/// How a by-entity condition aggregates over its triggering entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TriggeringRule {
    #[default]
    Any,
    All,
}

impl FromStr for TriggeringRule {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_tag(s).as_str() {
            "any" => Ok(TriggeringRule::Any),
            "all" => Ok(TriggeringRule::All),
            _ => Err(ScenarioError::unknown_kind("triggering rule", s)),
        }
    }
}

// ---------------------------------------------------------------------------
// Condition kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConditionKind {
    ByEntity(EntityCondition),
    ByValue(ValueCondition),
    ByState(StateCondition),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityCondition {
    pub triggering_entities: Vec<String>,
    pub rule: TriggeringRule,
    pub kind: EntityConditionKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntityConditionKind {
    Speed { value: f64, rule: Rule },
    /// Triggering entity's speed minus `entity`'s speed.
    RelativeSpeed { entity: String, value: f64, rule: Rule },
    /// Passes once `distance_travelled >= value`.
    TraveledDistance { value: f64 },
    ReachPosition { position: Position, tolerance: f64 },
    Distance { position: Position, value: f64, rule: Rule },
    RelativeDistance { entity: String, value: f64, rule: Rule },
    /// Speed has been zero for at least `duration` seconds.
    StandStill { duration: f64 },
    EndOfRoad { duration: f64 },
    Collision { entity: String },
    Offroad { duration: f64 },
    TimeHeadway { entity: String, value: f64, rule: Rule },
    TimeToCollision { entity: String, value: f64, rule: Rule },
    Acceleration { value: f64, rule: Rule },
}

impl EntityConditionKind {
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::Speed { .. } => "speed condition",
            Self::RelativeSpeed { .. } => "relative speed condition",
            Self::TraveledDistance { .. } => "traveled distance condition",
            Self::ReachPosition { .. } => "reach position condition",
            Self::Distance { .. } => "distance condition",
            Self::RelativeDistance { .. } => "relative distance condition",
            Self::StandStill { .. } => "stand still condition",
            Self::EndOfRoad { .. } => "end of road condition",
            Self::Collision { .. } => "collision condition",
            Self::Offroad { .. } => "offroad condition",
            Self::TimeHeadway { .. } => "time headway condition",
            Self::TimeToCollision { .. } => "time to collision condition",
            Self::Acceleration { .. } => "acceleration condition",
        }
    }

    /// Entity referenced besides the triggering entities.
    pub fn reference_entity(&self) -> Option<&str> {
        match self {
            Self::RelativeSpeed { entity, .. }
            | Self::RelativeDistance { entity, .. }
            | Self::Collision { entity }
            | Self::TimeHeadway { entity, .. }
            | Self::TimeToCollision { entity, .. } => Some(entity),
            Self::ReachPosition { position, .. } | Self::Distance { position, .. } => {
                position.reference_entity()
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValueCondition {
    /// Seconds since the run started.
    SimulationTime { value: f64, rule: Rule },
    Parameter {
        parameter: String,
        value: ParameterValue,
        rule: Rule,
    },
    StoryboardElementState {
        element: String,
        state: ElementState,
    },
    TimeOfDay,
    UserDefinedValue { name: String },
    TrafficSignal { name: String },
    TrafficSignalController { name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateCondition {
    AtStart,
    AfterTermination { element: String },
    Command { name: String },
    Signal { name: String },
    Controller { name: String },
}

// ---------------------------------------------------------------------------
// Condition
// ---------------------------------------------------------------------------

/// Transient evaluation state. Cleared on reset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct ConditionState {
    triggered_at: Option<f64>,
    last_value: Option<bool>,
    /// Per-entity time at which the entity was first seen stationary.
    standstill_since: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub name: String,
    /// Seconds between the trigger and the pass.
    pub delay: f64,
    pub edge: ConditionEdge,
    pub kind: ConditionKind,
    passed: bool,
    state: ConditionState,
}

impl Condition {
    pub fn new(name: impl Into<String>, kind: ConditionKind) -> Self {
        Self {
            name: name.into(),
            delay: 0.0,
            edge: ConditionEdge::None,
            kind,
            passed: false,
            state: ConditionState::default(),
        }
    }

    pub fn by_entity(
        name: impl Into<String>,
        triggering_entities: &[&str],
        rule: TriggeringRule,
        kind: EntityConditionKind,
    ) -> Self {
        Self::new(
            name,
            ConditionKind::ByEntity(EntityCondition {
                triggering_entities: triggering_entities.iter().map(|s| s.to_string()).collect(),
                rule,
                kind,
            }),
        )
    }

    pub fn by_value(name: impl Into<String>, kind: ValueCondition) -> Self {
        Self::new(name, ConditionKind::ByValue(kind))
    }

    pub fn by_state(name: impl Into<String>, kind: StateCondition) -> Self {
        Self::new(name, ConditionKind::ByState(kind))
    }

    pub fn with_delay(mut self, delay: f64) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_edge(mut self, edge: ConditionEdge) -> Self {
        self.edge = edge;
        self
    }

    /// The latch. Only [`has_passed`](Self::has_passed) sets it and only
    /// [`reset`](Self::reset) clears it.
    pub fn passed(&self) -> bool {
        self.passed
    }

    /// Evaluate the condition, latching a pass.
    pub fn has_passed(&mut self, world: &WorldView<'_>) -> ScenarioResult<bool> {
        if self.passed {
            return Ok(true);
        }
        let level = evaluate_kind(&self.kind, &mut self.state, world)?;
        let previous = self.state.last_value.replace(level).unwrap_or(false);
        let fired = match self.edge {
            ConditionEdge::None => level,
            ConditionEdge::Rising => !previous && level,
            ConditionEdge::Falling => previous && !level,
            ConditionEdge::RisingOrFalling => previous != level,
        };
        let now = world.clock.elapsed_seconds();
        if fired && self.state.triggered_at.is_none() {
            self.state.triggered_at = Some(now);
        }
        if let Some(at) = self.state.triggered_at {
            if now >= at + self.delay {
                self.passed = true;
            }
        }
        Ok(self.passed)
    }

    pub fn reset(&mut self) {
        self.passed = false;
        self.state = ConditionState::default();
    }
}

fn evaluate_kind(
    kind: &ConditionKind,
    state: &mut ConditionState,
    world: &WorldView<'_>,
) -> ScenarioResult<bool> {
    match kind {
        ConditionKind::ByEntity(cond) => evaluate_entity_condition(cond, state, world),
        ConditionKind::ByValue(cond) => evaluate_value_condition(cond, world),
        ConditionKind::ByState(cond) => evaluate_state_condition(cond, world),
    }
}

fn evaluate_entity_condition(
    cond: &EntityCondition,
    state: &mut ConditionState,
    world: &WorldView<'_>,
) -> ScenarioResult<bool> {
    if let EntityConditionKind::StandStill { .. } = cond.kind {
        // Every timer advances, whatever the aggregation reads.
        let now = world.clock.elapsed_seconds();
        for name in &cond.triggering_entities {
            let entity = world.entities.require(name)?;
            if entity.speed == 0.0 {
                state.standstill_since.entry(name.clone()).or_insert(now);
            } else {
                state.standstill_since.remove(name);
            }
        }
    }

    match cond.rule {
        TriggeringRule::Any => {
            for name in &cond.triggering_entities {
                if entity_passes(name, &cond.kind, state, world)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        TriggeringRule::All => {
            if cond.triggering_entities.is_empty() {
                return Ok(false);
            }
            for name in &cond.triggering_entities {
                if !entity_passes(name, &cond.kind, state, world)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
    }
}

fn entity_passes(
    name: &str,
    kind: &EntityConditionKind,
    state: &ConditionState,
    world: &WorldView<'_>,
) -> ScenarioResult<bool> {
    let entity: &Entity = world.entities.require(name)?;
    match kind {
        EntityConditionKind::Speed { value, rule } => Ok(rule.passes(entity.speed, *value)),
        EntityConditionKind::RelativeSpeed {
            entity: other,
            value,
            rule,
        } => {
            let other = world.entities.require(other)?;
            Ok(rule.passes(entity.speed - other.speed, *value))
        }
        EntityConditionKind::TraveledDistance { value } => Ok(entity.distance_travelled >= *value),
        EntityConditionKind::ReachPosition {
            position,
            tolerance,
        } => {
            let here = entity_position(name, world.entities, world.positions)?;
            let there = position.resolve_world(world.entities, world.positions)?;
            Ok((there - here).norm() <= *tolerance)
        }
        EntityConditionKind::Distance {
            position,
            value,
            rule,
        } => {
            let here = entity_position(name, world.entities, world.positions)?;
            let there = position.resolve_world(world.entities, world.positions)?;
            Ok(rule.passes((there - here).norm(), *value))
        }
        EntityConditionKind::RelativeDistance {
            entity: other,
            value,
            rule,
        } => {
            let here = entity_position(name, world.entities, world.positions)?;
            let there = entity_position(other, world.entities, world.positions)?;
            Ok(rule.passes((there - here).norm(), *value))
        }
        EntityConditionKind::StandStill { duration } => {
            let now = world.clock.elapsed_seconds();
            Ok(state
                .standstill_since
                .get(name)
                .is_some_and(|since| now - since >= *duration))
        }
        other => Err(ScenarioError::unsupported(other.variant_name())),
    }
}

fn evaluate_value_condition(cond: &ValueCondition, world: &WorldView<'_>) -> ScenarioResult<bool> {
    match cond {
        ValueCondition::SimulationTime { value, rule } => {
            Ok(rule.passes(world.clock.elapsed_seconds(), *value))
        }
        ValueCondition::Parameter {
            parameter,
            value,
            rule,
        } => compare_parameter(parameter, world.parameters.get(parameter)?, value, *rule),
        ValueCondition::StoryboardElementState { element, state } => {
            Ok(element_state(element, world)? == *state)
        }
        ValueCondition::TimeOfDay => Err(ScenarioError::unsupported("time of day condition")),
        ValueCondition::UserDefinedValue { .. } => {
            Err(ScenarioError::unsupported("user defined value condition"))
        }
        ValueCondition::TrafficSignal { .. } => {
            Err(ScenarioError::unsupported("traffic signal condition"))
        }
        ValueCondition::TrafficSignalController { .. } => Err(ScenarioError::unsupported(
            "traffic signal controller condition",
        )),
    }
}

fn compare_parameter(
    name: &str,
    current: &ParameterValue,
    expected: &ParameterValue,
    rule: Rule,
) -> ScenarioResult<bool> {
    match (current, expected) {
        (ParameterValue::Number(a), ParameterValue::Number(b)) => Ok(rule.passes(*a, *b)),
        (a, b) if std::mem::discriminant(a) == std::mem::discriminant(b) => {
            if rule == Rule::EqualTo {
                Ok(a == b)
            } else {
                Err(ScenarioError::unsupported(format!(
                    "{:?} on {} parameter '{name}'",
                    rule,
                    a.type_name()
                )))
            }
        }
        (a, b) => Err(ScenarioError::ParameterType {
            parameter: name.to_string(),
            detail: format!("{} compared with {}", a.type_name(), b.type_name()),
        }),
    }
}

fn element_state(element: &str, world: &WorldView<'_>) -> ScenarioResult<ElementState> {
    if !world.registry.has_element(element) {
        return Err(ScenarioError::ElementNotFound(element.to_string()));
    }
    Ok(world.elements.get(element))
}

fn evaluate_state_condition(cond: &StateCondition, world: &WorldView<'_>) -> ScenarioResult<bool> {
    match cond {
        StateCondition::AtStart => Ok(true),
        StateCondition::AfterTermination { element } => {
            Ok(element_state(element, world)? == ElementState::Complete)
        }
        StateCondition::Command { .. } => Err(ScenarioError::unsupported("command condition")),
        StateCondition::Signal { .. } => Err(ScenarioError::unsupported("signal condition")),
        StateCondition::Controller { .. } => {
            Err(ScenarioError::unsupported("controller condition"))
        }
    }
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

/// Conjunction of conditions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionGroup {
    pub conditions: Vec<Condition>,
}

impl ConditionGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }

    pub fn with(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// True iff every condition has passed. Every condition is evaluated,
    /// so delay timers and edge histories advance even after a failure.
    pub fn evaluate(&mut self, world: &WorldView<'_>) -> ScenarioResult<bool> {
        let mut all = true;
        for condition in &mut self.conditions {
            if !condition.has_passed(world)? {
                all = false;
            }
        }
        Ok(all)
    }

    pub fn reset(&mut self) {
        for condition in &mut self.conditions {
            condition.reset();
        }
    }
}

/// Disjunction of groups. An empty list is satisfied.
pub fn evaluate_groups(groups: &mut [ConditionGroup], world: &WorldView<'_>) -> ScenarioResult<bool> {
    if groups.is_empty() {
        return Ok(true);
    }
    let mut any = false;
    for group in groups.iter_mut() {
        if group.evaluate(world)? {
            any = true;
        }
    }
    Ok(any)
}

pub fn reset_groups(groups: &mut [ConditionGroup]) {
    for group in groups {
        group.reset();
    }
}

//! Action execution.
//!
//! [`Action::start`] captures baselines (start value, start time, resolved
//! targets) and [`Action::update`] advances the action one tick, returning
//! true on the tick it completes. Both are called on the same tick an
//! action starts.
//!
//! Private actions run once per actor and complete when every actor has
//! finished. Global and user-defined actions are one-shot and complete on
//! their first update.

use std::collections::BTreeMap;
use std::fmt;

use nalgebra::Vector3;
use tracing::trace;

use crate::action::{
    Action, ActionKind, ActionProgress, CustomCommand, GlobalAction, ModifyRule, PrivateAction,
    Target, Trajectory, TrajectoryPurpose,
};
use crate::clock::Clock;
use crate::condition::WorldView;
use crate::dynamics::Ramp;
use crate::entity::{Entity, EntityStore};
use crate::error::{ScenarioError, ScenarioResult};
use crate::parameter::{ParameterValue, Parameters};
use crate::position::{Position, PositionStore};
use crate::registry::NameRegistry;
use crate::road::{RoadNetwork, lane_add};
use crate::storyboard::ElementStates;

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

/// Handler for one custom command type. Receives the command content.
pub type CommandHandler = Box<dyn FnMut(&str) -> ScenarioResult<()>>;

/// Custom command handlers keyed by command type.
#[derive(Default)]
pub struct CommandHandlers {
    handlers: BTreeMap<String, CommandHandler>,
}

impl fmt::Debug for CommandHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandHandlers")
            .field("types", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CommandHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for `command_type`.
    pub fn register(&mut self, command_type: impl Into<String>, handler: CommandHandler) {
        self.handlers.insert(command_type.into(), handler);
    }

    pub fn contains(&self, command_type: &str) -> bool {
        self.handlers.contains_key(command_type)
    }

    pub fn dispatch(&mut self, command: &CustomCommand) -> ScenarioResult<()> {
        let handler = self
            .handlers
            .get_mut(&command.command_type)
            .ok_or_else(|| {
                ScenarioError::unsupported(format!(
                    "custom command '{}' with no handler",
                    command.command_type
                ))
            })?;
        handler(&command.content)
    }
}

// ---------------------------------------------------------------------------
// Tick context
// ---------------------------------------------------------------------------

/// Everything a tick may read or write, borrowed from the engine for the
/// duration of one tick.
pub struct TickContext<'a> {
    pub entities: &'a mut EntityStore,
    pub positions: &'a mut dyn PositionStore,
    pub parameters: &'a mut Parameters,
    pub elements: &'a mut ElementStates,
    pub registry: &'a NameRegistry,
    pub road: &'a dyn RoadNetwork,
    pub commands: &'a mut CommandHandlers,
    pub clock: &'a dyn Clock,
    /// FollowTrajectory waypoint arrival distance.
    pub arrival_tolerance: f64,
}

impl TickContext<'_> {
    /// Read-only view for condition evaluation.
    pub fn view(&self) -> WorldView<'_> {
        WorldView {
            entities: &*self.entities,
            positions: &*self.positions,
            parameters: &*self.parameters,
            elements: &*self.elements,
            registry: self.registry,
            clock: self.clock,
        }
    }

    fn elapsed(&self) -> f64 {
        self.clock.elapsed_seconds()
    }

    /// World position of a known entity. One the store has not placed
    /// yet stands at the origin.
    fn position_of(&self, entity: &str) -> ScenarioResult<Vector3<f64>> {
        if !self.entities.contains(entity) {
            return Err(ScenarioError::EntityNotFound(entity.to_string()));
        }
        Ok(self.positions.position(entity).unwrap_or_else(Vector3::zeros))
    }
}

// ---------------------------------------------------------------------------
// Action start / update
// ---------------------------------------------------------------------------

impl Action {
    /// Start the action for `actors`. Private actions need at least one.
    pub fn start(&mut self, actors: &[String], ctx: &mut TickContext<'_>) -> ScenarioResult<()> {
        if let ActionKind::Private(action) = &self.kind {
            if actors.is_empty() {
                return Err(ScenarioError::NoActor {
                    action: self.name.clone(),
                });
            }
            let mut progress = Vec::with_capacity(actors.len());
            for actor in actors {
                progress.push(start_private(&self.name, action, actor, ctx)?);
            }
            self.progress = progress;
        }
        self.has_started = true;
        Ok(())
    }

    /// Advance one tick. Returns true on the tick the action completes.
    pub fn update(&mut self, ctx: &mut TickContext<'_>) -> ScenarioResult<bool> {
        if self.is_completed || !self.has_started {
            return Ok(false);
        }
        let done = match &self.kind {
            ActionKind::Private(action) => {
                let mut all = true;
                for progress in &mut self.progress {
                    if !progress.done {
                        progress.done = update_private(action, progress, ctx)?;
                    }
                    all &= progress.done;
                }
                all
            }
            ActionKind::Global(action) => {
                apply_global(action, ctx.parameters)?;
                true
            }
            ActionKind::UserDefined(command) => {
                ctx.commands.dispatch(command)?;
                true
            }
        };
        if done {
            self.is_completed = true;
        }
        Ok(done)
    }
}

fn start_private(
    name: &str,
    action: &PrivateAction,
    actor: &str,
    ctx: &mut TickContext<'_>,
) -> ScenarioResult<ActionProgress> {
    let elapsed = ctx.elapsed();
    let mut progress = ActionProgress::new(actor);
    match action {
        PrivateAction::Speed { dynamics, target } => {
            let to = match target {
                Target::Absolute(v) => *v,
                Target::Relative { entity, delta } => ctx.entities.require(entity)?.speed + delta,
            };
            let domain = dynamics.domain(name)?;
            let entity = ctx.entities.require(actor)?;
            progress.ramp = Some(Ramp::new(
                dynamics.shape,
                domain,
                entity.max_speed,
                to,
                elapsed,
                entity.distance_travelled,
            ));
        }
        PrivateAction::LaneChange {
            dynamics, target, ..
        } => {
            let domain = dynamics.domain(name)?;
            let entity = ctx.entities.require(actor)?;
            let target_lane = match target {
                Target::Absolute(lane) => *lane,
                Target::Relative { entity, delta } => {
                    lane_add(ctx.entities.require(entity)?.lane_id, *delta)?
                }
            };
            let shift = lane_shift(entity, target_lane, ctx.road)?;
            progress.target_lane = Some(target_lane);
            progress.ramp = Some(Ramp::new(
                dynamics.shape,
                domain,
                entity.lane_offset,
                entity.lane_offset + shift,
                elapsed,
                entity.distance_travelled,
            ));
        }
        PrivateAction::LaneOffset { dynamics, offset } => {
            let domain = dynamics.domain(name)?;
            let entity = ctx.entities.require(actor)?;
            progress.ramp = Some(Ramp::new(
                dynamics.shape,
                domain,
                entity.lane_offset,
                *offset,
                elapsed,
                entity.distance_travelled,
            ));
        }
        PrivateAction::Position { position } => {
            ctx.entities.require(actor)?;
            if let Some(reference) = position.reference_entity() {
                ctx.entities.require(reference)?;
            }
        }
        PrivateAction::FollowTrajectory { .. } => {
            ctx.entities.require_mut(actor)?.trajectory_active = true;
        }
    }
    Ok(progress)
}

/// Signed lateral move from the actor's lane centre to the target lane
/// centre: half of each end lane plus every lane in between.
fn lane_shift(entity: &Entity, target_lane: i32, road: &dyn RoadNetwork) -> ScenarioResult<f64> {
    let from = entity.lane_id;
    if target_lane == 0 {
        return Err(ScenarioError::RoadQuery {
            road: entity.road_id,
            lane: 0,
            reason: "centre lane is not a lane change target".into(),
        });
    }
    if from == target_lane {
        return Ok(0.0);
    }
    let width = |lane| road.lane_width(entity.road_id, lane, entity.s);
    let magnitude = width(from)? / 2.0
        + width(target_lane)? / 2.0
        + road.width_between(entity.road_id, from, target_lane, entity.s)?;
    let sign = if target_lane > from { 1.0 } else { -1.0 };
    Ok(sign * magnitude)
}

fn update_private(
    action: &PrivateAction,
    progress: &mut ActionProgress,
    ctx: &mut TickContext<'_>,
) -> ScenarioResult<bool> {
    let elapsed = ctx.elapsed();
    match action {
        PrivateAction::Speed { .. } => {
            let entity = ctx.entities.require_mut(&progress.actor)?;
            let Some(ramp) = &progress.ramp else {
                return Ok(true);
            };
            let (value, done) = ramp.sample(elapsed, entity.distance_travelled);
            entity.max_speed = value;
            Ok(done)
        }
        PrivateAction::LaneChange {
            target_lane_offset,
            ..
        } => {
            let entity = ctx.entities.require_mut(&progress.actor)?;
            let (Some(ramp), Some(target_lane)) = (&progress.ramp, progress.target_lane) else {
                return Ok(true);
            };
            let (value, done) = ramp.sample(elapsed, entity.distance_travelled);
            if done {
                entity.lane_id = target_lane;
                entity.lane_offset = *target_lane_offset;
            } else {
                entity.lane_offset = value;
            }
            Ok(done)
        }
        PrivateAction::LaneOffset { .. } => {
            let entity = ctx.entities.require_mut(&progress.actor)?;
            let Some(ramp) = &progress.ramp else {
                return Ok(true);
            };
            let (value, done) = ramp.sample(elapsed, entity.distance_travelled);
            entity.lane_offset = value;
            Ok(done)
        }
        PrivateAction::Position { position } => {
            apply_position(position, &progress.actor, ctx)?;
            Ok(true)
        }
        PrivateAction::FollowTrajectory {
            trajectory,
            purpose,
        } => follow_trajectory(trajectory, *purpose, progress, ctx),
    }
}

fn apply_position(position: &Position, actor: &str, ctx: &mut TickContext<'_>) -> ScenarioResult<()> {
    match position {
        Position::World { x, y, z, heading } => {
            let entity = ctx.entities.require_mut(actor)?;
            if let Some(h) = heading {
                entity.heading = *h;
            }
            ctx.positions.set_position(actor, Vector3::new(*x, *y, *z));
            Ok(())
        }
        Position::RelativeObject { .. } => {
            let world = position.resolve_world(&*ctx.entities, &*ctx.positions)?;
            ctx.entities.require(actor)?;
            ctx.positions.set_position(actor, world);
            Ok(())
        }
        Position::Lane {
            road_id,
            lane_id,
            s,
            offset,
        } => {
            let entity = ctx.entities.require_mut(actor)?;
            entity.road_id = *road_id;
            entity.lane_id = *lane_id;
            entity.s = *s;
            entity.lane_offset = *offset;
            Ok(())
        }
        Position::RelativeLane {
            entity: reference,
            d_lane,
            ds,
            offset,
        } => {
            let (road_id, lane_id, s) = {
                let other = ctx.entities.require(reference)?;
                (other.road_id, lane_add(other.lane_id, *d_lane)?, other.s + ds)
            };
            let entity = ctx.entities.require_mut(actor)?;
            entity.road_id = road_id;
            entity.lane_id = lane_id;
            entity.s = s;
            entity.lane_offset = *offset;
            Ok(())
        }
        other => Err(ScenarioError::unsupported(other.variant_name())),
    }
}

fn follow_trajectory(
    trajectory: &Trajectory,
    purpose: TrajectoryPurpose,
    progress: &mut ActionProgress,
    ctx: &mut TickContext<'_>,
) -> ScenarioResult<bool> {
    let actor = progress.actor.clone();
    let waypoints = &trajectory.waypoints;
    let mut position = ctx.position_of(&actor)?;
    let tolerance = ctx.arrival_tolerance;
    let dt = ctx.clock.delta_time();
    let entity = ctx.entities.require_mut(&actor)?;

    // Consume waypoints already within reach.
    while progress.waypoint < waypoints.len()
        && (waypoints[progress.waypoint] - position).norm() <= tolerance
    {
        progress.waypoint += 1;
    }

    if progress.waypoint < waypoints.len() {
        let goal = waypoints[progress.waypoint];
        let to_goal = goal - position;
        let remaining = to_goal.norm();
        let step = match purpose {
            TrajectoryPurpose::Positioning => remaining,
            TrajectoryPurpose::Steering => {
                let speed = if entity.speed > 0.0 {
                    entity.speed
                } else {
                    entity.max_speed
                };
                speed * dt
            }
        };
        if remaining > 0.0 {
            entity.heading = to_goal.y.atan2(to_goal.x);
        }
        if step >= remaining {
            position = goal;
            entity.distance_travelled += remaining;
            progress.waypoint += 1;
        } else {
            position += to_goal * (step / remaining);
            entity.distance_travelled += step;
        }
        ctx.positions.set_position(&actor, position);
    }

    let done = progress.waypoint >= waypoints.len();
    if done {
        trace!(actor = %actor, trajectory = %trajectory.name, "trajectory finished");
        entity.trajectory_active = false;
    }
    Ok(done)
}

fn apply_global(action: &GlobalAction, parameters: &mut Parameters) -> ScenarioResult<()> {
    match action {
        GlobalAction::ParameterSet { parameter, value } => parameters.set(parameter, value.clone()),
        GlobalAction::ParameterModify { parameter, rule } => {
            let current = parameters.number(parameter)?;
            let next = match rule {
                ModifyRule::Add(v) => current + v,
                ModifyRule::Multiply(v) => current * v,
            };
            parameters.set(parameter, ParameterValue::Number(next))
        }
        GlobalAction::Environment => Err(ScenarioError::unsupported("environment action")),
        GlobalAction::EntityAdd { .. } => Err(ScenarioError::unsupported("add entity action")),
        GlobalAction::EntityDelete { .. } => {
            Err(ScenarioError::unsupported("delete entity action"))
        }
        GlobalAction::Infrastructure => Err(ScenarioError::unsupported("infrastructure action")),
        GlobalAction::Traffic => Err(ScenarioError::unsupported("traffic action")),
    }
}

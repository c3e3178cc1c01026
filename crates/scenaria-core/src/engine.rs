//! The scenario engine: owns a [`Scenario`] and its collaborators and walks
//! the storyboard once per tick.
//!
//! # Tick order
//!
//! 1. Advance the clock.
//! 2. Update init actions that have not finished.
//! 3. Evaluate storyboard end conditions; if they hold, stop, skipping the
//!    rest.
//! 4. Walk stories in authoring order.
//! 5. Run the movement model.
//! 6. Deliver the tick's events to listeners.
//!
//! Completion cascades (action → event → maneuver → sequence → act →
//! story) happen within the tick that triggers them: the walker returns
//! completion upward instead of subscribing callbacks.

use std::collections::BTreeMap;

use nalgebra::Vector3;
use tracing::{debug, info, warn};

use crate::action::Action;
use crate::clock::{Clock, Fixed64, SimClock, Ticks};
use crate::condition::evaluate_groups;
use crate::config::EngineConfig;
use crate::event::{EventBus, EventKind, PassiveListener, ScenarioEvent};
use crate::movement::{KinematicMovement, MovementModel};
use crate::position::{PositionMap, PositionStore};
use crate::road::{RoadNetwork, UniformRoad};
use crate::runtime::{CommandHandler, CommandHandlers, TickContext};
use crate::scenario::Scenario;
use crate::serialize::EngineFrame;
use crate::sim::{AdvanceResult, StateHash, TickOutcome};
use crate::error::ScenarioResult;
use crate::storyboard::{
    Act, ElementState, Event, Maneuver, Sequence, Story, Storyboard, StoryboardState,
};

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ScenarioEngine {
    scenario: Scenario,
    clock: Box<dyn Clock>,
    road: Box<dyn RoadNetwork>,
    positions: Box<dyn PositionStore>,
    movement: Box<dyn MovementModel>,
    commands: CommandHandlers,
    events: EventBus,
    config: EngineConfig,
    /// Unspent time carried between `advance` calls.
    accumulator: Fixed64,
    /// Entity positions at the start of the first run, restored by every
    /// reset.
    origin: Option<BTreeMap<String, Vector3<f64>>>,
}

impl ScenarioEngine {
    /// An engine with a [`SimClock`], a 3.5 m [`UniformRoad`], an in-memory
    /// [`PositionMap`] and [`KinematicMovement`].
    pub fn new(scenario: Scenario, config: EngineConfig) -> Self {
        let events = EventBus::new(config.event_capacity);
        Self {
            scenario,
            clock: Box::new(SimClock::new()),
            road: Box::new(UniformRoad::default()),
            positions: Box::new(PositionMap::new()),
            movement: Box::new(KinematicMovement),
            commands: CommandHandlers::new(),
            events,
            config,
            accumulator: Fixed64::ZERO,
            origin: None,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_road_network(mut self, road: impl RoadNetwork + 'static) -> Self {
        self.road = Box::new(road);
        self
    }

    pub fn with_position_store(mut self, positions: impl PositionStore + 'static) -> Self {
        self.positions = Box::new(positions);
        self.origin = None;
        self
    }

    pub fn with_movement_model(mut self, movement: impl MovementModel + 'static) -> Self {
        self.movement = Box::new(movement);
        self
    }

    /// Route custom commands of `command_type` to `handler`.
    pub fn register_command_handler(
        &mut self,
        command_type: impl Into<String>,
        handler: CommandHandler,
    ) {
        self.commands.register(command_type, handler);
    }

    // -----------------------------------------------------------------------
    // Access
    // -----------------------------------------------------------------------

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn scenario_mut(&mut self) -> &mut Scenario {
        &mut self.scenario
    }

    pub(crate) fn replace_scenario(&mut self, scenario: Scenario) {
        self.scenario = scenario;
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn positions(&self) -> &dyn PositionStore {
        self.positions.as_ref()
    }

    pub fn positions_mut(&mut self) -> &mut dyn PositionStore {
        self.positions.as_mut()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_stopped(&self) -> bool {
        self.scenario.storyboard.is_stopped()
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Listen to every event, delivered at the end of each tick.
    pub fn on_event(&mut self, listener: PassiveListener) {
        self.events.on_event(listener);
    }

    pub fn on_kind(&mut self, kind: EventKind, listener: PassiveListener) {
        self.events.on_kind(kind, listener);
    }

    pub fn suppress_event(&mut self, kind: EventKind) {
        self.events.suppress(kind);
    }

    /// Events delivered at the end of the last tick.
    pub fn last_events(&self) -> &[ScenarioEvent] {
        self.events.last_events()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Start a run: reset, then start every entity's init actions and apply
    /// their first update. Unfinished init actions keep updating at the
    /// start of each tick.
    pub fn perform_init_actions(&mut self) -> ScenarioResult<()> {
        self.reset_run_state();
        self.scenario.storyboard.state = StoryboardState::Running;
        let tick = self.clock.tick();
        self.events.emit(ScenarioEvent::ScenarioReset { tick });
        info!("performing init actions");
        let result = self.with_walk(|walk, _| walk.init_actions());
        self.events.deliver();
        result
    }

    /// Advance the whole storyboard by one step of `dt` seconds.
    pub fn tick(&mut self, dt: f64) -> ScenarioResult<TickOutcome> {
        if self.is_stopped() {
            return Ok(TickOutcome::Stopped);
        }
        if self.origin.is_none() {
            self.capture_origin();
        }
        self.clock.advance(dt);
        let result = self.step_internal();
        if let Err(err) = &result {
            warn!(tick = self.clock.tick(), error = %err, "tick aborted");
        }
        if matches!(result, Ok(TickOutcome::Stopped)) && self.config.reset_on_stop {
            let tick = self.clock.tick();
            self.reset_run_state();
            self.events.emit(ScenarioEvent::ScenarioReset { tick });
        }
        self.events.deliver();
        result
    }

    /// Feed `dt` seconds into the fixed-step accumulator and run as many
    /// `fixed_step_secs` ticks as fit. The remainder carries over.
    pub fn advance(&mut self, dt: f64) -> ScenarioResult<AdvanceResult> {
        let mut result = AdvanceResult {
            steps_run: 0,
            outcome: TickOutcome::Running,
            tick: self.clock.tick(),
        };
        if self.is_stopped() {
            result.outcome = TickOutcome::Stopped;
            return Ok(result);
        }
        let step = Fixed64::saturating_from_num(self.config.fixed_step_secs);
        if step <= Fixed64::ZERO {
            return Ok(result);
        }
        self.accumulator = self
            .accumulator
            .saturating_add(Fixed64::saturating_from_num(dt.max(0.0)));
        while self.accumulator >= step {
            self.accumulator -= step;
            result.outcome = self.tick(step.to_num::<f64>())?;
            result.steps_run += 1;
            if result.outcome == TickOutcome::Stopped {
                self.accumulator = Fixed64::ZERO;
                break;
            }
        }
        result.tick = self.clock.tick();
        Ok(result)
    }

    /// Stop the run. Resets immediately when `reset_on_stop` is set. A
    /// stopped engine ticks no further until
    /// [`perform_init_actions`](Self::perform_init_actions).
    pub fn stop(&mut self) {
        if self.is_stopped() {
            return;
        }
        let tick = self.clock.tick();
        self.scenario.storyboard.state = StoryboardState::Stopped;
        info!(tick, "storyboard stopped");
        self.events.emit(ScenarioEvent::StoryboardStopped { tick });
        if self.config.reset_on_stop {
            self.reset_run_state();
            self.events.emit(ScenarioEvent::ScenarioReset { tick });
        }
        self.events.deliver();
    }

    /// Restore all transient state so the scenario can re-run from the
    /// beginning. The stopped flag is kept.
    pub fn reset(&mut self) {
        self.events.clear();
        self.reset_run_state();
        info!("scenario reset");
        self.events.emit(ScenarioEvent::ScenarioReset { tick: 0 });
        self.events.deliver();
    }

    fn reset_run_state(&mut self) {
        if self.origin.is_none() {
            self.capture_origin();
        } else {
            self.restore_origin();
        }
        self.scenario.reset();
        self.clock.reset();
        self.accumulator = Fixed64::ZERO;
    }

    /// Record where every entity stands before anything has moved.
    /// Entities the store does not know yet count as at the origin.
    fn capture_origin(&mut self) {
        let origin = self
            .scenario
            .entities
            .iter()
            .map(|entity| {
                let p = self.positions.position(entity.name()).unwrap_or_else(Vector3::zeros);
                (entity.name().to_string(), p)
            })
            .collect();
        self.origin = Some(origin);
    }

    fn restore_origin(&mut self) {
        let Some(origin) = &self.origin else {
            return;
        };
        for entity in self.scenario.entities.iter() {
            let p = origin.get(entity.name()).copied().unwrap_or_else(Vector3::zeros);
            self.positions.set_position(entity.name(), p);
        }
    }

    // -----------------------------------------------------------------------
    // Snapshot frame
    // -----------------------------------------------------------------------

    /// Engine-side run state that lives outside the scenario.
    pub(crate) fn frame(&self) -> EngineFrame {
        EngineFrame {
            clock: self.clock.checkpoint(),
            accumulator: self.accumulator,
            positions: self
                .scenario
                .entities
                .iter()
                .filter_map(|entity| {
                    let p = self.positions.position(entity.name())?;
                    Some((entity.name().to_string(), [p.x, p.y, p.z]))
                })
                .collect(),
        }
    }

    pub(crate) fn apply_frame(&mut self, frame: &EngineFrame) {
        self.clock.restore(&frame.clock);
        self.accumulator = frame.accumulator;
        for (name, [x, y, z]) in &frame.positions {
            self.positions.set_position(name, Vector3::new(*x, *y, *z));
        }
    }

    // -----------------------------------------------------------------------
    // State hash
    // -----------------------------------------------------------------------

    /// Hash of clock, entity kinematics, positions, parameters and node run
    /// state.
    pub fn state_hash(&self) -> u64 {
        let mut h = StateHash::new();
        h.write_u64(self.clock.tick());
        h.write_f64(self.clock.elapsed_seconds());
        for entity in self.scenario.entities.iter() {
            h.write_str(entity.name());
            h.write_f64(entity.speed);
            h.write_f64(entity.max_speed);
            h.write_u64(entity.road_id as u64);
            h.write_i32(entity.lane_id);
            h.write_f64(entity.lane_offset);
            h.write_f64(entity.s);
            h.write_f64(entity.heading);
            h.write_f64(entity.distance_travelled);
            h.write_bool(entity.enabled);
            if let Some(p) = self.positions.position(entity.name()) {
                h.write_f64(p.x);
                h.write_f64(p.y);
                h.write_f64(p.z);
            }
        }
        for (name, value) in self.scenario.parameters.iter() {
            h.write_str(name);
            h.write_str(&value.to_string());
        }
        self.scenario.storyboard.hash_into(&mut h);
        h.finish()
    }

    // -----------------------------------------------------------------------
    // Internal: single step
    // -----------------------------------------------------------------------

    /// Borrow everything a walk needs and run `f`.
    fn with_walk<R>(&mut self, f: impl FnOnce(&mut Walk<'_>, &mut Storyboard) -> R) -> R {
        let Self {
            scenario,
            clock,
            road,
            positions,
            commands,
            events,
            config,
            ..
        } = self;
        let Scenario {
            registry,
            entities,
            parameters,
            storyboard,
            elements,
        } = scenario;
        let mut walk = Walk {
            tick: clock.tick(),
            ctx: TickContext {
                entities,
                positions: positions.as_mut(),
                parameters,
                elements,
                registry,
                road: road.as_ref(),
                commands,
                clock: clock.as_ref(),
                arrival_tolerance: config.arrival_tolerance,
            },
            events,
        };
        f(&mut walk, storyboard)
    }

    fn step_internal(&mut self) -> ScenarioResult<TickOutcome> {
        let outcome = self.with_walk(|walk, storyboard| -> ScenarioResult<TickOutcome> {
            walk.init_actions()?;

            if !storyboard.end_conditions.is_empty() {
                let stop = evaluate_groups(&mut storyboard.end_conditions, &walk.ctx.view())?;
                if stop {
                    storyboard.state = StoryboardState::Stopped;
                    info!(tick = walk.tick, "end conditions met, storyboard stopped");
                    walk.emit(ScenarioEvent::StoryboardStopped { tick: walk.tick });
                    return Ok(TickOutcome::Stopped);
                }
            }

            for story in &mut storyboard.stories {
                walk.story(story)?;
            }

            Ok(if storyboard.all_complete() {
                TickOutcome::Completed
            } else {
                TickOutcome::Running
            })
        })?;

        if outcome != TickOutcome::Stopped && self.config.movement_enabled {
            let dt = self.clock.delta_time();
            self.movement
                .step(&mut self.scenario.entities, self.positions.as_mut(), dt);
        }
        Ok(outcome)
    }
}

// ---------------------------------------------------------------------------
// Walker
// ---------------------------------------------------------------------------

/// One tick's traversal of the storyboard.
struct Walk<'a> {
    ctx: TickContext<'a>,
    events: &'a mut EventBus,
    tick: Ticks,
}

impl Walk<'_> {
    fn emit(&mut self, event: ScenarioEvent) {
        self.events.emit(event);
    }

    fn mark(&mut self, name: &str, state: ElementState) {
        self.ctx.elements.set(name, state);
    }

    fn story(&mut self, story: &mut Story) -> ScenarioResult<()> {
        if story.is_completed {
            return Ok(());
        }
        let tick = self.tick;
        if !story.has_started {
            story.has_started = true;
            self.mark(&story.name, ElementState::Running);
            info!(story = %story.name, tick, "story started");
            self.emit(ScenarioEvent::StoryStarted {
                name: story.name.clone(),
                tick,
            });
        }

        let owner = story.owner.as_deref();
        for act in &mut story.acts {
            self.act(act, owner)?;
        }

        if story.acts.iter().all(Act::is_completed) {
            story.is_completed = true;
            self.mark(&story.name, ElementState::Complete);
            info!(story = %story.name, tick, "story completed");
            self.emit(ScenarioEvent::StoryCompleted {
                name: story.name.clone(),
                tick,
            });
        }
        Ok(())
    }

    fn act(&mut self, act: &mut Act, owner: Option<&str>) -> ScenarioResult<()> {
        if act.is_completed {
            return Ok(());
        }
        let tick = self.tick;
        if !act.has_started {
            act.should_start = evaluate_groups(&mut act.start_conditions, &self.ctx.view())?;
            if !act.should_start {
                return Ok(());
            }
            act.has_started = true;
            self.mark(&act.name, ElementState::Running);
            info!(act = %act.name, tick, "act started");
            self.emit(ScenarioEvent::ActStarted {
                name: act.name.clone(),
                tick,
            });
        }

        for sequence in &mut act.sequences {
            self.sequence(sequence, owner)?;
        }

        if act.sequences.iter().all(Sequence::is_completed) {
            act.is_completed = true;
            self.mark(&act.name, ElementState::Complete);
            info!(act = %act.name, tick, "act completed");
            self.emit(ScenarioEvent::ActCompleted {
                name: act.name.clone(),
                tick,
            });
        }
        Ok(())
    }

    fn sequence(&mut self, sequence: &mut Sequence, owner: Option<&str>) -> ScenarioResult<()> {
        if sequence.is_completed {
            return Ok(());
        }
        if !sequence.has_started {
            sequence.has_started = true;
            self.mark(&sequence.name, ElementState::Running);
        }

        let actors: Vec<String> = if sequence.actors.is_empty() {
            owner.map(|o| vec![o.to_string()]).unwrap_or_default()
        } else {
            sequence.actors.clone()
        };
        for maneuver in &mut sequence.maneuvers {
            self.maneuver(maneuver, &actors)?;
        }

        if sequence.maneuvers.iter().all(Maneuver::is_completed) {
            sequence.executions += 1;
            if sequence.executions >= sequence.execution_count.max(1) {
                sequence.is_completed = true;
                self.mark(&sequence.name, ElementState::Complete);
                debug!(sequence = %sequence.name, executions = sequence.executions, "sequence completed");
                self.emit(ScenarioEvent::SequenceCompleted {
                    name: sequence.name.clone(),
                    tick: self.tick,
                });
            } else {
                debug!(sequence = %sequence.name, executions = sequence.executions, "sequence repeating");
                for maneuver in &mut sequence.maneuvers {
                    maneuver.replay();
                }
            }
        }
        Ok(())
    }

    fn maneuver(&mut self, maneuver: &mut Maneuver, actors: &[String]) -> ScenarioResult<()> {
        if maneuver.is_completed {
            return Ok(());
        }
        let tick = self.tick;
        if !maneuver.has_started {
            maneuver.has_started = true;
            self.mark(&maneuver.name, ElementState::Running);
            debug!(maneuver = %maneuver.name, tick, "maneuver started");
            self.emit(ScenarioEvent::ManeuverStarted {
                name: maneuver.name.clone(),
                tick,
            });
        }

        // Only the event under the cursor is considered.
        let index = maneuver.pass_index();
        if let Some(event) = maneuver.events.get_mut(index) {
            let mut running = event.has_started;
            if !running {
                running = evaluate_groups(&mut event.start_conditions, &self.ctx.view())?;
                if running {
                    event.has_started = true;
                    self.mark(&event.name, ElementState::Running);
                    debug!(event = %event.name, tick, "event started");
                    self.emit(ScenarioEvent::EventStarted {
                        name: event.name.clone(),
                        tick,
                    });
                }
            }
            if running && self.event(event, actors)? {
                maneuver.event_index += 1;
            }
        }

        if maneuver.pass_finished() {
            maneuver.is_completed = true;
            self.mark(&maneuver.name, ElementState::Complete);
            debug!(maneuver = %maneuver.name, tick, "maneuver completed");
            self.emit(ScenarioEvent::ManeuverCompleted {
                name: maneuver.name.clone(),
                tick,
            });
        }
        Ok(())
    }

    /// Returns true on the tick the event completes.
    fn event(&mut self, event: &mut Event, actors: &[String]) -> ScenarioResult<bool> {
        if event.is_completed {
            return Ok(false);
        }
        self.actions(&mut event.actions, actors)?;
        if event.actions.iter().all(Action::is_completed) {
            event.is_completed = true;
            self.mark(&event.name, ElementState::Complete);
            debug!(event = %event.name, tick = self.tick, "event completed");
            self.emit(ScenarioEvent::EventCompleted {
                name: event.name.clone(),
                tick: self.tick,
            });
            return Ok(true);
        }
        Ok(false)
    }

    /// Start what has not started, update what has not completed.
    fn actions(&mut self, actions: &mut [Action], actors: &[String]) -> ScenarioResult<()> {
        let tick = self.tick;
        for action in actions.iter_mut() {
            if action.is_completed() {
                continue;
            }
            if !action.has_started() {
                action.start(actors, &mut self.ctx)?;
                self.mark(action.name(), ElementState::Running);
                debug!(action = action.name(), tick, "action started");
                self.emit(ScenarioEvent::ActionStarted {
                    name: action.name().to_string(),
                    tick,
                });
            }
            if action.update(&mut self.ctx)? {
                self.mark(action.name(), ElementState::Complete);
                debug!(action = action.name(), tick, "action completed");
                self.emit(ScenarioEvent::ActionCompleted {
                    name: action.name().to_string(),
                    tick,
                });
            }
        }
        Ok(())
    }

    /// Run every entity's unfinished init actions with the entity as actor.
    fn init_actions(&mut self) -> ScenarioResult<()> {
        let ids = self.ctx.entities.ids().to_vec();
        for id in ids {
            let Some(entity) = self.ctx.entities.get_by_id_mut(id) else {
                continue;
            };
            if entity.init_actions.iter().all(Action::is_completed) {
                continue;
            }
            let actors = vec![entity.name().to_string()];
            let mut actions = std::mem::take(&mut entity.init_actions);
            let result = self.actions(&mut actions, &actors);
            if let Some(entity) = self.ctx.entities.get_by_id_mut(id) {
                entity.init_actions = actions;
            }
            result?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Condition, ConditionGroup, Rule, StateCondition, ValueCondition};
    use crate::entity::Entity;
    use crate::test_utils;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn ego_engine(action: Action) -> ScenarioEngine {
        let mut scenario = Scenario::new();
        scenario.add_entity(Entity::new("Ego")).unwrap();
        scenario
            .add_story(test_utils::one_event_story("Ego", action))
            .unwrap();
        ScenarioEngine::new(scenario, EngineConfig::default())
    }

    #[test]
    fn end_conditions_stop_before_stories_run() {
        let mut engine = ego_engine(test_utils::step_speed("Go", 20.0));
        engine.config.reset_on_stop = false;
        engine
            .scenario_mut()
            .add_end_condition_group(ConditionGroup::new().with(test_utils::always("End")));

        assert_eq!(engine.tick(0.1).unwrap(), TickOutcome::Stopped);
        assert!(engine.is_stopped());
        assert_eq!(engine.scenario().entity("Ego").unwrap().max_speed, 0.0);
        assert_eq!(engine.tick(0.1).unwrap(), TickOutcome::Stopped);
        assert_eq!(engine.clock().tick(), 1);
    }

    #[test]
    fn empty_end_condition_list_never_stops() {
        let mut engine = ego_engine(test_utils::step_speed("Go", 20.0));
        assert_eq!(engine.tick(0.1).unwrap(), TickOutcome::Completed);
        assert!(!engine.is_stopped());
    }

    #[test]
    fn events_are_delivered_at_end_of_tick() {
        let mut engine = ego_engine(test_utils::step_speed("Go", 20.0));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        engine.on_event(Box::new(move |e: &ScenarioEvent| sink.borrow_mut().push(e.kind())));
        engine.tick(0.1).unwrap();
        assert_eq!(
            *seen.borrow(),
            vec![
                EventKind::StoryStarted,
                EventKind::ActStarted,
                EventKind::ManeuverStarted,
                EventKind::EventStarted,
                EventKind::ActionStarted,
                EventKind::ActionCompleted,
                EventKind::EventCompleted,
                EventKind::ManeuverCompleted,
                EventKind::SequenceCompleted,
                EventKind::ActCompleted,
                EventKind::StoryCompleted,
            ]
        );
        assert_eq!(engine.last_events().len(), 11);
    }

    #[test]
    fn advance_runs_whole_fixed_steps() {
        let mut engine = ego_engine(test_utils::step_speed("Go", 20.0));
        engine.config.fixed_step_secs = 0.25;
        let r = engine.advance(0.6).unwrap();
        assert_eq!(r.steps_run, 2);
        assert_eq!(r.tick, 2);
        let r = engine.advance(0.5).unwrap();
        assert_eq!(r.steps_run, 2);
        assert_eq!(engine.clock().elapsed_seconds(), 1.0);
    }

    #[test]
    fn stop_resets_when_configured() {
        let mut engine = ego_engine(test_utils::step_speed("Go", 20.0));
        engine.tick(0.1).unwrap();
        assert!(engine.scenario().storyboard().stories[0].is_completed());
        engine.stop();
        assert!(engine.is_stopped());
        assert!(!engine.scenario().storyboard().stories[0].is_completed());
        assert_eq!(engine.clock().tick(), 0);
        let kinds: Vec<_> = engine.last_events().iter().map(ScenarioEvent::kind).collect();
        assert_eq!(kinds, vec![EventKind::StoryboardStopped, EventKind::ScenarioReset]);
    }

    #[test]
    fn perform_init_actions_restarts_stopped_engine() {
        let mut engine = ego_engine(test_utils::step_speed("Go", 20.0));
        engine
            .scenario_mut()
            .add_init_action("Ego", test_utils::step_speed("InitSpeed", 8.0))
            .unwrap();
        engine.stop();
        engine.perform_init_actions().unwrap();
        assert!(!engine.is_stopped());
        let ego = engine.scenario().entity("Ego").unwrap();
        assert_eq!(ego.max_speed, 8.0);
        assert!(ego.init_actions[0].is_completed());
    }

    #[test]
    fn act_waits_for_start_conditions() {
        let mut scenario = Scenario::new();
        scenario.add_entity(Entity::new("Ego")).unwrap();
        let late = Condition::by_value(
            "Late",
            ValueCondition::SimulationTime {
                value: 0.25,
                rule: Rule::GreaterThan,
            },
        );
        let story = test_utils::one_event_story("Ego", test_utils::step_speed("Go", 20.0));
        let story = Story {
            acts: story
                .acts
                .into_iter()
                .map(|act| act.with_start_group(ConditionGroup::new().with(late.clone())))
                .collect(),
            ..story
        };
        scenario.add_story(story).unwrap();
        let mut engine = ScenarioEngine::new(scenario, EngineConfig::default());

        assert_eq!(engine.tick(0.2).unwrap(), TickOutcome::Running);
        let act = &engine.scenario().storyboard().stories[0].acts[0];
        assert!(!act.has_started());
        assert!(!act.should_start());
        assert_eq!(engine.tick(0.2).unwrap(), TickOutcome::Completed);
    }

    #[test]
    fn error_aborts_tick_but_keeps_prior_writes() {
        let mut scenario = Scenario::new();
        scenario.add_entity(Entity::new("Ego")).unwrap();
        let story = Story::new("S").with_owner("Ego").with_act(
            Act::new("A").with_sequence(
                Sequence::new("Q").with_maneuver(
                    Maneuver::new("M").with_event(
                        Event::new("E")
                            .with_action(test_utils::step_speed("First", 12.0))
                            .with_action(Action::global(
                                "Weather",
                                crate::action::GlobalAction::Environment,
                            )),
                    ),
                ),
            ),
        );
        scenario.add_story(story).unwrap();
        let mut engine = ScenarioEngine::new(scenario, EngineConfig::default());
        assert!(engine.tick(0.1).is_err());
        assert_eq!(engine.scenario().entity("Ego").unwrap().max_speed, 12.0);
        assert!(
            engine
                .last_events()
                .iter()
                .any(|e| e.kind() == EventKind::ActionCompleted)
        );
    }

    #[test]
    fn after_termination_chains_stories() {
        let mut scenario = Scenario::new();
        scenario.add_entity(Entity::new("Ego")).unwrap();
        scenario
            .add_story(test_utils::one_event_story("Ego", test_utils::step_speed("Go", 20.0)))
            .unwrap();
        let follow_up = Story::new("Second").with_owner("Ego").with_act(
            Act::new("SecondAct")
                .with_start_group(ConditionGroup::new().with(Condition::by_state(
                    "AfterFirst",
                    StateCondition::AfterTermination {
                        element: test_utils::STORY.into(),
                    },
                )))
                .with_sequence(Sequence::new("SecondSeq").with_maneuver(
                    Maneuver::new("SecondMan").with_event(
                        Event::new("SecondEvent").with_action(test_utils::step_speed("Slow", 5.0)),
                    ),
                )),
        );
        scenario.add_story(follow_up).unwrap();
        let mut engine = ScenarioEngine::new(scenario, EngineConfig::default());
        engine.config.movement_enabled = false;

        assert_eq!(engine.tick(0.1).unwrap(), TickOutcome::Completed);
        assert_eq!(engine.scenario().entity("Ego").unwrap().max_speed, 5.0);
    }

    #[test]
    fn state_hash_tracks_progress() {
        let mut a = ego_engine(test_utils::step_speed("Go", 20.0));
        let b = ego_engine(test_utils::step_speed("Go", 20.0));
        assert_eq!(a.state_hash(), b.state_hash());
        a.tick(0.1).unwrap();
        assert_ne!(a.state_hash(), b.state_hash());
    }
}

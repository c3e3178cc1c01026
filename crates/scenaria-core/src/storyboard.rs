//! The six-level behavior hierarchy: Storyboard → Story → Act → Sequence →
//! Maneuver → Event → Action.
//!
//! Nodes carry their static definition as public fields and their run
//! state (`has_started`, `is_completed`, maneuver cursor, ...) behind
//! accessors. Only the walker in [`engine`](crate::engine) and `reset`
//! touch run state.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::condition::{ConditionGroup, reset_groups};
use crate::error::ScenarioError;
use crate::id::{NameKind, normalize_tag};
use crate::sim::StateHash;

// ---------------------------------------------------------------------------
// Element state
// ---------------------------------------------------------------------------

/// Lifecycle of a storyboard element, as seen by conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ElementState {
    #[default]
    Standby,
    Running,
    Complete,
}

impl FromStr for ElementState {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_tag(s).as_str() {
            "standby" | "standbystate" => Ok(ElementState::Standby),
            "running" | "runningstate" => Ok(ElementState::Running),
            "complete" | "completestate" => Ok(ElementState::Complete),
            _ => Err(ScenarioError::unknown_kind("storyboard element state", s)),
        }
    }
}

impl fmt::Display for ElementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ElementState::Standby => "standby",
            ElementState::Running => "running",
            ElementState::Complete => "complete",
        })
    }
}

/// Current state of every element that has left standby.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementStates {
    states: BTreeMap<String, ElementState>,
}

impl ElementStates {
    pub fn new() -> Self {
        Self::default()
    }

    /// State of `name`; elements never seen are in standby.
    pub fn get(&self, name: &str) -> ElementState {
        self.states.get(name).copied().unwrap_or_default()
    }

    pub fn set(&mut self, name: &str, state: ElementState) {
        self.states.insert(name.to_string(), state);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ElementState)> {
        self.states.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }
}

// ---------------------------------------------------------------------------
// Storyboard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StoryboardState {
    #[default]
    Running,
    Stopped,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Storyboard {
    pub stories: Vec<Story>,
    /// When satisfied, the whole run stops.
    pub end_conditions: Vec<ConditionGroup>,
    pub(crate) state: StoryboardState,
}

impl Storyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> StoryboardState {
        self.state
    }

    pub fn is_stopped(&self) -> bool {
        self.state == StoryboardState::Stopped
    }

    pub fn story(&self, name: &str) -> Option<&Story> {
        self.stories.iter().find(|s| s.name == name)
    }

    /// True when every story is complete. Vacuously true with no stories.
    pub fn all_complete(&self) -> bool {
        self.stories.iter().all(|s| s.is_completed)
    }

    /// Reset run state of every node and condition. The stopped flag is
    /// left as is.
    pub fn reset(&mut self) {
        for story in &mut self.stories {
            story.reset();
        }
        reset_groups(&mut self.end_conditions);
    }

    pub fn clear(&mut self) {
        self.stories.clear();
        self.end_conditions.clear();
        self.state = StoryboardState::Running;
    }

    /// Feed node run state into `hash`.
    pub fn hash_into(&self, hash: &mut StateHash) {
        hash.write_bool(self.is_stopped());
        for story in &self.stories {
            hash.write_str(&story.name);
            hash.write_bool(story.has_started);
            hash.write_bool(story.is_completed);
            for act in &story.acts {
                hash.write_bool(act.has_started);
                hash.write_bool(act.is_completed);
                for seq in &act.sequences {
                    hash.write_u64(seq.executions as u64);
                    hash.write_bool(seq.is_completed);
                    for m in &seq.maneuvers {
                        hash.write_u64(m.event_index as u64);
                        hash.write_u64(m.pass_start as u64);
                        hash.write_bool(m.is_completed);
                        for event in &m.events {
                            hash.write_bool(event.has_started);
                            hash.write_bool(event.is_completed);
                            for action in &event.actions {
                                hash.write_bool(action.has_started());
                                hash.write_bool(action.is_completed());
                            }
                        }
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Story
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub name: String,
    /// Entity private actions apply to when a sequence names no actors.
    pub owner: Option<String>,
    pub acts: Vec<Act>,
    pub(crate) has_started: bool,
    pub(crate) is_completed: bool,
}

impl Story {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: None,
            acts: Vec::new(),
            has_started: false,
            is_completed: false,
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_act(mut self, act: Act) -> Self {
        self.acts.push(act);
        self
    }

    pub fn has_started(&self) -> bool {
        self.has_started
    }

    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    /// Every registrable name in this subtree, outer to inner.
    pub fn names(&self) -> Vec<(NameKind, String)> {
        let mut names = vec![(NameKind::Story, self.name.clone())];
        for act in &self.acts {
            names.push((NameKind::Act, act.name.clone()));
            for seq in &act.sequences {
                names.push((NameKind::Sequence, seq.name.clone()));
                for m in &seq.maneuvers {
                    names.push((NameKind::Maneuver, m.name.clone()));
                    for event in &m.events {
                        names.push((NameKind::Event, event.name.clone()));
                        for action in &event.actions {
                            names.push((NameKind::Action, action.name().to_string()));
                            if let Some(trajectory) = action.trajectory_name() {
                                names.push((NameKind::Trajectory, trajectory.to_string()));
                            }
                        }
                    }
                }
            }
        }
        names
    }

    pub fn reset(&mut self) {
        self.has_started = false;
        self.is_completed = false;
        for act in &mut self.acts {
            act.reset();
        }
    }
}

// ---------------------------------------------------------------------------
// Act
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Act {
    pub name: String,
    /// Empty means the act starts unconditionally.
    pub start_conditions: Vec<ConditionGroup>,
    // TODO: evaluate cancel and end groups once act cancellation
    // semantics are settled; they are carried but never read.
    pub cancel_conditions: Vec<ConditionGroup>,
    pub end_conditions: Vec<ConditionGroup>,
    pub sequences: Vec<Sequence>,
    pub(crate) has_started: bool,
    pub(crate) is_completed: bool,
    pub(crate) should_start: bool,
}

impl Act {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start_conditions: Vec::new(),
            cancel_conditions: Vec::new(),
            end_conditions: Vec::new(),
            sequences: Vec::new(),
            has_started: false,
            is_completed: false,
            should_start: false,
        }
    }

    pub fn with_start_group(mut self, group: ConditionGroup) -> Self {
        self.start_conditions.push(group);
        self
    }

    pub fn with_sequence(mut self, sequence: Sequence) -> Self {
        self.sequences.push(sequence);
        self
    }

    pub fn has_started(&self) -> bool {
        self.has_started
    }

    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    pub fn should_start(&self) -> bool {
        self.should_start
    }

    pub fn reset(&mut self) {
        self.has_started = false;
        self.is_completed = false;
        self.should_start = false;
        reset_groups(&mut self.start_conditions);
        reset_groups(&mut self.cancel_conditions);
        reset_groups(&mut self.end_conditions);
        for seq in &mut self.sequences {
            seq.reset();
        }
    }
}

// ---------------------------------------------------------------------------
// Sequence
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    pub name: String,
    /// How many times the maneuvers run back to back.
    pub execution_count: u32,
    pub actors: Vec<String>,
    pub maneuvers: Vec<Maneuver>,
    pub(crate) has_started: bool,
    pub(crate) executions: u32,
    pub(crate) is_completed: bool,
}

impl Sequence {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            execution_count: 1,
            actors: Vec::new(),
            maneuvers: Vec::new(),
            has_started: false,
            executions: 0,
            is_completed: false,
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actors.push(actor.into());
        self
    }

    pub fn with_execution_count(mut self, count: u32) -> Self {
        self.execution_count = count;
        self
    }

    pub fn with_maneuver(mut self, maneuver: Maneuver) -> Self {
        self.maneuvers.push(maneuver);
        self
    }

    pub fn has_started(&self) -> bool {
        self.has_started
    }

    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    /// Completed runs of the maneuver list so far.
    pub fn executions(&self) -> u32 {
        self.executions
    }

    pub fn reset(&mut self) {
        self.has_started = false;
        self.executions = 0;
        self.is_completed = false;
        for m in &mut self.maneuvers {
            m.reset();
        }
    }
}

// ---------------------------------------------------------------------------
// Maneuver
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Maneuver {
    pub name: String,
    pub events: Vec<Event>,
    /// Events passed in this run, across every execution of the owning
    /// sequence.
    pub(crate) event_index: usize,
    /// Value of `event_index` when the current execution began.
    pub(crate) pass_start: usize,
    pub(crate) has_started: bool,
    pub(crate) is_completed: bool,
}

impl Maneuver {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            events: Vec::new(),
            event_index: 0,
            pass_start: 0,
            has_started: false,
            is_completed: false,
        }
    }

    pub fn with_event(mut self, event: Event) -> Self {
        self.events.push(event);
        self
    }

    /// Run-wide event cursor. Never decreases during a run; a repeating
    /// sequence keeps counting up instead of rewinding it.
    pub fn event_index(&self) -> usize {
        self.event_index
    }

    /// Position of the cursor within the current execution, at most
    /// `events.len()`.
    pub fn pass_index(&self) -> usize {
        self.event_index - self.pass_start
    }

    pub fn current_event(&self) -> Option<&Event> {
        self.events.get(self.pass_index())
    }

    /// True once every event of the current execution has completed.
    pub(crate) fn pass_finished(&self) -> bool {
        self.pass_index() >= self.events.len()
    }

    /// Begin another execution: event run state is cleared, the cursor
    /// keeps its value.
    pub(crate) fn replay(&mut self) {
        self.pass_start = self.event_index;
        self.has_started = false;
        self.is_completed = false;
        for event in &mut self.events {
            event.reset();
        }
    }

    pub fn has_started(&self) -> bool {
        self.has_started
    }

    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    pub fn reset(&mut self) {
        self.event_index = 0;
        self.pass_start = 0;
        self.has_started = false;
        self.is_completed = false;
        for event in &mut self.events {
            event.reset();
        }
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// How an event interacts with others already running in its maneuver.
/// Parsed and carried; the single-cursor maneuver does not act on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EventPriority {
    #[default]
    Overwrite,
    Skip,
    Parallel,
}

impl FromStr for EventPriority {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_tag(s).as_str() {
            "overwrite" | "override" => Ok(EventPriority::Overwrite),
            "skip" => Ok(EventPriority::Skip),
            "parallel" => Ok(EventPriority::Parallel),
            _ => Err(ScenarioError::unknown_kind("event priority", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub priority: EventPriority,
    pub start_conditions: Vec<ConditionGroup>,
    /// Unique by name, in insertion order.
    pub actions: Vec<Action>,
    pub(crate) has_started: bool,
    pub(crate) is_completed: bool,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: EventPriority::Overwrite,
            start_conditions: Vec::new(),
            actions: Vec::new(),
            has_started: false,
            is_completed: false,
        }
    }

    pub fn with_priority(mut self, priority: EventPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_start_group(mut self, group: ConditionGroup) -> Self {
        self.start_conditions.push(group);
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name() == name)
    }

    pub fn has_started(&self) -> bool {
        self.has_started
    }

    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    pub fn reset(&mut self) {
        self.has_started = false;
        self.is_completed = false;
        reset_groups(&mut self.start_conditions);
        for action in &mut self.actions {
            action.reset();
        }
    }
}

//! Action definitions.
//!
//! An [`Action`] is a named [`ActionKind`] plus run state. Execution lives
//! in [`runtime`](crate::runtime).

use std::str::FromStr;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::dynamics::{Dynamics, Ramp};
use crate::error::ScenarioError;
use crate::id::normalize_tag;
use crate::parameter::ParameterValue;
use crate::position::Position;

/// A desired value: fixed, or relative to another entity's value at the
/// moment the action starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Target<T> {
    Absolute(T),
    Relative { entity: String, delta: T },
}

impl<T> Target<T> {
    pub fn reference_entity(&self) -> Option<&str> {
        match self {
            Target::Absolute(_) => None,
            Target::Relative { entity, .. } => Some(entity),
        }
    }
}

/// Target speed in m/s.
pub type SpeedTarget = Target<f64>;

/// Target lane id. A relative delta counts lanes, skipping the centre lane.
pub type LaneTarget = Target<i32>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub name: String,
    pub waypoints: Vec<Vector3<f64>>,
}

impl Trajectory {
    pub fn new(name: impl Into<String>, waypoints: Vec<Vector3<f64>>) -> Self {
        Self {
            name: name.into(),
            waypoints,
        }
    }
}

/// How a trajectory is followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrajectoryPurpose {
    /// Drive toward each waypoint at the actor's speed.
    #[default]
    Steering,
    /// Jump one waypoint per tick.
    Positioning,
}

impl FromStr for TrajectoryPurpose {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_tag(s).as_str() {
            "steering" => Ok(TrajectoryPurpose::Steering),
            "positioning" => Ok(TrajectoryPurpose::Positioning),
            _ => Err(ScenarioError::unknown_kind("trajectory purpose", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PrivateAction {
    Speed {
        dynamics: Dynamics,
        target: SpeedTarget,
    },
    LaneChange {
        dynamics: Dynamics,
        target: LaneTarget,
        /// Offset within the target lane once the change completes.
        target_lane_offset: f64,
    },
    LaneOffset {
        dynamics: Dynamics,
        offset: f64,
    },
    Position {
        position: Position,
    },
    FollowTrajectory {
        trajectory: Trajectory,
        purpose: TrajectoryPurpose,
    },
}

impl PrivateAction {
    pub fn variant_name(&self) -> &'static str {
        match self {
            PrivateAction::Speed { .. } => "speed action",
            PrivateAction::LaneChange { .. } => "lane change action",
            PrivateAction::LaneOffset { .. } => "lane offset action",
            PrivateAction::Position { .. } => "teleport action",
            PrivateAction::FollowTrajectory { .. } => "follow trajectory action",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ModifyRule {
    Add(f64),
    Multiply(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GlobalAction {
    ParameterSet {
        parameter: String,
        value: ParameterValue,
    },
    ParameterModify {
        parameter: String,
        rule: ModifyRule,
    },
    Environment,
    EntityAdd { entity: String },
    EntityDelete { entity: String },
    Infrastructure,
    Traffic,
}

/// Opaque command handed to a registered handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomCommand {
    pub command_type: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionKind {
    Private(PrivateAction),
    Global(GlobalAction),
    UserDefined(CustomCommand),
}

/// Per-actor run state of a private action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionProgress {
    pub actor: String,
    pub(crate) ramp: Option<Ramp>,
    pub(crate) target_lane: Option<i32>,
    pub(crate) waypoint: usize,
    pub(crate) done: bool,
}

impl ActionProgress {
    pub(crate) fn new(actor: &str) -> Self {
        Self {
            actor: actor.to_string(),
            ramp: None,
            target_lane: None,
            waypoint: 0,
            done: false,
        }
    }

    /// Signed change the action applies to this actor, if it ramps a value.
    /// For a lane change this is the lateral offset change.
    pub fn span(&self) -> Option<f64> {
        self.ramp.as_ref().map(Ramp::span)
    }

    pub fn target_lane(&self) -> Option<i32> {
        self.target_lane
    }

    /// Index of the next trajectory waypoint.
    pub fn waypoint(&self) -> usize {
        self.waypoint
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub(crate) name: String,
    pub kind: ActionKind,
    pub(crate) has_started: bool,
    pub(crate) is_completed: bool,
    pub(crate) progress: Vec<ActionProgress>,
}

impl Action {
    pub fn new(name: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            name: name.into(),
            kind,
            has_started: false,
            is_completed: false,
            progress: Vec::new(),
        }
    }

    pub fn private(name: impl Into<String>, action: PrivateAction) -> Self {
        Self::new(name, ActionKind::Private(action))
    }

    pub fn global(name: impl Into<String>, action: GlobalAction) -> Self {
        Self::new(name, ActionKind::Global(action))
    }

    pub fn custom(
        name: impl Into<String>,
        command_type: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            ActionKind::UserDefined(CustomCommand {
                command_type: command_type.into(),
                content: content.into(),
            }),
        )
    }

    pub fn speed(name: impl Into<String>, dynamics: Dynamics, target: SpeedTarget) -> Self {
        Self::private(name, PrivateAction::Speed { dynamics, target })
    }

    pub fn lane_change(name: impl Into<String>, dynamics: Dynamics, target: LaneTarget) -> Self {
        Self::private(
            name,
            PrivateAction::LaneChange {
                dynamics,
                target,
                target_lane_offset: 0.0,
            },
        )
    }

    pub fn teleport(name: impl Into<String>, position: Position) -> Self {
        Self::private(name, PrivateAction::Position { position })
    }

    pub fn follow_trajectory(
        name: impl Into<String>,
        trajectory: Trajectory,
        purpose: TrajectoryPurpose,
    ) -> Self {
        Self::private(
            name,
            PrivateAction::FollowTrajectory {
                trajectory,
                purpose,
            },
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_started(&self) -> bool {
        self.has_started
    }

    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    pub fn is_private(&self) -> bool {
        matches!(self.kind, ActionKind::Private(_))
    }

    /// Run state per actor, in actor order. Empty until started; global and
    /// user-defined actions never have any.
    pub fn progress(&self) -> &[ActionProgress] {
        &self.progress
    }

    pub fn progress_for(&self, actor: &str) -> Option<&ActionProgress> {
        self.progress.iter().find(|p| p.actor == actor)
    }

    pub fn trajectory_name(&self) -> Option<&str> {
        match &self.kind {
            ActionKind::Private(PrivateAction::FollowTrajectory { trajectory, .. }) => {
                Some(&trajectory.name)
            }
            _ => None,
        }
    }

    pub fn reset(&mut self) {
        self.has_started = false;
        self.is_completed = false;
        self.progress.clear();
    }
}

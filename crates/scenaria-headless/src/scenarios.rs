//! Built-in demo scenarios.
//!
//! Each demo is assembled through the public `scenaria_core` builder API,
//! the same way a file reader would populate a scenario.

use std::fmt;
use std::str::FromStr;

use nalgebra::Vector3;
use scenaria_core::action::{
    Action, LaneTarget, SpeedTarget, Trajectory, TrajectoryPurpose,
};
use scenaria_core::condition::{
    Condition, ConditionEdge, ConditionGroup, EntityConditionKind, Rule, StateCondition,
    TriggeringRule, ValueCondition,
};
use scenaria_core::dynamics::{Dynamics, DynamicsShape};
use scenaria_core::entity::{Entity, EntityCategory};
use scenaria_core::position::Position;
use scenaria_core::storyboard::{Act, Event, Maneuver, Sequence, Story};
use scenaria_core::{Scenario, ScenarioResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoScenario {
    /// Accelerate, cruise, ease off after a set distance.
    SpeedRamp,
    /// Lead vehicle brakes; ego brakes once the gap closes.
    LeadBrake,
    /// A vehicle in the adjacent lane cuts in ahead of ego.
    CutIn,
    /// Ego steers through a chain of waypoints.
    Trajectory,
}

impl DemoScenario {
    pub const ALL: [DemoScenario; 4] = [
        DemoScenario::SpeedRamp,
        DemoScenario::LeadBrake,
        DemoScenario::CutIn,
        DemoScenario::Trajectory,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DemoScenario::SpeedRamp => "speed_ramp",
            DemoScenario::LeadBrake => "lead_brake",
            DemoScenario::CutIn => "cut_in",
            DemoScenario::Trajectory => "trajectory",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DemoScenario::SpeedRamp => "linear launch to 25 m/s, sinusoidal ease to 10 m/s after 150 m",
            DemoScenario::LeadBrake => "lead brakes at t=2 s, ego brakes when the gap drops under 20 m",
            DemoScenario::CutIn => "vehicle in lane -2 merges into ego's lane after 40 m, then matches its speed",
            DemoScenario::Trajectory => "ego steers around four waypoints at 8 m/s",
        }
    }

    pub fn build(&self) -> ScenarioResult<Scenario> {
        match self {
            DemoScenario::SpeedRamp => speed_ramp(),
            DemoScenario::LeadBrake => lead_brake(),
            DemoScenario::CutIn => cut_in(),
            DemoScenario::Trajectory => trajectory(),
        }
    }
}

impl fmt::Display for DemoScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for DemoScenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "speed_ramp" | "speedramp" => Ok(DemoScenario::SpeedRamp),
            "lead_brake" | "leadbrake" => Ok(DemoScenario::LeadBrake),
            "cut_in" | "cutin" => Ok(DemoScenario::CutIn),
            "trajectory" => Ok(DemoScenario::Trajectory),
            _ => Err(format!("Unknown scenario: {s}")),
        }
    }
}

// ===========================================================================
// Builders
// ===========================================================================

fn single(condition: Condition) -> ConditionGroup {
    ConditionGroup::new().with(condition)
}

fn story(name: &str, owner: &str, act: Act) -> Story {
    Story::new(name).with_owner(owner).with_act(act)
}

fn one_maneuver_act(name: &str, maneuver: Maneuver) -> Act {
    Act::new(name).with_sequence(Sequence::new(format!("{name}Sequence")).with_maneuver(maneuver))
}

fn place(name: &str, x: f64, y: f64) -> Action {
    Action::teleport(
        name,
        Position::World {
            x,
            y,
            z: 0.0,
            heading: Some(0.0),
        },
    )
}

fn set_speed(name: &str, speed: f64) -> Action {
    Action::speed(name, Dynamics::step(), SpeedTarget::Absolute(speed))
}

fn after_termination(name: &str, element: &str) -> Condition {
    Condition::by_state(
        name,
        StateCondition::AfterTermination {
            element: element.into(),
        },
    )
}

fn speed_ramp() -> ScenarioResult<Scenario> {
    let mut scenario = Scenario::new();
    scenario.add_entity(Entity::new("Ego"))?;
    scenario.add_init_action("Ego", place("PlaceEgo", 0.0, 0.0))?;

    let maneuver = Maneuver::new("RampManeuver")
        .with_event(Event::new("Launch").with_action(Action::speed(
            "Accelerate",
            Dynamics::timed(DynamicsShape::Linear, 5.0),
            SpeedTarget::Absolute(25.0),
        )))
        .with_event(
            Event::new("EaseOff")
                .with_start_group(single(Condition::by_entity(
                    "PastMarker",
                    &["Ego"],
                    TriggeringRule::Any,
                    EntityConditionKind::TraveledDistance { value: 150.0 },
                )))
                .with_action(Action::speed(
                    "Decelerate",
                    Dynamics::timed(DynamicsShape::Sinusoidal, 3.0),
                    SpeedTarget::Absolute(10.0),
                )),
        );
    scenario.add_story(story("RampStory", "Ego", one_maneuver_act("RampAct", maneuver)))?;
    scenario.add_end_condition_group(single(after_termination("RampDone", "RampStory").with_delay(1.0)));
    Ok(scenario)
}

fn lead_brake() -> ScenarioResult<Scenario> {
    let mut scenario = Scenario::new();
    scenario.add_entity(Entity::new("Ego"))?;
    scenario.add_entity(Entity::new("Lead"))?;
    scenario.add_init_action("Ego", place("PlaceEgo", 0.0, 0.0))?;
    scenario.add_init_action("Ego", set_speed("EgoCruise", 20.0))?;
    scenario.add_init_action(
        "Lead",
        Action::teleport(
            "PlaceLead",
            Position::RelativeObject {
                entity: "Ego".into(),
                dx: 40.0,
                dy: 0.0,
                dz: 0.0,
            },
        ),
    )?;
    scenario.add_init_action("Lead", set_speed("LeadCruise", 20.0))?;

    let lead = Maneuver::new("LeadManeuver").with_event(
        Event::new("LeadBrakes")
            .with_start_group(single(Condition::by_value(
                "BrakeTime",
                ValueCondition::SimulationTime {
                    value: 2.0,
                    rule: Rule::GreaterThan,
                },
            )))
            .with_action(Action::speed(
                "LeadStop",
                Dynamics::timed(DynamicsShape::Linear, 3.0),
                SpeedTarget::Absolute(0.0),
            )),
    );
    let ego = Maneuver::new("EgoManeuver").with_event(
        Event::new("EgoBrakes")
            .with_start_group(single(Condition::by_entity(
                "GapClosing",
                &["Ego"],
                TriggeringRule::Any,
                EntityConditionKind::RelativeDistance {
                    entity: "Lead".into(),
                    value: 20.0,
                    rule: Rule::LessThan,
                },
            )))
            .with_action(Action::speed(
                "EgoStop",
                Dynamics::timed(DynamicsShape::Cubic, 2.0),
                SpeedTarget::Absolute(0.0),
            )),
    );
    scenario.add_story(story("LeadStory", "Lead", one_maneuver_act("LeadAct", lead)))?;
    scenario.add_story(story("EgoStory", "Ego", one_maneuver_act("EgoAct", ego)))?;
    scenario.add_end_condition_group(single(Condition::by_entity(
        "EgoStopped",
        &["Ego"],
        TriggeringRule::Any,
        EntityConditionKind::StandStill { duration: 1.0 },
    )));
    Ok(scenario)
}

fn cut_in() -> ScenarioResult<Scenario> {
    let mut scenario = Scenario::new();
    scenario.add_entity(Entity::new("Ego").with_lane(1, -1, 0.0))?;
    scenario.add_entity(
        Entity::new("Cutter")
            .with_category(EntityCategory::Vehicle)
            .with_lane(1, -2, 0.0),
    )?;
    scenario.add_init_action("Ego", set_speed("EgoCruise", 15.0))?;
    scenario.add_init_action(
        "Cutter",
        Action::teleport(
            "PlaceCutter",
            Position::RelativeLane {
                entity: "Ego".into(),
                d_lane: -1,
                ds: 10.0,
                offset: 0.0,
            },
        ),
    )?;
    scenario.add_init_action("Cutter", set_speed("CutterCruise", 20.0))?;

    let maneuver = Maneuver::new("CutInManeuver")
        .with_event(
            Event::new("ChangeLane")
                .with_start_group(single(
                    Condition::by_entity(
                        "CutterAhead",
                        &["Cutter"],
                        TriggeringRule::Any,
                        EntityConditionKind::TraveledDistance { value: 40.0 },
                    )
                    .with_edge(ConditionEdge::Rising),
                ))
                .with_action(Action::lane_change(
                    "MergeLeft",
                    Dynamics::timed(DynamicsShape::Sinusoidal, 3.0),
                    LaneTarget::Relative {
                        entity: "Ego".into(),
                        delta: 0,
                    },
                )),
        )
        .with_event(Event::new("MatchSpeed").with_action(Action::speed(
            "CutterSlow",
            Dynamics::at_rate(DynamicsShape::Linear, 2.0),
            SpeedTarget::Relative {
                entity: "Ego".into(),
                delta: 0.0,
            },
        )));
    scenario.add_story(story("CutInStory", "Cutter", one_maneuver_act("CutInAct", maneuver)))?;
    scenario.add_end_condition_group(single(
        after_termination("CutInDone", "CutInStory").with_delay(2.0),
    ));
    Ok(scenario)
}

fn trajectory() -> ScenarioResult<Scenario> {
    let mut scenario = Scenario::new();
    scenario.add_entity(Entity::new("Ego").with_speed(8.0))?;
    scenario.add_init_action("Ego", place("PlaceEgo", 0.0, 0.0))?;

    let waypoints = vec![
        Vector3::new(20.0, 0.0, 0.0),
        Vector3::new(20.0, 20.0, 0.0),
        Vector3::new(0.0, 20.0, 0.0),
        Vector3::new(0.0, 0.0, 0.0),
    ];
    let maneuver = Maneuver::new("LoopManeuver").with_event(
        Event::new("Loop").with_action(Action::follow_trajectory(
            "FollowLoop",
            Trajectory::new("Square", waypoints),
            TrajectoryPurpose::Steering,
        )),
    );
    scenario.add_story(story("LoopStory", "Ego", one_maneuver_act("LoopAct", maneuver)))?;
    scenario.add_end_condition_group(single(after_termination("LoopDone", "FollowLoop")));
    Ok(scenario)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenaria_core::validation::validate;

    #[test]
    fn names_round_trip() {
        for demo in DemoScenario::ALL {
            assert_eq!(demo.name().parse::<DemoScenario>().unwrap(), demo);
        }
        assert_eq!("CutIn".parse::<DemoScenario>().unwrap(), DemoScenario::CutIn);
        assert!("nope".parse::<DemoScenario>().is_err());
    }

    #[test]
    fn every_demo_builds_and_validates() {
        for demo in DemoScenario::ALL {
            let scenario = demo.build().unwrap();
            assert!(validate(&scenario).is_empty(), "{demo}");
        }
    }
}

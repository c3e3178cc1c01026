//! Runs a demo scenario to completion and reports on it.

use std::cell::Cell;
use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, info, warn};

use scenaria_core::clock::Clock;
use scenaria_core::config::EngineConfig;
use scenaria_core::event::ScenarioEvent;
use scenaria_core::validation::validate;
use scenaria_core::{ScenarioEngine, TickOutcome};

use crate::error::RunError;
use crate::scenarios::DemoScenario;

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Upper bound on ticks per run.
    pub max_ticks: u64,
    /// Step length in seconds.
    pub step: f64,
    pub config: EngineConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntitySummary {
    pub name: String,
    pub speed: f64,
    pub lane_id: i32,
    pub lane_offset: f64,
    pub distance_travelled: f64,
    pub position: [f64; 3],
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub scenario: String,
    pub ticks_run: u64,
    pub elapsed_secs: f64,
    pub outcome: String,
    pub stories_completed: usize,
    pub stories_total: usize,
    pub events_delivered: usize,
    pub state_hash: String,
    pub entities: Vec<EntitySummary>,
}

/// Two runs of the same scenario and whether their hashes agree.
#[derive(Debug, Clone, Serialize)]
pub struct CheckedRun {
    pub report: RunReport,
    pub deterministic: bool,
}

pub fn run_once(demo: DemoScenario, options: &RunOptions) -> Result<RunReport, RunError> {
    let scenario = demo.build()?;
    let issues = validate(&scenario);
    if !issues.is_empty() {
        for issue in &issues {
            warn!(scenario = %demo, "{issue}");
        }
        return Err(RunError::Invalid {
            scenario: demo.to_string(),
            issues: issues.len(),
        });
    }

    // Keep the final state inspectable after the storyboard stops.
    let config = EngineConfig {
        reset_on_stop: false,
        ..options.config.clone()
    };
    let mut engine = ScenarioEngine::new(scenario, config);

    let delivered = Rc::new(Cell::new(0usize));
    let counter = Rc::clone(&delivered);
    engine.on_event(Box::new(move |event: &ScenarioEvent| {
        counter.set(counter.get() + 1);
        debug!(tick = event.tick(), kind = ?event.kind(), element = event.element(), "event");
    }));

    engine.perform_init_actions()?;
    let mut outcome = TickOutcome::Running;
    let mut ticks_run = 0;
    while ticks_run < options.max_ticks {
        outcome = engine.tick(options.step)?;
        ticks_run += 1;
        if outcome == TickOutcome::Stopped {
            break;
        }
    }
    info!(scenario = %demo, ticks_run, ?outcome, "run finished");

    let storyboard = engine.scenario().storyboard();
    let entities = engine
        .scenario()
        .entities()
        .iter()
        .map(|entity| {
            let p = engine.positions().position(entity.name()).unwrap_or_default();
            EntitySummary {
                name: entity.name().to_string(),
                speed: entity.speed,
                lane_id: entity.lane_id,
                lane_offset: entity.lane_offset,
                distance_travelled: entity.distance_travelled,
                position: [p.x, p.y, p.z],
            }
        })
        .collect();

    Ok(RunReport {
        scenario: demo.to_string(),
        ticks_run,
        elapsed_secs: engine.clock().elapsed_seconds(),
        outcome: format!("{outcome:?}"),
        stories_completed: storyboard.stories.iter().filter(|s| s.is_completed()).count(),
        stories_total: storyboard.stories.len(),
        events_delivered: delivered.get(),
        state_hash: format!("{:016x}", engine.state_hash()),
        entities,
    })
}

/// Run twice and compare final state hashes.
pub fn run_checked(demo: DemoScenario, options: &RunOptions) -> Result<CheckedRun, RunError> {
    let first = run_once(demo, options)?;
    let second = run_once(demo, options)?;
    let deterministic = first.state_hash == second.state_hash;
    if !deterministic {
        warn!(
            scenario = %demo,
            first = %first.state_hash,
            second = %second.state_hash,
            "state hash mismatch between identical runs"
        );
    }
    Ok(CheckedRun {
        report: first,
        deterministic,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn options() -> RunOptions {
        RunOptions {
            max_ticks: 1200,
            step: 0.05,
            config: EngineConfig::default(),
        }
    }

    #[test]
    fn every_demo_is_deterministic() {
        for demo in DemoScenario::ALL {
            let checked = run_checked(demo, &options()).unwrap();
            assert!(checked.deterministic, "{demo}");
        }
    }

    #[test]
    fn trajectory_demo_closes_the_loop() {
        let report = run_once(DemoScenario::Trajectory, &options()).unwrap();
        assert_eq!(report.outcome, "Stopped");
        assert_eq!(report.stories_completed, 1);
        // Waypoints within the arrival tolerance are cut, so the path is a
        // little short of the full 80 m square.
        let ego = &report.entities[0];
        assert!(ego.distance_travelled > 75.0 && ego.distance_travelled < 82.0);
        assert!(ego.position[0].hypot(ego.position[1]) < 1.5);
    }

    #[test]
    fn lead_brake_demo_stops_the_ego() {
        let report = run_once(DemoScenario::LeadBrake, &options()).unwrap();
        assert_eq!(report.outcome, "Stopped");
        let ego = report.entities.iter().find(|e| e.name == "Ego").unwrap();
        assert_eq!(ego.speed, 0.0);
    }

    #[test]
    fn cut_in_demo_ends_in_ego_lane() {
        let report = run_once(DemoScenario::CutIn, &options()).unwrap();
        assert_eq!(report.outcome, "Stopped");
        let cutter = report.entities.iter().find(|e| e.name == "Cutter").unwrap();
        assert_eq!(cutter.lane_id, -1);
        assert_relative_eq!(cutter.speed, 15.0, epsilon = 1e-9);
    }
}

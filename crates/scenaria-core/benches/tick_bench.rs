//! Criterion benchmarks for the scenario engine.
//!
//! Two benchmark groups:
//! - `wide_storyboard`: 50 vehicles, one story each with a three-event
//!   maneuver and time-triggered events
//! - `condition_heavy`: one act guarded by 200 distance conditions that
//!   never pass, so every tick re-evaluates all of them

use criterion::{Criterion, criterion_group, criterion_main};
use scenaria_core::condition::ConditionGroup;
use scenaria_core::config::EngineConfig;
use scenaria_core::storyboard::{Act, Event, Maneuver, Sequence, Story};
use scenaria_core::test_utils::*;
use scenaria_core::{Scenario, ScenarioEngine};

// ===========================================================================
// Scenario builders
// ===========================================================================

fn build_wide_storyboard() -> ScenarioEngine {
    let mut scenario = Scenario::new();
    for i in 0..50 {
        let name = format!("Car{i}");
        scenario.add_entity(vehicle(&name, 10.0)).unwrap();
        let mut maneuver = Maneuver::new(format!("Man{i}"));
        for e in 0..3 {
            maneuver = maneuver.with_event(
                Event::new(format!("Ev{i}_{e}"))
                    .with_start_group(group(after_seconds(&format!("At{i}_{e}"), e as f64 * 20.0)))
                    .with_action(linear_speed(&format!("Ramp{i}_{e}"), 5.0 + e as f64, 10.0)),
            );
        }
        scenario
            .add_story(Story::new(format!("Story{i}")).with_owner(&name).with_act(
                Act::new(format!("Act{i}"))
                    .with_sequence(Sequence::new(format!("Seq{i}")).with_maneuver(maneuver)),
            ))
            .unwrap();
    }
    ScenarioEngine::new(scenario, EngineConfig::default())
}

fn build_condition_heavy() -> ScenarioEngine {
    let mut scenario = Scenario::new();
    scenario.add_entity(vehicle("Ego", 10.0)).unwrap();
    let mut start = ConditionGroup::new();
    for i in 0..200 {
        start = start
            .with(traveled(&format!("Far{i}"), "Ego", 1e12))
            .with(never(&format!("Never{i}")));
    }
    scenario
        .add_story(Story::new("Story").with_owner("Ego").with_act(
            Act::new("Act").with_start_group(start).with_sequence(
                Sequence::new("Seq").with_maneuver(
                    Maneuver::new("Man")
                        .with_event(Event::new("Ev").with_action(step_speed("Stop", 0.0))),
                ),
            ),
        ))
        .unwrap();
    ScenarioEngine::new(scenario, EngineConfig::default())
}

// ===========================================================================
// Benchmarks
// ===========================================================================

fn bench_wide_storyboard(c: &mut Criterion) {
    let mut engine = build_wide_storyboard();
    c.bench_function("wide_storyboard_tick", |b| b.iter(|| engine.tick(0.05).unwrap()));
}

fn bench_condition_heavy(c: &mut Criterion) {
    let mut engine = build_condition_heavy();
    c.bench_function("condition_heavy_tick", |b| b.iter(|| engine.tick(0.05).unwrap()));
}

criterion_group!(benches, bench_wide_storyboard, bench_condition_heavy);
criterion_main!(benches);

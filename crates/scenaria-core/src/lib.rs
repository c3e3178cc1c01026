//! Scenaria Core -- a tick-driven execution engine for storyboard-style
//! driving scenarios.
//!
//! A [`scenario::Scenario`] holds entities, parameters and a storyboard:
//! stories contain acts, acts contain sequences, sequences contain
//! maneuvers, maneuvers contain events, and events contain actions. The
//! [`engine::ScenarioEngine`] advances an external [`clock::Clock`] and walks
//! the storyboard once per tick, evaluating trigger conditions and
//! progressing actions that modify entity state.
//!
//! # Tick Pipeline
//!
//! Each call to [`engine::ScenarioEngine::tick`] runs:
//!
//! 1. **Clock** -- Advance simulated time by `dt`.
//! 2. **Init** -- Update init actions that have not finished.
//! 3. **End check** -- Stop the storyboard if its end conditions hold.
//! 4. **Walk** -- Visit stories in order; start acts and events whose
//!    condition groups pass, update running actions, cascade completion.
//! 5. **Movement** -- Let the movement model advance entities.
//! 6. **Delivery** -- Hand the tick's [`event::ScenarioEvent`]s to listeners.
//!
//! ```rust,ignore
//! let mut scenario = Scenario::new();
//! scenario.add_entity(Entity::new("Ego").with_speed(10.0))?;
//! scenario.add_story(story)?;
//! let mut engine = ScenarioEngine::new(scenario, EngineConfig::default());
//! engine.perform_init_actions()?;
//! while engine.tick(0.05)? == TickOutcome::Running {}
//! ```
//!
//! # Key Types
//!
//! - [`engine::ScenarioEngine`] -- Owns the scenario and collaborators.
//! - [`condition::Condition`] -- Latched trigger with delay and edge.
//! - [`action::Action`] -- Private, global or user-defined behaviour.
//! - [`dynamics::Ramp`] -- Interpolated transition over time or distance.
//! - [`registry::NameRegistry`] -- Per-kind unique names.
//! - [`serialize`] -- Versioned snapshots via bitcode.

pub mod action;
pub mod clock;
pub mod condition;
pub mod config;
pub mod dynamics;
pub mod engine;
pub mod entity;
pub mod error;
pub mod event;
pub mod id;
pub mod movement;
pub mod parameter;
pub mod position;
pub mod registry;
pub mod road;
pub mod runtime;
pub mod scenario;
pub mod serialize;
pub mod sim;
pub mod storyboard;
pub mod validation;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use engine::ScenarioEngine;
pub use error::{ScenarioError, ScenarioResult};
pub use scenario::Scenario;
pub use sim::TickOutcome;

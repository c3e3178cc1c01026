//! Engine configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunables for a [`ScenarioEngine`](crate::engine::ScenarioEngine).
/// Missing TOML keys take their default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Step length used by `advance` and the headless runner, seconds.
    pub fixed_step_secs: f64,
    /// Run a reset as soon as the storyboard stops.
    pub reset_on_stop: bool,
    /// Distance at which a trajectory waypoint counts as reached, metres.
    pub arrival_tolerance: f64,
    /// Advance entities with the movement model after the storyboard walk.
    pub movement_enabled: bool,
    /// Events buffered per tick before the oldest are dropped.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fixed_step_secs: 0.05,
            reset_on_stop: true,
            arrival_tolerance: 0.5,
            movement_enabled: true,
            event_capacity: 1024,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.fixed_step_secs > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "fixed_step_secs must be positive, got {}",
                self.fixed_step_secs
            )));
        }
        if self.arrival_tolerance < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "arrival_tolerance must not be negative, got {}",
                self.arrival_tolerance
            )));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid("event_capacity must be at least 1".into()));
        }
        Ok(())
    }
}

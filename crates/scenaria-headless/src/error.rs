use std::path::PathBuf;

use scenaria_core::config::ConfigError;
use scenaria_core::ScenarioError;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("scenario error: {0}")]
    Scenario(#[from] ScenarioError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unknown scenario '{0}' (use --list to see the built-in ones)")]
    UnknownScenario(String),
    #[error("scenario '{scenario}' failed validation with {issues} issue(s)")]
    Invalid { scenario: String, issues: usize },
    #[error("report encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure mode during startup and the run, so
//! `main` can propagate with `?`.

use std::path::PathBuf;

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: botengine_core::ConfigError,
    },

    /// The agent script could not be read.
    #[error("failed to read script {}: {source}", path.display())]
    Script {
        /// Script location.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Agent spawning failed.
    #[error("spawner error: {message}")]
    Spawner {
        /// Description of the spawner failure.
        message: String,
    },

    /// The scheduler run failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: botengine_core::RunnerError,
    },
}

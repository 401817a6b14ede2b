//! Run directories: artifacts and the per-run JSON log.

mod logging;
mod run;

pub use logging::init_logging;
pub use run::{RunContext, start_run, write_generation_report, write_validation};

use thiserror::Error;

/// Failure writing run artifacts or installing the log subscriber.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("io error writing run artifacts: {0}")]
    Io(#[from] std::io::Error),
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("logging setup failed: {0}")]
    Logging(String),
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

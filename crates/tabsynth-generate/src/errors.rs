use thiserror::Error;

/// Errors emitted by the generation engine.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Schema, reference or cycle error detected before generation.
    #[error(transparent)]
    Schema(#[from] tabsynth_core::Error),
    /// A hard constraint cannot be met for the requested row count.
    #[error("constraint violation at {path}: {message}")]
    ConstraintViolation { path: String, message: String },
    #[error("invalid plan: {0}")]
    InvalidPlan(String),
    #[error("generation cancelled")]
    Cancelled,
    #[error("generation task panicked at {path}: {message}")]
    Panicked { path: String, message: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl GenerationError {
    pub fn constraint(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Short machine-readable code used in reports.
    pub fn code(&self) -> &'static str {
        match self {
            GenerationError::Schema(tabsynth_core::Error::SchemaViolation { .. }) => {
                "schema_violation"
            }
            GenerationError::Schema(tabsynth_core::Error::CyclicReference { .. }) => {
                "cyclic_reference"
            }
            GenerationError::Schema(tabsynth_core::Error::MissingReference { .. }) => {
                "missing_reference"
            }
            GenerationError::Schema(_) => "schema_error",
            GenerationError::ConstraintViolation { .. } => "constraint_violation",
            GenerationError::InvalidPlan(_) => "invalid_plan",
            GenerationError::Cancelled => "cancelled",
            GenerationError::Panicked { .. } => "panicked",
            GenerationError::Io(_) => "io",
            GenerationError::Json(_) => "json",
            GenerationError::Csv(_) => "csv",
        }
    }
}

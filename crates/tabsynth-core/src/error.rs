use thiserror::Error;

/// Core error type shared across tabsynth crates.
#[derive(Debug, Error)]
pub enum Error {
    /// The schema is self-contradictory; detected before any generation.
    #[error("schema violation at {path}: {message}")]
    SchemaViolation { path: String, message: String },
    /// The table dependency graph contains a cycle.
    #[error("cyclic reference between tables: {}", tables.join(", "))]
    CyclicReference { tables: Vec<String> },
    /// A foreign key points at a table or column that is not declared.
    #[error("missing reference at {path}: {message}")]
    MissingReference { path: String, message: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn schema_violation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaViolation {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn missing_reference(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MissingReference {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Convenience alias for results returned by tabsynth crates.
pub type Result<T> = std::result::Result<T, Error>;

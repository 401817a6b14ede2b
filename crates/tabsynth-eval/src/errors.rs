use thiserror::Error;

/// Errors emitted by the validator.
///
/// Statistical deviations are never errors; they are findings in the
/// [`ValidationReport`](crate::ValidationReport).
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Schema(#[from] tabsynth_core::Error),
    /// The table cannot have come from a correct generator for this schema.
    #[error("structural violation at {path} ({constraint}): {message}")]
    Structural {
        path: String,
        constraint: String,
        message: String,
    },
}

impl ValidationError {
    pub fn structural(
        path: impl Into<String>,
        constraint: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Structural {
            path: path.into(),
            constraint: constraint.into(),
            message: message.into(),
        }
    }
}

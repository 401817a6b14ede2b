//! Validation of generated tables against their schema.
//!
//! Structural problems (a value no correct generator could emit) are raised
//! as [`ValidationError`]; statistical deviations are findings in a
//! [`ValidationReport`] that fail the column without raising.

pub mod engine;
pub mod errors;
pub mod metrics;
pub mod model;
pub mod report;
pub mod stats;

pub use engine::{Validator, validate, validate_multi, validate_with_references};
pub use errors::ValidationError;
pub use metrics::{CheckResult, ColumnReport, ValidationReport};
pub use model::{Tolerances, ValidationOptions, Violation, WarningItem};
pub use report::render_report;
pub use stats::ObservedStats;

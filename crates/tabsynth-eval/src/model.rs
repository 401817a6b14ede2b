use serde::{Deserialize, Serialize};

/// Tolerance bands for statistical comparisons.
///
/// Every band is the larger of a fixed allowance and `sigma` standard errors
/// of the observed statistic, so small samples are not failed for noise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerances {
    /// Allowed `|observed - expected| / expected` per categorical value.
    pub categorical_relative: f64,
    /// Absolute floor for categorical proportions.
    pub categorical_absolute: f64,
    /// Allowed mean deviation as a fraction of `max(|mean|, std_dev)`.
    pub mean_relative: f64,
    /// Allowed standard deviation error as a fraction of the declared value.
    pub std_dev_relative: f64,
    /// Absolute floor for null-rate deviations.
    pub null_absolute: f64,
    /// Standard errors allowed on top of the fixed bands.
    pub sigma: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            categorical_relative: 0.10,
            categorical_absolute: 0.01,
            mean_relative: 0.10,
            std_dev_relative: 0.25,
            null_absolute: 0.02,
            sigma: 4.0,
        }
    }
}

/// Options for validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationOptions {
    pub tolerances: Tolerances,
    /// Row count the table should have; a mismatch is reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_rows: Option<u64>,
    /// Cap on entries kept in each of a report's violation and warning lists.
    pub max_examples: usize,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            tolerances: Tolerances::default(),
            expected_rows: None,
            max_examples: 20,
        }
    }
}

/// Structured finding that fails a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub code: String,
    pub path: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_index: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
}

/// Structured finding that does not affect validity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarningItem {
    pub code: String,
    pub path: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

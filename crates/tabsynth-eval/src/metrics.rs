use serde::{Deserialize, Serialize};

use crate::model::{Violation, WarningItem};
use crate::stats::ObservedStats;

/// Validation outcome for one generated table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub table: String,
    pub row_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_rows: Option<u64>,
    /// True when no column failed and no violation was found.
    pub is_valid: bool,
    pub columns: Vec<ColumnReport>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub violations: Vec<Violation>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<WarningItem>,
    /// Findings dropped once a list reached `max_examples`.
    #[serde(skip_serializing_if = "is_zero", default)]
    pub omitted_findings: u64,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

impl ValidationReport {
    pub fn column(&self, name: &str) -> Option<&ColumnReport> {
        self.columns.iter().find(|column| column.column == name)
    }

    pub fn failed_columns(&self) -> impl Iterator<Item = &ColumnReport> {
        self.columns.iter().filter(|column| !column.passed)
    }
}

/// Per-column comparison of observed against declared statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnReport {
    pub column: String,
    /// Generation variant of the column (`primary_key`, `numeric`, ...).
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub passed: bool,
    pub observed: ObservedStats,
    pub checks: Vec<CheckResult>,
}

impl ColumnReport {
    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|check| check.check == name)
    }
}

/// One comparison inside a column report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Check name, e.g. `mean`, `null_rate` or `frequency[gold]`.
    pub check: String,
    pub expected: f64,
    pub observed: f64,
    /// Allowed absolute deviation; absent for exact or one-sided checks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<f64>,
    pub passed: bool,
}

impl CheckResult {
    /// Passes when `|observed - expected| <= tolerance`.
    pub fn within(check: impl Into<String>, expected: f64, observed: f64, tolerance: f64) -> Self {
        Self {
            check: check.into(),
            expected,
            observed,
            tolerance: Some(tolerance),
            passed: (observed - expected).abs() <= tolerance + f64::EPSILON,
        }
    }

    /// Passes when `observed <= expected`.
    pub fn at_most(check: impl Into<String>, expected: f64, observed: f64) -> Self {
        Self {
            check: check.into(),
            expected,
            observed,
            tolerance: None,
            passed: observed <= expected,
        }
    }
}

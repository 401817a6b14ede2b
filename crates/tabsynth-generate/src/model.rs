use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tabsynth_core::Value;

use crate::cancel::CancellationToken;
use crate::errors::GenerationError;

/// Options for the generation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateOptions {
    /// Run-level seed; drawn from OS entropy when absent.
    pub seed: Option<u64>,
    /// Generate columns (and tables within a dependency level) on scoped threads.
    pub parallel: bool,
    /// Re-draws allowed for an out-of-bounds normal sample before clamping.
    pub max_truncation_attempts: u32,
    #[serde(skip)]
    pub cancellation: Option<CancellationToken>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            seed: None,
            parallel: true,
            max_truncation_attempts: 16,
            cancellation: None,
        }
    }
}

impl GenerateOptions {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }

    pub(crate) fn run_seed(&self) -> u64 {
        self.seed.unwrap_or_else(rand::random)
    }
}

/// Requested row counts for a multi-table run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowPlan {
    pub default_rows: u64,
    #[serde(default)]
    pub per_table: BTreeMap<String, u64>,
}

impl RowPlan {
    pub fn uniform(rows: u64) -> Self {
        Self {
            default_rows: rows,
            per_table: BTreeMap::new(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>, rows: u64) -> Self {
        self.per_table.insert(table.into(), rows);
        self
    }

    pub fn rows_for(&self, table: &str) -> u64 {
        self.per_table
            .get(table)
            .copied()
            .unwrap_or(self.default_rows)
    }
}

/// One generated table; immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedTable {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    primary_key: Option<String>,
    seed: u64,
    clamped: BTreeMap<String, u64>,
}

impl GeneratedTable {
    /// Build a table from row-major values, checking row widths.
    pub fn from_rows(
        name: impl Into<String>,
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
        primary_key: Option<String>,
    ) -> Result<Self, GenerationError> {
        let name = name.into();
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(GenerationError::InvalidPlan(format!(
                "row {idx} of '{name}' has {} values for {} columns",
                row.len(),
                columns.len()
            )));
        }
        Ok(Self {
            name,
            columns,
            rows,
            primary_key,
            seed: 0,
            clamped: BTreeMap::new(),
        })
    }

    /// Zip column-major outputs into rows.
    pub(crate) fn from_columns(
        name: String,
        columns: Vec<(String, Vec<Value>)>,
        primary_key: Option<String>,
        seed: u64,
        clamped: BTreeMap<String, u64>,
    ) -> Self {
        let row_count = columns
            .iter()
            .map(|(_, values)| values.len())
            .min()
            .unwrap_or(0);
        let mut names = Vec::with_capacity(columns.len());
        let mut iters = Vec::with_capacity(columns.len());
        for (column, values) in columns {
            names.push(column);
            iters.push(values.into_iter());
        }

        let mut rows = Vec::with_capacity(row_count);
        for _ in 0..row_count {
            rows.push(iters.iter_mut().filter_map(Iterator::next).collect());
        }

        Self {
            name,
            columns: names,
            rows,
            primary_key,
            seed,
            clamped,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    /// Run seed the table was generated with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Per-column count of samples clamped to a bound after exhausting re-draws.
    pub fn clamped(&self) -> &BTreeMap<String, u64> {
        &self.clamped
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }

    /// Values of one column in row order.
    pub fn column_values(&self, column: &str) -> Option<impl Iterator<Item = &Value>> {
        let idx = self.column_index(column)?;
        Some(self.rows.iter().filter_map(move |row| row.get(idx)))
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|values| values.get(idx))
    }
}

/// Why a table in a multi-table run has no output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    ConstraintViolation { path: String, message: String },
    UpstreamFailed { table: String },
    Error { code: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableFailure {
    pub table: String,
    #[serde(flatten)]
    pub reason: FailureReason,
}

/// Summary of a generated table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableReport {
    pub table: String,
    pub rows_requested: u64,
    pub rows_generated: u64,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub clamped_values: BTreeMap<String, u64>,
}

/// Report for a generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub seed: u64,
    pub tables: Vec<TableReport>,
    pub failures: Vec<TableFailure>,
    /// Tables never started because the run was cancelled.
    pub pending: Vec<String>,
    pub cancelled: bool,
    pub duration_ms: u64,
}

impl GenerationReport {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            tables: Vec::new(),
            failures: Vec::new(),
            pending: Vec::new(),
            cancelled: false,
            duration_ms: 0,
        }
    }

    pub fn clamped_total(&self) -> u64 {
        self.tables
            .iter()
            .flat_map(|table| table.clamped_values.values())
            .sum()
    }
}

/// Output of a multi-table run.
///
/// When the run was cancelled or a table failed this is a partial result:
/// completed tables stay available and `report` says what is missing.
#[derive(Debug, Clone)]
pub struct MultiTableOutput {
    pub tables: Vec<GeneratedTable>,
    pub report: GenerationReport,
}

impl MultiTableOutput {
    pub fn is_complete(&self) -> bool {
        !self.report.cancelled && self.report.failures.is_empty() && self.report.pending.is_empty()
    }

    pub fn table(&self, name: &str) -> Option<&GeneratedTable> {
        self.tables.iter().find(|table| table.name() == name)
    }

    pub fn seed(&self) -> u64 {
        self.report.seed
    }
}

//! Table exporters.

pub mod csv;
pub mod json;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::GenerationError;
use crate::model::GeneratedTable;

/// File format for exported tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

/// Write `table` into `dir` as `<table>.<ext>`; returns the path and bytes written.
pub fn write_table(
    dir: &Path,
    table: &GeneratedTable,
    format: OutputFormat,
) -> Result<(PathBuf, u64), GenerationError> {
    let path = dir.join(format!("{}.{}", table.name(), format.extension()));
    let bytes = match format {
        OutputFormat::Csv => csv::write_table_csv(&path, table)?,
        OutputFormat::Json => json::write_table_json(&path, table)?,
    };
    Ok((path, bytes))
}

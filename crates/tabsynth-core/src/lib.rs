//! Core contracts for tabsynth.
//!
//! This crate defines the schema file model, the typed cell [`Value`], and the
//! resolution step that turns a [`TableSchema`] into the closed per-column
//! model consumed by the generator and the validator.

pub mod error;
pub mod graph;
pub mod load;
pub mod resolve;
pub mod schema;
pub mod types;
pub mod validation;
pub mod value;

pub use error::{Error, Result};
pub use graph::{DependencyReport, DependencySummary, build_dependency_report};
pub use load::{load_schema_files, parse_schemas};
pub use resolve::{
    CategoricalSpec, ColumnKind, ColumnPlan, KeySpec, NumericShape, NumericSpec, ReferenceSpec,
    ResolvedTable, WeightedValue, resolve_table,
};
pub use schema::{ColumnReference, ColumnSpec, NumericalStats, TableSchema};
pub use types::DataType;
pub use validation::{ResolvedSchema, resolve_schemas};
pub use value::Value;

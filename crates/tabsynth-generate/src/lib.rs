//! Synthetic row generation for tabsynth.
//!
//! A [`TableSchema`](tabsynth_core::TableSchema) is resolved into one
//! generator per column; [`generate`] builds a single table and
//! [`generate_multi`] builds a set of related tables in dependency order,
//! feeding each table's primary keys to the foreign keys that reference it.
//! Output is deterministic for a given seed.

pub mod cancel;
pub mod coordinator;
pub mod engine;
pub mod errors;
pub mod foreign;
pub mod generators;
pub mod model;
pub mod output;
pub mod planner;

pub use cancel::CancellationToken;
pub use coordinator::{MultiTableCoordinator, generate_multi};
pub use engine::{TableGenerator, generate};
pub use errors::GenerationError;
pub use foreign::ReferenceRegistry;
pub use model::{
    FailureReason, GenerateOptions, GeneratedTable, GenerationReport, MultiTableOutput, RowPlan,
    TableFailure, TableReport,
};
pub use output::{OutputFormat, write_table};

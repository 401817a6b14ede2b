//! Per-column value generators.
//!
//! Each [`ColumnKind`] maps to exactly one generator; null injection wraps
//! the chosen generator when the column has a positive null rate.

pub mod categorical;
pub mod constant;
pub mod nulls;
pub mod numeric;
pub mod primary_key;
pub mod reference;

use rand::RngCore;
use tabsynth_core::{ColumnKind, ColumnPlan, Error as CoreError, Value};

use crate::errors::GenerationError;
use crate::foreign::ReferenceRegistry;
use crate::model::GenerateOptions;

use categorical::CategoricalGenerator;
use constant::ConstantGenerator;
use nulls::NullInjector;
use numeric::NumericGenerator;
use primary_key::PrimaryKeyGenerator;
use reference::ReferenceGenerator;

/// Largest number of rows reserved up front; longer columns grow on demand.
pub(crate) const MAX_PREALLOCATED_ROWS: u64 = 1 << 20;

/// Initial capacity for a buffer that will hold `rows` entries.
pub(crate) fn preallocation(rows: u64) -> usize {
    rows.min(MAX_PREALLOCATED_ROWS) as usize
}

/// Produces the values of one column, one row at a time.
pub trait ColumnGenerator: Send {
    fn id(&self) -> &'static str;

    fn next_value(&mut self, rng: &mut dyn RngCore) -> Result<Value, GenerationError>;

    /// Samples clamped to a bound after exhausting re-draws.
    fn clamped(&self) -> u64 {
        0
    }
}

/// Build the generator for a resolved column.
///
/// `references` must hold the referenced table's keys for foreign-key
/// columns; without it those columns fail with a missing reference.
pub fn build_generator(
    path: &str,
    column: &ColumnPlan,
    rows: u64,
    options: &GenerateOptions,
    references: Option<&ReferenceRegistry>,
    rng: &mut dyn RngCore,
) -> Result<Box<dyn ColumnGenerator>, GenerationError> {
    let generator: Box<dyn ColumnGenerator> = match &column.kind {
        ColumnKind::PrimaryKey(key) => Box::new(PrimaryKeyGenerator::new(
            path,
            column.data_type,
            key,
            rows,
        )?),
        ColumnKind::ForeignKey(reference) => {
            let pool = references
                .and_then(|registry| registry.pool(&reference.table, &reference.column))
                .ok_or_else(|| {
                    CoreError::missing_reference(
                        path,
                        format!(
                            "no generated keys available for '{}.{}'",
                            reference.table, reference.column
                        ),
                    )
                })?;
            Box::new(ReferenceGenerator::new(path, pool, &reference.weights)?)
        }
        ColumnKind::Categorical(spec) => Box::new(CategoricalGenerator::new(path, spec)?),
        ColumnKind::Numeric(spec) => {
            let mut generator = NumericGenerator::new(
                path,
                column.data_type,
                spec,
                options.max_truncation_attempts,
            );
            if let Some(limit) = spec.distinct_count.filter(|limit| *limit < rows) {
                generator.materialize_pool(limit, rng)?;
            }
            Box::new(generator)
        }
        ColumnKind::Constant { value } => Box::new(ConstantGenerator::new(value.clone())),
    };

    if column.null_rate > 0.0 {
        Ok(Box::new(NullInjector::new(generator, column.null_rate)))
    } else {
        Ok(generator)
    }
}

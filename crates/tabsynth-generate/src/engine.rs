use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use tabsynth_core::{ResolvedTable, TableSchema, resolve_table};

use crate::errors::GenerationError;
use crate::foreign::ReferenceRegistry;
use crate::generators::{ColumnGenerator, build_generator, preallocation};
use crate::model::{GenerateOptions, GeneratedTable};

/// Generate `num_rows` rows for a single table.
///
/// Tables with foreign-key columns need their referenced keys and must go
/// through [`crate::generate_multi`]; here they fail with a missing reference.
pub fn generate(
    schema: &TableSchema,
    num_rows: u64,
    options: &GenerateOptions,
) -> Result<GeneratedTable, GenerationError> {
    let table = resolve_table(schema)?;
    TableGenerator::new(&table, options, options.run_seed()).generate(num_rows)
}

/// Builds one table column by column.
///
/// Every column draws from its own ChaCha8 stream derived from the run seed,
/// the table name and the column name, so output does not depend on whether
/// columns run in parallel or in which order they finish.
#[derive(Debug, Clone, Copy)]
pub struct TableGenerator<'a> {
    table: &'a ResolvedTable,
    options: &'a GenerateOptions,
    references: Option<&'a ReferenceRegistry>,
    run_seed: u64,
}

struct ColumnJob {
    name: String,
    path: String,
    generator: Box<dyn ColumnGenerator>,
    rng: ChaCha8Rng,
}

struct ColumnOutput {
    values: Vec<tabsynth_core::Value>,
    clamped: u64,
}

impl<'a> TableGenerator<'a> {
    pub fn new(table: &'a ResolvedTable, options: &'a GenerateOptions, run_seed: u64) -> Self {
        Self {
            table,
            options,
            references: None,
            run_seed,
        }
    }

    pub fn with_references(mut self, references: &'a ReferenceRegistry) -> Self {
        self.references = Some(references);
        self
    }

    pub fn generate(&self, rows: u64) -> Result<GeneratedTable, GenerationError> {
        if self.options.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }
        let start = Instant::now();
        let table_seed = hash_seed(self.run_seed, &self.table.name);
        info!(
            table = %self.table.name,
            rows,
            columns = self.table.columns.len(),
            parallel = self.options.parallel,
            "generating table"
        );

        // All generators are built before any sampling so capacity problems
        // surface without partial work.
        let mut jobs = Vec::with_capacity(self.table.columns.len());
        for column in &self.table.columns {
            let path = self.table.path(&column.name);
            let mut rng = ChaCha8Rng::seed_from_u64(hash_seed(table_seed, &column.name));
            let generator =
                build_generator(&path, column, rows, self.options, self.references, &mut rng)?;
            debug!(column = %path, generator = generator.id(), "column generator ready");
            jobs.push(ColumnJob {
                name: column.name.clone(),
                path,
                generator,
                rng,
            });
        }

        let names: Vec<String> = jobs.iter().map(|job| job.name.clone()).collect();
        let outputs = if self.options.parallel && jobs.len() > 1 {
            self.run_parallel(jobs, rows)
        } else {
            self.run_serial(jobs, rows)
        };

        let mut columns = Vec::with_capacity(outputs.len());
        let mut clamped = BTreeMap::new();
        for (name, output) in names.into_iter().zip(outputs) {
            let output = output?;
            if output.clamped > 0 {
                warn!(
                    column = %self.table.path(&name),
                    clamped = output.clamped,
                    "samples clamped to the nearest bound"
                );
                clamped.insert(name.clone(), output.clamped);
            }
            columns.push((name, output.values));
        }

        let primary_key = self
            .table
            .primary_key_column()
            .map(|column| column.name.clone());
        let generated = GeneratedTable::from_columns(
            self.table.name.clone(),
            columns,
            primary_key,
            self.run_seed,
            clamped,
        );
        info!(
            table = %self.table.name,
            rows_generated = generated.row_count(),
            duration_ms = start.elapsed().as_millis() as u64,
            "table generated"
        );
        Ok(generated)
    }

    fn run_serial(
        &self,
        jobs: Vec<ColumnJob>,
        rows: u64,
    ) -> Vec<Result<ColumnOutput, GenerationError>> {
        jobs.into_iter()
            .map(|job| {
                let path = job.path.clone();
                catch_unwind(AssertUnwindSafe(|| run_column(job, rows, self.options)))
                    .unwrap_or_else(|panic| {
                        Err(GenerationError::Panicked {
                            path,
                            message: panic_message(panic),
                        })
                    })
            })
            .collect()
    }

    fn run_parallel(
        &self,
        jobs: Vec<ColumnJob>,
        rows: u64,
    ) -> Vec<Result<ColumnOutput, GenerationError>> {
        let options = self.options;
        std::thread::scope(|scope| {
            let handles: Vec<_> = jobs
                .into_iter()
                .map(|job| {
                    let path = job.path.clone();
                    (path, scope.spawn(move || run_column(job, rows, options)))
                })
                .collect();
            handles
                .into_iter()
                .map(|(path, handle)| {
                    handle.join().unwrap_or_else(|panic| {
                        Err(GenerationError::Panicked {
                            path,
                            message: panic_message(panic),
                        })
                    })
                })
                .collect()
        })
    }
}

fn run_column(
    mut job: ColumnJob,
    rows: u64,
    options: &GenerateOptions,
) -> Result<ColumnOutput, GenerationError> {
    if options.is_cancelled() {
        return Err(GenerationError::Cancelled);
    }
    let mut values = Vec::with_capacity(preallocation(rows));
    for _ in 0..rows {
        values.push(job.generator.next_value(&mut job.rng)?);
    }
    Ok(ColumnOutput {
        values,
        clamped: job.generator.clamped(),
    })
}

pub(crate) fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic during generation".to_string()
    }
}

/// FNV-1a fold of `key` into `seed`.
pub(crate) fn hash_seed(seed: u64, key: &str) -> u64 {
    let mut hash = seed ^ 0xcbf29ce484222325;
    for byte in key.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use tabsynth_core::{ColumnSpec, DataType, NumericalStats, Value};

    fn users() -> TableSchema {
        TableSchema::new("users")
            .with_column("id", ColumnSpec::primary_key(DataType::Integer))
            .with_column(
                "status",
                ColumnSpec::new(DataType::String)
                    .nullable(false)
                    .with_values(["active", "inactive"]),
            )
            .with_column(
                "age",
                ColumnSpec::new(DataType::Integer).with_stats(NumericalStats {
                    min_value: Some(18.0),
                    max_value: Some(90.0),
                    mean_value: Some(40.0),
                    std_dev: Some(12.0),
                    null_percentage: Some(10.0),
                    ..NumericalStats::default()
                }),
            )
    }

    #[test]
    fn hash_seed_depends_on_key() {
        assert_ne!(hash_seed(7, "users"), hash_seed(7, "orders"));
        assert_eq!(hash_seed(7, "users"), hash_seed(7, "users"));
    }

    #[test]
    fn generates_requested_rows_in_column_order() {
        let table = generate(&users(), 50, &GenerateOptions::with_seed(1)).expect("generate");
        assert_eq!(table.row_count(), 50);
        assert_eq!(table.columns(), &["id", "status", "age"]);
        assert_eq!(table.value(0, "id"), Some(&Value::Int(1)));
        assert_eq!(table.primary_key(), Some("id"));
    }

    #[test]
    fn same_seed_same_output() {
        let options = GenerateOptions::with_seed(42);
        let first = generate(&users(), 200, &options).expect("generate");
        let second = generate(&users(), 200, &options).expect("generate");
        assert_eq!(first, second);
    }

    #[test]
    fn parallel_and_serial_agree() {
        let parallel = generate(&users(), 300, &GenerateOptions::with_seed(9)).expect("generate");
        let serial = generate(
            &users(),
            300,
            &GenerateOptions {
                parallel: false,
                ..GenerateOptions::with_seed(9)
            },
        )
        .expect("generate");
        assert_eq!(parallel.rows(), serial.rows());
    }

    #[test]
    fn zero_rows_yields_empty_table() {
        let table = generate(&users(), 0, &GenerateOptions::with_seed(1)).expect("generate");
        assert_eq!(table.row_count(), 0);
        assert_eq!(table.columns().len(), 3);
    }

    #[test]
    fn foreign_keys_need_a_registry() {
        let orders = TableSchema::new("orders")
            .with_column("id", ColumnSpec::primary_key(DataType::Integer))
            .with_column(
                "user_id",
                ColumnSpec::new(DataType::Integer).references("users", "id"),
            );
        let err = generate(&orders, 5, &GenerateOptions::with_seed(1)).unwrap_err();
        assert!(matches!(
            err,
            GenerationError::Schema(tabsynth_core::Error::MissingReference { .. })
        ));
    }

    #[test]
    fn cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let options = GenerateOptions {
            cancellation: Some(token),
            ..GenerateOptions::with_seed(1)
        };
        assert!(matches!(
            generate(&users(), 10, &options),
            Err(GenerationError::Cancelled)
        ));
    }
}

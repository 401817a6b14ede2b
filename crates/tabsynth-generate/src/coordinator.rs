use std::collections::BTreeSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

use tracing::{info, warn};

use tabsynth_core::{ResolvedSchema, TableSchema, resolve_schemas};

use crate::engine::{TableGenerator, panic_message};
use crate::errors::GenerationError;
use crate::foreign::ReferenceRegistry;
use crate::model::{
    FailureReason, GenerateOptions, GeneratedTable, GenerationReport, MultiTableOutput, RowPlan,
    TableFailure, TableReport,
};
use crate::planner::{GenerationTask, plan_levels};

/// Generate a set of related tables in dependency order.
///
/// See [`MultiTableCoordinator::run`].
pub fn generate_multi(
    schemas: &[TableSchema],
    rows: &RowPlan,
    options: &GenerateOptions,
) -> Result<MultiTableOutput, GenerationError> {
    MultiTableCoordinator::new(options.clone()).run(schemas, rows)
}

/// Runs dependency levels in order, tables within a level concurrently.
#[derive(Debug, Clone)]
pub struct MultiTableCoordinator {
    options: GenerateOptions,
}

struct TableOutcome {
    task: GenerationTask,
    result: Result<GeneratedTable, GenerationError>,
    duration_ms: u64,
}

impl MultiTableCoordinator {
    pub fn new(options: GenerateOptions) -> Self {
        Self { options }
    }

    /// Schema, reference and cycle errors are returned before any table is
    /// generated. After that the run always yields a [`MultiTableOutput`]:
    /// a table that fails (and every table downstream of it) is listed in
    /// the report while sibling tables keep their output, and cancellation
    /// stops the run between levels with the remaining tables left pending.
    pub fn run(
        &self,
        schemas: &[TableSchema],
        rows: &RowPlan,
    ) -> Result<MultiTableOutput, GenerationError> {
        let start = Instant::now();
        let resolved = resolve_schemas(schemas)?;
        let levels = plan_levels(&resolved, rows)?;
        let run_seed = self.options.run_seed();

        info!(
            tables = resolved.tables.len(),
            levels = levels.len(),
            seed = run_seed,
            parallel = self.options.parallel,
            "generation started"
        );

        let mut registry = ReferenceRegistry::new();
        let mut failed: BTreeSet<String> = BTreeSet::new();
        let mut report = GenerationReport::new(run_seed);
        let mut tables = Vec::new();

        for (depth, level) in levels.iter().enumerate() {
            if report.cancelled || self.options.is_cancelled() {
                report.cancelled = true;
                report
                    .pending
                    .extend(level.iter().map(|task| task.table.clone()));
                continue;
            }

            let mut runnable = Vec::with_capacity(level.len());
            for task in level {
                match upstream_failure(&resolved, &task.table, &failed) {
                    Some(upstream) => {
                        warn!(table = %task.table, upstream = %upstream, "skipping table");
                        failed.insert(task.table.clone());
                        report.failures.push(TableFailure {
                            table: task.table.clone(),
                            reason: FailureReason::UpstreamFailed { table: upstream },
                        });
                    }
                    None => runnable.push(task.clone()),
                }
            }

            info!(level = depth, tables = runnable.len(), "generating level");
            let outcomes = if self.options.parallel && runnable.len() > 1 {
                self.run_level_parallel(&resolved, &registry, runnable, run_seed)
            } else {
                self.run_level_serial(&resolved, &registry, runnable, run_seed)
            };

            for outcome in outcomes {
                let table = outcome.task.table;
                match outcome.result {
                    Ok(generated) => {
                        registry.register(&generated);
                        report.tables.push(TableReport {
                            table: table.clone(),
                            rows_requested: outcome.task.rows,
                            rows_generated: generated.row_count() as u64,
                            duration_ms: outcome.duration_ms,
                            clamped_values: generated.clamped().clone(),
                        });
                        tables.push(generated);
                    }
                    Err(GenerationError::Cancelled) => {
                        report.cancelled = true;
                        report.pending.push(table);
                    }
                    Err(err) => {
                        warn!(table = %table, code = err.code(), error = %err, "table failed");
                        let reason = match err {
                            GenerationError::ConstraintViolation { path, message } => {
                                FailureReason::ConstraintViolation { path, message }
                            }
                            other => FailureReason::Error {
                                code: other.code().to_string(),
                                message: other.to_string(),
                            },
                        };
                        failed.insert(table.clone());
                        report.failures.push(TableFailure { table, reason });
                    }
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        let output = MultiTableOutput { tables, report };
        if output.is_complete() {
            info!(
                tables = output.tables.len(),
                duration_ms = output.report.duration_ms,
                clamped = output.report.clamped_total(),
                "generation completed"
            );
        } else {
            warn!(
                tables = output.tables.len(),
                failures = output.report.failures.len(),
                pending = output.report.pending.len(),
                cancelled = output.report.cancelled,
                "generation finished with a partial result"
            );
        }
        Ok(output)
    }

    fn run_level_serial(
        &self,
        resolved: &ResolvedSchema,
        registry: &ReferenceRegistry,
        tasks: Vec<GenerationTask>,
        run_seed: u64,
    ) -> Vec<TableOutcome> {
        tasks
            .into_iter()
            .map(|task| run_table(resolved, registry, &self.options, task, run_seed))
            .collect()
    }

    fn run_level_parallel(
        &self,
        resolved: &ResolvedSchema,
        registry: &ReferenceRegistry,
        tasks: Vec<GenerationTask>,
        run_seed: u64,
    ) -> Vec<TableOutcome> {
        let options = &self.options;
        std::thread::scope(|scope| {
            let handles: Vec<_> = tasks
                .into_iter()
                .map(|task| {
                    let fallback = task.clone();
                    let handle =
                        scope.spawn(move || run_table(resolved, registry, options, task, run_seed));
                    (fallback, handle)
                })
                .collect();
            handles
                .into_iter()
                .map(|(task, handle)| {
                    handle.join().unwrap_or_else(|panic| TableOutcome {
                        result: Err(GenerationError::Panicked {
                            path: task.table.clone(),
                            message: panic_message(panic),
                        }),
                        task,
                        duration_ms: 0,
                    })
                })
                .collect()
        })
    }
}

fn run_table(
    resolved: &ResolvedSchema,
    registry: &ReferenceRegistry,
    options: &GenerateOptions,
    task: GenerationTask,
    run_seed: u64,
) -> TableOutcome {
    let start = Instant::now();
    let result = match resolved.table(&task.table) {
        Some(table) => catch_unwind(AssertUnwindSafe(|| {
            TableGenerator::new(table, options, run_seed)
                .with_references(registry)
                .generate(task.rows)
        }))
        .unwrap_or_else(|panic| {
            Err(GenerationError::Panicked {
                path: task.table.clone(),
                message: panic_message(panic),
            })
        }),
        None => Err(GenerationError::InvalidPlan(format!(
            "table '{}' is not part of the resolved schema",
            task.table
        ))),
    };
    TableOutcome {
        task,
        result,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

/// First referenced table that already failed, if any.
fn upstream_failure(
    resolved: &ResolvedSchema,
    table: &str,
    failed: &BTreeSet<String>,
) -> Option<String> {
    resolved.table(table).and_then(|table| {
        table
            .foreign_keys()
            .map(|(_, reference)| reference.table.as_str())
            .find(|target| failed.contains(*target))
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use tabsynth_core::{ColumnSpec, DataType, NumericalStats};

    fn users(limit: Option<u64>) -> TableSchema {
        let key = match limit {
            Some(limit) => ColumnSpec::primary_key(DataType::Integer).with_stats(NumericalStats {
                distinct_count: Some(limit),
                ..NumericalStats::default()
            }),
            None => ColumnSpec::primary_key(DataType::Integer),
        };
        TableSchema::new("users").with_column("id", key)
    }

    fn products() -> TableSchema {
        TableSchema::new("products")
            .with_column("sku", ColumnSpec::primary_key(DataType::String))
    }

    fn orders() -> TableSchema {
        TableSchema::new("orders")
            .with_column("id", ColumnSpec::primary_key(DataType::Integer))
            .with_column(
                "user_id",
                ColumnSpec::new(DataType::Integer)
                    .nullable(false)
                    .references("users", "id"),
            )
    }

    #[test]
    fn failed_table_blocks_dependents_but_not_siblings() {
        let output = generate_multi(
            &[users(Some(5)), products(), orders()],
            &RowPlan::uniform(10),
            &GenerateOptions::with_seed(3),
        )
        .expect("generate");

        assert!(!output.is_complete());
        assert!(output.table("products").is_some());
        assert!(output.table("users").is_none());
        assert!(output.table("orders").is_none());

        let reasons: Vec<(&str, &FailureReason)> = output
            .report
            .failures
            .iter()
            .map(|failure| (failure.table.as_str(), &failure.reason))
            .collect();
        assert!(matches!(
            reasons[0],
            ("users", FailureReason::ConstraintViolation { .. })
        ));
        assert_eq!(
            reasons[1],
            (
                "orders",
                &FailureReason::UpstreamFailed {
                    table: "users".to_string()
                }
            )
        );
    }

    #[test]
    fn cancellation_leaves_tables_pending() {
        let token = CancellationToken::new();
        token.cancel();
        let options = GenerateOptions {
            cancellation: Some(token),
            ..GenerateOptions::with_seed(3)
        };
        let output = generate_multi(&[users(None), orders()], &RowPlan::uniform(10), &options)
            .expect("partial result");
        assert!(output.report.cancelled);
        assert!(output.tables.is_empty());
        assert_eq!(
            output.report.pending,
            vec!["users".to_string(), "orders".to_string()]
        );
    }

    #[test]
    fn schema_errors_are_raised_before_generation() {
        let err = generate_multi(&[orders()], &RowPlan::uniform(10), &GenerateOptions::with_seed(3))
            .unwrap_err();
        assert!(matches!(
            err,
            GenerationError::Schema(tabsynth_core::Error::MissingReference { .. })
        ));
    }
}

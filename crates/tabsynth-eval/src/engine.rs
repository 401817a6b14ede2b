use std::collections::HashSet;
use std::time::Instant;

use tracing::{debug, info, warn};

use tabsynth_core::{
    CategoricalSpec, ColumnKind, ColumnPlan, NumericSpec, ResolvedTable, TableSchema, Value,
    resolve_schemas, resolve_table,
};
use tabsynth_generate::{GeneratedTable, MultiTableOutput, ReferenceRegistry};

use crate::errors::ValidationError;
use crate::metrics::{CheckResult, ColumnReport, ValidationReport};
use crate::model::{Tolerances, ValidationOptions, Violation, WarningItem};
use crate::stats::ObservedStats;

/// Validate a single table against its schema.
///
/// Foreign-key containment needs the referenced keys; use
/// [`validate_with_references`] or [`validate_multi`] for that. Here
/// foreign-key columns only get a warning.
pub fn validate(
    table: &GeneratedTable,
    schema: &TableSchema,
    options: &ValidationOptions,
) -> Result<ValidationReport, ValidationError> {
    let resolved = resolve_table(schema)?;
    Validator::new(options).validate_table(table, &resolved, None)
}

/// Validate a table, checking foreign keys against `references`.
pub fn validate_with_references(
    table: &GeneratedTable,
    schema: &TableSchema,
    references: &ReferenceRegistry,
    options: &ValidationOptions,
) -> Result<ValidationReport, ValidationError> {
    let resolved = resolve_table(schema)?;
    Validator::new(options).validate_table(table, &resolved, Some(references))
}

/// Validate every table of a multi-table run.
///
/// The reference pools are rebuilt from the output itself and each table's
/// requested row count becomes its expected row count.
pub fn validate_multi(
    output: &MultiTableOutput,
    schemas: &[TableSchema],
    options: &ValidationOptions,
) -> Result<Vec<ValidationReport>, ValidationError> {
    let start = Instant::now();
    let resolved = resolve_schemas(schemas)?;
    let mut registry = ReferenceRegistry::new();
    for table in &output.tables {
        registry.register(table);
    }

    let mut reports = Vec::with_capacity(output.tables.len());
    for table in &output.tables {
        let plan = resolved.table(table.name()).ok_or_else(|| {
            ValidationError::structural(
                table.name(),
                "table_name",
                "table is not declared in the schema",
            )
        })?;
        let expected_rows = output
            .report
            .tables
            .iter()
            .find(|report| report.table == table.name())
            .map(|report| report.rows_requested)
            .or(options.expected_rows);
        let table_options = ValidationOptions {
            expected_rows,
            ..options.clone()
        };
        reports.push(Validator::new(&table_options).validate_table(
            table,
            plan,
            Some(&registry),
        )?);
    }

    info!(
        tables = reports.len(),
        invalid = reports.iter().filter(|report| !report.is_valid).count(),
        duration_ms = start.elapsed().as_millis() as u64,
        "validation completed"
    );
    Ok(reports)
}

/// Compares one generated table with its resolved schema.
#[derive(Debug, Clone, Copy)]
pub struct Validator<'a> {
    options: &'a ValidationOptions,
}

struct TableFindings {
    violations: Vec<Violation>,
    warnings: Vec<WarningItem>,
}

impl<'a> Validator<'a> {
    pub fn new(options: &'a ValidationOptions) -> Self {
        Self { options }
    }

    pub fn validate_table(
        &self,
        table: &GeneratedTable,
        resolved: &ResolvedTable,
        references: Option<&ReferenceRegistry>,
    ) -> Result<ValidationReport, ValidationError> {
        if table.name() != resolved.name {
            return Err(ValidationError::structural(
                table.name(),
                "table_name",
                format!("table does not match schema '{}'", resolved.name),
            ));
        }

        let mut findings = TableFindings {
            violations: Vec::new(),
            warnings: Vec::new(),
        };
        for column in table.columns() {
            if resolved.column(column).is_none() {
                findings.warnings.push(WarningItem {
                    code: "unexpected_column".to_string(),
                    path: resolved.path(column),
                    message: "column is not declared in the schema".to_string(),
                    hint: None,
                });
            }
        }

        let mut columns = Vec::with_capacity(resolved.columns.len());
        for plan in &resolved.columns {
            let path = resolved.path(&plan.name);
            let values: Vec<&Value> = table
                .column_values(&plan.name)
                .ok_or_else(|| {
                    ValidationError::structural(
                        path.as_str(),
                        "missing_column",
                        "declared column is absent from the table",
                    )
                })?
                .collect();
            check_structure(&path, plan, &values)?;
            columns.push(self.column_report(&path, plan, &values, references, &mut findings));
        }

        let row_count = table.row_count() as u64;
        if let Some(expected) = self.options.expected_rows.filter(|rows| *rows != row_count) {
            findings.violations.push(Violation {
                code: "row_count".to_string(),
                path: resolved.name.clone(),
                message: format!("expected {expected} rows, found {row_count}"),
                row_index: None,
                example: None,
            });
        }

        let is_valid =
            findings.violations.is_empty() && columns.iter().all(|column| column.passed);
        if is_valid {
            info!(table = %resolved.name, rows = row_count, "table validated");
        } else {
            warn!(
                table = %resolved.name,
                rows = row_count,
                violations = findings.violations.len(),
                "table failed validation"
            );
        }

        let limit = self.options.max_examples;
        let omitted = findings.violations.len().saturating_sub(limit)
            + findings.warnings.len().saturating_sub(limit);
        findings.violations.truncate(limit);
        findings.warnings.truncate(limit);

        Ok(ValidationReport {
            table: resolved.name.clone(),
            row_count,
            expected_rows: self.options.expected_rows,
            is_valid,
            columns,
            violations: findings.violations,
            warnings: findings.warnings,
            omitted_findings: omitted as u64,
        })
    }

    fn column_report(
        &self,
        path: &str,
        plan: &ColumnPlan,
        values: &[&Value],
        references: Option<&ReferenceRegistry>,
        findings: &mut TableFindings,
    ) -> ColumnReport {
        let tolerances = &self.options.tolerances;
        let observed = ObservedStats::collect(values.iter().copied());
        let mut checks = Vec::new();

        if observed.rows > 0 {
            checks.push(null_rate_check(plan, &observed, tolerances));
        }
        if plan.null_rate_conflict {
            findings.warnings.push(WarningItem {
                code: "null_rate_conflict".to_string(),
                path: path.to_string(),
                message: format!(
                    "column is not nullable but declares {}% nulls; no nulls were generated",
                    plan.declared_null_rate.unwrap_or_default() * 100.0
                ),
                hint: Some("drop null_percentage or mark the column nullable".to_string()),
            });
        }

        match &plan.kind {
            ColumnKind::PrimaryKey(key) => {
                let duplicate = first_duplicate(values);
                let duplicates = observed.non_null() - observed.distinct;
                checks.push(CheckResult::within("unique", 0.0, duplicates as f64, 0.0));
                if let Some((row, value)) = duplicate {
                    findings.violations.push(Violation {
                        code: "duplicate_key".to_string(),
                        path: path.to_string(),
                        message: format!("{duplicates} duplicate primary key value(s)"),
                        row_index: Some(row as u64 + 1),
                        example: Some(value),
                    });
                }
                if let Some(limit) = key.distinct_limit {
                    checks.push(CheckResult::at_most(
                        "distinct_count",
                        limit as f64,
                        observed.distinct as f64,
                    ));
                }
            }
            ColumnKind::ForeignKey(reference) => match references {
                Some(registry) => {
                    let mut dangling = 0u64;
                    let mut first = None;
                    for (row, value) in values.iter().enumerate() {
                        if value.is_null()
                            || registry.contains(&reference.table, &reference.column, value)
                        {
                            continue;
                        }
                        dangling += 1;
                        first.get_or_insert((row, value.key()));
                    }
                    checks.push(CheckResult::within("containment", 0.0, dangling as f64, 0.0));
                    if let Some((row, value)) = first {
                        findings.violations.push(Violation {
                            code: "dangling_reference".to_string(),
                            path: path.to_string(),
                            message: format!(
                                "{dangling} value(s) missing from {}.{}",
                                reference.table, reference.column
                            ),
                            row_index: Some(row as u64 + 1),
                            example: Some(value),
                        });
                    }
                }
                None => findings.warnings.push(WarningItem {
                    code: "reference_not_checked".to_string(),
                    path: path.to_string(),
                    message: format!(
                        "containment in {}.{} was not checked",
                        reference.table, reference.column
                    ),
                    hint: Some("validate the table together with the referenced table".to_string()),
                }),
            },
            ColumnKind::Categorical(spec) => {
                checks.extend(frequency_checks(spec, &observed, tolerances));
            }
            ColumnKind::Numeric(spec) => {
                checks.extend(numeric_checks(spec, &observed, tolerances));
            }
            ColumnKind::Constant { .. } => {}
        }

        for check in checks.iter().filter(|check| !check.passed) {
            debug!(column = %path, check = %check.check, "check failed");
            let code = match check.check.as_str() {
                "null_rate" if !plan.nullable => "not_null",
                "unique" | "containment" => continue,
                "distinct_count" => "distinct_count",
                _ => "statistical_deviation",
            };
            findings.violations.push(Violation {
                code: code.to_string(),
                path: path.to_string(),
                message: describe(check),
                row_index: None,
                example: None,
            });
        }

        ColumnReport {
            column: plan.name.clone(),
            kind: plan.kind.label().to_string(),
            description: plan.description.clone(),
            passed: checks.iter().all(|check| check.passed),
            observed,
            checks,
        }
    }
}

/// Raise for values no correct generator could have produced.
fn check_structure(path: &str, plan: &ColumnPlan, values: &[&Value]) -> Result<(), ValidationError> {
    for (row, value) in values.iter().enumerate() {
        let row = row + 1;
        if value.is_null() {
            if matches!(plan.kind, ColumnKind::PrimaryKey(_)) {
                return Err(ValidationError::structural(
                    path,
                    "primary_key",
                    format!("row {row} has no primary key value"),
                ));
            }
            continue;
        }
        match &plan.kind {
            ColumnKind::Categorical(spec) if !spec.allows(value) => {
                return Err(ValidationError::structural(
                    path,
                    "categorical_values",
                    format!("row {row} holds '{value}', which is not an allowed value"),
                ));
            }
            ColumnKind::Numeric(spec) => check_numeric(path, row, spec, value)?,
            ColumnKind::Constant { value: constant } if constant.key() != value.key() => {
                return Err(ValidationError::structural(
                    path,
                    "constant_value",
                    format!("row {row} holds '{value}' instead of '{constant}'"),
                ));
            }
            _ => {}
        }
    }
    Ok(())
}

fn check_numeric(
    path: &str,
    row: usize,
    spec: &NumericSpec,
    value: &Value,
) -> Result<(), ValidationError> {
    let raw = value.to_numeric().ok_or_else(|| {
        ValidationError::structural(
            path,
            "data_type",
            format!("row {row} holds non-numeric value '{value}'"),
        )
    })?;
    if !spec.contains(raw) {
        let (min, max) = spec.effective_bounds();
        return Err(ValidationError::structural(
            path,
            "numeric_bounds",
            format!(
                "row {row} holds {raw}, outside [{}, {}]",
                bound_label(min),
                bound_label(max)
            ),
        ));
    }
    Ok(())
}

fn bound_label(bound: Option<f64>) -> String {
    bound.map_or_else(|| "-".to_string(), |bound| bound.to_string())
}

fn null_rate_check(plan: &ColumnPlan, observed: &ObservedStats, tolerances: &Tolerances) -> CheckResult {
    let rate = observed.null_rate();
    if !plan.nullable {
        return CheckResult::within("null_rate", 0.0, rate, 0.0);
    }
    let expected = plan.null_rate;
    let tolerance = tolerances
        .null_absolute
        .max(tolerances.sigma * binomial_error(expected, observed.rows));
    CheckResult::within("null_rate", expected, rate, tolerance)
}

fn frequency_checks(
    spec: &CategoricalSpec,
    observed: &ObservedStats,
    tolerances: &Tolerances,
) -> Vec<CheckResult> {
    let n = observed.non_null();
    if n == 0 {
        return Vec::new();
    }
    spec.expected_proportions()
        .into_iter()
        .map(|(value, expected)| {
            let key = value.key();
            let tolerance = (tolerances.categorical_relative * expected)
                .max(tolerances.categorical_absolute)
                .max(tolerances.sigma * binomial_error(expected, n));
            CheckResult::within(
                format!("frequency[{key}]"),
                expected,
                observed.proportion(&key),
                tolerance,
            )
        })
        .collect()
}

fn numeric_checks(
    spec: &NumericSpec,
    observed: &ObservedStats,
    tolerances: &Tolerances,
) -> Vec<CheckResult> {
    let mut checks = Vec::new();
    let n = observed.non_null();
    if n == 0 {
        return checks;
    }
    // A distinct-value pool means only that many independent draws.
    let effective_n = spec.distinct_count.map_or(n, |limit| limit.min(n)).max(1) as f64;
    let declared_std = spec.std_dev.unwrap_or(0.0);

    if let (Some(expected), Some(mean)) = (spec.mean, observed.mean) {
        let scale = expected.abs().max(declared_std);
        let tolerance = (tolerances.mean_relative * scale)
            .max(tolerances.sigma * declared_std / effective_n.sqrt());
        checks.push(CheckResult::within("mean", expected, mean, tolerance));
    }
    if let Some(std_dev) = observed.std_dev.filter(|_| declared_std > 0.0) {
        let tolerance = (tolerances.std_dev_relative * declared_std)
            .max(tolerances.sigma * declared_std / (2.0 * effective_n).sqrt());
        checks.push(CheckResult::within("std_dev", declared_std, std_dev, tolerance));
    }
    if let Some(limit) = spec.distinct_count {
        checks.push(CheckResult::at_most(
            "distinct_count",
            limit as f64,
            observed.distinct as f64,
        ));
    }
    checks
}

/// Standard error of a proportion `p` over `n` trials.
fn binomial_error(p: f64, n: u64) -> f64 {
    if n == 0 {
        return 0.0;
    }
    (p * (1.0 - p) / n as f64).sqrt()
}

fn first_duplicate(values: &[&Value]) -> Option<(usize, String)> {
    let mut seen = HashSet::with_capacity(values.len());
    values
        .iter()
        .enumerate()
        .filter(|(_, value)| !value.is_null())
        .find_map(|(row, value)| {
            let key = value.key();
            (!seen.insert(key.clone())).then_some((row, key))
        })
}

fn describe(check: &CheckResult) -> String {
    match check.tolerance {
        Some(tolerance) => format!(
            "{} observed {:.4}, expected {:.4} ± {:.4}",
            check.check, check.observed, check.expected, tolerance
        ),
        None => format!(
            "{} observed {}, at most {} allowed",
            check.check, check.observed, check.expected
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabsynth_core::{ColumnSpec, DataType, NumericalStats};

    fn accounts() -> TableSchema {
        TableSchema::new("accounts")
            .with_column("id", ColumnSpec::primary_key(DataType::Integer))
            .with_column(
                "tier",
                ColumnSpec::new(DataType::String)
                    .nullable(false)
                    .with_values(["gold", "silver"])
                    .with_distribution([("gold", 1.0), ("silver", 1.0)]),
            )
            .with_column(
                "balance",
                ColumnSpec::new(DataType::Float).with_stats(NumericalStats {
                    min_value: Some(0.0),
                    max_value: Some(100.0),
                    mean_value: Some(50.0),
                    std_dev: Some(10.0),
                    ..NumericalStats::default()
                }),
            )
    }

    fn table(rows: Vec<Vec<Value>>) -> GeneratedTable {
        GeneratedTable::from_rows(
            "accounts",
            vec!["id".to_string(), "tier".to_string(), "balance".to_string()],
            rows,
            Some("id".to_string()),
        )
        .expect("build table")
    }

    fn row(id: i64, tier: &str, balance: f64) -> Vec<Value> {
        vec![
            Value::Int(id),
            Value::Text(tier.to_string()),
            Value::Float(balance),
        ]
    }

    #[test]
    fn value_outside_categorical_set_is_structural() {
        let table = table(vec![row(1, "gold", 50.0), row(2, "bronze", 50.0)]);
        let err = validate(&table, &accounts(), &ValidationOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::Structural { ref constraint, ref path, .. }
                if constraint == "categorical_values" && path == "accounts.tier"
        ));
    }

    #[test]
    fn value_outside_bounds_is_structural() {
        let table = table(vec![row(1, "gold", 150.0)]);
        let err = validate(&table, &accounts(), &ValidationOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::Structural { ref constraint, .. } if constraint == "numeric_bounds"
        ));
    }

    #[test]
    fn null_primary_key_is_structural() {
        let table = table(vec![vec![
            Value::Null,
            Value::Text("gold".to_string()),
            Value::Float(50.0),
        ]]);
        let err = validate(&table, &accounts(), &ValidationOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::Structural { ref constraint, .. } if constraint == "primary_key"
        ));
    }

    #[test]
    fn duplicate_keys_are_reported_not_raised() {
        let rows = (0..40)
            .map(|idx| {
                let tier = if idx % 2 == 0 { "gold" } else { "silver" };
                row(idx.min(38), tier, 40.0 + (idx % 21) as f64)
            })
            .collect();
        let report = validate(&table(rows), &accounts(), &ValidationOptions::default())
            .expect("report");
        assert!(!report.is_valid);
        let id = report.column("id").expect("id column");
        assert!(!id.passed);
        assert!(report
            .violations
            .iter()
            .any(|violation| violation.code == "duplicate_key"
                && violation.row_index == Some(40)
                && violation.example.as_deref() == Some("38")));
    }

    #[test]
    fn skewed_mean_is_a_statistical_deviation() {
        let rows = (0..200)
            .map(|idx| {
                let tier = if idx % 2 == 0 { "gold" } else { "silver" };
                row(idx, tier, 90.0 + (idx % 5) as f64)
            })
            .collect();
        let report = validate(&table(rows), &accounts(), &ValidationOptions::default())
            .expect("report");
        assert!(!report.is_valid);
        let balance = report.column("balance").expect("balance column");
        assert!(!balance.check("mean").expect("mean check").passed);
        assert!(balance.check("std_dev").is_some());
        assert!(report
            .violations
            .iter()
            .any(|violation| violation.code == "statistical_deviation"
                && violation.path == "accounts.balance"));
        assert!(report.column("tier").expect("tier column").passed);
    }

    #[test]
    fn null_rate_conflict_is_a_warning() {
        let schema = TableSchema::new("flags").with_column(
            "enabled",
            ColumnSpec::new(DataType::Boolean)
                .nullable(false)
                .with_null_percentage(20.0),
        );
        let table = GeneratedTable::from_rows(
            "flags",
            vec!["enabled".to_string()],
            (0..100).map(|idx| vec![Value::Bool(idx % 2 == 0)]).collect(),
            None,
        )
        .expect("build table");
        let report = validate(&table, &schema, &ValidationOptions::default()).expect("report");
        assert!(report.is_valid);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].code, "null_rate_conflict");
    }

    #[test]
    fn row_count_mismatch_is_reported() {
        let rows = (0..10).map(|idx| row(idx, "gold", 50.0)).collect();
        let options = ValidationOptions {
            expected_rows: Some(20),
            ..ValidationOptions::default()
        };
        let report = validate(&table(rows), &accounts(), &options).expect("report");
        assert!(report
            .violations
            .iter()
            .any(|violation| violation.code == "row_count"));
    }

    #[test]
    fn finding_lists_are_capped_by_max_examples() {
        let skewed = || {
            table(
                (0..200)
                    .map(|idx| {
                        let tier = if idx % 2 == 0 { "gold" } else { "silver" };
                        row(idx.min(150), tier, 90.0 + (idx % 5) as f64)
                    })
                    .collect(),
            )
        };
        let uncapped_options = ValidationOptions {
            expected_rows: Some(300),
            ..ValidationOptions::default()
        };
        let capped_options = ValidationOptions {
            max_examples: 1,
            ..uncapped_options.clone()
        };

        let uncapped = validate(&skewed(), &accounts(), &uncapped_options).expect("report");
        let capped = validate(&skewed(), &accounts(), &capped_options).expect("report");

        assert!(uncapped.violations.len() >= 3);
        assert_eq!(uncapped.omitted_findings, 0);
        assert!(!capped.is_valid);
        assert_eq!(capped.violations.len(), 1);
        assert_eq!(
            capped.violations.len() as u64 + capped.omitted_findings,
            uncapped.violations.len() as u64
        );
    }
}

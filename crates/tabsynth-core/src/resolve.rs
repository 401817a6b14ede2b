//! Normalization of [`TableSchema`] into a closed per-column model.
//!
//! Every column is classified exactly once into a [`ColumnKind`]; all
//! self-contradictions in the schema surface here as
//! [`Error::SchemaViolation`], before any generation work happens.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::warn;

use crate::error::{Error, Result};
use crate::schema::{ColumnSpec, NumericalStats, TableSchema};
use crate::types::DataType;
use crate::value::Value;

const DEFAULT_KEY_START: i64 = 1;

/// A table schema after resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedTable {
    pub name: String,
    pub columns: Vec<ColumnPlan>,
    /// Index of the primary-key column in `columns`.
    pub primary_key: Option<usize>,
}

impl ResolvedTable {
    pub fn column(&self, name: &str) -> Option<&ColumnPlan> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn primary_key_column(&self) -> Option<&ColumnPlan> {
        self.primary_key.and_then(|idx| self.columns.get(idx))
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = (&ColumnPlan, &ReferenceSpec)> {
        self.columns.iter().filter_map(|column| match &column.kind {
            ColumnKind::ForeignKey(reference) => Some((column, reference)),
            _ => None,
        })
    }

    pub fn path(&self, column: &str) -> String {
        format!("{}.{}", self.name, column)
    }
}

/// Resolved column: type, null policy and generation variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnPlan {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    /// Declared null probability (0–1) as written in the schema.
    pub declared_null_rate: Option<f64>,
    /// Null probability actually applied; zero for non-nullable columns.
    pub null_rate: f64,
    /// `nullable: false` (or primary key) combined with a positive null percentage.
    pub null_rate_conflict: bool,
    pub kind: ColumnKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Closed set of column generation variants.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnKind {
    PrimaryKey(KeySpec),
    ForeignKey(ReferenceSpec),
    Categorical(CategoricalSpec),
    Numeric(NumericSpec),
    Constant { value: Value },
}

impl ColumnKind {
    pub fn label(&self) -> &'static str {
        match self {
            ColumnKind::PrimaryKey(_) => "primary_key",
            ColumnKind::ForeignKey(_) => "foreign_key",
            ColumnKind::Categorical(_) => "categorical",
            ColumnKind::Numeric(_) => "numeric",
            ColumnKind::Constant { .. } => "constant",
        }
    }
}

/// Primary-key sequence parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeySpec {
    /// First integer of the sequence.
    pub start: i64,
    /// Highest integer the sequence may reach.
    pub max: Option<i64>,
    /// Prefix for STRING keys.
    pub prefix: String,
    /// Declared `distinct_count`; caps how many keys may be issued.
    pub distinct_limit: Option<u64>,
}

/// Foreign-key target and optional weighting over referenced values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceSpec {
    pub table: String,
    pub column: String,
    /// Empty means uniform sampling over the referenced pool.
    pub weights: Vec<WeightedValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightedValue {
    pub value: Value,
    pub weight: f64,
}

/// Categorical sampling table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoricalSpec {
    /// Every allowed value, in declaration order.
    pub allowed: Vec<Value>,
    /// Values eligible for sampling with their positive weights.
    pub entries: Vec<WeightedValue>,
    /// Whether weights came from a declared `value_distribution`.
    pub weighted: bool,
}

impl CategoricalSpec {
    /// Normalized expected proportion of each sampled value.
    pub fn expected_proportions(&self) -> Vec<(&Value, f64)> {
        let total: f64 = self.entries.iter().map(|entry| entry.weight).sum();
        self.entries
            .iter()
            .map(|entry| (&entry.value, entry.weight / total))
            .collect()
    }

    pub fn allows(&self, value: &Value) -> bool {
        let key = value.key();
        self.allowed.iter().any(|allowed| allowed.key() == key)
    }
}

/// Numeric statistics after validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSpec {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub distinct_count: Option<u64>,
    /// Round samples to the integer grid (INTEGER, DATE, DATETIME).
    pub integer: bool,
    pub shape: NumericShape,
}

impl NumericSpec {
    /// Effective inclusive bounds; integer columns snap to the integer grid.
    pub fn effective_bounds(&self) -> (Option<f64>, Option<f64>) {
        if self.integer {
            (self.min.map(f64::ceil), self.max.map(f64::floor))
        } else {
            (self.min, self.max)
        }
    }

    pub fn contains(&self, raw: f64) -> bool {
        let (min, max) = self.effective_bounds();
        min.is_none_or(|min| raw >= min) && max.is_none_or(|max| raw <= max)
    }
}

/// Sampling distribution chosen for a numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "distribution", rename_all = "snake_case")]
pub enum NumericShape {
    Normal { mean: f64, std_dev: f64 },
    Uniform { min: f64, max: f64 },
    Fixed { value: f64 },
}

/// Resolve a single table schema.
pub fn resolve_table(schema: &TableSchema) -> Result<ResolvedTable> {
    let table = schema.table_name.trim();
    if table.is_empty() {
        return Err(Error::schema_violation(
            "<table>",
            "table_name must not be empty",
        ));
    }
    if schema.columns.is_empty() {
        return Err(Error::schema_violation(
            table,
            "table declares no columns",
        ));
    }

    let mut seen = BTreeSet::new();
    let mut columns = Vec::with_capacity(schema.columns.len());
    let mut primary_key = None;

    for (idx, (name, spec)) in schema.columns.iter().enumerate() {
        let path = format!("{table}.{name}");
        if !seen.insert(name.as_str()) {
            return Err(Error::schema_violation(path, "duplicate column name"));
        }
        if spec.is_primary_key {
            if let Some(existing) = primary_key {
                let existing: &ColumnPlan = &columns[existing];
                return Err(Error::schema_violation(
                    path,
                    format!(
                        "table already has primary key '{}'; composite keys are not supported",
                        existing.name
                    ),
                ));
            }
            primary_key = Some(idx);
        }
        columns.push(resolve_column(&path, name, spec)?);
    }

    Ok(ResolvedTable {
        name: table.to_string(),
        columns,
        primary_key,
    })
}

fn resolve_column(path: &str, name: &str, spec: &ColumnSpec) -> Result<ColumnPlan> {
    let declared_null_rate = match spec.declared_null_percentage() {
        Some(pct) if !pct.is_finite() || !(0.0..=100.0).contains(&pct) => {
            return Err(Error::schema_violation(
                path,
                format!("null_percentage {pct} must be within 0..=100"),
            ));
        }
        Some(pct) => Some(pct / 100.0),
        None => None,
    };

    if let Some(stats) = &spec.numerical_stats {
        check_stats(path, spec.data_type, stats)?;
    }

    let kind = if spec.is_primary_key {
        ColumnKind::PrimaryKey(resolve_key(path, name, spec)?)
    } else if let Some(reference) = &spec.references {
        ColumnKind::ForeignKey(ReferenceSpec {
            table: reference.table_name.clone(),
            column: reference.column_name.clone(),
            weights: resolve_weights(path, spec)?,
        })
    } else if spec.categorical_values.is_some() || !spec.value_distribution.is_empty() {
        ColumnKind::Categorical(resolve_categorical(path, spec)?)
    } else if let Some(stats) = &spec.numerical_stats {
        ColumnKind::Numeric(resolve_numeric(path, spec.data_type, stats)?)
    } else if let Some(literal) = &spec.constant_value {
        let value = Value::coerce_literal(spec.data_type, literal)
            .map_err(|message| Error::schema_violation(path, message))?;
        ColumnKind::Constant { value }
    } else if spec.data_type == DataType::Boolean {
        let entries = [true, false]
            .into_iter()
            .map(|flag| WeightedValue {
                value: Value::Bool(flag),
                weight: 1.0,
            })
            .collect::<Vec<_>>();
        ColumnKind::Categorical(CategoricalSpec {
            allowed: entries.iter().map(|entry| entry.value.clone()).collect(),
            entries,
            weighted: false,
        })
    } else {
        return Err(Error::schema_violation(
            path,
            "column declares neither categorical values, numerical stats nor a constant",
        ));
    };

    let is_key = matches!(kind, ColumnKind::PrimaryKey(_));
    let nullable = spec.nullable && !is_key;
    let null_rate_conflict = !nullable && declared_null_rate.is_some_and(|rate| rate > 0.0);
    if null_rate_conflict {
        warn!(
            column = %path,
            null_percentage = declared_null_rate.unwrap_or_default() * 100.0,
            "column is not nullable; declared null percentage is ignored"
        );
    }

    Ok(ColumnPlan {
        name: name.to_string(),
        data_type: spec.data_type,
        nullable,
        declared_null_rate,
        null_rate: if nullable {
            declared_null_rate.unwrap_or(0.0)
        } else {
            0.0
        },
        null_rate_conflict,
        kind,
        description: spec.description.clone(),
    })
}

fn resolve_key(path: &str, name: &str, spec: &ColumnSpec) -> Result<KeySpec> {
    if spec.references.is_some() {
        return Err(Error::schema_violation(
            path,
            "a primary key cannot also reference another table",
        ));
    }
    if !matches!(spec.data_type, DataType::Integer | DataType::String) {
        return Err(Error::schema_violation(
            path,
            format!(
                "primary keys must be INTEGER or STRING, found {}",
                spec.data_type
            ),
        ));
    }

    let stats = spec.numerical_stats.as_ref();
    let start = stats
        .and_then(|stats| stats.min_value)
        .filter(|_| spec.data_type == DataType::Integer)
        .map(|min| min.ceil() as i64)
        .unwrap_or(DEFAULT_KEY_START);
    let max = stats
        .and_then(|stats| stats.max_value)
        .filter(|_| spec.data_type == DataType::Integer)
        .map(|max| max.floor() as i64);
    if max.is_some_and(|max| max < start) {
        return Err(Error::schema_violation(
            path,
            format!("key range starting at {start} is empty"),
        ));
    }

    Ok(KeySpec {
        start,
        max,
        prefix: spec
            .key_prefix
            .clone()
            .unwrap_or_else(|| format!("{name}_")),
        distinct_limit: stats
            .and_then(|stats| stats.distinct_count)
            .filter(|count| *count > 0),
    })
}

fn resolve_weights(path: &str, spec: &ColumnSpec) -> Result<Vec<WeightedValue>> {
    let mut entries = Vec::with_capacity(spec.value_distribution.len());
    for (key, weight) in &spec.value_distribution {
        if !weight.is_finite() || *weight < 0.0 {
            return Err(Error::schema_violation(
                path,
                format!("weight for '{key}' must be a non-negative number, found {weight}"),
            ));
        }
        let value = Value::coerce_key(spec.data_type, key)
            .map_err(|message| Error::schema_violation(path, message))?;
        entries.push(WeightedValue {
            value,
            weight: *weight,
        });
    }
    if !entries.is_empty() && entries.iter().all(|entry| entry.weight == 0.0) {
        return Err(Error::schema_violation(
            path,
            "value_distribution assigns zero weight to every value",
        ));
    }
    Ok(entries)
}

fn resolve_categorical(path: &str, spec: &ColumnSpec) -> Result<CategoricalSpec> {
    let weights = resolve_weights(path, spec)?;

    let allowed = match &spec.categorical_values {
        Some(values) => {
            if values.is_empty() {
                return Err(Error::schema_violation(path, "categorical_values is empty"));
            }
            let mut allowed: Vec<Value> = Vec::with_capacity(values.len());
            for literal in values {
                let value = Value::coerce_literal(spec.data_type, literal)
                    .map_err(|message| Error::schema_violation(path, message))?;
                if !allowed.iter().any(|existing| existing.key() == value.key()) {
                    allowed.push(value);
                }
            }
            allowed
        }
        None => weights.iter().map(|entry| entry.value.clone()).collect(),
    };

    if weights.is_empty() {
        let entries = allowed
            .iter()
            .map(|value| WeightedValue {
                value: value.clone(),
                weight: 1.0,
            })
            .collect();
        return Ok(CategoricalSpec {
            allowed,
            entries,
            weighted: false,
        });
    }

    for entry in &weights {
        if !allowed.iter().any(|value| value.key() == entry.value.key()) {
            return Err(Error::schema_violation(
                path,
                format!(
                    "value_distribution key '{}' is not listed in categorical_values",
                    entry.value
                ),
            ));
        }
    }

    let entries = weights
        .into_iter()
        .filter(|entry| entry.weight > 0.0)
        .collect();
    Ok(CategoricalSpec {
        allowed,
        entries,
        weighted: true,
    })
}

fn check_stats(path: &str, data_type: DataType, stats: &NumericalStats) -> Result<()> {
    let fields = [
        ("min_value", stats.min_value),
        ("max_value", stats.max_value),
        ("mean_value", stats.mean_value),
        ("std_dev", stats.std_dev),
    ];
    for (field, value) in fields {
        if let Some(value) = value.filter(|value| !value.is_finite()) {
            return Err(Error::schema_violation(
                path,
                format!("{field} must be finite, found {value}"),
            ));
        }
    }

    if let (Some(min), Some(max)) = (stats.min_value, stats.max_value) {
        if min > max {
            return Err(Error::schema_violation(
                path,
                format!("min_value {min} is greater than max_value {max}"),
            ));
        }
        if data_type.is_integer_like() && min.ceil() > max.floor() {
            return Err(Error::schema_violation(
                path,
                format!("range [{min}, {max}] contains no integer"),
            ));
        }
    }
    if let Some(std_dev) = stats.std_dev.filter(|std_dev| *std_dev < 0.0) {
        return Err(Error::schema_violation(
            path,
            format!("std_dev {std_dev} must not be negative"),
        ));
    }
    if let Some(mean) = stats.mean_value {
        if stats.min_value.is_some_and(|min| mean < min)
            || stats.max_value.is_some_and(|max| mean > max)
        {
            return Err(Error::schema_violation(
                path,
                format!("mean_value {mean} lies outside [min_value, max_value]"),
            ));
        }
    }
    Ok(())
}

fn resolve_numeric(path: &str, data_type: DataType, stats: &NumericalStats) -> Result<NumericSpec> {
    if !data_type.supports_numeric_stats() {
        return Err(Error::schema_violation(
            path,
            format!("numerical_stats are not supported for {data_type} columns"),
        ));
    }

    let shape = match (stats.std_dev, stats.min_value, stats.max_value) {
        (Some(std_dev), min, max) if std_dev > 0.0 => {
            // Without a mean, centre inside the declared bounds; one std_dev
            // away from a lone bound.
            let centre = match (min, max) {
                (Some(min), Some(max)) => min + (max - min) / 2.0,
                (Some(min), None) => min + std_dev,
                (None, Some(max)) => max - std_dev,
                (None, None) => 0.0,
            };
            NumericShape::Normal {
                mean: stats.mean_value.unwrap_or(centre),
                std_dev,
            }
        }
        (_, Some(min), Some(max)) => NumericShape::Uniform { min, max },
        _ => match stats.mean_value {
            Some(value) => NumericShape::Fixed { value },
            None => {
                return Err(Error::schema_violation(
                    path,
                    "numerical_stats needs std_dev, both bounds or a mean_value",
                ));
            }
        },
    };

    Ok(NumericSpec {
        min: stats.min_value,
        max: stats.max_value,
        mean: stats.mean_value,
        std_dev: stats.std_dev,
        distinct_count: stats.distinct_count.filter(|count| *count > 0),
        integer: data_type.is_integer_like(),
        shape,
    })
}

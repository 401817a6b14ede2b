use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::types::DataType;

/// Declarative description of one table.
///
/// Column order follows the source document and drives output column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TableSchema {
    pub table_name: String,
    #[serde(with = "ordered_map")]
    #[schemars(with = "BTreeMap<String, ColumnSpec>")]
    pub columns: Vec<(String, ColumnSpec)>,
}

impl TableSchema {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            columns: Vec::new(),
        }
    }

    /// Append a column, keeping declaration order.
    pub fn with_column(mut self, name: impl Into<String>, spec: ColumnSpec) -> Self {
        self.columns.push((name.into(), spec));
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, spec)| spec)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Name of the first column flagged as primary key.
    pub fn primary_key(&self) -> Option<&str> {
        self.columns
            .iter()
            .find(|(_, spec)| spec.is_primary_key)
            .map(|(name, _)| name.as_str())
    }

    /// Tables referenced by foreign-key columns, in declaration order.
    pub fn referenced_tables(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter_map(|(_, spec)| spec.references.as_ref())
            .map(|reference| reference.table_name.as_str())
    }
}

/// Column specification as found in schema files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnSpec {
    pub data_type: DataType,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub is_primary_key: bool,
    /// Allowed literal values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categorical_values: Option<Vec<serde_json::Value>>,
    /// Value to weight mapping; weights are normalized over their total.
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        with = "ordered_map"
    )]
    #[schemars(with = "BTreeMap<String, f64>")]
    pub value_distribution: Vec<(String, f64)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numerical_stats: Option<NumericalStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<ColumnReference>,
    /// Null rate for columns without `numerical_stats`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub null_percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant_value: Option<serde_json::Value>,
    /// Prefix for STRING primary keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ColumnSpec {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            nullable: default_nullable(),
            is_primary_key: false,
            categorical_values: None,
            value_distribution: Vec::new(),
            numerical_stats: None,
            references: None,
            null_percentage: None,
            constant_value: None,
            key_prefix: None,
            description: None,
        }
    }

    pub fn primary_key(data_type: DataType) -> Self {
        Self {
            nullable: false,
            is_primary_key: true,
            ..Self::new(data_type)
        }
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn with_values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<serde_json::Value>,
    {
        self.categorical_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_distribution<I, K>(mut self, weights: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        self.value_distribution = weights
            .into_iter()
            .map(|(key, weight)| (key.into(), weight))
            .collect();
        self
    }

    pub fn with_stats(mut self, stats: NumericalStats) -> Self {
        self.numerical_stats = Some(stats);
        self
    }

    pub fn with_null_percentage(mut self, percentage: f64) -> Self {
        self.null_percentage = Some(percentage);
        self
    }

    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.references = Some(ColumnReference {
            table_name: table.into(),
            column_name: column.into(),
        });
        self
    }

    /// Null percentage in effect: `numerical_stats` wins over the column-level value.
    pub fn declared_null_percentage(&self) -> Option<f64> {
        self.numerical_stats
            .as_ref()
            .and_then(|stats| stats.null_percentage)
            .or(self.null_percentage)
    }
}

/// Summary statistics a numeric column should approximate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NumericalStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std_dev: Option<f64>,
    /// Percentage of null rows, 0–100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub null_percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distinct_count: Option<u64>,
}

/// Foreign-key target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnReference {
    pub table_name: String,
    pub column_name: String,
}

fn default_nullable() -> bool {
    true
}

/// Serde adapter keeping JSON object entries in document order.
mod ordered_map {
    use std::fmt;
    use std::marker::PhantomData;

    use serde::de::{self, Deserialize, Deserializer, MapAccess, Visitor};
    use serde::ser::{Serialize, SerializeMap, Serializer};

    pub fn serialize<S, T>(entries: &[(String, T)], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, value) in entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Vec<(String, T)>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }

    struct OrderedVisitor<T>(PhantomData<T>);

    impl<'de, T> Visitor<'de> for OrderedVisitor<T>
    where
        T: Deserialize<'de>,
    {
        type Value = Vec<(String, T)>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a map")
        }

        fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut entries: Vec<(String, T)> = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((key, value)) = access.next_entry::<String, T>()? {
                if entries.iter().any(|(existing, _)| existing == &key) {
                    return Err(de::Error::custom(format!("duplicate key '{key}'")));
                }
                entries.push((key, value));
            }
            Ok(entries)
        }
    }
}

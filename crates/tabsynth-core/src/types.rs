use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Logical data type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    #[serde(alias = "string", alias = "text", alias = "TEXT")]
    String,
    #[serde(alias = "integer", alias = "int", alias = "INT")]
    Integer,
    #[serde(alias = "float", alias = "double", alias = "DOUBLE")]
    Float,
    #[serde(alias = "boolean", alias = "bool", alias = "BOOL")]
    Boolean,
    #[serde(alias = "date")]
    Date,
    #[serde(alias = "datetime", alias = "timestamp", alias = "TIMESTAMP")]
    Datetime,
}

impl DataType {
    /// Types whose numeric statistics are sampled on an integer grid.
    pub fn is_integer_like(self) -> bool {
        matches!(self, DataType::Integer | DataType::Date | DataType::Datetime)
    }

    /// Types that accept `numerical_stats`.
    pub fn supports_numeric_stats(self) -> bool {
        matches!(
            self,
            DataType::Integer | DataType::Float | DataType::Date | DataType::Datetime
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DataType::String => "STRING",
            DataType::Integer => "INTEGER",
            DataType::Float => "FLOAT",
            DataType::Boolean => "BOOLEAN",
            DataType::Date => "DATE",
            DataType::Datetime => "DATETIME",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};

use crate::types::DataType;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const TIMESTAMP_INPUT_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// A single typed cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Canonical string used to group equal values (frequency tables, key sets).
    pub fn key(&self) -> String {
        match self {
            Value::Null => "<null>".to_string(),
            other => other.to_string(),
        }
    }

    /// Numeric projection used for statistics.
    ///
    /// Dates map to days and timestamps to seconds since 1970-01-01.
    pub fn to_numeric(&self) -> Option<f64> {
        match self {
            Value::Int(value) => Some(*value as f64),
            Value::Float(value) => Some(*value),
            Value::Date(value) => Some((*value - epoch_date()).num_days() as f64),
            Value::Timestamp(value) => Some(value.and_utc().timestamp() as f64),
            _ => None,
        }
    }

    /// Inverse of [`Value::to_numeric`] for numeric-capable types.
    pub fn from_numeric(data_type: DataType, raw: f64) -> Option<Value> {
        if !raw.is_finite() {
            return None;
        }
        match data_type {
            DataType::Integer => Some(Value::Int(raw as i64)),
            DataType::Float => Some(Value::Float(raw)),
            DataType::Date => epoch_date()
                .checked_add_signed(chrono::Duration::days(raw as i64))
                .map(Value::Date),
            DataType::Datetime => DateTime::from_timestamp(raw as i64, 0)
                .map(|value| Value::Timestamp(value.naive_utc())),
            DataType::String | DataType::Boolean => None,
        }
    }

    /// Coerce a schema literal into a value of `data_type`.
    pub fn coerce_literal(
        data_type: DataType,
        literal: &serde_json::Value,
    ) -> Result<Value, String> {
        use serde_json::Value as Json;

        let invalid = || format!("literal {literal} is not a valid {data_type}");
        match (data_type, literal) {
            (_, Json::Null) => Err("null is not an allowed literal".to_string()),
            (DataType::String, Json::String(value)) => Ok(Value::Text(value.clone())),
            (DataType::String, other) => Ok(Value::Text(other.to_string())),
            (DataType::Integer, Json::Number(number)) => number
                .as_i64()
                .or_else(|| {
                    number
                        .as_f64()
                        .filter(|value| value.fract() == 0.0)
                        .map(|value| value as i64)
                })
                .map(Value::Int)
                .ok_or_else(invalid),
            (DataType::Integer, Json::String(value)) => value
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| invalid()),
            (DataType::Float, Json::Number(number)) => {
                number.as_f64().map(Value::Float).ok_or_else(invalid)
            }
            (DataType::Float, Json::String(value)) => value
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .map(Value::Float)
                .ok_or_else(invalid),
            (DataType::Boolean, Json::Bool(value)) => Ok(Value::Bool(*value)),
            (DataType::Boolean, Json::String(value)) => {
                match value.trim().to_ascii_lowercase().as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    _ => Err(invalid()),
                }
            }
            (DataType::Date, Json::String(value)) => {
                NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
                    .map(Value::Date)
                    .map_err(|_| invalid())
            }
            (DataType::Datetime, Json::String(value)) => TIMESTAMP_INPUT_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(value.trim(), format).ok())
                .map(Value::Timestamp)
                .ok_or_else(invalid),
            _ => Err(invalid()),
        }
    }

    /// Coerce a distribution key (always a JSON object key) into a value.
    pub fn coerce_key(data_type: DataType, key: &str) -> Result<Value, String> {
        Value::coerce_literal(data_type, &serde_json::Value::String(key.to_string()))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::Text(value) => f.write_str(value),
            Value::Date(value) => write!(f, "{}", value.format(DATE_FORMAT)),
            Value::Timestamp(value) => write!(f, "{}", value.format(TIMESTAMP_FORMAT)),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(value) => serializer.serialize_bool(*value),
            Value::Int(value) => serializer.serialize_i64(*value),
            Value::Float(value) => serializer.serialize_f64(*value),
            Value::Text(value) => serializer.serialize_str(value),
            Value::Date(_) | Value::Timestamp(_) => serializer.collect_str(self),
        }
    }
}

fn epoch_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coerces_literals_per_type() {
        assert_eq!(
            Value::coerce_literal(DataType::Integer, &json!("42")),
            Ok(Value::Int(42))
        );
        assert_eq!(
            Value::coerce_literal(DataType::Integer, &json!(7.0)),
            Ok(Value::Int(7))
        );
        assert_eq!(
            Value::coerce_literal(DataType::Boolean, &json!("TRUE")),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            Value::coerce_literal(DataType::String, &json!(3)),
            Ok(Value::Text("3".to_string()))
        );
        assert!(Value::coerce_literal(DataType::Integer, &json!("abc")).is_err());
        assert!(Value::coerce_literal(DataType::Date, &json!("2024-13-01")).is_err());
    }

    #[test]
    fn date_numeric_projection_is_days_since_epoch() {
        let date = Value::coerce_literal(DataType::Date, &json!("1970-01-11")).unwrap();
        assert_eq!(date.to_numeric(), Some(10.0));
        assert_eq!(Value::from_numeric(DataType::Date, 10.0), Some(date));
    }

    #[test]
    fn keys_match_between_literal_and_display() {
        let declared = Value::coerce_key(DataType::Float, "2.50").unwrap();
        assert_eq!(declared.key(), Value::Float(2.5).key());
        assert_eq!(Value::Null.key(), "<null>");
    }
}

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use tabsynth_core::Value;

use crate::errors::GenerationError;
use crate::model::GeneratedTable;

/// Serializes a table as an array of row objects, keys in column order.
pub struct JsonRows<'a>(pub &'a GeneratedTable);

struct JsonRow<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl Serialize for JsonRows<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let table = self.0;
        let mut seq = serializer.serialize_seq(Some(table.row_count()))?;
        for row in table.rows() {
            seq.serialize_element(&JsonRow {
                columns: table.columns(),
                values: row,
            })?;
        }
        seq.end()
    }
}

impl Serialize for JsonRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in self.columns.iter().zip(self.values) {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Write a table as a pretty-printed JSON array; returns bytes written.
pub fn write_table_json(path: &Path, table: &GeneratedTable) -> Result<u64, GenerationError> {
    let bytes = serde_json::to_vec_pretty(&JsonRows(table))?;
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(bytes.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_keep_column_order() {
        let table = GeneratedTable::from_rows(
            "users",
            vec!["zeta".to_string(), "alpha".to_string()],
            vec![vec![Value::Int(1), Value::Null]],
            None,
        )
        .expect("build table");
        let text = serde_json::to_string(&JsonRows(&table)).expect("to json");
        assert_eq!(text, r#"[{"zeta":1,"alpha":null}]"#);
    }
}

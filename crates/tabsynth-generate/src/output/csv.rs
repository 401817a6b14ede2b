use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::model::GeneratedTable;

/// Write a table as CSV: a header row, then one record per row.
///
/// Nulls are written as empty fields.
pub fn write_table_csv(path: &Path, table: &GeneratedTable) -> Result<u64, csv::Error> {
    let writer = BufWriter::new(File::create(path).map_err(csv::Error::from)?);
    let counting = CountingWriter::new(writer);
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(counting);

    writer.write_record(table.columns())?;

    for row in table.rows() {
        writer.write_record(row.iter().map(|value| value.to_string()))?;
    }

    writer.flush()?;
    let counting = writer.into_inner().map_err(|err| err.into_error())?;
    Ok(counting.bytes_written())
}

struct CountingWriter<W: Write> {
    inner: W,
    bytes: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, bytes: 0 }
    }

    fn bytes_written(&self) -> u64 {
        self.bytes
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let size = self.inner.write(buf)?;
        self.bytes = self.bytes.saturating_add(size as u64);
        Ok(size)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabsynth_core::Value;

    #[test]
    fn writes_header_and_empty_nulls() {
        let table = GeneratedTable::from_rows(
            "users",
            vec!["id".to_string(), "name".to_string()],
            vec![
                vec![Value::Int(1), Value::Text("Ada, L".to_string())],
                vec![Value::Int(2), Value::Null],
            ],
            Some("id".to_string()),
        )
        .expect("build table");
        let path = std::env::temp_dir().join(format!("tabsynth_csv_{}.csv", std::process::id()));

        let bytes = write_table_csv(&path, &table).expect("write csv");
        let contents = std::fs::read_to_string(&path).expect("read csv");
        let _ = std::fs::remove_file(&path);

        assert_eq!(contents, "id,name\n1,\"Ada, L\"\n2,\n");
        assert_eq!(bytes, contents.len() as u64);
    }
}

use std::path::Path;

use serde::Deserialize;

use crate::error::Result;
use crate::schema::TableSchema;

/// Accepted shapes of a schema file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SchemaDocument {
    Single(TableSchema),
    Many(Vec<TableSchema>),
    Wrapped { tables: Vec<TableSchema> },
}

impl SchemaDocument {
    fn into_tables(self) -> Vec<TableSchema> {
        match self {
            SchemaDocument::Single(table) => vec![table],
            SchemaDocument::Many(tables) | SchemaDocument::Wrapped { tables } => tables,
        }
    }
}

/// Parse table schemas from a JSON document.
///
/// The document may hold one table object, an array of them, or
/// `{ "tables": [...] }`.
pub fn parse_schemas(json: &str) -> Result<Vec<TableSchema>> {
    let document: SchemaDocument = serde_json::from_str(json)?;
    Ok(document.into_tables())
}

/// Load table schemas from one or more JSON files, in argument order.
pub fn load_schema_files<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<TableSchema>> {
    let mut tables = Vec::new();
    for path in paths {
        let contents = std::fs::read_to_string(path.as_ref())?;
        tables.extend(parse_schemas(&contents)?);
    }
    Ok(tables)
}

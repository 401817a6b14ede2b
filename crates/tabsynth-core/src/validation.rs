use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::graph::{DependencyReport, build_dependency_report};
use crate::resolve::{ColumnKind, ResolvedTable, resolve_table};
use crate::schema::TableSchema;

/// Resolved tables plus their dependency ordering.
#[derive(Debug, Clone)]
pub struct ResolvedSchema {
    pub tables: Vec<ResolvedTable>,
    /// Table names grouped into dependency levels (referenced tables first).
    pub levels: Vec<Vec<String>>,
    pub dependencies: DependencyReport,
}

impl ResolvedSchema {
    pub fn table(&self, name: &str) -> Option<&ResolvedTable> {
        self.tables.iter().find(|table| table.name == name)
    }
}

/// Resolve and cross-check a set of table schemas.
///
/// This checks:
/// - every table resolves on its own
/// - table names are unique
/// - foreign keys point at declared tables and columns
/// - referenced columns are primary keys of matching type
/// - the reference graph is acyclic
pub fn resolve_schemas(schemas: &[TableSchema]) -> Result<ResolvedSchema> {
    let mut tables = Vec::with_capacity(schemas.len());
    for schema in schemas {
        tables.push(resolve_table(schema)?);
    }

    let mut by_name: BTreeMap<&str, &ResolvedTable> = BTreeMap::new();
    for table in &tables {
        if by_name.insert(table.name.as_str(), table).is_some() {
            return Err(Error::schema_violation(
                table.name.as_str(),
                "duplicate table name",
            ));
        }
    }

    for table in &tables {
        for (column, reference) in table.foreign_keys() {
            let path = table.path(&column.name);
            let target = by_name.get(reference.table.as_str()).ok_or_else(|| {
                Error::missing_reference(
                    path.clone(),
                    format!("referenced table '{}' is not declared", reference.table),
                )
            })?;
            let target_column = target.column(&reference.column).ok_or_else(|| {
                Error::missing_reference(
                    path.clone(),
                    format!(
                        "referenced column '{}.{}' is not declared",
                        reference.table, reference.column
                    ),
                )
            })?;
            if !matches!(target_column.kind, ColumnKind::PrimaryKey(_)) {
                return Err(Error::schema_violation(
                    path,
                    format!(
                        "referenced column '{}.{}' is not a primary key",
                        reference.table, reference.column
                    ),
                ));
            }
            if target_column.data_type != column.data_type {
                return Err(Error::schema_violation(
                    path,
                    format!(
                        "type {} does not match referenced {} column '{}.{}'",
                        column.data_type,
                        target_column.data_type,
                        reference.table,
                        reference.column
                    ),
                ));
            }
        }
    }

    let dependencies = build_dependency_report(&tables);
    if let Some(cycle) = &dependencies.cycle {
        return Err(Error::CyclicReference {
            tables: cycle.clone(),
        });
    }
    let levels = dependencies.levels.clone().unwrap_or_default();

    Ok(ResolvedSchema {
        tables,
        levels,
        dependencies,
    })
}

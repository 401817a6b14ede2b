use std::collections::BTreeSet;

use tabsynth_core::ResolvedSchema;

use crate::errors::GenerationError;
use crate::model::RowPlan;

/// Planned generation task for a table.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationTask {
    pub table: String,
    pub rows: u64,
}

/// Group tables into dependency levels with their row counts.
///
/// Tables inside one level never reference each other and may run
/// concurrently; every level only depends on earlier ones.
pub fn plan_levels(
    schema: &ResolvedSchema,
    rows: &RowPlan,
) -> Result<Vec<Vec<GenerationTask>>, GenerationError> {
    let declared: BTreeSet<&str> = schema.tables.iter().map(|table| table.name.as_str()).collect();
    if let Some(unknown) = rows
        .per_table
        .keys()
        .find(|table| !declared.contains(table.as_str()))
    {
        return Err(GenerationError::InvalidPlan(format!(
            "row count given for undeclared table '{unknown}'"
        )));
    }

    let levels: Vec<Vec<GenerationTask>> = schema
        .levels
        .iter()
        .map(|level| {
            level
                .iter()
                .map(|table| GenerationTask {
                    table: table.clone(),
                    rows: rows.rows_for(table),
                })
                .collect()
        })
        .collect();

    if levels.iter().all(Vec::is_empty) {
        return Err(GenerationError::InvalidPlan(
            "no generation targets resolved".to_string(),
        ));
    }

    Ok(levels)
}

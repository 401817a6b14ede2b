use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tabsynth_core::Value;

use crate::model::GeneratedTable;

/// Primary-key pools of already generated tables.
///
/// Pools are shared read-only with the foreign-key generators of dependent
/// tables, so a registered table is never mutated again.
#[derive(Debug, Default, Clone)]
pub struct ReferenceRegistry {
    pools: BTreeMap<String, Arc<Vec<Value>>>,
    members: BTreeMap<String, Arc<HashSet<String>>>,
}

impl ReferenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the primary-key column of a finished table.
    ///
    /// Tables without a primary key contribute nothing; they cannot be
    /// referenced.
    pub fn register(&mut self, table: &GeneratedTable) {
        let Some(pk) = table.primary_key() else {
            return;
        };
        let Some(values) = table.column_values(pk) else {
            return;
        };
        let pool: Vec<Value> = values.filter(|value| !value.is_null()).cloned().collect();
        let members = pool.iter().map(Value::key).collect();
        let key = column_key(table.name(), pk);
        self.members.insert(key.clone(), Arc::new(members));
        self.pools.insert(key, Arc::new(pool));
    }

    pub fn pool(&self, table: &str, column: &str) -> Option<Arc<Vec<Value>>> {
        self.pools.get(&column_key(table, column)).cloned()
    }

    pub fn contains(&self, table: &str, column: &str, value: &Value) -> bool {
        self.members
            .get(&column_key(table, column))
            .is_some_and(|members| members.contains(&value.key()))
    }

    pub fn has_table(&self, table: &str) -> bool {
        let prefix = format!("{table}.");
        self.pools.keys().any(|key| key.starts_with(&prefix))
    }
}

fn column_key(table: &str, column: &str) -> String {
    format!("{table}.{column}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_primary_key_pool() {
        let table = GeneratedTable::from_rows(
            "users",
            vec!["id".to_string(), "name".to_string()],
            vec![
                vec![Value::Int(1), Value::Text("a".to_string())],
                vec![Value::Int(2), Value::Text("b".to_string())],
            ],
            Some("id".to_string()),
        )
        .expect("build table");

        let mut registry = ReferenceRegistry::new();
        registry.register(&table);

        let pool = registry.pool("users", "id").expect("pool");
        assert_eq!(pool.as_slice(), &[Value::Int(1), Value::Int(2)]);
        assert!(registry.contains("users", "id", &Value::Int(2)));
        assert!(!registry.contains("users", "id", &Value::Int(3)));
        assert!(registry.pool("users", "name").is_none());
        assert!(registry.has_table("users"));
    }
}

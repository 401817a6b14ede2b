use std::collections::HashSet;

use rand::RngCore;
use tabsynth_core::{DataType, KeySpec, Value};

use crate::errors::GenerationError;
use crate::generators::{ColumnGenerator, preallocation};

/// Issues strictly unique keys from a monotonic counter.
///
/// INTEGER keys count up from `start`; STRING keys render the same counter
/// behind the column prefix, zero padded to six digits.
#[derive(Debug)]
pub struct PrimaryKeyGenerator {
    path: String,
    data_type: DataType,
    prefix: String,
    next: i64,
    max: Option<i64>,
    limit: Option<u64>,
    issued: u64,
    used: HashSet<i64>,
}

impl PrimaryKeyGenerator {
    /// Fails up front when `rows` unique keys cannot fit the declared limits.
    pub fn new(
        path: &str,
        data_type: DataType,
        key: &KeySpec,
        rows: u64,
    ) -> Result<Self, GenerationError> {
        if let Some(limit) = key.distinct_limit.filter(|limit| *limit < rows) {
            return Err(GenerationError::constraint(
                path,
                format!("{rows} unique keys requested but distinct_count is {limit}"),
            ));
        }
        if let Some(max) = key.max {
            let capacity = (max as i128 - key.start as i128 + 1).max(0) as u128;
            if capacity < rows as u128 {
                return Err(GenerationError::constraint(
                    path,
                    format!(
                        "{rows} unique keys requested but range {}..={max} holds {capacity}",
                        key.start
                    ),
                ));
            }
        }

        Ok(Self {
            path: path.to_string(),
            data_type,
            prefix: key.prefix.clone(),
            next: key.start,
            max: key.max,
            limit: key.distinct_limit,
            issued: 0,
            used: HashSet::with_capacity(preallocation(rows)),
        })
    }

    fn exhausted(&self) -> Option<String> {
        if self.limit.is_some_and(|limit| self.issued >= limit) {
            return Some(format!(
                "distinct_count {} exhausted",
                self.limit.unwrap_or_default()
            ));
        }
        if self.max.is_some_and(|max| self.next > max) {
            return Some(format!("key range exhausted at {}", self.next));
        }
        None
    }
}

impl ColumnGenerator for PrimaryKeyGenerator {
    fn id(&self) -> &'static str {
        "primary_key"
    }

    fn next_value(&mut self, _rng: &mut dyn RngCore) -> Result<Value, GenerationError> {
        if let Some(message) = self.exhausted() {
            return Err(GenerationError::constraint(&self.path, message));
        }
        let current = self.next;
        if !self.used.insert(current) {
            return Err(GenerationError::constraint(
                &self.path,
                format!("key {current} issued twice"),
            ));
        }
        self.next = current.checked_add(1).ok_or_else(|| {
            GenerationError::constraint(&self.path, "key sequence overflowed i64")
        })?;
        self.issued += 1;

        Ok(match self.data_type {
            DataType::String => Value::Text(format!("{}{current:06}", self.prefix)),
            _ => Value::Int(current),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::MAX_PREALLOCATED_ROWS;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn key(start: i64, max: Option<i64>, limit: Option<u64>) -> KeySpec {
        KeySpec {
            start,
            max,
            prefix: "user_".to_string(),
            distinct_limit: limit,
        }
    }

    #[test]
    fn unbounded_row_count_reserves_a_bounded_set() {
        let generator = PrimaryKeyGenerator::new(
            "users.id",
            DataType::Integer,
            &key(1, None, None),
            u64::MAX,
        )
        .expect("build generator");
        assert!(generator.used.capacity() < 4 * MAX_PREALLOCATED_ROWS as usize);
        assert_eq!(preallocation(u64::MAX), MAX_PREALLOCATED_ROWS as usize);
        assert_eq!(preallocation(12), 12);
    }

    #[test]
    fn integer_keys_count_up_from_start() {
        let mut generator =
            PrimaryKeyGenerator::new("users.id", DataType::Integer, &key(1000, None, None), 3)
                .expect("build generator");
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let values: Vec<Value> = (0..3)
            .map(|_| generator.next_value(&mut rng).expect("key"))
            .collect();
        assert_eq!(
            values,
            vec![Value::Int(1000), Value::Int(1001), Value::Int(1002)]
        );
    }

    #[test]
    fn string_keys_use_prefix() {
        let mut generator =
            PrimaryKeyGenerator::new("users.code", DataType::String, &key(1, None, None), 2)
                .expect("build generator");
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(
            generator.next_value(&mut rng).expect("key"),
            Value::Text("user_000001".to_string())
        );
    }

    #[test]
    fn rejects_rows_beyond_distinct_count() {
        let err = PrimaryKeyGenerator::new("users.id", DataType::Integer, &key(1, None, Some(5)), 6)
            .unwrap_err();
        assert!(matches!(err, GenerationError::ConstraintViolation { ref path, .. } if path == "users.id"));
    }

    #[test]
    fn rejects_rows_beyond_range() {
        let err =
            PrimaryKeyGenerator::new("users.id", DataType::Integer, &key(1, Some(10), None), 11)
                .unwrap_err();
        assert!(matches!(err, GenerationError::ConstraintViolation { .. }));
    }

    #[test]
    fn extra_draws_fail_once_limit_is_reached() {
        let mut generator =
            PrimaryKeyGenerator::new("users.id", DataType::Integer, &key(1, None, Some(2)), 2)
                .expect("build generator");
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        generator.next_value(&mut rng).expect("first");
        generator.next_value(&mut rng).expect("second");
        assert!(generator.next_value(&mut rng).is_err());
    }
}

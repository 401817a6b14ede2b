use std::collections::HashMap;
use std::sync::Arc;

use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use rand::{Rng, RngCore};
use tabsynth_core::{Value, WeightedValue};

use crate::errors::GenerationError;
use crate::generators::ColumnGenerator;

/// Samples foreign-key values, with replacement, from a referenced key pool.
#[derive(Debug)]
pub struct ReferenceGenerator {
    pool: Arc<Vec<Value>>,
    index: Option<WeightedIndex<f64>>,
}

impl ReferenceGenerator {
    /// Uniform over `pool` when `weights` is empty; otherwise each pool value
    /// takes the weight declared for it and undeclared values are never drawn.
    pub fn new(
        path: &str,
        pool: Arc<Vec<Value>>,
        weights: &[WeightedValue],
    ) -> Result<Self, GenerationError> {
        if pool.is_empty() {
            return Err(GenerationError::constraint(
                path,
                "referenced table generated no keys",
            ));
        }
        if weights.is_empty() {
            return Ok(Self { pool, index: None });
        }

        let by_key: HashMap<String, f64> = weights
            .iter()
            .map(|entry| (entry.value.key(), entry.weight))
            .collect();
        let pool_weights: Vec<f64> = pool
            .iter()
            .map(|value| by_key.get(&value.key()).copied().unwrap_or(0.0))
            .collect();
        let index = WeightedIndex::new(&pool_weights).map_err(|err| {
            GenerationError::constraint(
                path,
                format!("no weighted reference value exists in the referenced keys: {err}"),
            )
        })?;
        Ok(Self {
            pool,
            index: Some(index),
        })
    }
}

impl ColumnGenerator for ReferenceGenerator {
    fn id(&self) -> &'static str {
        "reference"
    }

    fn next_value(&mut self, rng: &mut dyn RngCore) -> Result<Value, GenerationError> {
        let idx = match &self.index {
            Some(index) => index.sample(rng),
            None => rng.random_range(0..self.pool.len()),
        };
        Ok(self.pool[idx].clone())
    }
}

use rand::RngCore;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;

use tabsynth_core::{CategoricalSpec, Error as CoreError, Value};

use crate::errors::GenerationError;
use crate::generators::ColumnGenerator;

/// Weighted draw over a fixed categorical table.
#[derive(Debug)]
pub struct CategoricalGenerator {
    values: Vec<Value>,
    index: WeightedIndex<f64>,
}

impl CategoricalGenerator {
    pub fn new(path: &str, spec: &CategoricalSpec) -> Result<Self, GenerationError> {
        if spec.entries.is_empty() {
            return Err(
                CoreError::schema_violation(path, "no categorical value has a positive weight").into(),
            );
        }
        let index = WeightedIndex::new(spec.entries.iter().map(|entry| entry.weight))
            .map_err(|err| CoreError::schema_violation(path, format!("invalid weights: {err}")))?;
        Ok(Self {
            values: spec.entries.iter().map(|entry| entry.value.clone()).collect(),
            index,
        })
    }
}

impl ColumnGenerator for CategoricalGenerator {
    fn id(&self) -> &'static str {
        "categorical"
    }

    fn next_value(&mut self, rng: &mut dyn RngCore) -> Result<Value, GenerationError> {
        Ok(self.values[self.index.sample(rng)].clone())
    }
}

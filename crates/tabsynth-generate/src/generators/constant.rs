use rand::RngCore;
use tabsynth_core::Value;

use crate::errors::GenerationError;
use crate::generators::ColumnGenerator;

/// Emits the same literal for every row.
#[derive(Debug)]
pub struct ConstantGenerator {
    value: Value,
}

impl ConstantGenerator {
    pub fn new(value: Value) -> Self {
        Self { value }
    }
}

impl ColumnGenerator for ConstantGenerator {
    fn id(&self) -> &'static str {
        "constant"
    }

    fn next_value(&mut self, _rng: &mut dyn RngCore) -> Result<Value, GenerationError> {
        Ok(self.value.clone())
    }
}

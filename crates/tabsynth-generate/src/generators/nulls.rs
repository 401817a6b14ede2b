use rand::{Rng, RngCore};
use tabsynth_core::Value;

use crate::errors::GenerationError;
use crate::generators::ColumnGenerator;

/// Replaces a generator's output with null on an independent per-row trial.
pub struct NullInjector {
    inner: Box<dyn ColumnGenerator>,
    probability: f64,
}

impl NullInjector {
    /// `probability` is the fraction of null rows, 0–1.
    pub fn new(inner: Box<dyn ColumnGenerator>, probability: f64) -> Self {
        Self {
            inner,
            probability: probability.clamp(0.0, 1.0),
        }
    }
}

impl ColumnGenerator for NullInjector {
    fn id(&self) -> &'static str {
        self.inner.id()
    }

    fn next_value(&mut self, rng: &mut dyn RngCore) -> Result<Value, GenerationError> {
        if rng.random_bool(self.probability) {
            return Ok(Value::Null);
        }
        self.inner.next_value(rng)
    }

    fn clamped(&self) -> u64 {
        self.inner.clamped()
    }
}

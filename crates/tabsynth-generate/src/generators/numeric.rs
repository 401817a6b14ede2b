use std::f64::consts::TAU;

use rand::{Rng, RngCore};
use tabsynth_core::{DataType, NumericShape, NumericSpec, Value};

use crate::errors::GenerationError;
use crate::generators::{ColumnGenerator, preallocation};

/// Samples a numeric column from its fitted distribution.
///
/// Normal samples outside the bounds are re-drawn up to `max_attempts`
/// times and then clamped to the nearest bound; every clamp is counted.
#[derive(Debug)]
pub struct NumericGenerator {
    path: String,
    data_type: DataType,
    shape: NumericShape,
    min: Option<f64>,
    max: Option<f64>,
    integer: bool,
    max_attempts: u32,
    pool: Option<Vec<Value>>,
    clamped: u64,
}

impl NumericGenerator {
    pub fn new(path: &str, data_type: DataType, spec: &NumericSpec, max_attempts: u32) -> Self {
        Self {
            path: path.to_string(),
            data_type,
            shape: spec.shape,
            min: spec.min,
            max: spec.max,
            integer: spec.integer,
            max_attempts: max_attempts.max(1),
            pool: None,
            clamped: 0,
        }
    }

    /// Pre-draw `size` candidates; later calls sample the pool with replacement.
    pub fn materialize_pool(
        &mut self,
        size: u64,
        rng: &mut dyn RngCore,
    ) -> Result<(), GenerationError> {
        let mut pool = Vec::with_capacity(preallocation(size));
        for _ in 0..size {
            pool.push(self.sample(rng)?);
        }
        self.pool = Some(pool);
        Ok(())
    }

    fn sample(&mut self, rng: &mut dyn RngCore) -> Result<Value, GenerationError> {
        let raw = match self.shape {
            NumericShape::Fixed { value } => value,
            NumericShape::Uniform { min, max } => self.uniform(rng, min, max),
            NumericShape::Normal { mean, std_dev } => self.truncated_normal(rng, mean, std_dev),
        };
        let raw = if self.integer { self.snap(raw) } else { raw };
        Value::from_numeric(self.data_type, raw).ok_or_else(|| {
            GenerationError::constraint(
                &self.path,
                format!("sample {raw} is not representable as {}", self.data_type),
            )
        })
    }

    fn uniform(&self, rng: &mut dyn RngCore, min: f64, max: f64) -> f64 {
        if self.integer {
            let (low, high) = (min.ceil() as i64, max.floor() as i64);
            if low >= high {
                return low as f64;
            }
            return rng.random_range(low..=high) as f64;
        }
        if min >= max {
            return min;
        }
        rng.random_range(min..=max)
    }

    fn truncated_normal(&mut self, rng: &mut dyn RngCore, mean: f64, std_dev: f64) -> f64 {
        let mut sample = mean;
        for _ in 0..self.max_attempts {
            sample = mean + std_dev * standard_normal(rng);
            if self.within_bounds(sample) {
                return sample;
            }
        }
        self.clamped += 1;
        self.clamp(sample)
    }

    fn within_bounds(&self, raw: f64) -> bool {
        self.min.is_none_or(|min| raw >= min) && self.max.is_none_or(|max| raw <= max)
    }

    fn clamp(&self, raw: f64) -> f64 {
        let raw = self.min.map_or(raw, |min| raw.max(min));
        self.max.map_or(raw, |max| raw.min(max))
    }

    /// Round to the nearest integer, then keep it inside the integer bounds.
    fn snap(&self, raw: f64) -> f64 {
        let rounded = raw.round();
        let rounded = self.min.map_or(rounded, |min| rounded.max(min.ceil()));
        self.max.map_or(rounded, |max| rounded.min(max.floor()))
    }
}

impl ColumnGenerator for NumericGenerator {
    fn id(&self) -> &'static str {
        "numeric"
    }

    fn next_value(&mut self, rng: &mut dyn RngCore) -> Result<Value, GenerationError> {
        if let Some(pool) = self.pool.as_ref().filter(|pool| !pool.is_empty()) {
            return Ok(pool[rng.random_range(0..pool.len())].clone());
        }
        self.sample(rng)
    }

    fn clamped(&self) -> u64 {
        self.clamped
    }
}

/// Box-Muller draw from N(0, 1).
fn standard_normal(rng: &mut dyn RngCore) -> f64 {
    let u1: f64 = 1.0 - rng.random::<f64>();
    let u2: f64 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tabsynth_core::Value;

/// Statistics observed in one generated column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservedStats {
    pub rows: u64,
    pub nulls: u64,
    pub distinct: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    /// Sample standard deviation (n - 1 denominator).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std_dev: Option<f64>,
    /// Occurrences of each non-null value, keyed by [`Value::key`].
    #[serde(skip)]
    pub frequencies: BTreeMap<String, u64>,
}

impl ObservedStats {
    /// Single pass over a column; numeric moments use Welford's update.
    pub fn collect<'a>(values: impl IntoIterator<Item = &'a Value>) -> Self {
        let mut stats = ObservedStats::default();
        let mut seen = HashSet::new();
        let mut numeric = 0u64;
        let mut mean = 0.0;
        let mut m2 = 0.0;

        for value in values {
            stats.rows += 1;
            if value.is_null() {
                stats.nulls += 1;
                continue;
            }
            let key = value.key();
            if seen.insert(key.clone()) {
                stats.distinct += 1;
            }
            *stats.frequencies.entry(key).or_insert(0) += 1;

            if let Some(raw) = value.to_numeric() {
                numeric += 1;
                let delta = raw - mean;
                mean += delta / numeric as f64;
                m2 += delta * (raw - mean);
                stats.min = Some(stats.min.map_or(raw, |min| min.min(raw)));
                stats.max = Some(stats.max.map_or(raw, |max| max.max(raw)));
            }
        }

        if numeric > 0 {
            stats.mean = Some(mean);
        }
        if numeric > 1 {
            stats.std_dev = Some((m2 / (numeric - 1) as f64).sqrt());
        }
        stats
    }

    pub fn non_null(&self) -> u64 {
        self.rows - self.nulls
    }

    pub fn null_rate(&self) -> f64 {
        if self.rows == 0 {
            0.0
        } else {
            self.nulls as f64 / self.rows as f64
        }
    }

    /// Share of `key` among non-null values.
    pub fn proportion(&self, key: &str) -> f64 {
        let non_null = self.non_null();
        if non_null == 0 {
            return 0.0;
        }
        self.frequencies.get(key).copied().unwrap_or(0) as f64 / non_null as f64
    }
}

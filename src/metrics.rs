use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::compression::BYTES_PER_MB;
use crate::data::TestResult;
use crate::types::ModuleName;
use crate::utils::{round1, round2};

/// Success/failure tallies for one grouping key (module or feature).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleStats {
    /// Artifacts seen.
    pub total: u64,
    /// Successful artifacts.
    pub success: u64,
    /// Failed artifacts.
    pub failure: u64,
}

impl ModuleStats {
    /// Count one artifact.
    pub fn record(&mut self, result: TestResult) {
        self.total += 1;
        match result {
            TestResult::Success => self.success += 1,
            TestResult::Failure => self.failure += 1,
        }
    }

    /// Percentage of successful runs, one decimal; `0.0` when empty.
    pub fn success_rate(&self) -> f64 {
        success_rate(self.success, self.total)
    }
}

/// Group `(key, result)` pairs into per-key tallies, keys sorted.
pub fn breakdown<'a, I>(items: I) -> BTreeMap<ModuleName, ModuleStats>
where
    I: IntoIterator<Item = (&'a str, TestResult)>,
{
    let mut stats: BTreeMap<ModuleName, ModuleStats> = BTreeMap::new();
    for (key, result) in items {
        stats.entry(key.to_string()).or_default().record(result);
    }
    stats
}

/// `part / total` as a percentage with one decimal; `0.0` when `total == 0`.
pub fn success_rate(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round1(part as f64 / total as f64 * 100.0)
}

/// Decimal megabytes, two decimals.
pub fn bytes_to_mb(bytes: u64) -> f64 {
    round2(bytes as f64 / BYTES_PER_MB as f64)
}

/// Size reduction in percent (`0.0` when nothing was saved or the original is empty).
pub fn reduction_pct(original: u64, compressed: u64) -> f64 {
    if original == 0 || compressed >= original {
        return 0.0;
    }
    round1((original - compressed) as f64 / original as f64 * 100.0)
}

/// Arithmetic mean, `0.0` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

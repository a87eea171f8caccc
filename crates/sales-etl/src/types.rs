use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Statistics produced by one transformer step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepStats {
    /// Rows entering the step.
    pub rows_before: usize,
    /// Rows leaving the step.
    pub rows_after: usize,
    /// Per-column (or per-metric) counts, e.g. values imputed in `Size`.
    pub counts: BTreeMap<String, usize>,
    /// Human-readable description of what the step did.
    pub message: String,
}

impl StepStats {
    pub fn new(rows_before: usize, rows_after: usize) -> Self {
        Self {
            rows_before,
            rows_after,
            ..Default::default()
        }
    }

    pub fn with_count(mut self, key: impl Into<String>, count: usize) -> Self {
        self.counts.insert(key.into(), count);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn rows_removed(&self) -> usize {
        self.rows_before.saturating_sub(self.rows_after)
    }

    /// Sum of all recorded counts.
    pub fn total_count(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn count(&self, key: &str) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }
}

/// One executed step with its statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: String,
    pub stats: StepStats,
    pub duration_ms: u64,
}

/// Ordered record of every step of one transformer run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepLog {
    pub records: Vec<StepRecord>,
}

impl StepLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: &str, stats: StepStats, duration_ms: u64) {
        self.records.push(StepRecord {
            step: step.to_string(),
            stats,
            duration_ms,
        });
    }

    /// Statistics of the named step, if it ran.
    pub fn get(&self, step: &str) -> Option<&StepStats> {
        self.records
            .iter()
            .find(|r| r.step == step)
            .map(|r| &r.stats)
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.step.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn initial_rows(&self) -> usize {
        self.records.first().map(|r| r.stats.rows_before).unwrap_or(0)
    }

    pub fn final_rows(&self) -> usize {
        self.records.last().map(|r| r.stats.rows_after).unwrap_or(0)
    }

    /// Total rows dropped across all steps.
    pub fn rows_removed(&self) -> usize {
        self.initial_rows().saturating_sub(self.final_rows())
    }

    /// Share of input rows that survived, in percent.
    pub fn retention_rate(&self) -> f64 {
        let initial = self.initial_rows();
        if initial == 0 {
            0.0
        } else {
            self.final_rows() as f64 / initial as f64 * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_stats_counts() {
        let stats = StepStats::new(10, 8)
            .with_count("Size", 2)
            .with_count("MRP", 1)
            .with_message("imputed");
        assert_eq!(stats.rows_removed(), 2);
        assert_eq!(stats.total_count(), 3);
        assert_eq!(stats.count("Size"), 2);
        assert_eq!(stats.count("Units_Sold"), 0);
    }

    #[test]
    fn test_step_log_summary() {
        let mut log = StepLog::new();
        log.push("impute_missing", StepStats::new(10, 10), 1);
        log.push("deduplicate", StepStats::new(10, 8), 1);
        log.push("remove_outliers", StepStats::new(8, 5), 2);

        assert_eq!(log.len(), 3);
        assert_eq!(log.initial_rows(), 10);
        assert_eq!(log.final_rows(), 5);
        assert_eq!(log.rows_removed(), 5);
        assert_eq!(log.retention_rate(), 50.0);
        assert_eq!(log.get("deduplicate").map(|s| s.rows_removed()), Some(2));
        assert!(log.get("missing").is_none());
    }

    #[test]
    fn test_empty_log() {
        let log = StepLog::new();
        assert!(log.is_empty());
        assert_eq!(log.retention_rate(), 0.0);
    }
}

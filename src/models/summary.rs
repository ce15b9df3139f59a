//! Aggregate counts for a finished run

use super::LocationRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

impl RunSummary {
    /// Count geocoded and missing records
    #[must_use]
    pub fn from_records(records: &[LocationRecord]) -> Self {
        let successful = records.iter().filter(|r| r.is_geocoded()).count();
        Self {
            total: records.len(),
            successful,
            failed: records.len() - successful,
        }
    }

    /// Share of geocoded records in percent, 0 for an empty run
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.successful as f64 / self.total as f64 * 100.0
    }
}

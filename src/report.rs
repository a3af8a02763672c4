//! Per-run cleaning statistics.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{error::Result, pipeline::Stage, transform::IndustryConflict};

/// What a pipeline run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleaningReport {
    /// Rows in the working table when the run started
    pub rows_ingested: usize,
    /// Rows removed as exact duplicates
    pub duplicates_removed: usize,
    /// Cells changed by trimming, per column
    pub cells_trimmed: BTreeMap<String, usize>,
    /// Industries rewritten to the canonical crypto value
    pub industries_canonicalized: usize,
    /// Countries that lost a trailing period
    pub countries_fixed: usize,
    /// Blank industries turned into NULL
    pub blank_industries_nulled: usize,
    /// Non-null dates after parsing
    pub dates_parsed: usize,
    /// Malformed dates set to NULL
    pub dates_nulled: usize,
    /// Industries changed by overrides
    pub industries_overridden: usize,
    /// Blank industries filled from the same company
    pub industries_backfilled: usize,
    /// Companies with conflicting industries
    pub ambiguous_companies: Vec<IndustryConflict>,
    /// Rows removed for missing layoff figures
    pub unreported_dropped: usize,
    /// Rows in the working table when the run ended
    pub rows_output: usize,
    /// Stages committed during this run, in order
    pub stages_completed: Vec<Stage>,
}

impl CleaningReport {
    /// Creates an empty report for a table of `rows_ingested` rows.
    pub fn new(rows_ingested: usize) -> Self {
        Self {
            rows_ingested,
            rows_output: rows_ingested,
            ..Self::default()
        }
    }

    /// Total cells changed by trimming.
    pub fn total_trimmed(&self) -> usize {
        self.cells_trimmed.values().sum()
    }

    /// Returns true if the run removed or rewrote nothing.
    pub fn is_unchanged(&self) -> bool {
        self.duplicates_removed == 0
            && self.total_trimmed() == 0
            && self.industries_canonicalized == 0
            && self.countries_fixed == 0
            && self.blank_industries_nulled == 0
            && self.dates_nulled == 0
            && self.industries_overridden == 0
            && self.industries_backfilled == 0
            && self.unreported_dropped == 0
    }

    /// Serializes the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_report_is_unchanged() {
        let report = CleaningReport::new(10);
        assert_eq!(report.rows_ingested, 10);
        assert_eq!(report.rows_output, 10);
        assert!(report.is_unchanged());
    }

    #[test]
    fn test_total_trimmed() {
        let mut report = CleaningReport::new(3);
        report.cells_trimmed.insert("company".to_string(), 2);
        report.cells_trimmed.insert("country".to_string(), 1);
        assert_eq!(report.total_trimmed(), 3);
        assert!(!report.is_unchanged());
    }

    #[test]
    fn test_to_json_uses_stage_names() {
        let mut report = CleaningReport::new(1);
        report.stages_completed = vec![Stage::Deduplicate, Stage::ParseDates];
        report.ambiguous_companies.push(IndustryConflict {
            company: "Acme".to_string(),
            candidates: vec!["Retail".to_string(), "Media".to_string()],
        });
        let json = report
            .to_json()
            .ok()
            .unwrap_or_else(|| panic!("Should serialize"));
        assert!(json.contains(r#""parse-dates""#));
        assert!(json.contains(r#""company": "Acme""#));
    }
}

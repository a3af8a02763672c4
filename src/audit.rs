//! Post-clean checks.
//!
//! [`audit`] inspects a batch for anything the pipeline should have
//! removed. A table produced by [`crate::CleaningPipeline::run`] with the
//! same rules can still report two issues:
//!
//! - [`AuditIssue::DuplicateRows`] when trimming, canonicalization or
//!   backfill made two distinct source rows identical. Rows are only
//!   removed as exact duplicates of the source, so these are kept.
//! - [`AuditIssue::TrailingPeriodCountry`] when a country ended in more than
//!   one period.
//!
//! # Example
//!
//! ```ignore
//! use layoffs_clean::audit;
//!
//! let report = audit(cleaned.batch())?;
//! for issue in &report.issues {
//!     println!("{issue}");
//! }
//! ```

use std::fmt;

use arrow::{
    array::{Array, RecordBatch},
    datatypes::DataType,
};
use serde::Serialize;

use crate::{
    columns,
    error::Result,
    rules::CleaningRules,
    schema,
    transform::{BackfillIndustry, RankDuplicates},
};

/// A rule the table breaks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditIssue {
    /// Rows that repeat an earlier row on every key column
    DuplicateRows {
        /// Number of repeated rows
        count: usize,
    },
    /// Text with leading or trailing whitespace
    UntrimmedText {
        /// Column name
        column: String,
        /// Number of affected cells
        count: usize,
    },
    /// Crypto-prefixed industries other than the canonical value
    NonCanonicalIndustry {
        /// Number of affected cells
        count: usize,
    },
    /// US country values ending in a period
    TrailingPeriodCountry {
        /// Number of affected cells
        count: usize,
    },
    /// Blank industries whose company has a known industry elsewhere
    BackfillableIndustry {
        /// Number of affected rows
        count: usize,
    },
    /// A pipeline-only column is still present
    TransientColumn {
        /// Column name
        column: String,
    },
    /// The date column has not been parsed
    UnparsedDates,
}

impl AuditIssue {
    /// Get column name if applicable
    pub fn column(&self) -> Option<&str> {
        match self {
            Self::UntrimmedText { column, .. } | Self::TransientColumn { column } => {
                Some(column.as_str())
            }
            Self::NonCanonicalIndustry { .. } | Self::BackfillableIndustry { .. } => {
                Some(schema::INDUSTRY)
            }
            Self::TrailingPeriodCountry { .. } => Some(schema::COUNTRY),
            Self::UnparsedDates => Some(schema::DATE),
            Self::DuplicateRows { .. } => None,
        }
    }
}

impl fmt::Display for AuditIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateRows { count } => write!(f, "{count} duplicate rows"),
            Self::UntrimmedText { column, count } => {
                write!(f, "{count} untrimmed values in '{column}'")
            }
            Self::NonCanonicalIndustry { count } => {
                write!(f, "{count} non-canonical crypto industries")
            }
            Self::TrailingPeriodCountry { count } => {
                write!(f, "{count} countries with a trailing period")
            }
            Self::BackfillableIndustry { count } => {
                write!(f, "{count} blank industries with a known company industry")
            }
            Self::TransientColumn { column } => write!(f, "transient column '{column}' present"),
            Self::UnparsedDates => write!(f, "date column is still text"),
        }
    }
}

/// Result of [`audit`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    /// Rows inspected
    pub row_count: usize,
    /// Detected issues
    pub issues: Vec<AuditIssue>,
}

impl AuditReport {
    /// Returns true if no issue was found.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Get issues for a specific column
    pub fn column_issues(&self, column: &str) -> Vec<&AuditIssue> {
        self.issues
            .iter()
            .filter(|i| i.column() == Some(column))
            .collect()
    }
}

/// Audits a batch against the default rules.
///
/// # Errors
///
/// Returns an error if a layoff column is missing or has the wrong type.
pub fn audit(batch: &RecordBatch) -> Result<AuditReport> {
    audit_with(batch, &CleaningRules::default())
}

/// Audits a batch against `rules`.
///
/// # Errors
///
/// Returns an error if a layoff column is missing or has the wrong type.
pub fn audit_with(batch: &RecordBatch, rules: &CleaningRules) -> Result<AuditReport> {
    schema::check_columns(&batch.schema())?;
    let mut issues = Vec::new();

    let duplicates = RankDuplicates::new()
        .ranks(batch)?
        .into_iter()
        .filter(|&rank| rank > 1)
        .count();
    if duplicates > 0 {
        issues.push(AuditIssue::DuplicateRows { count: duplicates });
    }

    for column in &rules.trim_columns {
        let count = count_text(batch, column, |s| s.trim() != s)?;
        if count > 0 {
            issues.push(AuditIssue::UntrimmedText {
                column: column.clone(),
                count,
            });
        }
    }

    let count = count_text(batch, schema::INDUSTRY, |s| {
        s != rules.crypto_canonical && rules.crypto_match.matches(s, &rules.crypto_prefix)
    })?;
    if count > 0 {
        issues.push(AuditIssue::NonCanonicalIndustry { count });
    }

    let count = count_text(batch, schema::COUNTRY, |s| {
        s.starts_with(rules.us_country_prefix.as_str()) && s.ends_with('.')
    })?;
    if count > 0 {
        issues.push(AuditIssue::TrailingPeriodCountry { count });
    }

    let count = backfillable(batch)?;
    if count > 0 {
        issues.push(AuditIssue::BackfillableIndustry { count });
    }

    for column in schema::TRANSIENT_COLUMNS {
        if batch.schema().column_with_name(column).is_some() {
            issues.push(AuditIssue::TransientColumn {
                column: column.to_string(),
            });
        }
    }
    if let Some((_, field)) = batch.schema().column_with_name(schema::DATE) {
        if field.data_type() != &DataType::Date32 {
            issues.push(AuditIssue::UnparsedDates);
        }
    }

    Ok(AuditReport {
        row_count: batch.num_rows(),
        issues,
    })
}

fn count_text(batch: &RecordBatch, column: &str, pred: impl Fn(&str) -> bool) -> Result<usize> {
    let arr = columns::text(batch, column)?;
    Ok((0..arr.len())
        .filter(|&row| columns::text_value(arr, row).is_some_and(&pred))
        .count())
}

fn backfillable(batch: &RecordBatch) -> Result<usize> {
    let plan = BackfillIndustry::new().plan(batch)?;
    let companies = columns::text(batch, schema::COMPANY)?;
    let industries = columns::text(batch, schema::INDUSTRY)?;
    Ok((0..batch.num_rows())
        .filter(|&row| {
            let blank = columns::text_value(industries, row).map_or(true, |s| s.trim().is_empty());
            blank
                && columns::text_value(companies, row)
                    .and_then(|c| plan.donor(c))
                    .is_some()
        })
        .count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        pipeline::CleaningPipeline,
        records::RawLayoff,
        table::LayoffTable,
    };

    fn raw(company: &str, industry: Option<&str>, country: &str) -> RawLayoff {
        RawLayoff {
            company: Some(company.to_string()),
            location: None,
            industry: industry.map(str::to_string),
            total_laid_off: Some(12),
            percentage_laid_off: None,
            date: Some("1/2/2023".to_string()),
            stage: None,
            country: Some(country.to_string()),
            funds_raised_millions: None,
        }
    }

    fn dirty() -> LayoffTable {
        LayoffTable::from_raw_records(&[
            raw(" Acme", Some("CryptoCurrency"), "United States."),
            raw(" Acme", Some("CryptoCurrency"), "United States."),
            raw("Globex", Some("Retail"), "India"),
            RawLayoff {
                total_laid_off: Some(30),
                ..raw("Globex", None, "India")
            },
        ])
        .ok()
        .unwrap_or_else(|| panic!("Should build table"))
    }

    #[test]
    fn test_audit_finds_every_issue() {
        let report = audit(dirty().batch())
            .ok()
            .unwrap_or_else(|| panic!("Should audit"));
        assert_eq!(report.row_count, 4);
        assert!(!report.is_clean());
        assert!(report.issues.contains(&AuditIssue::DuplicateRows { count: 1 }));
        assert!(report.issues.contains(&AuditIssue::UntrimmedText {
            column: "company".to_string(),
            count: 2
        }));
        assert!(report
            .issues
            .contains(&AuditIssue::NonCanonicalIndustry { count: 2 }));
        assert!(report
            .issues
            .contains(&AuditIssue::TrailingPeriodCountry { count: 2 }));
        assert!(report
            .issues
            .contains(&AuditIssue::BackfillableIndustry { count: 1 }));
        assert!(report.issues.contains(&AuditIssue::UnparsedDates));
        assert!(report.column_issues("row_num").is_empty());
    }

    #[test]
    fn test_cleaned_table_audits_clean() {
        let (cleaned, _) = CleaningPipeline::default()
            .run(dirty())
            .ok()
            .unwrap_or_else(|| panic!("Should clean"));
        let report = audit(cleaned.batch())
            .ok()
            .unwrap_or_else(|| panic!("Should audit"));
        assert!(report.is_clean(), "unexpected issues: {:?}", report.issues);
    }

    fn clean_and_audit(rows: &[RawLayoff]) -> (usize, AuditReport) {
        let table = LayoffTable::from_raw_records(rows)
            .ok()
            .unwrap_or_else(|| panic!("Should build table"));
        let (cleaned, report) = CleaningPipeline::default()
            .run(table)
            .ok()
            .unwrap_or_else(|| panic!("Should clean"));
        assert_eq!(report.duplicates_removed, 0);
        let audited = audit(cleaned.batch())
            .ok()
            .unwrap_or_else(|| panic!("Should audit"));
        (cleaned.len(), audited)
    }

    #[test]
    fn test_rows_equal_after_trim_are_kept_and_reported() {
        let (rows, report) = clean_and_audit(&[
            raw(" Acme", Some("Retail"), "India"),
            raw("Acme", Some("Retail"), "India"),
        ]);
        assert_eq!(rows, 2);
        assert_eq!(report.issues, vec![AuditIssue::DuplicateRows { count: 1 }]);
    }

    #[test]
    fn test_rows_equal_after_backfill_are_kept_and_reported() {
        let (rows, report) = clean_and_audit(&[
            raw("Acme", None, "India"),
            raw("Acme", Some("Retail"), "India"),
        ]);
        assert_eq!(rows, 2);
        assert_eq!(report.issues, vec![AuditIssue::DuplicateRows { count: 1 }]);
    }

    #[test]
    fn test_transient_columns_are_reported() {
        let table = dirty();
        let mut working = crate::pipeline::WorkingTable::ingest(table)
            .ok()
            .unwrap_or_else(|| panic!("Should ingest"));
        let rules = CleaningRules::default().with_date_format("%Y");
        let _ = CleaningPipeline::new(rules)
            .ok()
            .unwrap_or_else(|| panic!("Should build pipeline"))
            .execute(&mut working);
        let report = audit(working.batch())
            .ok()
            .unwrap_or_else(|| panic!("Should audit"));
        assert_eq!(report.column_issues("row_num").len(), 1);
        assert_eq!(report.column_issues("source_row").len(), 1);
    }

    #[test]
    fn test_column_issues() {
        let report = audit(dirty().batch())
            .ok()
            .unwrap_or_else(|| panic!("Should audit"));
        assert_eq!(report.column_issues("industry").len(), 2);
        assert_eq!(report.column_issues("date"), vec![&AuditIssue::UnparsedDates]);
    }

    #[test]
    fn test_audit_requires_layoff_columns() {
        let batch = RecordBatch::new_empty(std::sync::Arc::new(arrow::datatypes::Schema::empty()));
        assert!(audit(&batch).is_err());
    }

    #[test]
    fn test_issue_display() {
        let issue = AuditIssue::UntrimmedText {
            column: "country".to_string(),
            count: 3,
        };
        assert_eq!(issue.to_string(), "3 untrimmed values in 'country'");
    }
}

//! layoffs-clean - Cleaning the layoffs dataset with Arrow
//!
//! Takes the raw layoff table (company, location, industry, head count,
//! percentage, date text, funding stage, country, funds raised) and produces
//! an analysis-ready copy: exact duplicates removed, text normalized, dates
//! typed, and missing industries filled from the same company's other rows.
//!
//! # Design Principles
//!
//! 1. **Staged** - Deduplicate, normalize, parse dates, backfill, prune
//! 2. **Atomic stages** - A failed stage leaves earlier results committed
//! 3. **Zero-copy** - Arrow `RecordBatch` throughout
//! 4. **Ecosystem aligned** - Arrow 53, Parquet 53
//!
//! # Quick Start
//!
//! ```no_run
//! use layoffs_clean::{audit, CleaningPipeline, CleaningRules, LayoffTable};
//!
//! let table = LayoffTable::from_csv("data/layoffs.csv").unwrap();
//! let pipeline = CleaningPipeline::new(CleaningRules::default()).unwrap();
//!
//! let (cleaned, report) = pipeline.run(table).unwrap();
//! println!("removed {} duplicates", report.duplicates_removed);
//! assert!(audit(cleaned.batch()).unwrap().is_clean());
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
// Allow common test patterns
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::cast_possible_truncation,
        clippy::redundant_clone,
        clippy::too_many_lines,
        clippy::similar_names
    )
)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::map_unwrap_or)]

pub mod audit;
mod columns;
pub mod error;
pub mod pipeline;
pub mod records;
pub mod report;
pub mod rules;
pub mod schema;
pub mod table;
pub mod transform;

pub use arrow::array::RecordBatch;
pub use audit::{audit, audit_with, AuditIssue, AuditReport};
pub use error::{Error, Result};
pub use pipeline::{CleaningPipeline, Stage, WorkingTable};
pub use records::{LayoffRecord, RawLayoff};
pub use report::CleaningReport;
pub use rules::{AmbiguityPolicy, CleaningRules, DateErrorPolicy, IndustryOverride, PrefixMatch};
pub use table::LayoffTable;
pub use transform::{
    drop_unreported, parse_event_date, AssignIndustry, BackfillIndustry, BackfillPlan,
    BlankToNull, CanonicalPrefix, Chain, Drop, Filter, IndustryConflict, ParseDates,
    RankDuplicates, RetainFirstRank, Select, StripTrailingPeriod, Transform, TrimWhitespace,
};

//! The cleaning pipeline.
//!
//! A [`WorkingTable`] holds the batch of the last committed stage.
//! [`CleaningPipeline::execute`] runs the remaining stages in order; a stage's
//! output replaces the working batch only when the stage succeeds, so a
//! failure leaves every earlier stage's result in place.
//!
//! Rows are only removed by deduplication (and the opt-in drop of unreported
//! rows). Two rows that become identical later, for example because trimming
//! or backfill made them equal, are both kept; [`crate::audit`] reports them.
//!
//! # Example
//!
//! ```no_run
//! use layoffs_clean::{CleaningPipeline, CleaningRules, LayoffTable};
//!
//! let pipeline = CleaningPipeline::new(CleaningRules::default()).unwrap();
//! let table = LayoffTable::from_csv("layoffs.csv").unwrap();
//! let (cleaned, report) = pipeline.run(table).unwrap();
//! cleaned.to_parquet("layoffs_clean.parquet").unwrap();
//! println!("{}", report.to_json().unwrap());
//! ```

use std::{fmt, sync::Arc};

use arrow::{
    array::{Array, ArrayRef, RecordBatch, UInt64Array},
    datatypes::{DataType, Field, Schema},
};
use serde::Serialize;

use crate::{
    columns,
    error::{Error, Result},
    report::CleaningReport,
    rules::CleaningRules,
    schema,
    table::LayoffTable,
    transform::{
        drop_unreported, AssignIndustry, BackfillIndustry, BlankToNull, CanonicalPrefix, Drop,
        ParseDates, RankDuplicates, RetainFirstRank, StripTrailingPeriod, Transform,
        TrimWhitespace,
    },
};

/// A step of the pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Copy the source into the working table.
    Ingest,
    /// Rank duplicate rows and keep rank 1.
    Deduplicate,
    /// Trim and canonicalize text.
    Normalize,
    /// Convert date text to `Date32`.
    ParseDates,
    /// Apply industry overrides and same-company backfill.
    Backfill,
    /// Remove rows without layoff figures (opt-in).
    DropUnreported,
    /// Drop the transient rank and source-row columns.
    Prune,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 7] = [
        Stage::Ingest,
        Stage::Deduplicate,
        Stage::Normalize,
        Stage::ParseDates,
        Stage::Backfill,
        Stage::DropUnreported,
        Stage::Prune,
    ];

    /// Stable name used in logs and reports.
    pub fn name(self) -> &'static str {
        match self {
            Self::Ingest => "ingest",
            Self::Deduplicate => "deduplicate",
            Self::Normalize => "normalize",
            Self::ParseDates => "parse-dates",
            Self::Backfill => "backfill",
            Self::DropUnreported => "drop-unreported",
            Self::Prune => "prune",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The table being cleaned, owned by the caller for the whole run.
#[derive(Debug, Clone)]
pub struct WorkingTable {
    batch: RecordBatch,
    completed: Stage,
    rows_ingested: usize,
}

impl WorkingTable {
    /// Copies a source table into a new working table.
    ///
    /// Each row is tagged with its ingest position in a transient
    /// `source_row` column, so date errors name the source row even after
    /// duplicates are gone. The prune stage removes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is already cleaned (its `date` column is
    /// `Date32`).
    pub fn ingest(source: LayoffTable) -> Result<Self> {
        if source.is_cleaned() {
            return Err(Error::schema_mismatch(
                "source table already has a parsed date column",
            )
            .in_stage(Stage::Ingest));
        }
        let batch = Self::tag_source_rows(source.into_batch())
            .map_err(|e| e.in_stage(Stage::Ingest))?;
        tracing::info!(
            stage = %Stage::Ingest,
            rows = batch.num_rows(),
            "ingested source table"
        );
        Ok(Self {
            rows_ingested: batch.num_rows(),
            batch,
            completed: Stage::Ingest,
        })
    }

    fn tag_source_rows(batch: RecordBatch) -> Result<RecordBatch> {
        let schema = batch.schema();
        let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
        fields.push(Field::new(schema::SOURCE_ROW, DataType::UInt64, false));

        let positions = UInt64Array::from_iter_values((0u64..).take(batch.num_rows()));
        let mut arrays: Vec<ArrayRef> = batch.columns().to_vec();
        arrays.push(Arc::new(positions));

        let tagged = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));
        RecordBatch::try_new(tagged, arrays).map_err(Error::Arrow)
    }

    /// Rows in the source table at ingest. Unchanged by later stages.
    pub fn rows_ingested(&self) -> usize {
        self.rows_ingested
    }

    /// The last stage whose result is committed.
    pub fn completed(&self) -> Stage {
        self.completed
    }

    /// Returns true once the prune stage has committed.
    pub fn is_finished(&self) -> bool {
        self.completed == Stage::Prune
    }

    /// The committed batch.
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Number of rows in the committed batch.
    pub fn len(&self) -> usize {
        self.batch.num_rows()
    }

    /// Returns true if the committed batch has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Converts a finished working table into the cleaned table.
    ///
    /// # Errors
    ///
    /// Returns an error if the prune stage has not committed yet.
    pub fn into_table(self) -> Result<LayoffTable> {
        if !self.is_finished() {
            return Err(Error::transform(format!(
                "working table stopped after stage '{}'",
                self.completed
            )));
        }
        Ok(LayoffTable::from_cleaned(self.batch))
    }

    fn commit(&mut self, stage: Stage, batch: RecordBatch) {
        self.batch = batch;
        self.completed = stage;
    }
}

/// Runs the cleaning stages with a fixed rule set.
#[derive(Debug, Clone, Default)]
pub struct CleaningPipeline {
    rules: CleaningRules,
}

impl CleaningPipeline {
    /// Creates a pipeline after validating the rules.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the rules are inconsistent.
    pub fn new(rules: CleaningRules) -> Result<Self> {
        rules.validate()?;
        Ok(Self { rules })
    }

    /// Returns the rules.
    pub fn rules(&self) -> &CleaningRules {
        &self.rules
    }

    /// Stages this pipeline runs after ingest.
    pub fn stages(&self) -> Vec<Stage> {
        Stage::ALL
            .into_iter()
            .filter(|s| *s != Stage::Ingest)
            .filter(|s| *s != Stage::DropUnreported || self.rules.drop_unreported)
            .collect()
    }

    /// Ingests, cleans, and returns the cleaned table with its report.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Stage`] naming the failed stage.
    pub fn run(&self, source: LayoffTable) -> Result<(LayoffTable, CleaningReport)> {
        let mut working = WorkingTable::ingest(source)?;
        let report = self.execute(&mut working)?;
        Ok((working.into_table()?, report))
    }

    /// Runs every stage after the working table's last committed one.
    ///
    /// On failure the working table keeps the last committed stage, and a
    /// later call resumes from there.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Stage`] naming the failed stage.
    pub fn execute(&self, working: &mut WorkingTable) -> Result<CleaningReport> {
        let mut report = CleaningReport::new(working.rows_ingested);

        for stage in self.stages() {
            if stage <= working.completed {
                continue;
            }
            let before = working.batch.clone();
            let after = self
                .run_stage(stage, &before, &mut report)
                .map_err(|e| e.in_stage(stage))?;

            tracing::info!(
                stage = %stage,
                rows_in = before.num_rows(),
                rows_out = after.num_rows(),
                "stage committed"
            );
            working.commit(stage, after);
            report.stages_completed.push(stage);
        }

        report.rows_output = working.len();
        Ok(report)
    }

    fn run_stage(
        &self,
        stage: Stage,
        batch: &RecordBatch,
        report: &mut CleaningReport,
    ) -> Result<RecordBatch> {
        match stage {
            Stage::Ingest => Ok(batch.clone()),
            Stage::Deduplicate => self.deduplicate(batch, report),
            Stage::Normalize => self.normalize(batch, report),
            Stage::ParseDates => self.parse_dates(batch, report),
            Stage::Backfill => self.backfill(batch, report),
            Stage::DropUnreported => {
                let after = drop_unreported().apply(batch.clone())?;
                report.unreported_dropped = batch.num_rows() - after.num_rows();
                Ok(after)
            }
            Stage::Prune => Drop::new(schema::TRANSIENT_COLUMNS).apply(batch.clone()),
        }
    }

    fn deduplicate(&self, batch: &RecordBatch, report: &mut CleaningReport) -> Result<RecordBatch> {
        let ranked = RankDuplicates::new().apply(batch.clone())?;
        let kept = RetainFirstRank::new().apply(ranked)?;
        report.duplicates_removed = batch.num_rows() - kept.num_rows();
        Ok(kept)
    }

    fn normalize(&self, batch: &RecordBatch, report: &mut CleaningReport) -> Result<RecordBatch> {
        let rules = &self.rules;

        let trimmed = TrimWhitespace::new(rules.trim_columns.iter().cloned()).apply(batch.clone())?;
        for column in &rules.trim_columns {
            let changed = columns::count_changed(batch, &trimmed, column)?;
            if changed > 0 {
                report.cells_trimmed.insert(column.clone(), changed);
            }
        }

        let crypto = CanonicalPrefix::new(
            schema::INDUSTRY,
            rules.crypto_prefix.as_str(),
            rules.crypto_canonical.as_str(),
        )
        .matching(rules.crypto_match)
        .apply(trimmed.clone())?;
        report.industries_canonicalized = columns::count_changed(&trimmed, &crypto, schema::INDUSTRY)?;

        let country = StripTrailingPeriod::new(schema::COUNTRY, rules.us_country_prefix.as_str())
            .apply(crypto.clone())?;
        report.countries_fixed = columns::count_changed(&crypto, &country, schema::COUNTRY)?;

        let normalized = if rules.blank_industry_as_null {
            let nulled = BlankToNull::new(schema::INDUSTRY).apply(country.clone())?;
            report.blank_industries_nulled =
                columns::count_changed(&country, &nulled, schema::INDUSTRY)?;
            nulled
        } else {
            country
        };

        tracing::debug!(
            industries = report.industries_canonicalized,
            countries = report.countries_fixed,
            blanks = report.blank_industries_nulled,
            "normalized text"
        );
        Ok(normalized)
    }

    fn parse_dates(&self, batch: &RecordBatch, report: &mut CleaningReport) -> Result<RecordBatch> {
        let nulls_before = columns::text(batch, schema::DATE)?.null_count();
        let parsed = ParseDates::new(schema::DATE, self.rules.date_format.as_str())
            .on_error(self.rules.date_errors)
            .apply(batch.clone())?;

        let dates = columns::date32(&parsed, schema::DATE)?;
        report.dates_parsed = dates.len() - dates.null_count();
        report.dates_nulled = dates.null_count() - nulls_before;
        if report.dates_nulled > 0 {
            tracing::warn!(count = report.dates_nulled, "malformed dates set to NULL");
        }
        Ok(parsed)
    }

    fn backfill(&self, batch: &RecordBatch, report: &mut CleaningReport) -> Result<RecordBatch> {
        let assigned = AssignIndustry::new(&self.rules.overrides).apply(batch.clone())?;
        report.industries_overridden = columns::count_changed(batch, &assigned, schema::INDUSTRY)?;

        let backfill = BackfillIndustry::new().with_policy(self.rules.ambiguity);
        report.ambiguous_companies = backfill.plan(&assigned)?.conflicts().to_vec();

        let filled = backfill.apply(assigned.clone())?;
        report.industries_backfilled = columns::count_changed(&assigned, &filled, schema::INDUSTRY)?;

        tracing::debug!(
            overridden = report.industries_overridden,
            backfilled = report.industries_backfilled,
            ambiguous = report.ambiguous_companies.len(),
            "backfilled industries"
        );
        Ok(filled)
    }
}

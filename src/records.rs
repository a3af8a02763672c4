//! Row-level views of the layoff table.
//!
//! [`RawLayoff`] mirrors a source row, [`LayoffRecord`] a cleaned one. Both
//! convert to and from Arrow batches so tests and small callers can work
//! with plain structs.

use std::sync::Arc;

use arrow::{
    array::{ArrayRef, Date32Array, Int64Array, RecordBatch, StringArray},
    datatypes::Date32Type,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    columns,
    error::{Error, Result},
    schema,
};

/// A source row, with the event date as free text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RawLayoff {
    /// Company name.
    pub company: Option<String>,
    /// Office or city.
    pub location: Option<String>,
    /// Industry sector.
    pub industry: Option<String>,
    /// Head count laid off.
    pub total_laid_off: Option<i64>,
    /// Share of the workforce, as text.
    pub percentage_laid_off: Option<String>,
    /// Event date text, e.g. "3/14/2023".
    pub date: Option<String>,
    /// Funding stage.
    pub stage: Option<String>,
    /// Country.
    pub country: Option<String>,
    /// Funds raised, in millions.
    pub funds_raised_millions: Option<i64>,
}

/// A cleaned row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayoffRecord {
    /// Company name, trimmed.
    pub company: Option<String>,
    /// Office or city.
    pub location: Option<String>,
    /// Industry sector, canonicalized and backfilled.
    pub industry: Option<String>,
    /// Head count laid off.
    pub total_laid_off: Option<i64>,
    /// Share of the workforce, as text.
    pub percentage_laid_off: Option<String>,
    /// Event date.
    #[serde(rename = "date")]
    pub event_date: Option<NaiveDate>,
    /// Funding stage.
    pub stage: Option<String>,
    /// Country, trimmed and without a trailing period.
    pub country: Option<String>,
    /// Funds raised, in millions.
    pub funds_raised_millions: Option<i64>,
}

fn owned(arr: &StringArray, row: usize) -> Option<String> {
    columns::text_value(arr, row).map(str::to_string)
}

fn int(arr: &Int64Array, row: usize) -> Option<i64> {
    use arrow::array::Array;
    arr.is_valid(row).then(|| arr.value(row))
}

fn text_array<'a>(values: impl Iterator<Item = Option<&'a str>>) -> ArrayRef {
    Arc::new(values.collect::<StringArray>())
}

fn int_array(values: impl Iterator<Item = Option<i64>>) -> ArrayRef {
    Arc::new(values.collect::<Int64Array>())
}

/// Column accessors shared by both row types.
struct Columns<'a> {
    company: &'a StringArray,
    location: &'a StringArray,
    industry: &'a StringArray,
    total_laid_off: &'a Int64Array,
    percentage_laid_off: &'a StringArray,
    stage: &'a StringArray,
    country: &'a StringArray,
    funds_raised_millions: &'a Int64Array,
}

impl<'a> Columns<'a> {
    fn of(batch: &'a RecordBatch) -> Result<Self> {
        Ok(Self {
            company: columns::text(batch, schema::COMPANY)?,
            location: columns::text(batch, schema::LOCATION)?,
            industry: columns::text(batch, schema::INDUSTRY)?,
            total_laid_off: columns::int64(batch, schema::TOTAL_LAID_OFF)?,
            percentage_laid_off: columns::text(batch, schema::PERCENTAGE_LAID_OFF)?,
            stage: columns::text(batch, schema::STAGE)?,
            country: columns::text(batch, schema::COUNTRY)?,
            funds_raised_millions: columns::int64(batch, schema::FUNDS_RAISED_MILLIONS)?,
        })
    }
}

impl RawLayoff {
    /// Reads every row of a source-typed batch.
    ///
    /// # Errors
    ///
    /// Returns an error if a column is missing or `date` is not Utf8.
    pub fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let cols = Columns::of(batch)?;
        let dates = columns::text(batch, schema::DATE)?;
        Ok((0..batch.num_rows())
            .map(|row| Self {
                company: owned(cols.company, row),
                location: owned(cols.location, row),
                industry: owned(cols.industry, row),
                total_laid_off: int(cols.total_laid_off, row),
                percentage_laid_off: owned(cols.percentage_laid_off, row),
                date: owned(dates, row),
                stage: owned(cols.stage, row),
                country: owned(cols.country, row),
                funds_raised_millions: int(cols.funds_raised_millions, row),
            })
            .collect())
    }

    /// Builds a batch with [`schema::source_schema`].
    ///
    /// # Errors
    ///
    /// Returns an error if Arrow rejects the arrays.
    pub fn to_batch(records: &[Self]) -> Result<RecordBatch> {
        let arrays = vec![
            text_array(records.iter().map(|r| r.company.as_deref())),
            text_array(records.iter().map(|r| r.location.as_deref())),
            text_array(records.iter().map(|r| r.industry.as_deref())),
            int_array(records.iter().map(|r| r.total_laid_off)),
            text_array(records.iter().map(|r| r.percentage_laid_off.as_deref())),
            text_array(records.iter().map(|r| r.date.as_deref())),
            text_array(records.iter().map(|r| r.stage.as_deref())),
            text_array(records.iter().map(|r| r.country.as_deref())),
            int_array(records.iter().map(|r| r.funds_raised_millions)),
        ];
        RecordBatch::try_new(schema::source_schema(), arrays).map_err(Error::Arrow)
    }
}

impl LayoffRecord {
    /// Reads every row of a cleaned batch.
    ///
    /// # Errors
    ///
    /// Returns an error if a column is missing or `date` is not Date32.
    pub fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        use arrow::array::Array;

        let cols = Columns::of(batch)?;
        let dates = columns::date32(batch, schema::DATE)?;
        (0..batch.num_rows())
            .map(|row| {
                let event_date = if dates.is_null(row) {
                    None
                } else {
                    Some(dates.value_as_date(row).ok_or_else(|| {
                        Error::transform(format!(
                            "date value {} at row {row} is out of range",
                            dates.value(row)
                        ))
                    })?)
                };
                Ok(Self {
                    company: owned(cols.company, row),
                    location: owned(cols.location, row),
                    industry: owned(cols.industry, row),
                    total_laid_off: int(cols.total_laid_off, row),
                    percentage_laid_off: owned(cols.percentage_laid_off, row),
                    event_date,
                    stage: owned(cols.stage, row),
                    country: owned(cols.country, row),
                    funds_raised_millions: int(cols.funds_raised_millions, row),
                })
            })
            .collect()
    }

    /// Builds a batch with [`schema::cleaned_schema`].
    ///
    /// # Errors
    ///
    /// Returns an error if Arrow rejects the arrays.
    pub fn to_batch(records: &[Self]) -> Result<RecordBatch> {
        let dates: Date32Array = records
            .iter()
            .map(|r| r.event_date.map(Date32Type::from_naive_date))
            .collect();
        let arrays = vec![
            text_array(records.iter().map(|r| r.company.as_deref())),
            text_array(records.iter().map(|r| r.location.as_deref())),
            text_array(records.iter().map(|r| r.industry.as_deref())),
            int_array(records.iter().map(|r| r.total_laid_off)),
            text_array(records.iter().map(|r| r.percentage_laid_off.as_deref())),
            Arc::new(dates) as ArrayRef,
            text_array(records.iter().map(|r| r.stage.as_deref())),
            text_array(records.iter().map(|r| r.country.as_deref())),
            int_array(records.iter().map(|r| r.funds_raised_millions)),
        ];
        RecordBatch::try_new(schema::cleaned_schema(), arrays).map_err(Error::Arrow)
    }
}

//! Text to date conversion.

use std::sync::Arc;

use arrow::{
    array::{Array, Date32Array, RecordBatch, UInt64Array},
    datatypes::{DataType, Date32Type},
};
use chrono::{Datelike, NaiveDate};

use super::Transform;
use crate::{
    columns,
    error::{Error, Result},
    rules::DateErrorPolicy,
    schema,
};

/// Parses one event date, requiring a four-digit year.
///
/// Returns `None` when the text does not match `format`.
///
/// ```
/// use chrono::NaiveDate;
/// use layoffs_clean::parse_event_date;
///
/// assert_eq!(
///     parse_event_date("3/14/2023", "%m/%d/%Y"),
///     NaiveDate::from_ymd_opt(2023, 3, 14)
/// );
/// assert_eq!(parse_event_date("14/3/2023", "%m/%d/%Y"), None);
/// ```
pub fn parse_event_date(text: &str, format: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, format)
        .ok()
        .filter(|date| (1000..=9999).contains(&date.year()))
}

/// Converts a Utf8 date column into `Date32`.
///
/// A column that is already `Date32` is left unchanged.
#[derive(Debug, Clone)]
pub struct ParseDates {
    column: String,
    format: String,
    on_error: DateErrorPolicy,
}

impl ParseDates {
    /// Parses `column` with a chrono format string, aborting on bad input.
    pub fn new(column: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            format: format.into(),
            on_error: DateErrorPolicy::Abort,
        }
    }

    /// Sets malformed value handling.
    #[must_use]
    pub fn on_error(mut self, policy: DateErrorPolicy) -> Self {
        self.on_error = policy;
        self
    }

    fn company_at(batch: &RecordBatch, row: usize) -> Option<String> {
        columns::text(batch, schema::COMPANY)
            .ok()
            .and_then(|arr| columns::text_value(arr, row))
            .map(str::to_string)
    }

    /// Ingest position of `row`, when the batch still carries it.
    fn source_row_at(batch: &RecordBatch, row: usize) -> usize {
        batch
            .schema()
            .column_with_name(schema::SOURCE_ROW)
            .and_then(|(idx, _)| batch.column(idx).as_any().downcast_ref::<UInt64Array>())
            .filter(|rows| rows.is_valid(row))
            .and_then(|rows| usize::try_from(rows.value(row)).ok())
            .unwrap_or(row)
    }
}

impl Transform for ParseDates {
    fn apply(&self, batch: RecordBatch) -> Result<RecordBatch> {
        let idx = columns::index_of(&batch, &self.column)?;
        if batch.column(idx).data_type() == &DataType::Date32 {
            return Ok(batch);
        }

        let texts = columns::text(&batch, &self.column)?;
        let mut days: Vec<Option<i32>> = Vec::with_capacity(texts.len());

        for row in 0..texts.len() {
            let Some(text) = columns::text_value(texts, row) else {
                days.push(None);
                continue;
            };

            match parse_event_date(text, &self.format) {
                Some(date) => days.push(Some(Date32Type::from_naive_date(date))),
                None if self.on_error == DateErrorPolicy::Null => {
                    tracing::warn!(row, text, "unparseable date set to NULL");
                    days.push(None);
                }
                None => {
                    return Err(Error::DateParse {
                        row: Self::source_row_at(&batch, row),
                        company: Self::company_at(&batch, row),
                        text: text.to_string(),
                        format: self.format.clone(),
                    });
                }
            }
        }

        columns::replace(&batch, idx, Arc::new(Date32Array::from(days)))
    }
}

#[cfg(test)]
mod tests {
    use arrow::{
        array::StringArray,
        datatypes::{Field, Schema},
    };

    use super::*;

    const FORMAT: &str = "%m/%d/%Y";

    fn batch_of(dates: Vec<Option<&str>>) -> RecordBatch {
        let companies: Vec<Option<String>> =
            (0..dates.len()).map(|i| Some(format!("co_{i}"))).collect();
        let schema = Arc::new(Schema::new(vec![
            Field::new("company", DataType::Utf8, true),
            Field::new("date", DataType::Utf8, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(companies)),
                Arc::new(StringArray::from(dates)),
            ],
        )
        .ok()
        .unwrap_or_else(|| panic!("Should create batch"))
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap_or_else(|| panic!("valid date"))
    }

    #[test]
    fn test_parse_event_date() {
        assert_eq!(parse_event_date("3/14/2023", FORMAT), Some(ymd(2023, 3, 14)));
        assert_eq!(parse_event_date("03/06/2020", FORMAT), Some(ymd(2020, 3, 6)));
        assert_eq!(parse_event_date("14/3/2023", FORMAT), None);
        assert_eq!(parse_event_date("2/30/2023", FORMAT), None);
        assert_eq!(parse_event_date("3/14/23", FORMAT), None);
        assert_eq!(parse_event_date("2023-03-14", FORMAT), None);
        assert_eq!(parse_event_date("", FORMAT), None);
    }

    #[test]
    fn test_parse_dates_column() {
        let batch = batch_of(vec![Some("3/14/2023"), None, Some("12/1/2022")]);
        let result = ParseDates::new("date", FORMAT)
            .apply(batch)
            .ok()
            .unwrap_or_else(|| panic!("Should parse"));

        assert_eq!(result.schema().field(1).data_type(), &DataType::Date32);
        let dates = columns::date32(&result, "date")
            .ok()
            .unwrap_or_else(|| panic!("Should be Date32"));
        assert_eq!(dates.value(0), 19_430);
        assert_eq!(dates.value_as_date(0), Some(ymd(2023, 3, 14)));
        assert!(dates.is_null(1));
        assert_eq!(dates.value_as_date(2), Some(ymd(2022, 12, 1)));
    }

    #[test]
    fn test_abort_names_offending_row() {
        let batch = batch_of(vec![Some("3/14/2023"), Some("14/3/2023")]);
        let err = ParseDates::new("date", FORMAT).apply(batch).err();
        match err {
            Some(Error::DateParse {
                row, company, text, ..
            }) => {
                assert_eq!(row, 1);
                assert_eq!(company.as_deref(), Some("co_1"));
                assert_eq!(text, "14/3/2023");
            }
            other => panic!("expected DateParse, got {other:?}"),
        }
    }

    #[test]
    fn test_abort_reports_ingest_position() {
        let batch = batch_of(vec![Some("1/2/2023"), Some("2/30/2023")]);
        let mut fields: Vec<Field> = batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.as_ref().clone())
            .collect();
        fields.push(Field::new(schema::SOURCE_ROW, DataType::UInt64, false));
        let mut arrays = batch.columns().to_vec();
        arrays.push(Arc::new(UInt64Array::from(vec![0u64, 7])));
        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
            .ok()
            .unwrap_or_else(|| panic!("Should create batch"));

        match ParseDates::new("date", FORMAT).apply(batch).err() {
            Some(Error::DateParse { row, .. }) => assert_eq!(row, 7),
            other => panic!("expected DateParse, got {other:?}"),
        }
    }

    #[test]
    fn test_null_policy_keeps_going() {
        let batch = batch_of(vec![Some("bogus"), Some("1/2/2023")]);
        let result = ParseDates::new("date", FORMAT)
            .on_error(DateErrorPolicy::Null)
            .apply(batch)
            .ok()
            .unwrap_or_else(|| panic!("Should parse"));
        let dates = columns::date32(&result, "date")
            .ok()
            .unwrap_or_else(|| panic!("Should be Date32"));
        assert!(dates.is_null(0));
        assert!(dates.is_valid(1));
    }

    #[test]
    fn test_already_parsed_is_unchanged() {
        let batch = batch_of(vec![Some("1/2/2023")]);
        let parse = ParseDates::new("date", FORMAT);
        let once = parse
            .apply(batch)
            .ok()
            .unwrap_or_else(|| panic!("Should parse"));
        let twice = parse
            .apply(once.clone())
            .ok()
            .unwrap_or_else(|| panic!("Should be a no-op"));
        assert_eq!(once, twice);
    }
}

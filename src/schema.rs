//! Column names and Arrow schemas for the layoff table.

use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};

use crate::error::{Error, Result};

/// Company name.
pub const COMPANY: &str = "company";
/// Office or city affected.
pub const LOCATION: &str = "location";
/// Industry sector.
pub const INDUSTRY: &str = "industry";
/// Head count laid off.
pub const TOTAL_LAID_OFF: &str = "total_laid_off";
/// Share of the workforce laid off, kept as text.
pub const PERCENTAGE_LAID_OFF: &str = "percentage_laid_off";
/// Event date; text in the source, `Date32` once cleaned.
pub const DATE: &str = "date";
/// Funding stage of the company.
pub const STAGE: &str = "stage";
/// Country of the event.
pub const COUNTRY: &str = "country";
/// Funds raised, in millions.
pub const FUNDS_RAISED_MILLIONS: &str = "funds_raised_millions";
/// Transient duplicate rank.
pub const ROW_NUM: &str = "row_num";
/// Transient ingest position of each row, used in error reports.
pub const SOURCE_ROW: &str = "source_row";

/// Columns that exist only while the pipeline runs.
pub const TRANSIENT_COLUMNS: [&str; 2] = [ROW_NUM, SOURCE_ROW];

/// The nine data columns in source order. Together they form the duplicate key.
pub const KEY_COLUMNS: [&str; 9] = [
    COMPANY,
    LOCATION,
    INDUSTRY,
    TOTAL_LAID_OFF,
    PERCENTAGE_LAID_OFF,
    DATE,
    STAGE,
    COUNTRY,
    FUNDS_RAISED_MILLIONS,
];

fn fields(date_type: DataType) -> Vec<Field> {
    vec![
        Field::new(COMPANY, DataType::Utf8, true),
        Field::new(LOCATION, DataType::Utf8, true),
        Field::new(INDUSTRY, DataType::Utf8, true),
        Field::new(TOTAL_LAID_OFF, DataType::Int64, true),
        Field::new(PERCENTAGE_LAID_OFF, DataType::Utf8, true),
        Field::new(DATE, date_type, true),
        Field::new(STAGE, DataType::Utf8, true),
        Field::new(COUNTRY, DataType::Utf8, true),
        Field::new(FUNDS_RAISED_MILLIONS, DataType::Int64, true),
    ]
}

/// Schema of the source table, with `date` as free text.
pub fn source_schema() -> SchemaRef {
    Arc::new(Schema::new(fields(DataType::Utf8)))
}

/// Schema of the cleaned table, with `date` as `Date32`.
pub fn cleaned_schema() -> SchemaRef {
    Arc::new(Schema::new(fields(DataType::Date32)))
}

/// Checks that `schema` carries the nine data columns with the source types.
///
/// Extra columns are tolerated; `date` may already be `Date32`.
///
/// # Errors
///
/// Returns [`Error::ColumnNotFound`] for a missing column and
/// [`Error::SchemaMismatch`] for a column of the wrong type.
pub fn check_columns(schema: &Schema) -> Result<()> {
    for expected in source_schema().fields() {
        let (_, field) = schema
            .column_with_name(expected.name())
            .ok_or_else(|| Error::column_not_found(expected.name()))?;

        let date_ok = expected.name() == DATE && field.data_type() == &DataType::Date32;
        if field.data_type() != expected.data_type() && !date_ok {
            return Err(Error::schema_mismatch(format!(
                "column '{}' has type {}, expected {}",
                expected.name(),
                field.data_type(),
                expected.data_type()
            )));
        }
    }
    Ok(())
}

//! The layoff table.
//!
//! [`LayoffTable`] owns one Arrow RecordBatch holding the whole table.
//! Deduplication and backfill look across all rows, so input batches are
//! concatenated on load.

use std::path::Path;

use arrow::{array::RecordBatch, compute::concat_batches, datatypes::SchemaRef};
use parquet::{
    arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter},
    file::properties::WriterProperties,
};
use regex::Regex;

use crate::{
    error::{Error, Result},
    records::{LayoffRecord, RawLayoff},
    schema,
    transform::{Select, Transform},
};

/// Cells matching this pattern are read as NULL from CSV: empty, or the
/// literal `NULL` the layoff exports use.
pub const CSV_NULL_PATTERN: &str = "^(NULL)?$";

/// An in-memory layoff table.
///
/// # Example
///
/// ```no_run
/// use layoffs_clean::LayoffTable;
///
/// let table = LayoffTable::from_csv("layoffs.csv").unwrap();
/// println!("{} rows", table.len());
/// ```
#[derive(Debug, Clone)]
pub struct LayoffTable {
    batch: RecordBatch,
}

impl LayoffTable {
    /// Creates a table from batches carrying the nine layoff columns.
    ///
    /// Columns are projected into source order and extra columns are
    /// dropped. `date` may be Utf8 or Date32.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The batches vector is empty
    /// - A column is missing or has the wrong type
    /// - The batches disagree on the `date` type
    pub fn from_batches(batches: Vec<RecordBatch>) -> Result<Self> {
        if batches.is_empty() {
            return Err(Error::EmptyTable);
        }

        let project = Select::new(schema::KEY_COLUMNS);
        let mut projected = Vec::with_capacity(batches.len());
        for batch in batches {
            schema::check_columns(&batch.schema())?;
            projected.push(project.apply(batch)?);
        }

        let target = projected[0].schema();
        for (i, batch) in projected.iter().enumerate().skip(1) {
            if batch.schema() != target {
                return Err(Error::schema_mismatch(format!(
                    "Batch {} has different schema than batch 0",
                    i
                )));
            }
        }

        let batch = if projected.len() == 1 {
            projected.remove(0)
        } else {
            concat_batches(&target, &projected).map_err(Error::Arrow)?
        };
        Ok(Self { batch })
    }

    /// Creates a table from a single batch.
    ///
    /// # Errors
    ///
    /// See [`LayoffTable::from_batches`].
    pub fn from_batch(batch: RecordBatch) -> Result<Self> {
        Self::from_batches(vec![batch])
    }

    /// Wraps a batch produced by the pipeline without re-projecting it.
    pub(crate) fn from_cleaned(batch: RecordBatch) -> Self {
        Self { batch }
    }

    /// Creates a source table from raw rows.
    ///
    /// # Errors
    ///
    /// Returns an error if Arrow rejects the arrays.
    pub fn from_raw_records(records: &[RawLayoff]) -> Result<Self> {
        Ok(Self {
            batch: RawLayoff::to_batch(records)?,
        })
    }

    /// Loads a source table from a CSV file with a header row.
    ///
    /// The nine columns are read with the source schema; no type inference
    /// takes place. A file with only a header row gives an empty table.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be opened
    /// - A value does not fit its column type
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| Error::io(e, path))?;
        Self::read_csv(std::io::BufReader::new(file))
    }

    /// Loads a source table from CSV text with a header row.
    ///
    /// # Errors
    ///
    /// See [`LayoffTable::from_csv`].
    pub fn from_csv_str(data: &str) -> Result<Self> {
        Self::read_csv(std::io::Cursor::new(data.as_bytes()))
    }

    fn read_csv<R: std::io::BufRead>(reader: R) -> Result<Self> {
        use arrow_csv::ReaderBuilder;

        let null_regex = Regex::new(CSV_NULL_PATTERN)
            .map_err(|e| Error::invalid_config(format!("null pattern: {e}")))?;

        let reader = ReaderBuilder::new(schema::source_schema())
            .with_header(true)
            .with_batch_size(8192)
            .with_null_regex(null_regex)
            .build_buffered(reader)
            .map_err(Error::Arrow)?;

        let batches: Vec<RecordBatch> = reader
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::Arrow)?;

        if batches.is_empty() {
            return Ok(Self::empty());
        }
        Self::from_batches(batches)
    }

    /// Saves the table to a CSV file with a header row.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or writing fails.
    pub fn to_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        use arrow_csv::WriterBuilder;

        let path = path.as_ref();
        let file = std::fs::File::create(path).map_err(|e| Error::io(e, path))?;

        let mut writer = WriterBuilder::new()
            .with_header(true)
            .with_date_format("%Y-%m-%d".to_string())
            .build(file);
        writer.write(&self.batch).map_err(Error::Arrow)?;

        Ok(())
    }

    /// Loads a table from a Parquet file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be opened
    /// - The file is not valid Parquet
    /// - The file is empty or lacks a layoff column
    pub fn from_parquet(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| Error::io(e, path))?;

        let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(Error::Parquet)?;
        let reader = builder.build().map_err(Error::Parquet)?;

        let batches: Vec<RecordBatch> = reader
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::Arrow)?;

        Self::from_batches(batches)
    }

    /// Saves the table to a Parquet file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be created
    /// - Writing fails
    pub fn to_parquet(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path).map_err(|e| Error::io(e, path))?;

        let props = WriterProperties::builder().build();
        let mut writer =
            ArrowWriter::try_new(file, self.batch.schema(), Some(props)).map_err(Error::Parquet)?;
        writer.write(&self.batch).map_err(Error::Parquet)?;
        writer.close().map_err(Error::Parquet)?;
        Ok(())
    }

    /// Loads a table based on the file extension (`csv` or `parquet`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] for other extensions, or any
    /// error of the matching reader.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
            "csv" => Self::from_csv(path),
            "parquet" => Self::from_parquet(path),
            ext => Err(Error::unsupported_format(ext)),
        }
    }

    /// Saves the table based on the file extension (`csv` or `parquet`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] for other extensions, or any
    /// error of the matching writer.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
            "csv" => self.to_csv(path),
            "parquet" => self.to_parquet(path),
            ext => Err(Error::unsupported_format(ext)),
        }
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.batch.num_rows()
    }

    /// Returns true if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the schema.
    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    /// Returns the underlying batch.
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Consumes the table and returns the underlying batch.
    pub fn into_batch(self) -> RecordBatch {
        self.batch
    }

    /// Returns true if `date` has been parsed into `Date32`.
    pub fn is_cleaned(&self) -> bool {
        self.schema()
            .column_with_name(schema::DATE)
            .is_some_and(|(_, f)| f.data_type() == &arrow::datatypes::DataType::Date32)
    }

    /// Reads the rows of a source table.
    ///
    /// # Errors
    ///
    /// Returns an error if `date` has already been parsed.
    pub fn raw_records(&self) -> Result<Vec<RawLayoff>> {
        RawLayoff::from_batch(&self.batch)
    }

    /// Reads the rows of a cleaned table.
    ///
    /// # Errors
    ///
    /// Returns an error if `date` is still text.
    pub fn records(&self) -> Result<Vec<LayoffRecord>> {
        LayoffRecord::from_batch(&self.batch)
    }

    /// Applies a transform to create a new table.
    ///
    /// # Errors
    ///
    /// Returns an error if the transform fails.
    pub fn with_transform<T: Transform>(&self, transform: &T) -> Result<Self> {
        Ok(Self {
            batch: transform.apply(self.batch.clone())?,
        })
    }

    /// Returns an empty table with the source schema.
    pub fn empty() -> Self {
        Self {
            batch: RecordBatch::new_empty(schema::source_schema()),
        }
    }
}

impl TryFrom<RecordBatch> for LayoffTable {
    type Error = Error;

    fn try_from(batch: RecordBatch) -> Result<Self> {
        Self::from_batch(batch)
    }
}

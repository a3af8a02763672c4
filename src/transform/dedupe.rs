//! Duplicate ranking and removal.

use std::{collections::HashMap, sync::Arc};

use arrow::{
    array::{
        Array, ArrayRef, BooleanArray, Date32Array, Int32Array, Int64Array, RecordBatch,
        StringArray, UInt32Array,
    },
    compute::filter_record_batch,
    datatypes::{DataType, Field, Schema},
};

use super::Transform;
use crate::{
    columns,
    error::{Error, Result},
    schema,
};

/// One cell of a duplicate key. NULL is its own value, equal only to NULL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyCell {
    Null,
    Text(String),
    Int(i64),
    Date(i32),
    Bool(bool),
}

/// A transform that numbers rows within groups of identical key values.
///
/// Rows are visited in table order, so within each group the first row gets
/// rank 1, the next rank 2, and so on. The rank is appended as a non-null
/// `UInt32` column (`row_num` by default). An existing rank column is
/// replaced.
///
/// # Example
///
/// ```ignore
/// use layoffs_clean::RankDuplicates;
///
/// // Rank on all nine layoff columns
/// let rank = RankDuplicates::new();
///
/// // Rank on a subset
/// let rank = RankDuplicates::by(["company", "date"]);
/// ```
#[derive(Debug, Clone)]
pub struct RankDuplicates {
    columns: Vec<String>,
    rank_column: String,
}

impl RankDuplicates {
    /// Ranks on the full nine-column layoff key.
    pub fn new() -> Self {
        Self::by(schema::KEY_COLUMNS)
    }

    /// Ranks on specific columns.
    pub fn by<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rank_column: schema::ROW_NUM.to_string(),
        }
    }

    /// Sets the name of the appended rank column.
    #[must_use]
    pub fn rank_column(mut self, name: impl Into<String>) -> Self {
        self.rank_column = name.into();
        self
    }

    /// Returns the key columns.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    fn cell(col: &ArrayRef, row: usize) -> Result<KeyCell> {
        if col.is_null(row) {
            return Ok(KeyCell::Null);
        }
        let any = col.as_any();
        let cell = match col.data_type() {
            DataType::Utf8 => any
                .downcast_ref::<StringArray>()
                .map(|a| KeyCell::Text(a.value(row).to_string())),
            DataType::Int64 => any
                .downcast_ref::<Int64Array>()
                .map(|a| KeyCell::Int(a.value(row))),
            DataType::Int32 => any
                .downcast_ref::<Int32Array>()
                .map(|a| KeyCell::Int(i64::from(a.value(row)))),
            DataType::Date32 => any
                .downcast_ref::<Date32Array>()
                .map(|a| KeyCell::Date(a.value(row))),
            DataType::Boolean => any
                .downcast_ref::<BooleanArray>()
                .map(|a| KeyCell::Bool(a.value(row))),
            _ => None,
        };
        cell.ok_or_else(|| {
            Error::transform(format!(
                "cannot use {} column as duplicate key",
                col.data_type()
            ))
        })
    }

    /// Computes the rank of every row without modifying the batch.
    ///
    /// # Errors
    ///
    /// Returns an error if a key column is missing or has an unsupported type.
    pub fn ranks(&self, batch: &RecordBatch) -> Result<Vec<u32>> {
        let key_columns: Vec<&ArrayRef> = self
            .columns
            .iter()
            .map(|name| columns::index_of(batch, name).map(|idx| batch.column(idx)))
            .collect::<Result<Vec<_>>>()?;

        let mut seen: HashMap<Vec<KeyCell>, u32> = HashMap::new();
        let mut ranks = Vec::with_capacity(batch.num_rows());

        for row in 0..batch.num_rows() {
            let key = key_columns
                .iter()
                .map(|col| Self::cell(col, row))
                .collect::<Result<Vec<_>>>()?;
            let count = seen.entry(key).or_insert(0);
            *count += 1;
            ranks.push(*count);
        }

        Ok(ranks)
    }
}

impl Default for RankDuplicates {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for RankDuplicates {
    fn apply(&self, batch: RecordBatch) -> Result<RecordBatch> {
        if self.columns.iter().any(|c| *c == self.rank_column) {
            return Err(Error::transform(format!(
                "rank column '{}' cannot be part of the key",
                self.rank_column
            )));
        }

        let ranks = UInt32Array::from(self.ranks(&batch)?);
        let schema = batch.schema();

        let mut fields: Vec<Field> = Vec::with_capacity(schema.fields().len() + 1);
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len() + 1);
        for (idx, field) in schema.fields().iter().enumerate() {
            if field.name() != &self.rank_column {
                fields.push(field.as_ref().clone());
                arrays.push(Arc::clone(batch.column(idx)));
            }
        }
        fields.push(Field::new(&self.rank_column, DataType::UInt32, false));
        arrays.push(Arc::new(ranks));

        let new_schema = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));
        RecordBatch::try_new(new_schema, arrays).map_err(Error::Arrow)
    }
}

/// A transform that keeps only the rows with rank 1.
#[derive(Debug, Clone)]
pub struct RetainFirstRank {
    rank_column: String,
}

impl RetainFirstRank {
    /// Filters on the default `row_num` column.
    pub fn new() -> Self {
        Self::on(schema::ROW_NUM)
    }

    /// Filters on a named rank column.
    pub fn on(rank_column: impl Into<String>) -> Self {
        Self {
            rank_column: rank_column.into(),
        }
    }
}

impl Default for RetainFirstRank {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for RetainFirstRank {
    fn apply(&self, batch: RecordBatch) -> Result<RecordBatch> {
        let idx = columns::index_of(&batch, &self.rank_column)?;
        let ranks = batch
            .column(idx)
            .as_any()
            .downcast_ref::<UInt32Array>()
            .ok_or_else(|| {
                Error::schema_mismatch(format!("rank column '{}' must be UInt32", self.rank_column))
            })?;

        let mask: BooleanArray = ranks.iter().map(|r| Some(r == Some(1))).collect();
        if mask.true_count() == batch.num_rows() {
            return Ok(batch);
        }
        filter_record_batch(&batch, &mask).map_err(Error::Arrow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Chain;

    fn create_test_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("company", DataType::Utf8, true),
            Field::new("industry", DataType::Utf8, true),
            Field::new("total_laid_off", DataType::Int64, true),
        ]));

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec![
                    Some("Acme"),
                    Some("Acme"),
                    Some("Acme"),
                    Some("Globex"),
                    Some("Acme"),
                ])),
                Arc::new(StringArray::from(vec![
                    None,
                    None,
                    Some("NULL"),
                    None,
                    None,
                ])),
                Arc::new(Int64Array::from(vec![
                    Some(10),
                    Some(10),
                    Some(10),
                    Some(10),
                    None,
                ])),
            ],
        )
        .ok()
        .unwrap_or_else(|| panic!("Should create batch"))
    }

    fn rank_values(batch: &RecordBatch) -> Vec<u32> {
        let idx = columns::index_of(batch, schema::ROW_NUM)
            .ok()
            .unwrap_or_else(|| panic!("Should have rank column"));
        batch
            .column(idx)
            .as_any()
            .downcast_ref::<UInt32Array>()
            .unwrap_or_else(|| panic!("Should be UInt32Array"))
            .values()
            .to_vec()
    }

    #[test]
    fn test_null_equals_null_but_not_text_null() {
        let rank = RankDuplicates::by(["company", "industry", "total_laid_off"]);
        let ranks = rank
            .ranks(&create_test_batch())
            .ok()
            .unwrap_or_else(|| panic!("Should rank"));
        // Rows 0 and 1 share (Acme, NULL, 10); row 2 has the text "NULL".
        assert_eq!(ranks, vec![1, 2, 1, 1, 1]);
    }

    #[test]
    fn test_rank_appends_column() {
        let rank = RankDuplicates::by(["company", "industry", "total_laid_off"]);
        let result = rank
            .apply(create_test_batch())
            .ok()
            .unwrap_or_else(|| panic!("Should rank"));
        assert_eq!(result.num_columns(), 4);
        assert_eq!(result.schema().field(3).name(), schema::ROW_NUM);
        assert!(!result.schema().field(3).is_nullable());
        assert_eq!(rank_values(&result), vec![1, 2, 1, 1, 1]);
    }

    #[test]
    fn test_rerank_replaces_existing_column() {
        let rank = RankDuplicates::by(["company"]);
        let once = rank
            .apply(create_test_batch())
            .ok()
            .unwrap_or_else(|| panic!("Should rank"));
        let twice = rank
            .apply(once)
            .ok()
            .unwrap_or_else(|| panic!("Should rank again"));
        assert_eq!(twice.num_columns(), 4);
        assert_eq!(rank_values(&twice), vec![1, 2, 3, 1, 4]);
    }

    #[test]
    fn test_retain_first_rank() {
        let chain = Chain::new()
            .then(RankDuplicates::by(["company", "industry", "total_laid_off"]))
            .then(RetainFirstRank::new());
        let result = chain
            .apply(create_test_batch())
            .ok()
            .unwrap_or_else(|| panic!("Should dedupe"));
        assert_eq!(result.num_rows(), 4);
        assert!(rank_values(&result).iter().all(|&r| r == 1));
    }

    #[test]
    fn test_dedupe_is_idempotent() {
        let chain = Chain::new()
            .then(RankDuplicates::by(["company", "industry", "total_laid_off"]))
            .then(RetainFirstRank::new());
        let once = chain
            .apply(create_test_batch())
            .ok()
            .unwrap_or_else(|| panic!("Should dedupe"));
        let twice = chain
            .apply(once.clone())
            .ok()
            .unwrap_or_else(|| panic!("Should dedupe again"));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_missing_key_column() {
        let rank = RankDuplicates::new();
        let result = rank.apply(create_test_batch());
        assert!(matches!(result, Err(Error::ColumnNotFound { .. })));
    }

    #[test]
    fn test_rank_column_in_key_is_rejected() {
        let rank = RankDuplicates::by(["company", "row_num"]);
        assert!(rank.apply(create_test_batch()).is_err());
    }

    #[test]
    fn test_retain_requires_rank_column() {
        let result = RetainFirstRank::new().apply(create_test_batch());
        assert!(matches!(result, Err(Error::ColumnNotFound { .. })));
    }

    #[test]
    fn test_empty_batch() {
        let batch = create_test_batch().slice(0, 0);
        let result = RankDuplicates::by(["company"])
            .apply(batch)
            .ok()
            .unwrap_or_else(|| panic!("Should rank empty batch"));
        assert_eq!(result.num_rows(), 0);
    }
}

//! Typed column access on RecordBatches.

use std::sync::Arc;

use arrow::{
    array::{Array, ArrayRef, Date32Array, Int64Array, RecordBatch, StringArray},
    datatypes::{Field, Schema},
};

use crate::error::{Error, Result};

/// Returns the index of `name` in the batch schema.
pub(crate) fn index_of(batch: &RecordBatch, name: &str) -> Result<usize> {
    batch
        .schema()
        .column_with_name(name)
        .map(|(idx, _)| idx)
        .ok_or_else(|| Error::column_not_found(name))
}

fn downcast<'a, A: Array + 'static>(
    batch: &'a RecordBatch,
    name: &str,
    expected: &str,
) -> Result<&'a A> {
    let idx = index_of(batch, name)?;
    let col = batch.column(idx);
    col.as_any().downcast_ref::<A>().ok_or_else(|| {
        Error::schema_mismatch(format!(
            "column '{}' has type {}, expected {}",
            name,
            col.data_type(),
            expected
        ))
    })
}

/// Returns a Utf8 column by name.
pub(crate) fn text<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    downcast::<StringArray>(batch, name, "Utf8")
}

/// Returns an Int64 column by name.
pub(crate) fn int64<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int64Array> {
    downcast::<Int64Array>(batch, name, "Int64")
}

/// Returns a Date32 column by name.
pub(crate) fn date32<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Date32Array> {
    downcast::<Date32Array>(batch, name, "Date32")
}

/// Reads an optional string cell.
pub(crate) fn text_value(arr: &StringArray, row: usize) -> Option<&str> {
    if arr.is_null(row) {
        None
    } else {
        Some(arr.value(row))
    }
}

/// Replaces the column at `idx`, keeping the field name and nullability.
///
/// The field type follows the new array.
pub(crate) fn replace(batch: &RecordBatch, idx: usize, array: ArrayRef) -> Result<RecordBatch> {
    let schema = batch.schema();
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(i, field)| {
            if i == idx {
                Field::new(field.name(), array.data_type().clone(), field.is_nullable())
            } else {
                field.as_ref().clone()
            }
        })
        .collect();

    let mut arrays: Vec<ArrayRef> = batch.columns().to_vec();
    arrays[idx] = array;

    let new_schema = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));
    RecordBatch::try_new(new_schema, arrays).map_err(Error::Arrow)
}

/// Counts rows whose value in a Utf8 column differs between two batches.
pub(crate) fn count_changed(before: &RecordBatch, after: &RecordBatch, name: &str) -> Result<usize> {
    let a = text(before, name)?;
    let b = text(after, name)?;
    if a.len() != b.len() {
        return Err(Error::schema_mismatch(format!(
            "cannot compare column '{}' across {} and {} rows",
            name,
            a.len(),
            b.len()
        )));
    }
    Ok((0..a.len())
        .filter(|&i| text_value(a, i) != text_value(b, i))
        .count())
}

#[cfg(test)]
mod tests {
    use arrow::datatypes::DataType;

    use super::*;

    fn create_test_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("company", DataType::Utf8, true),
            Field::new("total_laid_off", DataType::Int64, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec![Some("Acme"), None])),
                Arc::new(Int64Array::from(vec![Some(10), None])),
            ],
        )
        .ok()
        .unwrap_or_else(|| panic!("Should create batch"))
    }

    #[test]
    fn test_typed_access() {
        let batch = create_test_batch();
        let company = text(&batch, "company").ok().unwrap_or_else(|| panic!("text"));
        assert_eq!(text_value(company, 0), Some("Acme"));
        assert_eq!(text_value(company, 1), None);
        assert!(int64(&batch, "total_laid_off").is_ok());
    }

    #[test]
    fn test_wrong_type_is_schema_mismatch() {
        let batch = create_test_batch();
        assert!(matches!(
            text(&batch, "total_laid_off"),
            Err(Error::SchemaMismatch { .. })
        ));
        assert!(matches!(
            date32(&batch, "company"),
            Err(Error::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_column() {
        let batch = create_test_batch();
        assert!(matches!(
            index_of(&batch, "country"),
            Err(Error::ColumnNotFound { .. })
        ));
    }

    #[test]
    fn test_replace_changes_type() {
        let batch = create_test_batch();
        let replaced = replace(
            &batch,
            1,
            Arc::new(StringArray::from(vec![Some("10"), None])),
        )
        .ok()
        .unwrap_or_else(|| panic!("Should replace"));
        assert_eq!(replaced.schema().field(1).data_type(), &DataType::Utf8);
        assert_eq!(replaced.schema().field(1).name(), "total_laid_off");
    }

    #[test]
    fn test_count_changed() {
        let before = create_test_batch();
        let after = replace(
            &before,
            0,
            Arc::new(StringArray::from(vec![Some("Acme"), Some("New")])),
        )
        .ok()
        .unwrap_or_else(|| panic!("Should replace"));
        assert_eq!(count_changed(&before, &after, "company").ok(), Some(1));
    }
}

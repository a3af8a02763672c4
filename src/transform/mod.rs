//! Table transforms for the cleaning pipeline.
//!
//! Every cleaning step is a [`Transform`] over a whole RecordBatch. Steps are
//! composable and can be chained together with [`Chain`].

use std::{borrow::Cow, sync::Arc};

use arrow::{
    array::{Array, BooleanArray, RecordBatch, StringArray},
    compute::filter_record_batch,
};

use crate::{
    columns,
    error::{Error, Result},
    schema,
};

mod backfill;
mod dates;
mod dedupe;
mod selection;
mod text;

pub use backfill::{AssignIndustry, BackfillIndustry, BackfillPlan, IndustryConflict};
pub use dates::{parse_event_date, ParseDates};
pub use dedupe::{RankDuplicates, RetainFirstRank};
pub use selection::{Drop, Select};
pub use text::{BlankToNull, CanonicalPrefix, StripTrailingPeriod, TrimWhitespace};

/// A transform that can be applied to RecordBatches.
///
/// Transforms take a RecordBatch and produce a new RecordBatch with the
/// transformation applied. The input is never modified, so a failed
/// transform leaves the caller's batch as it was.
pub trait Transform: Send + Sync {
    /// Applies the transform to a RecordBatch.
    ///
    /// # Errors
    ///
    /// Returns an error if the transform cannot be applied to the batch.
    fn apply(&self, batch: RecordBatch) -> Result<RecordBatch>;
}

/// A transform that filters rows based on a predicate.
///
/// The predicate function receives a RecordBatch and must return a BooleanArray
/// with the same number of rows, where `true` indicates the row should be kept.
///
/// # Example
///
/// ```ignore
/// use layoffs_clean::Filter;
/// use arrow::array::BooleanArray;
///
/// let keep_all = Filter::new(|batch| Ok(BooleanArray::from(vec![true; batch.num_rows()])));
/// ```
pub struct Filter<F>
where
    F: Fn(&RecordBatch) -> Result<BooleanArray> + Send + Sync,
{
    predicate: F,
}

impl<F> Filter<F>
where
    F: Fn(&RecordBatch) -> Result<BooleanArray> + Send + Sync,
{
    /// Creates a new Filter transform with the given predicate.
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<F> Transform for Filter<F>
where
    F: Fn(&RecordBatch) -> Result<BooleanArray> + Send + Sync,
{
    fn apply(&self, batch: RecordBatch) -> Result<RecordBatch> {
        let mask = (self.predicate)(&batch)?;
        if mask.len() != batch.num_rows() {
            return Err(Error::transform(format!(
                "filter mask has {} entries for {} rows",
                mask.len(),
                batch.num_rows()
            )));
        }
        filter_record_batch(&batch, &mask).map_err(Error::Arrow)
    }
}

/// Keeps rows that report at least one of `total_laid_off` or
/// `percentage_laid_off`.
pub fn drop_unreported() -> impl Transform {
    Filter::new(|batch: &RecordBatch| {
        let total = columns::int64(batch, schema::TOTAL_LAID_OFF)?;
        let percentage = columns::text(batch, schema::PERCENTAGE_LAID_OFF)?;
        Ok((0..batch.num_rows())
            .map(|i| Some(total.is_valid(i) || percentage.is_valid(i)))
            .collect::<BooleanArray>())
    })
}

/// A chain of transforms applied in sequence.
///
/// # Example
///
/// ```ignore
/// use layoffs_clean::{Chain, RankDuplicates, RetainFirstRank};
///
/// let dedupe = Chain::new()
///     .then(RankDuplicates::new())
///     .then(RetainFirstRank::new());
/// ```
pub struct Chain {
    transforms: Vec<Box<dyn Transform>>,
}

impl Chain {
    /// Creates a new empty transform chain.
    pub fn new() -> Self {
        Self {
            transforms: Vec::new(),
        }
    }

    /// Adds a transform to the chain.
    #[must_use]
    pub fn then<T: Transform + 'static>(mut self, transform: T) -> Self {
        self.transforms.push(Box::new(transform));
        self
    }

    /// Returns the number of transforms in the chain.
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// Returns true if the chain has no transforms.
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for Chain {
    fn apply(&self, batch: RecordBatch) -> Result<RecordBatch> {
        let mut result = batch;
        for transform in &self.transforms {
            result = transform.apply(result)?;
        }
        Ok(result)
    }
}

impl Transform for Box<dyn Transform> {
    fn apply(&self, batch: RecordBatch) -> Result<RecordBatch> {
        (**self).apply(batch)
    }
}

impl Transform for Arc<dyn Transform> {
    fn apply(&self, batch: RecordBatch) -> Result<RecordBatch> {
        (**self).apply(batch)
    }
}

/// Rewrites every non-null cell of a Utf8 column.
///
/// `f` returns the new value, or `None` to set the cell to NULL. Null cells
/// are passed through untouched.
pub(crate) fn map_text<F>(batch: &RecordBatch, column: &str, f: F) -> Result<RecordBatch>
where
    F: Fn(&str) -> Option<Cow<'_, str>>,
{
    let idx = columns::index_of(batch, column)?;
    let arr = columns::text(batch, column)?;
    let rewritten: StringArray = arr.iter().map(|cell| cell.and_then(&f)).collect();
    columns::replace(batch, idx, Arc::new(rewritten))
}

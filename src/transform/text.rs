//! Per-row text rewrites.

use std::borrow::Cow;

use arrow::array::RecordBatch;

use super::{map_text, Transform};
use crate::{error::Result, rules::PrefixMatch};

/// Strips leading and trailing whitespace from Utf8 columns.
///
/// # Example
///
/// ```ignore
/// use layoffs_clean::TrimWhitespace;
///
/// let trim = TrimWhitespace::new(["company", "country"]);
/// ```
#[derive(Debug, Clone)]
pub struct TrimWhitespace {
    columns: Vec<String>,
}

impl TrimWhitespace {
    /// Creates a trim over the given columns.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the trimmed columns.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl Transform for TrimWhitespace {
    fn apply(&self, batch: RecordBatch) -> Result<RecordBatch> {
        let mut result = batch;
        for column in &self.columns {
            result = map_text(&result, column, |s| Some(Cow::Borrowed(s.trim())))?;
        }
        Ok(result)
    }
}

/// Replaces any value starting with a prefix by one canonical value.
///
/// `CanonicalPrefix::new("industry", "Crypto", "Crypto")` turns
/// "Crypto Currency" and "CryptoCurrency" into "Crypto".
#[derive(Debug, Clone)]
pub struct CanonicalPrefix {
    column: String,
    prefix: String,
    canonical: String,
    policy: PrefixMatch,
}

impl CanonicalPrefix {
    /// Creates a case-sensitive prefix rule.
    pub fn new(
        column: impl Into<String>,
        prefix: impl Into<String>,
        canonical: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            prefix: prefix.into(),
            canonical: canonical.into(),
            policy: PrefixMatch::CaseSensitive,
        }
    }

    /// Sets the prefix comparison.
    #[must_use]
    pub fn matching(mut self, policy: PrefixMatch) -> Self {
        self.policy = policy;
        self
    }
}

impl Transform for CanonicalPrefix {
    fn apply(&self, batch: RecordBatch) -> Result<RecordBatch> {
        map_text(&batch, &self.column, |s| {
            if s != self.canonical && self.policy.matches(s, &self.prefix) {
                Some(Cow::Owned(self.canonical.clone()))
            } else {
                Some(Cow::Borrowed(s))
            }
        })
    }
}

/// Removes one trailing `.` from values that start with a prefix.
///
/// Only a single period goes; "United States.." becomes "United States.".
#[derive(Debug, Clone)]
pub struct StripTrailingPeriod {
    column: String,
    prefix: String,
}

impl StripTrailingPeriod {
    /// Creates the rule for `column` values starting with `prefix`.
    pub fn new(column: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            prefix: prefix.into(),
        }
    }
}

impl Transform for StripTrailingPeriod {
    fn apply(&self, batch: RecordBatch) -> Result<RecordBatch> {
        map_text(&batch, &self.column, |s| {
            if s.starts_with(self.prefix.as_str()) {
                Some(Cow::Borrowed(s.strip_suffix('.').unwrap_or(s)))
            } else {
                Some(Cow::Borrowed(s))
            }
        })
    }
}

/// Turns blank (empty or whitespace-only) values into NULL.
#[derive(Debug, Clone)]
pub struct BlankToNull {
    column: String,
}

impl BlankToNull {
    /// Creates the rule for one column.
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Transform for BlankToNull {
    fn apply(&self, batch: RecordBatch) -> Result<RecordBatch> {
        map_text(&batch, &self.column, |s| {
            if s.trim().is_empty() {
                None
            } else {
                Some(Cow::Borrowed(s))
            }
        })
    }
}

//! Cleaning rules.
//!
//! [`CleaningRules`] is the single knob set of the pipeline. Its `Default`
//! is the fixed rule set the layoff table is cleaned with; the builder
//! methods exist for variations and tests.
//!
//! # Example
//!
//! ```
//! use layoffs_clean::{AmbiguityPolicy, CleaningRules};
//!
//! let rules = CleaningRules::default()
//!     .with_override("Bally's Interactive", "Media")
//!     .with_ambiguity_policy(AmbiguityPolicy::Reject);
//! assert!(rules.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    schema,
};

/// How a prefix rule compares text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrefixMatch {
    /// Byte-exact prefix comparison.
    #[default]
    CaseSensitive,
    /// Unicode lowercase comparison of both sides.
    CaseInsensitive,
}

impl PrefixMatch {
    /// Returns true if `text` starts with `prefix` under this policy.
    pub fn matches(self, text: &str, prefix: &str) -> bool {
        match self {
            Self::CaseSensitive => text.starts_with(prefix),
            Self::CaseInsensitive => text.to_lowercase().starts_with(&prefix.to_lowercase()),
        }
    }
}

/// What to do with a date cell that does not match the format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateErrorPolicy {
    /// Fail the stage on the first malformed value.
    #[default]
    Abort,
    /// Replace the malformed value with NULL and keep going.
    Null,
}

/// What to do when one company's records disagree on industry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPolicy {
    /// Use the first non-blank industry in table order and log a warning.
    #[default]
    FirstSeen,
    /// Fail the backfill stage.
    Reject,
}

/// A hardcoded industry for one company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndustryOverride {
    /// Exact company name.
    pub company: String,
    /// Industry to assign.
    pub industry: String,
}

/// The full rule set of a cleaning run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningRules {
    /// Text columns stripped of surrounding whitespace.
    pub trim_columns: Vec<String>,
    /// Industry prefix collapsed to [`Self::crypto_canonical`].
    pub crypto_prefix: String,
    /// Canonical industry for the crypto prefix.
    pub crypto_canonical: String,
    /// Comparison used for the crypto prefix.
    pub crypto_match: PrefixMatch,
    /// Countries with this prefix lose one trailing period.
    pub us_country_prefix: String,
    /// Turn blank industries into NULL during normalization.
    pub blank_industry_as_null: bool,
    /// chrono format of the source date text.
    pub date_format: String,
    /// Malformed date handling.
    pub date_errors: DateErrorPolicy,
    /// Industries assigned before general backfill.
    pub overrides: Vec<IndustryOverride>,
    /// Conflicting industry handling during backfill.
    pub ambiguity: AmbiguityPolicy,
    /// Remove rows without any layoff figure after backfill.
    pub drop_unreported: bool,
}

impl Default for CleaningRules {
    fn default() -> Self {
        Self {
            trim_columns: vec![
                schema::COMPANY.to_string(),
                schema::INDUSTRY.to_string(),
                schema::COUNTRY.to_string(),
            ],
            crypto_prefix: "Crypto".to_string(),
            crypto_canonical: "Crypto".to_string(),
            crypto_match: PrefixMatch::CaseSensitive,
            us_country_prefix: "United States".to_string(),
            blank_industry_as_null: true,
            date_format: "%m/%d/%Y".to_string(),
            date_errors: DateErrorPolicy::Abort,
            overrides: vec![IndustryOverride {
                company: "Airbnb".to_string(),
                industry: "Travel".to_string(),
            }],
            ambiguity: AmbiguityPolicy::FirstSeen,
            drop_unreported: false,
        }
    }
}

impl CleaningRules {
    /// Creates the default rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the columns to trim.
    #[must_use]
    pub fn with_trim_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.trim_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the crypto prefix comparison.
    #[must_use]
    pub fn with_crypto_match(mut self, policy: PrefixMatch) -> Self {
        self.crypto_match = policy;
        self
    }

    /// Keeps blank industries as blank text instead of NULL.
    #[must_use]
    pub fn keep_blank_industry(mut self) -> Self {
        self.blank_industry_as_null = false;
        self
    }

    /// Sets the source date format.
    #[must_use]
    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = format.into();
        self
    }

    /// Sets malformed date handling.
    #[must_use]
    pub fn with_date_errors(mut self, policy: DateErrorPolicy) -> Self {
        self.date_errors = policy;
        self
    }

    /// Adds or replaces a hardcoded industry for a company.
    #[must_use]
    pub fn with_override(mut self, company: impl Into<String>, industry: impl Into<String>) -> Self {
        let company = company.into();
        let industry = industry.into();
        match self.overrides.iter_mut().find(|o| o.company == company) {
            Some(existing) => existing.industry = industry,
            None => self.overrides.push(IndustryOverride { company, industry }),
        }
        self
    }

    /// Removes all hardcoded industries.
    #[must_use]
    pub fn without_overrides(mut self) -> Self {
        self.overrides.clear();
        self
    }

    /// Sets conflicting industry handling.
    #[must_use]
    pub fn with_ambiguity_policy(mut self, policy: AmbiguityPolicy) -> Self {
        self.ambiguity = policy;
        self
    }

    /// Enables or disables removal of rows without layoff figures.
    #[must_use]
    pub fn with_drop_unreported(mut self, enabled: bool) -> Self {
        self.drop_unreported = enabled;
        self
    }

    /// Checks the rules for values that would make a stage meaningless.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.crypto_prefix.is_empty() {
            return Err(Error::invalid_config("crypto prefix must not be empty"));
        }
        if self.crypto_canonical.trim().is_empty() {
            return Err(Error::invalid_config("crypto canonical value must not be blank"));
        }
        if self.us_country_prefix.is_empty() {
            return Err(Error::invalid_config("country prefix must not be empty"));
        }
        if self.date_format.is_empty() {
            return Err(Error::invalid_config("date format must not be empty"));
        }
        for column in &self.trim_columns {
            if !schema::KEY_COLUMNS.contains(&column.as_str()) {
                return Err(Error::invalid_config(format!(
                    "cannot trim unknown column '{column}'"
                )));
            }
        }
        for o in &self.overrides {
            if o.company.is_empty() {
                return Err(Error::invalid_config("override company must not be empty"));
            }
            if o.industry.trim().is_empty() {
                return Err(Error::invalid_config(format!(
                    "override industry for '{}' must not be blank",
                    o.company
                )));
            }
        }
        Ok(())
    }
}

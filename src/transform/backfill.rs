//! Industry overrides and same-company backfill.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use arrow::array::{RecordBatch, StringArray};
use serde::Serialize;

use super::Transform;
use crate::{
    columns,
    error::{Error, Result},
    rules::{AmbiguityPolicy, IndustryOverride},
    schema,
};

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |s| s.trim().is_empty())
}

/// Sets the industry of named companies to a known value.
///
/// Matching is exact on the company string. The assignment is unconditional:
/// an existing industry is overwritten.
#[derive(Debug, Clone)]
pub struct AssignIndustry {
    overrides: HashMap<String, String>,
}

impl AssignIndustry {
    /// Creates the transform from override rules. Later rules win.
    pub fn new<'a>(overrides: impl IntoIterator<Item = &'a IndustryOverride>) -> Self {
        Self {
            overrides: overrides
                .into_iter()
                .map(|o| (o.company.clone(), o.industry.clone()))
                .collect(),
        }
    }

    /// Creates the transform for a single company.
    pub fn single(company: impl Into<String>, industry: impl Into<String>) -> Self {
        Self {
            overrides: HashMap::from([(company.into(), industry.into())]),
        }
    }
}

impl Transform for AssignIndustry {
    fn apply(&self, batch: RecordBatch) -> Result<RecordBatch> {
        if self.overrides.is_empty() {
            return Ok(batch);
        }

        let companies = columns::text(&batch, schema::COMPANY)?;
        let industries = columns::text(&batch, schema::INDUSTRY)?;

        let assigned: StringArray = (0..batch.num_rows())
            .map(|row| {
                columns::text_value(companies, row)
                    .and_then(|company| self.overrides.get(company))
                    .map(String::as_str)
                    .or_else(|| columns::text_value(industries, row))
            })
            .collect();

        let idx = columns::index_of(&batch, schema::INDUSTRY)?;
        columns::replace(&batch, idx, Arc::new(assigned))
    }
}

/// A company whose records name more than one industry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndustryConflict {
    /// Company name.
    pub company: String,
    /// Distinct non-blank industries in table order. The first one wins
    /// under [`AmbiguityPolicy::FirstSeen`].
    pub candidates: Vec<String>,
}

/// The donor map computed by [`BackfillIndustry::plan`].
#[derive(Debug, Clone, Default)]
pub struct BackfillPlan {
    donors: HashMap<String, String>,
    conflicts: Vec<IndustryConflict>,
}

impl BackfillPlan {
    /// Returns the industry that blank rows of `company` receive.
    pub fn donor(&self, company: &str) -> Option<&str> {
        self.donors.get(company).map(String::as_str)
    }

    /// Returns the companies with disagreeing industries, in table order.
    pub fn conflicts(&self) -> &[IndustryConflict] {
        &self.conflicts
    }

    /// Number of companies with a known industry.
    pub fn len(&self) -> usize {
        self.donors.len()
    }

    /// Returns true if no company has a known industry.
    pub fn is_empty(&self) -> bool {
        self.donors.is_empty()
    }
}

/// Fills NULL or blank industries from other rows of the same company.
///
/// The donor for a company is its first non-blank industry in table order.
///
/// # Example
///
/// ```ignore
/// use layoffs_clean::{AmbiguityPolicy, BackfillIndustry};
///
/// let strict = BackfillIndustry::new().with_policy(AmbiguityPolicy::Reject);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BackfillIndustry {
    policy: AmbiguityPolicy,
}

impl BackfillIndustry {
    /// Creates a backfill that resolves conflicts by first occurrence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets conflict handling.
    #[must_use]
    pub fn with_policy(mut self, policy: AmbiguityPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Builds the company to industry map without modifying the batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the company or industry column is missing.
    pub fn plan(&self, batch: &RecordBatch) -> Result<BackfillPlan> {
        let companies = columns::text(batch, schema::COMPANY)?;
        let industries = columns::text(batch, schema::INDUSTRY)?;

        let mut order: Vec<&str> = Vec::new();
        let mut candidates: HashMap<&str, Vec<&str>> = HashMap::new();

        for row in 0..batch.num_rows() {
            let Some(company) = columns::text_value(companies, row) else {
                continue;
            };
            let industry = columns::text_value(industries, row);
            if is_blank(industry) {
                continue;
            }
            let industry = industry.unwrap_or_default();

            let list = candidates.entry(company).or_insert_with(|| {
                order.push(company);
                Vec::new()
            });
            if !list.contains(&industry) {
                list.push(industry);
            }
        }

        let mut plan = BackfillPlan::default();
        for company in order {
            let list = &candidates[company];
            plan.donors
                .insert(company.to_string(), list[0].to_string());
            if list.len() > 1 {
                plan.conflicts.push(IndustryConflict {
                    company: company.to_string(),
                    candidates: list.iter().map(|s| (*s).to_string()).collect(),
                });
            }
        }
        Ok(plan)
    }
}

impl Transform for BackfillIndustry {
    fn apply(&self, batch: RecordBatch) -> Result<RecordBatch> {
        let plan = self.plan(&batch)?;

        if let Some(conflict) = plan.conflicts.first() {
            if self.policy == AmbiguityPolicy::Reject {
                return Err(Error::AmbiguousBackfill {
                    company: conflict.company.clone(),
                    candidates: conflict.candidates.clone(),
                });
            }
        }
        for conflict in &plan.conflicts {
            tracing::warn!(
                company = %conflict.company,
                candidates = ?conflict.candidates,
                "conflicting industries, using first seen"
            );
        }

        let companies = columns::text(&batch, schema::COMPANY)?;
        let industries = columns::text(&batch, schema::INDUSTRY)?;

        let mut seen_missing: HashSet<&str> = HashSet::new();
        let filled: StringArray = (0..batch.num_rows())
            .map(|row| {
                let current = columns::text_value(industries, row);
                if !is_blank(current) {
                    return current;
                }
                let Some(company) = columns::text_value(companies, row) else {
                    return current;
                };
                match plan.donor(company) {
                    Some(industry) => Some(industry),
                    None => {
                        if seen_missing.insert(company) {
                            tracing::debug!(company, "no industry known for company");
                        }
                        current
                    }
                }
            })
            .collect();

        let idx = columns::index_of(&batch, schema::INDUSTRY)?;
        columns::replace(&batch, idx, Arc::new(filled))
    }
}

#[cfg(test)]
mod tests {
    use arrow::datatypes::{DataType, Field, Schema};

    use super::*;

    fn batch_of(rows: &[(Option<&str>, Option<&str>)]) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("company", DataType::Utf8, true),
            Field::new("industry", DataType::Utf8, true),
        ]));
        let companies: StringArray = rows.iter().map(|(c, _)| *c).collect();
        let industries: StringArray = rows.iter().map(|(_, i)| *i).collect();
        RecordBatch::try_new(schema, vec![Arc::new(companies), Arc::new(industries)])
            .ok()
            .unwrap_or_else(|| panic!("Should create batch"))
    }

    fn industries(batch: &RecordBatch) -> Vec<Option<String>> {
        columns::text(batch, "industry")
            .ok()
            .unwrap_or_else(|| panic!("Should be text"))
            .iter()
            .map(|v| v.map(str::to_string))
            .collect()
    }

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    #[test]
    fn test_assign_industry_overrides() {
        let batch = batch_of(&[
            (Some("Airbnb"), None),
            (Some("Airbnb"), Some("")),
            (Some("Airbnb"), Some("Lodging")),
            (Some("Uber"), Some("Transportation")),
            (None, None),
        ]);
        let result = AssignIndustry::single("Airbnb", "Travel")
            .apply(batch)
            .ok()
            .unwrap_or_else(|| panic!("Should assign"));
        assert_eq!(
            industries(&result),
            vec![s("Travel"), s("Travel"), s("Travel"), s("Transportation"), None]
        );
    }

    #[test]
    fn test_assign_industry_exact_match_only() {
        let batch = batch_of(&[(Some("airbnb"), None), (Some("Airbnb Inc"), None)]);
        let result = AssignIndustry::single("Airbnb", "Travel")
            .apply(batch)
            .ok()
            .unwrap_or_else(|| panic!("Should assign"));
        assert_eq!(industries(&result), vec![None, None]);
    }

    #[test]
    fn test_backfill_from_same_company() {
        let batch = batch_of(&[
            (Some("Carvana"), None),
            (Some("Carvana"), Some("Transportation")),
            (Some("Carvana"), Some("")),
            (Some("Juul"), Some("Consumer")),
            (Some("Juul"), None),
            (Some("Bally's"), None),
        ]);
        let result = BackfillIndustry::new()
            .apply(batch)
            .ok()
            .unwrap_or_else(|| panic!("Should backfill"));
        assert_eq!(
            industries(&result),
            vec![
                s("Transportation"),
                s("Transportation"),
                s("Transportation"),
                s("Consumer"),
                s("Consumer"),
                None
            ]
        );
    }

    #[test]
    fn test_backfill_keeps_blank_without_donor() {
        let batch = batch_of(&[(Some("Solo"), Some(""))]);
        let result = BackfillIndustry::new()
            .apply(batch)
            .ok()
            .unwrap_or_else(|| panic!("Should backfill"));
        assert_eq!(industries(&result), vec![s("")]);
    }

    #[test]
    fn test_plan_reports_conflicts_first_seen_wins() {
        let batch = batch_of(&[
            (Some("Acme"), Some("Retail")),
            (Some("Acme"), Some("Media")),
            (Some("Acme"), Some("Retail")),
            (Some("Acme"), None),
        ]);
        let backfill = BackfillIndustry::new();
        let plan = backfill
            .plan(&batch)
            .ok()
            .unwrap_or_else(|| panic!("Should plan"));
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.donor("Acme"), Some("Retail"));
        assert_eq!(
            plan.conflicts(),
            &[IndustryConflict {
                company: "Acme".to_string(),
                candidates: vec!["Retail".to_string(), "Media".to_string()],
            }]
        );

        let result = backfill
            .apply(batch)
            .ok()
            .unwrap_or_else(|| panic!("Should backfill"));
        assert_eq!(industries(&result)[3], s("Retail"));
    }

    #[test]
    fn test_reject_policy_fails_on_conflict() {
        let batch = batch_of(&[(Some("Acme"), Some("Retail")), (Some("Acme"), Some("Media"))]);
        let result = BackfillIndustry::new()
            .with_policy(AmbiguityPolicy::Reject)
            .apply(batch);
        match result {
            Err(Error::AmbiguousBackfill {
                company,
                candidates,
            }) => {
                assert_eq!(company, "Acme");
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("expected AmbiguousBackfill, got {other:?}"),
        }
    }

    #[test]
    fn test_company_match_is_exact() {
        let batch = batch_of(&[(Some("acme"), Some("Retail")), (Some("Acme"), None)]);
        let result = BackfillIndustry::new()
            .apply(batch)
            .ok()
            .unwrap_or_else(|| panic!("Should backfill"));
        assert_eq!(industries(&result), vec![s("Retail"), None]);
    }
}

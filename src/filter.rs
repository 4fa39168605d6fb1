// Filter engine: AND across dimensions, OR within a list-valued dimension.
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::InvalidInputError;
use crate::tiering::RevenueTier;
use crate::types::ClassifiedRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrowthFilter {
    #[default]
    Any,
    Growing,
    Shrinking,
}

impl GrowthFilter {
    pub fn parse(s: &str) -> Result<Self, InvalidInputError> {
        match s {
            "any" => Ok(GrowthFilter::Any),
            "growing" => Ok(GrowthFilter::Growing),
            "shrinking" => Ok(GrowthFilter::Shrinking),
            other => Err(InvalidInputError::new(
                "growth",
                format!("expected 'any', 'growing' or 'shrinking', got '{}'", other),
            )),
        }
    }
}

/// Filter selection. Empty lists and `None` disable their dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSet {
    pub stages: Vec<String>,
    pub company_tiers: Vec<String>,
    pub revenue_tiers: Vec<RevenueTier>,
    pub growth: GrowthFilter,
    pub company_slug: Option<String>,
    pub service: Option<String>,
    pub agency: Option<String>,
}

/// A single filter dimension. Evaluation order never changes the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Stage,
    CompanyTier,
    RevenueTier,
    Growth,
    Company,
    Service,
    Agency,
}

impl Dimension {
    pub const ALL: [Dimension; 7] = [
        Dimension::Stage,
        Dimension::CompanyTier,
        Dimension::RevenueTier,
        Dimension::Growth,
        Dimension::Company,
        Dimension::Service,
        Dimension::Agency,
    ];

    pub fn matches(&self, row: &ClassifiedRow, filters: &FilterSet) -> bool {
        match self {
            Dimension::Stage => {
                filters.stages.is_empty() || filters.stages.iter().any(|s| *s == row.stage)
            }
            Dimension::CompanyTier => {
                filters.company_tiers.is_empty()
                    || filters
                        .company_tiers
                        .iter()
                        .any(|t| t == row.company_tier.label())
            }
            Dimension::RevenueTier => {
                filters.revenue_tiers.is_empty() || filters.revenue_tiers.contains(&row.revenue_tier)
            }
            Dimension::Growth => match filters.growth {
                GrowthFilter::Any => true,
                GrowthFilter::Growing => row.growing == Some(true),
                GrowthFilter::Shrinking => row.growing == Some(false),
            },
            Dimension::Company => filters
                .company_slug
                .as_deref()
                .map_or(true, |slug| slug == row.company_slug),
            // Both service and agency match against assigned agency names.
            Dimension::Service => filters
                .service
                .as_deref()
                .map_or(true, |v| has_service_value(row, v)),
            Dimension::Agency => filters
                .agency
                .as_deref()
                .map_or(true, |v| has_service_value(row, v)),
        }
    }
}

fn has_service_value(row: &ClassifiedRow, value: &str) -> bool {
    row.services.values().any(|v| v.as_deref() == Some(value))
}

pub fn passes(row: &ClassifiedRow, filters: &FilterSet) -> bool {
    passes_in_order(row, filters, &Dimension::ALL)
}

/// Conjunction over `order`. Dimensions not listed are not checked.
pub fn passes_in_order(row: &ClassifiedRow, filters: &FilterSet, order: &[Dimension]) -> bool {
    order.iter().all(|d| d.matches(row, filters))
}

pub fn apply(rows: &[ClassifiedRow], filters: &FilterSet) -> Vec<ClassifiedRow> {
    let out: Vec<ClassifiedRow> = rows.iter().filter(|r| passes(r, filters)).cloned().collect();
    tracing::debug!(input = rows.len(), kept = out.len(), "filters applied");
    out
}

impl FilterSet {
    /// Validate a JSON filter payload field by field.
    ///
    /// Unknown keys are ignored. `null` disables a dimension. A value of the
    /// wrong type, or an unknown growth/revenue-tier label, is rejected with the
    /// offending field name.
    pub fn from_json(value: &Value) -> Result<Self, InvalidInputError> {
        let obj = value
            .as_object()
            .ok_or_else(|| InvalidInputError::new("filterSet", "expected an object"))?;

        let revenue_tiers = string_list(obj.get("revenueTiers"), "revenueTiers")?
            .iter()
            .map(|s| RevenueTier::from_label(s))
            .collect::<Result<Vec<_>, _>>()?;

        let growth = match obj.get("growth") {
            None | Some(Value::Null) => GrowthFilter::Any,
            Some(Value::String(s)) => GrowthFilter::parse(s)?,
            Some(_) => return Err(InvalidInputError::new("growth", "expected a string")),
        };

        Ok(FilterSet {
            stages: string_list(obj.get("stages"), "stages")?,
            company_tiers: string_list(obj.get("companyTiers"), "companyTiers")?,
            revenue_tiers,
            growth,
            company_slug: optional_string(obj.get("companySlug"), "companySlug")?,
            service: optional_string(obj.get("service"), "service")?,
            agency: optional_string(obj.get("agency"), "agency")?,
        })
    }
}

fn string_list(value: Option<&Value>, field: &str) -> Result<Vec<String>, InvalidInputError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(String::from)
                    .ok_or_else(|| InvalidInputError::new(field, "expected an array of strings"))
            })
            .collect(),
        Some(_) => Err(InvalidInputError::new(field, "expected an array of strings")),
    }
}

fn optional_string(value: Option<&Value>, field: &str) -> Result<Option<String>, InvalidInputError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(InvalidInputError::new(field, "expected a string or null")),
    }
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tabled::Tabled;

use crate::error::InvalidInputError;
use crate::tiering::{CompanyTier, HeatBucket, RevenueTier};
use crate::util::{format_number, format_pct, format_revenue};

pub type Year = i32;

/// The analyzing agency. Every other agency name is a competitor.
pub const KLICK: &str = "Klick";

/// Therapeutic area assigned to rows whose brand has none.
pub const UNKNOWN_TA: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ServiceCategory {
    #[serde(rename = "AOR")]
    Aor,
    #[serde(rename = "DAOR")]
    Daor,
    #[serde(rename = "Market Access")]
    MarketAccess,
    MedComms,
    Media,
    Tech,
    Consulting,
}

impl ServiceCategory {
    pub const ALL: [ServiceCategory; 7] = [
        ServiceCategory::Aor,
        ServiceCategory::Daor,
        ServiceCategory::MarketAccess,
        ServiceCategory::MedComms,
        ServiceCategory::Media,
        ServiceCategory::Tech,
        ServiceCategory::Consulting,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ServiceCategory::Aor => "AOR",
            ServiceCategory::Daor => "DAOR",
            ServiceCategory::MarketAccess => "Market Access",
            ServiceCategory::MedComms => "MedComms",
            ServiceCategory::Media => "Media",
            ServiceCategory::Tech => "Tech",
            ServiceCategory::Consulting => "Consulting",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|s| s.label().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for ServiceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Agency assignment per service category. `None` means explicitly unassigned.
pub type ServiceMap = BTreeMap<ServiceCategory, Option<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RevenueType {
    #[default]
    #[serde(rename = "ww")]
    Ww,
    #[serde(rename = "us")]
    Us,
}

impl RevenueType {
    pub fn parse(s: &str) -> Result<Self, InvalidInputError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ww" => Ok(RevenueType::Ww),
            "us" => Ok(RevenueType::Us),
            other => Err(InvalidInputError::new(
                "revenueType",
                format!("expected 'ww' or 'us', got '{}'", other),
            )),
        }
    }
}

impl fmt::Display for RevenueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevenueType::Ww => f.write_str("WW"),
            RevenueType::Us => f.write_str("US"),
        }
    }
}

/// One line of the flat revenue snapshot CSV. Everything is optional text;
/// the loader decides what is usable.
#[derive(Debug, Deserialize)]
pub struct RawRevenueRow {
    #[serde(rename = "company")]
    pub company: Option<String>,
    #[serde(rename = "company_slug")]
    pub company_slug: Option<String>,
    #[serde(rename = "brand")]
    pub brand: Option<String>,
    #[serde(rename = "brand_id")]
    pub brand_id: Option<String>,
    #[serde(rename = "therapeutic_area")]
    pub therapeutic_area: Option<String>,
    #[serde(rename = "stage")]
    pub stage: Option<String>,
    #[serde(rename = "year")]
    pub year: Option<String>,
    #[serde(rename = "ww_sales")]
    pub ww_sales: Option<String>,
    #[serde(rename = "us_sales")]
    pub us_sales: Option<String>,
    #[serde(rename = "AOR")]
    pub aor: Option<String>,
    #[serde(rename = "DAOR")]
    pub daor: Option<String>,
    #[serde(rename = "Market Access")]
    pub market_access: Option<String>,
    #[serde(rename = "MedComms")]
    pub med_comms: Option<String>,
    #[serde(rename = "Media")]
    pub media: Option<String>,
    #[serde(rename = "Tech")]
    pub tech: Option<String>,
    #[serde(rename = "Consulting")]
    pub consulting: Option<String>,
}

impl RawRevenueRow {
    /// Service columns that carry an agency name.
    pub fn services(&self) -> ServiceMap {
        [
            (ServiceCategory::Aor, &self.aor),
            (ServiceCategory::Daor, &self.daor),
            (ServiceCategory::MarketAccess, &self.market_access),
            (ServiceCategory::MedComms, &self.med_comms),
            (ServiceCategory::Media, &self.media),
            (ServiceCategory::Tech, &self.tech),
            (ServiceCategory::Consulting, &self.consulting),
        ]
        .into_iter()
        .filter_map(|(service, agency)| {
            let agency = agency.as_deref()?.trim();
            if agency.is_empty() {
                None
            } else {
                Some((service, Some(agency.to_string())))
            }
        })
        .collect()
    }
}

/// One revenue observation. Several may share a `(brand_id, year)`; they add up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueObservation {
    pub brand_id: String,
    pub year: Year,
    #[serde(default)]
    pub ww_sales: f64,
    #[serde(default)]
    pub us_sales: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Brand {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub therapeutic_area: Option<String>,
    #[serde(default)]
    pub lifecycle_stage: Option<String>,
    #[serde(default)]
    pub services: ServiceMap,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Company {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub brands: Vec<Brand>,
    #[serde(default)]
    pub revenue_rows: Vec<RevenueObservation>,
}

/// Per-brand view rebuilt on every aggregation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedRow {
    pub company_slug: String,
    pub company_name: String,
    pub company_tier: CompanyTier,
    pub brand_id: String,
    pub brand_name: String,
    pub stage: String,
    pub therapeutic_area: String,
    pub series: BTreeMap<Year, f64>,
    pub series_us: BTreeMap<Year, f64>,
    pub years: Vec<Year>,
    pub growing: Option<bool>,
    pub revenue_tier: RevenueTier,
    pub services: ServiceMap,
}

impl ClassifiedRow {
    pub fn latest_year(&self) -> Option<Year> {
        self.years.last().copied()
    }

    pub fn first_year(&self) -> Option<Year> {
        self.years.first().copied()
    }

    pub fn value(&self, revenue_type: RevenueType, year: Year) -> f64 {
        let series = match revenue_type {
            RevenueType::Ww => &self.series,
            RevenueType::Us => &self.series_us,
        };
        series.get(&year).copied().unwrap_or(0.0)
    }

    /// Revenue in the row's own latest observed year.
    pub fn latest_revenue(&self, revenue_type: RevenueType) -> f64 {
        self.latest_year()
            .map(|y| self.value(revenue_type, y))
            .unwrap_or(0.0)
    }

    /// Assigned agency names, skipping unassigned and blank entries.
    pub fn agencies(&self) -> impl Iterator<Item = &str> {
        self.services
            .values()
            .filter_map(|v| v.as_deref())
            .filter(|v| !v.trim().is_empty())
    }

    pub fn has_known_ta(&self) -> bool {
        let ta = self.therapeutic_area.trim();
        !ta.is_empty() && !ta.eq_ignore_ascii_case("unknown")
    }
}

fn show_revenue(v: &f64) -> String {
    format_revenue(*v)
}

fn show_amount(v: &f64) -> String {
    format_number(*v, 0)
}

fn show_pct(v: &f64) -> String {
    format_pct(*v)
}

fn show_brands(v: &[String]) -> String {
    v.join(", ")
}

fn show_ratio(v: &f64) -> String {
    format_pct(*v * 100.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct BrandShareRow {
    #[tabled(rename = "Brand")]
    pub brand: String,
    #[tabled(rename = "Company")]
    pub company: String,
    #[tabled(rename = "Revenue", display_with = "show_revenue")]
    pub revenue: f64,
    #[tabled(rename = "Share", display_with = "show_pct")]
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct TaShareRow {
    #[tabled(rename = "TherapeuticArea")]
    pub therapeutic_area: String,
    #[tabled(rename = "Revenue", display_with = "show_revenue")]
    pub revenue: f64,
    #[tabled(rename = "Share", display_with = "show_pct")]
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct UnknownTaRow {
    #[tabled(rename = "Brand")]
    pub brand: String,
    #[tabled(rename = "Company")]
    pub company: String,
    #[tabled(rename = "TherapeuticArea")]
    pub therapeutic_area: String,
    #[tabled(rename = "Revenue", display_with = "show_revenue")]
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct GrowthRow {
    #[tabled(rename = "Brand")]
    pub brand: String,
    #[tabled(rename = "Company")]
    pub company: String,
    #[tabled(rename = "FirstRevenue", display_with = "show_revenue")]
    pub first_revenue: f64,
    #[tabled(rename = "LastRevenue", display_with = "show_revenue")]
    pub last_revenue: f64,
    /// Growth for growers, decline for decliners; both positive when they qualify.
    #[tabled(rename = "Rate", display_with = "show_pct")]
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct PipelineRow {
    #[tabled(rename = "Brand")]
    pub brand: String,
    #[tabled(rename = "Company")]
    pub company: String,
    #[tabled(rename = "Stage")]
    pub stage: String,
    #[tabled(rename = "PotentialRevenue", display_with = "show_revenue")]
    pub potential_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct PhaseRow {
    #[tabled(rename = "Brand")]
    pub brand: String,
    #[tabled(rename = "Company")]
    pub company: String,
    #[tabled(rename = "Phase")]
    pub phase: String,
    #[tabled(rename = "Stage")]
    pub stage: String,
    #[tabled(rename = "Revenue", display_with = "show_revenue")]
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct LaunchYearRow {
    #[tabled(rename = "Year")]
    pub year: Year,
    #[tabled(rename = "Brands")]
    pub brand_count: usize,
    #[tabled(rename = "Revenue", display_with = "show_revenue")]
    pub revenue: f64,
    #[tabled(rename = "BrandNames", display_with = "show_brands")]
    pub brands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct TaLaunchRow {
    #[tabled(rename = "TherapeuticArea")]
    pub therapeutic_area: String,
    #[tabled(rename = "Brands")]
    pub brand_count: usize,
    #[tabled(rename = "Revenue", display_with = "show_revenue")]
    pub revenue: f64,
    #[tabled(rename = "BrandNames", display_with = "show_brands")]
    pub brands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct AgencyRow {
    #[tabled(rename = "Agency")]
    pub agency: String,
    #[tabled(rename = "Brands")]
    pub brand_count: usize,
    #[tabled(rename = "Revenue", display_with = "show_revenue")]
    pub revenue: f64,
    #[tabled(rename = "BrandNames", display_with = "show_brands")]
    pub brands: Vec<String>,
}

/// One (year, therapeutic area) cell of the TA share table.
#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct TaYearCell {
    #[serde(rename = "Year")]
    #[tabled(rename = "Year")]
    pub year: Year,
    #[serde(rename = "TherapeuticArea")]
    #[tabled(rename = "TherapeuticArea")]
    pub therapeutic_area: String,
    #[serde(rename = "Revenue")]
    #[tabled(rename = "Revenue", display_with = "show_amount")]
    pub value: f64,
    #[serde(rename = "SharePct")]
    #[tabled(rename = "Share", display_with = "show_pct")]
    pub share_pct: f64,
    #[serde(rename = "Heat")]
    #[tabled(rename = "Heat")]
    pub heat: HeatBucket,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct ServiceFeeSummaryRow {
    #[serde(rename = "Service")]
    #[tabled(rename = "Service")]
    pub service: ServiceCategory,
    #[serde(rename = "Analyses")]
    #[tabled(rename = "Analyses")]
    pub count: usize,
    #[serde(rename = "TotalRevenue")]
    #[tabled(rename = "TotalRevenue", display_with = "show_amount")]
    pub total_revenue: f64,
    #[serde(rename = "TotalFees")]
    #[tabled(rename = "TotalFees", display_with = "show_amount")]
    pub total_fees: f64,
    #[serde(rename = "WeightedRatio")]
    #[tabled(rename = "WeightedRatio", display_with = "show_ratio")]
    pub weighted_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    pub as_of_year: Year,
    pub revenue_type: RevenueType,
    pub total_companies: usize,
    pub total_brands: usize,
    pub growing_brands: usize,
    pub shrinking_brands: usize,
    pub total_latest_revenue: f64,
    pub insights: Vec<String>,
}

// Fee-to-revenue ratios: estimated service fees per brand and their roll-ups.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use tabled::Tabled;

use crate::error::InvalidInputError;
use crate::types::{ClassifiedRow, RevenueType, ServiceCategory, ServiceFeeSummaryRow, Year};
use crate::util::{average, format_number, percent_of, ratio_or_zero};

/// Ratio used when nothing is configured, and by `reset_to_defaults`.
pub const DEFAULT_RATIO: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProductStage {
    #[serde(rename = "PRE_LAUNCH_2Y")]
    PreLaunch2Y,
    #[serde(rename = "PRE_LAUNCH_1Y")]
    PreLaunch1Y,
    #[serde(rename = "LAUNCH")]
    Launch,
    #[serde(rename = "POST_LAUNCH")]
    PostLaunch,
    #[serde(rename = "PRE_LOE")]
    PreLoe,
    #[serde(rename = "LOE")]
    Loe,
}

impl ProductStage {
    pub const ALL: [ProductStage; 6] = [
        ProductStage::PreLaunch2Y,
        ProductStage::PreLaunch1Y,
        ProductStage::Launch,
        ProductStage::PostLaunch,
        ProductStage::PreLoe,
        ProductStage::Loe,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            ProductStage::PreLaunch2Y => "PRE_LAUNCH_2Y",
            ProductStage::PreLaunch1Y => "PRE_LAUNCH_1Y",
            ProductStage::Launch => "LAUNCH",
            ProductStage::PostLaunch => "POST_LAUNCH",
            ProductStage::PreLoe => "PRE_LOE",
            ProductStage::Loe => "LOE",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProductStage::PreLaunch2Y => "Pre-Launch (2Y)",
            ProductStage::PreLaunch1Y => "Pre-Launch (1Y)",
            ProductStage::Launch => "Launch",
            ProductStage::PostLaunch => "Post-Launch",
            ProductStage::PreLoe => "Pre-LOE",
            ProductStage::Loe => "LOE",
        }
    }

    /// Map a free-text lifecycle stage onto a product stage.
    ///
    /// Exact stage labels win; clinical phases map onto the pre-launch
    /// stages; anything else is treated as an established brand.
    pub fn from_stage(stage: &str) -> ProductStage {
        let stage = stage.trim();
        if let Some(s) = Self::ALL
            .into_iter()
            .find(|s| s.label().eq_ignore_ascii_case(stage) || s.code() == stage)
        {
            return s;
        }
        match clinical_phase(stage) {
            Some(3) => ProductStage::Launch,
            Some(2) => ProductStage::PreLaunch1Y,
            Some(1) => ProductStage::PreLaunch2Y,
            _ if stage.to_ascii_lowercase().contains("preclinical") => ProductStage::PreLaunch2Y,
            _ => ProductStage::PostLaunch,
        }
    }
}

/// Highest clinical phase named in `stage`, as 1, 2 or 3. The phase number is
/// the token right after "phase", arabic or roman; "Phase IV" and "Phase 4"
/// are not clinical.
fn clinical_phase(stage: &str) -> Option<u8> {
    let lower = stage.to_ascii_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    tokens
        .windows(2)
        .filter(|w| w[0] == "phase")
        .filter_map(|w| match w[1] {
            "1" | "i" | "1a" | "1b" | "ia" | "ib" => Some(1),
            "2" | "ii" | "2a" | "2b" | "iia" | "iib" => Some(2),
            "3" | "iii" | "3a" | "3b" | "iiia" | "iiib" => Some(3),
            _ => None,
        })
        .max()
}

impl fmt::Display for ProductStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Reject ratios outside `[0, 1]`.
pub fn validate_ratio(ratio: f64) -> Result<f64, InvalidInputError> {
    if ratio.is_finite() && (0.0..=1.0).contains(&ratio) {
        Ok(ratio)
    } else {
        Err(InvalidInputError::new(
            "ratio",
            format!("{} is outside [0, 1]", ratio),
        ))
    }
}

pub fn estimated_fee(revenue: f64, ratio: f64) -> Result<f64, InvalidInputError> {
    Ok(revenue * validate_ratio(ratio)?)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeToRevenueRatio {
    pub id: String,
    pub service_category: ServiceCategory,
    pub stage: ProductStage,
    pub ratio: f64,
    #[serde(default)]
    pub description: String,
}

impl FeeToRevenueRatio {
    pub fn new(
        id: impl Into<String>,
        service_category: ServiceCategory,
        stage: ProductStage,
        ratio: f64,
        description: impl Into<String>,
    ) -> Result<Self, InvalidInputError> {
        Ok(FeeToRevenueRatio {
            id: id.into(),
            service_category,
            stage,
            ratio: validate_ratio(ratio)?,
            description: description.into(),
        })
    }

    fn key(&self) -> (ServiceCategory, ProductStage) {
        (self.service_category, self.stage)
    }
}

fn ratio_id(service: ServiceCategory, stage: ProductStage) -> String {
    format!(
        "{}-{}",
        service.label().to_ascii_lowercase().replace(' ', "-"),
        stage.code().to_ascii_lowercase().replace('_', "-")
    )
}

// (service, [2Y, 1Y, launch, post, pre-LOE, LOE], descriptions)
const SEEDED: [(ServiceCategory, [f64; 6], [&str; 6]); 3] = [
    (
        ServiceCategory::Aor,
        [0.03, 0.05, 0.08, 0.06, 0.04, 0.02],
        [
            "Early development phase",
            "Pre-launch preparation",
            "Launch year peak activity",
            "Established brand maintenance",
            "Pre-generic competition",
            "Post-generic minimal support",
        ],
    ),
    (
        ServiceCategory::Daor,
        [0.02, 0.04, 0.06, 0.05, 0.03, 0.01],
        [
            "Early digital strategy",
            "Digital launch preparation",
            "Digital launch campaign",
            "Ongoing digital engagement",
            "Digital retention focus",
            "Minimal digital presence",
        ],
    ),
    (
        ServiceCategory::MedComms,
        [0.04, 0.06, 0.08, 0.07, 0.05, 0.03],
        [
            "Clinical trial support",
            "Regulatory preparation",
            "Launch medical education",
            "Ongoing medical affairs",
            "Medical retention",
            "Post-generic medical support",
        ],
    ),
];

/// Ordered list of configured ratios. Lookups take the first match, so
/// insertion order decides which of several duplicates is effective.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RatioBook {
    ratios: Vec<FeeToRevenueRatio>,
}

impl RatioBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stock AOR / DAOR / MedComms ratios per stage.
    pub fn seeded() -> Self {
        let mut ratios = Vec::new();
        for (service, values, descriptions) in SEEDED {
            for ((stage, ratio), description) in ProductStage::ALL.into_iter().zip(values).zip(descriptions) {
                ratios.push(FeeToRevenueRatio {
                    id: ratio_id(service, stage),
                    service_category: service,
                    stage,
                    ratio,
                    description: description.to_string(),
                });
            }
        }
        RatioBook { ratios }
    }

    /// Build from stored ratios, rejecting any out-of-range value.
    pub fn from_ratios(ratios: Vec<FeeToRevenueRatio>) -> Result<Self, InvalidInputError> {
        for r in &ratios {
            validate_ratio(r.ratio)?;
        }
        Ok(RatioBook { ratios })
    }

    pub fn ratios(&self) -> &[FeeToRevenueRatio] {
        &self.ratios
    }

    pub fn len(&self) -> usize {
        self.ratios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratios.is_empty()
    }

    /// Append without de-duplication.
    pub fn add(&mut self, ratio: FeeToRevenueRatio) -> Result<(), InvalidInputError> {
        validate_ratio(ratio.ratio)?;
        self.ratios.push(ratio);
        Ok(())
    }

    /// Update the effective ratio for a key, or append one.
    pub fn upsert(
        &mut self,
        service: ServiceCategory,
        stage: ProductStage,
        ratio: f64,
    ) -> Result<(), InvalidInputError> {
        let ratio = validate_ratio(ratio)?;
        match self.ratios.iter_mut().find(|r| r.key() == (service, stage)) {
            Some(existing) => existing.ratio = ratio,
            None => self.ratios.push(FeeToRevenueRatio {
                id: ratio_id(service, stage),
                service_category: service,
                stage,
                ratio,
                description: String::new(),
            }),
        }
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Option<FeeToRevenueRatio> {
        let idx = self.ratios.iter().position(|r| r.id == id)?;
        Some(self.ratios.remove(idx))
    }

    pub fn ratio_for(&self, service: ServiceCategory, stage: ProductStage) -> f64 {
        self.ratios
            .iter()
            .find(|r| r.key() == (service, stage))
            .map(|r| r.ratio)
            .unwrap_or(DEFAULT_RATIO)
    }

    /// Replace everything with `DEFAULT_RATIO` for every service and stage.
    pub fn reset_to_defaults(&mut self) {
        self.ratios = ServiceCategory::ALL
            .into_iter()
            .flat_map(|service| {
                ProductStage::ALL.into_iter().map(move |stage| FeeToRevenueRatio {
                    id: ratio_id(service, stage),
                    service_category: service,
                    stage,
                    ratio: DEFAULT_RATIO,
                    description: format!("Default ratio for {} at {}", service, stage.label()),
                })
            })
            .collect();
    }

    /// Keep the first ratio seen per (service, stage); return the rest.
    pub fn dedupe(&mut self) -> Vec<FeeToRevenueRatio> {
        let mut seen: HashSet<(ServiceCategory, ProductStage)> = HashSet::new();
        let mut kept = Vec::with_capacity(self.ratios.len());
        let mut removed = Vec::new();
        for r in self.ratios.drain(..) {
            if seen.insert(r.key()) {
                kept.push(r);
            } else {
                removed.push(r);
            }
        }
        self.ratios = kept;
        if !removed.is_empty() {
            tracing::warn!(removed = removed.len(), "duplicate fee ratios discarded");
        }
        removed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    High,
    Low,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::High => f.write_str("HIGH"),
            Confidence::Low => f.write_str("LOW"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceFeeAnalysis {
    pub brand_id: String,
    pub brand_name: String,
    pub therapeutic_area: String,
    pub service: ServiceCategory,
    pub stage: ProductStage,
    pub current_revenue: f64,
    pub ratio: f64,
    pub estimated_fee: f64,
    pub confidence: Confidence,
}

pub fn analyze_service(
    row: &ClassifiedRow,
    service: ServiceCategory,
    revenue: f64,
    book: &RatioBook,
) -> Result<ServiceFeeAnalysis, InvalidInputError> {
    let stage = ProductStage::from_stage(&row.stage);
    let ratio = book.ratio_for(service, stage);
    Ok(ServiceFeeAnalysis {
        brand_id: row.brand_id.clone(),
        brand_name: row.brand_name.clone(),
        therapeutic_area: row.therapeutic_area.clone(),
        service,
        stage,
        current_revenue: revenue,
        ratio,
        estimated_fee: estimated_fee(revenue, ratio)?,
        confidence: if revenue > 0.0 {
            Confidence::High
        } else {
            Confidence::Low
        },
    })
}

/// The year fees are computed for: `as_of_year` if observed, else the next
/// observed year after it, else the last observed year.
pub fn present_year(years: &[Year], as_of_year: Year) -> Year {
    if years.contains(&as_of_year) {
        return as_of_year;
    }
    years
        .iter()
        .copied()
        .filter(|y| *y > as_of_year)
        .min()
        .or_else(|| years.iter().copied().max())
        .unwrap_or(as_of_year)
}

/// One analysis per service category for every row with revenue in `year`.
pub fn analyze_rows(
    rows: &[ClassifiedRow],
    book: &RatioBook,
    year: Year,
    revenue_type: RevenueType,
) -> Result<Vec<ServiceFeeAnalysis>, InvalidInputError> {
    let mut out = Vec::new();
    for row in rows {
        let revenue = row.value(revenue_type, year);
        if revenue <= 0.0 {
            continue;
        }
        for service in ServiceCategory::ALL {
            out.push(analyze_service(row, service, revenue, book)?);
        }
    }
    tracing::debug!(rows = rows.len(), analyses = out.len(), year, "fee analyses computed");
    Ok(out)
}

/// `Σ fees / Σ revenue`; 0 when there is no revenue.
pub fn weighted_ratio(analyses: &[ServiceFeeAnalysis]) -> f64 {
    let fees: f64 = analyses.iter().map(|a| a.estimated_fee).sum();
    let revenue: f64 = analyses.iter().map(|a| a.current_revenue).sum();
    ratio_or_zero(fees, revenue)
}

/// Plain mean of the individual ratios, for comparison only.
pub fn mean_ratio(analyses: &[ServiceFeeAnalysis]) -> f64 {
    average(&analyses.iter().map(|a| a.ratio).collect::<Vec<_>>())
}

pub fn summarize_by_service(analyses: &[ServiceFeeAnalysis]) -> Vec<ServiceFeeSummaryRow> {
    let present: BTreeSet<ServiceCategory> = analyses.iter().map(|a| a.service).collect();
    present
        .into_iter()
        .map(|service| {
            let subset: Vec<ServiceFeeAnalysis> = analyses
                .iter()
                .filter(|a| a.service == service)
                .cloned()
                .collect();
            ServiceFeeSummaryRow {
                service,
                count: subset.len(),
                total_revenue: subset.iter().map(|a| a.current_revenue).sum(),
                total_fees: subset.iter().map(|a| a.estimated_fee).sum(),
                weighted_ratio: weighted_ratio(&subset),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeeSummaryStats {
    pub total_analyses: usize,
    pub total_estimated_fees: f64,
    pub total_revenue: f64,
    /// Weighted ratio as a percentage.
    pub avg_ratio_pct: f64,
    pub high_confidence: usize,
    pub confidence_rate: f64,
}

pub fn summary_stats(analyses: &[ServiceFeeAnalysis]) -> FeeSummaryStats {
    let high_confidence = analyses
        .iter()
        .filter(|a| a.confidence == Confidence::High)
        .count();
    FeeSummaryStats {
        total_analyses: analyses.len(),
        total_estimated_fees: analyses.iter().map(|a| a.estimated_fee).sum(),
        total_revenue: analyses.iter().map(|a| a.current_revenue).sum(),
        avg_ratio_pct: weighted_ratio(analyses) * 100.0,
        high_confidence,
        confidence_rate: percent_of(high_confidence as f64, analyses.len() as f64),
    }
}

fn show_fee(v: &f64) -> String {
    format_number(*v, 0)
}

fn show_share(v: &f64) -> String {
    format!("{:.1}%", v)
}

/// Potential fees for one service within one therapeutic area.
#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct FeeCell {
    #[serde(rename = "Service")]
    #[tabled(rename = "Service")]
    pub service: ServiceCategory,
    #[serde(rename = "TherapeuticArea")]
    #[tabled(rename = "TherapeuticArea")]
    pub therapeutic_area: String,
    #[serde(rename = "Fees")]
    #[tabled(rename = "Fees", display_with = "show_fee")]
    pub fees: f64,
    /// Share of this service's fees across all therapeutic areas.
    #[serde(rename = "SharePct")]
    #[tabled(rename = "Share", display_with = "show_share")]
    pub share_pct: f64,
}

pub fn fee_matrix(analyses: &[ServiceFeeAnalysis]) -> Vec<FeeCell> {
    let tas: BTreeSet<&str> = analyses.iter().map(|a| a.therapeutic_area.as_str()).collect();
    let mut out = Vec::new();
    for service in ServiceCategory::ALL {
        let service_total: f64 = analyses
            .iter()
            .filter(|a| a.service == service)
            .map(|a| a.estimated_fee)
            .sum();
        for ta in &tas {
            let fees: f64 = analyses
                .iter()
                .filter(|a| a.service == service && a.therapeutic_area == *ta)
                .map(|a| a.estimated_fee)
                .sum();
            out.push(FeeCell {
                service,
                therapeutic_area: ta.to_string(),
                fees,
                share_pct: percent_of(fees, service_total),
            });
        }
    }
    out
}

// Insight detectors over a filtered row set.
//
// Each detector is independent and returns `None` when it has nothing to say.
// `derive_insights` runs them in declaration order, which is also the order
// the resulting list is presented in. Detail tables are computed on demand
// through `Insight::details`.
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

use crate::types::{
    AgencyRow, BrandShareRow, ClassifiedRow, GrowthRow, LaunchYearRow, PhaseRow, PipelineRow,
    RevenueType, TaLaunchRow, TaShareRow, UnknownTaRow, Year, KLICK,
};
use crate::util::{format_revenue, percent_of, ratio_or_zero, round1};

pub const PRE_LAUNCH_1Y: &str = "Pre-Launch (1Y)";
pub const PRE_LAUNCH_2Y: &str = "Pre-Launch (2Y)";
pub const CLINICAL_PHASES: [&str; 3] = ["Phase 1", "Phase 2", "Phase 3"];

const GROWTH_FACTOR: f64 = 1.2;
const DECLINE_FACTOR: f64 = 0.8;
const CONCENTRATION_DETAIL_ROWS: usize = 10;

/// Inputs that are not part of the row set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsightContext {
    /// Anchor year for launch timing.
    pub as_of_year: Year,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    RevenueConcentration,
    TherapeuticArea,
    UnknownTa,
    Growth,
    Decline,
    Pipeline,
    ClinicalPhases,
    LaunchPipeline,
    TaLaunches,
    Agency,
}

impl InsightKind {
    /// Declaration order; the insight list always follows it.
    pub const ALL: [InsightKind; 10] = [
        InsightKind::RevenueConcentration,
        InsightKind::TherapeuticArea,
        InsightKind::UnknownTa,
        InsightKind::Growth,
        InsightKind::Decline,
        InsightKind::Pipeline,
        InsightKind::ClinicalPhases,
        InsightKind::LaunchPipeline,
        InsightKind::TaLaunches,
        InsightKind::Agency,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            InsightKind::RevenueConcentration => "Revenue Concentration",
            InsightKind::TherapeuticArea => "Leading Therapeutic Area",
            InsightKind::UnknownTa => "Unknown Therapeutic Areas",
            InsightKind::Growth => "Growth Leaders",
            InsightKind::Decline => "Declining Brands",
            InsightKind::Pipeline => "Launch Pipeline",
            InsightKind::ClinicalPhases => "Clinical Pipeline",
            InsightKind::LaunchPipeline => "Anticipated Launches",
            InsightKind::TaLaunches => "Leading Launch TA",
            InsightKind::Agency => "Competitive Intelligence",
        }
    }

    pub fn detect(&self, rows: &[ClassifiedRow], ctx: &InsightContext) -> Option<Insight> {
        match self {
            InsightKind::RevenueConcentration => revenue_concentration(rows),
            InsightKind::TherapeuticArea => leading_therapeutic_area(rows),
            InsightKind::UnknownTa => unknown_therapeutic_areas(rows),
            InsightKind::Growth => growth_leaders(rows),
            InsightKind::Decline => decliners(rows),
            InsightKind::Pipeline => launch_pipeline_total(rows),
            InsightKind::ClinicalPhases => clinical_phases(rows),
            InsightKind::LaunchPipeline => launches_by_year(rows, ctx),
            InsightKind::TaLaunches => ta_launches(rows),
            InsightKind::Agency => competitive_agency(rows),
        }
    }
}

impl fmt::Display for InsightKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub title: String,
    pub description: String,
    /// What the insight is about: a brand, therapeutic area, agency or year.
    pub subject: String,
    /// The headline number (share %, brand count, revenue, ...).
    pub metric: f64,
}

impl Insight {
    fn new(kind: InsightKind, subject: impl Into<String>, metric: f64, description: String) -> Self {
        Insight {
            kind,
            title: kind.title().to_string(),
            description,
            subject: subject.into(),
            metric,
        }
    }

    /// Breakdown table for this insight, computed from the same rows.
    pub fn details(&self, rows: &[ClassifiedRow], ctx: &InsightContext) -> InsightDetails {
        details(self.kind, rows, ctx)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "rows", rename_all = "snake_case")]
pub enum InsightDetails {
    BrandShares(Vec<BrandShareRow>),
    TaShares(Vec<TaShareRow>),
    UnknownTa(Vec<UnknownTaRow>),
    Growth(Vec<GrowthRow>),
    Pipeline(Vec<PipelineRow>),
    Phases(Vec<PhaseRow>),
    LaunchYears(Vec<LaunchYearRow>),
    TaLaunches(Vec<TaLaunchRow>),
    Agencies(Vec<AgencyRow>),
}

impl InsightDetails {
    pub fn len(&self) -> usize {
        match self {
            InsightDetails::BrandShares(v) => v.len(),
            InsightDetails::TaShares(v) => v.len(),
            InsightDetails::UnknownTa(v) => v.len(),
            InsightDetails::Growth(v) => v.len(),
            InsightDetails::Pipeline(v) => v.len(),
            InsightDetails::Phases(v) => v.len(),
            InsightDetails::LaunchYears(v) => v.len(),
            InsightDetails::TaLaunches(v) => v.len(),
            InsightDetails::Agencies(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Run every detector in declaration order.
pub fn derive_insights(rows: &[ClassifiedRow], ctx: &InsightContext) -> Vec<Insight> {
    let insights: Vec<Insight> = InsightKind::ALL
        .iter()
        .filter_map(|kind| kind.detect(rows, ctx))
        .collect();
    tracing::debug!(rows = rows.len(), insights = insights.len(), "insights derived");
    insights
}

fn latest(row: &ClassifiedRow) -> f64 {
    row.latest_revenue(RevenueType::Ww)
}

fn sort_desc_by<T>(v: &mut [T], key: impl Fn(&T) -> f64) {
    v.sort_by(|a, b| key(b).partial_cmp(&key(a)).unwrap_or(Ordering::Equal));
}

fn total_latest(rows: &[ClassifiedRow]) -> f64 {
    rows.iter().map(latest).sum()
}

pub fn revenue_concentration(rows: &[ClassifiedRow]) -> Option<Insight> {
    let total = total_latest(rows);
    let mut ranked: Vec<&ClassifiedRow> = rows.iter().collect();
    sort_desc_by(&mut ranked, |r| latest(r));
    let top = ranked.first()?;
    let top_revenue = latest(top);
    let share = round1(percent_of(top_revenue, total));
    Some(Insight::new(
        InsightKind::RevenueConcentration,
        top.brand_name.clone(),
        share,
        format!(
            "{} dominates with {:.1}% of total revenue ({})",
            top.brand_name,
            share,
            format_revenue(top_revenue)
        ),
    ))
}

// Known therapeutic areas with their latest-year revenue, in first-seen order.
fn ta_revenue(rows: &[ClassifiedRow]) -> Vec<(String, f64)> {
    let mut acc: Vec<(String, f64)> = Vec::new();
    for row in rows.iter().filter(|r| r.has_known_ta()) {
        let revenue = latest(row);
        match acc.iter_mut().find(|(ta, _)| *ta == row.therapeutic_area) {
            Some((_, sum)) => *sum += revenue,
            None => acc.push((row.therapeutic_area.clone(), revenue)),
        }
    }
    acc
}

pub fn leading_therapeutic_area(rows: &[ClassifiedRow]) -> Option<Insight> {
    let mut by_ta = ta_revenue(rows);
    sort_desc_by(&mut by_ta, |(_, v)| *v);
    let (ta, revenue) = by_ta.into_iter().next()?;
    let share = round1(percent_of(revenue, total_latest(rows)));
    Some(Insight::new(
        InsightKind::TherapeuticArea,
        ta.clone(),
        share,
        format!("{} represents {:.1}% of portfolio revenue", ta, share),
    ))
}

pub fn unknown_therapeutic_areas(rows: &[ClassifiedRow]) -> Option<Insight> {
    let count = rows.iter().filter(|r| !r.has_known_ta()).count();
    if count == 0 {
        return None;
    }
    Some(Insight::new(
        InsightKind::UnknownTa,
        "Unknown",
        count as f64,
        format!("{} brands have unknown therapeutic area classification", count),
    ))
}

/// First and last observed WW revenue of a row with at least two years.
fn endpoints(row: &ClassifiedRow) -> Option<(f64, f64)> {
    if row.years.len() < 2 {
        return None;
    }
    let first = row.value(RevenueType::Ww, row.first_year()?);
    let last = row.value(RevenueType::Ww, row.latest_year()?);
    Some((first, last))
}

pub fn is_grower(row: &ClassifiedRow) -> bool {
    endpoints(row).is_some_and(|(first, last)| last > first * GROWTH_FACTOR)
}

pub fn is_decliner(row: &ClassifiedRow) -> bool {
    endpoints(row).is_some_and(|(first, last)| last < first * DECLINE_FACTOR)
}

/// `(last - first) / first * 100`, or 0 when `first` is 0.
pub fn growth_rate(first: f64, last: f64) -> f64 {
    if first > 0.0 {
        ratio_or_zero(last - first, first) * 100.0
    } else {
        0.0
    }
}

pub fn growth_leaders(rows: &[ClassifiedRow]) -> Option<Insight> {
    let count = rows.iter().filter(|r| is_grower(r)).count();
    if count == 0 {
        return None;
    }
    Some(Insight::new(
        InsightKind::Growth,
        "growth",
        count as f64,
        format!("{} brands showing strong growth (>20% since first year)", count),
    ))
}

pub fn decliners(rows: &[ClassifiedRow]) -> Option<Insight> {
    let count = rows.iter().filter(|r| is_decliner(r)).count();
    if count == 0 {
        return None;
    }
    Some(Insight::new(
        InsightKind::Decline,
        "decline",
        count as f64,
        format!("{} brands experiencing revenue decline (>20% drop)", count),
    ))
}

pub fn is_pre_launch(stage: &str) -> bool {
    stage == PRE_LAUNCH_1Y || stage == PRE_LAUNCH_2Y
}

/// Expected launch year for a pre-launch stage.
pub fn launch_year(stage: &str, as_of_year: Year) -> Option<Year> {
    match stage {
        PRE_LAUNCH_1Y => as_of_year.checked_add(1),
        PRE_LAUNCH_2Y => as_of_year.checked_add(2),
        _ => None,
    }
}

pub fn launch_pipeline_total(rows: &[ClassifiedRow]) -> Option<Insight> {
    let pre: Vec<&ClassifiedRow> = rows.iter().filter(|r| is_pre_launch(&r.stage)).collect();
    if pre.is_empty() {
        return None;
    }
    let value: f64 = pre.iter().map(|r| latest(r)).sum();
    Some(Insight::new(
        InsightKind::Pipeline,
        "pre-launch",
        value,
        format!(
            "{} brands approaching launch with {} potential",
            pre.len(),
            format_revenue(value)
        ),
    ))
}

/// Phases whose label occurs in `stage`. More than one may match.
pub fn phases_in(stage: &str) -> impl Iterator<Item = &'static str> + '_ {
    CLINICAL_PHASES.into_iter().filter(move |p| stage.contains(p))
}

pub fn phase_counts(rows: &[ClassifiedRow]) -> [usize; 3] {
    let mut counts = [0usize; 3];
    for (i, phase) in CLINICAL_PHASES.iter().enumerate() {
        counts[i] = rows.iter().filter(|r| r.stage.contains(phase)).count();
    }
    counts
}

pub fn clinical_phases(rows: &[ClassifiedRow]) -> Option<Insight> {
    let counts = phase_counts(rows);
    let total: usize = counts.iter().sum();
    if total == 0 {
        return None;
    }
    Some(Insight::new(
        InsightKind::ClinicalPhases,
        "clinical",
        total as f64,
        format!(
            "Phase 1: {} | Phase 2: {} | Phase 3: {}",
            counts[0], counts[1], counts[2]
        ),
    ))
}

fn launch_years(rows: &[ClassifiedRow], ctx: &InsightContext) -> Vec<LaunchYearRow> {
    let mut acc: Vec<LaunchYearRow> = Vec::new();
    for row in rows {
        let Some(year) = launch_year(&row.stage, ctx.as_of_year) else {
            continue;
        };
        let entry = match acc.iter().position(|e| e.year == year) {
            Some(i) => &mut acc[i],
            None => {
                acc.push(LaunchYearRow {
                    year,
                    brand_count: 0,
                    revenue: 0.0,
                    brands: Vec::new(),
                });
                let last = acc.len() - 1;
                &mut acc[last]
            }
        };
        entry.brand_count += 1;
        entry.revenue += latest(row);
        entry.brands.push(row.brand_name.clone());
    }
    acc.sort_by_key(|e| e.year);
    acc
}

pub fn launches_by_year(rows: &[ClassifiedRow], ctx: &InsightContext) -> Option<Insight> {
    let next = launch_years(rows, ctx).into_iter().next()?;
    Some(Insight::new(
        InsightKind::LaunchPipeline,
        next.year.to_string(),
        next.brand_count as f64,
        format!(
            "{} launches in {} worth {}",
            next.brand_count,
            next.year,
            format_revenue(next.revenue)
        ),
    ))
}

fn ta_launch_rows(rows: &[ClassifiedRow]) -> Vec<TaLaunchRow> {
    let mut acc: Vec<TaLaunchRow> = Vec::new();
    for row in rows
        .iter()
        .filter(|r| is_pre_launch(&r.stage) && r.has_known_ta())
    {
        let idx = match acc
            .iter()
            .position(|e| e.therapeutic_area == row.therapeutic_area)
        {
            Some(i) => i,
            None => {
                acc.push(TaLaunchRow {
                    therapeutic_area: row.therapeutic_area.clone(),
                    brand_count: 0,
                    revenue: 0.0,
                    brands: Vec::new(),
                });
                acc.len() - 1
            }
        };
        acc[idx].brand_count += 1;
        acc[idx].revenue += latest(row);
        acc[idx].brands.push(row.brand_name.clone());
    }
    // stable: ties keep first-seen order
    acc.sort_by(|a, b| b.brand_count.cmp(&a.brand_count));
    acc
}

pub fn ta_launches(rows: &[ClassifiedRow]) -> Option<Insight> {
    let top = ta_launch_rows(rows).into_iter().next()?;
    Some(Insight::new(
        InsightKind::TaLaunches,
        top.therapeutic_area.clone(),
        top.brand_count as f64,
        format!(
            "{} has {} upcoming launches",
            top.therapeutic_area, top.brand_count
        ),
    ))
}

/// Agency tally ranked by revenue. Each assigned service counts once, so an
/// agency holding two services on one brand counts that brand twice.
pub fn agency_tally(rows: &[ClassifiedRow]) -> Vec<AgencyRow> {
    let mut acc: Vec<AgencyRow> = Vec::new();
    for row in rows {
        let revenue = latest(row);
        for agency in row.agencies() {
            let idx = match acc.iter().position(|a| a.agency == agency) {
                Some(i) => i,
                None => {
                    acc.push(AgencyRow {
                        agency: agency.to_string(),
                        brand_count: 0,
                        revenue: 0.0,
                        brands: Vec::new(),
                    });
                    acc.len() - 1
                }
            };
            let entry = &mut acc[idx];
            entry.brand_count += 1;
            entry.revenue += revenue;
            if !entry.brands.contains(&row.brand_name) {
                entry.brands.push(row.brand_name.clone());
            }
        }
    }
    sort_desc_by(&mut acc, |a| a.revenue);
    acc
}

pub fn competitive_agency(rows: &[ClassifiedRow]) -> Option<Insight> {
    let top = agency_tally(rows).into_iter().find(|a| a.agency != KLICK)?;
    Some(Insight::new(
        InsightKind::Agency,
        top.agency.clone(),
        top.revenue,
        format!(
            "{} manages {} brands worth {}",
            top.agency,
            top.brand_count,
            format_revenue(top.revenue)
        ),
    ))
}

fn growth_rows(rows: &[ClassifiedRow], declining: bool) -> Vec<GrowthRow> {
    let mut out: Vec<GrowthRow> = rows
        .iter()
        .filter(|r| if declining { is_decliner(r) } else { is_grower(r) })
        .filter_map(|r| {
            let (first, last) = endpoints(r)?;
            let rate = if declining {
                -growth_rate(first, last)
            } else {
                growth_rate(first, last)
            };
            Some(GrowthRow {
                brand: r.brand_name.clone(),
                company: r.company_name.clone(),
                first_revenue: first,
                last_revenue: last,
                rate,
            })
        })
        .collect();
    sort_desc_by(&mut out, |g| g.rate);
    out
}

pub fn details(kind: InsightKind, rows: &[ClassifiedRow], ctx: &InsightContext) -> InsightDetails {
    let total = total_latest(rows);
    match kind {
        InsightKind::RevenueConcentration => {
            let mut out: Vec<BrandShareRow> = rows
                .iter()
                .map(|r| BrandShareRow {
                    brand: r.brand_name.clone(),
                    company: r.company_name.clone(),
                    revenue: latest(r),
                    percentage: percent_of(latest(r), total),
                })
                .collect();
            sort_desc_by(&mut out, |r| r.revenue);
            out.truncate(CONCENTRATION_DETAIL_ROWS);
            InsightDetails::BrandShares(out)
        }
        InsightKind::TherapeuticArea => {
            let mut out: Vec<TaShareRow> = ta_revenue(rows)
                .into_iter()
                .map(|(ta, revenue)| TaShareRow {
                    therapeutic_area: ta,
                    revenue,
                    percentage: percent_of(revenue, total),
                })
                .collect();
            sort_desc_by(&mut out, |r| r.revenue);
            InsightDetails::TaShares(out)
        }
        InsightKind::UnknownTa => {
            let mut out: Vec<UnknownTaRow> = rows
                .iter()
                .filter(|r| !r.has_known_ta())
                .map(|r| UnknownTaRow {
                    brand: r.brand_name.clone(),
                    company: r.company_name.clone(),
                    therapeutic_area: r.therapeutic_area.clone(),
                    revenue: latest(r),
                })
                .collect();
            sort_desc_by(&mut out, |r| r.revenue);
            InsightDetails::UnknownTa(out)
        }
        InsightKind::Growth => InsightDetails::Growth(growth_rows(rows, false)),
        InsightKind::Decline => InsightDetails::Growth(growth_rows(rows, true)),
        InsightKind::Pipeline => {
            let mut out: Vec<PipelineRow> = rows
                .iter()
                .filter(|r| is_pre_launch(&r.stage))
                .map(|r| PipelineRow {
                    brand: r.brand_name.clone(),
                    company: r.company_name.clone(),
                    stage: r.stage.clone(),
                    potential_revenue: latest(r),
                })
                .collect();
            sort_desc_by(&mut out, |r| r.potential_revenue);
            InsightDetails::Pipeline(out)
        }
        InsightKind::ClinicalPhases => {
            let mut out: Vec<PhaseRow> = CLINICAL_PHASES
                .into_iter()
                .flat_map(|phase| {
                    rows.iter().filter(move |r| r.stage.contains(phase)).map(move |r| PhaseRow {
                        brand: r.brand_name.clone(),
                        company: r.company_name.clone(),
                        phase: phase.to_string(),
                        stage: r.stage.clone(),
                        revenue: latest(r),
                    })
                })
                .collect();
            sort_desc_by(&mut out, |r| r.revenue);
            InsightDetails::Phases(out)
        }
        InsightKind::LaunchPipeline => InsightDetails::LaunchYears(launch_years(rows, ctx)),
        InsightKind::TaLaunches => InsightDetails::TaLaunches(ta_launch_rows(rows)),
        InsightKind::Agency => InsightDetails::Agencies(agency_tally(rows)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiering::{CompanyTier, RevenueTier};
    use crate::types::{ServiceCategory, ServiceMap};
    use std::collections::BTreeMap;

    const CTX: InsightContext = InsightContext { as_of_year: 2025 };

    fn row(brand: &str, ta: &str, stage: &str, points: &[(Year, f64)]) -> ClassifiedRow {
        let series: BTreeMap<Year, f64> = points.iter().copied().collect();
        ClassifiedRow {
            company_slug: "acme".to_string(),
            company_name: "Acme".to_string(),
            company_tier: CompanyTier::ExTier1,
            brand_id: brand.to_lowercase(),
            brand_name: brand.to_string(),
            stage: stage.to_string(),
            therapeutic_area: ta.to_string(),
            years: series.keys().copied().collect(),
            series,
            series_us: BTreeMap::new(),
            growing: None,
            revenue_tier: RevenueTier::UpTo100M,
            services: ServiceMap::new(),
        }
    }

    fn with_agencies(mut r: ClassifiedRow, agencies: &[(ServiceCategory, &str)]) -> ClassifiedRow {
        for (s, a) in agencies {
            r.services.insert(*s, Some(a.to_string()));
        }
        r
    }

    #[test]
    fn concentration_reports_top_share() {
        let rows = vec![
            row("A", "Oncology", "", &[(2024, 300.0)]),
            row("B", "Oncology", "", &[(2024, 100.0)]),
        ];
        let i = revenue_concentration(&rows).unwrap();
        assert_eq!(i.subject, "A");
        assert_eq!(i.metric, 75.0);
        assert!(i.description.starts_with("A dominates with 75.0%"));
        assert!(revenue_concentration(&[]).is_none());
    }

    #[test]
    fn unknown_ta_is_excluded_from_ranking_but_counted() {
        let rows = vec![
            row("A", "Unknown", "", &[(2024, 900.0)]),
            row("B", "unknown", "", &[(2024, 10.0)]),
            row("C", "Oncology", "", &[(2024, 100.0)]),
        ];
        let lead = leading_therapeutic_area(&rows).unwrap();
        assert_eq!(lead.subject, "Oncology");
        assert_eq!(lead.metric, 9.9);
        let unknown = unknown_therapeutic_areas(&rows).unwrap();
        assert_eq!(unknown.metric, 2.0);

        let only_unknown = vec![row("A", "Unknown", "", &[(2024, 1.0)])];
        assert!(leading_therapeutic_area(&only_unknown).is_none());
    }

    #[test]
    fn growth_uses_each_rows_own_endpoints() {
        let rows = vec![
            row("Up", "X", "", &[(2020, 100.0), (2024, 125.0)]),
            row("Flat", "X", "", &[(2023, 100.0), (2024, 110.0)]),
            row("Down", "X", "", &[(2022, 100.0), (2023, 50.0)]),
            row("Single", "X", "", &[(2024, 100.0)]),
            row("FromZero", "X", "", &[(2023, 0.0), (2024, 10.0)]),
        ];
        assert_eq!(growth_leaders(&rows).unwrap().metric, 2.0);
        assert_eq!(decliners(&rows).unwrap().metric, 1.0);

        let InsightDetails::Growth(g) = details(InsightKind::Growth, &rows, &CTX) else {
            panic!("growth details expected");
        };
        assert_eq!(g[0].brand, "Up");
        assert_eq!(g[0].rate, 25.0);
        assert_eq!(g[1].brand, "FromZero");
        assert_eq!(g[1].rate, 0.0);

        let InsightDetails::Growth(d) = details(InsightKind::Decline, &rows, &CTX) else {
            panic!("decline details expected");
        };
        assert_eq!(d[0].rate, 50.0);
    }

    #[test]
    fn launches_anchor_on_injected_year() {
        let rows = vec![
            row("A", "Oncology", PRE_LAUNCH_2Y, &[(2024, 50.0)]),
            row("B", "Oncology", PRE_LAUNCH_1Y, &[(2024, 20.0)]),
            row("C", "Unknown", PRE_LAUNCH_1Y, &[(2024, 30.0)]),
            row("D", "Neurology", "Launch", &[(2024, 30.0)]),
        ];
        let i = launches_by_year(&rows, &CTX).unwrap();
        assert_eq!(i.subject, "2026");
        assert_eq!(i.metric, 2.0);

        let InsightDetails::LaunchYears(years) = details(InsightKind::LaunchPipeline, &rows, &CTX)
        else {
            panic!("launch details expected");
        };
        assert_eq!(years.iter().map(|y| y.year).collect::<Vec<_>>(), vec![2026, 2027]);
        assert_eq!(years[0].revenue, 50.0);

        let total = launch_pipeline_total(&rows).unwrap();
        assert_eq!(total.metric, 100.0);
        let ta = ta_launches(&rows).unwrap();
        assert_eq!(ta.subject, "Oncology");
        assert_eq!(ta.metric, 2.0);
    }

    #[test]
    fn launch_year_is_none_past_the_last_year() {
        assert_eq!(launch_year(PRE_LAUNCH_1Y, 2025), Some(2026));
        assert_eq!(launch_year(PRE_LAUNCH_2Y, Year::MAX - 1), None);
        assert_eq!(launch_year(PRE_LAUNCH_1Y, Year::MAX - 1), Some(Year::MAX));
        let rows = vec![row("A", "Oncology", PRE_LAUNCH_1Y, &[(2024, 5.0)])];
        let ctx = InsightContext { as_of_year: Year::MAX };
        assert!(launches_by_year(&rows, &ctx).is_none());
    }

    #[test]
    fn phases_are_not_exclusive() {
        let rows = vec![
            row("A", "X", "Phase 1/Phase 2", &[(2024, 1.0)]),
            row("B", "X", "Phase 3", &[(2024, 2.0)]),
            row("C", "X", "Post-Launch", &[(2024, 3.0)]),
        ];
        assert_eq!(phase_counts(&rows), [1, 1, 1]);
        let i = clinical_phases(&rows).unwrap();
        assert_eq!(i.description, "Phase 1: 1 | Phase 2: 1 | Phase 3: 1");
        assert_eq!(details(InsightKind::ClinicalPhases, &rows, &CTX).len(), 3);
        assert_eq!(phases_in("Phase 1/Phase 2").count(), 2);
    }

    #[test]
    fn agency_insight_skips_klick() {
        let rows = vec![
            with_agencies(
                row("A", "X", "", &[(2024, 1000.0)]),
                &[(ServiceCategory::Aor, "Klick")],
            ),
            with_agencies(
                row("B", "X", "", &[(2024, 200.0)]),
                &[(ServiceCategory::Aor, "Havas"), (ServiceCategory::Media, "")],
            ),
            with_agencies(
                row("C", "X", "", &[(2024, 100.0)]),
                &[(ServiceCategory::Media, "McCann")],
            ),
        ];
        let i = competitive_agency(&rows).unwrap();
        assert_eq!(i.subject, "Havas");
        assert_eq!(i.metric, 200.0);
        let tally = agency_tally(&rows);
        assert_eq!(tally[0].agency, "Klick");
        assert_eq!(tally.len(), 3);

        let only_klick = vec![rows[0].clone()];
        assert!(competitive_agency(&only_klick).is_none());
    }

    #[test]
    fn list_follows_declaration_order() {
        let rows = vec![
            with_agencies(
                row("A", "Oncology", PRE_LAUNCH_1Y, &[(2023, 10.0), (2024, 30.0)]),
                &[(ServiceCategory::Aor, "Havas")],
            ),
            row("B", "Unknown", "Phase 2", &[(2023, 10.0), (2024, 1.0)]),
        ];
        let kinds: Vec<InsightKind> = derive_insights(&rows, &CTX).iter().map(|i| i.kind).collect();
        let mut expected = kinds.clone();
        expected.sort_by_key(|k| InsightKind::ALL.iter().position(|x| x == k));
        assert_eq!(kinds, expected);
        assert_eq!(kinds.len(), InsightKind::ALL.len());
    }

    #[test]
    fn empty_rows_produce_no_insights() {
        assert!(derive_insights(&[], &CTX).is_empty());
        for kind in InsightKind::ALL {
            assert!(kind.detect(&[], &CTX).is_none());
        }
    }
}

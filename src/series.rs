// Series builder: folds raw revenue observations into one classified row per
// brand with year-indexed WW and US sums.
use std::collections::{BTreeMap, BTreeSet};

use crate::tiering::{revenue_tier, TierReference};
use crate::types::{Brand, ClassifiedRow, Company, RevenueObservation, Year, UNKNOWN_TA};

/// A brand with no revenue observations yields no row at all.
pub const EXCLUDE_IF_NO_DATA: bool = true;

/// Growth between the latest observed year and the calendar year before it.
///
/// The comparison year is `latest - 1` literally; a gap in the data gives `None`
/// even when an older observation exists. Equal values count as not growing.
pub fn growth_direction(series: &BTreeMap<Year, f64>) -> Option<bool> {
    let (&latest, &latest_value) = series.iter().next_back()?;
    let previous = series.get(&latest.checked_sub(1)?)?;
    Some(latest_value > *previous)
}

/// Build one classified row for `brand` from the company's observations.
/// Returns `None` when the brand has no observations.
pub fn classify_brand(
    company: &Company,
    brand: &Brand,
    reference: &TierReference,
) -> Option<ClassifiedRow> {
    let observations: Vec<&RevenueObservation> = company
        .revenue_rows
        .iter()
        .filter(|r| r.brand_id == brand.id)
        .collect();
    if EXCLUDE_IF_NO_DATA && observations.is_empty() {
        return None;
    }

    let mut series: BTreeMap<Year, f64> = BTreeMap::new();
    let mut series_us: BTreeMap<Year, f64> = BTreeMap::new();
    let mut years: BTreeSet<Year> = BTreeSet::new();
    for obs in observations {
        years.insert(obs.year);
        *series.entry(obs.year).or_insert(0.0) += sanitize(obs.ww_sales);
        *series_us.entry(obs.year).or_insert(0.0) += sanitize(obs.us_sales);
    }

    let latest_revenue = series.values().next_back().copied().unwrap_or(0.0);
    let growing = growth_direction(&series);
    let therapeutic_area = brand
        .therapeutic_area
        .as_deref()
        .map(str::trim)
        .filter(|ta| !ta.is_empty())
        .unwrap_or(UNKNOWN_TA)
        .to_string();

    Some(ClassifiedRow {
        company_slug: company.slug.clone(),
        company_name: company.name.clone(),
        company_tier: reference.classify(&company.name),
        brand_id: brand.id.clone(),
        brand_name: brand.name.clone(),
        stage: brand
            .lifecycle_stage
            .as_deref()
            .map(str::trim)
            .unwrap_or("")
            .to_string(),
        therapeutic_area,
        series,
        series_us,
        years: years.into_iter().collect(),
        growing,
        revenue_tier: revenue_tier(latest_revenue),
        services: brand.services.clone(),
    })
}

/// Classified rows for every brand of every company, in input order.
pub fn build_rows(companies: &[Company], reference: &TierReference) -> Vec<ClassifiedRow> {
    let mut rows = Vec::new();
    let mut dropped = 0usize;
    for company in companies {
        for brand in &company.brands {
            match classify_brand(company, brand, reference) {
                Some(row) => rows.push(row),
                None => dropped += 1,
            }
        }
    }
    if dropped > 0 {
        tracing::debug!(dropped, "brands without revenue observations excluded");
    }
    tracing::debug!(rows = rows.len(), companies = companies.len(), "classified rows built");
    rows
}

/// Sorted distinct years across `rows`.
pub fn all_years(rows: &[ClassifiedRow]) -> Vec<Year> {
    rows.iter()
        .flat_map(|r| r.years.iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Distinct values offered by filter pickers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOptions {
    pub stages: Vec<String>,
    pub therapeutic_areas: Vec<String>,
    pub revenue_tiers: Vec<crate::tiering::RevenueTier>,
    pub years: Vec<Year>,
}

pub fn filter_options(rows: &[ClassifiedRow]) -> FilterOptions {
    let stages: BTreeSet<&str> = rows.iter().map(|r| r.stage.as_str()).collect();
    let tas: BTreeSet<&str> = rows.iter().map(|r| r.therapeutic_area.as_str()).collect();
    let tiers: BTreeSet<_> = rows.iter().map(|r| r.revenue_tier).collect();
    FilterOptions {
        stages: stages.into_iter().map(String::from).collect(),
        therapeutic_areas: tas.into_iter().map(String::from).collect(),
        revenue_tiers: tiers.into_iter().collect(),
        years: all_years(rows),
    }
}

// Negative or non-finite sales are treated as absent.
fn sanitize(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 {
        v
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiering::{CompanyTier, RevenueTier};

    fn obs(brand: &str, year: Year, ww: f64, us: f64) -> RevenueObservation {
        RevenueObservation {
            brand_id: brand.to_string(),
            year,
            ww_sales: ww,
            us_sales: us,
        }
    }

    fn brand(id: &str, ta: Option<&str>) -> Brand {
        Brand {
            id: id.to_string(),
            name: id.to_uppercase(),
            therapeutic_area: ta.map(String::from),
            lifecycle_stage: Some("Post-Launch".to_string()),
            ..Default::default()
        }
    }

    fn company(rows: Vec<RevenueObservation>, brands: Vec<Brand>) -> Company {
        Company {
            slug: "pfizer".to_string(),
            name: "Pfizer".to_string(),
            brands,
            revenue_rows: rows,
        }
    }

    #[test]
    fn duplicates_are_summed_not_overwritten() {
        let c = company(
            vec![
                obs("b1", 2023, 100.0, 10.0),
                obs("b1", 2023, 50.0, 5.0),
                obs("b1", 2024, 80.0, 0.0),
            ],
            vec![brand("b1", Some("Oncology"))],
        );
        let rows = build_rows(&[c], &TierReference::default());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].series[&2023], 150.0);
        assert_eq!(rows[0].series_us[&2023], 15.0);
        assert_eq!(rows[0].years, vec![2023, 2024]);
        assert_eq!(rows[0].growing, Some(false));
        assert_eq!(rows[0].company_tier, CompanyTier::Tier1);
    }

    #[test]
    fn brands_without_observations_are_dropped() {
        let c = company(
            vec![obs("b1", 2024, 1.0, 0.0)],
            vec![brand("b1", None), brand("b2", None)],
        );
        let rows = build_rows(&[c], &TierReference::default());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].brand_id, "b1");
        assert_eq!(rows[0].therapeutic_area, UNKNOWN_TA);
    }

    #[test]
    fn gap_year_gives_no_growth_direction() {
        let c = company(
            vec![obs("b1", 2021, 100.0, 0.0), obs("b1", 2023, 300.0, 0.0)],
            vec![brand("b1", Some("  "))],
        );
        let rows = build_rows(&[c], &TierReference::default());
        assert_eq!(rows[0].growing, None);
        assert_eq!(rows[0].therapeutic_area, UNKNOWN_TA);
    }

    #[test]
    fn flat_latest_year_counts_as_not_growing() {
        let c = company(
            vec![obs("b1", 2023, 100.0, 0.0), obs("b1", 2024, 100.0, 0.0)],
            vec![brand("b1", Some("Oncology"))],
        );
        let rows = build_rows(&[c], &TierReference::default());
        assert_eq!(rows[0].growing, Some(false));
    }

    #[test]
    fn extreme_years_do_not_overflow() {
        let series = BTreeMap::from([(Year::MIN, 1.0)]);
        assert_eq!(growth_direction(&series), None);
        let series = BTreeMap::from([(Year::MAX - 1, 1.0), (Year::MAX, 2.0)]);
        assert_eq!(growth_direction(&series), Some(true));
    }

    #[test]
    fn single_year_has_no_direction_and_tier_uses_latest() {
        let c = company(vec![obs("b1", 2024, 600_000_000.0, 0.0)], vec![brand("b1", None)]);
        let rows = build_rows(&[c], &TierReference::default());
        assert_eq!(rows[0].growing, None);
        assert_eq!(rows[0].revenue_tier, RevenueTier::From500MTo1B);
    }

    #[test]
    fn options_are_sorted_and_distinct() {
        let c = company(
            vec![obs("b1", 2024, 1.0, 0.0), obs("b2", 2022, 1.0, 0.0)],
            vec![brand("b1", Some("Oncology")), brand("b2", Some("Immunology"))],
        );
        let rows = build_rows(&[c], &TierReference::default());
        let opts = filter_options(&rows);
        assert_eq!(opts.therapeutic_areas, vec!["Immunology", "Oncology"]);
        assert_eq!(opts.stages, vec!["Post-Launch"]);
        assert_eq!(opts.years, vec![2022, 2024]);
    }
}

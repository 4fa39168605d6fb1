// Pivot matrices over filtered rows: company -> brand x year, the same matrix
// per therapeutic area, and the therapeutic-area x year share table.
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::series::all_years;
use crate::tiering::heat_bucket;
use crate::types::{ClassifiedRow, RevenueType, ServiceMap, TaYearCell, Year, KLICK};
use crate::util::percent_of;

/// Every brand present in a matrix has a cell for every year on its axis;
/// a missing observation reads as 0.
pub const ZERO_FILL_WITHIN_KNOWN_BRAND: bool = true;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct BrandKey {
    pub company_slug: String,
    pub brand_name: String,
}

impl BrandKey {
    pub fn new(company_slug: impl Into<String>, brand_name: impl Into<String>) -> Self {
        Self {
            company_slug: company_slug.into(),
            brand_name: brand_name.into(),
        }
    }

    fn of(row: &ClassifiedRow) -> Self {
        Self::new(row.company_slug.clone(), row.brand_name.clone())
    }
}

impl fmt::Display for BrandKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.company_slug, self.brand_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanyEntry {
    pub slug: String,
    pub name: String,
    pub brands: Vec<String>,
}

/// Agency markers for a brand cell. Both flags may be set at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Decoration {
    pub has_klick: bool,
    pub has_competitor: bool,
}

impl Decoration {
    fn merge(self, other: Decoration) -> Decoration {
        Decoration {
            has_klick: self.has_klick || other.has_klick,
            has_competitor: self.has_competitor || other.has_competitor,
        }
    }
}

pub fn decorate(services: &ServiceMap) -> Decoration {
    let values: Vec<&str> = services.values().filter_map(|v| v.as_deref()).collect();
    Decoration {
        has_klick: values.iter().any(|v| *v == KLICK),
        has_competitor: values.iter().any(|v| *v != KLICK && !v.trim().is_empty()),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PivotMatrix {
    pub revenue_type: RevenueType,
    pub companies: Vec<CompanyEntry>,
    pub brand_keys: Vec<BrandKey>,
    pub years: Vec<Year>,
    cells: HashMap<BrandKey, BTreeMap<Year, f64>>,
    decorations: HashMap<BrandKey, Decoration>,
}

/// One brand line of a serialized matrix; `values` follows the year axis.
#[derive(Serialize)]
struct BrandLine<'a> {
    key: &'a BrandKey,
    values: Vec<f64>,
    decoration: Decoration,
}

#[derive(Serialize)]
struct CompanyLine<'a> {
    slug: &'a str,
    name: &'a str,
    values: Vec<f64>,
    brands: Vec<BrandLine<'a>>,
}

#[derive(Serialize)]
struct MatrixView<'a> {
    revenue_type: RevenueType,
    years: &'a [Year],
    companies: Vec<CompanyLine<'a>>,
}

impl Serialize for PivotMatrix {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let companies = self
            .companies
            .iter()
            .map(|c| CompanyLine {
                slug: &c.slug,
                name: &c.name,
                values: self.years.iter().map(|y| self.company_cell(&c.slug, *y)).collect(),
                brands: self
                    .brand_keys
                    .iter()
                    .filter(|k| k.company_slug == c.slug)
                    .map(|k| BrandLine {
                        key: k,
                        values: self.years.iter().map(|y| self.cell(k, *y)).collect(),
                        decoration: self.decoration(k),
                    })
                    .collect(),
            })
            .collect();
        MatrixView {
            revenue_type: self.revenue_type,
            years: &self.years,
            companies,
        }
        .serialize(serializer)
    }
}

impl PivotMatrix {
    /// Build over the years observed in `rows`.
    pub fn build(rows: &[ClassifiedRow], revenue_type: RevenueType) -> Self {
        let years = all_years(rows);
        Self::build_with_years(rows, revenue_type, &years)
    }

    /// Build over an explicit year axis. Rows sharing a brand key are summed.
    pub fn build_with_years(rows: &[ClassifiedRow], revenue_type: RevenueType, years: &[Year]) -> Self {
        let mut years = years.to_vec();
        years.sort_unstable();
        years.dedup();

        let mut companies: Vec<CompanyEntry> = Vec::new();
        let mut company_index: HashMap<String, usize> = HashMap::new();
        let mut brand_keys: Vec<BrandKey> = Vec::new();
        let mut cells: HashMap<BrandKey, BTreeMap<Year, f64>> = HashMap::new();
        let mut decorations: HashMap<BrandKey, Decoration> = HashMap::new();

        for row in rows {
            let idx = *company_index
                .entry(row.company_slug.clone())
                .or_insert_with(|| {
                    companies.push(CompanyEntry {
                        slug: row.company_slug.clone(),
                        name: row.company_name.clone(),
                        brands: Vec::new(),
                    });
                    companies.len() - 1
                });
            let company = &mut companies[idx];
            if !company.brands.contains(&row.brand_name) {
                company.brands.push(row.brand_name.clone());
            }

            let key = BrandKey::of(row);
            let cell = cells.entry(key.clone()).or_insert_with(|| {
                brand_keys.push(key.clone());
                if ZERO_FILL_WITHIN_KNOWN_BRAND {
                    years.iter().map(|y| (*y, 0.0)).collect()
                } else {
                    BTreeMap::new()
                }
            });
            for year in &years {
                *cell.entry(*year).or_insert(0.0) += row.value(revenue_type, *year);
            }

            let deco = decorations.entry(key).or_default();
            *deco = deco.merge(decorate(&row.services));
        }

        tracing::debug!(
            companies = companies.len(),
            brands = brand_keys.len(),
            years = years.len(),
            "pivot matrix built"
        );

        PivotMatrix {
            revenue_type,
            companies,
            brand_keys,
            years,
            cells,
            decorations,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.companies.is_empty()
    }

    pub fn cell(&self, key: &BrandKey, year: Year) -> f64 {
        self.cells
            .get(key)
            .and_then(|c| c.get(&year))
            .copied()
            .unwrap_or(0.0)
    }

    /// Company roll-up: the sum of that company's brand cells for `year`.
    pub fn company_cell(&self, slug: &str, year: Year) -> f64 {
        self.companies
            .iter()
            .find(|c| c.slug == slug)
            .map(|c| {
                c.brands
                    .iter()
                    .map(|b| self.cell(&BrandKey::new(slug, b.as_str()), year))
                    .sum::<f64>()
            })
            .unwrap_or(0.0)
    }

    /// Sum of every company row for `year`.
    pub fn year_total(&self, year: Year) -> f64 {
        self.companies.iter().map(|c| self.company_cell(&c.slug, year)).sum()
    }

    pub fn decoration(&self, key: &BrandKey) -> Decoration {
        self.decorations.get(key).copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaGroup {
    pub therapeutic_area: String,
    pub matrix: PivotMatrix,
}

impl TaGroup {
    pub fn total(&self, year: Year) -> f64 {
        self.matrix.year_total(year)
    }
}

/// Therapeutic area -> company -> brand x year, all groups on one year axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaPivot {
    pub years: Vec<Year>,
    pub groups: Vec<TaGroup>,
}

impl TaPivot {
    pub fn build(rows: &[ClassifiedRow], revenue_type: RevenueType) -> Self {
        let years = all_years(rows);
        let tas: BTreeSet<&str> = rows.iter().map(|r| r.therapeutic_area.as_str()).collect();
        let groups = tas
            .into_iter()
            .map(|ta| {
                let ta_rows: Vec<ClassifiedRow> = rows
                    .iter()
                    .filter(|r| r.therapeutic_area == ta)
                    .cloned()
                    .collect();
                TaGroup {
                    therapeutic_area: ta.to_string(),
                    matrix: PivotMatrix::build_with_years(&ta_rows, revenue_type, &years),
                }
            })
            .collect();
        TaPivot { years, groups }
    }

    pub fn group(&self, therapeutic_area: &str) -> Option<&TaGroup> {
        self.groups.iter().find(|g| g.therapeutic_area == therapeutic_area)
    }
}

/// Value of every therapeutic area in every year, with its share of the year.
pub fn ta_year_table(rows: &[ClassifiedRow], revenue_type: RevenueType) -> Vec<TaYearCell> {
    let years = all_years(rows);
    let tas: BTreeSet<&str> = rows.iter().map(|r| r.therapeutic_area.as_str()).collect();
    let mut out = Vec::with_capacity(years.len() * tas.len());
    for year in &years {
        let year_total: f64 = rows.iter().map(|r| r.value(revenue_type, *year)).sum();
        for ta in &tas {
            let value: f64 = rows
                .iter()
                .filter(|r| r.therapeutic_area == *ta)
                .map(|r| r.value(revenue_type, *year))
                .sum();
            out.push(TaYearCell {
                year: *year,
                therapeutic_area: ta.to_string(),
                value,
                share_pct: percent_of(value, year_total),
                heat: heat_bucket(value),
            });
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedValue {
    pub name: String,
    pub company: String,
    pub revenue: f64,
}

/// Headline numbers for one therapeutic area.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaFocus {
    pub therapeutic_area: String,
    pub total_companies: usize,
    pub total_brands: usize,
    pub growing_brands: usize,
    pub shrinking_brands: usize,
    pub top_companies: Vec<RankedValue>,
    pub top_brands: Vec<RankedValue>,
}

const FOCUS_TOP_N: usize = 3;

pub fn ta_focus(
    rows: &[ClassifiedRow],
    therapeutic_area: &str,
    revenue_type: RevenueType,
) -> Option<TaFocus> {
    let ta_rows: Vec<&ClassifiedRow> = rows
        .iter()
        .filter(|r| r.therapeutic_area == therapeutic_area)
        .collect();
    if ta_rows.is_empty() {
        return None;
    }

    let mut by_company: Vec<RankedValue> = Vec::new();
    for row in &ta_rows {
        let revenue = row.latest_revenue(revenue_type);
        match by_company.iter_mut().find(|c| c.company == row.company_slug) {
            Some(c) => c.revenue += revenue,
            None => by_company.push(RankedValue {
                name: row.company_name.clone(),
                company: row.company_slug.clone(),
                revenue,
            }),
        }
    }
    let total_companies = by_company.len();
    sort_desc(&mut by_company);
    by_company.truncate(FOCUS_TOP_N);

    let mut top_brands: Vec<RankedValue> = ta_rows
        .iter()
        .map(|r| RankedValue {
            name: r.brand_name.clone(),
            company: r.company_name.clone(),
            revenue: r.latest_revenue(revenue_type),
        })
        .collect();
    sort_desc(&mut top_brands);
    top_brands.truncate(FOCUS_TOP_N);

    Some(TaFocus {
        therapeutic_area: therapeutic_area.to_string(),
        total_companies,
        total_brands: ta_rows.len(),
        growing_brands: ta_rows.iter().filter(|r| r.growing == Some(true)).count(),
        shrinking_brands: ta_rows.iter().filter(|r| r.growing == Some(false)).count(),
        top_companies: by_company,
        top_brands,
    })
}

fn sort_desc(v: &mut [RankedValue]) {
    v.sort_by(|a, b| b.revenue.partial_cmp(&a.revenue).unwrap_or(Ordering::Equal));
}

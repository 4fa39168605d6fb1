use crate::error::LoadError;
use crate::types::{Brand, Company, RawRevenueRow, RevenueObservation};
use crate::util::{non_blank, parse_f64_safe, parse_i32_safe, slugify};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub skipped_rows: usize,
    pub companies: usize,
    pub brands: usize,
}

pub fn load_snapshot(path: &Path) -> Result<(Vec<Company>, LoadReport), LoadError> {
    let rdr = ReaderBuilder::new().flexible(true).from_path(path)?;
    read_companies(rdr)
}

pub fn load_snapshot_from_reader<R: Read>(reader: R) -> Result<(Vec<Company>, LoadReport), LoadError> {
    let rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    read_companies(rdr)
}

fn read_companies<R: Read>(mut rdr: csv::Reader<R>) -> Result<(Vec<Company>, LoadReport), LoadError> {
    let mut total_rows = 0usize;
    let mut skipped_rows = 0usize;
    let mut companies: Vec<Company> = Vec::new();
    let mut by_slug: HashMap<String, usize> = HashMap::new();

    for result in rdr.deserialize::<RawRevenueRow>() {
        total_rows += 1;
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(line = total_rows, error = %e, "unreadable snapshot row skipped");
                skipped_rows += 1;
                continue;
            }
        };

        let (Some(company_name), Some(brand_name), Some(year)) = (
            non_blank(row.company.as_deref()),
            non_blank(row.brand.as_deref()),
            parse_i32_safe(row.year.as_deref()),
        ) else {
            skipped_rows += 1;
            continue;
        };

        let slug = non_blank(row.company_slug.as_deref()).unwrap_or_else(|| slugify(&company_name));
        let brand_id = non_blank(row.brand_id.as_deref())
            .unwrap_or_else(|| format!("{}:{}", slug, brand_name));

        let idx = *by_slug.entry(slug.clone()).or_insert_with(|| {
            companies.push(Company {
                slug: slug.clone(),
                name: company_name.clone(),
                brands: Vec::new(),
                revenue_rows: Vec::new(),
            });
            companies.len() - 1
        });
        let company = &mut companies[idx];

        let services = row.services();
        match company.brands.iter_mut().find(|b| b.id == brand_id) {
            Some(brand) => {
                // later rows only fill gaps
                if brand.therapeutic_area.is_none() {
                    brand.therapeutic_area = non_blank(row.therapeutic_area.as_deref());
                }
                if brand.lifecycle_stage.is_none() {
                    brand.lifecycle_stage = non_blank(row.stage.as_deref());
                }
                for (service, agency) in services {
                    brand.services.entry(service).or_insert(agency);
                }
            }
            None => company.brands.push(Brand {
                id: brand_id.clone(),
                name: brand_name,
                therapeutic_area: non_blank(row.therapeutic_area.as_deref()),
                lifecycle_stage: non_blank(row.stage.as_deref()),
                services,
            }),
        }

        company.revenue_rows.push(RevenueObservation {
            brand_id,
            year,
            ww_sales: parse_f64_safe(row.ww_sales.as_deref()).unwrap_or(0.0),
            us_sales: parse_f64_safe(row.us_sales.as_deref()).unwrap_or(0.0),
        });
    }

    if companies.is_empty() {
        return Err(LoadError::Empty);
    }

    let brands = companies.iter().map(|c| c.brands.len()).sum();
    let report = LoadReport {
        total_rows,
        skipped_rows,
        companies: companies.len(),
        brands,
    };
    tracing::info!(
        rows = report.total_rows,
        skipped = report.skipped_rows,
        companies = report.companies,
        brands = report.brands,
        "snapshot loaded"
    );
    Ok((companies, report))
}

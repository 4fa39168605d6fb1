use serde::Serialize;
use std::error::Error;
use std::path::Path;
use tabled::{builder::Builder, settings::Style, Table, Tabled};

use crate::insights::InsightDetails;
use crate::pivot::PivotMatrix;
use crate::util::format_number;

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), Box<dyn Error>> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), Box<dyn Error>> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Header plus one line per company roll-up and per brand.
fn matrix_records(matrix: &PivotMatrix) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut header = vec!["Level".to_string(), "Company".to_string(), "Brand".to_string()];
    header.extend(matrix.years.iter().map(|y| y.to_string()));
    header.push("Agencies".to_string());
    records.push(header);

    for company in &matrix.companies {
        let mut line = vec!["Company".to_string(), company.name.clone(), String::new()];
        line.extend(
            matrix
                .years
                .iter()
                .map(|y| format_number(matrix.company_cell(&company.slug, *y), 0)),
        );
        line.push(String::new());
        records.push(line);

        for brand in &company.brands {
            let key = crate::pivot::BrandKey::new(company.slug.as_str(), brand.as_str());
            let mut line = vec!["Brand".to_string(), company.name.clone(), brand.clone()];
            line.extend(
                matrix
                    .years
                    .iter()
                    .map(|y| format_number(matrix.cell(&key, *y), 0)),
            );
            let deco = matrix.decoration(&key);
            let marker = match (deco.has_klick, deco.has_competitor) {
                (true, true) => "Klick+Competitor",
                (true, false) => "Klick",
                (false, true) => "Competitor",
                (false, false) => "",
            };
            line.push(marker.to_string());
            records.push(line);
        }
    }
    records
}

pub fn write_matrix_csv(path: &Path, matrix: &PivotMatrix) -> Result<(), Box<dyn Error>> {
    let mut wtr = csv::Writer::from_path(path)?;
    for record in matrix_records(matrix) {
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn render_matrix(matrix: &PivotMatrix, max_companies: usize) -> String {
    if matrix.is_empty() {
        return "(no rows)".to_string();
    }
    let mut builder = Builder::default();
    let mut companies_seen = 0usize;
    for record in matrix_records(matrix) {
        if record[0] == "Company" {
            companies_seen += 1;
            if companies_seen > max_companies {
                break;
            }
        }
        builder.push_record(record);
    }
    builder.build().with(Style::markdown()).to_string()
}

fn table_of<T: Tabled>(rows: &[T]) -> String
where
    T: Clone,
{
    if rows.is_empty() {
        return "(no rows)".to_string();
    }
    Table::new(rows.to_vec()).with(Style::markdown()).to_string()
}

pub fn render_details(details: &InsightDetails) -> String {
    match details {
        InsightDetails::BrandShares(v) => table_of(v),
        InsightDetails::TaShares(v) => table_of(v),
        InsightDetails::UnknownTa(v) => table_of(v),
        InsightDetails::Growth(v) => table_of(v),
        InsightDetails::Pipeline(v) => table_of(v),
        InsightDetails::Phases(v) => table_of(v),
        InsightDetails::LaunchYears(v) => table_of(v),
        InsightDetails::TaLaunches(v) => table_of(v),
        InsightDetails::Agencies(v) => table_of(v),
    }
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    println!("{}\n", table_of(&slice));
}

// Entry point and high-level CLI flow.
//
// - Option [1] loads the revenue snapshot CSV and prints diagnostics.
// - Option [2] runs a full pass (pivot, therapeutic areas, insights, fees),
//   writes CSV/JSON outputs and prints previews.
// - Option [3] maintains the fee-to-revenue ratio table.
use once_cell::sync::Lazy;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing_subscriber::EnvFilter;

use pharma_pivot::config::{self, EngineConfig};
use pharma_pivot::fees::RatioBook;
use pharma_pivot::reports::{self, PassOptions, ReportBundle};
use pharma_pivot::types::{Company, RevenueType};
use pharma_pivot::{loader, output, pivot, series, util};

// Loaded companies and the ratio table live here so a run can load once and
// regenerate reports as many times as needed.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| {
    Mutex::new(AppState {
        companies: None,
        ratios: RatioBook::seeded(),
    })
});

struct AppState {
    companies: Option<Vec<Company>>,
    ratios: RatioBook,
}

fn state() -> MutexGuard<'static, AppState> {
    APP_STATE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Read a single line of input after printing the common "Enter choice:" prompt.
fn read_choice() -> String {
    print!("Enter choice: ");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Ask whether to go back to the report selection menu.
///
/// Returns `true` for `Y`, `false` for `N`.
fn prompt_back_to_menu() -> bool {
    loop {
        print!("Back to Report Selection (Y/N): ");
        let _ = io::stdout().flush();
        let mut buf = String::new();
        io::stdin().read_line(&mut buf).ok();
        let resp = buf.trim().to_uppercase();
        match resp.as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

/// Handle option [1]: load the snapshot CSV named by the configuration.
fn handle_load(cfg: &EngineConfig) {
    match loader::load_snapshot(&cfg.input_path) {
        Ok((companies, load_report)) => {
            println!(
                "Processing snapshot... ({} rows read, {} companies, {} brands)",
                util::format_int(load_report.total_rows as i64),
                util::format_int(load_report.companies as i64),
                util::format_int(load_report.brands as i64)
            );
            if load_report.skipped_rows > 0 {
                println!(
                    "Note: {} rows skipped (missing company, brand or year).",
                    util::format_int(load_report.skipped_rows as i64)
                );
            }
            let rows = series::build_rows(&companies, &cfg.tier_reference);
            let options = series::filter_options(&rows);
            println!(
                "Years: {}  Therapeutic areas: {}  Stages: {}\n",
                options
                    .years
                    .iter()
                    .map(|y| y.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
                util::format_int(options.therapeutic_areas.len() as i64),
                util::format_int(options.stages.len() as i64)
            );
            state().companies = Some(companies);
        }
        Err(e) => {
            tracing::error!(path = %cfg.input_path.display(), error = %e, "snapshot load failed");
            eprintln!("Failed to load file: {}\n", e);
        }
    }
}

fn out_path(cfg: &EngineConfig, name: &str) -> PathBuf {
    cfg.output_dir.join(name)
}

fn report_write_error(path: &Path, result: Result<(), Box<dyn std::error::Error>>) {
    if let Err(e) = result {
        tracing::error!(path = %path.display(), error = %e, "write failed");
        eprintln!("Write error: {}", e);
    }
}

/// Handle option [2]: run a full pass and write every output.
fn handle_generate_reports(cfg: &EngineConfig) {
    let (companies, ratios) = {
        let st = state();
        (st.companies.clone(), st.ratios.clone())
    };
    let Some(companies) = companies else {
        println!("Error: No data loaded. Please load the snapshot first (option 1).\n");
        return;
    };

    let filters = match config::load_filters(cfg.filters_path.as_deref()) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Invalid filters: {}\n", e);
            return;
        }
    };

    let opts = PassOptions {
        revenue_type: cfg.revenue_type,
        as_of_year: cfg.as_of_year,
    };
    let bundle = match reports::generate_reports(
        &companies,
        &cfg.tier_reference,
        &filters,
        &ratios,
        opts,
    ) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Report pass failed: {}\n", e);
            return;
        }
    };

    if let Err(e) = std::fs::create_dir_all(&cfg.output_dir) {
        eprintln!("Cannot create {}: {}\n", cfg.output_dir.display(), e);
        return;
    }

    println!("Generating reports...");
    println!(
        "({} of {} brands pass the filters, {} revenue)\n",
        util::format_int(bundle.filtered.len() as i64),
        util::format_int(bundle.rows.len() as i64),
        match cfg.revenue_type {
            RevenueType::Ww => "worldwide",
            RevenueType::Us => "US",
        }
    );

    print_pivot(cfg, &bundle);
    print_therapeutic_areas(cfg, &bundle);
    print_insights(cfg, &bundle);
    print_fees(cfg, &bundle);

    let file = out_path(cfg, "summary.json");
    report_write_error(&file, output::write_json(&file, &bundle.summary));
    println!("Summary Stats ({}):", file.display());
    println!(
        "{{\"total_brands\": {}, \"total_latest_revenue\": {}}}\n",
        util::format_int(bundle.summary.total_brands as i64),
        util::format_number(bundle.summary.total_latest_revenue, 0)
    );
}

fn print_pivot(cfg: &EngineConfig, bundle: &ReportBundle) {
    let file = out_path(cfg, "pivot_company_brand.csv");
    report_write_error(&file, output::write_matrix_csv(&file, &bundle.matrix));
    println!("Report 1: Company / Brand Revenue Pivot\n");
    println!("{}\n", output::render_matrix(&bundle.matrix, 2));
    println!("(Full table exported to {})\n", file.display());
}

fn print_therapeutic_areas(cfg: &EngineConfig, bundle: &ReportBundle) {
    let file = out_path(cfg, "therapeutic_area_share.csv");
    report_write_error(&file, output::write_csv(&file, &bundle.ta_table));
    println!("Report 2: Therapeutic Area Share by Year\n");
    output::preview_table_rows(&bundle.ta_table, 5);
    let pivot_file = out_path(cfg, "therapeutic_area_pivot.json");
    report_write_error(&pivot_file, output::write_json(&pivot_file, &bundle.ta_pivot));
    println!(
        "(Full tables exported to {} and {})\n",
        file.display(),
        pivot_file.display()
    );

    let Some(lead) = bundle
        .ta_pivot
        .groups
        .iter()
        .filter(|g| g.therapeutic_area != pharma_pivot::types::UNKNOWN_TA)
        .max_by(|a, b| {
            let year = bundle.ta_pivot.years.last().copied().unwrap_or_default();
            a.total(year).total_cmp(&b.total(year))
        })
    else {
        return;
    };
    if let Some(focus) = pivot::ta_focus(&bundle.filtered, &lead.therapeutic_area, cfg.revenue_type) {
        println!(
            "Focus: {} ({} companies, {} brands, {} growing, {} shrinking)",
            focus.therapeutic_area,
            util::format_int(focus.total_companies as i64),
            util::format_int(focus.total_brands as i64),
            util::format_int(focus.growing_brands as i64),
            util::format_int(focus.shrinking_brands as i64)
        );
        for b in &focus.top_brands {
            println!("  {} ({}): {}", b.name, b.company, util::format_revenue(b.revenue));
        }
        println!();
    }
}

fn print_insights(cfg: &EngineConfig, bundle: &ReportBundle) {
    let file = out_path(cfg, "insights.json");
    report_write_error(&file, output::write_json(&file, &bundle.insights));
    println!("Report 3: Key Insights\n");
    if bundle.insights.is_empty() {
        println!("(no insights for the current filters)\n");
        return;
    }
    for (i, insight) in bundle.insights.iter().enumerate() {
        println!("[{}] {}: {}", i + 1, insight.title, insight.description);
    }
    println!();

    // Details for the first insight; the rest are in the JSON file.
    let ctx = bundle.context();
    let first = &bundle.insights[0];
    let details = first.details(&bundle.filtered, &ctx);
    println!("{} details ({} rows)\n", first.title, util::format_int(details.len() as i64));
    println!("{}\n", output::render_details(&details));
}

fn print_fees(cfg: &EngineConfig, bundle: &ReportBundle) {
    let file = out_path(cfg, "fee_summary.csv");
    report_write_error(&file, output::write_csv(&file, &bundle.fee_summary));
    let detail_file = out_path(cfg, "fee_analyses.json");
    report_write_error(&detail_file, output::write_json(&detail_file, &bundle.fee_analyses));
    let matrix_file = out_path(cfg, "fee_matrix.csv");
    report_write_error(&matrix_file, output::write_csv(&matrix_file, &bundle.fee_matrix));

    println!("Report 4: Service Fee Estimates ({})\n", bundle.fee_year);
    output::preview_table_rows(&bundle.fee_summary, 7);
    println!(
        "Total fees {} on {} revenue, weighted ratio {}, {} high confidence",
        util::format_revenue(bundle.fee_stats.total_estimated_fees),
        util::format_revenue(bundle.fee_stats.total_revenue),
        util::format_pct(bundle.fee_stats.avg_ratio_pct),
        util::format_pct(bundle.fee_stats.confidence_rate)
    );
    println!("(Full tables exported to {})\n", file.display());
}

/// Handle option [3]: reset or clean the ratio table.
fn handle_ratios() {
    {
        let st = state();
        println!("Fee ratios: {} entries", util::format_int(st.ratios.len() as i64));
    }
    println!("[R] Reset to defaults");
    println!("[D] Remove duplicates");
    println!("[S] Restore seeded ratios\n");
    match read_choice().to_uppercase().as_str() {
        "R" => {
            let mut st = state();
            st.ratios.reset_to_defaults();
            println!("Reset to {} default ratios.\n", util::format_int(st.ratios.len() as i64));
        }
        "D" => {
            let removed = state().ratios.dedupe();
            println!("Removed {} duplicate ratios.\n", util::format_int(removed.len() as i64));
        }
        "S" => {
            state().ratios = RatioBook::seeded();
            println!("Seeded ratios restored.\n");
        }
        _ => println!("No changes made.\n"),
    }
}

fn main() {
    let cfg = match config::load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_filter)),
        )
        .with_writer(io::stderr)
        .init();
    tracing::debug!(
        input = %cfg.input_path.display(),
        as_of_year = cfg.as_of_year,
        "configuration loaded"
    );

    loop {
        println!("Select Report Option:");
        println!("[1] Load the snapshot");
        println!("[2] Generate Reports");
        println!("[3] Manage Fee Ratios\n");
        match read_choice().as_str() {
            "1" => {
                handle_load(&cfg);
            }
            "2" => {
                println!();
                handle_generate_reports(&cfg);
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            "3" => {
                handle_ratios();
            }
            _ => {
                println!("Invalid choice. Please enter 1, 2 or 3.\n");
            }
        }
    }
}

// One full aggregation pass: classify, filter, pivot, derive insights and
// estimate fees. Nothing is cached; callers re-run the pass on any change.
use std::collections::HashSet;

use crate::error::InvalidInputError;
use crate::fees::{self, FeeCell, FeeSummaryStats, RatioBook, ServiceFeeAnalysis};
use crate::filter::{self, FilterSet};
use crate::insights::{self, Insight, InsightContext};
use crate::pivot::{self, PivotMatrix, TaPivot};
use crate::series;
use crate::tiering::TierReference;
use crate::types::{
    ClassifiedRow, Company, RevenueType, ServiceFeeSummaryRow, SummaryStats, TaYearCell, Year,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassOptions {
    pub revenue_type: RevenueType,
    pub as_of_year: Year,
}

#[derive(Debug, Clone)]
pub struct ReportBundle {
    pub rows: Vec<ClassifiedRow>,
    pub filtered: Vec<ClassifiedRow>,
    pub matrix: PivotMatrix,
    pub ta_pivot: TaPivot,
    pub ta_table: Vec<TaYearCell>,
    pub insights: Vec<Insight>,
    pub fee_year: Year,
    pub fee_analyses: Vec<ServiceFeeAnalysis>,
    pub fee_summary: Vec<ServiceFeeSummaryRow>,
    pub fee_stats: FeeSummaryStats,
    pub fee_matrix: Vec<FeeCell>,
    pub summary: SummaryStats,
}

impl ReportBundle {
    pub fn context(&self) -> InsightContext {
        InsightContext {
            as_of_year: self.summary.as_of_year,
        }
    }
}

pub fn generate_reports(
    companies: &[Company],
    reference: &TierReference,
    filters: &FilterSet,
    book: &RatioBook,
    opts: PassOptions,
) -> Result<ReportBundle, InvalidInputError> {
    let rows = series::build_rows(companies, reference);
    let filtered = filter::apply(&rows, filters);
    let ctx = InsightContext {
        as_of_year: opts.as_of_year,
    };

    let matrix = PivotMatrix::build(&filtered, opts.revenue_type);
    let ta_pivot = TaPivot::build(&filtered, opts.revenue_type);
    let ta_table = pivot::ta_year_table(&filtered, opts.revenue_type);
    let insights = insights::derive_insights(&filtered, &ctx);

    let fee_year = fees::present_year(&series::all_years(&filtered), opts.as_of_year);
    let fee_analyses = fees::analyze_rows(&filtered, book, fee_year, opts.revenue_type)?;
    let fee_summary = fees::summarize_by_service(&fee_analyses);
    let fee_stats = fees::summary_stats(&fee_analyses);
    let fee_matrix = fees::fee_matrix(&fee_analyses);

    let summary = generate_summary(&filtered, &insights, opts);
    tracing::info!(
        rows = rows.len(),
        filtered = filtered.len(),
        insights = insights.len(),
        fee_year,
        "report pass complete"
    );

    Ok(ReportBundle {
        rows,
        filtered,
        matrix,
        ta_pivot,
        ta_table,
        insights,
        fee_year,
        fee_analyses,
        fee_summary,
        fee_stats,
        fee_matrix,
        summary,
    })
}

pub fn generate_summary(
    filtered: &[ClassifiedRow],
    insights: &[Insight],
    opts: PassOptions,
) -> SummaryStats {
    let companies: HashSet<&str> = filtered.iter().map(|r| r.company_slug.as_str()).collect();
    SummaryStats {
        as_of_year: opts.as_of_year,
        revenue_type: opts.revenue_type,
        total_companies: companies.len(),
        total_brands: filtered.len(),
        growing_brands: filtered.iter().filter(|r| r.growing == Some(true)).count(),
        shrinking_brands: filtered.iter().filter(|r| r.growing == Some(false)).count(),
        total_latest_revenue: filtered
            .iter()
            .map(|r| r.latest_revenue(opts.revenue_type))
            .sum(),
        insights: insights
            .iter()
            .map(|i| format!("{}: {}", i.title, i.description))
            .collect(),
    }
}

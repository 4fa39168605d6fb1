use pharma_pivot::fees::{self, FeeToRevenueRatio, ProductStage, RatioBook};
use pharma_pivot::filter::{self, Dimension, FilterSet, GrowthFilter};
use pharma_pivot::insights::{self, InsightContext, InsightKind};
use pharma_pivot::pivot::{self, BrandKey, PivotMatrix};
use pharma_pivot::reports::{self, PassOptions};
use pharma_pivot::series;
use pharma_pivot::tiering::{revenue_tier, CompanyTier, RevenueTier, TierReference};
use pharma_pivot::types::{ClassifiedRow, Company, RevenueType, ServiceCategory};
use serde_json::json;

fn company(value: serde_json::Value) -> Company {
    serde_json::from_value(value).unwrap()
}

fn portfolio() -> Vec<Company> {
    vec![
        company(json!({
            "slug": "pfizer",
            "name": "Pfizer",
            "brands": [
                {"id": "b1", "name": "Eliquis", "therapeutic_area": "Cardiology",
                 "lifecycle_stage": "Post-Launch",
                 "services": {"AOR": "Klick", "Media": "OtherCo"}},
                {"id": "b2", "name": "Ibrance", "therapeutic_area": "Oncology",
                 "lifecycle_stage": "Pre-LOE", "services": {"AOR": "Havas"}},
                {"id": "b3", "name": "Danuglipron", "lifecycle_stage": "Pre-Launch (1Y)"}
            ],
            "revenue_rows": [
                {"brand_id": "b1", "year": 2023, "ww_sales": 1_200_000_000.0, "us_sales": 700_000_000.0},
                {"brand_id": "b1", "year": 2024, "ww_sales": 1_500_000_000.0, "us_sales": 800_000_000.0},
                {"brand_id": "b2", "year": 2023, "ww_sales": 500_000_000.0},
                {"brand_id": "b2", "year": 2024, "ww_sales": 300_000_000.0},
                {"brand_id": "b3", "year": 2024, "ww_sales": 20_000_000.0}
            ]
        })),
        company(json!({
            "slug": "small-bio",
            "name": "Small Bio",
            "brands": [
                {"id": "s1", "name": "Xenolex", "therapeutic_area": "Oncology",
                 "lifecycle_stage": "Phase 2", "services": {"MedComms": "Klick"}},
                {"id": "s2", "name": "Orphan", "therapeutic_area": "Rare Disease"}
            ],
            "revenue_rows": [
                {"brand_id": "s1", "year": 2024, "ww_sales": 40_000_000.0}
            ]
        })),
    ]
}

fn rows() -> Vec<ClassifiedRow> {
    series::build_rows(&portfolio(), &TierReference::default())
}

fn row_named<'a>(rows: &'a [ClassifiedRow], brand: &str) -> &'a ClassifiedRow {
    rows.iter().find(|r| r.brand_name == brand).unwrap()
}

#[test]
fn series_growth_and_tier_for_a_billion_dollar_brand() {
    let rows = rows();
    let eliquis = row_named(&rows, "Eliquis");
    assert_eq!(eliquis.series.get(&2023), Some(&1_200_000_000.0));
    assert_eq!(eliquis.series.get(&2024), Some(&1_500_000_000.0));
    assert_eq!(eliquis.growing, Some(true));
    assert_eq!(eliquis.revenue_tier, RevenueTier::Over1B);
    assert_eq!(eliquis.revenue_tier.label(), "1B+");
    assert_eq!(insights::growth_rate(1_200_000_000.0, 1_500_000_000.0), 25.0);
}

#[test]
fn brands_without_observations_are_left_out() {
    let rows = rows();
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|r| r.brand_name != "Orphan"));
    assert_eq!(row_named(&rows, "Danuglipron").therapeutic_area, "Unknown");
}

#[test]
fn merck_canada_is_tier_one() {
    let reference = TierReference::default();
    assert_eq!(reference.classify("Merck & Co. (MSD) Canada"), CompanyTier::Tier1);
    assert_eq!(reference.classify("Small Bio"), CompanyTier::ExTier1);
}

#[test]
fn duplicate_ratio_cleanup_keeps_the_first() {
    let r1 = FeeToRevenueRatio::new("r1", ServiceCategory::Aor, ProductStage::Launch, 0.05, "")
        .unwrap();
    let r2 = FeeToRevenueRatio::new("r2", ServiceCategory::Aor, ProductStage::Launch, 0.08, "")
        .unwrap();
    let mut book = RatioBook::from_ratios(vec![r1.clone(), r2.clone()]).unwrap();

    let removed = book.dedupe();
    assert_eq!(book.ratios(), &[r1]);
    assert_eq!(removed, vec![r2]);
    assert_eq!(book.ratio_for(ServiceCategory::Aor, ProductStage::Launch), 0.05);
}

#[test]
fn klick_and_competitor_decorations_are_independent() {
    let rows = rows();
    let matrix = PivotMatrix::build(&rows, RevenueType::Ww);
    let deco = matrix.decoration(&BrandKey::new("pfizer", "Eliquis"));
    assert!(deco.has_klick);
    assert!(deco.has_competitor);

    let ibrance = matrix.decoration(&BrandKey::new("pfizer", "Ibrance"));
    assert!(!ibrance.has_klick);
    assert!(ibrance.has_competitor);
}

#[test]
fn empty_selection_yields_no_insights_and_an_empty_matrix() {
    let filters = FilterSet {
        company_slug: Some("nobody".to_string()),
        ..FilterSet::default()
    };
    let filtered = filter::apply(&rows(), &filters);
    assert!(filtered.is_empty());

    let ctx = InsightContext { as_of_year: 2025 };
    assert!(insights::derive_insights(&filtered, &ctx).is_empty());
    for kind in InsightKind::ALL {
        assert!(kind.detect(&filtered, &ctx).is_none(), "{:?}", kind);
    }
    let matrix = PivotMatrix::build(&filtered, RevenueType::Ww);
    assert!(matrix.companies.is_empty());
}

#[test]
fn observation_order_does_not_change_sums() {
    let forward = company(json!({
        "slug": "acme", "name": "Acme",
        "brands": [{"id": "a1", "name": "Alpha"}],
        "revenue_rows": [
            {"brand_id": "a1", "year": 2024, "ww_sales": 0.1},
            {"brand_id": "a1", "year": 2024, "ww_sales": 0.2},
            {"brand_id": "a1", "year": 2024, "ww_sales": 0.3},
            {"brand_id": "a1", "year": 2023, "ww_sales": 5.0}
        ]
    }));
    let mut reversed = forward.clone();
    reversed.revenue_rows.reverse();

    let reference = TierReference::default();
    let a = series::build_rows(&[forward], &reference);
    let b = series::build_rows(&[reversed], &reference);
    let (x, y) = (a[0].series[&2024], b[0].series[&2024]);
    assert!((x - 0.6).abs() < 1e-12);
    assert!((y - 0.6).abs() < 1e-12);
    assert_eq!(a[0].series[&2023], b[0].series[&2023]);
}

#[test]
fn tiers_never_decrease_with_revenue() {
    let samples = [
        0.0,
        1.0,
        99_999_999.0,
        100_000_000.0,
        250_000_000.0,
        499_999_999.0,
        500_000_000.0,
        999_999_999.0,
        1_000_000_000.0,
        7_500_000_000.0,
    ];
    for pair in samples.windows(2) {
        assert!(revenue_tier(pair[0]) <= revenue_tier(pair[1]), "{:?}", pair);
    }
}

#[test]
fn dimension_order_does_not_change_the_verdict() {
    let filters = FilterSet {
        stages: vec!["Post-Launch".to_string(), "Phase 2".to_string()],
        company_tiers: vec!["Tier 1".to_string()],
        growth: GrowthFilter::Growing,
        agency: Some("Klick".to_string()),
        ..FilterSet::default()
    };
    let mut reversed = Dimension::ALL;
    reversed.reverse();
    let mut rotated = Dimension::ALL;
    rotated.rotate_left(3);

    for row in rows() {
        let expected = filter::passes(&row, &filters);
        assert_eq!(filter::passes_in_order(&row, &filters, &reversed), expected);
        assert_eq!(filter::passes_in_order(&row, &filters, &rotated), expected);
        for a in Dimension::ALL {
            for b in Dimension::ALL {
                assert_eq!(
                    filter::passes_in_order(&row, &filters, &[a, b]),
                    filter::passes_in_order(&row, &filters, &[b, a])
                );
            }
        }
    }
}

#[test]
fn filtering_twice_changes_nothing() {
    let filters = FilterSet::from_json(&json!({
        "revenueTiers": ["0-100M", "1B+"],
        "service": null,
        "growth": "any"
    }))
    .unwrap();
    let once = filter::apply(&rows(), &filters);
    let twice = filter::apply(&once, &filters);
    assert_eq!(once, twice);
    assert_eq!(once.len(), 3);
}

#[test]
fn wrongly_typed_filter_values_are_rejected() {
    let err = FilterSet::from_json(&json!({"stages": "Launch"})).unwrap_err();
    assert_eq!(err.field, "stages");
    let err = FilterSet::from_json(&json!({"companySlug": 7})).unwrap_err();
    assert_eq!(err.field, "companySlug");
}

#[test]
fn company_rows_add_up_their_brands() {
    let rows = rows();
    for revenue_type in [RevenueType::Ww, RevenueType::Us] {
        let matrix = PivotMatrix::build(&rows, revenue_type);
        for company in &matrix.companies {
            for &year in &matrix.years {
                let brands: f64 = company
                    .brands
                    .iter()
                    .map(|b| matrix.cell(&BrandKey::new(company.slug.as_str(), b.as_str()), year))
                    .sum();
                assert_eq!(matrix.company_cell(&company.slug, year), brands);
            }
        }
    }
    let matrix = PivotMatrix::build(&rows, RevenueType::Ww);
    // zero-filled where a brand has no observation
    assert_eq!(matrix.cell(&BrandKey::new("small-bio", "Xenolex"), 2023), 0.0);
}

#[test]
fn weighted_ratio_differs_from_mean_of_ratios() {
    let book = RatioBook::from_ratios(vec![
        FeeToRevenueRatio::new("a", ServiceCategory::Aor, ProductStage::Launch, 0.10, "").unwrap(),
        FeeToRevenueRatio::new("b", ServiceCategory::Aor, ProductStage::PostLaunch, 0.02, "")
            .unwrap(),
    ])
    .unwrap();
    let rows = rows();
    let mut launch = row_named(&rows, "Xenolex").clone();
    launch.stage = "Launch".to_string();
    let post = row_named(&rows, "Eliquis").clone();

    let analyses = vec![
        fees::analyze_service(&launch, ServiceCategory::Aor, 100.0, &book).unwrap(),
        fees::analyze_service(&post, ServiceCategory::Aor, 900.0, &book).unwrap(),
    ];
    let weighted = fees::weighted_ratio(&analyses);
    let mean = fees::mean_ratio(&analyses);
    assert!((weighted - 0.028).abs() < 1e-12);
    assert!((mean - 0.06).abs() < 1e-12);
    assert!(fees::estimated_fee(100.0, 1.5).is_err());
}

#[test]
fn a_gap_year_gives_no_growth_direction() {
    let gap = company(json!({
        "slug": "acme", "name": "Acme",
        "brands": [{"id": "a1", "name": "Alpha"}],
        "revenue_rows": [
            {"brand_id": "a1", "year": 2021, "ww_sales": 10.0},
            {"brand_id": "a1", "year": 2024, "ww_sales": 90.0}
        ]
    }));
    let rows = series::build_rows(&[gap], &TierReference::default());
    assert_eq!(rows[0].growing, None);
    // still a grower on first-vs-last
    assert!(insights::is_grower(&rows[0]));
}

#[test]
fn launch_years_follow_the_anchor_year() {
    let rows = rows();
    let ctx = InsightContext { as_of_year: 2025 };
    let insight = insights::launches_by_year(&rows, &ctx).unwrap();
    assert_eq!(insight.subject, "2026");
    assert_eq!(insight.metric, 1.0);

    let later = insights::launches_by_year(&rows, &InsightContext { as_of_year: 2030 }).unwrap();
    assert_eq!(later.subject, "2031");
}

#[test]
fn full_pass_holds_together() {
    let opts = PassOptions {
        revenue_type: RevenueType::Ww,
        as_of_year: 2024,
    };
    let bundle = reports::generate_reports(
        &portfolio(),
        &TierReference::default(),
        &FilterSet::default(),
        &RatioBook::seeded(),
        opts,
    )
    .unwrap();

    assert_eq!(bundle.filtered.len(), 4);
    assert_eq!(bundle.matrix.years, vec![2023, 2024]);
    assert_eq!(bundle.fee_year, 2024);
    assert_eq!(bundle.fee_analyses.len(), 4 * ServiceCategory::ALL.len());
    assert_eq!(bundle.summary.total_companies, 2);
    assert_eq!(bundle.summary.growing_brands, 1);
    assert_eq!(bundle.summary.shrinking_brands, 1);

    let kinds: Vec<InsightKind> = bundle.insights.iter().map(|i| i.kind).collect();
    let mut ordered = kinds.clone();
    ordered.sort_by_key(|k| InsightKind::ALL.iter().position(|a| a == k));
    assert_eq!(kinds, ordered);
    assert_eq!(bundle.insights[0].kind, InsightKind::RevenueConcentration);
    assert_eq!(bundle.insights[0].subject, "Eliquis");

    let agency = bundle
        .insights
        .iter()
        .find(|i| i.kind == InsightKind::Agency)
        .unwrap();
    assert_eq!(agency.subject, "OtherCo");

    let focus = pivot::ta_focus(&bundle.filtered, "Oncology", RevenueType::Ww).unwrap();
    assert_eq!(focus.total_companies, 2);
    assert_eq!(focus.top_brands[0].name, "Ibrance");
}

use chrono::Datelike;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::filter::FilterSet;
use crate::tiering::TierReference;
use crate::types::{RevenueType, Year};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub as_of_year: Year,
    pub revenue_type: RevenueType,
    pub tier_reference: TierReference,
    pub filters_path: Option<PathBuf>,
    pub log_filter: String,
}

/// Load configuration from the environment, reading `.env` first if present.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid, or the Tier 1
/// reference file cannot be read.
pub fn load_config() -> Result<EngineConfig, ConfigError> {
    dotenvy::dotenv().ok();
    build_config(|key| std::env::var(key))
}

/// Build configuration using the provided env-var lookup function.
pub fn build_config<F>(lookup: F) -> Result<EngineConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let as_of_year = match lookup("PHARMA_PIVOT_AS_OF_YEAR") {
        Ok(raw) => raw
            .trim()
            .parse::<Year>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: "PHARMA_PIVOT_AS_OF_YEAR".to_string(),
                reason: e.to_string(),
            })?,
        Err(_) => chrono::Local::now().year(),
    };

    let revenue_type = RevenueType::parse(&or_default("PHARMA_PIVOT_REVENUE_TYPE", "ww"))
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: "PHARMA_PIVOT_REVENUE_TYPE".to_string(),
            reason: e.reason,
        })?;

    let tier_reference = match lookup("PHARMA_PIVOT_TIER1_FILE") {
        Ok(path) if !path.trim().is_empty() => load_tier_reference(path.trim())?,
        _ => TierReference::default(),
    };

    Ok(EngineConfig {
        input_path: PathBuf::from(or_default("PHARMA_PIVOT_INPUT", "revenue_snapshot.csv")),
        output_dir: PathBuf::from(or_default("PHARMA_PIVOT_OUTPUT_DIR", ".")),
        as_of_year,
        revenue_type,
        tier_reference,
        filters_path: lookup("PHARMA_PIVOT_FILTERS")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from),
        log_filter: or_default("PHARMA_PIVOT_LOG", "info"),
    })
}

/// Read a JSON array of Tier 1 company names.
pub fn load_tier_reference(path: &str) -> Result<TierReference, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_string(),
        source,
    })?;
    let names: Vec<String> = serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
        path: path.to_string(),
        source,
    })?;
    Ok(TierReference::new(names))
}

/// Read the filter file named by `PHARMA_PIVOT_FILTERS`: a JSON object in the
/// `FilterSet` shape. No file means no filtering.
pub fn load_filters(path: Option<&Path>) -> Result<FilterSet, ConfigError> {
    let Some(path) = path else {
        return Ok(FilterSet::default());
    };
    let shown = path.display().to_string();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: shown.clone(),
        source,
    })?;
    let value: serde_json::Value = serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
        path: shown.clone(),
        source,
    })?;
    FilterSet::from_json(&value).map_err(|source| ConfigError::Filters { path: shown, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiering::CompanyTier;
    use std::collections::HashMap;

    fn lookup_from(map: HashMap<&'static str, &'static str>) -> impl Fn(&str) -> Result<String, std::env::VarError> {
        move |key| {
            map.get(key)
                .map(|v| v.to_string())
                .ok_or(std::env::VarError::NotPresent)
        }
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = build_config(lookup_from(HashMap::new())).unwrap();
        assert_eq!(cfg.input_path, PathBuf::from("revenue_snapshot.csv"));
        assert_eq!(cfg.revenue_type, RevenueType::Ww);
        assert_eq!(cfg.tier_reference.len(), 15);
        assert_eq!(cfg.log_filter, "info");
        assert!(cfg.filters_path.is_none());
    }

    #[test]
    fn explicit_values_are_parsed() {
        let cfg = build_config(lookup_from(HashMap::from([
            ("PHARMA_PIVOT_AS_OF_YEAR", "2026"),
            ("PHARMA_PIVOT_REVENUE_TYPE", "US"),
            ("PHARMA_PIVOT_OUTPUT_DIR", "out"),
        ])))
        .unwrap();
        assert_eq!(cfg.as_of_year, 2026);
        assert_eq!(cfg.revenue_type, RevenueType::Us);
        assert_eq!(cfg.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = build_config(lookup_from(HashMap::from([("PHARMA_PIVOT_AS_OF_YEAR", "soon")])))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar { ref var, .. } if var == "PHARMA_PIVOT_AS_OF_YEAR"));

        let err = build_config(lookup_from(HashMap::from([("PHARMA_PIVOT_REVENUE_TYPE", "eu")])))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar { ref var, .. } if var == "PHARMA_PIVOT_REVENUE_TYPE"));
    }

    #[test]
    fn filter_file_path_is_read_and_validated() {
        let path = std::env::temp_dir().join(format!("filters-{}.json", std::process::id()));
        let cfg = build_config(lookup_from(HashMap::from([(
            "PHARMA_PIVOT_FILTERS",
            "/tmp/filters.json",
        )])))
        .unwrap();
        assert_eq!(cfg.filters_path, Some(PathBuf::from("/tmp/filters.json")));

        std::fs::write(&path, r#"{"growth": "shrinking", "companyTiers": ["Tier 1"]}"#).unwrap();
        let filters = load_filters(Some(path.as_path())).unwrap();
        assert_eq!(filters.growth, crate::filter::GrowthFilter::Shrinking);
        assert_eq!(filters.company_tiers, vec!["Tier 1"]);

        std::fs::write(&path, r#"{"stages": "Launch"}"#).unwrap();
        let err = load_filters(Some(path.as_path())).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, ConfigError::Filters { ref source, .. } if source.field == "stages"));

        assert_eq!(load_filters(None).unwrap(), FilterSet::default());
    }

    #[test]
    fn tier_reference_file_is_loaded() {
        let path = std::env::temp_dir().join(format!("tier1-{}.json", std::process::id()));
        std::fs::write(&path, r#"["Vertex Pharmaceuticals", "Gilead"]"#).unwrap();
        let reference = load_tier_reference(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(reference.len(), 2);
        assert_eq!(reference.classify("Gilead Sciences"), CompanyTier::Tier1);

        assert!(matches!(
            load_tier_reference("/definitely/not/here.json"),
            Err(ConfigError::Io { .. })
        ));
    }
}

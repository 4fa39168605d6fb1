// Scalar classification helpers: revenue tiers, company tiers and the
// display heat scale. Everything here is a pure function of its inputs.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::InvalidInputError;

/// Ordinal revenue band for a brand's latest-year worldwide revenue.
///
/// Variant order is the ordinal order, so `Ord` compares tiers directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RevenueTier {
    #[serde(rename = "0-100M")]
    UpTo100M,
    #[serde(rename = "100-500M")]
    From100MTo500M,
    #[serde(rename = "500M-1B")]
    From500MTo1B,
    #[serde(rename = "1B+")]
    Over1B,
}

impl RevenueTier {
    pub const ALL: [RevenueTier; 4] = [
        RevenueTier::UpTo100M,
        RevenueTier::From100MTo500M,
        RevenueTier::From500MTo1B,
        RevenueTier::Over1B,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RevenueTier::UpTo100M => "0-100M",
            RevenueTier::From100MTo500M => "100-500M",
            RevenueTier::From500MTo1B => "500M-1B",
            RevenueTier::Over1B => "1B+",
        }
    }

    pub fn from_label(label: &str) -> Result<Self, InvalidInputError> {
        Self::ALL
            .into_iter()
            .find(|t| t.label() == label.trim())
            .ok_or_else(|| {
                InvalidInputError::new("revenueTiers", format!("unknown revenue tier '{}'", label))
            })
    }
}

impl fmt::Display for RevenueTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify a revenue value into its tier. NaN falls into the lowest band.
pub fn revenue_tier(value: f64) -> RevenueTier {
    if value.is_nan() || value < 100_000_000.0 {
        RevenueTier::UpTo100M
    } else if value < 500_000_000.0 {
        RevenueTier::From100MTo500M
    } else if value < 1_000_000_000.0 {
        RevenueTier::From500MTo1B
    } else {
        RevenueTier::Over1B
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompanyTier {
    #[serde(rename = "Tier 1")]
    Tier1,
    #[serde(rename = "ex-Tier 1")]
    ExTier1,
}

impl CompanyTier {
    pub fn label(&self) -> &'static str {
        match self {
            CompanyTier::Tier1 => "Tier 1",
            CompanyTier::ExTier1 => "ex-Tier 1",
        }
    }
}

impl fmt::Display for CompanyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

const DEFAULT_TIER1_NAMES: [&str; 15] = [
    "Johnson & Johnson",
    "Roche",
    "Pfizer",
    "Merck & Co. (MSD)",
    "Novartis",
    "AbbVie",
    "Bristol Myers Squibb (BMS)",
    "AstraZeneca",
    "Eli Lilly & Co.",
    "Sanofi",
    "GlaxoSmithKline (GSK)",
    "Amgen",
    "Takeda",
    "Boehringer Ingelheim",
    "Novo Nordisk",
];

/// Reference list of Tier 1 company names, stored normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierReference {
    names: Vec<String>,
}

impl TierReference {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .map(|n| normalize_name(n.as_ref()))
            .filter(|n| !n.is_empty())
            .collect();
        Self { names }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Containment in either direction against any reference entry.
    /// A blank company name is never Tier 1.
    pub fn classify(&self, company_name: &str) -> CompanyTier {
        let name = normalize_name(company_name);
        if name.is_empty() {
            return CompanyTier::ExTier1;
        }
        let hit = self
            .names
            .iter()
            .any(|reference| name.contains(reference.as_str()) || reference.contains(name.as_str()));
        if hit {
            CompanyTier::Tier1
        } else {
            CompanyTier::ExTier1
        }
    }
}

impl Default for TierReference {
    fn default() -> Self {
        Self::new(DEFAULT_TIER1_NAMES)
    }
}

fn normalize_name(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Five-bucket cell shading scale used by the therapeutic-area year table.
/// Kept separate from [`RevenueTier`]; the two scales answer different questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum HeatBucket {
    #[serde(rename = "<500M")]
    Under500M,
    #[serde(rename = "500M-1B")]
    From500MTo1B,
    #[serde(rename = "1-3B")]
    From1BTo3B,
    #[serde(rename = "3-5B")]
    From3BTo5B,
    #[serde(rename = "5B+")]
    Over5B,
}

impl HeatBucket {
    pub fn label(&self) -> &'static str {
        match self {
            HeatBucket::Under500M => "<500M",
            HeatBucket::From500MTo1B => "500M-1B",
            HeatBucket::From1BTo3B => "1-3B",
            HeatBucket::From3BTo5B => "3-5B",
            HeatBucket::Over5B => "5B+",
        }
    }
}

impl fmt::Display for HeatBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn heat_bucket(value: f64) -> HeatBucket {
    if value >= 5_000_000_000.0 {
        HeatBucket::Over5B
    } else if value >= 3_000_000_000.0 {
        HeatBucket::From3BTo5B
    } else if value >= 1_000_000_000.0 {
        HeatBucket::From1BTo3B
    } else if value >= 500_000_000.0 {
        HeatBucket::From500MTo1B
    } else {
        HeatBucket::Under500M
    }
}

//! Revenue aggregation, pivot and insight engine for a pharmaceutical
//! commercial-intelligence dashboard.
//!
//! Raw per-brand-per-year revenue observations flow through
//! [`series`] (classified rows), [`filter`] (filtered rows) and then into
//! [`pivot`] matrices and [`insights`]. [`fees`] estimates service fees from
//! the same rows. Every pass is a pure function of its inputs.
pub mod config;
pub mod error;
pub mod fees;
pub mod filter;
pub mod insights;
pub mod loader;
pub mod output;
pub mod pivot;
pub mod reports;
pub mod series;
pub mod tiering;
pub mod types;
pub mod util;

pub use error::{ConfigError, InvalidInputError, LoadError};
pub use filter::{FilterSet, GrowthFilter};
pub use pivot::{BrandKey, PivotMatrix};
pub use tiering::{CompanyTier, RevenueTier, TierReference};
pub use types::{Brand, ClassifiedRow, Company, RevenueObservation, RevenueType};

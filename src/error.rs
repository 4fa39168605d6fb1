use thiserror::Error;

/// Local input validation failure. `field` names the offending input.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid {field}: {reason}")]
pub struct InvalidInputError {
    pub field: String,
    pub reason: String,
}

impl InvalidInputError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read snapshot: {0}")]
    Csv(#[from] csv::Error),
    #[error("snapshot has no usable revenue rows")]
    Empty,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid filters in {path}: {source}")]
    Filters {
        path: String,
        #[source]
        source: InvalidInputError,
    },
}

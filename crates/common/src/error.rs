//! Error types for shopflow fixtures and selectors

use thiserror::Error;

/// Result type alias using the shopflow common Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building fixtures or resolving selectors
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unknown selector '{name}' in map '{map}'")]
    UnknownSelector { map: String, name: String },

    #[error("Unknown selector map: {0}")]
    UnknownSelectorMap(String),

    #[error("Record '{record}' has no field '{field}'")]
    UnknownField { record: String, field: String },

    #[error("Invalid fixture: {0}")]
    InvalidFixture(String),
}

//! Site-Harvest: mirror a website into a local corpus and analyze it in batches
//!
//! The crate has two engines:
//! - a polite, depth-bounded crawler that mirrors pages and their embedded
//!   resources into a content store, followed by a single headless rendering pass
//! - a token-budgeted batch planner that feeds the finished corpus, in discovery
//!   order, to a strictly sequential analysis conversation

pub mod analysis;
pub mod config;
pub mod corpus;
pub mod crawler;
pub mod output;
pub mod render;
pub mod robots;
pub mod state;
pub mod storage;
pub mod transform;
pub mod url;

use thiserror::Error;

/// Main error type for Site-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Empty content: {path}")]
    EmptyContent { path: String },

    #[error("Transform error: {0}")]
    Transform(#[from] transform::TransformError),

    #[error("Analysis service error: {0}")]
    Service(#[from] analysis::ServiceError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Session {0} cannot be resumed: its turn log is not contiguous")]
    BrokenSessionLog(i64),

    #[error("Content root unavailable at {path}: {source}")]
    ContentRoot {
        path: String,
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Site-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use analysis::{AnalysisSession, Batch, BatchPlanner};
pub use config::Config;
pub use corpus::ContentStore;
pub use crawler::Coordinator;
pub use url::{canonicalize_url, extract_domain, is_allowed_host};

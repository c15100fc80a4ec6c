//! Marquee: an event listing ingester
//!
//! This crate discovers event pages on a source site, extracts structured
//! event fields, detects content changes with a fingerprint, and reconciles
//! the result into a durable catalog while preserving operator-assigned
//! lifecycle status.

pub mod catalog;
pub mod clock;
pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Marquee operations
#[derive(Debug, Error)]
pub enum MarqueeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Listing page unavailable: {0}")]
    ListingFetch(#[source] crawler::FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
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

/// Result type alias for Marquee operations
pub type Result<T> = std::result::Result<T, MarqueeError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use catalog::{CandidateRecord, CatalogEntry, Fingerprint};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use crawler::{run_once, Coordinator, RunSummary};
pub use state::LifecycleStatus;

//! Crawler module for listing and detail page processing
//!
//! This module contains the ingestion run logic, including:
//! - HTTP fetching behind the `Fetcher` trait
//! - Detail link discovery on the listing page
//! - Field extraction from detail pages
//! - Overall run coordination with a bounded worker pool

mod coordinator;
mod extractor;
mod fetcher;
mod links;
mod summary;

pub use coordinator::{production_coordinator, run_once, Coordinator};
pub use extractor::{parse_occurs_at, Extractor, UnusableReason};
pub use fetcher::{
    build_http_client, user_agent_string, FetchCause, FetchError, Fetcher, HttpFetcher,
};
pub use links::discover_links;
pub use summary::{LinkOutcome, RunSummary};

//! The symbol universe: listing sources, enrichment sources, merging, and the
//! long-lived universe cache.

pub mod cache;
pub mod http_cache;
pub mod ipo;
pub mod listing;
pub mod merge;
pub mod nasdaq_trader;
pub mod screener;
pub mod sec;

use std::path::PathBuf;
use thiserror::Error;

pub use cache::{aggregate, read_universe_cache, seed_vendor_cache, update_universe_cache};
pub use http_cache::{HttpCache, ReqwestFetcher, TextFetcher};
pub use ipo::IpoRow;
pub use listing::{ListingFilter, ListingRow};
pub use merge::UniverseRecord;
pub use sec::CikMap;

/// Errors from listing and enrichment sources.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request to {url} failed: {detail}")]
    Http { url: String, detail: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid JSON from {what}: {source}")]
    Json {
        what: String,
        source: serde_json::Error,
    },

    #[error("could not parse {what}; first 200 chars: {snippet:?}")]
    Unparsable { what: String, snippet: String },

    #[error("{path} has no '{column}' column")]
    MissingColumn { path: PathBuf, column: String },

    #[error("{0}")]
    Empty(String),
}

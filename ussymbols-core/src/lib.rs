//! US symbol universe builder.
//!
//! Assembles the currently listed US equity symbols, resolves each symbol's
//! earliest trading date at the market-data vendor, and enriches the table
//! with SEC CIKs and IPO pricing dates:
//! - Vendor date resolution with batching, backoff and single-symbol fallback
//! - A persistent per-symbol vendor date cache and a staleness sampler
//! - Listing sources (Nasdaq Trader directories, screener, user file)
//! - The universe cache, aggregated across runs
//! - Output tables

pub mod config;
pub mod enrich;
pub mod notation;
pub mod report;
pub mod universe;
pub mod vendor;

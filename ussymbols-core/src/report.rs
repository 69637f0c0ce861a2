//! Output tables written under the run's output directory.
//!
//! Each table is rendered to a CSV string first and then written in one go.
//! Every table carries its header even when it has no rows.

use crate::universe::{IpoRow, ListingRow, UniverseRecord};
use crate::vendor::DateTable;
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const LISTINGS_FILE: &str = "us_symbols.csv";
pub const VENDOR_DATES_FILE: &str = "earliest_vendor_dates.csv";
pub const MISSING_FILE: &str = "earliest_vendor_dates_missing.csv";
pub const IPO_FILE: &str = "ipo_calendar.csv";
pub const MERGED_FILE: &str = "us_symbols_merged.csv";

const MERGED_COLUMNS: [&str; 7] = [
    "Symbol",
    "SecurityName",
    "Exchange",
    "CIK",
    "ListedCurrently",
    "EarliestVendorDate",
    "IPODate",
];

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV writer could not be flushed: {0}")]
    Flush(String),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn opt_date(d: Option<NaiveDate>) -> String {
    d.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()
}

fn opt_flag(b: Option<bool>) -> &'static str {
    match b {
        Some(true) => "true",
        Some(false) => "false",
        None => "",
    }
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String, ReportError> {
    let data = wtr
        .into_inner()
        .map_err(|e| ReportError::Flush(e.to_string()))?;
    String::from_utf8(data).map_err(|e| ReportError::Flush(e.to_string()))
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Listing rows as loaded, all marked currently listed.
pub fn export_listings_csv(rows: &[ListingRow]) -> Result<String, ReportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["Symbol", "SecurityName", "Exchange", "ListedCurrently"])?;
    for r in rows {
        wtr.write_record([
            r.symbol.as_str(),
            r.security_name.as_deref().unwrap_or(""),
            r.exchange.as_deref().unwrap_or(""),
            "true",
        ])?;
    }
    finish(wtr)
}

pub fn export_vendor_dates_csv(dates: &DateTable) -> Result<String, ReportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["Symbol", "EarliestVendorDate"])?;
    for (symbol, date) in dates {
        wtr.write_record([symbol.as_str(), date.format("%Y-%m-%d").to_string().as_str()])?;
    }
    finish(wtr)
}

/// Universe rows without an earliest vendor date (identity columns only).
pub fn export_missing_csv(records: &[&UniverseRecord]) -> Result<String, ReportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["Symbol", "SecurityName", "Exchange", "CIK", "ListedCurrently"])?;
    for r in records {
        wtr.write_record([
            r.symbol.as_str(),
            r.security_name.as_deref().unwrap_or(""),
            r.exchange.as_deref().unwrap_or(""),
            r.cik.map(|c| c.to_string()).unwrap_or_default().as_str(),
            opt_flag(r.listed_currently),
        ])?;
    }
    finish(wtr)
}

pub fn export_ipo_csv(rows: &[IpoRow]) -> Result<String, ReportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["Symbol", "IPODate", "Company"])?;
    for r in rows {
        wtr.write_record([
            r.symbol.as_str(),
            r.ipo_date.format("%Y-%m-%d").to_string().as_str(),
            r.company.as_str(),
        ])?;
    }
    finish(wtr)
}

pub fn export_merged_csv(records: &[UniverseRecord]) -> Result<String, ReportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(MERGED_COLUMNS)?;
    for r in records {
        wtr.write_record([
            r.symbol.as_str(),
            r.security_name.as_deref().unwrap_or(""),
            r.exchange.as_deref().unwrap_or(""),
            r.cik.map(|c| c.to_string()).unwrap_or_default().as_str(),
            opt_flag(r.listed_currently),
            opt_date(r.earliest_vendor_date).as_str(),
            opt_date(r.ipo_date).as_str(),
        ])?;
    }
    finish(wtr)
}

// ─── Files ──────────────────────────────────────────────────────────

/// Write `contents` to `dir/name`, creating `dir` first.
pub fn write_output(dir: &Path, name: &str, contents: &str) -> Result<PathBuf, ReportError> {
    fs::create_dir_all(dir).map_err(|source| ReportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(name);
    fs::write(&path, contents).map_err(|source| ReportError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

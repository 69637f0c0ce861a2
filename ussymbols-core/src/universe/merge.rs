//! Joins listings, identifiers, vendor dates and IPO dates into one table.

use super::ipo::IpoRow;
use super::listing::ListingRow;
use super::sec::CikMap;
use crate::vendor::DateTable;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One row of the merged table and of the universe cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniverseRecord {
    #[serde(rename = "Symbol")]
    pub symbol: String,
    #[serde(rename = "SecurityName")]
    pub security_name: Option<String>,
    #[serde(rename = "Exchange")]
    pub exchange: Option<String>,
    #[serde(rename = "CIK")]
    pub cik: Option<u64>,
    #[serde(rename = "ListedCurrently")]
    pub listed_currently: Option<bool>,
    #[serde(rename = "EarliestVendorDate")]
    pub earliest_vendor_date: Option<NaiveDate>,
    #[serde(rename = "IPODate")]
    pub ipo_date: Option<NaiveDate>,
}

impl UniverseRecord {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }
}

/// Listed rows with CIK and earliest vendor date attached.
pub fn build_records(
    listings: &[ListingRow],
    ciks: Option<&CikMap>,
    dates: &DateTable,
) -> Vec<UniverseRecord> {
    listings
        .iter()
        .map(|row| UniverseRecord {
            symbol: row.symbol.clone(),
            security_name: row.security_name.clone(),
            exchange: row.exchange.clone(),
            cik: ciks.and_then(|m| m.get(&row.symbol).copied()),
            listed_currently: Some(true),
            earliest_vendor_date: dates.get(&row.symbol).copied(),
            ipo_date: None,
        })
        .collect()
}

/// Attach IPO dates (first row per symbol) and append IPO-only symbols as
/// no-longer-listed records named after the company.
pub fn attach_ipo(records: &mut Vec<UniverseRecord>, ipos: &[IpoRow]) {
    let mut first: HashMap<&str, &IpoRow> = HashMap::new();
    for row in ipos {
        first.entry(row.symbol.as_str()).or_insert(row);
    }

    let listed: HashSet<String> = records.iter().map(|r| r.symbol.clone()).collect();
    for record in records.iter_mut() {
        if let Some(row) = first.get(record.symbol.as_str()) {
            record.ipo_date = Some(row.ipo_date);
        }
    }

    let mut appended = HashSet::new();
    for row in ipos {
        if listed.contains(&row.symbol) || !appended.insert(row.symbol.as_str()) {
            continue;
        }
        records.push(UniverseRecord {
            security_name: Some(row.company.clone()).filter(|c| !c.is_empty()),
            listed_currently: Some(false),
            ipo_date: Some(row.ipo_date),
            ..UniverseRecord::new(row.symbol.clone())
        });
    }
}

/// Records that still lack an earliest vendor date.
pub fn missing_dates(records: &[UniverseRecord]) -> Vec<&UniverseRecord> {
    records
        .iter()
        .filter(|r| r.earliest_vendor_date.is_none())
        .collect()
}

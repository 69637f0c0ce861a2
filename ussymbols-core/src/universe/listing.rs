//! Listing rows and the filters applied to them.

use super::SourceError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Security-name words that mark non-common instruments.
const NON_COMMON_TERMS: [&str; 18] = [
    "WARRANT",
    "WARRANTS",
    "WTS",
    "UNIT",
    "UNITS",
    "RIGHT",
    "RIGHTS",
    "PREFERRED",
    "PFD",
    "DEPOSITARY SHARE",
    "DEPOSITARY SHARES",
    "DEPOSITARY SHS",
    "NOTE",
    "NOTES",
    "BOND",
    "BONDS",
    "DEBENTURE",
    "DEBENTURES",
];

/// One currently listed security.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRow {
    #[serde(rename = "Symbol")]
    pub symbol: String,
    #[serde(rename = "SecurityName", default)]
    pub security_name: Option<String>,
    #[serde(rename = "Exchange", default)]
    pub exchange: Option<String>,
}

impl ListingRow {
    pub fn new(symbol: &str, security_name: Option<&str>, exchange: Option<&str>) -> Self {
        Self {
            symbol: symbol.trim().to_uppercase(),
            security_name: security_name
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
            exchange: exchange
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListingFilter {
    pub exclude_etf: bool,
    pub common_only: bool,
}

/// True when the security name marks a warrant, unit, right, preferred,
/// depositary share, note, bond or debenture. Terms match whole words, so
/// "UNITED" is not a unit.
pub fn is_non_common(security_name: &str) -> bool {
    let words: Vec<String> = security_name
        .to_uppercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect();

    NON_COMMON_TERMS.iter().any(|term| {
        let needle: Vec<&str> = term.split(' ').collect();
        words
            .windows(needle.len())
            .any(|w| w.iter().zip(&needle).all(|(a, b)| a == b))
    })
}

/// Drop non-common instruments when `common_only` is set.
pub fn apply_common_only(rows: Vec<ListingRow>, common_only: bool) -> Vec<ListingRow> {
    if !common_only {
        return rows;
    }
    rows.into_iter()
        .filter(|r| !r.security_name.as_deref().is_some_and(is_non_common))
        .collect()
}

/// Deduplicate by symbol, keeping the first row. Blank symbols are dropped.
pub fn dedupe(rows: Vec<ListingRow>) -> Vec<ListingRow> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|r| !r.symbol.is_empty() && seen.insert(r.symbol.clone()))
        .collect()
}

/// Read a user-supplied symbols CSV. `Symbol` is required; `SecurityName` and
/// `Exchange` are optional.
pub fn read_symbols_file(path: &Path) -> Result<Vec<ListingRow>, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    let col = |name: &str| headers.iter().position(|h| h == name);
    let symbol_col = col("Symbol").ok_or_else(|| SourceError::MissingColumn {
        path: path.to_path_buf(),
        column: "Symbol".into(),
    })?;
    let name_col = col("SecurityName");
    let exchange_col = col("Exchange");

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let Some(symbol) = record.get(symbol_col) else {
            continue;
        };
        rows.push(ListingRow::new(
            symbol,
            name_col.and_then(|i| record.get(i)),
            exchange_col.and_then(|i| record.get(i)),
        ));
    }
    Ok(dedupe(rows))
}

//! SEC ticker to CIK map (`company_tickers.json`).

use super::http_cache::HttpCache;
use super::SourceError;
use crate::enrich::Enrichment;
use serde::Deserialize;
use std::collections::BTreeMap;

const SEC_TICKERS_URL: &str = "https://www.sec.gov/files/company_tickers.json";
const CACHE_NAME: &str = "sec_company_tickers.json";
const HEADERS: [(&str, &str); 3] = [
    ("User-Agent", "Mozilla/5.0 (compatible; us-symbols-cli/1.0)"),
    ("Accept", "application/json, text/plain, */*"),
    ("Cache-Control", "no-cache"),
];

/// Upper-case ticker to Central Index Key.
pub type CikMap = BTreeMap<String, u64>;

#[derive(Debug, Deserialize)]
struct TickerEntry {
    cik_str: u64,
    ticker: String,
}

/// Parse the object-of-entries layout. When a ticker appears more than once
/// the entry with the lowest index key wins.
pub fn parse_company_tickers(body: &str) -> Result<CikMap, SourceError> {
    let entries: BTreeMap<String, TickerEntry> =
        serde_json::from_str(body).map_err(|source| SourceError::Json {
            what: CACHE_NAME.into(),
            source,
        })?;

    let mut ordered: Vec<(u64, TickerEntry)> = entries
        .into_iter()
        .map(|(k, v)| (k.parse().unwrap_or(u64::MAX), v))
        .collect();
    ordered.sort_by_key(|(k, _)| *k);

    let mut map = CikMap::new();
    for (_, entry) in ordered {
        let ticker = entry.ticker.trim().to_uppercase();
        if !ticker.is_empty() {
            map.entry(ticker).or_insert(entry.cik_str);
        }
    }
    Ok(map)
}

pub fn load_cik_map(cache: &HttpCache<'_>) -> Result<CikMap, SourceError> {
    let body = cache.get_text(SEC_TICKERS_URL, CACHE_NAME, &HEADERS)?;
    parse_company_tickers(&body)
}

/// CIK enrichment for a run. Failures are reported, not raised.
pub fn cik_enrichment(cache: &HttpCache<'_>) -> Enrichment<CikMap> {
    Enrichment::from_result(load_cik_map(cache))
}

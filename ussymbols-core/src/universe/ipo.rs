//! Nasdaq IPO calendar, fetched one month at a time.

use super::http_cache::HttpCache;
use super::SourceError;
use crate::config::IpoSettings;
use crate::enrich::Enrichment;
use crate::vendor::Pacer;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;

const MONTH_PAUSE: Duration = Duration::from_millis(500);
const HEADERS: [(&str, &str); 4] = [
    ("User-Agent", "Mozilla/5.0"),
    ("Accept", "application/json, text/plain, */*"),
    ("Origin", "https://www.nasdaq.com"),
    ("Referer", "https://www.nasdaq.com/"),
];

/// One priced IPO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpoRow {
    #[serde(rename = "Symbol")]
    pub symbol: String,
    #[serde(rename = "IPODate")]
    pub ipo_date: NaiveDate,
    #[serde(rename = "Company")]
    pub company: String,
}

fn month_url(year: i32, month: u32) -> String {
    format!("https://api.nasdaq.com/api/ipo/calendar?date={year}-{month:02}")
}

fn parse_ipo_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%m/%d/%Y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}

/// Every (year, month) from January of `start_year` through the end month,
/// inclusive. The end defaults to `today`.
pub fn month_range(settings: &IpoSettings, today: NaiveDate) -> Vec<(i32, u32)> {
    let end_year = settings.end_year.unwrap_or(today.year());
    let end_month = settings.end_month.unwrap_or(today.month());
    (settings.start_year..=end_year)
        .flat_map(|y| (1..=12).map(move |m| (y, m)))
        .filter(|&(y, m)| y < end_year || m <= end_month)
        .collect()
}

/// Priced rows of one month's response. Rows without a symbol or with an
/// unparsable date are dropped.
pub fn parse_month(body: &str) -> Result<Vec<IpoRow>, SourceError> {
    let json: Value = serde_json::from_str(body).map_err(|source| SourceError::Json {
        what: "IPO calendar".into(),
        source,
    })?;
    let rows = json["data"]["priced"]["rows"]
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or_default();

    let field = |row: &Value, keys: &[&str]| -> String {
        keys.iter()
            .filter_map(|k| row.get(*k).and_then(Value::as_str))
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or_default()
            .to_string()
    };

    Ok(rows
        .iter()
        .filter_map(|row| {
            let symbol = field(row, &["symbol", "proposedTickerSymbol"]).to_uppercase();
            let ipo_date = parse_ipo_date(&field(row, &["priced", "date"]))?;
            if symbol.is_empty() {
                return None;
            }
            Some(IpoRow {
                symbol,
                ipo_date,
                company: field(row, &["companyName"]),
            })
        })
        .collect())
}

/// Fetch the configured month range. A month that cannot be fetched or
/// parsed is skipped with a warning; the calendar is unavailable only when
/// no month succeeded.
pub fn load_ipo_calendar(
    cache: &HttpCache<'_>,
    settings: &IpoSettings,
    today: NaiveDate,
    pacer: &dyn Pacer,
) -> Result<Vec<IpoRow>, SourceError> {
    let months = month_range(settings, today);
    let mut seen = HashSet::new();
    let mut rows = Vec::new();
    let mut failed = 0usize;

    for (i, &(year, month)) in months.iter().enumerate() {
        let cache_name = format!("nasdaq_ipo/{year}-{month:02}.json");
        let parsed = cache
            .get_text(&month_url(year, month), &cache_name, &HEADERS)
            .and_then(|body| parse_month(&body));
        match parsed {
            Ok(month_rows) => rows.extend(
                month_rows
                    .into_iter()
                    .filter(|r| seen.insert((r.symbol.clone(), r.ipo_date))),
            ),
            Err(e) => {
                failed += 1;
                tracing::warn!(year, month, error = %e, "IPO month skipped");
            }
        }
        if i + 1 < months.len() {
            pacer.pause(MONTH_PAUSE);
        }
    }

    if !months.is_empty() && failed == months.len() {
        return Err(SourceError::Empty(format!(
            "all {failed} IPO calendar months failed"
        )));
    }
    tracing::info!(months = months.len(), failed, rows = rows.len(), "IPO calendar loaded");
    Ok(rows)
}

pub fn ipo_enrichment(
    cache: &HttpCache<'_>,
    settings: &IpoSettings,
    today: NaiveDate,
    pacer: &dyn Pacer,
) -> Enrichment<Vec<IpoRow>> {
    Enrichment::from_result(load_ipo_calendar(cache, settings, today, pacer))
}

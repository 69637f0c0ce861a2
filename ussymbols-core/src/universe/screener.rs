//! Nasdaq screener JSON, used when the symbol directories are unreachable.

use super::http_cache::HttpCache;
use super::listing::{apply_common_only, dedupe, ListingFilter, ListingRow};
use super::SourceError;
use serde_json::Value;

const EXCHANGES: [(&str, &str); 3] = [("nasdaq", "NASDAQ"), ("nyse", "NYSE"), ("amex", "AMEX")];

const HEADERS: [(&str, &str); 4] = [
    ("User-Agent", "Mozilla/5.0"),
    ("Accept", "application/json, text/plain, */*"),
    ("Origin", "https://www.nasdaq.com"),
    ("Referer", "https://www.nasdaq.com/"),
];

fn screener_url(exchange: &str) -> String {
    format!("https://api.nasdaq.com/api/screener/stocks?tableonly=true&limit=20000&exchange={exchange}")
}

fn looks_like_fund(name: &str) -> bool {
    let upper = name.to_uppercase();
    ["ETF", "ETN"]
        .iter()
        .any(|t| upper.contains(&format!(" {t}")) || upper.ends_with(t))
}

fn text_field<'v>(row: &'v Value, keys: &[&str]) -> Option<&'v str> {
    keys.iter()
        .filter_map(|k| row.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

/// Rows from one exchange's screener response. The payload has been seen
/// under both `data.rows` and `data.table.rows`.
pub fn parse_screener(
    body: &str,
    exchange_label: &str,
    filter: ListingFilter,
) -> Result<Vec<ListingRow>, SourceError> {
    let json: Value = serde_json::from_str(body).map_err(|source| SourceError::Json {
        what: format!("screener {exchange_label}"),
        source,
    })?;
    let data = &json["data"];
    let rows = data["rows"]
        .as_array()
        .or_else(|| data["table"]["rows"].as_array())
        .map(Vec::as_slice)
        .unwrap_or_default();

    let total = data["totalRecords"]
        .as_u64()
        .or_else(|| data["totalRecords"].as_str().and_then(|s| s.parse().ok()));
    if let Some(total) = total {
        if !rows.is_empty() && (rows.len() as u64) < total {
            tracing::warn!(
                exchange = exchange_label,
                returned = rows.len(),
                total,
                "screener results may be truncated"
            );
        }
    }

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(symbol) = text_field(row, &["symbol", "Symbol"]) else {
            continue;
        };
        let name = text_field(row, &["name", "companyName", "securityName"]);
        if filter.exclude_etf && name.is_some_and(looks_like_fund) {
            continue;
        }
        out.push(ListingRow::new(symbol, name, Some(exchange_label)));
    }
    Ok(out)
}

/// Current listings from the screener across NASDAQ, NYSE and AMEX.
/// Exchanges that fail are skipped; no rows at all is an error.
pub fn load_screener(
    cache: &HttpCache<'_>,
    filter: ListingFilter,
) -> Result<Vec<ListingRow>, SourceError> {
    let mut all = Vec::new();
    for (param, label) in EXCHANGES {
        let cache_name = format!("screener_{param}.json");
        let parsed = cache
            .get_text(&screener_url(param), &cache_name, &HEADERS)
            .and_then(|body| parse_screener(&body, label, filter));
        match parsed {
            Ok(rows) => all.extend(rows),
            Err(e) => tracing::warn!(exchange = label, error = %e, "screener exchange skipped"),
        }
    }
    if all.is_empty() {
        return Err(SourceError::Empty(
            "Nasdaq screener returned no rows; network may be blocked".into(),
        ));
    }
    Ok(apply_common_only(dedupe(all), filter.common_only))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::http_cache::fixtures::MapFetcher;

    #[test]
    fn reads_either_row_shape() {
        let flat = r#"{"data":{"rows":[{"symbol":"AAPL","name":"Apple Inc. Common Stock"}]}}"#;
        let nested = r#"{"data":{"table":{"rows":[{"symbol":" msft ","name":"Microsoft"}]}}}"#;

        let a = parse_screener(flat, "NASDAQ", ListingFilter::default()).unwrap();
        let b = parse_screener(nested, "NASDAQ", ListingFilter::default()).unwrap();
        assert_eq!(a[0].symbol, "AAPL");
        assert_eq!(b[0].symbol, "MSFT");
        assert_eq!(b[0].exchange.as_deref(), Some("NASDAQ"));
    }

    #[test]
    fn exclude_etf_uses_the_name() {
        let body = r#"{"data":{"rows":[
            {"symbol":"SPY","name":"SPDR S&P 500 ETF"},
            {"symbol":"XXX","name":"iPath Something ETN"},
            {"symbol":"IBM","name":"International Business Machines"}
        ]}}"#;
        let filter = ListingFilter {
            exclude_etf: true,
            common_only: false,
        };
        let rows = parse_screener(body, "NYSE", filter).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].symbol, "IBM");
    }

    #[test]
    fn missing_rows_yield_empty() {
        let rows = parse_screener(r#"{"data":null}"#, "AMEX", ListingFilter::default()).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn load_skips_failed_exchanges_and_errors_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MapFetcher::default().with(
            &screener_url("nyse"),
            r#"{"data":{"rows":[{"symbol":"IBM","name":"IBM"}],"totalRecords":"2"}}"#,
        );
        let cache = HttpCache::new(dir.path(), false, &fetcher);
        let rows = load_screener(&cache, ListingFilter::default()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].exchange.as_deref(), Some("NYSE"));

        let empty_dir = tempfile::tempdir().unwrap();
        let nothing = MapFetcher::default();
        let cache = HttpCache::new(empty_dir.path(), false, &nothing);
        assert!(matches!(
            load_screener(&cache, ListingFilter::default()),
            Err(SourceError::Empty(_))
        ));
    }
}

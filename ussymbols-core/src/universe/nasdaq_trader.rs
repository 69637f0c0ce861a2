//! Nasdaq Trader symbol directories.
//!
//! `nasdaqlisted.txt` and `otherlisted.txt` are pipe-delimited with a trailing
//! "File Creation Time" line. When the www host answers with HTML (blocked),
//! the ftp host serves the same files.

use super::http_cache::HttpCache;
use super::listing::{apply_common_only, dedupe, ListingFilter, ListingRow};
use super::SourceError;
use std::path::Path;

const NASDAQ_LISTED_URL: &str = "https://www.nasdaqtrader.com/dynamic/SymbolDirectory/nasdaqlisted.txt";
const OTHER_LISTED_URL: &str = "https://www.nasdaqtrader.com/dynamic/SymbolDirectory/otherlisted.txt";
const HEADERS: [(&str, &str); 2] = [
    ("User-Agent", "Mozilla/5.0 (compatible; us-symbols-cli/1.0)"),
    ("Accept", "text/plain, */*"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directory {
    NasdaqListed,
    OtherListed,
}

impl Directory {
    pub fn file_name(self) -> &'static str {
        match self {
            Directory::NasdaqListed => "nasdaqlisted.txt",
            Directory::OtherListed => "otherlisted.txt",
        }
    }

    fn url(self) -> &'static str {
        match self {
            Directory::NasdaqListed => NASDAQ_LISTED_URL,
            Directory::OtherListed => OTHER_LISTED_URL,
        }
    }

    fn symbol_column(self) -> &'static str {
        match self {
            Directory::NasdaqListed => "Symbol",
            Directory::OtherListed => "ACT Symbol",
        }
    }
}

/// otherlisted exchange code to a readable name.
pub fn exchange_name(code: &str) -> &'static str {
    match code.trim() {
        "A" => "AMEX",
        "N" => "NYSE",
        "P" => "ARCA",
        "Z" => "BATS",
        "V" => "IEX",
        _ => "NYSE/AMEX",
    }
}

/// Parse one directory file. Test issues are always dropped, ETFs when the
/// filter says so. The common-only filter is applied later on the combined set.
pub fn parse_directory(
    text: &str,
    directory: Directory,
    filter: ListingFilter,
) -> Result<Vec<ListingRow>, SourceError> {
    let lines: Vec<&str> = text
        .lines()
        .filter(|l| !l.contains("File Creation Time"))
        .collect();

    let looks_delimited = lines.iter().take(5).any(|l| l.contains('|'));
    if !looks_delimited {
        return Err(unparsable(directory, text));
    }

    let body = lines.join("\n");
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'|')
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());
    let headers = reader.headers()?.clone();
    let col = |name: &str| headers.iter().position(|h| h == name);

    let symbol_col = col(directory.symbol_column()).ok_or_else(|| unparsable(directory, text))?;
    let name_col = col("Security Name");
    let etf_col = col("ETF");
    let test_col = col("Test Issue");
    let exchange_col = col("Exchange");

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let flag = |i: Option<usize>| i.and_then(|i| record.get(i)).is_some_and(|v| v == "Y");

        if flag(test_col) || (filter.exclude_etf && flag(etf_col)) {
            continue;
        }
        let Some(symbol) = record.get(symbol_col).filter(|s| !s.is_empty()) else {
            continue;
        };
        let exchange = match directory {
            Directory::NasdaqListed => "NASDAQ",
            Directory::OtherListed => {
                exchange_name(exchange_col.and_then(|i| record.get(i)).unwrap_or(""))
            }
        };
        rows.push(ListingRow::new(
            symbol,
            name_col.and_then(|i| record.get(i)),
            Some(exchange),
        ));
    }
    Ok(rows)
}

fn unparsable(directory: Directory, text: &str) -> SourceError {
    SourceError::Unparsable {
        what: directory.file_name().to_string(),
        snippet: text.chars().take(200).collect(),
    }
}

fn combine(
    nasdaq: Vec<ListingRow>,
    other: Vec<ListingRow>,
    filter: ListingFilter,
) -> Vec<ListingRow> {
    let mut all = nasdaq;
    all.extend(other);
    apply_common_only(dedupe(all), filter.common_only)
}

/// Load one directory through the HTTP cache, falling back to the ftp host
/// when the cached or fetched body is not a directory file.
fn load_directory(
    cache: &HttpCache<'_>,
    directory: Directory,
    filter: ListingFilter,
) -> Result<Vec<ListingRow>, SourceError> {
    let text = cache.get_text(directory.url(), directory.file_name(), &HEADERS)?;
    match parse_directory(&text, directory, filter) {
        Ok(rows) => Ok(rows),
        Err(first) => {
            let alt_url = directory
                .url()
                .replace("www.nasdaqtrader.com", "ftp.nasdaqtrader.com");
            tracing::warn!(file = directory.file_name(), error = %first, "retrying from ftp host");
            let alt_text = cache.fetch_uncached(&alt_url, &HEADERS).map_err(|_| first)?;
            let rows = parse_directory(&alt_text, directory, filter)?;
            cache.store(directory.file_name(), &alt_text)?;
            Ok(rows)
        }
    }
}

/// Current US listings from Nasdaq Trader.
pub fn load_nasdaq_trader(
    cache: &HttpCache<'_>,
    filter: ListingFilter,
) -> Result<Vec<ListingRow>, SourceError> {
    let nasdaq = load_directory(cache, Directory::NasdaqListed, filter)?;
    let other = load_directory(cache, Directory::OtherListed, filter)?;
    Ok(combine(nasdaq, other, filter))
}

/// Same as [`load_nasdaq_trader`] from a local directory holding both files.
pub fn load_from_dir(dir: &Path, filter: ListingFilter) -> Result<Vec<ListingRow>, SourceError> {
    let read = |directory: Directory| -> Result<Vec<ListingRow>, SourceError> {
        let path = dir.join(directory.file_name());
        let bytes = std::fs::read(&path).map_err(|source| SourceError::Io { path, source })?;
        parse_directory(&String::from_utf8_lossy(&bytes), directory, filter)
    };
    let nasdaq = read(Directory::NasdaqListed)?;
    let other = read(Directory::OtherListed)?;
    Ok(combine(nasdaq, other, filter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::http_cache::fixtures::MapFetcher;

    const NASDAQ: &str = "Symbol|Security Name|Market Category|Test Issue|Financial Status|Round Lot Size|ETF|NextShares\n\
AAPL|Apple Inc. - Common Stock|Q|N|N|100|N|N\n\
QQQ|Invesco QQQ Trust, Series 1|G|N|N|100|Y|N\n\
ZAZZT|Tick Pilot Test Stock Class A Common Stock|Q|Y|N|100|N|N\n\
ABCDW|ABCD Acquisition Corp Warrant|G|N|N|100|N|N\n\
File Creation Time: 0415202517:01|||||||\n";

    const OTHER: &str = "ACT Symbol|Security Name|Exchange|CQS Symbol|ETF|Round Lot Size|Test Issue|NASDAQ Symbol\n\
BRK.B|Berkshire Hathaway Inc. Class B|N|BRK.B|N|100|N|BRK.B\n\
NLY^F|Annaly Capital 6.95% Preferred Series F|N|NLYpF|N|100|N|NLY-F\n\
SPY|SPDR S&P 500 ETF Trust|P|SPY|Y|100|N|SPY\n\
AAPL|Duplicate Apple|Q|AAPL|N|100|N|AAPL\n\
File Creation Time: 0415202517:01|||||||\n";

    #[test]
    fn parses_nasdaq_listed_and_drops_test_issues() {
        let rows = parse_directory(NASDAQ, Directory::NasdaqListed, ListingFilter::default()).unwrap();
        let symbols: Vec<&str> = rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAPL", "QQQ", "ABCDW"]);
        assert!(rows.iter().all(|r| r.exchange.as_deref() == Some("NASDAQ")));
    }

    #[test]
    fn exclude_etf_drops_etfs() {
        let filter = ListingFilter {
            exclude_etf: true,
            common_only: false,
        };
        let rows = parse_directory(OTHER, Directory::OtherListed, filter).unwrap();
        assert!(rows.iter().all(|r| r.symbol != "SPY"));
    }

    #[test]
    fn other_listed_maps_exchange_codes() {
        let rows = parse_directory(OTHER, Directory::OtherListed, ListingFilter::default()).unwrap();
        let spy = rows.iter().find(|r| r.symbol == "SPY").unwrap();
        assert_eq!(spy.exchange.as_deref(), Some("ARCA"));
        let aapl = rows.iter().find(|r| r.symbol == "AAPL").unwrap();
        assert_eq!(aapl.exchange.as_deref(), Some("NYSE/AMEX"));
    }

    #[test]
    fn html_is_unparsable() {
        let err = parse_directory("<html>blocked</html>", Directory::NasdaqListed, ListingFilter::default())
            .unwrap_err();
        assert!(matches!(err, SourceError::Unparsable { .. }));
    }

    #[test]
    fn combined_load_dedupes_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("nasdaqlisted.txt"), NASDAQ).unwrap();
        std::fs::write(dir.path().join("otherlisted.txt"), OTHER).unwrap();
        let filter = ListingFilter {
            exclude_etf: false,
            common_only: true,
        };

        let rows = load_from_dir(dir.path(), filter).unwrap();
        let symbols: Vec<&str> = rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAPL", "QQQ", "BRK.B", "SPY"]);
        assert_eq!(rows[0].security_name.as_deref(), Some("Apple Inc. - Common Stock"));
    }

    #[test]
    fn blocked_www_host_falls_back_to_ftp() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MapFetcher::default()
            .with(NASDAQ_LISTED_URL, "<html>Access Denied</html>")
            .with(
                "https://ftp.nasdaqtrader.com/dynamic/SymbolDirectory/nasdaqlisted.txt",
                NASDAQ,
            )
            .with(OTHER_LISTED_URL, OTHER);
        let cache = HttpCache::new(dir.path(), false, &fetcher);

        let rows = load_nasdaq_trader(&cache, ListingFilter::default()).unwrap();

        assert!(rows.iter().any(|r| r.symbol == "AAPL"));
        assert!(rows.iter().any(|r| r.symbol == "BRK.B"));
        let cached = std::fs::read_to_string(dir.path().join("nasdaqlisted.txt")).unwrap();
        assert!(cached.starts_with("Symbol|"));
    }
}

//! The universe cache: every symbol ever seen, with its best-known attributes.
//!
//! Each run folds its merged table into the previous file. Per symbol, name,
//! exchange, CIK and listed flag take the first non-empty value (previous
//! rows first), and both dates take the minimum.

use super::merge::UniverseRecord;
use crate::vendor::cache::{parse_cache_date, read_dates, save_dates, CacheError};
use crate::vendor::merge_min;
use crate::vendor::DateTable;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const COLUMNS: [&str; 7] = [
    "Symbol",
    "SecurityName",
    "Exchange",
    "CIK",
    "ListedCurrently",
    "EarliestVendorDate",
    "IPODate",
];

fn parse_cik(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    raw.parse::<u64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
            .map(|f| f as u64)
    })
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Read a universe cache file. Columns are looked up by name and cells are
/// parsed leniently: an unparsable cell is empty, not an error.
pub fn read_universe_cache(path: &Path) -> Result<Vec<UniverseRecord>, CacheError> {
    let csv_err = |source| CacheError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;
    let headers = reader.headers().map_err(csv_err)?.clone();
    let col = |name: &str| headers.iter().position(|h| h.trim() == name);
    let symbol_col = col("Symbol").ok_or_else(|| CacheError::Malformed {
        path: path.to_path_buf(),
        detail: "no Symbol column".into(),
    })?;
    let [name_col, exchange_col, cik_col, listed_col, vendor_col, ipo_col] = [
        "SecurityName",
        "Exchange",
        "CIK",
        "ListedCurrently",
        "EarliestVendorDate",
        "IPODate",
    ]
    .map(col);

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let cell = |i: Option<usize>| {
            i.and_then(|i| record.get(i))
                .map(str::trim)
                .filter(|s| !s.is_empty())
        };
        let Some(symbol) = cell(Some(symbol_col)) else {
            continue;
        };
        records.push(UniverseRecord {
            symbol: symbol.to_uppercase(),
            security_name: cell(name_col).map(String::from),
            exchange: cell(exchange_col).map(String::from),
            cik: cell(cik_col).and_then(parse_cik),
            listed_currently: cell(listed_col).and_then(parse_flag),
            earliest_vendor_date: cell(vendor_col).and_then(parse_cache_date),
            ipo_date: cell(ipo_col).and_then(parse_cache_date),
        });
    }
    Ok(records)
}

fn min_date<T: Ord + Copy>(a: Option<T>, b: Option<T>) -> Option<T> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, y) => x.or(y),
    }
}

/// Fold `previous` then `current` into one record per symbol, sorted by
/// symbol.
pub fn aggregate(previous: &[UniverseRecord], current: &[UniverseRecord]) -> Vec<UniverseRecord> {
    let mut by_symbol: BTreeMap<String, UniverseRecord> = BTreeMap::new();
    for rec in previous.iter().chain(current) {
        let symbol = rec.symbol.trim().to_uppercase();
        if symbol.is_empty() {
            continue;
        }
        let slot = by_symbol
            .entry(symbol.clone())
            .or_insert_with(|| UniverseRecord::new(symbol));
        if slot.security_name.is_none() {
            slot.security_name = rec.security_name.clone();
        }
        if slot.exchange.is_none() {
            slot.exchange = rec.exchange.clone();
        }
        slot.cik = slot.cik.or(rec.cik);
        slot.listed_currently = slot.listed_currently.or(rec.listed_currently);
        slot.earliest_vendor_date = min_date(slot.earliest_vendor_date, rec.earliest_vendor_date);
        slot.ipo_date = min_date(slot.ipo_date, rec.ipo_date);
    }
    by_symbol.into_values().collect()
}

/// Atomically write `records` with the universe cache header.
pub fn write_universe_cache(path: &Path, records: &[UniverseRecord]) -> Result<(), CacheError> {
    let io_err = |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let tmp_path = path.with_extension("csv.tmp");
    let csv_err = |source| CacheError::Csv {
        path: tmp_path.clone(),
        source,
    };
    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&tmp_path)
            .map_err(csv_err)?;
        writer.write_record(COLUMNS).map_err(csv_err)?;
        for rec in records {
            writer.serialize(rec).map_err(csv_err)?;
        }
        writer.flush().map_err(io_err)?;
    }
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        io_err(e)
    })
}

/// Fold this run's merged table into the universe cache at `path`.
///
/// A previous file that cannot be read is left untouched and the error is
/// returned, so history is never overwritten by a partial view.
pub fn update_universe_cache(
    path: &Path,
    current: &[UniverseRecord],
) -> Result<Vec<UniverseRecord>, CacheError> {
    let previous = if path.exists() {
        read_universe_cache(path)?
    } else {
        Vec::new()
    };
    let unified = aggregate(&previous, current);
    write_universe_cache(path, &unified)?;
    tracing::info!(symbols = unified.len(), path = %path.display(), "universe cache updated");
    Ok(unified)
}

/// Min-merge the universe cache's earliest dates into the vendor cache.
///
/// Returns the number of rows written, or `None` when there was nothing to
/// seed from. An unreadable vendor cache is an error and is not overwritten.
pub fn seed_vendor_cache(
    vendor_path: &Path,
    universe_path: &Path,
) -> Result<Option<usize>, CacheError> {
    if !universe_path.exists() {
        return Ok(None);
    }
    let from_universe: DateTable = read_universe_cache(universe_path)?
        .into_iter()
        .filter_map(|r| r.earliest_vendor_date.map(|d| (r.symbol, d)))
        .fold(DateTable::new(), |mut acc, (symbol, date)| {
            acc.entry(symbol)
                .and_modify(|d| *d = (*d).min(date))
                .or_insert(date);
            acc
        });
    if from_universe.is_empty() {
        return Ok(None);
    }

    let existing = if vendor_path.exists() {
        read_dates(vendor_path)?
    } else {
        DateTable::new()
    };
    let seeded = merge_min(&from_universe, &existing);
    save_dates(vendor_path, &seeded)?;
    tracing::info!(symbols = seeded.len(), "seeded vendor cache from universe cache");
    Ok(Some(seeded.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn rec(symbol: &str, name: Option<&str>, vendor: Option<NaiveDate>) -> UniverseRecord {
        UniverseRecord {
            security_name: name.map(String::from),
            earliest_vendor_date: vendor,
            ..UniverseRecord::new(symbol)
        }
    }

    #[test]
    fn aggregate_prefers_history_for_text_and_min_for_dates() {
        let previous = vec![
            rec("AAPL", Some("Apple Computer"), Some(d(1985, 1, 1))),
            rec("GONE", Some("Delisted Co"), Some(d(1999, 1, 1))),
        ];
        let current = vec![
            rec("aapl", Some("Apple Inc."), Some(d(1990, 1, 1))),
            UniverseRecord {
                cik: Some(320193),
                ..rec("AAPL", None, None)
            },
            rec("NEW", None, Some(d(2020, 1, 1))),
        ];

        let out = aggregate(&previous, &current);

        let symbols: Vec<&str> = out.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAPL", "GONE", "NEW"]);
        assert_eq!(out[0].security_name.as_deref(), Some("Apple Computer"));
        assert_eq!(out[0].cik, Some(320193));
        assert_eq!(out[0].earliest_vendor_date, Some(d(1985, 1, 1)));
        assert_eq!(out[1].security_name.as_deref(), Some("Delisted Co"));
    }

    #[test]
    fn aggregate_fills_missing_history() {
        let previous = vec![rec("AAPL", None, None)];
        let current = vec![rec("AAPL", Some("Apple Inc."), Some(d(1990, 1, 1)))];
        let out = aggregate(&previous, &current);
        assert_eq!(out[0].security_name.as_deref(), Some("Apple Inc."));
        assert_eq!(out[0].earliest_vendor_date, Some(d(1990, 1, 1)));
    }

    #[test]
    fn reads_lenient_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("universe_cache.csv");
        fs::write(
            &path,
            "Symbol,SecurityName,Exchange,CIK,ListedCurrently,EarliestVendorDate,IPODate\n\
             aapl,Apple Inc.,NASDAQ,320193.0,True,1985-01-01,\n\
             BRK-B,,NYSE,,False,1996-05-01 00:00:00,garbage\n\
             ,Nameless,,,,,\n",
        )
        .unwrap();

        let records = read_universe_cache(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].symbol, "AAPL");
        assert_eq!(records[0].cik, Some(320193));
        assert_eq!(records[0].listed_currently, Some(true));
        assert_eq!(records[1].security_name, None);
        assert_eq!(records[1].listed_currently, Some(false));
        assert_eq!(records[1].earliest_vendor_date, Some(d(1996, 5, 1)));
        assert_eq!(records[1].ipo_date, None);
    }

    #[test]
    fn update_round_trips_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/universe_cache.csv");

        update_universe_cache(&path, &[rec("AAPL", Some("Apple"), Some(d(1990, 1, 1)))]).unwrap();
        let unified =
            update_universe_cache(&path, &[rec("AAPL", None, Some(d(1985, 1, 1))), rec("MSFT", None, None)])
                .unwrap();

        assert_eq!(unified.len(), 2);
        let reread = read_universe_cache(&path).unwrap();
        assert_eq!(reread, unified);
        assert_eq!(reread[0].security_name.as_deref(), Some("Apple"));
        assert_eq!(reread[0].earliest_vendor_date, Some(d(1985, 1, 1)));
    }

    #[test]
    fn empty_update_still_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("u.csv");
        update_universe_cache(&path, &[]).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim(), COLUMNS.join(","));
    }

    #[test]
    fn unreadable_previous_file_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("u.csv");
        fs::write(&path, "Ticker,Name\nAAPL,Apple\n").unwrap();
        assert!(update_universe_cache(&path, &[rec("AAPL", None, None)]).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "Ticker,Name\nAAPL,Apple\n");
    }

    #[test]
    fn seeding_min_merges_into_vendor_cache() {
        let dir = tempfile::tempdir().unwrap();
        let universe = dir.path().join("universe.csv");
        let vendor = dir.path().join("vendor/earliest.csv");
        write_universe_cache(
            &universe,
            &[
                rec("AAPL", None, Some(d(1980, 12, 1))),
                rec("MSFT", None, Some(d(1986, 3, 1))),
                rec("NODATE", None, None),
            ],
        )
        .unwrap();
        let existing: DateTable = [
            ("AAPL".to_string(), d(1985, 1, 1)),
            ("IBM".to_string(), d(1962, 1, 1)),
        ]
        .into_iter()
        .collect();
        save_dates(&vendor, &existing).unwrap();

        assert_eq!(seed_vendor_cache(&vendor, &universe).unwrap(), Some(3));
        let seeded = read_dates(&vendor).unwrap();
        assert_eq!(seeded.get("AAPL"), Some(&d(1980, 12, 1)));
        assert_eq!(seeded.get("IBM"), Some(&d(1962, 1, 1)));
        assert_eq!(seeded.get("MSFT"), Some(&d(1986, 3, 1)));
    }

    #[test]
    fn seeding_without_universe_cache_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let vendor = dir.path().join("v.csv");
        assert_eq!(
            seed_vendor_cache(&vendor, &dir.path().join("absent.csv")).unwrap(),
            None
        );
        assert!(!vendor.exists());
    }
}

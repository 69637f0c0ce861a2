//! us-symbols: build the US symbol universe with earliest vendor dates.
//!
//! One run:
//! 1. load listings (symbols file, local directory, Nasdaq Trader, screener)
//! 2. attach SEC CIKs
//! 3. seed and sample-check the vendor date cache
//! 4. resolve earliest vendor dates through the cache
//! 5. attach IPO dates
//! 6. write the output tables and fold them into the universe cache

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use ussymbols_core::config::RunConfig;
use ussymbols_core::enrich::Enrichment;
use ussymbols_core::report::{self, IPO_FILE, LISTINGS_FILE, MERGED_FILE, MISSING_FILE, VENDOR_DATES_FILE};
use ussymbols_core::universe::{
    cache as universe_cache, ipo, listing, merge, nasdaq_trader, screener, sec, HttpCache,
    ListingFilter, ListingRow, ReqwestFetcher, UniverseRecord,
};
use ussymbols_core::vendor::{
    load_dates, resolve_with_cache, validate_sample, write_mismatch_report, CircuitBreaker,
    LoadStatus, LogProgress, Resolver, ThreadPacer, YahooProvider,
};

#[derive(Parser)]
#[command(
    name = "us-symbols",
    about = "Build a US equity symbol universe with earliest vendor dates"
)]
struct Cli {
    /// TOML run configuration. Flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Drop ETFs from the listings.
    #[arg(long, default_value_t = false)]
    exclude_etf: bool,

    /// Keep only common stock (drop warrants, units, rights, preferreds, notes...).
    #[arg(long, default_value_t = false)]
    common_only: bool,

    /// Fetch the Nasdaq IPO calendar and attach IPO dates.
    #[arg(long, default_value_t = false)]
    with_ipo: bool,

    #[arg(long)]
    ipo_start_year: Option<i32>,

    /// Defaults to the current year.
    #[arg(long)]
    ipo_end_year: Option<i32>,

    /// Defaults to the current month.
    #[arg(long)]
    ipo_end_month: Option<u32>,

    /// Symbols per vendor batch request.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Seconds between vendor batches; also the backoff base.
    #[arg(long)]
    pause: Option<f64>,

    #[arg(long)]
    max_retries: Option<u32>,

    /// Refetch cached listing, SEC and IPO responses.
    #[arg(long, default_value_t = false)]
    refresh: bool,

    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Skip SEC CIK enrichment.
    #[arg(long, default_value_t = false)]
    no_sec: bool,

    /// CSV with a Symbol column (optional SecurityName, Exchange); overrides remote sources.
    #[arg(long)]
    symbols_file: Option<PathBuf>,

    /// Directory holding nasdaqlisted.txt and otherlisted.txt.
    #[arg(long)]
    nasdaq_dir: Option<PathBuf>,

    /// Earliest-date cache CSV.
    #[arg(long)]
    vendor_cache: Option<PathBuf>,

    /// Universe cache CSV.
    #[arg(long)]
    universe_cache: Option<PathBuf>,

    /// Refetch every symbol even when cached.
    #[arg(long, default_value_t = false)]
    force_recheck: bool,

    /// Debug logging (RUST_LOG takes precedence).
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    /// Fraction of cached universe symbols to re-check against the vendor.
    #[arg(long)]
    validate_cache_sample: Option<f64>,

    /// Minimum number of symbols to re-check.
    #[arg(long)]
    validate_cache_min: Option<usize>,

    #[arg(long)]
    validate_cache_output: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    skip_validate: bool,

    /// Seed for the validation sample.
    #[arg(long)]
    seed: Option<u64>,
}

impl Cli {
    /// File config (or defaults) with flags layered on top.
    fn resolve_config(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => RunConfig::default(),
        };

        let v = &mut config.vendor;
        if let Some(n) = self.batch_size {
            v.batch_size = n;
        }
        if let Some(p) = self.pause {
            v.pause_secs = p;
        }
        if let Some(r) = self.max_retries {
            v.max_retries = r;
        }

        let p = &mut config.paths;
        if let Some(dir) = &self.output_dir {
            p.output_dir = dir.clone();
        }
        if let Some(path) = &self.vendor_cache {
            p.vendor_cache = Some(path.clone());
        }
        if let Some(path) = &self.universe_cache {
            p.universe_cache = Some(path.clone());
        }

        let val = &mut config.validation;
        if let Some(f) = self.validate_cache_sample {
            val.sample_fraction = f;
        }
        if let Some(m) = self.validate_cache_min {
            val.min_sample = m;
        }
        if let Some(path) = &self.validate_cache_output {
            val.output = path.clone();
        }
        val.skip |= self.skip_validate;
        if self.seed.is_some() {
            val.seed = self.seed;
        }

        let l = &mut config.listings;
        l.exclude_etf |= self.exclude_etf;
        l.common_only |= self.common_only;
        if self.no_sec {
            l.with_sec = false;
        }

        let i = &mut config.ipo;
        i.enabled |= self.with_ipo;
        if let Some(y) = self.ipo_start_year {
            i.start_year = y;
        }
        if self.ipo_end_year.is_some() {
            i.end_year = self.ipo_end_year;
        }
        if self.ipo_end_month.is_some() {
            i.end_month = self.ipo_end_month;
        }

        config.validate().context("invalid configuration after applying flags")?;
        Ok(config)
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("us_symbols={level},ussymbols_core={level}").into()
            }),
        )
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = cli.resolve_config()?;
    run(&cli, &config)
}

fn load_listings(
    cli: &Cli,
    config: &RunConfig,
    http: &HttpCache<'_>,
) -> Result<Vec<ListingRow>> {
    let filter = ListingFilter {
        exclude_etf: config.listings.exclude_etf,
        common_only: config.listings.common_only,
    };

    if let Some(path) = &cli.symbols_file {
        return listing::read_symbols_file(path)
            .with_context(|| format!("failed to read symbols file {}", path.display()));
    }
    if let Some(dir) = &cli.nasdaq_dir {
        return nasdaq_trader::load_from_dir(dir, filter)
            .with_context(|| format!("failed to load directories from {}", dir.display()));
    }

    match nasdaq_trader::load_nasdaq_trader(http, filter) {
        Ok(rows) => Ok(rows),
        Err(e) => {
            tracing::warn!(error = %e, "Nasdaq Trader fetch failed, falling back to the screener");
            screener::load_screener(http, filter).context(
                "screener fallback also failed; use --nasdaq-dir with local \
                 nasdaqlisted.txt/otherlisted.txt, or --symbols-file",
            )
        }
    }
}

/// Re-check a random sample of cached dates against the vendor.
fn validate_vendor_cache(
    config: &RunConfig,
    resolver: &Resolver<'_>,
    vendor_cache: &Path,
    universe: &[String],
) {
    let (cached, status) = load_dates(vendor_cache);
    if let LoadStatus::Corrupt { reason } = status {
        tracing::warn!(%reason, "validation skipped: vendor cache unreadable");
        return;
    }

    let val = &config.validation;
    let mut rng = match val.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let report = validate_sample(
        resolver,
        &cached,
        universe,
        val.sample_fraction,
        val.min_sample,
        &mut rng,
    );
    if report.candidates == 0 {
        return;
    }
    match write_mismatch_report(&val.output, &report.mismatches) {
        Ok(()) if !report.is_clean() => tracing::warn!(
            mismatches = report.mismatches.len(),
            path = %val.output.display(),
            "vendor cache mismatches found"
        ),
        Ok(()) => {}
        Err(e) => tracing::warn!(error = %e, "failed to write mismatch report"),
    }
}

fn run(cli: &Cli, config: &RunConfig) -> Result<()> {
    let out_dir = &config.paths.output_dir;
    let fetcher = ReqwestFetcher::new(Duration::from_secs(config.vendor.request_timeout_secs))?;
    let http = HttpCache::new(&config.paths.cache_dir, cli.refresh, &fetcher);

    // Listings
    tracing::info!("loading US listings");
    let listings = load_listings(cli, config, &http)?;
    if listings.is_empty() {
        bail!("no symbols loaded; nothing to do");
    }
    report::write_output(out_dir, LISTINGS_FILE, &report::export_listings_csv(&listings)?)
        .context("failed to write listings")?;

    // SEC CIK
    let ciks = if config.listings.with_sec {
        match sec::cik_enrichment(&http) {
            Enrichment::Available(map) => Some(map),
            Enrichment::Unavailable { reason } => {
                tracing::warn!(%reason, "SEC CIK map unavailable, continuing without CIKs");
                None
            }
        }
    } else {
        None
    };
    tracing::info!(symbols = listings.len(), "symbols loaded");

    // Vendor
    let breaker = Arc::new(CircuitBreaker::for_vendor());
    let provider = YahooProvider::new(Arc::clone(&breaker), &config.vendor)?;
    let pacer = ThreadPacer;
    let progress = LogProgress;
    let resolver = Resolver::new(&provider, &pacer, config.vendor.clone()).with_progress(&progress);
    let universe: Vec<String> = listings.iter().map(|r| r.symbol.clone()).collect();

    let vendor_cache = config.paths.vendor_cache.as_deref();
    if let (Some(vendor), Some(ucache), false) =
        (vendor_cache, config.paths.universe_cache.as_deref(), cli.force_recheck)
    {
        if let Err(e) = universe_cache::seed_vendor_cache(vendor, ucache) {
            tracing::warn!(error = %e, "seeding vendor cache from universe cache skipped");
        }
    }

    let val = &config.validation;
    if let Some(vendor) = vendor_cache {
        if !val.skip && !cli.force_recheck && val.sample_fraction > 0.0 && vendor.exists() {
            validate_vendor_cache(config, &resolver, vendor, &universe);
        }
    }

    tracing::info!("resolving earliest vendor dates");
    let resolved = resolve_with_cache(&resolver, &universe, vendor_cache, cli.force_recheck)
        .context("failed to write vendor cache")?;
    if let Some(res) = &resolved.resolution {
        tracing::info!(
            resolved = res.stats.resolved,
            unresolved = res.stats.unresolved,
            batches_failed = res.stats.batches_failed,
            fallbacks = res.stats.fallback_attempts,
            "vendor pass finished"
        );
        if res.stats.stopped_early {
            tracing::warn!(
                cooldown_secs = breaker.remaining_cooldown().as_secs(),
                "vendor blocked requests; rerun after the cooldown to fill the missing dates"
            );
        }
    }
    report::write_output(
        out_dir,
        VENDOR_DATES_FILE,
        &report::export_vendor_dates_csv(&resolved.dates)?,
    )?;

    let mut records: Vec<UniverseRecord> =
        merge::build_records(&listings, ciks.as_ref(), &resolved.dates);
    let missing = merge::missing_dates(&records);
    if !missing.is_empty() {
        tracing::info!(missing = missing.len(), "symbols without a vendor date");
        report::write_output(out_dir, MISSING_FILE, &report::export_missing_csv(&missing)?)?;
    }

    // IPO
    if config.ipo.enabled {
        tracing::info!("fetching Nasdaq IPO calendar");
        let today = Local::now().date_naive();
        match ipo::ipo_enrichment(&http, &config.ipo, today, &pacer) {
            Enrichment::Available(rows) => {
                report::write_output(out_dir, IPO_FILE, &report::export_ipo_csv(&rows)?)?;
                merge::attach_ipo(&mut records, &rows);
            }
            Enrichment::Unavailable { reason } => {
                tracing::warn!(%reason, "IPO calendar unavailable, continuing without IPO dates");
            }
        }
    }

    report::write_output(out_dir, MERGED_FILE, &report::export_merged_csv(&records)?)
        .context("failed to write merged table")?;
    tracing::info!(dir = %out_dir.display(), "outputs written");

    if let Some(path) = &config.paths.universe_cache {
        if let Err(e) = universe_cache::update_universe_cache(path, &records) {
            tracing::warn!(error = %e, "universe cache not updated");
        }
    }
    Ok(())
}

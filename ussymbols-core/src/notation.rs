//! Exchange-style to vendor-style ticker notation.
//!
//! Listing directories write share classes as `BRK.B`, preferreds as `NLY^F`
//! and warrants/rights/units as `ABC/WS`. The vendor spells all of these with
//! hyphens: `BRK-B`, `NLY-PF`, `ABC-WS`.

/// Warrant, rights and unit suffixes as they appear in the listing directories.
const DERIVATIVE_SUFFIXES: [&str; 5] = ["/WS", "/W", "/WT", "/RT", "/U"];

/// Rewrite an exchange-style ticker into the vendor's notation.
///
/// Pure and total. Rules, first match wins:
/// 1. Caret preferred: `NLY^F` -> `NLY-PF`; an empty suffix yields the base.
/// 2. Warrant/rights/unit suffix: every `/` and `.` becomes `-`.
/// 3. Share class: every `.` and `/` becomes `-`.
pub fn to_vendor_form(ticker: &str) -> String {
    let s = ticker.trim().to_uppercase();

    if let Some((base, suffix)) = s.split_once('^') {
        let suffix = suffix.trim();
        if suffix.is_empty() {
            return base.to_string();
        }
        return format!("{base}-P{suffix}");
    }

    if DERIVATIVE_SUFFIXES.iter().any(|suf| s.ends_with(suf)) {
        return s.replace(['/', '.'], "-");
    }

    s.replace(['.', '/'], "-")
}

/// Best-effort reverse of [`to_vendor_form`]: every `-` becomes `.`.
///
/// This is a heuristic, not an inverse. The caret rule (`NLY^F` -> `NLY-PF`
/// comes back as `NLY.PF`) and the warrant/rights/unit rule (`ABC/WS` comes
/// back as `ABC.WS`) lose the original separator. Tickers that genuinely
/// contain a hyphen on the exchange side are not supported.
pub fn from_vendor_form(vendor_symbol: &str) -> String {
    vendor_symbol.replace('-', ".")
}

/// Normalize a raw ticker the way every component keys symbols: trimmed and
/// uppercase. Returns `None` for blank input.
pub fn normalize_ticker(raw: &str) -> Option<String> {
    let t = raw.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_uppercase())
    }
}

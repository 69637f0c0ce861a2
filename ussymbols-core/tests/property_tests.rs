//! Property tests for notation, cache merging and sampling.
//!
//! Uses proptest to verify:
//! 1. Vendor notation is idempotent on exchange-style tickers
//! 2. Min-merge of date tables is commutative and idempotent
//! 3. Sample size stays within its bounds

use chrono::NaiveDate;
use proptest::prelude::*;
use ussymbols_core::notation::to_vendor_form;
use ussymbols_core::vendor::sampler::sample_size;
use ussymbols_core::vendor::{merge_min, DateTable};

// ── Strategies ──────────────────────────────────────────────────────

fn arb_ticker() -> impl Strategy<Value = String> {
    "[A-Z]{1,5}([./^][A-Z]{1,2})?"
}

fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (0i64..20_000).prop_map(|days| {
        NaiveDate::from_ymd_opt(1970, 1, 1).unwrap() + chrono::Duration::days(days)
    })
}

fn arb_table() -> impl Strategy<Value = DateTable> {
    prop::collection::btree_map("[A-E]{1,2}", arb_date(), 0..12)
}

// ── 1. Notation ─────────────────────────────────────────────────────

proptest! {
    #[test]
    fn vendor_form_is_idempotent(ticker in arb_ticker()) {
        let once = to_vendor_form(&ticker);
        prop_assert_eq!(to_vendor_form(&once), once.clone());
        prop_assert!(!once.contains(['.', '/', '^']));
    }
}

// ── 2. Cache merge ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn merge_min_is_commutative(a in arb_table(), b in arb_table()) {
        prop_assert_eq!(merge_min(&a, &b), merge_min(&b, &a));
    }

    #[test]
    fn merge_min_is_idempotent(a in arb_table(), b in arb_table()) {
        let once = merge_min(&a, &b);
        prop_assert_eq!(merge_min(&once, &b), once.clone());
        prop_assert_eq!(merge_min(&a, &a), a);
    }

    #[test]
    fn merge_min_never_raises_a_date(a in arb_table(), b in arb_table()) {
        let merged = merge_min(&a, &b);
        for (symbol, date) in &merged {
            if let Some(x) = a.get(symbol) {
                prop_assert!(date <= x);
            }
            if let Some(y) = b.get(symbol) {
                prop_assert!(date <= y);
            }
        }
        prop_assert_eq!(merged.len(), a.keys().chain(b.keys()).collect::<std::collections::BTreeSet<_>>().len());
    }
}

// ── 3. Sampling ─────────────────────────────────────────────────────

proptest! {
    #[test]
    fn sample_size_is_bounded(n in 0usize..5_000, fraction in 0.0f64..=1.0, min in 0usize..100) {
        let k = sample_size(n, fraction, min);
        prop_assert!(k <= n);
        prop_assert!(k >= min.min(n));
    }
}

#[test]
fn sample_size_examples() {
    assert_eq!(sample_size(500, 0.05, 20), 25);
    assert_eq!(sample_size(10, 0.05, 20), 10);
}

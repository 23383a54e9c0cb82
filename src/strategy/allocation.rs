//! Budget allocation across pairs.
//!
//! Two passes: a weighted split of the base budget, then an optional boost
//! for dip-flagged pairs under a hard cap. Both passes hand every rounding
//! remainder to the last pair in iteration order, so the output totals are
//! exact for any input, never off by a yen.

use std::collections::HashMap;

use crate::types::{PairAllocation, PairWeight};

/// Split `total_jpy` across pairs by normalized weight.
///
/// Pairs are processed in slice order; every pair but the last gets
/// `floor(total * weight / weight_sum)` and the last gets the remainder,
/// which makes the allocation sum exactly `total_jpy`. A non-positive
/// weight sum falls back to an equal split.
pub fn allocate(weights: &[PairWeight], total_jpy: i64) -> Vec<PairAllocation> {
    if weights.is_empty() {
        return Vec::new();
    }

    let sum: f64 = weights.iter().map(|w| w.weight).sum();
    let n = weights.len();

    let norm = |w: f64| -> f64 {
        if sum <= 0.0 {
            1.0 / n as f64
        } else {
            w / sum
        }
    };

    let mut allocs = Vec::with_capacity(n);
    let mut assigned: i64 = 0;
    for (i, w) in weights.iter().enumerate() {
        let jpy = if i < n - 1 {
            let j = (total_jpy as f64 * norm(w.weight)) as i64;
            assigned += j;
            j
        } else {
            total_jpy - assigned
        };
        allocs.push(PairAllocation::new(&w.pair, jpy));
    }
    allocs
}

/// Boost dip-flagged pairs from a shared extra budget.
///
/// The adjusted total is `min(floor(base_total * multiplier), cap_total)`;
/// the difference over `base_total` is distributed among flagged pairs in
/// proportion to their base allocation (equal split when their base sum is
/// zero), remainder to the last flagged pair. Returns the base allocation
/// unchanged when `base_total <= 0`, `multiplier <= 1.0`, nothing is
/// flagged, or the cap leaves no extra.
pub fn apply_dip(
    dip_flags: &HashMap<String, bool>,
    allocs: &[PairAllocation],
    base_total: i64,
    multiplier: f64,
    cap_total: i64,
) -> Vec<PairAllocation> {
    let base: Vec<PairAllocation> = allocs.to_vec();
    if base_total <= 0 || multiplier <= 1.0 {
        return base;
    }

    let target_total = ((base_total as f64 * multiplier) as i64).min(cap_total);
    let extra = target_total - base_total;
    if extra <= 0 {
        return base;
    }

    let dips: Vec<usize> = base
        .iter()
        .enumerate()
        .filter(|(_, a)| dip_flags.get(&a.pair).copied().unwrap_or(false))
        .map(|(i, _)| i)
        .collect();
    if dips.is_empty() {
        return base;
    }

    let mut result = base;
    let dip_base_sum: i64 = dips.iter().map(|&i| result[i].jpy).sum();

    if dip_base_sum <= 0 {
        // Equal split, remainder to the last flagged pair.
        let n = dips.len() as i64;
        let (q, r) = (extra / n, extra % n);
        for (pos, &i) in dips.iter().enumerate() {
            result[i].jpy += q;
            if pos == dips.len() - 1 {
                result[i].jpy += r;
            }
        }
        return result;
    }

    // Proportional to each flagged pair's share of the flagged base sum.
    let mut assigned: i64 = 0;
    for (pos, &i) in dips.iter().enumerate() {
        if pos < dips.len() - 1 {
            let share = result[i].jpy as f64 / dip_base_sum as f64;
            let add = (extra as f64 * share) as i64;
            result[i].jpy += add;
            assigned += add;
        } else {
            result[i].jpy += extra - assigned;
        }
    }
    result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(entries: &[(&str, f64)]) -> Vec<PairWeight> {
        entries.iter().map(|(p, w)| PairWeight::new(p, *w)).collect()
    }

    fn flags(entries: &[(&str, bool)]) -> HashMap<String, bool> {
        entries
            .iter()
            .map(|(p, f)| (p.to_string(), *f))
            .collect()
    }

    fn total(allocs: &[PairAllocation]) -> i64 {
        allocs.iter().map(|a| a.jpy).sum()
    }

    // ---- allocate --------------------------------------------------------

    #[test]
    fn test_allocate_basic_split() {
        let a = allocate(&weights(&[("btc_jpy", 0.7), ("eth_jpy", 0.3)]), 10_000);
        assert_eq!(a[0], PairAllocation::new("btc_jpy", 7000));
        assert_eq!(a[1], PairAllocation::new("eth_jpy", 3000));
    }

    #[test]
    fn test_allocate_empty() {
        assert!(allocate(&[], 10_000).is_empty());
    }

    #[test]
    fn test_allocate_unnormalized_weights() {
        // 7:3 expressed as 70/30 allocates identically.
        let a = allocate(&weights(&[("btc_jpy", 70.0), ("eth_jpy", 30.0)]), 10_000);
        assert_eq!(a[0].jpy, 7000);
        assert_eq!(a[1].jpy, 3000);
    }

    #[test]
    fn test_allocate_zero_weight_sum_splits_equally() {
        let a = allocate(
            &weights(&[("a", 0.0), ("b", 0.0), ("c", 0.0)]),
            10_000,
        );
        assert_eq!(a[0].jpy, 3333);
        assert_eq!(a[1].jpy, 3333);
        assert_eq!(a[2].jpy, 3334); // remainder lands on the last pair
    }

    #[test]
    fn test_allocate_conserves_total() {
        let cases: Vec<(Vec<PairWeight>, i64)> = vec![
            (weights(&[("a", 0.333), ("b", 0.333), ("c", 0.334)]), 10_001),
            (weights(&[("a", 1.0), ("b", 2.0), ("c", 4.0)]), 9_999),
            (weights(&[("a", 0.1)]), 777),
            (weights(&[("a", 0.0), ("b", 5.0)]), 1),
            (weights(&[("a", 0.7), ("b", 0.3)]), 0),
        ];
        for (w, t) in cases {
            let a = allocate(&w, t);
            assert_eq!(total(&a), t, "weights={w:?} total={t}");
        }
    }

    #[test]
    fn test_allocate_is_deterministic() {
        let w = weights(&[("a", 0.123), ("b", 0.456), ("c", 0.421)]);
        assert_eq!(allocate(&w, 54_321), allocate(&w, 54_321));
    }

    // ---- apply_dip -------------------------------------------------------

    #[test]
    fn test_dip_all_extra_to_single_flagged_pair() {
        let base = vec![
            PairAllocation::new("btc_jpy", 7000),
            PairAllocation::new("eth_jpy", 3000),
        ];
        let out = apply_dip(
            &flags(&[("btc_jpy", true), ("eth_jpy", false)]),
            &base,
            7000,
            1.5,
            15_000,
        );
        // target = min(floor(7000 * 1.5), 15000) = 10500, extra 3500, all to btc.
        assert_eq!(out[0].jpy, 10_500);
        assert_eq!(out[1].jpy, 3000);
    }

    #[test]
    fn test_dip_noop_when_multiplier_at_most_one() {
        let base = vec![PairAllocation::new("btc_jpy", 7000)];
        let out = apply_dip(&flags(&[("btc_jpy", true)]), &base, 7000, 1.0, 20_000);
        assert_eq!(out, base);
    }

    #[test]
    fn test_dip_noop_when_base_total_nonpositive() {
        let base = vec![PairAllocation::new("btc_jpy", 0)];
        let out = apply_dip(&flags(&[("btc_jpy", true)]), &base, 0, 1.5, 20_000);
        assert_eq!(out, base);
    }

    #[test]
    fn test_dip_noop_without_flags() {
        let base = vec![
            PairAllocation::new("btc_jpy", 7000),
            PairAllocation::new("eth_jpy", 3000),
        ];
        let out = apply_dip(
            &flags(&[("btc_jpy", false), ("eth_jpy", false)]),
            &base,
            10_000,
            1.5,
            15_000,
        );
        assert_eq!(out, base);
    }

    #[test]
    fn test_dip_cap_limits_target() {
        let base = vec![
            PairAllocation::new("btc_jpy", 7000),
            PairAllocation::new("eth_jpy", 3000),
        ];
        let f = flags(&[("btc_jpy", true), ("eth_jpy", true)]);
        let out = apply_dip(&f, &base, 10_000, 2.0, 12_000);
        assert_eq!(total(&out), 12_000);

        // Cap at or below the base leaves everything unchanged.
        let out = apply_dip(&f, &base, 10_000, 2.0, 10_000);
        assert_eq!(out, base);
    }

    #[test]
    fn test_dip_proportional_distribution_with_exact_remainder() {
        let base = vec![
            PairAllocation::new("a", 6000),
            PairAllocation::new("b", 3000),
            PairAllocation::new("c", 1000),
        ];
        let f = flags(&[("a", true), ("b", true), ("c", false)]);
        // target = 15000, extra = 5000; flagged base sum = 9000.
        // a: floor(5000 * 6000/9000) = 3333, b gets the 1667 remainder.
        let out = apply_dip(&f, &base, 10_000, 1.5, 20_000);
        assert_eq!(out[0].jpy, 9333);
        assert_eq!(out[1].jpy, 4667);
        assert_eq!(out[2].jpy, 1000);
        assert_eq!(total(&out), 15_000);
    }

    #[test]
    fn test_dip_equal_split_when_flagged_base_is_zero() {
        let base = vec![
            PairAllocation::new("a", 0),
            PairAllocation::new("b", 0),
            PairAllocation::new("c", 10_000),
        ];
        let f = flags(&[("a", true), ("b", true), ("c", false)]);
        // target = 15000, extra = 5000 split 2500/2500 over a and b.
        let out = apply_dip(&f, &base, 10_000, 1.5, 20_000);
        assert_eq!(out[0].jpy, 2500);
        assert_eq!(out[1].jpy, 2500);
        assert_eq!(out[2].jpy, 10_000);
    }

    #[test]
    fn test_dip_equal_split_remainder_to_last_flagged() {
        let base = vec![
            PairAllocation::new("a", 0),
            PairAllocation::new("b", 0),
            PairAllocation::new("c", 0),
        ];
        let f = flags(&[("a", true), ("b", true), ("c", true)]);
        let out = apply_dip(&f, &base, 7, 2.0, 100);
        // target = 14, extra = 7 -> 2 + 2 + 3.
        assert_eq!(out[0].jpy, 2);
        assert_eq!(out[1].jpy, 2);
        assert_eq!(out[2].jpy, 3);
    }

    #[test]
    fn test_dip_total_never_exceeds_cap_or_multiplied_base() {
        let base = vec![
            PairAllocation::new("a", 3333),
            PairAllocation::new("b", 6667),
        ];
        for (mult, cap) in [(1.5, 100_000), (1.37, 12_000), (3.0, 11_111)] {
            let out = apply_dip(&flags(&[("a", true), ("b", true)]), &base, 10_000, mult, cap);
            let bound = ((10_000.0 * mult) as i64).min(cap);
            assert!(total(&out) <= bound, "mult={mult} cap={cap}");
        }
    }

    #[test]
    fn test_dip_is_deterministic() {
        let base = vec![
            PairAllocation::new("a", 5000),
            PairAllocation::new("b", 5000),
        ];
        let f = flags(&[("a", true), ("b", true)]);
        let x = apply_dip(&f, &base, 10_000, 1.5, 14_000);
        let y = apply_dip(&f, &base, 10_000, 1.5, 14_000);
        assert_eq!(x, y);
    }

    #[test]
    fn test_dip_ignores_flags_for_unknown_pairs() {
        let base = vec![PairAllocation::new("btc_jpy", 10_000)];
        let out = apply_dip(&flags(&[("xrp_jpy", true)]), &base, 10_000, 1.5, 15_000);
        assert_eq!(out, base);
    }
}

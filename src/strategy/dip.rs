//! Dip detection.
//!
//! A pair is "in a dip" when its 24h change sits at or below the negated
//! trigger threshold. The threshold is taken by absolute value, so both
//! `0.03` and `-0.03` in configuration mean "flag at -3% or worse".

use std::collections::HashMap;

/// Flag every pair whose 24h change is `<= -abs(threshold)`.
pub fn dip_flags(
    change24h_map: &HashMap<String, f64>,
    dip_threshold_abs: f64,
) -> HashMap<String, bool> {
    let threshold = -dip_threshold_abs.abs();
    change24h_map
        .iter()
        .map(|(pair, chg)| (pair.clone(), *chg <= threshold))
        .collect()
}

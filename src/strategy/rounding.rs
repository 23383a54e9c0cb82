//! Quantity rounding to exchange-legal units.
//!
//! The exchange accepts quantities of the form `min_size + k * size_step`.
//! Rounding is always downward; anything below `min_size` is unfillable and
//! reads as zero (the caller treats that as a skip, not an error).

use crate::types::PairSpec;

/// Additive tolerance absorbing binary-float representation error before
/// flooring to a step count.
pub const STEP_EPSILON: f64 = 1e-12;

/// Result precision: quantities are snapped to 12 decimal places to
/// suppress residual float noise.
const SNAP_SCALE: f64 = 1e12;

/// Round a raw quantity down to the largest legal quantity not above it.
///
/// Returns 0.0 when `raw_qty` is below the pair minimum. The result is
/// idempotent: rounding an already-rounded quantity changes nothing.
pub fn round_qty_down(spec: &PairSpec, raw_qty: f64) -> f64 {
    if raw_qty < spec.min_size {
        return 0.0;
    }
    // Steps are counted from min_size, which need not itself sit on a step
    // boundary from zero.
    let steps = ((raw_qty - spec.min_size + STEP_EPSILON) / spec.size_step).floor();
    let qty = spec.min_size + steps * spec.size_step;
    (qty * SNAP_SCALE).round() / SNAP_SCALE
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Budget strategy — allocation, dip reallocation, guards, and rounding.

pub mod allocation;
pub mod dip;
pub mod guards;
pub mod rounding;

pub use allocation::{allocate, apply_dip};
pub use dip::dip_flags;
pub use guards::{evaluate_pair_guard, GuardParams};
pub use rounding::round_qty_down;

//! The formulas coordinate factories can derive coordinates with.
//!
mod height;
mod pressure;

pub use height::{HybridHeight, HybridHeightFactory};
pub use pressure::{HybridPressure, HybridPressureFactory};

//! Hit calling and cross-strip aggregation.

pub mod counts;
pub mod hits;

pub use counts::{HitCount, hit_counts};
pub use hits::{AssayRecord, call_hits};

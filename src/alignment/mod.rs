//! Offset estimation modules
//!
//! From per-frame descriptor series to a single offset:
//! - Event maps (peak picking + decaying tents)
//! - Offset scanning per feature and resolution
//! - Multi-resolution fusion with Kalman smoothing
//! - Windowed consensus (mean-shift clustering)
//! - Fallback guard
//! - The [`pipeline::Aligner`] tying them together

pub mod axis;
pub mod consensus;
pub mod event_map;
pub mod fusion;
pub mod guard;
pub mod pipeline;
pub mod scanner;
pub mod smoother;

pub use pipeline::Aligner;

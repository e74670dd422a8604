//! Result aggregation modules
//!
//! - Result and status types
//! - Metadata and flags

pub mod metadata;
pub mod result;

//! Audio preprocessing modules
//!
//! This module prepares caller buffers for feature extraction:
//! - Normalization (standardization, duration truncation, z-scoring)
//! - Silence detection

pub mod normalization;
pub mod silence;

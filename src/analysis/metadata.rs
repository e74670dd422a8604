//! Alignment metadata structures

use serde::{Deserialize, Serialize};

use crate::config::ConsensusStrategy;
use crate::features::FeatureType;

/// Conditions worth surfacing alongside a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentFlag {
    /// Some error curves were empty or non-finite and were dropped
    CurvesDropped,
    /// An input was truncated to the configured maximum duration
    Truncated,
    /// The buffers differ in length by more than the scanned offset range
    LengthMismatch,
    /// Fewer windows than requested produced minima
    FewWindows,
}

/// Alignment metadata
///
/// Holds only values that are a deterministic function of the inputs and the
/// configuration; processing times are logged, not stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentMetadata {
    /// Algorithm version
    pub algorithm_version: String,

    /// Consensus strategy used
    pub strategy: ConsensusStrategy,

    /// Hop lengths analysed
    pub hop_lengths: Vec<usize>,

    /// Features that contributed to the fused curve
    pub features_used: Vec<FeatureType>,

    /// Error curves fused
    pub curves_fused: usize,

    /// Error curves dropped as unusable
    pub curves_dropped: usize,

    /// Windows analysed (windowed strategy only)
    pub windows_analyzed: usize,

    /// Windows retained for clustering (windowed strategy only)
    pub windows_retained: usize,

    /// Offset candidates clustered (windowed strategy only)
    pub candidates: usize,

    /// Best candidate before the fallback guard, in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_offset_ms: Option<f64>,

    /// Raw error at the best candidate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_error: Option<f64>,

    /// Raw error at offset 0
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_error: Option<f64>,

    /// Flags
    pub flags: Vec<AlignmentFlag>,

    /// Warnings (unusable input, fallbacks)
    pub warnings: Vec<String>,
}

impl Default for AlignmentMetadata {
    fn default() -> Self {
        Self {
            algorithm_version: env!("CARGO_PKG_VERSION").to_string(),
            strategy: ConsensusStrategy::GlobalArgmin,
            hop_lengths: vec![],
            features_used: vec![],
            curves_fused: 0,
            curves_dropped: 0,
            windows_analyzed: 0,
            windows_retained: 0,
            candidates: 0,
            candidate_offset_ms: None,
            candidate_error: None,
            baseline_error: None,
            flags: vec![],
            warnings: vec![],
        }
    }
}

impl AlignmentMetadata {
    /// Record a flag once
    pub fn flag(&mut self, flag: AlignmentFlag) {
        if !self.flags.contains(&flag) {
            self.flags.push(flag);
        }
    }
}

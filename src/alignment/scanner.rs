//! Offset scanning
//!
//! For every candidate offset `k` the reference series is compared with the
//! rendition series shifted by `k` frames. Both series are first truncated to
//! their common length `n` and the rendition index wraps around modulo `n`.
//!
//! # Algorithm
//!
//! ```text
//! error(k) = 1/|W| * Σ_{i ∈ W} cmp(ref[i], cand[(i + k) mod n])
//! ```
//!
//! where `W` is the whole overlap or an analysis window inside it, and `cmp`
//! is a squared difference (event maps) or a chroma comparison.

use crate::config::ChromaMatching;
use crate::error::AlignmentError;
use crate::features::chroma::{class_index, N_PITCH_CLASSES};
use crate::features::FeatureType;

use super::axis::OffsetRange;

/// How two aligned frames are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// `(a - b)²`
    SquaredDifference,
    /// 1 if the pitch classes differ, else 0
    ClassMismatch,
    /// Squared circular pitch class distance, normalized to [0, 1]
    CircularDistance,
}

impl Comparison {
    /// Comparison used for `feature`
    pub fn for_feature(feature: FeatureType, chroma: ChromaMatching) -> Self {
        match (feature.is_categorical(), chroma) {
            (false, _) => Comparison::SquaredDifference,
            (true, ChromaMatching::Exact) => Comparison::ClassMismatch,
            (true, ChromaMatching::Continuous) => Comparison::CircularDistance,
        }
    }

    #[inline]
    fn apply(self, a: f32, b: f32) -> f64 {
        match self {
            Comparison::SquaredDifference => {
                let d = a as f64 - b as f64;
                d * d
            }
            Comparison::ClassMismatch => {
                if class_index(a) == class_index(b) {
                    0.0
                } else {
                    1.0
                }
            }
            Comparison::CircularDistance => {
                let classes = N_PITCH_CLASSES as i64;
                let d = (class_index(a) as i64 - class_index(b) as i64).rem_euclid(classes);
                let d = d.min(classes - d) as f64 / (N_PITCH_CLASSES / 2) as f64;
                d * d
            }
        }
    }
}

/// Error as a function of offset, for one feature at one hop
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorCurve {
    /// Feature the curve was computed from
    pub feature: FeatureType,
    /// Hop length of the compared series
    pub hop_length: usize,
    /// Offsets scanned; `values[j]` belongs to offset `range.min + j`
    pub range: OffsetRange,
    /// First reference frame of the analysis window, `None` for a full scan
    pub window_start: Option<usize>,
    /// Mean comparison error per offset; empty if nothing could be compared
    pub values: Vec<f64>,
}

impl ErrorCurve {
    /// Error at offset 0
    pub fn baseline(&self) -> Option<f64> {
        self.values.get(self.range.zero_index()).copied()
    }

    /// True if the curve can take part in fusion
    pub fn is_usable(&self) -> bool {
        !self.values.is_empty() && self.values.iter().all(|v| v.is_finite())
    }

}

/// Error for every offset in `range`
///
/// # Arguments
///
/// * `reference` - Reference series
/// * `candidate` - Rendition series
/// * `range` - Offsets to scan, in frames
/// * `comparison` - Per-frame comparison
/// * `window` - Optional `[start, end)` restriction on reference frames
///
/// # Returns
///
/// One mean error per offset
///
/// # Errors
///
/// Returns `AlignmentError::ProcessingError` when the overlap (or the window
/// inside it) is empty.
pub fn scan_offsets(
    reference: &[f32],
    candidate: &[f32],
    range: OffsetRange,
    comparison: Comparison,
    window: Option<(usize, usize)>,
) -> Result<Vec<f64>, AlignmentError> {
    let n = reference.len().min(candidate.len());
    let (start, end) = match window {
        Some((s, e)) => (s.min(n), e.min(n)),
        None => (0, n),
    };
    if start >= end {
        return Err(AlignmentError::ProcessingError(format!(
            "nothing to compare in frames [{}, {}) of a {}-frame overlap",
            start, end, n
        )));
    }
    let count = (end - start) as f64;
    let reference = &reference[..n];
    let candidate = &candidate[..n];

    let values = range
        .offsets()
        .map(|k| {
            let shift = k.rem_euclid(n as i64) as usize;
            let mut sum = 0.0f64;
            for (i, &r) in reference.iter().enumerate().take(end).skip(start) {
                let mut j = i + shift;
                if j >= n {
                    j -= n;
                }
                sum += comparison.apply(r, candidate[j]);
            }
            sum / count
        })
        .collect();
    Ok(values)
}

/// Scan one feature pair into an [`ErrorCurve`]
///
/// A pair with nothing to compare yields an empty curve, which fusion drops.
pub fn scan(
    feature: FeatureType,
    hop_length: usize,
    reference: &[f32],
    candidate: &[f32],
    range: OffsetRange,
    comparison: Comparison,
    window: Option<(usize, usize)>,
) -> ErrorCurve {
    let values = match scan_offsets(reference, candidate, range, comparison, window) {
        Ok(values) => values,
        Err(e) => {
            log::debug!(
                "{} @ hop {}: {} (ref {} frames, rendition {} frames)",
                feature.name(),
                hop_length,
                e,
                reference.len(),
                candidate.len()
            );
            Vec::new()
        }
    };
    ErrorCurve {
        feature,
        hop_length,
        range,
        window_start: window.map(|(s, _)| s),
        values,
    }
}

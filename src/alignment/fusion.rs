//! Multi-resolution, multi-feature error curve fusion
//!
//! # Algorithm
//!
//! 1. Drop curves that are empty or contain non-finite values
//! 2. Normalize each curve: `(e - mean) / max(std, 1)`, times its feature weight
//! 3. Sum curves sharing a (feature, hop) pair (e.g. several windows)
//! 4. Project every curve onto the common offset axis by linear interpolation
//!    of its millisecond offsets
//! 5. Per feature, Kalman/RTS-smooth the projected resolutions into one curve
//! 6. Sum the per-feature curves
//!
//! Alongside the fused scores, a weight-averaged projection of the raw
//! (un-normalized) errors is kept; the fallback guard compares errors on that
//! scale.

use std::collections::BTreeMap;

use crate::config::FeatureWeights;
use crate::error::AlignmentError;
use crate::features::FeatureType;

use super::axis::{OffsetAxis, OffsetRange};
use super::scanner::ErrorCurve;
use super::smoother::smooth_observations;

/// Standard deviations below this are not scaled up
const MIN_NORMALIZATION_STD: f64 = 1.0;

/// Fusion parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionParams {
    /// Per-feature weights
    pub weights: FeatureWeights,
    /// Kalman process noise
    pub process_noise: f64,
    /// Kalman measurement noise
    pub measurement_noise: f64,
}

/// Fused curve on the common offset axis
#[derive(Debug, Clone, PartialEq)]
pub struct FusedCurve {
    /// Axis the curve is defined on
    pub axis: OffsetAxis,
    /// Fused, smoothed score per axis position (lower is better); empty if
    /// no curve was usable
    pub scores: Vec<f64>,
    /// Weight-averaged raw error per axis position
    pub raw: Vec<f64>,
    /// Features that contributed
    pub features: Vec<FeatureType>,
    /// Curves that took part
    pub curves_used: usize,
    /// Curves dropped as empty or non-finite
    pub curves_dropped: usize,
}

impl FusedCurve {
    /// True if no curve contributed
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Axis index of the lowest fused score; ties resolve to the first
    pub fn argmin(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (j, &v) in self.scores.iter().enumerate() {
            if best.map_or(true, |(_, b)| v < b) {
                best = Some((j, v));
            }
        }
        best.map(|(j, _)| j)
    }

    /// Raw error at a (possibly fractional) axis position
    pub fn raw_at(&self, position: f64) -> Option<f64> {
        if self.raw.is_empty() {
            return None;
        }
        Some(interpolate(&self.raw, position))
    }

    /// Raw error at offset 0
    pub fn baseline_error(&self) -> Option<f64> {
        self.raw.get(self.axis.zero_index()).copied()
    }
}

/// `(e - mean) / max(std, 1)` with population statistics
pub fn normalize_curve(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let scale = variance.sqrt().max(MIN_NORMALIZATION_STD);
    values.iter().map(|v| (v - mean) / scale).collect()
}

/// Linear interpolation at a fractional index, clamped to the ends
fn interpolate(values: &[f64], position: f64) -> f64 {
    let last = values.len() - 1;
    if position <= 0.0 {
        return values[0];
    }
    if position >= last as f64 {
        return values[last];
    }
    let lo = position.floor() as usize;
    let frac = position - lo as f64;
    values[lo] * (1.0 - frac) + values[lo + 1] * frac
}

/// Resample a curve scanned at `hop_length` onto `axis`
///
/// Axis positions beyond the curve's own range take its edge values.
pub fn project_onto_axis(
    values: &[f64],
    range: OffsetRange,
    hop_length: usize,
    axis: &OffsetAxis,
) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let ratio = axis.hop_length as f64 / hop_length as f64;
    (0..axis.len())
        .map(|j| {
            let axis_offset = axis.range.min as f64 + j as f64;
            let curve_offset = axis_offset * ratio;
            interpolate(values, curve_offset - range.min as f64)
        })
        .collect()
}

/// Running sums of the curves sharing one (feature, hop)
#[derive(Debug)]
struct CurveGroup {
    range: OffsetRange,
    normalized_sum: Vec<f64>,
    raw_sum: Vec<f64>,
    count: usize,
}

impl CurveGroup {
    fn new(range: OffsetRange, len: usize) -> Self {
        Self {
            range,
            normalized_sum: vec![0.0; len],
            raw_sum: vec![0.0; len],
            count: 0,
        }
    }

    /// Add one curve scaled by `weight`; it must share the group's offsets
    fn add(&mut self, curve: &ErrorCurve, weight: f64) -> Result<(), AlignmentError> {
        if self.range != curve.range || self.normalized_sum.len() != curve.values.len() {
            return Err(AlignmentError::ProcessingError(format!(
                "{} @ hop {}: curve over {:?} does not match group range {:?}",
                curve.feature.name(),
                curve.hop_length,
                curve.range,
                self.range
            )));
        }
        for (acc, v) in self.normalized_sum.iter_mut().zip(normalize_curve(&curve.values)) {
            *acc += weight * v;
        }
        for (acc, v) in self.raw_sum.iter_mut().zip(&curve.values) {
            *acc += v;
        }
        self.count += 1;
        Ok(())
    }
}

/// Fuse error curves into one score curve on `axis`
///
/// # Arguments
///
/// * `curves` - Error curves (any features, hops and windows)
/// * `axis` - Common offset axis
/// * `params` - Weights and smoother noise
///
/// # Returns
///
/// A [`FusedCurve`]; its `scores` are empty when no curve was usable.
pub fn fuse(curves: &[ErrorCurve], axis: &OffsetAxis, params: &FusionParams) -> FusedCurve {
    let mut groups: BTreeMap<(FeatureType, usize), CurveGroup> = BTreeMap::new();
    let mut used = 0usize;
    let mut dropped = 0usize;

    for curve in curves {
        let weight = params.weights.weight(curve.feature);
        if weight <= 0.0 {
            continue;
        }
        if !curve.is_usable() {
            dropped += 1;
            continue;
        }
        let group = groups
            .entry((curve.feature, curve.hop_length))
            .or_insert_with(|| CurveGroup::new(curve.range, curve.values.len()));
        match group.add(curve, weight) {
            Ok(()) => used += 1,
            Err(e) => {
                log::warn!("Fusion: dropping curve: {}", e);
                dropped += 1;
            }
        }
    }

    if dropped > 0 {
        log::debug!("Fusion: dropped {} unusable curves, {} used", dropped, used);
    }

    let mut per_feature: BTreeMap<FeatureType, Vec<Vec<f64>>> = BTreeMap::new();
    let mut raw = vec![0.0f64; axis.len()];
    let mut raw_weight = 0.0f64;

    for (&(feature, hop_length), group) in &groups {
        per_feature
            .entry(feature)
            .or_default()
            .push(project_onto_axis(&group.normalized_sum, group.range, hop_length, axis));

        let weight = params.weights.weight(feature);
        let mean_raw: Vec<f64> = group.raw_sum.iter().map(|v| v / group.count as f64).collect();
        for (acc, v) in raw
            .iter_mut()
            .zip(project_onto_axis(&mean_raw, group.range, hop_length, axis))
        {
            *acc += weight * v;
        }
        raw_weight += weight;
    }

    if per_feature.is_empty() {
        return FusedCurve {
            axis: *axis,
            scores: Vec::new(),
            raw: Vec::new(),
            features: Vec::new(),
            curves_used: used,
            curves_dropped: dropped,
        };
    }

    for v in raw.iter_mut() {
        *v /= raw_weight;
    }

    let mut scores = vec![0.0f64; axis.len()];
    for (feature, observations) in &per_feature {
        match smooth_observations(observations, params.process_noise, params.measurement_noise) {
            Ok(smoothed) => {
                for (acc, v) in scores.iter_mut().zip(smoothed) {
                    *acc += v;
                }
            }
            Err(e) => log::warn!("Fusion: {} left out: {}", feature.name(), e),
        }
    }

    FusedCurve {
        axis: *axis,
        scores,
        raw,
        features: per_feature.keys().copied().collect(),
        curves_used: used,
        curves_dropped: dropped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis() -> OffsetAxis {
        OffsetAxis {
            hop_length: 256,
            frame_ms: 256.0 * 1000.0 / 44100.0,
            range: OffsetRange::new(10, 30),
        }
    }

    fn params() -> FusionParams {
        FusionParams {
            weights: FeatureWeights::default(),
            process_noise: 0.05,
            measurement_noise: 1.0,
        }
    }

    /// V-shaped curve with its minimum at `best` (frames at `hop`)
    fn v_curve(feature: FeatureType, hop: usize, range: OffsetRange, best: i64) -> ErrorCurve {
        ErrorCurve {
            feature,
            hop_length: hop,
            range,
            window_start: None,
            values: range.offsets().map(|k| 1.0 + (k - best).abs() as f64 * 0.5).collect(),
        }
    }

    #[test]
    fn test_normalize_floor() {
        // std = 0.5 < 1: only centred
        let n = normalize_curve(&[1.0, 2.0]);
        assert_eq!(n, vec![-0.5, 0.5]);
        // std = 2: scaled
        let n = normalize_curve(&[0.0, 4.0]);
        assert_eq!(n, vec![-1.0, 1.0]);
        assert!(normalize_curve(&[]).is_empty());
    }

    #[test]
    fn test_projection_from_coarser_hop() {
        let axis = axis();
        // hop 512: axis offsets -10..=30 map to -5..=15
        let range = OffsetRange::new(5, 15);
        let values: Vec<f64> = range.offsets().map(|k| k as f64).collect();
        let projected = project_onto_axis(&values, range, 512, &axis);
        assert_eq!(projected.len(), axis.len());
        assert_eq!(projected[axis.zero_index()], 0.0);
        assert_eq!(projected[axis.zero_index() + 1], 0.5);
        assert_eq!(projected[axis.zero_index() + 20], 10.0);
    }

    #[test]
    fn test_fused_minimum_at_common_offset() {
        let axis = axis();
        // true offset: 8 axis frames = 4 frames at hop 512 = 2 at hop 1024
        let curves = vec![
            v_curve(FeatureType::OnsetEnergy, 256, OffsetRange::new(10, 30), 8),
            v_curve(FeatureType::OnsetEnergy, 512, OffsetRange::new(5, 15), 4),
            v_curve(FeatureType::SpectralFlux, 1024, OffsetRange::new(3, 7), 2),
        ];
        let fused = fuse(&curves, &axis, &params());
        assert_eq!(fused.curves_used, 3);
        assert_eq!(fused.features, vec![FeatureType::OnsetEnergy, FeatureType::SpectralFlux]);
        assert_eq!(fused.argmin(), axis.range.index_of(8));
        let best = fused.raw_at(fused.argmin().unwrap() as f64).unwrap();
        assert!(best < fused.baseline_error().unwrap());
    }

    #[test]
    fn test_unusable_curves_dropped() {
        let axis = axis();
        let mut bad = v_curve(FeatureType::CrestFactor, 256, OffsetRange::new(10, 30), 0);
        bad.values[3] = f64::NAN;
        let empty = ErrorCurve {
            values: Vec::new(),
            ..v_curve(FeatureType::Chroma, 256, OffsetRange::new(10, 30), 0)
        };
        let fused = fuse(&[bad, empty], &axis, &params());
        assert!(fused.is_empty());
        assert_eq!(fused.curves_dropped, 2);
        assert_eq!(fused.argmin(), None);

        let good = v_curve(FeatureType::OnsetEnergy, 256, OffsetRange::new(10, 30), 3);
        let fused = fuse(&[good], &axis, &params());
        assert_eq!(fused.argmin(), axis.range.index_of(3));
    }

    #[test]
    fn test_mismatched_range_in_group_dropped() {
        let axis = axis();
        let first = v_curve(FeatureType::OnsetEnergy, 256, OffsetRange::new(10, 30), 3);
        let other = v_curve(FeatureType::OnsetEnergy, 256, OffsetRange::new(5, 30), 3);

        let mut group = CurveGroup::new(first.range, first.values.len());
        assert!(group.add(&first, 1.0).is_ok());
        let err = group.add(&other, 1.0).unwrap_err();
        assert!(matches!(err, AlignmentError::ProcessingError(_)));
        assert_eq!(group.count, 1);

        let fused = fuse(&[first, other], &axis, &params());
        assert_eq!(fused.curves_used, 1);
        assert_eq!(fused.curves_dropped, 1);
        assert_eq!(fused.argmin(), axis.range.index_of(3));
    }
}

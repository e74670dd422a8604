//! Peak detection and event maps
//!
//! An event map replaces a descriptor series by a train of decaying "tents"
//! centred on its prominent peaks. Two recordings of the same performance
//! rarely agree on descriptor magnitudes, but they agree on *where* the
//! prominent events are; the tents make that agreement tolerant to a few
//! frames of jitter.
//!
//! # Algorithm
//!
//! 1. Find local maxima (`x[i] > x[i-1] && x[i] >= x[i+1]`, endpoints excluded)
//! 2. Compute each maximum's prominence
//! 3. Keep maxima whose prominence reaches the threshold; set them to 1.0
//! 4. Forward pass: `map[i] = max(map[i], map[i-1] * d)`
//! 5. Backward pass: `map[i] = max(map[i], map[i+1] * d)`
//!
//! # Example
//!
//! ```
//! use rendition_sync::alignment::event_map::{build_event_map, ProminenceThreshold};
//!
//! let series = vec![0.0, 0.0, 1.0, 0.0, 0.0];
//! let map = build_event_map(&series, ProminenceThreshold::Absolute(0.5), 0.5);
//! assert_eq!(map, vec![0.25, 0.5, 1.0, 0.5, 0.25]);
//! ```

use serde::{Deserialize, Serialize};

/// Quantile thresholds never drop below this fraction of the series range
const MIN_RELATIVE_PROMINENCE: f64 = 0.01;

/// Peak prominence threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProminenceThreshold {
    /// Fixed prominence in series units
    Absolute(f32),
    /// Quantile (0.0-1.0) of the prominences of all detected maxima
    Quantile(f32),
}

/// Indices of local maxima
///
/// A plateau contributes its first sample. Endpoints are never maxima.
pub fn find_local_maxima(signal: &[f64]) -> Vec<usize> {
    if signal.len() < 3 {
        return Vec::new();
    }
    (1..signal.len() - 1)
        .filter(|&i| signal[i] > signal[i - 1] && signal[i] >= signal[i + 1])
        .collect()
}

/// Prominence of each peak
///
/// From the peak, walk outwards on each side until a strictly higher sample or
/// the series boundary; the lowest value on that walk is the side's base. The
/// prominence is the peak height minus the higher of the two bases.
pub fn peak_prominences(signal: &[f64], peaks: &[usize]) -> Vec<f64> {
    peaks
        .iter()
        .map(|&p| {
            let height = signal[p];

            let mut left_min = height;
            for &v in signal[..p].iter().rev() {
                if v > height {
                    break;
                }
                left_min = left_min.min(v);
            }

            let mut right_min = height;
            for &v in &signal[p + 1..] {
                if v > height {
                    break;
                }
                right_min = right_min.min(v);
            }

            height - left_min.max(right_min)
        })
        .collect()
}

/// Resolve a threshold against the detected prominences
///
/// `Quantile(q)` picks the value at index `floor(len * q)` of the sorted
/// prominences (clamped to the last), floored at 1% of the series range.
pub fn resolve_threshold(threshold: ProminenceThreshold, prominences: &[f64], range: f64) -> f64 {
    match threshold {
        ProminenceThreshold::Absolute(x) => x as f64,
        ProminenceThreshold::Quantile(q) => {
            let floor = range * MIN_RELATIVE_PROMINENCE;
            if prominences.is_empty() {
                return floor;
            }
            let mut sorted = prominences.to_vec();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            let idx = ((sorted.len() as f64 * q as f64) as usize).min(sorted.len() - 1);
            sorted[idx].max(floor)
        }
    }
}

/// Peaks passing the prominence threshold, as (index, prominence), in index order
pub fn detect_peaks(series: &[f32], threshold: ProminenceThreshold) -> Vec<(usize, f64)> {
    let signal: Vec<f64> = series
        .iter()
        .map(|&v| if v.is_finite() { v as f64 } else { 0.0 })
        .collect();

    let maxima = find_local_maxima(&signal);
    if maxima.is_empty() {
        return Vec::new();
    }
    let prominences = peak_prominences(&signal, &maxima);

    let (lo, hi) = signal
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let limit = resolve_threshold(threshold, &prominences, hi - lo);

    let peaks: Vec<(usize, f64)> = maxima
        .into_iter()
        .zip(prominences)
        .filter(|&(_, prom)| prom > 0.0 && prom >= limit)
        .collect();

    log::debug!(
        "Detected {} peaks in {} frames (prominence >= {:.4})",
        peaks.len(),
        series.len(),
        limit
    );

    peaks
}

/// Spread unit impulses into symmetric decaying tents
///
/// `impulses` is modified in place; values are expected in [0, 1].
pub fn apply_decay(impulses: &mut [f32], decay: f32) {
    for i in 1..impulses.len() {
        impulses[i] = impulses[i].max(impulses[i - 1] * decay);
    }
    for i in (0..impulses.len().saturating_sub(1)).rev() {
        impulses[i] = impulses[i].max(impulses[i + 1] * decay);
    }
}

/// Build the event map of a descriptor series
///
/// # Arguments
///
/// * `series` - Descriptor values, one per frame
/// * `threshold` - Peak prominence threshold
/// * `decay` - Per-frame decay factor in (0, 1)
///
/// # Returns
///
/// A map of the same length with values in [0, 1]; all zeros when no peak
/// passes the threshold.
pub fn build_event_map(series: &[f32], threshold: ProminenceThreshold, decay: f32) -> Vec<f32> {
    let mut map = vec![0.0f32; series.len()];
    for (idx, _) in detect_peaks(series, threshold) {
        map[idx] = 1.0;
    }
    apply_decay(&mut map, decay);
    map
}

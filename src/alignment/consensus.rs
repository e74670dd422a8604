//! Windowed consensus: local minima, window ranking and mean-shift clustering
//!
//! A single global minimum is fragile when a recording contains sections that
//! match at the wrong offset (repeated choruses, long held notes). The
//! windowed strategy instead collects the local minima of many overlapping
//! windows and lets them vote.
//!
//! # Algorithm
//!
//! 1. Find local minima of each window's fused curve and their prominence
//! 2. Rank windows by their most prominent minimum and keep the top N
//! 3. Every minimum of a kept window becomes a candidate weighted by its
//!    prominence; an optional relative floor drops minima much shallower
//!    than the window's best
//! 4. Cluster all kept candidates along the offset axis with flat-kernel
//!    mean shift
//! 5. Score each cluster as `Σ (base_score + weight)`; the best cluster wins,
//!    ties going to the centroid closest to zero

use super::axis::OffsetAxis;
use super::event_map::{find_local_maxima, peak_prominences};

/// Mean-shift iteration cap
const MAX_ITERATIONS: usize = 300;

/// Relative movement (in bandwidths) below which mean shift has converged
const CONVERGENCE_TOLERANCE: f64 = 1e-3;

/// One offset candidate contributed by a window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetCandidate {
    /// Axis index of the local minimum
    pub position: usize,
    /// Offset of the minimum in milliseconds
    pub offset_ms: f64,
    /// Prominence of the minimum in its window's fused curve
    pub weight: f64,
    /// Window the candidate came from
    pub window: usize,
}

/// Local minima of one window
#[derive(Debug, Clone, PartialEq)]
pub struct WindowMinima {
    /// Window index
    pub window: usize,
    /// Prominence of the window's best minimum
    pub best_prominence: f64,
    /// Retained candidates
    pub candidates: Vec<OffsetCandidate>,
}

/// A group of candidates sharing one mode
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    /// Mode position on the offset axis (fractional index)
    pub centroid: f64,
    /// Mode offset in milliseconds
    pub centroid_ms: f64,
    /// Cluster score `Σ (base_score + weight)`
    pub score: f64,
    /// Members
    pub members: Vec<OffsetCandidate>,
}

/// Local minima of `scores` as (index, prominence)
///
/// Minima follow the local-maximum rule on the negated curve, so endpoints
/// are never minima.
pub fn local_minima(scores: &[f64]) -> Vec<(usize, f64)> {
    let negated: Vec<f64> = scores.iter().map(|v| -v).collect();
    let minima = find_local_maxima(&negated);
    let prominences = peak_prominences(&negated, &minima);
    minima.into_iter().zip(prominences).collect()
}

/// Candidates of one window, or `None` if it has no usable minimum
///
/// # Arguments
///
/// * `window` - Window index
/// * `scores` - The window's fused score curve
/// * `axis` - Offset axis the scores are defined on
/// * `min_relative_prominence` - Minima below this fraction of the window's
///   best prominence are dropped; 0 keeps them all
pub fn window_minima(
    window: usize,
    scores: &[f64],
    axis: &OffsetAxis,
    min_relative_prominence: f64,
) -> Option<WindowMinima> {
    let minima = local_minima(scores);
    let best = minima.iter().map(|m| m.1).fold(0.0f64, f64::max);
    if best <= 0.0 || !best.is_finite() {
        return None;
    }

    let floor = min_relative_prominence * best;
    let candidates = minima
        .into_iter()
        .filter(|&(_, prom)| prom >= floor)
        .map(|(position, prom)| OffsetCandidate {
            position,
            offset_ms: axis.index_to_ms(position),
            weight: prom,
            window,
        })
        .collect();

    Some(WindowMinima {
        window,
        best_prominence: best,
        candidates,
    })
}

/// Keep the `top_n` windows with the most prominent minima
///
/// Ties keep the earlier window; the result is in window order.
pub fn select_top_windows(mut windows: Vec<WindowMinima>, top_n: usize) -> Vec<WindowMinima> {
    windows.sort_by(|a, b| {
        b.best_prominence
            .partial_cmp(&a.best_prominence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.window.cmp(&b.window))
    });
    windows.truncate(top_n);
    windows.sort_by_key(|w| w.window);
    windows
}

/// Flat-kernel mean shift in one dimension
///
/// Every point seeds a search that repeatedly moves to the mean of the points
/// within `bandwidth`. Converged modes closer than `bandwidth` to a more
/// populated mode are merged into it.
///
/// # Returns
///
/// Modes sorted by population (descending), then position.
pub fn mean_shift_modes(points: &[f64], bandwidth: f64) -> Vec<f64> {
    let mut converged: Vec<(f64, usize)> = Vec::with_capacity(points.len());

    for &seed in points {
        let mut mode = seed;
        for _ in 0..MAX_ITERATIONS {
            let (sum, count) = points
                .iter()
                .filter(|&&p| (p - mode).abs() <= bandwidth)
                .fold((0.0, 0usize), |(s, c), &p| (s + p, c + 1));
            if count == 0 {
                break;
            }
            let next = sum / count as f64;
            let moved = (next - mode).abs();
            mode = next;
            if moved < CONVERGENCE_TOLERANCE * bandwidth {
                break;
            }
        }
        let population = points.iter().filter(|&&p| (p - mode).abs() <= bandwidth).count();
        converged.push((mode, population));
    }

    converged.sort_by(|a, b| {
        b.1.cmp(&a.1)
            .then(a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
    });

    let mut modes: Vec<f64> = Vec::new();
    for (mode, _) in converged {
        if modes.iter().all(|m| (m - mode).abs() >= bandwidth) {
            modes.push(mode);
        }
    }
    modes
}

/// Cluster candidates and rank the clusters
///
/// # Arguments
///
/// * `candidates` - Candidates from all retained windows
/// * `bandwidth` - Mean-shift bandwidth in axis frames
/// * `base_score` - Score added per member on top of its weight
/// * `axis` - Offset axis the positions refer to
///
/// # Returns
///
/// Clusters, best first: highest score, then centroid closest to zero, then
/// the lower centroid.
pub fn cluster_candidates(
    candidates: &[OffsetCandidate],
    bandwidth: f64,
    base_score: f64,
    axis: &OffsetAxis,
) -> Vec<Cluster> {
    if candidates.is_empty() {
        return Vec::new();
    }
    let points: Vec<f64> = candidates.iter().map(|c| c.position as f64).collect();
    let modes = mean_shift_modes(&points, bandwidth);

    let mut clusters: Vec<Cluster> = modes
        .iter()
        .map(|&centroid| Cluster {
            centroid,
            centroid_ms: axis.position_to_ms(centroid),
            score: 0.0,
            members: Vec::new(),
        })
        .collect();

    for (candidate, &p) in candidates.iter().zip(&points) {
        let mut nearest = 0;
        for (i, m) in modes.iter().enumerate() {
            if (m - p).abs() < (modes[nearest] - p).abs() {
                nearest = i;
            }
        }
        let cluster = &mut clusters[nearest];
        cluster.score += base_score + candidate.weight;
        cluster.members.push(*candidate);
    }

    clusters.retain(|c| !c.members.is_empty());

    let zero = axis.zero_index() as f64;
    clusters.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                (a.centroid - zero)
                    .abs()
                    .partial_cmp(&(b.centroid - zero).abs())
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then(a.centroid.partial_cmp(&b.centroid).unwrap_or(std::cmp::Ordering::Equal))
    });

    log::debug!(
        "Clustering: {} candidates -> {} clusters (best score {:.3})",
        candidates.len(),
        clusters.len(),
        clusters.first().map_or(0.0, |c| c.score)
    );

    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::axis::OffsetRange;

    fn axis() -> OffsetAxis {
        OffsetAxis {
            hop_length: 256,
            frame_ms: 256.0 * 1000.0 / 44100.0,
            range: OffsetRange::new(10, 60),
        }
    }

    fn candidate(position: usize, weight: f64, window: usize) -> OffsetCandidate {
        OffsetCandidate {
            position,
            offset_ms: axis().index_to_ms(position),
            weight,
            window,
        }
    }

    #[test]
    fn test_local_minima_prominence() {
        let scores = vec![3.0, 1.0, 2.0, 0.0, 4.0];
        let minima = local_minima(&scores);
        assert_eq!(minima.len(), 2);
        assert_eq!(minima[0].0, 1);
        assert!((minima[0].1 - 1.0).abs() < 1e-12);
        assert_eq!(minima[1].0, 3);
        assert!((minima[1].1 - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_window_minima_weighted_by_prominence() {
        let scores = vec![3.0, 1.0, 2.0, 0.0, 4.0];
        let w = window_minima(7, &scores, &axis(), 0.0).unwrap();
        assert_eq!(w.best_prominence, 3.0);
        assert_eq!(w.candidates, vec![candidate(1, 1.0, 7), candidate(3, 3.0, 7)]);

        assert!(window_minima(0, &[1.0, 2.0, 3.0], &axis(), 0.0).is_none());
    }

    #[test]
    fn test_window_minima_relative_floor() {
        let scores = vec![3.0, 1.0, 2.0, 0.0, 4.0];
        // the shallow minimum (1/3 of the best) falls below a 0.5 floor
        let w = window_minima(7, &scores, &axis(), 0.5).unwrap();
        assert_eq!(w.candidates, vec![candidate(3, 3.0, 7)]);
    }

    #[test]
    fn test_sharp_window_outweighs_flat_window() {
        let sharp = window_minima(0, &[2.0, -4.0, 2.0], &axis(), 0.0).unwrap();
        let flat = window_minima(1, &[0.1, 0.0, 0.1], &axis(), 0.0).unwrap();
        assert!(sharp.candidates[0].weight > flat.candidates[0].weight);
    }

    #[test]
    fn test_top_windows() {
        let make = |window, best_prominence| WindowMinima {
            window,
            best_prominence,
            candidates: Vec::new(),
        };
        let windows = vec![make(0, 1.0), make(1, 3.0), make(2, 2.0), make(3, 3.0)];
        let kept = select_top_windows(windows, 2);
        let ids: Vec<usize> = kept.iter().map(|w| w.window).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_mean_shift_two_groups() {
        let points = vec![10.0, 11.0, 12.0, 11.0, 40.0, 41.0];
        let modes = mean_shift_modes(&points, 3.0);
        assert_eq!(modes.len(), 2);
        assert!((modes[0] - 11.0).abs() < 1e-9);
        assert!((modes[1] - 40.5).abs() < 1e-9);
    }

    #[test]
    fn test_largest_cluster_wins() {
        // weights are raw prominences; one very prominent outlier loses to
        // three agreeing windows
        let candidates = vec![
            candidate(50, 2.4, 0),
            candidate(51, 1.1, 1),
            candidate(49, 0.7, 2),
            candidate(20, 5.0, 3),
        ];
        let clusters = cluster_candidates(&candidates, 3.0, 0.5, &axis());
        assert_eq!(clusters.len(), 2);
        assert!((clusters[0].centroid - 50.0).abs() < 1e-9);
        assert!((clusters[0].centroid_ms - axis().index_to_ms(50)).abs() < 1e-9);
        assert!((clusters[0].score - (1.5 + 4.2)).abs() < 1e-9);
        assert_eq!(clusters[0].members.len(), 3);
        assert!((clusters[1].score - 5.5).abs() < 1e-9);
    }

    #[test]
    fn test_tie_prefers_centroid_near_zero() {
        let candidates = vec![candidate(30, 1.0, 0), candidate(5, 1.0, 1)];
        let clusters = cluster_candidates(&candidates, 2.0, 0.5, &axis());
        assert_eq!(clusters.len(), 2);
        assert!((clusters[0].centroid - 5.0).abs() < 1e-9);
        assert!(cluster_candidates(&[], 2.0, 0.5, &axis()).is_empty());
    }
}

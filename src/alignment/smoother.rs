//! Kalman smoothing of error curves along the offset axis
//!
//! Each feature contributes one projected curve per resolution. They are
//! treated as noisy measurements of one underlying curve that follows a
//! random walk along the offset axis:
//!
//! ```text
//! x[j+1] = x[j] + w,   w ~ N(0, q)
//! z_h[j] = x[j] + v,   v ~ N(0, r)      (one z per resolution h)
//! ```
//!
//! A forward Kalman pass absorbs every resolution's measurement at each
//! position, then a Rauch-Tung-Striebel backward pass removes the lag of the
//! forward filter so minima stay where the measurements put them.

use crate::error::AlignmentError;

/// Random-walk state tracker
#[derive(Debug, Clone, Copy)]
struct RandomWalkKalman {
    state: f64,    // current estimate
    variance: f64, // estimation uncertainty
    q: f64,        // process noise
    r: f64,        // measurement noise
}

impl RandomWalkKalman {
    fn new(state: f64, q: f64, r: f64) -> Self {
        Self {
            state,
            variance: r,
            q,
            r,
        }
    }

    fn predict(&mut self) {
        self.variance += self.q;
    }

    fn update(&mut self, measurement: f64) {
        let gain = self.variance / (self.variance + self.r);
        self.state += gain * (measurement - self.state);
        self.variance *= 1.0 - gain;
    }
}

/// Smooth several equally long measurement sequences into one curve
///
/// # Arguments
///
/// * `observations` - One curve per resolution, all of the same length
/// * `process_noise` - Random-walk variance per axis step (q)
/// * `measurement_noise` - Variance of each resolution's measurement (r)
///
/// # Returns
///
/// The RTS-smoothed curve; empty if there are no observations.
///
/// # Errors
///
/// Returns `AlignmentError::NumericalError` if the observations are empty
/// curves or differ in length, or if the noise variances are not positive.
pub fn smooth_observations(
    observations: &[Vec<f64>],
    process_noise: f64,
    measurement_noise: f64,
) -> Result<Vec<f64>, AlignmentError> {
    let Some(first) = observations.first() else {
        return Ok(Vec::new());
    };
    let n = first.len();
    if n == 0 || observations.iter().any(|o| o.len() != n) {
        return Err(AlignmentError::NumericalError(format!(
            "Kalman smoother: observation lengths differ ({:?})",
            observations.iter().map(Vec::len).collect::<Vec<_>>()
        )));
    }
    if !(process_noise > 0.0 && measurement_noise > 0.0) {
        return Err(AlignmentError::NumericalError(format!(
            "Kalman smoother: noise variances must be > 0 (q = {}, r = {})",
            process_noise, measurement_noise
        )));
    }

    let initial = observations.iter().map(|o| o[0]).sum::<f64>() / observations.len() as f64;
    let mut filter = RandomWalkKalman::new(initial, process_noise, measurement_noise);

    let mut filtered = Vec::with_capacity(n);
    let mut filtered_var = Vec::with_capacity(n);
    let mut predicted_var = Vec::with_capacity(n);

    for j in 0..n {
        if j > 0 {
            filter.predict();
        }
        predicted_var.push(filter.variance);
        for obs in observations {
            filter.update(obs[j]);
        }
        filtered.push(filter.state);
        filtered_var.push(filter.variance);
    }

    // RTS backward pass; the prediction for j+1 is the filtered state at j
    let mut smoothed = filtered.clone();
    for j in (0..n - 1).rev() {
        let gain = filtered_var[j] / predicted_var[j + 1];
        smoothed[j] = filtered[j] + gain * (smoothed[j + 1] - filtered[j]);
    }

    Ok(smoothed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_curve_unchanged() {
        let obs = vec![vec![2.0; 20], vec![2.0; 20]];
        let s = smooth_observations(&obs, 0.05, 1.0).unwrap();
        assert_eq!(s.len(), 20);
        assert!(s.iter().all(|&v| (v - 2.0).abs() < 1e-12));
    }

    #[test]
    fn test_symmetric_dip_keeps_minimum() {
        let curve: Vec<f64> = (0..61)
            .map(|j| -(-((j as f64 - 30.0) / 4.0).powi(2)).exp())
            .collect();
        let s = smooth_observations(&[curve.clone(), curve], 0.05, 1.0).unwrap();
        let argmin = s
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        assert_eq!(argmin, 30);
    }

    #[test]
    fn test_noise_is_attenuated() {
        let noisy: Vec<f64> = (0..200).map(|j| if j % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let s = smooth_observations(&[noisy], 0.05, 1.0).unwrap();
        let max_abs = s[20..180].iter().fold(0.0f64, |m, v| m.max(v.abs()));
        assert!(max_abs < 0.5, "alternating noise not attenuated: {}", max_abs);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(smooth_observations(&[], 0.05, 1.0), Ok(Vec::new()));

        let ragged = smooth_observations(&[vec![1.0, 2.0], vec![1.0]], 0.05, 1.0);
        assert!(matches!(ragged, Err(AlignmentError::NumericalError(_))));

        let empty = smooth_observations(&[Vec::new()], 0.05, 1.0);
        assert!(matches!(empty, Err(AlignmentError::NumericalError(_))));

        let zero_noise = smooth_observations(&[vec![1.0, 2.0]], 0.05, 0.0);
        assert!(matches!(zero_noise, Err(AlignmentError::NumericalError(_))));
    }
}

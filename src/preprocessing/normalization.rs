//! Sample-level normalization
//!
//! Renditions are recorded on different microphones at different gains.
//! Standardizing both buffers to zero mean and unit variance makes every
//! downstream descriptor independent of recording level.

/// Numerical stability epsilon
const EPSILON: f64 = 1e-12;

/// Mean and standard deviation of a slice (population std), in f64
pub fn mean_std(values: &[f32]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&x| x as f64).sum::<f64>() / n;
    let var = values
        .iter()
        .map(|&x| {
            let d = x as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean, var.sqrt())
}

/// Standardize samples to zero mean and unit variance
///
/// A constant (zero-variance) input maps to all zeros. Non-finite samples are
/// treated as 0.
///
/// # Example
///
/// ```
/// use rendition_sync::preprocessing::normalization::standardize;
///
/// let out = standardize(&[1.0, 3.0, 1.0, 3.0]);
/// assert_eq!(out, vec![-1.0, 1.0, -1.0, 1.0]);
/// ```
pub fn standardize(samples: &[f32]) -> Vec<f32> {
    let cleaned: Vec<f32> = samples
        .iter()
        .map(|&x| if x.is_finite() { x } else { 0.0 })
        .collect();

    let (mean, std) = mean_std(&cleaned);
    if std < EPSILON {
        log::debug!("Zero-variance buffer of {} samples, standardizing to zeros", cleaned.len());
        return vec![0.0; cleaned.len()];
    }

    cleaned
        .iter()
        .map(|&x| ((x as f64 - mean) / std) as f32)
        .collect()
}

/// Z-score a feature series in place, clamping non-finite results to 0
///
/// Unlike error-curve normalization this uses the plain standard deviation;
/// a flat series becomes all zeros.
pub fn zscore_in_place(values: &mut [f32]) {
    let (mean, std) = mean_std(values);
    if std < EPSILON {
        values.iter_mut().for_each(|v| *v = 0.0);
        return;
    }
    for v in values.iter_mut() {
        let z = ((*v as f64 - mean) / std) as f32;
        *v = if z.is_finite() { z } else { 0.0 };
    }
}

/// Truncate to at most `max_duration_s` seconds
pub fn truncate_to_duration(samples: &[f32], sample_rate: u32, max_duration_s: f32) -> &[f32] {
    let max_len = (max_duration_s as f64 * sample_rate as f64).floor() as usize;
    &samples[..samples.len().min(max_len)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standardize_moments() {
        let samples: Vec<f32> = (0..1000).map(|i| (i as f32 * 0.01).sin() * 0.3 + 0.1).collect();
        let out = standardize(&samples);
        let (mean, std) = mean_std(&out);
        assert!(mean.abs() < 1e-4);
        assert!((std - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_standardize_flat_and_non_finite() {
        assert_eq!(standardize(&[0.5; 8]), vec![0.0; 8]);
        let out = standardize(&[f32::NAN, 1.0, f32::INFINITY, -1.0]);
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_zscore_in_place() {
        let mut values = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        zscore_in_place(&mut values);
        // mean 5, std 2
        assert!((values[0] + 1.5).abs() < 1e-6);
        assert!((values[7] - 2.0).abs() < 1e-6);

        let mut flat = vec![3.0; 4];
        zscore_in_place(&mut flat);
        assert_eq!(flat, vec![0.0; 4]);
    }

    #[test]
    fn test_truncate_to_duration() {
        let samples = vec![0.0f32; 44100 * 3];
        assert_eq!(truncate_to_duration(&samples, 44100, 2.0).len(), 88200);
        assert_eq!(truncate_to_duration(&samples, 44100, 10.0).len(), 132300);
    }
}

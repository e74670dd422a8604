//! Spectral flux
//!
//! Measures how fast the spectrum changes: the L2 norm of the half-wave
//! rectified difference between consecutive magnitude spectra. Only increases
//! in magnitude count, so the curve peaks at note and chord onsets.

/// Compute spectral flux from a magnitude spectrogram (n_frames × n_bins)
///
/// # Returns
///
/// One value per frame; the first frame has no predecessor and is 0.
pub fn spectral_flux(magnitude_spec_frames: &[Vec<f32>]) -> Vec<f32> {
    if magnitude_spec_frames.is_empty() {
        return Vec::new();
    }

    let mut flux = Vec::with_capacity(magnitude_spec_frames.len());
    flux.push(0.0f32);

    for pair in magnitude_spec_frames.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        let sum_sq: f32 = prev
            .iter()
            .zip(curr.iter())
            .map(|(&p, &c)| {
                let d = (c - p).max(0.0);
                d * d
            })
            .sum();
        flux.push(sum_sq.sqrt());
    }

    log::debug!(
        "Spectral flux: {} frames, max={:.4}",
        flux.len(),
        flux.iter().copied().fold(0.0f32, f32::max)
    );

    flux
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spectral_flux_rectifies() {
        let frames = vec![
            vec![0.0, 0.0, 0.0],
            vec![3.0, 4.0, 0.0],
            vec![0.0, 0.0, 0.0],
            vec![0.0, 0.0, 2.0],
        ];
        let flux = spectral_flux(&frames);
        assert_eq!(flux.len(), 4);
        assert_eq!(flux[0], 0.0);
        assert!((flux[1] - 5.0).abs() < 1e-6);
        // decrease does not count
        assert_eq!(flux[2], 0.0);
        assert!((flux[3] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_spectral_flux_empty() {
        assert!(spectral_flux(&[]).is_empty());
        assert_eq!(spectral_flux(&[vec![1.0, 2.0]]), vec![0.0]);
    }
}

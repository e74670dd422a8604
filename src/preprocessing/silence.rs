//! Silence detection
//!
//! A rendition that is silent (or nearly so) carries no timing information.
//! It is reported as unusable before any features are extracted.

/// RMS level of a buffer in dBFS (`-inf` for empty or all-zero input)
pub fn rms_db(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return f32::NEG_INFINITY;
    }
    let sum_sq: f64 = samples
        .iter()
        .filter(|x| x.is_finite())
        .map(|&x| (x as f64) * (x as f64))
        .sum();
    let rms = (sum_sq / samples.len() as f64).sqrt();
    if rms <= 0.0 {
        return f32::NEG_INFINITY;
    }
    (20.0 * rms.log10()) as f32
}

/// True if the buffer's RMS level is below `threshold_db`
pub fn is_silent(samples: &[f32], threshold_db: f32) -> bool {
    rms_db(samples) < threshold_db
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms_db_full_scale_square() {
        let samples: Vec<f32> = (0..1000).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        assert!(rms_db(&samples).abs() < 1e-4);
    }

    #[test]
    fn test_silence_detection() {
        assert!(is_silent(&[], -60.0));
        assert!(is_silent(&vec![0.0f32; 44100], -60.0));
        assert!(is_silent(&vec![1e-5f32; 44100], -60.0));
        assert!(!is_silent(&vec![0.1f32; 44100], -60.0));
    }
}

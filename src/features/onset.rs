//! Onset energy
//!
//! Detects where sound *starts* rather than how loud it is.
//!
//! Algorithm:
//! 1. Frame the signal (frame_length, hop_length) and compute RMS per frame
//! 2. Take the positive first difference of the RMS envelope
//! 3. Z-score the difference series
//! 4. Keep values above [`ONSET_Z_THRESHOLD`] standard deviations, zero the rest

use crate::preprocessing::normalization::zscore_in_place;

use super::frame_count;

/// Z-score an onset has to exceed to be kept
pub const ONSET_Z_THRESHOLD: f32 = 2.0;

/// Per-frame RMS amplitude envelope
pub fn rms_envelope(samples: &[f32], frame_length: usize, hop_length: usize) -> Vec<f32> {
    let n_frames = frame_count(samples.len(), frame_length, hop_length);
    (0..n_frames)
        .map(|i| {
            let start = i * hop_length;
            let frame = &samples[start..start + frame_length];
            let sum_sq: f32 = frame.iter().map(|&x| x * x).sum();
            (sum_sq / frame_length as f32).sqrt()
        })
        .collect()
}

/// Compute the onset energy series
///
/// # Arguments
///
/// * `samples` - Standardized mono samples
/// * `frame_length` - Frame length in samples
/// * `hop_length` - Hop length in samples
///
/// # Returns
///
/// One value per frame: the z-score of the envelope increase where it exceeds
/// the threshold, 0 elsewhere. Flat or too-short input yields zeros / empty.
pub fn onset_energy(samples: &[f32], frame_length: usize, hop_length: usize) -> Vec<f32> {
    let envelope = rms_envelope(samples, frame_length, hop_length);
    if envelope.is_empty() {
        return envelope;
    }

    let mut onsets = Vec::with_capacity(envelope.len());
    onsets.push(0.0f32);
    for w in envelope.windows(2) {
        onsets.push((w[1] - w[0]).max(0.0));
    }

    zscore_in_place(&mut onsets);
    for v in onsets.iter_mut() {
        if *v <= ONSET_Z_THRESHOLD {
            *v = 0.0;
        }
    }

    log::debug!(
        "Onset energy: {} frames (hop={}), {} above threshold",
        onsets.len(),
        hop_length,
        onsets.iter().filter(|&&v| v > 0.0).count()
    );

    onsets
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Bursts of decaying noise-free tone every `interval` samples
    fn bursts(len: usize, interval: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = (i % interval) as f32 / 44100.0;
                (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44100.0).sin() * (-t * 30.0).exp()
            })
            .collect()
    }

    #[test]
    fn test_rms_envelope_constant() {
        let env = rms_envelope(&vec![0.5f32; 8192], 2048, 512);
        assert_eq!(env.len(), frame_count(8192, 2048, 512));
        assert!(env.iter().all(|&v| (v - 0.5).abs() < 1e-5));
    }

    #[test]
    fn test_onset_energy_marks_bursts() {
        let samples = bursts(44100 * 2, 11025);
        let onsets = onset_energy(&samples, 2048, 512);
        assert_eq!(onsets.len(), frame_count(samples.len(), 2048, 512));

        let active: Vec<usize> = onsets
            .iter()
            .enumerate()
            .filter(|(_, &v)| v > 0.0)
            .map(|(i, _)| i)
            .collect();
        assert!(!active.is_empty());
        // Every active frame sits just before a burst start (burst every ~21.5 frames)
        for &frame in &active {
            let end_sample = frame * 512 + 2048;
            let phase = end_sample % 11025;
            assert!(phase < 2048 + 512, "frame {} not near a burst start", frame);
        }
    }

    #[test]
    fn test_onset_energy_flat_input() {
        let onsets = onset_energy(&vec![0.3f32; 44100], 2048, 512);
        assert!(onsets.iter().all(|&v| v == 0.0));
        assert!(onset_energy(&[0.3; 100], 2048, 512).is_empty());
    }
}

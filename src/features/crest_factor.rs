//! Crest factor (peak-to-RMS ratio per frame)

use super::frame_count;

/// Numerical stability epsilon
const EPSILON: f32 = 1e-10;

/// Compute the crest factor series
///
/// Frames whose RMS is (numerically) zero get a crest factor of 0.
pub fn crest_factor(samples: &[f32], frame_length: usize, hop_length: usize) -> Vec<f32> {
    let n_frames = frame_count(samples.len(), frame_length, hop_length);

    (0..n_frames)
        .map(|i| {
            let start = i * hop_length;
            let frame = &samples[start..start + frame_length];
            let peak = frame.iter().fold(0.0f32, |m, &x| m.max(x.abs()));
            let rms = (frame.iter().map(|&x| x * x).sum::<f32>() / frame_length as f32).sqrt();
            if rms > EPSILON {
                peak / rms
            } else {
                0.0
            }
        })
        .collect()
}

//! Short-time Fourier transform
//!
//! Hann-windowed, unpadded frames; only the `frame_length / 2 + 1`
//! non-negative frequency bins are kept.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use super::frame_count;

/// Hann window of `size` samples
pub fn hann_window(size: usize) -> Vec<f32> {
    if size < 2 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| {
            let t = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
            0.5 * (1.0 - t.cos())
        })
        .collect()
}

/// Compute the magnitude spectrogram (n_frames × n_bins)
///
/// Returns an empty spectrogram when the input is shorter than one frame.
pub fn compute_stft(samples: &[f32], frame_length: usize, hop_length: usize) -> Vec<Vec<f32>> {
    let n_frames = frame_count(samples.len(), frame_length, hop_length);
    if n_frames == 0 {
        return Vec::new();
    }

    log::debug!(
        "Computing STFT: {} samples, frame={}, hop={}, {} frames",
        samples.len(),
        frame_length,
        hop_length,
        n_frames
    );

    let window = hann_window(frame_length);
    let n_bins = frame_length / 2 + 1;

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(frame_length);
    let mut buffer = vec![Complex::new(0.0f32, 0.0); frame_length];

    let mut spectrogram = Vec::with_capacity(n_frames);
    for frame_idx in 0..n_frames {
        let start = frame_idx * hop_length;
        let frame = &samples[start..start + frame_length];

        for ((slot, &x), &w) in buffer.iter_mut().zip(frame).zip(&window) {
            *slot = Complex::new(x * w, 0.0);
        }
        fft.process(&mut buffer);

        let magnitudes: Vec<f32> = buffer[..n_bins]
            .iter()
            .map(|c| {
                let m = c.norm();
                if m.is_finite() {
                    m
                } else {
                    0.0
                }
            })
            .collect();
        spectrogram.push(magnitudes);
    }

    spectrogram
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hann_window_shape() {
        let w = hann_window(8);
        assert_eq!(w.len(), 8);
        assert!(w[0].abs() < 1e-6);
        assert!((w[4] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_stft_dimensions() {
        let samples = vec![0.0f32; 44100];
        let spectrogram = compute_stft(&samples, 2048, 512);
        assert_eq!(spectrogram.len(), 83);
        assert!(spectrogram.iter().all(|f| f.len() == 1025));
    }

    #[test]
    fn test_stft_too_short() {
        assert!(compute_stft(&[0.1; 100], 2048, 512).is_empty());
    }

    #[test]
    fn test_stft_sine_peak_bin() {
        let sr = 44100.0;
        let freq = 1000.0;
        let samples: Vec<f32> = (0..8192)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sr).sin())
            .collect();
        let spectrogram = compute_stft(&samples, 2048, 512);
        let frame = &spectrogram[0];
        let peak_bin = frame
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        let expected = (freq * 2048.0 / sr).round() as usize;
        assert!((peak_bin as i64 - expected as i64).abs() <= 1);
    }
}

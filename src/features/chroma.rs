//! Chroma class
//!
//! Folds spectral energy onto the 12 pitch classes (octaves merged, A4 = 440 Hz)
//! and keeps only the dominant class per frame. The class index is scaled to
//! `[0, 1)` so it can travel in the same `f32` series type as the continuous
//! descriptors; the scanner compares it categorically.

/// Lowest frequency folded into the chroma (A1)
const MIN_FREQ_HZ: f32 = 55.0;

/// Highest frequency folded into the chroma
const MAX_FREQ_HZ: f32 = 5000.0;

/// Numerical stability epsilon
const EPSILON: f32 = 1e-10;

/// Number of pitch classes
pub const N_PITCH_CLASSES: usize = 12;

/// Pitch class (0 = C) of every STFT bin, `None` outside the folded band
pub fn bin_pitch_classes(
    n_bins: usize,
    frame_length: usize,
    sample_rate: u32,
) -> Vec<Option<usize>> {
    (0..n_bins)
        .map(|k| {
            let freq = k as f32 * sample_rate as f32 / frame_length as f32;
            if !(MIN_FREQ_HZ..=MAX_FREQ_HZ).contains(&freq) {
                return None;
            }
            let midi = 69.0 + 12.0 * (freq / 440.0).log2();
            let class = (midi.round() as i64).rem_euclid(N_PITCH_CLASSES as i64) as usize;
            Some(class)
        })
        .collect()
}

/// Fold one magnitude frame into a 12-bin energy chroma vector
pub fn chroma_vector(magnitudes: &[f32], classes: &[Option<usize>]) -> [f32; N_PITCH_CLASSES] {
    let mut chroma = [0.0f32; N_PITCH_CLASSES];
    for (&m, class) in magnitudes.iter().zip(classes) {
        if let Some(c) = class {
            chroma[*c] += m * m;
        }
    }
    chroma
}

/// Dominant pitch class per frame, scaled to `[0, 1)`
///
/// Ties resolve to the lowest class; frames without energy map to 0.
///
/// # Arguments
///
/// * `magnitude_spec_frames` - Magnitude spectrogram (n_frames × n_bins)
/// * `frame_length` - FFT size used for the spectrogram
/// * `sample_rate` - Sample rate in Hz
pub fn chroma_class(
    magnitude_spec_frames: &[Vec<f32>],
    frame_length: usize,
    sample_rate: u32,
) -> Vec<f32> {
    let Some(first) = magnitude_spec_frames.first() else {
        return Vec::new();
    };
    let classes = bin_pitch_classes(first.len(), frame_length, sample_rate);

    magnitude_spec_frames
        .iter()
        .map(|frame| {
            let chroma = chroma_vector(frame, &classes);
            let mut best = 0usize;
            for (i, &energy) in chroma.iter().enumerate() {
                if energy > chroma[best] {
                    best = i;
                }
            }
            if chroma[best] <= EPSILON {
                0.0
            } else {
                best as f32 / N_PITCH_CLASSES as f32
            }
        })
        .collect()
}

/// Pitch class index encoded in a chroma series value
pub fn class_index(value: f32) -> usize {
    ((value * N_PITCH_CLASSES as f32).round() as usize) % N_PITCH_CLASSES
}

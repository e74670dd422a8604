//! Feature extraction modules
//!
//! Turns standardized mono samples into per-frame descriptor series:
//! - Onset energy (thresholded amplitude-envelope onsets)
//! - Spectral flux
//! - Crest factor
//! - Chroma class (dominant pitch class)
//!
//! Every series derived from a buffer of `len` samples has exactly
//! [`frame_count`]`(len, frame_length, hop_length)` values.

use serde::{Deserialize, Serialize};

pub mod cache;
pub mod chroma;
pub mod crest_factor;
pub mod extractor;
pub mod onset;
pub mod spectral_flux;
pub mod stft;

pub use cache::FeatureCache;

/// Descriptor kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureType {
    /// Z-scored, thresholded amplitude-envelope onsets
    OnsetEnergy,
    /// Frame-to-frame spectral magnitude increase
    SpectralFlux,
    /// Per-frame peak to RMS ratio
    CrestFactor,
    /// Dominant pitch class / 12, in [0, 1)
    Chroma,
}

impl FeatureType {
    /// All feature types in canonical order
    pub const ALL: [FeatureType; 4] = [
        FeatureType::OnsetEnergy,
        FeatureType::SpectralFlux,
        FeatureType::CrestFactor,
        FeatureType::Chroma,
    ];

    /// Categorical features are compared directly instead of through event maps
    pub fn is_categorical(self) -> bool {
        matches!(self, FeatureType::Chroma)
    }

    /// True if the feature is computed from the magnitude spectrogram
    pub fn needs_spectrum(self) -> bool {
        matches!(self, FeatureType::SpectralFlux | FeatureType::Chroma)
    }

    /// Short name used in logs and metadata
    pub fn name(self) -> &'static str {
        match self {
            FeatureType::OnsetEnergy => "onset_energy",
            FeatureType::SpectralFlux => "spectral_flux",
            FeatureType::CrestFactor => "crest_factor",
            FeatureType::Chroma => "chroma",
        }
    }
}

/// One descriptor value per analysis frame
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSeries {
    /// Descriptor kind
    pub feature: FeatureType,
    /// Hop length in samples between frames
    pub hop_length: usize,
    /// Per-frame values (always finite)
    pub values: Vec<f32>,
}

impl FeatureSeries {
    /// Build a series, clamping non-finite values to 0
    pub fn new(feature: FeatureType, hop_length: usize, mut values: Vec<f32>) -> Self {
        sanitize(&mut values);
        Self {
            feature,
            hop_length,
            values,
        }
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True for degenerate (empty) series
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Number of analysis frames for a buffer of `len` samples
///
/// Frames are not padded: a buffer shorter than one frame has no frames.
pub fn frame_count(len: usize, frame_length: usize, hop_length: usize) -> usize {
    if frame_length == 0 || hop_length == 0 || len < frame_length {
        return 0;
    }
    1 + (len - frame_length) / hop_length
}

/// Replace NaN/Inf with 0
pub fn sanitize(values: &mut [f32]) {
    for v in values.iter_mut() {
        if !v.is_finite() {
            *v = 0.0;
        }
    }
}

//! Multi-resolution feature extraction with memoization
//!
//! Extraction for every (buffer, hop length) pair is independent, so missing
//! series are computed in parallel and only then written to the cache. The
//! returned banks are ordered by input, never by completion, which keeps
//! downstream fusion bit-identical across runs.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use rayon::prelude::*;

use crate::io::audio_buffer::fingerprint_samples;

use super::cache::{CacheKey, FeatureCache};
use super::chroma::chroma_class;
use super::crest_factor::crest_factor;
use super::onset::onset_energy;
use super::spectral_flux::spectral_flux;
use super::stft::compute_stft;
use super::{FeatureSeries, FeatureType};

/// What to extract
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionParams {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Frame length in samples
    pub frame_length: usize,
    /// Hop lengths to analyse
    pub hop_lengths: Vec<usize>,
    /// Descriptors to compute at every hop
    pub features: Vec<FeatureType>,
}

/// All requested series of one buffer, keyed by (hop length, feature)
#[derive(Debug, Clone, Default)]
pub struct FeatureBank {
    series: BTreeMap<(usize, FeatureType), Arc<FeatureSeries>>,
}

impl FeatureBank {
    /// Series for one hop and feature
    pub fn get(&self, hop_length: usize, feature: FeatureType) -> Option<&Arc<FeatureSeries>> {
        self.series.get(&(hop_length, feature))
    }

    /// Number of series
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// True if no series were extracted
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Compute the requested descriptors of one buffer at one hop length
///
/// The spectrogram is computed at most once and shared by the spectral
/// descriptors.
pub fn extract_series(
    samples: &[f32],
    sample_rate: u32,
    frame_length: usize,
    hop_length: usize,
    features: &[FeatureType],
) -> Vec<FeatureSeries> {
    let spectrogram = if features.iter().any(|f| f.needs_spectrum()) {
        compute_stft(samples, frame_length, hop_length)
    } else {
        Vec::new()
    };

    features
        .iter()
        .map(|&feature| {
            let values = match feature {
                FeatureType::OnsetEnergy => onset_energy(samples, frame_length, hop_length),
                FeatureType::SpectralFlux => spectral_flux(&spectrogram),
                FeatureType::CrestFactor => crest_factor(samples, frame_length, hop_length),
                FeatureType::Chroma => chroma_class(&spectrogram, frame_length, sample_rate),
            };
            FeatureSeries::new(feature, hop_length, values)
        })
        .collect()
}

/// Extract (or fetch from `cache`) every requested series for every buffer
///
/// # Arguments
///
/// * `cache` - Invocation-scoped cache, updated in place
/// * `buffers` - Preprocessed sample buffers
/// * `params` - Sample rate, framing, hops and descriptors
///
/// # Returns
///
/// One [`FeatureBank`] per input buffer, in input order
pub fn extract_features(
    cache: &mut FeatureCache,
    buffers: &[&[f32]],
    params: &ExtractionParams,
) -> Vec<FeatureBank> {
    let fingerprints: Vec<u64> = buffers
        .iter()
        .map(|samples| fingerprint_samples(samples, params.sample_rate))
        .collect();

    let key = |fingerprint: u64, hop_length: usize, feature: FeatureType| CacheKey {
        fingerprint,
        frame_length: params.frame_length,
        hop_length,
        feature,
    };

    // Collect missing work, grouped per (buffer content, hop)
    let mut scheduled: HashSet<CacheKey> = HashSet::new();
    let mut jobs: Vec<(usize, usize, Vec<FeatureType>)> = Vec::new();
    for (buffer_idx, &fingerprint) in fingerprints.iter().enumerate() {
        for &hop_length in &params.hop_lengths {
            let mut missing = Vec::new();
            for &feature in &params.features {
                let k = key(fingerprint, hop_length, feature);
                if cache.contains(&k) || scheduled.contains(&k) {
                    cache.record_hit();
                } else {
                    cache.record_miss();
                    scheduled.insert(k);
                    missing.push(feature);
                }
            }
            if !missing.is_empty() {
                jobs.push((buffer_idx, hop_length, missing));
            }
        }
    }

    log::debug!(
        "Feature extraction: {} buffers, {} hops, {} jobs to compute",
        buffers.len(),
        params.hop_lengths.len(),
        jobs.len()
    );

    let computed: Vec<(u64, Vec<FeatureSeries>)> = jobs
        .par_iter()
        .map(|(buffer_idx, hop_length, missing)| {
            let series = extract_series(
                buffers[*buffer_idx],
                params.sample_rate,
                params.frame_length,
                *hop_length,
                missing,
            );
            (fingerprints[*buffer_idx], series)
        })
        .collect();

    for (fingerprint, series_list) in computed {
        for series in series_list {
            cache.insert(key(fingerprint, series.hop_length, series.feature), series);
        }
    }

    fingerprints
        .iter()
        .map(|&fingerprint| {
            let mut bank = FeatureBank::default();
            for &hop_length in &params.hop_lengths {
                for &feature in &params.features {
                    if let Some(series) = cache.peek(&key(fingerprint, hop_length, feature)) {
                        bank.series.insert((hop_length, feature), series);
                    }
                }
            }
            bank
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::frame_count;

    fn params() -> ExtractionParams {
        ExtractionParams {
            sample_rate: 44100,
            frame_length: 2048,
            hop_lengths: vec![512, 1024],
            features: FeatureType::ALL.to_vec(),
        }
    }

    fn signal(len: usize, seed: f32) -> Vec<f32> {
        (0..len)
            .map(|i| ((i as f32 * 0.031 + seed).sin() * (i as f32 * 0.0007).cos()))
            .collect()
    }

    #[test]
    fn test_series_lengths_follow_framing() {
        let samples = signal(44100, 0.0);
        let series = extract_series(&samples, 44100, 2048, 512, &FeatureType::ALL);
        assert_eq!(series.len(), 4);
        for s in series {
            assert_eq!(s.len(), frame_count(samples.len(), 2048, 512), "{:?}", s.feature);
            assert!(s.values.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_degenerate_buffer_yields_empty_series() {
        let series = extract_series(&[0.2; 1000], 44100, 2048, 512, &FeatureType::ALL);
        assert!(series.iter().all(|s| s.is_empty()));
        let series = extract_series(&[], 44100, 2048, 512, &FeatureType::ALL);
        assert!(series.iter().all(|s| s.is_empty()));
    }

    #[test]
    fn test_cache_avoids_recomputation() {
        let a = signal(44100, 0.0);
        let b = signal(44100, 1.0);
        let mut cache = FeatureCache::new();

        let banks = extract_features(&mut cache, &[&a, &b], &params());
        assert_eq!(banks.len(), 2);
        assert_eq!(banks[0].len(), 8);
        let stats = cache.stats();
        assert_eq!(stats.misses, 16);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.entries, 16);

        // Second call: everything is served from the cache
        let again = extract_features(&mut cache, &[&a, &b], &params());
        let stats = cache.stats();
        assert_eq!(stats.misses, 16);
        assert_eq!(stats.hits, 16);
        assert!(Arc::ptr_eq(
            banks[0].get(512, FeatureType::Chroma).unwrap(),
            again[0].get(512, FeatureType::Chroma).unwrap()
        ));
    }

    #[test]
    fn test_identical_buffers_share_series() {
        let a = signal(22050, 0.5);
        let copy = a.clone();
        let mut cache = FeatureCache::new();

        let banks = extract_features(&mut cache, &[&a, &copy], &params());
        let stats = cache.stats();
        assert_eq!(stats.entries, 8);
        assert_eq!(stats.misses, 8);
        assert_eq!(stats.hits, 8);
        assert_eq!(
            banks[0].get(1024, FeatureType::OnsetEnergy).unwrap().values,
            banks[1].get(1024, FeatureType::OnsetEnergy).unwrap().values
        );
    }
}

//! End-to-end offset estimation
//!
//! # Pipeline
//!
//! 1. Boundary checks (self-reference, sample rate, length, silence)
//! 2. Truncation and standardization
//! 3. Multi-resolution feature extraction (cached, parallel)
//! 4. Event maps for continuous descriptors
//! 5. Offset scanning per (feature, hop), optionally per window
//! 6. Fusion onto the common axis
//! 7. Consensus (global argmin or windowed clustering)
//! 8. Fallback guard
//!
//! # Example
//!
//! ```no_run
//! use rendition_sync::{Aligner, AlignmentConfig, AudioBuffer};
//!
//! # let reference_samples = vec![0.0f32; 44100];
//! # let rendition_samples = vec![0.0f32; 44100];
//! let aligner = Aligner::new(AlignmentConfig::default())?;
//! let reference = AudioBuffer::new(reference_samples, 44100).with_id("reference");
//! let rendition = AudioBuffer::new(rendition_samples, 44100).with_id("alto");
//! let result = aligner.align(&reference, &rendition);
//! println!("offset: {} ms ({:?})", result.offset_ms, result.status);
//! # Ok::<(), rendition_sync::AlignmentError>(())
//! ```

use std::time::Instant;

use rayon::prelude::*;

use crate::analysis::metadata::{AlignmentFlag, AlignmentMetadata};
use crate::analysis::result::{AlignmentResult, AlignmentStatus};
use crate::config::{AlignmentConfig, ConsensusStrategy};
use crate::error::AlignmentError;
use crate::features::extractor::{extract_features, ExtractionParams, FeatureBank};
use crate::features::{FeatureCache, FeatureType};
use crate::io::AudioBuffer;
use crate::preprocessing::normalization::{standardize, truncate_to_duration};
use crate::preprocessing::silence::{is_silent, rms_db};

use super::axis::{OffsetAxis, OffsetRange};
use super::consensus::{cluster_candidates, select_top_windows, window_minima, OffsetCandidate};
use super::event_map::build_event_map;
use super::fusion::{fuse, FusedCurve, FusionParams};
use super::guard::{apply_guard, Candidate, GuardParams};
use super::scanner::{scan, Comparison, ErrorCurve};

/// Reference and rendition series for one (feature, hop), ready to scan
#[derive(Debug, Clone)]
struct SeriesPair {
    feature: FeatureType,
    hop_length: usize,
    reference: Vec<f32>,
    candidate: Vec<f32>,
    range: OffsetRange,
    comparison: Comparison,
}

impl SeriesPair {
    fn overlap(&self) -> usize {
        self.reference.len().min(self.candidate.len())
    }

    fn scan(&self, window: Option<(usize, usize)>) -> ErrorCurve {
        scan(
            self.feature,
            self.hop_length,
            &self.reference,
            &self.candidate,
            self.range,
            self.comparison,
            window,
        )
    }
}

/// Consensus output handed to the guard
#[derive(Debug, Clone, Copy)]
struct ConsensusOutcome {
    candidate: Option<Candidate>,
    baseline_error: f64,
}

/// Offset estimator bound to a validated configuration
#[derive(Debug, Clone)]
pub struct Aligner {
    config: AlignmentConfig,
    axis: OffsetAxis,
}

impl Aligner {
    /// Validate `config` and build an aligner
    ///
    /// # Errors
    ///
    /// Returns `AlignmentError::InvalidConfig` if any parameter is invalid.
    pub fn new(config: AlignmentConfig) -> Result<Self, AlignmentError> {
        config.validate()?;
        let axis = OffsetAxis::from_config(&config);
        Ok(Self { config, axis })
    }

    /// Configuration in use
    pub fn config(&self) -> &AlignmentConfig {
        &self.config
    }

    /// Common offset axis
    pub fn axis(&self) -> &OffsetAxis {
        &self.axis
    }

    /// Estimate the offset of `rendition` relative to `reference`
    ///
    /// Uses a fresh feature cache for this call only.
    pub fn align(&self, reference: &AudioBuffer, rendition: &AudioBuffer) -> AlignmentResult {
        let mut cache = FeatureCache::new();
        self.align_with_cache(reference, rendition, &mut cache)
    }

    /// Estimate the offset, reusing features stored in `cache`
    ///
    /// Input problems never produce an error: the result falls back to offset
    /// 0 with status [`AlignmentStatus::Degraded`] and a warning in its
    /// metadata.
    pub fn align_with_cache(
        &self,
        reference: &AudioBuffer,
        rendition: &AudioBuffer,
        cache: &mut FeatureCache,
    ) -> AlignmentResult {
        let start_time = Instant::now();
        let reference_id = reference.id();
        let rendition_id = rendition.id();
        let mut metadata = self.base_metadata();

        if !reference_id.is_empty() && reference_id == rendition_id {
            log::debug!("'{}' is the reference itself, offset 0", rendition_id);
            return AlignmentResult::fallback(
                reference_id,
                rendition_id,
                AlignmentStatus::SelfReference,
                0.0,
                metadata,
            );
        }

        let reference_samples = match self.prepare(reference, "reference", &mut metadata) {
            Ok(samples) => samples,
            Err(e) => return self.degraded(reference_id, rendition_id, e, metadata),
        };
        let rendition_samples = match self.prepare(rendition, "rendition", &mut metadata) {
            Ok(samples) => samples,
            Err(e) => return self.degraded(reference_id, rendition_id, e, metadata),
        };

        let length_gap = reference_samples.len().abs_diff(rendition_samples.len());
        let length_gap_ms = length_gap as f64 * 1000.0 / self.config.sample_rate as f64;
        if length_gap_ms > self.config.lookahead_ms + self.config.lookbehind_ms {
            metadata.flag(AlignmentFlag::LengthMismatch);
        }

        let params = ExtractionParams {
            sample_rate: self.config.sample_rate,
            frame_length: self.config.frame_length,
            hop_lengths: self.config.hop_lengths.clone(),
            features: self.config.weights.active_features(),
        };
        let banks = extract_features(cache, &[&reference_samples, &rendition_samples], &params);
        log::debug!(
            "Extracted {} reference and {} rendition series",
            banks[0].len(),
            banks[1].len()
        );
        let pairs = self.build_pairs(&banks[0], &banks[1], &params);

        if pairs.iter().all(|p| p.overlap() == 0) {
            return self.degraded(
                reference_id,
                rendition_id,
                AlignmentError::InvalidInput("no usable overlap between the buffers".to_string()),
                metadata,
            );
        }

        let overlap_ms = reference_samples.len().min(rendition_samples.len()) as f64 * 1000.0
            / self.config.sample_rate as f64;

        let outcome = match self.config.consensus {
            ConsensusStrategy::GlobalArgmin => self.global_argmin(&pairs, &mut metadata),
            ConsensusStrategy::WindowedClusters => {
                self.windowed_clusters(&pairs, overlap_ms, &mut metadata)
            }
        };

        metadata.candidate_offset_ms = outcome.candidate.map(|c| c.offset_ms);
        metadata.candidate_error = outcome.candidate.map(|c| c.error);
        metadata.baseline_error = Some(outcome.baseline_error);

        let decision = apply_guard(
            outcome.candidate,
            outcome.baseline_error,
            &GuardParams {
                min_improvement: self.config.min_improvement,
                trust_bound_ms: self.config.trust_bound_ms,
            },
        );

        if let (Some(c), AlignmentStatus::TrustBoundExceeded | AlignmentStatus::Inconclusive) =
            (outcome.candidate, decision.status)
        {
            metadata.warnings.push(format!(
                "candidate {:.1} ms rejected ({}), reporting 0",
                c.offset_ms,
                decision.status.name()
            ));
        }

        log::debug!(
            "Aligned '{}' to '{}': {} ms (error {:.6}, {}) in {:.2} ms",
            rendition_id,
            reference_id,
            decision.offset_ms,
            decision.error,
            decision.status.name(),
            start_time.elapsed().as_secs_f64() * 1000.0
        );

        AlignmentResult {
            offset_ms: decision.offset_ms,
            error: decision.error,
            reference_id: reference_id.to_string(),
            rendition_id: rendition_id.to_string(),
            status: decision.status,
            metadata,
        }
    }

    fn base_metadata(&self) -> AlignmentMetadata {
        AlignmentMetadata {
            strategy: self.config.consensus,
            hop_lengths: self.config.hop_lengths.clone(),
            ..AlignmentMetadata::default()
        }
    }

    fn fusion_params(&self) -> FusionParams {
        FusionParams {
            weights: self.config.weights,
            process_noise: self.config.smoother_process_noise,
            measurement_noise: self.config.smoother_measurement_noise,
        }
    }

    fn degraded(
        &self,
        reference_id: &str,
        rendition_id: &str,
        error: AlignmentError,
        mut metadata: AlignmentMetadata,
    ) -> AlignmentResult {
        log::warn!("Cannot align '{}' to '{}': {}", rendition_id, reference_id, error);
        metadata.warnings.push(error.to_string());
        AlignmentResult::fallback(
            reference_id,
            rendition_id,
            AlignmentStatus::Degraded,
            0.0,
            metadata,
        )
    }

    /// Validate, truncate and standardize one buffer
    fn prepare(
        &self,
        buffer: &AudioBuffer,
        role: &str,
        metadata: &mut AlignmentMetadata,
    ) -> Result<Vec<f32>, AlignmentError> {
        if buffer.sample_rate() != self.config.sample_rate {
            return Err(AlignmentError::InvalidInput(format!(
                "{} sample rate {} Hz, expected {} Hz",
                role,
                buffer.sample_rate(),
                self.config.sample_rate
            )));
        }
        if buffer.is_empty() {
            return Err(AlignmentError::InvalidInput(format!("{} buffer is empty", role)));
        }

        let samples = truncate_to_duration(
            buffer.samples(),
            buffer.sample_rate(),
            self.config.max_duration_s,
        );
        if samples.len() < buffer.len() {
            log::debug!(
                "{} truncated from {} to {} samples",
                role,
                buffer.len(),
                samples.len()
            );
            metadata.flag(AlignmentFlag::Truncated);
        }

        if samples.len() < self.config.frame_length {
            return Err(AlignmentError::InvalidInput(format!(
                "{} too short: {} samples < frame length {}",
                role,
                samples.len(),
                self.config.frame_length
            )));
        }

        if is_silent(samples, self.config.silence_threshold_db) {
            return Err(AlignmentError::InvalidInput(format!(
                "{} is silent ({:.1} dB < {:.1} dB)",
                role,
                rms_db(samples),
                self.config.silence_threshold_db
            )));
        }

        Ok(standardize(samples))
    }

    /// Event maps (continuous features) or raw series (chroma) for every
    /// (hop, feature) present in both banks
    fn build_pairs(
        &self,
        reference: &FeatureBank,
        rendition: &FeatureBank,
        params: &ExtractionParams,
    ) -> Vec<SeriesPair> {
        let keys: Vec<(usize, FeatureType)> = params
            .hop_lengths
            .iter()
            .flat_map(|&hop| params.features.iter().map(move |&f| (hop, f)))
            .collect();

        keys.par_iter()
            .filter_map(|&(hop_length, feature)| {
                let r = reference.get(hop_length, feature)?;
                let c = rendition.get(hop_length, feature)?;
                let (reference, candidate) = if feature.is_categorical() {
                    (r.values.clone(), c.values.clone())
                } else {
                    (
                        build_event_map(&r.values, self.config.prominence, self.config.decay),
                        build_event_map(&c.values, self.config.prominence, self.config.decay),
                    )
                };
                Some(SeriesPair {
                    feature,
                    hop_length,
                    reference,
                    candidate,
                    range: OffsetRange::for_hop(&self.config, hop_length),
                    comparison: Comparison::for_feature(feature, self.config.chroma_matching),
                })
            })
            .collect()
    }

    fn record_fusion(metadata: &mut AlignmentMetadata, fused: &FusedCurve) {
        metadata.curves_fused += fused.curves_used;
        metadata.curves_dropped += fused.curves_dropped;
        for &feature in &fused.features {
            if !metadata.features_used.contains(&feature) {
                metadata.features_used.push(feature);
            }
        }
        if fused.curves_dropped > 0 {
            metadata.flag(AlignmentFlag::CurvesDropped);
        }
    }

    fn global_argmin(
        &self,
        pairs: &[SeriesPair],
        metadata: &mut AlignmentMetadata,
    ) -> ConsensusOutcome {
        let curves: Vec<ErrorCurve> = pairs.par_iter().map(|p| p.scan(None)).collect();
        let fused = fuse(&curves, &self.axis, &self.fusion_params());
        Self::record_fusion(metadata, &fused);

        let candidate = fused.argmin().and_then(|idx| {
            Some(Candidate {
                offset_ms: self.axis.index_to_ms(idx),
                error: fused.raw_at(idx as f64)?,
            })
        });

        log::debug!(
            "Global argmin: {} curves fused, candidate {:?}",
            fused.curves_used,
            candidate.map(|c| c.offset_ms)
        );

        ConsensusOutcome {
            candidate,
            baseline_error: fused.baseline_error().unwrap_or(0.0),
        }
    }

    /// Window boundaries in ms over an overlap of `overlap_ms`
    fn plan_windows(&self, overlap_ms: f64) -> Vec<(f64, f64)> {
        let window = self.config.window_ms;
        let step = self.config.window_step_ms;
        if overlap_ms <= window {
            return vec![(0.0, overlap_ms)];
        }
        let mut windows = Vec::new();
        let mut start = 0.0;
        while start + window <= overlap_ms {
            windows.push((start, start + window));
            start += step;
        }
        windows
    }

    fn windowed_clusters(
        &self,
        pairs: &[SeriesPair],
        overlap_ms: f64,
        metadata: &mut AlignmentMetadata,
    ) -> ConsensusOutcome {
        let windows = self.plan_windows(overlap_ms);
        let fusion_params = self.fusion_params();

        let runs: Vec<FusedCurve> = windows
            .par_iter()
            .map(|&(start_ms, end_ms)| {
                let curves: Vec<ErrorCurve> = pairs
                    .iter()
                    .map(|p| {
                        let start = self.config.ms_to_frames(start_ms, p.hop_length);
                        let end = self.config.ms_to_frames(end_ms, p.hop_length);
                        p.scan(Some((start, end)))
                    })
                    .collect();
                fuse(&curves, &self.axis, &fusion_params)
            })
            .collect();

        for fused in &runs {
            Self::record_fusion(metadata, fused);
        }

        let minima = runs
            .iter()
            .enumerate()
            .filter_map(|(i, fused)| {
                window_minima(i, &fused.scores, &self.axis, self.config.min_relative_prominence)
            })
            .collect();
        let retained = select_top_windows(minima, self.config.top_windows);

        metadata.windows_analyzed = runs.len();
        metadata.windows_retained = retained.len();
        if retained.len() < self.config.top_windows.min(runs.len()) {
            metadata.flag(AlignmentFlag::FewWindows);
        }

        let candidates: Vec<OffsetCandidate> = retained
            .iter()
            .flat_map(|w| w.candidates.iter().copied())
            .collect();
        metadata.candidates = candidates.len();

        let clusters = cluster_candidates(
            &candidates,
            self.config.cluster_bandwidth,
            self.config.base_score,
            &self.axis,
        );

        // errors are averaged over the retained windows, or all usable ones
        let error_runs: Vec<&FusedCurve> = if retained.is_empty() {
            runs.iter().filter(|r| !r.is_empty()).collect()
        } else {
            retained.iter().map(|w| &runs[w.window]).collect()
        };
        let baseline_error = mean_error(&error_runs, |r| r.baseline_error()).unwrap_or(0.0);
        let candidate = clusters.first().and_then(|best| {
            Some(Candidate {
                offset_ms: best.centroid_ms,
                error: mean_error(&error_runs, |r| r.raw_at(best.centroid))?,
            })
        });

        log::debug!(
            "Windowed consensus: {} windows, {} retained, {} candidates, {} clusters",
            runs.len(),
            retained.len(),
            candidates.len(),
            clusters.len()
        );

        ConsensusOutcome {
            candidate,
            baseline_error,
        }
    }
}

/// Mean of `f` over the runs where it is defined
fn mean_error(runs: &[&FusedCurve], f: impl Fn(&FusedCurve) -> Option<f64>) -> Option<f64> {
    let values: Vec<f64> = runs.iter().filter_map(|&r| f(r)).collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

//! Configuration parameters for offset estimation
//!
//! All parameters are plain values with documented defaults. There is no
//! global configuration: every pipeline invocation receives its own
//! [`AlignmentConfig`], validated once before any audio is processed.
//!
//! The defaults are starting points carried over from tuning runs, not
//! validated constants.

use serde::{Deserialize, Serialize};

use crate::alignment::axis::MAX_OFFSET_FRAMES;
use crate::alignment::event_map::ProminenceThreshold;
use crate::error::AlignmentError;
use crate::features::FeatureType;

/// Per-feature weights used when fusing error curves
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureWeights {
    /// Onset energy weight (default: 1.0)
    pub onset: f64,
    /// Spectral flux weight (default: 1.0)
    pub spectral_flux: f64,
    /// Crest factor weight (default: 0.5)
    pub crest_factor: f64,
    /// Chroma class weight (default: 0.5)
    pub chroma: f64,
}

impl Default for FeatureWeights {
    fn default() -> Self {
        Self {
            onset: 1.0,
            spectral_flux: 1.0,
            crest_factor: 0.5,
            chroma: 0.5,
        }
    }
}

impl FeatureWeights {
    /// Weight assigned to one feature type
    pub fn weight(&self, feature: FeatureType) -> f64 {
        match feature {
            FeatureType::OnsetEnergy => self.onset,
            FeatureType::SpectralFlux => self.spectral_flux,
            FeatureType::CrestFactor => self.crest_factor,
            FeatureType::Chroma => self.chroma,
        }
    }

    /// Feature types with a non-zero weight, in canonical order
    pub fn active_features(&self) -> Vec<FeatureType> {
        FeatureType::ALL
            .iter()
            .copied()
            .filter(|&f| self.weight(f) > 0.0)
            .collect()
    }
}

/// How chroma classes are compared by the offset scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChromaMatching {
    /// Mean of a mismatch indicator (classes equal or not)
    Exact,
    /// Mean squared circular distance between pitch classes
    Continuous,
}

/// How the final offset candidate is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusStrategy {
    /// Scan the whole overlap once and take the fused curve's minimum
    GlobalArgmin,
    /// Scan overlapping windows and cluster their local minima
    WindowedClusters,
}

/// Alignment configuration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    /// Expected sample rate of both buffers in Hz (default: 44100)
    pub sample_rate: u32,

    /// Analysis frame length in samples (default: 2048)
    pub frame_length: usize,

    /// Hop lengths analysed in parallel (default: [256, 512, 1024])
    /// The smallest hop defines the common offset axis.
    pub hop_lengths: Vec<usize>,

    /// How far the rendition may start *before* the reference (default: 200 ms)
    /// At most `max_duration_s` and [`MAX_OFFSET_FRAMES`] frames of the finest hop.
    pub lookahead_ms: f64,

    /// How far the rendition may start *after* the reference (default: 800 ms)
    /// Same bounds as `lookahead_ms`.
    pub lookbehind_ms: f64,

    /// Feature weights for fusion
    pub weights: FeatureWeights,

    /// Event map decay factor per frame, in (0, 1) (default: 0.8)
    pub decay: f32,

    /// Peak prominence threshold for event maps (default: 0.8 quantile)
    pub prominence: ProminenceThreshold,

    /// Chroma comparison policy (default: Exact)
    pub chroma_matching: ChromaMatching,

    /// Consensus policy (default: GlobalArgmin)
    pub consensus: ConsensusStrategy,

    /// Window length for the windowed consensus (default: 10000 ms)
    pub window_ms: f64,

    /// Step between consecutive windows (default: 2500 ms)
    pub window_step_ms: f64,

    /// Number of most prominent windows kept for clustering (default: 20)
    pub top_windows: usize,

    /// Minima shallower than this fraction of their window's most prominent
    /// minimum are not clustered, in [0, 1] (default: 0.0, all kept)
    pub min_relative_prominence: f64,

    /// Mean-shift bandwidth in offset-axis frames (default: 3.0)
    pub cluster_bandwidth: f64,

    /// Score added per clustered candidate on top of its weight (default: 0.5)
    pub base_score: f64,

    /// Kalman process noise along the offset axis (default: 0.05)
    pub smoother_process_noise: f64,

    /// Kalman measurement noise per resolution (default: 1.0)
    pub smoother_measurement_noise: f64,

    /// Minimum relative error improvement over the zero offset (default: 0.3)
    /// Candidates that do not beat the baseline by this fraction fall back to 0.
    pub min_improvement: f64,

    /// Largest offset magnitude treated as plausible (default: 700 ms)
    pub trust_bound_ms: f64,

    /// Buffers are truncated to this duration before analysis (default: 180 s)
    pub max_duration_s: f32,

    /// Buffers with RMS below this level are unusable (default: -60 dB)
    pub silence_threshold_db: f32,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            frame_length: 2048,
            hop_lengths: vec![256, 512, 1024],
            lookahead_ms: 200.0,
            lookbehind_ms: 800.0,
            weights: FeatureWeights::default(),
            decay: 0.8,
            prominence: ProminenceThreshold::Quantile(0.8),
            chroma_matching: ChromaMatching::Exact,
            consensus: ConsensusStrategy::GlobalArgmin,
            window_ms: 10_000.0,
            window_step_ms: 2_500.0,
            top_windows: 20,
            min_relative_prominence: 0.0,
            cluster_bandwidth: 3.0,
            base_score: 0.5,
            smoother_process_noise: 0.05,
            smoother_measurement_noise: 1.0,
            min_improvement: 0.3,
            trust_bound_ms: 700.0,
            max_duration_s: 180.0,
            silence_threshold_db: -60.0,
        }
    }
}

fn invalid(msg: impl Into<String>) -> AlignmentError {
    AlignmentError::InvalidConfig(msg.into())
}

fn check_non_negative(name: &str, value: f64) -> Result<(), AlignmentError> {
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(format!("{} must be finite and >= 0, got {}", name, value)));
    }
    Ok(())
}

fn check_positive(name: &str, value: f64) -> Result<(), AlignmentError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(format!("{} must be finite and > 0, got {}", name, value)));
    }
    Ok(())
}

impl AlignmentConfig {
    /// Validate every parameter
    ///
    /// # Errors
    ///
    /// Returns `AlignmentError::InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> Result<(), AlignmentError> {
        if self.sample_rate == 0 {
            return Err(invalid("sample_rate must be > 0"));
        }

        if self.frame_length < 2 {
            return Err(invalid(format!(
                "frame_length must be >= 2, got {}",
                self.frame_length
            )));
        }

        if self.hop_lengths.is_empty() {
            return Err(invalid("hop_lengths must not be empty"));
        }
        for (i, &hop) in self.hop_lengths.iter().enumerate() {
            if hop == 0 {
                return Err(invalid("hop_lengths must all be > 0"));
            }
            if self.hop_lengths[..i].contains(&hop) {
                return Err(invalid(format!("duplicate hop length {}", hop)));
            }
        }

        check_non_negative("lookahead_ms", self.lookahead_ms)?;
        check_non_negative("lookbehind_ms", self.lookbehind_ms)?;

        let w = &self.weights;
        for (name, value) in [
            ("weights.onset", w.onset),
            ("weights.spectral_flux", w.spectral_flux),
            ("weights.crest_factor", w.crest_factor),
            ("weights.chroma", w.chroma),
        ] {
            check_non_negative(name, value)?;
        }
        if w.active_features().is_empty() {
            return Err(invalid("at least one feature weight must be > 0"));
        }

        if !(self.decay > 0.0 && self.decay < 1.0) {
            return Err(invalid(format!("decay must be in (0, 1), got {}", self.decay)));
        }

        match self.prominence {
            ProminenceThreshold::Absolute(x) => {
                check_non_negative("prominence", x as f64)?;
            }
            ProminenceThreshold::Quantile(q) => {
                if !(0.0..=1.0).contains(&q) {
                    return Err(invalid(format!(
                        "prominence quantile must be in [0, 1], got {}",
                        q
                    )));
                }
            }
        }

        check_positive("window_ms", self.window_ms)?;
        check_positive("window_step_ms", self.window_step_ms)?;
        if self.top_windows == 0 {
            return Err(invalid("top_windows must be >= 1"));
        }
        if !(0.0..=1.0).contains(&self.min_relative_prominence) {
            return Err(invalid(format!(
                "min_relative_prominence must be in [0, 1], got {}",
                self.min_relative_prominence
            )));
        }
        check_positive("cluster_bandwidth", self.cluster_bandwidth)?;
        check_non_negative("base_score", self.base_score)?;

        check_positive("smoother_process_noise", self.smoother_process_noise)?;
        check_positive("smoother_measurement_noise", self.smoother_measurement_noise)?;

        if !(0.0..1.0).contains(&self.min_improvement) {
            return Err(invalid(format!(
                "min_improvement must be in [0, 1), got {}",
                self.min_improvement
            )));
        }

        check_non_negative("trust_bound_ms", self.trust_bound_ms)?;
        check_positive("max_duration_s", self.max_duration_s as f64)?;
        self.check_search_range("lookahead_ms", self.lookahead_ms)?;
        self.check_search_range("lookbehind_ms", self.lookbehind_ms)?;

        if !self.silence_threshold_db.is_finite() {
            return Err(invalid("silence_threshold_db must be finite"));
        }

        Ok(())
    }

    /// A search bound must fit in the analysed duration and in the offset axis
    fn check_search_range(&self, name: &str, ms: f64) -> Result<(), AlignmentError> {
        let ceiling_ms = self.max_duration_s as f64 * 1000.0;
        if ms > ceiling_ms {
            return Err(invalid(format!(
                "{} must be <= max_duration_s ({} ms), got {}",
                name, ceiling_ms, ms
            )));
        }
        let frames = (ms / self.frame_ms(self.base_hop())).round();
        if frames > MAX_OFFSET_FRAMES as f64 {
            return Err(invalid(format!(
                "{} spans {} frames at hop {}, limit is {}",
                name,
                frames,
                self.base_hop(),
                MAX_OFFSET_FRAMES
            )));
        }
        Ok(())
    }

    /// Finest configured hop; it defines the common offset axis
    pub fn base_hop(&self) -> usize {
        self.hop_lengths.iter().copied().min().unwrap_or(512)
    }

    /// Duration of one frame at `hop_length`, in milliseconds
    pub fn frame_ms(&self, hop_length: usize) -> f64 {
        hop_length as f64 * 1000.0 / self.sample_rate as f64
    }

    /// Number of whole frames at `hop_length` covering `ms` (rounded)
    pub fn ms_to_frames(&self, ms: f64, hop_length: usize) -> usize {
        (ms / self.frame_ms(hop_length)).round().max(0.0) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AlignmentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.base_hop(), 256);
    }

    #[test]
    fn test_invalid_decay_rejected() {
        for decay in [0.0f32, 1.0, -0.5, f32::NAN] {
            let config = AlignmentConfig {
                decay,
                ..Default::default()
            };
            let err = config.validate().unwrap_err();
            assert!(err.is_fatal());
            assert!(err.to_string().contains("decay"), "{}", err);
        }
    }

    #[test]
    fn test_invalid_hops_rejected() {
        let empty = AlignmentConfig {
            hop_lengths: vec![],
            ..Default::default()
        };
        assert!(empty.validate().is_err());

        let zero = AlignmentConfig {
            hop_lengths: vec![512, 0],
            ..Default::default()
        };
        assert!(zero.validate().is_err());

        let dup = AlignmentConfig {
            hop_lengths: vec![512, 256, 512],
            ..Default::default()
        };
        assert!(dup.validate().is_err());
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let negative = AlignmentConfig {
            weights: FeatureWeights {
                chroma: -1.0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(negative.validate().is_err());

        let all_zero = AlignmentConfig {
            weights: FeatureWeights {
                onset: 0.0,
                spectral_flux: 0.0,
                crest_factor: 0.0,
                chroma: 0.0,
            },
            ..Default::default()
        };
        assert!(all_zero.validate().is_err());
    }

    #[test]
    fn test_invalid_bandwidth_and_quantile_rejected() {
        let bw = AlignmentConfig {
            cluster_bandwidth: 0.0,
            ..Default::default()
        };
        assert!(bw.validate().is_err());

        let q = AlignmentConfig {
            prominence: ProminenceThreshold::Quantile(1.5),
            ..Default::default()
        };
        assert!(q.validate().is_err());

        let floor = AlignmentConfig {
            min_relative_prominence: 1.5,
            ..Default::default()
        };
        assert!(floor.validate().is_err());

        let improvement = AlignmentConfig {
            min_improvement: 1.0,
            ..Default::default()
        };
        assert!(improvement.validate().is_err());
    }

    #[test]
    fn test_invalid_lookbehind_rejected() {
        for lookbehind_ms in [-1.0, f64::NAN, f64::INFINITY, 1e20, 181_000.0] {
            let config = AlignmentConfig {
                lookbehind_ms,
                ..Default::default()
            };
            let err = config.validate().unwrap_err();
            assert!(err.is_fatal());
            assert!(err.to_string().contains("lookbehind_ms"), "{}", err);
        }

        // within max_duration_s but too many frames at a one-sample hop
        let fine = AlignmentConfig {
            hop_lengths: vec![1],
            lookahead_ms: 60_000.0,
            ..Default::default()
        };
        let err = fine.validate().unwrap_err();
        assert!(err.to_string().contains("lookahead_ms"), "{}", err);

        let wide = AlignmentConfig {
            lookbehind_ms: 5_500.0,
            ..Default::default()
        };
        assert!(wide.validate().is_ok());
    }

    #[test]
    fn test_frame_conversions() {
        let config = AlignmentConfig::default();
        let ms = config.frame_ms(512);
        assert!((ms - 11.609977).abs() < 1e-4);
        assert_eq!(config.ms_to_frames(800.0, 512), 69);
        assert_eq!(config.ms_to_frames(0.0, 256), 0);
    }

    #[test]
    fn test_active_features_skip_zero_weights() {
        let weights = FeatureWeights {
            crest_factor: 0.0,
            ..Default::default()
        };
        let active = weights.active_features();
        assert_eq!(active.len(), 3);
        assert!(!active.contains(&FeatureType::CrestFactor));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: AlignmentConfig =
            serde_json::from_str(r#"{"lookbehind_ms": 5000.0, "prominence": {"absolute": 0.1}}"#)
                .unwrap();
        assert_eq!(config.lookbehind_ms, 5000.0);
        assert_eq!(config.prominence, ProminenceThreshold::Absolute(0.1));
        assert_eq!(config.hop_lengths, vec![256, 512, 1024]);
        assert!(config.validate().is_ok());
    }
}

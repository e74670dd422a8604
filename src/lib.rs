//! # Rendition Sync
//!
//! Estimates the constant time offset between a reference recording and a
//! rendition of the same performance (for example a choir part recorded while
//! listening to a backing track), so the rendition can be trimmed or padded
//! into sync.
//!
//! ## Features
//!
//! - **Multi-feature**: onset energy, spectral flux, crest factor and chroma class
//! - **Multi-resolution**: every feature at several hop lengths, fused on one offset axis
//! - **Robust**: prominence-based event maps, Kalman smoothing, windowed mean-shift consensus
//! - **Safe fallbacks**: offsets that do not clearly beat zero, or exceed the trust bound, report 0
//!
//! ## Quick Start
//!
//! ```no_run
//! use rendition_sync::{align, AlignmentConfig, AudioBuffer};
//!
//! // Mono f32 samples at the configured sample rate
//! let reference = AudioBuffer::new(vec![], 44100).with_id("choir+song+reference.mp3");
//! let rendition = AudioBuffer::new(vec![], 44100).with_id("choir+song+alto.mp3");
//!
//! let result = align(&reference, &rendition, &AlignmentConfig::default())?;
//! println!("offset: {} ms ({:?})", result.offset_ms, result.status);
//! # Ok::<(), rendition_sync::AlignmentError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Buffers → Preprocessing → Feature Extraction → Event Maps → Offset Scan
//!         → Fusion → Consensus → Guard → AlignmentResult
//! ```
//!
//! A positive offset means the rendition starts later than the reference.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod alignment;
pub mod analysis;
pub mod config;
pub mod error;
pub mod features;
pub mod io;
pub mod preprocessing;

// Re-export main types
pub use alignment::Aligner;
pub use analysis::metadata::{AlignmentFlag, AlignmentMetadata};
pub use analysis::result::{AlignmentResult, AlignmentStatus};
pub use config::{AlignmentConfig, ChromaMatching, ConsensusStrategy, FeatureWeights};
pub use error::AlignmentError;
pub use features::{FeatureCache, FeatureType};
pub use io::{AudioBuffer, PartKey};

/// Main alignment function
///
/// Estimates the offset of `rendition` relative to `reference`.
///
/// # Arguments
///
/// * `reference` - Reference recording (mono)
/// * `rendition` - Recording to align (mono, same sample rate)
/// * `config` - Alignment configuration parameters
///
/// # Returns
///
/// `AlignmentResult` with the offset in milliseconds, the residual error and
/// a status. Unusable input yields offset 0 with status `Degraded`.
///
/// # Errors
///
/// Returns `AlignmentError::InvalidConfig` if the configuration is invalid;
/// nothing else is an error.
///
/// # Example
///
/// ```
/// use rendition_sync::{align, AlignmentConfig, AlignmentStatus, AudioBuffer};
///
/// let reference = AudioBuffer::new(vec![0.1f32; 44100], 44100).with_id("ref");
/// let rendition = AudioBuffer::new(vec![0.0f32; 44100], 44100).with_id("alto");
/// let result = align(&reference, &rendition, &AlignmentConfig::default())?;
/// assert_eq!(result.offset_ms, 0);
/// assert_eq!(result.status, AlignmentStatus::Degraded);
/// # Ok::<(), rendition_sync::AlignmentError>(())
/// ```
pub fn align(
    reference: &AudioBuffer,
    rendition: &AudioBuffer,
    config: &AlignmentConfig,
) -> Result<AlignmentResult, AlignmentError> {
    let aligner = Aligner::new(config.clone())?;
    Ok(aligner.align(reference, rendition))
}

/// Align several renditions against one reference
///
/// The reference features are extracted once and shared through a single
/// cache. Results are in input order.
///
/// # Errors
///
/// Returns `AlignmentError::InvalidConfig` if the configuration is invalid.
pub fn align_all(
    reference: &AudioBuffer,
    renditions: &[AudioBuffer],
    config: &AlignmentConfig,
) -> Result<Vec<AlignmentResult>, AlignmentError> {
    let aligner = Aligner::new(config.clone())?;
    let mut cache = FeatureCache::new();

    let results: Vec<AlignmentResult> = renditions
        .iter()
        .map(|rendition| aligner.align_with_cache(reference, rendition, &mut cache))
        .collect();

    let stats = cache.stats();
    log::debug!(
        "Aligned {} renditions (cache: {} hits, {} misses)",
        results.len(),
        stats.hits,
        stats.misses
    );

    Ok(results)
}

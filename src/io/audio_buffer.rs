//! Caller-owned mono sample buffers

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Decoded mono PCM audio handed to the pipeline
///
/// The pipeline only ever borrows buffers; decoding and resampling happen
/// before a buffer is constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Identifier reported back in the result (e.g. an object key)
    id: String,
    /// Mono samples, nominally in [-1.0, 1.0]
    samples: Vec<f32>,
    /// Sample rate in Hz
    sample_rate: u32,
}

impl AudioBuffer {
    /// Create a buffer with an empty id
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            id: String::new(),
            samples,
            sample_rate,
        }
    }

    /// Attach an identifier
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Identifier of this buffer
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True if the buffer holds no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds (0.0 for an invalid sample rate)
    pub fn duration_seconds(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Content fingerprint: hash of the sample rate and the exact sample bits
    ///
    /// Two buffers with the same fingerprint are treated as identical by the
    /// feature cache. The id does not participate.
    pub fn fingerprint(&self) -> u64 {
        fingerprint_samples(&self.samples, self.sample_rate)
    }
}

/// Hash of a sample rate and the exact bit patterns of `samples`
pub fn fingerprint_samples(samples: &[f32], sample_rate: u32) -> u64 {
    let mut hasher = DefaultHasher::new();
    sample_rate.hash(&mut hasher);
    samples.len().hash(&mut hasher);
    for s in samples {
        s.to_bits().hash(&mut hasher);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration() {
        let buffer = AudioBuffer::new(vec![0.0; 22050], 44100);
        assert!((buffer.duration_seconds() - 0.5).abs() < 1e-6);
        assert_eq!(AudioBuffer::new(vec![0.0; 10], 0).duration_seconds(), 0.0);
    }

    #[test]
    fn test_fingerprint_ignores_id() {
        let a = AudioBuffer::new(vec![0.1, 0.2, 0.3], 44100).with_id("a");
        let b = AudioBuffer::new(vec![0.1, 0.2, 0.3], 44100).with_id("b");
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_depends_on_content_and_rate() {
        let a = AudioBuffer::new(vec![0.1, 0.2, 0.3], 44100);
        let b = AudioBuffer::new(vec![0.1, 0.2, 0.30001], 44100);
        let c = AudioBuffer::new(vec![0.1, 0.2, 0.3], 48000);
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}

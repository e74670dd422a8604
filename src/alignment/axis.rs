//! Offset ranges and the common offset axis
//!
//! Offsets are counted in frames of a given hop. A positive offset means the
//! rendition starts later than the reference (its events appear later), a
//! negative one that it starts earlier.

use crate::config::AlignmentConfig;

/// Largest number of frames scanned on either side of offset 0
pub const MAX_OFFSET_FRAMES: usize = 1 << 20;

fn clamp_frames(frames: usize) -> i64 {
    i64::try_from(frames.min(MAX_OFFSET_FRAMES)).unwrap_or(MAX_OFFSET_FRAMES as i64)
}

/// Inclusive range of frame offsets scanned at one hop length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetRange {
    /// Most negative offset (`-lookahead` in frames), always <= 0
    pub min: i64,
    /// Most positive offset (`+lookbehind` in frames), always >= 0
    pub max: i64,
}

impl OffsetRange {
    /// Range `[-lookahead, +lookbehind]` in frames
    ///
    /// Each side is clamped to [`MAX_OFFSET_FRAMES`], so offset 0 is always
    /// inside the range.
    pub fn new(lookahead_frames: usize, lookbehind_frames: usize) -> Self {
        Self {
            min: -clamp_frames(lookahead_frames),
            max: clamp_frames(lookbehind_frames),
        }
    }

    /// Range covering the configured look-ahead/look-behind at `hop_length`
    pub fn for_hop(config: &AlignmentConfig, hop_length: usize) -> Self {
        Self::new(
            config.ms_to_frames(config.lookahead_ms, hop_length),
            config.ms_to_frames(config.lookbehind_ms, hop_length),
        )
    }

    /// Number of offsets in the range
    pub fn len(&self) -> usize {
        (self.max - self.min + 1) as usize
    }

    /// Never empty: offset 0 is always included
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Offsets in ascending order
    pub fn offsets(&self) -> impl Iterator<Item = i64> {
        self.min..=self.max
    }

    /// Position of offset `k` in the curve, if inside the range
    pub fn index_of(&self, k: i64) -> Option<usize> {
        if k < self.min || k > self.max {
            None
        } else {
            Some((k - self.min) as usize)
        }
    }

    /// Position of offset 0
    pub fn zero_index(&self) -> usize {
        (-self.min) as usize
    }
}

/// The finest-resolution axis every error curve is projected onto
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetAxis {
    /// Hop length (samples) of one axis step
    pub hop_length: usize,
    /// Duration of one axis step in milliseconds
    pub frame_ms: f64,
    /// Offsets covered by the axis, in axis frames
    pub range: OffsetRange,
}

impl OffsetAxis {
    /// Axis at the smallest configured hop
    pub fn from_config(config: &AlignmentConfig) -> Self {
        let hop_length = config.base_hop();
        Self {
            hop_length,
            frame_ms: config.frame_ms(hop_length),
            range: OffsetRange::for_hop(config, hop_length),
        }
    }

    /// Number of axis positions
    pub fn len(&self) -> usize {
        self.range.len()
    }

    /// Never empty
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Index of the zero offset
    pub fn zero_index(&self) -> usize {
        self.range.zero_index()
    }

    /// Offset in milliseconds of a (possibly fractional) axis position
    pub fn position_to_ms(&self, position: f64) -> f64 {
        (position + self.range.min as f64) * self.frame_ms
    }

    /// Offset in milliseconds of axis index `idx`
    pub fn index_to_ms(&self, idx: usize) -> f64 {
        self.position_to_ms(idx as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_range_indices() {
        let range = OffsetRange::new(3, 5);
        assert_eq!(range.len(), 9);
        assert_eq!(range.zero_index(), 3);
        assert_eq!(range.index_of(-3), Some(0));
        assert_eq!(range.index_of(5), Some(8));
        assert_eq!(range.index_of(6), None);
        assert_eq!(range.offsets().collect::<Vec<_>>().first(), Some(&-3));
    }

    #[test]
    fn test_oversized_range_is_clamped() {
        let range = OffsetRange::new(usize::MAX, 7);
        assert_eq!(range.min, -(MAX_OFFSET_FRAMES as i64));
        assert_eq!(range.max, 7);
        assert_eq!(range.len(), MAX_OFFSET_FRAMES + 8);
        assert_eq!(range.index_of(0), Some(range.zero_index()));

        let config = AlignmentConfig {
            lookbehind_ms: 1e20,
            ..Default::default()
        };
        let range = OffsetRange::for_hop(&config, 256);
        assert!(range.min <= 0 && range.max >= 0);
        assert_eq!(range.max, MAX_OFFSET_FRAMES as i64);
    }

    #[test]
    fn test_axis_from_default_config() {
        let config = AlignmentConfig::default();
        let axis = OffsetAxis::from_config(&config);
        assert_eq!(axis.hop_length, 256);
        // 200 ms ≈ 34.45 frames, 800 ms ≈ 137.8 frames at hop 256
        assert_eq!(axis.range, OffsetRange { min: -34, max: 138 });
        assert_eq!(axis.index_to_ms(axis.zero_index()), 0.0);
        assert!((axis.index_to_ms(axis.zero_index() + 1) - 5.80499).abs() < 1e-4);
    }
}

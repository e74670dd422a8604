//! Alignment result types

use serde::{Deserialize, Serialize};

use super::metadata::AlignmentMetadata;

/// How the reported offset was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentStatus {
    /// A candidate passed every check and was reported
    Aligned,
    /// Both buffers are the same recording; offset 0 by definition
    SelfReference,
    /// An input was unusable (silent, too short, wrong sample rate)
    Degraded,
    /// No offset candidate could be found
    NoCandidate,
    /// The zero offset matched at least as well as the best candidate
    ZeroPreferred,
    /// The best candidate did not improve enough on the zero offset
    Inconclusive,
    /// The best candidate lies outside the trusted offset range
    TrustBoundExceeded,
}

impl AlignmentStatus {
    /// True if the reported offset is a fallback to 0 rather than an estimate
    ///
    /// # Example
    ///
    /// ```
    /// use rendition_sync::analysis::result::AlignmentStatus;
    ///
    /// assert!(!AlignmentStatus::Aligned.is_fallback());
    /// assert!(!AlignmentStatus::SelfReference.is_fallback());
    /// assert!(AlignmentStatus::TrustBoundExceeded.is_fallback());
    /// ```
    pub fn is_fallback(&self) -> bool {
        !matches!(self, AlignmentStatus::Aligned | AlignmentStatus::SelfReference)
    }

    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            AlignmentStatus::Aligned => "aligned",
            AlignmentStatus::SelfReference => "self_reference",
            AlignmentStatus::Degraded => "degraded",
            AlignmentStatus::NoCandidate => "no_candidate",
            AlignmentStatus::ZeroPreferred => "zero_preferred",
            AlignmentStatus::Inconclusive => "inconclusive",
            AlignmentStatus::TrustBoundExceeded => "trust_bound_exceeded",
        }
    }
}

/// Complete alignment result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResult {
    /// Estimated offset in milliseconds
    ///
    /// Positive: the rendition starts later than the reference (trim its
    /// start). Negative: it starts earlier (pad its start). Zero on fallback.
    pub offset_ms: i64,

    /// Raw alignment error at the reported offset (lower is better)
    pub error: f64,

    /// Reference buffer identifier
    pub reference_id: String,

    /// Rendition buffer identifier
    pub rendition_id: String,

    /// How the offset was obtained
    pub status: AlignmentStatus,

    /// Diagnostics
    pub metadata: AlignmentMetadata,
}

impl AlignmentResult {
    /// Zero-offset result with the given status
    pub fn fallback(
        reference_id: &str,
        rendition_id: &str,
        status: AlignmentStatus,
        error: f64,
        metadata: AlignmentMetadata,
    ) -> Self {
        Self {
            offset_ms: 0,
            error,
            reference_id: reference_id.to_string(),
            rendition_id: rendition_id.to_string(),
            status,
            metadata,
        }
    }

    /// True if the offset is an actual estimate
    pub fn is_aligned(&self) -> bool {
        self.status == AlignmentStatus::Aligned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&AlignmentStatus::TrustBoundExceeded).unwrap();
        assert_eq!(json, "\"trust_bound_exceeded\"");
        for status in [
            AlignmentStatus::Aligned,
            AlignmentStatus::SelfReference,
            AlignmentStatus::Degraded,
            AlignmentStatus::NoCandidate,
            AlignmentStatus::ZeroPreferred,
            AlignmentStatus::Inconclusive,
            AlignmentStatus::TrustBoundExceeded,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.name()));
        }
    }

    #[test]
    fn test_fallback_result() {
        let metadata = AlignmentMetadata::default();
        let r = AlignmentResult::fallback("ref", "alto", AlignmentStatus::Degraded, 0.0, metadata);
        assert_eq!(r.offset_ms, 0);
        assert!(!r.is_aligned());
        assert!(r.status.is_fallback());
        assert_eq!(r.rendition_id, "alto");
    }
}

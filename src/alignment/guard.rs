//! Fallback guard
//!
//! Decides whether the best candidate is reported or replaced by offset 0.
//! Checks run in order; the first failing check names the fallback status:
//!
//! 1. A candidate exists (`NoCandidate`)
//! 2. It beats the zero offset (`ZeroPreferred`)
//! 3. The relative improvement `(e0 - e*) / e0` reaches `min_improvement`
//!    (`Inconclusive`)
//! 4. `|offset| <= trust_bound_ms` (`TrustBoundExceeded`)
//!
//! On fallback the reported error is the zero-offset error.

use crate::analysis::result::AlignmentStatus;

/// Guard thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuardParams {
    /// Minimum relative improvement over the zero offset
    pub min_improvement: f64,
    /// Largest plausible offset magnitude in milliseconds
    pub trust_bound_ms: f64,
}

/// Best candidate handed to the guard
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Offset in milliseconds
    pub offset_ms: f64,
    /// Raw error at the offset
    pub error: f64,
}

/// Guard outcome
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuardDecision {
    /// Reported offset (0 on fallback)
    pub offset_ms: i64,
    /// Reported error
    pub error: f64,
    /// Status
    pub status: AlignmentStatus,
}

/// Apply the fallback checks
pub fn apply_guard(
    candidate: Option<Candidate>,
    baseline_error: f64,
    params: &GuardParams,
) -> GuardDecision {
    let baseline_error = if baseline_error.is_finite() { baseline_error } else { 0.0 };
    let fallback = |status: AlignmentStatus| GuardDecision {
        offset_ms: 0,
        error: baseline_error,
        status,
    };

    let usable = |c: &Candidate| c.offset_ms.is_finite() && c.error.is_finite();
    let Some(candidate) = candidate.filter(usable) else {
        log::debug!("Guard: no candidate, falling back to 0");
        return fallback(AlignmentStatus::NoCandidate);
    };

    if baseline_error <= candidate.error {
        log::debug!(
            "Guard: zero offset error {:.6} <= candidate error {:.6} at {:.1} ms",
            baseline_error,
            candidate.error,
            candidate.offset_ms
        );
        return fallback(AlignmentStatus::ZeroPreferred);
    }

    let improvement = (baseline_error - candidate.error) / baseline_error;
    if improvement < params.min_improvement {
        log::debug!(
            "Guard: improvement {:.3} < {:.3} at {:.1} ms",
            improvement,
            params.min_improvement,
            candidate.offset_ms
        );
        return fallback(AlignmentStatus::Inconclusive);
    }

    if candidate.offset_ms.abs() > params.trust_bound_ms {
        log::warn!(
            "Guard: candidate {:.1} ms outside trust bound {:.1} ms",
            candidate.offset_ms,
            params.trust_bound_ms
        );
        return fallback(AlignmentStatus::TrustBoundExceeded);
    }

    GuardDecision {
        offset_ms: candidate.offset_ms.round() as i64,
        error: candidate.error,
        status: AlignmentStatus::Aligned,
    }
}

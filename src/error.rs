//! Error types for the alignment engine
//!
//! Only configuration problems surface as errors from the public pipeline.
//! Unusable audio degrades to a zero-offset [`AlignmentResult`] instead.
//!
//! [`AlignmentResult`]: crate::analysis::result::AlignmentResult

use std::fmt;

/// Errors that can occur while configuring or running alignment
#[derive(Debug, Clone, PartialEq)]
pub enum AlignmentError {
    /// Invalid configuration parameters (fatal, raised before any audio is touched)
    InvalidConfig(String),

    /// Invalid input audio (empty, too short, silent, mismatched sample rate)
    InvalidInput(String),

    /// Numerical error (non-finite or degenerate values)
    NumericalError(String),

    /// Processing error inside one pipeline stage
    ProcessingError(String),
}

impl fmt::Display for AlignmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlignmentError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            AlignmentError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AlignmentError::NumericalError(msg) => write!(f, "Numerical error: {}", msg),
            AlignmentError::ProcessingError(msg) => write!(f, "Processing error: {}", msg),
        }
    }
}

impl std::error::Error for AlignmentError {}

impl AlignmentError {
    /// True for error classes that must abort the caller (configuration only)
    pub fn is_fatal(&self) -> bool {
        matches!(self, AlignmentError::InvalidConfig(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        let e = AlignmentError::InvalidConfig("decay must be in (0, 1)".to_string());
        assert_eq!(e.to_string(), "Invalid configuration: decay must be in (0, 1)");

        let e = AlignmentError::InvalidInput("empty buffer".to_string());
        assert!(e.to_string().starts_with("Invalid input"));
    }

    #[test]
    fn test_only_config_errors_are_fatal() {
        assert!(AlignmentError::InvalidConfig(String::new()).is_fatal());
        assert!(!AlignmentError::InvalidInput(String::new()).is_fatal());
        assert!(!AlignmentError::NumericalError(String::new()).is_fatal());
        assert!(!AlignmentError::ProcessingError(String::new()).is_fatal());
    }
}

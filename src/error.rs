//! Error taxonomy shared by the watcher modules.
//!
//! Parse failures are recovered inside the loop, configuration errors are
//! fatal at startup, and capability failures stop the loop gracefully.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Why a capture did not yield a price.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadingError {
    /// OCR returned no text fragments at all.
    #[error("no number detected")]
    NoTextDetected,
    /// The first fragment is not a plain (comma-grouped) digit string.
    #[error("OCR result not numeric: '{0}'")]
    NotNumeric(String),
}

/// Problems with the persisted configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no configuration found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("missing configuration: {}", .missing.join(", "))]
    MissingConfiguration { missing: Vec<&'static str> },

    #[error("invalid region: width {width} and height {height} must both be positive")]
    InvalidRegion { width: i32, height: i32 },

    #[error("FEATURES.debounce cannot be combined with FEATURES.item_cycle")]
    DebounceWithItemCycle,

    #[error("invalid threshold value: '{0}'")]
    InvalidThreshold(String),

    #[error("failed to access configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The external operation that failed during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityKind {
    Capture,
    Recognize,
    Click,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityKind::Capture => write!(f, "capture"),
            CapabilityKind::Recognize => write!(f, "recognize"),
            CapabilityKind::Click => write!(f, "click"),
        }
    }
}

/// An unexpected error raised by a capability call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{capability} failed: {message}")]
pub struct CapabilityFailure {
    pub capability: CapabilityKind,
    pub message: String,
}

impl CapabilityFailure {
    /// Wraps an error from a capability implementation, keeping its full cause chain.
    pub fn from_error(capability: CapabilityKind, err: &anyhow::Error) -> Self {
        Self {
            capability,
            message: format!("{:#}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};

    #[test]
    fn test_reading_error_display() {
        assert_eq!(ReadingError::NoTextDetected.to_string(), "no number detected");
        assert_eq!(
            ReadingError::NotNumeric("19.5k".to_string()).to_string(),
            "OCR result not numeric: '19.5k'"
        );
    }

    #[test]
    fn test_missing_configuration_lists_keys() {
        let err = ConfigError::MissingConfiguration {
            missing: vec!["REGION", "ITEM_X"],
        };
        assert_eq!(err.to_string(), "missing configuration: REGION, ITEM_X");
    }

    #[test]
    fn test_capability_failure_keeps_cause_chain() {
        let err = Err::<(), _>(anyhow!("device lost"))
            .context("BitBlt failed")
            .unwrap_err();
        let failure = CapabilityFailure::from_error(CapabilityKind::Capture, &err);
        assert_eq!(failure.message, "BitBlt failed: device lost");
        assert_eq!(failure.to_string(), "capture failed: BitBlt failed: device lost");
    }
}

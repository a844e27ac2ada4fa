//! Error types shared by the codec, the metrics engine, and acquisition.

use thiserror::Error;

use crate::metrics::MetricKind;

/// Result alias used throughout the core.
pub type Result<T> = std::result::Result<T, PufError>;

/// Every failure the core can surface.
#[derive(Error, Debug)]
pub enum PufError {
    /// A cell is not valid hexadecimal or does not fit the response width.
    #[error("invalid response '{value}': {reason}")]
    Format { value: String, reason: String },

    /// Two bit strings of different widths were compared.
    #[error("length mismatch: {left} bits vs {right} bits")]
    LengthMismatch { left: usize, right: usize },

    /// A metric had zero eligible observations.
    #[error("no data for {metric}")]
    EmptyInput { metric: MetricKind },

    /// Column mapping rejected at construction.
    #[error("invalid column layout: {0}")]
    Layout(String),

    /// Configuration value out of range.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The capture loop ran out of reconnect attempts.
    #[error("gave up after {attempts} reconnect attempt(s)")]
    ReconnectExhausted { attempts: u32 },
}

impl PufError {
    pub(crate) fn format(value: &str, reason: impl Into<String>) -> Self {
        Self::Format {
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// True for the "no data" outcome, which is not a data-integrity failure.
    pub fn is_empty_input(&self) -> bool {
        matches!(self, Self::EmptyInput { .. })
    }
}

/// A metric computation aborted by a data-integrity error.
#[derive(Error, Debug)]
#[error("{metric} failed: {source}")]
pub struct EvaluationError {
    pub metric: MetricKind,
    #[source]
    pub source: PufError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_distinguishable() {
        let err = PufError::EmptyInput {
            metric: MetricKind::Robustness,
        };
        assert!(err.is_empty_input());
        assert_eq!(err.to_string(), "no data for robustness");

        let err = PufError::format("G0", "non-hex character 'G'");
        assert!(!err.is_empty_input());
    }

    #[test]
    fn evaluation_error_names_metric() {
        let err = EvaluationError {
            metric: MetricKind::Uniqueness,
            source: PufError::LengthMismatch {
                left: 128,
                right: 64,
            },
        };
        assert_eq!(
            err.to_string(),
            "uniqueness failed: length mismatch: 128 bits vs 64 bits"
        );
    }
}

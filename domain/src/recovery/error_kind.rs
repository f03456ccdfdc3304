//! Error taxonomy driving recovery decisions.

use serde::{Deserialize, Serialize};

/// Classification of a failure, independent of where it happened.
///
/// | Kind | Typical source | Retry helps? |
/// |------|----------------|--------------|
/// | `Transient` | timeouts, rate-limit responses, connection resets | yes |
/// | `Validation` | bad parameters, unsupported operation | after simplification |
/// | `CapabilityGap` | unknown tool, agent cannot do this | via fallback/delegation |
/// | `ResourceExhausted` | governor denial, open circuit | after waiting |
/// | `Terminal` | auth failures, fatal backend errors | no |
/// | `Cancelled` | task or engine shutdown | no |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transient,
    Validation,
    CapabilityGap,
    ResourceExhausted,
    Terminal,
    Cancelled,
}

impl ErrorKind {
    /// Classify a free-form error message.
    ///
    /// Messages that match nothing are treated as transient so the bounded
    /// retry budget gets a chance before anything more drastic.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

        if has(&["cancelled", "canceled"]) {
            Self::Cancelled
        } else if has(&["quota", "exhausted", "out of memory", "circuit open", "budget"]) {
            Self::ResourceExhausted
        } else if has(&["unauthorized", "forbidden", "401", "403", "permission denied", "fatal"]) {
            Self::Terminal
        } else if has(&[
            "unknown tool",
            "no such tool",
            "not implemented",
            "capability",
            "cannot handle",
        ]) {
            Self::CapabilityGap
        } else if has(&[
            "invalid",
            "validation",
            "missing",
            "malformed",
            "unsupported",
            "not supported",
            "400",
            "unprocessable",
        ]) {
            Self::Validation
        } else {
            Self::Transient
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Validation => "validation",
            Self::CapabilityGap => "capability_gap",
            Self::ResourceExhausted => "resource_exhausted",
            Self::Terminal => "terminal",
            Self::Cancelled => "cancelled",
        }
    }

    /// Worth re-issuing the same call after a delay
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient | Self::ResourceExhausted)
    }

    /// Any recovery strategy may apply
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Terminal | Self::Cancelled)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_common_messages() {
        assert_eq!(ErrorKind::classify("connection reset by peer"), ErrorKind::Transient);
        assert_eq!(ErrorKind::classify("request timed out"), ErrorKind::Transient);
        assert_eq!(ErrorKind::classify("HTTP 429 Too Many Requests"), ErrorKind::Transient);
        assert_eq!(ErrorKind::classify("monthly quota exhausted"), ErrorKind::ResourceExhausted);
        assert_eq!(ErrorKind::classify("missing field `query`"), ErrorKind::Validation);
        assert_eq!(ErrorKind::classify("unsupported operation: upload"), ErrorKind::Validation);
        assert_eq!(ErrorKind::classify("unknown tool: ocr"), ErrorKind::CapabilityGap);
        assert_eq!(ErrorKind::classify("403 Forbidden"), ErrorKind::Terminal);
        assert_eq!(ErrorKind::classify("task cancelled"), ErrorKind::Cancelled);
    }

    #[test]
    fn test_unmatched_message_is_transient() {
        assert_eq!(ErrorKind::classify("something odd happened"), ErrorKind::Transient);
    }

    #[test]
    fn test_retryable_and_recoverable() {
        assert!(ErrorKind::Transient.is_retryable());
        assert!(ErrorKind::ResourceExhausted.is_retryable());
        assert!(!ErrorKind::Validation.is_retryable());

        assert!(ErrorKind::CapabilityGap.is_recoverable());
        assert!(!ErrorKind::Terminal.is_recoverable());
        assert!(!ErrorKind::Cancelled.is_recoverable());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&ErrorKind::CapabilityGap).unwrap();
        assert_eq!(json, "\"capability_gap\"");
        assert_eq!(ErrorKind::ResourceExhausted.to_string(), "resource_exhausted");
    }
}

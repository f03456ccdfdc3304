//! Peer review verdicts

use super::parsing::parse_review_response;
use crate::agent::value_objects::AgentId;
use serde::{Deserialize, Serialize};

/// A reviewer's judgement of a completed result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewVerdict {
    pub reviewer: AgentId,
    pub approved: bool,
    pub feedback: String,
}

impl ReviewVerdict {
    pub fn new(reviewer: impl Into<AgentId>, approved: bool, feedback: impl Into<String>) -> Self {
        Self {
            reviewer: reviewer.into(),
            approved,
            feedback: feedback.into(),
        }
    }

    /// Build from a free-form review reply
    pub fn from_response(reviewer: impl Into<AgentId>, response: &str) -> Self {
        let (approved, feedback) = parse_review_response(response);
        Self::new(reviewer, approved, feedback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_response() {
        let v = ReviewVerdict::from_response("checker", "APPROVE - numbers match");
        assert!(v.approved);
        assert_eq!(v.reviewer.as_str(), "checker");
        assert_eq!(v.feedback, "APPROVE - numbers match");
    }
}

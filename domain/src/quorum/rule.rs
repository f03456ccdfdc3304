//! Voting algorithms for consensus determination

use serde::{Deserialize, Serialize};

const DEFAULT_SUPERMAJORITY: f64 = 0.67;

/// How cast votes are turned into a decision.
///
/// - `SimpleMajority`: more than half of cast votes (default)
/// - `Supermajority`: at least `threshold` of cast votes
/// - `Weighted`: weighted yes ≥ `threshold` × weight of cast votes, using
///   each voter's reputation score (or the vote's override)
/// - `DelegatedWeight`: like `Weighted`, but weight comes from the voter's role
///
/// Abstentions never count as cast votes.
///
/// # Example
///
/// ```
/// use orchestra_domain::quorum::VotingAlgorithm;
///
/// let rule = VotingAlgorithm::SimpleMajority;
/// assert!(rule.is_satisfied(3.0, 5.0));
/// assert!(!rule.is_satisfied(2.0, 4.0));
///
/// let strict = VotingAlgorithm::Supermajority { threshold: 0.67 };
/// assert!(!strict.is_satisfied(3.0, 5.0)); // 60%
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VotingAlgorithm {
    #[default]
    SimpleMajority,
    Supermajority { threshold: f64 },
    Weighted { threshold: f64 },
    DelegatedWeight { threshold: f64 },
}

/// Where a voter's weight comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightSource {
    /// Every vote counts 1
    Uniform,
    /// Reputation score or per-vote override
    Explicit,
    /// Derived from the voter's role
    Role,
}

impl VotingAlgorithm {
    /// Check the rule given the yes weight and the weight of all cast votes
    pub fn is_satisfied(&self, yes_weight: f64, cast_weight: f64) -> bool {
        if cast_weight <= 0.0 {
            return false;
        }
        match self {
            VotingAlgorithm::SimpleMajority => yes_weight > cast_weight / 2.0,
            VotingAlgorithm::Supermajority { threshold }
            | VotingAlgorithm::Weighted { threshold }
            | VotingAlgorithm::DelegatedWeight { threshold } => {
                // Tolerate float noise so 2/3 meets a 0.666.. threshold exactly
                yes_weight / cast_weight + 1e-9 >= *threshold
            }
        }
    }

    pub fn weight_source(&self) -> WeightSource {
        match self {
            VotingAlgorithm::SimpleMajority | VotingAlgorithm::Supermajority { .. } => {
                WeightSource::Uniform
            }
            VotingAlgorithm::Weighted { .. } => WeightSource::Explicit,
            VotingAlgorithm::DelegatedWeight { .. } => WeightSource::Role,
        }
    }

    pub fn description(&self) -> String {
        match self {
            VotingAlgorithm::SimpleMajority => "simple majority (more than half)".to_string(),
            VotingAlgorithm::Supermajority { threshold } => {
                format!("supermajority (at least {:.0}%)", threshold * 100.0)
            }
            VotingAlgorithm::Weighted { threshold } => {
                format!("weighted (at least {:.0}% of weight)", threshold * 100.0)
            }
            VotingAlgorithm::DelegatedWeight { threshold } => {
                format!("delegated weight (at least {:.0}% of role weight)", threshold * 100.0)
            }
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            VotingAlgorithm::SimpleMajority => Ok(()),
            VotingAlgorithm::Supermajority { threshold }
            | VotingAlgorithm::Weighted { threshold }
            | VotingAlgorithm::DelegatedWeight { threshold } => {
                if *threshold > 0.0 && *threshold <= 1.0 {
                    Ok(())
                } else {
                    Err(format!("threshold must be in (0, 1], got {}", threshold))
                }
            }
        }
    }
}

impl std::fmt::Display for VotingAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

fn parse_threshold(s: &str) -> Result<f64, String> {
    let s = s.trim();
    let value = if let Some(pct) = s.strip_suffix('%') {
        pct.trim()
            .parse::<f64>()
            .map_err(|_| format!("Invalid percentage: {}", s))?
            / 100.0
    } else {
        let v = s.parse::<f64>().map_err(|_| format!("Invalid threshold: {}", s))?;
        if v > 1.0 { v / 100.0 } else { v }
    };
    Ok(value)
}

impl std::str::FromStr for VotingAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let (name, arg) = match lower.split_once(':') {
            Some((n, a)) => (n.to_string(), Some(a.to_string())),
            None => (lower.clone(), None),
        };
        let threshold = |default: f64| -> Result<f64, String> {
            arg.as_deref().map(parse_threshold).unwrap_or(Ok(default))
        };

        let algorithm = match name.as_str() {
            "majority" | "simple_majority" => VotingAlgorithm::SimpleMajority,
            "supermajority" => VotingAlgorithm::Supermajority {
                threshold: threshold(DEFAULT_SUPERMAJORITY)?,
            },
            "weighted" => VotingAlgorithm::Weighted {
                threshold: threshold(0.5)?,
            },
            "delegated" | "delegated_weight" => VotingAlgorithm::DelegatedWeight {
                threshold: threshold(0.5)?,
            },
            n if n.ends_with('%') => VotingAlgorithm::Supermajority {
                threshold: parse_threshold(n)?,
            },
            _ => {
                return Err(format!(
                    "Unknown voting algorithm: {}. Valid: majority, supermajority[:T], \
                     weighted[:T], delegated[:T] or N%",
                    s
                ));
            }
        };
        algorithm.validate()?;
        Ok(algorithm)
    }
}

//! Conflict resolution between disagreeing candidate answers.
//!
//! The pure parts live here: weighted compromise of numeric and structured
//! values, and picking the heaviest candidate. Mediation and arbitration
//! need a peer to produce a decision and are driven by the collaboration
//! engine in the application layer.

use crate::agent::value_objects::AgentId;
use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStrategy {
    /// An arbiter synthesizes a compromise answer
    #[default]
    Mediation,
    /// The highest-weight agent decides
    Arbitration,
    /// Numeric/structured weighted averaging
    Compromise,
    /// No automatic resolution; hand to a human or outer process
    Escalation,
}

impl std::str::FromStr for ConflictStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mediation" => Ok(ConflictStrategy::Mediation),
            "arbitration" => Ok(ConflictStrategy::Arbitration),
            "compromise" => Ok(ConflictStrategy::Compromise),
            "escalation" => Ok(ConflictStrategy::Escalation),
            other => Err(format!(
                "Unknown conflict strategy: {}. \
                 Valid: mediation, arbitration, compromise, escalation",
                other
            )),
        }
    }
}

/// One agent's answer in a disagreement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub author: AgentId,
    pub value: Value,
    #[serde(default = "one")]
    pub weight: f64,
}

fn one() -> f64 {
    1.0
}

impl Candidate {
    pub fn new(author: impl Into<AgentId>, value: Value) -> Self {
        Self {
            author: author.into(),
            value,
            weight: 1.0,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight.max(0.0);
        self
    }
}

/// How a conflict ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    Resolved {
        value: Value,
        strategy: ConflictStrategy,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        decided_by: Option<AgentId>,
        rationale: String,
    },
    /// Terminal: nothing was decided automatically
    Escalated {
        reason: String,
        candidates: Vec<Candidate>,
    },
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved { .. })
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Resolution::Resolved { value, .. } => Some(value),
            Resolution::Escalated { .. } => None,
        }
    }
}

/// Every candidate proposes the same value
pub fn unanimous(candidates: &[Candidate]) -> Option<&Value> {
    let first = candidates.first()?;
    candidates
        .iter()
        .all(|c| c.value == first.value)
        .then_some(&first.value)
}

/// Highest weight wins; ties go to the earliest candidate
pub fn heaviest(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates.iter().fold(None, |best: Option<&Candidate>, c| match best {
        Some(b) if b.weight >= c.weight => Some(b),
        _ => Some(c),
    })
}

/// Weighted compromise.
///
/// - numbers: weighted mean
/// - objects: per key, weighted mean where every candidate has a number,
///   otherwise the value carrying the most weight
/// - anything else: the value carrying the most weight
///
/// Mixed numbers and objects cannot be reconciled.
pub fn compromise(candidates: &[Candidate]) -> Result<Value, DomainError> {
    if candidates.is_empty() {
        return Err(DomainError::Irreconcilable("no candidates".to_string()));
    }
    let entries: Vec<(&Value, f64)> = candidates.iter().map(|c| (&c.value, c.weight)).collect();

    if entries.iter().all(|(v, _)| v.is_number()) {
        return Ok(weighted_mean(&entries));
    }
    if entries.iter().all(|(v, _)| v.is_object()) {
        return Ok(merge_objects(&entries));
    }
    if entries.iter().any(|(v, _)| v.is_number() || v.is_object()) {
        return Err(DomainError::Irreconcilable(
            "candidates mix numeric, structured and other values".to_string(),
        ));
    }
    Ok(plurality(&entries))
}

fn normalized_weights(entries: &[(&Value, f64)]) -> Vec<f64> {
    let total: f64 = entries.iter().map(|(_, w)| w).sum();
    if total > 0.0 {
        entries.iter().map(|(_, w)| w / total).collect()
    } else {
        vec![1.0 / entries.len() as f64; entries.len()]
    }
}

fn weighted_mean(entries: &[(&Value, f64)]) -> Value {
    let weights = normalized_weights(entries);
    let mean: f64 = entries
        .iter()
        .zip(weights)
        .map(|((v, _), w)| v.as_f64().unwrap_or(0.0) * w)
        .sum();
    serde_json::Number::from_f64(mean)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn plurality(entries: &[(&Value, f64)]) -> Value {
    let mut totals: Vec<(&Value, f64)> = Vec::new();
    for (value, weight) in entries {
        match totals.iter_mut().find(|(v, _)| **v == **value) {
            Some((_, total)) => *total += *weight,
            None => totals.push((*value, *weight)),
        }
    }
    totals
        .into_iter()
        .fold(None, |best: Option<(&Value, f64)>, (v, w)| match best {
            Some((bv, bw)) if bw >= w => Some((bv, bw)),
            _ => Some((v, w)),
        })
        .map(|(v, _)| v.clone())
        .unwrap_or(Value::Null)
}

fn merge_objects(entries: &[(&Value, f64)]) -> Value {
    let keys: BTreeSet<&String> = entries
        .iter()
        .filter_map(|(v, _)| v.as_object())
        .flat_map(|o| o.keys())
        .collect();

    let mut merged = Map::new();
    for key in keys {
        let values: Vec<(&Value, f64)> = entries
            .iter()
            .filter_map(|(v, w)| v.get(key.as_str()).map(|field| (field, *w)))
            .collect();
        let all_numeric =
            values.len() == entries.len() && values.iter().all(|(v, _)| v.is_number());
        let value = if all_numeric {
            weighted_mean(&values)
        } else {
            plurality(&values)
        };
        merged.insert(key.clone(), value);
    }
    Value::Object(merged)
}

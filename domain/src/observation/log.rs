use super::record::ToolObservation;

/// Append-only sequence of observations owned by one task.
#[derive(Debug, Clone, Default)]
pub struct ObservationLog {
    entries: Vec<ToolObservation>,
}

impl ObservationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, observation: ToolObservation) {
        self.entries.push(observation);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolObservation> {
        self.entries.iter()
    }

    pub fn failures(&self) -> usize {
        self.entries.iter().filter(|o| !o.is_success()).count()
    }

    /// Render the most recent observations that fit in `max_chars`,
    /// oldest first.
    pub fn to_context(&self, max_chars: usize, max_payload: usize) -> String {
        let mut lines = Vec::new();
        let mut used = 0;
        for obs in self.entries.iter().rev() {
            let line = obs.to_context_entry(max_payload);
            if used + line.len() + 1 > max_chars && !lines.is_empty() {
                break;
            }
            used += line.len() + 1;
            lines.push(line);
        }
        lines.reverse();
        lines.join("\n")
    }

    pub fn into_vec(self) -> Vec<ToolObservation> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::entities::ToolCall;
    use crate::tool::value_objects::{ResultSource, ToolCallResult, ToolError};
    use serde_json::json;
    use std::time::Duration;

    fn obs(n: u64, ok: bool) -> ToolObservation {
        let call = ToolCall::new("t", "op").with_param("n", n);
        let result = if ok {
            ToolCallResult::success(call, json!(n), Duration::ZERO, ResultSource::Backend, n)
        } else {
            ToolCallResult::failure(call, ToolError::execution_failed("boom"), Duration::ZERO, n)
        };
        ToolObservation::from_result(&result)
    }

    #[test]
    fn test_push_and_count() {
        let mut log = ObservationLog::new();
        log.push(obs(1, true));
        log.push(obs(2, false));
        assert_eq!(log.len(), 2);
        assert_eq!(log.failures(), 1);
        assert_eq!(log.iter().next().unwrap().created_at(), 1);
    }

    #[test]
    fn test_context_keeps_newest_within_budget() {
        let mut log = ObservationLog::new();
        for n in 0..10 {
            log.push(obs(n, true));
        }
        let line_len = obs(9, true).to_context_entry(100).len() + 1;
        let ctx = log.to_context(line_len * 2, 100);
        let lines: Vec<&str> = ctx.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("{\"n\":8}"));
        assert!(lines[1].contains("{\"n\":9}"));
    }

    #[test]
    fn test_context_always_includes_latest() {
        let mut log = ObservationLog::new();
        log.push(obs(1, true));
        assert!(!log.to_context(1, 100).is_empty());
    }
}

//! Console progress for a run

use colored::Colorize;
use orchestra_application::ExecutionObserver;
use orchestra_domain::recovery::{AttemptOutcome, RecoveryAttempt};
use orchestra_domain::tool::{ResultSource, ToolCall, ToolCallResult};
use orchestra_domain::{ConsensusResult, TerminationReason};

/// Prints one line per notable event to stderr
pub struct ConsoleProgress;

impl ExecutionObserver for ConsoleProgress {
    fn on_iteration(&self, iteration: usize, max_iterations: usize) {
        eprintln!(
            "{} {}",
            format!("[{}/{}]", iteration, max_iterations).dimmed(),
            "thinking".cyan()
        );
    }

    fn on_tool_call(&self, call: &ToolCall) {
        eprintln!("  {} {}", "->".blue(), call.label());
    }

    fn on_tool_result(&self, result: &ToolCallResult) {
        let millis = result.duration.as_millis();
        match result.error() {
            None => eprintln!("  {} {} ({} ms)", "ok".green(), result.call.label(), millis),
            Some(e) => eprintln!(
                "  {} {}: {} ({} ms)",
                "failed".red(),
                result.call.label(),
                e.message,
                millis
            ),
        }
    }

    fn on_cache_hit(&self, call: &ToolCall, source: ResultSource) {
        let tier = match source {
            ResultSource::FastCache => "fast",
            ResultSource::SlowCache => "slow",
            _ => "other",
        };
        eprintln!("  {} {} ({} tier)", "cached".yellow(), call.label(), tier);
    }

    fn on_recovery_attempt(&self, call: &ToolCall, attempt: &RecoveryAttempt) {
        let outcome = match attempt.outcome {
            AttemptOutcome::Succeeded => "recovered".green(),
            AttemptOutcome::Escalated => "escalated".yellow(),
            AttemptOutcome::Skipped => "skipped".dimmed(),
            AttemptOutcome::Aborted => "aborted".red(),
        };
        eprintln!("  {} {} {}", attempt.strategy, outcome, call.label());
    }

    fn on_consensus(&self, result: &ConsensusResult) {
        eprintln!(
            "{} {} ({:.0}% agreement)",
            "consensus".magenta(),
            result.outcome,
            result.agreement * 100.0
        );
    }

    fn on_terminated(&self, reason: &TerminationReason) {
        let text = reason.to_string();
        if reason.is_success() {
            eprintln!("{}", text.green().bold());
        } else {
            eprintln!("{}", text.red().bold());
        }
    }
}

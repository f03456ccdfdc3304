//! Prompt templates for collaboration between agents

/// Templates for review, voting and conflict resolution
pub struct PromptTemplate;

impl PromptTemplate {
    /// System prompt for peer review
    pub fn review_system() -> &'static str {
        r#"You are a critical reviewer evaluating work produced by another agent.
Assess accuracy and completeness objectively.
End your review with APPROVE if the work is acceptable or REJECT if it needs revision."#
    }

    /// User prompt for peer review
    pub fn review_prompt(task: &str, work: &str) -> String {
        format!(
            r#"## Task

{task}

## Work to review

{work}

Give a brief assessment, then a final line with APPROVE or REJECT."#
        )
    }

    /// System prompt for consensus voting
    pub fn vote_system() -> &'static str {
        r#"You are a voting member of a group of agents deciding on a proposal.
Judge the proposal on its merits. You may abstain if you cannot judge it."#
    }

    /// User prompt for a vote
    pub fn vote_prompt(question: &str) -> String {
        format!(
            r#"## Proposal

{question}

Reply with JSON only:

{{"vote": "yes" | "no" | "abstain", "rationale": "one sentence"}}"#
        )
    }

    /// Prompt asking an arbiter to pick one of several candidate values
    pub fn arbitration_prompt(question: &str, candidates: &[(String, String)]) -> String {
        let mut prompt = format!(
            "## Disagreement\n\n{}\n\nThe following candidates were proposed:\n",
            question
        );
        for (i, (author, value)) in candidates.iter().enumerate() {
            prompt.push_str(&format!("\n{}. (from {}) {}\n", i + 1, author, value));
        }
        prompt.push_str(
            "\nPick the best candidate. Reply with JSON only: \
             {\"choice\": <number>, \"rationale\": \"...\"}",
        );
        prompt
    }

    /// Prompt asking a mediator to merge candidates into one answer
    pub fn mediation_prompt(question: &str, candidates: &[(String, String)]) -> String {
        let mut prompt = format!(
            "## Disagreement\n\n{}\n\nAgents proposed different answers:\n",
            question
        );
        for (author, value) in candidates {
            prompt.push_str(&format!("\n--- {} ---\n{}\n", author, value));
        }
        prompt.push_str(
            r#"
Find a single answer all parties can accept. Either pick one candidate with
CHOICE: <number> (1-based), or write a merged answer after "Final Answer:"."#,
        );
        prompt
    }

    /// Task text handed to an agent receiving a delegated task
    pub fn delegation(task: &str, reason: &str) -> String {
        format!(
            "## Delegated Task\n\n{}\n\nThis task was delegated to you because: {}",
            task, reason
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arbitration_numbers_candidates() {
        let prompt = PromptTemplate::arbitration_prompt(
            "which port?",
            &[("a".into(), "8080".into()), ("b".into(), "9090".into())],
        );
        assert!(prompt.contains("1. (from a) 8080"));
        assert!(prompt.contains("2. (from b) 9090"));
    }

    #[test]
    fn test_vote_prompt_mentions_json() {
        assert!(PromptTemplate::vote_prompt("ship it?").contains("\"vote\""));
    }
}

//! Response parsing for reviews, votes and arbitration.
//!
//! These functions extract structured decisions from free-form peer
//! replies. They are pure text matching with no I/O.
//!
//! | Function | Use Case | Keywords |
//! |----------|----------|----------|
//! | [`parse_review_response`] | Peer review | APPROVE / REJECT |
//! | [`parse_vote_response`] | Consensus voting | YES / NO / ABSTAIN or JSON |
//! | [`parse_choice_index`] | Arbitration and mediation picks | `CHOICE: n` or JSON |

use super::vote::Choice;
use serde_json::Value;

/// Parse a review response to extract approval status and feedback.
///
/// Conservative: defaults to rejection when ambiguous.
///
/// # Returns
///
/// `(approved, full_response_as_feedback)`
pub fn parse_review_response(response: &str) -> (bool, String) {
    let upper = response.to_uppercase();

    let approved = upper.contains("APPROVE")
        && !upper.contains("NOT APPROVE")
        && !upper.contains("DON'T APPROVE")
        && !upper.contains("CANNOT APPROVE");

    let rejected = upper.contains("REJECT")
        || upper.contains("REVISE")
        || upper.contains("NOT APPROVE")
        || upper.contains("CANNOT APPROVE");

    (approved && !rejected, response.to_string())
}

fn json_object(response: &str) -> Option<Value> {
    let start = response.find('{')?;
    let end = response[start..].rfind('}')?;
    serde_json::from_str(&response[start..start + end + 1]).ok()
}

/// Parse a vote into a choice and optional rationale.
///
/// # Supported Formats
///
/// 1. **JSON** (preferred): `{"vote": "yes", "rationale": "..."}`
/// 2. **Keyword**: the first of `VOTE: YES` / `APPROVE` / `ACCEPT`,
///    `NO` / `REJECT`, `ABSTAIN` found in the text
///
/// An unreadable reply is an abstention: the peer answered, it just did
/// not take a side.
pub fn parse_vote_response(response: &str) -> (Choice, Option<String>) {
    if let Some(parsed) = json_object(response)
        && let Some(vote) = parsed.get("vote").and_then(Value::as_str)
        && let Some(choice) = choice_from_word(vote)
    {
        let rationale = parsed
            .get("rationale")
            .or_else(|| parsed.get("reasoning"))
            .and_then(Value::as_str)
            .map(str::to_string);
        return (choice, rationale);
    }

    let rationale = Some(response.trim().to_string()).filter(|s| !s.is_empty());
    for word in response.split(|c: char| !c.is_ascii_alphabetic()) {
        if let Some(choice) = choice_from_word(word) {
            return (choice, rationale);
        }
    }
    (Choice::Abstain, rationale)
}

fn choice_from_word(word: &str) -> Option<Choice> {
    match word.to_uppercase().as_str() {
        "YES" | "APPROVE" | "APPROVED" | "ACCEPT" => Some(Choice::Yes),
        "NO" | "REJECT" | "REJECTED" | "DENY" => Some(Choice::No),
        "ABSTAIN" => Some(Choice::Abstain),
        _ => None,
    }
}

/// Parse a 1-based pick among `count` options into a 0-based index.
///
/// Accepts `{"choice": n}` or `CHOICE: n` anywhere in the reply.
pub fn parse_choice_index(response: &str, count: usize) -> Option<usize> {
    let in_range = |n: u64| (n >= 1 && (n as usize) <= count).then(|| n as usize - 1);

    if let Some(parsed) = json_object(response)
        && let Some(n) = parsed.get("choice").and_then(Value::as_u64)
    {
        return in_range(n);
    }

    let upper = response.to_uppercase();
    let idx = upper.find("CHOICE")?;
    let digits: String = upper[idx + "CHOICE".len()..]
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse::<u64>().ok().and_then(in_range)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== parse_review_response Tests ====================

    #[test]
    fn test_approve_response() {
        let (approved, _) = parse_review_response("I APPROVE this result. It looks good.");
        assert!(approved);
    }

    #[test]
    fn test_reject_response() {
        let (approved, feedback) = parse_review_response("REJECT: the totals do not add up.");
        assert!(!approved);
        assert!(feedback.contains("totals"));
    }

    #[test]
    fn test_cannot_approve() {
        let (approved, _) = parse_review_response("I cannot approve this.");
        assert!(!approved);
    }

    #[test]
    fn test_ambiguous_defaults_to_reject() {
        let (approved, _) = parse_review_response("This has some issues.");
        assert!(!approved);
    }

    // ==================== parse_vote_response Tests ====================

    #[test]
    fn test_vote_json() {
        let (choice, rationale) =
            parse_vote_response(r#"Here: {"vote": "no", "rationale": "unsafe"}"#);
        assert_eq!(choice, Choice::No);
        assert_eq!(rationale.as_deref(), Some("unsafe"));
    }

    #[test]
    fn test_vote_keywords() {
        assert_eq!(parse_vote_response("VOTE: YES, looks right").0, Choice::Yes);
        assert_eq!(parse_vote_response("I reject this proposal").0, Choice::No);
        assert_eq!(parse_vote_response("I will abstain").0, Choice::Abstain);
    }

    #[test]
    fn test_unreadable_vote_is_abstention() {
        assert_eq!(parse_vote_response("hmm, hard to say").0, Choice::Abstain);
        assert_eq!(parse_vote_response("").1, None);
    }

    // ==================== parse_choice_index Tests ====================

    #[test]
    fn test_choice_index() {
        assert_eq!(parse_choice_index(r#"{"choice": 2}"#, 3), Some(1));
        assert_eq!(parse_choice_index("After review, CHOICE: 3", 3), Some(2));
        assert_eq!(parse_choice_index("choice 4", 3), None);
        assert_eq!(parse_choice_index("no idea", 3), None);
        assert_eq!(parse_choice_index("CHOICE: 0", 3), None);
    }
}

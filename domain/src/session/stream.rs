//! Streaming events for model generation.
//!
//! A streaming generation yields [`StreamEvent::Delta`] chunks followed by
//! exactly one terminal event.

use super::response::ModelOutput;

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A text chunk from the model
    Delta(String),
    /// The complete output (signals stream end)
    Completed(ModelOutput),
    /// An error that occurred during streaming (signals stream end)
    Error(String),
}

impl StreamEvent {
    /// Returns the chunk text if this is a Delta event.
    pub fn delta(&self) -> Option<&str> {
        match self {
            StreamEvent::Delta(s) => Some(s),
            _ => None,
        }
    }

    /// Returns true if this event signals the end of the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Completed(_) | StreamEvent::Error(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_events() {
        assert!(!StreamEvent::Delta("a".into()).is_terminal());
        assert!(StreamEvent::Completed(ModelOutput::Text("a".into())).is_terminal());
        assert!(StreamEvent::Error("x".into()).is_terminal());
        assert_eq!(StreamEvent::Delta("a".into()).delta(), Some("a"));
    }
}

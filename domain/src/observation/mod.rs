//! Observation recording
//!
//! A [`ToolObservation`] is the immutable record of one tool invocation.
//! The reasoning loop folds observations into the model's context, and the
//! execution logger writes them out for auditing.
//!
//! Observations for a parallel batch are appended in completion order, not
//! submission order. Callers that need request order should use the
//! index-aligned batch results instead.

mod log;
mod record;

pub use log::ObservationLog;
pub use record::ToolObservation;

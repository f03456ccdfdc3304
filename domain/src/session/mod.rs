//! Model conversation domain.
//!
//! - [`entities::Message`]: a single message sent to the model
//! - [`response::ModelOutput`]: text or structured action returned by the model
//! - [`stream::StreamEvent`]: incremental output of a streaming generation

pub mod entities;
pub mod response;
pub mod stream;

pub use entities::{Message, Role, estimate_tokens};
pub use response::{GenerationParams, ModelOutput};
pub use stream::StreamEvent;

//! Language model adapters

mod scripted;

pub use scripted::{ScriptError, ScriptedModel};

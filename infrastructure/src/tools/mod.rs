//! Built-in tool backends
//!
//! - `echo`: returns its input (and the current time)
//! - `files`: reads text files below a workspace root

mod echo;
mod file;

pub use echo::{ECHO, EchoTool};
pub use file::{FILES, FileTool};

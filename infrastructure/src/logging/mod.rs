//! Execution transcript logging.
//!
//! Provides [`JsonlExecutionLogger`], a JSONL file writer that implements
//! the [`ExecutionLogger`](orchestra_application::ExecutionLogger) port.

mod jsonl_logger;

pub use jsonl_logger::JsonlExecutionLogger;

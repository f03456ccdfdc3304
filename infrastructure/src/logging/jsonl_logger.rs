//! JSONL file writer for execution events.
//!
//! Each [`ExecutionEvent`] becomes one JSON line. Object payloads are
//! flattened into the line next to `type` and `timestamp`; anything else is
//! nested under `data`. The file is opened for append so several runs can
//! share one transcript.

use orchestra_application::{ExecutionEvent, ExecutionLogger};
use serde_json::{Map, Value, json};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// Thread-safe via `Mutex<BufWriter<File>>`. Every line is flushed as it is
/// written, and again on `Drop`.
pub struct JsonlExecutionLogger {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
    written: AtomicU64,
}

impl JsonlExecutionLogger {
    /// Open (or create) the transcript at `path`, creating parent directories.
    ///
    /// Returns `None` when the file cannot be opened; the caller runs
    /// without a transcript in that case.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(dir = %parent.display(), error = %e, "Could not create transcript directory");
            return None;
        }

        let file = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not open transcript file");
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
            written: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines written by this instance
    pub fn events_written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    fn record(event: ExecutionEvent) -> Value {
        let timestamp = event
            .timestamp
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

        match event.payload {
            Value::Object(payload) => {
                let mut map = Map::with_capacity(payload.len() + 2);
                map.insert("type".to_string(), Value::from(event.event_type));
                map.insert("timestamp".to_string(), Value::String(timestamp));
                // Payload keys never shadow the envelope
                for (k, v) in payload {
                    map.entry(k).or_insert(v);
                }
                Value::Object(map)
            }
            other => json!({
                "type": event.event_type,
                "timestamp": timestamp,
                "data": other,
            }),
        }
    }
}

impl ExecutionLogger for JsonlExecutionLogger {
    fn log(&self, event: ExecutionEvent) {
        let Ok(line) = serde_json::to_string(&Self::record(event)) else {
            return;
        };

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if writeln!(writer, "{}", line).and_then(|_| writer.flush()).is_ok() {
            self.written.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Drop for JsonlExecutionLogger {
    fn drop(&mut self) {
        let writer = self.writer.get_mut().unwrap_or_else(PoisonError::into_inner);
        let _ = writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn read_lines(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_object_payload_is_flattened() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs").join("transcript.jsonl");
        let logger = JsonlExecutionLogger::new(&path).unwrap();

        let mut event = ExecutionEvent::new(
            "tool_observation",
            json!({"tool": "search", "ok": true, "type": "spoofed"}),
        );
        event.timestamp = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        logger.log(event);
        logger.log(ExecutionEvent::new(
            "loop_terminated",
            json!({"reason": "final_answer"}),
        ));
        assert_eq!(logger.events_written(), 2);
        drop(logger);

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "tool_observation");
        assert_eq!(lines[0]["timestamp"], "2026-03-01T12:00:00.000Z");
        assert_eq!(lines[0]["tool"], "search");
        assert_eq!(lines[1]["reason"], "final_answer");
    }

    #[test]
    fn test_non_object_payload_is_nested() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.jsonl");
        let logger = JsonlExecutionLogger::new(&path).unwrap();
        logger.log(ExecutionEvent::new("note", json!(["a", "b"])));
        drop(logger);

        let lines = read_lines(&path);
        assert_eq!(lines[0]["type"], "note");
        assert_eq!(lines[0]["data"], json!(["a", "b"]));
    }

    #[test]
    fn test_reopening_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.jsonl");
        for _ in 0..2 {
            let logger = JsonlExecutionLogger::new(&path).unwrap();
            logger.log(ExecutionEvent::new("run", json!({})));
        }
        assert_eq!(read_lines(&path).len(), 2);
    }

    #[test]
    fn test_directory_path_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(JsonlExecutionLogger::new(dir.path()).is_none());
    }
}

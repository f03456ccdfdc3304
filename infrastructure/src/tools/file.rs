//! Read-only file tool

use async_trait::async_trait;
use orchestra_application::ToolBackend;
use orchestra_domain::ErrorKind;
use orchestra_domain::tool::{OperationSpec, ToolDefinition, ToolError, ToolParameter};
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

pub const FILES: &str = "files";

/// Maximum file size to read (10 MB)
const MAX_READ_SIZE: u64 = 10 * 1024 * 1024;

/// Reads text files below a root directory.
///
/// Paths are resolved against the root and may not escape it.
pub struct FileTool {
    root: PathBuf,
    definition: ToolDefinition,
}

impl FileTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let definition = ToolDefinition::new(FILES, "Read text files in the workspace")
            .with_operation(
                OperationSpec::new("read", "Read a file, optionally a range of lines")
                    .with_parameter(
                        ToolParameter::new("path", "Path relative to the workspace", true)
                            .with_type("path"),
                    )
                    .with_parameter(
                        ToolParameter::new("offset", "First line to return (0-indexed)", false)
                            .with_type("number"),
                    )
                    .with_parameter(
                        ToolParameter::new("limit", "Maximum number of lines", false)
                            .with_type("number"),
                    ),
            );
        Self {
            root: root.into(),
            definition,
        }
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf, ToolError> {
        let path = Path::new(relative);
        if path.is_absolute()
            || path
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(ToolError::invalid_argument(format!(
                "'{}' is outside the workspace",
                relative
            )));
        }
        Ok(self.root.join(path))
    }

    async fn read(&self, parameters: &Map<String, Value>) -> Result<Value, ToolError> {
        let relative = parameters
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::invalid_argument("'path' must be a string"))?;
        let path = self.resolve(relative)?;

        let metadata = tokio::fs::metadata(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ToolError::new(
                ErrorKind::CapabilityGap,
                "NOT_FOUND",
                format!("File not found: {}", relative),
            ),
            _ => ToolError::execution_failed(format!("Failed to get file metadata: {}", e)),
        })?;
        if !metadata.is_file() {
            return Err(ToolError::invalid_argument(format!("'{}' is not a file", relative)));
        }
        if metadata.len() > MAX_READ_SIZE {
            return Err(ToolError::invalid_argument(format!(
                "File too large ({} bytes). Maximum size is {} bytes",
                metadata.len(),
                MAX_READ_SIZE
            )));
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ToolError::execution_failed(format!("Failed to read file: {}", e)))?;

        let offset = parameters.get("offset").and_then(Value::as_u64).unwrap_or(0) as usize;
        let limit = parameters.get("limit").and_then(Value::as_u64).map(|l| l as usize);
        let total_lines = content.lines().count();
        let text = if offset > 0 || limit.is_some() {
            content
                .lines()
                .skip(offset)
                .take(limit.unwrap_or(usize::MAX))
                .collect::<Vec<_>>()
                .join("\n")
        } else {
            content
        };

        Ok(json!({
            "path": relative,
            "total_lines": total_lines,
            "content": text,
        }))
    }
}

#[async_trait]
impl ToolBackend for FileTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn invoke(
        &self,
        operation: &str,
        parameters: &Map<String, Value>,
        cancel: &CancellationToken,
    ) -> Result<Value, ToolError> {
        match operation {
            "read" => tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(ToolError::cancelled()),
                result = self.read(parameters) => result,
            },
            other => Err(ToolError::unsupported_operation(FILES, other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_read_range() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "a\nb\nc\nd").unwrap();
        let tool = FileTool::new(dir.path());

        let out = tool
            .invoke(
                "read",
                &params(json!({"path": "notes.txt", "offset": 1, "limit": 2})),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(out["content"], "b\nc");
        assert_eq!(out["total_lines"], 4);
    }

    #[tokio::test]
    async fn test_missing_file_is_capability_gap() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileTool::new(dir.path());
        let err = tool
            .invoke("read", &params(json!({"path": "nope.txt"})), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::CapabilityGap);
    }

    #[tokio::test]
    async fn test_escaping_the_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileTool::new(dir.path());
        for path in ["../secret", "/etc/passwd"] {
            let err = tool
                .invoke("read", &params(json!({"path": path})), &CancellationToken::new())
                .await
                .unwrap_err();
            assert_eq!(err.kind, ErrorKind::Validation, "{}", path);
        }
    }
}

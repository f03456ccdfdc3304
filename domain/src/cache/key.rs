use crate::tool::entities::ToolCall;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Deterministic cache key.
///
/// Parameters are hashed in canonical form (object keys sorted at every
/// depth), so logically equal parameter objects hash the same regardless of
/// insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_call(call: &ToolCall, tenant: Option<&str>) -> Self {
        let mut params = String::new();
        write_canonical(&Value::Object(call.parameters.clone()), &mut params);

        let mut hasher = Sha256::new();
        for part in [
            call.tool_id.as_str(),
            call.operation.as_str(),
            params.as_str(),
            tenant.unwrap_or(""),
        ] {
            // Length prefix keeps ("ab", "c") distinct from ("a", "bc")
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex chars, for logs
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                if let Some(v) = map.get(key) {
                    write_canonical(v, out);
                }
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_is_order_independent() {
        let a = ToolCall::new("search", "query").with_param("q", "rust").with_param("limit", 5);
        let b = ToolCall::new("search", "query").with_param("limit", 5).with_param("q", "rust");
        assert_eq!(CacheKey::for_call(&a, None), CacheKey::for_call(&b, None));
        assert_eq!(CacheKey::for_call(&a, None).as_str().len(), 64);
    }

    #[test]
    fn test_key_depends_on_every_part() {
        let base = ToolCall::new("search", "query").with_param("q", "rust");
        let key = CacheKey::for_call(&base, Some("acme"));

        let other_tool = ToolCall::new("lookup", "query").with_param("q", "rust");
        let other_op = ToolCall::new("search", "suggest").with_param("q", "rust");
        let other_param = ToolCall::new("search", "query").with_param("q", json!("go"));

        assert_ne!(key, CacheKey::for_call(&other_tool, Some("acme")));
        assert_ne!(key, CacheKey::for_call(&other_op, Some("acme")));
        assert_ne!(key, CacheKey::for_call(&other_param, Some("acme")));
        assert_ne!(key, CacheKey::for_call(&base, Some("globex")));
        assert_ne!(key, CacheKey::for_call(&base, None));
    }

    #[test]
    fn test_canonical_form_sorts_nested_keys() {
        let mut out = String::new();
        write_canonical(&json!({"b": [{"y": 1, "x": 2}], "a": "s"}), &mut out);
        assert_eq!(out, r#"{"a":"s","b":[{"x":2,"y":1}]}"#);
    }

    #[test]
    fn test_short_key() {
        let key = CacheKey::for_call(&ToolCall::new("t", "o"), None);
        assert_eq!(key.short().len(), 12);
        assert!(key.as_str().starts_with(key.short()));
    }
}

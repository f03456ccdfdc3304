//! TTL strategies.
//!
//! A TTL function receives the fresh result, the call that produced it and
//! the call-site context, and returns seconds to keep it. Zero means "do not
//! cache". Strategies are plain functions looked up by name, so a deployment
//! can register its own without the executor knowing about it.

use crate::tool::entities::ToolCall;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// TTL function signature: `(result, call, context) -> ttl_secs`
pub type TtlFn = fn(&Value, &ToolCall, &TtlContext) -> u64;

/// Inputs to a TTL decision beyond the result and the call
#[derive(Debug, Clone, PartialEq)]
pub struct TtlContext {
    pub default_ttl_secs: u64,
    pub min_ttl_secs: u64,
    pub max_ttl_secs: u64,
    /// Per-call hints from the caller (`no_cache`, `cache_ttl`, `volatile`)
    pub call_site: Map<String, Value>,
}

impl Default for TtlContext {
    fn default() -> Self {
        Self {
            default_ttl_secs: 300,
            min_ttl_secs: 5,
            max_ttl_secs: 3600,
            call_site: Map::new(),
        }
    }
}

impl TtlContext {
    pub fn with_hint(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.call_site.insert(key.into(), value.into());
        self
    }

    fn clamp(&self, ttl: u64) -> u64 {
        if ttl == 0 {
            0
        } else {
            ttl.clamp(self.min_ttl_secs, self.max_ttl_secs.max(self.min_ttl_secs))
        }
    }
}

/// Which TTL function applies to a tool's results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TtlStrategy {
    /// Never cache
    NoCache,
    /// Always this many seconds
    Fixed { secs: u64 },
    /// The context default
    #[default]
    Default,
    /// Scale by confidence and volatility markers in the result
    ContentAware,
    /// A function registered under this name
    Named { name: String },
}

/// Name → function lookup table.
#[derive(Debug, Clone)]
pub struct TtlRegistry {
    functions: HashMap<String, TtlFn>,
}

impl Default for TtlRegistry {
    fn default() -> Self {
        let mut functions: HashMap<String, TtlFn> = HashMap::new();
        functions.insert("no_cache".to_string(), no_cache_ttl);
        functions.insert("default".to_string(), default_ttl);
        functions.insert("content_aware".to_string(), content_aware_ttl);
        Self { functions }
    }
}

impl TtlRegistry {
    pub fn register(&mut self, name: impl Into<String>, function: TtlFn) {
        self.functions.insert(name.into(), function);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// TTL in seconds for `result`.
    ///
    /// Call-site hints win over the strategy: `no_cache: true` gives 0 and
    /// `cache_ttl: n` gives `n`. Computed TTLs are clamped to the context's
    /// bounds; an unknown strategy name falls back to the default.
    pub fn compute(
        &self,
        strategy: &TtlStrategy,
        result: &Value,
        call: &ToolCall,
        ctx: &TtlContext,
    ) -> u64 {
        if ctx.call_site.get("no_cache").and_then(Value::as_bool) == Some(true) {
            return 0;
        }
        if let Some(ttl) = ctx.call_site.get("cache_ttl").and_then(Value::as_u64) {
            return ttl;
        }

        match strategy {
            TtlStrategy::NoCache => 0,
            TtlStrategy::Fixed { secs } => *secs,
            TtlStrategy::Default => ctx.clamp(default_ttl(result, call, ctx)),
            TtlStrategy::ContentAware => ctx.clamp(content_aware_ttl(result, call, ctx)),
            TtlStrategy::Named { name } => {
                let function = self.functions.get(name).copied().unwrap_or(default_ttl);
                ctx.clamp(function(result, call, ctx))
            }
        }
    }
}

pub fn no_cache_ttl(_result: &Value, _call: &ToolCall, _ctx: &TtlContext) -> u64 {
    0
}

pub fn default_ttl(_result: &Value, _call: &ToolCall, ctx: &TtlContext) -> u64 {
    ctx.default_ttl_secs
}

const TIME_SENSITIVE_OPERATIONS: &[&str] = &[
    "now", "current", "latest", "live", "realtime", "price", "status",
];

/// Longer TTL for confident results, the minimum for time-sensitive ones,
/// nothing for empty ones.
///
/// | Signal | TTL |
/// |--------|-----|
/// | result is null / empty | 0 |
/// | `volatile` or `time_sensitive` flag, or a time-sensitive operation name | min |
/// | `confidence >= 0.9` | default × 4 |
/// | `confidence >= 0.7` | default × 2 |
/// | `confidence < 0.3` | default / 4 |
/// | otherwise | default |
pub fn content_aware_ttl(result: &Value, call: &ToolCall, ctx: &TtlContext) -> u64 {
    let empty = match result {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    };
    if empty {
        return 0;
    }

    let flagged = |key: &str| {
        result.get(key).and_then(Value::as_bool) == Some(true)
            || ctx.call_site.get(key).and_then(Value::as_bool) == Some(true)
    };
    let op = call.operation.to_lowercase();
    if flagged("volatile")
        || flagged("time_sensitive")
        || TIME_SENSITIVE_OPERATIONS.iter().any(|marker| op.contains(marker))
    {
        return ctx.min_ttl_secs;
    }

    match result.get("confidence").and_then(Value::as_f64) {
        Some(c) if c >= 0.9 => ctx.default_ttl_secs.saturating_mul(4),
        Some(c) if c >= 0.7 => ctx.default_ttl_secs.saturating_mul(2),
        Some(c) if c < 0.3 => ctx.default_ttl_secs / 4,
        _ => ctx.default_ttl_secs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(op: &str) -> ToolCall {
        ToolCall::new("analysis", op)
    }

    #[test]
    fn test_content_aware_confidence_scaling() {
        let ctx = TtlContext::default();
        let registry = TtlRegistry::default();
        let s = TtlStrategy::ContentAware;

        let summarize = call("summarize");
        let ttl = |confidence: f64| {
            registry.compute(&s, &json!({ "confidence": confidence }), &summarize, &ctx)
        };
        assert_eq!(ttl(0.95), 1200);
        assert_eq!(ttl(0.75), 600);
        assert_eq!(ttl(0.5), 300);
        assert_eq!(registry.compute(&s, &json!({"confidence": 0.1}), &call("summarize"), &ctx), 75);
    }

    #[test]
    fn test_content_aware_clamps_to_max() {
        let ctx = TtlContext {
            max_ttl_secs: 900,
            ..TtlContext::default()
        };
        let ttl = TtlRegistry::default().compute(
            &TtlStrategy::ContentAware,
            &json!({"confidence": 0.99}),
            &call("summarize"),
            &ctx,
        );
        assert_eq!(ttl, 900);
    }

    #[test]
    fn test_time_sensitive_gets_minimum() {
        let ctx = TtlContext::default();
        let registry = TtlRegistry::default();
        let s = TtlStrategy::ContentAware;

        assert_eq!(registry.compute(&s, &json!({"v": 1}), &call("get_latest"), &ctx), 5);
        let volatile = json!({"v": 1, "volatile": true});
        assert_eq!(registry.compute(&s, &volatile, &call("read"), &ctx), 5);
    }

    #[test]
    fn test_empty_results_not_cached() {
        let ctx = TtlContext::default();
        let registry = TtlRegistry::default();
        assert_eq!(registry.compute(&TtlStrategy::ContentAware, &json!([]), &call("x"), &ctx), 0);
        assert_eq!(registry.compute(&TtlStrategy::ContentAware, &Value::Null, &call("x"), &ctx), 0);
    }

    #[test]
    fn test_call_site_hints_override() {
        let registry = TtlRegistry::default();
        let no_cache = TtlContext::default().with_hint("no_cache", true);
        assert_eq!(
            registry.compute(&TtlStrategy::Fixed { secs: 60 }, &json!(1), &call("x"), &no_cache),
            0
        );

        let explicit = TtlContext::default().with_hint("cache_ttl", 7);
        assert_eq!(registry.compute(&TtlStrategy::NoCache, &json!(1), &call("x"), &explicit), 7);
    }

    #[test]
    fn test_named_strategy_lookup() {
        fn one_minute(_: &Value, _: &ToolCall, _: &TtlContext) -> u64 {
            60
        }
        let mut registry = TtlRegistry::default();
        registry.register("one_minute", one_minute);
        let ctx = TtlContext::default();

        let named = TtlStrategy::Named {
            name: "one_minute".to_string(),
        };
        assert_eq!(registry.compute(&named, &json!(1), &call("x"), &ctx), 60);

        let unknown = TtlStrategy::Named {
            name: "missing".to_string(),
        };
        assert_eq!(registry.compute(&unknown, &json!(1), &call("x"), &ctx), 300);
    }

    #[test]
    fn test_strategy_deserializes_from_config() {
        let s: TtlStrategy = serde_json::from_value(json!({"type": "fixed", "secs": 30})).unwrap();
        assert_eq!(s, TtlStrategy::Fixed { secs: 30 });
        let s: TtlStrategy = serde_json::from_value(json!({"type": "content_aware"})).unwrap();
        assert_eq!(s, TtlStrategy::ContentAware);
    }
}

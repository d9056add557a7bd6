use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::{Map, Number, Value};
use uuid::Uuid;

use crate::models::{response::display_body, Assert};
use crate::services::expression::{self, ExprError};

pub const BATCH_DEADLINE: Duration = Duration::from_secs(30);
pub const WATCHDOG_INTERVAL: Duration = Duration::from_secs(5);
pub const COLLECTION_DEADLINE: Duration = Duration::from_secs(35);

/// Variables visible to an assertion expression
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    values: Map<String, Value>,
}

impl EvalContext {
    pub fn new(status: u16, headers: &[(String, String)], body: &[u8]) -> Self {
        let body_string = display_body(body);
        let parsed_json: Option<Value> = serde_json::from_slice(body).ok();

        let mut header_map = Map::new();
        let mut header_lower = Map::new();
        for (key, value) in headers {
            merge_header(&mut header_map, key.clone(), value);
            merge_header(&mut header_lower, key.to_ascii_lowercase(), value);
        }

        let content_type = header_lower
            .get("content-type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let content_length = header_lower
            .get("content-length")
            .and_then(Value::as_str)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(body.len() as u64);
        let status_text = StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or_default();

        let lower_type = content_type.to_ascii_lowercase();
        let is_json = parsed_json.is_some();
        let is_html = lower_type.contains("text/html");
        let is_text = lower_type.starts_with("text/") || std::str::from_utf8(body).is_ok() && !is_json;

        let mut response = Map::new();
        response.insert("status".into(), Value::Number(Number::from(status)));
        response.insert("status_text".into(), Value::String(status_text.to_string()));
        response.insert(
            "body".into(),
            parsed_json.clone().unwrap_or_else(|| Value::String(body_string.clone())),
        );
        response.insert("body_string".into(), Value::String(body_string));
        response.insert("body_size".into(), Value::Number(Number::from(body.len() as u64)));
        response.insert("headers".into(), Value::Object(header_map));
        response.insert("headers_lower".into(), Value::Object(header_lower));
        response.insert("content_type".into(), Value::String(content_type));
        response.insert("content_length".into(), Value::Number(Number::from(content_length)));

        let mut values = response.clone();
        values.insert("response".into(), Value::Object(response));
        values.insert("success".into(), Value::Bool((200..300).contains(&status)));
        values.insert("client_error".into(), Value::Bool((400..500).contains(&status)));
        values.insert("server_error".into(), Value::Bool((500..600).contains(&status)));
        values.insert("is_json".into(), Value::Bool(is_json));
        values.insert("is_html".into(), Value::Bool(is_html));
        values.insert("is_text".into(), Value::Bool(is_text));
        values.insert("has_body".into(), Value::Bool(!body.is_empty()));
        values.insert("json".into(), parsed_json.unwrap_or(Value::Null));

        Self { values }
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }
}

fn merge_header(map: &mut Map<String, Value>, key: String, value: &str) {
    match map.get_mut(&key) {
        Some(Value::String(existing)) => {
            existing.push_str(", ");
            existing.push_str(value);
        }
        _ => {
            map.insert(key, Value::String(value.to_string()));
        }
    }
}

/// Decides whether one assertion holds
pub trait AssertionEvaluator: Send + Sync + 'static {
    fn evaluate(&self, expression: &str, context: &EvalContext) -> Result<bool, String>;
}

/// Default evaluator backed by the expression language
pub struct ExpressionEvaluator;

impl AssertionEvaluator for ExpressionEvaluator {
    fn evaluate(&self, source: &str, context: &EvalContext) -> Result<bool, String> {
        match expression::evaluate(source, context.values()) {
            Ok(value) => Ok(expression::truthy(&value)),
            Err(ExprError::Parse(msg)) => Err(format!("parse error: {}", msg)),
            Err(ExprError::Eval(msg)) => Err(msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionOutcome {
    pub assert_id: Uuid,
    pub expression: String,
    pub success: bool,
    pub error: Option<String>,
}

impl AssertionOutcome {
    fn failed(assert: &Assert, error: impl Into<String>) -> Self {
        Self {
            assert_id: assert.id,
            expression: assert.value.clone(),
            success: false,
            error: Some(error.into()),
        }
    }

    /// What gets stored on the response assert row
    pub fn stored_value(&self) -> String {
        match &self.error {
            Some(error) => format!("ERROR: {}", error),
            None => self.expression.clone(),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "evaluator panicked".to_string()
    }
}

/// Evaluates every enabled assertion of a run in parallel on the blocking pool
#[derive(Clone)]
pub struct AssertionEngine {
    evaluator: Arc<dyn AssertionEvaluator>,
    batch_deadline: Duration,
    watchdog: Duration,
    collection_deadline: Duration,
}

impl Default for AssertionEngine {
    fn default() -> Self {
        Self::new(Arc::new(ExpressionEvaluator))
    }
}

impl AssertionEngine {
    pub fn new(evaluator: Arc<dyn AssertionEvaluator>) -> Self {
        Self {
            evaluator,
            batch_deadline: BATCH_DEADLINE,
            watchdog: WATCHDOG_INTERVAL,
            collection_deadline: COLLECTION_DEADLINE,
        }
    }

    pub fn with_deadlines(mut self, batch: Duration, watchdog: Duration, collection: Duration) -> Self {
        self.batch_deadline = batch;
        self.watchdog = watchdog;
        self.collection_deadline = collection;
        self
    }

    /// Outcomes of the enabled assertions, in input order
    pub async fn evaluate_all(&self, asserts: &[Assert], context: EvalContext) -> Vec<AssertionOutcome> {
        let active: Vec<&Assert> = asserts
            .iter()
            .filter(|a| a.enabled && !a.value.trim().is_empty())
            .collect();
        if active.is_empty() {
            return Vec::new();
        }

        let context = Arc::new(context);
        let mut pending: FuturesUnordered<_> = active
            .iter()
            .enumerate()
            .map(|(i, assert)| {
                let context = context.clone();
                async move { (i, self.evaluate_one(assert, context).await) }
            })
            .collect();

        let mut results: Vec<Option<AssertionOutcome>> = vec![None; active.len()];
        let deadline = tokio::time::sleep(self.collection_deadline);
        tokio::pin!(deadline);

        while !pending.is_empty() {
            tokio::select! {
                Some((i, outcome)) = pending.next() => results[i] = Some(outcome),
                _ = &mut deadline => {
                    tracing::warn!(remaining = pending.len(), "assertion collection timed out");
                    break;
                }
            }
        }

        results
            .into_iter()
            .zip(active.iter())
            .map(|(outcome, assert)| {
                outcome.unwrap_or_else(|| AssertionOutcome::failed(assert, "collection timeout"))
            })
            .collect()
    }

    async fn evaluate_one(&self, assert: &Assert, context: Arc<EvalContext>) -> AssertionOutcome {
        let evaluator = self.evaluator.clone();
        let source = assert.value.clone();
        let mut handle = tokio::task::spawn_blocking(move || evaluator.evaluate(&source, &context));

        let started = tokio::time::Instant::now();
        let deadline = tokio::time::sleep(self.batch_deadline);
        tokio::pin!(deadline);
        let mut watchdog = tokio::time::interval_at(started + self.watchdog, self.watchdog);

        let joined = loop {
            tokio::select! {
                joined = &mut handle => break joined,
                _ = &mut deadline => {
                    tracing::warn!(assert_id = %assert.id, "assertion exceeded batch deadline");
                    return AssertionOutcome::failed(assert, "evaluation timed out");
                }
                _ = watchdog.tick() => {
                    tracing::warn!(
                        assert_id = %assert.id,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "slow assertion"
                    );
                }
            }
        };

        match joined {
            Ok(Ok(success)) => AssertionOutcome {
                assert_id: assert.id,
                expression: assert.value.clone(),
                success,
                error: None,
            },
            Ok(Err(error)) => AssertionOutcome::failed(assert, error),
            Err(e) if e.is_panic() => {
                let message = panic_message(e.into_panic());
                tracing::error!(assert_id = %assert.id, %message, "assertion evaluator panicked");
                AssertionOutcome::failed(assert, message)
            }
            Err(e) => AssertionOutcome::failed(assert, e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_row(value: &str) -> Assert {
        Assert {
            id: Uuid::now_v7(),
            http_id: Uuid::nil(),
            value: value.to_string(),
            enabled: true,
            description: String::new(),
            display_order: 0.0,
            is_delta: false,
            parent_id: None,
            delta_value: None,
            delta_enabled: None,
            delta_description: None,
            delta_display_order: None,
        }
    }

    fn json_context() -> EvalContext {
        EvalContext::new(
            201,
            &[("Content-Type".to_string(), "application/json".to_string())],
            br#"{"data":{"id":42,"tags":["a","b"]}}"#,
        )
    }

    #[test]
    fn test_context_exposes_response_fields() {
        let ctx = json_context();
        let values = ctx.values();
        assert_eq!(values["status"], 201);
        assert_eq!(values["response"]["status_text"], "Created");
        assert_eq!(values["headers_lower"]["content-type"], "application/json");
        assert_eq!(values["success"], true);
        assert_eq!(values["is_json"], true);
        assert_eq!(values["json"]["data"]["id"], 42);
    }

    #[tokio::test]
    async fn test_results_keep_input_order() {
        let engine = AssertionEngine::default();
        let asserts = vec![
            assert_row("status == 201"),
            assert_row("status == 500"),
            assert_row("json.path('data.tags[1]') == 'b'"),
            assert_row("content_type contains 'json'"),
        ];

        let outcomes = engine.evaluate_all(&asserts, json_context()).await;
        let flags: Vec<bool> = outcomes.iter().map(|o| o.success).collect();
        assert_eq!(flags, [true, false, true, true]);
        for (outcome, assert) in outcomes.iter().zip(&asserts) {
            assert_eq!(outcome.assert_id, assert.id);
        }
    }

    #[tokio::test]
    async fn test_errors_become_values() {
        let engine = AssertionEngine::default();
        let outcomes = engine
            .evaluate_all(&[assert_row("status ==")], json_context())
            .await;

        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].success);
        assert!(outcomes[0].stored_value().starts_with("ERROR: "));
    }

    #[tokio::test]
    async fn test_deeply_nested_assertion_fails_alone() {
        let nested = format!("{}true", "!".repeat(20_000));
        let outcomes = AssertionEngine::default()
            .evaluate_all(&[assert_row(&nested), assert_row("status == 201")], json_context())
            .await;

        assert!(!outcomes[0].success);
        assert_eq!(
            outcomes[0].stored_value(),
            "ERROR: parse error: expression nested too deeply"
        );
        assert!(outcomes[1].success);
    }

    #[tokio::test]
    async fn test_disabled_assertions_are_skipped() {
        let mut disabled = assert_row("status == 201");
        disabled.enabled = false;

        let outcomes = AssertionEngine::default()
            .evaluate_all(&[disabled, assert_row("   ")], json_context())
            .await;
        assert!(outcomes.is_empty());
    }

    struct Panicking;

    impl AssertionEvaluator for Panicking {
        fn evaluate(&self, _: &str, _: &EvalContext) -> Result<bool, String> {
            panic!("evaluator exploded");
        }
    }

    #[tokio::test]
    async fn test_panic_is_captured() {
        let engine = AssertionEngine::new(Arc::new(Panicking));
        let outcomes = engine
            .evaluate_all(&[assert_row("true")], json_context())
            .await;

        assert!(!outcomes[0].success);
        assert_eq!(outcomes[0].error.as_deref(), Some("evaluator exploded"));
    }

    struct Sleepy;

    impl AssertionEvaluator for Sleepy {
        fn evaluate(&self, source: &str, _: &EvalContext) -> Result<bool, String> {
            if source == "slow" {
                std::thread::sleep(Duration::from_millis(500));
            }
            Ok(true)
        }
    }

    #[tokio::test]
    async fn test_batch_deadline_marks_slow_assertion() {
        let engine = AssertionEngine::new(Arc::new(Sleepy)).with_deadlines(
            Duration::from_millis(100),
            Duration::from_millis(50),
            Duration::from_secs(2),
        );

        let outcomes = engine
            .evaluate_all(&[assert_row("fast"), assert_row("slow")], json_context())
            .await;
        assert!(outcomes[0].success);
        assert!(!outcomes[1].success);
        assert_eq!(outcomes[1].error.as_deref(), Some("evaluation timed out"));
    }

    #[tokio::test]
    async fn test_collection_deadline_fills_gaps() {
        let engine = AssertionEngine::new(Arc::new(Sleepy)).with_deadlines(
            Duration::from_secs(2),
            Duration::from_secs(1),
            Duration::from_millis(100),
        );

        let outcomes = engine
            .evaluate_all(&[assert_row("slow"), assert_row("fast")], json_context())
            .await;
        assert_eq!(outcomes[0].error.as_deref(), Some("collection timeout"));
        assert!(outcomes[1].success);
    }
}

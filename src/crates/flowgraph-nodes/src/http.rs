//! HTTP nodes: JSON-in/out fetches with abort-on-timeout
//!
//! URL and body may each be a literal or a resolver over the run state.
//! Query parameters are URL-encoded by the client; the response
//! content-type is sniffed so JSON bodies land as structured values and
//! everything else as text. The per-request timeout aborts the request,
//! releasing the connection.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Map, Value};

use flowgraph_core::{
    EngineContext, EngineError, NodeKind, NodeOutcome, NodeRuntime, Result, StateDelta, Transition,
    WorkflowState,
};

use crate::result::{keys, HttpResult};

/// Default HTTP request timeout: 30 seconds.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Request URL: fixed or computed from state.
#[derive(Clone)]
pub enum UrlSpec {
    Literal(String),
    FromState(Arc<dyn Fn(&WorkflowState) -> String + Send + Sync>),
}

impl UrlSpec {
    fn resolve(&self, state: &WorkflowState) -> String {
        match self {
            UrlSpec::Literal(url) => url.clone(),
            UrlSpec::FromState(f) => f(state),
        }
    }
}

impl std::fmt::Debug for UrlSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UrlSpec::Literal(url) => f.debug_tuple("Literal").field(url).finish(),
            UrlSpec::FromState(_) => f.debug_tuple("FromState").field(&"<resolver>").finish(),
        }
    }
}

/// Request body: fixed JSON or computed from state.
#[derive(Clone)]
pub enum BodySpec {
    Literal(Value),
    FromState(Arc<dyn Fn(&WorkflowState) -> Value + Send + Sync>),
}

impl BodySpec {
    fn resolve(&self, state: &WorkflowState) -> Value {
        match self {
            BodySpec::Literal(value) => value.clone(),
            BodySpec::FromState(f) => f(state),
        }
    }
}

impl std::fmt::Debug for BodySpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BodySpec::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            BodySpec::FromState(_) => f.debug_tuple("FromState").field(&"<resolver>").finish(),
        }
    }
}

/// HTTP request node
pub struct HttpNode {
    name: String,
    method: String,
    url: UrlSpec,
    body: Option<BodySpec>,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    timeout: Duration,
    throw_on_error: bool,
    result_key: String,
    then: Transition,
}

impl HttpNode {
    pub fn new(name: impl Into<String>, method: impl Into<String>, url: UrlSpec, then: Transition) -> Self {
        Self {
            name: name.into(),
            method: method.into(),
            url,
            body: None,
            query: Vec::new(),
            headers: Vec::new(),
            timeout: DEFAULT_HTTP_TIMEOUT,
            throw_on_error: true,
            result_key: keys::LAST_HTTP_RESULT.to_string(),
            then,
        }
    }

    pub fn get(name: impl Into<String>, url: impl Into<String>, then: Transition) -> Self {
        Self::new(name, "GET", UrlSpec::Literal(url.into()), then)
    }

    pub fn with_body(mut self, body: BodySpec) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_throw_on_error(mut self, throw: bool) -> Self {
        self.throw_on_error = throw;
        self
    }

    pub fn with_result_key(mut self, key: impl Into<String>) -> Self {
        self.result_key = key.into();
        self
    }
}

#[async_trait]
impl NodeRuntime for HttpNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Http
    }

    fn transition(&self) -> &Transition {
        &self.then
    }

    fn validate(&self) -> Result<()> {
        if self.method.trim().is_empty() {
            return Err(EngineError::config(format!(
                "http node '{}' has an empty method",
                self.name
            )));
        }
        if self.timeout.is_zero() {
            return Err(EngineError::config(format!(
                "http node '{}' has a zero timeout",
                self.name
            )));
        }
        Ok(())
    }

    async fn execute(&self, state: &WorkflowState, _ctx: &EngineContext) -> Result<NodeOutcome> {
        let url = self.url.resolve(state);
        let method: reqwest::Method = self
            .method
            .to_uppercase()
            .parse()
            .map_err(|_| EngineError::config(format!("invalid HTTP method '{}'", self.method)))?;

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| EngineError::provider(format!("http client build failed: {e}")))?;

        let mut request = client.request(method, &url).query(&self.query);
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }
        if let Some(body) = &self.body {
            request = request.json(&body.resolve(state));
        }

        tracing::debug!(node = %self.name, url = %url, "sending http request");
        let started = Instant::now();

        let result = match request.send().await {
            Ok(response) => {
                let status = response.status();
                let status_text = status.canonical_reason().unwrap_or("").to_string();
                let mut headers = Map::new();
                for (key, value) in response.headers() {
                    if let Ok(v) = value.to_str() {
                        headers.insert(key.to_string(), Value::String(v.to_string()));
                    }
                }
                let is_json = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(|v| v.contains("json"))
                    .unwrap_or(false);
                let text = response
                    .text()
                    .await
                    .map_err(|e| EngineError::provider(format!("reading response body: {e}")))?;
                let data = if is_json {
                    serde_json::from_str(&text).unwrap_or(Value::String(text))
                } else {
                    Value::String(text)
                };

                HttpResult {
                    status: status.as_u16(),
                    status_text,
                    headers,
                    data,
                    duration_ms: started.elapsed().as_millis() as u64,
                    error: (!status.is_success()).then(|| format!("HTTP {}", status.as_u16())),
                }
            }
            Err(e) if e.is_timeout() => {
                let err = EngineError::timeout(url.clone(), self.timeout.as_millis() as u64);
                if self.throw_on_error {
                    return Err(err);
                }
                HttpResult {
                    status: 0,
                    status_text: String::new(),
                    headers: Map::new(),
                    data: Value::Null,
                    duration_ms: started.elapsed().as_millis() as u64,
                    error: Some(err.to_string()),
                }
            }
            Err(e) => {
                if self.throw_on_error {
                    return Err(EngineError::node_execution(
                        &self.name,
                        NodeKind::Http,
                        e.to_string(),
                    ));
                }
                HttpResult {
                    status: 0,
                    status_text: String::new(),
                    headers: Map::new(),
                    data: Value::Null,
                    duration_ms: started.elapsed().as_millis() as u64,
                    error: Some(e.to_string()),
                }
            }
        };

        if result.error.is_some() && result.status != 0 && self.throw_on_error {
            return Err(EngineError::node_execution(
                &self.name,
                NodeKind::Http,
                format!("{} returned HTTP {}", url, result.status),
            ));
        }

        let delta =
            StateDelta::context_value(self.result_key.clone(), serde_json::to_value(&result)?);
        Ok(NodeOutcome::from_delta(delta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_spec_resolution() {
        let mut state = WorkflowState::new("N");
        state
            .context
            .insert("prNumber".into(), serde_json::json!(9));

        let literal = UrlSpec::Literal("https://api.example.com/a".into());
        assert_eq!(literal.resolve(&state), "https://api.example.com/a");

        let dynamic = UrlSpec::FromState(Arc::new(|s: &WorkflowState| {
            format!(
                "https://api.example.com/pulls/{}",
                s.get_i64("prNumber").unwrap_or(0)
            )
        }));
        assert_eq!(dynamic.resolve(&state), "https://api.example.com/pulls/9");
    }

    #[test]
    fn test_validation() {
        let node = HttpNode::get("N", "http://x", Transition::end()).with_timeout(Duration::ZERO);
        assert!(node.validate().is_err());

        let node = HttpNode::new("N", "", UrlSpec::Literal("http://x".into()), Transition::end());
        assert!(node.validate().is_err());
    }
}

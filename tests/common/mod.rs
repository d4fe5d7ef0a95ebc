//! Shared test helpers and mock provider.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use krutrim::error::KrutrimError;
use krutrim::provider::{FinishReason, ModelProvider, ProviderRequest, ProviderResponse};
use krutrim::tools::{ToolCatalog, ToolProvider};
use krutrim::types::{ToolCall, Usage};

/// A mock provider that replays scripted responses and records every request.
pub struct MockProvider {
    model_id: String,
    responses: Mutex<VecDeque<Result<ProviderResponse, KrutrimError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    delay: Duration,
}

impl MockProvider {
    pub fn new(model_id: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    /// Sleep this long before answering each request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue a final text answer.
    pub fn queue_response(&self, text: &str) {
        self.push(Ok(ProviderResponse {
            text: text.to_string(),
            usage: Usage {
                input_tokens: 10,
                output_tokens: 20,
                total_tokens: 30,
            },
            tool_calls: vec![],
            finish_reason: Some(FinishReason::Stop),
        }));
    }

    /// Queue a single tool call request.
    pub fn queue_tool_call(&self, id: &str, name: &str, args: serde_json::Value) {
        self.queue_tool_calls(vec![(id, name, args)]);
    }

    /// Queue one response requesting several tools at once.
    pub fn queue_tool_calls(&self, calls: Vec<(&str, &str, serde_json::Value)>) {
        self.push(Ok(ProviderResponse {
            text: String::new(),
            usage: Usage {
                input_tokens: 10,
                output_tokens: 5,
                total_tokens: 15,
            },
            tool_calls: calls
                .into_iter()
                .map(|(id, name, arguments)| ToolCall {
                    id: id.to_string(),
                    name: name.to_string(),
                    arguments,
                })
                .collect(),
            finish_reason: Some(FinishReason::ToolCalls),
        }));
    }

    pub fn queue_error(&self, error: KrutrimError) {
        self.push(Err(error));
    }

    /// Requests seen so far, in order.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn push(&self, response: Result<ProviderResponse, KrutrimError>) {
        self.responses.lock().unwrap().push_back(response);
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate_text(
        &self,
        request: &ProviderRequest,
    ) -> Result<ProviderResponse, KrutrimError> {
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| {
            Ok(ProviderResponse {
                text: "Mock response".to_string(),
                usage: Usage::default(),
                tool_calls: vec![],
                finish_reason: Some(FinishReason::Stop),
            })
        })
    }
}

/// Tool provider wrapper that counts `list_tools` calls.
pub struct CountingToolProvider<P> {
    inner: P,
    calls: AtomicUsize,
}

impl<P> CountingToolProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<P: ToolProvider> ToolProvider for CountingToolProvider<P> {
    async fn list_tools(&self) -> Result<ToolCatalog, KrutrimError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list_tools().await
    }
}

/// A tool provider whose endpoint is always down.
pub struct UnreachableToolProvider;

#[async_trait]
impl ToolProvider for UnreachableToolProvider {
    async fn list_tools(&self) -> Result<ToolCatalog, KrutrimError> {
        Err(KrutrimError::ToolProvider("connection refused".into()))
    }
}

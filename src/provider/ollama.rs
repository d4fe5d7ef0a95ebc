//! Ollama local provider (OpenAI-compatible).

use async_trait::async_trait;

use crate::error::KrutrimError;

use super::openai::OpenAiProvider;
use super::{ModelProvider, ProviderRequest, ProviderResponse};

pub struct OllamaProvider {
    inner: OpenAiProvider,
}

impl OllamaProvider {
    pub fn new(model_id: String, base_url: String) -> Self {
        Self {
            inner: OpenAiProvider::new(
                model_id,
                None, // no API key for local
                Some(format!("{}/v1", base_url.trim_end_matches('/'))),
            )
            .with_provider_name("ollama"),
        }
    }
}

#[async_trait]
impl ModelProvider for OllamaProvider {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    async fn generate_text(
        &self,
        request: &ProviderRequest,
    ) -> Result<ProviderResponse, KrutrimError> {
        self.inner.generate_text(request).await
    }
}

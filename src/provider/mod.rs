//! Model provider trait and implementations.

pub mod http;
pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::config::KrutrimConfig;
use crate::error::KrutrimError;
use crate::models::LanguageModel;
use crate::types::{Message, ToolCall, Usage};

/// A request sent to a model provider.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    /// System instruction followed by the working history.
    pub messages: Vec<Message>,
    /// `None` for the tool-less variant of the agent.
    pub tools: Option<Vec<ToolDefinition>>,
}

/// Tool definition sent to the provider API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Response from a provider.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub text: String,
    pub usage: Usage,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: Option<FinishReason>,
}

/// Why generation finished.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
}

/// Core trait implemented by all model backends.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name (e.g., "ollama", "openai").
    fn provider_name(&self) -> &str;

    /// The model ID this provider instance serves.
    fn model_id(&self) -> &str;

    /// Run one inference call (non-streaming).
    async fn generate_text(&self, request: &ProviderRequest)
        -> Result<ProviderResponse, KrutrimError>;
}

/// Create a provider for the given model, using the provided config.
pub fn create_provider(
    model: &LanguageModel,
    config: &KrutrimConfig,
) -> Result<Box<dyn ModelProvider>, KrutrimError> {
    match model {
        LanguageModel::Ollama(m) => Ok(Box::new(ollama::OllamaProvider::new(
            m.clone(),
            config.ollama_base_url.clone(),
        ))),
        LanguageModel::OpenAi(m) => {
            let api_key = config.openai_api_key.clone().ok_or_else(|| {
                KrutrimError::Configuration("Missing OPENAI_API_KEY".into())
            })?;
            Ok(Box::new(openai::OpenAiProvider::new(
                m.clone(),
                Some(api_key),
                config.openai_base_url.clone(),
            )))
        }
        LanguageModel::OpenAiCompatible(m) => {
            let base_url = config.openai_base_url.clone().ok_or_else(|| {
                KrutrimError::Configuration("Missing OPENAI_BASE_URL".into())
            })?;
            Ok(Box::new(
                openai::OpenAiProvider::new(
                    m.clone(),
                    config.openai_api_key.clone(),
                    Some(base_url),
                )
                .with_provider_name("openai-compatible"),
            ))
        }
    }
}

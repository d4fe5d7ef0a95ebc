//! Model selection: `provider:model` strings resolved to a backend.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KrutrimError;

/// A language model, tagged with the backend that serves it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "provider", content = "model")]
pub enum LanguageModel {
    /// Local Ollama model (served through its OpenAI-compatible API).
    Ollama(String),
    /// OpenAI Chat Completions.
    OpenAi(String),
    /// Any server speaking the OpenAI Chat Completions dialect.
    OpenAiCompatible(String),
}

impl LanguageModel {
    /// Get the model's API identifier string.
    pub fn model_id(&self) -> &str {
        match self {
            Self::Ollama(m) | Self::OpenAi(m) | Self::OpenAiCompatible(m) => m,
        }
    }

    /// Get the provider name.
    pub fn provider_name(&self) -> &str {
        match self {
            Self::Ollama(_) => "ollama",
            Self::OpenAi(_) => "openai",
            Self::OpenAiCompatible(_) => "openai-compatible",
        }
    }
}

impl fmt::Display for LanguageModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider_name(), self.model_id())
    }
}

impl FromStr for LanguageModel {
    type Err = KrutrimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (provider, model) = s.split_once(':').ok_or_else(|| {
            KrutrimError::Configuration(format!(
                "Invalid model format: '{s}'. Use provider:model (e.g. ollama:gemma3)"
            ))
        })?;
        let model = model.trim();
        if model.is_empty() {
            return Err(KrutrimError::Configuration(format!(
                "Missing model id in '{s}'"
            )));
        }
        match provider.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama(model.to_string())),
            "openai" => Ok(Self::OpenAi(model.to_string())),
            "openai-compatible" | "openai_compatible" => {
                Ok(Self::OpenAiCompatible(model.to_string()))
            }
            other => Err(KrutrimError::Configuration(format!(
                "Unknown model provider '{other}'"
            ))),
        }
    }
}

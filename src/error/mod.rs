//! Error types for krutrim.

use thiserror::Error;

/// Primary error type for all krutrim operations.
#[derive(Error, Debug)]
pub enum KrutrimError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Tool provider error: {0}")]
    ToolProvider(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    #[error("Tool execution error ({tool_name}): {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Agent/tool loop exceeded {max_steps} steps without a final answer")]
    LoopLimitExceeded { max_steps: usize },

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Broad error category for routing error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Provider,
    Api,
    ToolExecution,
    LoopLimit,
    Timeout,
    Serialization,
    Unknown,
}

impl KrutrimError {
    /// Create an API error from a status code and body.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a provider error.
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Network(_) | Self::ToolProvider(_) => ErrorCategory::Network,
            Self::Provider { .. } => ErrorCategory::Provider,
            Self::Api { .. } => ErrorCategory::Api,
            Self::ToolExecution { .. } => ErrorCategory::ToolExecution,
            Self::LoopLimitExceeded { .. } => ErrorCategory::LoopLimit,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Serialization(_) => ErrorCategory::Serialization,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Whether this error must stop the process before any turn proceeds.
    pub fn is_fatal(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, KrutrimError>;

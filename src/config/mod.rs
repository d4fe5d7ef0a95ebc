//! Configuration system (layered: defaults < config file < env < CLI flags).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::agent::ControllerOptions;
use crate::error::{KrutrimError, Result};
use crate::models::LanguageModel;

pub const DEFAULT_MODEL: &str = "ollama:gemma3";
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant that provides information \
and answers questions correctly, if you don't know the answer, say 'I don't know'.";
pub const DEFAULT_MAX_STEPS: usize = 20;
pub const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 60;

const CONFIG_FILE_NAME: &str = "config.toml";

/// Runtime configuration for the agent front-end.
///
/// Resolution order, later layers winning:
/// 1. Built-in defaults
/// 2. `~/.krutrim/config.toml` (or an explicit file)
/// 3. `.env` and process environment
/// 4. CLI flags (applied by the binary)
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KrutrimConfig {
    pub model: String,
    pub system_prompt: String,
    /// Streamable-HTTP MCP endpoints. Empty means the tool layer is unconfigured.
    pub mcp_endpoints: Vec<String>,
    pub ollama_base_url: String,
    pub openai_base_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub max_steps: usize,
    pub model_timeout_secs: u64,
    pub tool_timeout_secs: u64,
    pub turn_timeout_secs: Option<u64>,
}

impl std::fmt::Debug for KrutrimConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KrutrimConfig")
            .field("model", &self.model)
            .field("mcp_endpoints", &self.mcp_endpoints)
            .field("ollama_base_url", &self.ollama_base_url)
            .field("openai_base_url", &self.openai_base_url)
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| ".."))
            .field("max_steps", &self.max_steps)
            .field("model_timeout_secs", &self.model_timeout_secs)
            .field("tool_timeout_secs", &self.tool_timeout_secs)
            .field("turn_timeout_secs", &self.turn_timeout_secs)
            .finish()
    }
}

impl Default for KrutrimConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            mcp_endpoints: Vec::new(),
            ollama_base_url: DEFAULT_OLLAMA_BASE_URL.to_string(),
            openai_base_url: None,
            openai_api_key: None,
            max_steps: DEFAULT_MAX_STEPS,
            model_timeout_secs: DEFAULT_MODEL_TIMEOUT_SECS,
            tool_timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
            turn_timeout_secs: None,
        }
    }
}

impl KrutrimConfig {
    /// Load defaults, then the default config file, then the environment.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut config = Self::from_file(&Self::default_path())?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Read a TOML config file. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(err.into()),
        };
        toml::from_str(&raw).map_err(|e| {
            KrutrimError::Configuration(format!("invalid config file {}: {e}", path.display()))
        })
    }

    /// `~/.krutrim/config.toml`, falling back to `.krutrim/config.toml`.
    pub fn default_path() -> PathBuf {
        directories::UserDirs::new()
            .map(|dirs| dirs.home_dir().join(".krutrim"))
            .unwrap_or_else(|| PathBuf::from(".krutrim"))
            .join(CONFIG_FILE_NAME)
    }

    /// Overlay environment variables using the given lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(model) = lookup("KRUTRIM_MODEL") {
            self.model = model;
        }
        if let Some(prompt) = lookup("KRUTRIM_SYSTEM_PROMPT") {
            self.system_prompt = prompt;
        }
        if let Some(urls) = lookup("KRUTRIM_MCP_URL") {
            self.mcp_endpoints = split_endpoints(&urls);
        }
        if let Some(url) = lookup("OLLAMA_BASE_URL") {
            self.ollama_base_url = url;
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.openai_base_url = Some(url);
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.openai_api_key = Some(key);
        }

        let numeric = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        if let Some(steps) = numeric("KRUTRIM_MAX_STEPS") {
            self.max_steps = steps as usize;
        }
        if let Some(secs) = numeric("KRUTRIM_MODEL_TIMEOUT_SECS") {
            self.model_timeout_secs = secs;
        }
        if let Some(secs) = numeric("KRUTRIM_TOOL_TIMEOUT_SECS") {
            self.tool_timeout_secs = secs;
        }
        if let Some(secs) = numeric("KRUTRIM_TURN_TIMEOUT_SECS") {
            self.turn_timeout_secs = Some(secs);
        }
    }

    /// Reject settings that would make every turn fail.
    pub fn validate(&self) -> Result<()> {
        self.language_model()?;
        if self.max_steps == 0 {
            return Err(KrutrimError::Configuration(
                "max_steps must be at least 1".into(),
            ));
        }
        if self.model_timeout_secs == 0
            || self.tool_timeout_secs == 0
            || self.turn_timeout_secs == Some(0)
        {
            return Err(KrutrimError::Configuration(
                "timeouts must be greater than zero".into(),
            ));
        }
        for endpoint in &self.mcp_endpoints {
            reqwest::Url::parse(endpoint).map_err(|e| {
                KrutrimError::Configuration(format!("invalid MCP endpoint '{endpoint}': {e}"))
            })?;
        }
        Ok(())
    }

    pub fn language_model(&self) -> Result<LanguageModel> {
        self.model.parse()
    }

    pub fn has_tool_endpoints(&self) -> bool {
        !self.mcp_endpoints.is_empty()
    }

    /// Controller knobs derived from this config.
    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions::builder()
            .system_prompt(self.system_prompt.clone())
            .max_steps(self.max_steps)
            .model_timeout(Duration::from_secs(self.model_timeout_secs))
            .tool_timeout(Duration::from_secs(self.tool_timeout_secs))
            .maybe_turn_timeout(self.turn_timeout_secs.map(Duration::from_secs))
            .build()
    }
}

fn split_endpoints(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

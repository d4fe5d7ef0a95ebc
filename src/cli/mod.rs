//! Command-line surface for krutrim.

use clap::{Args, Parser, Subcommand};

use crate::agent::{TurnEvent, TurnEventPayload};
use crate::config::KrutrimConfig;
use crate::error::KrutrimError;
use crate::tools::ToolCatalog;
use crate::types::{Message, Role};

/// Chat with a local or hosted model, optionally backed by MCP tools
#[derive(Parser, Debug)]
#[command(name = "krutrim", version, about = "Terminal chat agent with MCP tool calling")]
pub struct Cli {
    #[command(flatten)]
    pub options: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by every subcommand. They override config file and env.
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Model to use (provider:model, e.g. ollama:gemma3)
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// System prompt prepended to every request
    #[arg(short, long, global = true)]
    pub system: Option<String>,

    /// MCP endpoint (repeatable)
    #[arg(long = "mcp-url", global = true)]
    pub mcp_urls: Vec<String>,

    /// Offer MCP tools to the model (requires an endpoint)
    #[arg(long, global = true, conflicts_with = "no_tools")]
    pub tools: bool,

    /// Never offer tools, even when endpoints are configured
    #[arg(long, global = true)]
    pub no_tools: bool,

    /// Maximum agent steps per turn
    #[arg(long, global = true)]
    pub max_steps: Option<usize>,
}

impl GlobalArgs {
    /// Apply the flags on top of a loaded config.
    pub fn apply(&self, config: &mut KrutrimConfig) {
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(system) = &self.system {
            config.system_prompt = system.clone();
        }
        if !self.mcp_urls.is_empty() {
            config.mcp_endpoints = self.mcp_urls.clone();
        }
        if let Some(steps) = self.max_steps {
            config.max_steps = steps;
        }
    }

    /// Whether the tool-calling variant of the agent should run.
    ///
    /// `--tools` without any endpoint is rejected here, before a session starts.
    pub fn use_tools(&self, config: &KrutrimConfig) -> Result<bool, KrutrimError> {
        if self.no_tools {
            return Ok(false);
        }
        if self.tools && !config.has_tool_endpoints() {
            return Err(KrutrimError::Configuration(
                "--tools needs an MCP endpoint (set KRUTRIM_MCP_URL or pass --mcp-url)".into(),
            ));
        }
        Ok(config.has_tool_endpoints())
    }
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive chat session
    Chat,
    /// Ask a single question and print the answer
    Ask(AskArgs),
    /// List the tools offered by the configured MCP endpoints
    Tools,
}

#[derive(Args, Debug)]
pub struct AskArgs {
    /// The question
    #[arg(required = true, num_args = 1..)]
    pub prompt: Vec<String>,
}

impl AskArgs {
    pub fn text(&self) -> String {
        self.prompt.join(" ")
    }
}

pub fn avatar(role: Role) -> &'static str {
    match role {
        Role::User => "👱🏽",
        Role::Assistant => "🤖",
        Role::System => "⚙️",
        Role::Tool => "🛠️",
    }
}

fn label(role: Role) -> &'static str {
    match role {
        Role::User => "You",
        Role::Assistant => "Assistant",
        Role::System => "System",
        Role::Tool => "Tool",
    }
}

/// Render a stored message with its avatar, plus the token line for answers.
pub fn render_message(message: &Message) -> String {
    let role = message.role();
    let mut out = format!("{} {}: {}", avatar(role), label(role), message.content());
    if role == Role::Assistant {
        let total = message.usage().map_or(0, |u| u.total_tokens);
        out.push_str(&format!("\nTotal Tokens Used: {total}"));
    }
    out
}

/// One-line progress note for tool activity, if the event warrants one.
pub fn render_event(event: &TurnEvent) -> Option<String> {
    match &event.payload {
        TurnEventPayload::ToolCallStarted { call } => {
            Some(format!("⚡ {} {}", call.name, call.arguments))
        }
        TurnEventPayload::ToolCallCompleted { name, result } => {
            let marker = if result.is_error { "❌" } else { "✅" };
            Some(format!("  {marker} {name}: {}", truncate(&result.result.to_string(), 200)))
        }
        _ => None,
    }
}

pub fn render_catalog(catalog: &ToolCatalog) -> String {
    if catalog.is_empty() {
        return "No tools available.".to_string();
    }
    catalog
        .iter()
        .map(|tool| format!("{} - {}", tool.name, tool.description))
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

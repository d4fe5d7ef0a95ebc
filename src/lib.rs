//! krutrim: a terminal chat agent with an optional MCP tool-calling loop.
//!
//! A [`ConversationController`](agent::ConversationController) takes one user
//! message per turn, calls the model, runs any requested tools and loops until
//! the model answers. History is checkpointed in memory per [`Session`](session::Session).
//!
//! ```no_run
//! use std::sync::Arc;
//! use krutrim::prelude::*;
//!
//! # async fn example() -> krutrim::error::Result<()> {
//! let config = KrutrimConfig::load()?;
//! let provider = krutrim::provider::create_provider(&config.language_model()?, &config)?;
//! let controller = ConversationController::new(Arc::from(provider), config.controller_options());
//!
//! let session = Session::start();
//! let answer = controller.step(&session, "Hello!").await?;
//! println!("{}", answer.content());
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod models;
pub mod prelude;
pub mod provider;
pub mod session;
pub mod tools;
pub mod types;
pub mod util;

#[cfg(feature = "mcp")]
pub mod mcp;

#[cfg(feature = "cli")]
pub mod cli;

//! # MAGI
//!
//! Multi-provider LLM query and consensus engine.
//!
//! MAGI sends one prompt to several LLM vendors (OpenAI, Google Gemini,
//! xAI, Anthropic) at once, normalizes their replies, and reduces them to a
//! single answer by majority vote, falling back to a judge model on ties.
//!
//! ## Modules
//!
//! - [`providers`] - Vendor clients and response normalization
//! - [`consensus`] - Dispatcher, voter, judge and coordinator
//! - [`quota`] - Daily per-provider usage limits
//! - [`hooks`] - Lifecycle hooks
//! - [`mcp`] - MCP (Model Context Protocol) server
//! - [`cli`] - Command line interface
//! - [`types`] - Shared types

#[cfg(feature = "cli")]
pub mod cli;
pub mod consensus;
pub mod hooks;
pub mod mcp;
pub mod providers;
pub mod quota;
pub mod types;

pub use types::config::Config;
pub use types::errors::{MagiError, MagiResult};

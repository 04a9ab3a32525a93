//! MAGI MCP server.
//!
//! Exposes the consensus engine to MCP clients over stdio.
//!
//! ## Tools
//!
//! - `magi_consensus` - One answer reduced from several providers
//! - `magi_compare` - Every provider's answer, unreduced
//! - `magi_status` - Provider configuration and optional live probe
//! - `magi_usage` - Quota usage and request metrics
//!
//! ## Example
//!
//! ```ignore
//! use magi::mcp::McpServer;
//! use magi::types::config::Config;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::load_or_default();
//!     let mut server = McpServer::new(&config).unwrap();
//!     server.run().await.unwrap();
//! }
//! ```

mod protocol;
mod server;
mod tools;
mod transport;

pub use protocol::{
    CallToolParams, InitializeResult, JsonRpcError, JsonRpcId, JsonRpcRequest, JsonRpcResponse,
    ListToolsResult, ServerCapabilities, ServerInfo, ToolContent, ToolDescription, ToolResult,
    ToolsCapability, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND,
    PARSE_ERROR, PROTOCOL_VERSION,
};

pub use server::McpServer;
pub use tools::{StatusParams, ToolHandler};
pub use transport::{LineTransport, StdioTransport};

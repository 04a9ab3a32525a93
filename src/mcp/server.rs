//! MCP server exposing the MAGI tools over stdio.

use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncWrite};

use crate::types::config::Config;
use crate::MagiResult;

use super::protocol::{
    CallToolParams, InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse,
    ListToolsResult,
};
use super::tools::ToolHandler;
use super::transport::{LineTransport, StdioTransport};

/// MAGI MCP server.
pub struct McpServer {
    tools: ToolHandler,
    initialized: bool,
}

impl McpServer {
    pub fn new(config: &Config) -> MagiResult<Self> {
        Ok(Self::with_tools(ToolHandler::new(config)?))
    }

    pub fn with_tools(tools: ToolHandler) -> Self {
        Self {
            tools,
            initialized: false,
        }
    }

    /// Serves stdin/stdout until the client disconnects.
    pub async fn run(&mut self) -> MagiResult<()> {
        let mut transport = StdioTransport::stdio();
        self.serve(&mut transport).await
    }

    /// Serves one transport until end of input.
    ///
    /// Malformed lines get a parse error response; notifications get none.
    pub async fn serve<R, W>(&mut self, transport: &mut LineTransport<R, W>) -> MagiResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!("MAGI MCP server starting");

        loop {
            let request = match transport.read_message().await {
                Ok(Some(request)) => request,
                Ok(None) => {
                    tracing::info!("Client disconnected");
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read message");
                    let response = JsonRpcResponse::error(None, JsonRpcError::parse_error());
                    transport.write_response(&response).await?;
                    continue;
                }
            };

            let is_notification = request.is_notification();
            let response = self.handle_request(request).await;

            if !is_notification {
                if let Err(e) = transport.write_response(&response).await {
                    tracing::error!(error = %e, "Failed to write response");
                }
            }
        }

        tracing::info!("MAGI MCP server stopped");
        Ok(())
    }

    /// Dispatches one JSON-RPC request.
    pub async fn handle_request(&mut self, request: JsonRpcRequest) -> JsonRpcResponse {
        tracing::debug!(method = %request.method, "Handling request");

        if request.jsonrpc != "2.0" {
            return JsonRpcResponse::error(request.id, JsonRpcError::invalid_request());
        }

        match request.method.as_str() {
            "initialize" => self.handle_initialize(request),
            "initialized" | "notifications/initialized" => {
                tracing::info!("Client initialization complete");
                JsonRpcResponse::success(request.id, json!({}))
            }
            "ping" => JsonRpcResponse::success(request.id, json!({})),
            "shutdown" => self.handle_shutdown(request),

            "tools/list" => self.handle_tools_list(request),
            "tools/call" => self.handle_tools_call(request).await,

            _ => JsonRpcResponse::error(request.id, JsonRpcError::method_not_found(&request.method)),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Lifecycle
    // ═══════════════════════════════════════════════════════════════════════

    fn handle_initialize(&mut self, request: JsonRpcRequest) -> JsonRpcResponse {
        tracing::info!("Client initializing connection");
        self.initialized = true;

        match serde_json::to_value(InitializeResult::default()) {
            Ok(result) => JsonRpcResponse::success(request.id, result),
            Err(e) => JsonRpcResponse::error(request.id, JsonRpcError::internal_error(e.to_string())),
        }
    }

    fn handle_shutdown(&mut self, request: JsonRpcRequest) -> JsonRpcResponse {
        tracing::info!("Client requested shutdown");
        self.initialized = false;
        JsonRpcResponse::success(request.id, json!(null))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Tools
    // ═══════════════════════════════════════════════════════════════════════

    fn handle_tools_list(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let result = ListToolsResult {
            tools: ToolHandler::list_tools(),
        };

        JsonRpcResponse::success(
            request.id,
            serde_json::to_value(result).unwrap_or(json!({"tools": []})),
        )
    }

    async fn handle_tools_call(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let params: CallToolParams = match request.params {
            Some(p) => match serde_json::from_value(p) {
                Ok(params) => params,
                Err(e) => {
                    return JsonRpcResponse::error(
                        request.id,
                        JsonRpcError::invalid_params(format!("Invalid params: {}", e)),
                    );
                }
            },
            None => {
                return JsonRpcResponse::error(request.id, JsonRpcError::invalid_params("Missing params"));
            }
        };

        tracing::info!(tool = %params.name, "Calling tool");

        let result = self.tools.handle_tool_call(&params.name, params.arguments).await;

        let value = serde_json::to_value(&result).unwrap_or_else(|_| {
            json!({
                "content": [{"type": "text", "text": "Internal error"}],
                "isError": true
            })
        });

        JsonRpcResponse::success(request.id, value)
    }
}

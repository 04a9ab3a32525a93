//! MCP tool handlers.
//!
//! 1. `magi_consensus` - Query several providers and reduce to one answer
//! 2. `magi_compare` - Query several providers and return every answer
//! 3. `magi_status` - Provider configuration, optionally with a live probe
//! 4. `magi_usage` - Daily quota usage and request metrics

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::consensus::ConsensusCoordinator;
use crate::hooks::MetricsHook;
use crate::types::config::Config;
use crate::types::requests::{ConsensusRequest, ProviderKind};
use crate::{MagiError, MagiResult};

use super::protocol::{ToolDescription, ToolResult};

/// Arguments of `magi_status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusParams {
    /// Send a probe prompt to each provider.
    #[serde(default)]
    pub ping: bool,

    /// Providers to probe; defaults to the enabled set.
    #[serde(default)]
    pub providers: Vec<String>,
}

/// Handler for MAGI tools.
pub struct ToolHandler {
    coordinator: ConsensusCoordinator,
    metrics: Arc<MetricsHook>,
}

impl ToolHandler {
    /// Builds the handler from configuration, reading credentials from the
    /// environment.
    pub fn new(config: &Config) -> MagiResult<Self> {
        Ok(Self::with_coordinator(ConsensusCoordinator::from_config(config)?))
    }

    /// Wraps an existing coordinator and attaches a metrics hook to it.
    pub fn with_coordinator(mut coordinator: ConsensusCoordinator) -> Self {
        let metrics = Arc::new(MetricsHook::new());
        coordinator.hooks_mut().register(metrics.clone());
        Self {
            coordinator,
            metrics,
        }
    }

    pub fn coordinator(&self) -> &ConsensusCoordinator {
        &self.coordinator
    }

    /// Every tool served.
    pub fn list_tools() -> Vec<ToolDescription> {
        vec![
            ToolDescription::new(
                "magi_consensus",
                "Ask several LLM providers the same question and return one answer chosen by majority vote, with a judge model breaking ties.",
                query_schema(),
            ),
            ToolDescription::new(
                "magi_compare",
                "Ask several LLM providers the same question and return every provider's answer side by side.",
                query_schema(),
            ),
            ToolDescription::new(
                "magi_status",
                "Show which providers are enabled and configured. Set ping to send a tiny probe prompt to each.",
                json!({
                    "type": "object",
                    "properties": {
                        "ping": {
                            "type": "boolean",
                            "description": "Send a probe prompt to each provider"
                        },
                        "providers": {
                            "type": "array",
                            "items": { "type": "string", "enum": provider_names() },
                            "description": "Providers to probe (default: enabled providers)"
                        }
                    }
                }),
            ),
            ToolDescription::new(
                "magi_usage",
                "Show today's per-provider usage against the configured daily limits, plus request counters.",
                json!({
                    "type": "object",
                    "properties": {}
                }),
            ),
        ]
    }

    /// Runs a tool by name.
    pub async fn handle_tool_call(&self, name: &str, arguments: Value) -> ToolResult {
        tracing::info!(tool = name, "Processing tool call");

        match name {
            "magi_consensus" => self.handle_consensus(arguments).await,
            "magi_compare" => self.handle_compare(arguments).await,
            "magi_status" => self.handle_status(arguments).await,
            "magi_usage" => self.handle_usage(),
            _ => ToolResult::error(format!("Unknown tool: {}", name)),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Handlers
    // ═══════════════════════════════════════════════════════════════════════

    async fn handle_consensus(&self, arguments: Value) -> ToolResult {
        let request = match parse_request(arguments) {
            Ok(request) => request,
            Err(result) => return result,
        };

        match self.coordinator.run(&request).await {
            Ok(response) => to_success(&response),
            Err(e) => error_result(&e),
        }
    }

    async fn handle_compare(&self, arguments: Value) -> ToolResult {
        let request = match parse_request(arguments) {
            Ok(request) => request,
            Err(result) => return result,
        };

        match self.coordinator.compare(&request).await {
            Ok(response) => to_success(&response),
            Err(e) => error_result(&e),
        }
    }

    async fn handle_status(&self, arguments: Value) -> ToolResult {
        let params: StatusParams = if arguments.is_null() {
            StatusParams::default()
        } else {
            match serde_json::from_value(arguments) {
                Ok(p) => p,
                Err(e) => return ToolResult::error(format!("Invalid parameters: {}", e)),
            }
        };

        let judge = self.coordinator.judge();
        let mut response = json!({
            "providers": self.coordinator.status(),
            "judge": {
                "provider": judge.provider(),
                "model": judge.model(),
            },
            "voter": self.coordinator.voter().name(),
        });

        if params.ping {
            let targets = match ProviderKind::parse_list(&params.providers) {
                Ok(targets) => targets,
                Err(e) => return error_result(&e),
            };
            let pings = self.coordinator.ping(&targets).await;
            response["ping"] = serde_json::to_value(pings).unwrap_or(Value::Null);
        }

        ToolResult::success_json(&response)
    }

    fn handle_usage(&self) -> ToolResult {
        let response = json!({
            "quota": self.coordinator.usage(),
            "metrics": self.metrics.metrics(),
        });
        ToolResult::success_json(&response)
    }
}

fn provider_names() -> Vec<&'static str> {
    ProviderKind::ALL.iter().map(|p| p.name()).collect()
}

fn query_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "prompt": {
                "type": "string",
                "description": "The question to ask"
            },
            "system": {
                "type": "string",
                "description": "Optional system instruction sent to every provider"
            },
            "providers": {
                "type": "array",
                "items": { "type": "string", "enum": provider_names() },
                "description": "Providers to query (default: every enabled provider)"
            },
            "models": {
                "type": "object",
                "additionalProperties": { "type": "string" },
                "description": "Per-provider model overrides, e.g. {\"openai\": \"gpt-4o\"}"
            },
            "temperature": {
                "type": "number",
                "minimum": 0,
                "description": "Sampling temperature (default 0.2)"
            },
            "timeout_ms": {
                "type": "integer",
                "minimum": 1,
                "description": "Per-provider timeout in milliseconds (default 30000)"
            },
            "max_tokens": {
                "type": "integer",
                "minimum": 1,
                "description": "Output token cap"
            }
        },
        "required": ["prompt"]
    })
}

fn parse_request(arguments: Value) -> Result<ConsensusRequest, ToolResult> {
    serde_json::from_value(arguments).map_err(|e| {
        error_result(&MagiError::invalid_request(format!("Invalid parameters: {}", e)))
    })
}

fn to_success<T: Serialize>(value: &T) -> ToolResult {
    match serde_json::to_value(value) {
        Ok(value) => ToolResult::success_json(&value),
        Err(e) => ToolResult::error(format!("Failed to serialize response: {}", e)),
    }
}

/// Error body: message, status class and any provider results.
fn error_result(error: &MagiError) -> ToolResult {
    let mut body = json!({
        "error": error.to_string(),
        "status": error.status_code(),
    });
    if let Some(results) = error.results() {
        body["results"] = serde_json::to_value(results).unwrap_or(Value::Null);
    }
    ToolResult::error_json(&body)
}

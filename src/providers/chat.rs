//! OpenAI-compatible chat completions dialect (OpenAI, xAI).

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Serialize;
use serde_json::Value;

use super::base::{Dialect, ProviderSpec, VendorRequest};
use super::normalize::{self, Normalized};
use crate::types::requests::Prompt;
use crate::{MagiError, MagiResult};

/// Path of the chat completions endpoint, relative to the base URL.
pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Bearer-authenticated `POST /v1/chat/completions`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChatCompletions;

/// Builds the `Authorization: Bearer` header map.
pub(crate) fn bearer_headers(api_key: &str) -> MagiResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|e| MagiError::config(format!("invalid API key format: {}", e)))?,
    );
    Ok(headers)
}

impl Dialect for ChatCompletions {
    fn build_request(
        &self,
        spec: &ProviderSpec,
        model: &str,
        prompt: &Prompt,
        api_key: &str,
    ) -> MagiResult<VendorRequest> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = prompt.system.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &prompt.text,
        });

        let body = ChatRequest {
            model,
            messages,
            temperature: prompt.temperature,
            max_tokens: prompt.max_tokens,
        };

        Ok(VendorRequest {
            url: spec.endpoint(CHAT_COMPLETIONS_PATH)?,
            headers: bearer_headers(api_key)?,
            body: serde_json::to_value(body)?,
        })
    }

    fn normalize(&self, body: &Value) -> Result<Normalized, String> {
        normalize::chat_completions(body)
    }
}

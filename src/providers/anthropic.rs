//! Anthropic messages dialect.

use reqwest::header::{HeaderMap, HeaderValue};
use serde::Serialize;
use serde_json::Value;

use super::base::{Dialect, ProviderSpec, VendorRequest};
use super::normalize::{self, Normalized};
use crate::types::requests::Prompt;
use crate::{MagiError, MagiResult};

/// API version header value.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// `max_tokens` is mandatory for this vendor; used when the prompt has no cap.
pub const DEFAULT_MAX_TOKENS: u32 = 512;

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

/// `POST /v1/messages` with `x-api-key` auth.
#[derive(Debug, Default, Clone, Copy)]
pub struct Messages;

impl Dialect for Messages {
    fn build_request(
        &self,
        spec: &ProviderSpec,
        model: &str,
        prompt: &Prompt,
        api_key: &str,
    ) -> MagiResult<VendorRequest> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key)
                .map_err(|e| MagiError::config(format!("invalid API key format: {}", e)))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));

        let body = MessagesRequest {
            model,
            max_tokens: prompt.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: prompt.temperature,
            system: prompt.system.as_deref(),
            messages: [Message {
                role: "user",
                content: &prompt.text,
            }],
        };

        Ok(VendorRequest {
            url: spec.endpoint("/v1/messages")?,
            headers,
            body: serde_json::to_value(body)?,
        })
    }

    fn normalize(&self, body: &Value) -> Result<Normalized, String> {
        normalize::anthropic(body)
    }
}

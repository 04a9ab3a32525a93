//! Gemini `generateContent` dialect.

use reqwest::header::HeaderMap;
use serde::Serialize;
use serde_json::Value;

use super::base::{Dialect, ProviderSpec, VendorRequest};
use super::normalize::{self, Normalized};
use crate::types::requests::Prompt;
use crate::{MagiError, MagiResult};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

/// `POST /v1beta/models/{model}:generateContent?key=...`.
///
/// Gemini has no system role here; the instruction is sent as a leading user
/// turn prefixed with `SYSTEM: `.
#[derive(Debug, Default, Clone, Copy)]
pub struct GenerateContent;

impl Dialect for GenerateContent {
    fn build_request(
        &self,
        spec: &ProviderSpec,
        model: &str,
        prompt: &Prompt,
        api_key: &str,
    ) -> MagiResult<VendorRequest> {
        let method = format!("{}:generateContent", model);
        let mut url = spec.endpoint("/")?;
        url.path_segments_mut()
            .map_err(|_| MagiError::config(format!("base_url for {} cannot be a base", spec.kind)))?
            .pop_if_empty()
            .extend(["v1beta", "models", method.as_str()]);
        url.query_pairs_mut().append_pair("key", api_key);

        let mut contents = Vec::with_capacity(2);
        if let Some(system) = prompt.system.as_deref() {
            contents.push(Content {
                role: "user",
                parts: vec![Part {
                    text: format!("SYSTEM: {}", system),
                }],
            });
        }
        contents.push(Content {
            role: "user",
            parts: vec![Part {
                text: prompt.text.clone(),
            }],
        });

        let body = GenerateRequest {
            contents,
            generation_config: GenerationConfig {
                temperature: prompt.temperature,
                max_output_tokens: prompt.max_tokens,
            },
        };

        Ok(VendorRequest {
            url,
            headers: HeaderMap::new(),
            body: serde_json::to_value(body)?,
        })
    }

    fn normalize(&self, body: &Value) -> Result<Normalized, String> {
        normalize::gemini(body)
    }
}

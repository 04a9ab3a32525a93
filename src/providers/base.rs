//! Base trait for upstream LLM providers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Url;
use serde_json::Value;

use super::http::{post_json, CallFailure};
use super::normalize::Normalized;
use crate::types::config::ProviderConfig;
use crate::types::errors::ProviderErrorKind;
use crate::types::requests::{Prompt, ProviderKind};
use crate::types::responses::ProviderResult;
use crate::MagiResult;

/// Prompt sent by [`ProviderClient::ping`].
pub const PING_PROMPT: &str = "pong only";

/// Characters of the ping reply kept in the result.
pub const PING_SAMPLE_CHARS: usize = 120;

/// A single upstream vendor.
///
/// `query` never fails: every failure mode is reported inside the returned
/// [`ProviderResult`] so one provider can never break a fan-out.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Provider identity.
    fn kind(&self) -> ProviderKind;

    /// Model used when the prompt carries no override.
    fn default_model(&self) -> Option<&str>;

    /// Whether a credential is currently available.
    fn is_configured(&self) -> bool;

    /// Sends one prompt and normalizes the answer.
    async fn query(&self, prompt: &Prompt) -> ProviderResult;

    /// Cheap liveness probe; keeps a short sample of the reply.
    async fn ping(&self) -> ProviderResult {
        let prompt = Prompt::new(PING_PROMPT)
            .with_max_tokens(8)
            .with_temperature(0.0);
        let mut result = self.query(&prompt).await;
        if result.output.chars().count() > PING_SAMPLE_CHARS {
            result.output = result.output.chars().take(PING_SAMPLE_CHARS).collect();
        }
        result
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Credentials
// ═══════════════════════════════════════════════════════════════════════════

/// Where API keys come from. Read on every call, never cached.
pub trait CredentialSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads keys from the process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvCredentials;

impl CredentialSource for EnvCredentials {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

/// Fixed key set, for tests and embedding.
#[derive(Debug, Default, Clone)]
pub struct StaticCredentials {
    keys: HashMap<String, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a key.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.keys.insert(key.into(), value.into());
        self
    }
}

impl CredentialSource for StaticCredentials {
    fn get(&self, key: &str) -> Option<String> {
        self.keys.get(key).cloned()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Provider spec
// ═══════════════════════════════════════════════════════════════════════════

/// How the API key travels to the vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <key>`.
    Bearer,
    /// `x-api-key: <key>`.
    ApiKeyHeader,
    /// `?key=<key>` on the URL.
    QueryKey,
}

/// Static description of a provider, fixed at startup.
#[derive(Debug, Clone)]
pub struct ProviderSpec {
    pub kind: ProviderKind,
    pub base_url: String,
    pub credential_env: String,
    pub default_model: Option<String>,
    pub auth: AuthScheme,
}

impl ProviderSpec {
    /// Built-in endpoint, credential and model for a vendor.
    pub fn builtin(kind: ProviderKind) -> Self {
        let (base_url, model, auth) = match kind {
            ProviderKind::OpenAi => ("https://api.openai.com", "gpt-4o-mini", AuthScheme::Bearer),
            ProviderKind::Gemini => (
                "https://generativelanguage.googleapis.com",
                "gemini-1.5-flash",
                AuthScheme::QueryKey,
            ),
            ProviderKind::Xai => ("https://api.x.ai", "grok-2-latest", AuthScheme::Bearer),
            ProviderKind::Anthropic => (
                "https://api.anthropic.com",
                "claude-3-5-sonnet-latest",
                AuthScheme::ApiKeyHeader,
            ),
        };

        Self {
            kind,
            base_url: base_url.to_string(),
            credential_env: kind.credential_env().to_string(),
            default_model: Some(model.to_string()),
            auth,
        }
    }

    /// Built-in spec with the configured overrides applied.
    pub fn from_config(kind: ProviderKind, config: &ProviderConfig) -> Self {
        let mut spec = Self::builtin(kind);
        if let Some(url) = config.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
            spec.base_url = url.to_string();
        }
        if let Some(env) = config.api_key_env.as_deref().filter(|e| !e.trim().is_empty()) {
            spec.credential_env = env.to_string();
        }
        if let Some(model) = config.model.as_deref().filter(|m| !m.trim().is_empty()) {
            spec.default_model = Some(model.to_string());
        }
        spec
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Joins a path onto the base URL.
    pub fn endpoint(&self, path: &str) -> MagiResult<Url> {
        let base = self.base_url.trim_end_matches('/');
        Url::parse(&format!("{}{}", base, path)).map_err(|e| {
            crate::MagiError::config(format!("invalid base_url for {}: {}", self.kind, e))
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Dialects
// ═══════════════════════════════════════════════════════════════════════════

/// One outbound vendor request.
#[derive(Debug)]
pub struct VendorRequest {
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Value,
}

/// The vendor-specific half of a provider: request shape and response shape.
pub trait Dialect: Send + Sync {
    /// Builds the POST for a resolved model.
    fn build_request(
        &self,
        spec: &ProviderSpec,
        model: &str,
        prompt: &Prompt,
        api_key: &str,
    ) -> MagiResult<VendorRequest>;

    /// Extracts the answer from a 2xx body.
    fn normalize(&self, body: &Value) -> Result<Normalized, String>;
}

/// A provider reached over HTTPS, parameterized by its wire dialect.
pub struct HttpProvider<D> {
    spec: ProviderSpec,
    dialect: D,
    http: reqwest::Client,
    credentials: Arc<dyn CredentialSource>,
}

impl<D: Dialect> HttpProvider<D> {
    /// Creates a provider.
    pub fn new(
        spec: ProviderSpec,
        dialect: D,
        http: reqwest::Client,
        credentials: Arc<dyn CredentialSource>,
    ) -> Self {
        Self {
            spec,
            dialect,
            http,
            credentials,
        }
    }

    /// Static description of this provider.
    pub fn spec(&self) -> &ProviderSpec {
        &self.spec
    }
}

#[async_trait]
impl<D: Dialect> ProviderClient for HttpProvider<D> {
    fn kind(&self) -> ProviderKind {
        self.spec.kind
    }

    fn default_model(&self) -> Option<&str> {
        self.spec.default_model.as_deref()
    }

    fn is_configured(&self) -> bool {
        self.credentials.get(&self.spec.credential_env).is_some()
    }

    async fn query(&self, prompt: &Prompt) -> ProviderResult {
        let kind = self.spec.kind;
        let override_model = prompt.model_for(kind).map(str::to_string);

        let Some(api_key) = self.credentials.get(&self.spec.credential_env) else {
            return ProviderResult::failure(
                kind,
                override_model,
                ProviderErrorKind::Configuration,
                format!("{} not set", self.spec.credential_env),
                None,
            );
        };

        let Some(model) = override_model.or_else(|| self.spec.default_model.clone()) else {
            return ProviderResult::failure(
                kind,
                None,
                ProviderErrorKind::Configuration,
                format!("no model configured for {}", kind),
                None,
            );
        };

        let request = match self.dialect.build_request(&self.spec, &model, prompt, &api_key) {
            Ok(request) => request,
            Err(e) => {
                return ProviderResult::failure(
                    kind,
                    Some(model),
                    ProviderErrorKind::Configuration,
                    e.to_string(),
                    None,
                );
            }
        };

        tracing::debug!(provider = %kind, model = %model, "Querying provider");

        let started = Instant::now();
        let outcome = post_json(&self.http, request, prompt.timeout).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let body = match outcome {
            Ok(body) => body,
            Err(CallFailure { kind: error_kind, message }) => {
                tracing::warn!(
                    provider = %kind,
                    error_kind = %error_kind,
                    latency_ms,
                    error = %message,
                    "Provider call failed"
                );
                return ProviderResult::failure(kind, Some(model), error_kind, message, Some(latency_ms));
            }
        };

        match self.dialect.normalize(&body) {
            Ok(normalized) => {
                let resolved = normalized.model.unwrap_or(model);
                let mut result = ProviderResult::success(kind, resolved, normalized.text, latency_ms);
                result.tokens = normalized.tokens;
                result
            }
            Err(message) => {
                tracing::warn!(provider = %kind, error = %message, "Unexpected response shape");
                ProviderResult::failure(
                    kind,
                    Some(model),
                    ProviderErrorKind::Shape,
                    message,
                    Some(latency_ms),
                )
            }
        }
    }
}

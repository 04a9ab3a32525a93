//! Upstream LLM providers.
//!
//! Every vendor is an [`HttpProvider`] parameterized by a [`Dialect`] that
//! knows only the request and response shapes:
//!
//! - `openai` and `xai` - [`ChatCompletions`]
//! - `gemini` - [`GenerateContent`]
//! - `anthropic` - [`Messages`]
//!
//! The [`ProviderRegistry`] owns one client per known provider.

mod anthropic;
mod base;
mod chat;
mod gemini;
mod http;
pub mod normalize;

pub use anthropic::Messages;
pub use base::{
    AuthScheme, CredentialSource, Dialect, EnvCredentials, HttpProvider, ProviderClient,
    ProviderSpec, StaticCredentials, VendorRequest, PING_PROMPT, PING_SAMPLE_CHARS,
};
pub use chat::ChatCompletions;
pub use gemini::GenerateContent;
pub use http::upstream_message;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::types::config::Config;
use crate::types::requests::ProviderKind;
use crate::MagiResult;

/// Builds the client for one provider.
pub fn build_client(
    spec: ProviderSpec,
    http: reqwest::Client,
    credentials: Arc<dyn CredentialSource>,
) -> Arc<dyn ProviderClient> {
    match spec.kind {
        ProviderKind::OpenAi | ProviderKind::Xai => {
            Arc::new(HttpProvider::new(spec, ChatCompletions, http, credentials))
        }
        ProviderKind::Gemini => Arc::new(HttpProvider::new(spec, GenerateContent, http, credentials)),
        ProviderKind::Anthropic => Arc::new(HttpProvider::new(spec, Messages, http, credentials)),
    }
}

/// Shared HTTP client for all providers. Deadlines are set per request.
pub fn http_client() -> MagiResult<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("magi/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// One client per provider, keyed in canonical order.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    clients: BTreeMap<ProviderKind, Arc<dyn ProviderClient>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every known provider from configuration, reading keys from
    /// the environment.
    pub fn from_config(config: &Config) -> MagiResult<Self> {
        Self::with_credentials(config, Arc::new(EnvCredentials))
    }

    /// Registers every known provider with an explicit credential source.
    pub fn with_credentials(
        config: &Config,
        credentials: Arc<dyn CredentialSource>,
    ) -> MagiResult<Self> {
        let http = http_client()?;
        let mut registry = Self::new();
        for kind in ProviderKind::ALL {
            let spec = ProviderSpec::from_config(kind, config.providers.get(kind));
            registry.register(build_client(spec, http.clone(), credentials.clone()));
        }
        Ok(registry)
    }

    /// Adds a client, replacing any previous one for the same provider.
    pub fn register(&mut self, client: Arc<dyn ProviderClient>) {
        tracing::debug!(provider = %client.kind(), "Registering provider");
        self.clients.insert(client.kind(), client);
    }

    /// Client for a provider.
    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn ProviderClient>> {
        self.clients.get(&kind).cloned()
    }

    /// Registered providers in canonical order.
    pub fn kinds(&self) -> Vec<ProviderKind> {
        self.clients.keys().copied().collect()
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_from_config_has_all_providers() {
        let registry =
            ProviderRegistry::with_credentials(&Config::default(), Arc::new(StaticCredentials::new()))
                .unwrap();

        assert_eq!(registry.kinds(), ProviderKind::ALL.to_vec());
        let gemini = registry.get(ProviderKind::Gemini).unwrap();
        assert_eq!(gemini.default_model(), Some("gemini-1.5-flash"));
        assert!(!gemini.is_configured());
    }

    #[test]
    fn test_registry_reports_configured_keys() {
        let creds = StaticCredentials::new().with("XAI_API_KEY", "x");
        let registry = ProviderRegistry::with_credentials(&Config::default(), Arc::new(creds)).unwrap();

        assert!(registry.get(ProviderKind::Xai).unwrap().is_configured());
        assert!(!registry.get(ProviderKind::OpenAi).unwrap().is_configured());
    }

    #[tokio::test]
    async fn test_missing_credential_short_circuits() {
        let registry =
            ProviderRegistry::with_credentials(&Config::default(), Arc::new(StaticCredentials::new()))
                .unwrap();
        let client = registry.get(ProviderKind::Xai).unwrap();

        let prompt = crate::types::requests::Prompt::new("hi");
        let result = client.query(&prompt).await;

        assert_eq!(result.error.as_deref(), Some("XAI_API_KEY not set"));
        assert_eq!(
            result.error_kind,
            Some(crate::types::errors::ProviderErrorKind::Configuration)
        );
        assert!(result.latency_ms.is_none());
        assert!(result.model.is_none());
        assert_eq!(result.output, "");
    }

    #[tokio::test]
    async fn test_missing_credential_keeps_override_model() {
        let registry =
            ProviderRegistry::with_credentials(&Config::default(), Arc::new(StaticCredentials::new()))
                .unwrap();
        let client = registry.get(ProviderKind::OpenAi).unwrap();

        let prompt = crate::types::requests::Prompt::new("hi").with_model(ProviderKind::OpenAi, "gpt-4o");
        let result = client.query(&prompt).await;
        assert_eq!(result.model.as_deref(), Some("gpt-4o"));
    }
}

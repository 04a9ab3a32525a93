//! Request types for MAGI.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::config::ConsensusConfig;
use crate::{MagiError, MagiResult};

// ═══════════════════════════════════════════════════════════════════════════
// Provider identity
// ═══════════════════════════════════════════════════════════════════════════

/// A supported upstream LLM vendor.
///
/// Variant order is the canonical result order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Gemini,
    Xai,
    Anthropic,
}

impl ProviderKind {
    /// All providers in canonical order.
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::OpenAi,
        ProviderKind::Gemini,
        ProviderKind::Xai,
        ProviderKind::Anthropic,
    ];

    /// Wire name of the provider.
    pub fn name(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Xai => "xai",
            ProviderKind::Anthropic => "anthropic",
        }
    }

    /// Environment variable holding the API key.
    pub fn credential_env(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
            ProviderKind::Xai => "XAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    /// Environment variable overriding the default model.
    pub fn model_env(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_MODEL",
            ProviderKind::Gemini => "GEMINI_MODEL",
            ProviderKind::Xai => "XAI_MODEL",
            ProviderKind::Anthropic => "ANTHROPIC_MODEL",
        }
    }

    /// Parses a list of wire names, rejecting unknown ones and dropping duplicates.
    ///
    /// The result is sorted in canonical order.
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> MagiResult<Vec<ProviderKind>> {
        let mut kinds = Vec::with_capacity(names.len());
        for name in names {
            let kind: ProviderKind = name.as_ref().parse()?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        kinds.sort();
        Ok(kinds)
    }
}

impl FromStr for ProviderKind {
    type Err = MagiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "gemini" => Ok(ProviderKind::Gemini),
            "xai" => Ok(ProviderKind::Xai),
            "anthropic" => Ok(ProviderKind::Anthropic),
            _ => Err(MagiError::UnknownProvider(s.to_string())),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Prompt
// ═══════════════════════════════════════════════════════════════════════════

/// A fully resolved prompt, shared read-only by every provider call.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    /// User prompt text.
    pub text: String,

    /// Optional system instruction.
    pub system: Option<String>,

    /// Per-provider model overrides.
    pub models: HashMap<ProviderKind, String>,

    /// Sampling temperature.
    pub temperature: f64,

    /// Per-call deadline.
    pub timeout: Duration,

    /// Maximum output tokens, if capped.
    pub max_tokens: Option<u32>,
}

impl Prompt {
    /// Creates a prompt with default sampling settings.
    pub fn new(text: impl Into<String>) -> Self {
        let defaults = ConsensusConfig::default();
        Self {
            text: text.into(),
            system: None,
            models: HashMap::new(),
            temperature: defaults.temperature,
            timeout: Duration::from_millis(defaults.timeout_ms),
            max_tokens: defaults.max_tokens,
        }
    }

    /// Sets the system instruction.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Overrides the model for one provider.
    pub fn with_model(mut self, provider: ProviderKind, model: impl Into<String>) -> Self {
        self.models.insert(provider, model.into());
        self
    }

    /// Sets the temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the per-call deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Caps the output length.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Model override for a provider, if any.
    pub fn model_for(&self, provider: ProviderKind) -> Option<&str> {
        self.models.get(&provider).map(String::as_str)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Inbound request
// ═══════════════════════════════════════════════════════════════════════════

/// Inbound consensus/compare request as received on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsensusRequest {
    /// User prompt (required, non-empty).
    #[serde(default)]
    pub prompt: Option<String>,

    /// Optional system instruction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Providers to query; empty or absent means every enabled provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub providers: Option<Vec<String>>,

    /// Per-provider model overrides keyed by provider name.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub models: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// A validated request: the prompt plus the canonical provider list.
#[derive(Debug, Clone)]
pub struct ResolvedRequest {
    pub prompt: Prompt,
    pub providers: Vec<ProviderKind>,
}

impl ConsensusRequest {
    /// Creates a request for a prompt with every other field defaulted.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            ..Default::default()
        }
    }

    /// Restricts the request to the given providers.
    pub fn with_providers<S: Into<String>>(mut self, providers: impl IntoIterator<Item = S>) -> Self {
        self.providers = Some(providers.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the system instruction.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Validates the request and fills defaults.
    ///
    /// `enabled` is the provider set used when the request names none.
    pub fn resolve(
        &self,
        enabled: &[ProviderKind],
        defaults: &ConsensusConfig,
    ) -> MagiResult<ResolvedRequest> {
        let text = match self.prompt.as_deref() {
            Some(p) if !p.trim().is_empty() => p.to_string(),
            _ => return Err(MagiError::invalid_request("prompt is required")),
        };

        let providers = match self.providers.as_deref() {
            Some(names) if !names.is_empty() => ProviderKind::parse_list(names)?,
            _ => {
                let mut all = enabled.to_vec();
                all.sort();
                all.dedup();
                all
            }
        };
        if providers.is_empty() {
            return Err(MagiError::invalid_request("no providers enabled"));
        }

        let mut models = HashMap::new();
        for (name, model) in &self.models {
            let kind: ProviderKind = name.parse()?;
            if !model.trim().is_empty() {
                models.insert(kind, model.trim().to_string());
            }
        }

        let temperature = self.temperature.unwrap_or(defaults.temperature);
        if !temperature.is_finite() || temperature < 0.0 {
            return Err(MagiError::invalid_request(format!(
                "temperature must be a non-negative number, got {}",
                temperature
            )));
        }

        let timeout_ms = self.timeout_ms.unwrap_or(defaults.timeout_ms);
        if timeout_ms == 0 {
            return Err(MagiError::invalid_request("timeout_ms must be positive"));
        }

        Ok(ResolvedRequest {
            prompt: Prompt {
                text,
                system: self.system.clone().filter(|s| !s.trim().is_empty()),
                models,
                temperature,
                timeout: Duration::from_millis(timeout_ms),
                max_tokens: self.max_tokens.or(defaults.max_tokens),
            },
            providers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn defaults() -> ConsensusConfig {
        ConsensusConfig::default()
    }

    #[test]
    fn test_provider_kind_roundtrip_names() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.name().parse::<ProviderKind>().unwrap(), kind);
        }
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert!("mistral".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_provider_kind_serde_name() {
        assert_eq!(serde_json::to_string(&ProviderKind::OpenAi).unwrap(), "\"openai\"");
        assert_eq!(serde_json::to_string(&ProviderKind::Xai).unwrap(), "\"xai\"");
    }

    #[test]
    fn test_parse_list_canonical_and_deduplicated() {
        let kinds = ProviderKind::parse_list(&["xai", "openai", "xai", "gemini"]).unwrap();
        assert_eq!(
            kinds,
            vec![ProviderKind::OpenAi, ProviderKind::Gemini, ProviderKind::Xai]
        );
    }

    #[test]
    fn test_resolve_defaults() {
        let request: ConsensusRequest = serde_json::from_value(json!({"prompt": "2+2?"})).unwrap();
        let resolved = request.resolve(&ProviderKind::ALL, &defaults()).unwrap();

        assert_eq!(resolved.prompt.text, "2+2?");
        assert_eq!(resolved.providers, ProviderKind::ALL.to_vec());
        assert!((resolved.prompt.temperature - 0.2).abs() < f64::EPSILON);
        assert_eq!(resolved.prompt.timeout, Duration::from_millis(30_000));
        assert!(resolved.prompt.max_tokens.is_none());
    }

    #[test]
    fn test_resolve_missing_prompt_is_bad_request() {
        let request: ConsensusRequest = serde_json::from_value(json!({})).unwrap();
        let err = request.resolve(&ProviderKind::ALL, &defaults()).unwrap_err();
        assert_eq!(err.status_code(), 400);

        let blank = ConsensusRequest::new("   ");
        assert!(blank.resolve(&ProviderKind::ALL, &defaults()).is_err());
    }

    #[test]
    fn test_resolve_unknown_provider_is_bad_request() {
        let request = ConsensusRequest::new("hi").with_providers(["openai", "mistral"]);
        let err = request.resolve(&ProviderKind::ALL, &defaults()).unwrap_err();
        assert!(matches!(err, MagiError::UnknownProvider(ref p) if p == "mistral"));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_resolve_model_overrides_and_settings() {
        let request: ConsensusRequest = serde_json::from_value(json!({
            "prompt": "hello",
            "system": "be brief",
            "providers": ["gemini"],
            "models": {"gemini": "gemini-2.0-pro"},
            "temperature": 0.7,
            "timeout_ms": 5000,
            "max_tokens": 64
        }))
        .unwrap();

        let resolved = request.resolve(&ProviderKind::ALL, &defaults()).unwrap();
        assert_eq!(resolved.providers, vec![ProviderKind::Gemini]);
        assert_eq!(resolved.prompt.model_for(ProviderKind::Gemini), Some("gemini-2.0-pro"));
        assert_eq!(resolved.prompt.model_for(ProviderKind::OpenAi), None);
        assert_eq!(resolved.prompt.system.as_deref(), Some("be brief"));
        assert_eq!(resolved.prompt.timeout, Duration::from_millis(5000));
        assert_eq!(resolved.prompt.max_tokens, Some(64));
    }

    #[test]
    fn test_resolve_rejects_bad_numbers() {
        let mut request = ConsensusRequest::new("hi");
        request.timeout_ms = Some(0);
        assert!(request.resolve(&ProviderKind::ALL, &defaults()).is_err());

        let mut request = ConsensusRequest::new("hi");
        request.temperature = Some(-1.0);
        assert!(request.resolve(&ProviderKind::ALL, &defaults()).is_err());
    }

    #[test]
    fn test_resolve_empty_list_uses_enabled() {
        let request = ConsensusRequest::new("hi").with_providers(Vec::<String>::new());
        let resolved = request
            .resolve(&[ProviderKind::Xai, ProviderKind::OpenAi], &defaults())
            .unwrap();
        assert_eq!(resolved.providers, vec![ProviderKind::OpenAi, ProviderKind::Xai]);
    }

    #[test]
    fn test_prompt_builder() {
        let prompt = Prompt::new("q")
            .with_system("s")
            .with_model(ProviderKind::Xai, "grok-beta")
            .with_temperature(0.0)
            .with_max_tokens(8);

        assert_eq!(prompt.system.as_deref(), Some("s"));
        assert_eq!(prompt.model_for(ProviderKind::Xai), Some("grok-beta"));
        assert_eq!(prompt.max_tokens, Some(8));
    }
}

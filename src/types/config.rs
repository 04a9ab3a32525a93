//! Configuration for MAGI.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::types::requests::ProviderKind;
use crate::{MagiError, MagiResult};

/// Default configuration file name.
pub const CONFIG_FILE: &str = "magi.toml";

/// Main configuration for MAGI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Upstream provider settings.
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Dispatch and vote settings.
    #[serde(default)]
    pub consensus: ConsensusConfig,

    /// Tie-break judge settings.
    #[serde(default)]
    pub judge: JudgeConfig,

    /// Daily usage limits.
    #[serde(default)]
    pub quota: QuotaConfig,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// ═══════════════════════════════════════════════════════════════════════════
// Providers
// ═══════════════════════════════════════════════════════════════════════════

/// Per-provider settings, one table per vendor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: ProviderConfig,

    #[serde(default)]
    pub gemini: ProviderConfig,

    #[serde(default)]
    pub xai: ProviderConfig,

    #[serde(default)]
    pub anthropic: ProviderConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            openai: ProviderConfig::with_model("gpt-4o-mini"),
            gemini: ProviderConfig::with_model("gemini-1.5-flash"),
            xai: ProviderConfig::with_model("grok-2-latest"),
            anthropic: ProviderConfig::with_model("claude-3-5-sonnet-latest"),
        }
    }
}

impl ProvidersConfig {
    /// Settings for one provider.
    pub fn get(&self, kind: ProviderKind) -> &ProviderConfig {
        match kind {
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Gemini => &self.gemini,
            ProviderKind::Xai => &self.xai,
            ProviderKind::Anthropic => &self.anthropic,
        }
    }

    /// Mutable settings for one provider.
    pub fn get_mut(&mut self, kind: ProviderKind) -> &mut ProviderConfig {
        match kind {
            ProviderKind::OpenAi => &mut self.openai,
            ProviderKind::Gemini => &mut self.gemini,
            ProviderKind::Xai => &mut self.xai,
            ProviderKind::Anthropic => &mut self.anthropic,
        }
    }

    /// Enabled providers in canonical order.
    pub fn enabled(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| self.get(*kind).enabled)
            .collect()
    }
}

/// Settings for a single provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Default model id; the built-in default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Endpoint base URL override (proxies, compatible APIs, tests).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Environment variable holding the API key, if not the standard one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

impl ProviderConfig {
    /// Creates an enabled provider with a default model.
    pub fn with_model(model: &str) -> Self {
        Self {
            model: Some(model.to_string()),
            ..Self::default()
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: None,
            base_url: None,
            api_key_env: None,
        }
    }
}

fn default_true() -> bool {
    true
}

// ═══════════════════════════════════════════════════════════════════════════
// Consensus & judge
// ═══════════════════════════════════════════════════════════════════════════

/// Dispatch and vote settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Default sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Default per-call deadline in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Default output cap; vendors decide when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Vote strategy.
    #[serde(default)]
    pub voter: VoterStrategy,

    /// Jaccard similarity threshold for the cluster voter.
    #[serde(default = "default_cluster_threshold")]
    pub cluster_threshold: f64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            timeout_ms: default_timeout_ms(),
            max_tokens: None,
            voter: VoterStrategy::default(),
            cluster_threshold: default_cluster_threshold(),
        }
    }
}

fn default_temperature() -> f64 {
    0.2
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_cluster_threshold() -> f64 {
    0.3
}

/// Available vote strategies.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VoterStrategy {
    /// Exact match on the canonicalized answer.
    #[default]
    Exact,
    /// Keyword-overlap clustering.
    Cluster,
}

impl std::fmt::Display for VoterStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoterStrategy::Exact => write!(f, "exact"),
            VoterStrategy::Cluster => write!(f, "cluster"),
        }
    }
}

/// Tie-break judge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeConfig {
    /// Provider hosting the judge model.
    #[serde(default = "default_judge_provider")]
    pub provider: ProviderKind,

    /// Judge model id.
    #[serde(default = "default_judge_model")]
    pub model: String,

    /// Judge call deadline in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            provider: default_judge_provider(),
            model: default_judge_model(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_judge_provider() -> ProviderKind {
    ProviderKind::OpenAi
}

fn default_judge_model() -> String {
    "gpt-4o".to_string()
}

// ═══════════════════════════════════════════════════════════════════════════
// Quota
// ═══════════════════════════════════════════════════════════════════════════

/// Daily usage limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Enforce the limits.
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub limits: QuotaLimits,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            limits: QuotaLimits::default(),
        }
    }
}

/// Per-provider daily limits; providers without an entry are unlimited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai: Option<DailyLimit>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini: Option<DailyLimit>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xai: Option<DailyLimit>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anthropic: Option<DailyLimit>,
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            openai: Some(DailyLimit::new(100, 10_000)),
            gemini: Some(DailyLimit::new(200, 15_000)),
            xai: None,
            anthropic: None,
        }
    }
}

impl QuotaLimits {
    /// Limit for one provider, if any.
    pub fn get(&self, kind: ProviderKind) -> Option<DailyLimit> {
        match kind {
            ProviderKind::OpenAi => self.openai,
            ProviderKind::Gemini => self.gemini,
            ProviderKind::Xai => self.xai,
            ProviderKind::Anthropic => self.anthropic,
        }
    }
}

/// Requests and tokens allowed per calendar day.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyLimit {
    pub requests: u64,
    pub tokens: u64,
}

impl DailyLimit {
    pub fn new(requests: u64, tokens: u64) -> Self {
        Self { requests, tokens }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Loading
// ═══════════════════════════════════════════════════════════════════════════

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> MagiResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Saves configuration to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> MagiResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Creates default configuration.
    pub fn default_config() -> Self {
        Self {
            general: GeneralConfig::default(),
            providers: ProvidersConfig::default(),
            consensus: ConsensusConfig::default(),
            judge: JudgeConfig::default(),
            quota: QuotaConfig::default(),
        }
    }

    /// Per-user configuration path (`<config dir>/magi/magi.toml`).
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("magi").join(CONFIG_FILE))
    }

    /// Finds the file to load: `preferred` if it exists, else the per-user file.
    pub fn locate(preferred: &Path) -> Option<PathBuf> {
        if preferred.exists() {
            return Some(preferred.to_path_buf());
        }
        Self::user_config_path().filter(|p| p.exists())
    }

    /// Tries to load configuration from the current directory or the user
    /// config directory, falling back to defaults.
    pub fn load_or_default() -> Self {
        Self::locate(Path::new(CONFIG_FILE))
            .and_then(|path| Self::load(path).ok())
            .unwrap_or_else(Self::default_config)
    }

    /// Applies `<PROVIDER>_MODEL` and `JUDGE_MODEL` from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Applies model overrides from an arbitrary variable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for kind in ProviderKind::ALL {
            if let Some(model) = lookup(kind.model_env()).filter(|m| !m.trim().is_empty()) {
                tracing::debug!(provider = %kind, model = %model, "Model overridden from environment");
                self.providers.get_mut(kind).model = Some(model);
            }
        }
        if let Some(model) = lookup("JUDGE_MODEL").filter(|m| !m.trim().is_empty()) {
            self.judge.model = model;
        }
    }

    /// Checks values that serde cannot.
    pub fn validate(&self) -> MagiResult<()> {
        if !["text", "json"].contains(&self.general.log_format.as_str()) {
            return Err(MagiError::config(format!(
                "general.log_format must be 'text' or 'json', got '{}'",
                self.general.log_format
            )));
        }
        if self.consensus.timeout_ms == 0 || self.judge.timeout_ms == 0 {
            return Err(MagiError::config("timeouts must be positive"));
        }
        if !(self.consensus.temperature.is_finite() && self.consensus.temperature >= 0.0) {
            return Err(MagiError::config("consensus.temperature must be non-negative"));
        }
        let threshold = self.consensus.cluster_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(MagiError::config(
                "consensus.cluster_threshold must be in (0, 1]",
            ));
        }
        if self.providers.enabled().is_empty() {
            return Err(MagiError::config("at least one provider must be enabled"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

//! Response types for MAGI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::errors::ProviderErrorKind;
use crate::types::requests::ProviderKind;

// ═══════════════════════════════════════════════════════════════════════════
// Per-provider outcome
// ═══════════════════════════════════════════════════════════════════════════

/// Token usage reported by a vendor.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
}

impl TokenUsage {
    pub fn new(input: u64, output: u64) -> Self {
        Self { input, output }
    }

    pub fn total(&self) -> u64 {
        self.input + self.output
    }
}

/// Outcome of one provider call. Errors are data, never exceptions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderResult {
    /// Provider that produced this result.
    pub provider: ProviderKind,

    /// Resolved model id; `None` when unconfigured and no override was given.
    pub model: Option<String>,

    /// Normalized answer text, possibly empty.
    pub output: String,

    /// Wall-clock latency; `None` if the call never started.
    pub latency_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ProviderErrorKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenUsage>,
}

impl ProviderResult {
    /// Creates a successful result.
    pub fn success(
        provider: ProviderKind,
        model: impl Into<String>,
        output: impl Into<String>,
        latency_ms: u64,
    ) -> Self {
        Self {
            provider,
            model: Some(model.into()),
            output: output.into(),
            latency_ms: Some(latency_ms),
            error: None,
            error_kind: None,
            tokens: None,
        }
    }

    /// Creates a failed result.
    pub fn failure(
        provider: ProviderKind,
        model: Option<String>,
        kind: ProviderErrorKind,
        message: impl Into<String>,
        latency_ms: Option<u64>,
    ) -> Self {
        Self {
            provider,
            model,
            output: String::new(),
            latency_ms,
            error: Some(message.into()),
            error_kind: Some(kind),
            tokens: None,
        }
    }

    /// Attaches token usage.
    pub fn with_tokens(mut self, tokens: TokenUsage) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// A result counts toward consensus when it has no error and non-empty output.
    pub fn is_valid(&self) -> bool {
        self.error.is_none() && !self.output.is_empty()
    }

    /// Short failure description used in `no_valid_answers` messages.
    pub fn failure_reason(&self) -> &str {
        self.error.as_deref().unwrap_or("no output")
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Decision
// ═══════════════════════════════════════════════════════════════════════════

/// How the final answer was chosen.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DecisionMethod {
    /// A unique canonical answer had the most votes.
    Majority,
    /// The tie set had more than one member and the judge picked.
    Judge,
    /// Exactly one provider answered.
    Single,
}

impl std::fmt::Display for DecisionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionMethod::Majority => write!(f, "majority"),
            DecisionMethod::Judge => write!(f, "judge"),
            DecisionMethod::Single => write!(f, "single"),
        }
    }
}

/// The judge's pick among the valid candidates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JudgeVerdict {
    /// Index into the candidate list, already clamped to range.
    pub index: usize,
    pub reason: String,
}

impl JudgeVerdict {
    pub fn new(index: usize, reason: impl Into<String>) -> Self {
        Self {
            index,
            reason: reason.into(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Request-level responses
// ═══════════════════════════════════════════════════════════════════════════

/// Successful consensus response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusResponse {
    pub request_id: String,
    pub prompt: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    #[serde(rename = "decidedBy")]
    pub decided_by: DecisionMethod,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judge: Option<JudgeVerdict>,

    /// Every dispatched provider, in canonical order.
    pub results: Vec<ProviderResult>,

    #[serde(rename = "final")]
    pub final_answer: String,
}

impl ConsensusResponse {
    /// Number of providers that produced a usable answer.
    pub fn valid_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_valid()).count()
    }
}

/// Fan-out without reduction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareResponse {
    pub request_id: String,
    pub prompt: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<ProviderResult>,
}

/// Static view of one registered provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderStatus {
    pub provider: ProviderKind,
    /// Part of the default provider set.
    pub enabled: bool,
    /// Credential present.
    pub configured: bool,
    pub model: Option<String>,
}

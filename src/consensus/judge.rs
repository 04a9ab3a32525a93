//! LLM-as-judge tie-break.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::providers::{ProviderClient, ProviderRegistry};
use crate::types::config::JudgeConfig;
use crate::types::requests::{Prompt, ProviderKind};
use crate::types::responses::JudgeVerdict;
use crate::{MagiError, MagiResult};

/// System instruction sent to the judge model.
pub const JUDGE_SYSTEM: &str =
    r#"You are an impartial judge. Return JSON like {"winner": <index>, "reason": "<short>"}"#;

/// User message listing the prompt, the numbered candidates and the rules.
pub fn build_judge_prompt(prompt: &str, candidates: &[&str]) -> String {
    let mut message = format!("User prompt:\n{}\n\nCandidates:\n", prompt);
    for (i, candidate) in candidates.iter().enumerate() {
        message.push_str(&format!("[{}] {}\n", i, candidate));
    }
    message.push_str("\nRules:\n");
    message.push_str("- Pick exactly one index.\n");
    message.push_str("- Prefer factual accuracy, internal consistency, and clarity.");
    message
}

// Only whole numbers name a candidate.
fn index_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Reads the verdict out of the judge's reply.
///
/// Takes the span from the first `{` to the last `}`. No object yields
/// `{0, "fallback"}`; an unparseable one yields `{0, "parse_fallback"}`. An
/// index that is not a whole number or falls outside `0..candidates` becomes 0.
pub fn parse_verdict(reply: &str, candidates: usize) -> JudgeVerdict {
    let span = match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => return JudgeVerdict::new(0, "fallback"),
    };

    let Ok(json) = serde_json::from_str::<Value>(span) else {
        return JudgeVerdict::new(0, "parse_fallback");
    };

    let raw = json
        .get("winner")
        .or_else(|| json.get("index"))
        .and_then(index_of)
        .unwrap_or(0);

    let reason = match json.get("reason") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Null) | None => "judge".to_string(),
        Some(Value::String(_)) => "judge".to_string(),
        Some(other) => other.to_string(),
    };

    let index = match usize::try_from(raw) {
        Ok(i) if i < candidates => i,
        _ => {
            tracing::warn!(index = raw, candidates, "Judge index out of range, using 0");
            0
        }
    };

    JudgeVerdict::new(index, reason)
}

/// Picks one answer among tied candidates using a fixed judge model.
#[derive(Clone)]
pub struct Judge {
    client: Arc<dyn ProviderClient>,
    model: String,
    timeout: Duration,
}

impl Judge {
    /// Creates a judge on top of a provider client.
    pub fn new(client: Arc<dyn ProviderClient>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            model: model.into(),
            timeout,
        }
    }

    /// Creates the configured judge from the registry.
    pub fn from_config(config: &JudgeConfig, registry: &ProviderRegistry) -> MagiResult<Self> {
        let client = registry.get(config.provider).ok_or_else(|| {
            MagiError::config(format!("judge provider '{}' is not registered", config.provider))
        })?;
        Ok(Self::new(
            client,
            config.model.clone(),
            Duration::from_millis(config.timeout_ms),
        ))
    }

    /// Provider hosting the judge.
    pub fn provider(&self) -> ProviderKind {
        self.client.kind()
    }

    /// Judge model id.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Asks the judge to pick one candidate.
    ///
    /// Fails only when the judge call itself fails; a malformed reply falls
    /// back to index 0.
    pub async fn decide(&self, prompt: &str, candidates: &[&str]) -> MagiResult<JudgeVerdict> {
        let request = Prompt::new(build_judge_prompt(prompt, candidates))
            .with_system(JUDGE_SYSTEM)
            .with_model(self.client.kind(), self.model.clone())
            .with_temperature(0.0)
            .with_timeout(self.timeout);

        let result = self.client.query(&request).await;
        if let Some(error) = result.error {
            return Err(MagiError::Judge(error));
        }

        let verdict = parse_verdict(&result.output, candidates.len());
        tracing::info!(
            provider = %self.client.kind(),
            model = %self.model,
            index = verdict.index,
            reason = %verdict.reason,
            "Judge decided"
        );
        Ok(verdict)
    }
}

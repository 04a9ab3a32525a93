//! Built-in hooks.
//!
//! - `LoggingHook`: logs every decision and failure
//! - `MetricsHook`: counts decisions, failures and provider latency

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::Serialize;

use crate::types::responses::DecisionMethod;
use crate::MagiResult;

use super::{Hook, HookContext, HookEvent, HookResult};

// ═══════════════════════════════════════════════════════════════════════════
// LoggingHook
// ═══════════════════════════════════════════════════════════════════════════

/// Logs the outcome of every request through `tracing`.
#[derive(Debug, Default)]
pub struct LoggingHook;

impl LoggingHook {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Hook for LoggingHook {
    fn name(&self) -> &str {
        "logging"
    }

    fn events(&self) -> &[HookEvent] {
        &[HookEvent::OnJudge, HookEvent::PostConsensus, HookEvent::OnFailure]
    }

    async fn execute(&self, context: &HookContext<'_>) -> MagiResult<HookResult> {
        match context {
            HookContext::OnJudge {
                request_id,
                candidates,
                verdict,
            } => {
                tracing::info!(
                    request_id = %request_id,
                    candidates = candidates.len(),
                    index = verdict.index,
                    reason = %verdict.reason,
                    "Tie broken by judge"
                );
            }
            HookContext::PostConsensus { response } => {
                tracing::info!(
                    request_id = %response.request_id,
                    decided_by = %response.decided_by,
                    valid = response.valid_count(),
                    total = response.results.len(),
                    "Consensus reached"
                );
            }
            HookContext::OnFailure { request_id, error } => {
                tracing::warn!(
                    request_id = %request_id,
                    status = error.status_code(),
                    error = %error,
                    "Request failed"
                );
            }
            _ => {}
        }

        Ok(HookResult::Continue)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// MetricsHook
// ═══════════════════════════════════════════════════════════════════════════

/// Collects request counters.
///
/// Register it behind an `Arc` and keep a clone to read [`MetricsHook::metrics`].
#[derive(Debug, Default)]
pub struct MetricsHook {
    requests: AtomicU64,
    majority: AtomicU64,
    judged: AtomicU64,
    single: AtomicU64,
    failures: AtomicU64,

    /// Provider calls that reported a latency.
    calls: AtomicU64,
    latency_sum_ms: AtomicU64,
}

impl MetricsHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that reached a decision or failed.
    pub fn total_requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn total_failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Share of decisions that needed the judge.
    pub fn judge_rate(&self) -> f64 {
        let decided = self.total_requests() - self.total_failures();
        if decided == 0 {
            0.0
        } else {
            self.judged.load(Ordering::Relaxed) as f64 / decided as f64
        }
    }

    /// Mean provider latency in milliseconds.
    pub fn average_latency_ms(&self) -> f64 {
        let calls = self.calls.load(Ordering::Relaxed);
        if calls == 0 {
            0.0
        } else {
            self.latency_sum_ms.load(Ordering::Relaxed) as f64 / calls as f64
        }
    }

    /// Snapshot of every counter.
    pub fn metrics(&self) -> Metrics {
        Metrics {
            total_requests: self.total_requests(),
            majority: self.majority.load(Ordering::Relaxed),
            judge: self.judged.load(Ordering::Relaxed),
            single: self.single.load(Ordering::Relaxed),
            failures: self.total_failures(),
            judge_rate: self.judge_rate(),
            average_latency_ms: self.average_latency_ms(),
        }
    }
}

/// Counters collected by [`MetricsHook`].
#[derive(Debug, Clone, Serialize)]
pub struct Metrics {
    pub total_requests: u64,
    pub majority: u64,
    pub judge: u64,
    pub single: u64,
    pub failures: u64,
    pub judge_rate: f64,
    pub average_latency_ms: f64,
}

#[async_trait]
impl Hook for MetricsHook {
    fn name(&self) -> &str {
        "metrics"
    }

    fn events(&self) -> &[HookEvent] {
        &[HookEvent::PostDispatch, HookEvent::PostConsensus, HookEvent::OnFailure]
    }

    async fn execute(&self, context: &HookContext<'_>) -> MagiResult<HookResult> {
        match context {
            HookContext::PostDispatch { results, .. } => {
                for latency in results.iter().filter_map(|r| r.latency_ms) {
                    self.calls.fetch_add(1, Ordering::Relaxed);
                    self.latency_sum_ms.fetch_add(latency, Ordering::Relaxed);
                }
            }
            HookContext::PostConsensus { response } => {
                self.requests.fetch_add(1, Ordering::Relaxed);
                let counter = match response.decided_by {
                    DecisionMethod::Majority => &self.majority,
                    DecisionMethod::Judge => &self.judged,
                    DecisionMethod::Single => &self.single,
                };
                counter.fetch_add(1, Ordering::Relaxed);
            }
            HookContext::OnFailure { .. } => {
                self.requests.fetch_add(1, Ordering::Relaxed);
                self.failures.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }

        Ok(HookResult::Continue)
    }
}

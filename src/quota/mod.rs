//! Daily usage quota.
//!
//! Quota is injected into the dispatcher as a [`QuotaChecker`]. The only
//! shared mutable state in a request lives behind it.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{Local, NaiveDate};
use serde::Serialize;

use crate::types::config::{DailyLimit, QuotaConfig, QuotaLimits};
use crate::types::requests::ProviderKind;

/// Admission control and usage accounting for provider calls.
pub trait QuotaChecker: Send + Sync {
    /// Admits one call, counting it against today's request budget.
    ///
    /// Returns the denial message when the budget is exhausted.
    fn try_acquire(&self, provider: ProviderKind) -> Result<(), String>;

    /// Adds tokens consumed by an admitted call.
    fn record_tokens(&self, provider: ProviderKind, tokens: u64);

    /// Today's usage per provider.
    fn usage(&self) -> Vec<ProviderUsage>;
}

/// Rough token count used when a vendor reports no usage.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

/// Usage snapshot for one provider.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProviderUsage {
    pub provider: ProviderKind,
    pub date: NaiveDate,
    pub requests: u64,
    pub tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<DailyLimit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_requests: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_tokens: Option<u64>,
}

// ═══════════════════════════════════════════════════════════════════════════
// NoQuota
// ═══════════════════════════════════════════════════════════════════════════

/// Admits everything and tracks nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoQuota;

impl QuotaChecker for NoQuota {
    fn try_acquire(&self, _provider: ProviderKind) -> Result<(), String> {
        Ok(())
    }

    fn record_tokens(&self, _provider: ProviderKind, _tokens: u64) {}

    fn usage(&self) -> Vec<ProviderUsage> {
        Vec::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// DailyQuota
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default, Clone, Copy)]
struct Counter {
    requests: u64,
    tokens: u64,
}

#[derive(Debug)]
struct QuotaState {
    day: NaiveDate,
    counters: BTreeMap<ProviderKind, Counter>,
}

type Clock = Box<dyn Fn() -> NaiveDate + Send + Sync>;

/// Per-provider request and token budgets that reset at local midnight.
pub struct DailyQuota {
    limits: Option<QuotaLimits>,
    state: Mutex<QuotaState>,
    clock: Clock,
}

impl DailyQuota {
    /// Enforces the given limits.
    pub fn new(limits: QuotaLimits) -> Self {
        Self::build(Some(limits), Box::new(|| Local::now().date_naive()))
    }

    /// Counts usage without enforcing anything.
    pub fn unlimited() -> Self {
        Self::build(None, Box::new(|| Local::now().date_naive()))
    }

    /// Builds the checker described by configuration.
    pub fn from_config(config: &QuotaConfig) -> Self {
        if config.enabled {
            Self::new(config.limits.clone())
        } else {
            Self::unlimited()
        }
    }

    /// Replaces the date source.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> NaiveDate + Send + Sync + 'static,
    {
        let today = clock();
        self.clock = Box::new(clock);
        if let Ok(mut state) = self.state.lock() {
            state.day = today;
        }
        self
    }

    fn build(limits: Option<QuotaLimits>, clock: Clock) -> Self {
        let day = clock();
        Self {
            limits,
            state: Mutex::new(QuotaState {
                day,
                counters: BTreeMap::new(),
            }),
            clock,
        }
    }

    fn limit_for(&self, provider: ProviderKind) -> Option<DailyLimit> {
        self.limits.as_ref().and_then(|l| l.get(provider))
    }

    /// Locks the state, resetting every counter when the day rolled over.
    fn current(&self) -> std::sync::MutexGuard<'_, QuotaState> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let today = (self.clock)();
        if state.day != today {
            tracing::info!(previous = %state.day, today = %today, "Daily quota reset");
            state.day = today;
            state.counters.clear();
        }
        state
    }
}

impl QuotaChecker for DailyQuota {
    fn try_acquire(&self, provider: ProviderKind) -> Result<(), String> {
        let limit = self.limit_for(provider);
        let mut state = self.current();
        let counter = state.counters.entry(provider).or_default();

        if let Some(limit) = limit {
            if counter.requests >= limit.requests {
                return Err(format!(
                    "daily limit reached for {}: {} requests",
                    provider, limit.requests
                ));
            }
            if counter.tokens >= limit.tokens {
                return Err(format!(
                    "daily limit reached for {}: {} tokens",
                    provider, limit.tokens
                ));
            }
        }

        counter.requests += 1;
        Ok(())
    }

    fn record_tokens(&self, provider: ProviderKind, tokens: u64) {
        let mut state = self.current();
        state.counters.entry(provider).or_default().tokens += tokens;
    }

    fn usage(&self) -> Vec<ProviderUsage> {
        let state = self.current();
        ProviderKind::ALL
            .into_iter()
            .map(|provider| {
                let counter = state.counters.get(&provider).copied().unwrap_or_default();
                let limit = self.limit_for(provider);
                ProviderUsage {
                    provider,
                    date: state.day,
                    requests: counter.requests,
                    tokens: counter.tokens,
                    limit,
                    remaining_requests: limit.map(|l| l.requests.saturating_sub(counter.requests)),
                    remaining_tokens: limit.map(|l| l.tokens.saturating_sub(counter.tokens)),
                }
            })
            .collect()
    }
}

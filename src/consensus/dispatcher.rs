//! Concurrent fan-out to providers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;

use crate::providers::ProviderRegistry;
use crate::quota::{estimate_tokens, NoQuota, QuotaChecker};
use crate::types::errors::ProviderErrorKind;
use crate::types::requests::{Prompt, ProviderKind};
use crate::types::responses::ProviderResult;

/// Settled results of one fan-out.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// One result per requested provider, in canonical order.
    pub results: Vec<ProviderResult>,
}

/// Launches every provider call at once and waits for all of them.
#[derive(Clone)]
pub struct Dispatcher {
    registry: ProviderRegistry,
    quota: Arc<dyn QuotaChecker>,
}

impl Dispatcher {
    /// Creates a dispatcher without quota enforcement.
    pub fn new(registry: ProviderRegistry) -> Self {
        Self {
            registry,
            quota: Arc::new(NoQuota),
        }
    }

    /// Sets the quota checker consulted before each call.
    pub fn with_quota(mut self, quota: Arc<dyn QuotaChecker>) -> Self {
        self.quota = quota;
        self
    }

    /// Registered providers.
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Quota checker in use.
    pub fn quota(&self) -> &Arc<dyn QuotaChecker> {
        &self.quota
    }

    /// Queries `providers` concurrently with the same prompt.
    ///
    /// Each call carries its own deadline; a slow or failing provider never
    /// delays or fails the others beyond its own deadline.
    pub async fn dispatch(&self, providers: &[ProviderKind], prompt: &Prompt) -> Dispatch {
        let mut order = providers.to_vec();
        order.sort();
        order.dedup();

        tracing::info!(
            providers = ?order.iter().map(|p| p.name()).collect::<Vec<_>>(),
            timeout_ms = prompt.timeout.as_millis() as u64,
            "Dispatching prompt"
        );

        let started_at = Utc::now();
        let calls = order.iter().map(|&kind| self.call(kind, prompt));
        let results = join_all(calls).await;
        let finished_at = Utc::now();

        tracing::debug!(
            ok = results.iter().filter(|r| r.is_valid()).count(),
            total = results.len(),
            "Dispatch settled"
        );

        Dispatch {
            started_at,
            finished_at,
            results,
        }
    }

    async fn call(&self, kind: ProviderKind, prompt: &Prompt) -> ProviderResult {
        let override_model = prompt.model_for(kind).map(str::to_string);

        let Some(client) = self.registry.get(kind) else {
            return ProviderResult::failure(
                kind,
                override_model,
                ProviderErrorKind::Configuration,
                format!("provider {} is not registered", kind),
                None,
            );
        };

        // Unconfigured clients fail before any network call and use no quota.
        if !client.is_configured() {
            return client.query(prompt).await;
        }

        if let Err(message) = self.quota.try_acquire(kind) {
            tracing::warn!(provider = %kind, reason = %message, "Quota denied provider call");
            return ProviderResult::failure(
                kind,
                override_model,
                ProviderErrorKind::Quota,
                message,
                None,
            );
        }

        let result = client.query(prompt).await;

        if result.latency_ms.is_some() {
            let tokens = result
                .tokens
                .map(|t| t.total())
                .unwrap_or_else(|| estimate_tokens(&prompt.text) + estimate_tokens(&result.output));
            self.quota.record_tokens(kind, tokens);
        }

        result
    }
}

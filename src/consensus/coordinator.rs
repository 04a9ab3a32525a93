//! Request lifecycle: dispatch, filter, vote, decide or judge.

use std::sync::Arc;

use futures::future::join_all;

use crate::hooks::HookSystem;
use crate::providers::ProviderRegistry;
use crate::quota::{DailyQuota, ProviderUsage, QuotaChecker};
use crate::types::config::{Config, ConsensusConfig};
use crate::types::requests::{ConsensusRequest, ProviderKind};
use crate::types::responses::{
    CompareResponse, ConsensusResponse, DecisionMethod, JudgeVerdict, ProviderResult,
    ProviderStatus,
};
use crate::{MagiError, MagiResult};

use super::dispatcher::Dispatcher;
use super::judge::Judge;
use super::voter::{voter_for, ExactVoter, Voter};

/// Stage of a consensus request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Dispatching,
    Filtering,
    Voting,
    Deciding,
    Judging,
    Done,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Dispatching => write!(f, "dispatching"),
            Phase::Filtering => write!(f, "filtering"),
            Phase::Voting => write!(f, "voting"),
            Phase::Deciding => write!(f, "deciding"),
            Phase::Judging => write!(f, "judging"),
            Phase::Done => write!(f, "done"),
        }
    }
}

/// Builds the `no_valid_answers` message listing each provider's failure.
pub fn no_valid_answers(results: &[ProviderResult]) -> String {
    let reasons: Vec<String> = results
        .iter()
        .map(|r| format!("[{}] {}", r.provider, r.failure_reason()))
        .collect();
    format!("no_valid_answers: {}", reasons.join(" | "))
}

/// Orchestrates one consensus request end to end.
///
/// Holds no per-request state; a single coordinator serves concurrent
/// requests.
pub struct ConsensusCoordinator {
    dispatcher: Dispatcher,
    voter: Box<dyn Voter>,
    judge: Judge,
    hooks: HookSystem,
    defaults: ConsensusConfig,
    enabled: Vec<ProviderKind>,
}

impl ConsensusCoordinator {
    /// Creates a coordinator with exact voting, no hooks and default
    /// per-request settings. Every registered provider is in the default set.
    pub fn new(dispatcher: Dispatcher, judge: Judge) -> Self {
        let enabled = dispatcher.registry().kinds();
        Self {
            dispatcher,
            voter: Box::new(ExactVoter),
            judge,
            hooks: HookSystem::new(),
            defaults: ConsensusConfig::default(),
            enabled,
        }
    }

    /// Builds the coordinator described by configuration, reading
    /// credentials from the environment.
    pub fn from_config(config: &Config) -> MagiResult<Self> {
        let registry = ProviderRegistry::from_config(config)?;
        Self::from_registry(config, registry)
    }

    /// Builds the coordinator on top of an existing registry.
    pub fn from_registry(config: &Config, registry: ProviderRegistry) -> MagiResult<Self> {
        let judge = Judge::from_config(&config.judge, &registry)?;
        let quota: Arc<dyn QuotaChecker> = Arc::new(DailyQuota::from_config(&config.quota));
        let dispatcher = Dispatcher::new(registry).with_quota(quota);

        Ok(Self {
            dispatcher,
            voter: voter_for(&config.consensus),
            judge,
            hooks: HookSystem::with_defaults(),
            defaults: config.consensus.clone(),
            enabled: config.providers.enabled(),
        })
    }

    pub fn with_voter(mut self, voter: Box<dyn Voter>) -> Self {
        self.voter = voter;
        self
    }

    pub fn with_hooks(mut self, hooks: HookSystem) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_defaults(mut self, defaults: ConsensusConfig) -> Self {
        self.defaults = defaults;
        self
    }

    /// Sets the providers used when a request names none.
    pub fn with_enabled(mut self, enabled: Vec<ProviderKind>) -> Self {
        let mut enabled = enabled;
        enabled.sort();
        enabled.dedup();
        self.enabled = enabled;
        self
    }

    pub fn hooks_mut(&mut self) -> &mut HookSystem {
        &mut self.hooks
    }

    pub fn judge(&self) -> &Judge {
        &self.judge
    }

    pub fn voter(&self) -> &dyn Voter {
        self.voter.as_ref()
    }

    /// Default provider set.
    pub fn enabled(&self) -> &[ProviderKind] {
        &self.enabled
    }

    /// Runs the full consensus pipeline.
    ///
    /// Fails with `InvalidRequest`/`UnknownProvider` before any provider is
    /// contacted, with `AllProvidersFailed` when no answer is usable, and
    /// with `Judge` when a tie cannot be broken.
    pub async fn run(&self, request: &ConsensusRequest) -> MagiResult<ConsensusResponse> {
        let request_id = uuid::Uuid::new_v4().to_string();

        match self.decide(&request_id, request).await {
            Ok(response) => {
                self.hooks.run_post_consensus(&response).await;
                Ok(response)
            }
            Err(e) => {
                self.hooks.run_on_failure(&request_id, &e).await;
                Err(e)
            }
        }
    }

    async fn decide(&self, request_id: &str, request: &ConsensusRequest) -> MagiResult<ConsensusResponse> {
        let resolved = request.resolve(&self.enabled, &self.defaults)?;
        let providers = resolved.providers;
        let prompt = match self
            .hooks
            .run_pre_dispatch(request_id, &resolved.prompt, &providers)
            .await?
        {
            Some(replaced) => replaced,
            None => resolved.prompt,
        };

        self.enter(request_id, Phase::Dispatching);
        let dispatch = self.dispatcher.dispatch(&providers, &prompt).await;
        self.hooks.run_post_dispatch(request_id, &dispatch.results).await;

        self.enter(request_id, Phase::Filtering);
        let answers: Vec<&str> = dispatch
            .results
            .iter()
            .filter(|r| r.is_valid())
            .map(|r| r.output.as_str())
            .collect();

        if answers.is_empty() {
            return Err(MagiError::AllProvidersFailed {
                message: no_valid_answers(&dispatch.results),
                results: dispatch.results,
            });
        }

        let (decided_by, judge, final_answer) = if answers.len() == 1 {
            self.enter(request_id, Phase::Deciding);
            (DecisionMethod::Single, None, answers[0].to_string())
        } else {
            self.enter(request_id, Phase::Voting);
            let tally = self.voter.vote(&answers);
            tracing::debug!(
                request_id = %request_id,
                voter = self.voter.name(),
                winner = %tally.winner,
                count = tally.count,
                ties = tally.ties.len(),
                "Votes tallied"
            );

            if tally.is_tie() {
                self.enter(request_id, Phase::Judging);
                let verdict: JudgeVerdict = self.judge.decide(&prompt.text, &answers).await?;
                self.hooks.run_on_judge(request_id, &answers, &verdict).await;
                let chosen = answers.get(verdict.index).unwrap_or(&answers[0]).to_string();
                (DecisionMethod::Judge, Some(verdict), chosen)
            } else {
                self.enter(request_id, Phase::Deciding);
                let index = tally.first_answer_for(&tally.winner).unwrap_or(0);
                (DecisionMethod::Majority, None, answers[index].to_string())
            }
        };

        self.enter(request_id, Phase::Done);
        Ok(ConsensusResponse {
            request_id: request_id.to_string(),
            prompt: prompt.text,
            started_at: dispatch.started_at,
            finished_at: dispatch.finished_at,
            decided_by,
            judge,
            results: dispatch.results,
            final_answer,
        })
    }

    /// Fans out the prompt and returns every result without reducing them.
    ///
    /// Never fails because providers failed; only request validation and
    /// pre-dispatch hooks can fail.
    pub async fn compare(&self, request: &ConsensusRequest) -> MagiResult<CompareResponse> {
        let request_id = uuid::Uuid::new_v4().to_string();

        let resolved = match request.resolve(&self.enabled, &self.defaults) {
            Ok(resolved) => resolved,
            Err(e) => {
                self.hooks.run_on_failure(&request_id, &e).await;
                return Err(e);
            }
        };
        let prompt = match self
            .hooks
            .run_pre_dispatch(&request_id, &resolved.prompt, &resolved.providers)
            .await?
        {
            Some(replaced) => replaced,
            None => resolved.prompt,
        };

        let dispatch = self.dispatcher.dispatch(&resolved.providers, &prompt).await;
        self.hooks.run_post_dispatch(&request_id, &dispatch.results).await;

        Ok(CompareResponse {
            request_id,
            prompt: prompt.text,
            started_at: dispatch.started_at,
            finished_at: dispatch.finished_at,
            results: dispatch.results,
        })
    }

    /// Registered providers with their credential state and default model.
    pub fn status(&self) -> Vec<ProviderStatus> {
        let registry = self.dispatcher.registry();
        registry
            .kinds()
            .into_iter()
            .filter_map(|kind| registry.get(kind))
            .map(|client| ProviderStatus {
                provider: client.kind(),
                enabled: self.enabled.contains(&client.kind()),
                configured: client.is_configured(),
                model: client.default_model().map(str::to_string),
            })
            .collect()
    }

    /// Sends a tiny probe prompt to each provider concurrently.
    ///
    /// An empty list probes the default provider set.
    pub async fn ping(&self, providers: &[ProviderKind]) -> Vec<ProviderResult> {
        let mut targets = if providers.is_empty() {
            self.enabled.clone()
        } else {
            providers.to_vec()
        };
        targets.sort();
        targets.dedup();

        let registry = self.dispatcher.registry();
        let probes = targets.iter().filter_map(|&kind| registry.get(kind)).map(|client| async move {
            client.ping().await
        });
        join_all(probes).await
    }

    /// Today's quota usage per provider.
    pub fn usage(&self) -> Vec<ProviderUsage> {
        self.dispatcher.quota().usage()
    }

    fn enter(&self, request_id: &str, phase: Phase) {
        tracing::debug!(request_id = %request_id, phase = %phase, "Consensus phase");
    }
}

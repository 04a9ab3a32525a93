//! Hook system for MAGI.
//!
//! Hooks observe (and, before dispatch, adjust) the consensus lifecycle:
//!
//! - `pre_dispatch`: before any provider is contacted
//! - `post_dispatch`: after every provider call settled
//! - `on_judge`: after the judge broke a tie
//! - `post_consensus`: when a response is ready
//! - `on_failure`: when a request fails
//!
//! Errors from `pre_dispatch` hooks abort the request. Errors from every
//! other hook are logged and ignored.

mod builtin;

pub use builtin::{LoggingHook, Metrics, MetricsHook};

use std::sync::Arc;

use async_trait::async_trait;

use crate::types::requests::{Prompt, ProviderKind};
use crate::types::responses::{ConsensusResponse, JudgeVerdict, ProviderResult};
use crate::{MagiError, MagiResult};

// ═══════════════════════════════════════════════════════════════════════════
// Event types
// ═══════════════════════════════════════════════════════════════════════════

/// Event that triggers a hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    PreDispatch,
    PostDispatch,
    OnJudge,
    PostConsensus,
    OnFailure,
}

impl std::fmt::Display for HookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HookEvent::PreDispatch => write!(f, "pre_dispatch"),
            HookEvent::PostDispatch => write!(f, "post_dispatch"),
            HookEvent::OnJudge => write!(f, "on_judge"),
            HookEvent::PostConsensus => write!(f, "post_consensus"),
            HookEvent::OnFailure => write!(f, "on_failure"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Hook context
// ═══════════════════════════════════════════════════════════════════════════

/// Data handed to hooks.
pub enum HookContext<'a> {
    PreDispatch {
        request_id: &'a str,
        prompt: &'a Prompt,
        providers: &'a [ProviderKind],
    },

    PostDispatch {
        request_id: &'a str,
        results: &'a [ProviderResult],
    },

    OnJudge {
        request_id: &'a str,
        candidates: &'a [&'a str],
        verdict: &'a JudgeVerdict,
    },

    PostConsensus {
        response: &'a ConsensusResponse,
    },

    OnFailure {
        request_id: &'a str,
        error: &'a MagiError,
    },
}

impl<'a> HookContext<'a> {
    /// Returns the event matching the context.
    pub fn event(&self) -> HookEvent {
        match self {
            HookContext::PreDispatch { .. } => HookEvent::PreDispatch,
            HookContext::PostDispatch { .. } => HookEvent::PostDispatch,
            HookContext::OnJudge { .. } => HookEvent::OnJudge,
            HookContext::PostConsensus { .. } => HookEvent::PostConsensus,
            HookContext::OnFailure { .. } => HookEvent::OnFailure,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Hook result
// ═══════════════════════════════════════════════════════════════════════════

/// Result of running a hook.
#[derive(Debug, Clone, Default)]
pub enum HookResult {
    /// Carry on unchanged.
    #[default]
    Continue,

    /// Replace the prompt (only honored for pre_dispatch).
    ModifyPrompt(Prompt),
}

// ═══════════════════════════════════════════════════════════════════════════
// Hook trait
// ═══════════════════════════════════════════════════════════════════════════

/// A lifecycle observer.
#[async_trait]
pub trait Hook: Send + Sync {
    /// Hook name.
    fn name(&self) -> &str;

    /// Events this hook listens to.
    fn events(&self) -> &[HookEvent];

    /// Runs the hook.
    async fn execute(&self, context: &HookContext<'_>) -> MagiResult<HookResult>;
}

// ═══════════════════════════════════════════════════════════════════════════
// Hook system
// ═══════════════════════════════════════════════════════════════════════════

/// Hook registry and runner.
#[derive(Clone, Default)]
pub struct HookSystem {
    pre_dispatch: Vec<Arc<dyn Hook>>,
    post_dispatch: Vec<Arc<dyn Hook>>,
    on_judge: Vec<Arc<dyn Hook>>,
    post_consensus: Vec<Arc<dyn Hook>>,
    on_failure: Vec<Arc<dyn Hook>>,
}

impl HookSystem {
    /// Creates an empty hook system.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a system with the default hooks (logging).
    pub fn with_defaults() -> Self {
        let mut system = Self::new();
        system.register(Arc::new(LoggingHook));
        system
    }

    fn slot(&mut self, event: HookEvent) -> &mut Vec<Arc<dyn Hook>> {
        match event {
            HookEvent::PreDispatch => &mut self.pre_dispatch,
            HookEvent::PostDispatch => &mut self.post_dispatch,
            HookEvent::OnJudge => &mut self.on_judge,
            HookEvent::PostConsensus => &mut self.post_consensus,
            HookEvent::OnFailure => &mut self.on_failure,
        }
    }

    /// Registers a hook for each of its events.
    pub fn register(&mut self, hook: Arc<dyn Hook>) {
        for &event in hook.events() {
            tracing::debug!(hook_name = hook.name(), event = %event, "Registering hook");
            self.slot(event).push(hook.clone());
        }
    }

    /// Runs pre_dispatch hooks in order.
    ///
    /// A `ModifyPrompt` result replaces the prompt seen by later hooks; the
    /// final prompt is returned.
    pub async fn run_pre_dispatch(
        &self,
        request_id: &str,
        prompt: &Prompt,
        providers: &[ProviderKind],
    ) -> MagiResult<Option<Prompt>> {
        let mut current: Option<Prompt> = None;

        for hook in &self.pre_dispatch {
            let context = HookContext::PreDispatch {
                request_id,
                prompt: current.as_ref().unwrap_or(prompt),
                providers,
            };
            match hook.execute(&context).await? {
                HookResult::Continue => continue,
                HookResult::ModifyPrompt(new_prompt) => {
                    tracing::debug!(hook_name = hook.name(), "Hook replaced prompt");
                    current = Some(new_prompt);
                }
            }
        }

        Ok(current)
    }

    /// Runs post_dispatch hooks.
    pub async fn run_post_dispatch(&self, request_id: &str, results: &[ProviderResult]) {
        let context = HookContext::PostDispatch {
            request_id,
            results,
        };
        Self::run_observers(&self.post_dispatch, &context).await;
    }

    /// Runs on_judge hooks.
    pub async fn run_on_judge(&self, request_id: &str, candidates: &[&str], verdict: &JudgeVerdict) {
        let context = HookContext::OnJudge {
            request_id,
            candidates,
            verdict,
        };
        Self::run_observers(&self.on_judge, &context).await;
    }

    /// Runs post_consensus hooks.
    pub async fn run_post_consensus(&self, response: &ConsensusResponse) {
        let context = HookContext::PostConsensus { response };
        Self::run_observers(&self.post_consensus, &context).await;
    }

    /// Runs on_failure hooks.
    pub async fn run_on_failure(&self, request_id: &str, error: &MagiError) {
        let context = HookContext::OnFailure { request_id, error };
        Self::run_observers(&self.on_failure, &context).await;
    }

    async fn run_observers(hooks: &[Arc<dyn Hook>], context: &HookContext<'_>) {
        for hook in hooks {
            if let Err(e) = hook.execute(context).await {
                tracing::warn!(
                    hook_name = hook.name(),
                    event = %context.event(),
                    error = %e,
                    "Hook failed"
                );
            }
        }
    }

    /// Returns the number of registrations across all events.
    pub fn count(&self) -> usize {
        self.pre_dispatch.len()
            + self.post_dispatch.len()
            + self.on_judge.len()
            + self.post_consensus.len()
            + self.on_failure.len()
    }

    /// Returns the number of hooks for a specific event.
    pub fn count_for_event(&self, event: HookEvent) -> usize {
        match event {
            HookEvent::PreDispatch => self.pre_dispatch.len(),
            HookEvent::PostDispatch => self.post_dispatch.len(),
            HookEvent::OnJudge => self.on_judge.len(),
            HookEvent::PostConsensus => self.post_consensus.len(),
            HookEvent::OnFailure => self.on_failure.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // Counts executions
    struct CountingHook {
        name: String,
        events: Vec<HookEvent>,
        count: Arc<AtomicUsize>,
    }

    impl CountingHook {
        fn new(name: &str, events: &[HookEvent], count: Arc<AtomicUsize>) -> Self {
            Self {
                name: name.to_string(),
                events: events.to_vec(),
                count,
            }
        }
    }

    #[async_trait]
    impl Hook for CountingHook {
        fn name(&self) -> &str {
            &self.name
        }

        fn events(&self) -> &[HookEvent] {
            &self.events
        }

        async fn execute(&self, _context: &HookContext<'_>) -> MagiResult<HookResult> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(HookResult::Continue)
        }
    }

    struct RewriteHook;

    #[async_trait]
    impl Hook for RewriteHook {
        fn name(&self) -> &str {
            "rewrite"
        }

        fn events(&self) -> &[HookEvent] {
            &[HookEvent::PreDispatch]
        }

        async fn execute(&self, context: &HookContext<'_>) -> MagiResult<HookResult> {
            if let HookContext::PreDispatch { prompt, .. } = context {
                let rewritten = (*prompt).clone().with_system("Answer in one word.");
                return Ok(HookResult::ModifyPrompt(rewritten));
            }
            Ok(HookResult::Continue)
        }
    }

    struct FailingHook(HookEvent);

    #[async_trait]
    impl Hook for FailingHook {
        fn name(&self) -> &str {
            "failing"
        }

        fn events(&self) -> &[HookEvent] {
            std::slice::from_ref(&self.0)
        }

        async fn execute(&self, _context: &HookContext<'_>) -> MagiResult<HookResult> {
            Err(MagiError::other("hook exploded"))
        }
    }

    #[test]
    fn test_hook_system_new() {
        let system = HookSystem::new();
        assert_eq!(system.count(), 0);
    }

    #[test]
    fn test_hook_system_with_defaults() {
        let system = HookSystem::with_defaults();
        assert!(system.count() > 0);
        assert_eq!(system.count_for_event(HookEvent::PostConsensus), 1);
    }

    #[test]
    fn test_multi_event_registration() {
        let mut system = HookSystem::new();
        let count = Arc::new(AtomicUsize::new(0));

        system.register(Arc::new(CountingHook::new(
            "test",
            &[HookEvent::PostConsensus, HookEvent::OnFailure],
            count,
        )));

        assert_eq!(system.count_for_event(HookEvent::PostConsensus), 1);
        assert_eq!(system.count_for_event(HookEvent::OnFailure), 1);
        assert_eq!(system.count_for_event(HookEvent::PreDispatch), 0);
        assert_eq!(system.count(), 2);
    }

    #[tokio::test]
    async fn test_pre_dispatch_chain_runs_all() {
        let mut system = HookSystem::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        system.register(Arc::new(CountingHook::new("first", &[HookEvent::PreDispatch], first.clone())));
        system.register(Arc::new(CountingHook::new("second", &[HookEvent::PreDispatch], second.clone())));

        let prompt = Prompt::new("hi");
        let replaced = system
            .run_pre_dispatch("r-1", &prompt, &ProviderKind::ALL)
            .await
            .unwrap();

        assert!(replaced.is_none());
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_pre_dispatch_modify_prompt() {
        let mut system = HookSystem::new();
        system.register(Arc::new(RewriteHook));

        let prompt = Prompt::new("hi");
        let replaced = system
            .run_pre_dispatch("r-1", &prompt, &ProviderKind::ALL)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(replaced.system.as_deref(), Some("Answer in one word."));
        assert_eq!(replaced.text, "hi");
    }

    #[tokio::test]
    async fn test_pre_dispatch_error_propagates() {
        let mut system = HookSystem::new();
        system.register(Arc::new(FailingHook(HookEvent::PreDispatch)));

        let result = system
            .run_pre_dispatch("r-1", &Prompt::new("hi"), &ProviderKind::ALL)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_observer_errors_are_swallowed() {
        let mut system = HookSystem::new();
        let count = Arc::new(AtomicUsize::new(0));
        system.register(Arc::new(FailingHook(HookEvent::OnFailure)));
        system.register(Arc::new(CountingHook::new("after", &[HookEvent::OnFailure], count.clone())));

        system.run_on_failure("r-1", &MagiError::other("boom")).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_post_dispatch_and_judge_hooks() {
        let mut system = HookSystem::new();
        let count = Arc::new(AtomicUsize::new(0));
        system.register(Arc::new(CountingHook::new(
            "observer",
            &[HookEvent::PostDispatch, HookEvent::OnJudge],
            count.clone(),
        )));

        system.run_post_dispatch("r-1", &[]).await;
        system
            .run_on_judge("r-1", &["Apple", "Banana"], &JudgeVerdict::new(1, "x"))
            .await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_hook_event_display() {
        assert_eq!(format!("{}", HookEvent::PreDispatch), "pre_dispatch");
        assert_eq!(format!("{}", HookEvent::PostDispatch), "post_dispatch");
        assert_eq!(format!("{}", HookEvent::OnJudge), "on_judge");
        assert_eq!(format!("{}", HookEvent::PostConsensus), "post_consensus");
        assert_eq!(format!("{}", HookEvent::OnFailure), "on_failure");
    }

    #[test]
    fn test_hook_context_event() {
        let prompt = Prompt::new("hi");
        let ctx = HookContext::PreDispatch {
            request_id: "r",
            prompt: &prompt,
            providers: &[],
        };
        assert_eq!(ctx.event(), HookEvent::PreDispatch);

        let error = MagiError::other("x");
        let ctx = HookContext::OnFailure {
            request_id: "r",
            error: &error,
        };
        assert_eq!(ctx.event(), HookEvent::OnFailure);
    }
}

//! Consensus pipeline end to end: real HTTP providers against mocked vendors.

use std::sync::Arc;
use std::time::{Duration, Instant};

use magi::consensus::{canonicalize, ConsensusCoordinator, ExactVoter, KeywordClusterVoter, Voter};
use magi::hooks::{HookSystem, MetricsHook};
use magi::providers::{ProviderRegistry, StaticCredentials};
use magi::types::config::{Config, DailyLimit, VoterStrategy};
use magi::types::errors::ProviderErrorKind;
use magi::types::requests::{ConsensusRequest, ProviderKind};
use magi::types::responses::DecisionMethod;
use magi::MagiError;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const JUDGE_MODEL: &str = "judge-model";

/// Every provider points at the mock server and has a key.
fn config_for(server: &MockServer) -> Config {
    let mut config = Config::default();
    for kind in ProviderKind::ALL {
        config.providers.get_mut(kind).base_url = Some(server.uri());
    }
    config.judge.model = JUDGE_MODEL.to_string();
    config.consensus.timeout_ms = 2_000;
    config
}

fn credentials() -> Arc<StaticCredentials> {
    let mut credentials = StaticCredentials::new();
    for kind in ProviderKind::ALL {
        credentials = credentials.with(kind.credential_env(), "test-key");
    }
    Arc::new(credentials)
}

fn coordinator_for(config: &Config) -> ConsensusCoordinator {
    let registry = ProviderRegistry::with_credentials(config, credentials()).unwrap();
    ConsensusCoordinator::from_registry(config, registry).unwrap()
}

async fn mock_chat(server: &MockServer, model: &str, answer: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"model": model})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": answer}}]
        })))
        .mount(server)
        .await;
}

async fn mock_gemini(server: &MockServer, answer: &str) {
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": answer}]}}]
        })))
        .mount(server)
        .await;
}

async fn mock_anthropic(server: &MockServer, answer: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": answer}]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_four_providers_majority() {
    let server = MockServer::start().await;
    mock_chat(&server, "gpt-4o-mini", "4").await;
    mock_chat(&server, "grok-2-latest", "Four").await;
    mock_gemini(&server, "4.").await;
    mock_anthropic(&server, "4").await;

    let coordinator = coordinator_for(&config_for(&server));
    let response = coordinator.run(&ConsensusRequest::new("What is 2+2?")).await.unwrap();

    assert_eq!(response.decided_by, DecisionMethod::Majority);
    assert_eq!(response.final_answer, "4");
    assert!(response.judge.is_none());

    let providers: Vec<ProviderKind> = response.results.iter().map(|r| r.provider).collect();
    assert_eq!(
        providers,
        vec![
            ProviderKind::OpenAi,
            ProviderKind::Gemini,
            ProviderKind::Xai,
            ProviderKind::Anthropic
        ]
    );
    assert!(response.finished_at >= response.started_at);
}

#[tokio::test]
async fn test_tie_is_broken_by_judge() {
    let server = MockServer::start().await;
    mock_chat(&server, "gpt-4o-mini", "Apple").await;
    mock_gemini(&server, "Banana").await;
    mock_chat(&server, JUDGE_MODEL, r#"{"winner": 0, "reason": "crisper"}"#).await;

    let coordinator = coordinator_for(&config_for(&server));
    let request = ConsensusRequest::new("Best fruit?").with_providers(["gemini", "openai"]);
    let response = coordinator.run(&request).await.unwrap();

    assert_eq!(response.decided_by, DecisionMethod::Judge);
    assert_eq!(response.final_answer, "Apple");
    assert_eq!(response.judge.unwrap().reason, "crisper");
}

#[tokio::test]
async fn test_unparseable_verdict_falls_back_to_first() {
    let server = MockServer::start().await;
    mock_chat(&server, "gpt-4o-mini", "Red").await;
    mock_anthropic(&server, "Blue").await;
    mock_chat(&server, JUDGE_MODEL, "I cannot decide.").await;

    let coordinator = coordinator_for(&config_for(&server));
    let request = ConsensusRequest::new("Favourite colour?").with_providers(["openai", "anthropic"]);
    let response = coordinator.run(&request).await.unwrap();

    assert_eq!(response.decided_by, DecisionMethod::Judge);
    assert_eq!(response.final_answer, "Red");
    assert_eq!(response.judge.unwrap().index, 0);
}

#[tokio::test]
async fn test_one_failure_leaves_single_answer() {
    let server = MockServer::start().await;
    mock_gemini(&server, "Paris").await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(529).set_body_json(json!({
            "error": {"type": "overloaded_error", "message": "Overloaded"}
        })))
        .mount(&server)
        .await;

    let coordinator = coordinator_for(&config_for(&server));
    let request = ConsensusRequest::new("Capital of France?").with_providers(["gemini", "anthropic"]);
    let response = coordinator.run(&request).await.unwrap();

    assert_eq!(response.decided_by, DecisionMethod::Single);
    assert_eq!(response.final_answer, "Paris");
    assert_eq!(response.results[1].error.as_deref(), Some("Overloaded"));
}

#[tokio::test]
async fn test_all_failed_lists_every_reason() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"choices": [{"message": {"content": "late"}}]}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    mock_gemini(&server, "").await;

    let mut config = config_for(&server);
    config.consensus.timeout_ms = 200;
    let coordinator = coordinator_for(&config);

    let request = ConsensusRequest::new("hello").with_providers(["openai", "gemini"]);
    let err = coordinator.run(&request).await.unwrap_err();

    assert_eq!(err.status_code(), 502);
    assert_eq!(
        err.to_string(),
        "no_valid_answers: [openai] timeout after 200ms | [gemini] no output"
    );
    let results = err.results().unwrap();
    assert_eq!(results[0].error_kind, Some(ProviderErrorKind::Timeout));
    assert!(results[1].error.is_none());
}

#[tokio::test]
async fn test_providers_run_concurrently() {
    let server = MockServer::start().await;
    for (model, answer) in [("gpt-4o-mini", "yes"), ("grok-2-latest", "yes")] {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({"model": model})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"choices": [{"message": {"content": answer}}]}))
                    .set_delay(Duration::from_millis(400)),
            )
            .mount(&server)
            .await;
    }
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"content": [{"type": "text", "text": "no"}]}))
                .set_delay(Duration::from_millis(400)),
        )
        .mount(&server)
        .await;

    let coordinator = coordinator_for(&config_for(&server));
    let request = ConsensusRequest::new("Is water wet?").with_providers(["openai", "xai", "anthropic"]);

    let started = Instant::now();
    let response = coordinator.run(&request).await.unwrap();

    assert!(started.elapsed() < Duration::from_millis(1_100));
    assert_eq!(response.final_answer, "yes");
}

#[tokio::test]
async fn test_unknown_provider_is_rejected_before_dispatch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let coordinator = coordinator_for(&config_for(&server));

    let err = coordinator
        .run(&ConsensusRequest::new("hi").with_providers(["openai", "mistral"]))
        .await
        .unwrap_err();
    assert!(matches!(err, MagiError::UnknownProvider(_)));
    assert_eq!(err.status_code(), 400);

    let err = coordinator.run(&ConsensusRequest::new("   ")).await.unwrap_err();
    assert!(matches!(err, MagiError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_disabled_providers_are_skipped_by_default() {
    let server = MockServer::start().await;
    mock_chat(&server, "gpt-4o-mini", "42").await;
    mock_anthropic(&server, "42").await;

    let mut config = config_for(&server);
    config.providers.gemini.enabled = false;
    config.providers.xai.enabled = false;
    let coordinator = coordinator_for(&config);

    let response = coordinator.run(&ConsensusRequest::new("Answer?")).await.unwrap();

    assert_eq!(response.results.len(), 2);
    assert_eq!(response.decided_by, DecisionMethod::Majority);
    assert_eq!(response.final_answer, "42");
}

#[tokio::test]
async fn test_cluster_voter_merges_paraphrases() {
    let server = MockServer::start().await;
    mock_chat(&server, "gpt-4o-mini", "The capital of France is Paris.").await;
    mock_gemini(&server, "Paris is the capital of France").await;
    mock_anthropic(&server, "Lyon").await;

    let mut config = config_for(&server);
    config.consensus.voter = VoterStrategy::Cluster;
    config.consensus.cluster_threshold = 0.5;
    let coordinator = coordinator_for(&config);
    assert_eq!(coordinator.voter().name(), "cluster");

    let request =
        ConsensusRequest::new("Capital of France?").with_providers(["openai", "gemini", "anthropic"]);
    let response = coordinator.run(&request).await.unwrap();

    assert_eq!(response.decided_by, DecisionMethod::Majority);
    assert_eq!(response.final_answer, "The capital of France is Paris.");
}

#[tokio::test]
async fn test_quota_denies_second_request() {
    let server = MockServer::start().await;
    mock_chat(&server, "gpt-4o-mini", "ok").await;

    let mut config = config_for(&server);
    config.quota.enabled = true;
    config.quota.limits.openai = Some(DailyLimit::new(1, 100_000));
    let coordinator = coordinator_for(&config);
    let request = ConsensusRequest::new("ping").with_providers(["openai"]);

    let first = coordinator.run(&request).await.unwrap();
    assert_eq!(first.decided_by, DecisionMethod::Single);

    let err = coordinator.run(&request).await.unwrap_err();
    let results = err.results().unwrap();
    assert_eq!(results[0].error_kind, Some(ProviderErrorKind::Quota));
    assert!(results[0].latency_ms.is_none());

    let usage = coordinator.usage();
    let openai = usage.iter().find(|u| u.provider == ProviderKind::OpenAi).unwrap();
    assert_eq!(openai.requests, 1);
    assert_eq!(openai.remaining_requests, Some(0));
}

#[tokio::test]
async fn test_compare_returns_every_result() {
    let server = MockServer::start().await;
    mock_chat(&server, "gpt-4o-mini", "A").await;
    mock_gemini(&server, "B").await;

    let coordinator = coordinator_for(&config_for(&server));
    let request = ConsensusRequest::new("Pick").with_providers(["openai", "gemini", "xai"]);
    let response = coordinator.compare(&request).await.unwrap();

    assert_eq!(response.results.len(), 3);
    assert_eq!(response.results[0].output, "A");
    assert_eq!(response.results[1].output, "B");
    assert!(response.results[2].error.is_some());
}

#[tokio::test]
async fn test_metrics_hook_tracks_decisions() {
    let server = MockServer::start().await;
    mock_chat(&server, "gpt-4o-mini", "Apple").await;
    mock_gemini(&server, "Banana").await;
    mock_anthropic(&server, "Apple").await;
    mock_chat(&server, JUDGE_MODEL, r#"{"winner": 1, "reason": "sweeter"}"#).await;

    let metrics = Arc::new(MetricsHook::new());
    let mut hooks = HookSystem::new();
    hooks.register(metrics.clone());
    let coordinator = coordinator_for(&config_for(&server)).with_hooks(hooks);

    coordinator
        .run(&ConsensusRequest::new("Fruit?").with_providers(["openai", "gemini", "anthropic"]))
        .await
        .unwrap();
    coordinator
        .run(&ConsensusRequest::new("Fruit?").with_providers(["openai", "gemini"]))
        .await
        .unwrap();

    assert_eq!(metrics.total_requests(), 2);
    assert_eq!(metrics.total_failures(), 0);
    assert!((metrics.judge_rate() - 0.5).abs() < f64::EPSILON);
}

#[test]
fn test_voters_agree_on_exact_duplicates() {
    let answers = ["Yes.", "yes", "YES!"];
    let exact = ExactVoter.vote(&answers);
    let cluster = KeywordClusterVoter::new(0.6).vote(&answers);

    assert_eq!(exact.winner, canonicalize("Yes."));
    assert_eq!(exact.count, 3);
    assert_eq!(cluster.count, 3);
}

#[test]
fn test_blocking_caller() {
    let coordinator = coordinator_for(&Config::default());

    let err = tokio_test::block_on(coordinator.run(&ConsensusRequest::default())).unwrap_err();
    assert_eq!(err.to_string(), "prompt is required");
}

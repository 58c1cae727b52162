//! End-to-end orchestrator behaviour against an in-process host.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use common::{MockHost, builder_with};
use huginn::types::{DEFAULT_VAGUENESS_SCORE, ERROR_PROVIDER};
use huginn::{
    Availability, Capability, ClarifyingAnswer, FieldContext, Huginn, HuginnError, ModelSession,
    PageContext, Provider, ProviderDescriptor, RetryConfig,
};

const ANALYSIS: &str = r#"{"issues": ["No audience"], "suggestions": ["Say who it is for"], "optimizedPrompt": "Write a short poem about dogs for children"}"#;

fn field() -> FieldContext {
    FieldContext::new("textarea")
}

fn error_kind(metadata: &huginn::Metadata) -> Option<&str> {
    metadata.get("error").and_then(Value::as_str)
}

#[tokio::test]
async fn analyze_returns_typed_result() {
    let host = MockHost::ready(ANALYSIS);
    let assistant = builder_with(&host).build().unwrap();

    let result = assistant
        .analyze_prompt("write a poem about dogs", &field())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.provider, "mock");
    assert_eq!(result.issues, vec!["No audience"]);
    assert_eq!(
        result.optimized_prompt,
        "Write a short poem about dogs for children"
    );
    assert_eq!(result.vagueness_score, DEFAULT_VAGUENESS_SCORE);
    assert!(result.confidence > 0.0);
    assert_eq!(
        result.metadata.get("operation"),
        Some(&Value::from("analyze"))
    );
    assert!(result.metadata.get("durationMs").is_some());
    assert_eq!(
        result.metadata.get("parseStrategy"),
        Some(&Value::from("direct"))
    );
}

#[tokio::test]
async fn short_prompt_is_rejected_before_any_provider_activity() {
    let host = MockHost::ready(ANALYSIS);
    let assistant = builder_with(&host).min_prompt_length(3).build().unwrap();

    let err = assistant.analyze_prompt(" hi ", &field()).await.unwrap_err();

    assert!(matches!(err, HuginnError::InputValidation(_)));
    assert_eq!(host.probes(), 0);
    assert_eq!(host.creates(), 0);
}

#[tokio::test]
async fn long_prompt_is_rejected() {
    let host = MockHost::ready(ANALYSIS);
    let assistant = builder_with(&host).max_prompt_length(10).build().unwrap();

    let err = assistant
        .generate_clarifying_questions("this prompt is too long", &field())
        .await
        .unwrap_err();
    assert!(matches!(err, HuginnError::InputValidation(_)));
    assert_eq!(host.probes(), 0);
}

#[tokio::test]
async fn unparseable_output_becomes_failure_result() {
    let host = MockHost::ready("not json at all");
    let assistant = builder_with(&host).build().unwrap();

    let result = assistant
        .analyze_prompt("write a poem about dogs", &field())
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.provider, ERROR_PROVIDER);
    assert_eq!(result.confidence, 0.0);
    assert!(!result.issues.is_empty());
    assert!(!result.suggestions.is_empty());
    assert_eq!(error_kind(&result.metadata), Some("response_parse"));
    assert_eq!(
        result.metadata.get("operation"),
        Some(&Value::from("analyze"))
    );
}

#[tokio::test]
async fn no_available_provider_becomes_failure_result() {
    let host = MockHost::new(Availability::Unavailable);
    let assistant = builder_with(&host).build().unwrap();

    let result = assistant
        .analyze_prompt("write a poem about dogs", &field())
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(error_kind(&result.metadata), Some("provider_unavailable"));
    assert!(result.issues[0].contains("mock=unavailable"));
    assert_eq!(host.creates(), 0);
}

#[tokio::test]
async fn sessions_are_reused_per_operation() {
    let host = MockHost::ready(ANALYSIS);
    let assistant = builder_with(&host).build().unwrap();

    for _ in 0..3 {
        let result = assistant
            .analyze_prompt("write a poem about dogs", &field())
            .await
            .unwrap();
        assert!(result.success);
    }
    assert_eq!(host.creates(), 1);
    assert_eq!(host.prompts(), 3);

    host.set_response(r#"{"questions": ["Who is it for?"]}"#);
    assistant
        .generate_clarifying_questions("write a poem about dogs", &field())
        .await
        .unwrap();
    assert_eq!(host.creates(), 2, "questions use their own system prompt");
    assert_eq!(assistant.sessions().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_operations_share_one_session_creation() {
    let host = MockHost::ready(ANALYSIS);
    host.set_create_delay(Duration::from_millis(200));
    let assistant = builder_with(&host).build().unwrap();

    let (field_a, field_b) = (field(), field());
    let (a, b) = tokio::join!(
        assistant.analyze_prompt("write a poem about dogs", &field_a),
        assistant.analyze_prompt("write a poem about cats", &field_b),
    );

    assert!(a.unwrap().success);
    assert!(b.unwrap().success);
    assert_eq!(host.creates(), 1);
}

#[tokio::test]
async fn questions_are_normalized() {
    let host = MockHost::ready(r#"{"question": "Who is the audience?"}"#);
    let assistant = builder_with(&host).build().unwrap();

    let result = assistant
        .generate_clarifying_questions("write a poem about dogs", &field())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.questions, vec!["Who is the audience?"]);
    assert_eq!(
        result.metadata.get("operation"),
        Some(&Value::from("questions"))
    );
}

#[tokio::test]
async fn optimization_uses_answers_and_falls_back_to_raw_text() {
    let rewritten = "Write a four-line rhyming poem about a golden retriever for a child's birthday card.";
    let host = MockHost::ready(rewritten);
    let assistant = builder_with(&host).build().unwrap();

    let answers = vec![
        ClarifyingAnswer::new("Who is it for?", "my niece"),
        ClarifyingAnswer::new("How long?", "four lines"),
    ];
    let result = assistant
        .optimize_with_context("write a poem about dogs", &answers, &field())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.optimized_prompt, rewritten);
    assert_eq!(result.confidence, huginn::interpret::FALLBACK_CONFIDENCE);
    assert_eq!(result.metadata.get("fallback"), Some(&Value::from("raw_text")));

    let sent = host.last_prompt().unwrap();
    assert!(sent.contains("Q: Who is it for?\nA: my niece"));
}

#[tokio::test]
async fn page_context_reaches_the_model() {
    let host = MockHost::ready(ANALYSIS);
    let assistant = builder_with(&host).build().unwrap();
    let page = PageContext {
        title: "Pet Adoption Forum".into(),
        url: "https://example.org/forum/new".into(),
        surrounding_text: "Tell us about your pet".into(),
    };

    let result = assistant
        .analyze_with_page_context("write a poem about dogs", &field(), &page)
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(
        result.metadata.get("operation"),
        Some(&Value::from("analyze_page"))
    );
    let sent = host.last_prompt().unwrap();
    assert!(sent.contains("Page title: Pet Adoption Forum"));
    assert!(sent.contains("Tell us about your pet"));
}

#[tokio::test(start_paused = true)]
async fn slow_model_times_out() {
    let host = MockHost::ready(ANALYSIS);
    host.set_prompt_delay(Duration::from_secs(120));
    let assistant = builder_with(&host)
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();

    let result = assistant
        .analyze_prompt("write a poem about dogs", &field())
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(error_kind(&result.metadata), Some("operation_timeout"));
}

#[tokio::test(start_paused = true)]
async fn transient_prompt_failures_are_retried() {
    let host = MockHost::ready(ANALYSIS);
    host.fail_next_prompts(1);
    let assistant = builder_with(&host)
        .retry(RetryConfig::new().max_attempts(2))
        .build()
        .unwrap();

    let result = assistant
        .analyze_prompt("write a poem about dogs", &field())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(host.prompts(), 2);
}

#[tokio::test]
async fn selection_prefers_ready_and_refresh_reselects() {
    let preferred = MockHost::new(Availability::Unavailable);
    let fallback = MockHost::ready(ANALYSIS);
    let assistant = Huginn::builder()
        .host(ProviderDescriptor::new("preferred", 1), preferred.clone())
        .host(ProviderDescriptor::new("fallback", 2), fallback.clone())
        .build()
        .unwrap();

    let selected = assistant.get_or_select_provider().await.unwrap();
    assert_eq!(selected.name(), "fallback");

    // the active provider sticks until refreshed
    preferred.set_availability(Availability::Ready);
    let again = assistant.get_or_select_provider().await.unwrap();
    assert_eq!(again.name(), "fallback");

    let refreshed = assistant.refresh_providers().await.unwrap();
    assert_eq!(refreshed.name(), "preferred");
    assert_eq!(assistant.active_provider().await.as_deref(), Some("preferred"));
}

#[tokio::test]
async fn failed_creation_clears_provider_that_became_unavailable() {
    let host = MockHost::ready(ANALYSIS);
    let assistant = builder_with(&host).build().unwrap();
    assistant.get_or_select_provider().await.unwrap();

    host.set_fail_create(true);
    host.set_availability(Availability::Unavailable);

    let result = assistant
        .analyze_prompt("write a poem about dogs", &field())
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(error_kind(&result.metadata), Some("session_creation"));
    assert_eq!(assistant.active_provider().await, None);
}

#[tokio::test]
async fn failed_creation_keeps_provider_that_is_still_available() {
    let host = MockHost::ready(ANALYSIS);
    host.set_fail_create(true);
    let assistant = builder_with(&host).build().unwrap();

    let result = assistant
        .analyze_prompt("write a poem about dogs", &field())
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(assistant.active_provider().await.as_deref(), Some("mock"));
}

#[tokio::test]
async fn operation_outside_provider_capabilities_fails() {
    let host = MockHost::ready(ANALYSIS);
    let assistant = Huginn::builder()
        .host(
            ProviderDescriptor::new("analysis-only", 0).capabilities([Capability::Analysis]),
            host.clone(),
        )
        .build()
        .unwrap();

    let result = assistant
        .generate_clarifying_questions("write a poem about dogs", &field())
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(error_kind(&result.metadata), Some("unsupported"));
    assert_eq!(host.creates(), 0);
}

#[tokio::test]
async fn download_progress_is_published() {
    let host = MockHost::ready(ANALYSIS);
    host.set_progress(&[0.25, 0.5, 1.0]);
    let assistant = builder_with(&host).build().unwrap();
    let mut progress = assistant.subscribe_progress();

    assistant
        .analyze_prompt("write a poem about dogs", &field())
        .await
        .unwrap();

    let mut seen = Vec::new();
    while seen.len() < 3 {
        let event = tokio::time::timeout(Duration::from_secs(1), progress.recv())
            .await
            .expect("progress event")
            .unwrap();
        assert_eq!(event.provider, "mock");
        seen.push(event.loaded);
    }
    assert_eq!(seen, vec![0.25, 0.5, 1.0]);
}

#[tokio::test]
async fn status_reports_providers_and_cache() {
    let host = MockHost::ready(ANALYSIS);
    let assistant = builder_with(&host).build().unwrap();

    let before = assistant.status().await;
    assert_eq!(before.active_provider, None);
    assert_eq!(before.providers.len(), 1);
    assert_eq!(before.cache.count, 0);
    assert!(before.features.contains(&"analysis".to_string()));

    assistant
        .analyze_prompt("write a poem about dogs", &field())
        .await
        .unwrap();

    let after = assistant.status().await;
    assert_eq!(after.active_provider.as_deref(), Some("mock"));
    assert!(after.providers[0].active);
    assert_eq!(after.cache.count, 1);
    assert_eq!(after.cache.entries[0].provider, "mock");
}

#[tokio::test]
async fn destroy_tears_everything_down() {
    let host = MockHost::ready(ANALYSIS);
    let assistant = builder_with(&host).build().unwrap();
    assistant
        .analyze_prompt("write a poem about dogs", &field())
        .await
        .unwrap();

    assistant.destroy().await;

    assert_eq!(host.destroyed(), 1);
    let status = assistant.status().await;
    assert!(status.providers.is_empty());
    assert_eq!(status.active_provider, None);
    assert_eq!(status.cache.count, 0);

    let result = assistant
        .analyze_prompt("write a poem about dogs", &field())
        .await
        .unwrap();
    assert!(!result.success);
    assert_eq!(error_kind(&result.metadata), Some("no_provider"));
}

#[tokio::test]
async fn host_provider_analyze_reuses_its_own_sessions() {
    let host = MockHost::ready(ANALYSIS);
    let provider = huginn::HostModelProvider::new(ProviderDescriptor::new("mock", 0), host.clone());

    let first = provider
        .analyze("write a poem about dogs", &field(), None)
        .await;
    let second = provider
        .analyze("write a poem about cats", &field(), None)
        .await;

    assert!(first.success && second.success);
    assert_eq!(host.creates(), 1);
    assert_eq!(provider.sessions().len(), 1);

    provider.destroy().await;
    provider.destroy().await;
    assert_eq!(host.destroyed(), 1);
    assert!(provider.sessions().is_empty());
}

#[tokio::test]
async fn host_provider_destroy_releases_handed_out_sessions() {
    let host = MockHost::ready(ANALYSIS);
    let provider = huginn::HostModelProvider::new(ProviderDescriptor::new("mock", 0), host.clone());

    let kept = provider
        .create_session(huginn::SessionRequest::new("sys"))
        .await
        .unwrap();
    let other = provider
        .create_session(huginn::SessionRequest::new("sys"))
        .await
        .unwrap();
    // dropped by the caller; nothing left to release
    drop(
        provider
            .create_session(huginn::SessionRequest::new("sys"))
            .await
            .unwrap(),
    );
    assert_eq!(host.creates(), 3);

    provider.destroy().await;

    assert!(kept.is_destroyed());
    assert!(other.is_destroyed());
    assert_eq!(host.destroyed(), 2);
}

#[tokio::test]
async fn host_provider_analyze_reports_failures_as_results() {
    let host = MockHost::new(Availability::Unavailable);
    host.set_fail_create(true);
    let provider = huginn::HostModelProvider::new(ProviderDescriptor::new("mock", 0), host.clone());

    let result = provider.analyze("write a poem", &field(), None).await;
    assert!(!result.success);
    assert_eq!(error_kind(&result.metadata), Some("session_creation"));
}

#[test]
fn builder_requires_a_provider() {
    assert!(matches!(Huginn::builder().build(), Err(HuginnError::NoProvider)));
}

#[test]
fn builder_rejects_duplicate_names() {
    let host = MockHost::ready(ANALYSIS);
    let result = builder_with(&host)
        .host(ProviderDescriptor::new("mock", 5), host.clone())
        .build();
    assert!(matches!(result, Err(HuginnError::Configuration(_))));
}

#[test]
fn builder_rejects_inverted_limits() {
    let host = MockHost::ready(ANALYSIS);
    let result = builder_with(&host)
        .min_prompt_length(100)
        .max_prompt_length(10)
        .build();
    assert!(matches!(result, Err(HuginnError::Configuration(_))));
}

#[tokio::test]
async fn explicit_provider_registration() {
    let host = MockHost::ready(ANALYSIS);
    let provider: Arc<dyn Provider> = Arc::new(huginn::HostModelProvider::new(
        ProviderDescriptor::new("explicit", 0),
        host.clone(),
    ));
    let assistant = Huginn::builder().provider(provider).build().unwrap();

    let selected = assistant.select_best_provider().await.unwrap();
    assert_eq!(selected.name(), "explicit");
    assert_eq!(assistant.active_provider().await, None);
}

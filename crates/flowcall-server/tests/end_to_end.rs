use std::sync::Arc;

use flowcall_core::config::{DashboardConfig, LlmConfig};
use flowcall_core::{ConversationStore, HttpDashboardClient, LearningPatternStore, ScriptGenerator};
use flowcall_server::state::AppState;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(content: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [{
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 120, "completion_tokens": 48}
    })
}

/// Starts the server on an ephemeral port with its dashboard client pointed
/// back at itself and the model pointed at `llm`.
async fn spawn_server(llm: &MockServer) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let dashboard = DashboardConfig {
        api_base: base.clone(),
        request_timeout_secs: Some(10),
    };
    let client = Arc::new(HttpDashboardClient::new(&dashboard).unwrap());
    let llm_config = LlmConfig {
        api_key: "sk-test".into(),
        api_base: llm.uri(),
        ..LlmConfig::default()
    };
    let generator = ScriptGenerator::from_config(&llm_config).unwrap();
    let state = AppState::new(
        ConversationStore::new(client.clone(), client),
        LearningPatternStore::new(),
        Some(Arc::new(generator)),
    );

    let app = flowcall_server::create_router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    base
}

#[tokio::test]
async fn utterance_flows_through_generate_script_to_the_model() {
    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(serde_json::json!({
            "response_format": {"type": "json_object"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            r#"{"suggestions":[{"title":"費用対効果を示す","body":"導入3ヶ月で回収できた事例がございます","tone":"empathetic","confidence":0.82}]}"#,
        )))
        .expect(1)
        .mount(&llm)
        .await;

    let base = spawn_server(&llm).await;
    let http = reqwest::Client::new();

    let response = http
        .post(format!("{base}/api/dashboard/utterances"))
        .json(&serde_json::json!({"text": "正直、費用が気になるんですよね"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["update"], "fresh");
    let suggestions = json["snapshot"]["suggestions"].as_array().unwrap();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0]["title"], "費用対効果を示す");
    assert_eq!(suggestions[0]["tone"], "empathetic");

    let blocks = json["snapshot"]["conversation"]["blocks"].as_array().unwrap();
    assert_eq!(blocks.len(), 4);
    assert_eq!(blocks[3]["text"], "正直、費用が気になるんですよね");
}

#[tokio::test]
async fn model_failure_falls_back_to_base_suggestions() {
    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
            "error": {"type": "rate_limit_error", "message": "slow down"}
        })))
        .mount(&llm)
        .await;

    let base = spawn_server(&llm).await;
    let http = reqwest::Client::new();

    let direct = http
        .post(format!("{base}/api/generate-script"))
        .json(&serde_json::json!({"utterance": "短く教えて"}))
        .send()
        .await
        .unwrap();
    assert_eq!(direct.status(), 500);
    let body: serde_json::Value = direct.json().await.unwrap();
    assert_eq!(body["error"], "台本生成に失敗しました。");

    let refreshed: serde_json::Value = http
        .post(format!("{base}/api/dashboard/suggestions/refresh"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(refreshed["update"], "fallback");
    assert_eq!(
        refreshed["snapshot"]["suggestions"][0]["id"],
        "suggestion-primary-fallback-0"
    );
}

#[tokio::test]
async fn learned_outcome_is_visible_through_patterns_api() {
    let llm = MockServer::start().await;
    let base = spawn_server(&llm).await;
    let http = reqwest::Client::new();

    let accepted = http
        .post(format!(
            "{base}/api/dashboard/suggestions/suggestion-alt-1/accept"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(accepted.status(), 200);

    let patterns: serde_json::Value = http
        .get(format!("{base}/api/patterns"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let quick_trust = &patterns[0];
    assert_eq!(quick_trust["patternId"], "pattern-quick-trust");
    let responses = quick_trust["successfulResponses"].as_array().unwrap();
    assert_eq!(responses.len(), 3);
    assert_eq!(responses[2]["successRate"], 0.6);
}

use axum::{body::Bytes, extract::State, Json};
use flowcall_core::{
    ConfigError, GenerateScriptRequest, GenerateScriptResponse, TranscriptPayload,
};

use crate::error::{ApiError, INVALID_JSON_MESSAGE};
use crate::state::AppState;

/// `POST /api/generate-script`. The body is parsed by hand so that a missing
/// credential is reported before a malformed payload.
pub async fn generate_script(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<GenerateScriptResponse>, ApiError> {
    let generator = state
        .generator
        .clone()
        .ok_or(ApiError::Config(ConfigError::MissingApiKey))?;

    let mut request: GenerateScriptRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(error = %e, "generate-script: invalid JSON");
        ApiError::BadRequest(INVALID_JSON_MESSAGE.to_string())
    })?;

    if request.conversation.is_none() {
        let conversation = state.conversations.conversation().await;
        if request.conversation_id.as_deref() == Some(conversation.id.as_str()) {
            request.conversation = Some(TranscriptPayload::from(&conversation));
        }
    }

    let suggestions = generator.generate(&request).await?;
    Ok(Json(GenerateScriptResponse { suggestions }))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        routing::post,
        Router,
    };
    use tower::ServiceExt;

    use super::generate_script;
    use crate::state::test_support::{offline_state, state_with_model};
    use crate::state::AppState;

    fn app(state: AppState) -> Router {
        Router::new()
            .route("/", post(generate_script))
            .with_state(state)
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    const MODEL_REPLY: &str =
        r#"{"suggestions":[{"title":"要点","body":"30秒だけ頂けますか","tone":"direct","confidence":0.9}]}"#;

    #[tokio::test]
    async fn missing_key_answers_500_before_parsing() {
        let response = app(offline_state()).oneshot(post_json("not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"error": "OpenAI API key is not configured."})
        );
    }

    #[tokio::test]
    async fn invalid_json_answers_400() {
        let (state, _) = state_with_model(MODEL_REPLY);
        let response = app(state).oneshot(post_json("{oops")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"error": "Invalid JSON payload."})
        );
    }

    #[tokio::test]
    async fn blank_utterance_answers_400() {
        let (state, provider) = state_with_model(MODEL_REPLY);
        let response = app(state)
            .oneshot(post_json(r#"{"utterance":"   "}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"],
            "最新の顧客発話が必要です。"
        );
        assert!(provider.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn success_returns_normalized_suggestions() {
        let (state, _) = state_with_model(MODEL_REPLY);
        let response = app(state)
            .oneshot(post_json(r#"{"utterance":"短く教えて"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["suggestions"][0]["id"], "llm-suggestion-1");
        assert_eq!(json["suggestions"][0]["tone"], "direct");
    }

    #[tokio::test]
    async fn unusable_model_output_answers_500() {
        let (state, _) = state_with_model("this is not json");
        let response = app(state)
            .oneshot(post_json(r#"{"utterance":"短く教えて"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], "台本生成に失敗しました。");
    }

    #[tokio::test]
    async fn known_conversation_id_supplies_transcript() {
        let (state, provider) = state_with_model(MODEL_REPLY);
        app(state)
            .oneshot(post_json(
                r#"{"utterance":"短く教えて","conversationId":"demo-conversation"}"#,
            ))
            .await
            .unwrap();
        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[0].contains("Customer: こんにちは。どちら様でしょうか？"));
    }
}

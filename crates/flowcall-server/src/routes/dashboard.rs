use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    routing::{get, post},
    Json, Router,
};
use flowcall_core::{
    AcceptedSuggestion, AnalyticsSummary, AudioFile, DashboardSnapshot, FlowLayout, Position,
    SuggestionUpdate, TranscriptionUpdate, ValidationError,
};
use flowcall_schema::TalkBlock;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

const MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct UtteranceBody {
    pub text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionActionResponse {
    pub update: SuggestionUpdate,
    pub snapshot: DashboardSnapshot,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionResponse {
    pub transcription: TranscriptionUpdate,
    pub snapshot: DashboardSnapshot,
}

#[derive(Serialize)]
pub struct FlowResponse {
    #[serde(flatten)]
    pub layout: FlowLayout,
    pub focus: Option<Position>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(snapshot))
        .route("/timeline", get(timeline))
        .route("/flow", get(flow))
        .route("/analytics", get(analytics))
        .route("/utterances", post(add_utterance))
        .route(
            "/audio",
            post(upload_audio).layer(DefaultBodyLimit::max(MAX_AUDIO_BYTES)),
        )
        .route("/suggestions/refresh", post(refresh_suggestions))
        .route("/suggestions/{id}/accept", post(accept_suggestion))
}

pub async fn snapshot(State(state): State<AppState>) -> Json<DashboardSnapshot> {
    Json(state.conversations.snapshot().await)
}

pub async fn timeline(State(state): State<AppState>) -> Json<Vec<TalkBlock>> {
    Json(state.conversations.timeline().await)
}

pub async fn flow(State(state): State<AppState>) -> Json<FlowResponse> {
    let layout = state.conversations.flow_layout().await;
    let focus = layout.focus();
    Json(FlowResponse { layout, focus })
}

pub async fn analytics(State(state): State<AppState>) -> Json<AnalyticsSummary> {
    Json(state.conversations.analytics().await)
}

pub async fn add_utterance(
    State(state): State<AppState>,
    Json(body): Json<UtteranceBody>,
) -> Result<Json<SuggestionActionResponse>, ApiError> {
    let update = state.conversations.add_customer_utterance(&body.text).await?;
    Ok(Json(SuggestionActionResponse {
        update,
        snapshot: state.conversations.snapshot().await,
    }))
}

pub async fn upload_audio(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<TranscriptionResponse>, ApiError> {
    let mut audio = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("audio") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        let mut file = AudioFile::new(name, bytes.to_vec());
        if let Some(content_type) = content_type {
            file = file.with_content_type(content_type);
        }
        audio = Some(file);
        break;
    }

    let audio = audio.ok_or(ValidationError::MissingAudio)?;
    let transcription = state.conversations.transcribe_audio(audio).await?;
    Ok(Json(TranscriptionResponse {
        transcription,
        snapshot: state.conversations.snapshot().await,
    }))
}

pub async fn refresh_suggestions(
    State(state): State<AppState>,
) -> Result<Json<SuggestionActionResponse>, ApiError> {
    let update = state.conversations.refresh_suggestions().await?;
    Ok(Json(SuggestionActionResponse {
        update,
        snapshot: state.conversations.snapshot().await,
    }))
}

pub async fn accept_suggestion(
    State(state): State<AppState>,
    Path(suggestion_id): Path<String>,
) -> Result<Json<AcceptedSuggestion>, ApiError> {
    state
        .conversations
        .accept_suggestion(&suggestion_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("suggestion not found: {suggestion_id}")))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::router;
    use crate::state::test_support::offline_state;

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn multipart(file_name: &str, bytes: &[u8]) -> Request<Body> {
        let boundary = "flowcall-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"audio\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/audio")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn snapshot_returns_seeded_conversation() {
        let app = router().with_state(offline_state());
        let response = app.oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["conversation"]["id"], "demo-conversation");
        assert_eq!(json["suggestions"].as_array().unwrap().len(), 3);
        assert_eq!(json["isTranscribing"], false);
    }

    #[tokio::test]
    async fn flow_includes_focus_point() {
        let app = router().with_state(offline_state());
        let json = body_json(app.oneshot(get("/flow")).await.unwrap()).await;
        assert_eq!(json["nodes"].as_array().unwrap().len(), 6);
        assert_eq!(json["focus"]["x"], 880.0);
    }

    #[tokio::test]
    async fn analytics_and_timeline_are_served() {
        let state = offline_state();
        let analytics = body_json(
            router()
                .with_state(state.clone())
                .oneshot(get("/analytics"))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(analytics["totalBlocks"], 3);

        let timeline = body_json(
            router()
                .with_state(state)
                .oneshot(get("/timeline"))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(timeline[0]["id"], "block-1");
    }

    #[tokio::test]
    async fn blank_utterance_answers_422() {
        let app = router().with_state(offline_state());
        let response = app
            .oneshot(post_json("/utterances", r#"{"text":"   "}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn utterance_is_recorded_with_fallback_suggestions() {
        let state = offline_state();
        let response = router()
            .with_state(state.clone())
            .oneshot(post_json("/utterances", r#"{"text":"資料を送ってください"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["update"], "fallback");
        assert_eq!(json["snapshot"]["isGeneratingScript"], false);
        assert_eq!(
            state.conversations.latest_customer_utterance().await.as_deref(),
            Some("資料を送ってください")
        );
    }

    #[tokio::test]
    async fn unsupported_audio_answers_422() {
        let app = router().with_state(offline_state());
        let response = app.oneshot(multipart("notes.txt", b"abc")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn failed_transcription_appends_fallback_block() {
        let state = offline_state();
        let response = router()
            .with_state(state.clone())
            .oneshot(multipart("call.wav", b"RIFF"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["transcription"]["fallback"], true);
        assert_eq!(state.conversations.conversation().await.blocks.len(), 4);
    }

    #[tokio::test]
    async fn accept_unknown_suggestion_answers_404() {
        let app = router().with_state(offline_state());
        let response = app
            .oneshot(post_json("/suggestions/nope/accept", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn accept_suggestion_records_learning_outcome() {
        let state = offline_state();
        let response = router()
            .with_state(state.clone())
            .oneshot(post_json("/suggestions/suggestion-primary/accept", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["block"]["speaker"], "agent");
        assert_eq!(json["patternsUpdated"], 1);
        let pattern = state.patterns.get("pattern-quick-trust").await.unwrap();
        assert_eq!(pattern.successful_responses.len(), 3);
    }

    #[tokio::test]
    async fn refresh_uses_fallback_when_offline() {
        let app = router().with_state(offline_state());
        let response = app
            .oneshot(post_json("/suggestions/refresh", ""))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["update"], "fallback");
        assert!(json["snapshot"]["suggestions"][0]["id"]
            .as_str()
            .unwrap()
            .ends_with("-fallback-0"));
    }
}

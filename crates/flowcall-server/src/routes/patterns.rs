use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use flowcall_core::{parse_tags, NewPattern, ValidationError};
use flowcall_schema::LearningPattern;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

/// Tags arrive either as a comma separated string or as a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ContextTags {
    Joined(String),
    List(Vec<String>),
}

impl Default for ContextTags {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl ContextTags {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::Joined(raw) => parse_tags(&raw),
            Self::List(tags) => tags,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePatternBody {
    pub trigger_phrase: String,
    pub response_text: String,
    #[serde(default)]
    pub context_tags: ContextTags,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePatternResponse {
    pub pattern_id: String,
    pub pattern: Option<LearningPattern>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeBody {
    pub response_text: String,
    pub did_succeed: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_patterns).post(create_pattern))
        .route("/{id}/outcome", post(record_outcome))
}

pub async fn list_patterns(State(state): State<AppState>) -> Json<Vec<LearningPattern>> {
    Json(state.patterns.patterns().await)
}

pub async fn create_pattern(
    State(state): State<AppState>,
    Json(body): Json<CreatePatternBody>,
) -> Result<(StatusCode, Json<CreatePatternResponse>), ApiError> {
    let new_pattern = NewPattern::seeded(
        body.trigger_phrase,
        body.response_text,
        body.context_tags.into_vec(),
    );
    let pattern_id = state.patterns.add_pattern(new_pattern).await?;
    let pattern = state.patterns.get(&pattern_id).await;
    Ok((
        StatusCode::CREATED,
        Json(CreatePatternResponse {
            pattern_id,
            pattern,
        }),
    ))
}

pub async fn record_outcome(
    State(state): State<AppState>,
    Path(pattern_id): Path<String>,
    Json(body): Json<OutcomeBody>,
) -> Result<Json<LearningPattern>, ApiError> {
    let response_text = body.response_text.trim();
    if response_text.is_empty() {
        return Err(ValidationError::EmptyResponse.into());
    }

    let found = state
        .patterns
        .record_response_outcome(&pattern_id, response_text, body.did_succeed)
        .await;
    let pattern = if found {
        state.patterns.get(&pattern_id).await
    } else {
        None
    };
    pattern
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("pattern not found: {pattern_id}")))
}

//! Clients for the suggestion and transcription endpoints.
//!
//! Transport lives behind [`SuggestionApi`] / [`TranscriptionApi`] and only
//! hands back raw JSON. [`SuggestionClient`] and [`TranscriptionClient`] turn
//! that JSON into normalized values and absorb every failure into the fixed
//! fallback data, so callers never see a transport error.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flowcall_schema::normalize::normalize_suggestions;
use flowcall_schema::seed::{fallback_suggestions, fallback_transcript_block};
use flowcall_schema::{
    PartialScriptSuggestion, PartialTalkBlock, ScriptSuggestion, SuggestionOrigin, TalkBlock,
};
use serde::Serialize;
use serde_json::Value;

use crate::config::DashboardConfig;
use crate::error::ValidationError;

const SUPPORTED_AUDIO_EXTENSIONS: [&str; 4] = ["mp3", "wav", "m4a", "aac"];

/// An uploaded recording.
#[derive(Debug, Clone)]
pub struct AudioFile {
    pub name: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl AudioFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// The name must end in one of the supported extensions (any case).
    pub fn validate(&self) -> Result<(), ValidationError> {
        let name = self.name.trim();
        if name.is_empty() || self.bytes.is_empty() {
            return Err(ValidationError::MissingAudio);
        }
        let lower = name.to_ascii_lowercase();
        if SUPPORTED_AUDIO_EXTENSIONS
            .iter()
            .any(|ext| lower.ends_with(ext))
        {
            Ok(())
        } else {
            Err(ValidationError::UnsupportedAudioFormat {
                file_name: name.to_string(),
            })
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRequest {
    pub utterance: String,
    pub conversation_id: String,
}

#[async_trait]
pub trait SuggestionApi: Send + Sync {
    /// Posts the request and returns the decoded reply body of a 2xx answer.
    async fn generate_script(&self, request: &SuggestionRequest) -> Result<Value>;
}

#[async_trait]
pub trait TranscriptionApi: Send + Sync {
    /// Uploads the audio and returns the decoded reply body of a 2xx answer.
    async fn transcribe(&self, audio: &AudioFile) -> Result<Value>;
}

/// reqwest transport for both dashboard endpoints.
#[derive(Debug, Clone)]
pub struct HttpDashboardClient {
    client: reqwest::Client,
    api_base: String,
}

impl HttpDashboardClient {
    pub fn new(config: &DashboardConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build().context("failed to build dashboard http client")?,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    async fn read_json(resp: reqwest::Response, endpoint: &str) -> Result<Value> {
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("{endpoint} api failed with status {status}"));
        }
        resp.json::<Value>()
            .await
            .with_context(|| format!("{endpoint} api returned invalid json"))
    }
}

#[async_trait]
impl SuggestionApi for HttpDashboardClient {
    async fn generate_script(&self, request: &SuggestionRequest) -> Result<Value> {
        let resp = self
            .client
            .post(format!("{}/api/generate-script", self.api_base))
            .json(request)
            .send()
            .await?;
        Self::read_json(resp, "generate-script").await
    }
}

#[async_trait]
impl TranscriptionApi for HttpDashboardClient {
    async fn transcribe(&self, audio: &AudioFile) -> Result<Value> {
        let mut part =
            reqwest::multipart::Part::bytes(audio.bytes.clone()).file_name(audio.name.clone());
        if let Some(content_type) = &audio.content_type {
            part = part.mime_str(content_type)?;
        }
        let form = reqwest::multipart::Form::new().part("audio", part);
        let resp = self
            .client
            .post(format!("{}/api/transcribe", self.api_base))
            .multipart(form)
            .send()
            .await?;
        Self::read_json(resp, "transcribe").await
    }
}

/// Reads a JSON array of partial records; non-object items become empty records.
fn partial_list<T>(value: Option<&Value>) -> Option<Vec<T>>
where
    T: serde::de::DeserializeOwned + Default,
{
    let items = value?.as_array()?;
    Some(
        items
            .iter()
            .map(|item| serde_json::from_value(item.clone()).unwrap_or_default())
            .collect(),
    )
}

/// Outcome of a suggestion fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum SuggestionFetch {
    Fresh(Vec<ScriptSuggestion>),
    /// Base suggestions re-identified with `-fallback-` ids.
    Fallback(Vec<ScriptSuggestion>),
}

impl SuggestionFetch {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }

    pub fn into_suggestions(self) -> Vec<ScriptSuggestion> {
        match self {
            Self::Fresh(list) | Self::Fallback(list) => list,
        }
    }
}

#[derive(Clone)]
pub struct SuggestionClient {
    api: Arc<dyn SuggestionApi>,
}

impl SuggestionClient {
    pub fn new(api: Arc<dyn SuggestionApi>) -> Self {
        Self { api }
    }

    pub async fn fetch(&self, utterance: &str, conversation_id: &str) -> SuggestionFetch {
        let request = SuggestionRequest {
            utterance: utterance.to_string(),
            conversation_id: conversation_id.to_string(),
        };

        match self.fetch_fresh(&request).await {
            Ok(list) => SuggestionFetch::Fresh(list),
            Err(e) => {
                tracing::warn!(error = %e, conversation_id, "suggestion request failed, using fallback");
                SuggestionFetch::Fallback(fallback_suggestions())
            }
        }
    }

    async fn fetch_fresh(&self, request: &SuggestionRequest) -> Result<Vec<ScriptSuggestion>> {
        let payload = self.api.generate_script(request).await?;
        let items = partial_list::<PartialScriptSuggestion>(payload.get("suggestions"))
            .ok_or_else(|| anyhow!("generate-script api returned unexpected payload"))?;
        if items.is_empty() {
            return Err(anyhow!("generate-script api returned no suggestions"));
        }
        Ok(normalize_suggestions(items, SuggestionOrigin::Client))
    }
}

/// Outcome of a transcription upload.
#[derive(Debug, Clone, PartialEq)]
pub enum Transcription {
    Transcribed {
        blocks: Vec<TalkBlock>,
        /// Only reported together with a block list.
        duration: Option<f64>,
        suggestions: Option<Vec<ScriptSuggestion>>,
    },
    /// A single canned customer block.
    Fallback(TalkBlock),
}

#[derive(Clone)]
pub struct TranscriptionClient {
    api: Arc<dyn TranscriptionApi>,
}

impl TranscriptionClient {
    pub fn new(api: Arc<dyn TranscriptionApi>) -> Self {
        Self { api }
    }

    /// `now` anchors synthesized timestamps and the fallback block.
    pub async fn transcribe(&self, audio: &AudioFile, now: DateTime<Utc>) -> Transcription {
        let payload = match self.api.transcribe(audio).await {
            Ok(payload) if payload.is_object() => payload,
            Ok(_) => {
                tracing::warn!(file = %audio.name, "transcribe api returned a non-object payload, using fallback");
                return Transcription::Fallback(fallback_transcript_block(now));
            }
            Err(e) => {
                tracing::warn!(error = %e, file = %audio.name, "transcription failed, using fallback");
                return Transcription::Fallback(fallback_transcript_block(now));
            }
        };

        let blocks = partial_list::<PartialTalkBlock>(payload.get("blocks"));
        let duration = blocks
            .as_ref()
            .and(payload.get("duration"))
            .and_then(Value::as_f64)
            .filter(|d| d.is_finite());
        let blocks: Vec<TalkBlock> = blocks
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(index, partial)| partial.normalize(index, now))
            .collect();

        let suggestions = partial_list::<PartialScriptSuggestion>(payload.get("suggestions"))
            .filter(|items| !items.is_empty())
            .map(|items| normalize_suggestions(items, SuggestionOrigin::Client));

        tracing::info!(
            file = %audio.name,
            blocks = blocks.len(),
            suggestions = suggestions.as_ref().map_or(0, Vec::len),
            "transcription received"
        );

        Transcription::Transcribed {
            blocks,
            duration,
            suggestions,
        }
    }
}

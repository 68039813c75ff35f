//! Partial wire records and the single normalization routine for each entity.
//!
//! Upstream services may omit fields or send them with the wrong JSON type.
//! Partial records deserialize leniently (a mistyped field reads as absent)
//! and are turned into complete values here, so every producer fills gaps
//! the same way.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::{
    Emotion, ScriptSuggestion, Speaker, TalkBlock, Tone, MAX_CONFIDENCE, MIN_CONFIDENCE,
};

pub const UNTRANSCRIBED_TEXT: &str = "(文字起こし結果が取得できませんでした)";
pub const CLIENT_DEFAULT_TITLE: &str = "生成スクリプト";
pub const CLIENT_DEFAULT_BODY: &str = "提案内容を取得できませんでした。";
pub const CLIENT_DEFAULT_CONFIDENCE: f64 = 0.64;
pub const MODEL_DEFAULT_CONFIDENCE: f64 = 0.7;

/// Spacing between synthesized timestamps of consecutive transcribed blocks.
const SYNTHESIZED_BLOCK_GAP_SECS: i64 = 4;

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialTalkBlock {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub speaker: Option<Speaker>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub suggested_response: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub response_time: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub emotion: Option<Emotion>,
}

impl PartialTalkBlock {
    /// Fills every missing field. `index` is the block's position within the
    /// reply it arrived in; it drives speaker alternation (even = customer)
    /// and synthesized timestamps (`now + index * 4s`).
    pub fn normalize(self, index: usize, now: DateTime<Utc>) -> TalkBlock {
        let speaker = self.speaker.unwrap_or(if index % 2 == 0 {
            Speaker::Customer
        } else {
            Speaker::Agent
        });
        let timestamp = self.timestamp.unwrap_or_else(|| {
            now + Duration::seconds(SYNTHESIZED_BLOCK_GAP_SECS * index as i64)
        });

        TalkBlock {
            id: non_blank(self.id).unwrap_or_else(|| format!("transcribed-{}", Uuid::new_v4())),
            speaker,
            text: non_blank(self.text).unwrap_or_else(|| UNTRANSCRIBED_TEXT.to_string()),
            timestamp,
            suggested_response: non_blank(self.suggested_response),
            response_time: self
                .response_time
                .filter(|secs| secs.is_finite() && *secs >= 0.0),
            emotion: Some(self.emotion.unwrap_or(Emotion::Neutral)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialScriptSuggestion {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Where a suggestion list came from; decides the defaults used for gaps.
#[derive(Debug, Clone, Copy)]
pub enum SuggestionOrigin<'a> {
    /// Reply of the suggestion or transcription endpoint, read by the dashboard.
    Client,
    /// Raw model output read by the generate-script endpoint.
    Model { utterance: &'a str },
}

impl PartialScriptSuggestion {
    pub fn normalize(self, index: usize, origin: SuggestionOrigin<'_>) -> ScriptSuggestion {
        let ordinal = index + 1;
        let (id, title, body, confidence) = match origin {
            SuggestionOrigin::Client => (
                non_blank(self.id).unwrap_or_else(|| Uuid::new_v4().to_string()),
                non_blank(self.title).unwrap_or_else(|| CLIENT_DEFAULT_TITLE.to_string()),
                non_blank(self.body).unwrap_or_else(|| CLIENT_DEFAULT_BODY.to_string()),
                CLIENT_DEFAULT_CONFIDENCE,
            ),
            SuggestionOrigin::Model { utterance } => (
                format!("llm-suggestion-{ordinal}"),
                non_blank(self.title).unwrap_or_else(|| format!("提案{ordinal}")),
                non_blank(self.body).unwrap_or_else(|| utterance.trim().to_string()),
                MODEL_DEFAULT_CONFIDENCE,
            ),
        };

        ScriptSuggestion {
            id,
            title,
            body,
            tone: Tone::parse_lenient(self.tone.as_deref()),
            confidence: self
                .confidence
                .filter(|c| c.is_finite())
                .map(|c| c.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE))
                .unwrap_or(confidence),
        }
    }
}

/// Normalizes a whole reply list, preserving order.
pub fn normalize_suggestions(
    items: Vec<PartialScriptSuggestion>,
    origin: SuggestionOrigin<'_>,
) -> Vec<ScriptSuggestion> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let mut suggestion = item.normalize(index, origin);
            if !seen.insert(suggestion.id.clone()) {
                suggestion.id = format!("{}-{}", suggestion.id, Uuid::new_v4());
                seen.insert(suggestion.id.clone());
            }
            suggestion
        })
        .collect()
}

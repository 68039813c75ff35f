//! Server side of script generation: prompt construction, the model call and
//! normalization of the model's JSON reply.

use std::sync::Arc;

use flowcall_provider::{LlmProvider, LlmRequest, OpenAiProvider};
use flowcall_schema::normalize::normalize_suggestions;
use flowcall_schema::{
    Conversation, PartialScriptSuggestion, PartialTalkBlock, ScriptSuggestion, Speaker,
    SuggestionOrigin,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::LlmConfig;
use crate::error::ConfigError;

pub const MAX_SUGGESTIONS: usize = 3;
pub const EMPTY_TRANSCRIPT: &str = "(会話ブロックはまだありません)";

const SYSTEM_PROMPT: &str = "あなたはアウトバウンド営業のトークを提案するアシスタントです。会話履歴を踏まえ、相手の懸念に寄り添いながら、短く・具体的に返答案を3つ提示してください。各案は50〜120文字程度で、提案の狙いがわかる短い題名も付けてください。";

const REPLY_FORMAT_INSTRUCTIONS: &str = "JSON形式で次のキーを持つ\"suggestions\"配列を返してください。各要素は{\n  \"title\": string, // 題名\n  \"body\": string,  // 実際の返答文\n  \"tone\": \"friendly\" | \"direct\" | \"empathetic\",\n  \"confidence\": number // 0から1の間\n} で構成されます。";

#[derive(Debug, Error)]
pub enum GenerateScriptError {
    #[error("最新の顧客発話が必要です。")]
    MissingUtterance,
    /// The model answered but nothing usable could be read from it.
    #[error("{0}")]
    Processing(String),
    #[error("llm provider failed: {0}")]
    Provider(anyhow::Error),
}

impl GenerateScriptError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MissingUtterance => 400,
            Self::Processing(_) | Self::Provider(_) => 500,
        }
    }

    /// Message safe to return to callers.
    pub fn public_message(&self) -> String {
        match self {
            Self::MissingUtterance => self.to_string(),
            Self::Processing(_) | Self::Provider(_) => "台本生成に失敗しました。".to_string(),
        }
    }
}

/// Conversation as sent by a caller; only speaker and text are read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptPayload {
    #[serde(default)]
    pub blocks: Vec<PartialTalkBlock>,
}

impl From<&Conversation> for TranscriptPayload {
    fn from(conversation: &Conversation) -> Self {
        Self {
            blocks: conversation
                .blocks
                .iter()
                .map(|block| PartialTalkBlock {
                    speaker: Some(block.speaker),
                    text: Some(block.text.clone()),
                    ..Default::default()
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateScriptRequest {
    #[serde(default)]
    pub utterance: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub conversation: Option<TranscriptPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerateScriptResponse {
    pub suggestions: Vec<ScriptSuggestion>,
}

/// `Agent: …` / `Customer: …` lines, or a placeholder without blocks.
pub fn build_transcript(conversation: Option<&TranscriptPayload>) -> String {
    match conversation {
        Some(payload) if !payload.blocks.is_empty() => payload
            .blocks
            .iter()
            .map(|block| {
                let label = match block.speaker {
                    Some(Speaker::Agent) => Speaker::Agent.label(),
                    _ => Speaker::Customer.label(),
                };
                format!("{label}: {}", block.text.as_deref().unwrap_or_default())
            })
            .collect::<Vec<_>>()
            .join("\n"),
        _ => EMPTY_TRANSCRIPT.to_string(),
    }
}

fn build_user_prompt(transcript: &str, utterance: &str) -> String {
    format!("会話履歴:\n{transcript}\n\n最新の顧客発話: {utterance}\n\n{REPLY_FORMAT_INSTRUCTIONS}")
}

/// Reads the model's JSON reply. Keeps at most [`MAX_SUGGESTIONS`] entries.
pub fn parse_model_reply(
    content: &str,
    utterance: &str,
) -> Result<Vec<ScriptSuggestion>, GenerateScriptError> {
    if content.trim().is_empty() {
        return Err(GenerateScriptError::Processing(
            "OpenAIからコンテンツが返却されませんでした。".to_string(),
        ));
    }

    let parsed: Value = serde_json::from_str(content).map_err(|e| {
        tracing::error!(error = %e, content, "model reply is not valid json");
        GenerateScriptError::Processing("LLMのレスポンスをJSONとして解析できませんでした。".to_string())
    })?;

    let items: Vec<PartialScriptSuggestion> = parsed
        .get("suggestions")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .take(MAX_SUGGESTIONS)
                .map(|item| serde_json::from_value(item.clone()).unwrap_or_default())
                .collect()
        })
        .unwrap_or_default();

    if items.is_empty() {
        return Err(GenerateScriptError::Processing(
            "LLMから提案が取得できませんでした。".to_string(),
        ));
    }

    Ok(normalize_suggestions(
        items,
        SuggestionOrigin::Model { utterance },
    ))
}

#[derive(Clone)]
pub struct ScriptGenerator {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: f32,
}

impl ScriptGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
        }
    }

    /// Fails with [`ConfigError::MissingApiKey`] when no credential is configured.
    pub fn from_config(config: &LlmConfig) -> Result<Self, ConfigError> {
        let api_key = config.api_key().ok_or(ConfigError::MissingApiKey)?;
        let provider = OpenAiProvider::new(api_key, config.api_base.clone());
        Ok(Self::new(
            Arc::new(provider),
            config.model.clone(),
            config.temperature,
        ))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn generate(
        &self,
        request: &GenerateScriptRequest,
    ) -> Result<Vec<ScriptSuggestion>, GenerateScriptError> {
        let utterance = request
            .utterance
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(GenerateScriptError::MissingUtterance)?;

        let transcript = build_transcript(request.conversation.as_ref());
        let llm_request = LlmRequest::simple(
            self.model.clone(),
            Some(SYSTEM_PROMPT.to_string()),
            build_user_prompt(&transcript, utterance),
        )
        .with_temperature(self.temperature)
        .json_object();

        tracing::info!(
            model = %self.model,
            conversation_id = request.conversation_id.as_deref().unwrap_or(""),
            "generating script suggestions"
        );

        let response = self
            .provider
            .chat(llm_request)
            .await
            .map_err(GenerateScriptError::Provider)?;

        let suggestions = parse_model_reply(&response.text, utterance)?;
        tracing::debug!(count = suggestions.len(), "script suggestions generated");
        Ok(suggestions)
    }
}

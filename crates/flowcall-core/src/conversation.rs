//! The conversation store: the ordered block sequence, its metadata and the
//! current suggestion list, plus the operations that mutate them.
//!
//! Network calls run without holding the state lock. Results are applied
//! under the write lock, where suggestion results are checked against the
//! latest issued ticket so that a slow, older request cannot overwrite the
//! outcome of a newer one.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use flowcall_schema::seed::{base_suggestions, demo_conversation};
use flowcall_schema::{Conversation, ScriptSuggestion, Speaker, TalkBlock};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::client::{
    AudioFile, SuggestionApi, SuggestionClient, Transcription, TranscriptionApi,
    TranscriptionClient,
};
use crate::error::ValidationError;
use crate::layout::{derive_flow_layout, FlowLayout};
use crate::learning::OutcomeRecorder;
use crate::sequence::{InFlight, TicketCounter};
use crate::views::{self, AnalyticsSummary};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub conversation: Conversation,
    pub suggestions: Vec<ScriptSuggestion>,
    pub is_transcribing: bool,
    pub is_generating_script: bool,
}

/// What happened to the suggestion list after a request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionUpdate {
    Fresh,
    Fallback,
    /// A newer request was issued meanwhile; this result was dropped.
    Superseded,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionUpdate {
    pub appended: usize,
    pub fallback: bool,
    pub suggestions_applied: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedSuggestion {
    pub block: TalkBlock,
    pub patterns_updated: usize,
}

#[derive(Debug)]
struct ConversationState {
    conversation: Conversation,
    suggestions: Vec<ScriptSuggestion>,
    tickets: TicketCounter,
}

#[derive(Clone)]
pub struct ConversationStore {
    state: Arc<RwLock<ConversationState>>,
    suggestion_client: SuggestionClient,
    transcription_client: TranscriptionClient,
    outcome_recorder: Option<Arc<dyn OutcomeRecorder>>,
    transcribing: InFlight,
    generating_script: InFlight,
}

impl ConversationStore {
    /// Store seeded with the demo conversation and base suggestions.
    pub fn new(
        suggestion_api: Arc<dyn SuggestionApi>,
        transcription_api: Arc<dyn TranscriptionApi>,
    ) -> Self {
        Self::with_state(
            suggestion_api,
            transcription_api,
            demo_conversation(),
            base_suggestions(),
        )
    }

    pub fn with_state(
        suggestion_api: Arc<dyn SuggestionApi>,
        transcription_api: Arc<dyn TranscriptionApi>,
        conversation: Conversation,
        suggestions: Vec<ScriptSuggestion>,
    ) -> Self {
        Self {
            state: Arc::new(RwLock::new(ConversationState {
                conversation,
                suggestions,
                tickets: TicketCounter::default(),
            })),
            suggestion_client: SuggestionClient::new(suggestion_api),
            transcription_client: TranscriptionClient::new(transcription_api),
            outcome_recorder: None,
            transcribing: InFlight::default(),
            generating_script: InFlight::default(),
        }
    }

    pub fn with_outcome_recorder(mut self, recorder: Arc<dyn OutcomeRecorder>) -> Self {
        self.outcome_recorder = Some(recorder);
        self
    }

    pub fn is_transcribing(&self) -> bool {
        self.transcribing.is_active()
    }

    pub fn is_generating_script(&self) -> bool {
        self.generating_script.is_active()
    }

    pub async fn conversation(&self) -> Conversation {
        self.state.read().await.conversation.clone()
    }

    pub async fn suggestions(&self) -> Vec<ScriptSuggestion> {
        self.state.read().await.suggestions.clone()
    }

    pub async fn snapshot(&self) -> DashboardSnapshot {
        let state = self.state.read().await;
        DashboardSnapshot {
            conversation: state.conversation.clone(),
            suggestions: state.suggestions.clone(),
            is_transcribing: self.is_transcribing(),
            is_generating_script: self.is_generating_script(),
        }
    }

    pub async fn timeline(&self) -> Vec<TalkBlock> {
        views::timeline(&self.state.read().await.conversation.blocks)
    }

    pub async fn analytics(&self) -> AnalyticsSummary {
        AnalyticsSummary::from_conversation(&self.state.read().await.conversation)
    }

    pub async fn flow_layout(&self) -> FlowLayout {
        let state = self.state.read().await;
        derive_flow_layout(&state.conversation.blocks, &state.suggestions)
    }

    pub async fn latest_customer_utterance(&self) -> Option<String> {
        views::latest_customer_utterance(&self.state.read().await.conversation.blocks)
            .map(str::to_string)
    }

    /// Uploads `file` for transcription and appends what comes back, or the
    /// fallback block when the call fails.
    pub async fn transcribe_audio(
        &self,
        file: AudioFile,
    ) -> Result<TranscriptionUpdate, ValidationError> {
        file.validate()?;
        let _guard = self.transcribing.enter();

        let mark = self.state.read().await.tickets.mark();
        let result = self.transcription_client.transcribe(&file, Utc::now()).await;

        let mut state = self.state.write().await;
        let update = match result {
            Transcription::Transcribed {
                blocks,
                duration,
                suggestions,
            } => {
                let appended = blocks.len();
                let mut taken: HashSet<String> =
                    state.conversation.blocks.iter().map(|b| b.id.clone()).collect();
                for mut block in blocks {
                    if taken.contains(&block.id) {
                        let reassigned = format!("transcribed-{}", Uuid::new_v4());
                        tracing::debug!(id = %block.id, %reassigned, "duplicate block id reassigned");
                        block.id = reassigned;
                    }
                    taken.insert(block.id.clone());
                    state.conversation.append(block);
                }
                if let Some(reported) = duration {
                    state.conversation.raise_duration(reported);
                }

                let suggestions_applied = match suggestions {
                    Some(list) if !state.tickets.issued_since(mark) => {
                        state.tickets.issue();
                        state.suggestions = list;
                        true
                    }
                    Some(_) => {
                        tracing::debug!(
                            "transcription suggestions dropped, a newer suggestion request exists"
                        );
                        false
                    }
                    None => false,
                };

                TranscriptionUpdate {
                    appended,
                    fallback: false,
                    suggestions_applied,
                }
            }
            Transcription::Fallback(block) => {
                state.conversation.append(block);
                TranscriptionUpdate {
                    appended: 1,
                    fallback: true,
                    suggestions_applied: false,
                }
            }
        };

        tracing::info!(
            file = %file.name,
            appended = update.appended,
            fallback = update.fallback,
            duration = state.conversation.metadata.duration,
            "transcription applied"
        );
        Ok(update)
    }

    /// Replaces the suggestion list with suggestions for `latest_utterance`,
    /// unless a newer request has been issued by the time the reply arrives.
    pub async fn request_script_suggestions(
        &self,
        latest_utterance: &str,
    ) -> Result<SuggestionUpdate, ValidationError> {
        let utterance = latest_utterance.trim();
        if utterance.is_empty() {
            return Err(ValidationError::EmptyUtterance);
        }
        let _guard = self.generating_script.enter();

        let (ticket, conversation_id) = {
            let mut state = self.state.write().await;
            (state.tickets.issue(), state.conversation.id.clone())
        };

        let fetch = self.suggestion_client.fetch(utterance, &conversation_id).await;

        let mut state = self.state.write().await;
        if !state.tickets.is_latest(ticket) {
            tracing::debug!(?ticket, "stale suggestion result discarded");
            return Ok(SuggestionUpdate::Superseded);
        }
        let update = if fetch.is_fallback() {
            SuggestionUpdate::Fallback
        } else {
            SuggestionUpdate::Fresh
        };
        state.suggestions = fetch.into_suggestions();
        Ok(update)
    }

    /// Suggestions for the latest customer utterance, if there is one.
    pub async fn refresh_suggestions(&self) -> Result<SuggestionUpdate, ValidationError> {
        let utterance = self
            .latest_customer_utterance()
            .await
            .ok_or(ValidationError::EmptyUtterance)?;
        self.request_script_suggestions(&utterance).await
    }

    /// Records what the customer said, then asks for suggestions for it.
    pub async fn add_customer_utterance(
        &self,
        text: &str,
    ) -> Result<SuggestionUpdate, ValidationError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyUtterance);
        }

        let block = TalkBlock::new(
            format!("manual-{}", Uuid::new_v4()),
            Speaker::Customer,
            text,
            Utc::now(),
        );
        self.state.write().await.conversation.append(block);
        tracing::info!("customer utterance recorded");

        self.request_script_suggestions(text).await
    }

    /// Appends an agent block speaking the suggestion and reports the
    /// acceptance to the outcome recorder. `None` if the id is not among
    /// the current suggestions.
    pub async fn accept_suggestion(&self, suggestion_id: &str) -> Option<AcceptedSuggestion> {
        let (block, utterance) = {
            let mut state = self.state.write().await;
            let suggestion = state
                .suggestions
                .iter()
                .find(|s| s.id == suggestion_id)
                .cloned()?;
            let utterance = state
                .conversation
                .latest_customer_block()
                .map(|b| b.text.clone());
            let block = TalkBlock::new(
                format!("accepted-{}", Uuid::new_v4()),
                Speaker::Agent,
                suggestion.body.clone(),
                Utc::now(),
            )
            .with_suggested_response(suggestion.body);
            state.conversation.append(block.clone());
            (block, utterance)
        };

        let patterns_updated = match (&self.outcome_recorder, utterance) {
            (Some(recorder), Some(utterance)) => {
                recorder.record_accepted(&utterance, &block.text).await
            }
            _ => 0,
        };

        tracing::info!(suggestion_id, patterns_updated, "suggestion accepted");
        Some(AcceptedSuggestion {
            block,
            patterns_updated,
        })
    }
}

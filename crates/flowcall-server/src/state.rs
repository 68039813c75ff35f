use std::sync::Arc;

use anyhow::Result;
use flowcall_core::{
    ConfigError, ConversationStore, FlowcallConfig, HttpDashboardClient, LearningPatternStore,
    ScriptGenerator,
};

/// Shared application state accessible from all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub conversations: ConversationStore,
    pub patterns: LearningPatternStore,
    /// `None` when no LLM credential is configured.
    pub generator: Option<Arc<ScriptGenerator>>,
}

impl AppState {
    /// Wires the stores together: accepted suggestions feed the pattern store.
    pub fn new(
        conversations: ConversationStore,
        patterns: LearningPatternStore,
        generator: Option<Arc<ScriptGenerator>>,
    ) -> Self {
        let conversations = conversations.with_outcome_recorder(Arc::new(patterns.clone()));
        Self {
            conversations,
            patterns,
            generator,
        }
    }

    pub fn from_config(config: &FlowcallConfig) -> Result<Self> {
        let client = Arc::new(HttpDashboardClient::new(&config.dashboard)?);
        let conversations = ConversationStore::new(client.clone(), client);

        let generator = match ScriptGenerator::from_config(&config.llm) {
            Ok(generator) => Some(Arc::new(generator)),
            Err(ConfigError::MissingApiKey) => {
                tracing::warn!("OpenAI API key is not configured; generate-script will answer 500");
                None
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self::new(conversations, LearningPatternStore::new(), generator))
    }
}

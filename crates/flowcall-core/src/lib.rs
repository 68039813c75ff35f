pub mod client;
pub mod config;
pub mod conversation;
pub mod error;
pub mod layout;
pub mod learning;
pub mod script_generator;
pub mod sequence;
pub mod views;

pub use client::{
    AudioFile, HttpDashboardClient, SuggestionApi, SuggestionClient, SuggestionFetch,
    SuggestionRequest, Transcription, TranscriptionApi, TranscriptionClient,
};
pub use config::{config_path, load_config, FlowcallConfig};
pub use conversation::{
    AcceptedSuggestion, ConversationStore, DashboardSnapshot, SuggestionUpdate,
    TranscriptionUpdate,
};
pub use error::{ConfigError, ValidationError};
pub use layout::{derive_flow_layout, FlowEdge, FlowLayout, FlowNode, FlowNodeKind, Position};
pub use learning::{parse_tags, LearningPatternStore, NewPattern, OutcomeRecorder};
pub use script_generator::{
    GenerateScriptError, GenerateScriptRequest, GenerateScriptResponse, ScriptGenerator,
    TranscriptPayload,
};
pub use views::AnalyticsSummary;

pub mod normalize;
pub mod seed;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use normalize::{PartialScriptSuggestion, PartialTalkBlock, SuggestionOrigin};

/// Lowest confidence a suggestion derived from an external source may carry.
pub const MIN_CONFIDENCE: f64 = 0.3;
/// Highest confidence a suggestion derived from an external source may carry.
pub const MAX_CONFIDENCE: f64 = 0.95;

/// Duration credited to a block that carries no response time.
pub const DEFAULT_BLOCK_SECONDS: f64 = 10.0;
/// Minimum duration credited to any appended block.
pub const MIN_BLOCK_SECONDS: f64 = 5.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Agent,
    Customer,
}

impl Speaker {
    /// Display label used by the timeline and the flow graph.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Agent => "Agent",
            Self::Customer => "Customer",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Positive,
    Neutral,
    Negative,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Appointment,
    Rejected,
    #[default]
    Pending,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Friendly,
    Direct,
    Empathetic,
}

impl Tone {
    /// Maps anything other than `direct` / `empathetic` to `friendly`.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("direct") => Self::Direct,
            Some("empathetic") => Self::Empathetic,
            _ => Self::Friendly,
        }
    }
}

/// One recorded utterance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TalkBlock {
    pub id: String,
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_response: Option<String>,
    /// Seconds the speaker took to respond.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<Emotion>,
}

impl TalkBlock {
    pub fn new(
        id: impl Into<String>,
        speaker: Speaker,
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            speaker,
            text: text.into(),
            timestamp,
            suggested_response: None,
            response_time: None,
            emotion: None,
        }
    }

    pub fn with_emotion(mut self, emotion: Emotion) -> Self {
        self.emotion = Some(emotion);
        self
    }

    pub fn with_response_time(mut self, seconds: f64) -> Self {
        self.response_time = Some(seconds);
        self
    }

    pub fn with_suggested_response(mut self, text: impl Into<String>) -> Self {
        self.suggested_response = Some(text.into());
        self
    }

    /// Seconds this block adds to the conversation duration.
    pub fn duration_increment(&self) -> f64 {
        self.response_time
            .unwrap_or(DEFAULT_BLOCK_SECONDS)
            .max(MIN_BLOCK_SECONDS)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMetadata {
    /// Accumulated call length in seconds. Never decreases.
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    /// Session start.
    pub timestamp: DateTime<Utc>,
    /// Arrival order, not necessarily timestamp order.
    pub blocks: Vec<TalkBlock>,
    pub outcome: Outcome,
    pub metadata: ConversationMetadata,
}

impl Conversation {
    pub fn new(id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            timestamp,
            blocks: Vec::new(),
            outcome: Outcome::Pending,
            metadata: ConversationMetadata {
                duration: 0.0,
                customer_id: None,
                agent_id: None,
            },
        }
    }

    /// Appends a block and credits its duration increment.
    pub fn append(&mut self, block: TalkBlock) {
        self.metadata.duration += block.duration_increment();
        self.blocks.push(block);
    }

    /// Raises the duration to `seconds` if that is larger than the current value.
    pub fn raise_duration(&mut self, seconds: f64) {
        if seconds.is_finite() && seconds > self.metadata.duration {
            self.metadata.duration = seconds;
        }
    }

    pub fn latest_customer_block(&self) -> Option<&TalkBlock> {
        self.blocks
            .iter()
            .rev()
            .find(|block| block.speaker == Speaker::Customer)
    }
}

/// A candidate next utterance for the agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScriptSuggestion {
    pub id: String,
    pub title: String,
    pub body: String,
    pub tone: Tone,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRecord {
    pub text: String,
    pub success_rate: f64,
    pub usage_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LearningPattern {
    pub pattern_id: String,
    pub trigger_phrase: String,
    /// Texts are unique within one pattern.
    pub successful_responses: Vec<ResponseRecord>,
    pub context_tags: Vec<String>,
}

impl LearningPattern {
    pub fn response(&self, text: &str) -> Option<&ResponseRecord> {
        self.successful_responses.iter().find(|r| r.text == text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_726_536_600 + secs, 0).unwrap()
    }

    #[test]
    fn duration_increment_uses_default_and_floor() {
        let plain = TalkBlock::new("a", Speaker::Customer, "hi", at(0));
        assert_eq!(plain.duration_increment(), 10.0);

        let quick = plain.clone().with_response_time(2.0);
        assert_eq!(quick.duration_increment(), 5.0);

        let slow = plain.with_response_time(12.5);
        assert_eq!(slow.duration_increment(), 12.5);
    }

    #[test]
    fn append_accumulates_duration() {
        let mut conversation = Conversation::new("c", at(0));
        conversation.append(TalkBlock::new("a", Speaker::Customer, "hi", at(1)));
        conversation.append(TalkBlock::new("b", Speaker::Agent, "hello", at(2)).with_response_time(5.0));
        assert_eq!(conversation.blocks.len(), 2);
        assert_eq!(conversation.metadata.duration, 15.0);
    }

    #[test]
    fn raise_duration_never_lowers() {
        let mut conversation = Conversation::new("c", at(0));
        conversation.metadata.duration = 40.0;
        conversation.raise_duration(30.0);
        assert_eq!(conversation.metadata.duration, 40.0);
        conversation.raise_duration(f64::NAN);
        assert_eq!(conversation.metadata.duration, 40.0);
        conversation.raise_duration(90.0);
        assert_eq!(conversation.metadata.duration, 90.0);
    }

    #[test]
    fn latest_customer_block_scans_from_end() {
        let mut conversation = Conversation::new("c", at(0));
        conversation.append(TalkBlock::new("c1", Speaker::Customer, "first", at(1)));
        conversation.append(TalkBlock::new("c2", Speaker::Customer, "second", at(2)));
        conversation.append(TalkBlock::new("a1", Speaker::Agent, "reply", at(3)));
        assert_eq!(conversation.latest_customer_block().unwrap().id, "c2");
    }

    #[test]
    fn tone_parse_lenient_defaults_to_friendly() {
        assert_eq!(Tone::parse_lenient(Some("direct")), Tone::Direct);
        assert_eq!(Tone::parse_lenient(Some("empathetic")), Tone::Empathetic);
        assert_eq!(Tone::parse_lenient(Some("aggressive")), Tone::Friendly);
        assert_eq!(Tone::parse_lenient(None), Tone::Friendly);
    }

    #[test]
    fn talk_block_serializes_camel_case() {
        let block = TalkBlock::new("b", Speaker::Agent, "hello", at(0))
            .with_response_time(6.0)
            .with_suggested_response("try this");
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["speaker"], "agent");
        assert_eq!(json["responseTime"], 6.0);
        assert_eq!(json["suggestedResponse"], "try this");
        assert!(json.get("emotion").is_none());
    }
}

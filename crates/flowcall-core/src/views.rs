//! Read-only projections of a conversation.

use flowcall_schema::{Conversation, Emotion, Outcome, Speaker, TalkBlock};
use serde::{Deserialize, Serialize};

/// Assumed response time for agent blocks that carry none.
const ASSUMED_AGENT_RESPONSE_SECS: f64 = 6.0;

/// Blocks ordered by timestamp; equal timestamps keep arrival order.
pub fn timeline(blocks: &[TalkBlock]) -> Vec<TalkBlock> {
    let mut ordered = blocks.to_vec();
    ordered.sort_by_key(|block| block.timestamp);
    ordered
}

pub fn latest_customer_utterance(blocks: &[TalkBlock]) -> Option<&str> {
    blocks
        .iter()
        .rev()
        .find(|block| block.speaker == Speaker::Customer)
        .map(|block| block.text.as_str())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub total_blocks: usize,
    pub agent_share: f64,
    pub customer_share: f64,
    pub positive_ratio: f64,
    /// Seconds, one decimal.
    pub average_response_time: f64,
    pub duration: f64,
    pub duration_minutes: i64,
    pub outcome: Outcome,
}

impl AnalyticsSummary {
    pub fn from_conversation(conversation: &Conversation) -> Self {
        let blocks = &conversation.blocks;
        let total = blocks.len();
        let agent_times: Vec<f64> = blocks
            .iter()
            .filter(|b| b.speaker == Speaker::Agent)
            .map(|b| b.response_time.unwrap_or(ASSUMED_AGENT_RESPONSE_SECS))
            .collect();
        let agents = agent_times.len();
        let positives = blocks
            .iter()
            .filter(|b| b.emotion == Some(Emotion::Positive))
            .count();

        let ratio = |count: usize| {
            if total == 0 {
                0.0
            } else {
                count as f64 / total as f64
            }
        };
        let average = if agents == 0 {
            0.0
        } else {
            agent_times.iter().sum::<f64>() / agents as f64
        };

        Self {
            total_blocks: total,
            agent_share: ratio(agents),
            customer_share: ratio(total - agents),
            positive_ratio: ratio(positives),
            average_response_time: (average * 10.0).round() / 10.0,
            duration: conversation.metadata.duration,
            duration_minutes: (conversation.metadata.duration / 60.0).round() as i64,
            outcome: conversation.outcome,
        }
    }
}

//! Registry of trigger phrases and the responses that worked for them.

use std::sync::Arc;

use async_trait::async_trait;
use flowcall_schema::seed::base_patterns;
use flowcall_schema::{LearningPattern, ResponseRecord};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::ValidationError;

pub const MIN_SUCCESS_RATE: f64 = 0.1;
pub const MAX_SUCCESS_RATE: f64 = 0.95;
const RATE_STEP: f64 = 0.05;
const FIRST_SUCCESS_RATE: f64 = 0.6;
const FIRST_FAILURE_RATE: f64 = 0.4;
const SEED_SUCCESS_RATE: f64 = 0.5;

/// Receives accepted suggestions so their outcome can be learned.
#[async_trait]
pub trait OutcomeRecorder: Send + Sync {
    /// Returns how many patterns were updated.
    async fn record_accepted(&self, customer_utterance: &str, response_text: &str) -> usize;
}

/// A pattern before it has been assigned an id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewPattern {
    pub trigger_phrase: String,
    pub successful_responses: Vec<ResponseRecord>,
    #[serde(default)]
    pub context_tags: Vec<String>,
}

impl NewPattern {
    /// One response at the neutral starting rate, as entered by an operator.
    pub fn seeded(
        trigger_phrase: impl Into<String>,
        response_text: impl Into<String>,
        context_tags: Vec<String>,
    ) -> Self {
        Self {
            trigger_phrase: trigger_phrase.into(),
            successful_responses: vec![ResponseRecord {
                text: response_text.into(),
                success_rate: SEED_SUCCESS_RATE,
                usage_count: 1,
            }],
            context_tags,
        }
    }
}

/// Splits `"a, b,,c"` into trimmed, non-empty tags in order.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn clamp_rate(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(MIN_SUCCESS_RATE, MAX_SUCCESS_RATE)
    } else {
        SEED_SUCCESS_RATE
    }
}

#[derive(Debug, Clone)]
pub struct LearningPatternStore {
    patterns: Arc<RwLock<Vec<LearningPattern>>>,
}

impl Default for LearningPatternStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LearningPatternStore {
    /// Seeded with the demo patterns.
    pub fn new() -> Self {
        Self::with_patterns(base_patterns())
    }

    pub fn with_patterns(patterns: Vec<LearningPattern>) -> Self {
        Self {
            patterns: Arc::new(RwLock::new(patterns)),
        }
    }

    pub async fn patterns(&self) -> Vec<LearningPattern> {
        self.patterns.read().await.clone()
    }

    pub async fn get(&self, pattern_id: &str) -> Option<LearningPattern> {
        self.patterns
            .read()
            .await
            .iter()
            .find(|p| p.pattern_id == pattern_id)
            .cloned()
    }

    pub async fn add_pattern(&self, new_pattern: NewPattern) -> Result<String, ValidationError> {
        let trigger_phrase = new_pattern.trigger_phrase.trim().to_string();
        if trigger_phrase.is_empty() {
            return Err(ValidationError::EmptyTriggerPhrase);
        }

        let mut responses: Vec<ResponseRecord> = Vec::new();
        for record in new_pattern.successful_responses {
            let text = record.text.trim();
            if text.is_empty() || responses.iter().any(|r| r.text == text) {
                continue;
            }
            responses.push(ResponseRecord {
                text: text.to_string(),
                success_rate: clamp_rate(record.success_rate),
                usage_count: record.usage_count.max(1),
            });
        }
        if responses.is_empty() {
            return Err(ValidationError::EmptyResponse);
        }

        let context_tags = new_pattern
            .context_tags
            .iter()
            .map(|tag| tag.trim())
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect();

        let pattern_id = format!("pattern-{}", Uuid::new_v4());
        self.patterns.write().await.push(LearningPattern {
            pattern_id: pattern_id.clone(),
            trigger_phrase,
            successful_responses: responses,
            context_tags,
        });
        tracing::info!(%pattern_id, "learning pattern added");
        Ok(pattern_id)
    }

    /// Returns `false` when no pattern has `pattern_id`.
    pub async fn record_response_outcome(
        &self,
        pattern_id: &str,
        response_text: &str,
        did_succeed: bool,
    ) -> bool {
        let mut patterns = self.patterns.write().await;
        let Some(pattern) = patterns.iter_mut().find(|p| p.pattern_id == pattern_id) else {
            tracing::debug!(pattern_id, "outcome for unknown pattern ignored");
            return false;
        };
        apply_outcome(pattern, response_text, did_succeed);
        true
    }
}

fn apply_outcome(pattern: &mut LearningPattern, response_text: &str, did_succeed: bool) {
    match pattern
        .successful_responses
        .iter_mut()
        .find(|r| r.text == response_text)
    {
        Some(existing) => {
            existing.usage_count += 1;
            let rate = if did_succeed {
                (existing.success_rate + RATE_STEP).min(MAX_SUCCESS_RATE)
            } else {
                (existing.success_rate - RATE_STEP).max(MIN_SUCCESS_RATE)
            };
            existing.success_rate = round2(rate);
        }
        None => pattern.successful_responses.push(ResponseRecord {
            text: response_text.to_string(),
            success_rate: if did_succeed {
                FIRST_SUCCESS_RATE
            } else {
                FIRST_FAILURE_RATE
            },
            usage_count: 1,
        }),
    }
}

#[async_trait]
impl OutcomeRecorder for LearningPatternStore {
    async fn record_accepted(&self, customer_utterance: &str, response_text: &str) -> usize {
        let response_text = response_text.trim();
        if response_text.is_empty() {
            return 0;
        }
        let mut patterns = self.patterns.write().await;
        let mut updated = 0;
        for pattern in patterns
            .iter_mut()
            .filter(|p| !p.trigger_phrase.is_empty() && customer_utterance.contains(&p.trigger_phrase))
        {
            apply_outcome(pattern, response_text, true);
            updated += 1;
        }
        if updated > 0 {
            tracing::info!(updated, "accepted suggestion recorded as success");
        }
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tags_trims_and_drops_blanks() {
        assert_eq!(parse_tags(" 初回接触, 時間制約,, "), vec!["初回接触", "時間制約"]);
        assert!(parse_tags("").is_empty());
    }

    #[tokio::test]
    async fn add_pattern_assigns_distinct_ids_and_keeps_order() {
        let store = LearningPatternStore::with_patterns(Vec::new());
        let first = store
            .add_pattern(NewPattern::seeded(
                " 検討します ",
                "来週もう一度ご連絡します",
                vec!["b".into(), "a".into()],
            ))
            .await
            .unwrap();
        let second = store
            .add_pattern(NewPattern::seeded("高い", "事例をご紹介します", vec![]))
            .await
            .unwrap();
        assert_ne!(first, second);
        assert!(first.starts_with("pattern-"));

        let stored = store.get(&first).await.unwrap();
        assert_eq!(stored.trigger_phrase, "検討します");
        assert_eq!(stored.context_tags, vec!["b", "a"]);
        assert_eq!(stored.successful_responses[0].success_rate, 0.5);
        assert_eq!(store.patterns().await.len(), 2);
    }

    #[tokio::test]
    async fn add_pattern_rejects_blank_input() {
        let store = LearningPatternStore::with_patterns(Vec::new());
        assert_eq!(
            store
                .add_pattern(NewPattern::seeded("  ", "x", vec![]))
                .await,
            Err(ValidationError::EmptyTriggerPhrase)
        );
        assert_eq!(
            store
                .add_pattern(NewPattern::seeded("trigger", " ", vec![]))
                .await,
            Err(ValidationError::EmptyResponse)
        );
        assert!(store.patterns().await.is_empty());
    }

    #[tokio::test]
    async fn add_pattern_dedupes_response_texts() {
        let store = LearningPatternStore::with_patterns(Vec::new());
        let mut pattern = NewPattern::seeded("t", "same", vec![]);
        pattern.successful_responses.push(ResponseRecord {
            text: " same ".into(),
            success_rate: 0.9,
            usage_count: 4,
        });
        let id = store.add_pattern(pattern).await.unwrap();
        let stored = store.get(&id).await.unwrap();
        assert_eq!(stored.successful_responses.len(), 1);
        assert_eq!(stored.successful_responses[0].success_rate, 0.5);
    }

    #[tokio::test]
    async fn unseen_text_inserted_once_then_updated() {
        let store = LearningPatternStore::new();
        assert!(
            store
                .record_response_outcome("pattern-price-objection", "新しい返し", true)
                .await
        );
        assert!(
            store
                .record_response_outcome("pattern-price-objection", "新しい返し", true)
                .await
        );
        let pattern = store.get("pattern-price-objection").await.unwrap();
        let matching: Vec<_> = pattern
            .successful_responses
            .iter()
            .filter(|r| r.text == "新しい返し")
            .collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].usage_count, 2);
        assert_eq!(matching[0].success_rate, 0.65);
    }

    #[tokio::test]
    async fn first_failure_starts_at_point_four() {
        let store = LearningPatternStore::new();
        store
            .record_response_outcome("pattern-quick-trust", "だめだった返し", false)
            .await;
        let pattern = store.get("pattern-quick-trust").await.unwrap();
        let record = pattern.response("だめだった返し").unwrap();
        assert_eq!(record.success_rate, 0.4);
        assert_eq!(record.usage_count, 1);
    }

    #[tokio::test]
    async fn rates_converge_to_bounds() {
        let store = LearningPatternStore::new();
        let text = "30秒でご判断いただける要点だけお伝えします";
        for _ in 0..20 {
            store
                .record_response_outcome("pattern-quick-trust", text, true)
                .await;
        }
        let rate = |p: LearningPattern| p.response(text).unwrap().success_rate;
        assert_eq!(rate(store.get("pattern-quick-trust").await.unwrap()), 0.95);

        for _ in 0..30 {
            store
                .record_response_outcome("pattern-quick-trust", text, false)
                .await;
        }
        assert_eq!(rate(store.get("pattern-quick-trust").await.unwrap()), 0.1);
    }

    #[tokio::test]
    async fn unknown_pattern_is_a_no_op() {
        let store = LearningPatternStore::new();
        let before = store.patterns().await;
        assert!(!store.record_response_outcome("pattern-missing", "x", true).await);
        assert_eq!(store.patterns().await, before);
    }

    #[tokio::test]
    async fn accepted_suggestion_updates_matching_triggers() {
        let store = LearningPatternStore::new();
        let updated = store
            .record_accepted("今は忙しいので短く教えてください", "要点だけお伝えします")
            .await;
        assert_eq!(updated, 1);
        let pattern = store.get("pattern-quick-trust").await.unwrap();
        assert_eq!(pattern.response("要点だけお伝えします").unwrap().success_rate, 0.6);

        let untouched = store.get("pattern-price-objection").await.unwrap();
        assert!(untouched.response("要点だけお伝えします").is_none());
    }
}

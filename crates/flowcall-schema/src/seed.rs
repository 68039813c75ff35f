//! Demo data the dashboard starts from, and the fixed fallback values used
//! when an upstream call fails.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    Conversation, ConversationMetadata, Emotion, LearningPattern, Outcome, ResponseRecord,
    ScriptSuggestion, Speaker, TalkBlock, Tone,
};

pub const DEMO_CONVERSATION_ID: &str = "demo-conversation";
pub const FALLBACK_TRANSCRIPT_TEXT: &str = "（デモ）こちらの資料も後ほどいただけますか？";

fn instant(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

pub fn demo_conversation() -> Conversation {
    Conversation {
        id: DEMO_CONVERSATION_ID.to_string(),
        timestamp: instant("2024-09-17T01:30:00.000Z"),
        blocks: vec![
            TalkBlock::new(
                "block-1",
                Speaker::Customer,
                "こんにちは。どちら様でしょうか？",
                instant("2024-09-17T01:30:05.000Z"),
            )
            .with_emotion(Emotion::Neutral),
            TalkBlock::new(
                "block-2",
                Speaker::Agent,
                "FlowCallの高橋でございます。本日は業務の効率化につながるご提案でご連絡いたしました。",
                instant("2024-09-17T01:30:10.000Z"),
            )
            .with_response_time(5.0)
            .with_suggested_response(
                "本日はアウトバウンド対応におけるトーク支援システムのご紹介でお電話しました。",
            )
            .with_emotion(Emotion::Positive),
            TalkBlock::new(
                "block-3",
                Speaker::Customer,
                "今は少し忙しいのですが、短く教えてください。",
                instant("2024-09-17T01:30:20.000Z"),
            )
            .with_emotion(Emotion::Neutral),
        ],
        outcome: Outcome::Pending,
        metadata: ConversationMetadata {
            duration: 45.0,
            customer_id: Some("cust-402".to_string()),
            agent_id: Some("agent-901".to_string()),
        },
    }
}

pub fn base_suggestions() -> Vec<ScriptSuggestion> {
    vec![
        ScriptSuggestion {
            id: "suggestion-primary".to_string(),
            title: "課題を即時に想起させる切り返し".to_string(),
            body: "お忙しいところ恐れ入ります。30秒で要点だけお伝えしますので、その後ご判断いただけますでしょうか。".to_string(),
            tone: Tone::Empathetic,
            confidence: 0.86,
        },
        ScriptSuggestion {
            id: "suggestion-alt-1".to_string(),
            title: "成果事例を先出しする導入".to_string(),
            body: "先週も同業の〇〇社様でアポ取得率が32%向上した事例が出ておりまして、その仕組みを簡単にご紹介させてください。".to_string(),
            tone: Tone::Friendly,
            confidence: 0.79,
        },
        ScriptSuggestion {
            id: "suggestion-alt-2".to_string(),
            title: "時間制約を明確にするアプローチ".to_string(),
            body: "ご負担を最小限にするため、60秒以内で本題に入ります。気になるところがあればすぐに補足いたします。".to_string(),
            tone: Tone::Direct,
            confidence: 0.74,
        },
    ]
}

/// Base suggestions re-identified as `<id>-fallback-<index>`.
pub fn fallback_suggestions() -> Vec<ScriptSuggestion> {
    base_suggestions()
        .into_iter()
        .enumerate()
        .map(|(index, suggestion)| ScriptSuggestion {
            id: format!("{}-fallback-{index}", suggestion.id),
            ..suggestion
        })
        .collect()
}

/// The block appended when a transcription call fails.
pub fn fallback_transcript_block(now: DateTime<Utc>) -> TalkBlock {
    TalkBlock::new(
        format!("fallback-{}", Uuid::new_v4()),
        Speaker::Customer,
        FALLBACK_TRANSCRIPT_TEXT,
        now,
    )
    .with_emotion(Emotion::Positive)
}

pub fn base_patterns() -> Vec<LearningPattern> {
    vec![
        LearningPattern {
            pattern_id: "pattern-quick-trust".to_string(),
            trigger_phrase: "短く教えて".to_string(),
            successful_responses: vec![
                ResponseRecord {
                    text: "30秒でご判断いただける要点だけお伝えします".to_string(),
                    success_rate: 0.62,
                    usage_count: 18,
                },
                ResponseRecord {
                    text: "成功事例から先にお話しします".to_string(),
                    success_rate: 0.58,
                    usage_count: 12,
                },
            ],
            context_tags: vec!["初回接触".to_string(), "時間制約".to_string()],
        },
        LearningPattern {
            pattern_id: "pattern-price-objection".to_string(),
            trigger_phrase: "費用が気になる".to_string(),
            successful_responses: vec![ResponseRecord {
                text: "導入後3ヶ月で回収できた企業様の事例をご紹介します".to_string(),
                success_rate: 0.67,
                usage_count: 9,
            }],
            context_tags: vec!["価格交渉".to_string(), "反論対応".to_string()],
        },
    ]
}

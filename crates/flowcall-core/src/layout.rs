//! Flow graph derived from the block sequence and the pending suggestions.

use flowcall_schema::{ScriptSuggestion, Speaker, TalkBlock};
use serde::{Deserialize, Serialize};

pub const NODE_WIDTH: f64 = 240.0;
pub const NODE_HEIGHT: f64 = 120.0;
pub const HORIZONTAL_SPACING: f64 = 140.0;
pub const VERTICAL_SPACING: f64 = 80.0;
pub const SUGGESTION_OFFSET_X: f64 = 160.0;
pub const SUGGESTION_SPACING_Y: f64 = 40.0;

pub const EMPTY_NODE_ID: &str = "empty";
pub const EMPTY_NODE_LABEL: &str = "最初の顧客発話を追加するとフローが生成されます";
const SUGGESTION_SPEAKER: &str = "候補";
const SYSTEM_SPEAKER: &str = "System";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FlowNodeKind {
    Conversation,
    Suggestion,
    System,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlowNode {
    pub id: String,
    pub kind: FlowNodeKind,
    pub position: Position,
    pub label: String,
    pub speaker: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<ScriptSuggestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    /// Edges into suggestion nodes are drawn dashed.
    pub dashed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FlowLayout {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
    /// Id of the most recent block's node, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_block_id: Option<String>,
}

impl FlowLayout {
    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Centre of the most recent block's node; `None` without blocks.
    pub fn focus(&self) -> Option<Position> {
        let node = self.node(self.latest_block_id.as_deref()?)?;
        Some(Position {
            x: node.position.x + NODE_WIDTH / 2.0,
            y: node.position.y + NODE_HEIGHT / 2.0,
        })
    }
}

fn lane_y(speaker: Speaker) -> f64 {
    match speaker {
        Speaker::Agent => 0.0,
        Speaker::Customer => NODE_HEIGHT + VERTICAL_SPACING,
    }
}

fn column_x(index: usize) -> f64 {
    index as f64 * (NODE_WIDTH + HORIZONTAL_SPACING)
}

/// Pure and deterministic: equal inputs give equal layouts.
pub fn derive_flow_layout(blocks: &[TalkBlock], suggestions: &[ScriptSuggestion]) -> FlowLayout {
    if blocks.is_empty() {
        return FlowLayout {
            nodes: vec![FlowNode {
                id: EMPTY_NODE_ID.to_string(),
                kind: FlowNodeKind::System,
                position: Position {
                    x: 60.0,
                    y: NODE_HEIGHT / 2.0,
                },
                label: EMPTY_NODE_LABEL.to_string(),
                speaker: SYSTEM_SPEAKER.to_string(),
                suggestion: None,
            }],
            edges: Vec::new(),
            latest_block_id: None,
        };
    }

    let mut nodes = Vec::with_capacity(blocks.len() + suggestions.len());
    let mut edges = Vec::with_capacity(blocks.len() + suggestions.len());

    for (index, block) in blocks.iter().enumerate() {
        nodes.push(FlowNode {
            id: block.id.clone(),
            kind: FlowNodeKind::Conversation,
            position: Position {
                x: column_x(index),
                y: lane_y(block.speaker),
            },
            label: block.text.clone(),
            speaker: block.speaker.label().to_string(),
            suggestion: None,
        });

        if let Some(previous) = index.checked_sub(1).map(|i| &blocks[i]) {
            edges.push(FlowEdge {
                id: format!("{}-{}", previous.id, block.id),
                source: previous.id.clone(),
                target: block.id.clone(),
                dashed: false,
            });
        }
    }

    let anchor = blocks
        .iter()
        .enumerate()
        .rev()
        .find(|(_, block)| block.speaker == Speaker::Customer);

    if let Some((anchor_index, anchor_block)) = anchor {
        let base_x = column_x(anchor_index + 1) + SUGGESTION_OFFSET_X;
        let anchor_y = lane_y(anchor_block.speaker);

        for (k, suggestion) in suggestions.iter().enumerate() {
            let node_id = format!("suggestion-{}", suggestion.id);
            nodes.push(FlowNode {
                id: node_id.clone(),
                kind: FlowNodeKind::Suggestion,
                position: Position {
                    x: base_x,
                    y: anchor_y + k as f64 * (NODE_HEIGHT + SUGGESTION_SPACING_Y),
                },
                label: suggestion.body.clone(),
                speaker: SUGGESTION_SPEAKER.to_string(),
                suggestion: Some(suggestion.clone()),
            });
            edges.push(FlowEdge {
                id: format!("{}-{}", anchor_block.id, node_id),
                source: anchor_block.id.clone(),
                target: node_id,
                dashed: true,
            });
        }
    }

    FlowLayout {
        nodes,
        edges,
        latest_block_id: blocks.last().map(|b| b.id.clone()),
    }
}

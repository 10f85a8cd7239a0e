//! Per-context chat history.
//!
//! Each conversation is keyed by an identifier the caller picks (a page,
//! a session, a user). Turns are only ever appended.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// Labels shown next to each role in the chat view.
const ROLE_LABELS: [(Role, &str); 2] = [(Role::User, "사용자"), (Role::Assistant, "LLM 모델")];

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn display_label(&self) -> &'static str {
        ROLE_LABELS
            .iter()
            .find(|(role, _)| role == self)
            .map(|(_, label)| *label)
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

/// Append-only, chronological list of turns.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<ConversationTurn>,
}

impl Conversation {
    /// Append a turn. Blank content is ignored.
    pub fn push(&mut self, role: Role, content: impl Into<String>) -> bool {
        let content = content.into();
        if content.trim().is_empty() {
            return false;
        }
        self.turns.push(ConversationTurn { role, content });
        true
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Conversations keyed by caller-supplied context id.
#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: RwLock<HashMap<String, Conversation>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, context_id: &str, role: Role, content: impl Into<String>) -> bool {
        let mut conversations = self.conversations.write();
        conversations
            .entry(context_id.to_string())
            .or_default()
            .push(role, content)
    }

    /// Snapshot of a conversation's turns; empty for unknown ids.
    pub fn turns(&self, context_id: &str) -> Vec<ConversationTurn> {
        self.conversations
            .read()
            .get(context_id)
            .map(|c| c.turns().to_vec())
            .unwrap_or_default()
    }
}

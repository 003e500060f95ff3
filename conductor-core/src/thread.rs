//! Conversation types for one multi-turn invocation. Messages serialize
//! directly into the chat-completions wire shape.

use serde::{Deserialize, Serialize};

use crate::tool::ToolCall;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A single message. `content` is null for pure tool-call assistant turns;
/// tool messages carry the id of the call they answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: Some(text.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: Some(text.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: Some(text.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant_tool_calls(content: Option<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content,
            tool_calls: Some(calls),
            tool_call_id: None,
        }
    }

    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
        }
    }
}

/// Ordered message list local to one multi-turn invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation {
    pub messages: Vec<ChatMessage>,
}

/// How many trailing messages survive a prune.
const PRUNE_KEEP_TAIL: usize = 8;

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The current-turn view: a copy with a synthetic user-role message
    /// carrying the external state, inserted directly before the last
    /// user message (appended when there is none). The persisted
    /// conversation is not touched.
    pub fn with_state_view(&self, state: &str) -> Vec<ChatMessage> {
        let mut view = self.messages.clone();
        let state_message = ChatMessage::user(state);
        match view.iter().rposition(|m| m.role == MessageRole::User) {
            Some(index) => view.insert(index, state_message),
            None => view.push(state_message),
        }
        view
    }

    /// Collapse intermediate messages once the conversation grows past
    /// `threshold`: keep the system message, the first user message, and
    /// the tail. Below the threshold this is a no-op.
    pub fn prune(&mut self, threshold: usize) {
        if self.messages.len() <= threshold {
            return;
        }

        let mut kept: Vec<ChatMessage> = Vec::new();
        if let Some(system) = self
            .messages
            .iter()
            .find(|m| m.role == MessageRole::System)
        {
            kept.push(system.clone());
        }
        if let Some(first_user) = self.messages.iter().find(|m| m.role == MessageRole::User) {
            kept.push(first_user.clone());
        }

        let tail_start = self.messages.len().saturating_sub(PRUNE_KEEP_TAIL);
        kept.extend(self.messages[tail_start..].iter().cloned());
        self.messages = kept;
    }

    /// JSON transcript handed to stop actions as their `messages` argument.
    pub fn serialize_transcript(&self) -> String {
        serde_json::to_string(&self.messages).unwrap_or_else(|_| "[]".to_string())
    }
}

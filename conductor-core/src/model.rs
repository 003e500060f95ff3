//! The model-client seam between the engine and whatever speaks to
//! providers. The engine only ever sees this trait.

use async_trait::async_trait;

use crate::action::Intelligence;
use crate::error::ConductorError;
use crate::schema::Schema;
use crate::thread::ChatMessage;
use crate::tool::{ToolCall, ToolDefinition};

/// What the model may answer through on a given call.
#[derive(Debug, Clone)]
pub enum ToolSurface {
    /// A compiled tool list; the model must pick one.
    Tools(Vec<ToolDefinition>),
    /// A single response schema, wrapped as one `respond` tool.
    Schema(Schema),
    /// Plain text, used for meta-prompt resolution.
    None,
}

/// One assistant turn as the engine consumes it.
#[derive(Debug, Clone, Default)]
pub struct AssistantTurn {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl AssistantTurn {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_call(call: ToolCall) -> Self {
        Self {
            content: None,
            tool_calls: vec![call],
        }
    }
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Produce the next assistant turn for `messages`, answering through
    /// `surface`, starting at the `intelligence` tier.
    async fn generate(
        &self,
        messages: &[ChatMessage],
        surface: ToolSurface,
        intelligence: Intelligence,
    ) -> Result<AssistantTurn, ConductorError>;
}

/// Scripted model client for tests: returns queued turns in order, then a
/// fixed fallback. Records every request's message view and surface.
pub struct ScriptedModel {
    turns: std::sync::Mutex<Vec<Result<AssistantTurn, ConductorError>>>,
    calls: std::sync::Mutex<Vec<RecordedCall>>,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<ChatMessage>,
    pub tool_names: Vec<String>,
    pub intelligence: Intelligence,
}

impl ScriptedModel {
    pub fn new(turns: Vec<AssistantTurn>) -> Self {
        Self {
            turns: std::sync::Mutex::new(turns.into_iter().map(Ok).collect()),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn with_results(turns: Vec<Result<AssistantTurn, ConductorError>>) -> Self {
        Self {
            turns: std::sync::Mutex::new(turns),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        surface: ToolSurface,
        intelligence: Intelligence,
    ) -> Result<AssistantTurn, ConductorError> {
        let tool_names = match &surface {
            ToolSurface::Tools(tools) => tools.iter().map(|t| t.name.clone()).collect(),
            ToolSurface::Schema(_) => vec!["respond".to_string()],
            ToolSurface::None => Vec::new(),
        };
        self.calls.lock().unwrap().push(RecordedCall {
            messages: messages.to_vec(),
            tool_names,
            intelligence,
        });

        let mut turns = self.turns.lock().unwrap();
        if turns.is_empty() {
            Ok(AssistantTurn::text("script exhausted"))
        } else {
            turns.remove(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_model_replays_in_order() {
        let model = ScriptedModel::new(vec![
            AssistantTurn::text("first"),
            AssistantTurn::text("second"),
        ]);
        let turn = model
            .generate(&[ChatMessage::user("hi")], ToolSurface::None, Intelligence::Low)
            .await
            .unwrap();
        assert_eq!(turn.content.as_deref(), Some("first"));

        let turn = model
            .generate(&[], ToolSurface::None, Intelligence::Low)
            .await
            .unwrap();
        assert_eq!(turn.content.as_deref(), Some("second"));
        assert_eq!(model.call_count(), 2);
    }
}

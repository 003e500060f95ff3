//! The strict chat-completions subset the cascade speaks.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use conductor_core::thread::ChatMessage;
use conductor_core::tool::{ToolCall, ToolDefinition};

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<&'a [WireTool]>,
    /// `"required"` unless the entry negotiated the field away.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<&'static str>,
    /// OpenRouter-style routing hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderHint<'a>>,
    /// Only set by the verification probe.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ProviderHint<'a> {
    pub only: Vec<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WireTool {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: WireFunction,
}

#[derive(Debug, Clone, Serialize)]
pub struct WireFunction {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl From<&ToolDefinition> for WireTool {
    fn from(definition: &ToolDefinition) -> Self {
        Self {
            kind: "function",
            function: WireFunction {
                name: definition.name.clone(),
                description: definition.description.clone(),
                parameters: definition.parameters.clone(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: WireAssistantMessage,
}

#[derive(Debug, Deserialize)]
pub struct WireAssistantMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
}

/// Error envelope most providers return on non-2xx.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<Value>,
}

/// Best-effort extraction of a provider's error message from a raw body.
pub fn extract_error_detail(body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(detail) = envelope.error {
            if let Some(message) = detail.message {
                return message;
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no response body".to_string()
    } else {
        trimmed.chars().take(500).collect()
    }
}

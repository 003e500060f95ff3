//! Model verification: a one-token probe that also negotiates whether the
//! provider accepts `tool_choice: required`.

use serde::Serialize;

use conductor_core::error::{ConductorError, ProviderError};
use conductor_core::schema::Schema;
use conductor_core::thread::ChatMessage;
use conductor_core::tool::ToolDefinition;

use crate::client::CascadeClient;
use crate::wire::WireTool;

#[derive(Debug, Clone, Serialize)]
pub struct VerifyOutcome {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when the model only works with `tool_choice` omitted; cascade
    /// entries for it should carry the `no_tool_choice` flag.
    pub no_tool_choice: bool,
}

impl CascadeClient {
    /// Probe `model` on `endpoint_id` with a trivial `test` tool. If the
    /// provider rejects the `tool_choice` field, retry without it; a
    /// successful retry reports `no_tool_choice: true`.
    pub async fn verify_model(
        &self,
        endpoint_id: &str,
        model: &str,
        provider_hints: &[String],
    ) -> VerifyOutcome {
        let hints: Vec<&str> = provider_hints.iter().map(String::as_str).collect();
        let messages = [ChatMessage::user("Call the test tool.")];
        let tools = [probe_tool()];

        match self
            .send_chat(endpoint_id, model, &hints, &messages, Some(&tools), Some("required"), Some(1))
            .await
        {
            Ok(_) => VerifyOutcome {
                valid: true,
                error: None,
                no_tool_choice: false,
            },
            Err(err) if rejects_tool_choice(&err) => {
                match self
                    .send_chat(endpoint_id, model, &hints, &messages, Some(&tools), None, Some(1))
                    .await
                {
                    Ok(_) => VerifyOutcome {
                        valid: true,
                        error: None,
                        no_tool_choice: true,
                    },
                    Err(retry_err) => VerifyOutcome {
                        valid: false,
                        error: Some(retry_err.to_string()),
                        no_tool_choice: false,
                    },
                }
            }
            Err(err) => VerifyOutcome {
                valid: false,
                error: Some(err.to_string()),
                no_tool_choice: false,
            },
        }
    }
}

fn probe_tool() -> WireTool {
    WireTool::from(&ToolDefinition {
        name: "test".to_string(),
        description: "Verification probe tool.".to_string(),
        parameters: Schema::object().to_json(),
    })
}

/// Whether a provider error message means "this model rejects the
/// tool_choice field" rather than a genuine failure.
fn rejects_tool_choice(err: &ConductorError) -> bool {
    let detail = match err {
        ConductorError::Provider(ProviderError::Http { detail, .. }) => detail,
        _ => return false,
    };
    let lowered = detail.to_lowercase();
    lowered.contains("tool_choice")
        || lowered.contains("tool choice")
        || (lowered.contains("tool") && lowered.contains("not supported"))
}

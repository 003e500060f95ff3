//! The multi-turn tool loop: drives the model through repeated tool calls
//! until the stop action fires or the iteration budget runs out.

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use conductor_core::action::{Intelligence, ToolChoice};
use conductor_core::error::ConductorError;
use conductor_core::model::ToolSurface;
use conductor_core::thread::{ChatMessage, Conversation};
use conductor_core::tool::ToolCall;

use crate::executor::Executor;
use crate::prompt;

/// Conversation length past which intermediate messages are collapsed.
const PRUNE_THRESHOLD: usize = 12;

const TOOL_REMINDER: &str = "Respond by calling one of the available tools.";
const EXHAUSTED_RESPONSE: &str = "Unable to complete the task within the allotted attempts.";

/// Result of dispatching one tool call from an assistant message.
enum Dispatch {
    /// Tool answered; its response message is already appended.
    Continue,
    /// Tool failed; the failure is appended and the remaining calls in
    /// this assistant message must not run.
    Abort,
    /// The stop action fired.
    Stop(Value),
}

pub(crate) async fn run_tool_loop(
    executor: &Executor,
    system_prompt: String,
    user_message: String,
    choice: &ToolChoice,
    intelligence: Intelligence,
) -> Result<Value, ConductorError> {
    let tools = prompt::compile_tools(&executor.registry, &choice.available_actions)?;

    let mut conversation = Conversation::new();
    conversation.push(ChatMessage::system(system_prompt));
    conversation.push(ChatMessage::user(user_message));

    for iteration in 1..=choice.max_iterations {
        debug!(iteration, max = choice.max_iterations, "tool loop turn");

        let state = executor.external.format_for_chat().await;
        let view = conversation.with_state_view(&external_state_text(&state));
        let turn = executor
            .model
            .generate(&view, ToolSurface::Tools(tools.clone()), intelligence)
            .await?;

        if !turn.has_tool_calls() {
            if let Some(text) = turn.content.as_deref() {
                if !text.trim().is_empty() {
                    conversation.push(ChatMessage::assistant_text(text));
                }
            }
            conversation.push(ChatMessage::user(TOOL_REMINDER));
            continue;
        }

        conversation.push(ChatMessage::assistant_tool_calls(
            turn.content.clone(),
            turn.tool_calls.clone(),
        ));

        for call in &turn.tool_calls {
            match dispatch_tool_call(executor, &mut conversation, call, choice).await {
                Dispatch::Continue => {}
                Dispatch::Abort => break,
                Dispatch::Stop(value) => {
                    info!(iteration, "stop action fired");
                    return Ok(unwrap_stop(value));
                }
            }
        }

        conversation.prune(PRUNE_THRESHOLD);
    }

    info!(max = choice.max_iterations, "iteration budget exhausted, forcing stop action");
    let value = synthesize_stop(executor, &mut conversation, choice).await?;
    Ok(unwrap_stop(value))
}

/// Execute one of the model's tool calls. Failures become tool-response
/// messages so the model can correct itself next turn; only the stop
/// action escapes the loop.
async fn dispatch_tool_call(
    executor: &Executor,
    conversation: &mut Conversation,
    call: &ToolCall,
    choice: &ToolChoice,
) -> Dispatch {
    let name = &call.function.name;

    let args = match call.parse_arguments() {
        Ok(args) => args,
        Err(err) => {
            warn!(tool = %name, error = %err, "tool call arguments are not valid JSON");
            push_tool_error(
                conversation,
                &call.id,
                json!({"error": format!("arguments are not valid JSON: {err}")}),
            );
            return Dispatch::Abort;
        }
    };

    let action = match executor.registry.get(name) {
        Ok(action) => action,
        Err(_) => {
            warn!(tool = %name, "model called an unknown action");
            push_tool_error(
                conversation,
                &call.id,
                json!({"error": format!("unknown action '{name}'")}),
            );
            return Dispatch::Abort;
        }
    };

    let mut params = action.input_schema.project(&args);
    let is_stop = *name == choice.stop_action;
    if is_stop {
        params.as_object_mut().expect("projection yields an object").insert(
            "messages".into(),
            Value::String(conversation.serialize_transcript()),
        );
    }

    let outcome =
        tokio::time::timeout(executor.step_timeout, executor.execute(name, params)).await;

    match outcome {
        Err(_) => {
            warn!(tool = %name, "tool call timed out");
            push_tool_error(
                conversation,
                &call.id,
                json!({"error": format!("'{name}' timed out after {:?}", executor.step_timeout)}),
            );
            Dispatch::Abort
        }
        Ok(Err(ConductorError::Validation { reasons })) => {
            push_tool_error(
                conversation,
                &call.id,
                json!({"error": "Validation failed", "details": reasons}),
            );
            Dispatch::Abort
        }
        Ok(Err(err)) => {
            warn!(tool = %name, error = %err, "tool call failed");
            push_tool_error(conversation, &call.id, json!({"error": err.to_string()}));
            Dispatch::Abort
        }
        Ok(Ok(result)) => {
            if is_stop {
                return Dispatch::Stop(result);
            }
            let content =
                serde_json::to_string(&result).unwrap_or_else(|_| result.to_string());
            conversation.push(ChatMessage::tool(&call.id, content));
            Dispatch::Continue
        }
    }
}

fn push_tool_error(conversation: &mut Conversation, call_id: &str, body: Value) {
    conversation.push(ChatMessage::tool(call_id, body.to_string()));
}

/// Budget exhausted: make the model's choice for it. One synthetic stop
/// call carrying a canned response and the serialized conversation.
async fn synthesize_stop(
    executor: &Executor,
    conversation: &mut Conversation,
    choice: &ToolChoice,
) -> Result<Value, ConductorError> {
    let canned = json!({"response": EXHAUSTED_RESPONSE, "success": false});
    let call = ToolCall::new(
        format!("call-{}", uuid::Uuid::new_v4()),
        &choice.stop_action,
        &canned,
    );
    conversation.push(ChatMessage::assistant_tool_calls(None, vec![call]));

    let action = executor.registry.get(&choice.stop_action)?;
    let mut params = action.input_schema.project(&canned);
    params.as_object_mut().expect("projection yields an object").insert(
        "messages".into(),
        Value::String(conversation.serialize_transcript()),
    );

    tokio::time::timeout(
        executor.step_timeout,
        executor.execute(&choice.stop_action, params),
    )
    .await
    .map_err(|_| {
        ConductorError::timeout(
            format!("synthetic stop action '{}'", choice.stop_action),
            executor.step_timeout,
        )
    })?
}

/// What the caller observes from a stop action: the string itself, else
/// the result's `message` field, else `response`, else its serialization.
fn unwrap_stop(result: Value) -> Value {
    if result.is_string() {
        return result;
    }
    if let Some(map) = result.as_object() {
        for field in ["message", "response"] {
            if let Some(Value::String(text)) = map.get(field) {
                return Value::String(text.clone());
            }
        }
    }
    Value::String(result.to_string())
}

pub(crate) fn external_state_text(state: &str) -> String {
    format!("Current external state:\n{state}")
}

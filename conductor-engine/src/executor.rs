//! The action executor: validates parameters, walks the step list, and
//! dispatches each step variant.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;
use tracing::{debug, info};

use conductor_core::action::{Action, LlmOutput, LlmStep, Step};
use conductor_core::error::{ConductorError, ProviderError};
use conductor_core::model::{ModelClient, ToolSurface};
use conductor_core::thread::{ChatMessage, Conversation};

use crate::external::{ExternalState, NullExternalState};
use crate::prompt;
use crate::registry::ActionRegistry;
use crate::template;
use crate::turn;

const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(20);

pub struct Executor {
    pub(crate) registry: Arc<ActionRegistry>,
    pub(crate) model: Arc<dyn ModelClient>,
    pub(crate) external: Arc<dyn ExternalState>,
    pub(crate) step_timeout: Duration,
}

impl Executor {
    pub fn new(registry: Arc<ActionRegistry>, model: Arc<dyn ModelClient>) -> Self {
        Self {
            registry,
            model,
            external: Arc::new(NullExternalState),
            step_timeout: DEFAULT_STEP_TIMEOUT,
        }
    }

    pub fn with_external(mut self, external: Arc<dyn ExternalState>) -> Self {
        self.external = external;
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    /// Execute one action to completion: validate, then fold the step
    /// list, threading each step's result into the next.
    pub fn execute<'a>(
        &'a self,
        action_name: &'a str,
        params: Value,
    ) -> BoxFuture<'a, Result<Value, ConductorError>> {
        Box::pin(async move {
            let action = self.registry.get(action_name)?;
            action.input_schema.validate(&params)?;
            info!(action = action_name, steps = action.steps.len(), "executing action");

            let mut result: Option<Value> = None;
            for (index, step) in action.steps.iter().enumerate() {
                debug!(action = action_name, step = index, "running step");
                let value = self
                    .execute_step(action, step, &params, result.take())
                    .await
                    .map_err(|err| err.at_step(index))?;
                result = Some(value);
            }
            Ok(result.unwrap_or(Value::Null))
        })
    }

    async fn execute_step(
        &self,
        action: &Action,
        step: &Step,
        params: &Value,
        prev: Option<Value>,
    ) -> Result<Value, ConductorError> {
        match step {
            Step::Procedure(body) => {
                let fut = body(params.clone(), prev);
                self.bounded(&action.name, fut).await
            }
            Step::SubAction { action: target, map } => {
                let sub_params = match map {
                    Some(map) => map(params, prev.as_ref()),
                    None => params.clone(),
                };
                let fut = self.execute(target, sub_params);
                self.bounded(&action.name, fut).await
            }
            Step::Llm(llm) => match &llm.output {
                LlmOutput::Schema(schema) => {
                    let fut = self.schema_round_trip(llm, schema, params, prev.as_ref());
                    self.bounded(&action.name, fut).await
                }
                // The loop budgets itself per tool call and per model call;
                // a single step timer would strangle it.
                LlmOutput::ToolChoice(choice) => {
                    let state = self.external.format_for_chat().await;
                    let context = decorated_context(self, params, prev.as_ref(), choice, &state)?;
                    let system_prompt = prompt::resolve_system_prompt(
                        self.model.as_ref(),
                        &llm.system_prompt,
                        &context,
                    )
                    .await?;
                    let user_message = template::render(&llm.message, &context)?;
                    turn::run_tool_loop(self, system_prompt, user_message, choice, llm.intelligence)
                        .await
                }
            },
        }
    }

    /// Single round-trip LLM step: the model answers through a `respond`
    /// tool shaped by the step's output schema.
    async fn schema_round_trip(
        &self,
        llm: &LlmStep,
        schema: &conductor_core::schema::Schema,
        params: &Value,
        prev: Option<&Value>,
    ) -> Result<Value, ConductorError> {
        let context = merge_context(params, prev);
        let system_prompt =
            prompt::resolve_system_prompt(self.model.as_ref(), &llm.system_prompt, &context)
                .await?;
        let user_message = template::render(&llm.message, &context)?;

        let mut conversation = Conversation::new();
        conversation.push(ChatMessage::system(system_prompt));
        conversation.push(ChatMessage::user(user_message));
        let state = self.external.format_for_chat().await;
        let view = conversation.with_state_view(&turn::external_state_text(&state));

        let reply = self
            .model
            .generate(&view, ToolSurface::Schema(schema.clone()), llm.intelligence)
            .await?;

        let call = reply.tool_calls.first().ok_or_else(|| {
            ConductorError::Provider(ProviderError::InvalidResponse {
                reason: "model did not answer through the respond tool".to_string(),
            })
        })?;
        call.parse_arguments().map_err(|err| ConductorError::Parse {
            reason: err.to_string(),
        })
    }

    async fn bounded(
        &self,
        action_name: &str,
        fut: impl std::future::Future<Output = Result<Value, ConductorError>>,
    ) -> Result<Value, ConductorError> {
        tokio::time::timeout(self.step_timeout, fut)
            .await
            .map_err(|_| {
                ConductorError::timeout(format!("step of '{action_name}'"), self.step_timeout)
            })?
    }
}

/// Template context for a step: the action's parameters merged with the
/// previous step's result fields.
pub(crate) fn merge_context(params: &Value, prev: Option<&Value>) -> Value {
    let mut merged = params.as_object().cloned().unwrap_or_default();
    if let Some(Value::Object(fields)) = prev {
        for (key, value) in fields {
            merged.insert(key.clone(), value.clone());
        }
    }
    Value::Object(merged)
}

/// The tool-choice context additionally carries the decoration variables
/// and the collaborator state.
fn decorated_context(
    executor: &Executor,
    params: &Value,
    prev: Option<&Value>,
    choice: &conductor_core::action::ToolChoice,
    state: &str,
) -> Result<Value, ConductorError> {
    let mut context = merge_context(params, prev);
    let map = context.as_object_mut().expect("merged context is an object");
    map.insert(
        "available_tools".into(),
        Value::String(prompt::available_tools_text(&executor.registry, choice)?),
    );
    map.insert(
        "decision_guide".into(),
        Value::String(prompt::decision_guide_text(
            &executor.registry,
            &choice.available_actions,
        )?),
    );
    map.insert("browser_state".into(), Value::String(state.to_string()));
    // Stop actions receive the live transcript through their params; for
    // everything else `messages` defaults to the empty transcript so
    // templates referencing it always resolve.
    map.entry("messages".to_string())
        .or_insert_with(|| Value::String(Conversation::new().serialize_transcript()));
    Ok(context)
}

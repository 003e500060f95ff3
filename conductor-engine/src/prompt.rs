//! Prompt assembly: tool-surface compilation, the decoration variables
//! injected before tool-choice steps, and meta-prompt resolution.

use futures::future::BoxFuture;
use serde_json::{json, Value};

use conductor_core::action::{SystemPromptSpec, ToolChoice};
use conductor_core::error::{ConductorError, ProviderError};
use conductor_core::model::{ModelClient, ToolSurface};
use conductor_core::thread::ChatMessage;
use conductor_core::tool::ToolDefinition;

use crate::registry::ActionRegistry;
use crate::template;

/// Bound on meta-prompt nesting; deeper chains are configuration mistakes.
const META_PROMPT_DEPTH_CAP: usize = 4;

/// Compile the available actions into the tool list the model sees. Every
/// tool's parameters are the action's input schema augmented with the
/// mandatory `justification` and `instructions` fields.
pub fn compile_tools(
    registry: &ActionRegistry,
    available: &[String],
) -> Result<Vec<ToolDefinition>, ConductorError> {
    available
        .iter()
        .map(|name| {
            let action = registry.get(name)?;
            Ok(ToolDefinition {
                name: action.name.clone(),
                description: action.description.clone(),
                parameters: augment_parameters(action.input_schema.to_json()),
            })
        })
        .collect()
}

fn augment_parameters(mut parameters: Value) -> Value {
    if let Some(properties) = parameters
        .get_mut("properties")
        .and_then(Value::as_object_mut)
    {
        properties.insert(
            "justification".into(),
            json!({"type": "string", "description": "Why this tool serves the user's request."}),
        );
        properties.insert(
            "instructions".into(),
            json!({"type": "string", "description": "What this call should accomplish."}),
        );
    }
    if let Some(required) = parameters.get_mut("required").and_then(Value::as_array_mut) {
        for field in ["justification", "instructions"] {
            if !required.iter().any(|v| v == field) {
                required.push(Value::String(field.into()));
            }
        }
    }
    parameters
}

/// The numbered tool listing injected as `available_tools`.
pub fn available_tools_text(
    registry: &ActionRegistry,
    choice: &ToolChoice,
) -> Result<String, ConductorError> {
    let mut lines = Vec::new();
    for (index, name) in choice.available_actions.iter().enumerate() {
        let action = registry.get(name)?;
        let stop_marker = if *name == choice.stop_action {
            " [STOP]"
        } else {
            ""
        };
        lines.push(format!(
            "{}. {}{}: {}",
            index + 1,
            action.name,
            stop_marker,
            action.description
        ));
        if !action.input_schema.required.is_empty() {
            lines.push(format!(
                "   Requires: {}",
                action.input_schema.required.join(", ")
            ));
        }
    }
    Ok(lines.join("\n"))
}

/// The example-to-action mapping injected as `decision_guide`.
pub fn decision_guide_text(
    registry: &ActionRegistry,
    available: &[String],
) -> Result<String, ConductorError> {
    let mut lines = Vec::new();
    for name in available {
        let action = registry.get(name)?;
        for example in &action.examples {
            lines.push(format!("- \"{example}\" → {}", action.name));
        }
    }
    Ok(lines.join("\n"))
}

/// Resolve a system prompt spec to a literal string, rendering templates
/// against `context` and driving the model for generated prompts. The
/// recursion terminates at a literal or at the depth cap.
pub async fn resolve_system_prompt(
    model: &dyn ModelClient,
    spec: &SystemPromptSpec,
    context: &Value,
) -> Result<String, ConductorError> {
    resolve_at_depth(model, spec, context, 0).await
}

fn resolve_at_depth<'a>(
    model: &'a dyn ModelClient,
    spec: &'a SystemPromptSpec,
    context: &'a Value,
    depth: usize,
) -> BoxFuture<'a, Result<String, ConductorError>> {
    Box::pin(async move {
        match spec {
            SystemPromptSpec::Literal(text) => template::render(text, context),
            SystemPromptSpec::Generated(meta) => {
                if depth >= META_PROMPT_DEPTH_CAP {
                    return Err(ConductorError::Template {
                        reason: format!(
                            "meta-prompt nesting exceeds the depth cap of {META_PROMPT_DEPTH_CAP}"
                        ),
                    });
                }
                let system =
                    resolve_at_depth(model, &meta.system_prompt, context, depth + 1).await?;
                let message = template::render(&meta.message, context)?;
                let messages = [ChatMessage::system(system), ChatMessage::user(message)];
                let turn = model
                    .generate(&messages, ToolSurface::None, meta.intelligence)
                    .await?;
                match turn.content {
                    Some(text) if !text.trim().is_empty() => Ok(text),
                    _ => Err(ConductorError::Provider(ProviderError::InvalidResponse {
                        reason: "meta-prompt call produced no text".to_string(),
                    })),
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::action::{Action, Intelligence, MetaPrompt, Step};
    use conductor_core::model::{AssistantTurn, ScriptedModel};
    use conductor_core::schema::{Property, Schema};

    fn echo(params: Value, _prev: Option<Value>) -> BoxFuture<'static, Result<Value, ConductorError>> {
        Box::pin(async move { Ok(params) })
    }

    fn registry() -> ActionRegistry {
        ActionRegistry::build(vec![
            Action {
                name: "chat".into(),
                description: "Answer the user directly.".into(),
                examples: vec!["say hi".into(), "thanks!".into()],
                input_schema: Schema::object()
                    .property("response", Property::string("the answer"))
                    .require("response"),
                steps: vec![Step::procedure(echo)],
            },
            Action {
                name: "ping".into(),
                description: "Health check.".into(),
                examples: vec!["is it up?".into()],
                input_schema: Schema::object(),
                steps: vec![Step::procedure(echo)],
            },
        ])
        .unwrap()
    }

    #[test]
    fn compiled_tools_carry_mandatory_fields() {
        let registry = registry();
        let tools = compile_tools(&registry, &["chat".into()]).unwrap();
        assert_eq!(tools.len(), 1);
        let parameters = &tools[0].parameters;
        assert_eq!(parameters["properties"]["justification"]["type"], "string");
        assert_eq!(parameters["properties"]["instructions"]["type"], "string");
        let required: Vec<&str> = parameters["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert!(required.contains(&"response"));
        assert!(required.contains(&"justification"));
        assert!(required.contains(&"instructions"));
    }

    #[test]
    fn available_tools_marks_the_stop_action() {
        let registry = registry();
        let choice = ToolChoice {
            available_actions: vec!["chat".into(), "ping".into()],
            stop_action: "chat".into(),
            max_iterations: 3,
        };
        let text = available_tools_text(&registry, &choice).unwrap();
        assert!(text.contains("1. chat [STOP]: Answer the user directly."));
        assert!(text.contains("   Requires: response"));
        assert!(text.contains("2. ping: Health check."));
        assert!(!text.contains("ping [STOP]"));
    }

    #[test]
    fn decision_guide_gathers_examples() {
        let registry = registry();
        let text =
            decision_guide_text(&registry, &["chat".into(), "ping".into()]).unwrap();
        assert!(text.contains("- \"say hi\" → chat"));
        assert!(text.contains("- \"is it up?\" → ping"));
    }

    #[tokio::test]
    async fn literal_prompts_render_without_model_calls() {
        let model = ScriptedModel::new(vec![]);
        let spec = SystemPromptSpec::literal("You serve {{user}}.");
        let prompt = resolve_system_prompt(&model, &spec, &json!({"user": "ada"}))
            .await
            .unwrap();
        assert_eq!(prompt, "You serve ada.");
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn generated_prompts_call_the_model_once_per_level() {
        let model = ScriptedModel::new(vec![AssistantTurn::text("Be terse and precise.")]);
        let spec = SystemPromptSpec::generated(MetaPrompt {
            system_prompt: SystemPromptSpec::literal("You write system prompts."),
            message: "Write a prompt for task: {{task}}".into(),
            intelligence: Intelligence::Low,
        });
        let prompt = resolve_system_prompt(&model, &spec, &json!({"task": "triage"}))
            .await
            .unwrap();
        assert_eq!(prompt, "Be terse and precise.");
        assert_eq!(model.call_count(), 1);

        let call = &model.recorded_calls()[0];
        assert!(call.tool_names.is_empty());
        assert_eq!(
            call.messages[1].content.as_deref(),
            Some("Write a prompt for task: triage")
        );
    }

    #[tokio::test]
    async fn nesting_beyond_the_cap_errors() {
        let model = ScriptedModel::new(vec![]);
        let mut spec = SystemPromptSpec::literal("base");
        for _ in 0..6 {
            spec = SystemPromptSpec::generated(MetaPrompt {
                system_prompt: spec,
                message: "deeper".into(),
                intelligence: Intelligence::Low,
            });
        }
        let err = resolve_system_prompt(&model, &spec, &json!({}))
            .await
            .expect_err("too deep");
        assert!(err.to_string().contains("depth cap"));
    }
}

//! End-to-end executions against a scripted model: a router action that
//! chooses between a stop action and worker actions, the way a deployed
//! registry is wired.

use std::sync::Arc;

use serde_json::{json, Value};

use conductor_core::action::{
    Action, Intelligence, LlmOutput, LlmStep, Step, SystemPromptSpec, ToolChoice,
};
use conductor_core::model::{AssistantTurn, ScriptedModel};
use conductor_core::schema::{Property, Schema};
use conductor_core::tool::ToolCall;
use conductor_engine::{ActionRegistry, Executor};

fn chat() -> Action {
    Action {
        name: "chat".into(),
        description: "Answer the user directly and finish the task.".into(),
        examples: vec!["hello".into(), "what can you do?".into()],
        input_schema: Schema::object()
            .property("response", Property::string("the final answer"))
            .property("success", Property::boolean("whether the task succeeded"))
            .require("response"),
        steps: vec![Step::procedure(|params, _| {
            Box::pin(async move { Ok(params) })
        })],
    }
}

fn ping() -> Action {
    Action {
        name: "ping".into(),
        description: "Check that the backing service responds.".into(),
        examples: vec!["is the server up?".into()],
        input_schema: Schema::object(),
        steps: vec![Step::procedure(|_, _| {
            Box::pin(async move { Ok(json!({"pong": true})) })
        })],
    }
}

fn fill() -> Action {
    Action {
        name: "fill".into(),
        description: "Type text into a form element.".into(),
        examples: vec!["enter my name".into()],
        input_schema: Schema::object()
            .property("element_id", Property::number("numeric element id"))
            .property("text", Property::string("text to enter"))
            .require("element_id"),
        steps: vec![Step::procedure(|params, _| {
            Box::pin(async move { Ok(json!({"filled": params["element_id"]})) })
        })],
    }
}

fn router(max_iterations: u32) -> Action {
    Action {
        name: "router".into(),
        description: "Choose the right tool for the user's request.".into(),
        examples: vec![],
        input_schema: Schema::object()
            .property("user_message", Property::string("the user's utterance"))
            .require("user_message"),
        steps: vec![Step::Llm(LlmStep {
            system_prompt: SystemPromptSpec::literal(
                "You orchestrate tools.\n\nTools:\n{{available_tools}}\n\nGuide:\n{{decision_guide}}",
            ),
            message: "{{user_message}}".into(),
            intelligence: Intelligence::High,
            output: LlmOutput::ToolChoice(ToolChoice {
                available_actions: vec!["chat".into(), "ping".into(), "fill".into()],
                stop_action: "chat".into(),
                max_iterations,
            }),
        })],
    }
}

fn executor(model: Arc<ScriptedModel>, max_iterations: u32) -> Executor {
    let registry =
        ActionRegistry::build(vec![chat(), ping(), fill(), router(max_iterations)]).unwrap();
    Executor::new(Arc::new(registry), model)
}

fn tool_turn(id: &str, name: &str, args: Value) -> AssistantTurn {
    AssistantTurn::tool_call(ToolCall::new(id, name, &args))
}

fn chat_turn(response: &str) -> AssistantTurn {
    tool_turn(
        "call-chat",
        "chat",
        json!({
            "response": response,
            "success": true,
            "justification": "task is done",
            "instructions": "reply to the user",
        }),
    )
}

#[tokio::test]
async fn plain_response_returns_after_one_model_call() {
    let model = Arc::new(ScriptedModel::new(vec![chat_turn("hi")]));
    let executor = executor(model.clone(), 6);

    let result = executor
        .execute("router", json!({"user_message": "hi"}))
        .await
        .unwrap();

    assert_eq!(result, json!("hi"));
    assert_eq!(model.call_count(), 1);
}

#[tokio::test]
async fn one_hop_tool_runs_then_stops() {
    let model = Arc::new(ScriptedModel::new(vec![
        tool_turn(
            "call-ping",
            "ping",
            json!({"justification": "verify liveness", "instructions": "ping the service"}),
        ),
        chat_turn("done"),
    ]));
    let executor = executor(model.clone(), 6);

    let result = executor
        .execute("router", json!({"user_message": "check the server"}))
        .await
        .unwrap();

    assert_eq!(result, json!("done"));
    assert_eq!(model.call_count(), 2);

    // The second turn's view carries the paired ping result.
    let view = &model.recorded_calls()[1].messages;
    let tool_message = view
        .iter()
        .find(|m| m.tool_call_id.as_deref() == Some("call-ping"))
        .expect("ping result paired to its call");
    assert!(tool_message.content.as_deref().unwrap().contains("pong"));
}

#[tokio::test]
async fn validation_feedback_lets_the_model_correct_course() {
    let model = Arc::new(ScriptedModel::new(vec![
        tool_turn(
            "call-fill",
            "fill",
            json!({"element_id": "abc", "justification": "j", "instructions": "i"}),
        ),
        chat_turn("could not fill the field"),
    ]));
    let executor = executor(model.clone(), 6);

    let result = executor
        .execute("router", json!({"user_message": "fill in my name"}))
        .await
        .unwrap();

    assert_eq!(result, json!("could not fill the field"));
    assert_eq!(model.call_count(), 2);

    let view = &model.recorded_calls()[1].messages;
    let feedback = view
        .iter()
        .find(|m| m.tool_call_id.as_deref() == Some("call-fill"))
        .expect("validation feedback");
    let body: Value = serde_json::from_str(feedback.content.as_deref().unwrap()).unwrap();
    assert_eq!(body["error"], "Validation failed");
    let details = body["details"].as_array().unwrap();
    assert!(details
        .iter()
        .any(|d| d.as_str().unwrap().contains("element_id")));
}

#[tokio::test]
async fn exhausted_budget_forces_a_final_answer() {
    let model = Arc::new(ScriptedModel::new(vec![
        tool_turn("call-1", "ping", json!({})),
        tool_turn("call-2", "ping", json!({})),
        tool_turn("call-3", "ping", json!({})),
    ]));
    let executor = executor(model.clone(), 2);

    let result = executor
        .execute("router", json!({"user_message": "loop forever"}))
        .await
        .unwrap();

    assert_eq!(model.call_count(), 2);
    let text = result.as_str().expect("unwrapped string");
    assert!(text.starts_with("Unable to complete"));
}

#[tokio::test]
async fn top_level_validation_rejects_bad_input() {
    let model = Arc::new(ScriptedModel::new(vec![]));
    let executor = executor(model.clone(), 4);

    let err = executor
        .execute("router", json!({}))
        .await
        .expect_err("user_message is required");
    assert!(err.to_string().contains("missing required parameter 'user_message'"));
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn unknown_top_level_action_is_fatal() {
    let model = Arc::new(ScriptedModel::new(vec![]));
    let executor = executor(model, 4);

    let err = executor
        .execute("vanish", json!({}))
        .await
        .expect_err("not registered");
    assert!(err.to_string().contains("action not found: vanish"));
}

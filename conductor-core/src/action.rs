//! The declarative action model: immutable recipes of steps.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConductorError;
use crate::schema::Schema;

/// Coarse capability knob selecting the cascade starting tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Intelligence {
    High,
    Medium,
    Low,
}

impl Intelligence {
    /// The requested tier followed by every cheaper tier, in cascade order.
    pub fn tiers_from(self) -> &'static [Intelligence] {
        match self {
            Self::High => &[Self::High, Self::Medium, Self::Low],
            Self::Medium => &[Self::Medium, Self::Low],
            Self::Low => &[Self::Low],
        }
    }
}

impl fmt::Display for Intelligence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "HIGH"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::Low => write!(f, "LOW"),
        }
    }
}

/// Opaque procedural step body: `(params, prev_result)` to a JSON value.
pub type ProcedureFn = Arc<
    dyn Fn(Value, Option<Value>) -> BoxFuture<'static, Result<Value, ConductorError>>
        + Send
        + Sync,
>;

/// Optional parameter mapping for sub-action steps.
pub type ParamMapFn = Arc<dyn Fn(&Value, Option<&Value>) -> Value + Send + Sync>;

/// A named, declarative recipe of steps invoked as one unit.
#[derive(Clone)]
pub struct Action {
    pub name: String,
    pub description: String,
    /// Example utterances, rendered into the decision guide.
    pub examples: Vec<String>,
    pub input_schema: Schema,
    pub steps: Vec<Step>,
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("steps", &self.steps.len())
            .finish()
    }
}

/// One unit of work inside an action.
#[derive(Clone)]
pub enum Step {
    /// Deterministic procedure, opaque to the engine.
    Procedure(ProcedureFn),
    /// A model call, single round-trip or multi-turn.
    Llm(LlmStep),
    /// Recursive invocation of another registered action.
    SubAction {
        action: String,
        map: Option<ParamMapFn>,
    },
}

impl Step {
    pub fn procedure<F>(body: F) -> Self
    where
        F: Fn(Value, Option<Value>) -> BoxFuture<'static, Result<Value, ConductorError>>
            + Send
            + Sync
            + 'static,
    {
        Self::Procedure(Arc::new(body))
    }

    pub fn sub_action(action: impl Into<String>) -> Self {
        Self::SubAction {
            action: action.into(),
            map: None,
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Procedure(_) => write!(f, "Step::Procedure"),
            Self::Llm(step) => write!(f, "Step::Llm({})", step.intelligence),
            Self::SubAction { action, .. } => write!(f, "Step::SubAction({action})"),
        }
    }
}

/// A model-calling step. The output mode is exactly one of a response
/// schema or a tool-choice loop, enforced by the variant.
#[derive(Debug, Clone)]
pub struct LlmStep {
    pub system_prompt: SystemPromptSpec,
    /// User-message template, rendered against params and the previous
    /// step's result.
    pub message: String,
    pub intelligence: Intelligence,
    pub output: LlmOutput,
}

#[derive(Debug, Clone)]
pub enum LlmOutput {
    /// Single round-trip: the model answers through a `respond` tool shaped
    /// by this schema.
    Schema(Schema),
    /// Multi-turn loop over the listed actions until the stop action fires.
    ToolChoice(ToolChoice),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolChoice {
    pub available_actions: Vec<String>,
    pub stop_action: String,
    pub max_iterations: u32,
}

impl ToolChoice {
    pub fn validate(&self) -> Result<(), ConductorError> {
        let mut reasons = Vec::new();
        if self.max_iterations == 0 {
            reasons.push("max_iterations must be at least 1".to_string());
        }
        if !self.available_actions.contains(&self.stop_action) {
            reasons.push(format!(
                "stop action '{}' is not among the available actions",
                self.stop_action
            ));
        }
        if reasons.is_empty() {
            Ok(())
        } else {
            Err(ConductorError::validation(reasons))
        }
    }
}

/// A system prompt is either a literal template or itself generated by a
/// model call; the recursion terminates at a literal.
#[derive(Debug, Clone)]
pub enum SystemPromptSpec {
    Literal(String),
    Generated(Box<MetaPrompt>),
}

impl SystemPromptSpec {
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    pub fn generated(meta: MetaPrompt) -> Self {
        Self::Generated(Box::new(meta))
    }
}

/// Prompt generator for the meta-prompt facility.
#[derive(Debug, Clone)]
pub struct MetaPrompt {
    pub system_prompt: SystemPromptSpec,
    pub message: String,
    pub intelligence: Intelligence,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_cascade_downward() {
        assert_eq!(
            Intelligence::High.tiers_from(),
            &[Intelligence::High, Intelligence::Medium, Intelligence::Low]
        );
        assert_eq!(Intelligence::Low.tiers_from(), &[Intelligence::Low]);
    }

    #[test]
    fn tool_choice_requires_stop_membership() {
        let choice = ToolChoice {
            available_actions: vec!["search".into()],
            stop_action: "chat".into(),
            max_iterations: 3,
        };
        let err = choice.validate().expect_err("stop not in set");
        assert!(err.to_string().contains("stop action 'chat'"));
    }

    #[test]
    fn tool_choice_requires_positive_iterations() {
        let choice = ToolChoice {
            available_actions: vec!["chat".into()],
            stop_action: "chat".into(),
            max_iterations: 0,
        };
        assert!(choice.validate().is_err());
    }

    #[test]
    fn intelligence_serializes_uppercase() {
        let level: Intelligence = serde_json::from_str("\"MEDIUM\"").unwrap();
        assert_eq!(level, Intelligence::Medium);
        assert_eq!(serde_json::to_string(&level).unwrap(), "\"MEDIUM\"");
    }
}

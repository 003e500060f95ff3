//! Shared types for the conductor action orchestrator.
//!
//! Everything downstream crates agree on lives here: the declarative
//! action model, the JSON-Schema subset and its validator, conversation
//! and tool-call types, the error taxonomy, configuration, and the
//! `ModelClient` seam the engine drives models through.

pub mod action;
pub mod config;
pub mod error;
pub mod model;
pub mod schema;
pub mod thread;
pub mod tool;

pub use action::{
    Action, Intelligence, LlmOutput, LlmStep, MetaPrompt, ParamMapFn, ProcedureFn, Step,
    SystemPromptSpec, ToolChoice,
};
pub use config::{CascadeConfig, CascadeEntry, ConductorConfig, EndpointConfig, TimeoutConfig};
pub use error::{ConductorError, ProviderError};
pub use model::{AssistantTurn, ModelClient, ScriptedModel, ToolSurface};
pub use schema::{Property, PropertyKind, Schema};
pub use thread::{ChatMessage, Conversation, MessageRole};
pub use tool::{FunctionCall, ToolCall, ToolDefinition};

//! The conductor action engine.
//!
//! Executes declarative actions: validates their parameters, walks their
//! step lists, renders prompt templates, and drives the multi-turn tool
//! loop against an injected [`ModelClient`](conductor_core::ModelClient).
//! The engine carries no knowledge of specific actions; the action set is
//! data, registered at startup.

pub mod executor;
pub mod external;
pub mod prompt;
pub mod registry;
pub mod template;
mod turn;

pub use executor::Executor;
pub use external::{ExternalState, NullExternalState};
pub use registry::ActionRegistry;
pub use template::render;

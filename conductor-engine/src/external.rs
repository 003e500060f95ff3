//! The seam to out-of-core collaborators: the engine only ever asks them
//! to describe their current state for the model.

use async_trait::async_trait;

/// Any collaborator (a browser, a desktop session, …) the model needs to
/// reason about. The engine treats the returned string as opaque.
#[async_trait]
pub trait ExternalState: Send + Sync {
    async fn format_for_chat(&self) -> String;
}

/// Collaborator-free deployments and tests.
pub struct NullExternalState;

#[async_trait]
impl ExternalState for NullExternalState {
    async fn format_for_chat(&self) -> String {
        "(no external state)".to_string()
    }
}

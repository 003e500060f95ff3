use std::time::Duration;

/// Top-level error for everything the orchestrator core surfaces.
#[derive(Debug, thiserror::Error)]
pub enum ConductorError {
    /// Parameter shape mismatch. Inside a tool loop this is fed back to the
    /// model as a tool message rather than escalated.
    #[error("validation failed: {}", reasons.join("; "))]
    Validation { reasons: Vec<String> },

    #[error("action not found: {action}")]
    NotFound { action: String },

    #[error("{what} timed out after {elapsed:?}")]
    Timeout { what: String, elapsed: Duration },

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The model produced a tool call whose arguments are not valid JSON.
    #[error("tool call arguments are not valid JSON: {reason}")]
    Parse { reason: String },

    #[error("template error: {reason}")]
    Template { reason: String },

    #[error("config error: {0}")]
    Config(String),

    /// Step-index context attached when an error escapes an action.
    #[error("step {index} failed: {source}")]
    Step {
        index: usize,
        #[source]
        source: Box<ConductorError>,
    },
}

impl ConductorError {
    pub fn validation(reasons: Vec<String>) -> Self {
        Self::Validation { reasons }
    }

    pub fn not_found(action: impl Into<String>) -> Self {
        Self::NotFound {
            action: action.into(),
        }
    }

    pub fn timeout(what: impl Into<String>, elapsed: Duration) -> Self {
        Self::Timeout {
            what: what.into(),
            elapsed,
        }
    }

    pub fn at_step(self, index: usize) -> Self {
        match self {
            // Already annotated by a nested action; keep the innermost index.
            Self::Step { .. } => self,
            other => Self::Step {
                index,
                source: Box::new(other),
            },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("endpoint '{endpoint}' returned status {status}: {detail}")]
    Http {
        endpoint: String,
        status: u16,
        detail: String,
    },

    #[error("transport error against '{endpoint}': {reason}")]
    Transport { endpoint: String, reason: String },

    #[error("invalid model response: {reason}")]
    InvalidResponse { reason: String },

    #[error("unknown endpoint: {endpoint}")]
    UnknownEndpoint { endpoint: String },

    #[error("all cascade entries exhausted after {attempts} attempts")]
    CascadeExhausted { attempts: usize },
}

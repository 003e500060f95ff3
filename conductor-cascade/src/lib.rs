//! Model-cascade client for the conductor orchestrator.
//!
//! Speaks an OpenAI-compatible chat-completions subset to any number of
//! configured endpoints, walks the tiered cascade with self-damping
//! skip/back-off, and recovers through a best-health fallback ordering
//! when the primary pass locks itself out.

pub mod client;
pub mod endpoints;
pub mod health;
pub mod verify;
pub mod wire;

pub use client::CascadeClient;
pub use endpoints::EndpointResolver;
pub use health::{HealthStats, HealthStore, Metric, MetricStats};
pub use verify::VerifyOutcome;

//! The model-cascade client: walks (endpoint, model, provider) triples in
//! tier order, skipping recently-failing models, and falls back to a
//! best-health ordering when the primary pass is exhausted.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use conductor_core::action::Intelligence;
use conductor_core::config::{CascadeConfig, CascadeEntry, ConductorConfig};
use conductor_core::error::{ConductorError, ProviderError};
use conductor_core::model::{AssistantTurn, ModelClient, ToolSurface};
use conductor_core::schema::Schema;
use conductor_core::thread::ChatMessage;
use conductor_core::tool::ToolDefinition;

use crate::endpoints::EndpointResolver;
use crate::health::{HealthStore, Metric};
use crate::wire::{extract_error_detail, ChatRequest, ChatResponse, ProviderHint, WireTool};

pub struct CascadeClient {
    http: reqwest::Client,
    resolver: EndpointResolver,
    cascade: RwLock<CascadeConfig>,
    health: Arc<HealthStore>,
    llm_timeout: Duration,
}

impl CascadeClient {
    pub fn new(config: &ConductorConfig, health: Arc<HealthStore>) -> Self {
        Self {
            http: reqwest::Client::new(),
            resolver: EndpointResolver::from_config(config),
            cascade: RwLock::new(config.cascade.clone()),
            health,
            llm_timeout: config.timeouts.llm(),
        }
    }

    /// Replace the cascade configuration. Requests already in flight keep
    /// the entries they resolved.
    pub fn set_cascade(&self, cascade: CascadeConfig) {
        *self.cascade.write().unwrap() = cascade;
    }

    pub fn health(&self) -> &HealthStore {
        &self.health
    }

    async fn run_cascade(
        &self,
        messages: &[ChatMessage],
        surface: ToolSurface,
        intelligence: Intelligence,
    ) -> Result<AssistantTurn, ConductorError> {
        let (tools, wants_tool_choice) = compile_surface(&surface);
        let primary: Vec<CascadeEntry> = {
            let cascade = self.cascade.read().unwrap();
            cascade.from_tier_down(intelligence).into_iter().cloned().collect()
        };

        let mut attempts = 0usize;

        for entry in &primary {
            let key = entry.health_key();
            let (_, errors, skips) = self.health.totals(&key);
            if errors > 0 && skips < errors {
                debug!(model = %entry.model, endpoint = %entry.endpoint, errors, skips, "skipping recently-failing model");
                self.health.increment(&key, Metric::Skip, 1);
                continue;
            }

            attempts += 1;
            match self
                .call_entry(entry, messages, tools.as_deref(), wants_tool_choice)
                .await
            {
                Ok(turn) => {
                    self.record_success(&key);
                    return Ok(turn);
                }
                Err(err) => {
                    warn!(model = %entry.model, endpoint = %entry.endpoint, error = %err, "cascade entry failed");
                    self.health.increment(&key, Metric::Error, 1);
                }
            }
        }

        // Recovery path: the primary cascade may have locked itself out.
        // Retry the entire configured set ordered by recent health, skip
        // gate ignored. Failures here are not re-charged; the primary pass
        // already recorded them.
        let mut fallback: Vec<CascadeEntry> = {
            let cascade = self.cascade.read().unwrap();
            cascade.all().into_iter().cloned().collect()
        };
        fallback.sort_by_key(|entry| self.health.errors_last_hour(&entry.health_key()));

        for entry in &fallback {
            attempts += 1;
            match self
                .call_entry(entry, messages, tools.as_deref(), wants_tool_choice)
                .await
            {
                Ok(turn) => {
                    self.record_success(&entry.health_key());
                    return Ok(turn);
                }
                Err(err) => {
                    warn!(model = %entry.model, endpoint = %entry.endpoint, error = %err, "fallback entry failed");
                }
            }
        }

        error!(attempts, "model cascade exhausted");
        Err(ConductorError::Provider(ProviderError::CascadeExhausted {
            attempts,
        }))
    }

    fn record_success(&self, key: &str) {
        self.health.reset_metric(key, Metric::Error);
        self.health.reset_metric(key, Metric::Skip);
        self.health.increment(key, Metric::Success, 1);
    }

    async fn call_entry(
        &self,
        entry: &CascadeEntry,
        messages: &[ChatMessage],
        tools: Option<&[WireTool]>,
        wants_tool_choice: bool,
    ) -> Result<AssistantTurn, ConductorError> {
        let hints: Vec<&str> = entry.provider.as_deref().into_iter().collect();
        let tool_choice = if wants_tool_choice && !entry.no_tool_choice {
            Some("required")
        } else {
            None
        };
        self.send_chat(
            &entry.endpoint,
            &entry.model,
            &hints,
            messages,
            tools,
            tool_choice,
            None,
        )
        .await
    }

    /// One wire round-trip against one endpoint.
    pub(crate) async fn send_chat(
        &self,
        endpoint_id: &str,
        model: &str,
        provider_hints: &[&str],
        messages: &[ChatMessage],
        tools: Option<&[WireTool]>,
        tool_choice: Option<&'static str>,
        max_tokens: Option<u32>,
    ) -> Result<AssistantTurn, ConductorError> {
        let endpoint = self.resolver.resolve(endpoint_id)?;
        let headers = self.resolver.headers(endpoint)?;

        let request = ChatRequest {
            model,
            messages,
            tools,
            tool_choice,
            provider: if provider_hints.is_empty() {
                None
            } else {
                Some(ProviderHint {
                    only: provider_hints.to_vec(),
                })
            },
            max_tokens,
        };

        debug!(model, endpoint = endpoint_id, "sending chat completion request");
        let response = self
            .http
            .post(&endpoint.url)
            .headers(headers)
            .timeout(self.llm_timeout)
            .json(&request)
            .send()
            .await
            .map_err(|err| {
                ConductorError::Provider(ProviderError::Transport {
                    endpoint: endpoint_id.to_string(),
                    reason: err.to_string(),
                })
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConductorError::Provider(ProviderError::Http {
                endpoint: endpoint_id.to_string(),
                status: status.as_u16(),
                detail: extract_error_detail(&body),
            }));
        }

        let parsed: ChatResponse = response.json().await.map_err(|err| {
            ConductorError::Provider(ProviderError::InvalidResponse {
                reason: format!("malformed response body: {err}"),
            })
        })?;

        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            ConductorError::Provider(ProviderError::InvalidResponse {
                reason: "response carried no choices".to_string(),
            })
        })?;

        let tool_calls = choice.message.tool_calls.unwrap_or_default();
        if let Some(first) = tool_calls.first() {
            if first.function.name.trim().is_empty() {
                return Err(ConductorError::Provider(ProviderError::InvalidResponse {
                    reason: "tool call is missing a function name".to_string(),
                }));
            }
        }

        Ok(AssistantTurn {
            content: choice.message.content,
            tool_calls,
        })
    }
}

#[async_trait]
impl ModelClient for CascadeClient {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        surface: ToolSurface,
        intelligence: Intelligence,
    ) -> Result<AssistantTurn, ConductorError> {
        self.run_cascade(messages, surface, intelligence).await
    }
}

/// Compile the caller's surface into wire tools. A bare schema becomes a
/// single `respond` tool so response parsing stays uniform.
fn compile_surface(surface: &ToolSurface) -> (Option<Vec<WireTool>>, bool) {
    match surface {
        ToolSurface::Tools(definitions) => (
            Some(definitions.iter().map(WireTool::from).collect()),
            true,
        ),
        ToolSurface::Schema(schema) => (Some(vec![respond_tool(schema)]), true),
        ToolSurface::None => (None, false),
    }
}

fn respond_tool(schema: &Schema) -> WireTool {
    WireTool::from(&ToolDefinition {
        name: "respond".to_string(),
        description: "Provide the response in the required shape.".to_string(),
        parameters: schema.to_json(),
    })
}

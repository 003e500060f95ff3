//! Configuration loaded from TOML: endpoints, cascade tiers, timeouts.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::action::Intelligence;
use crate::error::ConductorError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConductorConfig {
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub endpoints: HashMap<String, EndpointConfig>,
    #[serde(default)]
    pub cascade: CascadeConfig,
}

impl ConductorConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConductorError> {
        toml::from_str(raw).map_err(|err| ConductorError::Config(err.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, ConductorError> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            ConductorError::Config(format!("failed to read '{}': {err}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_step_secs")]
    pub step_secs: u64,
    #[serde(default = "default_llm_secs")]
    pub llm_secs: u64,
}

impl TimeoutConfig {
    pub fn step(&self) -> Duration {
        Duration::from_secs(self.step_secs)
    }

    pub fn llm(&self) -> Duration {
        Duration::from_secs(self.llm_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            step_secs: default_step_secs(),
            llm_secs: default_llm_secs(),
        }
    }
}

fn default_step_secs() -> u64 {
    20
}

fn default_llm_secs() -> u64 {
    40
}

/// One resolvable model endpoint. The credential never appears in Debug
/// output or serialized config.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    pub url: String,
    #[serde(default)]
    pub models_url: Option<String>,
    pub credential: SecretString,
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
}

/// One attemptable (endpoint, model, provider-hint) triple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeEntry {
    pub endpoint: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Set when the provider rejects `tool_choice: required`.
    #[serde(default)]
    pub no_tool_choice: bool,
}

impl CascadeEntry {
    /// Key under which this triple's health is tracked.
    pub fn health_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.endpoint,
            self.model,
            self.provider.as_deref().unwrap_or("-")
        )
    }
}

/// Cascade entries grouped by tier. Hot-swappable via settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CascadeConfig {
    #[serde(default)]
    pub high: Vec<CascadeEntry>,
    #[serde(default)]
    pub medium: Vec<CascadeEntry>,
    #[serde(default)]
    pub low: Vec<CascadeEntry>,
}

impl CascadeConfig {
    pub fn tier(&self, level: Intelligence) -> &[CascadeEntry] {
        match level {
            Intelligence::High => &self.high,
            Intelligence::Medium => &self.medium,
            Intelligence::Low => &self.low,
        }
    }

    /// Entries at the requested tier and all lower tiers, in cascade order.
    pub fn from_tier_down(&self, level: Intelligence) -> Vec<&CascadeEntry> {
        level
            .tiers_from()
            .iter()
            .flat_map(|tier| self.tier(*tier).iter())
            .collect()
    }

    /// The entire configured model set, used by the fallback pass.
    pub fn all(&self) -> Vec<&CascadeEntry> {
        self.from_tier_down(Intelligence::High)
    }

    pub fn is_empty(&self) -> bool {
        self.high.is_empty() && self.medium.is_empty() && self.low.is_empty()
    }
}

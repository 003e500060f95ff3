//! Endpoint resolution: endpoint-id to url, credential, and headers.

use std::collections::HashMap;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use secrecy::ExposeSecret;

use conductor_core::config::{ConductorConfig, EndpointConfig};
use conductor_core::error::{ConductorError, ProviderError};

pub struct EndpointResolver {
    endpoints: HashMap<String, EndpointConfig>,
}

impl EndpointResolver {
    pub fn new(endpoints: HashMap<String, EndpointConfig>) -> Self {
        Self { endpoints }
    }

    pub fn from_config(config: &ConductorConfig) -> Self {
        Self::new(config.endpoints.clone())
    }

    pub fn resolve(&self, id: &str) -> Result<&EndpointConfig, ConductorError> {
        self.endpoints.get(id).ok_or_else(|| {
            ConductorError::Provider(ProviderError::UnknownEndpoint {
                endpoint: id.to_string(),
            })
        })
    }

    /// Request headers for one endpoint: bearer credential, JSON content
    /// type, plus any endpoint-declared extras.
    pub fn headers(&self, endpoint: &EndpointConfig) -> Result<HeaderMap, ConductorError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let bearer = format!("Bearer {}", endpoint.credential.expose_secret());
        let mut authorization = HeaderValue::from_str(&bearer)
            .map_err(|err| ConductorError::Config(format!("invalid credential: {err}")))?;
        authorization.set_sensitive(true);
        headers.insert(AUTHORIZATION, authorization);

        for (key, value) in &endpoint.extra_headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|err| ConductorError::Config(format!("invalid header name '{key}': {err}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|err| ConductorError::Config(format!("invalid header value for '{key}': {err}")))?;
            headers.insert(name, value);
        }

        Ok(headers)
    }
}

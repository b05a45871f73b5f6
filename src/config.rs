//! Configuration options for the chat gateway.
//!
//! This module provides a configuration struct covering backend credentials
//! and endpoints, request shaping defaults, run polling budgets and the
//! session store's lifetime settings.

use crate::error::ChatGateError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the chat gateway.
///
/// Credentials are optional at load time. A provider that needs a missing
/// credential fails with [`ChatGateError::Config`] when it is used.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// OpenAI API key for the completion and assistant providers
    #[serde(default, skip_serializing)]
    openai_api_key: Option<String>,

    /// Base URL for the OpenAI API
    #[serde(default = "default_base_url")]
    openai_base_url: String,

    /// Organization ID for team accounts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    organization: Option<String>,

    /// Timeout for a single outbound HTTP request
    #[serde(with = "humantime_serde", default = "default_timeout")]
    timeout: Duration,

    /// Completion model used when a turn names none
    #[serde(default = "default_model")]
    default_model: String,

    /// Token limit sent with every completion request
    #[serde(default = "default_max_tokens")]
    max_tokens: u32,

    /// Temperature for models that accept one
    #[serde(default = "default_temperature")]
    temperature: f32,

    /// Delay between run status polls
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    poll_interval: Duration,

    /// Wall-clock budget for a run to reach a terminal state
    #[serde(with = "humantime_serde", default = "default_run_timeout")]
    run_timeout: Duration,

    /// n8n workflow webhook URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    webhook_url: Option<String>,

    /// Optional bearer credential for the webhook and the n8n REST API
    #[serde(default, skip_serializing)]
    webhook_api_key: Option<String>,

    /// n8n REST API base URL, for listing and executing workflows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    n8n_api_url: Option<String>,

    /// How long an import session stays retrievable
    #[serde(with = "humantime_serde", default = "default_session_ttl")]
    session_ttl: Duration,

    /// Interval of the background session sweep
    #[serde(with = "humantime_serde", default = "default_sweep_interval")]
    sweep_interval: Duration,

    /// Directory for file-backed sessions; in-memory when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_dir: Option<PathBuf>,

    /// Address the HTTP server binds to
    #[serde(default = "default_bind_addr")]
    bind_addr: String,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_temperature() -> f32 {
    0.7
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_run_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_session_ttl() -> Duration {
    Duration::from_secs(15 * 60)
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

impl GatewayConfig {
    /// Creates a new configuration with default values and no credentials.
    pub fn new() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: default_base_url(),
            organization: None,
            timeout: default_timeout(),
            default_model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            poll_interval: default_poll_interval(),
            run_timeout: default_run_timeout(),
            webhook_url: None,
            webhook_api_key: None,
            n8n_api_url: None,
            session_ttl: default_session_ttl(),
            sweep_interval: default_sweep_interval(),
            session_dir: None,
            bind_addr: default_bind_addr(),
        }
    }

    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ChatGateError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    ///
    /// Recognized keys: `OPENAI_API_KEY`, `OPENAI_BASE_URL`,
    /// `OPENAI_ORGANIZATION`, `N8N_WEBHOOK_URL`, `N8N_API_URL`, `N8N_API_KEY`,
    /// `CHATGATE_SESSION_DIR` and `CHATGATE_BIND`. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ChatGateError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::new();

        if let Some(key) = get("OPENAI_API_KEY") {
            config = config.with_openai_api_key(key);
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            config = config.with_openai_base_url(url);
        }
        if let Some(org) = get("OPENAI_ORGANIZATION") {
            config = config.with_organization(org);
        }
        if let Some(url) = get("N8N_WEBHOOK_URL") {
            config = config.with_webhook_url(url)?;
        }
        if let Some(url) = get("N8N_API_URL") {
            config = config.with_n8n_api_url(url)?;
        }
        if let Some(key) = get("N8N_API_KEY") {
            config = config.with_webhook_api_key(key);
        }
        if let Some(dir) = get("CHATGATE_SESSION_DIR") {
            config = config.with_session_dir(dir);
        }
        if let Some(addr) = get("CHATGATE_BIND") {
            config = config.with_bind_addr(addr);
        }

        Ok(config)
    }

    /// Sets the OpenAI API key.
    pub fn with_openai_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.openai_api_key = Some(api_key.into());
        self
    }

    /// Sets the base URL for the OpenAI API.
    pub fn with_openai_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.openai_base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the organization ID for team accounts.
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    /// Sets the timeout for outbound HTTP requests.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the completion model used when a turn names none.
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Sets the completion token limit.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the temperature for models that accept one.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the delay between run status polls.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the wall-clock budget for a run.
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    /// Sets the n8n webhook URL.
    ///
    /// # Errors
    ///
    /// Returns [`ChatGateError::Config`] when the URL does not parse.
    pub fn with_webhook_url(mut self, url: impl Into<String>) -> Result<Self, ChatGateError> {
        let url = url.into();
        url::Url::parse(&url)
            .map_err(|e| ChatGateError::Config(format!("Invalid n8n webhook URL: {}", e)))?;
        self.webhook_url = Some(url);
        Ok(self)
    }

    /// Sets the n8n REST API base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ChatGateError::Config`] when the URL does not parse.
    pub fn with_n8n_api_url(mut self, url: impl Into<String>) -> Result<Self, ChatGateError> {
        let url = url.into().trim_end_matches('/').to_string();
        url::Url::parse(&url)
            .map_err(|e| ChatGateError::Config(format!("Invalid n8n API URL: {}", e)))?;
        self.n8n_api_url = Some(url);
        Ok(self)
    }

    /// Sets the bearer credential sent to the webhook and the n8n API.
    pub fn with_webhook_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.webhook_api_key = Some(api_key.into());
        self
    }

    /// Sets how long import sessions live.
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Sets the background sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Stores sessions as files under `dir` instead of in memory.
    pub fn with_session_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.session_dir = Some(dir.into());
        self
    }

    /// Sets the address the HTTP server binds to.
    pub fn with_bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    /// Returns the OpenAI API key, if configured.
    pub fn openai_api_key(&self) -> Option<&str> {
        self.openai_api_key.as_deref()
    }

    /// Returns the OpenAI API base URL, without a trailing slash.
    pub fn openai_base_url(&self) -> &str {
        &self.openai_base_url
    }

    /// Returns the OpenAI organization ID, if configured.
    pub fn organization(&self) -> Option<&str> {
        self.organization.as_deref()
    }

    /// Returns the timeout for a single outbound HTTP request.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the completion model used when a turn names none.
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Returns the completion token limit.
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    /// Returns the temperature sent to models that accept one.
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Returns the delay between run status polls.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Returns the wall-clock budget for a run.
    pub fn run_timeout(&self) -> Duration {
        self.run_timeout
    }

    /// Returns the n8n webhook URL, if configured.
    pub fn webhook_url(&self) -> Option<&str> {
        self.webhook_url.as_deref()
    }

    /// Returns the n8n bearer credential, if configured.
    pub fn webhook_api_key(&self) -> Option<&str> {
        self.webhook_api_key.as_deref()
    }

    /// Returns how long import sessions live.
    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Returns the background sweep interval.
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    /// Returns the n8n REST API base URL, if configured.
    pub fn n8n_api_url(&self) -> Option<&str> {
        self.n8n_api_url.as_deref()
    }

    /// Returns the session directory; `None` means sessions stay in memory.
    pub fn session_dir(&self) -> Option<&Path> {
        self.session_dir.as_deref()
    }

    /// Returns the address the HTTP server binds to.
    pub fn bind_addr(&self) -> &str {
        &self.bind_addr
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = GatewayConfig::new();
        assert_eq!(config.openai_api_key(), None);
        assert_eq!(config.default_model(), "gpt-4o-mini");
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.run_timeout(), Duration::from_secs(30));
        assert_eq!(config.session_ttl(), Duration::from_secs(900));
        assert_eq!(config.sweep_interval(), Duration::from_secs(60));
    }

    #[test]
    fn reads_environment_keys() {
        let config = GatewayConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_BASE_URL", "http://localhost:9999/v1/"),
            ("N8N_WEBHOOK_URL", "https://n8n.example.com/webhook/chat"),
            ("N8N_API_URL", "https://n8n.example.com/api/v1/"),
            ("N8N_API_KEY", "   "),
        ]))
        .unwrap();

        assert_eq!(config.openai_api_key(), Some("sk-test"));
        assert_eq!(config.openai_base_url(), "http://localhost:9999/v1");
        assert_eq!(config.webhook_url(), Some("https://n8n.example.com/webhook/chat"));
        assert_eq!(config.n8n_api_url(), Some("https://n8n.example.com/api/v1"));
        assert_eq!(config.webhook_api_key(), None);
        assert!(config.session_dir().is_none());
    }

    #[test]
    fn rejects_malformed_webhook_url() {
        let err = GatewayConfig::from_lookup(lookup(&[("N8N_WEBHOOK_URL", "not a url")])).unwrap_err();
        assert!(matches!(err, ChatGateError::Config(_)));
    }

    #[test]
    fn durations_deserialize_from_humantime() {
        let config: GatewayConfig = serde_json::from_str(
            r#"{"run_timeout": "45s", "session_ttl": "5m", "openai_api_key": "sk"}"#,
        )
        .unwrap();
        assert_eq!(config.run_timeout(), Duration::from_secs(45));
        assert_eq!(config.session_ttl(), Duration::from_secs(300));
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.openai_api_key(), Some("sk"));
    }
}

//! n8n workflow webhook provider.
//!
//! The workflow behind the webhook is opaque and its response shape is not
//! fixed, so the reply text is found by trying a list of extractors in order
//! and falling back to a pretty-printed dump of the whole body.

use crate::config::GatewayConfig;
use crate::error::ChatGateError;
use crate::models::{Message, ProviderTag, WebhookPayload, WorkflowList};
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// One way of finding the reply text in a webhook body.
type Extractor = fn(&Value) -> Option<String>;

/// Extractors in the order they are tried. Each is total.
const EXTRACTORS: &[Extractor] = &[
    whole_body_string,
    message_field,
    response_field,
    data_message_field,
    output_field,
    first_array_element,
];

fn whole_body_string(body: &Value) -> Option<String> {
    body.as_str().map(str::to_string)
}

fn field_string(body: &Value, path: &[&str]) -> Option<String> {
    let mut current = body;
    for key in path {
        current = current.get(key)?;
    }
    current
        .as_str()
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn message_field(body: &Value) -> Option<String> {
    field_string(body, &["message"])
}

fn response_field(body: &Value) -> Option<String> {
    field_string(body, &["response"])
}

fn data_message_field(body: &Value) -> Option<String> {
    field_string(body, &["data", "message"])
}

fn output_field(body: &Value) -> Option<String> {
    field_string(body, &["output"])
}

fn first_array_element(body: &Value) -> Option<String> {
    body.as_array()
        .and_then(|items| items.first())
        .map(extract_reply)
}

/// Extracts the reply text from a webhook response body.
pub fn extract_reply(body: &Value) -> String {
    EXTRACTORS
        .iter()
        .find_map(|extract| extract(body))
        .unwrap_or_else(|| {
            serde_json::to_string_pretty(body).unwrap_or_else(|_| body.to_string())
        })
}

/// Request timeout used when the adapter is not built from configuration.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Posts each turn to a workflow webhook.
///
/// The same adapter also talks to the n8n REST API, when an API URL is set,
/// to list and execute workflows. Build it once and share it: it owns a
/// pooled HTTP client.
pub struct WebhookAdapter {
    client: reqwest::Client,
    url: String,
    api_url: Option<String>,
    api_key: Option<String>,
}

impl WebhookAdapter {
    /// Creates an adapter posting to `url` with a 30 second request timeout.
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Result<Self, ChatGateError> {
        Self::build(url.into(), api_key, DEFAULT_TIMEOUT)
    }

    fn build(
        url: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ChatGateError> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            url,
            api_url: None,
            api_key,
        })
    }

    /// Creates an adapter from the configured webhook URL, API URL and key.
    ///
    /// # Errors
    ///
    /// Returns [`ChatGateError::Config`] when no webhook URL is configured.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ChatGateError> {
        let url = config
            .webhook_url()
            .ok_or_else(|| ChatGateError::Config("n8n webhook URL not configured".to_string()))?;
        let mut adapter = Self::build(
            url.to_string(),
            config.webhook_api_key().map(str::to_string),
            config.timeout(),
        )?;
        adapter.api_url = config.n8n_api_url().map(str::to_string);
        Ok(adapter)
    }

    /// Sets the n8n REST API base URL used for workflow calls.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = Some(api_url.into().trim_end_matches('/').to_string());
        self
    }

    fn bearer(key: &str) -> Result<HeaderValue, ChatGateError> {
        HeaderValue::from_str(&format!("Bearer {}", key))
            .map_err(|_| ChatGateError::Config("Invalid n8n API key format".to_string()))
    }

    /// Builds an n8n API URL from path segments, with the bearer header.
    fn api_endpoint(
        &self,
        action: &str,
        segments: &[&str],
    ) -> Result<(Url, HeaderValue), ChatGateError> {
        let (Some(api_url), Some(key)) = (self.api_url.as_deref(), self.api_key.as_deref()) else {
            return Err(ChatGateError::Config(format!(
                "n8n API URL and key required for {}",
                action
            )));
        };
        let mut url = Url::parse(api_url)
            .map_err(|e| ChatGateError::Config(format!("Invalid n8n API URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ChatGateError::Config("n8n API URL cannot take a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok((url, Self::bearer(key)?))
    }

    /// Sends an n8n API request and decodes the JSON reply.
    async fn call_api<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        stage: &'static str,
    ) -> Result<T, ChatGateError> {
        let response = request
            .send()
            .await
            .map_err(|e| ChatGateError::provider(ProviderTag::N8n, stage, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatGateError::provider(
                ProviderTag::N8n,
                stage,
                format!("HTTP error {}: {}", status, body),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| ChatGateError::provider(ProviderTag::N8n, stage, e.to_string()))
    }

    /// Lists the workflows known to the n8n instance.
    ///
    /// # Errors
    ///
    /// Returns [`ChatGateError::Config`] when the API URL or key is missing,
    /// and [`ChatGateError::Provider`] when the API call fails.
    pub async fn list_workflows(&self) -> Result<Vec<Value>, ChatGateError> {
        let (url, auth) = self.api_endpoint("listing workflows", &["workflows"])?;
        let list: WorkflowList = self
            .call_api(self.client.get(url).header(AUTHORIZATION, auth), "list workflows")
            .await?;
        Ok(list.data.unwrap_or_default())
    }

    /// Executes a workflow with `data` as its input and returns the raw result.
    ///
    /// # Errors
    ///
    /// Returns [`ChatGateError::Validation`] for a blank workflow id,
    /// [`ChatGateError::Config`] when the API URL or key is missing, and
    /// [`ChatGateError::Provider`] when the API call fails.
    pub async fn execute_workflow(&self, workflow_id: &str, data: &Value) -> Result<Value, ChatGateError> {
        let workflow_id = workflow_id.trim();
        if workflow_id.is_empty() {
            return Err(ChatGateError::Validation("Workflow ID is required".to_string()));
        }
        let (url, auth) =
            self.api_endpoint("executing workflows", &["workflows", workflow_id, "execute"])?;
        debug!(workflow_id, "executing n8n workflow");
        self.call_api(
            self.client.post(url).header(AUTHORIZATION, auth).json(data),
            "execute workflow",
        )
        .await
    }

    /// Posts `content` and returns the workflow's reply.
    ///
    /// The reply's metadata holds the caller's metadata plus the raw body
    /// under `n8nResponse`.
    pub async fn send_message(
        &self,
        content: &str,
        thread_id: Option<&str>,
        metadata: Option<&HashMap<String, Value>>,
    ) -> Result<Message, ChatGateError> {
        let payload = WebhookPayload {
            message: content,
            thread_id,
            metadata,
        };

        let mut request = self.client.post(&self.url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.header(AUTHORIZATION, Self::bearer(key)?);
        }

        debug!(?thread_id, "posting to n8n webhook");
        let response = request
            .send()
            .await
            .map_err(|e| ChatGateError::provider(ProviderTag::N8n, "post webhook", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatGateError::provider(
                ProviderTag::N8n,
                "post webhook",
                format!("n8n webhook failed: {} {}", status, body),
            ));
        }

        let body: Value = response.json().await.map_err(|e| {
            ChatGateError::provider(ProviderTag::N8n, "decode webhook reply", e.to_string())
        })?;

        let mut message = Message::assistant(extract_reply(&body))
            .with_id(format!("n8n-{}", Utc::now().timestamp_millis()))
            .with_provider(ProviderTag::N8n);
        for (key, value) in metadata.into_iter().flatten() {
            message = message.with_metadata(key.clone(), value.clone());
        }
        Ok(message.with_metadata("n8nResponse", body))
    }

    /// Sends a `"test"` message and reports whether a non-empty reply came back.
    pub async fn test_connection(&self) -> bool {
        match self.send_message("test", None, None).await {
            Ok(reply) => !reply.content().is_empty(),
            Err(e) => {
                warn!(error = %e, "n8n connection test failed");
                false
            }
        }
    }
}

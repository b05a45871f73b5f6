//! HTTP client implementation for communicating with the OpenAI API.
//!
//! This module provides the `OpenAIClient` which handles authentication,
//! request formatting and response parsing for chat completions and for the
//! assistants thread/run endpoints.

use crate::config::GatewayConfig;
use crate::error::ChatGateError;
use crate::models::{
    Assistant, AssistantObject, ChatRequest, ChatResponse, ListResponse, ModelObject, ProviderTag,
    Run, ThreadMessage, ThreadObject,
};
use crate::run::RunSource;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::warn;

/// Models offered when the model list cannot be fetched.
pub const FALLBACK_MODELS: &[&str] = &["gpt-4o-mini", "gpt-4o", "gpt-3.5-turbo"];

/// Client for making requests to the OpenAI API.
pub struct OpenAIClient {
    /// Base URL without a trailing slash
    base_url: String,

    /// HTTP client carrying the auth headers
    client: reqwest::Client,
}

impl OpenAIClient {
    /// Creates a new OpenAI client from the gateway configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ChatGateError::Config`] when no API key is configured or a
    /// header value is malformed.
    pub fn new(config: &GatewayConfig) -> Result<Self, ChatGateError> {
        let api_key = config
            .openai_api_key()
            .ok_or_else(|| ChatGateError::Config("OpenAI API key not configured".to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|_| ChatGateError::Config("Invalid API key format".to_string()))?,
        );
        headers.insert("OpenAI-Beta", HeaderValue::from_static("assistants=v2"));

        if let Some(org) = config.organization() {
            headers.insert(
                "OpenAI-Organization",
                HeaderValue::from_str(org)
                    .map_err(|_| ChatGateError::Config("Invalid organization ID format".to_string()))?,
            );
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            base_url: config.openai_base_url().to_string(),
            client,
        })
    }

    /// Sends a chat completion request.
    pub(crate) async fn chat_completion(
        &self,
        request: &ChatRequest,
    ) -> Result<ChatResponse, ChatGateError> {
        let url = format!("{}/chat/completions", self.base_url);
        self.send(
            self.client.post(&url).json(request),
            ProviderTag::OpenAIChat,
            "chat completion",
        )
        .await
    }

    /// Creates an empty thread and returns its id.
    pub async fn create_thread(&self) -> Result<String, ChatGateError> {
        let url = format!("{}/threads", self.base_url);
        let thread: ThreadObject = self
            .send(
                self.client.post(&url).json(&json!({})),
                ProviderTag::OpenAIAssistant,
                "create thread",
            )
            .await?;
        Ok(thread.id)
    }

    /// Appends a user message to a thread.
    pub async fn add_message(&self, thread_id: &str, content: &str) -> Result<(), ChatGateError> {
        let url = format!("{}/threads/{}/messages", self.base_url, thread_id);
        let _: serde_json::Value = self
            .send(
                self.client
                    .post(&url)
                    .json(&json!({ "role": "user", "content": content })),
                ProviderTag::OpenAIAssistant,
                "add message",
            )
            .await?;
        Ok(())
    }

    /// Starts a run of `assistant_id` on a thread.
    pub async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, ChatGateError> {
        let url = format!("{}/threads/{}/runs", self.base_url, thread_id);
        self.send(
            self.client
                .post(&url)
                .json(&json!({ "assistant_id": assistant_id })),
            ProviderTag::OpenAIAssistant,
            "create run",
        )
        .await
    }

    /// Fetches the current state of a run.
    pub async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ChatGateError> {
        let url = format!("{}/threads/{}/runs/{}", self.base_url, thread_id, run_id);
        self.send(
            self.client.get(&url),
            ProviderTag::OpenAIAssistant,
            "retrieve run",
        )
        .await
    }

    /// Lists a thread's messages, oldest first.
    pub(crate) async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, ChatGateError> {
        let url = format!("{}/threads/{}/messages", self.base_url, thread_id);
        let list: ListResponse<ThreadMessage> = self
            .send(
                self.client.get(&url).query(&[("order", "asc")]),
                ProviderTag::OpenAIAssistant,
                "list messages",
            )
            .await?;
        Ok(list.data)
    }

    /// Lists the twenty most recently created assistants.
    pub async fn list_assistants(&self) -> Result<Vec<Assistant>, ChatGateError> {
        let url = format!("{}/assistants", self.base_url);
        let list: ListResponse<AssistantObject> = self
            .send(
                self.client
                    .get(&url)
                    .query(&[("order", "desc"), ("limit", "20")]),
                ProviderTag::OpenAIAssistant,
                "list assistants",
            )
            .await?;
        Ok(list.data.into_iter().map(Assistant::from).collect())
    }

    /// Lists the chat model ids (those containing `gpt`), sorted.
    ///
    /// Never fails: any error is logged and [`FALLBACK_MODELS`] is returned.
    pub async fn list_models(&self) -> Vec<String> {
        let url = format!("{}/models", self.base_url);
        let listed: Result<ListResponse<ModelObject>, _> = self
            .send(self.client.get(&url), ProviderTag::OpenAIChat, "list models")
            .await;
        match listed {
            Ok(list) => {
                let mut ids: Vec<String> = list
                    .data
                    .into_iter()
                    .map(|model| model.id)
                    .filter(|id| id.contains("gpt"))
                    .collect();
                ids.sort();
                ids
            }
            Err(e) => {
                warn!(error = %e, "failed to list models, using fallback list");
                FALLBACK_MODELS.iter().map(|id| id.to_string()).collect()
            }
        }
    }

    /// Sends a request and decodes a JSON body, tagging any failure with the
    /// provider and stage.
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        provider: ProviderTag,
        stage: &'static str,
    ) -> Result<T, ChatGateError> {
        let response = request
            .send()
            .await
            .map_err(|e| ChatGateError::provider(provider, stage, e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ChatGateError::provider(provider, stage, e.to_string()))?;

        if !status.is_success() {
            return Err(ChatGateError::provider(
                provider,
                stage,
                format!("HTTP error {}: {}", status, body),
            ));
        }

        serde_json::from_str(&body).map_err(|e| {
            ChatGateError::provider(provider, stage, format!("Unexpected response body: {}", e))
        })
    }
}

#[async_trait]
impl RunSource for OpenAIClient {
    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ChatGateError> {
        OpenAIClient::retrieve_run(self, thread_id, run_id).await
    }
}

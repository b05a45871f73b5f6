//! Single-shot chat completion provider.
//!
//! No conversation state is kept here: the caller resends the whole prior
//! history on every turn, and the request is built as
//! `[system prompt?] + history + new user message`.

use crate::capability::RequestShape;
use crate::client::OpenAIClient;
use crate::config::GatewayConfig;
use crate::error::ChatGateError;
use crate::models::{ChatMessage, ChatRequest, Message, ProviderTag, ReasoningEffort, Verbosity};
use std::sync::Arc;
use tracing::debug;

/// Per-turn options for the completion provider.
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    /// Model identifier; the adapter's default when absent
    pub model: Option<String>,
    pub reasoning_effort: Option<ReasoningEffort>,
    pub verbosity: Option<Verbosity>,
    pub system_prompt: Option<String>,
}

/// Sends one completion request per turn.
pub struct CompletionAdapter {
    client: Arc<OpenAIClient>,
    default_model: String,
    max_tokens: u32,
    temperature: f32,
}

impl CompletionAdapter {
    /// Creates an adapter using the configured model defaults.
    pub fn new(client: Arc<OpenAIClient>, config: &GatewayConfig) -> Self {
        Self {
            client,
            default_model: config.default_model().to_string(),
            max_tokens: config.max_tokens(),
            temperature: config.temperature(),
        }
    }

    /// Builds the exact request sent for a turn.
    pub(crate) fn build_request(
        &self,
        content: &str,
        history: &[Message],
        options: &CompletionOptions,
    ) -> ChatRequest {
        let model = options
            .model
            .as_deref()
            .filter(|model| !model.trim().is_empty())
            .unwrap_or(&self.default_model);

        let mut messages = Vec::with_capacity(history.len() + 2);
        if let Some(prompt) = options.system_prompt.as_deref().filter(|p| !p.trim().is_empty()) {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: Some(prompt.to_string()),
            });
        }
        messages.extend(history.iter().map(ChatMessage::from));
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: Some(content.to_string()),
        });

        let mut request = ChatRequest::new(model, messages);
        RequestShape::for_model(model, options.reasoning_effort, options.verbosity).apply(
            &mut request,
            self.max_tokens,
            self.temperature,
        );
        request
    }

    /// Sends `content` after `history` and returns the assistant's reply.
    ///
    /// # Errors
    ///
    /// Fails with [`ChatGateError::Provider`] when the request fails or the
    /// backend returns no content.
    pub async fn send_message(
        &self,
        content: &str,
        history: &[Message],
        options: &CompletionOptions,
    ) -> Result<Message, ChatGateError> {
        let request = self.build_request(content, history, options);
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "sending chat completion"
        );

        let response = self.client.chat_completion(&request).await?;

        let choice = response.choices.into_iter().next().ok_or_else(|| {
            ChatGateError::provider(
                ProviderTag::OpenAIChat,
                "chat completion",
                "No response content received",
            )
        })?;
        let reply = choice
            .message
            .content
            .filter(|content| !content.is_empty())
            .ok_or_else(|| {
                ChatGateError::provider(
                    ProviderTag::OpenAIChat,
                    "chat completion",
                    format!(
                        "No response content received (finish_reason: {})",
                        choice.finish_reason.as_deref().unwrap_or("none")
                    ),
                )
            })?;

        let mut message = Message::assistant(reply)
            .with_id(response.id)
            .with_provider(ProviderTag::OpenAIChat)
            .with_metadata("model", serde_json::Value::String(request.model));
        if let Some(usage) = response.usage {
            message = message.with_metadata("usage", serde_json::to_value(usage)?);
        }
        Ok(message)
    }
}

//! Provider adapters.
//!
//! Each backend kind has one adapter, and [`Provider`] is the tagged union
//! over them. A chat turn is dispatched by a single exhaustive match in
//! [`Provider::send`], which normalizes every backend's result into a
//! [`ChatTurnResponse`].

use crate::error::ChatGateError;
use crate::models::{ChatTurnRequest, ChatTurnResponse, ProviderTag};
use std::sync::Arc;

pub mod assistant;
pub mod completion;
pub mod webhook;

pub use assistant::{AssistantAdapter, AssistantReply};
pub use completion::{CompletionAdapter, CompletionOptions};
pub use webhook::{WebhookAdapter, extract_reply};

/// A ready-to-use backend, one variant per provider kind.
pub enum Provider {
    /// Stateless completions; history comes from the turn
    Completion(CompletionAdapter),

    /// Stateful threads, bound to one assistant
    Assistant {
        adapter: AssistantAdapter,
        assistant_id: String,
    },

    /// Opaque workflow webhook, shared across turns
    Webhook(Arc<WebhookAdapter>),
}

impl Provider {
    /// Returns the tag of this provider.
    pub fn tag(&self) -> ProviderTag {
        match self {
            Provider::Completion(_) => ProviderTag::OpenAIChat,
            Provider::Assistant { .. } => ProviderTag::OpenAIAssistant,
            Provider::Webhook(_) => ProviderTag::N8n,
        }
    }

    /// Sends one turn and returns the normalized reply.
    ///
    /// Completion and webhook turns echo the caller's thread id back; an
    /// assistant turn returns the thread it actually ran on.
    pub async fn send(&self, turn: &ChatTurnRequest) -> Result<ChatTurnResponse, ChatGateError> {
        match self {
            Provider::Completion(adapter) => {
                let options = CompletionOptions {
                    model: turn.model.clone(),
                    reasoning_effort: turn.reasoning_effort,
                    verbosity: turn.verbosity,
                    system_prompt: turn.system_prompt.clone(),
                };
                let message = adapter
                    .send_message(&turn.message, &turn.history, &options)
                    .await?;
                Ok(ChatTurnResponse {
                    message,
                    thread_id: turn.thread_id.clone(),
                })
            }
            Provider::Assistant {
                adapter,
                assistant_id,
            } => {
                let reply = adapter
                    .send_message(&turn.message, assistant_id, turn.thread_id.as_deref())
                    .await?;
                let message = reply.messages.into_iter().last().ok_or_else(|| {
                    ChatGateError::provider(
                        ProviderTag::OpenAIAssistant,
                        "list messages",
                        "Thread has no messages",
                    )
                })?;
                Ok(ChatTurnResponse {
                    message,
                    thread_id: Some(reply.thread_id),
                })
            }
            Provider::Webhook(adapter) => {
                let message = adapter
                    .send_message(
                        &turn.message,
                        turn.thread_id.as_deref(),
                        turn.metadata.as_ref(),
                    )
                    .await?;
                Ok(ChatTurnResponse {
                    message,
                    thread_id: turn.thread_id.clone(),
                })
            }
        }
    }
}

//! Data models for the gateway and the backends it talks to.
//!
//! This module defines the normalized [`Message`] every provider returns, the
//! inbound chat-turn contract, and the wire structures used for OpenAI chat
//! completions, the assistants thread/run API and the n8n webhook.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Returns the role name as the backends spell it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// Identifies which backend handles a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderTag {
    /// Single-shot chat completions; history is resent by the caller
    #[serde(rename = "openai-chat")]
    OpenAIChat,

    /// Stateful assistant threads driven by runs
    #[serde(rename = "openai-assistant")]
    OpenAIAssistant,

    /// Opaque n8n workflow webhook
    #[serde(rename = "n8n")]
    N8n,
}

impl ProviderTag {
    /// Every provider tag the gateway understands.
    pub const ALL: [ProviderTag; 3] = [
        ProviderTag::OpenAIAssistant,
        ProviderTag::OpenAIChat,
        ProviderTag::N8n,
    ];

    /// Returns the tag as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderTag::OpenAIChat => "openai-chat",
            ProviderTag::OpenAIAssistant => "openai-assistant",
            ProviderTag::N8n => "n8n",
        }
    }
}

impl fmt::Display for ProviderTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message in a conversation.
///
/// Messages are immutable once built: the `with_*` methods consume the value
/// and are meant for construction only. Caller-supplied history may omit the
/// id and timestamp, which are then filled in on deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default = "generate_message_id")]
    id: String,

    role: Role,

    content: String,

    #[serde(default = "Utc::now", alias = "timestamp")]
    created_at: DateTime<Utc>,

    #[serde(default, alias = "provider", skip_serializing_if = "Option::is_none")]
    provider_tag: Option<ProviderTag>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    metadata: HashMap<String, Value>,
}

fn generate_message_id() -> String {
    Uuid::new_v4().to_string()
}

impl Message {
    /// Creates a message with a fresh id stamped with the current time.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: generate_message_id(),
            role,
            content: content.into(),
            created_at: Utc::now(),
            provider_tag: None,
            metadata: HashMap::new(),
        }
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Replaces the generated id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Replaces the creation timestamp.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Records which provider produced the message.
    pub fn with_provider(mut self, provider: ProviderTag) -> Self {
        self.provider_tag = Some(provider);
        self
    }

    /// Adds one metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Returns the message id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the author role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the message text.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns when the message was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the provider that produced the message, if known.
    pub fn provider_tag(&self) -> Option<ProviderTag> {
        self.provider_tag
    }

    /// Returns the provider-specific metadata.
    pub fn metadata(&self) -> &HashMap<String, Value> {
        &self.metadata
    }
}

/// Depth of reasoning requested from reasoning-class models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Minimal,
    Low,
    #[default]
    Medium,
    High,
}

/// Output verbosity for the newest reasoning models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Low,
    #[default]
    Medium,
    High,
}

/// One inbound chat turn, as submitted by the browser client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurnRequest {
    /// Text of the new user message
    #[serde(default)]
    pub message: String,

    /// Which backend handles the turn
    pub provider: ProviderTag,

    /// Existing assistant thread, or an opaque thread id forwarded to n8n
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,

    /// Assistant to run; required for the assistant provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_id: Option<String>,

    /// Completion model; the configured default is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<ReasoningEffort>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbosity: Option<Verbosity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Prior conversation for the completion provider, oldest first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<Message>,

    /// Extra data forwarded to the webhook
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
}

impl ChatTurnRequest {
    /// Creates a turn for `provider` with every optional field unset.
    pub fn new(provider: ProviderTag, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            provider,
            thread_id: None,
            assistant_id: None,
            model: None,
            reasoning_effort: None,
            verbosity: None,
            system_prompt: None,
            history: Vec::new(),
            metadata: None,
        }
    }
}

/// The normalized result of a chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurnResponse {
    /// The reply to show
    pub message: Message,

    /// Thread to pass back on the next turn, if the provider has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

/// Status of an assistant run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Expired,
    /// Any status this crate does not know about; polled like `in_progress`
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// Returns true once the run can make no further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled | RunStatus::Expired
        )
    }
}

/// One asynchronous unit of backend work for a single assistant turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub status: RunStatus,
    pub thread_id: String,
    pub assistant_id: String,
}

/// An assistant as listed by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assistant {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// Template data handed from the import flow to the chat flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateImport {
    pub document_name: String,
    #[serde(default)]
    pub notes: String,
    /// Mustache template body
    pub mustache: String,
    /// Document schema body
    pub doc_schema: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

/// Raw template import request; every field may be missing or blank.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateImportRequest {
    #[serde(default)]
    pub document_name: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub mustache: Option<String>,
    #[serde(default)]
    pub doc_schema: Option<String>,
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// Reply to a successful template import.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateImportResponse {
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Wire formats
// ---------------------------------------------------------------------------

/// A role-tagged message as the chat completions endpoint expects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ChatMessage {
    pub role: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role().as_str().to_string(),
            content: Some(message.content().to_string()),
        }
    }
}

/// Request to the chat completions endpoint.
///
/// Exactly one of `max_tokens` and `max_completion_tokens` is set, depending
/// on the model's capability class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ChatRequest {
    pub model: String,

    pub messages: Vec<ChatMessage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<ReasoningEffort>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbosity: Option<Verbosity>,
}

impl ChatRequest {
    /// Creates a request with every optional control unset.
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: None,
            max_completion_tokens: None,
            temperature: None,
            reasoning_effort: None,
            verbosity: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChatMessage,

    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Response from the chat completions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ChatResponse {
    pub id: String,

    pub choices: Vec<ChatChoice>,

    #[serde(default)]
    pub usage: Option<Usage>,
}

/// Token usage statistics for a completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ThreadObject {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TextValue {
    #[serde(default)]
    pub value: String,
}

/// One part of a thread message's content; only `text` parts are rendered.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ContentPart {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub text: Option<TextValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ThreadMessage {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: Vec<ContentPart>,
    /// Unix seconds
    pub created_at: i64,
}

impl ThreadMessage {
    /// Converts to a [`Message`], joining text parts with newlines.
    pub fn into_message(self) -> Message {
        let content = self
            .content
            .iter()
            .filter(|part| part.kind == "text")
            .map(|part| part.text.as_ref().map(|t| t.value.as_str()).unwrap_or(""))
            .collect::<Vec<_>>()
            .join("\n");
        let created_at = Utc
            .timestamp_opt(self.created_at, 0)
            .single()
            .unwrap_or_else(Utc::now);

        Message::new(self.role, content)
            .with_id(self.id)
            .with_created_at(created_at)
            .with_provider(ProviderTag::OpenAIAssistant)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ListResponse<T> {
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AssistantObject {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub model: String,
    #[serde(default)]
    pub instructions: Option<String>,
}

impl From<AssistantObject> for Assistant {
    fn from(obj: AssistantObject) -> Self {
        Self {
            id: obj.id,
            name: obj
                .name
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| "Unnamed Assistant".to_string()),
            description: obj.description,
            model: obj.model,
            instructions: obj.instructions,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ModelObject {
    pub id: String,
}

/// Workflow list from the n8n REST API; `data` may be absent.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WorkflowList {
    #[serde(default)]
    pub data: Option<Vec<Value>>,
}

/// Body posted to the n8n webhook.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WebhookPayload<'a> {
    pub message: &'a str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<&'a str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<&'a HashMap<String, Value>>,
}

//! Server-side gateway tying providers and the session store together.
//!
//! [`ChatGateway`] implements the inbound operations: sending a chat turn to
//! the selected provider, listing assistants, models and workflows, and
//! creating, redeeming and deleting template import sessions.

use crate::client::OpenAIClient;
use crate::clock::{Clock, SystemClock};
use crate::config::GatewayConfig;
use crate::error::ChatGateError;
use crate::models::{
    Assistant, ChatTurnRequest, ChatTurnResponse, ProviderTag, TemplateImport,
    TemplateImportRequest, TemplateImportResponse,
};
use crate::providers::{AssistantAdapter, CompletionAdapter, Provider, WebhookAdapter};
use crate::run::RunPoller;
use crate::session::{FileSessionStore, MemorySessionStore, Session, SessionStats, SessionStore};
use std::sync::Arc;
use tracing::info;

/// Gateway shared by every request handler.
pub struct ChatGateway {
    /// Gateway configuration
    config: GatewayConfig,

    /// OpenAI client; `None` when no API key is configured
    openai: Option<Arc<OpenAIClient>>,

    /// n8n webhook adapter; `None` when no webhook URL is configured
    webhook: Option<Arc<WebhookAdapter>>,

    /// Store for template import sessions
    sessions: Arc<dyn SessionStore>,

    /// Time source for run polling
    clock: Arc<dyn Clock>,
}

impl ChatGateway {
    /// Creates a gateway over an existing session store.
    pub fn new(
        config: GatewayConfig,
        sessions: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ChatGateError> {
        let openai = match config.openai_api_key() {
            Some(_) => Some(Arc::new(OpenAIClient::new(&config)?)),
            None => None,
        };
        let webhook = match config.webhook_url() {
            Some(_) => Some(Arc::new(WebhookAdapter::from_config(&config)?)),
            None => None,
        };
        Ok(Self {
            config,
            openai,
            webhook,
            sessions,
            clock,
        })
    }

    /// Creates a gateway on the system clock with the session store the
    /// configuration asks for: file-backed when a session directory is set,
    /// in-memory otherwise.
    pub async fn from_config(config: GatewayConfig) -> Result<Self, ChatGateError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let sessions: Arc<dyn SessionStore> = match config.session_dir() {
            Some(dir) => {
                info!(dir = %dir.display(), "using file-backed session store");
                Arc::new(FileSessionStore::open(dir, clock.clone(), config.session_ttl()).await?)
            }
            None => Arc::new(MemorySessionStore::new(clock.clone(), config.session_ttl())),
        };
        Self::new(config, sessions, clock)
    }

    /// Returns the gateway configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Returns the session store, e.g. for the background sweeper.
    pub fn sessions(&self) -> Arc<dyn SessionStore> {
        self.sessions.clone()
    }

    fn openai(&self) -> Result<Arc<OpenAIClient>, ChatGateError> {
        self.openai
            .clone()
            .ok_or_else(|| ChatGateError::Config("OpenAI API key not configured".to_string()))
    }

    fn webhook(&self) -> Result<Arc<WebhookAdapter>, ChatGateError> {
        self.webhook
            .clone()
            .ok_or_else(|| ChatGateError::Config("n8n webhook URL not configured".to_string()))
    }

    /// Builds the provider for a turn, checking the fields it requires.
    fn provider_for(&self, turn: &ChatTurnRequest) -> Result<Provider, ChatGateError> {
        match turn.provider {
            ProviderTag::OpenAIChat => Ok(Provider::Completion(CompletionAdapter::new(
                self.openai()?,
                &self.config,
            ))),
            ProviderTag::OpenAIAssistant => {
                let assistant_id = turn
                    .assistant_id
                    .as_deref()
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| {
                        ChatGateError::Validation(
                            "Assistant ID is required for OpenAI Assistant provider".to_string(),
                        )
                    })?;
                let poller = RunPoller::new(self.clock.clone())
                    .with_interval(self.config.poll_interval())
                    .with_timeout(self.config.run_timeout());
                Ok(Provider::Assistant {
                    adapter: AssistantAdapter::new(self.openai()?, poller),
                    assistant_id: assistant_id.to_string(),
                })
            }
            ProviderTag::N8n => Ok(Provider::Webhook(self.webhook()?)),
        }
    }

    /// Sends one chat turn to the provider it names.
    ///
    /// # Errors
    ///
    /// - [`ChatGateError::Validation`] for a blank message or a missing
    ///   per-provider field
    /// - [`ChatGateError::Config`] when the provider's credentials or
    ///   endpoint are missing
    /// - any adapter failure, unchanged
    pub async fn send_chat_turn(&self, turn: &ChatTurnRequest) -> Result<ChatTurnResponse, ChatGateError> {
        if turn.message.trim().is_empty() {
            return Err(ChatGateError::Validation("Message is required".to_string()));
        }

        let provider = self.provider_for(turn)?;
        info!(
            provider = %provider.tag(),
            message_len = turn.message.len(),
            history_len = turn.history.len(),
            system_prompt_len = turn.system_prompt.as_ref().map(String::len),
            "sending chat turn"
        );
        provider.send(turn).await
    }

    /// Lists the most recent assistants.
    pub async fn list_assistants(&self) -> Result<Vec<Assistant>, ChatGateError> {
        self.openai()?.list_assistants().await
    }

    /// Lists the available chat models, falling back to a fixed list when
    /// the backend cannot be reached.
    pub async fn list_models(&self) -> Result<Vec<String>, ChatGateError> {
        Ok(self.openai()?.list_models().await)
    }

    /// Lists the workflows on the configured n8n instance.
    pub async fn list_workflows(&self) -> Result<Vec<serde_json::Value>, ChatGateError> {
        self.webhook()?.list_workflows().await
    }

    /// Executes an n8n workflow and returns its raw result.
    pub async fn execute_workflow(
        &self,
        workflow_id: &str,
        data: &serde_json::Value,
    ) -> Result<serde_json::Value, ChatGateError> {
        self.webhook()?.execute_workflow(workflow_id, data).await
    }

    /// Stores template import data and returns the session handle.
    ///
    /// # Errors
    ///
    /// [`ChatGateError::Validation`] when the document name, template or
    /// schema is missing or blank.
    pub async fn create_import_session(
        &self,
        request: TemplateImportRequest,
    ) -> Result<TemplateImportResponse, ChatGateError> {
        fn required(value: Option<String>, what: &str) -> Result<String, ChatGateError> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ChatGateError::Validation(format!("{} is required", what)))
        }

        let import = TemplateImport {
            document_name: required(request.document_name, "Document name")?,
            notes: request.notes.map(|n| n.trim().to_string()).unwrap_or_default(),
            mustache: required(request.mustache, "Mustache template")?,
            doc_schema: required(request.doc_schema, "Document schema")?,
            thread_id: request.thread_id.filter(|id| !id.trim().is_empty()),
        };

        let session = self.sessions.create(serde_json::to_value(&import)?).await?;
        info!(session_id = %session.id, "created import session");

        Ok(TemplateImportResponse {
            session_id: session.id,
            expires_at: session.expires_at,
        })
    }

    /// Redeems an import session; `None` when it is missing or expired.
    pub async fn get_import_session(&self, session_id: &str) -> Result<Option<Session>, ChatGateError> {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(ChatGateError::Validation("Session ID is required".to_string()));
        }
        self.sessions.get(session_id).await
    }

    /// Deletes an import session and reports whether a live one was removed.
    pub async fn delete_import_session(&self, session_id: &str) -> Result<bool, ChatGateError> {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(ChatGateError::Validation("Session ID is required".to_string()));
        }
        if self.sessions.get(session_id).await?.is_none() {
            return Ok(false);
        }
        self.sessions.delete(session_id).await
    }

    /// Reports session store counts.
    pub async fn session_stats(&self) -> Result<SessionStats, ChatGateError> {
        self.sessions.stats().await
    }
}

//! A multi-provider chat gateway.
//!
//! This library forwards chat turns to one of three structurally different
//! backends and normalizes their results into a single [`Message`] contract:
//!
//! - `openai-chat`: single-shot chat completions, with the caller resending
//!   the conversation on every turn
//! - `openai-assistant`: stateful assistant threads, driven run by run to
//!   completion
//! - `n8n`: an opaque workflow webhook
//!
//! It also keeps short-lived import sessions that hand template data from one
//! request flow to a later, independent one.
//!
//! # Basic usage
//!
//! ```rust,no_run
//! use chatgate::{ChatGateway, ChatTurnRequest, Config, ProviderTag};
//!
//! # async fn example() -> Result<(), chatgate::Error> {
//! let config = Config::new().with_openai_api_key("your-api-key");
//! let gateway = ChatGateway::from_config(config).await?;
//!
//! let mut turn = ChatTurnRequest::new(ProviderTag::OpenAIChat, "Tell me about Rust.");
//! turn.system_prompt = Some("You are a helpful assistant.".to_string());
//!
//! let response = gateway.send_chat_turn(&turn).await?;
//! println!("{}", response.message.content());
//! # Ok(())
//! # }
//! ```

// Internal modules
mod client;
mod config;
mod error;

pub mod capability;
pub mod clock;
pub mod http;
pub mod models;
pub mod providers;
pub mod run;
pub mod server;
pub mod session;

// Public exports for the prelude
pub mod prelude {
    //! Commonly used types and traits
    //!
    //! This module re-exports the most commonly used types and traits from the crate
    //! to make them more easily accessible.

    pub use crate::client::OpenAIClient;
    pub use crate::config::GatewayConfig as Config;
    pub use crate::error::ChatGateError as Error;
    pub use crate::models::{ChatTurnRequest, ChatTurnResponse, Message, ProviderTag, Role};
    pub use crate::server::ChatGateway;
    pub use crate::session::{Session, SessionStore};
}

// Direct exports for the main API surface
pub use prelude::*;

pub use crate::client::FALLBACK_MODELS;
pub use crate::capability::{ModelClass, RequestShape, TokenLimitField};
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::config::GatewayConfig;
pub use crate::error::ChatGateError;
pub use crate::providers::{
    AssistantAdapter, AssistantReply, CompletionAdapter, CompletionOptions, Provider,
    WebhookAdapter,
};
pub use crate::run::{RunPoller, RunSource};
pub use crate::session::{FileSessionStore, MemorySessionStore, SessionStats, spawn_sweeper};

//! Stateful assistant provider.
//!
//! A turn creates a thread when none is given, appends the user message,
//! starts a run, drives it to completion with the [`RunPoller`] and then
//! returns the thread's full message list. The backend owns the history, so
//! the whole list goes back to the caller, whose reply is the last entry.

use crate::client::OpenAIClient;
use crate::error::ChatGateError;
use crate::models::{Message, ProviderTag, RunStatus};
use crate::run::RunPoller;
use std::sync::Arc;
use tracing::{debug, info};

/// The outcome of one assistant turn.
#[derive(Debug, Clone)]
pub struct AssistantReply {
    /// Every message on the thread, oldest first
    pub messages: Vec<Message>,

    /// The thread the turn ran on; new when the caller supplied none
    pub thread_id: String,
}

/// Runs turns against assistant threads.
pub struct AssistantAdapter {
    client: Arc<OpenAIClient>,
    poller: RunPoller,
}

impl AssistantAdapter {
    /// Creates an adapter that drives runs with `poller`.
    pub fn new(client: Arc<OpenAIClient>, poller: RunPoller) -> Self {
        Self { client, poller }
    }

    /// Sends `content` to `assistant_id`, on `thread_id` when given.
    ///
    /// Nothing is retried: a failure after the thread was created or the
    /// message appended leaves those side effects in place.
    ///
    /// # Errors
    ///
    /// Fails with [`ChatGateError::Provider`] on backend errors or a run that
    /// ends in any state but `completed`, and with the poller's errors on
    /// timeout or a request for action.
    pub async fn send_message(
        &self,
        content: &str,
        assistant_id: &str,
        thread_id: Option<&str>,
    ) -> Result<AssistantReply, ChatGateError> {
        let thread_id = match thread_id.filter(|id| !id.trim().is_empty()) {
            Some(id) => id.to_string(),
            None => {
                let id = self.client.create_thread().await?;
                info!(thread_id = %id, "created assistant thread");
                id
            }
        };

        self.client.add_message(&thread_id, content).await?;

        let run = self.client.create_run(&thread_id, assistant_id).await?;
        debug!(thread_id = %thread_id, run_id = %run.id, assistant_id, "created run");

        let run = self
            .poller
            .wait_for_completion(&*self.client, &thread_id, &run.id)
            .await?;

        if run.status != RunStatus::Completed {
            return Err(ChatGateError::provider(
                ProviderTag::OpenAIAssistant,
                "wait for run",
                format!("Run {} ended with status {:?}", run.id, run.status),
            ));
        }

        let messages = self
            .client
            .list_messages(&thread_id)
            .await?
            .into_iter()
            .map(|message| message.into_message())
            .collect();

        Ok(AssistantReply { messages, thread_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::GatewayConfig;
    use crate::models::Role;
    use mockito::{Matcher, ServerGuard};
    use serde_json::json;
    use std::time::Duration;

    fn adapter(server: &ServerGuard) -> AssistantAdapter {
        let config = GatewayConfig::new()
            .with_openai_api_key("test-api-key")
            .with_openai_base_url(server.url());
        let poller = RunPoller::new(Arc::new(ManualClock::starting_now()))
            .with_interval(Duration::from_secs(1))
            .with_timeout(Duration::from_secs(5));
        AssistantAdapter::new(Arc::new(OpenAIClient::new(&config).unwrap()), poller)
    }

    fn run_body(status: &str) -> String {
        json!({"id": "run_1", "status": status, "thread_id": "thread_1", "assistant_id": "asst_1"})
            .to_string()
    }

    #[tokio::test]
    async fn creates_thread_and_returns_full_history() {
        let mut server = mockito::Server::new_async().await;
        let create_thread = server
            .mock("POST", "/threads")
            .with_status(200)
            .with_body(r#"{"id":"thread_1","object":"thread"}"#)
            .create_async()
            .await;
        let add_message = server
            .mock("POST", "/threads/thread_1/messages")
            .match_body(Matcher::Json(json!({"role": "user", "content": "Hello"})))
            .with_status(200)
            .with_body(r#"{"id":"msg_1"}"#)
            .create_async()
            .await;
        let create_run = server
            .mock("POST", "/threads/thread_1/runs")
            .match_body(Matcher::Json(json!({"assistant_id": "asst_1"})))
            .with_status(200)
            .with_body(run_body("queued"))
            .create_async()
            .await;
        let poll = server
            .mock("GET", "/threads/thread_1/runs/run_1")
            .with_status(200)
            .with_body(run_body("completed"))
            .expect(1)
            .create_async()
            .await;
        let list = server
            .mock("GET", "/threads/thread_1/messages")
            .match_query(Matcher::UrlEncoded("order".into(), "asc".into()))
            .with_status(200)
            .with_body(
                json!({"data": [
                    {"id": "msg_1", "role": "user", "created_at": 10, "content": [{"type": "text", "text": {"value": "Hello"}}]},
                    {"id": "msg_2", "role": "assistant", "created_at": 11, "content": [{"type": "text", "text": {"value": "Hi!"}}]}
                ]})
                .to_string(),
            )
            .create_async()
            .await;

        let reply = adapter(&server).send_message("Hello", "asst_1", None).await.unwrap();

        create_thread.assert_async().await;
        add_message.assert_async().await;
        create_run.assert_async().await;
        poll.assert_async().await;
        list.assert_async().await;

        assert_eq!(reply.thread_id, "thread_1");
        assert_eq!(reply.messages.len(), 2);
        let last = reply.messages.last().unwrap();
        assert_eq!(last.role(), Role::Assistant);
        assert_eq!(last.content(), "Hi!");
    }

    #[tokio::test]
    async fn reuses_existing_thread() {
        let mut server = mockito::Server::new_async().await;
        let create_thread = server
            .mock("POST", "/threads")
            .expect(0)
            .create_async()
            .await;
        let _add = server
            .mock("POST", "/threads/thread_1/messages")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        let _run = server
            .mock("POST", "/threads/thread_1/runs")
            .with_status(200)
            .with_body(run_body("in_progress"))
            .create_async()
            .await;
        let _poll = server
            .mock("GET", "/threads/thread_1/runs/run_1")
            .with_status(200)
            .with_body(run_body("completed"))
            .create_async()
            .await;
        let _list = server
            .mock("GET", "/threads/thread_1/messages")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"data":[]}"#)
            .create_async()
            .await;

        let reply = adapter(&server)
            .send_message("Again", "asst_1", Some("thread_1"))
            .await
            .unwrap();

        create_thread.assert_async().await;
        assert_eq!(reply.thread_id, "thread_1");
    }

    #[tokio::test]
    async fn failed_run_does_not_list_messages() {
        let mut server = mockito::Server::new_async().await;
        let _add = server
            .mock("POST", "/threads/thread_1/messages")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        let _run = server
            .mock("POST", "/threads/thread_1/runs")
            .with_status(200)
            .with_body(run_body("queued"))
            .create_async()
            .await;
        let _poll = server
            .mock("GET", "/threads/thread_1/runs/run_1")
            .with_status(200)
            .with_body(run_body("failed"))
            .create_async()
            .await;
        let list = server
            .mock("GET", "/threads/thread_1/messages")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let err = adapter(&server)
            .send_message("Hello", "asst_1", Some("thread_1"))
            .await
            .unwrap_err();

        list.assert_async().await;
        assert!(err.to_string().contains("Failed"));
    }

    #[tokio::test]
    async fn stuck_run_times_out() {
        let mut server = mockito::Server::new_async().await;
        let _add = server
            .mock("POST", "/threads/thread_1/messages")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        let _run = server
            .mock("POST", "/threads/thread_1/runs")
            .with_status(200)
            .with_body(run_body("queued"))
            .create_async()
            .await;
        let poll = server
            .mock("GET", "/threads/thread_1/runs/run_1")
            .with_status(200)
            .with_body(run_body("in_progress"))
            .expect(5)
            .create_async()
            .await;

        let err = adapter(&server)
            .send_message("Hello", "asst_1", Some("thread_1"))
            .await
            .unwrap_err();

        poll.assert_async().await;
        assert!(matches!(err, ChatGateError::RunTimeout { .. }));
    }
}

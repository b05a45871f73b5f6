//! Run completion state machine.
//!
//! An assistant turn is processed by a backend "run" that moves through
//! `queued → in_progress → {completed | failed | cancelled | expired}`. The
//! [`RunPoller`] drives one run to a terminal state by polling its status on
//! a constant interval, giving up with [`ChatGateError::RunTimeout`] once its
//! wall-clock budget is spent. A `requires_action` observation fails at once
//! with [`ChatGateError::UnsupportedAction`], since tool calls are not
//! implemented.
//!
//! The poller never serializes calls on one thread: callers must not run two
//! turns against the same thread at the same time.

use crate::clock::{Clock, elapsed};
use crate::error::ChatGateError;
use crate::models::{Run, RunStatus};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Anything that can report the current state of a run.
#[async_trait]
pub trait RunSource: Send + Sync {
    /// Fetches the run's current state.
    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ChatGateError>;
}

/// Polls a run until it reaches a terminal state.
#[derive(Clone)]
pub struct RunPoller {
    clock: Arc<dyn Clock>,
    interval: Duration,
    timeout: Duration,
}

impl RunPoller {
    /// Creates a poller with a 1 second interval and a 30 second budget.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the constant delay between polls.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the wall-clock budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the delay between polls.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the wall-clock budget.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Waits for `run_id` to finish and returns its terminal state.
    ///
    /// The terminal state may be `failed`, `cancelled` or `expired`; judging
    /// those is up to the caller.
    ///
    /// # Errors
    ///
    /// - [`ChatGateError::UnsupportedAction`] on the first `requires_action`
    /// - [`ChatGateError::RunTimeout`] once the budget has elapsed
    /// - whatever `source` returns when a status fetch fails
    pub async fn wait_for_completion(
        &self,
        source: &dyn RunSource,
        thread_id: &str,
        run_id: &str,
    ) -> Result<Run, ChatGateError> {
        let started = self.clock.now();
        let mut polls = 0usize;

        loop {
            let waited = elapsed(started, self.clock.now());
            if waited >= self.timeout {
                return Err(ChatGateError::RunTimeout {
                    run_id: run_id.to_string(),
                    waited,
                });
            }

            let run = source.retrieve_run(thread_id, run_id).await?;
            polls += 1;

            match run.status {
                status if status.is_terminal() => {
                    debug!(run_id, ?status, polls, "run reached terminal state");
                    return Ok(run);
                }
                RunStatus::RequiresAction => {
                    return Err(ChatGateError::UnsupportedAction {
                        run_id: run_id.to_string(),
                    });
                }
                status => {
                    debug!(run_id, ?status, polls, "run still pending");
                    self.clock.sleep(self.interval).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays a scripted list of statuses, repeating the last one forever.
    struct ScriptedRun {
        script: Mutex<Vec<RunStatus>>,
        polls: AtomicUsize,
    }

    impl ScriptedRun {
        fn new(script: Vec<RunStatus>) -> Self {
            Self {
                script: Mutex::new(script),
                polls: AtomicUsize::new(0),
            }
        }

        fn pending_then(pending: usize, last: RunStatus) -> Self {
            let mut script = vec![RunStatus::InProgress; pending];
            script.push(last);
            Self::new(script)
        }

        fn polls(&self) -> usize {
            self.polls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RunSource for ScriptedRun {
        async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ChatGateError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            let status = if script.len() > 1 {
                script.remove(0)
            } else {
                script[0]
            };
            Ok(Run {
                id: run_id.to_string(),
                status,
                thread_id: thread_id.to_string(),
                assistant_id: "asst_1".to_string(),
            })
        }
    }

    fn poller(clock: &Arc<ManualClock>) -> RunPoller {
        RunPoller::new(clock.clone())
            .with_interval(Duration::from_secs(1))
            .with_timeout(Duration::from_secs(30))
    }

    #[tokio::test]
    async fn completes_after_n_plus_one_polls() {
        for pending in [0, 1, 5, 12] {
            let clock = Arc::new(ManualClock::starting_now());
            let start = clock.now();
            let source = ScriptedRun::pending_then(pending, RunStatus::Completed);

            let run = poller(&clock)
                .wait_for_completion(&source, "thread_1", "run_1")
                .await
                .unwrap();

            assert_eq!(run.status, RunStatus::Completed);
            assert_eq!(source.polls(), pending + 1);
            assert!(elapsed(start, clock.now()) < Duration::from_secs(30));
        }
    }

    #[tokio::test]
    async fn queued_counts_as_pending() {
        let clock = Arc::new(ManualClock::starting_now());
        let source = ScriptedRun::new(vec![
            RunStatus::Queued,
            RunStatus::InProgress,
            RunStatus::Completed,
        ]);

        let run = poller(&clock)
            .wait_for_completion(&source, "thread_1", "run_1")
            .await
            .unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(source.polls(), 3);
    }

    #[tokio::test]
    async fn failed_runs_are_returned_not_raised() {
        for terminal in [RunStatus::Failed, RunStatus::Cancelled, RunStatus::Expired] {
            let clock = Arc::new(ManualClock::starting_now());
            let source = ScriptedRun::pending_then(2, terminal);
            let run = poller(&clock)
                .wait_for_completion(&source, "thread_1", "run_1")
                .await
                .unwrap();
            assert_eq!(run.status, terminal);
        }
    }

    #[tokio::test]
    async fn never_finishing_run_times_out_at_budget() {
        let clock = Arc::new(ManualClock::starting_now());
        let start = clock.now();
        let source = ScriptedRun::new(vec![RunStatus::InProgress]);

        let err = poller(&clock)
            .wait_for_completion(&source, "thread_1", "run_1")
            .await
            .unwrap_err();

        match err {
            ChatGateError::RunTimeout { run_id, waited } => {
                assert_eq!(run_id, "run_1");
                assert!(waited >= Duration::from_secs(30));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(elapsed(start, clock.now()) >= Duration::from_secs(30));
        assert_eq!(source.polls(), 30);
    }

    #[tokio::test]
    async fn requires_action_fails_on_first_observation() {
        let clock = Arc::new(ManualClock::starting_now());
        let start = clock.now();
        let source = ScriptedRun::pending_then(1, RunStatus::RequiresAction);

        let err = poller(&clock)
            .wait_for_completion(&source, "thread_1", "run_1")
            .await
            .unwrap_err();

        assert!(matches!(err, ChatGateError::UnsupportedAction { .. }));
        assert_eq!(source.polls(), 2);
        assert_eq!(elapsed(start, clock.now()), Duration::from_secs(1));
    }
}

// src/agent/session.rs — Conversation session with the hosted agent
//
// One thread per session, one run in flight per thread. A submission holds the
// session lock from posting the message until the run is terminal, so turns are
// strictly serialized. A run abandoned on timeout or cancellation stays
// recorded as pending and is waited out before the next message is posted.
// That wait shares the next submission's deadline; if it runs out the old run
// is cancelled again, dropped as failed, and the new message is not sent.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::{AgentService, AssistantInfo, Run, RunStatus};
use crate::core::{Role, Turn};
use crate::infra::errors::ParleyError;

/// Progress notifications for one submission.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    WaitingOnPrevious { run_id: String },
    MessageSent,
    RunStarted { run_id: String },
    StatusCheck { check: u32, status: RunStatus },
    RunFinished { status: RunStatus, checks: u32 },
    Abandoned { run_id: String },
}

/// Result of a completed turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub run_id: String,
    /// Most recent agent turn in the thread.
    pub reply: Turn,
    /// Full thread history, oldest first.
    pub history: Vec<Turn>,
    /// Number of `get_run` calls made while waiting.
    pub status_checks: u32,
}

pub struct AgentSession {
    service: Arc<dyn AgentService>,
    assistant: AssistantInfo,
    thread_id: String,
    interval: Duration,
    timeout: Duration,
    /// Id of a run that may still be pending. Guarded for the whole submission.
    pending: Mutex<Option<String>>,
    progress: Option<Box<dyn Fn(TurnEvent) + Send + Sync>>,
}

impl AgentSession {
    /// Resolve the assistant and create the thread backing this session.
    pub async fn open(
        service: Arc<dyn AgentService>,
        assistant_id: &str,
        interval: Duration,
        timeout: Duration,
    ) -> Result<Self, ParleyError> {
        let assistant = service.retrieve_assistant(assistant_id).await?;
        let thread_id = service.create_thread().await?;
        tracing::info!(
            assistant = assistant.display_name(),
            thread_id = %thread_id,
            "Agent session opened"
        );

        Ok(Self {
            service,
            assistant,
            thread_id,
            interval,
            timeout,
            pending: Mutex::new(None),
            progress: None,
        })
    }

    pub fn with_progress(mut self, progress: impl Fn(TurnEvent) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    pub fn assistant(&self) -> &AssistantInfo {
        &self.assistant
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether an abandoned run is still recorded as possibly pending.
    pub async fn has_pending_run(&self) -> bool {
        self.pending.lock().await.is_some()
    }

    pub async fn submit_turn(&self, content: &str) -> Result<TurnOutcome, ParleyError> {
        self.submit_turn_cancellable(content, &CancellationToken::new())
            .await
    }

    /// Post `content`, start a run and wait for it to finish.
    ///
    /// The whole call, including settling an earlier abandoned run, is bounded
    /// by the session timeout. Fails with `Timeout` when the run is still
    /// pending at the deadline, or `Cancelled` when `cancel` fires first. In
    /// both cases the run is cancelled on a best-effort basis and not
    /// resubmitted. Fails with `PreviousRunPending` when an earlier run could
    /// not be settled in time; that run is then dropped.
    pub async fn submit_turn_cancellable(
        &self,
        content: &str,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, ParleyError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ParleyError::EmptyTurn);
        }

        let mut pending = self.pending.lock().await;
        let started = Instant::now();

        if let Some(previous) = pending.clone() {
            self.emit(TurnEvent::WaitingOnPrevious {
                run_id: previous.clone(),
            });
            match self
                .await_terminal(Run::new(previous.clone(), RunStatus::Queued), cancel, started)
                .await
            {
                Ok((run, _)) => {
                    tracing::info!(run_id = %run.id, status = %run.status, "Previous run settled");
                }
                Err(ParleyError::Timeout { .. }) => {
                    self.abandon(&previous).await;
                    *pending = None;
                    tracing::warn!(run_id = %previous, "Previous run never settled, dropped as failed");
                    return Err(ParleyError::PreviousRunPending { run_id: previous });
                }
                Err(e) => return Err(e),
            }
            *pending = None;
        }

        self.service.add_message(&self.thread_id, content).await?;
        self.emit(TurnEvent::MessageSent);

        let run = self
            .service
            .create_run(&self.thread_id, &self.assistant.id)
            .await?;
        let run_id = run.id.clone();
        *pending = Some(run_id.clone());
        self.emit(TurnEvent::RunStarted {
            run_id: run_id.clone(),
        });
        tracing::debug!(run_id = %run_id, status = %run.status, "Run created");

        let (run, checks) = match self.await_terminal(run, cancel, started).await {
            Ok(done) => done,
            Err(e @ (ParleyError::Timeout { .. } | ParleyError::Cancelled { .. })) => {
                self.abandon(&run_id).await;
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        *pending = None;
        self.emit(TurnEvent::RunFinished {
            status: run.status,
            checks,
        });

        if run.status != RunStatus::Completed {
            let history = match self.service.list_messages(&self.thread_id).await {
                Ok(history) => history,
                Err(e) => {
                    tracing::warn!("Could not fetch history after failed run: {}", e);
                    Vec::new()
                }
            };
            return Err(ParleyError::JobFailed {
                run_id,
                status: run.status,
                reason: run
                    .last_error
                    .unwrap_or_else(|| "no reason given".to_string()),
                last_reply: last_agent_turn(&history).map(|t| t.content().to_string()),
                history,
            });
        }

        let history = self.service.list_messages(&self.thread_id).await?;
        let reply = last_agent_turn(&history)
            .cloned()
            .unwrap_or_else(|| Turn::agent(""));

        Ok(TurnOutcome {
            run_id,
            reply,
            history,
            status_checks: checks,
        })
    }

    /// Poll until `run` leaves the pending states, bounded by `cancel` and by
    /// the session timeout counted from `started`. Returns the terminal run and
    /// the number of checks.
    async fn await_terminal(
        &self,
        run: Run,
        cancel: &CancellationToken,
        started: Instant,
    ) -> Result<(Run, u32), ParleyError> {
        let run_id = run.id.clone();
        let deadline = started + self.timeout;

        let poll = async move {
            let mut run = run;
            let mut checks = 0u32;
            while run.status.is_pending() {
                run = self.service.get_run(&self.thread_id, &run.id).await?;
                checks += 1;
                self.emit(TurnEvent::StatusCheck {
                    check: checks,
                    status: run.status,
                });
                if run.status.is_pending() {
                    tokio::time::sleep(self.interval).await;
                }
            }
            Ok::<_, ParleyError>((run, checks))
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(ParleyError::Cancelled { run_id }),
            result = tokio::time::timeout_at(deadline, poll) => match result {
                Ok(done) => done,
                Err(_) => Err(ParleyError::Timeout {
                    run_id,
                    waited_ms: started.elapsed().as_millis() as u64,
                }),
            },
        }
    }

    async fn abandon(&self, run_id: &str) {
        self.emit(TurnEvent::Abandoned {
            run_id: run_id.to_string(),
        });
        match self.service.cancel_run(&self.thread_id, run_id).await {
            Ok(run) if run.status.is_terminal() => {
                tracing::info!(run_id, status = %run.status, "Abandoned run cancelled")
            }
            Ok(run) => tracing::info!(run_id, status = %run.status, "Cancellation requested"),
            Err(e) => tracing::warn!(run_id, "Could not cancel abandoned run: {}", e),
        }
    }

    fn emit(&self, event: TurnEvent) {
        if let Some(progress) = &self.progress {
            progress(event);
        }
    }
}

fn last_agent_turn(history: &[Turn]) -> Option<&Turn> {
    history.iter().rev().find(|t| t.role() == Role::Agent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_agent_turn() {
        let history = vec![
            Turn::user("Hello"),
            Turn::agent("Hi"),
            Turn::user("Menu?"),
        ];
        assert_eq!(last_agent_turn(&history), Some(&Turn::agent("Hi")));
        assert_eq!(last_agent_turn(&[Turn::user("x")]), None);
    }
}

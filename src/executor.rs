//! The crate's front door: `AgentExecutor` wraps [`crate::coordinator::AgentExecutionCoordinator`]
//! with bounded concurrency, a per-request deadline, run-scoped context and
//! the MDC-like logging tag, matching the way `cloudllm::agent::Agent`
//! exposes one call surface over the collaborators it wires together
//! internally.

use crate::context::{with_run_scope, RunContext};
use crate::coordinator::AgentExecutionCoordinator;
use crate::error::{AgentError, ErrorCode};
use crate::model::{AgentCommand, AgentResult};
use log::error;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_stream::wrappers::ReceiverStream;

/// Bounds concurrent executions and enforces the per-request deadline around
/// one [`AgentExecutionCoordinator`].
pub struct AgentExecutor {
    coordinator: Arc<AgentExecutionCoordinator>,
    semaphore: Arc<Semaphore>,
    request_timeout: Duration,
}

impl AgentExecutor {
    pub fn new(coordinator: AgentExecutionCoordinator, max_concurrent_requests: usize, request_timeout: Duration) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
            semaphore: Arc::new(Semaphore::new(max_concurrent_requests.max(1))),
            request_timeout,
        }
    }

    /// Runs one command to completion. Acquires a concurrency permit before
    /// doing any work and releases it on every exit path, including the
    /// deadline being exceeded.
    pub async fn execute(&self, command: AgentCommand) -> AgentResult {
        let started = Instant::now();
        let Ok(_permit) = self.semaphore.acquire().await else {
            return AgentResult::failure(&AgentError::Cancelled, started.elapsed().as_millis() as u64);
        };

        let context = RunContext::new(
            command.user_id.clone().unwrap_or_else(|| "anonymous".to_string()),
            command.user_prompt.clone(),
            command.metadata.clone(),
        );
        let run_id = context.run_id.clone();

        let coordinator = self.coordinator.clone();
        let context_for_run = context.clone();
        let body = coordinator.execute(&context_for_run, command, started);

        match with_run_scope(run_id, tokio::time::timeout(self.request_timeout, body)).await {
            Ok(result) => result,
            Err(_) => {
                let error = AgentError::Timeout(format!(
                    "execution exceeded requestTimeoutMs ({} ms)",
                    self.request_timeout.as_millis()
                ));
                self.coordinator.run_after_complete_on_abort(&context).await;
                self.coordinator.metrics().record_execution(
                    false,
                    started.elapsed().as_millis() as u64,
                    Some(ErrorCode::Timeout.as_str()),
                );
                error!("run {} timed out after {:?}", context.run_id, started.elapsed());
                AgentResult::failure(&error, started.elapsed().as_millis() as u64)
            }
        }
    }

    /// Streaming counterpart: spawns the coordinator's streaming path as a
    /// background task and returns the receiving half immediately, matching
    /// the lazy-sequence contract the interface promises. Deadline and
    /// concurrency bookkeeping happen inside the spawned task since the
    /// stream is driven to completion by the caller polling it, not by this
    /// call returning.
    pub fn execute_stream(&self, command: AgentCommand) -> ReceiverStream<String> {
        let started = Instant::now();
        let (tx, rx) = crate::streaming_react_loop::new_stream_channel(64);

        let coordinator = self.coordinator.clone();
        let semaphore = self.semaphore.clone();
        let request_timeout = self.request_timeout;

        tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire().await else {
                return;
            };

            let context = RunContext::new(
                command.user_id.clone().unwrap_or_else(|| "anonymous".to_string()),
                command.user_prompt.clone(),
                command.metadata.clone(),
            );
            let run_id = context.run_id.clone();
            let sender = tx.clone();

            let body = coordinator.execute_stream(&context, command, started, sender.clone());
            if with_run_scope(run_id, tokio::time::timeout(request_timeout, body)).await.is_err() {
                let marker = crate::stream::StreamEventMarker::Error {
                    message: format!("execution exceeded requestTimeoutMs ({} ms)", request_timeout.as_millis()),
                };
                let _ = sender.send(marker.encode()).await;
                coordinator.run_after_complete_on_abort(&context).await;
                coordinator.metrics().record_execution(
                    false,
                    started.elapsed().as_millis() as u64,
                    Some(ErrorCode::Timeout.as_str()),
                );
            }
        });

        rx
    }
}

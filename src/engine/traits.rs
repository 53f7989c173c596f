//! Container engine trait.

use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::error::{DeveError, DeveResult};

use super::logs::LogLine;
use super::response::is_action_success;
use super::types::{Completion, Container, ContainerFilters, RunOutcome, RunSpec, WaitStatus};

/// Operations the workflows need from a container engine.
///
/// `EngineClient` talks to a real engine socket; tests substitute a
/// scripted engine.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// List containers matching `filters`. No match is an empty list.
    async fn find_containers(&self, filters: &ContainerFilters) -> DeveResult<Vec<Container>>;

    /// Start a container. Returns the engine's status code unchanged.
    async fn start_container(&self, id: &str) -> DeveResult<u16>;

    /// Stop a container. Returns the engine's status code unchanged.
    async fn stop_container(&self, id: &str) -> DeveResult<u16>;

    /// Restart a container. Returns the engine's status code unchanged.
    async fn restart_container(&self, id: &str) -> DeveResult<u16>;

    /// Create a container and return its id.
    async fn create_container(&self, spec: &RunSpec) -> DeveResult<String>;

    /// Block until the container exits.
    async fn wait_container(&self, id: &str) -> DeveResult<WaitStatus>;

    /// Output of a container that has already exited.
    async fn container_logs(&self, id: &str) -> DeveResult<Vec<LogLine>>;

    /// Delete a container. Returns the engine's status code unchanged.
    async fn remove_container(&self, id: &str, force: bool) -> DeveResult<u16>;

    /// Whether `run_to_completion` should fetch the container's output.
    fn streams_logs(&self) -> bool {
        false
    }

    /// Create, start and wait for a container, then delete it.
    ///
    /// Exactly one create, start, wait and delete are issued once the
    /// container exists. The delete always happens and its failure is only
    /// logged, and it also runs when start or wait panics; the panic is
    /// resumed afterwards. A start failure skips the wait. When `deadline`
    /// fires before the container exits, the delete is forced and the
    /// outcome is `Completion::TimedOut`.
    async fn run_to_completion(
        &self,
        spec: &RunSpec,
        deadline: Option<Duration>,
    ) -> DeveResult<RunOutcome> {
        let id = self.create_container(spec).await?;
        debug!(container = %id, image = %spec.image, "Container created");

        let driven = AssertUnwindSafe(drive_to_exit(self, &id, deadline))
            .catch_unwind()
            .await;

        let force = !matches!(driven, Ok(Ok((Completion::Exited { .. }, _))));
        match self.remove_container(&id, force).await {
            Ok(status) if (200..300).contains(&status) => {
                debug!(container = %id, force, "Container removed");
            }
            Ok(status) => warn!(container = %id, status, "Engine refused to remove container"),
            Err(e) => warn!(container = %id, error = %e, "Failed to remove container"),
        }

        let (completion, logs) = match driven {
            Ok(driven) => driven?,
            Err(payload) => panic::resume_unwind(payload),
        };
        Ok(RunOutcome {
            container_id: id,
            completion,
            logs,
        })
    }
}

async fn drive_to_exit<E>(
    engine: &E,
    id: &str,
    deadline: Option<Duration>,
) -> DeveResult<(Completion, Vec<LogLine>)>
where
    E: ContainerEngine + ?Sized,
{
    let status = engine.start_container(id).await?;
    if !is_action_success(status) {
        return Err(DeveError::unexpected_status("start", id, status));
    }

    let waited = match deadline {
        Some(limit) => match tokio::time::timeout(limit, engine.wait_container(id)).await {
            Ok(waited) => waited?,
            Err(_) => {
                warn!(
                    container = %id,
                    timeout_secs = limit.as_secs(),
                    "Container did not exit before the deadline"
                );
                return Ok((Completion::TimedOut { after: limit }, Vec::new()));
            }
        },
        None => engine.wait_container(id).await?,
    };

    if let Some(error) = &waited.error {
        if !error.message.is_empty() {
            warn!(container = %id, message = %error.message, "Engine reported a wait error");
        }
    }
    info!(container = %id, status_code = waited.status_code, "Container exited");

    let logs = if engine.streams_logs() {
        match engine.container_logs(id).await {
            Ok(logs) => logs,
            Err(e) => {
                warn!(container = %id, error = %e, "Failed to fetch container logs");
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    Ok((
        Completion::Exited {
            status_code: waited.status_code,
        },
        logs,
    ))
}

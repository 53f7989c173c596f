//! Stop, issue, restart.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::{IssuanceConfig, Settings};
use crate::engine::{is_action_success, Completion, ContainerEngine, ContainerFilters};
use crate::error::DeveError;

use super::outcome::{
    ContainerRef, IssuanceOutcome, IssuanceStatus, RestartRecord, RestartReport, StopFailure,
    Verdict,
};
use super::plan::certificate_run_spec;
use super::progress::{Progress, TracingProgress};
use super::request::IssuanceRequest;

/// Runs certificate issuance around the web containers that hold the
/// challenge port.
///
/// Every container stopped by [`issue`](Self::issue) gets exactly one
/// restart attempt, whatever the Issue step does, including panicking.
pub struct CertificateOrchestrator<E: ContainerEngine> {
    engine: E,
    web_images: Vec<String>,
    restart_images: Vec<String>,
    issuance: IssuanceConfig,
    wait_timeout: Option<Duration>,
    progress: Arc<dyn Progress>,
}

impl<E: ContainerEngine> CertificateOrchestrator<E> {
    pub fn new(engine: E, settings: &Settings) -> Self {
        Self {
            engine,
            web_images: settings.containers.web_images.clone(),
            restart_images: settings.containers.restart_images.clone(),
            issuance: settings.issuance.clone(),
            wait_timeout: settings.engine.wait_timeout(),
            progress: Arc::new(TracingProgress),
        }
    }

    /// Send progress lines somewhere other than `tracing`.
    pub fn with_progress(mut self, progress: Arc<dyn Progress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Run one issuance attempt for `request`.
    ///
    /// Never returns an error: every failure is recorded in the outcome.
    pub async fn issue(&self, request: &IssuanceRequest) -> IssuanceOutcome {
        let mut outcome = IssuanceOutcome::new(request);
        let span = info_span!(
            "issuance",
            run_id = %outcome.run_id,
            domain = %outcome.domain,
            dry_run = outcome.dry_run
        );

        self.run(request, &mut outcome).instrument(span).await;
        outcome.finish();

        let summary = outcome.summary();
        match outcome.verdict() {
            Verdict::Created => self.progress.success(&summary),
            _ => self.progress.error(&summary),
        }

        info!(
            run_id = %outcome.run_id,
            verdict = ?outcome.verdict(),
            failure = ?outcome.failure_kind(),
            "Issuance run finished"
        );
        outcome
    }

    async fn run(&self, request: &IssuanceRequest, outcome: &mut IssuanceOutcome) {
        info!("Looking for running web containers");
        let filters = ContainerFilters::new()
            .status("running")
            .ancestors(self.web_images.iter().cloned());

        let containers = match self.engine.find_containers(&filters).await {
            Ok(containers) => containers,
            Err(e) => {
                self.progress
                    .error(&format!("Could not list web containers: {}", e));
                outcome.discovery_error = Some(e);
                return;
            }
        };

        if containers.is_empty() {
            self.progress.info("No running web containers found.");
        }
        outcome.discovered = containers.iter().map(ContainerRef::from).collect();

        for container in containers.iter().map(ContainerRef::from) {
            match self.stop_one(&container).await {
                Ok(()) => {
                    self.progress
                        .info(&format!("Container {} stopped.", container.name));
                    outcome.stopped.push(container);
                }
                Err(error) => {
                    self.progress.error(&format!(
                        "Could not stop container {}: {}",
                        container.name, error
                    ));
                    outcome.stop_failures.push(StopFailure { container, error });
                }
            }
        }

        let proceed = outcome.stop_failures.is_empty();
        if !proceed {
            warn!(
                failed = outcome.stop_failures.len(),
                "Skipping issuance, web server could not be stopped"
            );
        }

        let step = async {
            if proceed {
                self.run_issuance(request).await
            } else {
                IssuanceStatus::NotAttempted
            }
        };
        let (status, restarts) = self.finalize_with_restart(&outcome.stopped, step).await;
        outcome.issuance = status;
        outcome.restarts = restarts;
    }

    /// Run `step`, then restart `stopped` no matter how the step ended.
    ///
    /// This is the only place the orchestrator restarts stopped containers.
    async fn finalize_with_restart<F>(
        &self,
        stopped: &[ContainerRef],
        step: F,
    ) -> (IssuanceStatus, Vec<RestartRecord>)
    where
        F: Future<Output = IssuanceStatus>,
    {
        let status = match AssertUnwindSafe(step).catch_unwind().await {
            Ok(status) => status,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(panic = %message, "Issuance step panicked");
                self.progress
                    .error(&format!("Certificate request aborted: {}", message));
                IssuanceStatus::Panicked { message }
            }
        };

        let restarts = self.restart_all(stopped).await;
        (status, restarts)
    }

    async fn run_issuance(&self, request: &IssuanceRequest) -> IssuanceStatus {
        let spec = certificate_run_spec(&self.issuance, request);
        info!(image = %spec.image, args = ?spec.cmd, "Requesting certificate");

        let run = match self.engine.run_to_completion(&spec, self.wait_timeout).await {
            Ok(run) => run,
            Err(e) => {
                self.progress
                    .error(&format!("Could not run {}: {}", spec.image, e));
                return IssuanceStatus::Error(e);
            }
        };

        for line in &run.logs {
            self.progress.info(&line.text);
        }

        match run.completion {
            Completion::Exited { status_code: 0 } => {
                info!(container = %run.container_id, "Certificate tool succeeded");
                IssuanceStatus::Issued
            }
            Completion::Exited { status_code } => {
                self.progress.warning(&format!(
                    "{} exited with code {}.",
                    spec.image, status_code
                ));
                IssuanceStatus::Failed {
                    exit_code: status_code,
                }
            }
            Completion::TimedOut { after } => {
                self.progress.warning(&format!(
                    "{} did not finish within {}s.",
                    spec.image,
                    after.as_secs()
                ));
                IssuanceStatus::TimedOut { after }
            }
        }
    }

    /// Restart running containers built from the configured restart images.
    pub async fn restart_web_containers(&self) -> RestartReport {
        info!("Trying to restart containers");
        let filters = ContainerFilters::new()
            .status("running")
            .ancestors(self.restart_images.iter().cloned());

        let mut report = RestartReport::default();
        match self.engine.find_containers(&filters).await {
            Ok(containers) => {
                if containers.is_empty() {
                    self.progress.info("No running containers to restart.");
                }
                let targets: Vec<ContainerRef> = containers.iter().map(ContainerRef::from).collect();
                report.restarts = self.restart_all(&targets).await;
            }
            Err(e) => {
                self.progress.error(&format!("Could not list containers: {}", e));
                report.discovery_error = Some(e);
            }
        }
        report
    }

    async fn restart_all(&self, containers: &[ContainerRef]) -> Vec<RestartRecord> {
        let mut records = Vec::with_capacity(containers.len());
        for container in containers {
            let result = self.restart_one(container).await;
            match &result {
                Ok(()) => self
                    .progress
                    .info(&format!("Container {} restarted.", container.name)),
                Err(e) => self.progress.error(&format!(
                    "Could not restart container {}: {}",
                    container.name, e
                )),
            }
            records.push(RestartRecord {
                container: container.clone(),
                result,
            });
        }
        records
    }

    async fn stop_one(&self, container: &ContainerRef) -> Result<(), DeveError> {
        let status = self.engine.stop_container(&container.id).await?;
        debug!(container = %container.name, status, "Stop answered");
        if is_action_success(status) {
            Ok(())
        } else {
            Err(DeveError::unexpected_status("stop", container.name.clone(), status))
        }
    }

    async fn restart_one(&self, container: &ContainerRef) -> Result<(), DeveError> {
        let status = self.engine.restart_container(&container.id).await?;
        debug!(container = %container.name, status, "Restart answered");
        if is_action_success(status) {
            Ok(())
        } else {
            Err(DeveError::unexpected_status("restart", container.name.clone(), status))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

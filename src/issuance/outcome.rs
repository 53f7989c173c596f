//! Issuance and restart reports.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::engine::Container;
use crate::error::DeveError;

use super::request::IssuanceRequest;

/// Identity of a container as the workflows report it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRef {
    pub id: String,
    pub name: String,
}

impl From<&Container> for ContainerRef {
    fn from(container: &Container) -> Self {
        Self {
            id: container.id.clone(),
            name: container.name().to_string(),
        }
    }
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A container that could not be stopped.
#[derive(Debug)]
pub struct StopFailure {
    pub container: ContainerRef,
    pub error: DeveError,
}

/// One restart attempt and how it went.
#[derive(Debug)]
pub struct RestartRecord {
    pub container: ContainerRef,
    pub result: Result<(), DeveError>,
}

impl RestartRecord {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// What happened in the Issue step.
#[derive(Debug)]
pub enum IssuanceStatus {
    /// Skipped because stopping the web server failed.
    NotAttempted,
    /// The tool exited 0.
    Issued,
    /// The tool exited non-zero.
    Failed { exit_code: i64 },
    /// The tool did not exit before the wait deadline.
    TimedOut { after: Duration },
    /// The engine failed while creating or driving the tool container.
    Error(DeveError),
    /// The step panicked; the restart still ran.
    Panicked { message: String },
}

/// Stage tag of a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    EngineUnavailable,
    UnexpectedStatus,
    IssuanceFailed,
    RestartFailed,
}

impl FailureKind {
    fn of(error: &DeveError) -> Self {
        if error.status().is_some() {
            FailureKind::UnexpectedStatus
        } else {
            FailureKind::EngineUnavailable
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::EngineUnavailable => "engine unavailable",
            FailureKind::UnexpectedStatus => "unexpected engine status",
            FailureKind::IssuanceFailed => "issuance failed",
            FailureKind::RestartFailed => "restart failed",
        };
        f.write_str(name)
    }
}

/// Overall result, from the operator's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Certificate issued, site back up.
    Created,
    /// Certificate issued, but a web container did not come back.
    CreatedSiteDown,
    /// Certificate not issued, site back up.
    Failed,
    /// Certificate not issued and a web container did not come back.
    FailedSiteDown,
    /// Stopped before the Issue step; nothing was left down.
    Aborted,
}

impl Verdict {
    /// Whether the run left a web container offline.
    pub fn site_down(&self) -> bool {
        matches!(self, Verdict::CreatedSiteDown | Verdict::FailedSiteDown)
    }
}

/// Record of one issuance run.
#[derive(Debug)]
pub struct IssuanceOutcome {
    pub run_id: Uuid,
    pub domain: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Set when the engine could not be queried at all.
    pub discovery_error: Option<DeveError>,
    pub discovered: Vec<ContainerRef>,
    pub stopped: Vec<ContainerRef>,
    pub stop_failures: Vec<StopFailure>,
    pub issuance: IssuanceStatus,
    pub restarts: Vec<RestartRecord>,
}

impl IssuanceOutcome {
    pub fn new(request: &IssuanceRequest) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            domain: request.domain().to_string(),
            dry_run: request.dry_run(),
            started_at: Utc::now(),
            finished_at: None,
            discovery_error: None,
            discovered: Vec::new(),
            stopped: Vec::new(),
            stop_failures: Vec::new(),
            issuance: IssuanceStatus::NotAttempted,
            restarts: Vec::new(),
        }
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock duration of a finished run.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }

    pub fn restart_failed(&self) -> bool {
        self.restarts.iter().any(|r| !r.succeeded())
    }

    /// Every stage went through.
    pub fn is_success(&self) -> bool {
        self.discovery_error.is_none()
            && self.stop_failures.is_empty()
            && matches!(self.issuance, IssuanceStatus::Issued)
            && !self.restart_failed()
    }

    /// The most severe failure, if the run failed.
    ///
    /// A failed restart outranks everything else since it leaves the site
    /// offline.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        if self.restart_failed() {
            return Some(FailureKind::RestartFailed);
        }
        if let Some(error) = &self.discovery_error {
            return Some(FailureKind::of(error));
        }
        if let Some(failure) = self.stop_failures.first() {
            return Some(FailureKind::of(&failure.error));
        }
        match &self.issuance {
            IssuanceStatus::Issued => None,
            IssuanceStatus::Error(error) => Some(FailureKind::of(error)),
            IssuanceStatus::NotAttempted
            | IssuanceStatus::Failed { .. }
            | IssuanceStatus::TimedOut { .. }
            | IssuanceStatus::Panicked { .. } => Some(FailureKind::IssuanceFailed),
        }
    }

    pub fn verdict(&self) -> Verdict {
        let site_down = self.restart_failed();
        if self.discovery_error.is_some() || !self.stop_failures.is_empty() {
            return if site_down {
                Verdict::FailedSiteDown
            } else {
                Verdict::Aborted
            };
        }
        match (&self.issuance, site_down) {
            (IssuanceStatus::Issued, false) => Verdict::Created,
            (IssuanceStatus::Issued, true) => Verdict::CreatedSiteDown,
            (_, false) => Verdict::Failed,
            (_, true) => Verdict::FailedSiteDown,
        }
    }

    /// Final line for the operator.
    pub fn summary(&self) -> String {
        let subject = if self.dry_run {
            format!("Dry run for {}", self.domain)
        } else {
            format!("Certificate for {}", self.domain)
        };
        let done = if self.dry_run { "succeeded" } else { "created" };

        match self.verdict() {
            Verdict::Created => format!("{} {}.", subject, done),
            Verdict::CreatedSiteDown => format!(
                "{} {}, but site restart failed ({}).",
                subject,
                done,
                self.failed_restart_names()
            ),
            Verdict::Failed => format!("{} failed; site is back up.", subject),
            Verdict::FailedSiteDown => format!(
                "{} failed, site restart also failed ({}).",
                subject,
                self.failed_restart_names()
            ),
            Verdict::Aborted => match &self.discovery_error {
                Some(error) => format!("{} not attempted: {}.", subject, error),
                None => format!(
                    "{} not attempted: could not stop {}.",
                    subject,
                    self.stop_failures
                        .iter()
                        .map(|f| f.container.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            },
        }
    }

    fn failed_restart_names(&self) -> String {
        self.restarts
            .iter()
            .filter(|r| !r.succeeded())
            .map(|r| r.container.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Result of the `restart` command.
#[derive(Debug, Default)]
pub struct RestartReport {
    pub discovery_error: Option<DeveError>,
    pub restarts: Vec<RestartRecord>,
}

impl RestartReport {
    pub fn is_success(&self) -> bool {
        self.discovery_error.is_none() && self.restarts.iter().all(RestartRecord::succeeded)
    }
}

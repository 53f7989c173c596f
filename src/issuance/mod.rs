//! Certificate issuance workflow.
//!
//! Stops the web containers that hold the challenge port, runs the
//! certificate tool to completion, and restarts whatever was stopped.

mod orchestrator;
mod outcome;
mod plan;
mod progress;
mod request;

pub use orchestrator::CertificateOrchestrator;
pub use outcome::{
    ContainerRef, FailureKind, IssuanceOutcome, IssuanceStatus, RestartRecord, RestartReport,
    StopFailure, Verdict,
};
pub use plan::{certificate_run_spec, DRY_RUN_FLAG};
pub use progress::{ConsoleProgress, Progress, ProgressLevel, TracingProgress};
pub use request::IssuanceRequest;

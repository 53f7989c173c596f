//! Run specification for the certificate tool.

use crate::config::IssuanceConfig;
use crate::engine::{PortBinding, RunSpec};

use super::request::IssuanceRequest;

/// Flag that makes the tool exercise the full flow without installing anything.
pub const DRY_RUN_FLAG: &str = "--dry-run";

/// Port the tool's standalone server listens on inside the container.
const STANDALONE_PORT: u16 = 80;

/// Build the container spec for one issuance attempt.
///
/// The certificate volume is mounted at the tool's storage path and the
/// standalone challenge server is published on the configured host port.
pub fn certificate_run_spec(config: &IssuanceConfig, request: &IssuanceRequest) -> RunSpec {
    let mut args = vec![
        "certonly",
        "--standalone",
        "--non-interactive",
        "--agree-tos",
        "--email",
        request.email(),
        "-d",
        request.domain(),
    ];

    if request.dry_run() {
        args.push(DRY_RUN_FLAG);
    }

    RunSpec::new(config.image.as_str())
        .bind(
            config.certificate_volume.as_str(),
            config.storage_path.display().to_string(),
        )
        .publish(PortBinding::tcp(STANDALONE_PORT, config.challenge_port))
        .args(args)
}

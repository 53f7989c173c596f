//! Deve - issues TLS certificates for locally hosted sites.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use deve::config::Settings;
use deve::engine::EngineClient;
use deve::issuance::{CertificateOrchestrator, ConsoleProgress, IssuanceRequest};

const DEFAULT_CONFIG_PATH: &str = "/etc/deve/deve.toml";

/// Exit status when the site was left down.
const EXIT_SITE_DOWN: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "deve")]
#[command(about = "Manage locally hosted sites running in containers", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "DEVE_CONFIG")]
    config: Option<PathBuf>,

    /// Stream engine output and log at debug level
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Issue a certificate for a domain
    Ssl {
        /// Domain to issue the certificate for
        domain: String,

        /// Contact email for the certificate authority
        email: String,

        /// Run the full flow without installing a certificate
        #[arg(long)]
        dry_run: bool,
    },

    /// Restart the web and PHP containers
    Restart,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let (settings, config_path) = match load_settings(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&settings, cli.verbose) {
        eprintln!("Error initializing logging: {}", e);
        return ExitCode::FAILURE;
    }

    match &config_path {
        Some(path) => debug!("Configuration loaded from: {}", path.display()),
        None => debug!("Using built-in configuration"),
    }
    debug!(socket = %settings.engine.socket_path.display(), api = %settings.engine.api_version);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error creating runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(run(cli, settings))
}

async fn run(cli: Cli, settings: Settings) -> ExitCode {
    let client = EngineClient::from_config(&settings.engine).verbose(cli.verbose);
    let orchestrator =
        CertificateOrchestrator::new(client, &settings).with_progress(Arc::new(ConsoleProgress));

    match cli.command {
        Command::Ssl {
            domain,
            email,
            dry_run,
        } => {
            let request = match IssuanceRequest::new(&domain, &email, dry_run) {
                Ok(request) => request,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return ExitCode::FAILURE;
                }
            };

            let outcome = orchestrator.issue(&request).await;
            let verdict = outcome.verdict();

            if let Some(elapsed) = outcome.duration() {
                info!(run_id = %outcome.run_id, elapsed_ms = elapsed.num_milliseconds(), "Done");
            }

            if verdict.site_down() {
                ExitCode::from(EXIT_SITE_DOWN)
            } else if outcome.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Command::Restart => {
            println!("Trying to restart containers.");
            let report = orchestrator.restart_web_containers().await;
            if report.is_success() {
                ExitCode::SUCCESS
            } else {
                error!(
                    failed = report.restarts.iter().filter(|r| !r.succeeded()).count(),
                    "Restart incomplete"
                );
                ExitCode::from(EXIT_SITE_DOWN)
            }
        }
    }
}

/// Load the configuration: explicit path, else the default file if present,
/// else built-in defaults.
fn load_settings(explicit: Option<&Path>) -> Result<(Settings, Option<PathBuf>), deve::error::DeveError> {
    if let Some(path) = explicit {
        return Ok((Settings::load(path)?, Some(path.to_path_buf())));
    }

    let default_path = Path::new(DEFAULT_CONFIG_PATH);
    if default_path.exists() {
        return Ok((Settings::load(default_path)?, Some(default_path.to_path_buf())));
    }

    Ok((Settings::default(), None))
}

/// Initialize logging based on settings. Logs go to stderr so they never
/// mix with progress lines.
fn init_logging(settings: &Settings, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let level = if verbose {
        "debug"
    } else {
        settings.logging.level.as_str()
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match settings.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()?;
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .try_init()?;
        }
    }

    Ok(())
}

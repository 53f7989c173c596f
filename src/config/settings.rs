//! Configuration settings for deve.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::{DEFAULT_API_VERSION, DEFAULT_SOCKET_PATH};
use crate::error::DeveError;

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub containers: ContainersConfig,
    #[serde(default)]
    pub issuance: IssuanceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Container engine connection.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Path to the engine's Unix socket.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    /// Versioned API root, e.g. "v1.36".
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// How long to wait for the issuance container to exit. 0 waits forever.
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout_seconds: u64,
}

/// Which running containers the commands act on, by image ancestry.
#[derive(Debug, Clone, Deserialize)]
pub struct ContainersConfig {
    /// Web-server images stopped while the challenge port is borrowed.
    #[serde(default = "default_web_images")]
    pub web_images: Vec<String>,
    /// Images restarted by the `restart` command.
    #[serde(default = "default_restart_images")]
    pub restart_images: Vec<String>,
}

/// Certificate tool container.
#[derive(Debug, Clone, Deserialize)]
pub struct IssuanceConfig {
    /// Image of the certificate-issuing tool.
    #[serde(default = "default_issuance_image")]
    pub image: String,
    /// Named volume holding issued certificates.
    #[serde(default = "default_certificate_volume")]
    pub certificate_volume: String,
    /// Where the tool expects its storage inside the container.
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,
    /// Host port published for the HTTP-01 challenge.
    #[serde(default = "default_challenge_port")]
    pub challenge_port: u16,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format ("pretty" or "json").
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_socket_path() -> PathBuf {
    PathBuf::from(DEFAULT_SOCKET_PATH)
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_wait_timeout() -> u64 {
    600
}

fn default_web_images() -> Vec<String> {
    vec!["nginx:alpine".to_string()]
}

fn default_restart_images() -> Vec<String> {
    vec!["nginx:alpine".to_string(), "php:fpm-alpine".to_string()]
}

fn default_issuance_image() -> String {
    "certbot/certbot".to_string()
}

fn default_certificate_volume() -> String {
    "deve_letsencrypt".to_string()
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("/etc/letsencrypt")
}

fn default_challenge_port() -> u16 {
    80
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            api_version: default_api_version(),
            wait_timeout_seconds: default_wait_timeout(),
        }
    }
}

impl Default for ContainersConfig {
    fn default() -> Self {
        Self {
            web_images: default_web_images(),
            restart_images: default_restart_images(),
        }
    }
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        Self {
            image: default_issuance_image(),
            certificate_volume: default_certificate_volume(),
            storage_path: default_storage_path(),
            challenge_port: default_challenge_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl EngineConfig {
    /// The bounded wait for the issuance container, if any.
    pub fn wait_timeout(&self) -> Option<Duration> {
        match self.wait_timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl Settings {
    /// Load settings from a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DeveError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| DeveError::Config {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            DeveError::Config { message } => DeveError::Config {
                message: format!("{} (in '{}')", message, path.display()),
            },
            other => other,
        })
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, DeveError> {
        let settings: Settings = toml::from_str(content).map_err(|e| DeveError::Config {
            message: format!("Failed to parse config: {}", e),
        })?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<(), DeveError> {
        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(DeveError::Config {
                message: format!(
                    "Invalid log level '{}'. Valid levels: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        // Validate log format
        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(DeveError::Config {
                message: format!(
                    "Invalid log format '{}'. Valid formats: {:?}",
                    self.logging.format, valid_formats
                ),
            });
        }

        if !self.engine.socket_path.is_absolute() {
            return Err(DeveError::Config {
                message: format!(
                    "Engine socket path '{}' must be absolute",
                    self.engine.socket_path.display()
                ),
            });
        }

        if !is_api_version(&self.engine.api_version) {
            return Err(DeveError::Config {
                message: format!(
                    "Invalid engine API version '{}'. Expected e.g. 'v1.36'",
                    self.engine.api_version
                ),
            });
        }

        if self.containers.web_images.is_empty() {
            return Err(DeveError::Config {
                message: "containers.web_images must list at least one image".to_string(),
            });
        }

        if self.containers.restart_images.is_empty() {
            return Err(DeveError::Config {
                message: "containers.restart_images must list at least one image".to_string(),
            });
        }

        if self.issuance.image.trim().is_empty() {
            return Err(DeveError::Config {
                message: "issuance.image cannot be empty".to_string(),
            });
        }

        if self.issuance.certificate_volume.trim().is_empty() {
            return Err(DeveError::Config {
                message: "issuance.certificate_volume cannot be empty".to_string(),
            });
        }

        if !self.issuance.storage_path.is_absolute() {
            return Err(DeveError::Config {
                message: format!(
                    "issuance.storage_path '{}' must be absolute",
                    self.issuance.storage_path.display()
                ),
            });
        }

        if self.issuance.challenge_port == 0 {
            return Err(DeveError::Config {
                message: "issuance.challenge_port cannot be 0".to_string(),
            });
        }

        Ok(())
    }
}

/// `v<major>.<minor>`, digits only.
fn is_api_version(version: &str) -> bool {
    let Some(rest) = version.strip_prefix('v') else {
        return false;
    };
    let mut parts = rest.split('.');
    let (Some(major), Some(minor), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    [major, minor]
        .iter()
        .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

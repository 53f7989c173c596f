//! Engine client speaking the versioned REST API over a Unix socket.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hyper::StatusCode;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{DeveError, DeveResult};

use super::logs::{demux, LogLine};
use super::request::EngineRequest;
use super::response::EngineResponse;
use super::traits::ContainerEngine;
use super::transport;
use super::types::{Container, ContainerFilters, CreatedContainer, RunSpec, WaitStatus};

/// Default socket path for the container engine.
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/docker.sock";

/// Default engine API version.
pub const DEFAULT_API_VERSION: &str = "v1.36";

/// Client for one engine socket.
///
/// Holds configuration only; every call opens and closes its own
/// connection, so a client can be shared freely.
#[derive(Debug, Clone)]
pub struct EngineClient {
    socket_path: PathBuf,
    api_version: String,
    verbose: bool,
}

impl EngineClient {
    /// Creates a client for the default socket and API version.
    pub fn new() -> Self {
        Self::with_socket(DEFAULT_SOCKET_PATH, DEFAULT_API_VERSION)
    }

    /// Creates a client for a specific socket and API version.
    pub fn with_socket(path: impl AsRef<Path>, api_version: impl Into<String>) -> Self {
        Self {
            socket_path: path.as_ref().to_path_buf(),
            api_version: api_version.into(),
            verbose: false,
        }
    }

    /// Creates a client from configuration.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::with_socket(&config.socket_path, config.api_version.clone())
    }

    /// Fetch the output of run-to-completion containers.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    async fn send(&self, request: EngineRequest) -> DeveResult<EngineResponse> {
        transport::send(&self.socket_path, &self.api_version, request).await
    }

    /// POST to a container action sub-path and hand back the status.
    async fn container_action(&self, operation: &'static str, id: &str) -> DeveResult<u16> {
        let path = format!("/containers/{}/{}", urlencoding::encode(id), operation);
        let response = self.send(EngineRequest::post(operation, path)).await?;
        let status = response.status_code();
        if !response.status.is_success() && status != StatusCode::NOT_MODIFIED.as_u16() {
            debug!(
                container = %id,
                operation,
                status,
                message = %response.engine_message().unwrap_or_default(),
                "Engine rejected container action"
            );
        }
        Ok(status)
    }
}

impl Default for EngineClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerEngine for EngineClient {
    async fn find_containers(&self, filters: &ContainerFilters) -> DeveResult<Vec<Container>> {
        let path = format!("/containers/json?filters={}", filters.to_query()?);
        self.send(EngineRequest::get("list", path))
            .await?
            .expect_status(StatusCode::OK, "containers")?
            .decode()
    }

    async fn start_container(&self, id: &str) -> DeveResult<u16> {
        self.container_action("start", id).await
    }

    async fn stop_container(&self, id: &str) -> DeveResult<u16> {
        self.container_action("stop", id).await
    }

    async fn restart_container(&self, id: &str) -> DeveResult<u16> {
        self.container_action("restart", id).await
    }

    async fn create_container(&self, spec: &RunSpec) -> DeveResult<String> {
        let request =
            EngineRequest::post("create", "/containers/create").with_json(&spec.create_body())?;
        let response = self.send(request).await?;
        if response.status != StatusCode::CREATED {
            if let Some(message) = response.engine_message() {
                warn!(image = %spec.image, message = %message, "Engine refused to create container");
            }
            return Err(DeveError::unexpected_status(
                "create",
                spec.image.as_str(),
                response.status_code(),
            ));
        }

        let created: CreatedContainer = response.decode()?;
        for warning in created.warnings.iter().flatten() {
            warn!(container = %created.id, warning = %warning, "Engine warning on create");
        }
        Ok(created.id)
    }

    async fn wait_container(&self, id: &str) -> DeveResult<WaitStatus> {
        let path = format!("/containers/{}/wait", urlencoding::encode(id));
        self.send(EngineRequest::post("wait", path))
            .await?
            .expect_status(StatusCode::OK, id)?
            .decode()
    }

    async fn container_logs(&self, id: &str) -> DeveResult<Vec<LogLine>> {
        let path = format!(
            "/containers/{}/logs?follow=true&stdout=true&stderr=true",
            urlencoding::encode(id)
        );
        let response = self
            .send(EngineRequest::get("logs", path))
            .await?
            .expect_status(StatusCode::OK, id)?;
        Ok(demux(&response.body))
    }

    async fn remove_container(&self, id: &str, force: bool) -> DeveResult<u16> {
        let mut path = format!("/containers/{}", urlencoding::encode(id));
        if force {
            path.push_str("?force=true");
        }
        let response = self.send(EngineRequest::delete("remove", path)).await?;
        Ok(response.status_code())
    }

    fn streams_logs(&self) -> bool {
        self.verbose
    }
}

//! Typed engine payloads.
//!
//! Every JSON body the client reads or writes has a record here, so a
//! missing field fails at decode time instead of deep inside a workflow.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::logs::LogLine;

/// A container as listed by the engine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Container {
    pub id: String,
    #[serde(default)]
    pub names: Vec<String>,
    /// Image reference the container was created from.
    #[serde(default)]
    pub image: String,
    /// Machine state ("created", "running", "exited", ...).
    #[serde(default)]
    pub state: String,
    /// Human-readable status ("Up 3 hours").
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub labels: Option<BTreeMap<String, String>>,
}

impl Container {
    /// Display name: the first engine name without its leading slash,
    /// or the short id when the container has no name.
    pub fn name(&self) -> &str {
        self.names
            .first()
            .map(|n| n.trim_start_matches('/'))
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| short_id(&self.id))
    }
}

/// First 12 characters of a container id.
pub fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

/// Discovery filter: filter name to accepted values.
///
/// Serialized as the JSON object the engine expects in `?filters=`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ContainerFilters(BTreeMap<String, Vec<String>>);

impl ContainerFilters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add accepted values for a filter.
    pub fn with<I, S>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .entry(name.to_string())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Match containers in the given state.
    pub fn status(self, status: &str) -> Self {
        self.with("status", [status])
    }

    /// Match containers created from any of the given images.
    pub fn ancestors<I, S>(self, images: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with("ancestor", images)
    }

    /// Percent-encoded JSON, ready for the query string.
    pub fn to_query(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(urlencoding::encode(&json).into_owned())
    }
}

/// Named volume or host path mounted into a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeBind {
    pub source: String,
    pub target: String,
}

impl VolumeBind {
    /// The engine's `source:target` form.
    pub fn to_bind(&self) -> String {
        format!("{}:{}", self.source, self.target)
    }
}

/// Container port published on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBinding {
    pub container_port: u16,
    pub protocol: String,
    pub host_port: u16,
}

impl PortBinding {
    pub fn tcp(container_port: u16, host_port: u16) -> Self {
        Self {
            container_port,
            protocol: "tcp".to_string(),
            host_port,
        }
    }

    /// The engine's `port/protocol` key.
    pub fn key(&self) -> String {
        format!("{}/{}", self.container_port, self.protocol)
    }
}

/// Everything needed to create one short-lived container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpec {
    pub image: String,
    pub binds: Vec<VolumeBind>,
    pub port_bindings: Vec<PortBinding>,
    pub cmd: Vec<String>,
}

impl RunSpec {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            binds: Vec::new(),
            port_bindings: Vec::new(),
            cmd: Vec::new(),
        }
    }

    /// Mount `source` at `target`.
    pub fn bind(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.binds.push(VolumeBind {
            source: source.into(),
            target: target.into(),
        });
        self
    }

    /// Publish a port.
    pub fn publish(mut self, binding: PortBinding) -> Self {
        self.port_bindings.push(binding);
        self
    }

    /// Append command arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cmd.extend(args.into_iter().map(Into::into));
        self
    }

    /// Body for `POST /containers/create`.
    pub fn create_body(&self) -> CreateContainerBody {
        let mut exposed_ports = BTreeMap::new();
        let mut port_bindings: BTreeMap<String, Vec<HostPort>> = BTreeMap::new();
        for binding in &self.port_bindings {
            exposed_ports.insert(binding.key(), EmptyObject {});
            port_bindings.entry(binding.key()).or_default().push(HostPort {
                host_port: binding.host_port.to_string(),
            });
        }

        CreateContainerBody {
            image: self.image.clone(),
            cmd: self.cmd.clone(),
            exposed_ports,
            host_config: HostConfig {
                binds: self.binds.iter().map(VolumeBind::to_bind).collect(),
                port_bindings,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateContainerBody {
    pub image: String,
    pub cmd: Vec<String>,
    pub exposed_ports: BTreeMap<String, EmptyObject>,
    pub host_config: HostConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostConfig {
    pub binds: Vec<String>,
    pub port_bindings: BTreeMap<String, Vec<HostPort>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostPort {
    pub host_port: String,
}

/// Serializes as `{}`.
#[derive(Debug, Clone, Serialize)]
pub struct EmptyObject {}

/// Answer to `POST /containers/create`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreatedContainer {
    pub id: String,
    #[serde(default)]
    pub warnings: Option<Vec<String>>,
}

/// Answer to `POST /containers/{id}/wait`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WaitStatus {
    pub status_code: i64,
    #[serde(default)]
    pub error: Option<WaitError>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WaitError {
    #[serde(default)]
    pub message: String,
}

/// How a run-to-completion container finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The engine reported the container's exit code.
    Exited { status_code: i64 },
    /// The wait deadline fired first; the container was force-removed.
    TimedOut { after: Duration },
}

/// Result of a run-to-completion container.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub container_id: String,
    pub completion: Completion,
    /// Output captured after exit, when log streaming is on.
    pub logs: Vec<LogLine>,
}

impl RunOutcome {
    /// True only for an exit code of zero.
    pub fn success(&self) -> bool {
        matches!(self.completion, Completion::Exited { status_code: 0 })
    }
}

//! Container engine client.
//!
//! A thin client for the engine's versioned REST API over a local Unix
//! socket: typed requests and payloads, one connection per call, and the
//! `ContainerEngine` trait the workflows are written against.

mod client;
mod logs;
mod request;
mod response;
mod traits;
mod transport;
mod types;

pub use client::{EngineClient, DEFAULT_API_VERSION, DEFAULT_SOCKET_PATH};
pub use logs::{demux, LogLine, LogStream};
pub use request::EngineRequest;
pub use response::{is_action_success, EngineResponse};
pub use traits::ContainerEngine;
pub use types::{
    short_id, Completion, Container, ContainerFilters, CreateContainerBody, CreatedContainer,
    PortBinding, RunOutcome, RunSpec, VolumeBind, WaitError, WaitStatus,
};

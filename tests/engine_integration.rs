//! Integration tests for the engine client and the issuance workflow.
//!
//! These tests serve a scripted engine over a real Unix socket and drive
//! the production `EngineClient` against it.

use std::collections::HashMap;
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::UnixListener;

use deve::config::Settings;
use deve::engine::{
    Completion, ContainerEngine, ContainerFilters, EngineClient, LogStream, PortBinding, RunSpec,
};
use deve::issuance::{
    CertificateOrchestrator, FailureKind, IssuanceRequest, Progress, ProgressLevel, Verdict,
};

const API_VERSION: &str = "v1.36";
const ISSUER_ID: &str = "c0ffee0000000000000000000000000000000000000000000000000000000001";

/// One request as the fake engine saw it, with the API version stripped.
#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    path: String,
    query: Option<String>,
    body: Bytes,
}

/// What the fake engine answers.
#[derive(Debug, Clone)]
struct Script {
    containers: Value,
    raw_list_body: Option<&'static str>,
    action_status: HashMap<(String, String), u16>,
    exit_code: i64,
    logs: Vec<u8>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            containers: json!([]),
            raw_list_body: None,
            action_status: HashMap::new(),
            exit_code: 0,
            logs: Vec::new(),
        }
    }
}

impl Script {
    fn with_web() -> Self {
        Self {
            containers: json!([{
                "Id": WEB_ID,
                "Names": ["/deve_web"],
                "Image": "nginx:alpine",
                "State": "running",
                "Status": "Up 2 hours",
                "Labels": {}
            }]),
            ..Self::default()
        }
    }

    fn action(mut self, id: &str, action: &str, status: u16) -> Self {
        self.action_status
            .insert((id.to_string(), action.to_string()), status);
        self
    }
}

const WEB_ID: &str = "4f8a1c9e2b7d00000000000000000000000000000000000000000000000000aa";

struct FakeEngine {
    script: Script,
    requests: Mutex<Vec<Recorded>>,
}

impl FakeEngine {
    fn respond(&self, method: &Method, path: &str) -> (StatusCode, Bytes) {
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        let script = &self.script;

        match (method.as_str(), segments.as_slice()) {
            ("GET", ["containers", "json"]) => match script.raw_list_body {
                Some(raw) => (StatusCode::OK, Bytes::from_static(raw.as_bytes())),
                None => (StatusCode::OK, Bytes::from(script.containers.to_string())),
            },
            ("POST", ["containers", "create"]) => (
                StatusCode::CREATED,
                Bytes::from(json!({"Id": ISSUER_ID, "Warnings": []}).to_string()),
            ),
            ("POST", ["containers", id, "wait"]) if *id == ISSUER_ID => (
                StatusCode::OK,
                Bytes::from(json!({"StatusCode": script.exit_code, "Error": null}).to_string()),
            ),
            ("GET", ["containers", id, "logs"]) if *id == ISSUER_ID => {
                (StatusCode::OK, Bytes::from(script.logs.clone()))
            }
            ("POST", ["containers", id, action]) => {
                let known = *id == ISSUER_ID || *id == WEB_ID;
                let status = script
                    .action_status
                    .get(&(id.to_string(), action.to_string()))
                    .copied()
                    .unwrap_or(if known { 204 } else { 404 });
                let body = if status >= 400 {
                    Bytes::from(json!({"message": format!("No such container: {}", id)}).to_string())
                } else {
                    Bytes::new()
                };
                (StatusCode::from_u16(status).unwrap(), body)
            }
            ("DELETE", ["containers", _]) => (StatusCode::NO_CONTENT, Bytes::new()),
            _ => (StatusCode::NOT_FOUND, Bytes::from_static(b"{\"message\":\"page not found\"}")),
        }
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    fn count(&self, method: Method, suffix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path.ends_with(suffix))
            .count()
    }
}

/// Fake engine bound to a socket in a temp directory.
struct TestEngine {
    socket_path: PathBuf,
    engine: Arc<FakeEngine>,
    _temp_dir: TempDir,
}

impl TestEngine {
    async fn start(script: Script) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let socket_path = temp_dir.path().join("engine.sock");
        let listener = UnixListener::bind(&socket_path).expect("Failed to bind engine socket");

        let engine = Arc::new(FakeEngine {
            script,
            requests: Mutex::new(Vec::new()),
        });

        let shared = Arc::clone(&engine);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let engine = Arc::clone(&shared);
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let engine = Arc::clone(&engine);
                        async move { Ok::<_, Infallible>(handle(&engine, req).await) }
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        Self {
            socket_path,
            engine,
            _temp_dir: temp_dir,
        }
    }

    fn client(&self) -> EngineClient {
        EngineClient::with_socket(&self.socket_path, API_VERSION)
    }

    fn settings(&self) -> Settings {
        let mut settings = Settings::default();
        settings.engine.socket_path = self.socket_path.clone();
        settings
    }
}

async fn handle(engine: &FakeEngine, req: Request<Incoming>) -> Response<Full<Bytes>> {
    let (parts, body) = req.into_parts();
    let body = body
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .unwrap_or_default();

    let prefix = format!("/{}", API_VERSION);
    let path = parts
        .uri
        .path()
        .strip_prefix(&prefix)
        .unwrap_or(parts.uri.path())
        .to_string();

    let (status, response_body) = engine.respond(&parts.method, &path);
    engine.requests.lock().unwrap().push(Recorded {
        method: parts.method,
        path,
        query: parts.uri.query().map(str::to_string),
        body,
    });

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(response_body))
        .unwrap()
}

fn frame(stream: u8, payload: &str) -> Vec<u8> {
    let mut out = vec![stream, 0, 0, 0];
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload.as_bytes());
    out
}

#[derive(Default)]
struct Lines(Mutex<Vec<(ProgressLevel, String)>>);

impl Lines {
    fn all(&self) -> Vec<(ProgressLevel, String)> {
        self.0.lock().unwrap().clone()
    }
}

impl Progress for Lines {
    fn report(&self, level: ProgressLevel, message: &str) {
        self.0.lock().unwrap().push((level, message.to_string()));
    }
}

fn request(dry_run: bool) -> IssuanceRequest {
    IssuanceRequest::new("deve.us", "admin@deve.us", dry_run).unwrap()
}

fn issuer_spec() -> RunSpec {
    RunSpec::new("certbot/certbot")
        .bind("deve_letsencrypt", "/etc/letsencrypt")
        .publish(PortBinding::tcp(80, 80))
        .args(["certonly", "--standalone"])
}

// ============================================================================
// Engine client
// ============================================================================

#[tokio::test]
async fn test_find_containers_sends_filters() {
    let test = TestEngine::start(Script::with_web()).await;
    let filters = ContainerFilters::new()
        .status("running")
        .ancestors(["nginx:alpine"]);

    let containers = test.client().find_containers(&filters).await.unwrap();
    assert_eq!(containers.len(), 1);
    assert_eq!(containers[0].name(), "deve_web");
    assert_eq!(containers[0].id, WEB_ID);

    let requests = test.engine.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::GET);
    assert_eq!(requests[0].path, "/containers/json");

    let query = requests[0].query.clone().unwrap();
    let encoded = query.strip_prefix("filters=").unwrap();
    let decoded: Value = serde_json::from_str(&urlencoding::decode(encoded).unwrap()).unwrap();
    assert_eq!(
        decoded,
        json!({"status": ["running"], "ancestor": ["nginx:alpine"]})
    );
}

#[tokio::test]
async fn test_find_containers_empty_is_not_an_error() {
    let test = TestEngine::start(Script::default()).await;
    let containers = test
        .client()
        .find_containers(&ContainerFilters::new().status("running"))
        .await
        .unwrap();
    assert!(containers.is_empty());
}

#[tokio::test]
async fn test_malformed_list_is_unavailable() {
    let script = Script {
        raw_list_body: Some(r#"{"not":"a list"}"#),
        ..Script::default()
    };
    let test = TestEngine::start(script).await;
    let err = test
        .client()
        .find_containers(&ContainerFilters::new())
        .await
        .unwrap_err();
    assert!(err.is_engine_unavailable());
}

#[tokio::test]
async fn test_unreachable_socket_is_unavailable() {
    let temp_dir = TempDir::new().unwrap();
    let client = EngineClient::with_socket(temp_dir.path().join("missing.sock"), API_VERSION);

    let err = client
        .find_containers(&ContainerFilters::new())
        .await
        .unwrap_err();
    assert!(err.is_engine_unavailable());
    assert!(client.stop_container(WEB_ID).await.unwrap_err().is_engine_unavailable());
}

#[tokio::test]
async fn test_actions_return_status_unchanged() {
    let script = Script::with_web().action(WEB_ID, "stop", 304);
    let test = TestEngine::start(script).await;
    let client = test.client();

    assert_eq!(client.stop_container(WEB_ID).await.unwrap(), 304);
    assert_eq!(client.restart_container(WEB_ID).await.unwrap(), 204);
    assert_eq!(client.start_container("does-not-exist").await.unwrap(), 404);

    let paths: Vec<String> = test.engine.requests().into_iter().map(|r| r.path).collect();
    assert_eq!(
        paths,
        vec![
            format!("/containers/{}/stop", WEB_ID),
            format!("/containers/{}/restart", WEB_ID),
            "/containers/does-not-exist/start".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_run_to_completion_call_sequence() {
    for exit_code in [0, 1] {
        let script = Script {
            exit_code,
            ..Script::default()
        };
        let test = TestEngine::start(script).await;

        let run = test.client().run_to_completion(&issuer_spec(), None).await.unwrap();
        assert_eq!(run.container_id, ISSUER_ID);
        assert_eq!(run.completion, Completion::Exited { status_code: exit_code });
        assert_eq!(run.success(), exit_code == 0);
        assert!(run.logs.is_empty());

        let engine = &test.engine;
        assert_eq!(engine.count(Method::POST, "/containers/create"), 1);
        assert_eq!(engine.count(Method::POST, "/start"), 1);
        assert_eq!(engine.count(Method::POST, "/wait"), 1);
        assert_eq!(engine.count(Method::DELETE, ISSUER_ID), 1);
        assert_eq!(engine.requests().len(), 4);

        let delete = engine
            .requests()
            .into_iter()
            .find(|r| r.method == Method::DELETE)
            .unwrap();
        assert_eq!(delete.query, None);
    }
}

#[tokio::test]
async fn test_run_to_completion_create_body() {
    let test = TestEngine::start(Script::default()).await;
    test.client().run_to_completion(&issuer_spec(), None).await.unwrap();

    let create = test
        .engine
        .requests()
        .into_iter()
        .find(|r| r.path == "/containers/create")
        .unwrap();
    let body: Value = serde_json::from_slice(&create.body).unwrap();
    assert_eq!(body["Image"], "certbot/certbot");
    assert_eq!(body["Cmd"], json!(["certonly", "--standalone"]));
    assert_eq!(body["HostConfig"]["Binds"], json!(["deve_letsencrypt:/etc/letsencrypt"]));
    assert_eq!(
        body["HostConfig"]["PortBindings"]["80/tcp"],
        json!([{"HostPort": "80"}])
    );
}

#[tokio::test]
async fn test_run_to_completion_start_failure_still_deletes() {
    let script = Script::default().action(ISSUER_ID, "start", 500);
    let test = TestEngine::start(script).await;

    let err = test
        .client()
        .run_to_completion(&issuer_spec(), None)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(500));

    let engine = &test.engine;
    assert_eq!(engine.count(Method::POST, "/wait"), 0);
    let delete = engine
        .requests()
        .into_iter()
        .find(|r| r.method == Method::DELETE)
        .unwrap();
    assert_eq!(delete.query.as_deref(), Some("force=true"));
}

#[tokio::test]
async fn test_verbose_run_fetches_logs() {
    let mut logs = frame(1, "Requesting a certificate for deve.us\n");
    logs.extend(frame(2, "Some challenges have failed.\n"));
    let script = Script {
        logs,
        ..Script::default()
    };
    let test = TestEngine::start(script).await;

    let run = test
        .client()
        .verbose(true)
        .run_to_completion(&issuer_spec(), None)
        .await
        .unwrap();

    assert_eq!(run.logs.len(), 2);
    assert_eq!(run.logs[0].stream, LogStream::Stdout);
    assert_eq!(run.logs[0].text, "Requesting a certificate for deve.us");
    assert_eq!(run.logs[1].stream, LogStream::Stderr);

    let logs_request = test
        .engine
        .requests()
        .into_iter()
        .find(|r| r.path.ends_with("/logs"))
        .unwrap();
    assert_eq!(
        logs_request.query.as_deref(),
        Some("follow=true&stdout=true&stderr=true")
    );
}

// ============================================================================
// Issuance workflow
// ============================================================================

#[tokio::test]
async fn test_issue_success_scenario() {
    let test = TestEngine::start(Script::with_web()).await;
    let lines = Arc::new(Lines::default());
    let orchestrator = CertificateOrchestrator::new(test.client(), &test.settings())
        .with_progress(lines.clone());

    let outcome = orchestrator.issue(&request(false)).await;
    assert!(outcome.is_success());
    assert_eq!(outcome.verdict(), Verdict::Created);
    assert_eq!(outcome.summary(), "Certificate for deve.us created.");

    let lines = lines.all();
    assert_eq!(
        lines,
        vec![
            (ProgressLevel::Info, "Container deve_web stopped.".to_string()),
            (ProgressLevel::Info, "Container deve_web restarted.".to_string()),
            (ProgressLevel::Success, "Certificate for deve.us created.".to_string()),
        ]
    );

    let order: Vec<String> = test
        .engine
        .requests()
        .into_iter()
        .map(|r| format!("{} {}", r.method, r.path))
        .collect();
    assert_eq!(
        order,
        vec![
            "GET /containers/json".to_string(),
            format!("POST /containers/{}/stop", WEB_ID),
            "POST /containers/create".to_string(),
            format!("POST /containers/{}/start", ISSUER_ID),
            format!("POST /containers/{}/wait", ISSUER_ID),
            format!("DELETE /containers/{}", ISSUER_ID),
            format!("POST /containers/{}/restart", WEB_ID),
        ]
    );
}

#[tokio::test]
async fn test_issue_failure_still_restarts() {
    let script = Script {
        exit_code: 1,
        ..Script::with_web()
    };
    let test = TestEngine::start(script).await;
    let orchestrator = CertificateOrchestrator::new(test.client(), &test.settings());

    let outcome = orchestrator.issue(&request(false)).await;
    assert_eq!(outcome.failure_kind(), Some(FailureKind::IssuanceFailed));
    assert_eq!(outcome.restarts.len(), 1);
    assert!(outcome.restarts[0].succeeded());
    assert_eq!(outcome.restarts[0].container.name, "deve_web");
    assert_eq!(test.engine.count(Method::POST, "/restart"), 1);
}

#[tokio::test]
async fn test_stop_500_skips_issue_and_restart() {
    let script = Script::with_web().action(WEB_ID, "stop", 500);
    let test = TestEngine::start(script).await;
    let orchestrator = CertificateOrchestrator::new(test.client(), &test.settings());

    let outcome = orchestrator.issue(&request(false)).await;
    assert_eq!(outcome.failure_kind(), Some(FailureKind::UnexpectedStatus));
    assert_eq!(outcome.verdict(), Verdict::Aborted);
    assert_eq!(test.engine.count(Method::POST, "/containers/create"), 0);
    assert_eq!(test.engine.count(Method::POST, "/restart"), 0);
}

#[tokio::test]
async fn test_restart_failure_leaves_site_down() {
    let script = Script::with_web().action(WEB_ID, "restart", 500);
    let test = TestEngine::start(script).await;
    let orchestrator = CertificateOrchestrator::new(test.client(), &test.settings());

    let outcome = orchestrator.issue(&request(false)).await;
    assert_eq!(outcome.failure_kind(), Some(FailureKind::RestartFailed));
    assert_eq!(outcome.verdict(), Verdict::CreatedSiteDown);
    assert!(outcome.verdict().site_down());
}

#[tokio::test]
async fn test_dry_run_forwards_flag() {
    let test = TestEngine::start(Script::with_web()).await;
    let orchestrator = CertificateOrchestrator::new(test.client(), &test.settings());

    let outcome = orchestrator.issue(&request(true)).await;
    assert!(outcome.is_success());
    assert_eq!(outcome.summary(), "Dry run for deve.us succeeded.");

    let create = test
        .engine
        .requests()
        .into_iter()
        .find(|r| r.path == "/containers/create")
        .unwrap();
    let body: Value = serde_json::from_slice(&create.body).unwrap();
    let cmd = body["Cmd"].as_array().unwrap();
    assert_eq!(cmd.last().unwrap(), "--dry-run");
    assert_eq!(cmd.iter().filter(|a| *a == "--dry-run").count(), 1);
}

#[tokio::test]
async fn test_engine_down_aborts() {
    let temp_dir = TempDir::new().unwrap();
    let mut settings = Settings::default();
    settings.engine.socket_path = temp_dir.path().join("missing.sock");
    let client = EngineClient::from_config(&settings.engine);
    let orchestrator = CertificateOrchestrator::new(client, &settings);

    let outcome = orchestrator.issue(&request(false)).await;
    assert_eq!(outcome.failure_kind(), Some(FailureKind::EngineUnavailable));
    assert_eq!(outcome.verdict(), Verdict::Aborted);
    assert!(outcome.discovered.is_empty());
}

#[tokio::test]
async fn test_restart_command() {
    let test = TestEngine::start(Script::with_web()).await;
    let orchestrator = CertificateOrchestrator::new(test.client(), &test.settings());

    let report = orchestrator.restart_web_containers().await;
    assert!(report.is_success());
    assert_eq!(report.restarts.len(), 1);
    assert_eq!(test.engine.count(Method::POST, "/restart"), 1);
}

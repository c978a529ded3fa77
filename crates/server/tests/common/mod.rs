//! Common helpers for HTTP tests: an in-process server on an ephemeral
//! port and a minimal server-sent event reader.

use std::sync::Arc;
use std::time::Duration;

use ck_core::bus::EventBus;
use ck_core::ids::IdGenerator;
use ck_core::runner::{Launcher, Runner};
use ck_core::store::{MemoryStore, Store};
use ck_protocol::{Command, CommandStatus};
use ck_server::AppState;
use serde::de::DeserializeOwned;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

pub const MAX_PAGE_SIZE: usize = 50;
pub const STEP_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TestServer {
    pub base: String,
    pub client: reqwest::Client,
    pub runner: Runner,
    shutdown: Option<oneshot::Sender<()>>,
}

pub async fn spawn_server() -> TestServer {
    let ids = Arc::new(IdGenerator::new());
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new(Arc::clone(&ids)));
    let bus = Arc::new(EventBus::new());
    let runner = Runner::new(bus, Arc::clone(&store), ids, Launcher::Direct).unwrap();
    let state = AppState::new(runner.clone(), store, MAX_PAGE_SIZE);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(ck_server::serve(listener, state, async {
        let _ = rx.await;
    }));

    TestServer {
        base: format!("http://{addr}/api/v1"),
        client: reqwest::Client::new(),
        runner,
        shutdown: Some(tx),
    }
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    pub async fn submit(&self, command: &str) -> Command {
        let response = self
            .client
            .post(self.url("/command/new"))
            .json(&serde_json::json!({ "command": command }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);
        response.json().await.unwrap()
    }

    pub async fn get_command(&self, id: &str) -> Command {
        self.client
            .get(self.url(&format!("/command/{id}")))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    /// Wait for the command to finalize and return its stored status.
    pub async fn wait_terminal(&self, id: &str) -> CommandStatus {
        self.runner.wait(id).await;
        let status = self.get_command(id).await.status;
        assert!(status.is_terminal(), "{id} still {status}");
        status
    }

    /// Ask the server to shut down gracefully.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Reads `data:` payloads from an event stream response.
pub struct SseReader {
    response: reqwest::Response,
    buffer: String,
}

impl SseReader {
    pub fn new(response: reqwest::Response) -> Self {
        assert_eq!(
            response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
            Some("text/event-stream")
        );
        Self {
            response,
            buffer: String::new(),
        }
    }

    /// Next decoded event, or `None` once the server ends the stream.
    pub async fn next<T: DeserializeOwned>(&mut self) -> Option<T> {
        loop {
            if let Some(end) = self.buffer.find("\n\n") {
                let frame: String = self.buffer.drain(..end + 2).collect();
                let data: Vec<&str> = frame
                    .lines()
                    .filter_map(|line| line.strip_prefix("data:"))
                    .map(str::trim_start)
                    .collect();
                if data.is_empty() {
                    continue;
                }
                return Some(serde_json::from_str(&data.join("\n")).unwrap());
            }

            let chunk = tokio::time::timeout(STEP_TIMEOUT, self.response.chunk())
                .await
                .expect("timed out waiting for event")
                .unwrap();
            match chunk {
                Some(bytes) => self.buffer.push_str(&String::from_utf8_lossy(&bytes)),
                None => return None,
            }
        }
    }
}

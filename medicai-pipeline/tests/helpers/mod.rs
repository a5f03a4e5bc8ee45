//! In-process mock of the MedicAI backend for integration tests.

#![allow(dead_code)]

use axum::{
    Router,
    extract::{Multipart, Query, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use medicai_pipeline::{
    ApiClient, InMemoryStore, NormalizedPayload, Notification, PageView, Pipeline, PipelineConfig,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// Canned reply for one route.
#[derive(Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub body: String,
    pub delay: Option<Duration>,
}

impl Reply {
    pub fn json(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn raw(status: StatusCode, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    async fn send(self) -> Response {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (
            self.status,
            [("content-type", "application/json")],
            self.body,
        )
            .into_response()
    }
}

#[derive(Clone, Default)]
pub struct Recorded {
    pub requests: Arc<AtomicUsize>,
    pub session_ids: Arc<Mutex<Vec<String>>>,
    /// (field name, file name, byte count) per uploaded part.
    pub uploaded_parts: Arc<Mutex<Vec<(String, String, usize)>>>,
}

impl Recorded {
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct MockState {
    diagnosis: Reply,
    summary: Reply,
    upload: Reply,
    recorded: Recorded,
}

pub struct MockBackend {
    pub addr: SocketAddr,
    pub recorded: Recorded,
}

impl MockBackend {
    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }
}

pub struct MockBuilder {
    diagnosis: Reply,
    summary: Reply,
    upload: Reply,
}

impl Default for MockBuilder {
    fn default() -> Self {
        let not_configured = Reply::json(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "not configured" }),
        );
        Self {
            diagnosis: not_configured.clone(),
            summary: not_configured.clone(),
            upload: not_configured,
        }
    }
}

impl MockBuilder {
    pub fn diagnosis(mut self, reply: Reply) -> Self {
        self.diagnosis = reply;
        self
    }

    pub fn summary(mut self, reply: Reply) -> Self {
        self.summary = reply;
        self
    }

    pub fn upload(mut self, reply: Reply) -> Self {
        self.upload = reply;
        self
    }

    pub async fn start(self) -> MockBackend {
        let recorded = Recorded::default();
        let state = MockState {
            diagnosis: self.diagnosis,
            summary: self.summary,
            upload: self.upload,
            recorded: recorded.clone(),
        };

        let app = Router::new()
            .route("/api/diagnosis", get(diagnosis))
            .route("/api/patient-summary", get(summary))
            .route("/api/upload", post(upload))
            .route("/api/echo", post(echo))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        MockBackend { addr, recorded }
    }
}

fn record_query(state: &MockState, params: &HashMap<String, String>) {
    state.recorded.requests.fetch_add(1, Ordering::SeqCst);
    if let Some(id) = params.get("session_id") {
        state.recorded.session_ids.lock().unwrap().push(id.clone());
    }
}

async fn diagnosis(
    State(state): State<MockState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    record_query(&state, &params);
    state.diagnosis.clone().send().await
}

async fn summary(
    State(state): State<MockState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    record_query(&state, &params);
    state.summary.clone().send().await
}

async fn upload(State(state): State<MockState>, mut multipart: Multipart) -> Response {
    state.recorded.requests.fetch_add(1, Ordering::SeqCst);

    if state.upload.delay.is_none() {
        while let Ok(Some(field)) = multipart.next_field().await {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.map(|b| b.len()).unwrap_or(0);
            state
                .recorded
                .uploaded_parts
                .lock()
                .unwrap()
                .push((name, file_name, bytes));
        }
    }

    state.upload.clone().send().await
}

/// Reflects the request method, selected headers and JSON body.
async fn echo(method: Method, headers: HeaderMap, body: String) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    let body: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
    axum::Json(json!({
        "method": method.as_str(),
        "content_type": header("content-type"),
        "trace": header("x-trace"),
        "body": body,
    }))
    .into_response()
}

/// Endpoint that refuses connections.
pub async fn closed_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/api", addr)
}

pub fn pipeline(base_url: &str) -> Pipeline {
    Pipeline::new(
        PipelineConfig::default().with_base_url(base_url),
        ApiClient::new(base_url),
        Arc::new(InMemoryStore::new()),
        Arc::new(InMemoryStore::new()),
    )
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    NoData,
    Loading,
    Rendered(NormalizedPayload),
    Notified(Notification),
}

#[derive(Default)]
pub struct RecordingView {
    pub events: Vec<ViewEvent>,
}

impl PageView for RecordingView {
    fn show_no_data(&mut self) {
        self.events.push(ViewEvent::NoData);
    }

    fn show_loading(&mut self) {
        self.events.push(ViewEvent::Loading);
    }

    fn render(&mut self, payload: &NormalizedPayload) {
        self.events.push(ViewEvent::Rendered(payload.clone()));
    }

    fn notify(&mut self, notification: &Notification) {
        self.events.push(ViewEvent::Notified(notification.clone()));
    }
}

//! In-process mock of the reconstruction service.
//!
//! Serves `/submit`, `/status/:job_id` and `/result/:timestamp` on an
//! ephemeral port and records what the client sent. A bare WebSocket
//! acceptor stands in for the streaming endpoint.

#![allow(dead_code)]

use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;

pub type ServerSocket = WebSocketStream<TcpStream>;

/// One uploaded `images` part.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// One `POST /submit` as the server saw it.
#[derive(Debug, Clone, Default)]
pub struct RecordedSubmission {
    pub timestamp: Option<String>,
    pub images: Vec<UploadedImage>,
    pub skip_warning_header: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResultReply {
    pub status: StatusCode,
    pub disposition: Option<String>,
    pub body: Vec<u8>,
}

impl Default for ResultReply {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            disposition: Some("attachment; filename=\"1_2_3.splat\"".to_string()),
            body: b"SPLATDATA".to_vec(),
        }
    }
}

#[derive(Debug, Default)]
pub struct MockService {
    pub submissions: Mutex<Vec<RecordedSubmission>>,
    pub submit_failure: Mutex<Option<StatusCode>>,
    pub submit_delay: Mutex<Duration>,
    /// Replies served in order; the last one repeats.
    pub status_script: Mutex<VecDeque<(StatusCode, String)>>,
    pub status_calls: AtomicUsize,
    pub status_paths: Mutex<Vec<String>>,
    pub result: Mutex<ResultReply>,
    pub result_requests: Mutex<Vec<String>>,
    pub job_counter: AtomicUsize,
}

impl MockService {
    pub fn script_status(&self, replies: &[Value]) {
        let mut script = self.status_script.lock().unwrap();
        script.clear();
        for reply in replies {
            script.push_back((StatusCode::OK, reply.to_string()));
        }
    }

    pub fn script_raw_status(&self, status: StatusCode, body: &str) {
        let mut script = self.status_script.lock().unwrap();
        script.clear();
        script.push_back((status, body.to_string()));
    }

    pub fn fail_submit(&self, status: StatusCode) {
        *self.submit_failure.lock().unwrap() = Some(status);
    }

    pub fn set_submit_delay(&self, delay: Duration) {
        *self.submit_delay.lock().unwrap() = delay;
    }

    pub fn set_result(&self, reply: ResultReply) {
        *self.result.lock().unwrap() = reply;
    }

    pub fn submissions(&self) -> Vec<RecordedSubmission> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn result_requests(&self) -> Vec<String> {
        self.result_requests.lock().unwrap().clone()
    }
}

/// Start the mock and return its base URL.
pub async fn spawn_service() -> (String, Arc<MockService>) {
    let state = Arc::new(MockService::default());
    state.script_status(&[json!({ "status": "done" })]);

    let app = Router::new()
        .route("/submit", post(submit))
        .route("/status/:job_id", get(status))
        .route("/result/:timestamp", get(result))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), state)
}

/// Accept WebSocket connections and hand each one to the test.
pub async fn spawn_ws_server() -> (String, mpsc::UnboundedReceiver<ServerSocket>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            if let Ok(ws) = tokio_tungstenite::accept_async(stream).await {
                if tx.send(ws).is_err() {
                    break;
                }
            }
        }
    });

    (format!("ws://{}/stream", addr), rx)
}

async fn submit(
    State(state): State<Arc<MockService>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let mut recorded = RecordedSubmission {
        skip_warning_header: headers
            .get("ngrok-skip-browser-warning")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        ..Default::default()
    };

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.unwrap_or_default().to_vec();
        match name.as_str() {
            "timestamp" => recorded.timestamp = String::from_utf8(data).ok(),
            "images" => recorded.images.push(UploadedImage {
                file_name,
                content_type,
                data,
            }),
            _ => {}
        }
    }

    let num_images = recorded.images.len();
    state.submissions.lock().unwrap().push(recorded);

    let delay = *state.submit_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let failure = *state.submit_failure.lock().unwrap();
    if let Some(status) = failure {
        return (status, "submit rejected").into_response();
    }

    let n = state.job_counter.fetch_add(1, Ordering::SeqCst) + 1;
    Json(json!({
        "job_id": format!("job-{}", n),
        "status": "submitted",
        "num_images": num_images,
    }))
    .into_response()
}

async fn status(State(state): State<Arc<MockService>>, Path(job_id): Path<String>) -> Response {
    state.status_calls.fetch_add(1, Ordering::SeqCst);
    state.status_paths.lock().unwrap().push(job_id);

    let (status, body) = {
        let mut script = state.status_script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap()
        }
    };
    (
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        body,
    )
        .into_response()
}

async fn result(State(state): State<Arc<MockService>>, Path(timestamp): Path<String>) -> Response {
    state.result_requests.lock().unwrap().push(timestamp);

    let reply = state.result.lock().unwrap().clone();
    let mut response = (reply.status, reply.body).into_response();
    if let Some(disposition) = reply.disposition {
        response.headers_mut().insert(
            header::CONTENT_DISPOSITION,
            HeaderValue::from_str(&disposition).unwrap(),
        );
    }
    response
}

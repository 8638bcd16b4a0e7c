//! In-process HTTP mock server standing in for external services
//!
//! Every request is recorded by path. Paths without an installed handler
//! answer 404 with a body naming the path.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::Result;

/// Request captured by the mock server
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl MockRequest {
    /// Query argument, empty when absent
    pub fn arg(&self, name: &str) -> &str {
        self.query.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Response produced by a mock handler
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: StatusCode,
    pub content_type: String,
    pub body: String,
}

impl MockResponse {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: "text/plain; charset=utf-8".to_string(),
            body: body.into(),
        }
    }

    pub fn json(value: &serde_json::Value) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: "application/json".to_string(),
            body: value.to_string(),
        }
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl IntoResponse for MockResponse {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, self.content_type)],
            self.body,
        )
            .into_response()
    }
}

type MockHandler = Arc<dyn Fn(&MockRequest) -> MockResponse + Send + Sync>;

#[derive(Default)]
struct MockState {
    handlers: Mutex<HashMap<String, MockHandler>>,
    calls: Mutex<HashMap<String, Vec<MockRequest>>>,
}

// A poisoned lock only means another test thread panicked mid-update;
// the maps stay usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mock HTTP server bound to an ephemeral localhost port
pub struct MockServer {
    addr: SocketAddr,
    state: Arc<MockState>,
    task: JoinHandle<()>,
}

impl MockServer {
    pub async fn start() -> Result<Self> {
        let state = Arc::new(MockState::default());
        let app = Router::new().fallback(dispatch).with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                warn!("Mock server stopped: {}", e);
            }
        });

        info!("Mock server listening on http://{}", addr);
        Ok(Self { addr, state, task })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Absolute URL of `path` on this server
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Install (or replace) the handler for `path`
    pub fn handler<F>(&self, path: &str, handler: F)
    where
        F: Fn(&MockRequest) -> MockResponse + Send + Sync + 'static,
    {
        lock(&self.state.handlers).insert(path.to_string(), Arc::new(handler));
    }

    pub fn times_called(&self, path: &str) -> usize {
        lock(&self.state.calls).get(path).map_or(0, Vec::len)
    }

    /// Requests received on `path`, oldest first
    pub fn requests(&self, path: &str) -> Vec<MockRequest> {
        lock(&self.state.calls).get(path).cloned().unwrap_or_default()
    }

    pub fn reset(&self) {
        lock(&self.state.calls).clear();
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn dispatch(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = MockRequest {
        method,
        path: uri.path().to_string(),
        query,
        headers,
        body,
    };
    debug!("Mock server: {} {}", request.method, request.path);

    let handler = lock(&state.handlers).get(&request.path).cloned();
    let response = match &handler {
        Some(handler) => handler(&request),
        None => MockResponse::text(format!("no mock handler for {}", request.path))
            .status(StatusCode::NOT_FOUND),
    };

    lock(&state.calls)
        .entry(request.path.clone())
        .or_default()
        .push(request);

    response.into_response()
}

//! Shared helpers for integration tests: a local upload endpoint.

#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Default)]
struct EndpointState {
    hits: Arc<Mutex<Vec<String>>>,
    bodies: Arc<Mutex<Vec<Vec<u8>>>>,
}

/// A mock upload server bound to an ephemeral local port.
///
/// - `POST /upload` stores the body and answers 200 "OK"
/// - `POST /busy` answers 503 "busy"
/// - `POST /hang` stores the body and never answers in time
pub struct MockEndpoint {
    base: String,
    state: EndpointState,
}

impl MockEndpoint {
    pub async fn start() -> Self {
        let state = EndpointState::default();
        let app = Router::new()
            .route("/upload", post(upload))
            .route("/busy", post(busy))
            .route("/hang", post(hang))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://{addr}"),
            state,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    /// Paths hit so far, in order.
    pub fn hits(&self) -> Vec<String> {
        self.state.hits.lock().clone()
    }

    /// Bodies of the requests that reached a handler.
    pub fn bodies(&self) -> Vec<Vec<u8>> {
        self.state.bodies.lock().clone()
    }

    /// Waits until at least `count` requests reached a handler.
    pub async fn wait_for_hits(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(10), async {
            while self.state.hits.lock().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }
}

async fn upload(State(state): State<EndpointState>, body: Bytes) -> &'static str {
    state.hits.lock().push("/upload".to_string());
    state.bodies.lock().push(body.to_vec());
    "OK"
}

async fn busy(State(state): State<EndpointState>, _body: Bytes) -> (StatusCode, &'static str) {
    state.hits.lock().push("/busy".to_string());
    (StatusCode::SERVICE_UNAVAILABLE, "busy")
}

async fn hang(State(state): State<EndpointState>, body: Bytes) -> &'static str {
    state.hits.lock().push("/hang".to_string());
    state.bodies.lock().push(body.to_vec());
    tokio::time::sleep(Duration::from_secs(60)).await;
    "late"
}

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use dashmap::DashMap;
use tokio::net::TcpListener;

#[derive(Default)]
struct MediaState {
    files: DashMap<String, Vec<u8>>,
    bearer: parking_lot::RwLock<String>,
    hits: AtomicUsize,
}

/// Local stand-in for the Drive media endpoint
/// (`GET /drive/v3/files/{id}?alt=media`).
pub struct MediaServer {
    pub addr: SocketAddr,
    pub api_base: String,
    state: Arc<MediaState>,
}

impl MediaServer {
    /// Requests must carry `Authorization: Bearer {bearer}`.
    pub async fn spawn(bearer: &str) -> Self {
        let state = Arc::new(MediaState::default());
        *state.bearer.write() = bearer.to_string();

        let app = Router::new()
            .route("/drive/v3/files/{file_id}", get(media))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            api_base: format!("http://{}/drive/v3", addr),
            state,
        }
    }

    pub fn put_file(&self, file_id: &str, bytes: &[u8]) {
        self.state.files.insert(file_id.to_string(), bytes.to_vec());
    }

    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }
}

async fn media(
    State(state): State<Arc<MediaState>>,
    Path(file_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    state.hits.fetch_add(1, Ordering::SeqCst);

    let expected = format!("Bearer {}", state.bearer.read());
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected);
    if !authorized {
        return (StatusCode::UNAUTHORIZED, Vec::new());
    }
    if params.get("alt").map(String::as_str) != Some("media") {
        return (StatusCode::BAD_REQUEST, Vec::new());
    }

    match state.files.get(&file_id) {
        Some(bytes) => (StatusCode::OK, bytes.clone()),
        None => (StatusCode::NOT_FOUND, Vec::new()),
    }
}

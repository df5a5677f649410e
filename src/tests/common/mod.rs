// tests/common/mod.rs
pub use axum::Router;
pub use serde_json::json;
pub use tokio::task::JoinHandle;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Form, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Json;
use reqwest::Client;

use crate::cache::credential::Credential;
use crate::sources::oauth2::{OAuth2Client, TokenManager};

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}

/// How the fake token endpoint answers.
#[derive(Clone)]
pub struct TokenEndpoint {
    pub status: StatusCode,
    /// hand out R<n> next to T<n>
    pub rotate: bool,
    pub expires_in: i64,
    pub delay: Duration,
}

impl Default for TokenEndpoint {
    fn default() -> Self {
        Self { status: StatusCode::OK, rotate: false, expires_in: 3600, delay: Duration::ZERO }
    }
}

/// What the fake token endpoint saw.
#[derive(Default)]
pub struct TokenRecorder {
    pub calls: AtomicUsize,
    pub last_auth: Mutex<Option<String>>,
    pub last_form: Mutex<HashMap<String, String>>,
}

impl TokenRecorder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn form_value(&self, key: &str) -> Option<String> {
        self.last_form.lock().unwrap().get(key).cloned()
    }
}

/// Token endpoint at `/oauth2/token`; the n-th call returns access token `T<n+1>`.
pub async fn spawn_token_endpoint(endpoint: TokenEndpoint) -> (String, Arc<TokenRecorder>) {
    let recorder = Arc::new(TokenRecorder::default());
    let router = Router::new()
        .route("/oauth2/token", post(token_handler))
        .with_state((endpoint, recorder.clone()));
    let (_handle, addr) = spawn_axum(router).await;
    (format!("http://{}/oauth2/token", addr), recorder)
}

async fn token_handler(
    State((endpoint, recorder)): State<(TokenEndpoint, Arc<TokenRecorder>)>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let n = recorder.calls.fetch_add(1, Ordering::SeqCst) + 1;
    *recorder.last_auth.lock().unwrap() = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    *recorder.last_form.lock().unwrap() = form;
    tokio::time::sleep(endpoint.delay).await;

    if !endpoint.status.is_success() {
        return (endpoint.status, Json(json!({ "error": "invalid_grant" }))).into_response();
    }
    let mut body = json!({
        "token_type": "bearer",
        "access_token": format!("T{}", n + 1),
        "expires_in": endpoint.expires_in,
    });
    if endpoint.rotate {
        body["refresh_token"] = json!(format!("R{}", n + 1));
    }
    (StatusCode::OK, Json(body)).into_response()
}

pub fn oauth_client(token_url: &str) -> OAuth2Client {
    OAuth2Client {
        token_url: token_url.to_owned(),
        client_id: Some("client-1".to_owned()),
        client_secret: Some("secret-1".to_owned()),
    }
}

pub fn token_manager(client: &Client, token_url: &str, initial: Credential) -> TokenManager {
    TokenManager::new("twitter", client.clone(), oauth_client(token_url), initial, 60)
}

//! In-process mock backends for integration testing.
//!
//! Spawns an Auth Provider and a chat gateway on random ports, speaking
//! the same dialect as the real backend: the `{status, data|message, code}`
//! REST envelope and the `{action, data}` WebSocket envelope.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, post};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Behavior switches for the mock gateway.
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    /// Ack join/leave with legacy `status` frames instead of tagged ones.
    pub legacy_status_acks: bool,
    /// Acknowledge `leave_room` at all.
    pub ack_leaves: bool,
    /// Reject `join_room` for tokens that already joined on a previous
    /// connection, simulating lost server-side state.
    pub fail_rejoin: bool,
    /// Prepend a non-JSON frame before each join ack.
    pub emit_garbage: bool,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            legacy_status_acks: false,
            ack_leaves: true,
            fail_rejoin: false,
            emit_garbage: false,
        }
    }
}

struct AuthState {
    users: Mutex<HashMap<String, String>>,
    token_seq: AtomicU64,
}

/// Mock Auth Provider with `/register` and `/login`.
pub struct MockAuthServer {
    /// Bound address.
    pub addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl MockAuthServer {
    pub async fn spawn() -> Self {
        let state = Arc::new(AuthState {
            users: Mutex::new(HashMap::new()),
            token_seq: AtomicU64::new(0),
        });
        let app = Router::new()
            .route("/register", post(register))
            .route("/login", post(login))
            .with_state(state);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, handle }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for MockAuthServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn register(State(state): State<Arc<AuthState>>, body: String) -> Response {
    let Ok(body) = serde_json::from_str::<Value>(&body) else {
        return (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({"status": "error", "message": "invalid body"})),
        )
            .into_response();
    };
    let email = body["email"].as_str().unwrap_or_default().to_string();
    let password = body["password"].as_str().unwrap_or_default().to_string();
    let mut users = state.users.lock().unwrap();
    if users.contains_key(&email) {
        return (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({"status": "error", "code": "EMAIL_EXISTS"})),
        )
            .into_response();
    }
    users.insert(email, password);
    axum::Json(json!({"status": "success"})).into_response()
}

async fn login(State(state): State<Arc<AuthState>>, body: String) -> Response {
    let Ok(body) = serde_json::from_str::<Value>(&body) else {
        return (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({"status": "error", "message": "invalid body"})),
        )
            .into_response();
    };
    let email = body["email"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    let valid = state.users.lock().unwrap().get(email).map(String::as_str) == Some(password);
    if !valid {
        return (
            StatusCode::UNAUTHORIZED,
            axum::Json(json!({"status": "error", "message": "invalid credentials"})),
        )
            .into_response();
    }
    let seq = state.token_seq.fetch_add(1, Ordering::Relaxed);
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        format!("csrf_token=csrf-{seq}; Path=/; HttpOnly")
            .parse()
            .unwrap(),
    );
    (
        headers,
        axum::Json(json!({
            "status": "success",
            "data": { "access_token": format!("tok-{seq}") }
        })),
    )
        .into_response()
}

struct GatewayState {
    options: GatewayOptions,
    joined_tokens: Mutex<HashSet<String>>,
}

/// Mock chat gateway with a `/ws` endpoint.
pub struct MockGateway {
    /// Bound address.
    pub addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl MockGateway {
    pub async fn spawn() -> Self {
        Self::spawn_with(GatewayOptions::default()).await
    }

    pub async fn spawn_with(options: GatewayOptions) -> Self {
        let state = Arc::new(GatewayState {
            options,
            joined_tokens: Mutex::new(HashSet::new()),
        });
        let app = Router::new()
            .route("/ws", any(ws_handler))
            .with_state(state);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, handle }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

impl Drop for MockGateway {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<std::collections::HashMap<String, String>>,
    headers: HeaderMap,
    State(state): State<Arc<GatewayState>>,
) -> Response {
    let token = params
        .get("token")
        .cloned()
        .or_else(|| bearer_token(&headers))
        .unwrap_or_default();
    if token.is_empty() || !token.starts_with("tok-") {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    ws.on_upgrade(move |socket| serve_socket(socket, token, state))
}

async fn serve_socket(mut socket: WebSocket, token: String, state: Arc<GatewayState>) {
    while let Some(Ok(frame)) = socket.recv().await {
        let Message::Text(text) = frame else { continue };
        let Ok(request) = serde_json::from_str::<Value>(text.as_str()) else {
            let _ = send_json(
                &mut socket,
                json!({
                    "action": "error",
                    "data": { "error_type": "invalid_data", "message": "無法解析數據" }
                }),
            )
            .await;
            continue;
        };

        let action = request["action"].as_str().unwrap_or_default();
        let data = &request["data"];
        let room_id = data["room_id"].as_str().unwrap_or_default();
        let room_type = data["room_type"].as_str().unwrap_or("channel");

        let reply = match action {
            "join_room" => {
                let rejoin_blocked = state.options.fail_rejoin
                    && !state.joined_tokens.lock().unwrap().insert(token.clone());
                if rejoin_blocked {
                    json!({
                        "action": "error",
                        "data": {
                            "error_type": "permission_denied",
                            "message": "用戶沒有權限加入此房間"
                        }
                    })
                } else if state.options.legacy_status_acks {
                    json!({
                        "action": "status",
                        "data": { "message": format!("加入房間成功: {room_id}") }
                    })
                } else {
                    if state.options.emit_garbage {
                        let _ = socket.send(Message::Text("}{ not json".into())).await;
                    }
                    json!({
                        "action": "room_joined",
                        "data": {
                            "status": "success",
                            "message": format!("成功加入 {room_type} 房間 {room_id}")
                        }
                    })
                }
            }
            "leave_room" => {
                if !state.options.ack_leaves {
                    continue;
                }
                if state.options.legacy_status_acks {
                    json!({
                        "action": "status",
                        "data": { "message": format!("離開房間成功: {room_id}") }
                    })
                } else {
                    json!({
                        "action": "room_left",
                        "data": {
                            "status": "success",
                            "message": format!("成功離開 {room_type} 房間 {room_id}")
                        }
                    })
                }
            }
            "send_message" => json!({
                "action": "message_sent",
                "data": {
                    "room_id": room_id,
                    "room_type": room_type,
                    "content": data["content"].as_str().unwrap_or_default(),
                    "timestamp": 0
                }
            }),
            "ping" => json!({
                "action": "pong",
                "data": { "message": "pong", "timestamp": 0 }
            }),
            _ => json!({
                "action": "error",
                "data": { "error_type": "unknown_action", "message": "未知的動作類型" }
            }),
        };

        if send_json(&mut socket, reply).await.is_err() {
            break;
        }
    }
}

async fn send_json(socket: &mut WebSocket, value: Value) -> Result<(), axum::Error> {
    socket.send(Message::Text(value.to_string().into())).await
}

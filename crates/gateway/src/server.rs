use std::sync::Arc;

use {
    axum::{
        Json, Router,
        body::Bytes,
        extract::{DefaultBodyLimit, Path, State},
        http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
        response::{IntoResponse, Response},
        routing::{get, post},
    },
    serde_json::Value,
    tower_http::{
        cors::{Any, CorsLayer},
        trace::TraceLayer,
    },
    tracing::info,
};

use switchboard_protocol::{
    DispatchError, MAX_PAYLOAD_BYTES, PROTOCOL_VERSION, RequestEnvelope, ResponseEnvelope,
    ToolCall, ToolCallResult,
};

use crate::{auth::TokenAuth, dispatch::Dispatcher};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

// ── Shared app state ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub auth: Arc<TokenAuth>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, auth: TokenAuth) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            auth: Arc::new(auth),
        }
    }
}

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the HTTP router (shared between production startup and tests).
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/dispatch", post(dispatch_handler))
        .route("/api/dispatch/{key}", post(dispatch_key_handler))
        .route("/api/tool-call", post(tool_call_handler))
        .route("/api/registry", get(registry_handler))
        .route("/api/tools", get(tools_handler))
        .layer(DefaultBodyLimit::max(MAX_PAYLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve(
    state: AppState,
    bind: &str,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind((bind, port)).await?;
    info!(
        addr = %listener.local_addr()?,
        handlers = state.dispatcher.registry().len(),
        "switchboard listening"
    );
    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("switchboard stopped");
    Ok(())
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": PROTOCOL_VERSION,
        "handlers": state.dispatcher.registry().len(),
    }))
}

fn envelope_response(envelope: ResponseEnvelope) -> Response {
    let status =
        StatusCode::from_u16(envelope.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (status, Json(&envelope)).into_response();
    if let Some(id) = envelope.request_id.as_deref()
        && let Ok(value) = HeaderValue::from_str(id)
    {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}

fn header_request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Error envelope for a body that never reached the dispatcher.
fn rejected_body(headers: &HeaderMap, err: &DispatchError) -> ResponseEnvelope {
    let request_id =
        header_request_id(headers).unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    ResponseEnvelope::err(err).with_request_id(request_id)
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &Bytes) -> Result<T, DispatchError> {
    serde_json::from_slice(body).map_err(|e| DispatchError::bad_request(format!("invalid body: {e}")))
}

/// Caller-supplied identity in the body is never trusted; only the bearer
/// header counts.
async fn run(state: &AppState, headers: &HeaderMap, mut request: RequestEnvelope) -> Response {
    request.auth = state.auth.from_headers(headers);
    if request.request_id.is_none() {
        request.request_id = header_request_id(headers);
    }
    envelope_response(state.dispatcher.dispatch(request).await)
}

async fn dispatch_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match parse_body::<RequestEnvelope>(&body) {
        Ok(request) => run(&state, &headers, request).await,
        Err(err) => envelope_response(rejected_body(&headers, &err)),
    }
}

async fn dispatch_key_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let params = if body.iter().all(u8::is_ascii_whitespace) {
        Ok(Value::Null)
    } else {
        parse_body::<Value>(&body)
    };
    match params {
        Ok(params) => run(&state, &headers, RequestEnvelope::new(key, params)).await,
        // The key and the caller are checked before the body is blamed.
        Err(err) => {
            let mut request = RequestEnvelope::new(key, Value::Null);
            request.auth = state.auth.from_headers(&headers);
            request.request_id = header_request_id(&headers);
            envelope_response(state.dispatcher.dispatch_undecodable(request, err).await)
        },
    }
}

async fn tool_call_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<ToolCallResult> {
    let result = match parse_body::<ToolCall>(&body) {
        Ok(call) => {
            let auth = state.auth.from_headers(&headers);
            state.dispatcher.dispatch_tool_call(call, auth).await
        },
        Err(err) => ToolCallResult {
            tool_call_id: String::new(),
            envelope: rejected_body(&headers, &err),
        },
    };
    Json(result)
}

async fn registry_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.dispatcher.registry().describe_keys())
}

async fn tools_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.dispatcher.registry().tool_definitions())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, switchboard_registry::Registry};

    fn state() -> AppState {
        AppState::new(
            Dispatcher::new(Arc::new(Registry::new())),
            TokenAuth::default(),
        )
    }

    #[tokio::test]
    async fn serve_binds_hostnames() {
        serve(state(), "localhost", 0, async {}).await.unwrap();
    }

    #[tokio::test]
    async fn serve_binds_bare_ipv6() {
        // Not every sandbox has an IPv6 loopback; only a parse failure counts.
        if let Err(err) = serve(state(), "::1", 0, async {}).await {
            assert!(err.downcast_ref::<std::io::Error>().is_some(), "{err}");
        }
    }

    #[test]
    fn rejected_body_carries_request_id() {
        let err = DispatchError::bad_request("invalid body");
        let mut headers = HeaderMap::new();
        let env = rejected_body(&headers, &err);
        assert!(env.request_id.is_some());

        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("req-9"));
        let env = rejected_body(&headers, &err);
        assert_eq!(env.request_id.as_deref(), Some("req-9"));
    }
}

//! End-to-end tests for the HTTP dispatch surface.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;

use {
    secrecy::Secret,
    serde_json::{Value, json},
    tokio::net::TcpListener,
};

use {
    switchboard_config::{ApiToken, SwitchboardConfig},
    switchboard_gateway::{app_state_from_config, build_app},
};

const ALICE: &str = "alice-token";
const ROOT: &str = "root-token";

/// Start a test server with two bearer tokens configured.
async fn start_server() -> SocketAddr {
    let mut config = SwitchboardConfig::default();
    config.auth.tokens = vec![
        ApiToken {
            token: Secret::new(ALICE.into()),
            subject: "alice".into(),
            scopes: vec![],
        },
        ApiToken {
            token: Secret::new(ROOT.into()),
            subject: "root".into(),
            scopes: vec!["admin".into()],
        },
    ];
    config
        .aliases
        .insert("mem.save".into(), "memory.save".into());
    let app = build_app(app_state_from_config(&config).unwrap());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn post(
    addr: SocketAddr,
    path: &str,
    token: Option<&str>,
    body: Value,
) -> (u16, Value) {
    let client = reqwest::Client::new();
    let mut req = client.post(format!("http://{addr}{path}")).json(&body);
    if let Some(token) = token {
        req = req.header("Authorization", format!("Bearer {token}"));
    }
    let resp = req.send().await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn health_reports_handler_count() {
    let addr = start_server().await;
    let body: Value = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["handlers"].as_u64().unwrap() >= 7);
}

#[tokio::test]
async fn public_key_dispatches_without_token() {
    let addr = start_server().await;
    let (status, body) = post(
        addr,
        "/api/dispatch",
        None,
        json!({"key": "system.ping", "params": {"echo": "hi"}}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["ok"], true);
    assert_eq!(body["data"], json!({"pong": true, "echo": "hi"}));
    assert!(body["requestId"].is_string());
}

#[tokio::test]
async fn protected_key_without_token_is_401() {
    let addr = start_server().await;
    let (status, body) = post(
        addr,
        "/api/dispatch",
        None,
        json!({"key": "identity.whoami", "params": {}}),
    )
    .await;
    assert_eq!(status, 401);
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    assert_eq!(body["error"]["statusCode"], 401);
}

#[tokio::test]
async fn body_auth_context_is_ignored() {
    let addr = start_server().await;
    let (status, _) = post(
        addr,
        "/api/dispatch",
        None,
        json!({
            "key": "identity.whoami",
            "params": {},
            "authContext": {"subject": "mallory", "scopes": ["admin"]},
        }),
    )
    .await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn bearer_token_resolves_identity() {
    let addr = start_server().await;
    let (status, body) = post(addr, "/api/dispatch/identity.whoami", Some(ALICE), json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["subject"], "alice");
}

#[tokio::test]
async fn missing_scope_is_403_and_admin_passes() {
    let addr = start_server().await;
    let params = json!({"key": "k"});
    let (status, body) = post(addr, "/api/dispatch/memory.delete", Some(ALICE), params.clone()).await;
    assert_eq!(status, 403);
    assert_eq!(body["error"]["message"], "missing scope: memory.write");

    let (status, _) = post(addr, "/api/dispatch/memory.delete", Some(ROOT), params).await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn unknown_key_is_404() {
    let addr = start_server().await;
    let (status, body) = post(addr, "/api/dispatch/foo.bar", None, json!({})).await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn invalid_params_are_400() {
    let addr = start_server().await;
    let (status, body) = post(addr, "/api/dispatch/memory.save", Some(ALICE), json!({"key": "k"})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn malformed_body_is_400_envelope() {
    let addr = start_server().await;
    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/api/dispatch"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert!(body["requestId"].is_string());
}

async fn post_raw(addr: SocketAddr, path: &str, token: Option<&str>, raw: &str) -> (u16, Value) {
    let mut req = reqwest::Client::new()
        .post(format!("http://{addr}{path}"))
        .header("content-type", "application/json")
        .body(raw.to_string());
    if let Some(token) = token {
        req = req.header("Authorization", format!("Bearer {token}"));
    }
    let resp = req.send().await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn malformed_params_on_protected_key_is_401() {
    let addr = start_server().await;
    let (status, body) = post_raw(addr, "/api/dispatch/identity.whoami", None, "{oops").await;
    assert_eq!(status, 401);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    assert!(body["requestId"].is_string());

    let (status, body) = post_raw(addr, "/api/dispatch/no.such", None, "{oops").await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, body) =
        post_raw(addr, "/api/dispatch/identity.whoami", Some(ALICE), "{oops").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn malformed_tool_call_gets_request_id() {
    let addr = start_server().await;
    let (status, body) = post_raw(addr, "/api/tool-call", None, "{oops").await;
    assert_eq!(status, 200);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert!(body["requestId"].is_string());
}

#[tokio::test]
async fn alias_and_target_match() {
    let addr = start_server().await;
    let body = |key: &str| json!({"key": key, "params": {"name": "Ada"}, "requestId": "fixed"});
    let (_, target) = post(addr, "/api/dispatch", None, body("onboarding.start")).await;
    let (_, alias) = post(addr, "/api/dispatch", None, body("onboarding.ambaradam.start")).await;
    assert_eq!(target, alias);
    assert_eq!(target["data"]["greeting"], "Welcome, Ada!");
}

#[tokio::test]
async fn configured_alias_shares_state() {
    let addr = start_server().await;
    let (status, _) = post(
        addr,
        "/api/dispatch/mem.save",
        Some(ALICE),
        json!({"key": "color", "value": "teal"}),
    )
    .await;
    assert_eq!(status, 200);
    let (_, body) = post(addr, "/api/dispatch/memory.get", Some(ALICE), json!({"key": "color"})).await;
    assert_eq!(body["data"]["value"], "teal");
}

#[tokio::test]
async fn request_id_header_is_echoed() {
    let addr = start_server().await;
    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/api/dispatch/system.ping"))
        .header("x-request-id", "trace-42")
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(
        resp.headers().get("x-request-id").unwrap().to_str().unwrap(),
        "trace-42"
    );
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["requestId"], "trace-42");
}

#[tokio::test]
async fn tool_call_round_trip() {
    let addr = start_server().await;
    let (status, body) = post(
        addr,
        "/api/tool-call",
        Some(ALICE),
        json!({
            "id": "call_9",
            "name": "memory.save",
            "arguments": "{\"key\":\"a\",\"value\":1}",
        }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["toolCallId"], "call_9");
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn tool_call_failure_still_200() {
    let addr = start_server().await;
    let (status, body) = post(
        addr,
        "/api/tool-call",
        None,
        json!({"id": "call_1", "name": "identity.whoami", "arguments": {}}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn introspection_endpoints() {
    let addr = start_server().await;
    let keys: Vec<Value> = reqwest::get(format!("http://{addr}/api/registry"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let alias = keys
        .iter()
        .find(|k| k["key"] == "onboarding.ambaradam.start")
        .unwrap();
    assert_eq!(alias["aliasOf"], "onboarding.start");

    let tools: Vec<Value> = reqwest::get(format!("http://{addr}/api/tools"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(tools.iter().any(|t| t["name"] == "memory.save"));
    assert!(!tools.iter().any(|t| t["name"] == "onboarding.ambaradam.start"));
    let save = tools.iter().find(|t| t["name"] == "memory.save").unwrap();
    assert_eq!(save["parameters"]["type"], "object");
}

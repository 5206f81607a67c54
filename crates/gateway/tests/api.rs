//! HTTP API against an in-process server on an ephemeral port.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use pa_datasource::SimulatedDataSource;
use pa_domain::config::{Config, DataServiceMode};
use pa_gateway::api;
use pa_gateway::bootstrap::{build_app_state, build_app_state_with};
use pa_gateway::state::AppState;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

fn test_config(state_path: &Path) -> Config {
    let mut config = Config::default();
    config.sessions.state_path = state_path.to_path_buf();
    config.server.api_token_env = "PA_TEST_API_UNSET_API_TOKEN".into();
    config.admin.token_env = "PA_TEST_API_UNSET_ADMIN_TOKEN".into();
    config.llm.api_key_env = "PA_TEST_API_UNSET_LLM_KEY".into();
    config
}

async fn simulated_state(state_path: &Path) -> AppState {
    build_app_state_with(Arc::new(test_config(state_path)), Arc::new(SimulatedDataSource))
        .await
        .unwrap()
}

/// Serve the gateway router and return its base URL.
async fn serve(state: AppState) -> String {
    let app = api::router(state.clone()).with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn post_json(url: &str, body: Value) -> (StatusCode, Value) {
    let resp = reqwest::Client::new().post(url).json(&body).send().await.unwrap();
    let status = StatusCode::from_u16(resp.status().as_u16()).unwrap();
    (status, resp.json().await.unwrap())
}

async fn get_json(url: &str) -> (StatusCode, Value) {
    let resp = reqwest::get(url).await.unwrap();
    let status = StatusCode::from_u16(resp.status().as_u16()).unwrap();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn health_is_public() {
    let dir = tempfile::tempdir().unwrap();
    let base = serve(simulated_state(dir.path()).await).await;

    let (status, body) = get_json(&format!("{base}/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["data_source"], "simulated");
}

#[tokio::test]
async fn session_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let base = serve(simulated_state(dir.path()).await).await;

    let (status, created) = post_json(
        &format!("{base}/api/sessions/create"),
        json!({ "user_id": "u1" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["title"], "New Chat");
    let session_id = created["session_id"].as_str().unwrap().to_owned();

    let (status, _) = post_json(
        &format!("{base}/api/sessions/rename"),
        json!({ "session_id": session_id, "title": "iware lookups" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, listed) = get_json(&format!("{base}/api/sessions/list?user_id=u1")).await;
    assert_eq!(listed["data"][0]["title"], "iware lookups");

    let (status, _) = post_json(
        &format!("{base}/api/sessions/rename"),
        json!({ "session_id": "missing", "title": "x" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = post_json(
        &format!("{base}/api/sessions/delete"),
        json!({ "session_id": session_id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, listed) = get_json(&format!("{base}/api/sessions/list?user_id=u1")).await;
    assert_eq!(listed["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn sync_chat_history_and_trace() {
    let dir = tempfile::tempdir().unwrap();
    let base = serve(simulated_state(dir.path()).await).await;

    let (status, outcome) = post_json(
        &format!("{base}/api/chat/sync"),
        json!({
            "query": "branch hert_bugfix_2026, component iware",
            "session_id": "s1",
            "context_version": "24a",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["status"], "success");
    assert_eq!(outcome["resolution"]["outcome"], "resolved");
    assert_eq!(outcome["tool_invocations"][0]["arguments"]["int_ver"], "24a");

    let (_, history) = get_json(&format!("{base}/api/history?session_id=s1")).await;
    let roles: Vec<&str> = history["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["role"].as_str().unwrap())
        .collect();
    assert_eq!(roles, vec!["user", "ai"]);

    let (status, trace) = get_json(&format!("{base}/ops/sessions/s1/trace")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(trace["code"], 200);
    assert_eq!(trace["step_count"], 3);
    assert_eq!(trace["trace"][1]["type"], "tool");
    assert_eq!(trace["trace"][1]["status"], "success");
    assert_eq!(trace["turns"].as_array().unwrap().len(), 1);

    let (status, _) = post_json(
        &format!("{base}/api/history/clear"),
        json!({ "session_id": "s1" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, history) = get_json(&format!("{base}/api/history?session_id=s1")).await;
    assert!(history["messages"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn streamed_chat_emits_named_events() {
    let dir = tempfile::tempdir().unwrap();
    let base = serve(simulated_state(dir.path()).await).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/api/chat"))
        .json(&json!({ "query": "查一下 iware", "session_id": "s1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body = resp.text().await.unwrap();

    assert!(body.contains("event: clarification"), "{body}");
    assert!(body.contains("\"missing\":[\"search_key\"]"), "{body}");
    assert!(body.contains("event: done"), "{body}");
    assert!(!body.contains("event: tool_call"), "{body}");
}

#[tokio::test]
async fn empty_query_is_a_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let base = serve(simulated_state(dir.path()).await).await;

    let (status, body) = post_json(
        &format!("{base}/api/chat/sync"),
        json!({ "query": "  ", "session_id": "s1" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "query must not be empty");
}

#[tokio::test]
async fn session_ids_that_name_other_files_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state");
    let base = serve(simulated_state(&state_path).await).await;
    let escaped = dir.path().join("escaped").display().to_string();

    for id in ["../../outside", escaped.as_str(), "a/b", "s 1"] {
        let (status, body) = post_json(
            &format!("{base}/api/chat/sync"),
            json!({ "query": "branch foo/bar component iware", "session_id": id }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{id}");
        assert!(body["error"].as_str().unwrap().contains("session_id"));

        for path in ["/api/history/clear", "/api/sessions/delete"] {
            let (status, _) = post_json(&format!("{base}{path}"), json!({ "session_id": id })).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{path} {id}");
        }
    }

    let (status, _) = get_json(&format!("{base}/api/history?session_id=..%2F..%2Foutside")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(!dir.path().join("outside.jsonl").exists());
    assert!(!dir.path().join("escaped.jsonl").exists());
}

#[tokio::test]
async fn deleting_a_chat_only_session_clears_its_history() {
    let dir = tempfile::tempdir().unwrap();
    let base = serve(simulated_state(dir.path()).await).await;

    let (status, _) = post_json(
        &format!("{base}/api/chat/sync"),
        json!({ "query": "branch hert_bugfix_2026, component iware", "session_id": "adhoc" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(dir.path().join("sessions").join("adhoc.jsonl").exists());

    let (status, deleted) = post_json(
        &format!("{base}/api/sessions/delete"),
        json!({ "session_id": "adhoc" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["registered"], false);
    assert_eq!(deleted["traces_removed"], 1);
    assert!(!dir.path().join("sessions").join("adhoc.jsonl").exists());

    let (_, history) = get_json(&format!("{base}/api/history?session_id=adhoc")).await;
    assert!(history["messages"].as_array().unwrap().is_empty());
    let (status, _) = get_json(&format!("{base}/ops/sessions/adhoc/trace")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Deleting again is harmless.
    let (status, _) = post_json(
        &format!("{base}/api/sessions/delete"),
        json!({ "session_id": "adhoc" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn tokens_guard_api_and_ops() {
    let dir = tempfile::tempdir().unwrap();
    let mut state = simulated_state(dir.path()).await;
    state.api_token_hash = Some(Sha256::digest(b"api-secret").to_vec());
    state.admin_token_hash = Some(Sha256::digest(b"admin-secret").to_vec());
    let base = serve(state).await;
    let client = reqwest::Client::new();

    let (status, _) = get_json(&format!("{base}/api/catalogue")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let resp = client
        .get(format!("{base}/api/catalogue"))
        .bearer_auth("api-secret")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let catalogue: Value = resp.json().await.unwrap();
    assert_eq!(catalogue["operations"].as_array().unwrap().len(), 17);

    // The API token does not open the ops views.
    let resp = client
        .get(format!("{base}/ops/sessions"))
        .bearer_auth("api-secret")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);

    let resp = client
        .get(format!("{base}/ops/sessions?page=1&page_size=5"))
        .bearer_auth("admin-secret")
        .send()
        .await
        .unwrap();
    let page: Value = resp.json().await.unwrap();
    assert_eq!(page["code"], 200);
    assert_eq!(page["data"]["page_size"], 5);

    let (status, _) = get_json(&format!("{base}/health")).await;
    assert_eq!(status, StatusCode::OK);
}

/// The data service is down: every attempt gets a 503.
async fn unavailable(State(hits): State<Arc<AtomicU32>>) -> StatusCode {
    hits.fetch_add(1, Ordering::SeqCst);
    StatusCode::SERVICE_UNAVAILABLE
}

#[tokio::test]
async fn exhausted_retries_fail_the_turn() {
    let hits = Arc::new(AtomicU32::new(0));
    let service = Router::new()
        .route("/:endpoint", post(unavailable))
        .with_state(hits.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let service_addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, service).await.unwrap();
    });

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.data_service.mode = DataServiceMode::Rest;
    config.data_service.base_url = format!("http://{service_addr}");
    config.data_service.max_retries = 1;
    config.data_service.timeout_ms = 2_000;
    let base = serve(build_app_state(Arc::new(config)).await.unwrap()).await;

    let (status, outcome) = post_json(
        &format!("{base}/api/chat/sync"),
        json!({ "query": "branch hert_bugfix_2026, component iware", "session_id": "s1" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["status"], "failed");
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    let invocation = &outcome["tool_invocations"][0];
    assert_eq!(invocation["error"]["kind"], "upstream_unavailable");
    assert!(invocation.get("result").is_none());
}

//! RestDataSource against an in-process data-service double.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use pa_datasource::{DataSource, RestDataSource};
use pa_domain::config::DataServiceConfig;
use pa_domain::Error;
use pa_routing::{BoundSlots, Operation, Param};
use serde_json::{json, Value};

#[derive(Clone, Default)]
struct Hits(Arc<AtomicU32>);

impl Hits {
    fn bump(&self) -> u32 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
    fn get(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Fails twice with 502, then echoes the request.
async fn flaky(State(hits): State<Hits>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if hits.bump() <= 2 {
        return (StatusCode::BAD_GATEWAY, Json(json!({"error": "warming up"})));
    }
    (StatusCode::OK, Json(json!({"status": "success", "echo": body})))
}

async fn down(State(hits): State<Hits>) -> StatusCode {
    hits.bump();
    StatusCode::SERVICE_UNAVAILABLE
}

async fn invalid(State(hits): State<Hits>) -> (StatusCode, &'static str) {
    hits.bump();
    (StatusCode::BAD_REQUEST, "int_ver must look like 24a")
}

async fn slow(State(hits): State<Hits>) -> &'static str {
    hits.bump();
    tokio::time::sleep(Duration::from_millis(500)).await;
    "too late"
}

async fn plain(State(hits): State<Hits>) -> &'static str {
    hits.bump();
    "no data for this version"
}

/// Serve `handler` on every endpoint under a fresh ephemeral port.
async fn spawn_service<H, T>(handler: H) -> (String, Hits)
where
    H: axum::handler::Handler<T, Hits>,
    T: 'static,
{
    let hits = Hits::default();
    let app = Router::new()
        .route("/:endpoint", post(handler))
        .with_state(hits.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), hits)
}

fn client(base_url: String, max_retries: u32, timeout_ms: u64) -> RestDataSource {
    RestDataSource::new(&DataServiceConfig {
        base_url,
        max_retries,
        timeout_ms,
        ..DataServiceConfig::default()
    })
    .unwrap()
}

fn branch_lookup() -> BoundSlots {
    BoundSlots::from([
        (Param::MajorVersion, "24a".to_string()),
        (Param::Branch, "hert_bugfix_2026".to_string()),
        (Param::Component, "iware".to_string()),
    ])
}

#[tokio::test]
async fn transient_failures_are_retried_until_success() {
    let (url, hits) = spawn_service(flaky).await;
    let ds = client(url, 3, 2_000);

    let value = ds
        .invoke(Operation::QueryComponentByBranch.descriptor(), &branch_lookup())
        .await
        .unwrap();

    assert_eq!(hits.get(), 3);
    assert_eq!(value["echo"]["int_ver"], "24a");
    assert_eq!(value["echo"]["search"], "hert_bugfix_2026");
    assert_eq!(value["echo"]["components"], "iware");
}

#[tokio::test]
async fn exhausted_retries_are_upstream_unavailable() {
    let (url, hits) = spawn_service(down).await;
    let ds = client(url, 2, 2_000);

    let err = ds
        .invoke(Operation::QueryComponentByBranch.descriptor(), &branch_lookup())
        .await
        .unwrap_err();

    assert_eq!(hits.get(), 3);
    match err {
        Error::UpstreamUnavailable {
            attempts, endpoint, ..
        } => {
            assert_eq!(attempts, 3);
            assert_eq!(endpoint, "read_file_components");
        }
        other => panic!("expected UpstreamUnavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let (url, hits) = spawn_service(invalid).await;
    let ds = client(url, 3, 2_000);

    let err = ds
        .invoke(Operation::QueryComponentByBranch.descriptor(), &branch_lookup())
        .await
        .unwrap_err();

    assert_eq!(hits.get(), 1);
    match err {
        Error::UpstreamRejected { status, body, .. } => {
            assert_eq!(status, 400);
            assert_eq!(body, "int_ver must look like 24a");
        }
        other => panic!("expected UpstreamRejected, got {other:?}"),
    }
}

#[tokio::test]
async fn timeouts_count_as_transient() {
    let (url, hits) = spawn_service(slow).await;
    let ds = client(url, 1, 100);

    let err = ds
        .invoke(Operation::QueryComponentByBranch.descriptor(), &branch_lookup())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "upstream_unavailable");
    assert_eq!(hits.get(), 2);
}

#[tokio::test]
async fn unreachable_service_is_upstream_unavailable() {
    // Bind then drop to get a port nobody listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let ds = client(format!("http://{addr}"), 1, 500);
    let err = ds
        .invoke(Operation::QueryTrunkMirrorInfo.descriptor(), &branch_lookup())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UpstreamUnavailable { attempts: 2, .. }));
}

#[tokio::test]
async fn non_json_success_is_wrapped_as_string() {
    let (url, _) = spawn_service(plain).await;
    let ds = client(url, 0, 2_000);
    let value = ds
        .invoke(Operation::QueryTrunkMirrorInfo.descriptor(), &branch_lookup())
        .await
        .unwrap();
    assert_eq!(value, Value::String("no data for this version".into()));
}

//! Admin API through the full router, rate limiter included.

use axum::Router;
use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::routing::get;
use catraca_gateway::rate_limit::RateLimiter;
use catraca_gateway::{AppState, routes};
use catraca_storage::{Database, FileLock, NewTag, SyncLock, TagRepository};
use catraca_sync::{HttpApiClient, SyncJob};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

const ADMIN_TOKEN: &str = "admin-secret";

struct TestApp {
    db: Database,
    lock: FileLock,
    router: Router,
    _dir: TempDir,
}

async fn test_app(api_base: &str, rate_limit: u32) -> TestApp {
    let dir = TempDir::new().unwrap();
    let db = Database::in_memory().await.unwrap();
    let lock = FileLock::new(dir.path(), "import", Duration::from_secs(60));
    let api = HttpApiClient::new(api_base, "api-secret").unwrap();

    let state = AppState {
        db: db.clone(),
        repos: db.repositories(),
        sync: Arc::new(SyncJob::new(api, db.repositories(), lock.clone())),
        admin_token: Arc::from(ADMIN_TOKEN),
        rate_limiter: Arc::new(RateLimiter::per_minute(rate_limit)),
    };
    let router = routes::router(state).layer(MockConnectInfo(SocketAddr::from(([10, 0, 0, 5], 41000))));

    TestApp {
        db,
        lock,
        router,
        _dir: dir,
    }
}

/// A base URL nothing listens on.
async fn unreachable_api() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

async fn fake_api() -> String {
    let app = Router::new().route(
        "/api/catraca",
        get(|| async {
            axum::Json(json!([{
                "matricula": "2024001",
                "rfid": 1001,
                "horarios": [["09:00", [1]]],
                "liberado": true
            }]))
        })
        .post(|| async { axum::Json(json!([])) }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

impl TestApp {
    async fn send(&self, method: Method, uri: &str, token: Option<&str>) -> Response {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header("token", token);
        }
        self.router
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn seed_tag(db: &Database, user_id: &str, credential: i64) {
    db.repositories()
        .tags
        .create_or_update(&NewTag {
            user_id: user_id.to_string(),
            credential,
            released: true,
            status: String::new(),
            admin: false,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_health_needs_no_token() {
    let app = test_app(&unreachable_api().await, 60).await;

    let response = app.send(Method::GET, "/health", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["db_healthy"], true);
    assert_eq!(json["sync_running"], false);
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_health_reports_running_sync() {
    let app = test_app(&unreachable_api().await, 60).await;
    assert!(app.lock.acquire().await.unwrap());

    let json = body_json(app.send(Method::GET, "/health", None).await).await;

    assert_eq!(json["sync_running"], true);
}

#[tokio::test]
async fn test_admin_routes_reject_missing_or_wrong_token() {
    let app = test_app(&unreachable_api().await, 60).await;

    for (method, uri) in [
        (Method::GET, "/tags"),
        (Method::DELETE, "/tags"),
        (Method::GET, "/classes"),
        (Method::DELETE, "/accesses"),
        (Method::POST, "/sync"),
    ] {
        let response = app.send(method.clone(), uri, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
        assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");

        let response = app.send(method.clone(), uri, Some("admin-secreT")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
    }
}

#[tokio::test]
async fn test_list_and_erase_tags() {
    let app = test_app(&unreachable_api().await, 60).await;
    seed_tag(&app.db, "2024001", 1001).await;
    seed_tag(&app.db, "2024002", 1002).await;

    let response = app.send(Method::GET, "/tags", Some(ADMIN_TOKEN)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let tags = body_json(response).await;
    assert_eq!(tags.as_array().unwrap().len(), 2);
    assert_eq!(tags[0]["user_id"], "2024001");
    assert_eq!(tags[0]["credential"], 1001);

    let response = app.send(Method::DELETE, "/tags", Some(ADMIN_TOKEN)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"deleted": 2}));

    let response = app.send(Method::GET, "/tags", Some(ADMIN_TOKEN)).await;
    assert_eq!(body_json(response).await, json!([]));
}

#[tokio::test]
async fn test_empty_tables_list_empty() {
    let app = test_app(&unreachable_api().await, 60).await;

    for uri in ["/classes", "/accesses"] {
        let response = app.send(Method::GET, uri, Some(ADMIN_TOKEN)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!([]));
    }
}

#[tokio::test]
async fn test_manual_sync_imports_users() {
    let app = test_app(&fake_api().await, 60).await;

    let response = app.send(Method::POST, "/sync", Some(ADMIN_TOKEN)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let report = body_json(response).await;
    assert_eq!(report["imported"], 1);
    assert_eq!(report["classes"], 1);
    assert_eq!(report["pushed"], 0);
    assert_eq!(app.db.repositories().tags.get_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_manual_sync_conflicts_with_running_sync() {
    let app = test_app(&unreachable_api().await, 60).await;
    assert!(app.lock.acquire().await.unwrap());

    let response = app.send(Method::POST, "/sync", Some(ADMIN_TOKEN)).await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "SYNC_RUNNING");
}

#[tokio::test]
async fn test_manual_sync_upstream_failure_is_bad_gateway() {
    let app = test_app(&unreachable_api().await, 60).await;

    let response = app.send(Method::POST, "/sync", Some(ADMIN_TOKEN)).await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["code"], "UPSTREAM_ERROR");
    assert!(!app.lock.is_locked().await);
}

#[tokio::test]
async fn test_rate_limit_applies_per_address() {
    let app = test_app(&unreachable_api().await, 2).await;

    assert_eq!(app.send(Method::GET, "/health", None).await.status(), StatusCode::OK);
    assert_eq!(
        app.send(Method::GET, "/tags", Some(ADMIN_TOKEN)).await.status(),
        StatusCode::OK
    );

    let response = app.send(Method::GET, "/health", None).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body_json(response).await["code"], "RATE_LIMITED");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = test_app(&unreachable_api().await, 60).await;

    let response = app.send(Method::GET, "/nope", Some(ADMIN_TOKEN)).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

//! HttpApiClient against an in-process axum server.

use axum::Router;
use axum::extract::{Json, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use catraca_sync::{AccessAck, AccessPayload, AckStatus, CatracaApi, HttpApiClient, SyncError};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

const TOKEN: &str = "secret-token";

#[derive(Clone, Default)]
struct ServerState {
    received: Arc<Mutex<Vec<AccessPayload>>>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers.get("token").and_then(|v| v.to_str().ok()) == Some(TOKEN)
}

async fn list_users(headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
    if !authorized(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(Json(json!([
        {
            "matricula": "2024001",
            "rfid": "1001",
            "horarios": [["09:00", [1]]],
            "liberado": true,
            "mensagem": null,
            "admin": false
        },
        {"matricula": "broken"}
    ])))
}

async fn receive_accesses(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(accesses): Json<Vec<AccessPayload>>,
) -> Result<Json<Vec<AccessAck>>, StatusCode> {
    if !authorized(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let acks = accesses
        .iter()
        .map(|access| AccessAck {
            event_id: access.event_id.clone(),
            status: if access.user_id == "2024001" {
                AckStatus::Success
            } else {
                AckStatus::Failed
            },
            message: Some("processed".to_string()),
        })
        .collect();
    state.received.lock().unwrap().extend(accesses);
    Ok(Json(acks))
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn api_server() -> (String, ServerState) {
    let state = ServerState::default();
    let app = Router::new()
        .route("/api/catraca", get(list_users).post(receive_accesses))
        .with_state(state.clone());
    (serve(app).await, state)
}

#[tokio::test]
async fn test_fetch_users_sends_token() {
    let (base, _) = api_server().await;
    let client = HttpApiClient::new(&base, TOKEN).unwrap();

    let users = client.fetch_users().await.unwrap();

    assert_eq!(users.len(), 2);
    assert_eq!(users[0]["matricula"], "2024001");
}

#[tokio::test]
async fn test_wrong_token_is_api_error() {
    let (base, _) = api_server().await;
    let client = HttpApiClient::new(&base, "nope").unwrap();

    let result = client.fetch_users().await;

    assert!(matches!(result, Err(SyncError::Api { status: 401, .. })));
}

#[tokio::test]
async fn test_push_round_trip() {
    let (base, state) = api_server().await;
    let client = HttpApiClient::new(&format!("{base}/"), TOKEN).unwrap();
    let accesses = vec![
        AccessPayload {
            event_id: "e1".to_string(),
            user_id: "2024001".to_string(),
            timestamp_millis: 1_792_400_400_000,
        },
        AccessPayload {
            event_id: "e2".to_string(),
            user_id: "2024002".to_string(),
            timestamp_millis: 1_792_400_460_000,
        },
    ];

    let acks = client.push_accesses(&accesses).await.unwrap();

    assert_eq!(acks.len(), 2);
    assert_eq!(acks[0].status, AckStatus::Success);
    assert_eq!(acks[1].status, AckStatus::Failed);
    assert_eq!(*state.received.lock().unwrap(), accesses);
}

#[tokio::test]
async fn test_non_json_body_is_parse_error() {
    let app = Router::new().route("/api/catraca", get(|| async { "<html>maintenance</html>" }));
    let base = serve(app).await;
    let client = HttpApiClient::new(&base, TOKEN).unwrap();

    let result = client.fetch_users().await;

    assert!(matches!(result, Err(SyncError::Parse(_))));
}

#[tokio::test]
async fn test_unreachable_api_is_http_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = HttpApiClient::new(&format!("http://{addr}"), TOKEN).unwrap();

    let result = client.fetch_users().await;

    assert!(matches!(result, Err(SyncError::Http(_))));
}

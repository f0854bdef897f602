use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use grocer_dispatch::relay::server::{router, RelayState};

fn setup() -> (axum::Router, Arc<RelayState>) {
    // unroutable callback target: every callback fails and must be swallowed
    let state = Arc::new(RelayState::new("http://127.0.0.1:1"));
    (router(state.clone()), state)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_connection_count() {
    let (app, _state) = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["connections"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let (app, _state) = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(body.contains("connected_clients"));
}

#[tokio::test]
async fn notify_with_stale_target_still_succeeds() {
    let (app, _state) = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/notify",
            json!({
                "event": "order-assigned",
                "data": { "orderId": Uuid::new_v4() },
                "socketId": Uuid::new_v4()
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn notify_by_user_without_connection_succeeds() {
    let (app, _state) = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/notify",
            json!({
                "event": "order-assigned",
                "data": { "orderId": Uuid::new_v4() },
                "userId": Uuid::new_v4()
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn failed_service_callback_is_counted_and_swallowed() {
    let (_app, state) = setup();

    state.callbacks.disconnect(Uuid::new_v4()).await;
    state
        .callbacks
        .save_message(json!({ "roomId": "room-1", "message": "hi" }))
        .await;

    assert_eq!(state.metrics.callback_failures_total.get(), 2);
}

#[tokio::test]
async fn notify_broadcast_without_connections_succeeds() {
    let (app, _state) = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/notify",
            json!({ "event": "new-order", "data": {} }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
}

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use grocer_dispatch::api::rest::router;
use grocer_dispatch::mailer::LogMailer;
use grocer_dispatch::notify::{HttpNotifier, Notify, NullNotifier};
use grocer_dispatch::state::AppState;

fn test_state() -> Arc<AppState> {
    Arc::new(AppState::new(
        5.0,
        Arc::new(NullNotifier),
        Arc::new(LogMailer),
    ))
}

fn setup() -> (axum::Router, Arc<AppState>) {
    let state = test_state();
    (router(state.clone()), state)
}

/// Captures every push so tests can assert on emitted events.
struct RecordingNotifier {
    events: Mutex<Vec<(String, Value, Option<Uuid>)>>,
}

impl RecordingNotifier {
    fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    fn events(&self) -> Vec<(String, Value, Option<Uuid>)> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notify for RecordingNotifier {
    async fn notify(&self, event: &str, data: Value, socket_id: Option<Uuid>) {
        self.events
            .lock()
            .unwrap()
            .push((event.to_string(), data, socket_id));
    }
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

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn create_user(app: &axum::Router, role: &str, lat: f64, lng: f64) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/users",
            json!({
                "name": format!("{role}-{lat}"),
                "email": format!("{role}{lat}{lng}@example.com"),
                "mobile": "9876543210",
                "role": role,
                "location": { "lat": lat, "lng": lng }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    body["id"].as_str().unwrap().to_string()
}

async fn create_order(app: &axum::Router, user_id: &str, lat: f64, lng: f64) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/orders",
            json!({
                "userId": user_id,
                "address": {
                    "full_name": "Test Customer",
                    "phone": "9999999999",
                    "full_address": "12 Test Lane",
                    "city": "Bengaluru",
                    "state": "KA",
                    "pincode": "560001",
                    "latitude": lat,
                    "longitude": lng
                }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "pending");
    body["id"].as_str().unwrap().to_string()
}

async fn dispatch(app: &axum::Router, order_id: &str) -> Value {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/admin/order/{order_id}/update-order-status"),
            json!({ "status": "out of delivery" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _state) = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["users"], 0);
    assert_eq!(body["orders"], 0);
    assert_eq!(body["assignments"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let (app, _state) = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("rejects_total"));
    assert!(body.contains("broadcast_pool_size"));
}

#[tokio::test]
async fn create_user_empty_name_returns_400() {
    let (app, _state) = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/users",
            json!({
                "name": "  ",
                "email": "x@example.com",
                "role": "courier",
                "location": { "lat": 12.97, "lng": 77.59 }
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_order_for_unknown_user_returns_400() {
    let (app, _state) = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/orders",
            json!({
                "userId": Uuid::new_v4(),
                "address": {
                    "full_name": "n", "phone": "1", "full_address": "a",
                    "city": "c", "state": "s", "pincode": "0",
                    "latitude": 12.97, "longitude": 77.59
                }
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_nonexistent_order_returns_404() {
    let (app, _state) = setup();
    let fake_id = "00000000-0000-0000-0000-000000000000";
    let response = app
        .oneshot(get_request(&format!("/orders/{fake_id}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dispatch_broadcasts_to_free_nearby_couriers() {
    let (app, state) = setup();
    let customer = create_user(&app, "customer", 12.97, 77.59).await;
    let courier = create_user(&app, "courier", 12.975, 77.59).await;
    // out of the 5 km radius
    let far_courier = create_user(&app, "courier", 13.06, 77.59).await;
    let order_id = create_order(&app, &customer, 12.97, 77.59).await;

    let outcome = dispatch(&app, &order_id).await;

    assert!(outcome["assignedDeliveryBoy"].is_null());
    let available = outcome["availableBoys"].as_array().unwrap();
    assert_eq!(available.len(), 1);
    assert_eq!(available[0]["id"], courier.as_str());
    assert_ne!(available[0]["id"], far_courier.as_str());

    let assignment_id = outcome["assignment"].as_str().unwrap();
    let assignment = state
        .assignments
        .get(&assignment_id.parse().unwrap())
        .unwrap()
        .clone();
    assert_eq!(assignment.broadcasted_to.len(), 1);

    let order = app
        .oneshot(get_request(&format!("/orders/{order_id}")))
        .await
        .unwrap();
    let order = body_json(order).await;
    assert_eq!(order["status"], "out of delivery");
    assert_eq!(order["assignment"], assignment_id);
    assert!(order["assigned_delivery_boy"].is_null());
}

#[tokio::test]
async fn dispatch_with_no_couriers_updates_status_only() {
    let (app, state) = setup();
    let customer = create_user(&app, "customer", 12.97, 77.59).await;
    let order_id = create_order(&app, &customer, 12.97, 77.59).await;

    let outcome = dispatch(&app, &order_id).await;

    assert!(outcome["assignment"].is_null());
    assert_eq!(
        outcome["message"],
        "order updated but no delivery boys available"
    );
    assert!(state.assignments.is_empty());

    let order = state.orders.iter().next().unwrap().clone();
    assert_eq!(
        serde_json::to_value(order.status).unwrap(),
        json!("out of delivery")
    );
}

#[tokio::test]
async fn dispatch_and_accept_commit_when_relay_is_unreachable() {
    // pushes go to a dead relay port; the state changes must land anyway
    let state = Arc::new(AppState::new(
        5.0,
        Arc::new(HttpNotifier::new("http://127.0.0.1:1")),
        Arc::new(LogMailer),
    ));
    let app = router(state.clone());

    let customer = create_user(&app, "customer", 12.97, 77.59).await;
    let courier = create_user(&app, "courier", 12.975, 77.59).await;
    let order_id = create_order(&app, &customer, 12.97, 77.59).await;

    let outcome = dispatch(&app, &order_id).await;
    let assignment_id = outcome["assignment"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(get_request(&format!(
            "/delivery-boy/{assignment_id}/accept-order?userId={courier}"
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let order = state.orders.get(&order_id.parse().unwrap()).unwrap().clone();
    assert_eq!(
        serde_json::to_value(order.status).unwrap(),
        json!("out of delivery")
    );
    assert_eq!(
        order.assigned_delivery_boy,
        Some(courier.parse().unwrap())
    );

    let assignment = state
        .assignments
        .get(&assignment_id.parse().unwrap())
        .unwrap()
        .clone();
    assert_eq!(
        serde_json::to_value(assignment.status).unwrap(),
        json!("assigned")
    );
}

#[tokio::test]
async fn accept_reject_and_current_order_flow() {
    let (app, _state) = setup();
    let customer = create_user(&app, "customer", 12.97, 77.59).await;
    let courier_a = create_user(&app, "courier", 12.972, 77.59).await;
    let courier_b = create_user(&app, "courier", 12.974, 77.59).await;
    let order_id = create_order(&app, &customer, 12.97, 77.59).await;

    let outcome = dispatch(&app, &order_id).await;
    let assignment_id = outcome["assignment"].as_str().unwrap().to_string();
    assert_eq!(outcome["availableBoys"].as_array().unwrap().len(), 2);

    // both couriers see the broadcast
    let response = app
        .clone()
        .oneshot(get_request(&format!(
            "/delivery-boy/assignment?userId={courier_a}"
        )))
        .await
        .unwrap();
    let listed = body_json(response).await;
    assert_eq!(listed["assignments"].as_array().unwrap().len(), 1);
    assert_eq!(listed["assignments"][0]["order"]["id"], order_id.as_str());

    // first accept wins
    let response = app
        .clone()
        .oneshot(get_request(&format!(
            "/delivery-boy/{assignment_id}/accept-order?userId={courier_a}"
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // second courier is too late
    let response = app
        .clone()
        .oneshot(get_request(&format!(
            "/delivery-boy/{assignment_id}/accept-order?userId={courier_b}"
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // the winner now holds an active delivery
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/delivery-boy/current-order",
            json!({ "userId": courier_a }),
        ))
        .await
        .unwrap();
    let current = body_json(response).await;
    assert_eq!(current["active"], true);
    assert_eq!(current["assignment"]["order"]["id"], order_id.as_str());

    // the loser holds nothing
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/delivery-boy/current-order",
            json!({ "userId": courier_b }),
        ))
        .await
        .unwrap();
    let current = body_json(response).await;
    assert_eq!(current["active"], false);

    // live courier location for the customer's tracking view
    let response = app
        .clone()
        .oneshot(get_request(&format!("/order/{order_id}/deliveryBoy-location")))
        .await
        .unwrap();
    let location = body_json(response).await;
    assert_eq!(location["location"]["latitude"], 12.972);
}

#[tokio::test]
async fn reject_leaves_empty_broadcast_alive() {
    let (app, state) = setup();
    let customer = create_user(&app, "customer", 12.97, 77.59).await;
    let courier = create_user(&app, "courier", 12.972, 77.59).await;
    let order_id = create_order(&app, &customer, 12.97, 77.59).await;

    let outcome = dispatch(&app, &order_id).await;
    let assignment_id = outcome["assignment"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(get_request(&format!(
            "/delivery-boy/{assignment_id}/reject-order?userId={courier}"
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let assignment = state
        .assignments
        .get(&assignment_id.parse().unwrap())
        .unwrap()
        .clone();
    assert!(assignment.broadcasted_to.is_empty());
    assert_eq!(
        serde_json::to_value(assignment.status).unwrap(),
        json!("broadcasted")
    );
}

#[tokio::test]
async fn otp_round_trip_completes_delivery() {
    let (app, state) = setup();
    let customer = create_user(&app, "customer", 12.97, 77.59).await;
    let courier = create_user(&app, "courier", 12.972, 77.59).await;
    let order_id = create_order(&app, &customer, 12.97, 77.59).await;

    let outcome = dispatch(&app, &order_id).await;
    let assignment_id = outcome["assignment"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(get_request(&format!(
            "/delivery-boy/{assignment_id}/accept-order?userId={courier}"
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/order/{order_id}/send-otp"),
            json!({}),
        ))
        .await
        .unwrap();
    let sent = body_json(response).await;
    assert_eq!(sent["success"], true);

    let otp = state
        .orders
        .get(&order_id.parse().unwrap())
        .unwrap()
        .delivery_otp
        .clone()
        .unwrap();

    // wrong guess fails softly
    let wrong = if otp == "1000" { "1001" } else { "1000" };
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/order/{order_id}/verify-otp"),
            json!({ "otp": wrong }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let verified = body_json(response).await;
    assert_eq!(verified["success"], false);

    // the real code completes the delivery
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/order/{order_id}/verify-otp"),
            json!({ "otp": otp }),
        ))
        .await
        .unwrap();
    let verified = body_json(response).await;
    assert_eq!(verified["success"], true);

    let order = app
        .clone()
        .oneshot(get_request(&format!("/orders/{order_id}")))
        .await
        .unwrap();
    let order = body_json(order).await;
    assert_eq!(order["status"], "delivered");
    assert_eq!(order["delivery_otp_verified"], true);
    assert!(!order["delivered_at"].is_null());

    let assignment = state
        .assignments
        .get(&assignment_id.parse().unwrap())
        .unwrap()
        .clone();
    assert_eq!(
        serde_json::to_value(assignment.status).unwrap(),
        json!("completed")
    );
    assert!(assignment.assigned_to.is_none());

    // the courier is free again; tracking view goes dark
    let response = app
        .oneshot(get_request(&format!("/order/{order_id}/deliveryBoy-location")))
        .await
        .unwrap();
    let location = body_json(response).await;
    assert!(location["location"].is_null());
}

#[tokio::test]
async fn dispatch_pushes_assignment_and_status_events() {
    let recorder = Arc::new(RecordingNotifier::new());
    let state = Arc::new(AppState::new(5.0, recorder.clone(), Arc::new(LogMailer)));
    let app = router(state.clone());

    let customer = create_user(&app, "customer", 12.97, 77.59).await;
    let courier = create_user(&app, "courier", 12.972, 77.59).await;
    let order_id = create_order(&app, &customer, 12.97, 77.59).await;

    // pretend both clients announced identity over the relay
    let customer_socket = Uuid::new_v4();
    let courier_socket = Uuid::new_v4();
    state
        .users
        .get_mut(&customer.parse().unwrap())
        .unwrap()
        .socket_id = Some(customer_socket);
    state
        .users
        .get_mut(&courier.parse().unwrap())
        .unwrap()
        .socket_id = Some(courier_socket);

    dispatch(&app, &order_id).await;

    let events = recorder.events();
    assert!(events
        .iter()
        .any(|(event, _, socket)| event == "delivery-assignment" && *socket == Some(courier_socket)));
    assert!(events
        .iter()
        .any(|(event, _, socket)| event == "order-status-updated"
            && *socket == Some(customer_socket)));
    // order intake itself was broadcast to admin dashboards
    assert!(events
        .iter()
        .any(|(event, _, socket)| event == "new-order" && socket.is_none()));
}

#[tokio::test]
async fn socket_callbacks_update_presence_and_location() {
    let (app, state) = setup();
    let courier = create_user(&app, "courier", 12.97, 77.59).await;
    let socket_id = Uuid::new_v4();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/socket/connect",
            json!({ "userId": courier, "socketId": socket_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let user = state.users.get(&courier.parse().unwrap()).unwrap().clone();
    assert!(user.is_online);
    assert_eq!(user.socket_id, Some(socket_id));

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/update-location",
            json!({
                "userId": courier,
                "location": { "type": "Point", "coordinates": [77.61, 12.99] }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let user = state.users.get(&courier.parse().unwrap()).unwrap().clone();
    assert_eq!(user.location.lat, 12.99);
    assert_eq!(user.location.lng, 77.61);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/socket/disconnect",
            json!({ "socketId": socket_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let user = state.users.get(&courier.parse().unwrap()).unwrap().clone();
    assert!(!user.is_online);
    assert!(user.socket_id.is_none());
}

#[tokio::test]
async fn chat_room_and_messages_round_trip() {
    let (app, _state) = setup();
    let customer = create_user(&app, "customer", 12.97, 77.59).await;
    let courier = create_user(&app, "courier", 12.972, 77.59).await;
    let order_id = create_order(&app, &customer, 12.97, 77.59).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/chat/create",
            json!({ "orderId": order_id, "userId": customer, "deliveryBoyId": courier }),
        ))
        .await
        .unwrap();
    let created = body_json(response).await;
    assert_eq!(created["success"], true);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/chat/save",
            json!({ "sender": courier, "message": "on my way", "roomId": order_id }),
        ))
        .await
        .unwrap();
    let saved = body_json(response).await;
    assert_eq!(saved["success"], true);

    let response = app
        .oneshot(get_request(&format!("/chat/messages/{order_id}")))
        .await
        .unwrap();
    let listed = body_json(response).await;
    let messages = listed["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["message"], "on my way");
    assert_eq!(messages[0]["sender"], courier.as_str());
}

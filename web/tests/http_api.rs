//! HTTP surface tests over the in-memory store.
//!
//! Every registration outcome must come back with its own status code and
//! error code; clients tell "full" from "already registered" by status alone.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use admission_core::{AdmissionEngine, AdmissionRecord, CallerId, ResourceId, StoreError};
use admission_testing::{AdmitFault, FaultyStore, InMemoryAdmissionStore, test_clock};
use admission_web::handlers::registrations::{RegistrationResponse, RegistrationStatusResponse};
use admission_web::{router, AppState};
use axum::http::StatusCode;
use axum_test::{TestResponse, TestServer};
use serde_json::{json, Value};
use std::sync::Arc;

fn server_over(store: Arc<dyn admission_core::AdmissionStore>) -> TestServer {
    let engine = AdmissionEngine::new(store, Arc::new(test_clock()));
    TestServer::new(router(AppState::new(engine))).expect("test server")
}

fn server() -> TestServer {
    server_over(Arc::new(InMemoryAdmissionStore::new()))
}

async fn create_event(server: &TestServer, capacity: i64) -> AdmissionRecord {
    let response = server
        .post("/api/events")
        .json(&json!({
            "title": "Rust meetup",
            "description": "Monthly talks",
            "capacity": capacity,
            "starts_at": "2025-09-01T18:00:00Z",
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<AdmissionRecord>()
}

async fn register(server: &TestServer, event: ResourceId, caller: CallerId) -> TestResponse {
    server
        .post(&format!("/api/events/{event}/registrations"))
        .json(&json!({ "user_id": caller }))
        .await
}

fn error_code(response: &TestResponse) -> String {
    response.json::<Value>()["code"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}

#[tokio::test]
async fn health_is_ok() {
    let response = server().get("/health").await;
    response.assert_status_ok();
    response.assert_text("ok");
}

#[tokio::test]
async fn create_list_and_get_events() {
    let server = server();
    let created = create_event(&server, 3).await;

    assert_eq!(created.capacity.get(), 3);
    assert_eq!(created.admitted_count, 0);
    assert_eq!(created.metadata.title, "Rust meetup");

    let listed = server.get("/api/events").await.json::<Vec<AdmissionRecord>>();
    assert_eq!(listed, vec![created.clone()]);

    let fetched = server
        .get(&format!("/api/events/{}", created.resource_id))
        .await;
    fetched.assert_status_ok();
    assert_eq!(fetched.json::<AdmissionRecord>(), created);
}

#[tokio::test]
async fn unknown_event_is_404() {
    let response = server()
        .get(&format!("/api/events/{}", ResourceId::new()))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(error_code(&response), "NOT_FOUND");
}

#[tokio::test]
async fn malformed_event_id_is_400() {
    let response = server().get("/api/events/not-a-uuid").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&response), "BAD_REQUEST");
}

#[tokio::test]
async fn invalid_capacity_is_422() {
    let server = server();
    for capacity in [0, -5] {
        let response = server
            .post("/api/events")
            .json(&json!({ "title": "Empty room", "capacity": capacity }))
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error_code(&response), "VALIDATION_ERROR");
    }

    let listed = server.get("/api/events").await.json::<Vec<AdmissionRecord>>();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn malformed_body_is_400() {
    let server = server();
    let event = create_event(&server, 1).await;

    let response = server
        .post(&format!("/api/events/{}/registrations", event.resource_id))
        .json(&json!({ "user_id": "nope" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&response), "BAD_REQUEST");
}

#[tokio::test]
async fn registration_outcomes_map_to_status_codes() {
    let server = server();
    let event = create_event(&server, 1).await;
    let first = CallerId::new();

    // Admitted
    let admitted = register(&server, event.resource_id, first).await;
    admitted.assert_status(StatusCode::CREATED);
    let body = admitted.json::<RegistrationResponse>();
    assert_eq!(body.event_id, event.resource_id);
    assert_eq!(body.user_id, first);

    // AlreadyAdmitted
    let again = register(&server, event.resource_id, first).await;
    again.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&again), "ALREADY_ADMITTED");

    // CapacityExhausted
    let full = register(&server, event.resource_id, CallerId::new()).await;
    full.assert_status(StatusCode::CONFLICT);
    assert_eq!(error_code(&full), "CAPACITY_EXHAUSTED");

    // ResourceNotFound
    let missing = register(&server, ResourceId::new(), CallerId::new()).await;
    missing.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(error_code(&missing), "NOT_FOUND");
}

#[tokio::test]
async fn indeterminate_is_503_and_resolvable_by_status() {
    let inner = Arc::new(InMemoryAdmissionStore::new());
    let faulty = FaultyStore::new(inner);
    let server = server_over(Arc::new(faulty.clone()));
    let event = create_event(&server, 2).await;
    let caller = CallerId::new();

    faulty.push_fault(AdmitFault::FailAfter(StoreError::Transport(
        "connection reset by peer".into(),
    )));
    let response = register(&server, event.resource_id, caller).await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(error_code(&response), "INDETERMINATE");

    let status = server
        .get(&format!(
            "/api/events/{}/registrations/{caller}",
            event.resource_id
        ))
        .await;
    status.assert_status_ok();
    assert_eq!(
        status.json::<RegistrationStatusResponse>(),
        RegistrationStatusResponse {
            event_id: event.resource_id,
            user_id: caller,
            admitted: true,
        }
    );
}

#[tokio::test]
async fn store_failure_is_500_without_details() {
    let faulty = FaultyStore::new(Arc::new(InMemoryAdmissionStore::new()));
    let server = server_over(Arc::new(faulty.clone()));
    let event = create_event(&server, 2).await;

    faulty.push_fault(AdmitFault::FailBefore(StoreError::Database(
        "deadlock detected".into(),
    )));
    let response = register(&server, event.resource_id, CallerId::new()).await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_code(&response), "INTERNAL_SERVER_ERROR");
    assert!(!response.text().contains("deadlock"));
}

#[tokio::test]
async fn registrations_list_in_admission_order() {
    let server = server();
    let event = create_event(&server, 5).await;
    let callers: Vec<CallerId> = (0..3).map(|_| CallerId::new()).collect();

    for caller in &callers {
        register(&server, event.resource_id, *caller)
            .await
            .assert_status(StatusCode::CREATED);
    }

    let listed = server
        .get(&format!("/api/events/{}/registrations", event.resource_id))
        .await;
    listed.assert_status_ok();
    assert_eq!(listed.json::<Vec<CallerId>>(), callers);

    let missing = server
        .get(&format!("/api/events/{}/registrations", ResourceId::new()))
        .await;
    missing.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn registration_status_for_non_member_and_unknown_event() {
    let server = server();
    let event = create_event(&server, 1).await;
    let stranger = CallerId::new();

    let status = server
        .get(&format!(
            "/api/events/{}/registrations/{stranger}",
            event.resource_id
        ))
        .await;
    status.assert_status_ok();
    assert!(!status.json::<RegistrationStatusResponse>().admitted);

    let unknown = server
        .get(&format!(
            "/api/events/{}/registrations/{stranger}",
            ResourceId::new()
        ))
        .await;
    unknown.assert_status(StatusCode::NOT_FOUND);

    let malformed = server
        .get(&format!(
            "/api/events/{}/registrations/not-a-uuid",
            event.resource_id
        ))
        .await;
    malformed.assert_status(StatusCode::BAD_REQUEST);
}

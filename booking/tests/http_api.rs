//! HTTP surface: routing, authentication, status codes and response shapes.

#![allow(clippy::expect_used, clippy::panic, missing_docs)]

use axum::http::StatusCode;
use axum_test::TestServer;
use busline_booking::identity::{DirectoryEntry, TokenDirectory};
use busline_booking::types::{Role, UserId};
use busline_booking::{Config, app, build_router};
use busline_testing::{InMemoryEventStore, test_clock};
use serde_json::{Value, json};
use std::sync::Arc;

const OWNER: &str = "tok-owner";
const SUPERVISOR: &str = "tok-supervisor";
const PASSENGER: &str = "tok-passenger";
const OTHER_PASSENGER: &str = "tok-other";

struct Api {
    server: TestServer,
    supervisor_id: UserId,
}

fn entry(token: &str, role: Role, name: &str) -> DirectoryEntry {
    DirectoryEntry {
        token: token.to_string(),
        user_id: UserId::new(),
        role,
        active: true,
        name: name.to_string(),
        phone: "01700000000".to_string(),
    }
}

async fn api() -> Api {
    let directory = TokenDirectory::new();
    let supervisor = entry(SUPERVISOR, Role::Supervisor, "Karim");
    let supervisor_id = supervisor.user_id;
    directory.insert(entry(OWNER, Role::Owner, "Fleet Co"));
    directory.insert(supervisor);
    directory.insert(entry(PASSENGER, Role::Passenger, "Rahim"));
    directory.insert(entry(OTHER_PASSENGER, Role::Passenger, "Salma"));

    let state = app::build_state(
        &Config::default(),
        Arc::new(InMemoryEventStore::new()),
        Arc::new(directory),
        Arc::new(test_clock()),
    )
    .await
    .expect("state builds");

    Api {
        server: TestServer::new(build_router(state)).expect("server starts"),
        supervisor_id,
    }
}

impl Api {
    /// A bus with a supervisor and one boarding point; returns `(bus_id, boarding_point_id)`.
    async fn bus(&self, capacity: u32) -> (String, String) {
        let response = self
            .server
            .post("/api/buses")
            .authorization_bearer(OWNER)
            .json(&json!({
                "bus_number": "DHA-1042",
                "route_from": "Dhaka",
                "route_to": "Sylhet",
                "departure_time": "2026-11-02T07:30:00Z",
                "bus_type": "AC",
                "fare": 85000,
                "seat_capacity": capacity,
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        let bus_id = response.json::<Value>()["id"].as_str().expect("bus id").to_string();

        let response = self
            .server
            .put(&format!("/api/buses/{bus_id}/supervisor"))
            .authorization_bearer(OWNER)
            .json(&json!({ "supervisor_id": self.supervisor_id }))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);

        let response = self
            .server
            .post(&format!("/api/buses/{bus_id}/boarding-points"))
            .authorization_bearer(OWNER)
            .json(&json!({ "name": "Sayedabad", "lat": 23.71, "lng": 90.43, "sequence_order": 1 }))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        let point_id = response.json::<Value>()["id"].as_str().expect("point id").to_string();

        (bus_id, point_id)
    }

    async fn accepted_booking(&self, token: &str, bus_id: &str) -> String {
        let response = self
            .server
            .post("/api/bookings")
            .authorization_bearer(token)
            .json(&json!({ "bus_id": bus_id }))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        let booking_id = response.json::<Value>()["id"].as_str().expect("booking id").to_string();

        let response = self
            .server
            .post(&format!("/api/bookings/{booking_id}/accept"))
            .authorization_bearer(SUPERVISOR)
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        booking_id
    }
}

#[tokio::test]
async fn health_endpoints_answer_without_credentials() {
    let api = api().await;

    let health = api.server.get("/health").await;
    assert_eq!(health.status_code(), StatusCode::OK);

    let ready = api.server.get("/ready").await;
    assert_eq!(ready.status_code(), StatusCode::OK);
    assert_eq!(ready.json::<Value>()["status"], "ready");
}

#[tokio::test]
async fn requests_without_a_known_token_are_unauthorized() {
    let api = api().await;

    let missing = api.server.get("/api/bookings/mine").await;
    assert_eq!(missing.status_code(), StatusCode::UNAUTHORIZED);

    let unknown = api
        .server
        .get("/api/bookings/mine")
        .authorization_bearer("nope")
        .await;
    assert_eq!(unknown.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.json::<Value>()["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn booking_to_ticket_round_trip() {
    let api = api().await;
    let (bus_id, point_id) = api.bus(40).await;

    let response = api
        .server
        .post("/api/bookings")
        .authorization_bearer(PASSENGER)
        .json(&json!({ "bus_id": bus_id }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let booking = response.json::<Value>();
    assert_eq!(booking["status"], "pending");
    let booking_id = booking["id"].as_str().expect("booking id").to_string();

    let pending = api
        .server
        .get("/api/bookings/pending")
        .authorization_bearer(SUPERVISOR)
        .await;
    assert_eq!(pending.status_code(), StatusCode::OK);
    let pending = pending.json::<Value>();
    assert_eq!(pending.as_array().map(Vec::len), Some(1));
    assert_eq!(pending[0]["id"], booking_id.as_str());
    assert!(pending[0].get("passenger").is_none());

    let accepted = api
        .server
        .post(&format!("/api/bookings/{booking_id}/accept"))
        .authorization_bearer(SUPERVISOR)
        .await;
    assert_eq!(accepted.status_code(), StatusCode::OK);
    let accepted = accepted.json::<Value>();
    assert_eq!(accepted["status"], "accepted");
    assert_eq!(accepted["passenger_name"], "Rahim");
    assert_eq!(accepted["passenger_phone"], "01700000000");
    assert_eq!(accepted["available_boarding_points"][0]["name"], "Sayedabad");

    let confirmed = api
        .server
        .post("/api/tickets")
        .authorization_bearer(PASSENGER)
        .json(&json!({ "booking_id": booking_id, "boarding_point_id": point_id, "seats_booked": 2 }))
        .await;
    assert_eq!(confirmed.status_code(), StatusCode::CREATED);
    let confirmed = confirmed.json::<Value>();
    assert_eq!(confirmed["status"], "confirmed");
    assert_eq!(confirmed["total_fare"], 170_000);
    assert_eq!(confirmed["boarding_point"]["name"], "Sayedabad");
    assert_eq!(confirmed["bus_details"]["bus_number"], "DHA-1042");

    let detail = api
        .server
        .get(&format!("/api/bookings/{booking_id}"))
        .authorization_bearer(PASSENGER)
        .await;
    assert_eq!(detail.status_code(), StatusCode::OK);
    let detail = detail.json::<Value>();
    assert_eq!(detail["bus"]["available_seats"], 38);
    assert_eq!(detail["ticket"]["seats_booked"], 2);

    let mine = api
        .server
        .get("/api/tickets/mine?status=confirmed")
        .authorization_bearer(PASSENGER)
        .await;
    assert_eq!(mine.status_code(), StatusCode::OK);
    assert_eq!(mine.json::<Value>().as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn domain_errors_keep_their_kind_and_status() {
    let api = api().await;
    let (bus_id, point_id) = api.bus(40).await;

    api.server
        .post("/api/bookings")
        .authorization_bearer(PASSENGER)
        .json(&json!({ "bus_id": bus_id }))
        .await;
    let duplicate = api
        .server
        .post("/api/bookings")
        .authorization_bearer(PASSENGER)
        .json(&json!({ "bus_id": bus_id }))
        .await;
    assert_eq!(duplicate.status_code(), StatusCode::CONFLICT);
    assert_eq!(duplicate.json::<Value>()["code"], "DUPLICATE_BOOKING");

    let booking_id = api.accepted_booking(OTHER_PASSENGER, &bus_id).await;
    let too_many = api
        .server
        .post("/api/tickets")
        .authorization_bearer(OTHER_PASSENGER)
        .json(&json!({ "booking_id": booking_id, "boarding_point_id": point_id, "seats_booked": 11 }))
        .await;
    assert_eq!(too_many.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(too_many.json::<Value>()["code"], "VALIDATION_ERROR");

    let not_yours = api
        .server
        .post("/api/tickets")
        .authorization_bearer(PASSENGER)
        .json(&json!({ "booking_id": booking_id, "boarding_point_id": point_id, "seats_booked": 1 }))
        .await;
    assert_eq!(not_yours.status_code(), StatusCode::FORBIDDEN);

    let unknown = api
        .server
        .get(&format!("/api/bookings/{}", UserId::new()))
        .authorization_bearer(PASSENGER)
        .await;
    assert_eq!(unknown.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancelling_a_ticket_twice_is_a_conflict() {
    let api = api().await;
    let (bus_id, point_id) = api.bus(10).await;
    let booking_id = api.accepted_booking(PASSENGER, &bus_id).await;

    let ticket = api
        .server
        .post("/api/tickets")
        .authorization_bearer(PASSENGER)
        .json(&json!({ "booking_id": booking_id, "boarding_point_id": point_id, "seats_booked": 3 }))
        .await
        .json::<Value>();
    let ticket_id = ticket["ticket_id"].as_str().expect("ticket id").to_string();

    let first = api
        .server
        .post(&format!("/api/tickets/{ticket_id}/cancel"))
        .authorization_bearer(PASSENGER)
        .json(&json!({ "reason": "sick" }))
        .await;
    assert_eq!(first.status_code(), StatusCode::OK);
    assert_eq!(first.json::<Value>()["status"], "cancelled");

    let second = api
        .server
        .post(&format!("/api/tickets/{ticket_id}/cancel"))
        .authorization_bearer(PASSENGER)
        .await;
    assert_eq!(second.status_code(), StatusCode::CONFLICT);
    assert_eq!(second.json::<Value>()["code"], "INVALID_TRANSITION");
}

#[tokio::test]
async fn location_is_reported_and_read_back() {
    let api = api().await;
    let (bus_id, _) = api.bus(10).await;

    let reported = api
        .server
        .put(&format!("/api/buses/{bus_id}/location"))
        .authorization_bearer(SUPERVISOR)
        .json(&json!({ "lat": 23.81, "lng": 90.41 }))
        .await;
    assert_eq!(reported.status_code(), StatusCode::OK);

    let out_of_range = api
        .server
        .put(&format!("/api/buses/{bus_id}/location"))
        .authorization_bearer(SUPERVISOR)
        .json(&json!({ "lat": 123.0, "lng": 90.41 }))
        .await;
    assert_eq!(out_of_range.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

    // Passengers without an accepted booking cannot watch the bus.
    let stranger = api
        .server
        .get(&format!("/api/buses/{bus_id}/location"))
        .authorization_bearer(PASSENGER)
        .await;
    assert_eq!(stranger.status_code(), StatusCode::FORBIDDEN);

    api.accepted_booking(PASSENGER, &bus_id).await;
    let watcher = api
        .server
        .get(&format!("/api/buses/{bus_id}/location"))
        .authorization_bearer(PASSENGER)
        .await;
    assert_eq!(watcher.status_code(), StatusCode::OK);
    assert_eq!(watcher.json::<Value>()["location"]["lat"], 23.81);
}

#[tokio::test]
async fn supervisor_must_have_the_supervisor_role() {
    let api = api().await;
    let (bus_id, _) = api.bus(10).await;

    let response = api
        .server
        .put(&format!("/api/buses/{bus_id}/supervisor"))
        .authorization_bearer(OWNER)
        .json(&json!({ "supervisor_id": UserId::new() }))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

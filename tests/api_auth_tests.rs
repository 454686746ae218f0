// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP API tests.
//!
//! These tests verify that:
//! 1. Vehicle routes reject requests without the bridge API token
//! 2. Snapshot, status and field routes serve the published snapshot
//! 3. Commands are validated before anything reaches the vehicle API

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use chrono::Duration;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zeekr_bridge::config::endpoints;

mod common;

const API_TOKEN: &str = "test_api_token";

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", API_TOKEN))
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", API_TOKEN))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// App whose vehicle API is `server`, with a valid token pair installed.
async fn app_with_tokens(server: &MockServer) -> (axum::Router, std::sync::Arc<zeekr_bridge::AppState>) {
    let config = common::test_config(&server.uri());
    let vehicle = common::test_vehicle(&config);
    vehicle
        .auth
        .set_tokens(common::tokens("access", Duration::hours(1)))
        .await;
    common::create_test_app(config, vehicle)
}

#[tokio::test]
async fn test_protected_route_without_token() {
    let server = MockServer::start().await;
    let (app, _) = app_with_tokens(&server).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/vehicles")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_with_wrong_token() {
    let server = MockServer::start().await;
    let (app, _) = app_with_tokens(&server).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/vehicles")
                .header(header::AUTHORIZATION, "Bearer not-the-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_is_public_and_hardened() {
    let server = MockServer::start().await;
    let (app, _) = app_with_tokens(&server).await;

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert_eq!(headers.get("cache-control").unwrap(), "no-store");

    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_list_vehicles() {
    let server = MockServer::start().await;
    let (app, _) = app_with_tokens(&server).await;

    let response = app.oneshot(get("/api/vehicles")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"vehicles": [common::VIN]}));
}

#[tokio::test]
async fn test_unknown_vehicle_is_not_found() {
    let server = MockServer::start().await;
    let (app, _) = app_with_tokens(&server).await;

    let response = app
        .oneshot(get("/api/vehicles/NOSUCHVIN/status"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_snapshot_unavailable_before_first_cycle() {
    let server = MockServer::start().await;
    let (app, _) = app_with_tokens(&server).await;

    let response = app
        .oneshot(get("/api/vehicles/VIN123/snapshot"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["error"], "update_failed");
}

#[tokio::test]
async fn test_snapshot_and_fields_after_refresh() {
    let server = MockServer::start().await;
    common::mount_all_sections(&server).await;
    let (app, state) = app_with_tokens(&server).await;

    let vehicle = state.registry.get(common::VIN).unwrap();
    vehicle.coordinator.refresh_snapshot().await.unwrap();

    let response = app
        .clone()
        .oneshot(get("/api/vehicles/vin123/snapshot"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["vin"], common::VIN);
    assert!(body["fetched_at"].is_string());
    assert_eq!(body["snapshot"]["info"]["plateNo"], "ABC123");
    assert_eq!(
        body["snapshot"]["sentry"],
        json!({"source": endpoints::SENTRY})
    );

    let response = app
        .oneshot(get("/api/vehicles/VIN123/fields"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(json_body(response).await["fields"].is_object());
}

#[tokio::test]
async fn test_status_reports_auth_and_updates() {
    let server = MockServer::start().await;
    let (app, _) = app_with_tokens(&server).await;

    let response = app
        .oneshot(get("/api/vehicles/VIN123/status"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["auth"]["status"], "valid");
    assert_eq!(body["update"]["cycles"], 0);
    assert!(body.to_string().find("access-refresh").is_none());
}

#[tokio::test]
async fn test_refresh_is_queued() {
    let server = MockServer::start().await;
    let (app, state) = app_with_tokens(&server).await;

    let response = app
        .oneshot(post_json("/api/vehicles/VIN123/refresh", json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(json_body(response).await["status"], "queued");

    let vehicle = state.registry.get(common::VIN).unwrap();
    assert_eq!(vehicle.coordinator.update_status().await.on_demand_requests, 1);
}

#[tokio::test]
async fn test_invalid_command_never_reaches_vehicle() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(endpoints::SOC_LIMIT))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let (app, _) = app_with_tokens(&server).await;

    let response = app
        .oneshot(post_json(
            "/api/vehicles/VIN123/commands",
            json!({"command": "set_charge_limit", "percent": 20}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_command_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(endpoints::REMOTE_CONTROL))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "code": "000000"
        })))
        .expect(1)
        .mount(&server)
        .await;
    let (app, _) = app_with_tokens(&server).await;

    let response = app
        .oneshot(post_json(
            "/api/vehicles/VIN123/commands",
            json!({"command": "lock"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["accepted"], true);
    assert_eq!(body["description"], "Lock doors");
}

#[tokio::test]
async fn test_command_failure_is_bad_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(endpoints::REMOTE_CONTROL))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let (app, _) = app_with_tokens(&server).await;

    let response = app
        .oneshot(post_json(
            "/api/vehicles/VIN123/commands",
            json!({"command": "unlock"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(json_body(response).await["error"], "command_failed");
}

#[tokio::test]
async fn test_refused_command_is_bad_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(endpoints::REMOTE_CONTROL))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "code": "500",
            "msg": "vehicle offline"
        })))
        .mount(&server)
        .await;
    let (app, state) = app_with_tokens(&server).await;

    let response = app
        .oneshot(post_json(
            "/api/vehicles/VIN123/commands",
            json!({"command": "flash_lights"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let vehicle = state.registry.get(common::VIN).unwrap();
    assert_eq!(vehicle.coordinator.update_status().await.on_demand_requests, 1);
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zeekr_bridge::config::{endpoints, Config};
use zeekr_bridge::db::TokenStore;
use zeekr_bridge::models::TokenState;
use zeekr_bridge::routes::create_router;
use zeekr_bridge::services::{VehicleHandle, VehicleRegistry};
use zeekr_bridge::AppState;

#[allow(dead_code)]
pub const VIN: &str = "VIN123";

/// Endpoints polled for each snapshot section, except the vehicle list.
#[allow(dead_code)]
pub const SECTION_PATHS: [&str; 6] = [
    endpoints::VEHICLE_STATUS,
    endpoints::CHARGING_STATE,
    endpoints::CHARGE_PLAN,
    endpoints::SOC_LIMIT,
    endpoints::TRAVEL_PLAN,
    endpoints::SENTRY,
];

/// Config pointing at a mock vehicle API.
pub fn test_config(base_url: &str) -> Config {
    Config {
        vin: VIN.to_string(),
        base_url: base_url.to_string(),
        ..Config::default()
    }
}

/// Vehicle services backed by an in-memory token store.
pub fn test_vehicle(config: &Config) -> VehicleHandle {
    VehicleHandle::with_store(config, TokenStore::in_memory("test".to_string()))
        .expect("vehicle handle")
}

/// A token pair whose access token expires after `remaining`.
pub fn tokens(access: &str, remaining: Duration) -> TokenState {
    let now = Utc::now();
    TokenState::new(
        access.to_string(),
        format!("{}-refresh", access),
        now + remaining,
        now + Duration::days(30),
        "test-device".to_string(),
    )
}

/// Successful login/refresh envelope.
#[allow(dead_code)]
pub fn grant_body(access: &str, expires_in_secs: i64) -> Value {
    json!({
        "success": true,
        "code": "000000",
        "msg": "ok",
        "data": {
            "accessToken": access,
            "refreshToken": format!("{}-refresh", access),
            "expiresIn": expires_in_secs,
            "refreshExpiresIn": 30 * 24 * 3600,
            "userId": 4711,
            "openId": "open-1"
        }
    })
}

/// Mount a refresh endpoint that hands out `access`, expecting `calls` hits.
#[allow(dead_code)]
pub async fn mount_refresh(server: &MockServer, access: &str, calls: u64) {
    Mock::given(method("POST"))
        .and(path(endpoints::TOKEN_REFRESH))
        .respond_with(ResponseTemplate::new(200).set_body_json(grant_body(access, 3600)))
        .expect(calls)
        .mount(server)
        .await;
}

/// Mount 200 responses for all seven snapshot endpoints.
#[allow(dead_code)]
pub async fn mount_all_sections(server: &MockServer) {
    for section_path in SECTION_PATHS {
        Mock::given(method("GET"))
            .and(path(section_path))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"success": true, "data": {"source": section_path}})),
            )
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path(endpoints::VEHICLE_LIST))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [
                {"vin": "OTHERVIN", "plateNo": "XYZ999"},
                {"vin": VIN, "plateNo": "ABC123"}
            ]
        })))
        .mount(server)
        .await;
}

/// Create a test app serving one vehicle.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app(config: Config, vehicle: VehicleHandle) -> (axum::Router, Arc<AppState>) {
    let registry = VehicleRegistry::new();
    registry.insert(vehicle);

    let state = Arc::new(AppState { config, registry });
    (create_router(state.clone()), state)
}

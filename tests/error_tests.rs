// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::StatusCode;
use axum::response::IntoResponse;
use zeekr_bridge::error::AppError;

#[test]
fn test_transient_errors() {
    assert!(AppError::Network("timeout".to_string()).is_transient());
    assert!(AppError::MalformedResponse("not json".to_string()).is_transient());
    assert!(AppError::AuthRejected.is_transient());
    assert!(AppError::UpdateFailed {
        message: "All endpoints failed".to_string(),
        reauth_required: false,
    }
    .is_transient());
}

#[test]
fn test_terminal_errors() {
    assert!(!AppError::AuthExpired.is_transient());
    assert!(!AppError::LoginFailed("wrong password".to_string()).is_transient());
    assert!(!AppError::UpdateFailed {
        message: "expired".to_string(),
        reauth_required: true,
    }
    .is_transient());
}

#[test]
fn test_requires_reauth() {
    assert!(AppError::AuthExpired.requires_reauth());
    assert!(AppError::UpdateFailed {
        message: "expired".to_string(),
        reauth_required: true,
    }
    .requires_reauth());

    assert!(!AppError::AuthRejected.requires_reauth());
    assert!(!AppError::Network("reset".to_string()).requires_reauth());
}

#[test]
fn test_response_status_codes() {
    let cases = [
        (AppError::Unauthorized, StatusCode::UNAUTHORIZED),
        (AppError::NotFound("x".to_string()), StatusCode::NOT_FOUND),
        (AppError::BadRequest("x".to_string()), StatusCode::BAD_REQUEST),
        (AppError::Network("x".to_string()), StatusCode::BAD_GATEWAY),
        (AppError::AuthExpired, StatusCode::SERVICE_UNAVAILABLE),
        (AppError::CommandFailed("Lock doors".to_string()), StatusCode::BAD_GATEWAY),
        (AppError::Storage("disk full".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
        (
            AppError::UpdateFailed {
                message: "x".to_string(),
                reauth_required: false,
            },
            StatusCode::SERVICE_UNAVAILABLE,
        ),
    ];

    for (err, expected) in cases {
        assert_eq!(err.into_response().status(), expected);
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Timeout or connection failure talking to the vehicle API.
    #[error("Network error: {0}")]
    Network(String),

    /// The vehicle API rejected our access token (401/403).
    #[error("Access token rejected by vehicle API")]
    AuthRejected,

    /// No usable token and the refresh token is gone or expired.
    /// Only a new login or reconfiguration fixes this.
    #[error("Authentication expired, reconfiguration required")]
    AuthExpired,

    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Update failed: {message}")]
    UpdateFailed {
        message: String,
        reauth_required: bool,
    },

    /// A remote command did not go through; details are in the log.
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Token storage error: {0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Errors that resolve themselves on the next scheduled attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::Network(_) | AppError::MalformedResponse(_) | AppError::AuthRejected
        ) || matches!(
            self,
            AppError::UpdateFailed {
                reauth_required: false,
                ..
            }
        )
    }

    /// Whether the operator must log in again or supply new tokens.
    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            AppError::AuthExpired
                | AppError::UpdateFailed {
                    reauth_required: true,
                    ..
                }
        )
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AppError::MalformedResponse(err.to_string())
        } else {
            AppError::Network(err.to_string())
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Network(msg) => (StatusCode::BAD_GATEWAY, "network_error", Some(msg.clone())),
            AppError::AuthRejected => (StatusCode::BAD_GATEWAY, "auth_rejected", None),
            AppError::AuthExpired => (StatusCode::SERVICE_UNAVAILABLE, "reauth_required", None),
            AppError::LoginFailed(msg) => {
                (StatusCode::BAD_GATEWAY, "login_failed", Some(msg.clone()))
            }
            AppError::MalformedResponse(msg) => {
                (StatusCode::BAD_GATEWAY, "malformed_response", Some(msg.clone()))
            }
            AppError::UpdateFailed {
                message,
                reauth_required,
            } => {
                let code = if *reauth_required {
                    "reauth_required"
                } else {
                    "update_failed"
                };
                (StatusCode::SERVICE_UNAVAILABLE, code, Some(message.clone()))
            }
            AppError::CommandFailed(msg) => {
                (StatusCode::BAD_GATEWAY, "command_failed", Some(msg.clone()))
            }
            AppError::Storage(msg) => {
                tracing::error!(error = %msg, "Token storage error");
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;

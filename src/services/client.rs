// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP client for the Zeekr telematics gateway.
//!
//! Handles:
//! - The fixed app identification headers the gateway expects
//! - Per-request nonce, timestamp and optional `X-SIGNATURE`
//! - Login and token refresh exchanges
//! - Raw GET/POST calls whose status the caller interprets

use crate::config::endpoints;
use crate::error::AppError;
use crate::services::signing::SignatureEngine;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const APP_ID: &str = "ZEEKRCNCH001M0001";
const PROJECT_ID: &str = "ZEEKR_EU";
const APP_KEY: &str = "ONEX97FB91F061405";
const SIGNATURE_VERSION: &str = "2.0";
const USER_AGENT: &str = "okhttp/4.12.0";
const ACCEPT_LANGUAGE: &str = "en-GB";
const CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// Login type for email + password.
const IDENTITY_TYPE_EMAIL: u8 = 10;
/// Envelope code for success.
const SUCCESS_CODE: &str = "000000";

const AUTH_TIMEOUT: Duration = Duration::from_secs(15);

/// Identity attached to a single request.
#[derive(Debug, Clone, Copy)]
pub struct RequestAuth<'a> {
    /// Full `Authorization` value (`Bearer ...`), once authenticated
    pub bearer: Option<&'a str>,
    pub vin: Option<&'a str>,
    pub device_id: &'a str,
}

/// Status and body of a gateway response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    /// 401 and 403 both mean the access token was not accepted.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self.status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
    }

    pub fn json(&self) -> Result<Value, AppError> {
        serde_json::from_str(&self.body)
            .map_err(|e| AppError::MalformedResponse(format!("JSON parse error: {}", e)))
    }
}

/// Standard `{success, code, msg, data}` wrapper.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub code: Value,
    #[serde(default)]
    pub msg: Option<String>,
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    pub fn is_ok(&self) -> bool {
        self.success && self.code.as_str() == Some(SUCCESS_CODE)
    }
}

/// Token payload of the login and refresh exchanges.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Epoch milliseconds or seconds-from-now, see [`crate::time_utils::expiry_from_wire`]
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_expires_in: Option<i64>,
    /// Sometimes numeric, sometimes a string
    #[serde(default)]
    pub user_id: Option<Value>,
    #[serde(default)]
    pub open_id: Option<String>,
    #[serde(default)]
    pub vin: Option<String>,
}

impl TokenGrant {
    pub fn user_id_string(&self) -> Option<String> {
        match &self.user_id {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Zeekr gateway client.
#[derive(Clone)]
pub struct ZeekrClient {
    http: reqwest::Client,
    base_url: String,
    signer: Arc<SignatureEngine>,
}

impl ZeekrClient {
    pub fn new(base_url: &str, signer: Arc<SignatureEngine>) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            signer,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn is_signing(&self) -> bool {
        self.signer.is_configured()
    }

    // ─── Raw Calls ───────────────────────────────────────────────────────────

    pub async fn get(
        &self,
        path: &str,
        auth: RequestAuth<'_>,
        timeout: Duration,
    ) -> Result<ApiResponse, AppError> {
        self.send(Method::GET, path, None, auth, timeout).await
    }

    pub async fn post(
        &self,
        path: &str,
        body: &Value,
        auth: RequestAuth<'_>,
        timeout: Duration,
    ) -> Result<ApiResponse, AppError> {
        self.send(Method::POST, path, Some(body), auth, timeout).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        auth: RequestAuth<'_>,
        timeout: Duration,
    ) -> Result<ApiResponse, AppError> {
        let url = self.url(path);
        // Serialize once so the signed digest matches the bytes on the wire.
        let body = match body {
            Some(value) => serde_json::to_string(value)
                .map_err(|e| AppError::Internal(anyhow::anyhow!("Body serialization: {}", e)))?,
            None => String::new(),
        };

        let headers = self.request_headers(method.as_str(), &url, &body, auth)?;

        let mut request = self.http.request(method, &url).timeout(timeout);
        for (name, value) in &headers {
            request = request.header(*name, value.as_str());
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        Ok(ApiResponse { status, body })
    }

    /// Full header set for one request, signed when a secret is configured.
    fn request_headers(
        &self,
        method: &str,
        url: &str,
        body: &str,
        auth: RequestAuth<'_>,
    ) -> Result<Vec<(&'static str, String)>, AppError> {
        let mut headers: Vec<(&'static str, String)> = vec![
            ("X-APP-ID", APP_ID.to_string()),
            ("X-PROJECT-ID", PROJECT_ID.to_string()),
            ("AppId", APP_KEY.to_string()),
            ("X-API-SIGNATURE-VERSION", SIGNATURE_VERSION.to_string()),
            ("X-API-SIGNATURE-NONCE", random_hex(16)?),
            ("X-TIMESTAMP", crate::time_utils::now_epoch_millis().to_string()),
            ("X-P", "Android".to_string()),
            ("X-PLATFORM", "APP".to_string()),
            ("X-DEVICE-ID", auth.device_id.to_string()),
            ("ACCEPT-LANGUAGE", ACCEPT_LANGUAGE.to_string()),
            ("Content-Type", CONTENT_TYPE.to_string()),
            ("User-Agent", USER_AGENT.to_string()),
        ];
        if let Some(bearer) = auth.bearer {
            headers.push(("Authorization", bearer.to_string()));
        }
        if let Some(vin) = auth.vin {
            headers.push(("X-VIN", vin.to_string()));
        }

        if self.signer.is_configured() {
            let borrowed: Vec<(&str, &str)> =
                headers.iter().map(|(k, v)| (*k, v.as_str())).collect();
            let signature = self.signer.sign(method, url, &borrowed, body);
            if !signature.is_empty() {
                headers.push(("X-SIGNATURE", signature));
            }
        }

        Ok(headers)
    }

    // ─── Token Exchanges ─────────────────────────────────────────────────────

    /// Exchange email + password for a token pair.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        device_id: &str,
    ) -> Result<TokenGrant, AppError> {
        use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

        let payload = json!({
            "identifier": BASE64.encode(format!("{}:{}", email, password)),
            "identityType": IDENTITY_TYPE_EMAIL,
            "loginDeviceId": device_id,
            "loginDeviceJgId": "",
            "loginDeviceType": 1,
            "loginPhoneBrand": "zeekr-bridge",
            "loginPhoneModel": "Bridge",
            "loginSystem": "Linux",
        });

        let auth = RequestAuth {
            bearer: None,
            vin: None,
            device_id,
        };
        let response = self
            .post(endpoints::LOGIN, &payload, auth, AUTH_TIMEOUT)
            .await?;

        if response.status.is_server_error() {
            return Err(AppError::Network(format!(
                "Login failed with HTTP {}",
                response.status
            )));
        }
        if response.status != StatusCode::OK {
            return Err(AppError::LoginFailed(format!("HTTP {}", response.status)));
        }
        parse_grant(&response)
    }

    /// Exchange a refresh token for a new pair. `identifier` is sent in
    /// the long-lived scheme only.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
        identifier: Option<&str>,
        auth: RequestAuth<'_>,
    ) -> Result<TokenGrant, AppError> {
        let mut payload = json!({
            "refreshToken": refresh_token.trim_start_matches("Bearer "),
        });
        if let Some(identifier) = identifier {
            payload["identifier"] = json!(identifier);
        }

        let response = self
            .post(endpoints::TOKEN_REFRESH, &payload, auth, AUTH_TIMEOUT)
            .await?;

        if response.is_auth_rejection() {
            return Err(AppError::AuthRejected);
        }
        if response.status != StatusCode::OK {
            return Err(AppError::Network(format!(
                "Token refresh failed with HTTP {}",
                response.status
            )));
        }
        parse_grant(&response)
    }
}

/// Decode the envelope of a 200 login/refresh response.
fn parse_grant(response: &ApiResponse) -> Result<TokenGrant, AppError> {
    let envelope: ApiEnvelope<TokenGrant> = serde_json::from_str(&response.body)
        .map_err(|e| AppError::MalformedResponse(format!("Token response: {}", e)))?;

    if !envelope.is_ok() {
        let msg = envelope.msg.unwrap_or_else(|| "no message".to_string());
        tracing::warn!(code = %envelope.code, msg = %msg, "Token exchange refused");
        return Err(AppError::LoginFailed(msg));
    }

    envelope
        .data
        .ok_or_else(|| AppError::MalformedResponse("Token response without data".to_string()))
}

/// `len` random bytes as lowercase hex.
pub fn random_hex(len: usize) -> Result<String, AppError> {
    use ring::rand::{SecureRandom, SystemRandom};

    let mut bytes = vec![0u8; len];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Random generation failed")))?;
    Ok(hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(secret: Option<&str>) -> ZeekrClient {
        ZeekrClient::new(
            "https://api.example.com/",
            Arc::new(SignatureEngine::new(secret)),
        )
        .unwrap()
    }

    fn auth() -> RequestAuth<'static> {
        RequestAuth {
            bearer: Some("Bearer abc"),
            vin: Some("VIN123"),
            device_id: "device-1",
        }
    }

    fn header<'a>(headers: &'a [(&'static str, String)], name: &str) -> Option<&'a str> {
        headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn random_hex_length() {
        let nonce = random_hex(16).unwrap();
        assert_eq!(nonce.len(), 32);
        assert!(nonce.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(nonce, random_hex(16).unwrap());
    }

    #[test]
    fn headers_without_secret_are_unsigned() {
        let c = client(None);
        let headers = c
            .request_headers("GET", &c.url("/status"), "", auth())
            .unwrap();
        assert_eq!(header(&headers, "X-APP-ID"), Some(APP_ID));
        assert_eq!(header(&headers, "Authorization"), Some("Bearer abc"));
        assert_eq!(header(&headers, "X-VIN"), Some("VIN123"));
        assert_eq!(header(&headers, "X-DEVICE-ID"), Some("device-1"));
        assert_eq!(header(&headers, "X-API-SIGNATURE-NONCE").map(str::len), Some(32));
        assert!(header(&headers, "X-SIGNATURE").is_none());
    }

    #[test]
    fn headers_with_secret_are_signed() {
        let c = client(Some("secret"));
        let headers = c
            .request_headers("POST", &c.url("/control"), "{}", auth())
            .unwrap();
        let signature = header(&headers, "X-SIGNATURE").unwrap();
        assert!(!signature.is_empty());
    }

    #[test]
    fn envelope_success_requires_code() {
        let ok: ApiEnvelope<Value> =
            serde_json::from_str(r#"{"success":true,"code":"000000","data":{}}"#).unwrap();
        assert!(ok.is_ok());
        let wrong_code: ApiEnvelope<Value> =
            serde_json::from_str(r#"{"success":true,"code":"100001"}"#).unwrap();
        assert!(!wrong_code.is_ok());
        let failed: ApiEnvelope<Value> =
            serde_json::from_str(r#"{"success":false,"code":"000000"}"#).unwrap();
        assert!(!failed.is_ok());
    }

    #[test]
    fn grant_user_id_accepts_numbers() {
        let grant: TokenGrant = serde_json::from_str(
            r#"{"accessToken":"a","refreshToken":"r","expiresIn":3600,"userId":12345}"#,
        )
        .unwrap();
        assert_eq!(grant.user_id_string().as_deref(), Some("12345"));
        assert_eq!(grant.refresh_expires_in, None);
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credentials and token state for the vehicle account.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Refresh cadence of the issued tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenScheme {
    /// Short-lived access tokens, refreshed 5 minutes before expiry.
    Standard,
    /// Day-scale tokens, refreshed 24 hours ahead; refresh also carries
    /// the login identifier.
    LongLived,
}

impl TokenScheme {
    /// How long before access expiry a proactive refresh kicks in.
    pub fn refresh_margin(self) -> Duration {
        match self {
            TokenScheme::Standard => Duration::minutes(5),
            TokenScheme::LongLived => Duration::hours(24),
        }
    }
}

impl FromStr for TokenScheme {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(TokenScheme::Standard),
            "long_lived" | "long-lived" => Ok(TokenScheme::LongLived),
            _ => Err(()),
        }
    }
}

/// What the account logs in with.
#[derive(Clone)]
pub enum LoginSecret {
    Password(String),
    /// Access/refresh pair issued elsewhere (e.g. captured from the app).
    Tokens {
        access_token: String,
        refresh_token: String,
    },
}

impl fmt::Debug for LoginSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginSecret::Password(_) => f.write_str("Password(<redacted>)"),
            LoginSecret::Tokens { .. } => f.write_str("Tokens(<redacted>)"),
        }
    }
}

/// Configured login credentials for one vehicle.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Login identifier (account email)
    pub identifier: String,
    pub secret: LoginSecret,
    /// Vehicle identification number
    pub vin: String,
}

/// Lifecycle state of the token pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    Unauthenticated,
    /// Access token valid beyond the refresh margin.
    Valid,
    /// Access token valid but inside the refresh margin.
    Expiring,
    /// Access token past expiry.
    Expired,
}

/// Issued token pair with expiry timestamps.
///
/// `refresh_expiry >= access_expiry` always holds; constructors clamp it.
/// "Never authenticated" is represented by the absence of a `TokenState`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenState {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expiry: DateTime<Utc>,
    pub refresh_expiry: DateTime<Utc>,
    pub user_id: Option<String>,
    pub open_id: Option<String>,
    pub device_id: String,
    /// VIN reported by the backend at login, if any
    pub vin: Option<String>,
}

impl fmt::Debug for TokenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenState")
            .field("access_expiry", &self.access_expiry)
            .field("refresh_expiry", &self.refresh_expiry)
            .field("user_id", &self.user_id)
            .field("device_id", &self.device_id)
            .finish_non_exhaustive()
    }
}

impl TokenState {
    pub fn new(
        access_token: String,
        refresh_token: String,
        access_expiry: DateTime<Utc>,
        refresh_expiry: DateTime<Utc>,
        device_id: String,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            access_expiry,
            refresh_expiry: refresh_expiry.max(access_expiry),
            user_id: None,
            open_id: None,
            device_id,
            vin: None,
        }
    }

    /// Time left on the access token (negative once expired).
    pub fn access_remaining(&self, now: DateTime<Utc>) -> Duration {
        self.access_expiry - now
    }

    pub fn is_access_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.access_expiry
    }

    pub fn is_refresh_expired(&self, now: DateTime<Utc>) -> bool {
        self.refresh_token.is_empty() || now >= self.refresh_expiry
    }

    pub fn status(&self, now: DateTime<Utc>, margin: Duration) -> AuthStatus {
        let remaining = self.access_remaining(now);
        if remaining <= Duration::zero() {
            AuthStatus::Expired
        } else if remaining < margin {
            AuthStatus::Expiring
        } else {
            AuthStatus::Valid
        }
    }

    /// `Authorization` header value; tolerates tokens stored with the prefix.
    pub fn bearer(&self) -> String {
        bearer_value(&self.access_token)
    }
}

/// Normalize a raw or already-prefixed token into `Bearer <token>`.
pub fn bearer_value(token: &str) -> String {
    if token.starts_with("Bearer ") {
        token.to_string()
    } else {
        format!("Bearer {}", token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(access_in: Duration, refresh_in: Duration) -> TokenState {
        let now = Utc::now();
        TokenState::new(
            "access".to_string(),
            "refresh".to_string(),
            now + access_in,
            now + refresh_in,
            "device".to_string(),
        )
    }

    #[test]
    fn refresh_expiry_never_precedes_access_expiry() {
        let token = state(Duration::hours(2), Duration::hours(1));
        assert_eq!(token.refresh_expiry, token.access_expiry);
    }

    #[test]
    fn status_follows_margin() {
        let margin = TokenScheme::Standard.refresh_margin();
        let now = Utc::now();
        assert_eq!(
            state(Duration::minutes(10), Duration::days(1)).status(now, margin),
            AuthStatus::Valid
        );
        assert_eq!(
            state(Duration::minutes(2), Duration::days(1)).status(now, margin),
            AuthStatus::Expiring
        );
        assert_eq!(
            state(Duration::minutes(-1), Duration::days(1)).status(now, margin),
            AuthStatus::Expired
        );
    }

    #[test]
    fn bearer_prefix_is_not_doubled() {
        assert_eq!(bearer_value("abc"), "Bearer abc");
        assert_eq!(bearer_value("Bearer abc"), "Bearer abc");
    }

    #[test]
    fn token_scheme_parse() {
        assert_eq!("standard".parse(), Ok(TokenScheme::Standard));
        assert_eq!("Long-Lived".parse(), Ok(TokenScheme::LongLived));
        assert!("weekly".parse::<TokenScheme>().is_err());
    }

    #[test]
    fn debug_output_hides_tokens() {
        let token = state(Duration::minutes(10), Duration::days(1));
        let rendered = format!("{:?}", token);
        assert!(!rendered.contains("access\""));
        assert!(!rendered.contains("refresh\""));
        let secret = LoginSecret::Password("hunter2".to_string());
        assert!(!format!("{:?}", secret).contains("hunter2"));
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token lifecycle for one vehicle account.
//!
//! The manager owns the only copy of the [`TokenState`]. Every operation
//! runs under one async mutex, so at most one refresh is ever in flight
//! and callers queued behind it observe the refreshed pair.

use crate::db::TokenStore;
use crate::error::AppError;
use crate::models::{AuthStatus, Credentials, LoginSecret, TokenScheme, TokenState};
use crate::services::client::{random_hex, RequestAuth, TokenGrant, ZeekrClient};
use crate::time_utils::expiry_from_wire;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// Lifetimes assumed for tokens supplied through configuration, whose
/// real expiry is unknown.
const SEEDED_ACCESS_LIFETIME_DAYS: i64 = 7;
const SEEDED_REFRESH_LIFETIME_DAYS: i64 = 30;

/// Fallbacks when a grant omits its expiries.
const DEFAULT_ACCESS_LIFETIME_SECS: i64 = 60 * 60;
const DEFAULT_REFRESH_LIFETIME_DAYS: i64 = 30;

/// A usable access token plus the device id it was issued to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    /// `Authorization` header value
    pub bearer: String,
    pub device_id: String,
}

impl AccessToken {
    pub fn request_auth<'a>(&'a self, vin: &'a str) -> RequestAuth<'a> {
        RequestAuth {
            bearer: Some(&self.bearer),
            vin: Some(vin),
            device_id: &self.device_id,
        }
    }
}

/// Operator view of the token pair; never includes the tokens.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSummary {
    pub status: AuthStatus,
    pub access_expiry: Option<DateTime<Utc>>,
    pub refresh_expiry: Option<DateTime<Utc>>,
    pub user_id: Option<String>,
    /// A transiently failed login awaits retry on the next cycle
    pub login_pending: bool,
}

struct AuthInner {
    tokens: Option<TokenState>,
    device_id: String,
}

/// Owns login, proactive refresh and reactive renewal.
pub struct AuthManager {
    client: ZeekrClient,
    store: TokenStore,
    credentials: Credentials,
    scheme: TokenScheme,
    inner: Mutex<AuthInner>,
    /// Last login failed for a transient reason and should be retried.
    login_pending: AtomicBool,
}

impl AuthManager {
    pub fn new(
        client: ZeekrClient,
        store: TokenStore,
        credentials: Credentials,
        scheme: TokenScheme,
    ) -> Result<Self, AppError> {
        Ok(Self {
            client,
            store,
            credentials,
            scheme,
            inner: Mutex::new(AuthInner {
                tokens: None,
                device_id: random_hex(16)?,
            }),
            login_pending: AtomicBool::new(false),
        })
    }

    pub fn vin(&self) -> &str {
        &self.credentials.vin
    }

    pub fn scheme(&self) -> TokenScheme {
        self.scheme
    }

    // ─── Login ───────────────────────────────────────────────────────────────

    /// Establish a token pair.
    ///
    /// Persisted tokens are adopted when still usable. Otherwise configured
    /// tokens are seeded, or the password exchange runs. On failure the
    /// manager is left unauthenticated; a transient failure is retried by
    /// [`AuthManager::retry_pending_login`].
    pub async fn login(&self) -> Result<(), AppError> {
        let result = self.login_once().await;
        self.login_pending
            .store(matches!(&result, Err(e) if e.is_transient()), Ordering::Relaxed);
        result
    }

    /// Repeat a login whose last attempt failed transiently. A no-op when
    /// no such attempt is outstanding.
    pub async fn retry_pending_login(&self) -> Result<(), AppError> {
        if !self.login_pending.load(Ordering::Relaxed) {
            return Ok(());
        }
        tracing::info!(vin = %self.credentials.vin, "Retrying login after transient failure");
        self.login().await
    }

    pub fn is_login_pending(&self) -> bool {
        self.login_pending.load(Ordering::Relaxed)
    }

    async fn login_once(&self) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        let vin = self.credentials.vin.as_str();

        match self.store.load().await {
            Ok(Some(saved)) => {
                let now = Utc::now();
                inner.device_id = saved.device_id.clone();
                if !saved.is_access_expired(now) || !saved.is_refresh_expired(now) {
                    let needs_refresh = saved.access_remaining(now) < self.scheme.refresh_margin();
                    inner.tokens = Some(saved);

                    if !needs_refresh {
                        tracing::info!(vin, "Using saved tokens");
                        return Ok(());
                    }

                    match self.refresh_locked(&mut inner).await {
                        Ok(()) => return Ok(()),
                        Err(e) if self.has_unexpired_access(&inner) => {
                            tracing::warn!(vin, error = %e, "Refresh of saved tokens failed, using them until expiry");
                            return Ok(());
                        }
                        Err(e) => {
                            tracing::warn!(vin, error = %e, "Saved tokens unusable, logging in again");
                        }
                    }
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(vin, error = %e, "Ignoring unreadable token file"),
        }

        inner.tokens = None;
        let now = Utc::now();

        let state = match &self.credentials.secret {
            LoginSecret::Tokens {
                access_token,
                refresh_token,
            } => {
                tracing::info!(vin, "Seeding tokens from configuration");
                let mut state = TokenState::new(
                    access_token.clone(),
                    refresh_token.clone(),
                    now + Duration::days(SEEDED_ACCESS_LIFETIME_DAYS),
                    now + Duration::days(SEEDED_REFRESH_LIFETIME_DAYS),
                    inner.device_id.clone(),
                );
                state.vin = Some(self.credentials.vin.clone());
                state
            }
            LoginSecret::Password(password) => {
                tracing::info!(vin, "Logging in with email and password");
                let grant = self
                    .client
                    .login(&self.credentials.identifier, password, &inner.device_id)
                    .await
                    .map_err(|e| {
                        tracing::error!(vin, error = %e, "Login failed");
                        e
                    })?;
                state_from_grant(grant, None, &inner.device_id, now)
            }
        };

        self.persist(&state).await;
        inner.tokens = Some(state);
        tracing::info!(vin, "Login successful");
        Ok(())
    }

    /// Install a token pair obtained elsewhere and persist it.
    pub async fn set_tokens(&self, state: TokenState) {
        let mut inner = self.inner.lock().await;
        inner.device_id = state.device_id.clone();
        self.login_pending.store(false, Ordering::Relaxed);
        self.persist(&state).await;
        inner.tokens = Some(state);
    }

    // ─── Validity ────────────────────────────────────────────────────────────

    /// Return a usable access token, refreshing first when inside the
    /// refresh margin.
    ///
    /// Fails with [`AppError::AuthExpired`] when there is no token or both
    /// tokens are dead. A failed refresh while the access token is still
    /// valid returns the old token.
    pub async fn ensure_valid(&self) -> Result<AccessToken, AppError> {
        let mut inner = self.inner.lock().await;
        let vin = self.credentials.vin.as_str();
        let now = Utc::now();

        let Some(tokens) = inner.tokens.as_ref() else {
            return Err(AppError::AuthExpired);
        };

        if tokens.access_remaining(now) >= self.scheme.refresh_margin() {
            return Ok(access_token(&inner));
        }

        if tokens.is_refresh_expired(now) {
            if tokens.is_access_expired(now) {
                tracing::error!(vin, "Access and refresh tokens expired, reauthentication required");
                return Err(AppError::AuthExpired);
            }
            tracing::warn!(vin, "Refresh token expired, using access token until it expires");
            return Ok(access_token(&inner));
        }

        tracing::info!(vin, "Access token expiring soon, refreshing");
        match self.refresh_locked(&mut inner).await {
            Ok(()) => Ok(access_token(&inner)),
            Err(e) if self.has_unexpired_access(&inner) => {
                tracing::warn!(vin, error = %e, "Token refresh failed, access token still valid");
                Ok(access_token(&inner))
            }
            Err(e) => Err(reauth_if_rejected(e)),
        }
    }

    /// Refresh unconditionally. State is untouched on failure.
    pub async fn refresh(&self) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        self.refresh_locked(&mut inner).await
    }

    /// Renew after the API rejected `rejected` with 401/403.
    ///
    /// Skips the network call when the current token already differs from
    /// the rejected one (another task renewed in the meantime).
    pub async fn renew_after_rejection(
        &self,
        rejected: &AccessToken,
    ) -> Result<AccessToken, AppError> {
        let mut inner = self.inner.lock().await;

        let current = inner
            .tokens
            .as_ref()
            .map(TokenState::bearer)
            .ok_or(AppError::AuthExpired)?;
        if current != rejected.bearer {
            tracing::debug!("Token already renewed by another task");
            return Ok(access_token(&inner));
        }

        tracing::info!(vin = %self.credentials.vin, "Access token rejected, refreshing");
        self.refresh_locked(&mut inner)
            .await
            .map_err(reauth_if_rejected)?;
        Ok(access_token(&inner))
    }

    pub async fn status(&self) -> AuthStatus {
        let inner = self.inner.lock().await;
        match &inner.tokens {
            None => AuthStatus::Unauthenticated,
            Some(tokens) => tokens.status(Utc::now(), self.scheme.refresh_margin()),
        }
    }

    pub async fn summary(&self) -> AuthSummary {
        let inner = self.inner.lock().await;
        let status = match &inner.tokens {
            None => AuthStatus::Unauthenticated,
            Some(tokens) => tokens.status(Utc::now(), self.scheme.refresh_margin()),
        };
        AuthSummary {
            status,
            access_expiry: inner.tokens.as_ref().map(|t| t.access_expiry),
            refresh_expiry: inner.tokens.as_ref().map(|t| t.refresh_expiry),
            user_id: inner.tokens.as_ref().and_then(|t| t.user_id.clone()),
            login_pending: self.is_login_pending(),
        }
    }

    // ─── Internals ───────────────────────────────────────────────────────────

    /// Network refresh; caller holds the lock.
    async fn refresh_locked(&self, inner: &mut AuthInner) -> Result<(), AppError> {
        let now = Utc::now();
        let current = inner.tokens.as_ref().ok_or(AppError::AuthExpired)?;

        if current.is_refresh_expired(now) {
            return Err(AppError::AuthExpired);
        }

        let identifier = match self.scheme {
            TokenScheme::LongLived => Some(self.credentials.identifier.as_str()),
            TokenScheme::Standard => None,
        };
        let bearer = current.bearer();
        let auth = RequestAuth {
            bearer: Some(&bearer),
            vin: Some(&self.credentials.vin),
            device_id: &inner.device_id,
        };

        let grant = self
            .client
            .refresh_token(&current.refresh_token, identifier, auth)
            .await?;

        let refreshed = state_from_grant(grant, Some(current), &inner.device_id, now);
        self.persist(&refreshed).await;
        inner.tokens = Some(refreshed);

        tracing::info!(vin = %self.credentials.vin, "Token refreshed");
        Ok(())
    }

    fn has_unexpired_access(&self, inner: &AuthInner) -> bool {
        inner
            .tokens
            .as_ref()
            .is_some_and(|t| !t.is_access_expired(Utc::now()))
    }

    /// Save, logging instead of failing: in-memory state stays authoritative.
    async fn persist(&self, state: &TokenState) {
        if let Err(e) = self.store.save(state).await {
            tracing::error!(store_key = %self.store.key(), error = %e, "Failed to persist tokens");
        }
    }
}

fn access_token(inner: &AuthInner) -> AccessToken {
    AccessToken {
        bearer: inner
            .tokens
            .as_ref()
            .map(TokenState::bearer)
            .unwrap_or_default(),
        device_id: inner.device_id.clone(),
    }
}

/// A refused refresh means the refresh token is no good any more.
fn reauth_if_rejected(err: AppError) -> AppError {
    match err {
        AppError::AuthRejected | AppError::LoginFailed(_) => AppError::AuthExpired,
        other => other,
    }
}

/// Build a new state from a grant, carrying over what the grant omits.
fn state_from_grant(
    grant: TokenGrant,
    previous: Option<&TokenState>,
    device_id: &str,
    now: DateTime<Utc>,
) -> TokenState {
    let user_id = grant.user_id_string();

    let access_expiry = grant
        .expires_in
        .map(|v| expiry_from_wire(v, now))
        .unwrap_or_else(|| now + Duration::seconds(DEFAULT_ACCESS_LIFETIME_SECS));
    let refresh_expiry = grant
        .refresh_expires_in
        .map(|v| expiry_from_wire(v, now))
        .or_else(|| previous.map(|p| p.refresh_expiry))
        .unwrap_or_else(|| now + Duration::days(DEFAULT_REFRESH_LIFETIME_DAYS));
    let refresh_token = grant
        .refresh_token
        .filter(|t| !t.is_empty())
        .or_else(|| previous.map(|p| p.refresh_token.clone()))
        .unwrap_or_default();

    let mut state = TokenState::new(
        grant.access_token,
        refresh_token,
        access_expiry,
        refresh_expiry,
        device_id.to_string(),
    );
    state.user_id = user_id.or_else(|| previous.and_then(|p| p.user_id.clone()));
    state.open_id = grant
        .open_id
        .or_else(|| previous.and_then(|p| p.open_id.clone()));
    state.vin = grant.vin.or_else(|| previous.and_then(|p| p.vin.clone()));
    state
}

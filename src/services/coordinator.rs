// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Periodic assembly of the vehicle snapshot.
//!
//! Each cycle fans out one GET per section, merges the results and
//! publishes the new snapshot through a `watch` channel. A section whose
//! request fails is published as `{}` without affecting the others.

use crate::config::endpoints;
use crate::error::AppError;
use crate::models::snapshot::{empty_section, resolve_vehicle_info, unwrap_data};
use crate::models::{Section, Snapshot};
use crate::services::auth::{AccessToken, AuthManager};
use crate::services::client::ZeekrClient;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, Notify, RwLock};
use tokio::time::MissedTickBehavior;

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Upstream source of every section.
const SECTION_SOURCES: [(Section, &str); 7] = [
    (Section::Main, endpoints::VEHICLE_STATUS),
    (Section::Qrvs, endpoints::CHARGING_STATE),
    (Section::Plan, endpoints::CHARGE_PLAN),
    (Section::SocLimit, endpoints::SOC_LIMIT),
    (Section::Travel, endpoints::TRAVEL_PLAN),
    (Section::Sentry, endpoints::SENTRY),
    (Section::Info, endpoints::VEHICLE_LIST),
];

/// Outcome of one section request.
enum SectionFetch {
    Data(Value),
    Failed,
    /// 401/403: the access token was not accepted.
    Rejected,
}

/// Operator-facing record of recent cycles.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateStatus {
    /// When the current snapshot was fetched
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub reauth_required: bool,
    /// Sections that came back empty in the last published snapshot
    pub empty_sections: Vec<Section>,
    pub cycles: u64,
    pub on_demand_requests: u64,
}

/// Drives snapshot refreshes for one vehicle.
pub struct SnapshotCoordinator {
    client: ZeekrClient,
    auth: Arc<AuthManager>,
    interval: Duration,
    snapshot_tx: watch::Sender<Option<Arc<Snapshot>>>,
    status: RwLock<UpdateStatus>,
    /// Held for the duration of a cycle.
    cycle_lock: Mutex<()>,
    refresh_requested: Notify,
    on_demand_requests: AtomicU64,
}

impl SnapshotCoordinator {
    pub fn new(client: ZeekrClient, auth: Arc<AuthManager>, interval: Duration) -> Self {
        let (snapshot_tx, _) = watch::channel(None);
        Self {
            client,
            auth,
            interval,
            snapshot_tx,
            status: RwLock::new(UpdateStatus::default()),
            cycle_lock: Mutex::new(()),
            refresh_requested: Notify::new(),
            on_demand_requests: AtomicU64::new(0),
        }
    }

    /// Latest published snapshot, if any cycle has succeeded yet.
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.snapshot_tx.borrow().clone()
    }

    /// Receive every newly published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Snapshot>>> {
        self.snapshot_tx.subscribe()
    }

    pub async fn update_status(&self) -> UpdateStatus {
        let mut status = self.status.read().await.clone();
        status.on_demand_requests = self.on_demand_requests.load(Ordering::Relaxed);
        status
    }

    /// Ask the scheduler for an out-of-cycle refresh. Requests that arrive
    /// while one is pending are merged.
    pub fn request_refresh(&self) {
        self.on_demand_requests.fetch_add(1, Ordering::Relaxed);
        self.refresh_requested.notify_one();
    }

    // ─── Scheduling ──────────────────────────────────────────────────────────

    /// Refresh on the fixed interval and on demand. Never returns.
    ///
    /// A tick that finds a cycle in flight is skipped. An on-demand request
    /// waits for that cycle and then runs its own, because the in-flight
    /// cycle may have fetched before the change that prompted the request.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let on_demand = tokio::select! {
                _ = ticker.tick() => false,
                _ = self.refresh_requested.notified() => true,
            };

            let _guard = if on_demand {
                tracing::debug!(vin = %self.auth.vin(), "On-demand refresh");
                self.cycle_lock.lock().await
            } else {
                match self.cycle_lock.try_lock() {
                    Ok(guard) => guard,
                    Err(_) => {
                        tracing::debug!(vin = %self.auth.vin(), "Refresh already in flight, skipping tick");
                        continue;
                    }
                }
            };

            if let Err(e) = self.cycle().await {
                tracing::warn!(vin = %self.auth.vin(), error = %e, "Snapshot update failed");
            }
        }
    }

    /// Run one cycle now, waiting for any cycle already in flight.
    pub async fn refresh_snapshot(&self) -> Result<Arc<Snapshot>, AppError> {
        let _guard = self.cycle_lock.lock().await;
        self.cycle().await
    }

    // ─── Cycle ───────────────────────────────────────────────────────────────

    async fn cycle(&self) -> Result<Arc<Snapshot>, AppError> {
        let vin = self.auth.vin().to_string();
        {
            let mut status = self.status.write().await;
            status.cycles += 1;
            status.last_attempt_at = Some(Utc::now());
        }

        if let Err(e) = self.auth.retry_pending_login().await {
            let reauth_required = !e.is_transient();
            return Err(self.fail(e.to_string(), reauth_required).await);
        }

        let token = match self.auth.ensure_valid().await {
            Ok(token) => token,
            Err(e) => return Err(self.fail(e.to_string(), e.requires_reauth()).await),
        };

        let fetches = SECTION_SOURCES
            .iter()
            .map(|(section, path)| self.fetch_section(*section, path, &token, &vin));
        let results = join_all(fetches).await;

        let mut snapshot = Snapshot::default();
        let mut vehicle_list = None;
        let mut failed = 0;
        let mut rejected = false;

        for ((section, _), fetched) in SECTION_SOURCES.iter().zip(results) {
            match fetched {
                SectionFetch::Data(body) if *section == Section::Info => vehicle_list = Some(body),
                SectionFetch::Data(body) => *snapshot.section_mut(*section) = unwrap_data(body),
                SectionFetch::Failed => failed += 1,
                SectionFetch::Rejected => rejected = true,
            }
        }

        if rejected {
            let reauth_required = match self.auth.renew_after_rejection(&token).await {
                Ok(_) => false,
                Err(e) => {
                    tracing::warn!(vin = %vin, error = %e, "Token renewal after rejection failed");
                    e.requires_reauth()
                }
            };
            return Err(self
                .fail("Access token rejected by vehicle API".to_string(), reauth_required)
                .await);
        }

        if failed == SECTION_SOURCES.len() {
            return Err(self.fail("All endpoints failed".to_string(), false).await);
        }

        snapshot.info = vehicle_list
            .map(|list| resolve_vehicle_info(&list, &vin))
            .unwrap_or_else(empty_section);

        let empty_sections: Vec<Section> = Section::ALL
            .into_iter()
            .filter(|s| snapshot.is_section_empty(*s))
            .collect();

        let snapshot = Arc::new(snapshot);
        self.snapshot_tx.send_replace(Some(snapshot.clone()));

        {
            let mut status = self.status.write().await;
            status.last_success_at = Some(Utc::now());
            status.last_error = None;
            status.reauth_required = false;
            status.empty_sections = empty_sections;
        }

        tracing::info!(vin = %vin, failed_sections = failed, "Snapshot published");
        Ok(snapshot)
    }

    async fn fetch_section(
        &self,
        section: Section,
        path: &str,
        token: &AccessToken,
        vin: &str,
    ) -> SectionFetch {
        let response = match self
            .client
            .get(path, token.request_auth(vin), FETCH_TIMEOUT)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(section = section.as_str(), error = %e, "Section request failed");
                return SectionFetch::Failed;
            }
        };

        if response.is_auth_rejection() {
            tracing::warn!(section = section.as_str(), status = %response.status, "Section request rejected");
            return SectionFetch::Rejected;
        }

        if response.status != StatusCode::OK {
            tracing::warn!(section = section.as_str(), status = %response.status, "Section request failed");
            return SectionFetch::Failed;
        }

        match response.json() {
            Ok(body) => SectionFetch::Data(body),
            Err(e) => {
                tracing::warn!(section = section.as_str(), error = %e, "Unparsable section body");
                SectionFetch::Failed
            }
        }
    }

    async fn fail(&self, message: String, reauth_required: bool) -> AppError {
        let mut status = self.status.write().await;
        status.last_error = Some(message.clone());
        status.reauth_required = reauth_required;
        AppError::UpdateFailed {
            message,
            reauth_required,
        }
    }
}

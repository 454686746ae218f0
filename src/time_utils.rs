// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// Wire values at or above this are epoch milliseconds, not relative seconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Current time as epoch milliseconds (the `X-TIMESTAMP` header format).
pub fn now_epoch_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Interpret an `expiresIn`-style value from the vehicle API.
///
/// The backend sends absolute epoch milliseconds; small values are
/// treated as a lifetime in seconds counted from `now`.
pub fn expiry_from_wire(value: i64, now: DateTime<Utc>) -> DateTime<Utc> {
    if value >= EPOCH_MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(value).unwrap_or(now)
    } else {
        now + Duration::seconds(value.max(0))
    }
}

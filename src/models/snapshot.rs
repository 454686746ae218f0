// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Merged vehicle state assembled from the polled endpoints.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One named part of a snapshot, fed by one upstream endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    /// Vehicle status (position, doors, battery, tyres, ...)
    Main,
    /// Live charging state
    Qrvs,
    /// Scheduled charge plan
    Plan,
    /// State-of-charge limit
    SocLimit,
    /// Travel / departure schedule
    Travel,
    /// Sentry, camping and car-wash modes
    Sentry,
    /// Vehicle record picked from the account's vehicle list
    Info,
}

impl Section {
    pub const ALL: [Section; 7] = [
        Section::Main,
        Section::Qrvs,
        Section::Plan,
        Section::SocLimit,
        Section::Travel,
        Section::Sentry,
        Section::Info,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Section::Main => "main",
            Section::Qrvs => "qrvs",
            Section::Plan => "plan",
            Section::SocLimit => "soc_limit",
            Section::Travel => "travel",
            Section::Sentry => "sentry",
            Section::Info => "info",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }
}

/// Complete vehicle state. Every section is always present; a section
/// whose request failed holds an empty object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub main: Value,
    pub qrvs: Value,
    pub plan: Value,
    pub soc_limit: Value,
    pub travel: Value,
    pub sentry: Value,
    pub info: Value,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            main: empty_section(),
            qrvs: empty_section(),
            plan: empty_section(),
            soc_limit: empty_section(),
            travel: empty_section(),
            sentry: empty_section(),
            info: empty_section(),
        }
    }
}

impl Snapshot {
    pub fn section(&self, section: Section) -> &Value {
        match section {
            Section::Main => &self.main,
            Section::Qrvs => &self.qrvs,
            Section::Plan => &self.plan,
            Section::SocLimit => &self.soc_limit,
            Section::Travel => &self.travel,
            Section::Sentry => &self.sentry,
            Section::Info => &self.info,
        }
    }

    pub fn section_mut(&mut self, section: Section) -> &mut Value {
        match section {
            Section::Main => &mut self.main,
            Section::Qrvs => &mut self.qrvs,
            Section::Plan => &mut self.plan,
            Section::SocLimit => &mut self.soc_limit,
            Section::Travel => &mut self.travel,
            Section::Sentry => &mut self.sentry,
            Section::Info => &mut self.info,
        }
    }

    /// Walk a path of object keys within one section.
    ///
    /// Returns `None` as soon as a step is missing or not an object.
    pub fn lookup(&self, section: Section, path: &[&str]) -> Option<&Value> {
        let mut current = self.section(section);
        for key in path {
            current = current.as_object()?.get(*key)?;
        }
        (!current.is_null()).then_some(current)
    }

    /// Whether a section came back empty (failed or no data).
    pub fn is_section_empty(&self, section: Section) -> bool {
        match self.section(section) {
            Value::Object(map) => map.is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::Null => true,
            _ => false,
        }
    }
}

pub fn empty_section() -> Value {
    Value::Object(Map::new())
}

/// Strip the `{"success":..,"data":..}` envelope if present.
///
/// Bodies without a `data` field are used whole; a null payload becomes
/// an empty section.
pub fn unwrap_data(body: Value) -> Value {
    let payload = match body {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    };

    if payload.is_null() {
        empty_section()
    } else {
        payload
    }
}

/// Pick this vehicle's record out of a vehicle-list response.
///
/// Accepts the list directly, wrapped in `data`, or nested under
/// `data.vehicleInfoList`. Falls back to the first record when no VIN
/// matches, and to an empty object when the list is empty.
pub fn resolve_vehicle_info(list_body: &Value, vin: &str) -> Value {
    let records = vehicle_records(list_body);

    let chosen = records
        .iter()
        .find(|record| record.get("vin").and_then(Value::as_str) == Some(vin))
        .or_else(|| records.first());

    match chosen {
        Some(record @ Value::Object(_)) => record.clone(),
        _ => empty_section(),
    }
}

fn vehicle_records(body: &Value) -> &[Value] {
    match body {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("data") {
            Some(Value::Array(items)) => items,
            Some(Value::Object(inner)) => inner
                .get("vehicleInfoList")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or(&[]),
            _ => map
                .get("vehicleInfoList")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or(&[]),
        },
        _ => &[],
    }
}

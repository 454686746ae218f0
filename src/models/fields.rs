// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data-driven table of the values an entity layer presents, plus a
//! generic reader that resolves them against a snapshot.
//!
//! Each entry names a section, a key path inside it and how the raw
//! value is turned into something displayable.

use super::snapshot::{Section, Snapshot};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Remaining charge time the vehicle reports when it is not charging.
const CHARGE_TIME_NOT_CHARGING: i64 = 2047;

/// How a raw sensor value is converted.
#[derive(Debug, Clone, Copy)]
pub enum Conversion {
    Raw,
    /// Divide and round to the given number of decimals.
    Divide { by: f64, decimals: i32 },
    /// Truncate to whole kilometres.
    WholeKm,
    /// Charge limit reported either as percent or tenths of a percent.
    ChargeLimit,
    /// Map codes to stable state keys; unknown codes pass through.
    States(&'static [(&'static str, &'static str)]),
    /// Minutes to full rendered as `1h 5m`.
    ChargeDuration,
    Coordinate,
}

/// When a binary field reads as "on".
#[derive(Debug, Clone, Copy)]
pub enum BinaryRule {
    Truthy,
    Equals(&'static str),
    OneOf(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    Sensor(Conversion),
    Binary { rule: BinaryRule, invert: bool },
}

/// One presentable value.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub key: &'static str,
    pub section: Section,
    pub path: &'static [&'static str],
    pub unit: Option<&'static str>,
    pub kind: FieldKind,
}

const fn sensor(
    key: &'static str,
    section: Section,
    path: &'static [&'static str],
    unit: Option<&'static str>,
    conversion: Conversion,
) -> FieldSpec {
    FieldSpec {
        key,
        section,
        path,
        unit,
        kind: FieldKind::Sensor(conversion),
    }
}

const fn binary(
    key: &'static str,
    section: Section,
    path: &'static [&'static str],
    rule: BinaryRule,
    invert: bool,
) -> FieldSpec {
    FieldSpec {
        key,
        section,
        path,
        unit: None,
        kind: FieldKind::Binary { rule, invert },
    }
}

const EV: &str = "electricVehicleStatus";
const MAINT: &str = "maintenanceStatus";
const SAFETY: &str = "drivingSafetyStatus";

const CHARGING_STATES: &[(&str, &str)] = &[
    ("0", "not_charging"),
    ("2", "charging"),
    ("3", "connected"),
    ("4", "charge_complete"),
];

const ENGINE_STATES: &[(&str, &str)] = &[
    ("engine-off", "parked"),
    ("engine-running", "driving"),
    ("ready", "ready"),
    ("charging", "charging"),
];

const USAGE_MODES: &[(&str, &str)] = &[
    ("0", "deep_sleep"),
    ("1", "parked"),
    ("2", "unlocked"),
    ("3", "system_active"),
    ("4", "ready_to_go"),
    ("13", "active"),
];

const TYRE_PRESSURE: Conversion = Conversion::Divide {
    by: 100.0,
    decimals: 2,
};

/// Every field the bridge knows how to read.
pub static FIELDS: &[FieldSpec] = &[
    // Identification
    sensor("software_version", Section::Info, &["displayOSVersion"], None, Conversion::Raw),
    sensor("license_plate", Section::Info, &["plateNo"], None, Conversion::Raw),
    sensor("vin", Section::Info, &["vin"], None, Conversion::Raw),
    // Battery & charging
    sensor("battery_percentage", Section::Main, &["additionalVehicleStatus", EV, "chargeLevel"], Some("%"), Conversion::Raw),
    sensor("charging_status", Section::Qrvs, &["chargerState"], None, Conversion::States(CHARGING_STATES)),
    sensor("charging_current", Section::Qrvs, &["chargeCurrent"], Some("A"), Conversion::Raw),
    sensor("charging_voltage", Section::Qrvs, &["chargeVoltage"], Some("V"), Conversion::Raw),
    sensor("charging_power", Section::Qrvs, &["chargePower"], Some("kW"), Conversion::Raw),
    sensor("charging_time_minutes", Section::Main, &["additionalVehicleStatus", EV, "timeToFullyCharged"], Some("min"), Conversion::Raw),
    sensor("charging_time_remaining", Section::Main, &["additionalVehicleStatus", EV, "timeToFullyCharged"], None, Conversion::ChargeDuration),
    sensor("range", Section::Main, &["additionalVehicleStatus", EV, "distanceToEmptyOnBatteryOnly"], Some("km"), Conversion::WholeKm),
    sensor("charge_limit", Section::SocLimit, &["soc"], Some("%"), Conversion::ChargeLimit),
    sensor("scheduled_charge_time", Section::Plan, &["startTime"], None, Conversion::Raw),
    // Status & drive
    sensor("vehicle_status", Section::Main, &["basicVehicleStatus", "usageMode"], None, Conversion::States(USAGE_MODES)),
    sensor("engine_status", Section::Main, &["basicVehicleStatus", "engineStatus"], None, Conversion::States(ENGINE_STATES)),
    sensor("latitude", Section::Main, &["basicVehicleStatus", "position", "latitude"], None, Conversion::Coordinate),
    sensor("longitude", Section::Main, &["basicVehicleStatus", "position", "longitude"], None, Conversion::Coordinate),
    // Tyres
    sensor("tire_pressure_fl", Section::Main, &["additionalVehicleStatus", MAINT, "tyreStatusDriver"], Some("bar"), TYRE_PRESSURE),
    sensor("tire_pressure_fr", Section::Main, &["additionalVehicleStatus", MAINT, "tyreStatusPassenger"], Some("bar"), TYRE_PRESSURE),
    sensor("tire_pressure_rl", Section::Main, &["additionalVehicleStatus", MAINT, "tyreStatusDriverRear"], Some("bar"), TYRE_PRESSURE),
    sensor("tire_pressure_rr", Section::Main, &["additionalVehicleStatus", MAINT, "tyreStatusPassengerRear"], Some("bar"), TYRE_PRESSURE),
    sensor("tire_temp_fl", Section::Main, &["additionalVehicleStatus", MAINT, "tyreTempDriver"], Some("°C"), Conversion::Raw),
    sensor("tire_temp_fr", Section::Main, &["additionalVehicleStatus", MAINT, "tyreTempPassenger"], Some("°C"), Conversion::Raw),
    sensor("tire_temp_rl", Section::Main, &["additionalVehicleStatus", MAINT, "tyreTempDriverRear"], Some("°C"), Conversion::Raw),
    sensor("tire_temp_rr", Section::Main, &["additionalVehicleStatus", MAINT, "tyreTempPassengerRear"], Some("°C"), Conversion::Raw),
    // Maintenance
    sensor("odometer", Section::Main, &["additionalVehicleStatus", MAINT, "odometer"], Some("km"), Conversion::WholeKm),
    sensor("distance_to_service", Section::Main, &["additionalVehicleStatus", MAINT, "distanceToService"], Some("km"), Conversion::WholeKm),
    sensor("days_to_service", Section::Main, &["additionalVehicleStatus", MAINT, "daysToService"], Some("d"), Conversion::Raw),
    sensor("interior_temp", Section::Main, &["additionalVehicleStatus", "climateStatus", "interiorTemp"], Some("°C"), Conversion::Raw),
    // Trip computer
    sensor("trip_2_distance", Section::Main, &["additionalVehicleStatus", "runningStatus", "tripMeter2"], Some("km"), Conversion::Divide { by: 1000.0, decimals: 1 }),
    sensor("trip_2_avg_speed", Section::Main, &["additionalVehicleStatus", "runningStatus", "avgSpeed"], Some("km/h"), Conversion::Raw),
    sensor("trip_2_avg_consumption", Section::Main, &["additionalVehicleStatus", EV, "averPowerConsumption"], Some("kWh/100km"), Conversion::Raw),
    // Binary
    binary("ac_active", Section::Main, &["additionalVehicleStatus", "climateStatus", "preClimateActive"], BinaryRule::Truthy, false),
    binary("charging_cable", Section::Main, &["additionalVehicleStatus", EV, "statusOfChargerConnection"], BinaryRule::OneOf(&["1", "3"]), false),
    binary("charging", Section::Qrvs, &["chargerState"], BinaryRule::Equals("2"), false),
    binary("frunk", Section::Main, &["additionalVehicleStatus", SAFETY, "engineHoodOpenStatus"], BinaryRule::Truthy, false),
    binary("trunk", Section::Main, &["additionalVehicleStatus", SAFETY, "trunkOpenStatus"], BinaryRule::Truthy, false),
    binary("trunk_lock", Section::Main, &["additionalVehicleStatus", SAFETY, "trunkLockStatus"], BinaryRule::Truthy, true),
    binary("driver_door", Section::Main, &["additionalVehicleStatus", SAFETY, "doorOpenStatusDriver"], BinaryRule::Truthy, false),
    binary("passenger_door", Section::Main, &["additionalVehicleStatus", SAFETY, "doorOpenStatusPassenger"], BinaryRule::Truthy, false),
    binary("rear_driver_door", Section::Main, &["additionalVehicleStatus", SAFETY, "doorOpenStatusDriverRear"], BinaryRule::Truthy, false),
    binary("rear_passenger_door", Section::Main, &["additionalVehicleStatus", SAFETY, "doorOpenStatusPassengerRear"], BinaryRule::Truthy, false),
    binary("camping_mode", Section::Sentry, &["campingModeState"], BinaryRule::Truthy, false),
    binary("car_wash_mode", Section::Sentry, &["washCarModeState"], BinaryRule::Truthy, false),
    binary("washer_fluid", Section::Main, &[MAINT, "washerFluidLevelStatus"], BinaryRule::Truthy, true),
];

/// A field resolved against a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldReading {
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'static str>,
}

/// Look up a field definition by name.
pub fn field(key: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|f| f.key == key)
}

/// Read and convert one field. `None` when the value is absent.
pub fn read_field(snapshot: &Snapshot, spec: &FieldSpec) -> Option<Value> {
    let raw = snapshot.lookup(spec.section, spec.path)?;

    match spec.kind {
        FieldKind::Sensor(conversion) => Some(convert(raw, conversion)),
        FieldKind::Binary { rule, invert } => {
            let text = value_text(raw);
            let on = match rule {
                BinaryRule::Truthy => !matches!(text.as_str(), "False" | "false" | "0" | "null" | ""),
                BinaryRule::Equals(expected) => text == expected,
                BinaryRule::OneOf(options) => options.contains(&text.as_str()),
            };
            Some(Value::Bool(on != invert))
        }
    }
}

/// Read every field; absent values are reported as `null`.
pub fn read_all(snapshot: &Snapshot) -> BTreeMap<&'static str, FieldReading> {
    FIELDS
        .iter()
        .map(|spec| {
            let value = read_field(snapshot, spec).unwrap_or(Value::Null);
            (
                spec.key,
                FieldReading {
                    value,
                    unit: spec.unit,
                },
            )
        })
        .collect()
}

fn convert(raw: &Value, conversion: Conversion) -> Value {
    match conversion {
        Conversion::Raw => raw.clone(),
        Conversion::Divide { by, decimals } => as_f64(raw)
            .map(|n| json!(round_to(n / by, decimals)))
            .unwrap_or_else(|| raw.clone()),
        Conversion::WholeKm => as_f64(raw)
            .map(|n| json!(n.trunc() as i64))
            .unwrap_or_else(|| raw.clone()),
        Conversion::ChargeLimit => as_f64(raw)
            .map(|n| json!(if n > 100.0 { n / 10.0 } else { n }))
            .unwrap_or_else(|| raw.clone()),
        Conversion::States(table) => {
            let text = value_text(raw);
            let needle = text.trim().to_lowercase();
            table
                .iter()
                .find(|(code, _)| *code == needle)
                .map(|(_, state)| json!(state))
                .unwrap_or_else(|| raw.clone())
        }
        Conversion::ChargeDuration => json!(format_charge_duration(raw)),
        Conversion::Coordinate => as_f64(raw).map(|n| json!(n)).unwrap_or(Value::Null),
    }
}

fn format_charge_duration(raw: &Value) -> String {
    let Some(minutes) = as_f64(raw).map(|n| n as i64) else {
        return "Unknown".to_string();
    };

    if minutes <= 0 || minutes >= CHARGE_TIME_NOT_CHARGING {
        return "Not charging".to_string();
    }

    let (hours, mins) = (minutes / 60, minutes % 60);
    if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else {
        format!("{}m", mins)
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

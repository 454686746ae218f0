// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Remote commands understood by the vehicle API.
//!
//! Most commands go to the generic remote-control endpoint as a
//! `serviceId` plus `serviceParameters` key/value list; the charge plan
//! has its own endpoint and payload shape.

use crate::config::endpoints;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::{Validate, ValidationError};

/// Minutes a seat climate request stays active, as in the mobile app.
const SEAT_CLIMATE_DURATION_MIN: &str = "15";

/// A prepared write against the vehicle API.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    /// Path relative to the API base URL
    pub endpoint: String,
    pub payload: Value,
    /// Human-readable label for logs
    pub description: String,
}

impl CommandRequest {
    pub fn new(endpoint: &str, payload: Value, description: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            payload,
            description: description.into(),
        }
    }
}

/// Seat positions addressable by the climate service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seat {
    Driver,
    Passenger,
    RearLeft,
    RearRight,
}

impl Seat {
    /// Seat number used in `SH.<n>` / `SV.<n>` keys.
    pub fn code(self) -> &'static str {
        match self {
            Seat::Driver => "11",
            Seat::Passenger => "12",
            Seat::RearLeft => "21",
            // Not 22: the backend numbers the rear right seat 29.
            Seat::RearRight => "29",
        }
    }

    pub fn is_front(self) -> bool {
        matches!(self, Seat::Driver | Seat::Passenger)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ClimateSettings {
    /// Cabin target temperature in °C
    #[validate(range(min = 15.0, max = 30.0))]
    pub temperature: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SeatLevel {
    pub seat: Seat,
    /// 0 switches the seat off
    #[validate(range(max = 3))]
    pub level: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ChargeLimit {
    #[validate(range(min = 50, max = 100))]
    pub percent: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ChargeWindow {
    /// `HH:MM`
    #[validate(custom(function = "validate_hhmm"))]
    pub start_time: String,
    /// `HH:MM`
    #[validate(custom(function = "validate_hhmm"))]
    pub end_time: String,
}

/// Commands the bridge can issue, as accepted on the HTTP API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum VehicleCommand {
    Lock,
    Unlock,
    StartClimate(ClimateSettings),
    StopClimate,
    OpenTrunk,
    OpenHood,
    VentilateWindows,
    OpenWindows,
    CloseWindows,
    FlashLights,
    HonkAndFlash,
    SeatHeating(SeatLevel),
    SeatVentilation(SeatLevel),
    SetChargeLimit(ChargeLimit),
    SetChargePlan(ChargeWindow),
    DisableParkingComfort,
}

impl VehicleCommand {
    /// Check parameter ranges before anything is sent to the vehicle.
    pub fn validate(&self) -> Result<(), String> {
        let result = match self {
            VehicleCommand::StartClimate(settings) => settings.validate(),
            VehicleCommand::SeatHeating(seat) => seat.validate(),
            VehicleCommand::SeatVentilation(seat) => {
                if !seat.seat.is_front() {
                    return Err("seat ventilation is only available on front seats".to_string());
                }
                seat.validate()
            }
            VehicleCommand::SetChargeLimit(limit) => limit.validate(),
            VehicleCommand::SetChargePlan(window) => window.validate(),
            _ => Ok(()),
        };
        result.map_err(|e| e.to_string())
    }

    /// Build the wire request for this command.
    pub fn to_request(&self) -> CommandRequest {
        match self {
            VehicleCommand::Lock => remote_control(
                "start",
                "RDL",
                &[("door", "all".to_string())],
                "Lock doors",
            ),
            VehicleCommand::Unlock => remote_control(
                "start",
                "RDU",
                &[("door", "all".to_string())],
                "Unlock doors",
            ),
            VehicleCommand::StartClimate(settings) => remote_control(
                "start",
                "ZAF",
                &[
                    ("AC", "true".to_string()),
                    ("AC.temp", format!("{:.1}", settings.temperature)),
                    ("AC.duration", SEAT_CLIMATE_DURATION_MIN.to_string()),
                ],
                format!("Start climate at {:.1}°C", settings.temperature),
            ),
            VehicleCommand::StopClimate => remote_control(
                "start",
                "ZAF",
                &[("AC", "false".to_string())],
                "Stop climate",
            ),
            VehicleCommand::OpenTrunk => remote_control(
                "start",
                "RDU",
                &[("target", "trunk".to_string())],
                "Open trunk",
            ),
            VehicleCommand::OpenHood => remote_control(
                "start",
                "RDU",
                &[("target", "hood".to_string())],
                "Open hood",
            ),
            VehicleCommand::VentilateWindows => remote_control(
                "start",
                "RWS",
                &[("target", "ventilate".to_string())],
                "Ventilate windows",
            ),
            VehicleCommand::OpenWindows => remote_control(
                "start",
                "RWS",
                &[("target", "window".to_string())],
                "Open windows fully",
            ),
            VehicleCommand::CloseWindows => remote_control(
                "stop",
                "RWS",
                &[("target", "window".to_string())],
                "Close windows",
            ),
            VehicleCommand::FlashLights => remote_control(
                "start",
                "RHL",
                &[("rhl", "light-flash".to_string())],
                "Flash lights",
            ),
            VehicleCommand::HonkAndFlash => remote_control(
                "start",
                "RHL",
                &[("rhl", "horn-light-flash".to_string())],
                "Honk and flash",
            ),
            VehicleCommand::SeatHeating(seat) => seat_climate("SH", seat, "Seat heating"),
            VehicleCommand::SeatVentilation(seat) => seat_climate("SV", seat, "Seat ventilation"),
            VehicleCommand::SetChargeLimit(limit) => {
                // The backend expresses the limit in tenths of a percent.
                let api_value = (u32::from(limit.percent) * 10).to_string();
                remote_control(
                    "start",
                    "RCS",
                    &[
                        ("soc", api_value.clone()),
                        ("rcs.setting", "1".to_string()),
                        ("altCurrent", "1".to_string()),
                    ],
                    format!("Set charge limit to {}% ({})", limit.percent, api_value),
                )
            }
            VehicleCommand::SetChargePlan(window) => CommandRequest::new(
                endpoints::CHARGE_PLAN,
                json!({
                    "target": 2,
                    "startTime": window.start_time,
                    "endTime": window.end_time,
                    "timerId": "2",
                    "command": "start",
                }),
                format!(
                    "Set charge plan {}-{}",
                    window.start_time, window.end_time
                ),
            ),
            VehicleCommand::DisableParkingComfort => remote_control(
                "stop",
                "PCM",
                &[("parking_comfortable", "false".to_string())],
                "Disable parking comfort",
            ),
        }
    }
}

fn remote_control(
    command: &str,
    service_id: &str,
    parameters: &[(&str, String)],
    description: impl Into<String>,
) -> CommandRequest {
    let service_parameters: Vec<Value> = parameters
        .iter()
        .map(|(key, value)| json!({ "key": key, "value": value }))
        .collect();

    CommandRequest::new(
        endpoints::REMOTE_CONTROL,
        json!({
            "command": command,
            "serviceId": service_id,
            "setting": { "serviceParameters": service_parameters },
        }),
        description,
    )
}

fn seat_climate(prefix: &str, seat: &SeatLevel, label: &str) -> CommandRequest {
    let key = format!("{}.{}", prefix, seat.seat.code());
    let level_key = format!("{}.level", key);
    let duration_key = format!("{}.duration", key);

    let parameters: Vec<(&str, String)> = if seat.level == 0 {
        vec![(key.as_str(), "false".to_string())]
    } else {
        vec![
            (key.as_str(), "true".to_string()),
            (level_key.as_str(), seat.level.to_string()),
            (duration_key.as_str(), SEAT_CLIMATE_DURATION_MIN.to_string()),
        ]
    };

    remote_control(
        "start",
        "ZAF",
        &parameters,
        format!("{} {:?} level {}", label, seat.seat, seat.level),
    )
}

fn validate_hhmm(value: &str) -> Result<(), ValidationError> {
    let valid = value
        .split_once(':')
        .filter(|(h, m)| h.len() == 2 && m.len() == 2)
        .and_then(|(h, m)| Some((h.parse::<u8>().ok()?, m.parse::<u8>().ok()?)))
        .is_some_and(|(h, m)| h < 24 && m < 60);

    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("time_format"))
    }
}

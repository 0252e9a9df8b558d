use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MAX_GEAR: u8 = 8;
pub const MAX_PEDAL_PERCENT: f64 = 100.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
    Error,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait StreamMessage: Sized + Send + Sync + 'static {
    fn decode(payload: &mut [u8]) -> Result<Self, SyncError>;
}

impl StreamMessage for simd_json::OwnedValue {
    fn decode(payload: &mut [u8]) -> Result<Self, SyncError> {
        Ok(simd_json::to_owned_value(payload)?)
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryMessageWire {
    CarData(CarDataWire),
    Location(LocationWire),
    Position(PositionWire),
    RaceControl(RaceControlWire),
}

#[derive(Debug, Deserialize)]
pub struct CarDataWire {
    pub driver_number: u32,
    pub date: String,
    pub speed: f64,
    pub rpm: f64,
    pub n_gear: u8,
    pub throttle: f64,
    pub brake: f64,
    pub drs: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub struct LocationWire {
    pub driver_number: u32,
    pub date: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Deserialize)]
pub struct PositionWire {
    pub driver_number: u32,
    pub date: String,
    pub position: u32,
}

#[derive(Debug, Deserialize)]
pub struct RaceControlWire {
    pub date: String,
    pub category: String,
    pub message: String,
    pub flag: Option<String>,
    pub driver_number: Option<u32>,
    pub lap_number: Option<u32>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CarData {
    pub driver_number: u32,
    pub date: String,
    pub speed: f64,
    pub rpm: f64,
    pub gear: u8,
    pub throttle: f64,
    pub brake: f64,
    pub drs: Option<u8>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub driver_number: u32,
    pub date: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub driver_number: u32,
    pub date: String,
    pub position: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RaceControl {
    pub date: String,
    pub category: String,
    pub message: String,
    pub flag: Option<String>,
    pub driver_number: Option<u32>,
    pub lap_number: Option<u32>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryMessage {
    CarData(CarData),
    Location(Location),
    Position(Position),
    RaceControl(RaceControl),
}

impl TelemetryMessage {
    pub fn driver_number(&self) -> Option<u32> {
        match self {
            Self::CarData(record) => Some(record.driver_number),
            Self::Location(record) => Some(record.driver_number),
            Self::Position(record) => Some(record.driver_number),
            Self::RaceControl(record) => record.driver_number,
        }
    }

    pub fn date(&self) -> &str {
        match self {
            Self::CarData(record) => &record.date,
            Self::Location(record) => &record.date,
            Self::Position(record) => &record.date,
            Self::RaceControl(record) => &record.date,
        }
    }
}

fn require_driver(driver_number: u32) -> Result<(), SyncError> {
    if driver_number == 0 {
        return Err(SyncError::InvalidRecord(
            "driver_number must be positive".to_string(),
        ));
    }
    Ok(())
}

fn require_date(date: &str) -> Result<(), SyncError> {
    if date.trim().is_empty() {
        return Err(SyncError::InvalidRecord("date must be non-empty".to_string()));
    }
    Ok(())
}

fn require_pedal(name: &str, value: f64) -> Result<(), SyncError> {
    if !value.is_finite() || !(0.0..=MAX_PEDAL_PERCENT).contains(&value) {
        return Err(SyncError::InvalidRecord(format!(
            "{name} must be between 0 and {MAX_PEDAL_PERCENT}"
        )));
    }
    Ok(())
}

impl TryFrom<CarDataWire> for CarData {
    type Error = SyncError;

    fn try_from(value: CarDataWire) -> Result<Self, Self::Error> {
        require_driver(value.driver_number)?;
        require_date(&value.date)?;
        if !value.speed.is_finite() || !value.rpm.is_finite() || value.speed < 0.0 || value.rpm < 0.0
        {
            return Err(SyncError::InvalidRecord(
                "speed/rpm must be finite and non-negative".to_string(),
            ));
        }
        if value.n_gear > MAX_GEAR {
            return Err(SyncError::InvalidRecord(format!(
                "gear {} is above {MAX_GEAR}",
                value.n_gear
            )));
        }
        require_pedal("throttle", value.throttle)?;
        require_pedal("brake", value.brake)?;

        Ok(Self {
            driver_number: value.driver_number,
            date: value.date,
            speed: value.speed,
            rpm: value.rpm,
            gear: value.n_gear,
            throttle: value.throttle,
            brake: value.brake,
            drs: value.drs,
        })
    }
}

impl TryFrom<LocationWire> for Location {
    type Error = SyncError;

    fn try_from(value: LocationWire) -> Result<Self, Self::Error> {
        require_driver(value.driver_number)?;
        require_date(&value.date)?;
        if !value.x.is_finite() || !value.y.is_finite() || !value.z.is_finite() {
            return Err(SyncError::InvalidRecord(
                "location coordinates must be finite".to_string(),
            ));
        }

        Ok(Self {
            driver_number: value.driver_number,
            date: value.date,
            x: value.x,
            y: value.y,
            z: value.z,
        })
    }
}

impl TryFrom<PositionWire> for Position {
    type Error = SyncError;

    fn try_from(value: PositionWire) -> Result<Self, Self::Error> {
        require_driver(value.driver_number)?;
        require_date(&value.date)?;
        if value.position == 0 {
            return Err(SyncError::InvalidRecord(
                "position is 1-based".to_string(),
            ));
        }

        Ok(Self {
            driver_number: value.driver_number,
            date: value.date,
            position: value.position,
        })
    }
}

impl TryFrom<RaceControlWire> for RaceControl {
    type Error = SyncError;

    fn try_from(value: RaceControlWire) -> Result<Self, Self::Error> {
        require_date(&value.date)?;
        if value.message.trim().is_empty() {
            return Err(SyncError::InvalidRecord(
                "race control message must be non-empty".to_string(),
            ));
        }
        if let Some(driver_number) = value.driver_number {
            require_driver(driver_number)?;
        }

        Ok(Self {
            date: value.date,
            category: value.category,
            message: value.message,
            flag: value.flag.filter(|flag| !flag.trim().is_empty()),
            driver_number: value.driver_number,
            lap_number: value.lap_number,
        })
    }
}

impl TryFrom<TelemetryMessageWire> for TelemetryMessage {
    type Error = SyncError;

    fn try_from(value: TelemetryMessageWire) -> Result<Self, Self::Error> {
        Ok(match value {
            TelemetryMessageWire::CarData(wire) => Self::CarData(wire.try_into()?),
            TelemetryMessageWire::Location(wire) => Self::Location(wire.try_into()?),
            TelemetryMessageWire::Position(wire) => Self::Position(wire.try_into()?),
            TelemetryMessageWire::RaceControl(wire) => Self::RaceControl(wire.try_into()?),
        })
    }
}

pub fn parse_telemetry_payload(payload: &mut [u8]) -> Result<TelemetryMessage, SyncError> {
    let wire: TelemetryMessageWire = simd_json::serde::from_slice(payload)?;
    wire.try_into()
}

impl StreamMessage for TelemetryMessage {
    fn decode(payload: &mut [u8]) -> Result<Self, SyncError> {
        parse_telemetry_payload(payload)
    }
}

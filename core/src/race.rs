// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! The raw race snapshot as the telemetry feed delivers it.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, FromRepr};

/// Where a driver is right now. The feed sends these as integers.
#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
#[strum(serialize_all = "kebab-case")]
pub enum DriverStatus {
    #[allow(missing_docs)]
    #[default]
    OffTrack = 1,
    #[allow(missing_docs)]
    Running = 2,
    #[allow(missing_docs)]
    PitOut = 3,
    #[allow(missing_docs)]
    PitIn = 4,
}
impl From<u8> for DriverStatus {
    fn from(value: u8) -> Self {
        match value {
            2 => DriverStatus::Running,
            3 => DriverStatus::PitOut,
            4 => DriverStatus::PitIn,
            _ => DriverStatus::OffTrack,
        }
    }
}
impl From<DriverStatus> for u8 {
    fn from(value: DriverStatus) -> Self {
        value as u8
    }
}

/// Race-control flag state, 1 through 6.
#[derive(Clone, Copy, Debug, Default, Display, FromRepr, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[strum(serialize_all = "kebab-case")]
pub enum FlagState {
    /// The track is closed but cars are out.
    #[default]
    TrackOff = 1,
    #[allow(missing_docs)]
    Green = 2,
    #[allow(missing_docs)]
    Red = 3,
    #[allow(missing_docs)]
    Chequered = 4,
    #[allow(missing_docs)]
    Yellow = 5,
    #[allow(missing_docs)]
    FullCourseYellow = 6,
}
impl TryFrom<u8> for FlagState {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        FlagState::from_repr(value as usize).ok_or_else(|| format!("unknown flag state {value}"))
    }
}
impl From<FlagState> for u8 {
    fn from(value: FlagState) -> Self {
        value as u8
    }
}

#[allow(missing_docs)]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pilot {
    #[serde(default)]
    pub first_name: String,
}

/// One car's entry in the snapshot.
#[allow(missing_docs)]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Car {
    pub number: u32,
    #[serde(default)]
    pub driver: String,
    #[serde(default)]
    pub pilot: Pilot,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub laps: f64,
    #[serde(default)]
    pub average_speed: f64,
    #[serde(default, rename = "lastTimeInMiliseconds")]
    pub last_lap_time_ms: f64,
    #[serde(default)]
    pub driver_status: DriverStatus,
    #[serde(default)]
    pub tires: String,
    #[serde(default)]
    pub position: Option<u32>,
}
impl Car {
    /// Tire compound code for wets.
    pub const WET_TIRES: &'static str = "W";

    #[allow(missing_docs)]
    pub fn is_on_wets(&self) -> bool {
        self.tires == Self::WET_TIRES
    }
}

#[allow(missing_docs)]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Weather {
    #[serde(default)]
    pub wind_direction: f64,
    #[serde(default)]
    pub wind_speed: f64,
    #[serde(default)]
    pub air_temp: f64,
    #[serde(default)]
    pub road_temp: f64,
    #[serde(default, rename = "airPreassure")]
    pub air_pressure: f64,
}

#[allow(missing_docs)]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub flag: FlagState,
    #[serde(default)]
    pub weather: Weather,
    #[serde(default)]
    pub safety_car: bool,
    #[serde(default, rename = "remainingTimeInSeconds")]
    pub remaining_time_seconds: u64,
}

/// Everything the feed says about the race at one moment.
#[allow(missing_docs)]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RaceSnapshot {
    #[serde(default)]
    pub cars: Vec<Car>,
    pub track: Track,
}

// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! Reduces a raw [RaceSnapshot] to the scalar aggregates the dispatcher
//! watches.

use crate::{
    error::DerivationError,
    race::{Car, DriverStatus, RaceSnapshot},
    settings::ShowSettings,
    speakers::SpeakerRegistry,
    store::SnapshotStore,
    types::Value,
};

/// The category whose leader counts as "the lead car".
pub const LEAD_CATEGORY: &str = "LMP2";

/// Stand-in average speed when every car reports zero.
pub const DROPOUT_AVERAGE_SPEED: f64 = 200.0;

/// Names of the values in the [SnapshotStore].
pub mod keys {
    #![allow(missing_docs)]
    pub const CURRENT_LAB: &str = "currentLab";
    pub const AVERAGE_SPEED: &str = "averageSpeed";
    pub const PIT_STATUS: &str = "pitStatus";
    pub const PIT_OUT: &str = "pitOut";
    pub const RUNNING: &str = "running";
    pub const NUMBER_OF_PLACE_CHANGES: &str = "numberOfPlaceChanges";
    pub const NUMBER_OF_DRIVER_CHANGES: &str = "numberOfDriverChanges";
    pub const NUMBER_OF_WET_TIRES: &str = "numberOfWetTires";
    pub const PIT_DRIVER: &str = "pitDriver";
    pub const DRIVER_CHANGE: &str = "driverChange";
    pub const FIRST_PLACE: &str = "firstPlace";
    pub const FIRST_DRIVER_CHANGE: &str = "firstDriverChange";
    pub const FIRST_CAR_LAB_TIME: &str = "firstCarLabTime";
    pub const HOUR_LEFT: &str = "hourLeft";
    pub const MINUTES_LEFT: &str = "minutesLeft";
    pub const FLAG: &str = "flag";
    pub const SAFETY_CAR: &str = "safetyCar";
    pub const WIND_DIRECTION: &str = "windDirection";
    pub const WIND_SPEED: &str = "windSpeed";
    pub const AIR_TEMP: &str = "airTemp";
    pub const ROAD_TEMP: &str = "roadTemp";
    pub const AIR_PRESSURE: &str = "airPressure";

    // Bookkeeping written by the dispatcher and the ingest loop, not derived.
    pub const MUSIC_LAB: &str = "musicLab";
    pub const LAST_TRACK: &str = "lastTrack";
    pub const MAX_TRACKS_OVERFLOW: &str = "maxTracksOverflow";
    pub const CURRENT_SEC: &str = "currentSec";
}

/// One cycle's derived values, in the order they were computed. Keys that
/// couldn't be determined this cycle (no pitting speaker car, no lead-category
/// car, minutes while more than an hour remains) are absent, so the store
/// keeps their previous values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DerivedValues(Vec<(&'static str, Value)>);
impl DerivedValues {
    fn push(&mut self, key: &'static str, value: impl Into<Value>) {
        self.0.push((key, value.into()));
    }

    #[allow(missing_docs)]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Writes every value into `store`.
    pub fn apply_to(self, store: &mut SnapshotStore) {
        for (key, value) in self.0 {
            store.set(key, value);
        }
    }
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

// Scales a count into MIDI range 1..=128.
fn midi_scaled(count: usize, weight: f64, car_count: usize) -> f64 {
    (127.0 * (count as f64 * weight / car_count as f64)).round() + 1.0
}

/// Computes this cycle's aggregates from `raw`, comparing cars against
/// `prev_cars` by list position.
///
/// Comparison is index-aligned, not identity-aligned: if the feed reorders
/// its car list, the reordered slots count as place and driver changes.
pub fn derive(
    raw: &RaceSnapshot,
    prev_cars: &[Car],
    settings: &ShowSettings,
    speakers: &SpeakerRegistry,
) -> Result<DerivedValues, DerivationError> {
    let cars = &raw.cars;
    if cars.is_empty() {
        return Err(DerivationError::NoCars);
    }
    let car_count = cars.len();

    let mut total_laps = 0.0;
    let mut total_speed = 0.0;
    let mut pits = 0;
    let mut pit_outs = 0;
    let mut running = 0;
    let mut wet_tires = 0;
    let mut place_changes = 0;
    let mut driver_changes = 0;
    let mut pit_driver = None;
    let mut driver_change = None;

    for (i, car) in cars.iter().enumerate() {
        total_laps += car.laps;
        total_speed += car.average_speed;

        match car.driver_status {
            DriverStatus::PitIn => {
                if speakers.is_speaker_car(car.number) {
                    pit_driver = Some(i);
                }
                pits += 1;
            }
            DriverStatus::PitOut => pit_outs += 1,
            DriverStatus::Running => running += 1,
            DriverStatus::OffTrack => {}
        }
        if car.is_on_wets() {
            wet_tires += 1;
        }

        if let Some(prev) = prev_cars.get(i) {
            if car.number != prev.number {
                place_changes += 1;
            }
            if car.driver != prev.driver {
                driver_changes += 1;
                if speakers.is_speaker_car(car.number) {
                    driver_change = Some(car.number);
                }
            }
        }
    }

    let mut values = DerivedValues::default();
    values.push(
        keys::CURRENT_LAB,
        round_to(
            (total_laps / car_count as f64).abs(),
            settings.current_lab_decimals,
        ),
    );
    values.push(
        keys::AVERAGE_SPEED,
        if total_speed <= 0.0 {
            DROPOUT_AVERAGE_SPEED
        } else {
            round_to((total_speed / car_count as f64).abs(), 2)
        },
    );
    values.push(keys::PIT_STATUS, pits as u64);
    values.push(keys::PIT_OUT, pit_outs as u64);
    values.push(keys::RUNNING, midi_scaled(running, 1.0, car_count));
    values.push(
        keys::NUMBER_OF_PLACE_CHANGES,
        midi_scaled(place_changes, 10.0, car_count),
    );
    values.push(
        keys::NUMBER_OF_DRIVER_CHANGES,
        midi_scaled(driver_changes, 10.0, car_count),
    );
    values.push(
        keys::NUMBER_OF_WET_TIRES,
        midi_scaled(wet_tires, 3.0, car_count),
    );
    if let Some(index) = pit_driver {
        values.push(keys::PIT_DRIVER, index);
    }
    if let Some(number) = driver_change {
        values.push(keys::DRIVER_CHANGE, number);
    }
    if let Some(leader) = cars.iter().find(|car| car.category == LEAD_CATEGORY) {
        values.push(keys::FIRST_PLACE, leader.number);
        values.push(
            keys::FIRST_DRIVER_CHANGE,
            leader.pilot.first_name.clone(),
        );
    }
    values.push(keys::FIRST_CAR_LAB_TIME, cars[0].last_lap_time_ms);

    let track = &raw.track;
    values.push(keys::FLAG, u8::from(track.flag) as u64);
    values.push(keys::SAFETY_CAR, track.safety_car);
    values.push(keys::WIND_DIRECTION, track.weather.wind_direction);
    values.push(keys::WIND_SPEED, track.weather.wind_speed);
    values.push(keys::AIR_TEMP, track.weather.air_temp);
    values.push(keys::ROAD_TEMP, track.weather.road_temp);
    values.push(keys::AIR_PRESSURE, track.weather.air_pressure);

    // Countdown granularity is hours until the last hour, then minutes.
    let remaining = track.remaining_time_seconds;
    let hours = (remaining / 3600) % 24;
    values.push(keys::HOUR_LEFT, hours);
    if hours == 0 {
        values.push(keys::MINUTES_LEFT, (remaining / 60) % 60);
    }

    Ok(values)
}

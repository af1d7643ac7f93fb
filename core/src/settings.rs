// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! The show's tunable mapping constants. Intended to be serialized.

use derivative::Derivative;
use serde::{Deserialize, Serialize};

/// Contents of the show settings file. Every key is optional; the operator
/// edits the file live and the player picks changes up on the next cycle.
#[derive(Clone, Debug, Derivative, PartialEq, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ShowSettings {
    /// Scene (one-based) to jump to when the chequered flag falls.
    #[derivative(Default(value = "1"))]
    pub ending_music_track: i64,
    /// Advance scenes on the randomized cadence regardless of race state.
    pub auto_play: bool,
    /// Enter restart-point mode right away rather than after the last scene.
    pub track_overflow: bool,
    /// In last-track mode, scene advance stops past this scene.
    #[derivative(Default(value = "999"))]
    pub stop_music_track: i64,
    /// Autoplay waits between 1 and this many triggers between scenes.
    #[derivative(Default(value = "6"))]
    pub auto_times: u64,
    /// Lead-car lap time (ms) divided by this gives the tempo in BPM.
    #[derivative(Default(value = "1000.0"))]
    pub bpm_divider: f64,
    /// Tempo bounds, `[min, max]`.
    #[serde(rename = "bpmMinMax")]
    #[derivative(Default(value = "[80.0, 160.0]"))]
    pub bpm_min_max: [f64; 2],
    /// Rounding for the average lap count.
    #[derivative(Default(value = "2"))]
    pub current_lab_decimals: u32,
    #[allow(missing_docs)]
    #[derivative(Default(value = "127.0"))]
    pub snare_max_value: f64,
    #[allow(missing_docs)]
    #[derivative(Default(value = "30.0"))]
    pub kick_wind_speed_divider: f64,
    #[allow(missing_docs)]
    #[derivative(Default(value = "127.0"))]
    pub kick_max_value: f64,
    /// Place-change count that maps to a fully open master filter. The key is
    /// spelled the way existing settings files spell it.
    #[serde(rename = "filterDriverChangeivision")]
    #[derivative(Default(value = "10.0"))]
    pub filter_driver_change_division: f64,
    #[allow(missing_docs)]
    #[derivative(Default(value = "127.0"))]
    pub master_filter_max_val: f64,
}
impl ShowSettings {
    /// Clamps a tempo into [ShowSettings::bpm_min_max].
    pub fn clamp_bpm(&self, bpm: f64) -> f64 {
        let [min, max] = self.bpm_min_max;
        if bpm < min {
            min
        } else if bpm > max {
            max
        } else {
            bpm
        }
    }
}

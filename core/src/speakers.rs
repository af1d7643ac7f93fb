// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! Which cars and drivers have announcer clips, and what the fixed cues are
//! called on the speaker track.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Names of the announcer clips that aren't tied to a particular car.
pub mod cues {
    #![allow(missing_docs)]
    pub const GREEN_FLAG: &str = "green-flag";
    pub const YELLOW_FLAG: &str = "yellow-flag";
    pub const SAFETY_CAR: &str = "Safety-car";
    pub const IN_PIT: &str = "in-pit";
    pub const TAKES_THE_LEAD: &str = "takes-the-lead";

    /// `hours-<n>`
    pub fn hours_left(hours: i64) -> String {
        format!("hours-{hours}")
    }

    /// `min-<n>`
    pub fn minutes_left(minutes: i64) -> String {
        format!("min-{minutes}")
    }
}

/// The fixed car-to-clip and driver-to-clip mappings for the show.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerRegistry {
    /// The music-tool track that holds every announcer clip.
    pub track: u32,
    /// Car number to the clip that names it.
    pub cars: BTreeMap<u32, String>,
    /// Clips announcing who took over the wheel. Matched by first name.
    pub driver_clips: Vec<String>,
}
impl Default for SpeakerRegistry {
    fn default() -> Self {
        Self {
            track: 17,
            cars: BTreeMap::from([
                (1, "Porsche-1".to_string()),
                (2, "Porsche-2".to_string()),
                (13, "Car-13".to_string()),
                (24, "Car-24".to_string()),
                (31, "Car-31".to_string()),
                (35, "Car-35".to_string()),
                (38, "Car-38".to_string()),
            ]),
            driver_clips: vec![
                "Porsche-1-andre-lotterer-driving".to_string(),
                "Porsche-1-neel-jani-driving".to_string(),
                "Porsche-1-nick-tandy-driving".to_string(),
            ],
        }
    }
}
impl SpeakerRegistry {
    /// Whether `car_number` is a speaker car.
    pub fn is_speaker_car(&self, car_number: u32) -> bool {
        self.cars.contains_key(&car_number)
    }

    /// The clip naming `car_number`, if it has one.
    pub fn clip_for_car(&self, car_number: u32) -> Option<&str> {
        self.cars.get(&car_number).map(String::as_str)
    }

    /// The first driver clip mentioning the lower-cased first word of `name`.
    pub fn clip_for_driver(&self, name: &str) -> Option<&str> {
        let first = name.split(' ').next().unwrap_or_default().to_lowercase();
        if first.is_empty() {
            return None;
        }
        self.driver_clips
            .iter()
            .find(|clip| clip.contains(&first))
            .map(String::as_str)
    }
}

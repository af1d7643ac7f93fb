// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! Contains the traits that define the system's external collaborators.

use crate::{
    error::{ActionError, IngestError},
    race::RaceSnapshot,
    types::{Clip, DeviceAddress, Parameter, ParameterAddress, Scene},
};

/// Quick import of all important traits.
pub mod prelude {
    pub use super::{ControlSurface, TelemetrySource};
}

/// The music-performance tool's control surface. Everything except the
/// getters is fire-and-forget from the show's point of view: failures are
/// logged by the caller and never retried.
///
/// Methods take `&self` because transition progress callbacks drive the
/// surface from the ticker thread while the control loop also uses it.
pub trait ControlSurface: Send + Sync + std::fmt::Debug {
    /// Every scene in the live set, in order.
    fn scenes(&self) -> Result<Vec<Scene>, ActionError>;

    /// Launches a scene.
    fn play_scene(&self, scene: i64) -> Result<(), ActionError>;

    /// The clips on a track.
    fn clips_for_track(&self, track: u32) -> Result<Vec<Clip>, ActionError>;

    /// Launches a clip.
    fn play_clip(&self, track: u32, clip: u32) -> Result<(), ActionError>;

    /// The parameters a device exposes.
    fn parameters_for_device(
        &self,
        device: DeviceAddress,
        index: u32,
    ) -> Result<Vec<Parameter>, ActionError>;

    /// Sets one device parameter.
    fn set_parameter(&self, address: ParameterAddress, value: f64) -> Result<(), ActionError>;

    /// The current tempo, in BPM.
    fn tempo(&self) -> Result<f64, ActionError>;

    /// Sets the tempo, in BPM.
    fn set_tempo(&self, bpm: f64) -> Result<(), ActionError>;
}

/// Somewhere race snapshots come from: the live feed or a recording.
pub trait TelemetrySource: Send + std::fmt::Debug {
    /// Produces the next snapshot.
    fn fetch(&mut self) -> Result<RaceSnapshot, IngestError>;

    /// For replayed sources, the frame that the last fetch returned.
    fn position(&self) -> Option<usize> {
        None
    }
}

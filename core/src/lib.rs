// Copyright (c) 2024 Mike Tsao. All rights reserved.

#![warn(missing_docs)]

//! Core of trackwave: turning race telemetry into music-control decisions.

/// Rate-limits bursts of external triggers.
pub mod debounce;
/// Computes per-cycle aggregates from a raw race snapshot.
pub mod derive;
/// The error taxonomy.
pub mod error;
/// Raw telemetry data model.
pub mod race;
/// Provides a random-number generator for debugging and testing.
pub mod rng;
/// The operator's live-editable show settings.
pub mod settings;
/// Announcer clip registry.
pub mod speakers;
/// Derived-state storage and change detection.
pub mod store;
/// Describes the system's external collaborators.
pub mod traits;
/// Time-bounded parameter sweeps.
pub mod transition;
/// Common structures used across the library.
pub mod types;

/// Recommended imports for easy onboarding.
pub mod prelude {
    pub use super::debounce::Debounce;
    pub use super::derive::{derive, keys, DerivedValues, LEAD_CATEGORY};
    pub use super::error::{ActionError, DerivationError, IngestError, InvariantError};
    pub use super::race::{Car, DriverStatus, FlagState, RaceSnapshot};
    pub use super::rng::Rng;
    pub use super::settings::ShowSettings;
    pub use super::speakers::{cues, SpeakerRegistry};
    pub use super::store::{Detection, SnapshotStore};
    pub use super::traits::prelude::*;
    pub use super::transition::{Easing, TransitionRequest, TransitionScheduler};
    pub use super::types::{Clip, DeviceAddress, ParameterAddress, Scene, Value};
}

// Copyright (c) 2024 Mike Tsao. All rights reserved.

#![warn(missing_docs)]

//! The `trackwave` crate turns live race telemetry into music. It polls a
//! timing feed, reduces each snapshot to a handful of values, and when those
//! values change it launches scenes, plays announcer clips, and sweeps
//! device parameters in a music-performance tool.

pub mod control {
    //! Change detection and the actions it drives.

    pub use crate::dispatch::{checks, devices, targets, ActionDispatcher, CycleContext};
    pub use crate::scenes::{SceneAdvance, SceneBook};
    pub use trackwave_core::store::{Detection, SnapshotStore};

    /// The most commonly used imports.
    pub mod prelude {
        pub use super::{ActionDispatcher, Detection, SceneBook, SnapshotStore};
    }
}

pub mod race {
    //! What the timing feed reports and what's derived from it.

    pub use trackwave_core::{
        derive::{derive, keys, DerivedValues, LEAD_CATEGORY},
        race::{Car, DriverStatus, FlagState, Pilot, RaceSnapshot, Track, Weather},
        speakers::{cues, SpeakerRegistry},
    };

    /// The most commonly used imports.
    pub mod prelude {
        pub use super::{derive, keys, Car, RaceSnapshot, SpeakerRegistry};
    }
}

pub mod services {
    //! Threads and I/O edges: the feed, the music tool, MIDI, and files.

    pub use trackwave_services::*;
}

pub mod transition {
    //! Time-bounded parameter sweeps.

    pub use trackwave_core::transition::{
        Easing, Transition, TransitionRequest, TransitionScheduler,
    };
}

pub mod types {
    //! Common types and errors.

    pub use trackwave_core::{
        error::{ActionError, DerivationError, IngestError, InvariantError},
        rng::Rng,
        settings::ShowSettings,
        traits::{ControlSurface, TelemetrySource},
        types::{Clip, DeviceAddress, Parameter, ParameterAddress, Scene, Value},
    };
}

pub use player::Player;
pub use version::app_version;

mod dispatch;
mod player;
mod scenes;
mod version;

/// A collection of imports that are useful to users of this crate.
pub mod prelude {
    pub use super::{
        control::prelude::*, race::prelude::*, services::prelude::*, types::*, Player,
    };
    pub use trackwave_core::prelude::*;
}

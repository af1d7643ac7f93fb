// Copyright (c) 2024 Mike Tsao. All rights reserved.

#![warn(missing_docs)]

//! Trackwave services: the threads and I/O edges around the core.

pub use channel_pair::ChannelPair;
pub use ingest::{IngestService, IngestServiceEvent, IngestServiceInput, LiveFeed, RecordedFeed};
pub use midi::{MidiPortNames, MidiService, MidiServiceEvent};
pub use persistence::Persistence;
pub use settings::SettingsWatcher;
pub use surface::{HttpSurface, RecordingSurface, SurfaceAction};
pub use traits::ProvidesService;
pub use transition::{TransitionService, TransitionServiceInput};

mod channel_pair;
mod ingest;
mod midi;
mod persistence;
mod settings;
mod surface;
mod traits;
mod transition;

/// Recommended imports for easy onboarding.
pub mod prelude {
    pub use super::{
        HttpSurface, IngestService, IngestServiceEvent, LiveFeed, MidiService, MidiServiceEvent,
        Persistence, ProvidesService, RecordedFeed, RecordingSurface, SettingsWatcher,
        SurfaceAction, TransitionService,
    };
}

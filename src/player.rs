// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! The control loop: ingest, derive, detect, dispatch, persist.

use crate::dispatch::{ActionDispatcher, CycleContext};
use crossbeam_channel::Receiver;
use std::time::Instant;
use trackwave_core::{
    debounce::Debounce,
    derive::{derive, keys},
    error::{IngestError, InvariantError},
    race::{Car, RaceSnapshot},
    speakers::SpeakerRegistry,
    store::SnapshotStore,
};
use trackwave_services::{IngestServiceEvent, MidiServiceEvent, Persistence, SettingsWatcher};

/// Owns the [SnapshotStore] and runs one cycle per snapshot. Cycles never
/// overlap because they all run on the thread that calls
/// [Player::run()].
#[derive(Debug)]
pub struct Player {
    store: SnapshotStore,
    settings: SettingsWatcher,
    persistence: Persistence,
    dispatcher: ActionDispatcher,
    speakers: SpeakerRegistry,
    prev_cars: Vec<Car>,
    midi_debounce: Debounce,
    first_cycle: bool,
    // Set by a settings reload; cleared once a trigger actually runs.
    retrigger_pending: bool,
}
impl Player {
    /// Restores saved state, if there is any, before the first cycle.
    pub fn new_with(
        dispatcher: ActionDispatcher,
        settings: SettingsWatcher,
        persistence: Persistence,
        speakers: SpeakerRegistry,
    ) -> anyhow::Result<Self> {
        let store = persistence.load()?.unwrap_or_default();
        Ok(Self {
            store,
            settings,
            persistence,
            dispatcher,
            speakers,
            prev_cars: Vec::default(),
            midi_debounce: Debounce::default(),
            first_cycle: true,
            retrigger_pending: false,
        })
    }

    #[allow(missing_docs)]
    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    #[allow(missing_docs)]
    pub fn is_first_cycle(&self) -> bool {
        self.first_cycle
    }

    /// One full cycle for `snapshot`. `frame` is the replay position, if
    /// replaying. Only an [InvariantError] escapes; everything else is logged.
    ///
    /// A skipped cycle writes nothing. A settings reload seen during a
    /// skipped cycle still re-triggers on the next cycle that completes.
    pub fn run_cycle(
        &mut self,
        now: Instant,
        snapshot: &RaceSnapshot,
        frame: Option<usize>,
    ) -> Result<(), InvariantError> {
        match self.settings.poll() {
            Ok(true) => self.retrigger_pending = true,
            Ok(false) => {}
            Err(e) => log::error!("Keeping previous settings: {e:?}"),
        }

        let values = match derive(
            snapshot,
            &self.prev_cars,
            self.settings.settings(),
            &self.speakers,
        ) {
            Ok(values) => values,
            Err(e) => {
                log::warn!("Skipping cycle: {e}");
                return Ok(());
            }
        };
        values.apply_to(&mut self.store);
        if let Some(frame) = frame {
            self.store.set(keys::CURRENT_SEC, frame + 1);
        }
        self.prev_cars = snapshot.cars.clone();

        let ctx = CycleContext {
            now,
            settings: self.settings.settings(),
            settings_generation: self.settings.generation(),
            first_cycle: self.first_cycle,
        };
        self.dispatcher.dispatch(&ctx, &mut self.store, snapshot)?;

        if self.first_cycle || self.retrigger_pending {
            if self.retrigger_pending {
                log::info!("Settings changed; re-triggering");
            }
            if self.trigger(now)? {
                self.retrigger_pending = false;
            }
        }

        self.persist();
        self.first_cycle = false;
        Ok(())
    }

    /// The manual trigger. Bursts within [Debounce::DEFAULT_WINDOW] collapse
    /// into one. Returns whether this trigger ran.
    pub fn on_midi_note(&mut self, now: Instant) -> Result<bool, InvariantError> {
        let ran = self.trigger(now)?;
        if ran {
            self.persist();
        }
        Ok(ran)
    }

    fn persist(&self) {
        if let Err(e) = self.persistence.save(&self.store) {
            log::error!("Couldn't save state: {e:?}");
        }
    }

    fn trigger(&mut self, now: Instant) -> Result<bool, InvariantError> {
        if !self.midi_debounce.try_accept(now) {
            log::debug!("Trigger ignored; still busy");
            return Ok(false);
        }
        log::info!("Trigger received");
        let ctx = CycleContext {
            now,
            settings: self.settings.settings(),
            settings_generation: self.settings.generation(),
            first_cycle: self.first_cycle,
        };
        self.dispatcher.on_midi_note(&ctx, &mut self.store)?;
        Ok(true)
    }

    /// Runs cycles as snapshots arrive and triggers as MIDI arrives, until
    /// the feed goes away or a replay runs out. Snapshots that queued up
    /// behind a slow cycle are dropped in favor of the newest.
    pub fn run(
        &mut self,
        snapshots: &Receiver<IngestServiceEvent>,
        midi: &Receiver<MidiServiceEvent>,
    ) -> Result<(), InvariantError> {
        loop {
            crossbeam_channel::select! {
                recv(snapshots) -> event => {
                    let Ok(event) = event else {
                        break;
                    };
                    let mut newest = None;
                    let mut dropped = 0;
                    let mut exhausted = None;
                    for event in std::iter::once(event).chain(snapshots.try_iter()) {
                        match event {
                            IngestServiceEvent::Snapshot { snapshot, frame } => {
                                if newest.replace((snapshot, frame)).is_some() {
                                    dropped += 1;
                                }
                            }
                            IngestServiceEvent::Failed(IngestError::Exhausted(frames)) => {
                                exhausted = Some(frames);
                            }
                            IngestServiceEvent::Failed(e) => {
                                log::warn!("No data, trying again: {e}");
                            }
                        }
                    }
                    if dropped > 0 {
                        log::warn!("Falling behind; dropped {dropped} stale snapshots");
                    }
                    if let Some((snapshot, frame)) = newest {
                        self.run_cycle(Instant::now(), &snapshot, frame)?;
                    }
                    if let Some(frames) = exhausted {
                        log::info!("Replay finished after {frames} frames");
                        break;
                    }
                }
                recv(midi) -> event => match event {
                    Ok(MidiServiceEvent::Midi(channel, message)) => {
                        log::debug!("MIDI in: channel {channel} {message:?}");
                        self.on_midi_note(Instant::now())?;
                    }
                    Err(_) => break,
                },
            }
        }
        Ok(())
    }
}

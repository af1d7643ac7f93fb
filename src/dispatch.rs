// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! Turns detected changes into actions on the music tool.

use crate::scenes::{SceneAdvance, SceneBook};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use trackwave_core::{
    derive::keys,
    error::{ActionError, InvariantError},
    race::{FlagState, RaceSnapshot},
    rng::Rng,
    settings::ShowSettings,
    speakers::{cues, SpeakerRegistry},
    store::SnapshotStore,
    traits::ControlSurface,
    transition::{TransitionRequest, TransitionScheduler},
    types::{Clip, DeviceAddress, ParameterAddress},
};

/// Check-ids. These are keys in the persisted state file, so they keep the
/// spelling existing state files use.
pub mod checks {
    #![allow(missing_docs)]
    pub const FLAG: &str = "flagChk";
    pub const SAFETY_CAR: &str = "safetyCarPlaySpeak";
    pub const PIT_DRIVER: &str = "pitDriverPlaySpeaks";
    pub const FIRST_PLACE: &str = "firstPlacePlaySpeaks";
    pub const DRIVER_NAME: &str = "playDroverChangeSpeakChk";
    pub const HOURS_LEFT: &str = "hourLeftSpeakCheck";
    pub const MINUTES_LEFT: &str = "minuteLeftSpeakCheck";
    pub const SNARE: &str = "setDrumsWind";
    pub const KICK: &str = "setDrumsWindSpeed";
    pub const MASTER_FILTER: &str = "setMasterFilterNumberOfDriverChanges";
    pub const PIT_FILTER: &str = "pitStatusFilters";
    pub const PIT_OUT_FILTER: &str = "pitOutStatusFilter";
    pub const TEMPO: &str = "setTrackBpm";
    pub const MUSIC_LAB: &str = "musicLabChk";
}

/// Transition targets. One per parameter family, so sweeps on the same
/// parameters never overlap.
pub mod targets {
    #![allow(missing_docs)]
    pub const MASTER_FILTER: &str = "master-filter";
    pub const PIT_FILTER: &str = "pit-filter";
    pub const PIT_OUT_FILTER: &str = "pit-out-filter";
    pub const TEMPO: &str = "tempo";

    /// Delayed announcer cues wait on a motionless transition.
    pub fn cue(clip: &str) -> String {
        format!("cue:{clip}")
    }
}

/// Where the show's sounds live in the music tool.
pub mod devices {
    #![allow(missing_docs)]
    use super::{DeviceAddress, ParameterAddress};

    pub const MASTER_FILTER: ParameterAddress = ParameterAddress::new(DeviceAddress::Master, 0, 5);
    pub const PIT_FILTERS: [ParameterAddress; 3] = [
        ParameterAddress::new(DeviceAddress::Track(8), 3, 1),
        ParameterAddress::new(DeviceAddress::Track(11), 0, 1),
        ParameterAddress::new(DeviceAddress::Track(13), 0, 1),
    ];
    pub const PIT_OUT_FILTERS: [ParameterAddress; 2] = [
        ParameterAddress::new(DeviceAddress::Track(9), 2, 1),
        ParameterAddress::new(DeviceAddress::Track(12), 0, 1),
    ];
    pub const SNARE: ParameterAddress = ParameterAddress::new(DeviceAddress::Track(3), 0, 1);
    pub const KICK: ParameterAddress = ParameterAddress::new(DeviceAddress::Track(1), 0, 1);
}

const CUE_DELAY: Duration = Duration::from_secs(4);
const TEMPO_SWEEP: Duration = Duration::from_millis(30000);
const SWEEP_MIN_MS: u64 = 10000;
const SWEEP_MAX_MS: u64 = 40000;
const PIT_FILTER_SCALE: f64 = 20.0;

// Watchers that re-dispatch when the settings change.
const SNARE_WATCHER: &str = "snare";
const KICK_WATCHER: &str = "kick";
const MASTER_FILTER_WATCHER: &str = "master-filter";
const TEMPO_WATCHER: &str = "tempo";

fn hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn report(result: Result<(), ActionError>) {
    match result {
        Ok(()) => {}
        Err(ActionError::UnknownClip(name)) => log::debug!("No speaker clip named {name}"),
        Err(e) => log::error!("{e}"),
    }
}

/// What one dispatch pass needs to know besides the store.
#[derive(Debug)]
pub struct CycleContext<'a> {
    /// When the cycle runs. Transitions start from here.
    pub now: Instant,
    #[allow(missing_docs)]
    pub settings: &'a ShowSettings,
    /// Bumped on every settings reload.
    pub settings_generation: u64,
    /// Announcer cues stay quiet on the first cycle after startup, so a
    /// restart doesn't replay stale news.
    pub first_cycle: bool,
}

/// Watches the [SnapshotStore] and performs the show's actions on a
/// [ControlSurface]. Every watch consults the change detector exactly once
/// per pass; delivery is at most once, so failed actions are logged and not
/// retried.
#[derive(Debug)]
pub struct ActionDispatcher {
    surface: Arc<dyn ControlSurface>,
    scheduler: Arc<Mutex<TransitionScheduler>>,
    speakers: SpeakerRegistry,
    speaker_clips: Vec<Clip>,
    scenes: SceneAdvance,
    rng: Rng,
    seen_generations: HashMap<&'static str, u64>,
}
impl ActionDispatcher {
    /// Reads the scene list and the speaker track's clips from `surface`.
    pub fn new_with(
        surface: Arc<dyn ControlSurface>,
        scheduler: Arc<Mutex<TransitionScheduler>>,
        speakers: SpeakerRegistry,
        mut rng: Rng,
    ) -> Result<Self, ActionError> {
        let book = SceneBook::from_scenes(&surface.scenes()?);
        log::info!(
            "{} scenes, restart points {:?}",
            book.max_scenes(),
            book.restart_points()
        );
        let speaker_clips = surface.clips_for_track(speakers.track)?;
        log::info!(
            "Speaker clips: {:?}",
            speaker_clips.iter().map(|c| &c.name).collect::<Vec<_>>()
        );
        Ok(Self {
            scenes: SceneAdvance::new_with(book, &mut rng),
            surface,
            scheduler,
            speakers,
            speaker_clips,
            rng,
            seen_generations: Default::default(),
        })
    }

    #[allow(missing_docs)]
    pub fn scene_book(&self) -> &SceneBook {
        self.scenes.book()
    }

    /// Runs every watch, in show order.
    pub fn dispatch(
        &mut self,
        ctx: &CycleContext,
        store: &mut SnapshotStore,
        snapshot: &RaceSnapshot,
    ) -> Result<(), InvariantError> {
        self.watch_flag(store)?;
        self.watch_safety_car(store)?;
        self.watch_pit_driver(ctx, store, snapshot)?;
        self.watch_lead(ctx, store)?;
        self.watch_driver_name(store)?;
        self.watch_time_left(ctx, store)?;
        self.apply_drums(ctx, store)?;
        self.watch_master_filter(ctx, store)?;
        self.watch_pit_filters(ctx, store)?;
        self.watch_tempo(ctx, store)?;
        Ok(())
    }

    /// The manual trigger: re-applies the drums and moves the scene along.
    pub fn on_midi_note(
        &mut self,
        ctx: &CycleContext,
        store: &mut SnapshotStore,
    ) -> Result<(), InvariantError> {
        self.apply_drums(ctx, store)?;
        self.set_current_scene(ctx, store)
    }

    // True once per settings generation per watcher.
    fn settings_changed_for(&mut self, watcher: &'static str, generation: u64) -> bool {
        self.seen_generations.insert(watcher, generation) != Some(generation)
    }

    fn speak(&self, name: &str) -> Result<(), ActionError> {
        let clip = self
            .speaker_clips
            .iter()
            .find(|clip| clip.name == name)
            .ok_or_else(|| ActionError::UnknownClip(name.to_string()))?;
        log::info!("Speaking {name}");
        self.surface.play_clip(self.speakers.track, clip.id)
    }

    // Plays `name` after a delay, unless the same cue is already waiting.
    fn speak_later(&self, now: Instant, name: &str) {
        let Some(clip) = self.speaker_clips.iter().find(|clip| clip.name == name) else {
            log::debug!("No speaker clip named {name}");
            return;
        };
        let surface = Arc::clone(&self.surface);
        let track = self.speakers.track;
        let clip_id = clip.id;
        let name = name.to_string();
        let request = TransitionRequest::new(targets::cue(&name), 0.0, 0.0, CUE_DELAY)
            .on_complete(move |_| {
                log::info!("Speaking {name}");
                report(surface.play_clip(track, clip_id));
            });
        self.start(now, request);
    }

    fn start(&self, now: Instant, request: TransitionRequest) -> bool {
        match self.scheduler.lock() {
            Ok(mut scheduler) => scheduler.start_at(now, request),
            Err(e) => {
                log::error!("Transition scheduler unavailable: {e}");
                false
            }
        }
    }

    fn is_active(&self, target: &str) -> bool {
        self.scheduler
            .lock()
            .map(|scheduler| scheduler.is_active(target))
            .unwrap_or_default()
    }

    fn random_sweep(&mut self) -> Duration {
        Duration::from_millis(self.rng.rand_range(SWEEP_MIN_MS..SWEEP_MAX_MS))
    }

    fn sweep_parameters(
        surface: &Arc<dyn ControlSurface>,
        addresses: &'static [ParameterAddress],
    ) -> impl FnMut(f64) + Send + 'static {
        let surface = Arc::clone(surface);
        move |value| {
            let value = hundredths(value);
            for address in addresses {
                report(surface.set_parameter(*address, value));
            }
        }
    }

    fn watch_flag(&mut self, store: &mut SnapshotStore) -> Result<(), InvariantError> {
        if !store.check_changed(keys::FLAG, checks::FLAG, false)?.is_changed()
            || store.get_flag(keys::LAST_TRACK)
        {
            return Ok(());
        }
        let flag = store
            .get(keys::FLAG)
            .and_then(|v| v.as_i64())
            .and_then(|v| usize::try_from(v).ok())
            .and_then(FlagState::from_repr);
        match flag {
            Some(FlagState::Green) => {
                log::info!("Green flag");
                report(self.speak(cues::GREEN_FLAG));
            }
            Some(FlagState::Yellow) => {
                log::info!("Yellow flag");
                report(self.speak(cues::YELLOW_FLAG));
            }
            Some(FlagState::FullCourseYellow) => {
                log::info!("Full course yellow");
                report(self.speak(cues::YELLOW_FLAG));
            }
            Some(flag) => log::info!("Flag is now {flag}"),
            None => log::warn!("Unknown flag {:?}", store.get(keys::FLAG)),
        }
        Ok(())
    }

    fn watch_safety_car(&mut self, store: &mut SnapshotStore) -> Result<(), InvariantError> {
        if store
            .check_changed(keys::SAFETY_CAR, checks::SAFETY_CAR, false)?
            .is_changed()
            && store.get_flag(keys::SAFETY_CAR)
        {
            log::info!("Safety car");
            report(self.speak(cues::SAFETY_CAR));
        }
        Ok(())
    }

    fn watch_pit_driver(
        &mut self,
        ctx: &CycleContext,
        store: &mut SnapshotStore,
        snapshot: &RaceSnapshot,
    ) -> Result<(), InvariantError> {
        if !store
            .check_changed(keys::PIT_DRIVER, checks::PIT_DRIVER, false)?
            .is_changed()
            || ctx.first_cycle
        {
            return Ok(());
        }
        let car = store
            .get(keys::PIT_DRIVER)
            .and_then(|v| v.as_i64())
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| snapshot.cars.get(i));
        let Some(car) = car else {
            return Ok(());
        };
        if let Some(clip) = self.speakers.clip_for_car(car.number) {
            log::info!("Car {} is pitting", car.number);
            let result = self.speak(clip);
            if result.is_ok() {
                self.speak_later(ctx.now, cues::IN_PIT);
            }
            report(result);
        }
        Ok(())
    }

    fn watch_lead(
        &mut self,
        ctx: &CycleContext,
        store: &mut SnapshotStore,
    ) -> Result<(), InvariantError> {
        if !store
            .check_changed(keys::FIRST_PLACE, checks::FIRST_PLACE, false)?
            .is_changed()
            || ctx.first_cycle
        {
            return Ok(());
        }
        let leader = store
            .get(keys::FIRST_PLACE)
            .and_then(|v| v.as_i64())
            .and_then(|n| u32::try_from(n).ok());
        if let Some(clip) = leader.and_then(|n| self.speakers.clip_for_car(n)) {
            log::info!("{clip} takes the lead");
            let result = self.speak(clip);
            if result.is_ok() {
                self.speak_later(ctx.now, cues::TAKES_THE_LEAD);
            }
            report(result);
        }
        Ok(())
    }

    fn watch_driver_name(&mut self, store: &mut SnapshotStore) -> Result<(), InvariantError> {
        if !store
            .check_changed(keys::FIRST_DRIVER_CHANGE, checks::DRIVER_NAME, false)?
            .is_changed()
        {
            return Ok(());
        }
        let name = store
            .get(keys::FIRST_DRIVER_CHANGE)
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        if let Some(clip) = self.speakers.clip_for_driver(name) {
            report(self.speak(clip));
        }
        Ok(())
    }

    fn watch_time_left(
        &mut self,
        ctx: &CycleContext,
        store: &mut SnapshotStore,
    ) -> Result<(), InvariantError> {
        if store
            .check_changed(keys::HOUR_LEFT, checks::HOURS_LEFT, false)?
            .is_changed()
            && !ctx.first_cycle
        {
            if let Some(hours) = store.get(keys::HOUR_LEFT).and_then(|v| v.as_i64()) {
                report(self.speak(&cues::hours_left(hours)));
            }
        }
        if store
            .check_changed(keys::MINUTES_LEFT, checks::MINUTES_LEFT, false)?
            .is_changed()
            && !ctx.first_cycle
        {
            if let Some(minutes) = store.get(keys::MINUTES_LEFT).and_then(|v| v.as_i64()) {
                report(self.speak(&cues::minutes_left(minutes)));
            }
        }
        Ok(())
    }

    fn apply_drums(
        &mut self,
        ctx: &CycleContext,
        store: &mut SnapshotStore,
    ) -> Result<(), InvariantError> {
        let settings = ctx.settings;
        let snare_changed = store
            .check_changed(keys::WIND_DIRECTION, checks::SNARE, false)?
            .is_changed();
        if self.settings_changed_for(SNARE_WATCHER, ctx.settings_generation) || snare_changed {
            let raw = store.get_f64(keys::WIND_DIRECTION, 0.0);
            let knob = (settings.snare_max_value * raw / 360.0).round();
            log::info!("Setting snare to {knob} (wind direction {raw})");
            report(self.surface.set_parameter(devices::SNARE, knob));
        }

        let kick_changed = store
            .check_changed(keys::WIND_SPEED, checks::KICK, false)?
            .is_changed();
        if self.settings_changed_for(KICK_WATCHER, ctx.settings_generation) || kick_changed {
            let raw = store.get_f64(keys::WIND_SPEED, 0.0);
            let knob = (settings.kick_max_value * raw / settings.kick_wind_speed_divider).round();
            log::info!("Setting kick to {knob} (wind speed {raw})");
            report(self.surface.set_parameter(devices::KICK, knob));
        }
        Ok(())
    }

    // Sweeps the master filter up to the place-change level, then back to
    // closed, over two random lengths.
    fn watch_master_filter(
        &mut self,
        ctx: &CycleContext,
        store: &mut SnapshotStore,
    ) -> Result<(), InvariantError> {
        let detection =
            store.check_changed(keys::NUMBER_OF_PLACE_CHANGES, checks::MASTER_FILTER, true)?;
        let forced = self.settings_changed_for(MASTER_FILTER_WATCHER, ctx.settings_generation);
        if !detection.is_changed() && !forced {
            return Ok(());
        }
        let settings = ctx.settings;
        let current = store.get_f64(keys::NUMBER_OF_PLACE_CHANGES, 0.0);
        let previous = detection.as_f64().unwrap_or(current);
        let to_knob = |count: f64| {
            (settings.master_filter_max_val * count / settings.filter_driver_change_division)
                .round()
        };
        let (from, to) = (to_knob(previous), to_knob(current));
        log::info!("Master filter for {current} place changes: {from} -> {to}");
        if self.is_active(targets::MASTER_FILTER) {
            log::info!("Already running a master filter change");
            return Ok(());
        }

        let (up, down) = (self.random_sweep(), self.random_sweep());
        let surface = Arc::clone(&self.surface);
        let request = TransitionRequest::new(targets::MASTER_FILTER, from, to, up)
            .on_progress(Self::sweep_parameters(
                &self.surface,
                std::slice::from_ref(&devices::MASTER_FILTER),
            ))
            .on_complete(move |scheduler| {
                scheduler.start(
                    TransitionRequest::new(targets::MASTER_FILTER, to, 0.0, down)
                        .on_progress(Self::sweep_parameters(
                            &surface,
                            std::slice::from_ref(&devices::MASTER_FILTER),
                        )),
                );
            });
        self.start(ctx.now, request);
        Ok(())
    }

    fn watch_pit_filters(
        &mut self,
        ctx: &CycleContext,
        store: &mut SnapshotStore,
    ) -> Result<(), InvariantError> {
        let families: [(&str, &str, &str, &'static [ParameterAddress]); 2] = [
            (
                keys::PIT_STATUS,
                checks::PIT_FILTER,
                targets::PIT_FILTER,
                &devices::PIT_FILTERS,
            ),
            (
                keys::PIT_OUT,
                checks::PIT_OUT_FILTER,
                targets::PIT_OUT_FILTER,
                &devices::PIT_OUT_FILTERS,
            ),
        ];
        for (key, check_id, target, addresses) in families {
            let detection = store.check_changed(key, check_id, true)?;
            if !detection.is_changed() {
                continue;
            }
            let current = store.get_f64(key, 0.0);
            let previous = detection.as_f64().unwrap_or(current);
            if self.is_active(target) {
                log::info!("Already running a {target} change");
                continue;
            }
            let (from, to) = (
                (previous * PIT_FILTER_SCALE).round(),
                (current * PIT_FILTER_SCALE).round(),
            );
            let duration = self.random_sweep();
            log::info!("Sweeping {target}: {from} -> {to}");
            self.start(
                ctx.now,
                TransitionRequest::new(target, from, to, duration)
                    .on_progress(Self::sweep_parameters(&self.surface, addresses)),
            );
        }
        Ok(())
    }

    // Lead-car lap time sets the tempo, starting from what the tool reports.
    fn watch_tempo(
        &mut self,
        ctx: &CycleContext,
        store: &mut SnapshotStore,
    ) -> Result<(), InvariantError> {
        let changed = store
            .check_changed(keys::FIRST_CAR_LAB_TIME, checks::TEMPO, true)?
            .is_changed();
        let forced = self.settings_changed_for(TEMPO_WATCHER, ctx.settings_generation);
        if !(changed || forced) || self.is_active(targets::TEMPO) {
            return Ok(());
        }
        let settings = ctx.settings;
        let lap_time = store.get_f64(keys::FIRST_CAR_LAB_TIME, 0.0);
        let bpm = settings.clamp_bpm((lap_time / settings.bpm_divider).round());
        let current = match self.surface.tempo() {
            Ok(current) => current,
            Err(e) => {
                log::error!("Couldn't read tempo: {e}");
                return Ok(());
            }
        };
        log::info!("Changing tempo {current} -> {bpm}");
        let surface = Arc::clone(&self.surface);
        self.start(
            ctx.now,
            TransitionRequest::new(targets::TEMPO, current, bpm, TEMPO_SWEEP).on_progress(
                move |value| {
                    report(surface.set_tempo(hundredths(value)));
                },
            ),
        );
        Ok(())
    }

    fn set_current_scene(
        &mut self,
        ctx: &CycleContext,
        store: &mut SnapshotStore,
    ) -> Result<(), InvariantError> {
        let settings = ctx.settings;
        let chequered = store.get(keys::FLAG).and_then(|v| v.as_i64())
            == Some(u8::from(FlagState::Chequered) as i64);
        if chequered && !store.get_flag(keys::LAST_TRACK) {
            log::info!("Chequered flag: playing the last track");
            store.set(keys::LAST_TRACK, true);
            store.set(keys::MUSIC_LAB, settings.ending_music_track - 1);
        }

        if ctx.first_cycle {
            if let Some(scene) = store.get(keys::MUSIC_LAB).and_then(|v| v.as_i64()) {
                log::info!("Resuming at scene {scene}");
                report(self.surface.play_scene(scene));
            }
        }

        let scene = if store.get_flag(keys::LAST_TRACK)
            || store.get_flag(keys::SAFETY_CAR)
            || settings.auto_play
        {
            self.scenes.auto_play(store, settings, &mut self.rng)
        } else if store
            .check_changed(keys::CURRENT_LAB, checks::MUSIC_LAB, false)?
            .is_changed()
        {
            self.scenes.next_scene(store, settings, &mut self.rng)
        } else {
            None
        };
        if let Some(scene) = scene {
            report(self.surface.play_scene(scene));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use more_asserts::{assert_ge, assert_lt};
    use trackwave_core::{
        race::{Car, DriverStatus},
        types::Scene,
    };
    use trackwave_services::{RecordingSurface, SurfaceAction};

    const SPEAKER_TRACK: u32 = 17;

    fn clip(id: u32, name: &str) -> (u32, Clip) {
        (
            SPEAKER_TRACK,
            Clip {
                id,
                name: name.to_string(),
            },
        )
    }

    fn surface() -> Arc<RecordingSurface> {
        let scenes = (0..6)
            .map(|id| Scene {
                id,
                name: format!("{:02} song", id / 2 + 1),
            })
            .collect();
        Arc::new(RecordingSurface::new_with(
            scenes,
            vec![
                clip(0, cues::GREEN_FLAG),
                clip(1, cues::YELLOW_FLAG),
                clip(2, cues::SAFETY_CAR),
                clip(3, "Porsche-1"),
                clip(4, cues::IN_PIT),
                clip(5, cues::TAKES_THE_LEAD),
                clip(6, "hours-3"),
                clip(7, "Porsche-1-neel-jani-driving"),
            ],
        ))
    }

    struct Fixture {
        surface: Arc<RecordingSurface>,
        scheduler: Arc<Mutex<TransitionScheduler>>,
        dispatcher: ActionDispatcher,
        store: SnapshotStore,
        settings: ShowSettings,
        now: Instant,
    }
    impl Fixture {
        fn new() -> Self {
            let surface = surface();
            let scheduler: Arc<Mutex<TransitionScheduler>> = Default::default();
            let dispatcher = ActionDispatcher::new_with(
                surface.clone(),
                Arc::clone(&scheduler),
                SpeakerRegistry::default(),
                Rng::new_with_seed(99),
            )
            .unwrap();
            Self {
                surface,
                scheduler,
                dispatcher,
                store: SnapshotStore::default(),
                settings: ShowSettings::default(),
                now: Instant::now(),
            }
        }

        fn dispatch(&mut self, snapshot: &RaceSnapshot, first_cycle: bool) {
            let ctx = CycleContext {
                now: self.now,
                settings: &self.settings,
                settings_generation: 0,
                first_cycle,
            };
            self.dispatcher
                .dispatch(&ctx, &mut self.store, snapshot)
                .unwrap();
        }

        fn played_clips(&self) -> Vec<u32> {
            self.surface
                .take_journal()
                .into_iter()
                .filter_map(|action| match action {
                    SurfaceAction::PlayClip { clip, .. } => Some(clip),
                    _ => None,
                })
                .collect()
        }

        fn advance(&mut self, by: Duration) {
            self.now += by;
            self.scheduler.lock().unwrap().update(self.now);
        }
    }

    fn context(settings: &ShowSettings, now: Instant, first_cycle: bool) -> CycleContext<'_> {
        CycleContext {
            now,
            settings,
            settings_generation: 0,
            first_cycle,
        }
    }

    #[test]
    fn loads_scenes_and_speaker_clips() {
        let fixture = Fixture::new();
        assert_eq!(fixture.dispatcher.scene_book().max_scenes(), 6);
        assert_eq!(fixture.dispatcher.scene_book().restart_points(), &[0, 2, 4]);
    }

    #[test]
    fn flag_changes_play_flag_clips() {
        let mut fixture = Fixture::new();
        let snapshot = RaceSnapshot::default();

        fixture.store.set(keys::FLAG, 2i64);
        fixture.dispatch(&snapshot, false);
        assert_eq!(fixture.played_clips(), vec![0]);

        // Unchanged flag: nothing.
        fixture.dispatch(&snapshot, false);
        assert!(fixture.played_clips().is_empty());

        fixture.store.set(keys::FLAG, 6i64);
        fixture.dispatch(&snapshot, false);
        assert_eq!(fixture.played_clips(), vec![1]);

        // Red flag only logs.
        fixture.store.set(keys::FLAG, 3i64);
        fixture.dispatch(&snapshot, false);
        assert!(fixture.played_clips().is_empty());

        // No flag clips during the last track.
        fixture.store.set(keys::LAST_TRACK, true);
        fixture.store.set(keys::FLAG, 5i64);
        fixture.dispatch(&snapshot, false);
        assert!(fixture.played_clips().is_empty());
    }

    #[test]
    fn safety_car_plays_only_when_deployed() {
        let mut fixture = Fixture::new();
        let snapshot = RaceSnapshot::default();
        fixture.store.set(keys::SAFETY_CAR, false);
        fixture.dispatch(&snapshot, false);
        assert!(fixture.played_clips().is_empty());

        fixture.store.set(keys::SAFETY_CAR, true);
        fixture.dispatch(&snapshot, false);
        assert_eq!(fixture.played_clips(), vec![2]);
    }

    #[test]
    fn pit_driver_is_announced_then_followed_up() {
        let mut fixture = Fixture::new();
        let snapshot = RaceSnapshot {
            cars: vec![
                Car {
                    number: 7,
                    ..Default::default()
                },
                Car {
                    number: 1,
                    driver_status: DriverStatus::PitIn,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        fixture.store.set(keys::PIT_DRIVER, 1usize);
        fixture.dispatch(&snapshot, false);
        assert_eq!(fixture.played_clips(), vec![3]);
        assert!(fixture
            .scheduler
            .lock()
            .unwrap()
            .is_active(&targets::cue(cues::IN_PIT)));

        fixture.advance(Duration::from_secs(2));
        assert!(fixture.played_clips().is_empty());
        fixture.advance(Duration::from_secs(2));
        assert_eq!(fixture.played_clips(), vec![4]);
    }

    #[test]
    fn announcements_are_quiet_on_first_cycle() {
        let mut fixture = Fixture::new();
        fixture.store.set(keys::FIRST_PLACE, 1i64);
        fixture.store.set(keys::HOUR_LEFT, 3i64);
        fixture.dispatch(&RaceSnapshot::default(), true);
        assert!(fixture.played_clips().is_empty());

        // Acknowledged silently, so the next cycle doesn't catch up.
        fixture.dispatch(&RaceSnapshot::default(), false);
        assert!(fixture.played_clips().is_empty());

        fixture.store.set(keys::HOUR_LEFT, 4i64);
        fixture.dispatch(&RaceSnapshot::default(), false);
        // No hours-4 clip exists; skipped.
        assert!(fixture.played_clips().is_empty());
    }

    #[test]
    fn lead_change_and_driver_name() {
        let mut fixture = Fixture::new();
        fixture.store.set(keys::FIRST_PLACE, 2i64);
        fixture.store.set(keys::FIRST_DRIVER_CHANGE, "Neel");
        fixture.dispatch(&RaceSnapshot::default(), false);
        // Car 2 has a registry entry but no clip on the track, so neither it
        // nor its follow-up plays. The driver clip does.
        assert_eq!(fixture.played_clips(), vec![7]);

        fixture.store.set(keys::FIRST_PLACE, 1i64);
        fixture.dispatch(&RaceSnapshot::default(), false);
        assert_eq!(fixture.played_clips(), vec![3]);
        fixture.advance(CUE_DELAY);
        assert_eq!(fixture.played_clips(), vec![5]);
    }

    #[test]
    fn drums_follow_wind_and_settings() {
        let mut fixture = Fixture::new();
        fixture.settings.kick_max_value = 100.0;
        fixture.settings.kick_wind_speed_divider = 20.0;
        fixture.store.set(keys::WIND_DIRECTION, 180.0);
        fixture.store.set(keys::WIND_SPEED, 5.0);
        let ctx = context(&fixture.settings, fixture.now, false);
        fixture
            .dispatcher
            .apply_drums(&ctx, &mut fixture.store)
            .unwrap();
        assert_eq!(
            fixture.surface.take_journal(),
            vec![
                SurfaceAction::SetParameter {
                    address: devices::SNARE,
                    value: 64.0
                },
                SurfaceAction::SetParameter {
                    address: devices::KICK,
                    value: 25.0
                },
            ]
        );

        // Same values, same settings generation: nothing.
        let ctx = context(&fixture.settings, fixture.now, false);
        fixture
            .dispatcher
            .apply_drums(&ctx, &mut fixture.store)
            .unwrap();
        assert!(fixture.surface.take_journal().is_empty());

        // A settings reload re-applies both.
        let ctx = CycleContext {
            settings_generation: 1,
            ..context(&fixture.settings, fixture.now, false)
        };
        fixture
            .dispatcher
            .apply_drums(&ctx, &mut fixture.store)
            .unwrap();
        assert_eq!(fixture.surface.take_journal().len(), 2);
    }

    #[test]
    fn master_filter_sweeps_up_then_closes() {
        let mut fixture = Fixture::new();
        fixture.settings.filter_driver_change_division = 10.0;
        fixture.settings.master_filter_max_val = 100.0;
        fixture.store.set(keys::NUMBER_OF_PLACE_CHANGES, 1.0);
        let ctx = context(&fixture.settings, fixture.now, false);
        fixture
            .dispatcher
            .watch_master_filter(&ctx, &mut fixture.store)
            .unwrap();
        // The first pass is forced by the initial settings generation and
        // sweeps in place.
        fixture.advance(Duration::from_millis(SWEEP_MAX_MS));
        fixture.advance(Duration::from_millis(SWEEP_MAX_MS));
        assert!(!fixture
            .scheduler
            .lock()
            .unwrap()
            .is_active(targets::MASTER_FILTER));
        fixture.surface.take_journal();

        fixture.store.set(keys::NUMBER_OF_PLACE_CHANGES, 5.0);
        let ctx = context(&fixture.settings, fixture.now, false);
        fixture
            .dispatcher
            .watch_master_filter(&ctx, &mut fixture.store)
            .unwrap();
        {
            let scheduler = fixture.scheduler.lock().unwrap();
            let sweep = scheduler.transition(targets::MASTER_FILTER).unwrap();
            assert_eq!(sweep.from, 10.0);
            assert_eq!(sweep.to, 50.0);
            assert_ge!(sweep.duration, Duration::from_millis(SWEEP_MIN_MS));
            assert_lt!(sweep.duration, Duration::from_millis(SWEEP_MAX_MS));
        }

        // A change during the sweep is acknowledged but doesn't restart it.
        fixture.store.set(keys::NUMBER_OF_PLACE_CHANGES, 9.0);
        let ctx = context(&fixture.settings, fixture.now, false);
        fixture
            .dispatcher
            .watch_master_filter(&ctx, &mut fixture.store)
            .unwrap();
        assert_eq!(
            fixture
                .scheduler
                .lock()
                .unwrap()
                .transition(targets::MASTER_FILTER)
                .unwrap()
                .to,
            50.0
        );

        // Up, then the chained sweep back down to closed.
        fixture.advance(Duration::from_millis(SWEEP_MAX_MS));
        {
            let scheduler = fixture.scheduler.lock().unwrap();
            let sweep = scheduler.transition(targets::MASTER_FILTER).unwrap();
            assert_eq!(sweep.from, 50.0);
            assert_eq!(sweep.to, 0.0);
        }
        let journal = fixture.surface.take_journal();
        assert!(journal.iter().all(|action| matches!(
            action,
            SurfaceAction::SetParameter { address, .. } if *address == devices::MASTER_FILTER
        )));
        assert!(!journal.is_empty());
    }

    #[test]
    fn pit_filters_sweep_from_old_count() {
        let mut fixture = Fixture::new();
        fixture.store.set(keys::PIT_STATUS, 1u64);
        fixture.store.set(keys::PIT_OUT, 0u64);
        let ctx = context(&fixture.settings, fixture.now, false);
        fixture
            .dispatcher
            .watch_pit_filters(&ctx, &mut fixture.store)
            .unwrap();
        fixture.advance(Duration::from_millis(SWEEP_MAX_MS));
        fixture.surface.take_journal();

        fixture.store.set(keys::PIT_STATUS, 3u64);
        let ctx = context(&fixture.settings, fixture.now, false);
        fixture
            .dispatcher
            .watch_pit_filters(&ctx, &mut fixture.store)
            .unwrap();
        let scheduler = fixture.scheduler.lock().unwrap();
        let sweep = scheduler.transition(targets::PIT_FILTER).unwrap();
        assert_eq!((sweep.from, sweep.to), (20.0, 60.0));
        assert!(!scheduler.is_active(targets::PIT_OUT_FILTER));
    }

    #[test]
    fn tempo_ramps_from_reported_tempo_within_bounds() {
        let mut fixture = Fixture::new();
        fixture.store.set(keys::FIRST_CAR_LAB_TIME, 210_000.0);
        let ctx = context(&fixture.settings, fixture.now, false);
        fixture
            .dispatcher
            .watch_tempo(&ctx, &mut fixture.store)
            .unwrap();
        {
            let scheduler = fixture.scheduler.lock().unwrap();
            let ramp = scheduler.transition(targets::TEMPO).unwrap();
            assert_eq!(ramp.from, RecordingSurface::DEFAULT_TEMPO);
            assert_eq!(ramp.to, 160.0);
            assert_eq!(ramp.duration, TEMPO_SWEEP);
        }

        fixture.advance(TEMPO_SWEEP / 2);
        let tempo = fixture.surface.tempo().unwrap();
        assert!(approx_eq!(f64, tempo, 140.0, epsilon = 0.01));
        fixture.advance(TEMPO_SWEEP / 2);
        assert_eq!(fixture.surface.tempo().unwrap(), 160.0);
    }

    #[test]
    fn settings_reload_reapplies_tempo_and_master_filter() {
        let mut fixture = Fixture::new();
        fixture.settings.filter_driver_change_division = 10.0;
        fixture.settings.master_filter_max_val = 100.0;
        fixture.store.set(keys::FIRST_CAR_LAB_TIME, 210_000.0);
        fixture.store.set(keys::NUMBER_OF_PLACE_CHANGES, 1.0);
        let ctx = context(&fixture.settings, fixture.now, false);
        fixture
            .dispatcher
            .watch_master_filter(&ctx, &mut fixture.store)
            .unwrap();
        fixture
            .dispatcher
            .watch_tempo(&ctx, &mut fixture.store)
            .unwrap();
        fixture.advance(Duration::from_millis(SWEEP_MAX_MS));
        fixture.advance(Duration::from_millis(SWEEP_MAX_MS));
        fixture.surface.take_journal();

        // Nothing changed and the settings didn't either.
        let ctx = context(&fixture.settings, fixture.now, false);
        fixture
            .dispatcher
            .watch_master_filter(&ctx, &mut fixture.store)
            .unwrap();
        fixture
            .dispatcher
            .watch_tempo(&ctx, &mut fixture.store)
            .unwrap();
        assert!(fixture.scheduler.lock().unwrap().is_empty());

        // A new settings generation sends both again from the current values.
        let settings = fixture.settings.clone();
        let ctx = CycleContext {
            settings_generation: 1,
            ..context(&settings, fixture.now, false)
        };
        fixture
            .dispatcher
            .watch_master_filter(&ctx, &mut fixture.store)
            .unwrap();
        fixture
            .dispatcher
            .watch_tempo(&ctx, &mut fixture.store)
            .unwrap();
        {
            let scheduler = fixture.scheduler.lock().unwrap();
            let sweep = scheduler.transition(targets::MASTER_FILTER).unwrap();
            assert_eq!((sweep.from, sweep.to), (10.0, 10.0));
            let ramp = scheduler.transition(targets::TEMPO).unwrap();
            assert_eq!((ramp.from, ramp.to), (160.0, 160.0));
        }

        // Only once per generation.
        fixture.advance(Duration::from_millis(SWEEP_MAX_MS));
        fixture.advance(Duration::from_millis(SWEEP_MAX_MS));
        fixture
            .dispatcher
            .watch_master_filter(&ctx, &mut fixture.store)
            .unwrap();
        fixture
            .dispatcher
            .watch_tempo(&ctx, &mut fixture.store)
            .unwrap();
        assert!(fixture.scheduler.lock().unwrap().is_empty());
    }

    #[test]
    fn scene_advances_on_lap_change() {
        let mut fixture = Fixture::new();
        fixture.store.set(keys::CURRENT_LAB, 1.5);
        let ctx = context(&fixture.settings, fixture.now, false);
        fixture
            .dispatcher
            .set_current_scene(&ctx, &mut fixture.store)
            .unwrap();
        assert_eq!(
            fixture.surface.take_journal(),
            vec![SurfaceAction::PlayScene(0)]
        );

        // No lap change, no advance.
        let ctx = context(&fixture.settings, fixture.now, false);
        fixture
            .dispatcher
            .set_current_scene(&ctx, &mut fixture.store)
            .unwrap();
        assert!(fixture.surface.take_journal().is_empty());

        fixture.store.set(keys::CURRENT_LAB, 1.6);
        let ctx = context(&fixture.settings, fixture.now, false);
        fixture
            .dispatcher
            .set_current_scene(&ctx, &mut fixture.store)
            .unwrap();
        assert_eq!(
            fixture.surface.take_journal(),
            vec![SurfaceAction::PlayScene(1)]
        );
    }

    #[test]
    fn chequered_flag_jumps_to_ending_and_resumes() {
        let mut fixture = Fixture::new();
        fixture.settings.ending_music_track = 4;
        fixture.store.set(keys::FLAG, 4i64);
        let ctx = context(&fixture.settings, fixture.now, true);
        fixture
            .dispatcher
            .set_current_scene(&ctx, &mut fixture.store)
            .unwrap();
        assert!(fixture.store.get_flag(keys::LAST_TRACK));
        // Resume replays scene 3; the first autoplay trigger advances to 4.
        assert_eq!(
            fixture.surface.take_journal(),
            vec![SurfaceAction::PlayScene(3), SurfaceAction::PlayScene(4)]
        );
    }

    #[test]
    fn empty_check_id_is_fatal() {
        let mut store = SnapshotStore::default();
        assert_eq!(
            store.check_changed(keys::FLAG, "", false),
            Err(InvariantError {
                key: keys::FLAG.to_string()
            })
        );
    }
}

// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! Choosing which scene of the live set plays next.

use trackwave_core::{
    derive::keys, rng::Rng, settings::ShowSettings, store::SnapshotStore, types::Scene,
};

/// The playable part of the live set. Only scenes whose names start with two
/// digits count. A "restart point" is a scene whose name differs from the
/// counted scene before it, i.e., the first scene of each song.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneBook {
    max_scenes: i64,
    restart_points: Vec<i64>,
}
impl SceneBook {
    #[allow(missing_docs)]
    pub fn from_scenes(scenes: &[Scene]) -> Self {
        let counted: Vec<&Scene> = scenes
            .iter()
            .filter(|scene| {
                let mut chars = scene.name.chars();
                matches!((chars.next(), chars.next()), (Some(a), Some(b)) if a.is_ascii_digit() && b.is_ascii_digit())
            })
            .collect();

        let mut restart_points = Vec::default();
        let mut last_name: Option<&str> = None;
        for scene in counted.iter() {
            if last_name != Some(scene.name.as_str()) {
                restart_points.push(scene.id);
            }
            last_name = Some(scene.name.as_str());
        }

        Self {
            max_scenes: counted.len() as i64,
            restart_points,
        }
    }

    #[allow(missing_docs)]
    pub fn max_scenes(&self) -> i64 {
        self.max_scenes
    }

    #[allow(missing_docs)]
    pub fn restart_points(&self) -> &[i64] {
        &self.restart_points
    }
}

/// Walks the [SceneBook]. The current scene is the store's `musicLab`, so the
/// walk survives a restart.
#[derive(Debug)]
pub struct SceneAdvance {
    book: SceneBook,
    autotimes: u64,
    // Negative until the first autoplay trigger, which always advances.
    triggers_since_advance: i64,
}
impl SceneAdvance {
    #[allow(missing_docs)]
    pub fn new_with(book: SceneBook, rng: &mut Rng) -> Self {
        Self {
            book,
            autotimes: Self::roll_autotimes(rng, ShowSettings::default().auto_times),
            triggers_since_advance: -1,
        }
    }

    #[allow(missing_docs)]
    pub fn book(&self) -> &SceneBook {
        &self.book
    }

    /// How many autoplay triggers the current scene waits before advancing.
    pub fn autotimes(&self) -> u64 {
        self.autotimes
    }

    fn roll_autotimes(rng: &mut Rng, auto_times: u64) -> u64 {
        rng.rand_range(1..auto_times + 1)
    }

    /// Advances `musicLab` and returns the scene to play, or `None` once the
    /// last-track run has passed [ShowSettings::stop_music_track].
    ///
    /// Past the end of the book (or right away with
    /// [ShowSettings::track_overflow]) the walk enters overflow mode and
    /// stays there: whenever the next scene would start a new song, or would
    /// be past the end, it jumps to a randomly chosen restart point instead.
    pub fn next_scene(
        &mut self,
        store: &mut SnapshotStore,
        settings: &ShowSettings,
        rng: &mut Rng,
    ) -> Option<i64> {
        let current = store
            .get(keys::MUSIC_LAB)
            .and_then(|v| v.as_i64())
            .unwrap_or(-1);
        let mut next = current + 1;
        let last_track = store.get_flag(keys::LAST_TRACK);

        if (next > self.book.max_scenes || settings.track_overflow)
            && !store.get_flag(keys::MAX_TRACKS_OVERFLOW)
        {
            log::info!("Scene overflow enabled");
            store.set(keys::MAX_TRACKS_OVERFLOW, true);
        }

        if store.get_flag(keys::MAX_TRACKS_OVERFLOW) && !last_track {
            let at_song_boundary = self
                .book
                .restart_points
                .iter()
                .any(|point| point - 1 == current);
            if at_song_boundary || next > self.book.max_scenes {
                if let Some(point) = rng.choose(&self.book.restart_points) {
                    next = *point;
                }
            }
        }

        if last_track && next > settings.stop_music_track {
            log::info!("Last track reached its stop scene ({current}); holding");
            return None;
        }

        log::info!("Playing scene {next}");
        store.set(keys::MUSIC_LAB, next);
        self.autotimes = Self::roll_autotimes(rng, settings.auto_times);
        Some(next)
    }

    /// Autoplay advances only every few triggers. Returns the scene to play
    /// if this trigger advances.
    pub fn auto_play(
        &mut self,
        store: &mut SnapshotStore,
        settings: &ShowSettings,
        rng: &mut Rng,
    ) -> Option<i64> {
        log::debug!(
            "Autoplay: {} of {} triggers",
            self.triggers_since_advance,
            self.autotimes
        );
        if self.triggers_since_advance < 0 || self.triggers_since_advance as u64 >= self.autotimes
        {
            self.triggers_since_advance = 0;
            self.next_scene(store, settings, rng)
        } else {
            self.triggers_since_advance += 1;
            None
        }
    }
}

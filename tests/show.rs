// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! Plays recorded races end to end against a dry-run music tool.

use std::{
    io::Write,
    path::Path,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use trackwave::{
    prelude::*,
    services::{IngestService, SurfaceAction},
    transition::TransitionScheduler,
};

fn scenes() -> Vec<Scene> {
    ["00 warmup", "01 start", "01 start", "02 night", "02 night", "03 dawn"]
        .iter()
        .enumerate()
        .map(|(id, name)| Scene {
            id: id as i64,
            name: name.to_string(),
        })
        .collect()
}

fn speaker_clips() -> Vec<(u32, Clip)> {
    ["green-flag", "yellow-flag", "Safety-car", "Porsche-1", "in-pit"]
        .iter()
        .enumerate()
        .map(|(id, name)| {
            (
                17,
                Clip {
                    id: id as u32,
                    name: name.to_string(),
                },
            )
        })
        .collect()
}

fn car(number: u32, laps: f64, status: DriverStatus) -> Car {
    Car {
        number,
        laps,
        category: LEAD_CATEGORY.to_string(),
        driver_status: status,
        average_speed: 180.0,
        last_lap_time_ms: 100_000.0,
        ..Default::default()
    }
}

fn frame(laps: f64, flag: FlagState, pitting: bool) -> RaceSnapshot {
    let mut snapshot = RaceSnapshot {
        cars: vec![
            car(1, laps, DriverStatus::Running),
            car(7, laps - 1.0, DriverStatus::Running),
        ],
        ..Default::default()
    };
    if pitting {
        snapshot.cars[0].driver_status = DriverStatus::PitIn;
    }
    snapshot.track.flag = flag;
    snapshot.track.remaining_time_seconds = 5 * 3600;
    snapshot
}

fn player(dir: &Path, surface: &Arc<RecordingSurface>) -> Player {
    let dispatcher = ActionDispatcher::new_with(
        surface.clone(),
        Arc::new(Mutex::new(TransitionScheduler::default())),
        SpeakerRegistry::default(),
        Rng::new_with_seed(2024),
    )
    .unwrap();
    Player::new_with(
        dispatcher,
        SettingsWatcher::new_with(dir.join("settings.json")),
        Persistence::new_with(dir.join("playdata2.json")),
        SpeakerRegistry::default(),
    )
    .unwrap()
}

fn clips_played(journal: &[SurfaceAction]) -> Vec<u32> {
    journal
        .iter()
        .filter_map(|action| match action {
            SurfaceAction::PlayClip { clip, .. } => Some(*clip),
            _ => None,
        })
        .collect()
}

fn scenes_played(journal: &[SurfaceAction]) -> Vec<i64> {
    journal
        .iter()
        .filter_map(|action| match action {
            SurfaceAction::PlayScene(scene) => Some(*scene),
            _ => None,
        })
        .collect()
}

#[test]
fn replayed_race_runs_to_the_end() {
    let dir = tempfile::tempdir().unwrap();
    let recording = vec![
        frame(1.0, FlagState::TrackOff, false),
        frame(1.0, FlagState::Green, false),
        frame(2.0, FlagState::Green, true),
    ];
    let path = dir.path().join("race.json");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(serde_json::to_string(&recording).unwrap().as_bytes())
        .unwrap();

    let surface = Arc::new(RecordingSurface::new_with(scenes(), speaker_clips()));
    let mut player = player(dir.path(), &surface);
    let ingest = IngestService::new_with(
        Box::new(RecordedFeed::load(&path, 1).unwrap()),
        Duration::from_millis(20),
    );
    player
        .run(ingest.receiver(), &crossbeam_channel::never())
        .unwrap();
    ingest.exit();

    let journal = surface.take_journal();
    // Green flag, then car 1 pits. Its follow-up is still waiting.
    assert_eq!(clips_played(&journal), vec![0, 3]);
    // Only the startup trigger moved the scene.
    assert_eq!(scenes_played(&journal), vec![0]);
    assert_eq!(player.store().get_f64(keys::CURRENT_SEC, 0.0), 3.0);

    let saved = std::fs::read_to_string(dir.path().join("playdata2.json")).unwrap();
    assert!(saved.contains("\"musicLab\":0"));
}

#[test]
fn restart_resumes_without_repeating_itself() {
    let dir = tempfile::tempdir().unwrap();
    let t0 = Instant::now();

    let surface = Arc::new(RecordingSurface::new_with(scenes(), speaker_clips()));
    {
        let mut player = player(dir.path(), &surface);
        player
            .run_cycle(t0, &frame(3.0, FlagState::Green, false), None)
            .unwrap();
        player
            .run_cycle(
                t0 + Duration::from_secs(1),
                &frame(4.0, FlagState::Yellow, false),
                None,
            )
            .unwrap();
        assert!(player.on_midi_note(t0 + Duration::from_secs(2)).unwrap());
    }
    let journal = surface.take_journal();
    assert_eq!(clips_played(&journal), vec![0, 1]);
    assert_eq!(scenes_played(&journal), vec![0, 1]);

    // The process restarts with the same state file. It picks the set back
    // up at scene 1 and, since nothing changed, says nothing.
    let surface = Arc::new(RecordingSurface::new_with(scenes(), speaker_clips()));
    let mut player = player(dir.path(), &surface);
    assert_eq!(player.store().get_f64(keys::MUSIC_LAB, -1.0), 1.0);
    let t1 = t0 + Duration::from_secs(60);
    player
        .run_cycle(t1, &frame(4.0, FlagState::Yellow, false), None)
        .unwrap();
    let journal = surface.take_journal();
    assert!(clips_played(&journal).is_empty());
    assert_eq!(scenes_played(&journal), vec![1]);
}

#[test]
fn chequered_flag_hands_over_to_autoplay() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("settings.json"),
        r#"{"endingMusicTrack": 5, "stopMusicTrack": 5, "autoTimes": 1}"#,
    )
    .unwrap();
    let surface = Arc::new(RecordingSurface::new_with(scenes(), speaker_clips()));
    let mut player = player(dir.path(), &surface);
    let t0 = Instant::now();

    player
        .run_cycle(t0, &frame(10.0, FlagState::Chequered, false), None)
        .unwrap();
    assert!(player.store().get_flag(keys::LAST_TRACK));
    let journal = surface.take_journal();
    // Resume at the ending scene's predecessor, then autoplay's first step.
    assert_eq!(scenes_played(&journal), vec![4, 5]);
    // No flag clips once the last track is playing.
    assert!(clips_played(&journal).is_empty());

    // Past the stop scene, triggers change nothing.
    for i in 1..=4 {
        player
            .on_midi_note(t0 + Duration::from_secs(2 * i))
            .unwrap();
    }
    assert!(scenes_played(&surface.take_journal()).is_empty());
    assert_eq!(player.store().get_f64(keys::MUSIC_LAB, -1.0), 5.0);
}

// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! Plays a race. Polls the timing feed (or replays a recording) and drives
//! the music tool from what it sees.

use clap::Parser;
use std::{path::PathBuf, sync::Arc, time::Duration};
use trackwave::{
    app_version,
    prelude::*,
    services::{MidiPortNames, TransitionService},
};

/// The program's command-line arguments.
#[derive(clap::Parser, Debug)]
#[clap(author, about, long_about = None)]
struct Args {
    /// Live timing feed
    #[clap(long, default_value = "http://192.168.1.34:3000")]
    endpoint: String,

    /// Replay a recorded session (JSON array of snapshots) instead of the
    /// live feed
    #[clap(long)]
    replay: Option<PathBuf>,

    /// Recorded frames to advance per poll
    #[clap(long, default_value_t = 1)]
    replay_step: usize,

    /// Show settings file, reloaded whenever it changes
    #[clap(long, default_value = SettingsWatcher::DEFAULT_FILENAME)]
    settings: PathBuf,

    /// Where to keep state across restarts
    #[clap(long, default_value = Persistence::DEFAULT_FILENAME)]
    state: PathBuf,

    /// Base URL of the music tool's bridge. Without it, actions are only
    /// logged.
    #[clap(long)]
    surface: Option<String>,

    /// Seed for jittered timing, for reproducible runs
    #[clap(long)]
    seed: Option<u128>,

    /// Milliseconds between polls
    #[clap(long, default_value_t = 1000)]
    poll_ms: u64,

    /// Milliseconds between transition updates
    #[clap(long, default_value_t = 100)]
    tick_ms: u64,

    /// Name of the virtual MIDI input port
    #[clap(long)]
    midi_in: Option<String>,

    /// Name of the virtual MIDI output port
    #[clap(long)]
    midi_out: Option<String>,

    /// Don't open MIDI ports
    #[clap(long)]
    no_midi: bool,

    /// Print version and exit
    #[clap(short = 'v', long)]
    version: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.version {
        eprintln!("{}", app_version());
        return Ok(());
    }
    log::info!("trackwave {}", app_version());

    let surface: Arc<dyn ControlSurface> = match args.surface.as_ref() {
        Some(url) => {
            log::info!("Driving the music tool at {url}");
            Arc::new(HttpSurface::new_with(url))
        }
        None => {
            log::warn!("No --surface given; actions will only be logged");
            Arc::new(RecordingSurface::default())
        }
    };

    let seed = match args.seed {
        Some(seed) => seed,
        None => Rng::generate_seed()?,
    };
    log::debug!("RNG seed {seed}");

    let transitions = TransitionService::new_with(Duration::from_millis(args.tick_ms));
    let speakers = SpeakerRegistry::default();
    let dispatcher = ActionDispatcher::new_with(
        surface,
        transitions.scheduler(),
        speakers.clone(),
        Rng::new_with_seed(seed),
    )?;
    let mut player = Player::new_with(
        dispatcher,
        SettingsWatcher::new_with(args.settings),
        Persistence::new_with(args.state),
        speakers,
    )?;

    let source: Box<dyn TelemetrySource> = match args.replay.as_ref() {
        Some(path) => Box::new(RecordedFeed::load(path, args.replay_step)?),
        None => {
            log::info!("Polling {}", args.endpoint);
            Box::new(LiveFeed::new_with(&args.endpoint))
        }
    };
    let ingest = IngestService::new_with(source, Duration::from_millis(args.poll_ms));

    let mut midi = if args.no_midi {
        None
    } else {
        let defaults = MidiPortNames::default();
        let names = MidiPortNames {
            input: args.midi_in.unwrap_or(defaults.input),
            output: args.midi_out.unwrap_or(defaults.output),
        };
        match MidiService::new_with(names) {
            Ok(service) => Some(service),
            Err(e) => {
                log::error!("Continuing without MIDI: {e:?}");
                None
            }
        }
    };
    let no_midi = crossbeam_channel::never();
    let midi_events = midi.as_ref().map_or(&no_midi, |service| service.receiver());

    let result = player.run(ingest.receiver(), midi_events);

    ingest.exit();
    transitions.exit();
    if let Some(midi) = midi.as_mut() {
        midi.exit();
    }
    result?;
    Ok(())
}

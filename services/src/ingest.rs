// Copyright (c) 2024 Mike Tsao. All rights reserved.

use crate::{channel_pair::ChannelPair, traits::ProvidesService};
use crossbeam_channel::{Receiver, Sender};
use std::{path::Path, time::Duration};
use trackwave_core::{error::IngestError, race::RaceSnapshot, traits::TelemetrySource};

/// Polls the live timing server over HTTP.
#[derive(Debug)]
pub struct LiveFeed {
    endpoint: String,
    agent: ureq::Agent,
}
impl LiveFeed {
    #[allow(missing_docs)]
    pub fn new_with(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            agent: ureq::Agent::new_with_defaults(),
        }
    }
}
impl TelemetrySource for LiveFeed {
    fn fetch(&mut self) -> Result<RaceSnapshot, IngestError> {
        let response = self
            .agent
            .get(&self.endpoint)
            .call()
            .map_err(|e| IngestError::Unreachable(e.to_string()))?;
        response
            .into_body()
            .read_json::<RaceSnapshot>()
            .map_err(|e| IngestError::Malformed(e.to_string()))
    }
}

/// Replays a recorded session: a JSON array of snapshots, one per second of
/// race time. Each fetch advances `step` frames.
#[derive(Debug, Default)]
pub struct RecordedFeed {
    frames: Vec<RaceSnapshot>,
    step: usize,
    next: usize,
    position: Option<usize>,
}
impl RecordedFeed {
    #[allow(missing_docs)]
    pub fn new_with(frames: Vec<RaceSnapshot>, step: usize) -> Self {
        Self {
            frames,
            step: step.max(1),
            next: 0,
            position: None,
        }
    }

    /// Reads a recording from disk.
    pub fn load(path: &Path, step: usize) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::format_err!("Couldn't read {path:?}: {}", e))?;
        let frames: Vec<RaceSnapshot> = serde_json::from_str(&contents)
            .map_err(|e| anyhow::format_err!("Couldn't parse {path:?}: {}", e))?;
        log::info!("Replaying {} frames from {path:?}", frames.len());
        Ok(Self::new_with(frames, step))
    }

    #[allow(missing_docs)]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
impl TelemetrySource for RecordedFeed {
    fn fetch(&mut self) -> Result<RaceSnapshot, IngestError> {
        let Some(frame) = self.frames.get(self.next) else {
            return Err(IngestError::Exhausted(self.frames.len()));
        };
        let snapshot = frame.clone();
        self.position = Some(self.next);
        self.next += self.step;
        Ok(snapshot)
    }

    fn position(&self) -> Option<usize> {
        self.position
    }
}

/// The app sends [IngestServiceInput] messages to control the service.
#[derive(Debug)]
pub enum IngestServiceInput {
    #[allow(missing_docs)]
    Quit,
}

/// [IngestServiceEvent] messages tell the app what the feed produced.
#[derive(Debug)]
pub enum IngestServiceEvent {
    /// A fresh snapshot. `frame` is set for replayed sources.
    Snapshot {
        #[allow(missing_docs)]
        snapshot: RaceSnapshot,
        #[allow(missing_docs)]
        frame: Option<usize>,
    },
    /// This tick's fetch failed. The next tick tries again.
    Failed(IngestError),
}

/// Polls a [TelemetrySource] on a fixed interval in its own thread.
#[derive(Debug)]
pub struct IngestService {
    inputs: ChannelPair<IngestServiceInput>,
    events: ChannelPair<IngestServiceEvent>,
}
impl ProvidesService<IngestServiceInput, IngestServiceEvent> for IngestService {
    fn sender(&self) -> &Sender<IngestServiceInput> {
        &self.inputs.sender
    }

    fn receiver(&self) -> &Receiver<IngestServiceEvent> {
        &self.events.receiver
    }
}
impl IngestService {
    /// The poll interval of the live show.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);

    /// Creates a new [IngestService] and starts polling.
    pub fn new_with(source: Box<dyn TelemetrySource>, interval: Duration) -> Self {
        let r = Self {
            inputs: Default::default(),
            events: Default::default(),
        };
        r.spawn_thread(source, interval);
        r
    }

    // Fetches are sequential within the thread, so a slow feed delays the
    // next fetch rather than overlapping it. Missed ticks are dropped, since
    // the ticker holds at most one pending tick.
    fn spawn_thread(&self, mut source: Box<dyn TelemetrySource>, interval: Duration) {
        let input_receiver = self.inputs.receiver.clone();
        let event_sender = self.events.sender.clone();
        std::thread::spawn(move || {
            let ticker = crossbeam_channel::tick(interval);
            loop {
                crossbeam_channel::select! {
                    recv(ticker) -> _ => {
                        let event = match source.fetch() {
                            Ok(snapshot) => IngestServiceEvent::Snapshot {
                                snapshot,
                                frame: source.position(),
                            },
                            Err(e) => IngestServiceEvent::Failed(e),
                        };
                        if event_sender.send(event).is_err() {
                            break;
                        }
                    }
                    recv(input_receiver) -> input => match input {
                        Ok(IngestServiceInput::Quit) | Err(_) => break,
                    }
                }
            }
            log::debug!("IngestService exit");
        });
    }

    /// Stops polling.
    pub fn exit(&self) {
        self.send_input(IngestServiceInput::Quit);
    }
}

// Copyright (c) 2024 Mike Tsao. All rights reserved.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Mutex;
use trackwave_core::{
    error::ActionError,
    traits::ControlSurface,
    types::{Clip, DeviceAddress, Parameter, ParameterAddress, Scene},
};

#[derive(Debug, Serialize, Deserialize)]
struct Tempo {
    bpm: f64,
}

#[derive(Debug, Serialize)]
struct ParameterValue {
    value: f64,
}

/// Drives the music tool through its JSON bridge.
#[derive(Debug)]
pub struct HttpSurface {
    base_url: String,
    agent: ureq::Agent,
}
impl HttpSurface {
    /// `base_url` is the bridge's root, e.g. `http://localhost:3001`.
    pub fn new_with(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: ureq::Agent::new_with_defaults(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn map_error(action: &str, e: ureq::Error) -> ActionError {
        match e {
            ureq::Error::StatusCode(code) => ActionError::Rejected {
                action: action.to_string(),
                reason: format!("HTTP {code}"),
            },
            e => ActionError::Unreachable(e.to_string()),
        }
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ActionError> {
        let action = format!("GET {path}");
        self.agent
            .get(&self.url(path))
            .call()
            .map_err(|e| Self::map_error(&action, e))?
            .into_body()
            .read_json::<T>()
            .map_err(|e| ActionError::Rejected {
                action,
                reason: e.to_string(),
            })
    }

    fn post_empty(&self, path: &str) -> Result<(), ActionError> {
        self.agent
            .post(&self.url(path))
            .send_empty()
            .map(|_| ())
            .map_err(|e| Self::map_error(&format!("POST {path}"), e))
    }
}
impl ControlSurface for HttpSurface {
    fn scenes(&self) -> Result<Vec<Scene>, ActionError> {
        self.get("/scenes")
    }

    fn play_scene(&self, scene: i64) -> Result<(), ActionError> {
        self.post_empty(&format!("/scenes/{scene}/play"))
    }

    fn clips_for_track(&self, track: u32) -> Result<Vec<Clip>, ActionError> {
        self.get(&format!("/tracks/{track}/clips"))
    }

    fn play_clip(&self, track: u32, clip: u32) -> Result<(), ActionError> {
        self.post_empty(&format!("/tracks/{track}/clips/{clip}/play"))
    }

    fn parameters_for_device(
        &self,
        device: DeviceAddress,
        index: u32,
    ) -> Result<Vec<Parameter>, ActionError> {
        self.get(&format!("/devices/{device}/{index}/parameters"))
    }

    fn set_parameter(&self, address: ParameterAddress, value: f64) -> Result<(), ActionError> {
        let path = format!("/devices/{address}");
        self.agent
            .post(&self.url(&path))
            .send_json(&ParameterValue { value })
            .map(|_| ())
            .map_err(|e| Self::map_error(&format!("POST {path}"), e))
    }

    fn tempo(&self) -> Result<f64, ActionError> {
        self.get::<Tempo>("/tempo").map(|t| t.bpm)
    }

    fn set_tempo(&self, bpm: f64) -> Result<(), ActionError> {
        self.agent
            .put(&self.url("/tempo"))
            .send_json(&Tempo { bpm })
            .map(|_| ())
            .map_err(|e| Self::map_error("PUT /tempo", e))
    }
}

/// One action a [RecordingSurface] was asked to perform.
#[derive(Clone, Debug, PartialEq)]
pub enum SurfaceAction {
    #[allow(missing_docs)]
    PlayScene(i64),
    #[allow(missing_docs)]
    PlayClip { track: u32, clip: u32 },
    #[allow(missing_docs)]
    SetParameter {
        address: ParameterAddress,
        value: f64,
    },
    #[allow(missing_docs)]
    SetTempo(f64),
}

#[derive(Debug, Default)]
struct RecordingState {
    journal: Vec<SurfaceAction>,
    tempo: f64,
}

/// A dry-run surface. It serves canned scenes and clips, remembers the tempo
/// it was given, and journals every action. Used when no bridge is
/// configured, and by tests.
#[derive(Debug)]
pub struct RecordingSurface {
    scenes: Vec<Scene>,
    clips: Vec<(u32, Clip)>,
    state: Mutex<RecordingState>,
}
impl Default for RecordingSurface {
    fn default() -> Self {
        Self::new_with(Vec::default(), Vec::default())
    }
}
impl RecordingSurface {
    #[allow(missing_docs)]
    pub const DEFAULT_TEMPO: f64 = 120.0;

    #[allow(missing_docs)]
    pub fn new_with(scenes: Vec<Scene>, clips: Vec<(u32, Clip)>) -> Self {
        Self {
            scenes,
            clips,
            state: Mutex::new(RecordingState {
                journal: Default::default(),
                tempo: Self::DEFAULT_TEMPO,
            }),
        }
    }

    /// Everything performed so far, oldest first.
    pub fn journal(&self) -> Vec<SurfaceAction> {
        self.state
            .lock()
            .map(|s| s.journal.clone())
            .unwrap_or_default()
    }

    /// Empties the journal and returns what it held.
    pub fn take_journal(&self) -> Vec<SurfaceAction> {
        self.state
            .lock()
            .map(|mut s| std::mem::take(&mut s.journal))
            .unwrap_or_default()
    }

    fn record(&self, action: SurfaceAction) -> Result<(), ActionError> {
        log::debug!("(dry run) {action:?}");
        let mut state = self
            .state
            .lock()
            .map_err(|e| ActionError::Unreachable(e.to_string()))?;
        if let SurfaceAction::SetTempo(bpm) = action {
            state.tempo = bpm;
        }
        state.journal.push(action);
        Ok(())
    }
}
impl ControlSurface for RecordingSurface {
    fn scenes(&self) -> Result<Vec<Scene>, ActionError> {
        Ok(self.scenes.clone())
    }

    fn play_scene(&self, scene: i64) -> Result<(), ActionError> {
        self.record(SurfaceAction::PlayScene(scene))
    }

    fn clips_for_track(&self, track: u32) -> Result<Vec<Clip>, ActionError> {
        Ok(self
            .clips
            .iter()
            .filter(|(t, _)| *t == track)
            .map(|(_, clip)| clip.clone())
            .collect())
    }

    fn play_clip(&self, track: u32, clip: u32) -> Result<(), ActionError> {
        self.record(SurfaceAction::PlayClip { track, clip })
    }

    fn parameters_for_device(
        &self,
        _device: DeviceAddress,
        _index: u32,
    ) -> Result<Vec<Parameter>, ActionError> {
        Ok(Vec::default())
    }

    fn set_parameter(&self, address: ParameterAddress, value: f64) -> Result<(), ActionError> {
        self.record(SurfaceAction::SetParameter { address, value })
    }

    fn tempo(&self) -> Result<f64, ActionError> {
        self.state
            .lock()
            .map(|s| s.tempo)
            .map_err(|e| ActionError::Unreachable(e.to_string()))
    }

    fn set_tempo(&self, bpm: f64) -> Result<(), ActionError> {
        self.record(SurfaceAction::SetTempo(bpm))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_surface_journals_and_remembers_tempo() {
        let surface = RecordingSurface::new_with(
            vec![Scene {
                id: 0,
                name: "01 intro".to_string(),
            }],
            vec![
                (
                    17,
                    Clip {
                        id: 3,
                        name: "green-flag".to_string(),
                    },
                ),
                (
                    2,
                    Clip {
                        id: 0,
                        name: "loop".to_string(),
                    },
                ),
            ],
        );
        assert_eq!(surface.scenes().unwrap().len(), 1);
        assert_eq!(surface.clips_for_track(17).unwrap()[0].id, 3);
        assert!(surface.clips_for_track(5).unwrap().is_empty());

        assert_eq!(surface.tempo().unwrap(), RecordingSurface::DEFAULT_TEMPO);
        surface.play_clip(17, 3).unwrap();
        surface.set_tempo(96.0).unwrap();
        assert_eq!(surface.tempo().unwrap(), 96.0);
        assert_eq!(
            surface.take_journal(),
            vec![
                SurfaceAction::PlayClip { track: 17, clip: 3 },
                SurfaceAction::SetTempo(96.0)
            ]
        );
        assert!(surface.journal().is_empty());
    }

    #[test]
    fn unreachable_bridge_is_an_action_error() {
        let surface = HttpSurface::new_with("http://127.0.0.1:9/");
        assert!(matches!(
            surface.play_scene(3),
            Err(ActionError::Unreachable(_))
        ));
        assert!(surface.tempo().is_err());
    }
}

// Copyright (c) 2024 Mike Tsao. All rights reserved.

use crate::channel_pair::ChannelPair;
use crossbeam_channel::Receiver;
use derivative::Derivative;
use midly::{live::LiveEvent, MidiMessage};

/// Names of the virtual ports the show exposes to the rest of the rig.
#[derive(Clone, Debug)]
pub struct MidiPortNames {
    #[allow(missing_docs)]
    pub input: String,
    #[allow(missing_docs)]
    pub output: String,
}
impl Default for MidiPortNames {
    fn default() -> Self {
        Self {
            input: "trackwave-in".to_string(),
            output: "trackwave-out".to_string(),
        }
    }
}

/// [MidiServiceEvent] messages tell the app what arrived on the input port.
#[derive(Clone, Debug)]
pub enum MidiServiceEvent {
    /// A channel message arrived. The channel is zero-based.
    Midi(u8, MidiMessage),
}

/// Opens one virtual MIDI input and one virtual MIDI output. Channel messages
/// arriving on the input are forwarded as [MidiServiceEvent]s. The ports stay
/// open for as long as the service is alive.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct MidiService {
    events: ChannelPair<MidiServiceEvent>,
    port_names: MidiPortNames,

    #[cfg(unix)]
    #[derivative(Debug = "ignore")]
    input_connection: Option<midir::MidiInputConnection<()>>,
    #[cfg(unix)]
    #[derivative(Debug = "ignore")]
    output_connection: Option<midir::MidiOutputConnection>,
}
impl MidiService {
    const CLIENT_NAME: &'static str = "trackwave";

    /// Creates the virtual ports.
    #[cfg(unix)]
    pub fn new_with(port_names: MidiPortNames) -> anyhow::Result<Self> {
        use midir::os::unix::{VirtualInput, VirtualOutput};

        let events: ChannelPair<MidiServiceEvent> = Default::default();

        let input = midir::MidiInput::new(Self::CLIENT_NAME)?;
        let sender = events.sender.clone();
        let input_connection = input
            .create_virtual(
                &port_names.input,
                move |_, bytes, _| {
                    if let Some(event) = Self::parse(bytes) {
                        if let Err(e) = sender.try_send(event) {
                            log::warn!("While forwarding MIDI: {e:?}");
                        }
                    }
                },
                (),
            )
            .map_err(|e| anyhow::anyhow!("couldn't open MIDI input {}: {e}", port_names.input))?;

        let output = midir::MidiOutput::new(Self::CLIENT_NAME)?;
        let output_connection = output.create_virtual(&port_names.output).map_err(|e| {
            anyhow::anyhow!("couldn't open MIDI output {}: {e}", port_names.output)
        })?;

        log::info!(
            "MIDI ports open: in {:?}, out {:?}",
            port_names.input,
            port_names.output
        );
        Ok(Self {
            events,
            port_names,
            input_connection: Some(input_connection),
            output_connection: Some(output_connection),
        })
    }

    /// Virtual ports exist only on ALSA and CoreMIDI.
    #[cfg(not(unix))]
    pub fn new_with(port_names: MidiPortNames) -> anyhow::Result<Self> {
        Err(anyhow::anyhow!(
            "virtual MIDI ports ({}, {}) aren't supported on this platform",
            port_names.input,
            port_names.output
        ))
    }

    /// Decodes raw bytes into an event. System and malformed messages are
    /// ignored.
    pub fn parse(bytes: &[u8]) -> Option<MidiServiceEvent> {
        match LiveEvent::parse(bytes) {
            Ok(LiveEvent::Midi { channel, message }) => {
                Some(MidiServiceEvent::Midi(channel.as_int(), message))
            }
            Ok(_) => None,
            Err(e) => {
                log::debug!("Ignoring unparseable MIDI {bytes:?}: {e:?}");
                None
            }
        }
    }

    /// Integrate this into a listener loop to respond to incoming MIDI.
    pub fn receiver(&self) -> &Receiver<MidiServiceEvent> {
        &self.events.receiver
    }

    #[allow(missing_docs)]
    pub fn port_names(&self) -> &MidiPortNames {
        &self.port_names
    }

    /// Closes both ports.
    #[cfg(unix)]
    pub fn exit(&mut self) {
        if let Some(connection) = self.input_connection.take() {
            connection.close();
        }
        if let Some(connection) = self.output_connection.take() {
            connection.close();
        }
        log::debug!("MidiService exit");
    }

    #[allow(missing_docs)]
    #[cfg(not(unix))]
    pub fn exit(&mut self) {}
}

// MIDI output devices
//
// Every output the core talks to is an `OutputDevice`. A track whose device
// cannot be resolved gets the `Null` variant, which accepts every call and
// sends nothing, so callers never need to check for a missing device.

use crate::midi::event::MidiMessage;
use midir::{MidiOutput as MidirOutput, MidiOutputConnection};
use std::sync::{Arc, Mutex};

/// Output device shared between the control loop and the transport clock
pub type SharedOutputDevice = Arc<Mutex<OutputDevice>>;

#[derive(Clone, Debug)]
pub struct MidiDeviceInfo {
    pub id: String,
    pub name: String,
    pub is_default: bool,
}

/// A connected hardware/virtual port opened through midir
pub struct PortDevice {
    name: String,
    connection: Option<MidiOutputConnection>,
}

impl PortDevice {
    /// Open the output port with the given name
    pub fn open(port_name: &str) -> Result<Self, String> {
        let midi_out = MidirOutput::new("pushit MIDI Output")
            .map_err(|e| format!("Midi init error: {}", e))?;

        let port = midi_out
            .ports()
            .into_iter()
            .find(|p| midi_out.port_name(p).map(|n| n == port_name).unwrap_or(false))
            .ok_or_else(|| format!("No output port named '{}'", port_name))?;

        let connection = midi_out
            .connect(&port, "pushit")
            .map_err(|e| format!("Failed to connect to '{}': {}", port_name, e))?;

        Ok(Self {
            name: port_name.to_string(),
            connection: Some(connection),
        })
    }

    fn send(&mut self, bytes: &[u8]) {
        if let Some(conn) = self.connection.as_mut() {
            if let Err(e) = conn.send(bytes) {
                log::warn!("Failed to send MIDI to '{}': {}", self.name, e);
            }
        }
    }

    fn close(&mut self) {
        if let Some(conn) = self.connection.take() {
            conn.close();
        }
    }
}

/// Stand-in for a device that is missing or failed to open
#[derive(Debug, Clone, Default)]
pub struct NullDevice {
    closed: bool,
}

/// In-memory sink: keeps every message sent to it.
///
/// Backs simulated controllers and lets callers observe the exact output
/// stream. Cloning shares the same buffer.
#[derive(Debug, Clone, Default)]
pub struct CaptureDevice {
    messages: Arc<Mutex<Vec<MidiMessage>>>,
}

impl CaptureDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything sent so far
    pub fn messages(&self) -> Vec<MidiMessage> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    /// Drain everything sent so far
    pub fn take_messages(&self) -> Vec<MidiMessage> {
        self.messages
            .lock()
            .map(|mut m| std::mem::take(&mut *m))
            .unwrap_or_default()
    }

    fn push(&self, message: MidiMessage) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message);
        }
    }
}

/// An output destination. All operations are always safe to call.
pub enum OutputDevice {
    Port(PortDevice),
    Null(NullDevice),
    Capture { name: String, sink: CaptureDevice },
}

impl OutputDevice {
    pub fn null() -> Self {
        OutputDevice::Null(NullDevice::default())
    }

    pub fn capture(name: &str, sink: CaptureDevice) -> Self {
        OutputDevice::Capture {
            name: name.to_string(),
            sink,
        }
    }

    pub fn into_shared(self) -> SharedOutputDevice {
        Arc::new(Mutex::new(self))
    }

    pub fn name(&self) -> &str {
        match self {
            OutputDevice::Port(port) => &port.name,
            OutputDevice::Null(_) => "Null MIDI Output",
            OutputDevice::Capture { name, .. } => name,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, OutputDevice::Null(_))
    }

    pub fn send(&mut self, message: MidiMessage) {
        match self {
            OutputDevice::Port(port) => port.send(&message.to_bytes()),
            OutputDevice::Null(_) => {}
            OutputDevice::Capture { sink, .. } => sink.push(message),
        }
    }

    pub fn note_on(&mut self, note: u8, velocity: u8, channel: u8) {
        self.send(MidiMessage::NoteOn {
            channel,
            note,
            velocity,
        });
    }

    pub fn note_off(&mut self, note: u8, channel: u8) {
        self.send(MidiMessage::NoteOff { channel, note });
    }

    pub fn control(&mut self, controller: u8, value: u8, channel: u8) {
        self.send(MidiMessage::ControlChange {
            channel,
            controller,
            value,
        });
    }

    /// Send every note-off on the channel (CC 123)
    pub fn all_notes_off(&mut self, channel: u8) {
        self.control(123, 0, channel);
    }

    pub fn close(&mut self) {
        match self {
            OutputDevice::Port(port) => port.close(),
            OutputDevice::Null(null) => null.closed = true,
            OutputDevice::Capture { .. } => {}
        }
    }
}

impl std::fmt::Debug for OutputDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputDevice")
            .field("name", &self.name())
            .finish()
    }
}

/// Lists the ports the OS currently exposes
pub struct MidiDeviceManager;

impl MidiDeviceManager {
    pub fn new() -> Self {
        Self
    }

    /// All MIDI output ports currently available
    pub fn list_output_ports(&self) -> Vec<MidiDeviceInfo> {
        let mut devices = Vec::new();

        if let Ok(midi_out) = MidirOutput::new("pushit MIDI Scanner") {
            for (index, port) in midi_out.ports().iter().enumerate() {
                if let Ok(name) = midi_out.port_name(port) {
                    devices.push(MidiDeviceInfo {
                        id: format!("midi_out_{}", index),
                        name,
                        is_default: index == 0,
                    });
                }
            }
        }

        devices
    }

    /// All MIDI input ports currently available
    pub fn list_input_ports(&self) -> Vec<MidiDeviceInfo> {
        let mut devices = Vec::new();

        if let Ok(midi_in) = midir::MidiInput::new("pushit MIDI Scanner") {
            for (index, port) in midi_in.ports().iter().enumerate() {
                if let Ok(name) = midi_in.port_name(port) {
                    devices.push(MidiDeviceInfo {
                        id: format!("midi_in_{}", index),
                        name,
                        is_default: index == 0,
                    });
                }
            }
        }

        devices
    }
}

impl Default for MidiDeviceManager {
    fn default() -> Self {
        Self::new()
    }
}

// MIDI module - Messages, output devices and the device registry

pub mod device;
pub mod event;
pub mod manager;

pub use device::{CaptureDevice, MidiDeviceManager, NullDevice, OutputDevice, SharedOutputDevice};
pub use event::MidiMessage;
pub use manager::{DeviceStatus, MidiDeviceRegistry};

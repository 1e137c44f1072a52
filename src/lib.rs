// Pushit - Library exports for the binary, tests and benchmarks

pub mod config;
pub mod logging;
pub mod messaging;
pub mod midi;
pub mod project;
pub mod sequencer;

// Re-export commonly used types for convenience
pub use config::{Settings, SettingsSection};
pub use messaging::channels::create_notification_channel;
pub use midi::device::{CaptureDevice, OutputDevice};
pub use midi::event::MidiMessage;
pub use midi::manager::MidiDeviceRegistry;
pub use project::{ProjectError, ProjectManager};
pub use sequencer::{
    BarPosition, Clip, ClipScheduler, Session, SequenceEvent, Tempo, Track, Transport,
};

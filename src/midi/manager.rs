// MIDI device registry - Output devices by name
//
// Tracks refer to their output by name only. The registry owns the opened
// devices, merges newly connected ports on rescans and hands out the shared
// null device when a name cannot be resolved.

use crate::config::{MidiSettings, SettingsSection};
use crate::midi::device::{MidiDeviceManager, OutputDevice, PortDevice, SharedOutputDevice};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    Disconnected,
    Connected,
    Error,
}

pub struct MidiDeviceRegistry {
    settings: MidiSettings,
    /// Whether the OS port list is consulted (false for offline registries)
    scan_ports: bool,
    scanner: MidiDeviceManager,
    input_device_names: Vec<String>,
    output_device_names: Vec<String>,
    output_devices: HashMap<String, SharedOutputDevice>,
    statuses: HashMap<String, DeviceStatus>,
    null_device: SharedOutputDevice,
}

impl MidiDeviceRegistry {
    /// Registry backed by the system's MIDI ports; opens every allowed output
    pub fn with_ports(settings: MidiSettings) -> Self {
        let mut registry = Self::build(settings, true);
        registry.initialize_devices();
        registry
    }

    /// Registry that never touches system ports. Devices are added with `register`.
    pub fn offline() -> Self {
        Self::build(MidiSettings::default(), false)
    }

    fn build(settings: MidiSettings, scan_ports: bool) -> Self {
        Self {
            settings,
            scan_ports,
            scanner: MidiDeviceManager::new(),
            input_device_names: Vec::new(),
            output_device_names: Vec::new(),
            output_devices: HashMap::new(),
            statuses: HashMap::new(),
            null_device: OutputDevice::null().into_shared(),
        }
    }

    /// Scan and open all allowed output devices
    pub fn initialize_devices(&mut self) {
        self.update_midi_devices();

        for name in self.input_device_names.iter() {
            log::info!("Found MIDI input: {}", name);
        }
    }

    /// Check for newly connected devices and merge them into the known lists.
    /// Newly seen outputs are opened; devices already open are kept.
    pub fn update_midi_devices(&mut self) {
        if !self.scan_ports {
            return;
        }

        let inputs: Vec<String> = self
            .scanner
            .list_input_ports()
            .into_iter()
            .map(|info| info.name)
            .filter(|name| !self.is_excluded(name))
            .collect();
        let outputs: Vec<String> = self
            .scanner
            .list_output_ports()
            .into_iter()
            .map(|info| info.name)
            .filter(|name| !self.is_excluded(name))
            .collect();

        for name in inputs {
            if !self.input_device_names.contains(&name) {
                self.input_device_names.push(name);
            }
        }

        for name in outputs {
            if !self.output_device_names.contains(&name) {
                self.output_device_names.push(name.clone());
            }
            if !self.output_devices.contains_key(&name) {
                self.open_output(&name);
            }
        }
    }

    fn open_output(&mut self, name: &str) {
        match PortDevice::open(name) {
            Ok(port) => {
                log::info!("Initialized MIDI output: {}", name);
                self.output_devices
                    .insert(name.to_string(), OutputDevice::Port(port).into_shared());
                self.statuses.insert(name.to_string(), DeviceStatus::Connected);
            }
            Err(e) => {
                log::warn!("Failed to initialize output {}: {}", name, e);
                self.statuses.insert(name.to_string(), DeviceStatus::Error);
            }
        }
    }

    /// Whether a port name matches one of the excluded patterns
    pub fn is_excluded(&self, name: &str) -> bool {
        self.settings
            .excluded_port_patterns
            .iter()
            .any(|pattern| name.contains(pattern.as_str()))
    }

    /// Add a device by hand (virtual outputs, simulated controllers)
    pub fn register(&mut self, name: &str, device: OutputDevice) -> SharedOutputDevice {
        let shared = device.into_shared();
        if !self.output_device_names.iter().any(|n| n == name) {
            self.output_device_names.push(name.to_string());
        }
        self.output_devices.insert(name.to_string(), shared.clone());
        self.statuses.insert(name.to_string(), DeviceStatus::Connected);
        shared
    }

    /// Look up an output by name. Unknown names trigger one rescan first.
    pub fn resolve(&mut self, name: &str) -> Option<SharedOutputDevice> {
        if !self.output_device_names.iter().any(|n| n == name) {
            self.update_midi_devices();
        }
        self.output_devices.get(name).cloned()
    }

    /// Like `resolve`, but always yields a device (the null device when missing)
    pub fn resolve_or_null(&mut self, name: Option<&str>) -> SharedOutputDevice {
        name.and_then(|n| self.resolve(n))
            .unwrap_or_else(|| self.null_device.clone())
    }

    pub fn null_device(&self) -> SharedOutputDevice {
        self.null_device.clone()
    }

    pub fn device_status(&self, name: &str) -> DeviceStatus {
        self.statuses
            .get(name)
            .copied()
            .unwrap_or(DeviceStatus::Disconnected)
    }

    pub fn output_device_names(&self) -> &[String] {
        &self.output_device_names
    }

    pub fn input_device_names(&self) -> &[String] {
        &self.input_device_names
    }

    /// Send a note on (velocity > 0) or note off (velocity 0) to a named device
    pub fn send_note(&mut self, device_name: &str, note: u8, velocity: u8, channel: u8) {
        match self.resolve(device_name) {
            Some(device) => {
                if let Ok(mut device) = device.lock() {
                    if velocity > 0 {
                        log::debug!("Sending note ON: {} vel={} to {}", note, velocity, device_name);
                        device.note_on(note, velocity, channel);
                    } else {
                        log::debug!("Sending note OFF: {} to {}", note, device_name);
                        device.note_off(note, channel);
                    }
                }
            }
            None => log::warn!("No output device found: {}", device_name),
        }
    }

    /// Close every opened device
    /// Silence and close every output. Hung notes get a CC 123 on all channels.
    pub fn close_all(&mut self) {
        for (name, device) in self.output_devices.drain() {
            if let Ok(mut device) = device.lock() {
                for channel in 0..16 {
                    device.all_notes_off(channel);
                }
                device.close();
            }
            self.statuses.insert(name, DeviceStatus::Disconnected);
        }
    }

    pub fn settings_section(&self) -> SettingsSection {
        SettingsSection::Midi(self.settings.clone())
    }
}

impl Default for MidiDeviceRegistry {
    fn default() -> Self {
        Self::offline()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::device::CaptureDevice;
    use crate::midi::event::MidiMessage;

    #[test]
    fn test_register_and_resolve() {
        let mut registry = MidiDeviceRegistry::offline();
        let sink = CaptureDevice::new();
        registry.register("Synth A", OutputDevice::capture("Synth A", sink.clone()));

        assert!(registry.resolve("Synth A").is_some());
        assert!(registry.resolve("Synth B").is_none());
        assert_eq!(registry.device_status("Synth A"), DeviceStatus::Connected);
        assert_eq!(registry.device_status("Synth B"), DeviceStatus::Disconnected);
        assert_eq!(registry.output_device_names(), &["Synth A".to_string()]);
    }

    #[test]
    fn test_resolve_or_null() {
        let mut registry = MidiDeviceRegistry::offline();
        let device = registry.resolve_or_null(Some("Missing"));
        assert!(device.lock().unwrap().is_null());

        let device = registry.resolve_or_null(None);
        assert!(device.lock().unwrap().is_null());
    }

    #[test]
    fn test_excluded_patterns() {
        let registry = MidiDeviceRegistry::offline();
        assert!(registry.is_excluded("Ableton Push 2 Live Port"));
        assert!(registry.is_excluded("Midi Through Port-0"));
        assert!(!registry.is_excluded("Minilogue XD"));
    }

    #[test]
    fn test_send_note() {
        let mut registry = MidiDeviceRegistry::offline();
        let sink = CaptureDevice::new();
        registry.register("Synth A", OutputDevice::capture("Synth A", sink.clone()));

        registry.send_note("Synth A", 64, 90, 1);
        registry.send_note("Synth A", 64, 0, 1);
        registry.send_note("Nowhere", 64, 90, 1);

        assert_eq!(
            sink.messages(),
            vec![
                MidiMessage::NoteOn {
                    channel: 1,
                    note: 64,
                    velocity: 90
                },
                MidiMessage::NoteOff { channel: 1, note: 64 },
            ]
        );
    }

    #[test]
    fn test_register_twice_keeps_one_name() {
        let mut registry = MidiDeviceRegistry::offline();
        registry.register("Synth A", OutputDevice::null());
        registry.register("Synth A", OutputDevice::null());
        assert_eq!(registry.output_device_names().len(), 1);
    }

    #[test]
    fn test_close_all() {
        let mut registry = MidiDeviceRegistry::offline();
        registry.register("Synth A", OutputDevice::null());
        registry.close_all();
        assert_eq!(registry.device_status("Synth A"), DeviceStatus::Disconnected);
        assert!(registry.resolve("Synth A").is_none());
    }

    #[test]
    fn test_close_all_sends_all_notes_off() {
        let mut registry = MidiDeviceRegistry::offline();
        let sink = CaptureDevice::new();
        registry.register("Synth", OutputDevice::capture("Synth", sink.clone()));
        registry.close_all();

        let messages = sink.messages();
        assert_eq!(messages.len(), 16);
        assert_eq!(
            messages[15],
            MidiMessage::ControlChange {
                channel: 15,
                controller: 123,
                value: 0
            }
        );
    }
}

// Track - One instrument lane: a clip slot per scene and one MIDI output

use crate::midi::device::SharedOutputDevice;
use crate::midi::manager::MidiDeviceRegistry;
use crate::sequencer::clip::Clip;
use std::cell::OnceCell;

/// Clip slots per track (one per scene row)
pub const NUM_SCENES: usize = 8;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TrackError {
    #[error("Scene {0} out of range")]
    SceneOutOfRange(usize),

    #[error("MIDI channel must be 0-15, got {0}")]
    InvalidChannel(u8),
}

#[derive(Debug, Clone)]
pub struct Track {
    index: usize,
    clips: Vec<Option<Clip>>,
    output_device_name: Option<String>,
    midi_channel: u8,
    pub input_monitoring: bool,
    short_name: OnceCell<String>,
}

impl Track {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            clips: vec![None; NUM_SCENES],
            output_device_name: None,
            midi_channel: 0,
            input_monitoring: false,
            short_name: OnceCell::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn clips(&self) -> &[Option<Clip>] {
        &self.clips
    }

    /// Clip at a scene; `None` both for empty slots and out-of-range scenes
    pub fn clip(&self, scene: usize) -> Option<&Clip> {
        self.clips.get(scene).and_then(Option::as_ref)
    }

    pub fn clip_mut(&mut self, scene: usize) -> Option<&mut Clip> {
        self.clips.get_mut(scene).and_then(Option::as_mut)
    }

    /// Clip at a scene, created (and named) if the slot is empty
    pub fn ensure_clip(&mut self, scene: usize) -> Option<&mut Clip> {
        let index = self.index;
        let slot = self.clips.get_mut(scene)?;
        Some(slot.get_or_insert_with(|| {
            let mut clip = Clip::new();
            clip.name = format!("{}-{}", index + 1, scene + 1);
            clip.attach(index, scene);
            clip
        }))
    }

    /// Put a clip in a slot, returning the clip it replaces
    pub fn add_clip(&mut self, scene: usize, mut clip: Clip) -> Result<Option<Clip>, TrackError> {
        let slot = self
            .clips
            .get_mut(scene)
            .ok_or(TrackError::SceneOutOfRange(scene))?;
        clip.attach(self.index, scene);
        let previous = slot.replace(clip);
        Ok(previous.map(|mut c| {
            c.detach();
            c
        }))
    }

    /// Take a clip out of its slot; the returned clip is detached
    pub fn remove_clip(&mut self, scene: usize) -> Option<Clip> {
        let mut clip = self.clips.get_mut(scene)?.take()?;
        clip.detach();
        Some(clip)
    }

    /// Scenes whose clip is playing
    pub fn playing_scenes(&self) -> Vec<usize> {
        self.clips
            .iter()
            .enumerate()
            .filter(|(_, c)| c.as_ref().is_some_and(Clip::playing))
            .map(|(scene, _)| scene)
            .collect()
    }

    pub fn output_device_name(&self) -> Option<&str> {
        self.output_device_name.as_deref()
    }

    /// Rebind the output; clears the cached short name
    pub fn set_output_device_by_name(&mut self, device_name: Option<&str>) {
        self.output_device_name = device_name.map(str::to_string);
        self.short_name = OnceCell::new();
    }

    /// Device name without trailing ALSA port numbers ("Minilogue 20:0" -> "Minilogue")
    pub fn output_device_short_name(&self) -> &str {
        self.short_name
            .get_or_init(|| short_device_name(self.output_device_name.as_deref().unwrap_or("")))
    }

    /// Resolve the bound output through the registry; the null device when unresolved
    pub fn get_output_device(&self, registry: &mut MidiDeviceRegistry) -> SharedOutputDevice {
        registry.resolve_or_null(self.output_device_name())
    }

    pub fn midi_channel(&self) -> u8 {
        self.midi_channel
    }

    pub fn set_midi_channel(&mut self, channel: u8) -> Result<(), TrackError> {
        if channel > 15 {
            return Err(TrackError::InvalidChannel(channel));
        }
        self.midi_channel = channel;
        Ok(())
    }

    pub fn set_input_monitoring(&mut self, enabled: bool) {
        self.input_monitoring = enabled;
    }
}

fn short_device_name(name: &str) -> String {
    let trimmed = name.trim_end();
    if let Some((head, last)) = trimmed.rsplit_once(' ') {
        let is_port = last
            .split_once(':')
            .is_some_and(|(client, port)| {
                !client.is_empty()
                    && !port.is_empty()
                    && client.chars().all(|c| c.is_ascii_digit())
                    && port.chars().all(|c| c.is_ascii_digit())
            });
        if is_port {
            return head.trim_end().to_string();
        }
    }
    trimmed.to_string()
}

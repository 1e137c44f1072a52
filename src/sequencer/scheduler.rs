// Clip scheduler - Turns clip content into live transport schedules
// Keeps at most one live schedule per track.

use crate::midi::manager::MidiDeviceRegistry;
use crate::sequencer::clip::Clip;
use crate::sequencer::timeline;
use crate::sequencer::transport::{ScheduleId, SequenceSlot, SlotNote, SlotRaw, Transport};
use std::collections::HashMap;

/// Quantization assumes 4/4
pub const BEATS_PER_BAR: f64 = 4.0;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ScheduleError {
    #[error("Track {0} has no output device")]
    NoOutputDevice(usize),

    #[error("No output device found for '{0}'")]
    DeviceNotFound(String),

    #[error("Clip has no steps")]
    EmptyClip,
}

pub struct ClipScheduler {
    transport: Transport,
    registry: MidiDeviceRegistry,
    track_schedules: HashMap<usize, ScheduleId>,
}

impl ClipScheduler {
    pub fn new(transport: Transport, registry: MidiDeviceRegistry) -> Self {
        Self {
            transport,
            registry,
            track_schedules: HashMap::new(),
        }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn registry(&self) -> &MidiDeviceRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut MidiDeviceRegistry {
        &mut self.registry
    }

    pub fn current_time(&self) -> f64 {
        self.transport.current_time()
    }

    pub fn start_timeline(&self) {
        self.transport.start();
    }

    /// Stop the clock and drop every track schedule
    pub fn stop_timeline(&mut self) {
        self.unschedule_all();
        self.transport.stop();
    }

    pub fn reset_timeline(&self) {
        self.transport.reset();
    }

    /// One slot per step. Rests stay in place, chords share a slot, and the
    /// last slot absorbs whatever is left so the loop is exactly one clip long.
    pub fn build_value_sequences(clip: &Clip) -> Vec<SequenceSlot> {
        let multiplier = clip.bpm_multiplier();
        let step_length = clip.step_length();
        let table = clip.step_table();
        let remainder = (clip.clip_length_in_beats() - step_length * table.len() as f64).max(0.0);

        let mut slots: Vec<SequenceSlot> = table
            .iter()
            .map(|step| {
                let mut notes: Vec<SlotNote> = step
                    .notes()
                    .map(|event| SlotNote {
                        note: event.midi_note,
                        velocity: event.velocity_u8(),
                        gate: event.duration / multiplier,
                        delay: event.utime / multiplier,
                        chance: event.chance,
                    })
                    .collect();
                notes.sort_by(|a, b| a.delay.total_cmp(&b.delay));

                let raw = step
                    .events()
                    .iter()
                    .filter(|event| !event.is_note())
                    .map(|event| SlotRaw {
                        delay: event.utime / multiplier,
                        bytes: event.midi_bytes.clone(),
                    })
                    .collect();

                SequenceSlot {
                    duration: step_length / multiplier,
                    notes,
                    raw,
                }
            })
            .collect();

        if let Some(last) = slots.last_mut() {
            last.duration += remainder / multiplier;
        }
        slots
    }

    /// Schedule a clip for a track starting at the current beat
    pub fn schedule_clip(
        &mut self,
        track_key: usize,
        clip: &Clip,
        device_name: Option<&str>,
        channel: u8,
    ) -> Result<ScheduleId, ScheduleError> {
        let start = self.transport.current_time();
        self.schedule_clip_at(track_key, clip, device_name, channel, start)
    }

    /// Schedule a clip for a track with its first step at `start_beat`.
    /// Any previous schedule of the track is removed first, even on failure.
    pub fn schedule_clip_at(
        &mut self,
        track_key: usize,
        clip: &Clip,
        device_name: Option<&str>,
        channel: u8,
        start_beat: f64,
    ) -> Result<ScheduleId, ScheduleError> {
        self.unschedule_clip(track_key);

        let Some(device_name) = device_name else {
            log::error!("No output device set for track {}", track_key + 1);
            return Err(ScheduleError::NoOutputDevice(track_key));
        };
        let Some(device) = self.registry.resolve(device_name) else {
            log::error!(
                "No output device found for '{}'. Available devices: {:?}",
                device_name,
                self.registry.output_device_names()
            );
            return Err(ScheduleError::DeviceNotFound(device_name.to_string()));
        };

        if clip.steps() == 0 {
            log::warn!("No steps in clip '{}'", clip.name);
            return Err(ScheduleError::EmptyClip);
        }

        let slots = Self::build_value_sequences(clip);
        let slot_count = slots.len();
        let id = self.transport.schedule_at(slots, device, channel, start_beat);
        self.track_schedules.insert(track_key, id);

        log::debug!(
            "Scheduled clip '{}' ({} steps) on track {} to {} at beat {:.2}",
            clip.name,
            slot_count,
            track_key + 1,
            device_name,
            start_beat
        );
        Ok(id)
    }

    /// Remove a track's schedule. Returns whether there was one.
    pub fn unschedule_clip(&mut self, track_key: usize) -> bool {
        match self.track_schedules.remove(&track_key) {
            Some(id) => {
                self.transport.unschedule(id);
                true
            }
            None => false,
        }
    }

    /// Rebuild a track's live schedule from edited content, keeping its phase.
    /// Only acts when the track has a live schedule and the clip is playing.
    pub fn reschedule_clip(
        &mut self,
        track_key: usize,
        clip: &Clip,
        device_name: Option<&str>,
        channel: u8,
    ) -> Result<Option<ScheduleId>, ScheduleError> {
        if !self.has_schedule(track_key) || !clip.playing() {
            return Ok(None);
        }
        self.schedule_clip_at(track_key, clip, device_name, channel, clip.play_started_at())
            .map(Some)
    }

    pub fn unschedule_all(&mut self) {
        for (_, id) in self.track_schedules.drain() {
            self.transport.unschedule(id);
        }
    }

    pub fn has_schedule(&self, track_key: usize) -> bool {
        self.track_schedules
            .get(&track_key)
            .is_some_and(|id| self.transport.has_schedule(*id))
    }

    pub fn live_schedule_count(&self) -> usize {
        self.track_schedules.len()
    }

    /// Next multiple of `bars_per_quantize` 4/4 bars strictly after the current beat
    pub fn get_next_bar_boundary(&self, bars_per_quantize: u32) -> f64 {
        timeline::next_bar_boundary(self.transport.current_time(), BEATS_PER_BAR, bars_per_quantize)
    }

    /// Note on (velocity > 0) or note off (velocity 0) to a named device
    pub fn send_note(&mut self, device_name: &str, note: u8, velocity: u8, channel: u8) {
        self.registry.send_note(device_name, note, velocity, channel);
    }

    pub fn update_midi_devices(&mut self) {
        self.registry.update_midi_devices();
    }
}

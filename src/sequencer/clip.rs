// Clip - One loop slot of a track
// Content is a step table: each step holds the events whose rendered start
// falls inside it. An empty step is a rest.

use crate::sequencer::event::{EventId, SequenceEvent, SequenceEventEdit};
use serde::{Deserialize, Serialize};

/// Pads per row on the controller grid
pub const GRID_WIDTH: usize = 8;

pub const DEFAULT_MAX_POLYPHONY: usize = 8;

/// Velocity used when a note is placed without one
pub const DEFAULT_VELOCITY: u8 = 100;

/// Quantization ladder cycled by the edit mode (0 = off)
pub const QUANTIZATION_STEPS: [f64; 4] = [0.0, 0.25, 0.5, 1.0];

const NO_CUE: f64 = -1.0;
/// Cue left by `play`/`stop` until the session resolves it
const ASAP_CUE: f64 = 0.0;

/// Absorbs float noise when mapping beats to step indices
const EPSILON: f64 = 1e-9;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ClipError {
    #[error("Position {position} out of range (clip has {len} steps)")]
    OutOfRange { position: usize, len: usize },

    #[error("Invalid clip length: {0}")]
    InvalidLength(f64),

    #[error("Step divisions must be > 0")]
    InvalidStepDivisions,

    #[error("Beats per bar must be > 0")]
    InvalidBeatsPerBar,

    #[error("Invalid BPM multiplier: {0}")]
    InvalidBpmMultiplier(f64),

    #[error("Invalid MIDI note: {0}")]
    InvalidNote(u8),

    #[error("Invalid velocity: {0}")]
    InvalidVelocity(u8),

    #[error("Step {step} already holds {max} notes")]
    PolyphonyExceeded { step: usize, max: usize },

    #[error("No note at step {0}")]
    EmptyStep(usize),

    #[error("Sequence event not found: {0}")]
    EventNotFound(EventId),

    #[error("Invalid sequence event")]
    InvalidEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayStatus {
    Stopped,
    CuedToPlay,
    Playing,
    CuedToStop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    NoRecording,
    CuedToRecord,
    Recording,
    CuedToStopRecording,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyStatus {
    Empty,
    NotEmpty,
}

/// Snapshot of a clip's derived state, read by the pad renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipStatus {
    pub play_status: PlayStatus,
    pub record_status: RecordStatus,
    pub empty_status: EmptyStatus,
    pub clip_length: f64,
    pub quantization_step: f64,
}

/// Events starting inside one step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Step {
    events: Vec<SequenceEvent>,
}

impl Step {
    pub fn events(&self) -> &[SequenceEvent] {
        &self.events
    }

    /// Note events in voice order
    pub fn notes(&self) -> impl Iterator<Item = &SequenceEvent> {
        self.events.iter().filter(|e| e.is_note())
    }

    pub fn note_count(&self) -> usize {
        self.notes().count()
    }

    pub fn is_rest(&self) -> bool {
        self.events.is_empty()
    }

    fn first_note_mut(&mut self) -> Option<&mut SequenceEvent> {
        self.events.iter_mut().find(|e| e.is_note())
    }
}

/// Raw MIDI bytes placed at a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStepEvent {
    pub step: usize,
    #[serde(default)]
    pub utime: f64,
    pub bytes: Vec<u8>,
}

/// Parallel per-step arrays (`notes[step][voice]`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepData {
    pub notes: Vec<Vec<u8>>,
    pub durations: Vec<Vec<f64>>,
    /// Velocities (0-127)
    pub amplitudes: Vec<Vec<u8>>,
    pub utimes: Vec<Vec<f64>>,
    pub chances: Vec<Vec<f32>>,
    pub raw_events: Vec<RawStepEvent>,
}

fn compute_steps(length: f64, beats_per_bar: u32, step_divisions: u32) -> usize {
    ((length / beats_per_bar as f64) * step_divisions as f64 + EPSILON).floor() as usize
}

#[derive(Debug, Clone)]
pub struct Clip {
    pub name: String,
    clip_length_in_beats: f64,
    beats_per_bar: u32,
    step_divisions: u32,
    bpm_multiplier: f64,
    current_quantization_step: f64,
    max_polyphony: usize,
    current_page: usize,
    steps: Vec<Step>,

    track_index: Option<usize>,
    scene_index: Option<usize>,

    playing: bool,
    recording: bool,
    will_play_at: f64,
    will_stop_at: f64,
    will_start_recording_at: f64,
    will_stop_recording_at: f64,
    play_started_at: f64,
    playhead_position_in_beats: f64,

    /// Set by every content or geometry edit, taken by the session to reschedule
    content_changed: bool,
}

impl Clip {
    /// One bar of 4/4 at sixteenth-note resolution, not attached to a track
    pub fn new() -> Self {
        let clip_length_in_beats = 4.0;
        let beats_per_bar = 4;
        let step_divisions = 16;
        let steps = compute_steps(clip_length_in_beats, beats_per_bar, step_divisions);

        Self {
            name: String::new(),
            clip_length_in_beats,
            beats_per_bar,
            step_divisions,
            bpm_multiplier: 1.0,
            current_quantization_step: 0.0,
            max_polyphony: DEFAULT_MAX_POLYPHONY,
            current_page: 0,
            steps: vec![Step::default(); steps],
            track_index: None,
            scene_index: None,
            playing: false,
            recording: false,
            will_play_at: NO_CUE,
            will_stop_at: NO_CUE,
            will_start_recording_at: NO_CUE,
            will_stop_recording_at: NO_CUE,
            play_started_at: 0.0,
            playhead_position_in_beats: 0.0,
            content_changed: false,
        }
    }

    pub fn with_length(clip_length_in_beats: f64) -> Result<Self, ClipError> {
        let mut clip = Self::new();
        clip.set_length(clip_length_in_beats)?;
        Ok(clip)
    }

    // ---- Owner back-references ----

    pub fn track_index(&self) -> Option<usize> {
        self.track_index
    }

    pub fn scene_index(&self) -> Option<usize> {
        self.scene_index
    }

    /// Set by the owning track when the clip is put into a slot
    pub fn attach(&mut self, track_index: usize, scene_index: usize) {
        self.track_index = Some(track_index);
        self.scene_index = Some(scene_index);
    }

    pub fn detach(&mut self) {
        self.track_index = None;
        self.scene_index = None;
    }

    /// Whether the content changed since the last call. Clears the flag.
    pub fn take_content_changed(&mut self) -> bool {
        std::mem::take(&mut self.content_changed)
    }

    fn mark_changed(&mut self) {
        self.content_changed = true;
    }

    // ---- Geometry ----

    pub fn clip_length_in_beats(&self) -> f64 {
        self.clip_length_in_beats
    }

    pub fn beats_per_bar(&self) -> u32 {
        self.beats_per_bar
    }

    pub fn step_divisions(&self) -> u32 {
        self.step_divisions
    }

    pub fn bpm_multiplier(&self) -> f64 {
        self.bpm_multiplier
    }

    pub fn current_quantization_step(&self) -> f64 {
        self.current_quantization_step
    }

    pub fn max_polyphony(&self) -> usize {
        self.max_polyphony
    }

    /// Number of steps in the table
    pub fn steps(&self) -> usize {
        self.steps.len()
    }

    pub fn step_table(&self) -> &[Step] {
        &self.steps
    }

    /// Length of one step in beats
    pub fn step_length(&self) -> f64 {
        self.beats_per_bar as f64 / self.step_divisions as f64
    }

    /// Grid pages needed to show every step
    pub fn pages(&self) -> usize {
        self.steps.len().div_ceil(GRID_WIDTH)
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn set_current_page(&mut self, page: usize) {
        self.current_page = page.min(self.pages().saturating_sub(1));
    }

    pub fn set_length(&mut self, clip_length_in_beats: f64) -> Result<(), ClipError> {
        if !(clip_length_in_beats > 0.0) || !clip_length_in_beats.is_finite() {
            return Err(ClipError::InvalidLength(clip_length_in_beats));
        }
        let old_step_length = self.step_length();
        self.clip_length_in_beats = clip_length_in_beats;
        self.resize(old_step_length);
        Ok(())
    }

    pub fn set_step_divisions(&mut self, step_divisions: u32) -> Result<(), ClipError> {
        if step_divisions == 0 {
            return Err(ClipError::InvalidStepDivisions);
        }
        let old_step_length = self.step_length();
        self.step_divisions = step_divisions;
        self.resize(old_step_length);
        Ok(())
    }

    pub fn set_beats_per_bar(&mut self, beats_per_bar: u32) -> Result<(), ClipError> {
        if beats_per_bar == 0 {
            return Err(ClipError::InvalidBeatsPerBar);
        }
        let old_step_length = self.step_length();
        self.beats_per_bar = beats_per_bar;
        self.resize(old_step_length);
        Ok(())
    }

    pub fn set_bpm_multiplier(&mut self, bpm_multiplier: f64) -> Result<(), ClipError> {
        if !(bpm_multiplier > 0.0) || !bpm_multiplier.is_finite() {
            return Err(ClipError::InvalidBpmMultiplier(bpm_multiplier));
        }
        self.bpm_multiplier = bpm_multiplier;
        self.mark_changed();
        Ok(())
    }

    /// Steps already holding more notes keep them; only new notes are limited
    pub fn set_max_polyphony(&mut self, max_polyphony: usize) {
        self.max_polyphony = max_polyphony.max(1);
    }

    /// Rebuild the table for the current geometry, keeping the overlapping prefix
    fn resize(&mut self, old_step_length: f64) {
        let count = compute_steps(self.clip_length_in_beats, self.beats_per_bar, self.step_divisions);
        self.steps.resize_with(count, Step::default);

        let step_length = self.step_length();
        for (index, step) in self.steps.iter_mut().enumerate() {
            for event in step.events.iter_mut() {
                let relative = if old_step_length > 0.0 {
                    event.utime / old_step_length
                } else {
                    0.0
                };
                event.timestamp = index as f64 * step_length;
                event.utime = relative * step_length;
            }
        }

        self.set_current_page(self.current_page);
        self.mark_changed();
    }

    // ---- Content ----

    /// Whether the clip has no events at all
    pub fn is_empty(&self) -> bool {
        self.clip_length_in_beats <= 0.0 || self.steps.iter().all(Step::is_rest)
    }

    pub fn event_count(&self) -> usize {
        self.steps.iter().map(|s| s.events.len()).sum()
    }

    fn check_position(&self, position: usize) -> Result<(), ClipError> {
        if position >= self.steps.len() {
            return Err(ClipError::OutOfRange {
                position,
                len: self.steps.len(),
            });
        }
        Ok(())
    }

    /// Normalize an event to its step: timestamp becomes the step start,
    /// the rest of the rendered start is kept as utime.
    fn locate(&self, mut event: SequenceEvent) -> Result<(usize, SequenceEvent), ClipError> {
        let count = self.steps.len();
        if count == 0 {
            return Err(ClipError::OutOfRange { position: 0, len: 0 });
        }

        let step_length = self.step_length();
        let rendered = event
            .rendered_start_timestamp()
            .rem_euclid(self.clip_length_in_beats);
        let index = ((rendered / step_length + EPSILON).floor() as usize).min(count - 1);
        let start = index as f64 * step_length;
        event.timestamp = start;
        event.utime = (rendered - start).max(0.0);

        if event.is_note() && self.steps[index].note_count() >= self.max_polyphony {
            return Err(ClipError::PolyphonyExceeded {
                step: index,
                max: self.max_polyphony,
            });
        }
        Ok((index, event))
    }

    /// Import one event; it lands in the step its rendered start falls into
    pub fn add_sequence_event(&mut self, event: SequenceEvent) -> Result<EventId, ClipError> {
        if !event.is_valid() {
            return Err(ClipError::InvalidEvent);
        }
        let (index, event) = self.locate(event)?;
        let id = event.id();
        self.steps[index].events.push(event);
        self.mark_changed();
        Ok(id)
    }

    /// Sparse export, ordered by rendered start
    pub fn sequence_events(&self) -> Vec<SequenceEvent> {
        let mut events: Vec<SequenceEvent> = self
            .steps
            .iter()
            .flat_map(|s| s.events.iter().cloned())
            .collect();
        events.sort_by(|a, b| {
            a.rendered_start_timestamp()
                .total_cmp(&b.rendered_start_timestamp())
        });
        events
    }

    fn find(&self, id: EventId) -> Option<(usize, usize)> {
        self.steps.iter().enumerate().find_map(|(step_index, step)| {
            step.events
                .iter()
                .position(|e| e.id() == id)
                .map(|event_index| (step_index, event_index))
        })
    }

    pub fn sequence_event(&self, id: EventId) -> Option<&SequenceEvent> {
        self.find(id)
            .map(|(step, index)| &self.steps[step].events[index])
    }

    pub fn remove_sequence_event(&mut self, id: EventId) -> Result<SequenceEvent, ClipError> {
        let (step, index) = self.find(id).ok_or(ClipError::EventNotFound(id))?;
        self.mark_changed();
        Ok(self.steps[step].events.remove(index))
    }

    /// Edit an event in place. The event moves if its rendered start leaves
    /// its step; on failure the clip is unchanged.
    pub fn edit_sequence_event(
        &mut self,
        id: EventId,
        edit: &SequenceEventEdit,
    ) -> Result<(), ClipError> {
        let (step, index) = self.find(id).ok_or(ClipError::EventNotFound(id))?;

        let original = self.steps[step].events.remove(index);
        let mut edited = original.clone();
        edited.apply(edit);

        let placed = if edited.is_valid() {
            self.locate(edited)
        } else {
            Err(ClipError::InvalidEvent)
        };

        match placed {
            Ok((target, event)) if target == step => {
                self.steps[step].events.insert(index, event);
                self.mark_changed();
                Ok(())
            }
            Ok((target, event)) => {
                self.steps[target].events.push(event);
                self.mark_changed();
                Ok(())
            }
            Err(e) => {
                self.steps[step].events.insert(index, original);
                Err(e)
            }
        }
    }

    /// Clear every event of one step
    pub fn remove_sequence_event_at_position(&mut self, position: usize) -> Result<usize, ClipError> {
        self.check_position(position)?;
        let removed = self.steps[position].events.len();
        self.steps[position].events.clear();
        if removed > 0 {
            self.mark_changed();
        }
        Ok(removed)
    }

    // ---- Step editing ----

    /// Add a note at a step. A note already there is updated instead.
    pub fn add_note_at_step(
        &mut self,
        step: usize,
        note: u8,
        duration: f64,
        velocity: u8,
    ) -> Result<EventId, ClipError> {
        self.check_position(step)?;
        if note > 127 {
            return Err(ClipError::InvalidNote(note));
        }
        if velocity > 127 {
            return Err(ClipError::InvalidVelocity(velocity));
        }
        if !(duration >= 0.0) || !duration.is_finite() {
            return Err(ClipError::InvalidEvent);
        }

        let amplitude = velocity as f32 / 127.0;
        if let Some(existing) = self.steps[step]
            .events
            .iter_mut()
            .find(|e| e.is_note() && e.midi_note == note)
        {
            existing.duration = duration;
            existing.midi_velocity = amplitude;
            let id = existing.id();
            self.mark_changed();
            return Ok(id);
        }

        if self.steps[step].note_count() >= self.max_polyphony {
            return Err(ClipError::PolyphonyExceeded {
                step,
                max: self.max_polyphony,
            });
        }

        let event = SequenceEvent::note(note, amplitude, step as f64 * self.step_length(), duration);
        let id = event.id();
        self.steps[step].events.push(event);
        self.mark_changed();
        Ok(id)
    }

    /// Returns whether the note was there
    pub fn remove_note_at_step(&mut self, step: usize, note: u8) -> Result<bool, ClipError> {
        self.check_position(step)?;
        let events = &mut self.steps[step].events;
        let before = events.len();
        events.retain(|e| !(e.is_note() && e.midi_note == note));
        let removed = events.len() != before;
        if removed {
            self.mark_changed();
        }
        Ok(removed)
    }

    pub fn has_note_at_step(&self, step: usize, note: u8) -> bool {
        self.steps
            .get(step)
            .is_some_and(|s| s.notes().any(|e| e.midi_note == note))
    }

    pub fn notes_at_step(&self, step: usize) -> Vec<u8> {
        self.steps
            .get(step)
            .map(|s| s.notes().map(|e| e.midi_note).collect())
            .unwrap_or_default()
    }

    /// Pad press on the step grid. Returns whether the note is now present.
    pub fn toggle_note_at_step(
        &mut self,
        step: usize,
        note: u8,
        duration: f64,
        velocity: u8,
    ) -> Result<bool, ClipError> {
        if self.has_note_at_step(step, note) {
            self.remove_note_at_step(step, note)?;
            Ok(false)
        } else {
            self.add_note_at_step(step, note, duration, velocity)?;
            Ok(true)
        }
    }

    // ---- Position accessors (first voice of a step) ----

    pub fn get_note_at_position(&self, position: usize) -> Result<Option<u8>, ClipError> {
        self.check_position(position)?;
        Ok(self.steps[position].notes().next().map(|e| e.midi_note))
    }

    pub fn get_duration_at_position(&self, position: usize) -> Result<Option<f64>, ClipError> {
        self.check_position(position)?;
        Ok(self.steps[position].notes().next().map(|e| e.duration))
    }

    pub fn get_amplitude_at_position(&self, position: usize) -> Result<Option<u8>, ClipError> {
        self.check_position(position)?;
        Ok(self.steps[position].notes().next().map(|e| e.velocity_u8()))
    }

    /// Replace the first voice's note, or place a new one-step note
    pub fn set_note_at_position(&mut self, position: usize, note: u8) -> Result<EventId, ClipError> {
        self.check_position(position)?;
        if note > 127 {
            return Err(ClipError::InvalidNote(note));
        }
        if let Some(existing) = self.steps[position].first_note_mut() {
            existing.midi_note = note;
            let id = existing.id();
            self.mark_changed();
            return Ok(id);
        }
        let duration = self.step_length();
        self.add_note_at_step(position, note, duration, DEFAULT_VELOCITY)
    }

    pub fn set_duration_at_position(&mut self, position: usize, duration: f64) -> Result<(), ClipError> {
        self.check_position(position)?;
        if !(duration >= 0.0) || !duration.is_finite() {
            return Err(ClipError::InvalidEvent);
        }
        let event = self.steps[position]
            .first_note_mut()
            .ok_or(ClipError::EmptyStep(position))?;
        event.duration = duration;
        self.mark_changed();
        Ok(())
    }

    pub fn set_amplitude_at_position(&mut self, position: usize, amplitude: u8) -> Result<(), ClipError> {
        self.check_position(position)?;
        if amplitude > 127 {
            return Err(ClipError::InvalidVelocity(amplitude));
        }
        let event = self.steps[position]
            .first_note_mut()
            .ok_or(ClipError::EmptyStep(position))?;
        event.midi_velocity = amplitude as f32 / 127.0;
        self.mark_changed();
        Ok(())
    }

    // ---- Parallel array export/import ----

    fn per_step<T>(&self, value: impl Fn(&SequenceEvent) -> T) -> Vec<Vec<T>> {
        self.steps
            .iter()
            .map(|s| s.notes().map(&value).collect())
            .collect()
    }

    pub fn notes(&self) -> Vec<Vec<u8>> {
        self.per_step(|e| e.midi_note)
    }

    pub fn durations(&self) -> Vec<Vec<f64>> {
        self.per_step(|e| e.duration)
    }

    pub fn amplitudes(&self) -> Vec<Vec<u8>> {
        self.per_step(|e| e.velocity_u8())
    }

    pub fn step_data(&self) -> StepData {
        let raw_events = self
            .steps
            .iter()
            .enumerate()
            .flat_map(|(index, step)| {
                step.events
                    .iter()
                    .filter(|e| !e.is_note())
                    .map(move |e| RawStepEvent {
                        step: index,
                        utime: e.utime,
                        bytes: e.midi_bytes.clone(),
                    })
            })
            .collect();

        StepData {
            notes: self.notes(),
            durations: self.durations(),
            amplitudes: self.amplitudes(),
            utimes: self.per_step(|e| e.utime),
            chances: self.per_step(|e| e.chance),
            raw_events,
        }
    }

    /// Replace the whole content from parallel arrays.
    ///
    /// Missing durations default to one step, missing amplitudes to
    /// `DEFAULT_VELOCITY`. Steps beyond the table are an error; nothing is
    /// changed unless every entry is valid.
    pub fn load_step_data(&mut self, data: &StepData) -> Result<(), ClipError> {
        let count = self.steps.len();
        let step_length = self.step_length();
        let mut table = vec![Step::default(); count];

        for (index, notes) in data.notes.iter().enumerate() {
            if notes.is_empty() {
                continue;
            }
            if index >= count {
                return Err(ClipError::OutOfRange { position: index, len: count });
            }
            if notes.len() > self.max_polyphony {
                return Err(ClipError::PolyphonyExceeded {
                    step: index,
                    max: self.max_polyphony,
                });
            }

            for (voice, &note) in notes.iter().enumerate() {
                if note > 127 {
                    return Err(ClipError::InvalidNote(note));
                }
                let duration = voice_value(&data.durations, index, voice).unwrap_or(step_length);
                let amplitude = voice_value(&data.amplitudes, index, voice).unwrap_or(DEFAULT_VELOCITY);
                if amplitude > 127 {
                    return Err(ClipError::InvalidVelocity(amplitude));
                }
                let utime = voice_value(&data.utimes, index, voice).unwrap_or(0.0);
                let chance = voice_value(&data.chances, index, voice).unwrap_or(1.0);

                let event = SequenceEvent::note(
                    note,
                    amplitude as f32 / 127.0,
                    index as f64 * step_length,
                    duration,
                )
                .with_utime(utime)
                .with_chance(chance);
                if !event.is_valid() {
                    return Err(ClipError::InvalidEvent);
                }
                table[index].events.push(event);
            }
        }

        for raw in data.raw_events.iter() {
            if raw.step >= count {
                return Err(ClipError::OutOfRange {
                    position: raw.step,
                    len: count,
                });
            }
            let event = SequenceEvent::raw(raw.bytes.clone(), raw.step as f64 * step_length)
                .with_utime(raw.utime);
            if !event.is_valid() {
                return Err(ClipError::InvalidEvent);
            }
            table[raw.step].events.push(event);
        }

        self.steps = table;
        self.mark_changed();
        Ok(())
    }

    // ---- Whole-clip operations ----

    /// Remove all content, play state untouched
    pub fn clear(&mut self) {
        for step in self.steps.iter_mut() {
            step.events.clear();
        }
        self.mark_changed();
    }

    /// Double the length and repeat the content in the second half
    pub fn double(&mut self) {
        let original = self.steps.len();
        self.clip_length_in_beats *= 2.0;
        let count = compute_steps(self.clip_length_in_beats, self.beats_per_bar, self.step_divisions);
        self.steps.resize_with(count, Step::default);

        let step_length = self.step_length();
        for index in 0..original {
            let target = index + original;
            if target >= count {
                break;
            }
            let copies: Vec<SequenceEvent> = self.steps[index]
                .events
                .iter()
                .map(|e| {
                    let mut copy = e.duplicate();
                    copy.timestamp = target as f64 * step_length;
                    copy
                })
                .collect();
            self.steps[target].events.extend(copies);
        }
        self.mark_changed();
    }

    /// Snap every event's rendered start to the nearest multiple of
    /// `quantization_step` beats. 0 turns quantization off and leaves
    /// content alone. Returns the number of notes dropped because their
    /// target step was full.
    pub fn quantize(&mut self, quantization_step: f64) -> usize {
        if !(quantization_step > 0.0) || !quantization_step.is_finite() {
            self.current_quantization_step = 0.0;
            return 0;
        }
        self.current_quantization_step = quantization_step;

        let events: Vec<SequenceEvent> = self
            .steps
            .iter_mut()
            .flat_map(|s| std::mem::take(&mut s.events))
            .collect();

        let mut dropped = 0;
        for mut event in events {
            let snapped = (event.rendered_start_timestamp() / quantization_step).round()
                * quantization_step;
            event.timestamp = snapped;
            event.utime = 0.0;
            match self.locate(event) {
                Ok((index, event)) => self.steps[index].events.push(event),
                Err(e) => {
                    log::warn!("Quantize dropped an event: {}", e);
                    dropped += 1;
                }
            }
        }
        self.mark_changed();
        dropped
    }

    /// Next value on the quantization ladder (0 -> 1/4 -> 1/2 -> 1 -> 0)
    pub fn next_quantization_step(current: f64) -> f64 {
        let position = QUANTIZATION_STEPS
            .iter()
            .position(|&q| (q - current).abs() < EPSILON);
        match position {
            Some(index) => QUANTIZATION_STEPS[(index + 1) % QUANTIZATION_STEPS.len()],
            None => QUANTIZATION_STEPS[0],
        }
    }

    /// Advance the quantization ladder and apply it
    pub fn cycle_quantization(&mut self) -> f64 {
        let next = Self::next_quantization_step(self.current_quantization_step);
        self.quantize(next);
        next
    }

    /// Record the quantization setting without touching content (project load)
    pub fn set_quantization_step(&mut self, quantization_step: f64) {
        self.current_quantization_step = if quantization_step > 0.0 && quantization_step.is_finite() {
            quantization_step
        } else {
            0.0
        };
    }

    // ---- Play / record state ----

    pub fn playing(&self) -> bool {
        self.playing
    }

    pub fn recording(&self) -> bool {
        self.recording
    }

    pub fn will_play_at(&self) -> f64 {
        self.will_play_at
    }

    pub fn will_stop_at(&self) -> f64 {
        self.will_stop_at
    }

    pub fn will_start_recording_at(&self) -> f64 {
        self.will_start_recording_at
    }

    pub fn will_stop_recording_at(&self) -> f64 {
        self.will_stop_recording_at
    }

    pub fn play_started_at(&self) -> f64 {
        self.play_started_at
    }

    pub fn playhead_position_in_beats(&self) -> f64 {
        self.playhead_position_in_beats
    }

    /// Cue to play as soon as possible. Ignored for a clip without a track.
    ///
    /// This only records the request (`will_play_at == 0.0`). The session
    /// turns it into a real launch: `Session::play_clip` does so right away,
    /// and a request made on the clip directly is picked up by the next
    /// `Session::check_for_delayed_actions`.
    pub fn play(&mut self) -> bool {
        if self.track_index.is_none() {
            return false;
        }
        self.will_play_at = ASAP_CUE;
        true
    }

    /// Cue to stop as soon as possible. Ignored for a clip without a track.
    /// Resolved by the session the same way as `play`.
    pub fn stop(&mut self) -> bool {
        if self.track_index.is_none() {
            return false;
        }
        self.will_stop_at = ASAP_CUE;
        true
    }

    pub fn play_stop(&mut self) -> bool {
        if self.playing { self.stop() } else { self.play() }
    }

    /// Toggle recording right away (recording is never cued)
    pub fn record_on_off(&mut self) -> bool {
        if self.track_index.is_none() {
            return false;
        }
        self.recording = !self.recording;
        true
    }

    pub fn cue_play(&mut self, at_beat: f64) {
        self.will_play_at = at_beat.max(0.0);
    }

    pub fn cue_stop(&mut self, at_beat: f64) {
        self.will_stop_at = at_beat.max(0.0);
    }

    pub fn cue_record(&mut self, at_beat: f64) {
        self.will_start_recording_at = at_beat.max(0.0);
    }

    pub fn cue_stop_recording(&mut self, at_beat: f64) {
        self.will_stop_recording_at = at_beat.max(0.0);
    }

    /// A play request from `play` that no launch has picked up yet
    pub fn has_unresolved_play(&self) -> bool {
        self.will_play_at == ASAP_CUE
    }

    pub fn has_unresolved_stop(&self) -> bool {
        self.will_stop_at == ASAP_CUE
    }

    pub fn cancel_cues(&mut self) {
        self.will_play_at = NO_CUE;
        self.will_stop_at = NO_CUE;
        self.will_start_recording_at = NO_CUE;
        self.will_stop_recording_at = NO_CUE;
    }

    /// Enter the playing state at `at_beat` (resolves a play cue)
    pub fn start_playing(&mut self, at_beat: f64) {
        self.playing = true;
        self.will_play_at = NO_CUE;
        self.play_started_at = at_beat;
        self.playhead_position_in_beats = 0.0;
    }

    /// Leave the playing state (resolves a stop cue)
    pub fn stop_playing(&mut self) {
        self.playing = false;
        self.will_stop_at = NO_CUE;
        self.playhead_position_in_beats = 0.0;
    }

    /// Recompute the playhead from the transport position
    pub fn update_playhead_position(&mut self, current_beat: f64) -> f64 {
        if self.playing {
            let elapsed = (current_beat - self.play_started_at).max(0.0) * self.bpm_multiplier;
            self.playhead_position_in_beats = elapsed.rem_euclid(self.clip_length_in_beats);
        }
        self.playhead_position_in_beats
    }

    /// Step index under the playhead
    pub fn playhead_step(&self) -> usize {
        let step = (self.playhead_position_in_beats / self.step_length() + EPSILON).floor() as usize;
        step.min(self.steps.len().saturating_sub(1))
    }

    pub fn get_status(&self) -> ClipStatus {
        let record_status = if self.will_start_recording_at >= 0.0 {
            RecordStatus::CuedToRecord
        } else if self.will_stop_recording_at >= 0.0 {
            RecordStatus::CuedToStopRecording
        } else if self.recording {
            RecordStatus::Recording
        } else {
            RecordStatus::NoRecording
        };

        let play_status = if self.will_play_at >= 0.0 {
            PlayStatus::CuedToPlay
        } else if self.will_stop_at >= 0.0 {
            PlayStatus::CuedToStop
        } else if self.playing {
            PlayStatus::Playing
        } else {
            PlayStatus::Stopped
        };

        let empty_status = if self.is_empty() {
            EmptyStatus::Empty
        } else {
            EmptyStatus::NotEmpty
        };

        ClipStatus {
            play_status,
            record_status,
            empty_status,
            clip_length: self.clip_length_in_beats,
            quantization_step: self.current_quantization_step,
        }
    }
}

impl Default for Clip {
    fn default() -> Self {
        Self::new()
    }
}

fn voice_value<T: Copy>(values: &[Vec<T>], step: usize, voice: usize) -> Option<T> {
    values.get(step).and_then(|v| v.get(voice)).copied()
}

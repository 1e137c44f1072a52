// Sequence events - Timed notes and raw MIDI inside a clip
// Timestamps are in beats, relative to the clip start.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Process-unique identifier of a sequence event
pub type EventId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SequenceEventKind {
    Note,
    MidiRaw,
}

/// One timed event belonging to a clip
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceEvent {
    id: EventId,
    pub kind: SequenceEventKind,
    pub midi_note: u8,
    /// Velocity (0.0 - 1.0)
    pub midi_velocity: f32,
    pub timestamp: f64,
    pub duration: f64,
    /// Micro-timing offset added to `timestamp`
    pub utime: f64,
    /// Probability of firing (0.0 - 1.0)
    pub chance: f32,
    pub midi_bytes: Vec<u8>,
}

impl SequenceEvent {
    /// Create a note event
    pub fn note(midi_note: u8, midi_velocity: f32, timestamp: f64, duration: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: SequenceEventKind::Note,
            midi_note: midi_note.min(127),
            midi_velocity: midi_velocity.clamp(0.0, 1.0),
            timestamp,
            duration: duration.max(0.0),
            utime: 0.0,
            chance: 1.0,
            midi_bytes: Vec::new(),
        }
    }

    /// Create a raw MIDI event
    pub fn raw(midi_bytes: Vec<u8>, timestamp: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: SequenceEventKind::MidiRaw,
            midi_note: 0,
            midi_velocity: 0.0,
            timestamp,
            duration: 0.0,
            utime: 0.0,
            chance: 1.0,
            midi_bytes,
        }
    }

    pub fn with_utime(mut self, utime: f64) -> Self {
        self.utime = utime;
        self
    }

    pub fn with_chance(mut self, chance: f32) -> Self {
        self.chance = chance.clamp(0.0, 1.0);
        self
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    /// Same content under a fresh identifier
    pub fn duplicate(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            ..self.clone()
        }
    }

    pub fn is_note(&self) -> bool {
        self.kind == SequenceEventKind::Note
    }

    pub fn rendered_start_timestamp(&self) -> f64 {
        self.timestamp + self.utime
    }

    pub fn rendered_end_timestamp(&self) -> f64 {
        self.rendered_start_timestamp() + self.duration
    }

    /// Velocity on the MIDI 0-127 scale
    pub fn velocity_u8(&self) -> u8 {
        (self.midi_velocity.clamp(0.0, 1.0) * 127.0).round() as u8
    }

    /// Check the event invariants
    pub fn is_valid(&self) -> bool {
        self.duration >= 0.0
            && self.duration.is_finite()
            && self.timestamp.is_finite()
            && self.utime.is_finite()
            && (0.0..=1.0).contains(&self.chance)
            && (0.0..=1.0).contains(&self.midi_velocity)
            && self.midi_note <= 127
            && (self.kind == SequenceEventKind::Note || !self.midi_bytes.is_empty())
    }

    /// Apply an edit. Note-only fields are ignored on raw events and vice versa.
    pub fn apply(&mut self, edit: &SequenceEventEdit) {
        if let Some(timestamp) = edit.timestamp {
            self.timestamp = timestamp;
        }
        if let Some(utime) = edit.utime {
            self.utime = utime;
        }

        match self.kind {
            SequenceEventKind::Note => {
                if let Some(note) = edit.midi_note {
                    self.midi_note = note.min(127);
                }
                if let Some(velocity) = edit.midi_velocity {
                    self.midi_velocity = velocity.clamp(0.0, 1.0);
                }
                if let Some(duration) = edit.duration {
                    self.duration = duration.max(0.0);
                }
                if let Some(chance) = edit.chance {
                    self.chance = chance.clamp(0.0, 1.0);
                }
            }
            SequenceEventKind::MidiRaw => {
                if let Some(bytes) = &edit.midi_bytes {
                    self.midi_bytes = bytes.clone();
                }
            }
        }
    }
}

/// Partial update of a sequence event; `None` fields are left alone
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequenceEventEdit {
    pub midi_note: Option<u8>,
    pub midi_velocity: Option<f32>,
    pub timestamp: Option<f64>,
    pub duration: Option<f64>,
    pub utime: Option<f64>,
    pub chance: Option<f32>,
    pub midi_bytes: Option<Vec<u8>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rendered_timestamps() {
        let event = SequenceEvent::note(60, 0.8, 1.0, 0.5).with_utime(0.1);
        assert!((event.rendered_start_timestamp() - 1.1).abs() < 1e-9);
        assert!((event.rendered_end_timestamp() - 1.6).abs() < 1e-9);
        assert!(event.rendered_end_timestamp() >= event.rendered_start_timestamp());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = SequenceEvent::note(60, 1.0, 0.0, 0.25);
        let b = a.duplicate();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.midi_note, b.midi_note);
    }

    #[test]
    fn test_constructor_clamps() {
        let event = SequenceEvent::note(200, 1.5, 0.0, -1.0).with_chance(2.0);
        assert_eq!(event.midi_note, 127);
        assert_eq!(event.midi_velocity, 1.0);
        assert_eq!(event.duration, 0.0);
        assert_eq!(event.chance, 1.0);
        assert!(event.is_valid());
    }

    #[test]
    fn test_velocity_u8() {
        assert_eq!(SequenceEvent::note(60, 1.0, 0.0, 0.25).velocity_u8(), 127);
        assert_eq!(SequenceEvent::note(60, 0.0, 0.0, 0.25).velocity_u8(), 0);
    }

    #[test]
    fn test_edit_note_event() {
        let mut event = SequenceEvent::note(60, 0.5, 0.0, 0.25);
        event.apply(&SequenceEventEdit {
            midi_note: Some(64),
            duration: Some(1.0),
            utime: Some(0.05),
            midi_bytes: Some(vec![0xF8]),
            ..Default::default()
        });

        assert_eq!(event.midi_note, 64);
        assert_eq!(event.duration, 1.0);
        assert_eq!(event.utime, 0.05);
        assert!(event.midi_bytes.is_empty());
    }

    #[test]
    fn test_edit_raw_event_ignores_note_fields() {
        let mut event = SequenceEvent::raw(vec![0xB0, 7, 100], 2.0);
        event.apply(&SequenceEventEdit {
            midi_note: Some(64),
            chance: Some(0.5),
            timestamp: Some(3.0),
            midi_bytes: Some(vec![0xB0, 7, 50]),
            ..Default::default()
        });

        assert_eq!(event.midi_note, 0);
        assert_eq!(event.chance, 1.0);
        assert_eq!(event.timestamp, 3.0);
        assert_eq!(event.midi_bytes, vec![0xB0, 7, 50]);
    }

    #[test]
    fn test_raw_event_without_bytes_is_invalid() {
        assert!(!SequenceEvent::raw(Vec::new(), 0.0).is_valid());
    }
}

// MIDI message types sent to output devices

/// A channel voice message (or raw bytes) addressed to one output device.
///
/// Channels are 0-based (0-15); the status nibble carries them on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    Raw(Vec<u8>),
}

impl MidiMessage {
    /// Encode the message as wire bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => vec![0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F],
            MidiMessage::NoteOff { channel, note } => {
                vec![0x80 | (channel & 0x0F), note & 0x7F, 0]
            }
            MidiMessage::ControlChange {
                channel,
                controller,
                value,
            } => vec![0xB0 | (channel & 0x0F), controller & 0x7F, value & 0x7F],
            MidiMessage::Raw(bytes) => bytes.clone(),
        }
    }

    /// Parse a raw MIDI message
    ///
    /// Note-on with velocity 0 is decoded as note-off. Anything that is not a
    /// complete note or CC message is kept as `Raw`.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.is_empty() {
            return None;
        }

        let status = bytes[0];
        let channel = status & 0x0F;

        match (status & 0xF0, bytes.len() >= 3) {
            (0x90, true) => {
                let note = bytes[1];
                let velocity = bytes[2];
                // Velocity 0 = Note Off
                if velocity == 0 {
                    Some(MidiMessage::NoteOff { channel, note })
                } else {
                    Some(MidiMessage::NoteOn {
                        channel,
                        note,
                        velocity,
                    })
                }
            }
            (0x80, true) => Some(MidiMessage::NoteOff {
                channel,
                note: bytes[1],
            }),
            (0xB0, true) => Some(MidiMessage::ControlChange {
                channel,
                controller: bytes[1],
                value: bytes[2],
            }),
            _ => Some(MidiMessage::Raw(bytes.to_vec())),
        }
    }

    pub fn is_note_on(&self) -> bool {
        matches!(self, MidiMessage::NoteOn { .. })
    }

    pub fn is_note_off(&self) -> bool {
        matches!(self, MidiMessage::NoteOff { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_on() {
        let bytes = [0x90, 60, 100]; // Note On, note 60 (C4), velocity 100
        let event = MidiMessage::from_bytes(&bytes).unwrap();

        assert_eq!(
            event,
            MidiMessage::NoteOn {
                channel: 0,
                note: 60,
                velocity: 100
            }
        );
        assert_eq!(event.to_bytes(), bytes.to_vec());
    }

    #[test]
    fn test_note_off_velocity_zero() {
        let bytes = [0x93, 64, 0];
        let event = MidiMessage::from_bytes(&bytes).unwrap();

        assert_eq!(event, MidiMessage::NoteOff { channel: 3, note: 64 });
    }

    #[test]
    fn test_channel_in_status_byte() {
        let message = MidiMessage::NoteOn {
            channel: 15,
            note: 60,
            velocity: 100,
        };
        assert_eq!(message.to_bytes(), vec![0x9F, 60, 100]);

        let cc = MidiMessage::ControlChange {
            channel: 2,
            controller: 7,
            value: 127,
        };
        assert_eq!(cc.to_bytes(), vec![0xB2, 7, 127]);
    }

    #[test]
    fn test_out_of_range_data_bytes_are_masked() {
        let message = MidiMessage::NoteOn {
            channel: 0,
            note: 200,
            velocity: 255,
        };
        let bytes = message.to_bytes();
        assert!(bytes[1] <= 127);
        assert!(bytes[2] <= 127);
    }

    #[test]
    fn test_unknown_status_kept_raw() {
        let bytes = [0xF8]; // Timing clock
        let event = MidiMessage::from_bytes(&bytes).unwrap();
        assert_eq!(event, MidiMessage::Raw(vec![0xF8]));

        let incomplete = [0x90, 60]; // Note On without velocity
        assert_eq!(
            MidiMessage::from_bytes(&incomplete),
            Some(MidiMessage::Raw(vec![0x90, 60]))
        );
    }

    #[test]
    fn test_invalid_empty_message() {
        assert!(MidiMessage::from_bytes(&[]).is_none());
    }
}

//! Note and controller events.
//!
//! The engine does not parse a MIDI stream. A host hands it a slice of
//! [`MidiEvent`]s per block, each stamped with the frame it lands on.
//! [`MidiMessage::from_bytes`] decodes one short channel message for
//! hosts that receive raw bytes.

/// Mod wheel controller.
pub const CC_MOD_WHEEL: u8 = 1;
/// Sustain pedal controller.
pub const CC_SUSTAIN: u8 = 64;
/// All sound off controller.
pub const CC_ALL_SOUND_OFF: u8 = 120;
/// All notes off controller.
pub const CC_ALL_NOTES_OFF: u8 = 123;

const DEFAULT_RELEASE_VELOCITY: u8 = 64;

/// A decoded channel message. Continuous values are normalised.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MidiMessage {
    /// Key pressed
    NoteOn {
        /// Key, 0..=127
        note: u8,
        /// Velocity, 0..=1
        velocity: f32,
    },
    /// Key released
    NoteOff {
        /// Key, 0..=127
        note: u8,
        /// Release velocity, 0..=1
        velocity: f32,
    },
    /// Controller change
    ControlChange {
        /// Controller number
        controller: u8,
        /// Value, 0..=1
        value: f32,
    },
    /// Pitch wheel, -1..=1
    PitchBend(f32),
    /// Channel or key pressure, 0..=1
    Aftertouch(f32),
    /// Release every held note
    AllNotesOff,
    /// Silence every voice now
    AllSoundOff,
}

impl MidiMessage {
    /// Decode a channel voice message. The channel nibble is ignored.
    ///
    /// A note-on with velocity 0 is a note-off with the default release
    /// velocity of 64.
    ///
    /// ```rust
    /// use timbre_synth::MidiMessage;
    ///
    /// assert_eq!(
    ///     MidiMessage::from_bytes(&[0x80, 60, 127]),
    ///     Some(MidiMessage::NoteOff { note: 60, velocity: 1.0 })
    /// );
    /// assert_eq!(
    ///     MidiMessage::from_bytes(&[0xE0, 0x00, 0x40]),
    ///     Some(MidiMessage::PitchBend(0.0))
    /// );
    /// assert_eq!(MidiMessage::from_bytes(&[0xF8]), None);
    /// ```
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let (&status, data) = bytes.split_first()?;
        let data1 = data.first().copied().map(|b| b & 0x7F);
        let data2 = data.get(1).copied().map(|b| b & 0x7F);

        match status & 0xF0 {
            0x80 => Some(MidiMessage::NoteOff {
                note: data1?,
                velocity: f32::from(data2?) / 127.0,
            }),
            0x90 => {
                let (note, velocity) = (data1?, data2?);
                if velocity == 0 {
                    Some(MidiMessage::NoteOff {
                        note,
                        velocity: f32::from(DEFAULT_RELEASE_VELOCITY) / 127.0,
                    })
                } else {
                    Some(MidiMessage::NoteOn {
                        note,
                        velocity: f32::from(velocity) / 127.0,
                    })
                }
            }
            // Polyphonic pressure is treated as channel pressure.
            0xA0 => Some(MidiMessage::Aftertouch(f32::from(data2?) / 127.0)),
            0xB0 => {
                let (controller, value) = (data1?, data2?);
                Some(match controller {
                    CC_ALL_SOUND_OFF => MidiMessage::AllSoundOff,
                    CC_ALL_NOTES_OFF => MidiMessage::AllNotesOff,
                    _ => MidiMessage::ControlChange {
                        controller,
                        value: f32::from(value) / 127.0,
                    },
                })
            }
            0xD0 => Some(MidiMessage::Aftertouch(f32::from(data1?) / 127.0)),
            0xE0 => {
                let raw = (u16::from(data2?) << 7) | u16::from(data1?);
                let bend = (f32::from(raw) - 8192.0) / 8192.0;
                Some(MidiMessage::PitchBend(bend.max(-1.0)))
            }
            _ => None,
        }
    }
}

/// A message at a frame offset within the current block.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MidiEvent {
    /// Frame within the block, 0-based
    pub frame: u32,
    /// The message
    pub message: MidiMessage,
}

impl MidiEvent {
    /// Event at `frame`.
    pub fn new(frame: u32, message: MidiMessage) -> Self {
        Self { frame, message }
    }

    /// Note-on at `frame`.
    pub fn note_on(frame: u32, note: u8, velocity: f32) -> Self {
        Self::new(frame, MidiMessage::NoteOn { note, velocity })
    }

    /// Note-off at `frame`.
    pub fn note_off(frame: u32, note: u8, velocity: f32) -> Self {
        Self::new(frame, MidiMessage::NoteOff { note, velocity })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_notes_on_any_channel() {
        assert_eq!(
            MidiMessage::from_bytes(&[0x93, 64, 127]),
            Some(MidiMessage::NoteOn {
                note: 64,
                velocity: 1.0
            })
        );
        assert_eq!(
            MidiMessage::from_bytes(&[0x8F, 64, 127]),
            Some(MidiMessage::NoteOff {
                note: 64,
                velocity: 1.0
            })
        );
    }

    #[test]
    fn note_off_keeps_release_velocity() {
        let Some(MidiMessage::NoteOff { note, velocity }) =
            MidiMessage::from_bytes(&[0x80, 61, 30])
        else {
            panic!("expected note-off");
        };
        assert_eq!(note, 61);
        assert!((velocity - 30.0 / 127.0).abs() < 1e-6);

        let Some(MidiMessage::NoteOff { velocity, .. }) = MidiMessage::from_bytes(&[0x90, 61, 0])
        else {
            panic!("expected note-off");
        };
        assert!((velocity - 64.0 / 127.0).abs() < 1e-6);

        assert_eq!(MidiMessage::from_bytes(&[0x80, 61]), None);
        assert_eq!(
            MidiEvent::note_off(12, 61, 0.25).message,
            MidiMessage::NoteOff {
                note: 61,
                velocity: 0.25
            }
        );
    }

    #[test]
    fn channel_mode_controllers() {
        assert_eq!(
            MidiMessage::from_bytes(&[0xB0, 120, 0]),
            Some(MidiMessage::AllSoundOff)
        );
        assert_eq!(
            MidiMessage::from_bytes(&[0xB0, 123, 0]),
            Some(MidiMessage::AllNotesOff)
        );
        assert_eq!(
            MidiMessage::from_bytes(&[0xB0, CC_SUSTAIN, 127]),
            Some(MidiMessage::ControlChange {
                controller: CC_SUSTAIN,
                value: 1.0
            })
        );
    }

    #[test]
    fn pitch_bend_extremes() {
        assert_eq!(
            MidiMessage::from_bytes(&[0xE0, 0, 0]),
            Some(MidiMessage::PitchBend(-1.0))
        );
        let Some(MidiMessage::PitchBend(up)) = MidiMessage::from_bytes(&[0xE0, 0x7F, 0x7F]) else {
            panic!("expected pitch bend");
        };
        assert!((up - 1.0).abs() < 1e-3);
    }

    #[test]
    fn truncated_and_system_messages_are_ignored() {
        assert_eq!(MidiMessage::from_bytes(&[]), None);
        assert_eq!(MidiMessage::from_bytes(&[0x90, 60]), None);
        assert_eq!(MidiMessage::from_bytes(&[0xF0, 1, 2]), None);
        assert_eq!(
            MidiMessage::from_bytes(&[0xD0, 64]),
            Some(MidiMessage::Aftertouch(64.0 / 127.0))
        );
    }
}

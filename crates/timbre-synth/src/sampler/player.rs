//! Fixed-size pool of sample voices driven by one instrument.

#[cfg(test)]
#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(test)]
#[cfg(feature = "std")]
extern crate std as alloc;

use timbre_core::SvfType;

use super::instrument::SampleInstrument;
use super::voice::SamplePlayerVoice;
use crate::midi::{CC_SUSTAIN, MidiMessage};
use crate::params::EnvParams;

/// A polyphonic sampler with `N` voices.
///
/// Voices hold zone handles into the loaded instrument.
/// [`set_instrument`](Self::set_instrument) kills every voice before the
/// old instrument is handed back, and bumps a generation counter that
/// voices carry, so a voice never reads through a handle from a
/// previous instrument.
///
/// ```rust
/// use std::sync::Arc;
/// use timbre_synth::sampler::{SampleBuffer, SampleInstrument, SamplePlayer, SampleZone};
///
/// let tone: Vec<f32> = (0..4800).map(|i| (i as f32 * 0.05).sin()).collect();
/// let buffer = Arc::new(SampleBuffer::mono(tone, 48000.0).unwrap());
/// let mut inst = SampleInstrument::new();
/// let layer = inst.add_layer();
/// inst.add_zone(layer, SampleZone::new(buffer, 60)).unwrap();
///
/// let mut player: SamplePlayer<8> = SamplePlayer::new(48000.0);
/// player.set_instrument(Some(inst));
/// player.note_on(64, 0.9);
///
/// let (mut l, mut r) = ([0.0f32; 256], [0.0f32; 256]);
/// player.render(&mut l, &mut r);
/// assert!(l.iter().any(|&s| s != 0.0));
/// assert_eq!(player.active_voice_count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct SamplePlayer<const N: usize> {
    voices: [SamplePlayerVoice; N],
    instrument: Option<SampleInstrument>,
    generation: u32,
    stamp: u64,
    sustain: bool,
    held: [bool; N],
    gain: f32,
}

impl<const N: usize> SamplePlayer<N> {
    /// Empty player. Silent until an instrument is loaded.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            voices: core::array::from_fn(|_| SamplePlayerVoice::new(sample_rate)),
            instrument: None,
            generation: 0,
            stamp: 0,
            sustain: false,
            held: [false; N],
            gain: 1.0,
        }
    }

    /// Swap the instrument and return the previous one.
    ///
    /// Every voice is silenced first. Dropping the returned instrument is
    /// the caller's business, off the audio thread if it matters.
    pub fn set_instrument(&mut self, instrument: Option<SampleInstrument>) -> Option<SampleInstrument> {
        for voice in &mut self.voices {
            voice.kill();
        }
        self.held = [false; N];
        self.generation = self.generation.wrapping_add(1);

        #[cfg(feature = "tracing")]
        tracing::info!(
            generation = self.generation,
            zones = instrument.as_ref().map_or(0, |i| i.zones().len()),
            "sample instrument swapped"
        );

        core::mem::replace(&mut self.instrument, instrument)
    }

    /// Loaded instrument.
    pub fn instrument(&self) -> Option<&SampleInstrument> {
        self.instrument.as_ref()
    }

    /// Mutable access to the loaded instrument, e.g. to reset round robin.
    pub fn instrument_mut(&mut self) -> Option<&mut SampleInstrument> {
        self.instrument.as_mut()
    }

    /// Current instrument generation.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Start every zone the instrument picks for `note`.
    pub fn note_on(&mut self, note: u8, velocity: f32) {
        if velocity <= 0.0 {
            self.note_off(note);
            return;
        }
        let Some(instrument) = self.instrument.as_mut() else {
            return;
        };
        let selection = instrument.trigger(note, velocity);
        for id in selection.iter() {
            let Some(zone) = instrument.zone(id) else {
                continue;
            };
            let index = pick_voice(&self.voices);
            self.stamp += 1;
            let voice = &mut self.voices[index];
            voice.set_age(self.stamp);
            voice.start(id, zone, self.generation, note, velocity);
            self.held[index] = false;
        }
    }

    /// Release every voice playing `note`, or hold it while the pedal is down.
    pub fn note_off(&mut self, note: u8) {
        for (voice, held) in self.voices.iter_mut().zip(self.held.iter_mut()) {
            if voice.is_active() && voice.note() == note && !voice.is_releasing() {
                if self.sustain {
                    *held = true;
                } else {
                    voice.note_off();
                }
            }
        }
    }

    /// Sustain pedal. Lifting it releases every held voice.
    pub fn set_sustain(&mut self, down: bool) {
        self.sustain = down;
        if down {
            return;
        }
        for (voice, held) in self.voices.iter_mut().zip(self.held.iter_mut()) {
            if core::mem::take(held) {
                voice.note_off();
            }
        }
    }

    /// Apply a MIDI message.
    pub fn handle_midi(&mut self, message: &MidiMessage) {
        match *message {
            MidiMessage::NoteOn { note, velocity } => self.note_on(note, velocity),
            MidiMessage::NoteOff { note, .. } => self.note_off(note),
            MidiMessage::ControlChange { controller, value } if controller == CC_SUSTAIN => {
                self.set_sustain(value >= 0.5);
            }
            MidiMessage::AllNotesOff => {
                self.sustain = false;
                self.held = [false; N];
                for voice in &mut self.voices {
                    voice.note_off();
                }
            }
            MidiMessage::AllSoundOff => self.reset(),
            _ => {}
        }
    }

    /// Amplitude envelope for every voice.
    pub fn set_envelope(&mut self, params: &EnvParams) {
        for voice in &mut self.voices {
            voice.set_envelope(params);
        }
    }

    /// Per-voice filter as `(type, cutoff_hz, resonance)`; `None` bypasses.
    pub fn set_filter(&mut self, filter: Option<(SvfType, f32, f32)>) {
        for voice in &mut self.voices {
            voice.set_filter(filter);
        }
    }

    /// One-shot playback for notes started from now on.
    pub fn set_one_shot(&mut self, one_shot: bool) {
        for voice in &mut self.voices {
            voice.set_one_shot(one_shot);
        }
    }

    /// Playback-rate factor applied to every voice immediately.
    pub fn set_rate_scale(&mut self, scale: f32) {
        for voice in &mut self.voices {
            voice.set_rate_scale(scale);
        }
    }

    /// Output level.
    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain.max(0.0);
    }

    /// Output sample rate. Silences every voice.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        for voice in &mut self.voices {
            voice.set_sample_rate(sample_rate);
        }
    }

    /// Silence every voice and clear the pedal.
    pub fn reset(&mut self) {
        for voice in &mut self.voices {
            voice.kill();
        }
        self.held = [false; N];
        self.sustain = false;
    }

    /// Voices sounding or releasing.
    pub fn active_voice_count(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }

    /// Every voice, for inspection.
    pub fn voices(&self) -> &[SamplePlayerVoice] {
        &self.voices
    }

    /// Add every active voice into `left` and `right`.
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        if self.instrument.is_none() {
            return;
        }
        let len = left.len().min(right.len());
        let (left, right) = (&mut left[..len], &mut right[..len]);
        if self.gain == 1.0 {
            for voice in &mut self.voices {
                voice.render(left, right);
            }
            return;
        }
        for i in 0..len {
            let (mut sl, mut sr) = (0.0, 0.0);
            for voice in &mut self.voices {
                let (vl, vr) = voice.process_sample();
                sl += vl;
                sr += vr;
            }
            left[i] += sl * self.gain;
            right[i] += sr * self.gain;
        }
    }
}

/// First idle voice, else the oldest, preferring ones already releasing.
fn pick_voice(voices: &[SamplePlayerVoice]) -> usize {
    if let Some(i) = voices.iter().position(|v| !v.is_active()) {
        return i;
    }
    voices
        .iter()
        .enumerate()
        .min_by_key(|(_, v)| (!v.is_releasing(), v.age()))
        .map_or(0, |(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::{LoopMode, SampleBuffer, SampleZone};

    use alloc::sync::Arc;
    use alloc::vec;

    fn looped_instrument() -> SampleInstrument {
        let buffer = Arc::new(SampleBuffer::mono(vec![0.25; 1000], 48000.0).unwrap());
        let mut inst = SampleInstrument::new();
        let layer = inst.add_layer();
        inst.add_zone(
            layer,
            SampleZone::new(buffer, 60).with_loop(LoopMode::Forward, 100, 900),
        )
        .unwrap();
        inst
    }

    fn block(player: &mut SamplePlayer<4>) -> f32 {
        let (mut l, mut r) = ([0.0f32; 64], [0.0f32; 64]);
        player.render(&mut l, &mut r);
        l.iter().map(|s| s.abs()).fold(0.0, f32::max)
    }

    #[test]
    fn silent_without_instrument() {
        let mut p: SamplePlayer<4> = SamplePlayer::new(48000.0);
        p.note_on(60, 1.0);
        assert_eq!(p.active_voice_count(), 0);
        assert_eq!(block(&mut p), 0.0);
    }

    #[test]
    fn swapping_instruments_kills_voices_and_bumps_generation() {
        let mut p: SamplePlayer<4> = SamplePlayer::new(48000.0);
        assert!(p.set_instrument(Some(looped_instrument())).is_none());
        let first = p.generation();
        p.note_on(60, 1.0);
        p.note_on(62, 1.0);
        assert_eq!(p.active_voice_count(), 2);

        let old = p.set_instrument(Some(looped_instrument()));
        assert!(old.is_some());
        assert_eq!(p.active_voice_count(), 0);
        assert!(p.generation() != first);

        p.note_on(60, 1.0);
        assert!(
            p.voices()
                .iter()
                .filter(|v| v.is_active())
                .all(|v| v.generation() == p.generation())
        );
    }

    #[test]
    fn pool_steals_oldest_when_full() {
        let mut p: SamplePlayer<4> = SamplePlayer::new(48000.0);
        p.set_instrument(Some(looped_instrument()));
        for note in 60..65 {
            p.note_on(note, 1.0);
        }
        assert_eq!(p.active_voice_count(), 4);
        let notes: vec::Vec<u8> = p.voices().iter().map(|v| v.note()).collect();
        assert!(!notes.contains(&60));
        assert!(notes.contains(&64));
    }

    #[test]
    fn sustain_defers_release() {
        let mut p: SamplePlayer<4> = SamplePlayer::new(48000.0);
        p.set_instrument(Some(looped_instrument()));
        p.set_envelope(&EnvParams {
            release: 0.0,
            ..EnvParams::default()
        });
        p.handle_midi(&MidiMessage::ControlChange {
            controller: CC_SUSTAIN,
            value: 1.0,
        });
        p.note_on(60, 1.0);
        p.note_off(60);
        block(&mut p);
        assert_eq!(p.active_voice_count(), 1);

        p.handle_midi(&MidiMessage::ControlChange {
            controller: CC_SUSTAIN,
            value: 0.0,
        });
        block(&mut p);
        assert_eq!(p.active_voice_count(), 0);
    }
}

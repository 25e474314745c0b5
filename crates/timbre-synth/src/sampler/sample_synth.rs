//! Single-sample instrument with host tempo awareness.

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(feature = "std")]
extern crate std as alloc;

use alloc::sync::Arc;

use timbre_core::sanitize_bpm;

use super::instrument::SampleInstrument;
use super::player::SamplePlayer;
use super::zone::{SampleBuffer, SampleZone};
use crate::error::SampleError;
use crate::midi::MidiMessage;
use crate::params::EnvParams;

/// Voices in a [`SampleSynth`].
pub const SAMPLE_SYNTH_VOICES: usize = 16;

/// One buffer spread across the whole keyboard.
///
/// Notes repitch the buffer relative to its root key. The synth is told
/// the host tempo, but one-shots keep their pitch-derived rate unless
/// [`set_tempo_follow`](Self::set_tempo_follow) is on, in which case the
/// rate is scaled by `host_bpm / sample_bpm`. That changes pitch and
/// duration together; independent time-stretching is the
/// [`PhaseVocoder`](super::PhaseVocoder)'s job.
///
/// ```rust
/// use timbre_synth::sampler::{SampleBuffer, SampleSynth};
///
/// let mut synth = SampleSynth::new(48000.0);
/// synth.load(SampleBuffer::mono(vec![0.5; 2400], 48000.0).unwrap(), 60).unwrap();
/// synth.note_on(67, 1.0);
/// let (mut l, mut r) = ([0.0f32; 128], [0.0f32; 128]);
/// synth.render(&mut l, &mut r);
/// assert!(l.iter().any(|&s| s != 0.0));
/// ```
#[derive(Debug, Clone)]
pub struct SampleSynth {
    player: SamplePlayer<SAMPLE_SYNTH_VOICES>,
    host_bpm: f32,
    sample_bpm: f32,
    tempo_follow: bool,
}

impl SampleSynth {
    /// Empty synth.
    pub fn new(sample_rate: f32) -> Self {
        let mut player = SamplePlayer::new(sample_rate);
        player.set_envelope(&EnvParams {
            attack: 0.001,
            decay: 0.0,
            sustain: 1.0,
            release: 0.05,
            ..EnvParams::default()
        });
        Self {
            player,
            host_bpm: timbre_core::DEFAULT_BPM,
            sample_bpm: timbre_core::DEFAULT_BPM,
            tempo_follow: false,
        }
    }

    /// Replace the sample. `root` plays it at its recorded pitch.
    pub fn load(&mut self, buffer: SampleBuffer, root: u8) -> Result<(), SampleError> {
        let mut instrument = SampleInstrument::new();
        let layer = instrument.add_layer();
        instrument.add_zone(layer, SampleZone::new(Arc::new(buffer), root))?;
        self.player.set_instrument(Some(instrument));
        Ok(())
    }

    /// Drop the sample.
    pub fn unload(&mut self) {
        self.player.set_instrument(None);
    }

    /// Play through once and ignore note-off.
    pub fn set_one_shot(&mut self, one_shot: bool) {
        self.player.set_one_shot(one_shot);
    }

    /// Amplitude envelope.
    pub fn set_envelope(&mut self, params: &EnvParams) {
        self.player.set_envelope(params);
    }

    /// Host tempo notification. `None` or invalid falls back to the default.
    pub fn set_tempo(&mut self, bpm: Option<f32>) {
        self.host_bpm = sanitize_bpm(bpm);
        self.update_rate();
    }

    /// Tempo the sample was recorded at.
    pub fn set_sample_tempo(&mut self, bpm: f32) {
        self.sample_bpm = sanitize_bpm(Some(bpm));
        self.update_rate();
    }

    /// Scale playback rate by host tempo over sample tempo.
    pub fn set_tempo_follow(&mut self, follow: bool) {
        self.tempo_follow = follow;
        self.update_rate();
    }

    /// Current host tempo.
    pub fn tempo(&self) -> f32 {
        self.host_bpm
    }

    fn update_rate(&mut self) {
        let scale = if self.tempo_follow {
            self.host_bpm / self.sample_bpm
        } else {
            1.0
        };
        self.player.set_rate_scale(scale);
    }

    /// Start a note.
    pub fn note_on(&mut self, note: u8, velocity: f32) {
        self.player.note_on(note, velocity);
    }

    /// Release a note.
    pub fn note_off(&mut self, note: u8) {
        self.player.note_off(note);
    }

    /// Apply a MIDI message.
    pub fn handle_midi(&mut self, message: &MidiMessage) {
        self.player.handle_midi(message);
    }

    /// Output sample rate.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.player.set_sample_rate(sample_rate);
    }

    /// Add output into `left` and `right`.
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.player.render(left, right);
    }

    /// Voices sounding or releasing.
    pub fn active_voice_count(&self) -> usize {
        self.player.active_voice_count()
    }

    /// The underlying player.
    pub fn player(&self) -> &SamplePlayer<SAMPLE_SYNTH_VOICES> {
        &self.player
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn loaded() -> SampleSynth {
        let mut s = SampleSynth::new(48000.0);
        s.load(SampleBuffer::mono(vec![0.5; 4800], 48000.0).unwrap(), 60)
            .unwrap();
        s
    }

    fn rate(s: &SampleSynth) -> f64 {
        s.player()
            .voices()
            .iter()
            .find(|v| v.is_active())
            .map_or(0.0, |v| v.rate())
    }

    #[test]
    fn repitches_relative_to_root() {
        let mut s = loaded();
        s.note_on(72, 1.0);
        assert!((rate(&s) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn tempo_changes_leave_rate_alone_by_default() {
        let mut s = loaded();
        s.set_sample_tempo(120.0);
        s.set_tempo(Some(90.0));
        s.note_on(60, 1.0);
        assert!((rate(&s) - 1.0).abs() < 1e-9);
        assert_eq!(s.tempo(), 90.0);
    }

    #[test]
    fn tempo_follow_scales_rate() {
        let mut s = loaded();
        s.set_sample_tempo(120.0);
        s.set_tempo_follow(true);
        s.set_tempo(Some(180.0));
        s.note_on(60, 1.0);
        assert!((rate(&s) - 1.5).abs() < 1e-6);

        s.set_tempo(None);
        let expected = f64::from(timbre_core::DEFAULT_BPM / 120.0);
        assert!((rate(&s) - expected).abs() < 1e-6);
    }

    #[test]
    fn one_shot_plays_through_note_off() {
        let mut s = loaded();
        s.set_one_shot(true);
        s.note_on(60, 1.0);
        s.note_off(60);
        let (mut l, mut r) = ([0.0f32; 1024], [0.0f32; 1024]);
        s.render(&mut l, &mut r);
        assert_eq!(s.active_voice_count(), 1);
        for _ in 0..5 {
            s.render(&mut l, &mut r);
        }
        assert_eq!(s.active_voice_count(), 0);
    }
}

//! Per-block parameter snapshot for the subtractive synth.
//!
//! [`SynthParams`] is a plain value. The host builds one on its own
//! thread and hands it to [`Engine::set_params`](crate::Engine::set_params)
//! between blocks; voices read it and never write it. Every field has a
//! safe range and [`SynthParams::sanitized`] clamps a snapshot into
//! those ranges, so a host can pass raw automation values straight in.

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std as alloc;

use alloc::vec::Vec;

use timbre_core::{LadderSlope, LfoRate, LfoWaveform, MAX_LFO_HZ, SvfType};

use crate::mod_matrix::{MAX_ROUTINGS, ModRouting};
use crate::oscillator::Waveform;

/// Most unison layers per note.
pub const MAX_UNISON: usize = 8;

/// Most notes sounding at once (before unison).
pub const MAX_POLYPHONY: usize = 64;

/// What an oscillator slot plays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OscWaveform {
    /// One of the PolyBLEP shapes
    Analog(Waveform),
    /// The loaded wavetable set, morphed by `table_position`
    #[default]
    Wavetable,
}

/// One oscillator slot.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct OscParams {
    /// Slot produces sound
    pub enabled: bool,
    /// Shape
    pub waveform: OscWaveform,
    /// Octave offset, -4..=4
    pub octave: i8,
    /// Semitone offset, -12..=12
    pub semitone: i8,
    /// Fine tune in cents, -100..=100
    pub fine_cents: f32,
    /// Level, 0..=1
    pub level: f32,
    /// Pan, -1 (left) ..= 1 (right)
    pub pan: f32,
    /// Pulse width for [`Waveform::Pulse`]
    pub pulse_width: f32,
    /// Wavetable morph position, 0..=1
    pub table_position: f32,
}

impl Default for OscParams {
    fn default() -> Self {
        Self {
            enabled: true,
            waveform: OscWaveform::Analog(Waveform::Saw),
            octave: 0,
            semitone: 0,
            fine_cents: 0.0,
            level: 0.7,
            pan: 0.0,
            pulse_width: 0.5,
            table_position: 0.0,
        }
    }
}

impl OscParams {
    fn sanitize(&mut self) {
        self.octave = self.octave.clamp(-4, 4);
        self.semitone = self.semitone.clamp(-12, 12);
        self.fine_cents = finite_clamp(self.fine_cents, -100.0, 100.0, 0.0);
        self.level = finite_clamp(self.level, 0.0, 1.0, 0.0);
        self.pan = finite_clamp(self.pan, -1.0, 1.0, 0.0);
        self.pulse_width = finite_clamp(self.pulse_width, 0.01, 0.99, 0.5);
        self.table_position = finite_clamp(self.table_position, 0.0, 1.0, 0.0);
    }

    /// Static pitch offset in semitones.
    pub fn pitch_offset(&self) -> f32 {
        f32::from(self.octave) * 12.0 + f32::from(self.semitone) + self.fine_cents / 100.0
    }
}

/// Filter topology and response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FilterMode {
    /// State-variable filter in the given response
    Svf(SvfType),
    /// Ladder low-pass with the given slope
    Ladder(LadderSlope),
}

impl Default for FilterMode {
    fn default() -> Self {
        FilterMode::Svf(SvfType::Lowpass)
    }
}

/// Voice filter settings.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FilterParams {
    /// Topology
    pub mode: FilterMode,
    /// Base cutoff in Hz
    pub cutoff: f32,
    /// Resonance, 0..=1
    pub resonance: f32,
    /// Input drive, 1..=10
    pub drive: f32,
    /// Filter envelope depth in octaves, -8..=8
    pub env_amount: f32,
    /// Keyboard tracking, 0..=1 (1 follows the key exactly)
    pub key_track: f32,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            mode: FilterMode::default(),
            cutoff: 4000.0,
            resonance: 0.2,
            drive: 1.0,
            env_amount: 2.0,
            key_track: 0.0,
        }
    }
}

/// ADSR times in seconds, sustain level and segment curves.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EnvParams {
    /// Attack time
    pub attack: f32,
    /// Decay time
    pub decay: f32,
    /// Sustain level, 0..=1
    pub sustain: f32,
    /// Release time
    pub release: f32,
    /// Attack curve, -1..=1
    pub attack_curve: f32,
    /// Decay curve, -1..=1
    pub decay_curve: f32,
    /// Release curve, -1..=1
    pub release_curve: f32,
}

impl Default for EnvParams {
    fn default() -> Self {
        Self {
            attack: 0.01,
            decay: 0.1,
            sustain: 0.7,
            release: 0.2,
            attack_curve: 0.0,
            decay_curve: 0.0,
            release_curve: 0.0,
        }
    }
}

impl EnvParams {
    fn sanitize(&mut self) {
        self.attack = finite_clamp(self.attack, 0.0, 30.0, 0.01);
        self.decay = finite_clamp(self.decay, 0.0, 30.0, 0.1);
        self.sustain = finite_clamp(self.sustain, 0.0, 1.0, 0.7);
        self.release = finite_clamp(self.release, 0.0, 30.0, 0.2);
        self.attack_curve = finite_clamp(self.attack_curve, -1.0, 1.0, 0.0);
        self.decay_curve = finite_clamp(self.decay_curve, -1.0, 1.0, 0.0);
        self.release_curve = finite_clamp(self.release_curve, -1.0, 1.0, 0.0);
    }
}

/// Per-voice LFO settings.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LfoParams {
    /// Shape
    pub waveform: LfoWaveform,
    /// Free or synced rate
    pub rate: LfoRate,
    /// Start phase in cycles, 0..1
    pub phase_offset: f32,
    /// Time to full depth after retrigger
    pub fade_in_ms: f32,
    /// Restart on every note-on
    pub retrigger: bool,
    /// Output 0..1 instead of -1..1
    pub unipolar: bool,
}

impl Default for LfoParams {
    fn default() -> Self {
        Self {
            waveform: LfoWaveform::Sine,
            rate: LfoRate::Hz(5.0),
            phase_offset: 0.0,
            fade_in_ms: 0.0,
            retrigger: true,
            unipolar: false,
        }
    }
}

impl LfoParams {
    fn sanitize(&mut self) {
        if let LfoRate::Hz(hz) = self.rate {
            self.rate = LfoRate::Hz(finite_clamp(hz, 0.0, MAX_LFO_HZ, 1.0));
        }
        self.phase_offset = finite_clamp(self.phase_offset, 0.0, 1.0, 0.0);
        self.fade_in_ms = finite_clamp(self.fade_in_ms, 0.0, 10_000.0, 0.0);
    }
}

/// When portamento applies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GlideMode {
    /// Jump straight to the new pitch
    #[default]
    Off,
    /// Glide on every note
    Always,
    /// Glide only between overlapping notes
    LegatoOnly,
}

/// Note-to-voice policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VoiceMode {
    /// One note per voice group
    #[default]
    Poly,
    /// One note at a time, envelopes restart on every change
    Mono,
    /// One note at a time, overlapping notes only change pitch
    Legato,
}

/// Which voice gives way when the pool is full.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StealPolicy {
    /// Longest-running note
    #[default]
    Oldest,
    /// Lowest amplitude envelope
    Quietest,
    /// Highest key
    Highest,
    /// Lowest key
    Lowest,
}

/// Everything a synth voice reads.
///
/// ```rust
/// use timbre_synth::{SynthParams, VoiceMode};
///
/// let mut params = SynthParams::default();
/// params.voice_mode = VoiceMode::Legato;
/// params.unison_count = 40;
/// params.filter.cutoff = f32::NAN;
///
/// let params = params.sanitized();
/// assert_eq!(params.unison_count, 8);
/// assert!(params.filter.cutoff.is_finite());
/// ```
#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SynthParams {
    /// First oscillator
    pub osc1: OscParams,
    /// Second oscillator
    pub osc2: OscParams,
    /// White noise level, 0..=1
    pub noise_level: f32,
    /// Voice filter
    pub filter: FilterParams,
    /// Amplitude envelope
    pub amp_env: EnvParams,
    /// Filter envelope
    pub filter_env: EnvParams,
    /// Auxiliary envelope, a matrix source only
    pub aux_env: EnvParams,
    /// First LFO
    pub lfo1: LfoParams,
    /// Second LFO
    pub lfo2: LfoParams,
    /// Portamento time in seconds
    pub glide_time: f32,
    /// When portamento applies
    pub glide_mode: GlideMode,
    /// Poly, mono or legato
    pub voice_mode: VoiceMode,
    /// Stealing policy for poly mode
    pub steal_policy: StealPolicy,
    /// Notes sounding at once, 1..=64
    pub polyphony: usize,
    /// Layers per note, 1..=8
    pub unison_count: usize,
    /// Total unison detune in cents, fanned across ± half
    pub unison_detune: f32,
    /// Unison stereo spread, 0..=1, fanned across ± half
    pub unison_spread: f32,
    /// Pitch wheel range in semitones, 0..=24
    pub pitch_bend_range: f32,
    /// Output level, 0..=1
    pub master_gain: f32,
    /// Modulation matrix contents, at most 32
    pub routings: Vec<ModRouting>,
}

impl Default for SynthParams {
    fn default() -> Self {
        Self {
            osc1: OscParams::default(),
            osc2: OscParams {
                enabled: false,
                ..OscParams::default()
            },
            noise_level: 0.0,
            filter: FilterParams::default(),
            amp_env: EnvParams::default(),
            filter_env: EnvParams {
                sustain: 0.0,
                decay: 0.3,
                ..EnvParams::default()
            },
            aux_env: EnvParams::default(),
            lfo1: LfoParams::default(),
            lfo2: LfoParams {
                rate: LfoRate::Hz(0.5),
                ..LfoParams::default()
            },
            glide_time: 0.05,
            glide_mode: GlideMode::Off,
            voice_mode: VoiceMode::Poly,
            steal_policy: StealPolicy::Oldest,
            polyphony: 16,
            unison_count: 1,
            unison_detune: 0.0,
            unison_spread: 0.0,
            pitch_bend_range: 2.0,
            master_gain: 0.5,
            routings: Vec::new(),
        }
    }
}

impl Clone for SynthParams {
    fn clone(&self) -> Self {
        Self {
            routings: self.routings.clone(),
            ..*self
        }
    }

    /// Reuses the routing list's storage, so a destination with enough
    /// capacity never allocates.
    fn clone_from(&mut self, source: &Self) {
        let mut routings = core::mem::take(&mut self.routings);
        routings.clone_from(&source.routings);
        *self = Self {
            routings,
            ..*source
        };
    }
}

impl SynthParams {
    /// Copy with every field clamped into its safe range.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.sanitize();
        self
    }

    /// Clamp every field into its safe range in place.
    pub fn sanitize(&mut self) {
        self.osc1.sanitize();
        self.osc2.sanitize();
        self.noise_level = finite_clamp(self.noise_level, 0.0, 1.0, 0.0);

        let f = &mut self.filter;
        f.cutoff = finite_clamp(f.cutoff, 20.0, 20_000.0, 4000.0);
        f.resonance = finite_clamp(f.resonance, 0.0, 1.0, 0.0);
        f.drive = finite_clamp(f.drive, 1.0, 10.0, 1.0);
        f.env_amount = finite_clamp(f.env_amount, -8.0, 8.0, 0.0);
        f.key_track = finite_clamp(f.key_track, 0.0, 1.0, 0.0);

        self.amp_env.sanitize();
        self.filter_env.sanitize();
        self.aux_env.sanitize();
        self.lfo1.sanitize();
        self.lfo2.sanitize();

        self.glide_time = finite_clamp(self.glide_time, 0.0, 10.0, 0.0);
        self.polyphony = self.polyphony.clamp(1, MAX_POLYPHONY);
        self.unison_count = self.unison_count.clamp(1, MAX_UNISON);
        self.unison_detune = finite_clamp(self.unison_detune, 0.0, 100.0, 0.0);
        self.unison_spread = finite_clamp(self.unison_spread, 0.0, 1.0, 0.0);
        self.pitch_bend_range = finite_clamp(self.pitch_bend_range, 0.0, 24.0, 2.0);
        self.master_gain = finite_clamp(self.master_gain, 0.0, 1.0, 0.5);
        self.routings.truncate(MAX_ROUTINGS);
    }
}

#[inline]
fn finite_clamp(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_already_sane() {
        let params = SynthParams::default();
        assert_eq!(params.clone().sanitized(), params);
    }

    #[test]
    fn clone_from_reuses_routing_storage() {
        use crate::mod_matrix::{ModDestination, ModSource};

        let mut dest = SynthParams::default();
        dest.routings.reserve(MAX_ROUTINGS);
        let storage = dest.routings.as_ptr();

        let mut source = SynthParams::default();
        source.master_gain = 0.25;
        for amount in [0.1, 0.2, 0.3, 0.4] {
            source.routings.push(ModRouting::new(
                ModSource::Lfo1,
                ModDestination::FilterCutoff,
                amount,
            ));
        }
        dest.clone_from(&source);

        assert_eq!(dest, source);
        assert_eq!(dest.routings.as_ptr(), storage);
        assert!(dest.routings.capacity() >= MAX_ROUTINGS);
    }

    #[test]
    fn sanitize_clamps_and_replaces_nan() {
        let mut params = SynthParams::default();
        params.osc1.octave = 9;
        params.osc1.level = f32::INFINITY;
        params.filter.resonance = 3.0;
        params.amp_env.attack = -1.0;
        params.lfo1.rate = LfoRate::Hz(500.0);
        params.polyphony = 0;

        let p = params.sanitized();
        assert_eq!(p.osc1.octave, 4);
        assert_eq!(p.osc1.level, 0.0);
        assert_eq!(p.filter.resonance, 1.0);
        assert_eq!(p.amp_env.attack, 0.0);
        assert_eq!(p.lfo1.rate, LfoRate::Hz(MAX_LFO_HZ));
        assert_eq!(p.polyphony, 1);
    }

    #[test]
    fn pitch_offset_sums_octave_semitone_and_cents() {
        let osc = OscParams {
            octave: -1,
            semitone: 7,
            fine_cents: 50.0,
            ..OscParams::default()
        };
        assert!((osc.pitch_offset() + 4.5).abs() < 1e-6);
    }
}

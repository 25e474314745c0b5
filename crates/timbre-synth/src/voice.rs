//! One polyphonic synth voice.
//!
//! A [`SynthVoice`] owns everything needed to play one note (or one
//! unison layer of a note): two oscillator slots, a noise source, one
//! filter, three envelopes, two LFOs and its own modulation matrix.
//! Parameters arrive as a [`SynthParams`] snapshot through
//! [`SynthVoice::set_params`]; nothing else in the engine writes to a
//! voice's copy.
//!
//! ## Signal flow per sample
//!
//! ```text
//! glide ─► envelopes, LFOs ─► matrix ─► osc1 + osc2 + noise ─► filter ─► amp ─► pan
//! ```

use libm::{exp2f, expf};
use timbre_core::{
    LadderFilter, Lfo, LfoRate, StateVariableFilter, XorShift32, equal_power_pan, midi_to_freq,
    semitones_to_ratio,
};

use crate::envelope::{AdsrEnvelope, EnvelopeState};
use crate::mod_matrix::{ModDestination, ModSource, ModulationMatrix};
use crate::oscillator::Oscillator;
use crate::params::{
    EnvParams, FilterMode, FilterParams, GlideMode, LfoParams, OscParams, OscWaveform, SynthParams,
};
use crate::wavetable::{WavetableOscillator, WavetableSet};

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(feature = "std")]
extern crate std as alloc;

use alloc::sync::Arc;

/// Glide stops once within this fraction of the target frequency.
const GLIDE_SNAP: f32 = 1e-4;

/// Octaves of cutoff per unit of matrix cutoff modulation.
const CUTOFF_MOD_OCTAVES: f32 = 4.0;

/// Octaves of LFO rate per unit of matrix rate modulation.
const LFO_RATE_MOD_OCTAVES: f32 = 2.0;

/// Per-layer offsets assigned by the voice manager.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UnisonLayer {
    /// Detune in cents
    pub detune_cents: f32,
    /// Pan offset, -1..=1
    pub pan: f32,
    /// Level scale shared by every layer of the note
    pub gain: f32,
    /// Oscillator start phase in cycles
    pub phase: f32,
}

impl Default for UnisonLayer {
    fn default() -> Self {
        Self {
            detune_cents: 0.0,
            pan: 0.0,
            gain: 1.0,
            phase: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
struct OscSlot {
    analog: Oscillator,
    table: WavetableOscillator,
    params: OscParams,
}

impl OscSlot {
    fn new(sample_rate: f32, seed: u32) -> Self {
        let mut analog = Oscillator::new(sample_rate);
        analog.set_noise_seed(seed);
        Self {
            analog,
            table: WavetableOscillator::new(sample_rate),
            params: OscParams::default(),
        }
    }

    fn apply(&mut self, params: &OscParams) {
        self.params = *params;
        if let OscWaveform::Analog(shape) = params.waveform {
            self.analog.set_waveform(shape);
        }
    }

    fn reset_phase(&mut self, phase: f32) {
        self.analog.reset_phase(phase);
        self.table.reset_phase(phase);
    }

    #[inline]
    fn advance(&mut self, freq: f32, pw_mod: f32, table_mod: f32) -> f32 {
        match self.params.waveform {
            OscWaveform::Analog(_) => {
                self.analog.set_frequency(freq);
                self.analog.set_pulse_width(self.params.pulse_width + pw_mod * 0.5);
                self.analog.advance()
            }
            OscWaveform::Wavetable => {
                self.table.set_frequency(freq);
                self.table.set_table_position(self.params.table_position + table_mod);
                self.table.advance()
            }
        }
    }
}

/// Free-running rate of an LFO setting at `bpm`.
fn base_lfo_hz(params: &LfoParams, bpm: f32) -> f32 {
    match params.rate {
        LfoRate::Hz(hz) => hz,
        LfoRate::Sync(division) => division.to_hz(bpm),
    }
}

#[derive(Debug, Clone)]
struct LfoSlot {
    lfo: Lfo,
    params: LfoParams,
    base_hz: f32,
    modulated: bool,
}

impl LfoSlot {
    fn new(sample_rate: f32, seed: u32) -> Self {
        Self {
            lfo: Lfo::with_seed(sample_rate, seed),
            params: LfoParams::default(),
            base_hz: 0.0,
            modulated: false,
        }
    }

    fn apply(&mut self, params: &LfoParams, bpm: f32) {
        self.params = *params;
        self.lfo.set_waveform(params.waveform);
        self.lfo.set_rate(params.rate);
        self.lfo.set_tempo(Some(bpm));
        self.lfo.set_phase_offset(params.phase_offset);
        self.lfo.set_fade_in_ms(params.fade_in_ms);
        self.lfo.set_unipolar(params.unipolar);
        self.base_hz = base_lfo_hz(params, bpm);
        self.modulated = false;
    }

    #[inline]
    fn advance(&mut self, rate_mod: f32) -> f32 {
        if rate_mod != 0.0 {
            self.lfo
                .set_frequency(self.base_hz * exp2f(rate_mod * LFO_RATE_MOD_OCTAVES));
            self.modulated = true;
        } else if self.modulated {
            self.lfo.set_rate(self.params.rate);
            self.modulated = false;
        }
        self.lfo.advance()
    }
}

fn apply_env(env: &mut AdsrEnvelope, params: &EnvParams) {
    env.set_times(params.attack, params.decay, params.release);
    env.set_sustain(params.sustain);
    env.set_curves(params.attack_curve, params.decay_curve, params.release_curve);
}

/// A single synth voice.
///
/// # Example
///
/// ```rust
/// use timbre_synth::{SynthParams, SynthVoice};
///
/// let mut voice = SynthVoice::new(48000.0, 1);
/// voice.set_params(&SynthParams::default());
/// voice.note_on(60, 0.8, false, None);
///
/// let (mut l, mut r) = ([0.0f32; 256], [0.0f32; 256]);
/// voice.render(&mut l, &mut r);
/// assert!(l.iter().any(|&s| s != 0.0));
///
/// voice.note_off();
/// assert!(voice.is_active());
/// ```
#[derive(Debug, Clone)]
pub struct SynthVoice {
    sample_rate: f32,
    osc: [OscSlot; 2],
    noise: XorShift32,
    svf: StateVariableFilter,
    ladder: LadderFilter,
    amp_env: AdsrEnvelope,
    filter_env: AdsrEnvelope,
    aux_env: AdsrEnvelope,
    lfo: [LfoSlot; 2],
    matrix: ModulationMatrix,

    filter: FilterParams,
    noise_level: f32,
    master_gain: f32,
    bend_range: f32,
    glide_time: f32,
    glide_mode: GlideMode,
    bpm: f32,

    active: bool,
    note: u8,
    velocity: f32,
    current_freq: f32,
    target_freq: f32,
    glide_coeff: f32,
    age: u64,
    group: u64,
    unison: UnisonLayer,
    key_down: bool,
    pedal_held: bool,
}

impl SynthVoice {
    /// Idle voice. `seed` decorrelates noise and random LFOs across voices.
    pub fn new(sample_rate: f32, seed: u32) -> Self {
        let seed = seed.wrapping_mul(0x9E37_79B9) | 1;
        let mut voice = Self {
            sample_rate,
            osc: [
                OscSlot::new(sample_rate, seed),
                OscSlot::new(sample_rate, seed.rotate_left(7)),
            ],
            noise: XorShift32::new(seed.rotate_left(13)),
            svf: StateVariableFilter::new(sample_rate),
            ladder: LadderFilter::new(sample_rate),
            amp_env: AdsrEnvelope::new(sample_rate),
            filter_env: AdsrEnvelope::new(sample_rate),
            aux_env: AdsrEnvelope::new(sample_rate),
            lfo: [
                LfoSlot::new(sample_rate, seed.rotate_left(19)),
                LfoSlot::new(sample_rate, seed.rotate_left(23)),
            ],
            matrix: ModulationMatrix::new(),
            filter: FilterParams::default(),
            noise_level: 0.0,
            master_gain: 0.5,
            bend_range: 2.0,
            glide_time: 0.0,
            glide_mode: GlideMode::Off,
            bpm: timbre_core::DEFAULT_BPM,
            active: false,
            note: 0,
            velocity: 0.0,
            current_freq: 0.0,
            target_freq: 0.0,
            glide_coeff: 0.0,
            age: 0,
            group: 0,
            unison: UnisonLayer::default(),
            key_down: false,
            pedal_held: false,
        };
        voice.set_params(&SynthParams::default());
        voice
    }

    /// Apply a parameter snapshot. Allocation-free; routings are copied
    /// into the fixed matrix.
    pub fn set_params(&mut self, params: &SynthParams) {
        self.osc[0].apply(&params.osc1);
        self.osc[1].apply(&params.osc2);
        self.noise_level = params.noise_level;

        self.filter = params.filter;
        match params.filter.mode {
            FilterMode::Svf(kind) => {
                self.svf.set_filter_type(kind);
                self.svf.set_drive((params.filter.drive - 1.0) / 9.0);
            }
            FilterMode::Ladder(slope) => {
                self.ladder.set_slope(slope);
                self.ladder.set_drive(params.filter.drive);
            }
        }

        apply_env(&mut self.amp_env, &params.amp_env);
        apply_env(&mut self.filter_env, &params.filter_env);
        apply_env(&mut self.aux_env, &params.aux_env);

        self.lfo[0].apply(&params.lfo1, self.bpm);
        self.lfo[1].apply(&params.lfo2, self.bpm);

        self.master_gain = params.master_gain;
        self.bend_range = params.pitch_bend_range;
        self.glide_time = params.glide_time;
        self.glide_mode = params.glide_mode;
        self.matrix.set_routings(&params.routings);
    }

    /// Share a wavetable set with both oscillator slots.
    pub fn set_wavetables(&mut self, set: &Arc<WavetableSet>) {
        for slot in &mut self.osc {
            slot.table.set_table_set(Arc::clone(set));
        }
    }

    /// Host tempo for synced LFOs.
    pub fn set_tempo(&mut self, bpm: f32) {
        self.bpm = bpm;
        for slot in &mut self.lfo {
            slot.lfo.set_tempo(Some(bpm));
            slot.base_hz = base_lfo_hz(&slot.params, bpm);
        }
    }

    /// Change the sample rate of every component.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        for slot in &mut self.osc {
            slot.analog.set_sample_rate(sample_rate);
            slot.table.set_sample_rate(sample_rate);
        }
        self.svf.set_sample_rate(sample_rate);
        self.ladder.set_sample_rate(sample_rate);
        self.amp_env.set_sample_rate(sample_rate);
        self.filter_env.set_sample_rate(sample_rate);
        self.aux_env.set_sample_rate(sample_rate);
        for slot in &mut self.lfo {
            slot.lfo.set_sample_rate(sample_rate);
        }
    }

    /// Unison offsets for the next note.
    pub fn set_unison(&mut self, layer: UnisonLayer) {
        self.unison = layer;
    }

    /// Current unison offsets.
    pub fn unison(&self) -> UnisonLayer {
        self.unison
    }

    /// Start or re-pitch a note.
    ///
    /// With `legato` set and the voice already sounding, only the pitch
    /// moves; envelopes and LFOs carry on. `from_freq` is the pitch to
    /// glide from, used when the glide mode allows it.
    pub fn note_on(&mut self, note: u8, velocity: f32, legato: bool, from_freq: Option<f32>) {
        let legato = legato && self.active && self.amp_env.state() != EnvelopeState::Release;
        let velocity = if velocity.is_finite() {
            velocity.clamp(0.0, 1.0)
        } else {
            1.0
        };

        self.note = note.min(127);
        self.target_freq = midi_to_freq(f32::from(self.note));

        let glide = match self.glide_mode {
            GlideMode::Off => false,
            GlideMode::Always => true,
            GlideMode::LegatoOnly => legato,
        };
        match from_freq {
            Some(from) if glide && self.glide_time > 0.0 && from > 0.0 => {
                self.current_freq = from;
                self.glide_coeff = expf(-1.0 / (self.glide_time * self.sample_rate));
            }
            _ => {
                self.current_freq = self.target_freq;
                self.glide_coeff = 0.0;
            }
        }

        self.matrix.set_source_value(
            ModSource::KeyTrack,
            (f32::from(self.note) - 60.0) / 60.0,
        );

        if !legato {
            if !self.active {
                for slot in &mut self.osc {
                    slot.reset_phase(self.unison.phase);
                }
                self.svf.reset();
                self.ladder.reset();
            }
            self.velocity = velocity;
            self.matrix.set_source_value(ModSource::Velocity, velocity);
            self.matrix
                .set_source_value(ModSource::Noise, self.noise.next_bipolar());
            self.amp_env.note_on(velocity);
            self.filter_env.note_on(1.0);
            self.aux_env.note_on(1.0);
            for slot in &mut self.lfo {
                if slot.params.retrigger {
                    slot.lfo.retrigger();
                }
            }
        }

        self.active = true;
        self.key_down = true;
        self.pedal_held = false;
    }

    /// Release the note.
    pub fn note_off(&mut self) {
        self.key_down = false;
        self.pedal_held = false;
        self.amp_env.note_off();
        self.filter_env.note_off();
        self.aux_env.note_off();
    }

    /// Key released while the sustain pedal is down.
    pub fn hold_for_pedal(&mut self) {
        self.key_down = false;
        self.pedal_held = true;
    }

    /// Silence immediately.
    pub fn kill(&mut self) {
        self.active = false;
        self.key_down = false;
        self.pedal_held = false;
        self.amp_env.reset();
        self.filter_env.reset();
        self.aux_env.reset();
    }

    /// Kill and clear filter state.
    pub fn reset(&mut self) {
        self.kill();
        self.svf.reset();
        self.ladder.reset();
    }

    /// Broadcast controller value (mod wheel, pitch bend, aftertouch).
    #[inline]
    pub fn set_controller(&mut self, source: ModSource, value: f32) {
        self.matrix.set_source_value(source, value);
    }

    /// Sounding or releasing.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// In the release stage.
    pub fn is_releasing(&self) -> bool {
        self.amp_env.state() == EnvelopeState::Release
    }

    /// Physical key still held.
    pub fn key_down(&self) -> bool {
        self.key_down
    }

    /// Waiting for the sustain pedal to lift.
    pub fn pedal_held(&self) -> bool {
        self.pedal_held
    }

    /// Current note.
    pub fn note(&self) -> u8 {
        self.note
    }

    /// Note-on velocity.
    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    /// Amplitude envelope level before velocity.
    pub fn amp_level(&self) -> f32 {
        self.amp_env.level()
    }

    /// Base frequency after glide, before modulation and unison.
    pub fn frequency(&self) -> f32 {
        self.current_freq
    }

    /// Allocation stamp.
    pub fn age(&self) -> u64 {
        self.age
    }

    /// Set the allocation stamp.
    pub fn set_age(&mut self, age: u64) {
        self.age = age;
    }

    /// Note group shared by the unison layers of one note.
    pub fn group(&self) -> u64 {
        self.group
    }

    /// Set the note group.
    pub fn set_group(&mut self, group: u64) {
        self.group = group;
    }

    /// Read-only view of the matrix.
    pub fn matrix(&self) -> &ModulationMatrix {
        &self.matrix
    }

    /// Add this voice's output into `left` and `right`.
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            if !self.active {
                return;
            }
            let (vl, vr) = self.process_sample();
            *l += vl;
            *r += vr;
        }
    }

    /// Produce one stereo sample.
    #[inline]
    pub fn process_sample(&mut self) -> (f32, f32) {
        if !self.active {
            return (0.0, 0.0);
        }

        if self.glide_coeff > 0.0 {
            self.current_freq =
                self.target_freq + (self.current_freq - self.target_freq) * self.glide_coeff;
            if (self.current_freq - self.target_freq).abs() <= self.target_freq * GLIDE_SNAP {
                self.current_freq = self.target_freq;
                self.glide_coeff = 0.0;
            }
        }

        let amp = self.amp_env.advance();
        let fenv = self.filter_env.advance();
        let aux = self.aux_env.advance();
        let lfo1 = self.lfo[0].advance(self.matrix.destination_value(ModDestination::Lfo1Rate));
        let lfo2 = self.lfo[1].advance(self.matrix.destination_value(ModDestination::Lfo2Rate));

        let m = &mut self.matrix;
        m.set_source_value(ModSource::Lfo1, lfo1);
        m.set_source_value(ModSource::Lfo2, lfo2);
        m.set_source_value(ModSource::AmpEnv, self.amp_env.level());
        m.set_source_value(ModSource::FilterEnv, fenv);
        m.set_source_value(ModSource::AuxEnv, aux);
        m.process();

        let bend = m.source_value(ModSource::PitchBend) * self.bend_range;
        let common = bend + self.unison.detune_cents / 100.0;
        let pw_mod = m.destination_value(ModDestination::PulseWidth);
        let table_mod = m.destination_value(ModDestination::TablePosition);

        let mut mix = 0.0;
        let mut pan_weighted = 0.0;
        let mut weight = 0.0;
        for (i, (pitch_dest, level_dest)) in [
            (ModDestination::Osc1Pitch, ModDestination::Osc1Level),
            (ModDestination::Osc2Pitch, ModDestination::Osc2Level),
        ]
        .into_iter()
        .enumerate()
        {
            let pitch_mod = self.matrix.destination_value(pitch_dest) * 12.0;
            let level_mod = self.matrix.destination_value(level_dest);
            let slot = &mut self.osc[i];
            if !slot.params.enabled {
                continue;
            }
            let semis = slot.params.pitch_offset() + common + pitch_mod;
            let freq = self.current_freq * semitones_to_ratio(semis);
            let level = (slot.params.level + level_mod).clamp(0.0, 1.0);
            let sample = slot.advance(freq, pw_mod, table_mod);
            mix += sample * level;
            pan_weighted += slot.params.pan * level;
            weight += level;
        }

        let noise_level = (self.noise_level
            + self.matrix.destination_value(ModDestination::NoiseLevel))
        .clamp(0.0, 1.0);
        if noise_level > 0.0 {
            mix += self.noise.next_bipolar() * noise_level;
        }

        let key_octaves = self.filter.key_track * (f32::from(self.note) - 60.0) / 12.0;
        let cutoff_octaves = self.filter.env_amount * fenv
            + key_octaves
            + self.matrix.destination_value(ModDestination::FilterCutoff) * CUTOFF_MOD_OCTAVES;
        let cutoff = (self.filter.cutoff * exp2f(cutoff_octaves))
            .clamp(20.0, self.sample_rate * 0.49);
        let resonance = (self.filter.resonance
            + self.matrix.destination_value(ModDestination::FilterResonance))
        .clamp(0.0, 1.0);
        let filtered = match self.filter.mode {
            FilterMode::Svf(_) => {
                self.svf.set_cutoff(cutoff);
                self.svf.set_resonance(resonance);
                self.svf.process(mix)
            }
            FilterMode::Ladder(_) => {
                self.ladder.set_cutoff(cutoff);
                self.ladder.set_resonance(resonance);
                self.ladder.process(mix)
            }
        };

        let amp_mod = (1.0 + self.matrix.destination_value(ModDestination::Amp)).max(0.0);
        let out = filtered * amp * self.master_gain * amp_mod * self.unison.gain;

        let osc_pan = if weight > 0.0 { pan_weighted / weight } else { 0.0 };
        let pan = osc_pan + self.matrix.destination_value(ModDestination::Pan) + self.unison.pan;
        let (gl, gr) = equal_power_pan(pan);

        if !self.amp_env.is_active() {
            self.active = false;
        }
        (out * gl, out * gr)
    }
}

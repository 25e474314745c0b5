//! Low-frequency oscillator for per-voice and per-effect modulation.
//!
//! Seven shapes, free-running or tempo-synced, with a phase offset, an
//! optional linear fade-in and a unipolar output mode. The two random
//! shapes draw from a seeded [`XorShift32`], so a given seed always
//! produces the same modulation.

use core::f32::consts::TAU;
use libm::sinf;

use crate::math::{XorShift32, lerp};
use crate::tempo::{DEFAULT_BPM, NoteDivision, sanitize_bpm};

/// Highest free-running rate accepted, in Hz.
pub const MAX_LFO_HZ: f32 = 50.0;

/// LFO shape.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LfoWaveform {
    /// Sine
    #[default]
    Sine,
    /// Symmetric triangle
    Triangle,
    /// Rising ramp
    SawUp,
    /// Falling ramp
    SawDown,
    /// 50% square
    Square,
    /// New random value once per cycle, held flat
    SampleAndHold,
    /// Straight-line glide between successive random values
    SmoothRandom,
}

/// How the LFO rate is specified.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LfoRate {
    /// Free-running, in Hz
    Hz(f32),
    /// Locked to a note length at the current tempo
    Sync(NoteDivision),
}

impl Default for LfoRate {
    fn default() -> Self {
        LfoRate::Hz(1.0)
    }
}

/// Low-frequency oscillator.
///
/// ```rust
/// use timbre_core::{Lfo, LfoRate, LfoWaveform, NoteDivision};
///
/// let mut lfo = Lfo::new(48000.0);
/// lfo.set_waveform(LfoWaveform::Triangle);
/// lfo.set_rate(LfoRate::Sync(NoteDivision::Eighth));
/// lfo.set_tempo(Some(120.0));
/// assert!((lfo.frequency() - 4.0).abs() < 1e-4);
///
/// let v = lfo.advance();
/// assert!((-1.0..=1.0).contains(&v));
/// ```
#[derive(Debug, Clone)]
pub struct Lfo {
    phase: f32,
    phase_inc: f32,
    phase_offset: f32,
    sample_rate: f32,
    rate: LfoRate,
    bpm: f32,
    waveform: LfoWaveform,
    unipolar: bool,

    fade_samples: u32,
    fade_pos: u32,

    rng: XorShift32,
    held: f32,
    previous_target: f32,
    target: f32,
}

impl Default for Lfo {
    fn default() -> Self {
        Self::new(48000.0)
    }
}

impl Lfo {
    /// 1 Hz sine, bipolar, no fade.
    pub fn new(sample_rate: f32) -> Self {
        Self::with_seed(sample_rate, 0x2545_F491)
    }

    /// Like [`new`](Self::new) with an explicit random seed.
    pub fn with_seed(sample_rate: f32, seed: u32) -> Self {
        let mut rng = XorShift32::new(seed);
        let held = rng.next_bipolar();
        let target = rng.next_bipolar();
        let mut lfo = Self {
            phase: 0.0,
            phase_inc: 0.0,
            phase_offset: 0.0,
            sample_rate,
            rate: LfoRate::default(),
            bpm: DEFAULT_BPM,
            waveform: LfoWaveform::Sine,
            unipolar: false,
            fade_samples: 0,
            fade_pos: 0,
            rng,
            held,
            previous_target: held,
            target,
        };
        lfo.update_increment();
        lfo
    }

    /// Set the shape.
    pub fn set_waveform(&mut self, waveform: LfoWaveform) {
        self.waveform = waveform;
    }

    /// Current shape.
    pub fn waveform(&self) -> LfoWaveform {
        self.waveform
    }

    /// Set a free or synced rate. Free rates clamp to `0 ..= MAX_LFO_HZ`.
    pub fn set_rate(&mut self, rate: LfoRate) {
        self.rate = match rate {
            LfoRate::Hz(hz) if hz.is_finite() => LfoRate::Hz(hz.clamp(0.0, MAX_LFO_HZ)),
            LfoRate::Hz(_) => LfoRate::Hz(0.0),
            synced => synced,
        };
        self.update_increment();
    }

    /// Shorthand for a free-running rate.
    pub fn set_frequency(&mut self, hz: f32) {
        self.set_rate(LfoRate::Hz(hz));
    }

    /// Effective rate in Hz after tempo sync.
    pub fn frequency(&self) -> f32 {
        self.phase_inc * self.sample_rate
    }

    /// Host tempo for synced rates. `None` or nonsense falls back to 140 BPM.
    pub fn set_tempo(&mut self, bpm: Option<f32>) {
        let bpm = sanitize_bpm(bpm);
        if bpm != self.bpm {
            self.bpm = bpm;
            self.update_increment();
        }
    }

    /// Phase offset in cycles, wrapped into [0, 1).
    pub fn set_phase_offset(&mut self, offset: f32) {
        self.phase_offset = wrap_cycle(offset);
    }

    /// Fade-in time after [`retrigger`](Self::retrigger). Zero disables it.
    pub fn set_fade_in_ms(&mut self, ms: f32) {
        let ms = if ms.is_finite() { ms.max(0.0) } else { 0.0 };
        self.fade_samples = (ms * 0.001 * self.sample_rate) as u32;
        self.fade_pos = self.fade_pos.min(self.fade_samples);
    }

    /// Output in [0, 1] instead of [-1, 1].
    pub fn set_unipolar(&mut self, unipolar: bool) {
        self.unipolar = unipolar;
    }

    /// Restart the cycle and the fade-in. Shape, rate and offset are kept.
    pub fn retrigger(&mut self) {
        self.phase = 0.0;
        self.fade_pos = 0;
    }

    /// Set the raw phase in cycles, wrapped into [0, 1).
    pub fn set_phase(&mut self, phase: f32) {
        self.phase = wrap_cycle(phase);
    }

    /// Raw phase in [0, 1), before the offset.
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Change the sample rate, keeping rate and fade time.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        let fade_ms = self.fade_samples as f32 * 1000.0 / self.sample_rate;
        self.sample_rate = sample_rate;
        self.update_increment();
        self.set_fade_in_ms(fade_ms);
    }

    /// Produce one sample and advance the phase.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        let mut p = self.phase + self.phase_offset;
        if p >= 1.0 {
            p -= 1.0;
        }

        let raw = match self.waveform {
            LfoWaveform::Sine => sinf(TAU * p),
            LfoWaveform::Triangle => {
                if p < 0.5 {
                    4.0 * p - 1.0
                } else {
                    3.0 - 4.0 * p
                }
            }
            LfoWaveform::SawUp => 2.0 * p - 1.0,
            LfoWaveform::SawDown => 1.0 - 2.0 * p,
            LfoWaveform::Square => {
                if p < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            LfoWaveform::SampleAndHold => self.held,
            LfoWaveform::SmoothRandom => lerp(self.previous_target, self.target, self.phase),
        };

        let fade = if self.fade_pos < self.fade_samples {
            self.fade_pos += 1;
            self.fade_pos as f32 / self.fade_samples as f32
        } else {
            1.0
        };

        self.phase += self.phase_inc;
        if self.phase >= 1.0 {
            self.phase -= libm::floorf(self.phase);
            self.held = self.rng.next_bipolar();
            self.previous_target = self.target;
            self.target = self.rng.next_bipolar();
        }

        if self.unipolar {
            (raw + 1.0) * 0.5 * fade
        } else {
            raw * fade
        }
    }

    fn update_increment(&mut self) {
        let hz = match self.rate {
            LfoRate::Hz(hz) => hz,
            LfoRate::Sync(division) => division.to_hz(self.bpm).min(MAX_LFO_HZ),
        };
        self.phase_inc = if self.sample_rate > 0.0 {
            hz / self.sample_rate
        } else {
            0.0
        };
    }
}

/// Fractional part in [0, 1), negative values wrapping up from 1.
/// Non-finite input gives 0.
#[inline]
fn wrap_cycle(x: f32) -> f32 {
    if !x.is_finite() {
        return 0.0;
    }
    let w = x - libm::floorf(x);
    // -tiny + 1 rounds to 1.0
    if w >= 1.0 { 0.0 } else { w }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_phase_wraps_both_directions() {
        let mut lfo = Lfo::new(48000.0);
        for (input, expected) in [(0.25, 0.25), (1.0, 0.0), (1.75, 0.75), (-0.25, 0.75), (-2.5, 0.5)] {
            lfo.set_phase(input);
            assert!((lfo.phase() - expected).abs() < 1e-6, "{input} -> {}", lfo.phase());
        }
        lfo.set_phase(-1e-9);
        assert!((0.0..1.0).contains(&lfo.phase()));
        lfo.set_phase(f32::NAN);
        assert_eq!(lfo.phase(), 0.0);
    }

    const SR: f32 = 48000.0;

    #[test]
    fn all_shapes_stay_in_range() {
        for shape in [
            LfoWaveform::Sine,
            LfoWaveform::Triangle,
            LfoWaveform::SawUp,
            LfoWaveform::SawDown,
            LfoWaveform::Square,
            LfoWaveform::SampleAndHold,
            LfoWaveform::SmoothRandom,
        ] {
            let mut lfo = Lfo::new(SR);
            lfo.set_waveform(shape);
            lfo.set_frequency(7.0);
            for _ in 0..SR as usize {
                let v = lfo.advance();
                assert!((-1.0..=1.0).contains(&v), "{:?} produced {}", shape, v);
            }
        }
    }

    #[test]
    fn unipolar_maps_to_zero_one() {
        let mut lfo = Lfo::new(SR);
        lfo.set_unipolar(true);
        lfo.set_frequency(3.0);
        let mut lo = f32::MAX;
        let mut hi = f32::MIN;
        for _ in 0..SR as usize {
            let v = lfo.advance();
            lo = lo.min(v);
            hi = hi.max(v);
        }
        assert!(lo >= 0.0 && lo < 0.01, "min {}", lo);
        assert!(hi <= 1.0 && hi > 0.99, "max {}", hi);
    }

    #[test]
    fn sample_and_hold_changes_once_per_cycle() {
        let mut lfo = Lfo::new(SR);
        lfo.set_waveform(LfoWaveform::SampleAndHold);
        lfo.set_frequency(10.0);
        let mut changes = 0;
        let mut last = lfo.advance();
        for _ in 1..SR as usize {
            let v = lfo.advance();
            if v != last {
                changes += 1;
            }
            last = v;
        }
        assert!((9..=10).contains(&changes), "changes {}", changes);
    }

    #[test]
    fn smooth_random_is_continuous() {
        let mut lfo = Lfo::new(SR);
        lfo.set_waveform(LfoWaveform::SmoothRandom);
        lfo.set_frequency(5.0);
        let mut last = lfo.advance();
        for _ in 0..SR as usize {
            let v = lfo.advance();
            // Max slope is 2 units per cycle of 9600 samples.
            assert!((v - last).abs() < 1e-3, "jump {} -> {}", last, v);
            last = v;
        }
    }

    #[test]
    fn tempo_sync_tracks_bpm() {
        let mut lfo = Lfo::new(SR);
        lfo.set_rate(LfoRate::Sync(NoteDivision::Quarter));
        assert!((lfo.frequency() - DEFAULT_BPM / 60.0).abs() < 1e-3);
        lfo.set_tempo(Some(60.0));
        assert!((lfo.frequency() - 1.0).abs() < 1e-4);
        lfo.set_tempo(None);
        assert!((lfo.frequency() - DEFAULT_BPM / 60.0).abs() < 1e-3);
    }

    #[test]
    fn phase_offset_shifts_output() {
        let mut a = Lfo::new(SR);
        let mut b = Lfo::new(SR);
        b.set_phase_offset(0.25);
        a.set_frequency(1.0);
        b.set_frequency(1.0);
        assert!(a.advance().abs() < 1e-6);
        assert!((b.advance() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn fade_in_ramps_from_zero() {
        let mut lfo = Lfo::new(SR);
        lfo.set_waveform(LfoWaveform::Square);
        lfo.set_frequency(0.5);
        lfo.set_fade_in_ms(100.0);
        lfo.retrigger();
        let first = lfo.advance();
        assert!(first < 0.001, "first {}", first);
        for _ in 0..4800 {
            lfo.advance();
        }
        assert!((lfo.advance() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn retrigger_keeps_configuration() {
        let mut lfo = Lfo::new(SR);
        lfo.set_waveform(LfoWaveform::SawUp);
        lfo.set_frequency(2.0);
        for _ in 0..1000 {
            lfo.advance();
        }
        lfo.retrigger();
        assert_eq!(lfo.phase(), 0.0);
        assert_eq!(lfo.waveform(), LfoWaveform::SawUp);
        assert!((lfo.frequency() - 2.0).abs() < 1e-4);
        assert!((lfo.advance() + 1.0).abs() < 1e-6);
    }
}

//! Band-limited analog-style oscillator.
//!
//! Saw, square and pulse are generated naively and then corrected with a
//! polynomial band-limited step (PolyBLEP) in the two samples either side
//! of each discontinuity. The triangle is the leaky integral of a
//! corrected square, so its slope change is band-limited for free.

use core::f32::consts::TAU;
use libm::{floorf, sinf};
use timbre_core::XorShift32;

/// Oscillator shape.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Waveform {
    /// Pure fundamental
    #[default]
    Sine,
    /// Odd harmonics falling at 12 dB/oct
    Triangle,
    /// All harmonics
    Saw,
    /// 50% pulse
    Square,
    /// Pulse with variable width, see [`Oscillator::set_pulse_width`]
    Pulse,
    /// White noise, phase is ignored
    Noise,
}

/// Narrowest accepted pulse width.
pub const MIN_PULSE_WIDTH: f32 = 0.01;

/// PolyBLEP oscillator.
///
/// ```rust
/// use timbre_synth::{Oscillator, Waveform};
///
/// let mut osc = Oscillator::new(48000.0);
/// osc.set_frequency(220.0);
/// osc.set_waveform(Waveform::Pulse);
/// osc.set_pulse_width(0.25);
///
/// let y = osc.advance();
/// assert!(y.is_finite());
/// ```
#[derive(Debug, Clone)]
pub struct Oscillator {
    phase: f32,
    phase_inc: f32,
    sample_rate: f32,
    frequency: f32,
    waveform: Waveform,
    pulse_width: f32,
    integrator: f32,
    rng: XorShift32,
}

impl Default for Oscillator {
    fn default() -> Self {
        Self::new(48000.0)
    }
}

impl Oscillator {
    /// 440 Hz sine.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            phase: 0.0,
            phase_inc: 440.0 / sample_rate,
            sample_rate,
            frequency: 440.0,
            waveform: Waveform::Sine,
            pulse_width: 0.5,
            integrator: -1.0,
            rng: XorShift32::new(0x1234_5678),
        }
    }

    /// Frequency in Hz, clamped to `0 ..= 0.49 * sample_rate`.
    #[inline]
    pub fn set_frequency(&mut self, hz: f32) {
        let hz = if hz.is_finite() { hz } else { 0.0 };
        self.frequency = hz.clamp(0.0, self.sample_rate * 0.49);
        self.phase_inc = self.frequency / self.sample_rate;
    }

    /// Current frequency in Hz.
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Select the shape.
    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    /// Current shape.
    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    /// Duty cycle for [`Waveform::Pulse`], clamped to `0.01 ..= 0.99`.
    #[inline]
    pub fn set_pulse_width(&mut self, width: f32) {
        let width = if width.is_finite() { width } else { 0.5 };
        self.pulse_width = width.clamp(MIN_PULSE_WIDTH, 1.0 - MIN_PULSE_WIDTH);
    }

    /// Current pulse width.
    pub fn pulse_width(&self) -> f32 {
        self.pulse_width
    }

    /// Seed the noise generator.
    pub fn set_noise_seed(&mut self, seed: u32) {
        self.rng = XorShift32::new(seed);
    }

    /// Change the sample rate, keeping the frequency.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.set_frequency(self.frequency);
    }

    /// Jump to `phase` (cycles, wrapped into [0, 1)). Used for hard
    /// retrigger on note-on.
    pub fn reset_phase(&mut self, phase: f32) {
        let phase = if phase.is_finite() { phase } else { 0.0 };
        self.phase = phase - floorf(phase);
        // Start the integrator on the steady-state triangle.
        self.integrator = if self.phase < 0.5 {
            4.0 * self.phase - 1.0
        } else {
            3.0 - 4.0 * self.phase
        };
    }

    /// Current phase in cycles.
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Produce one sample and advance.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        let t = self.phase;
        let dt = self.phase_inc;

        let out = match self.waveform {
            Waveform::Sine => sinf(TAU * t),
            Waveform::Saw => 2.0 * t - 1.0 - poly_blep(t, dt),
            Waveform::Square => pulse(t, 0.5, dt),
            Waveform::Pulse => pulse(t, self.pulse_width, dt),
            Waveform::Triangle => {
                // Integrate the band-limited square; the leak keeps DC from
                // building up and is weaker at low frequencies.
                let square = pulse(t, 0.5, dt);
                let leak = 1.0 - dt.min(0.1);
                self.integrator = leak * self.integrator + 4.0 * dt * square;
                self.integrator
            }
            Waveform::Noise => self.rng.next_bipolar(),
        };

        self.phase += dt;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        out
    }
}

#[inline]
fn pulse(t: f32, width: f32, dt: f32) -> f32 {
    let naive = if t < width { 1.0 } else { -1.0 };
    let mut falling = t - width;
    if falling < 0.0 {
        falling += 1.0;
    }
    naive + poly_blep(t, dt) - poly_blep(falling, dt)
}

/// PolyBLEP residual for a unit step at `t = 0`, nonzero only within
/// one sample either side of the step.
///
/// `2n - n^2 - 1` for `n = t / dt` in [0, 1) after the step and
/// `n^2 + 2n + 1` for `n` in (-1, 0) before it.
#[inline]
fn poly_blep(t: f32, dt: f32) -> f32 {
    if dt <= 0.0 {
        return 0.0;
    }
    if t < dt {
        let n = t / dt;
        2.0 * n - n * n - 1.0
    } else if t > 1.0 - dt {
        let n = (t - 1.0) / dt;
        n * n + 2.0 * n + 1.0
    } else {
        0.0
    }
}

//! One-pole (6 dB/oct) low-pass.
//!
//! `y[n] = x[n] + c * (y[n-1] - x[n])` with `c = exp(-2π f / fs)`.
//! Used for tone controls and for damping inside feedback loops.

use core::f32::consts::TAU;
use libm::expf;

use crate::math::flush_denormal;

/// One-pole low-pass with a derived high-pass output.
///
/// ```rust
/// use timbre_core::OnePole;
///
/// let mut lp = OnePole::new(48000.0, 2000.0);
/// assert!(lp.process(1.0) < 1.0);
/// ```
#[derive(Debug, Clone)]
pub struct OnePole {
    state: f32,
    coeff: f32,
    sample_rate: f32,
    freq: f32,
}

impl OnePole {
    /// Low-pass at `freq_hz`.
    pub fn new(sample_rate: f32, freq_hz: f32) -> Self {
        let mut filter = Self {
            state: 0.0,
            coeff: 0.0,
            sample_rate,
            freq: freq_hz,
        };
        filter.recalculate_coeff();
        filter
    }

    /// Move the cutoff. Clamped to `1 Hz ..= 0.49 * sample_rate`.
    pub fn set_frequency(&mut self, freq_hz: f32) {
        self.freq = freq_hz;
        self.recalculate_coeff();
    }

    /// Current cutoff in Hz.
    pub fn frequency(&self) -> f32 {
        self.freq
    }

    /// Change the sample rate, keeping the cutoff.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.recalculate_coeff();
    }

    /// Low-pass one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.state = flush_denormal(input + self.coeff * (self.state - input));
        self.state
    }

    /// High-pass one sample (input minus the low-pass).
    #[inline]
    pub fn process_highpass(&mut self, input: f32) -> f32 {
        input - self.process(input)
    }

    /// Zero the state.
    pub fn reset(&mut self) {
        self.state = 0.0;
    }

    fn recalculate_coeff(&mut self) {
        let nyquist_guard = (self.sample_rate * 0.49).max(1.0);
        self.freq = if self.freq.is_finite() {
            self.freq.clamp(1.0, nyquist_guard)
        } else {
            nyquist_guard
        };
        self.coeff = expf(-TAU * self.freq / self.sample_rate);
    }
}

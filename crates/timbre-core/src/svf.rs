//! Zero-delay-feedback state variable filter.
//!
//! Trapezoidal (TPT) SVF after Zavalishin, "The Art of VA Filter Design",
//! chapter 3, with the shelf and bell mixing coefficients from Andrew
//! Simper's "Linear Trapezoidal Integrated SVF" notes. One state update
//! yields the low, high, band and notch responses together; shelves and
//! the bell are linear combinations of the same three signals.
//!
//! # Resonance
//!
//! Resonance is a normalised 0..=1 control rather than a raw Q. It maps to
//! the damping term `k = 2 - 1.96 * r`, so `r = 0` is a gentle Q of 0.5
//! and `r = 1` is Q ≈ 25. Damping never reaches zero, which keeps both
//! integrators strictly stable at every cutoff the filter accepts.

use core::f32::consts::PI;
use libm::{powf, sqrtf, tanf, tanhf};

use crate::math::flush_denormal;

const MIN_DAMPING: f32 = 0.04;
const MIN_CUTOFF: f32 = 20.0;
const MAX_CUTOFF_RATIO: f32 = 0.49;

/// Which response [`StateVariableFilter::process`] returns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SvfType {
    /// 12 dB/oct low-pass
    #[default]
    Lowpass,
    /// 12 dB/oct high-pass
    Highpass,
    /// Constant-skirt band-pass
    Bandpass,
    /// Band-reject
    Notch,
    /// Bell boost/cut at the cutoff, gain from [`StateVariableFilter::set_gain_db`]
    Peak,
    /// Low shelf, gain from [`StateVariableFilter::set_gain_db`]
    LowShelf,
    /// High shelf, gain from [`StateVariableFilter::set_gain_db`]
    HighShelf,
}

/// All four basic responses from a single state update.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SvfOutputs {
    /// Low-pass
    pub low: f32,
    /// High-pass
    pub high: f32,
    /// Band-pass
    pub band: f32,
    /// Notch (low + high)
    pub notch: f32,
}

/// Two-pole TPT state variable filter.
///
/// ```rust
/// use timbre_core::{StateVariableFilter, SvfType};
///
/// let mut svf = StateVariableFilter::new(48000.0);
/// svf.set_filter_type(SvfType::Lowpass);
/// svf.set_cutoff(800.0);
/// svf.set_resonance(0.5);
///
/// let y = svf.process(0.25);
/// assert!(y.is_finite());
/// ```
#[derive(Debug, Clone)]
pub struct StateVariableFilter {
    ic1eq: f32,
    ic2eq: f32,

    g: f32,
    k: f32,
    a1: f32,
    // Output mix: y = m0 * x + m1 * band + m2 * low
    m0: f32,
    m1: f32,
    m2: f32,

    sample_rate: f32,
    cutoff: f32,
    resonance: f32,
    gain_db: f32,
    drive: f32,
    filter_type: SvfType,
}

impl Default for StateVariableFilter {
    fn default() -> Self {
        Self::new(48000.0)
    }
}

impl StateVariableFilter {
    /// Low-pass at 1 kHz, no resonance.
    pub fn new(sample_rate: f32) -> Self {
        let mut svf = Self {
            ic1eq: 0.0,
            ic2eq: 0.0,
            g: 0.0,
            k: 2.0,
            a1: 0.0,
            m0: 0.0,
            m1: 0.0,
            m2: 1.0,
            sample_rate,
            cutoff: 1000.0,
            resonance: 0.0,
            gain_db: 0.0,
            drive: 0.0,
            filter_type: SvfType::Lowpass,
        };
        svf.update_coefficients();
        svf
    }

    /// Set the cutoff in Hz, clamped to `20 ..= 0.49 * sample_rate`.
    ///
    /// Coefficients are only recomputed when the clamped value changes, so
    /// calling this every sample with a steady value is cheap.
    pub fn set_cutoff(&mut self, freq: f32) {
        let clamped = sanitize(freq, 1000.0).clamp(MIN_CUTOFF, self.max_cutoff());
        if clamped != self.cutoff {
            self.cutoff = clamped;
            self.update_coefficients();
        }
    }

    /// Current cutoff in Hz.
    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    /// Set resonance in 0..=1.
    pub fn set_resonance(&mut self, resonance: f32) {
        let clamped = sanitize(resonance, 0.0).clamp(0.0, 1.0);
        if clamped != self.resonance {
            self.resonance = clamped;
            self.update_coefficients();
        }
    }

    /// Current resonance in 0..=1.
    pub fn resonance(&self) -> f32 {
        self.resonance
    }

    /// Equivalent Q of the current resonance setting.
    pub fn q(&self) -> f32 {
        1.0 / resonance_to_damping(self.resonance)
    }

    /// Gain used by the peak and shelf responses, clamped to ±24 dB.
    pub fn set_gain_db(&mut self, gain_db: f32) {
        let clamped = sanitize(gain_db, 0.0).clamp(-24.0, 24.0);
        if clamped != self.gain_db {
            self.gain_db = clamped;
            self.update_coefficients();
        }
    }

    /// Integrator saturation in 0..=1. Zero is a clean linear filter.
    pub fn set_drive(&mut self, drive: f32) {
        self.drive = sanitize(drive, 0.0).clamp(0.0, 1.0);
    }

    /// Select the response returned by [`process`](Self::process).
    pub fn set_filter_type(&mut self, filter_type: SvfType) {
        if filter_type != self.filter_type {
            self.filter_type = filter_type;
            self.update_coefficients();
        }
    }

    /// Current response type.
    pub fn filter_type(&self) -> SvfType {
        self.filter_type
    }

    /// Change the sample rate. The cutoff is re-clamped to the new Nyquist.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.cutoff = self.cutoff.clamp(MIN_CUTOFF, self.max_cutoff());
        self.update_coefficients();
    }

    /// Clear both integrators.
    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }

    /// Filter one sample with the selected response.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let (band, low) = self.tick(input);
        self.m0 * input + self.m1 * band + self.m2 * low
    }

    /// Filter one sample and return low, high, band and notch together.
    ///
    /// Uses the same state as [`process`](Self::process); do not call both
    /// for the same input sample.
    #[inline]
    pub fn process_multimode(&mut self, input: f32) -> SvfOutputs {
        let (band, low) = self.tick(input);
        let high = input - self.k * band - low;
        SvfOutputs {
            low,
            high,
            band,
            notch: low + high,
        }
    }

    #[inline]
    fn tick(&mut self, input: f32) -> (f32, f32) {
        let v3 = input - self.ic2eq;
        let v1 = self.a1 * (self.ic1eq + self.g * v3);
        let v2 = self.ic2eq + self.g * v1;

        let v1_state = if self.drive > 0.0 {
            let d = 1.0 + self.drive * 3.0;
            tanhf(v1 * d) / d
        } else {
            v1
        };

        self.ic1eq = flush_denormal(2.0 * v1_state - self.ic1eq);
        self.ic2eq = flush_denormal(2.0 * v2 - self.ic2eq);
        (v1, v2)
    }

    fn max_cutoff(&self) -> f32 {
        (self.sample_rate * MAX_CUTOFF_RATIO).max(MIN_CUTOFF)
    }

    fn update_coefficients(&mut self) {
        let base_k = resonance_to_damping(self.resonance);
        let g = tanf(PI * self.cutoff / self.sample_rate);
        // A = 10^(dB/40), so A^2 is the linear shelf/bell gain.
        let a = powf(10.0, self.gain_db / 40.0);

        let (g, k, m0, m1, m2) = match self.filter_type {
            SvfType::Lowpass => (g, base_k, 0.0, 0.0, 1.0),
            SvfType::Highpass => (g, base_k, 1.0, -base_k, -1.0),
            SvfType::Bandpass => (g, base_k, 0.0, 1.0, 0.0),
            SvfType::Notch => (g, base_k, 1.0, -base_k, 0.0),
            SvfType::Peak => {
                let k = base_k / a;
                (g, k, 1.0, k * (a * a - 1.0), 0.0)
            }
            SvfType::LowShelf => {
                let g = g / sqrtf(a);
                (g, base_k, 1.0, base_k * (a - 1.0), a * a - 1.0)
            }
            SvfType::HighShelf => {
                let g = g * sqrtf(a);
                (g, base_k, a * a, base_k * (1.0 - a) * a, 1.0 - a * a)
            }
        };

        self.g = g;
        self.k = k;
        self.a1 = 1.0 / (1.0 + g * (g + k));
        self.m0 = m0;
        self.m1 = m1;
        self.m2 = m2;
    }
}

/// Map normalised resonance to SVF damping (`k = 1/Q`).
#[inline]
pub fn resonance_to_damping(resonance: f32) -> f32 {
    (2.0 - 2.0 * resonance.clamp(0.0, 1.0) * 0.98).max(MIN_DAMPING)
}

#[inline]
fn sanitize(value: f32, fallback: f32) -> f32 {
    if value.is_finite() { value } else { fallback }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libm::sinf;

    fn rms_of_sine(svf: &mut StateVariableFilter, freq: f32, sr: f32) -> f32 {
        let mut sum = 0.0;
        let n = 4800;
        for i in 0..n + 2400 {
            let x = sinf(2.0 * PI * freq * i as f32 / sr);
            let y = svf.process(x);
            if i >= 2400 {
                sum += y * y;
            }
        }
        sqrtf(sum / n as f32)
    }

    // ---- Coefficients ----

    #[test]
    fn cutoff_is_clamped() {
        let mut svf = StateVariableFilter::new(48000.0);
        svf.set_cutoff(5.0);
        assert_eq!(svf.cutoff(), 20.0);
        svf.set_cutoff(40_000.0);
        assert!((svf.cutoff() - 23_520.0).abs() < 0.01);
        svf.set_cutoff(f32::NAN);
        assert!(svf.cutoff().is_finite());
    }

    #[test]
    fn resonance_maps_below_self_oscillation() {
        assert!((resonance_to_damping(0.0) - 2.0).abs() < 1e-6);
        assert!(resonance_to_damping(1.0) >= MIN_DAMPING);
        let mut svf = StateVariableFilter::new(48000.0);
        svf.set_resonance(1.0);
        assert!(svf.q() < 30.0 && svf.q() > 20.0, "q = {}", svf.q());
    }

    // ---- Responses ----

    #[test]
    fn lowpass_passes_low_and_cuts_high() {
        let sr = 48000.0;
        let mut svf = StateVariableFilter::new(sr);
        svf.set_cutoff(1000.0);
        let low = rms_of_sine(&mut svf, 100.0, sr);
        svf.reset();
        let high = rms_of_sine(&mut svf, 10_000.0, sr);
        assert!(low > 0.6, "low rms {}", low);
        assert!(high < 0.05, "high rms {}", high);
    }

    #[test]
    fn highpass_cuts_low() {
        let sr = 48000.0;
        let mut svf = StateVariableFilter::new(sr);
        svf.set_filter_type(SvfType::Highpass);
        svf.set_cutoff(2000.0);
        let low = rms_of_sine(&mut svf, 100.0, sr);
        assert!(low < 0.01, "low rms {}", low);
    }

    #[test]
    fn multimode_matches_single_mode() {
        let mut a = StateVariableFilter::new(48000.0);
        let mut b = StateVariableFilter::new(48000.0);
        a.set_cutoff(700.0);
        b.set_cutoff(700.0);
        b.set_filter_type(SvfType::Highpass);
        for i in 0..256 {
            let x = sinf(i as f32 * 0.07);
            let all = a.process_multimode(x);
            let hp = b.process(x);
            assert!((all.high - hp).abs() < 1e-5);
            assert!((all.notch - (all.low + all.high)).abs() < 1e-6);
        }
    }

    #[test]
    fn shelves_and_bell_are_flat_at_zero_gain() {
        for ty in [SvfType::Peak, SvfType::LowShelf, SvfType::HighShelf] {
            let mut svf = StateVariableFilter::new(48000.0);
            svf.set_filter_type(ty);
            svf.set_cutoff(1000.0);
            svf.set_gain_db(0.0);
            for i in 0..512 {
                let x = sinf(i as f32 * 0.05);
                let y = svf.process(x);
                assert!((y - x).abs() < 1e-4, "{:?} not flat: {} vs {}", ty, y, x);
            }
        }
    }

    #[test]
    fn low_shelf_boosts_bass() {
        let sr = 48000.0;
        let mut svf = StateVariableFilter::new(sr);
        svf.set_filter_type(SvfType::LowShelf);
        svf.set_cutoff(500.0);
        svf.set_gain_db(12.0);
        let low = rms_of_sine(&mut svf, 50.0, sr);
        // +12 dB on a 0.707 rms sine is ~2.8
        assert!(low > 2.3, "low rms {}", low);
    }

    // ---- Stability ----

    #[test]
    fn full_resonance_near_nyquist_stays_bounded() {
        let sr = 48000.0;
        let mut svf = StateVariableFilter::new(sr);
        svf.set_cutoff(sr * 0.49);
        svf.set_resonance(1.0);
        let mut peak = 0.0_f32;
        for i in 0..10_000 {
            let y = svf.process(sinf(2.0 * PI * 11_000.0 * i as f32 / sr));
            peak = peak.max(y.abs());
        }
        assert!(peak.is_finite() && peak < 50.0, "peak {}", peak);
    }
}

//! Math helpers shared by the oscillators, filters, voices and effects.
//!
//! Everything here is allocation-free and built on `libm`, so it runs on
//! targets without `std`.
//!
//! # Pitch
//!
//! - [`midi_to_freq`] / [`freq_to_midi`] - Equal-tempered note conversion (A4 = 440 Hz)
//! - [`cents_to_ratio`] / [`semitones_to_ratio`] - Frequency ratios for detune
//!
//! # Shaping
//!
//! | Function | Character |
//! |----------|-----------|
//! | [`soft_clip`] | tanh saturation, odd harmonics |
//! | [`hard_clip`] | flat-topped limiting |
//! | [`asymmetric_clip`] | tube-like, even + odd harmonics |
//! | [`foldback`] | wavefolding, dense upper partials |
//! | [`quantize`] | bit-depth reduction |
//!
//! # Interpolation
//!
//! - [`lerp`] - Linear
//! - [`hermite`] - 4-point, 3rd-order Hermite (Catmull-Rom tangents)

use libm::{cosf, expf, floorf, log2f, logf, powf, sinf, tanhf};

/// Convert decibels to linear gain.
///
/// ```rust
/// use timbre_core::db_to_linear;
///
/// assert!((db_to_linear(0.0) - 1.0).abs() < 1e-6);
/// assert!((db_to_linear(-6.0206) - 0.5).abs() < 1e-3);
/// ```
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    const FACTOR: f32 = core::f32::consts::LN_10 / 20.0;
    expf(db * FACTOR)
}

/// Convert linear gain to decibels. Inputs at or below zero floor at -200 dB.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    const FACTOR: f32 = 20.0 / core::f32::consts::LN_10;
    logf(linear.max(1e-10)) * FACTOR
}

/// Frequency of a (possibly fractional) MIDI note number.
///
/// ```rust
/// use timbre_core::midi_to_freq;
///
/// assert!((midi_to_freq(69.0) - 440.0).abs() < 1e-3);
/// assert!((midi_to_freq(60.0) - 261.6256).abs() < 1e-2);
/// ```
#[inline]
pub fn midi_to_freq(note: f32) -> f32 {
    440.0 * powf(2.0, (note - 69.0) / 12.0)
}

/// Fractional MIDI note number of a frequency.
#[inline]
pub fn freq_to_midi(freq: f32) -> f32 {
    69.0 + 12.0 * log2f(freq.max(1e-3) / 440.0)
}

/// Frequency ratio for a detune in cents (100 cents = 1 semitone).
#[inline]
pub fn cents_to_ratio(cents: f32) -> f32 {
    powf(2.0, cents / 1200.0)
}

/// Frequency ratio for a transposition in semitones.
#[inline]
pub fn semitones_to_ratio(semitones: f32) -> f32 {
    powf(2.0, semitones / 12.0)
}

/// tanh saturation. Approaches ±1 asymptotically.
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    tanhf(x)
}

/// Clamp to `±threshold`.
#[inline]
pub fn hard_clip(x: f32, threshold: f32) -> f32 {
    x.clamp(-threshold, threshold)
}

/// Asymmetric saturation: the negative half clips harder than the positive
/// half, which adds even harmonics.
#[inline]
pub fn asymmetric_clip(x: f32) -> f32 {
    if x >= 0.0 {
        tanhf(x)
    } else {
        tanhf(x * 1.5) * 0.8
    }
}

/// Wavefolder. Reflects the signal back into `±threshold` however far it
/// overshoots.
///
/// Iteration is bounded: the fold is computed with a triangle-wave mapping
/// rather than by repeated reflection.
#[inline]
pub fn foldback(x: f32, threshold: f32) -> f32 {
    let t = threshold.max(1e-6);
    if x.abs() <= t {
        return x;
    }
    // Triangle wave with period 4t that matches identity on [-t, t].
    let period = 4.0 * t;
    let shifted = x + t;
    let wrapped = shifted - period * floorf(shifted / period);
    if wrapped < 2.0 * t {
        wrapped - t
    } else {
        3.0 * t - wrapped
    }
}

/// Quantize a sample in [-1, 1] to the given bit depth.
///
/// Depths below 1 bit are treated as 1 bit.
#[inline]
pub fn quantize(x: f32, bits: f32) -> f32 {
    let levels = powf(2.0, bits.max(1.0) - 1.0);
    floorf(x * levels + 0.5) / levels
}

/// Linear interpolation between `a` (t = 0) and `b` (t = 1).
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// 4-point Hermite interpolation between `y1` and `y2`.
///
/// `y0` and `y3` are the outer neighbours; `t` is the fractional position in
/// `[0, 1)`. Tangents are Catmull-Rom, so the curve passes through every
/// sample point.
#[inline]
pub fn hermite(y0: f32, y1: f32, y2: f32, y3: f32, t: f32) -> f32 {
    let c0 = y1;
    let c1 = 0.5 * (y2 - y0);
    let c2 = y0 - 2.5 * y1 + 2.0 * y2 - 0.5 * y3;
    let c3 = 0.5 * (y3 - y0) + 1.5 * (y1 - y2);
    ((c3 * t + c2) * t + c1) * t + c0
}

/// Equal-power pan law. `pan` in [-1, 1] (left to right); returns
/// `(left_gain, right_gain)` with `l² + r² = 1`.
#[inline]
pub fn equal_power_pan(pan: f32) -> (f32, f32) {
    let angle = (pan.clamp(-1.0, 1.0) + 1.0) * core::f32::consts::FRAC_PI_4;
    (cosf(angle), sinf(angle))
}

/// Milliseconds to samples.
#[inline]
pub fn ms_to_samples(ms: f32, sample_rate: f32) -> f32 {
    ms * sample_rate / 1000.0
}

/// Replace values too small to matter with zero.
///
/// Feedback paths that decay towards zero otherwise end up in the subnormal
/// range, which is very slow on most CPUs.
#[allow(clippy::inline_always)]
#[inline(always)]
pub fn flush_denormal(x: f32) -> f32 {
    if x.abs() < 1e-20 { 0.0 } else { x }
}

/// Dry/wet crossfade: `mix = 0` is all dry, `mix = 1` is all wet.
#[inline]
pub fn wet_dry_mix(dry: f32, wet: f32, mix: f32) -> f32 {
    dry + (wet - dry) * mix
}

/// [`wet_dry_mix`] applied to both channels.
#[inline]
pub fn wet_dry_mix_stereo(dry_l: f32, dry_r: f32, wet_l: f32, wet_r: f32, mix: f32) -> (f32, f32) {
    (
        wet_dry_mix(dry_l, wet_l, mix),
        wet_dry_mix(dry_r, wet_r, mix),
    )
}

/// Small, fast, deterministic xorshift32 generator.
///
/// Used for noise oscillators, sample-and-hold LFOs and per-note random
/// modulation. Never yields zero state.
#[derive(Debug, Clone, Copy)]
pub struct XorShift32 {
    state: u32,
}

impl XorShift32 {
    /// Create a generator. A zero seed is replaced with a fixed non-zero one.
    pub const fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 0x9E37_79B9 } else { seed },
        }
    }

    /// Next raw 32-bit value.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Uniform value in [-1, 1].
    #[inline]
    pub fn next_bipolar(&mut self) -> f32 {
        (self.next_u32() as f32 / u32::MAX as f32) * 2.0 - 1.0
    }

    /// Uniform value in [0, 1].
    #[inline]
    pub fn next_unipolar(&mut self) -> f32 {
        self.next_u32() as f32 / u32::MAX as f32
    }
}

impl Default for XorShift32 {
    fn default() -> Self {
        Self::new(0x1234_5678)
    }
}

//! Algorithmic stereo reverb.
//!
//! Freeverb topology: eight damped feedback combs in parallel feeding four
//! Schroeder allpasses in series, once per channel. The right channel's
//! delays are offset by [`STEREO_SPREAD`] samples so the two tails
//! decorrelate, and `width` blends the two wet outputs.
//!
//! ```text
//!            ┌── comb ×8 (parallel, damped) ──┐
//! in ─ pre ──┤                                ├─ allpass ×4 ─ width ─ mix ─ out
//!   delay    └────────────────────────────────┘
//! ```

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(not(feature = "std"))]
use alloc::vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use timbre_core::{
    DelayLine, Effect, ParamDescriptor, ParameterInfo, SmoothedParam, flush_denormal,
    wet_dry_mix_stereo,
};

/// Comb delays at 44.1 kHz. Mutually prime to avoid stacked resonances.
const COMB_TUNINGS_44K: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];

/// Allpass delays at 44.1 kHz.
const ALLPASS_TUNINGS_44K: [usize; 4] = [556, 441, 341, 225];

/// Extra samples added to every right-channel delay.
const STEREO_SPREAD: usize = 23;

const REFERENCE_RATE: f32 = 44100.0;
const FIXED_GAIN: f32 = 0.015;
const SCALE_ROOM: f32 = 0.28;
const OFFSET_ROOM: f32 = 0.7;
const SCALE_DAMP: f32 = 0.4;
const ALLPASS_FEEDBACK: f32 = 0.5;

/// Longest pre-delay, in milliseconds.
pub const MAX_PREDELAY_MS: f32 = 200.0;

fn scale_to_rate(samples: usize, sample_rate: f32) -> usize {
    (libm::roundf(samples as f32 * sample_rate / REFERENCE_RATE) as usize).max(1)
}

/// Feedback comb with a one-pole low-pass in the loop.
#[derive(Debug, Clone)]
struct Comb {
    buffer: Vec<f32>,
    pos: usize,
    store: f32,
    feedback: f32,
    damp: f32,
}

impl Comb {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len.max(1)],
            pos: 0,
            store: 0.0,
            feedback: 0.5,
            damp: 0.2,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let out = self.buffer[self.pos];
        self.store = flush_denormal(out * (1.0 - self.damp) + self.store * self.damp);
        self.buffer[self.pos] = flush_denormal(input + self.store * self.feedback);
        self.pos += 1;
        if self.pos == self.buffer.len() {
            self.pos = 0;
        }
        out
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.store = 0.0;
        self.pos = 0;
    }
}

/// Schroeder allpass diffuser.
#[derive(Debug, Clone)]
struct Allpass {
    buffer: Vec<f32>,
    pos: usize,
}

impl Allpass {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len.max(1)],
            pos: 0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let buffered = self.buffer[self.pos];
        self.buffer[self.pos] = flush_denormal(input + buffered * ALLPASS_FEEDBACK);
        self.pos += 1;
        if self.pos == self.buffer.len() {
            self.pos = 0;
        }
        buffered - input
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.pos = 0;
    }
}

#[derive(Debug, Clone)]
struct Tank {
    combs: [Comb; 8],
    allpasses: [Allpass; 4],
}

impl Tank {
    fn new(sample_rate: f32, offset: usize) -> Self {
        Self {
            combs: core::array::from_fn(|i| {
                Comb::new(scale_to_rate(COMB_TUNINGS_44K[i] + offset, sample_rate))
            }),
            allpasses: core::array::from_fn(|i| {
                Allpass::new(scale_to_rate(ALLPASS_TUNINGS_44K[i] + offset, sample_rate))
            }),
        }
    }

    fn set_coefficients(&mut self, feedback: f32, damp: f32) {
        for comb in &mut self.combs {
            comb.feedback = feedback;
            comb.damp = damp;
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let mut sum = 0.0;
        for comb in &mut self.combs {
            sum += comb.process(input);
        }
        for allpass in &mut self.allpasses {
            sum = allpass.process(sum);
        }
        sum
    }

    fn clear(&mut self) {
        self.combs.iter_mut().for_each(Comb::clear);
        self.allpasses.iter_mut().for_each(Allpass::clear);
    }
}

/// Freeverb-style stereo reverb with pre-delay and freeze.
///
/// ## Parameter Indices (`ParameterInfo`)
///
/// | Index | Name | Range | Default |
/// |-------|------|-------|---------|
/// | 0 | Room Size | 0–1 | 0.5 |
/// | 1 | Damping | 0–1 | 0.5 |
/// | 2 | Width | 0–1 | 1.0 |
/// | 3 | Pre-Delay | 0–200 ms | 0.0 |
/// | 4 | Freeze | off/on | off |
/// | 5 | Mix | 0–1 | 0.3 |
///
/// # Example
///
/// ```rust
/// use timbre_core::Effect;
/// use timbre_effects::Reverb;
///
/// let mut reverb = Reverb::new(48000.0);
/// reverb.set_room_size(0.8);
/// reverb.set_damping(0.3);
/// reverb.set_mix(0.4);
///
/// let (l, r) = reverb.process_stereo(0.5, 0.5);
/// assert!(l.is_finite() && r.is_finite());
/// ```
#[derive(Debug, Clone)]
pub struct Reverb {
    left: Tank,
    right: Tank,
    predelay: DelayLine,
    sample_rate: f32,

    room_size: f32,
    damping: f32,
    width: f32,
    predelay_ms: f32,
    frozen: bool,
    mix: SmoothedParam,

    wet1: f32,
    wet2: f32,
    input_gain: f32,
}

impl Reverb {
    /// Reverb with a medium room, 30% wet.
    pub fn new(sample_rate: f32) -> Self {
        let mut reverb = Self {
            left: Tank::new(sample_rate, 0),
            right: Tank::new(sample_rate, STEREO_SPREAD),
            predelay: DelayLine::from_time(sample_rate, MAX_PREDELAY_MS / 1000.0),
            sample_rate,
            room_size: 0.5,
            damping: 0.5,
            width: 1.0,
            predelay_ms: 0.0,
            frozen: false,
            mix: SmoothedParam::standard(0.3, sample_rate),
            wet1: 1.0,
            wet2: 0.0,
            input_gain: FIXED_GAIN,
        };
        reverb.update();
        reverb
    }

    /// Room size in 0..=1. Larger rooms ring longer.
    pub fn set_room_size(&mut self, size: f32) {
        self.room_size = clamp_unit(size, 0.5);
        self.update();
    }

    /// Current room size.
    pub fn room_size(&self) -> f32 {
        self.room_size
    }

    /// High-frequency absorption in 0..=1 (0 bright, 1 dark).
    pub fn set_damping(&mut self, damping: f32) {
        self.damping = clamp_unit(damping, 0.5);
        self.update();
    }

    /// Current damping.
    pub fn damping(&self) -> f32 {
        self.damping
    }

    /// Stereo width of the tail in 0..=1 (0 mono).
    pub fn set_width(&mut self, width: f32) {
        self.width = clamp_unit(width, 1.0);
        self.update();
    }

    /// Current width.
    pub fn width(&self) -> f32 {
        self.width
    }

    /// Gap before the tail starts, clamped to `0 ..= MAX_PREDELAY_MS`.
    pub fn set_predelay_ms(&mut self, ms: f32) {
        self.predelay_ms = if ms.is_finite() {
            ms.clamp(0.0, MAX_PREDELAY_MS)
        } else {
            0.0
        };
    }

    /// Current pre-delay in milliseconds.
    pub fn predelay_ms(&self) -> f32 {
        self.predelay_ms
    }

    /// Hold the current tail indefinitely and stop accepting input.
    pub fn set_freeze(&mut self, frozen: bool) {
        self.frozen = frozen;
        self.update();
    }

    /// Whether the tail is frozen.
    pub fn frozen(&self) -> bool {
        self.frozen
    }

    fn update(&mut self) {
        let (feedback, damp) = if self.frozen {
            self.input_gain = 0.0;
            (1.0, 0.0)
        } else {
            self.input_gain = FIXED_GAIN;
            (
                self.room_size * SCALE_ROOM + OFFSET_ROOM,
                self.damping * SCALE_DAMP,
            )
        };
        self.left.set_coefficients(feedback, damp);
        self.right.set_coefficients(feedback, damp);

        self.wet1 = self.width * 0.5 + 0.5;
        self.wet2 = (1.0 - self.width) * 0.5;
    }
}

impl Effect for Reverb {
    #[inline]
    fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
        let mix = self.mix.advance();

        let mono = (left + right) * self.input_gain;
        let delay = self.predelay_ms * self.sample_rate / 1000.0;
        let input = if delay >= 1.0 {
            self.predelay.read_write(mono, delay)
        } else {
            self.predelay.write(mono);
            mono
        };

        let out_l = self.left.process(input);
        let out_r = self.right.process(input);

        let wet_l = out_l * self.wet1 + out_r * self.wet2;
        let wet_r = out_r * self.wet1 + out_l * self.wet2;

        wet_dry_mix_stereo(left, right, wet_l, wet_r, mix)
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.left = Tank::new(sample_rate, 0);
        self.right = Tank::new(sample_rate, STEREO_SPREAD);
        self.predelay = DelayLine::from_time(sample_rate, MAX_PREDELAY_MS / 1000.0);
        self.mix.set_sample_rate(sample_rate);
        self.update();
    }

    fn reset(&mut self) {
        self.left.clear();
        self.right.clear();
        self.predelay.clear();
        self.mix.snap_to_target();
    }

    fn mix(&self) -> f32 {
        self.mix.target()
    }

    fn set_mix(&mut self, mix: f32) {
        self.mix.set_target(clamp_unit(mix, 0.3));
    }

    fn latency_samples(&self) -> usize {
        (self.predelay_ms * self.sample_rate / 1000.0) as usize
    }
}

impl ParameterInfo for Reverb {
    fn param_count(&self) -> usize {
        6
    }

    fn param_info(&self, index: usize) -> Option<ParamDescriptor> {
        match index {
            0 => Some(ParamDescriptor::amount("Room Size", "Room", 0.5)),
            1 => Some(ParamDescriptor::amount("Damping", "Damp", 0.5)),
            2 => Some(ParamDescriptor::amount("Width", "Width", 1.0)),
            3 => Some(ParamDescriptor::time_ms(
                "Pre-Delay",
                "PreDly",
                0.0,
                MAX_PREDELAY_MS,
                0.0,
            )),
            4 => Some(ParamDescriptor::choice("Freeze", "Freeze", 2, 0)),
            5 => Some(ParamDescriptor::mix(0.3)),
            _ => None,
        }
    }

    fn get_param(&self, index: usize) -> f32 {
        match index {
            0 => self.room_size,
            1 => self.damping,
            2 => self.width,
            3 => self.predelay_ms,
            4 => f32::from(u8::from(self.frozen)),
            5 => self.mix(),
            _ => 0.0,
        }
    }

    fn set_param(&mut self, index: usize, value: f32) {
        let Some(desc) = self.param_info(index) else {
            return;
        };
        let value = desc.clamp(value);
        match index {
            0 => self.set_room_size(value),
            1 => self.set_damping(value),
            2 => self.set_width(value),
            3 => self.set_predelay_ms(value),
            4 => self.set_freeze(value >= 0.5),
            5 => self.set_mix(value),
            _ => {}
        }
    }
}

#[inline]
fn clamp_unit(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        fallback
    }
}

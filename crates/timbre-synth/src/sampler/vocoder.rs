//! Phase vocoder for independent time-stretch and pitch-shift.
//!
//! Each analysis frame is windowed and transformed. The phase advance of
//! every bin since the previous frame gives its true frequency. Pitch
//! shifting moves each bin's magnitude and frequency to bin
//! `round(b * pitch)`; time stretching accumulates synthesis phase over
//! a synthesis hop of `hop * time` instead of `hop`. Frames are
//! resynthesised and overlap-added.
//!
//! This is a separate stage. Nothing in the engine's signal path calls
//! it; hosts run it on a buffer before handing the result to a
//! [`SampleZone`](super::SampleZone) or stream through it themselves.

use std::f32::consts::PI;
use std::sync::Arc;
use std::vec::Vec;

use libm::{atan2f, ceilf, cosf, roundf, sinf, sqrtf};
use rustfft::{Fft, FftPlanner, num_complex::Complex};

use crate::error::SampleError;

/// Smallest frame size.
pub const MIN_FRAME: usize = 16;

/// Ratio bounds for time and pitch.
pub const MIN_RATIO: f32 = 0.25;
/// Ratio bounds for time and pitch.
pub const MAX_RATIO: f32 = 4.0;

/// Short-time Fourier time/pitch processor.
///
/// ```rust
/// use timbre_synth::sampler::PhaseVocoder;
///
/// let input: Vec<f32> = (0..4800).map(|i| (i as f32 * 0.1).sin()).collect();
/// let mut pv = PhaseVocoder::new(1024, 256).unwrap();
/// pv.set_time_ratio(1.5);
///
/// let mut out = Vec::new();
/// pv.process(&input, &mut out);
/// assert_eq!(out.len(), 7200);
/// ```
pub struct PhaseVocoder {
    size: usize,
    hop: usize,
    time_ratio: f32,
    pitch_ratio: f32,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    last_phase: Vec<f32>,
    sum_phase: Vec<f32>,
    magnitude: Vec<f32>,
    frequency: Vec<f32>,
    syn_magnitude: Vec<f32>,
    syn_frequency: Vec<f32>,
    syn_phase: Vec<f32>,
}

impl core::fmt::Debug for PhaseVocoder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PhaseVocoder")
            .field("size", &self.size)
            .field("hop", &self.hop)
            .field("time_ratio", &self.time_ratio)
            .field("pitch_ratio", &self.pitch_ratio)
            .finish_non_exhaustive()
    }
}

impl PhaseVocoder {
    /// Frame of `size` samples (a power of two, at least 16) and analysis
    /// hop `hop` (`0 < hop < size`).
    pub fn new(size: usize, hop: usize) -> Result<Self, SampleError> {
        if size < MIN_FRAME || !size.is_power_of_two() || hop == 0 || hop >= size {
            return Err(SampleError::InvalidFrame { size, hop });
        }

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        let ifft = planner.plan_fft_inverse(size);
        let scratch_len = fft
            .get_inplace_scratch_len()
            .max(ifft.get_inplace_scratch_len());

        let window = (0..size)
            .map(|i| 0.5 * (1.0 - cosf(2.0 * PI * i as f32 / size as f32)))
            .collect();
        let bins = size / 2 + 1;

        Ok(Self {
            size,
            hop,
            time_ratio: 1.0,
            pitch_ratio: 1.0,
            window,
            fft,
            ifft,
            spectrum: vec![Complex::new(0.0, 0.0); size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            last_phase: vec![0.0; bins],
            sum_phase: vec![0.0; bins],
            magnitude: vec![0.0; bins],
            frequency: vec![0.0; bins],
            syn_magnitude: vec![0.0; bins],
            syn_frequency: vec![0.0; bins],
            syn_phase: vec![0.0; bins],
        })
    }

    /// Output duration over input duration, 0.25..=4.
    pub fn set_time_ratio(&mut self, ratio: f32) {
        self.time_ratio = clamp_ratio(ratio);
    }

    /// Output pitch over input pitch, 0.25..=4.
    pub fn set_pitch_ratio(&mut self, ratio: f32) {
        self.pitch_ratio = clamp_ratio(ratio);
    }

    /// Current time ratio.
    pub fn time_ratio(&self) -> f32 {
        self.time_ratio
    }

    /// Current pitch ratio.
    pub fn pitch_ratio(&self) -> f32 {
        self.pitch_ratio
    }

    /// Frame size.
    pub fn frame_size(&self) -> usize {
        self.size
    }

    /// Clear phase history.
    pub fn reset(&mut self) {
        self.last_phase.fill(0.0);
        self.sum_phase.fill(0.0);
    }

    /// Stretch and shift `input` into `output`, replacing its contents.
    ///
    /// The output holds `ceil(input.len() * time_ratio)` samples.
    pub fn process(&mut self, input: &[f32], output: &mut Vec<f32>) {
        output.clear();
        if input.is_empty() {
            return;
        }
        self.reset();

        let syn_hop = (roundf(self.hop as f32 * self.time_ratio) as usize).max(1);
        let frames = input.len().div_ceil(self.hop) + self.size / self.hop;
        // Frames start `size - hop` samples before the input so its
        // first sample is fully covered.
        let lead = self.size - self.hop;
        let out_lead = (roundf(lead as f32 * self.time_ratio)) as usize;
        output.resize((frames - 1) * syn_hop + self.size, 0.0);

        for k in 0..frames {
            let start = (k * self.hop) as isize - lead as isize;
            self.analyse(input, start);
            self.shift();
            self.synthesise(syn_hop, start <= 0);
            let at = k * syn_hop;
            for (i, s) in self.spectrum.iter().enumerate() {
                output[at + i] += s.re * self.window[i];
            }
        }

        let norm = self.window.iter().map(|w| w * w).sum::<f32>() / syn_hop as f32;
        let wanted = ceilf(input.len() as f32 * self.time_ratio) as usize;
        output.drain(..out_lead.min(output.len()));
        output.truncate(wanted);
        output.resize(wanted, 0.0);
        let scale = 1.0 / (norm * self.size as f32);
        for s in output.iter_mut() {
            *s *= scale;
        }
    }

    /// Window and transform the frame at `start`, then estimate each
    /// bin's true frequency in radians per sample.
    fn analyse(&mut self, input: &[f32], start: isize) {
        for (i, c) in self.spectrum.iter_mut().enumerate() {
            let idx = start + i as isize;
            let x = if idx >= 0 {
                input.get(idx as usize).copied().unwrap_or(0.0)
            } else {
                0.0
            };
            *c = Complex::new(x * self.window[i], 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.spectrum, &mut self.scratch);

        let bin_step = 2.0 * PI / self.size as f32;
        let hop = self.hop as f32;
        for b in 0..self.magnitude.len() {
            let c = self.spectrum[b];
            let phase = atan2f(c.im, c.re);
            let expected = bin_step * b as f32 * hop;
            let delta = wrap_phase(phase - self.last_phase[b] - expected);
            self.last_phase[b] = phase;
            self.magnitude[b] = sqrtf(c.re * c.re + c.im * c.im);
            self.frequency[b] = bin_step * b as f32 + delta / hop;
        }
    }

    /// Move bins to their pitch-shifted positions.
    fn shift(&mut self) {
        self.syn_magnitude.fill(0.0);
        self.syn_frequency.fill(0.0);
        self.syn_phase.fill(0.0);
        let top = self.magnitude.len();
        for b in 0..top {
            let nb = roundf(b as f32 * self.pitch_ratio) as usize;
            if nb < top {
                self.syn_magnitude[nb] += self.magnitude[b];
                self.syn_frequency[nb] = self.frequency[b] * self.pitch_ratio;
                self.syn_phase[nb] = self.last_phase[b];
            }
        }
    }

    /// Accumulate synthesis phase and inverse-transform into `spectrum`.
    ///
    /// With `seed` set, synthesis phases are copied from the analysis
    /// instead of accumulated. Frames up to the one aligned with the start
    /// of the input are seeded so the partials' relative phases come from
    /// a frame that is fully covered.
    fn synthesise(&mut self, syn_hop: usize, seed: bool) {
        let bins = self.syn_magnitude.len();
        for b in 0..bins {
            self.sum_phase[b] = if seed {
                self.syn_phase[b]
            } else {
                wrap_phase(self.sum_phase[b] + self.syn_frequency[b] * syn_hop as f32)
            };
            let (m, p) = (self.syn_magnitude[b], self.sum_phase[b]);
            self.spectrum[b] = Complex::new(m * cosf(p), m * sinf(p));
        }
        for b in bins..self.size {
            self.spectrum[b] = self.spectrum[self.size - b].conj();
        }
        self.ifft
            .process_with_scratch(&mut self.spectrum, &mut self.scratch);
    }
}

fn clamp_ratio(ratio: f32) -> f32 {
    if ratio.is_finite() {
        ratio.clamp(MIN_RATIO, MAX_RATIO)
    } else {
        1.0
    }
}

/// Wrap into `[-PI, PI)`.
#[inline]
fn wrap_phase(phase: f32) -> f32 {
    let two_pi = 2.0 * PI;
    phase - two_pi * libm::floorf((phase + PI) / two_pi)
}

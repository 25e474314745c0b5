//! Four-pole transistor-ladder low-pass.
//!
//! Four trapezoidal one-pole stages share one global feedback path from
//! the last stage back to the input. The feedback loop is solved
//! instantaneously (Zavalishin, "The Art of VA Filter Design", ch. 5):
//!
//! ```text
//! y4 = G^4 * u + S          (S collects the stage states)
//! u  = x - k * y4
//! => u = (x - k * S) / (1 + k * G^4)
//! ```
//!
//! The solved input is then pushed through `tanh`, which stands in for the
//! differential pair at the bottom of the ladder. Feedback gain tops out at
//! `k = 3.96`, just short of the linear self-oscillation point `k = 4`.

use core::f32::consts::PI;
use libm::{tanf, tanhf};

use crate::math::flush_denormal;

const MAX_FEEDBACK: f32 = 4.0 * 0.99;

/// Output tap of the ladder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LadderSlope {
    /// First stage, 6 dB/oct
    Db6,
    /// Second stage, 12 dB/oct
    Db12,
    /// Third stage, 18 dB/oct
    Db18,
    /// Fourth stage, 24 dB/oct
    #[default]
    Db24,
}

/// ZDF four-stage ladder filter.
///
/// ```rust
/// use timbre_core::{LadderFilter, LadderSlope};
///
/// let mut ladder = LadderFilter::new(48000.0);
/// ladder.set_cutoff(1200.0);
/// ladder.set_resonance(0.6);
/// ladder.set_slope(LadderSlope::Db12);
/// let y = ladder.process(0.5);
/// assert!(y.is_finite());
/// ```
#[derive(Debug, Clone)]
pub struct LadderFilter {
    stages: [f32; 4],
    big_g: f32,
    k: f32,
    sample_rate: f32,
    cutoff: f32,
    resonance: f32,
    drive: f32,
    slope: LadderSlope,
}

impl Default for LadderFilter {
    fn default() -> Self {
        Self::new(48000.0)
    }
}

impl LadderFilter {
    /// 24 dB/oct at 1 kHz, no resonance, unity drive.
    pub fn new(sample_rate: f32) -> Self {
        let mut ladder = Self {
            stages: [0.0; 4],
            big_g: 0.0,
            k: 0.0,
            sample_rate,
            cutoff: 1000.0,
            resonance: 0.0,
            drive: 1.0,
            slope: LadderSlope::Db24,
        };
        ladder.update_coefficients();
        ladder
    }

    /// Cutoff in Hz, clamped to `20 ..= 0.49 * sample_rate`.
    pub fn set_cutoff(&mut self, freq: f32) {
        let freq = if freq.is_finite() { freq } else { 1000.0 };
        let clamped = freq.clamp(20.0, (self.sample_rate * 0.49).max(20.0));
        if clamped != self.cutoff {
            self.cutoff = clamped;
            self.update_coefficients();
        }
    }

    /// Current cutoff in Hz.
    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    /// Resonance in 0..=1.
    pub fn set_resonance(&mut self, resonance: f32) {
        let resonance = if resonance.is_finite() { resonance } else { 0.0 };
        let clamped = resonance.clamp(0.0, 1.0);
        if clamped != self.resonance {
            self.resonance = clamped;
            self.k = clamped * MAX_FEEDBACK;
        }
    }

    /// Current resonance in 0..=1.
    pub fn resonance(&self) -> f32 {
        self.resonance
    }

    /// Input gain into the saturating stage, 1..=10.
    pub fn set_drive(&mut self, drive: f32) {
        self.drive = if drive.is_finite() { drive.clamp(1.0, 10.0) } else { 1.0 };
    }

    /// Choose the output tap.
    pub fn set_slope(&mut self, slope: LadderSlope) {
        self.slope = slope;
    }

    /// Current output tap.
    pub fn slope(&self) -> LadderSlope {
        self.slope
    }

    /// Change the sample rate.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.cutoff = self.cutoff.clamp(20.0, (sample_rate * 0.49).max(20.0));
        self.update_coefficients();
    }

    /// Clear all four stage states.
    pub fn reset(&mut self) {
        self.stages = [0.0; 4];
    }

    /// Filter one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let g = self.big_g;
        let one_minus_g = 1.0 - g;
        let g2 = g * g;
        let g3 = g2 * g;
        let g4 = g3 * g;

        let s = g3 * one_minus_g * self.stages[0]
            + g2 * one_minus_g * self.stages[1]
            + g * one_minus_g * self.stages[2]
            + one_minus_g * self.stages[3];

        let x = input * self.drive;
        let u_linear = (x - self.k * s) / (1.0 + self.k * g4);
        let mut signal = tanhf(u_linear);

        let mut taps = [0.0_f32; 4];
        for (state, tap) in self.stages.iter_mut().zip(taps.iter_mut()) {
            let v = (signal - *state) * g;
            let y = v + *state;
            *state = flush_denormal(y + v);
            *tap = y;
            signal = y;
        }

        let out = match self.slope {
            LadderSlope::Db6 => taps[0],
            LadderSlope::Db12 => taps[1],
            LadderSlope::Db18 => taps[2],
            LadderSlope::Db24 => taps[3],
        };
        // Undo the drive gain so unsaturated levels stay close to unity.
        out / self.drive
    }

    fn update_coefficients(&mut self) {
        let g = tanf(PI * self.cutoff / self.sample_rate);
        self.big_g = g / (1.0 + g);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libm::{sinf, sqrtf};

    fn steady_rms(ladder: &mut LadderFilter, freq: f32, amp: f32) -> f32 {
        let sr = 48000.0;
        let mut sum = 0.0;
        for i in 0..9600 {
            let y = ladder.process(amp * sinf(2.0 * PI * freq * i as f32 / sr));
            if i >= 4800 {
                sum += y * y;
            }
        }
        sqrtf(sum / 4800.0)
    }

    #[test]
    fn dc_passes_at_zero_resonance() {
        let mut ladder = LadderFilter::new(48000.0);
        let mut y = 0.0;
        for _ in 0..4800 {
            y = ladder.process(0.1);
        }
        // tanh(0.1) ≈ 0.0997
        assert!((y - 0.0997).abs() < 2e-3, "dc out {}", y);
    }

    #[test]
    fn steeper_taps_attenuate_more() {
        let mut rms = [0.0_f32; 4];
        for (i, slope) in [
            LadderSlope::Db6,
            LadderSlope::Db12,
            LadderSlope::Db18,
            LadderSlope::Db24,
        ]
        .into_iter()
        .enumerate()
        {
            let mut ladder = LadderFilter::new(48000.0);
            ladder.set_cutoff(500.0);
            ladder.set_slope(slope);
            rms[i] = steady_rms(&mut ladder, 4000.0, 0.2);
        }
        assert!(rms[0] > rms[1] && rms[1] > rms[2] && rms[2] > rms[3], "{:?}", rms);
    }

    #[test]
    fn resonance_stays_bounded_across_cutoffs() {
        for cutoff in [20.0, 200.0, 2000.0, 12_000.0, 23_000.0] {
            let mut ladder = LadderFilter::new(48000.0);
            ladder.set_cutoff(cutoff);
            ladder.set_resonance(1.0);
            let mut peak = 0.0_f32;
            for i in 0..10_000 {
                let y = ladder.process(sinf(i as f32 * 0.03));
                peak = peak.max(y.abs());
            }
            assert!(peak.is_finite() && peak < 4.0, "cutoff {} peak {}", cutoff, peak);
        }
    }

    #[test]
    fn reset_clears_state() {
        let mut ladder = LadderFilter::new(48000.0);
        for _ in 0..100 {
            ladder.process(1.0);
        }
        ladder.reset();
        assert_eq!(ladder.process(0.0), 0.0);
    }
}

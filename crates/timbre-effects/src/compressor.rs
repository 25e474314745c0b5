//! Feed-forward dynamics compressor with a soft knee.
//!
//! # Signal Flow
//!
//! ```text
//! (L + R) / 2 → EnvelopeFollower → dB → gain computer → gain ─┐
//!                                                              ├→ × makeup → mix
//! L, R ───────────────────────────────────────────────────────┘
//! ```
//!
//! Detection is linked: both channels get the same gain, so the stereo
//! image does not move under compression.

use timbre_core::{
    Effect, EnvelopeFollower, ParamDescriptor, ParamUnit, ParameterInfo, SmoothedParam,
    db_to_linear, linear_to_db, wet_dry_mix_stereo,
};

/// Static gain curve in the dB domain.
#[derive(Debug, Clone, Copy)]
struct GainComputer {
    threshold_db: f32,
    ratio: f32,
    knee_db: f32,
}

impl GainComputer {
    /// Gain change in dB (always <= 0) for a detector level in dB.
    #[inline]
    fn gain_db(&self, level_db: f32) -> f32 {
        let overshoot = level_db - self.threshold_db;
        let slope = 1.0 - 1.0 / self.ratio;
        let half_knee = self.knee_db * 0.5;

        if overshoot <= -half_knee {
            0.0
        } else if overshoot >= half_knee {
            -overshoot * slope
        } else {
            let x = overshoot + half_knee;
            -slope * x * x / (2.0 * self.knee_db)
        }
    }
}

/// Dynamics compressor.
///
/// ## Parameter Indices (`ParameterInfo`)
///
/// | Index | Name | Range | Default |
/// |-------|------|-------|---------|
/// | 0 | Threshold | -60–0 dB | -18.0 |
/// | 1 | Ratio | 1–20 | 4.0 |
/// | 2 | Attack | 0.1–100 ms | 10.0 |
/// | 3 | Release | 10–1000 ms | 100.0 |
/// | 4 | Knee | 0–12 dB | 6.0 |
/// | 5 | Makeup | 0–24 dB | 0.0 |
/// | 6 | Mix | 0–1 | 1.0 |
///
/// # Example
///
/// ```rust
/// use timbre_core::Effect;
/// use timbre_effects::Compressor;
///
/// let mut comp = Compressor::new(48000.0);
/// comp.set_threshold_db(-24.0);
/// comp.set_ratio(8.0);
/// comp.set_makeup_db(6.0);
///
/// for _ in 0..4800 {
///     comp.process_stereo(0.8, 0.8);
/// }
/// assert!(comp.gain_reduction_db() < -10.0);
/// ```
#[derive(Debug, Clone)]
pub struct Compressor {
    follower: EnvelopeFollower,
    curve: GainComputer,
    attack_ms: f32,
    release_ms: f32,
    makeup: SmoothedParam,
    mix: SmoothedParam,
    last_reduction_db: f32,
}

impl Compressor {
    /// 4:1 at -18 dB with a 6 dB knee.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            follower: EnvelopeFollower::with_times(sample_rate, 10.0, 100.0),
            curve: GainComputer {
                threshold_db: -18.0,
                ratio: 4.0,
                knee_db: 6.0,
            },
            attack_ms: 10.0,
            release_ms: 100.0,
            makeup: SmoothedParam::standard(1.0, sample_rate),
            mix: SmoothedParam::standard(1.0, sample_rate),
            last_reduction_db: 0.0,
        }
    }

    /// Threshold in dB, -60..=0.
    pub fn set_threshold_db(&mut self, db: f32) {
        self.curve.threshold_db = finite_or(db, -18.0).clamp(-60.0, 0.0);
    }

    /// Current threshold.
    pub fn threshold_db(&self) -> f32 {
        self.curve.threshold_db
    }

    /// Ratio, 1..=20.
    pub fn set_ratio(&mut self, ratio: f32) {
        self.curve.ratio = finite_or(ratio, 4.0).clamp(1.0, 20.0);
    }

    /// Current ratio.
    pub fn ratio(&self) -> f32 {
        self.curve.ratio
    }

    /// Knee width in dB, 0..=12.
    pub fn set_knee_db(&mut self, db: f32) {
        self.curve.knee_db = finite_or(db, 6.0).clamp(0.0, 12.0);
    }

    /// Attack in ms, 0.1..=100.
    pub fn set_attack_ms(&mut self, ms: f32) {
        self.attack_ms = finite_or(ms, 10.0).clamp(0.1, 100.0);
        self.follower.set_attack_ms(self.attack_ms);
    }

    /// Release in ms, 10..=1000.
    pub fn set_release_ms(&mut self, ms: f32) {
        self.release_ms = finite_or(ms, 100.0).clamp(10.0, 1000.0);
        self.follower.set_release_ms(self.release_ms);
    }

    /// Makeup gain in dB, 0..=24.
    pub fn set_makeup_db(&mut self, db: f32) {
        self.makeup
            .set_target(db_to_linear(finite_or(db, 0.0).clamp(0.0, 24.0)));
    }

    /// Current makeup gain in dB.
    pub fn makeup_db(&self) -> f32 {
        linear_to_db(self.makeup.target())
    }

    /// Most recent gain change in dB. Zero when not compressing.
    pub fn gain_reduction_db(&self) -> f32 {
        self.last_reduction_db
    }
}

impl Effect for Compressor {
    #[inline]
    fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
        let level = self.follower.process((left + right) * 0.5);
        let reduction = self.curve.gain_db(linear_to_db(level));
        self.last_reduction_db = reduction;

        let gain = db_to_linear(reduction) * self.makeup.advance();
        let mix = self.mix.advance();
        wet_dry_mix_stereo(left, right, left * gain, right * gain, mix)
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.follower.set_sample_rate(sample_rate);
        self.makeup.set_sample_rate(sample_rate);
        self.mix.set_sample_rate(sample_rate);
    }

    fn reset(&mut self) {
        self.follower.reset();
        self.makeup.snap_to_target();
        self.mix.snap_to_target();
        self.last_reduction_db = 0.0;
    }

    fn mix(&self) -> f32 {
        self.mix.target()
    }

    fn set_mix(&mut self, mix: f32) {
        self.mix.set_target(finite_or(mix, 1.0).clamp(0.0, 1.0));
    }
}

impl ParameterInfo for Compressor {
    fn param_count(&self) -> usize {
        7
    }

    fn param_info(&self, index: usize) -> Option<ParamDescriptor> {
        match index {
            0 => Some(ParamDescriptor::gain_db("Threshold", "Thresh", -60.0, 0.0, -18.0)),
            1 => Some(ParamDescriptor::new(
                "Ratio",
                "Ratio",
                ParamUnit::Ratio,
                1.0,
                20.0,
                4.0,
                0.1,
            )),
            2 => Some(ParamDescriptor::time_ms("Attack", "Attack", 0.1, 100.0, 10.0)),
            3 => Some(ParamDescriptor::time_ms("Release", "Release", 10.0, 1000.0, 100.0)),
            4 => Some(ParamDescriptor::gain_db("Knee", "Knee", 0.0, 12.0, 6.0)),
            5 => Some(ParamDescriptor::gain_db("Makeup", "Makeup", 0.0, 24.0, 0.0)),
            6 => Some(ParamDescriptor::mix(1.0)),
            _ => None,
        }
    }

    fn get_param(&self, index: usize) -> f32 {
        match index {
            0 => self.curve.threshold_db,
            1 => self.curve.ratio,
            2 => self.attack_ms,
            3 => self.release_ms,
            4 => self.curve.knee_db,
            5 => self.makeup_db(),
            6 => self.mix(),
            _ => 0.0,
        }
    }

    fn set_param(&mut self, index: usize, value: f32) {
        let Some(desc) = self.param_info(index) else {
            return;
        };
        let value = desc.clamp(value);
        match index {
            0 => self.set_threshold_db(value),
            1 => self.set_ratio(value),
            2 => self.set_attack_ms(value),
            3 => self.set_release_ms(value),
            4 => self.set_knee_db(value),
            5 => self.set_makeup_db(value),
            6 => self.set_mix(value),
            _ => {}
        }
    }
}

#[inline]
fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() { value } else { fallback }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_is_continuous_through_the_knee() {
        let curve = GainComputer {
            threshold_db: -20.0,
            ratio: 4.0,
            knee_db: 6.0,
        };
        assert_eq!(curve.gain_db(-40.0), 0.0);
        assert!(curve.gain_db(-23.0).abs() < 1e-6);
        // Above the knee: 10 dB over at 4:1 loses 7.5 dB.
        assert!((curve.gain_db(-10.0) + 7.5).abs() < 1e-5);
        let below = curve.gain_db(-17.0 - 1e-3);
        let above = curve.gain_db(-17.0 + 1e-3);
        assert!((below - above).abs() < 1e-2);
    }

    #[test]
    fn hard_knee_has_no_division_by_zero() {
        let curve = GainComputer {
            threshold_db: -20.0,
            ratio: 2.0,
            knee_db: 0.0,
        };
        assert_eq!(curve.gain_db(-20.0), 0.0);
        assert!((curve.gain_db(-10.0) + 5.0).abs() < 1e-5);
    }

    #[test]
    fn loud_signal_is_reduced_quiet_signal_is_not() {
        let mut comp = Compressor::new(48000.0);
        comp.set_threshold_db(-20.0);
        comp.set_ratio(10.0);
        comp.reset();

        let mut loud = 0.0;
        for _ in 0..48000 {
            loud = comp.process_stereo(1.0, 1.0).0;
        }
        assert!(loud < 0.3, "loud out {}", loud);

        comp.reset();
        let mut quiet = 0.0;
        for _ in 0..48000 {
            quiet = comp.process_stereo(0.01, 0.01).0;
        }
        assert!((quiet - 0.01).abs() < 1e-6);
    }

    #[test]
    fn linked_gain_preserves_balance() {
        let mut comp = Compressor::new(48000.0);
        comp.set_threshold_db(-30.0);
        comp.reset();
        for _ in 0..10_000 {
            let (l, r) = comp.process_stereo(0.9, 0.3);
            assert!((l / r - 3.0).abs() < 1e-3);
        }
    }

    #[test]
    fn makeup_raises_output() {
        let mut comp = Compressor::new(48000.0);
        comp.set_threshold_db(0.0);
        comp.set_makeup_db(6.0);
        comp.reset();
        let (l, _) = comp.process_stereo(0.1, 0.1);
        assert!((l - 0.1 * db_to_linear(6.0)).abs() < 1e-5);
    }
}

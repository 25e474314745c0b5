//! Waveshaping distortion with five curves and a tone control.

use timbre_core::{
    Effect, OnePole, ParamDescriptor, ParamUnit, ParameterInfo, SmoothedParam, asymmetric_clip,
    db_to_linear, foldback, hard_clip, linear_to_db, quantize, soft_clip, wet_dry_mix_stereo,
};

/// Shaping curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaveShape {
    /// tanh, smooth and tube-like
    #[default]
    SoftClip,
    /// Flat clip at ±1
    HardClip,
    /// Harder negative half, adds even harmonics
    Asymmetric,
    /// Wavefolder, reflects overshoot back into range
    Foldback,
    /// Bit-depth reduction
    Bitcrush,
}

impl WaveShape {
    /// Every shape in parameter-index order.
    pub const ALL: [WaveShape; 5] = [
        WaveShape::SoftClip,
        WaveShape::HardClip,
        WaveShape::Asymmetric,
        WaveShape::Foldback,
        WaveShape::Bitcrush,
    ];

    /// Shape for a parameter index, clamped to the last shape.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }

    /// Parameter index of this shape.
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Distortion with drive, tone, output level and dry/wet mix.
///
/// ## Parameter Indices (`ParameterInfo`)
///
/// | Index | Name | Range | Default |
/// |-------|------|-------|---------|
/// | 0 | Drive | 0–40 dB | 12.0 |
/// | 1 | Tone | 500–20000 Hz | 8000.0 |
/// | 2 | Level | -24–12 dB | -6.0 |
/// | 3 | Shape | 0–4 | 0 (SoftClip) |
/// | 4 | Bits | 1–16 | 8 |
/// | 5 | Mix | 0–1 | 1.0 |
///
/// # Example
///
/// ```rust
/// use timbre_core::Effect;
/// use timbre_effects::{Distortion, WaveShape};
///
/// let mut dist = Distortion::new(48000.0);
/// dist.set_drive_db(24.0);
/// dist.set_shape(WaveShape::Foldback);
/// let (l, r) = dist.process_stereo(0.3, -0.3);
/// assert!(l.abs() <= 1.0 && r.abs() <= 1.0);
/// ```
#[derive(Debug, Clone)]
pub struct Distortion {
    drive: SmoothedParam,
    level: SmoothedParam,
    mix: SmoothedParam,
    tone_l: OnePole,
    tone_r: OnePole,
    tone_hz: f32,
    shape: WaveShape,
    bits: f32,
}

impl Distortion {
    /// 12 dB soft clip, 8 kHz tone, -6 dB level, fully wet.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            drive: SmoothedParam::with_config(db_to_linear(12.0), sample_rate, 5.0),
            level: SmoothedParam::with_config(db_to_linear(-6.0), sample_rate, 5.0),
            mix: SmoothedParam::standard(1.0, sample_rate),
            tone_l: OnePole::new(sample_rate, 8000.0),
            tone_r: OnePole::new(sample_rate, 8000.0),
            tone_hz: 8000.0,
            shape: WaveShape::SoftClip,
            bits: 8.0,
        }
    }

    /// Input gain in dB, 0..=40.
    pub fn set_drive_db(&mut self, db: f32) {
        let db = if db.is_finite() { db.clamp(0.0, 40.0) } else { 12.0 };
        self.drive.set_target(db_to_linear(db));
    }

    /// Current drive in dB.
    pub fn drive_db(&self) -> f32 {
        linear_to_db(self.drive.target())
    }

    /// Tone low-pass corner in Hz, 500..=20000.
    pub fn set_tone_hz(&mut self, hz: f32) {
        self.tone_hz = if hz.is_finite() {
            hz.clamp(500.0, 20_000.0)
        } else {
            8000.0
        };
        self.tone_l.set_frequency(self.tone_hz);
        self.tone_r.set_frequency(self.tone_hz);
    }

    /// Current tone corner.
    pub fn tone_hz(&self) -> f32 {
        self.tone_hz
    }

    /// Output level in dB, -24..=12.
    pub fn set_level_db(&mut self, db: f32) {
        let db = if db.is_finite() { db.clamp(-24.0, 12.0) } else { -6.0 };
        self.level.set_target(db_to_linear(db));
    }

    /// Current level in dB.
    pub fn level_db(&self) -> f32 {
        linear_to_db(self.level.target())
    }

    /// Select the shaping curve.
    pub fn set_shape(&mut self, shape: WaveShape) {
        self.shape = shape;
    }

    /// Current shape.
    pub fn shape(&self) -> WaveShape {
        self.shape
    }

    /// Bit depth for [`WaveShape::Bitcrush`], 1..=16.
    pub fn set_bits(&mut self, bits: f32) {
        self.bits = if bits.is_finite() {
            bits.clamp(1.0, 16.0)
        } else {
            8.0
        };
    }

    /// Current bit depth.
    pub fn bits(&self) -> f32 {
        self.bits
    }

    #[inline]
    fn shape_sample(&self, x: f32) -> f32 {
        match self.shape {
            WaveShape::SoftClip => soft_clip(x),
            WaveShape::HardClip => hard_clip(x, 1.0),
            WaveShape::Asymmetric => asymmetric_clip(x),
            WaveShape::Foldback => foldback(x, 1.0),
            WaveShape::Bitcrush => quantize(hard_clip(x, 1.0), self.bits),
        }
    }
}

impl Effect for Distortion {
    #[inline]
    fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
        let drive = self.drive.advance();
        let level = self.level.advance();
        let mix = self.mix.advance();

        let wet_l = self.tone_l.process(self.shape_sample(left * drive)) * level;
        let wet_r = self.tone_r.process(self.shape_sample(right * drive)) * level;

        wet_dry_mix_stereo(left, right, wet_l, wet_r, mix)
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.drive.set_sample_rate(sample_rate);
        self.level.set_sample_rate(sample_rate);
        self.mix.set_sample_rate(sample_rate);
        self.tone_l.set_sample_rate(sample_rate);
        self.tone_r.set_sample_rate(sample_rate);
    }

    fn reset(&mut self) {
        self.tone_l.reset();
        self.tone_r.reset();
        self.drive.snap_to_target();
        self.level.snap_to_target();
        self.mix.snap_to_target();
    }

    fn mix(&self) -> f32 {
        self.mix.target()
    }

    fn set_mix(&mut self, mix: f32) {
        let mix = if mix.is_finite() { mix } else { 1.0 };
        self.mix.set_target(mix.clamp(0.0, 1.0));
    }
}

impl ParameterInfo for Distortion {
    fn param_count(&self) -> usize {
        6
    }

    fn param_info(&self, index: usize) -> Option<ParamDescriptor> {
        match index {
            0 => Some(ParamDescriptor::gain_db("Drive", "Drive", 0.0, 40.0, 12.0)),
            1 => Some(ParamDescriptor::hertz("Tone", "Tone", 500.0, 20_000.0, 8000.0)),
            2 => Some(ParamDescriptor::gain_db("Level", "Level", -24.0, 12.0, -6.0)),
            3 => Some(ParamDescriptor::choice("Shape", "Shape", WaveShape::ALL.len(), 0)),
            4 => Some(ParamDescriptor::new(
                "Bits",
                "Bits",
                ParamUnit::None,
                1.0,
                16.0,
                8.0,
                1.0,
            )),
            5 => Some(ParamDescriptor::mix(1.0)),
            _ => None,
        }
    }

    fn get_param(&self, index: usize) -> f32 {
        match index {
            0 => self.drive_db(),
            1 => self.tone_hz,
            2 => self.level_db(),
            3 => self.shape.index() as f32,
            4 => self.bits,
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
            0 => self.set_drive_db(value),
            1 => self.set_tone_hz(value),
            2 => self.set_level_db(value),
            3 => self.set_shape(WaveShape::from_index(libm::roundf(value) as usize)),
            4 => self.set_bits(value),
            5 => self.set_mix(value),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_shape_is_bounded_at_full_drive() {
        for shape in WaveShape::ALL {
            let mut dist = Distortion::new(48000.0);
            dist.set_shape(shape);
            dist.set_drive_db(40.0);
            dist.set_level_db(0.0);
            dist.reset();
            for i in 0..4800 {
                let x = (i as f32 * 0.02).sin();
                let (l, r) = dist.process_stereo(x, -x);
                assert!(l.abs() <= 1.0 + 1e-5 && r.abs() <= 1.0 + 1e-5, "{:?}: {} {}", shape, l, r);
            }
        }
    }

    #[test]
    fn bitcrush_quantizes_to_levels() {
        let mut dist = Distortion::new(48000.0);
        dist.set_shape(WaveShape::Bitcrush);
        dist.set_bits(2.0);
        assert_eq!(dist.shape_sample(0.3), 0.5);
        assert_eq!(dist.shape_sample(-0.9), -1.0);
    }

    #[test]
    fn soft_clip_saturates_more_with_drive() {
        let mut gentle = Distortion::new(48000.0);
        gentle.set_drive_db(0.0);
        gentle.set_tone_hz(20_000.0);
        gentle.reset();
        let mut hot = gentle.clone();
        hot.set_drive_db(30.0);
        hot.reset();

        let (mut g, mut h) = (0.0, 0.0);
        for _ in 0..2000 {
            g = gentle.process_stereo(0.2, 0.2).0;
            h = hot.process_stereo(0.2, 0.2).0;
        }
        assert!(h > g * 2.0, "gentle {} hot {}", g, h);
    }

    #[test]
    fn shape_param_round_trips_through_index() {
        let mut dist = Distortion::new(48000.0);
        dist.set_param(3, 3.0);
        assert_eq!(dist.shape(), WaveShape::Foldback);
        dist.set_param(3, 99.0);
        assert_eq!(dist.shape(), WaveShape::Bitcrush);
        assert_eq!(dist.get_param(3), 4.0);
    }
}

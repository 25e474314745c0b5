//! Stereo chorus: one LFO-modulated delay per channel with feedback.

use timbre_core::{
    DelayLine, Effect, Interpolation, Lfo, ParamDescriptor, ParamUnit, ParameterInfo,
    SmoothedParam, flush_denormal, wet_dry_mix_stereo,
};

const BASE_DELAY_MS: f32 = 12.0;
const MAX_MOD_MS: f32 = 8.0;

/// Chorus with a quarter-cycle LFO offset between channels.
///
/// ## Parameter Indices (`ParameterInfo`)
///
/// | Index | Name | Range | Default |
/// |-------|------|-------|---------|
/// | 0 | Rate | 0.05–5.0 Hz | 0.8 |
/// | 1 | Depth | 0–1 | 0.5 |
/// | 2 | Feedback | 0–0.9 | 0.0 |
/// | 3 | Mix | 0–1 | 0.5 |
///
/// # Example
///
/// ```rust
/// use timbre_core::Effect;
/// use timbre_effects::Chorus;
///
/// let mut chorus = Chorus::new(44100.0);
/// chorus.set_rate(1.5);
/// chorus.set_depth(0.7);
/// chorus.set_mix(0.5);
///
/// let (l, r) = chorus.process_stereo(0.5, 0.5);
/// assert!(l.is_finite() && r.is_finite());
/// ```
#[derive(Debug, Clone)]
pub struct Chorus {
    line_l: DelayLine,
    line_r: DelayLine,
    lfo_l: Lfo,
    lfo_r: Lfo,
    rate: f32,
    depth: SmoothedParam,
    feedback: SmoothedParam,
    mix: SmoothedParam,
    last_l: f32,
    last_r: f32,
    sample_rate: f32,
}

impl Chorus {
    /// Chorus at 0.8 Hz, half depth, no feedback, 50% wet.
    pub fn new(sample_rate: f32) -> Self {
        let mut chorus = Self {
            line_l: Self::make_line(sample_rate),
            line_r: Self::make_line(sample_rate),
            lfo_l: Lfo::new(sample_rate),
            lfo_r: Lfo::new(sample_rate),
            rate: 0.8,
            depth: SmoothedParam::standard(0.5, sample_rate),
            feedback: SmoothedParam::standard(0.0, sample_rate),
            mix: SmoothedParam::standard(0.5, sample_rate),
            last_l: 0.0,
            last_r: 0.0,
            sample_rate,
        };
        chorus.lfo_r.set_phase_offset(0.25);
        chorus.set_rate(0.8);
        chorus
    }

    fn make_line(sample_rate: f32) -> DelayLine {
        let mut line = DelayLine::from_time(sample_rate, (BASE_DELAY_MS + MAX_MOD_MS) / 1000.0);
        line.set_interpolation(Interpolation::Hermite);
        line
    }

    /// LFO rate in Hz, clamped to 0.05..=5.
    pub fn set_rate(&mut self, hz: f32) {
        self.rate = if hz.is_finite() { hz.clamp(0.05, 5.0) } else { 0.8 };
        self.lfo_l.set_frequency(self.rate);
        self.lfo_r.set_frequency(self.rate);
    }

    /// Current LFO rate.
    pub fn rate(&self) -> f32 {
        self.rate
    }

    /// Modulation depth, 0..=1.
    pub fn set_depth(&mut self, depth: f32) {
        self.depth.set_target(unit_or(depth, 0.5));
    }

    /// Current depth.
    pub fn depth(&self) -> f32 {
        self.depth.target()
    }

    /// Feedback, clamped to 0..=0.9.
    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback.set_target(unit_or(feedback, 0.0).min(0.9));
    }

    /// Current feedback.
    pub fn feedback(&self) -> f32 {
        self.feedback.target()
    }
}

impl Effect for Chorus {
    #[inline]
    fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
        let depth = self.depth.advance();
        let feedback = self.feedback.advance();
        let mix = self.mix.advance();

        let base = BASE_DELAY_MS * self.sample_rate / 1000.0;
        let swing = MAX_MOD_MS * 0.5 * self.sample_rate / 1000.0 * depth;
        let delay_l = base + self.lfo_l.advance() * swing;
        let delay_r = base + self.lfo_r.advance() * swing;

        let wet_l = self.line_l.read(delay_l);
        let wet_r = self.line_r.read(delay_r);
        self.line_l.write(flush_denormal(left + self.last_l * feedback));
        self.line_r.write(flush_denormal(right + self.last_r * feedback));
        self.last_l = wet_l;
        self.last_r = wet_r;

        wet_dry_mix_stereo(left, right, wet_l, wet_r, mix)
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.line_l = Self::make_line(sample_rate);
        self.line_r = Self::make_line(sample_rate);
        self.lfo_l.set_sample_rate(sample_rate);
        self.lfo_r.set_sample_rate(sample_rate);
        self.depth.set_sample_rate(sample_rate);
        self.feedback.set_sample_rate(sample_rate);
        self.mix.set_sample_rate(sample_rate);
    }

    fn reset(&mut self) {
        self.line_l.clear();
        self.line_r.clear();
        self.lfo_l.retrigger();
        self.lfo_r.retrigger();
        self.last_l = 0.0;
        self.last_r = 0.0;
        self.depth.snap_to_target();
        self.feedback.snap_to_target();
        self.mix.snap_to_target();
    }

    fn mix(&self) -> f32 {
        self.mix.target()
    }

    fn set_mix(&mut self, mix: f32) {
        self.mix.set_target(unit_or(mix, 0.5));
    }
}

impl ParameterInfo for Chorus {
    fn param_count(&self) -> usize {
        4
    }

    fn param_info(&self, index: usize) -> Option<ParamDescriptor> {
        match index {
            0 => Some(ParamDescriptor::hertz("Rate", "Rate", 0.05, 5.0, 0.8)),
            1 => Some(ParamDescriptor::amount("Depth", "Depth", 0.5)),
            2 => Some(ParamDescriptor::new(
                "Feedback",
                "Fdbk",
                ParamUnit::Normalized,
                0.0,
                0.9,
                0.0,
                0.01,
            )),
            3 => Some(ParamDescriptor::mix(0.5)),
            _ => None,
        }
    }

    fn get_param(&self, index: usize) -> f32 {
        match index {
            0 => self.rate,
            1 => self.depth(),
            2 => self.feedback(),
            3 => self.mix(),
            _ => 0.0,
        }
    }

    fn set_param(&mut self, index: usize, value: f32) {
        let Some(desc) = self.param_info(index) else {
            return;
        };
        let value = desc.clamp(value);
        match index {
            0 => self.set_rate(value),
            1 => self.set_depth(value),
            2 => self.set_feedback(value),
            3 => self.set_mix(value),
            _ => {}
        }
    }
}

#[inline]
fn unit_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        fallback
    }
}

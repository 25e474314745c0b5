//! Stereo flanger.
//!
//! A short delay (0.5 to 5.5 ms) swept by an LFO and fed back into itself
//! produces a moving comb filter. Feedback is bipolar: positive values
//! reinforce the odd comb peaks, negative values move them to the even ones.
//! The right channel's LFO runs ahead of the left by a configurable phase
//! offset, which widens the sweep across the stereo field.

use libm::fabsf;
use timbre_core::{
    DelayLine, Effect, Interpolation, Lfo, ParamDescriptor, ParamUnit, ParameterInfo,
    SmoothedParam, flush_denormal, wet_dry_mix_stereo,
};

const CENTER_DELAY_MS: f32 = 3.0;
const MAX_SWING_MS: f32 = 2.5;

/// LFO-swept short delay with feedback.
///
/// ## Parameter Indices (`ParameterInfo`)
///
/// | Index | Name | Range | Default |
/// |-------|------|-------|---------|
/// | 0 | Rate | 0.05–5.0 Hz | 0.3 |
/// | 1 | Depth | 0–1 | 0.7 |
/// | 2 | Feedback | -0.95–0.95 | 0.5 |
/// | 3 | Stereo Phase | 0–0.5 cycles | 0.25 |
/// | 4 | Mix | 0–1 | 0.5 |
///
/// # Example
///
/// ```rust
/// use timbre_core::Effect;
/// use timbre_effects::Flanger;
///
/// let mut flanger = Flanger::new(48000.0);
/// flanger.set_feedback(-0.7);
/// flanger.set_stereo_phase(0.5);
///
/// let (l, r) = flanger.process_stereo(0.5, 0.5);
/// assert!(l.is_finite() && r.is_finite());
/// ```
#[derive(Debug, Clone)]
pub struct Flanger {
    line_l: DelayLine,
    line_r: DelayLine,
    lfo_l: Lfo,
    lfo_r: Lfo,
    rate: f32,
    stereo_phase: f32,
    depth: SmoothedParam,
    feedback: SmoothedParam,
    mix: SmoothedParam,
    last_l: f32,
    last_r: f32,
    sample_rate: f32,
}

impl Flanger {
    /// Slow, fairly deep flange with positive feedback.
    pub fn new(sample_rate: f32) -> Self {
        let mut flanger = Self {
            line_l: Self::make_line(sample_rate),
            line_r: Self::make_line(sample_rate),
            lfo_l: Lfo::new(sample_rate),
            lfo_r: Lfo::new(sample_rate),
            rate: 0.3,
            stereo_phase: 0.25,
            depth: SmoothedParam::standard(0.7, sample_rate),
            feedback: SmoothedParam::standard(0.5, sample_rate),
            mix: SmoothedParam::standard(0.5, sample_rate),
            last_l: 0.0,
            last_r: 0.0,
            sample_rate,
        };
        flanger.set_rate(0.3);
        flanger.set_stereo_phase(0.25);
        flanger
    }

    fn make_line(sample_rate: f32) -> DelayLine {
        let mut line =
            DelayLine::from_time(sample_rate, (CENTER_DELAY_MS + MAX_SWING_MS) / 1000.0);
        line.set_interpolation(Interpolation::Hermite);
        line
    }

    /// Sweep rate in Hz, clamped to 0.05..=5.
    pub fn set_rate(&mut self, hz: f32) {
        self.rate = if hz.is_finite() { hz.clamp(0.05, 5.0) } else { 0.3 };
        self.lfo_l.set_frequency(self.rate);
        self.lfo_r.set_frequency(self.rate);
    }

    /// Current sweep rate.
    pub fn rate(&self) -> f32 {
        self.rate
    }

    /// Sweep depth, 0..=1.
    pub fn set_depth(&mut self, depth: f32) {
        let depth = if depth.is_finite() { depth } else { 0.7 };
        self.depth.set_target(depth.clamp(0.0, 1.0));
    }

    /// Current depth.
    pub fn depth(&self) -> f32 {
        self.depth.target()
    }

    /// Bipolar feedback, clamped to ±0.95.
    pub fn set_feedback(&mut self, feedback: f32) {
        let feedback = if feedback.is_finite() { feedback } else { 0.0 };
        self.feedback.set_target(feedback.clamp(-0.95, 0.95));
    }

    /// Current feedback.
    pub fn feedback(&self) -> f32 {
        self.feedback.target()
    }

    /// Right-channel LFO lead in cycles, 0..=0.5.
    pub fn set_stereo_phase(&mut self, cycles: f32) {
        self.stereo_phase = if cycles.is_finite() {
            cycles.clamp(0.0, 0.5)
        } else {
            0.25
        };
        self.lfo_r.set_phase_offset(self.stereo_phase);
    }

    /// Current stereo phase offset.
    pub fn stereo_phase(&self) -> f32 {
        self.stereo_phase
    }
}

impl Effect for Flanger {
    #[inline]
    fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
        let depth = self.depth.advance();
        let feedback = self.feedback.advance();
        let mix = self.mix.advance();

        let per_ms = self.sample_rate / 1000.0;
        let center = CENTER_DELAY_MS * per_ms;
        let swing = MAX_SWING_MS * per_ms * depth;
        let wet_l = self.line_l.read(center + self.lfo_l.advance() * swing);
        let wet_r = self.line_r.read(center + self.lfo_r.advance() * swing);

        self.line_l.write(flush_denormal(left + self.last_l * feedback));
        self.line_r.write(flush_denormal(right + self.last_r * feedback));
        self.last_l = wet_l;
        self.last_r = wet_r;

        // Keep resonant settings near the level of the dry signal.
        let comp = 1.0 - 0.5 * fabsf(feedback);
        wet_dry_mix_stereo(left, right, wet_l * comp, wet_r * comp, mix)
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
        let mix = if mix.is_finite() { mix } else { 0.5 };
        self.mix.set_target(mix.clamp(0.0, 1.0));
    }
}

impl ParameterInfo for Flanger {
    fn param_count(&self) -> usize {
        5
    }

    fn param_info(&self, index: usize) -> Option<ParamDescriptor> {
        match index {
            0 => Some(ParamDescriptor::hertz("Rate", "Rate", 0.05, 5.0, 0.3)),
            1 => Some(ParamDescriptor::amount("Depth", "Depth", 0.7)),
            2 => Some(ParamDescriptor::new(
                "Feedback",
                "Fdbk",
                ParamUnit::Normalized,
                -0.95,
                0.95,
                0.5,
                0.01,
            )),
            3 => Some(ParamDescriptor::new(
                "Stereo Phase",
                "Phase",
                ParamUnit::None,
                0.0,
                0.5,
                0.25,
                0.01,
            )),
            4 => Some(ParamDescriptor::mix(0.5)),
            _ => None,
        }
    }

    fn get_param(&self, index: usize) -> f32 {
        match index {
            0 => self.rate,
            1 => self.depth(),
            2 => self.feedback(),
            3 => self.stereo_phase,
            4 => self.mix(),
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
            3 => self.set_stereo_phase(value),
            4 => self.set_mix(value),
            _ => {}
        }
    }
}

//! Stereo feedback delay with cross-feedback ("ping-pong") and tempo sync.

use timbre_core::{
    DEFAULT_BPM, DelayLine, Effect, NoteDivision, ParamDescriptor, ParamUnit, ParameterInfo,
    SmoothedParam, flush_denormal, sanitize_bpm, wet_dry_mix_stereo,
};

/// Longest delay per channel, in milliseconds.
pub const MAX_DELAY_MS: f32 = 2000.0;

/// Stereo delay with independent channel times.
///
/// Each channel's repeats are fed back partly into itself and partly into the
/// other channel. With `cross_feedback = 1` every repeat changes sides, which
/// is the classic ping-pong pattern.
///
/// When a [`NoteDivision`] is set with [`set_sync`](Delay::set_sync), both
/// channel times follow the host tempo and the free times are ignored; the
/// right channel keeps its ratio to the left so offset patterns survive.
///
/// ## Parameter Indices (`ParameterInfo`)
///
/// | Index | Name | Range | Default |
/// |-------|------|-------|---------|
/// | 0 | Left Time | 1–2000 ms | 375.0 |
/// | 1 | Right Time | 1–2000 ms | 375.0 |
/// | 2 | Feedback | 0–0.95 | 0.4 |
/// | 3 | Cross Feedback | 0–1 | 1.0 |
/// | 4 | Mix | 0–1 | 0.3 |
///
/// # Example
///
/// ```rust
/// use timbre_core::{Effect, NoteDivision};
/// use timbre_effects::Delay;
///
/// let mut delay = Delay::new(48000.0);
/// delay.set_sync(Some(NoteDivision::DottedEighth));
/// delay.set_tempo(Some(120.0));
/// assert!((delay.left_time_ms() - 375.0).abs() < 0.01);
///
/// let (l, r) = delay.process_stereo(0.5, 0.0);
/// assert!(l.is_finite() && r.is_finite());
/// ```
#[derive(Debug, Clone)]
pub struct Delay {
    line_l: DelayLine,
    line_r: DelayLine,
    time_l: SmoothedParam,
    time_r: SmoothedParam,
    feedback: SmoothedParam,
    mix: SmoothedParam,
    cross_feedback: f32,
    free_time_l_ms: f32,
    free_time_r_ms: f32,
    sync: Option<NoteDivision>,
    bpm: f32,
    sample_rate: f32,
}

impl Delay {
    /// Ping-pong delay at 375 ms per side.
    pub fn new(sample_rate: f32) -> Self {
        let default_samples = 375.0 * sample_rate / 1000.0;
        Self {
            line_l: DelayLine::from_time(sample_rate, MAX_DELAY_MS / 1000.0),
            line_r: DelayLine::from_time(sample_rate, MAX_DELAY_MS / 1000.0),
            time_l: SmoothedParam::with_config(default_samples, sample_rate, 50.0),
            time_r: SmoothedParam::with_config(default_samples, sample_rate, 50.0),
            feedback: SmoothedParam::standard(0.4, sample_rate),
            mix: SmoothedParam::standard(0.3, sample_rate),
            cross_feedback: 1.0,
            free_time_l_ms: 375.0,
            free_time_r_ms: 375.0,
            sync: None,
            bpm: DEFAULT_BPM,
            sample_rate,
        }
    }

    /// Left channel time in milliseconds, used while unsynced.
    pub fn set_left_time_ms(&mut self, ms: f32) {
        self.free_time_l_ms = clamp_time(ms, self.free_time_l_ms);
        self.update_times();
    }

    /// Right channel time in milliseconds, used while unsynced.
    pub fn set_right_time_ms(&mut self, ms: f32) {
        self.free_time_r_ms = clamp_time(ms, self.free_time_r_ms);
        self.update_times();
    }

    /// Set both channel times at once.
    pub fn set_time_ms(&mut self, ms: f32) {
        self.set_left_time_ms(ms);
        self.set_right_time_ms(ms);
    }

    /// Effective left time, after tempo sync.
    pub fn left_time_ms(&self) -> f32 {
        self.time_l.target() * 1000.0 / self.sample_rate
    }

    /// Effective right time, after tempo sync.
    pub fn right_time_ms(&self) -> f32 {
        self.time_r.target() * 1000.0 / self.sample_rate
    }

    /// Total feedback gain, clamped to 0..=0.95.
    pub fn set_feedback(&mut self, feedback: f32) {
        let feedback = if feedback.is_finite() { feedback } else { 0.0 };
        self.feedback.set_target(feedback.clamp(0.0, 0.95));
    }

    /// Current feedback gain.
    pub fn feedback(&self) -> f32 {
        self.feedback.target()
    }

    /// Share of each repeat sent to the opposite channel, 0..=1.
    pub fn set_cross_feedback(&mut self, amount: f32) {
        self.cross_feedback = if amount.is_finite() {
            amount.clamp(0.0, 1.0)
        } else {
            1.0
        };
    }

    /// Current cross-feedback share.
    pub fn cross_feedback(&self) -> f32 {
        self.cross_feedback
    }

    /// Lock both times to a note length, or `None` to use the free times.
    pub fn set_sync(&mut self, division: Option<NoteDivision>) {
        self.sync = division;
        self.update_times();
    }

    /// Current sync division.
    pub fn sync(&self) -> Option<NoteDivision> {
        self.sync
    }

    /// Host tempo. `None` or nonsense falls back to the default tempo.
    pub fn set_tempo(&mut self, bpm: Option<f32>) {
        let bpm = sanitize_bpm(bpm);
        if bpm != self.bpm {
            self.bpm = bpm;
            self.update_times();
        }
    }

    fn update_times(&mut self) {
        let (left_ms, right_ms) = match self.sync {
            Some(division) => {
                let synced = clamp_time(division.to_ms(self.bpm), MAX_DELAY_MS);
                let ratio = self.free_time_r_ms / self.free_time_l_ms;
                (synced, clamp_time(synced * ratio, synced))
            }
            None => (self.free_time_l_ms, self.free_time_r_ms),
        };
        self.time_l.set_target(left_ms * self.sample_rate / 1000.0);
        self.time_r.set_target(right_ms * self.sample_rate / 1000.0);
    }
}

impl Effect for Delay {
    #[inline]
    fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
        let time_l = self.time_l.advance();
        let time_r = self.time_r.advance();
        let feedback = self.feedback.advance();
        let mix = self.mix.advance();

        let delayed_l = self.line_l.read(time_l);
        let delayed_r = self.line_r.read(time_r);

        let straight = feedback * (1.0 - self.cross_feedback);
        let crossed = feedback * self.cross_feedback;
        self.line_l
            .write(flush_denormal(left + delayed_l * straight + delayed_r * crossed));
        self.line_r
            .write(flush_denormal(right + delayed_r * straight + delayed_l * crossed));

        wet_dry_mix_stereo(left, right, delayed_l, delayed_r, mix)
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.line_l = DelayLine::from_time(sample_rate, MAX_DELAY_MS / 1000.0);
        self.line_r = DelayLine::from_time(sample_rate, MAX_DELAY_MS / 1000.0);
        self.time_l.set_sample_rate(sample_rate);
        self.time_r.set_sample_rate(sample_rate);
        self.feedback.set_sample_rate(sample_rate);
        self.mix.set_sample_rate(sample_rate);
        self.update_times();
        self.time_l.snap_to_target();
        self.time_r.snap_to_target();
    }

    fn reset(&mut self) {
        self.line_l.clear();
        self.line_r.clear();
        self.time_l.snap_to_target();
        self.time_r.snap_to_target();
        self.feedback.snap_to_target();
        self.mix.snap_to_target();
    }

    fn mix(&self) -> f32 {
        self.mix.target()
    }

    fn set_mix(&mut self, mix: f32) {
        let mix = if mix.is_finite() { mix } else { 0.3 };
        self.mix.set_target(mix.clamp(0.0, 1.0));
    }
}

impl ParameterInfo for Delay {
    fn param_count(&self) -> usize {
        5
    }

    fn param_info(&self, index: usize) -> Option<ParamDescriptor> {
        match index {
            0 => Some(ParamDescriptor::time_ms(
                "Left Time",
                "Time L",
                1.0,
                MAX_DELAY_MS,
                375.0,
            )),
            1 => Some(ParamDescriptor::time_ms(
                "Right Time",
                "Time R",
                1.0,
                MAX_DELAY_MS,
                375.0,
            )),
            2 => Some(ParamDescriptor::new(
                "Feedback",
                "Fdbk",
                ParamUnit::Normalized,
                0.0,
                0.95,
                0.4,
                0.01,
            )),
            3 => Some(ParamDescriptor::amount("Cross Feedback", "Cross", 1.0)),
            4 => Some(ParamDescriptor::mix(0.3)),
            _ => None,
        }
    }

    fn get_param(&self, index: usize) -> f32 {
        match index {
            0 => self.free_time_l_ms,
            1 => self.free_time_r_ms,
            2 => self.feedback(),
            3 => self.cross_feedback,
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
            0 => self.set_left_time_ms(value),
            1 => self.set_right_time_ms(value),
            2 => self.set_feedback(value),
            3 => self.set_cross_feedback(value),
            4 => self.set_mix(value),
            _ => {}
        }
    }
}

#[inline]
fn clamp_time(ms: f32, fallback: f32) -> f32 {
    if ms.is_finite() {
        ms.clamp(1.0, MAX_DELAY_MS)
    } else {
        fallback
    }
}

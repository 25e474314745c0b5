//! ADSR envelope generator with curved segments.
//!
//! Every segment runs for a whole number of samples, so a segment of
//! `t` seconds always lands on its target after `round(t * sample_rate)`
//! calls to [`AdsrEnvelope::advance`]. Progress through a segment is a
//! linear fraction `x` in [0, 1] bent by a per-segment curve:
//!
//! | curve | shape | feel |
//! |-------|-------|------|
//! | `< 0` | `1 - (1 - x)^(1 + 4|c|)` | fast start, slow settle |
//! | `0`   | `x` | linear |
//! | `> 0` | `x^(1 + 4c)` | slow start, fast finish |

use libm::{powf, roundf};

/// Exponent scale applied to the curve amount.
const CURVE_SCALE: f32 = 4.0;

/// ADSR envelope states
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EnvelopeState {
    /// Output is zero
    #[default]
    Idle,
    /// Rising from the note-on level to 1
    Attack,
    /// Falling from 1 to the sustain level
    Decay,
    /// Holding the sustain level while the gate is held
    Sustain,
    /// Falling from the note-off level to 0
    Release,
}

/// Curved ADSR envelope.
///
/// Attack starts from whatever level the envelope holds, so a legato
/// retrigger never jumps. Release likewise starts from the current
/// level, from any stage.
///
/// # Example
///
/// ```rust
/// use timbre_synth::{AdsrEnvelope, EnvelopeState};
///
/// let mut env = AdsrEnvelope::new(48000.0);
/// env.set_times(0.01, 0.01, 0.01);
/// env.set_sustain(0.5);
///
/// env.note_on(1.0);
/// for _ in 0..960 {
///     env.advance();
/// }
/// assert_eq!(env.state(), EnvelopeState::Sustain);
///
/// env.note_off();
/// for _ in 0..480 {
///     env.advance();
/// }
/// assert!(!env.is_active());
/// ```
#[derive(Debug, Clone)]
pub struct AdsrEnvelope {
    state: EnvelopeState,
    level: f32,
    velocity: f32,
    sample_rate: f32,

    attack_s: f32,
    decay_s: f32,
    release_s: f32,
    sustain: f32,

    attack_curve: f32,
    decay_curve: f32,
    release_curve: f32,

    // Segment progress
    pos: u32,
    len: u32,
    start: f32,
}

impl Default for AdsrEnvelope {
    fn default() -> Self {
        Self::new(48000.0)
    }
}

impl AdsrEnvelope {
    /// 10 ms attack, 100 ms decay, 0.7 sustain, 200 ms release, linear.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            state: EnvelopeState::Idle,
            level: 0.0,
            velocity: 1.0,
            sample_rate,
            attack_s: 0.01,
            decay_s: 0.1,
            release_s: 0.2,
            sustain: 0.7,
            attack_curve: 0.0,
            decay_curve: 0.0,
            release_curve: 0.0,
            pos: 0,
            len: 1,
            start: 0.0,
        }
    }

    /// Attack, decay and release times in seconds.
    pub fn set_times(&mut self, attack_s: f32, decay_s: f32, release_s: f32) {
        self.set_attack(attack_s);
        self.set_decay(decay_s);
        self.set_release(release_s);
    }

    /// Attack time in seconds. Takes effect on the next note-on.
    pub fn set_attack(&mut self, seconds: f32) {
        self.attack_s = sanitize_time(seconds);
    }

    /// Decay time in seconds.
    pub fn set_decay(&mut self, seconds: f32) {
        self.decay_s = sanitize_time(seconds);
    }

    /// Release time in seconds.
    pub fn set_release(&mut self, seconds: f32) {
        self.release_s = sanitize_time(seconds);
    }

    /// Sustain level, 0..=1.
    pub fn set_sustain(&mut self, level: f32) {
        self.sustain = if level.is_finite() {
            level.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    /// Sustain level.
    pub fn sustain(&self) -> f32 {
        self.sustain
    }

    /// Attack, decay and release curves, each clamped to [-1, 1].
    pub fn set_curves(&mut self, attack: f32, decay: f32, release: f32) {
        self.attack_curve = sanitize_curve(attack);
        self.decay_curve = sanitize_curve(decay);
        self.release_curve = sanitize_curve(release);
    }

    /// Change the sample rate. A running segment keeps its position.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }

    /// Start the attack from the current level.
    ///
    /// `velocity` (0..=1) scales the value returned by
    /// [`advance`](Self::advance), not the internal level.
    pub fn note_on(&mut self, velocity: f32) {
        self.velocity = if velocity.is_finite() {
            velocity.clamp(0.0, 1.0)
        } else {
            1.0
        };
        self.begin(EnvelopeState::Attack, self.attack_s);
    }

    /// Start the release from the current level.
    pub fn note_off(&mut self) {
        if matches!(self.state, EnvelopeState::Idle | EnvelopeState::Release) {
            return;
        }
        self.begin(EnvelopeState::Release, self.release_s);
    }

    /// Drop to idle at zero.
    pub fn reset(&mut self) {
        self.state = EnvelopeState::Idle;
        self.level = 0.0;
        self.pos = 0;
    }

    /// Current stage.
    pub fn state(&self) -> EnvelopeState {
        self.state
    }

    /// Internal level in [0, 1], before velocity scaling.
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Anything but [`EnvelopeState::Idle`].
    pub fn is_active(&self) -> bool {
        self.state != EnvelopeState::Idle
    }

    /// Advance one sample and return the velocity-scaled level.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        match self.state {
            EnvelopeState::Idle => return 0.0,
            EnvelopeState::Sustain => self.level = self.sustain,
            EnvelopeState::Attack => {
                if self.step(1.0, self.attack_curve) {
                    self.begin(EnvelopeState::Decay, self.decay_s);
                }
            }
            EnvelopeState::Decay => {
                if self.step(self.sustain, self.decay_curve) {
                    self.state = EnvelopeState::Sustain;
                }
            }
            EnvelopeState::Release => {
                if self.step(0.0, self.release_curve) {
                    self.state = EnvelopeState::Idle;
                    self.level = 0.0;
                    return 0.0;
                }
            }
        }
        self.level * self.velocity
    }

    fn begin(&mut self, state: EnvelopeState, seconds: f32) {
        self.state = state;
        self.start = self.level;
        self.pos = 0;
        self.len = (roundf(seconds * self.sample_rate) as u32).max(1);
    }

    /// Move one sample toward `target`; true when the segment is done.
    #[inline]
    fn step(&mut self, target: f32, curve: f32) -> bool {
        self.pos += 1;
        if self.pos >= self.len {
            self.level = target;
            return true;
        }
        let x = self.pos as f32 / self.len as f32;
        self.level = self.start + (target - self.start) * shape(x, curve);
        false
    }
}

/// Bend a linear progress fraction by `curve`.
#[inline]
pub fn shape(x: f32, curve: f32) -> f32 {
    if curve == 0.0 {
        x
    } else if curve < 0.0 {
        1.0 - powf(1.0 - x, 1.0 - curve * CURVE_SCALE)
    } else {
        powf(x, 1.0 + curve * CURVE_SCALE)
    }
}

fn sanitize_time(seconds: f32) -> f32 {
    if seconds.is_finite() {
        seconds.clamp(0.0, 30.0)
    } else {
        0.0
    }
}

fn sanitize_curve(curve: f32) -> f32 {
    if curve.is_finite() {
        curve.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_10ms() -> AdsrEnvelope {
        let mut env = AdsrEnvelope::new(48000.0);
        env.set_times(0.01, 0.01, 0.01);
        env.set_sustain(0.6);
        env
    }

    #[test]
    fn reaches_each_target_on_time() {
        let mut env = env_10ms();
        env.note_on(1.0);
        for _ in 0..479 {
            env.advance();
        }
        assert_eq!(env.state(), EnvelopeState::Attack);
        env.advance();
        assert_eq!(env.state(), EnvelopeState::Decay);
        assert_eq!(env.level(), 1.0);

        for _ in 0..480 {
            env.advance();
        }
        assert_eq!(env.state(), EnvelopeState::Sustain);
        assert_eq!(env.level(), 0.6);

        env.note_off();
        for _ in 0..480 {
            env.advance();
        }
        assert_eq!(env.state(), EnvelopeState::Idle);
        assert_eq!(env.level(), 0.0);
    }

    #[test]
    fn velocity_scales_output_only() {
        let mut env = env_10ms();
        env.note_on(0.5);
        let mut last = 0.0;
        for _ in 0..480 {
            last = env.advance();
        }
        assert_eq!(env.level(), 1.0);
        assert!((last - 0.5).abs() < 1e-6);
    }

    #[test]
    fn release_from_mid_attack_has_no_jump() {
        let mut env = env_10ms();
        env.note_on(1.0);
        for _ in 0..240 {
            env.advance();
        }
        let held = env.level();
        env.note_off();
        let next = env.advance();
        assert!(next <= held && held - next < 0.01);
    }

    #[test]
    fn legato_retrigger_starts_from_current_level() {
        let mut env = env_10ms();
        env.note_on(1.0);
        for _ in 0..2000 {
            env.advance();
        }
        env.note_on(1.0);
        let first = env.advance();
        assert!(first >= 0.6 && first < 0.62);
    }

    #[test]
    fn curves_bend_without_changing_endpoints() {
        for c in [-1.0, -0.3, 0.0, 0.5, 1.0] {
            assert_eq!(shape(0.0, c), 0.0);
            assert!((shape(1.0, c) - 1.0).abs() < 1e-6);
        }
        assert!(shape(0.25, -0.5) > 0.25);
        assert!(shape(0.25, 0.5) < 0.25);
    }

    #[test]
    fn zero_time_segments_take_one_sample() {
        let mut env = AdsrEnvelope::new(48000.0);
        env.set_times(0.0, 0.0, 0.0);
        env.set_sustain(0.3);
        env.note_on(1.0);
        assert_eq!(env.advance(), 1.0);
        env.advance();
        assert_eq!(env.state(), EnvelopeState::Sustain);
        env.note_off();
        env.advance();
        assert!(!env.is_active());
    }
}

//! One playing sample.

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(feature = "std")]
extern crate std as alloc;

use alloc::sync::Arc;

use core::f32::consts::SQRT_2;
use libm::{exp2, floor};
use timbre_core::{StateVariableFilter, SvfType, db_to_linear, equal_power_pan, hermite};

use super::instrument::ZoneId;
use super::zone::{LoopMode, SampleBuffer, SampleZone};
use crate::envelope::{AdsrEnvelope, EnvelopeState};
use crate::params::EnvParams;

/// Playback state copied out of a zone at note-on.
///
/// Playback wraps from `end` back to `restart`. For a crossfade loop
/// with at least `fade` frames before `start`, `restart == start` and the
/// tail blends with that pre-roll. Otherwise the tail blends with the
/// first `fade` frames of the loop and `restart == start + fade`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LoopRegion {
    mode: LoopMode,
    end: usize,
    restart: usize,
    fade: usize,
}

impl LoopRegion {
    const IDLE: Self = Self {
        mode: LoopMode::Off,
        end: 0,
        restart: 0,
        fade: 0,
    };

    fn from_zone(zone: &SampleZone, one_shot: bool) -> Self {
        let mode = if one_shot { LoopMode::Off } else { zone.loop_mode };
        let (start, end) = (zone.loop_start, zone.loop_end);
        let len = end.saturating_sub(start);
        let (fade, restart) = match mode {
            LoopMode::Crossfade(frames) => {
                let wanted = (frames as usize).min(len);
                if start >= wanted {
                    (wanted, start)
                } else {
                    let fade = wanted.min(len / 2);
                    (fade, start + fade)
                }
            }
            _ => (0, start),
        };
        Self {
            mode,
            end,
            restart,
            fade,
        }
    }

    fn looping(&self) -> bool {
        self.mode != LoopMode::Off
    }

    /// Distance playback moves back at each wrap.
    fn span(&self) -> usize {
        self.end - self.restart
    }
}

/// A voice reading one zone's buffer at a pitch-derived rate.
///
/// Reads use 4-point Hermite interpolation. A forward loop wraps from
/// the loop end to the loop start; a crossfade loop additionally blends
/// the last `fade` frames before the end with the material the wrap
/// lands on, so the jump is inaudible. A loop starting at frame 0 fades
/// into its own head.
#[derive(Debug, Clone)]
pub struct SamplePlayerVoice {
    sample_rate: f32,
    buffer: Option<Arc<SampleBuffer>>,
    zone: Option<ZoneId>,
    generation: u32,
    region: LoopRegion,
    pos: f64,
    rate: f64,
    rate_scale: f64,
    gain: (f32, f32),
    env: AdsrEnvelope,
    filter: [StateVariableFilter; 2],
    filter_enabled: bool,
    note: u8,
    age: u64,
    one_shot: bool,
    active: bool,
}

impl SamplePlayerVoice {
    /// Idle voice.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            buffer: None,
            zone: None,
            generation: 0,
            region: LoopRegion::IDLE,
            pos: 0.0,
            rate: 1.0,
            rate_scale: 1.0,
            gain: (1.0, 1.0),
            env: AdsrEnvelope::new(sample_rate),
            filter: [
                StateVariableFilter::new(sample_rate),
                StateVariableFilter::new(sample_rate),
            ],
            filter_enabled: false,
            note: 0,
            age: 0,
            one_shot: false,
            active: false,
        }
    }

    /// Start `zone` for `note`.
    ///
    /// `generation` identifies the instrument the zone came from.
    pub fn start(
        &mut self,
        id: ZoneId,
        zone: &SampleZone,
        generation: u32,
        note: u8,
        velocity: f32,
    ) {
        let buffer = Arc::clone(zone.buffer());
        let semitones = f64::from(note) - f64::from(zone.root) + f64::from(zone.tune_cents) / 100.0;
        self.rate = exp2(semitones / 12.0) * f64::from(buffer.sample_rate())
            / f64::from(self.sample_rate);

        let (l, r) = equal_power_pan(zone.pan);
        let level = db_to_linear(zone.gain_db) * SQRT_2;
        self.gain = (l * level, r * level);

        self.region = LoopRegion::from_zone(zone, self.one_shot);
        self.buffer = Some(buffer);
        self.zone = Some(id);
        self.generation = generation;
        self.note = note;
        self.pos = 0.0;
        for f in &mut self.filter {
            f.reset();
        }
        self.env.note_on(velocity);
        self.active = true;
    }

    /// Begin the release. One-shot voices play to the end instead.
    pub fn note_off(&mut self) {
        if !self.one_shot {
            self.env.note_off();
        }
    }

    /// Silence immediately and drop the buffer handle.
    pub fn kill(&mut self) {
        self.active = false;
        self.buffer = None;
        self.zone = None;
        self.env.reset();
    }

    /// Envelope timing and curves.
    pub fn set_envelope(&mut self, params: &EnvParams) {
        self.env
            .set_times(params.attack, params.decay, params.release);
        self.env.set_sustain(params.sustain);
        self.env
            .set_curves(params.attack_curve, params.decay_curve, params.release_curve);
    }

    /// Per-voice filter. `None` bypasses it.
    pub fn set_filter(&mut self, filter: Option<(SvfType, f32, f32)>) {
        self.filter_enabled = filter.is_some();
        if let Some((kind, cutoff, resonance)) = filter {
            for f in &mut self.filter {
                f.set_filter_type(kind);
                f.set_cutoff(cutoff);
                f.set_resonance(resonance);
            }
        }
    }

    /// Ignore note-off and loops; play the sample through once.
    pub fn set_one_shot(&mut self, one_shot: bool) {
        self.one_shot = one_shot;
    }

    /// Extra playback-rate factor on top of the pitch ratio.
    pub fn set_rate_scale(&mut self, scale: f32) {
        self.rate_scale = if scale.is_finite() && scale > 0.0 {
            f64::from(scale)
        } else {
            1.0
        };
    }

    /// Output sample rate.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.env.set_sample_rate(sample_rate);
        for f in &mut self.filter {
            f.set_sample_rate(sample_rate);
        }
        self.kill();
    }

    /// Sounding or releasing.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// In the release stage.
    pub fn is_releasing(&self) -> bool {
        self.env.state() == EnvelopeState::Release
    }

    /// Zone being played.
    pub fn zone(&self) -> Option<ZoneId> {
        self.zone
    }

    /// Instrument generation of the current zone.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Current note.
    pub fn note(&self) -> u8 {
        self.note
    }

    /// Read position in source frames.
    pub fn position(&self) -> f64 {
        self.pos
    }

    /// Source frames advanced per output sample.
    pub fn rate(&self) -> f64 {
        self.rate * self.rate_scale
    }

    /// Allocation stamp.
    pub fn age(&self) -> u64 {
        self.age
    }

    /// Set the allocation stamp.
    pub fn set_age(&mut self, age: u64) {
        self.age = age;
    }

    /// Add this voice's output into `left` and `right`.
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            if !self.active {
                return;
            }
            let (vl, vr) = self.process_sample();
            *l += vl;
            *r += vr;
        }
    }

    /// Produce one stereo sample.
    #[inline]
    pub fn process_sample(&mut self) -> (f32, f32) {
        let Some(buffer) = self.buffer.as_deref() else {
            self.active = false;
            return (0.0, 0.0);
        };
        if !self.active {
            return (0.0, 0.0);
        }
        if !self.region.looping() && self.pos >= buffer.len() as f64 {
            self.kill();
            return (0.0, 0.0);
        }

        let (mut sl, mut sr) = self.read(buffer, self.pos);
        let region = self.region;
        if region.fade > 0 {
            let fade_start = (region.end - region.fade) as f64;
            if self.pos >= fade_start {
                let t = ((self.pos - fade_start) / region.fade as f64) as f32;
                let (pl, pr) = self.read(buffer, self.pos - region.span() as f64);
                sl += (pl - sl) * t;
                sr += (pr - sr) * t;
            }
        }

        self.pos += self.rate * self.rate_scale;
        if region.looping() {
            let span = region.span() as f64;
            while self.pos >= region.end as f64 {
                self.pos -= span;
            }
        }

        let env = self.env.advance();
        if !self.env.is_active() {
            self.kill();
            return (0.0, 0.0);
        }

        if self.filter_enabled {
            sl = self.filter[0].process(sl);
            sr = self.filter[1].process(sr);
        }
        (sl * env * self.gain.0, sr * env * self.gain.1)
    }

    /// Hermite read at fractional frame `pos`.
    #[inline]
    fn read(&self, buffer: &SampleBuffer, pos: f64) -> (f32, f32) {
        let base = floor(pos);
        let t = (pos - base) as f32;
        let i = base as isize;
        let (a0, b0) = self.tap(buffer, i - 1);
        let (a1, b1) = self.tap(buffer, i);
        let (a2, b2) = self.tap(buffer, i + 1);
        let (a3, b3) = self.tap(buffer, i + 2);
        (hermite(a0, a1, a2, a3, t), hermite(b0, b1, b2, b3, t))
    }

    /// Frame at integer `index`, wrapped into the loop when looping.
    #[inline]
    fn tap(&self, buffer: &SampleBuffer, index: isize) -> (f32, f32) {
        if index < 0 {
            return (0.0, 0.0);
        }
        let mut index = index as usize;
        if self.region.looping() && index >= self.region.end {
            index = self.region.restart + (index - self.region.restart) % self.region.span();
        }
        buffer.frame(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn ramp(len: usize, sample_rate: f32) -> Arc<SampleBuffer> {
        let data: Vec<f32> = (0..len).map(|i| i as f32 / len as f32).collect();
        Arc::new(SampleBuffer::mono(data, sample_rate).unwrap())
    }

    fn fast_env() -> EnvParams {
        EnvParams {
            attack: 0.0,
            decay: 0.0,
            sustain: 1.0,
            release: 0.0,
            ..EnvParams::default()
        }
    }

    fn voice() -> SamplePlayerVoice {
        let mut v = SamplePlayerVoice::new(48000.0);
        v.set_envelope(&fast_env());
        v
    }

    #[test]
    fn rate_follows_note_root_and_buffer_rate() {
        let mut v = voice();
        let zone = SampleZone::new(ramp(100, 24000.0), 60);
        v.start(ZoneId::from_index(0), &zone, 0, 72, 1.0);
        // One octave up, half the output rate: 2 * 0.5.
        assert!((v.rate() - 1.0).abs() < 1e-9);

        let zone = SampleZone::new(ramp(100, 48000.0), 60).with_mix(0.0, 0.0, -1200.0);
        v.start(ZoneId::from_index(0), &zone, 0, 60, 1.0);
        assert!((v.rate() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn unlooped_voice_ends_with_the_buffer() {
        let mut v = voice();
        let zone = SampleZone::new(ramp(64, 48000.0), 60);
        v.start(ZoneId::from_index(0), &zone, 0, 60, 1.0);
        let (mut l, mut r) = ([0.0f32; 128], [0.0f32; 128]);
        v.render(&mut l, &mut r);
        assert!(!v.is_active());
        assert!(l[80..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn forward_loop_stays_inside_the_region() {
        let mut v = voice();
        let zone = SampleZone::new(ramp(100, 48000.0), 60).with_loop(LoopMode::Forward, 20, 60);
        v.start(ZoneId::from_index(0), &zone, 0, 67, 1.0);
        for _ in 0..10_000 {
            v.process_sample();
            assert!(v.position() < 60.0);
        }
        assert!(v.is_active());
    }

    #[test]
    fn crossfade_loop_blends_across_the_seam() {
        let data: Vec<f32> = (0..200).map(|i| if i < 100 { 0.0 } else { 1.0 }).collect();
        let buffer = Arc::new(SampleBuffer::mono(data, 48000.0).unwrap());
        let zone = SampleZone::new(buffer, 60).with_loop(LoopMode::Crossfade(40), 60, 160);
        let mut v = voice();
        v.start(ZoneId::from_index(0), &zone, 0, 60, 1.0);

        let out: Vec<f32> = (0..400).map(|_| v.process_sample().0).collect();
        // Across the wrap from 159 to 60 the output never jumps by the
        // full step the raw samples make.
        for pair in out[150..170].windows(2) {
            assert!((pair[1] - pair[0]).abs() < 0.2, "{pair:?}");
        }
    }

    #[test]
    fn crossfade_loop_at_frame_zero_fades_into_its_head() {
        let data: Vec<f32> = (0..200).map(|i| if i < 100 { 0.0 } else { 1.0 }).collect();
        let buffer = Arc::new(SampleBuffer::mono(data, 48000.0).unwrap());
        let zone = SampleZone::new(buffer, 60).with_loop(LoopMode::Crossfade(40), 0, 160);
        let mut v = voice();
        v.start(ZoneId::from_index(0), &zone, 0, 60, 1.0);

        let out: Vec<f32> = (0..400).map(|_| v.process_sample().0).collect();
        // The tail 120..160 blends toward the head 0..40, then playback
        // resumes at 40. Wraps happen at output 160 and 280.
        for seam in [160, 280] {
            for pair in out[seam - 10..seam + 10].windows(2) {
                assert!((pair[1] - pair[0]).abs() < 0.2, "{seam}: {pair:?}");
            }
        }
        assert!(out[159].abs() < 0.1, "{}", out[159]);
        assert!(v.position() >= 40.0 && v.position() < 160.0);
    }

    #[test]
    fn one_shot_ignores_note_off() {
        let mut v = voice();
        v.set_one_shot(true);
        let zone = SampleZone::new(ramp(1000, 48000.0), 60).with_loop(LoopMode::Forward, 0, 500);
        v.start(ZoneId::from_index(0), &zone, 0, 60, 1.0);
        v.note_off();
        for _ in 0..500 {
            v.process_sample();
        }
        assert!(v.is_active());
        for _ in 0..600 {
            v.process_sample();
        }
        assert!(!v.is_active());
    }
}

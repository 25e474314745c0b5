//! Mip-mapped wavetable oscillator.
//!
//! A [`Wavetable`] stores one single-cycle frame as a stack of
//! band-limited copies. Level `k` is `len >> k` samples long and carries
//! only the harmonics that fit below its own Nyquist, so a level can be
//! read at up to one table sample per output sample without aliasing.
//! Levels are built once, at load time, by a direct DFT of the frame
//! followed by additive resynthesis.
//!
//! A [`WavetableSet`] holds several frames of equal length. The
//! oscillator cross-fades between neighbouring frames with
//! [`WavetableOscillator::set_table_position`] and reads each level
//! with a 4-point Catmull-Rom kernel.

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std as alloc;

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use core::f32::consts::TAU;
use libm::{floorf, sinf};
use timbre_core::hermite;

use crate::error::WavetableError;

/// Shortest frame accepted.
pub const MIN_FRAME_LEN: usize = 16;
/// Longest frame accepted.
pub const MAX_FRAME_LEN: usize = 4096;
/// Most frames a set can hold.
pub const MAX_TABLES: usize = 64;
/// Shortest mip level; it holds the fundamental only.
const MIN_LEVEL_LEN: usize = 4;

/// One band-limited single-cycle frame.
#[derive(Debug, Clone)]
pub struct Wavetable {
    levels: Vec<Vec<f32>>,
    /// Highest harmonic carried by each level.
    harmonics: Vec<usize>,
}

impl Wavetable {
    /// Analyse a single-cycle frame and build its mip levels.
    ///
    /// DC is removed. The result is normalised so the full-band level
    /// peaks at 1.
    pub fn from_frame(frame: &[f32]) -> Result<Self, WavetableError> {
        let len = check_len(frame.len())?;
        let sin_table = sine_table(len);
        let quarter = len / 4;

        let mut cos_coeffs = vec![0.0; len / 2];
        let mut sin_coeffs = vec![0.0; len / 2];
        let scale = 2.0 / len as f32;
        for h in 1..len / 2 {
            let (mut a, mut b) = (0.0, 0.0);
            for (n, &x) in frame.iter().enumerate() {
                let idx = (h * n) % len;
                a += x * sin_table[(idx + quarter) % len];
                b += x * sin_table[idx];
            }
            cos_coeffs[h] = a * scale;
            sin_coeffs[h] = b * scale;
        }
        Ok(Self::synthesize(len, &cos_coeffs, &sin_coeffs))
    }

    /// Build a frame from sine-phase harmonic amplitudes.
    ///
    /// `amplitudes[0]` is the fundamental. Harmonics past `len / 2 - 1`
    /// are dropped.
    pub fn from_harmonics(amplitudes: &[f32], len: usize) -> Result<Self, WavetableError> {
        let len = check_len(len)?;
        if amplitudes.is_empty() {
            return Err(WavetableError::Empty);
        }
        let cos_coeffs = vec![0.0; len / 2];
        let mut sin_coeffs = vec![0.0; len / 2];
        for (h, &amp) in amplitudes.iter().enumerate().take(len / 2 - 1) {
            sin_coeffs[h + 1] = amp;
        }
        Ok(Self::synthesize(len, &cos_coeffs, &sin_coeffs))
    }

    /// Sine, triangle, saw and square, in that order.
    pub fn basic_set(len: usize) -> Result<Vec<Self>, WavetableError> {
        let top = len / 2;
        let sine = [1.0];
        let triangle: Vec<f32> = (1..top)
            .map(|h| {
                if h % 2 == 0 {
                    0.0
                } else {
                    let sign = if (h / 2) % 2 == 0 { 1.0 } else { -1.0 };
                    sign * 8.0 / (core::f32::consts::PI * core::f32::consts::PI * (h * h) as f32)
                }
            })
            .collect();
        let saw: Vec<f32> = (1..top)
            .map(|h| 2.0 / (core::f32::consts::PI * h as f32))
            .collect();
        let square: Vec<f32> = (1..top)
            .map(|h| {
                if h % 2 == 0 {
                    0.0
                } else {
                    4.0 / (core::f32::consts::PI * h as f32)
                }
            })
            .collect();
        Ok(vec![
            Self::from_harmonics(&sine, len)?,
            Self::from_harmonics(&triangle, len)?,
            Self::from_harmonics(&saw, len)?,
            Self::from_harmonics(&square, len)?,
        ])
    }

    fn synthesize(len: usize, cos_coeffs: &[f32], sin_coeffs: &[f32]) -> Self {
        let mut levels = Vec::new();
        let mut harmonics = Vec::new();
        let mut level_len = len;
        loop {
            let top = (level_len / 2).saturating_sub(1).max(1);
            let sin_table = sine_table(level_len);
            let quarter = level_len / 4;
            let mut samples = vec![0.0; level_len];
            for (n, sample) in samples.iter_mut().enumerate() {
                let mut acc = 0.0;
                for h in 1..=top.min(cos_coeffs.len() - 1) {
                    let idx = (h * n) % level_len;
                    acc += cos_coeffs[h] * sin_table[(idx + quarter) % level_len]
                        + sin_coeffs[h] * sin_table[idx];
                }
                *sample = acc;
            }
            levels.push(samples);
            harmonics.push(top);
            if level_len <= MIN_LEVEL_LEN {
                break;
            }
            level_len /= 2;
        }

        let peak = levels[0].iter().fold(0.0f32, |m, x| m.max(x.abs()));
        if peak > 1e-9 {
            for level in &mut levels {
                for x in level.iter_mut() {
                    *x /= peak;
                }
            }
        }
        Self { levels, harmonics }
    }

    /// Frame length of the full-band level.
    pub fn len(&self) -> usize {
        self.levels[0].len()
    }

    /// Always false: construction rejects empty frames.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Number of mip levels.
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Highest harmonic kept in `level`.
    pub fn level_harmonics(&self, level: usize) -> usize {
        self.harmonics[level.min(self.harmonics.len() - 1)]
    }

    /// Index of the first level whose top harmonic stays below Nyquist
    /// at `frequency`.
    #[inline]
    pub fn level_for(&self, frequency: f32, sample_rate: f32) -> usize {
        let nyquist = sample_rate * 0.5;
        self.harmonics
            .iter()
            .position(|&h| h as f32 * frequency < nyquist)
            .unwrap_or(self.harmonics.len() - 1)
    }

    /// Read `level` at `phase` (cycles in [0, 1)).
    #[inline]
    pub fn read(&self, level: usize, phase: f32) -> f32 {
        let table = &self.levels[level.min(self.levels.len() - 1)];
        let n = table.len();
        let pos = phase * n as f32;
        let i = (floorf(pos) as usize) % n;
        let t = pos - floorf(pos);
        hermite(
            table[(i + n - 1) % n],
            table[i],
            table[(i + 1) % n],
            table[(i + 2) % n],
            t,
        )
    }
}

fn check_len(len: usize) -> Result<usize, WavetableError> {
    if len == 0 {
        return Err(WavetableError::Empty);
    }
    if !len.is_power_of_two() || !(MIN_FRAME_LEN..=MAX_FRAME_LEN).contains(&len) {
        return Err(WavetableError::BadLength(len));
    }
    Ok(len)
}

fn sine_table(len: usize) -> Vec<f32> {
    (0..len).map(|n| sinf(TAU * n as f32 / len as f32)).collect()
}

/// Validated group of equal-length frames, shared between voices.
#[derive(Debug, Clone)]
pub struct WavetableSet {
    tables: Vec<Wavetable>,
}

impl WavetableSet {
    /// Check that `tables` is non-empty, within [`MAX_TABLES`] and of
    /// equal length.
    pub fn new(tables: Vec<Wavetable>) -> Result<Self, WavetableError> {
        let Some(first) = tables.first() else {
            return Err(WavetableError::Empty);
        };
        if tables.len() > MAX_TABLES {
            return Err(WavetableError::TooManyTables(tables.len()));
        }
        let expected = first.len();
        if let Some(bad) = tables.iter().find(|t| t.len() != expected) {
            return Err(WavetableError::LengthMismatch {
                expected,
                found: bad.len(),
            });
        }
        Ok(Self { tables })
    }

    /// [`Wavetable::basic_set`] as a set.
    pub fn basic(len: usize) -> Result<Self, WavetableError> {
        Self::new(Wavetable::basic_set(len)?)
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Always false: construction rejects empty sets.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Frame at `index`.
    pub fn get(&self, index: usize) -> Option<&Wavetable> {
        self.tables.get(index)
    }
}

/// Oscillator reading a [`WavetableSet`].
///
/// Silent until a set is loaded.
///
/// ```rust
/// use timbre_synth::{WavetableOscillator, WavetableSet};
///
/// let mut osc = WavetableOscillator::new(48000.0);
/// osc.load_tables(timbre_synth::Wavetable::basic_set(256).unwrap()).unwrap();
/// osc.set_frequency(110.0);
/// osc.set_table_position(0.5);
/// let y = osc.advance();
/// assert!(y.abs() <= 1.5);
/// # let _ = WavetableSet::basic(64);
/// ```
#[derive(Debug, Clone)]
pub struct WavetableOscillator {
    tables: Option<Arc<WavetableSet>>,
    phase: f32,
    phase_inc: f32,
    frequency: f32,
    position: f32,
    sample_rate: f32,
    level: usize,
}

impl WavetableOscillator {
    /// Empty oscillator at 440 Hz, position 0.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            tables: None,
            phase: 0.0,
            phase_inc: 440.0 / sample_rate,
            frequency: 440.0,
            position: 0.0,
            sample_rate,
            level: 0,
        }
    }

    /// Validate and load frames. Allocates; call at configuration time.
    pub fn load_tables(&mut self, tables: Vec<Wavetable>) -> Result<(), WavetableError> {
        let set = WavetableSet::new(tables)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(frames = set.len(), "wavetable set loaded");
        self.set_table_set(Arc::new(set));
        Ok(())
    }

    /// Share an already validated set.
    pub fn set_table_set(&mut self, set: Arc<WavetableSet>) {
        self.tables = Some(set);
        self.update_level();
    }

    /// Loaded set, if any.
    pub fn table_set(&self) -> Option<&Arc<WavetableSet>> {
        self.tables.as_ref()
    }

    /// Frequency in Hz, clamped to `0 ..= 0.49 * sample_rate`.
    #[inline]
    pub fn set_frequency(&mut self, hz: f32) {
        let hz = if hz.is_finite() { hz } else { 0.0 };
        let hz = hz.clamp(0.0, self.sample_rate * 0.49);
        if hz != self.frequency {
            self.frequency = hz;
            self.phase_inc = hz / self.sample_rate;
            self.update_level();
        }
    }

    /// Current frequency.
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Cross-fade position across the set, 0..=1.
    #[inline]
    pub fn set_table_position(&mut self, position: f32) {
        let position = if position.is_finite() { position } else { 0.0 };
        self.position = position.clamp(0.0, 1.0);
    }

    /// Current position.
    pub fn table_position(&self) -> f32 {
        self.position
    }

    /// Mip level in use.
    pub fn mip_level(&self) -> usize {
        self.level
    }

    /// Change the sample rate, keeping the frequency.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        let hz = self.frequency;
        self.frequency = -1.0;
        self.set_frequency(hz);
    }

    /// Jump to `phase` in cycles.
    pub fn reset_phase(&mut self, phase: f32) {
        let phase = if phase.is_finite() { phase } else { 0.0 };
        self.phase = phase - floorf(phase);
    }

    /// Produce one sample and advance.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        let Some(set) = self.tables.as_ref() else {
            return 0.0;
        };
        let scaled = self.position * (set.len() - 1) as f32;
        let index = floorf(scaled) as usize;
        let frac = scaled - index as f32;

        let a = set.tables[index].read(self.level, self.phase);
        let out = if frac > 0.0 && index + 1 < set.len() {
            let b = set.tables[index + 1].read(self.level, self.phase);
            a + (b - a) * frac
        } else {
            a
        };

        self.phase += self.phase_inc;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        out
    }

    fn update_level(&mut self) {
        if let Some(set) = &self.tables {
            self.level = set.tables[0].level_for(self.frequency, self.sample_rate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cos_at(n: usize, h: usize, len: usize) -> f32 {
        libm::cosf(TAU * (h * n) as f32 / len as f32)
    }

    #[test]
    fn rejects_bad_lengths() {
        assert_eq!(Wavetable::from_frame(&[]).unwrap_err(), WavetableError::Empty);
        assert_eq!(
            Wavetable::from_frame(&[0.0; 100]).unwrap_err(),
            WavetableError::BadLength(100)
        );
        let a = Wavetable::from_harmonics(&[1.0], 64).unwrap();
        let b = Wavetable::from_harmonics(&[1.0], 128).unwrap();
        assert_eq!(
            WavetableSet::new(vec![a, b]).unwrap_err(),
            WavetableError::LengthMismatch {
                expected: 64,
                found: 128
            }
        );
    }

    #[test]
    fn analysis_recovers_harmonics() {
        let len = 256;
        let frame: Vec<f32> = (0..len)
            .map(|n| 0.5 * cos_at(n, 3, len) + sinf(TAU * n as f32 / len as f32) + 0.25)
            .collect();
        let table = Wavetable::from_frame(&frame).unwrap();
        // DC removed, shape otherwise preserved up to normalisation.
        let mean: f32 = table.levels[0].iter().sum::<f32>() / len as f32;
        assert!(mean.abs() < 1e-4);

        // Level 6 (4 samples) keeps only the fundamental.
        let last = table.level_count() - 1;
        assert_eq!(table.level_harmonics(last), 1);
        assert_eq!(table.levels[last].len(), 4);
    }

    #[test]
    fn level_selection_keeps_harmonics_below_nyquist() {
        let table = Wavetable::basic_set(2048).unwrap().remove(2);
        let sr = 48000.0;
        for hz in [20.0, 110.0, 880.0, 5000.0, 15000.0] {
            let level = table.level_for(hz, sr);
            let top = table.level_harmonics(level);
            assert!(top as f32 * hz < sr * 0.5 || top == 1, "{} Hz level {}", hz, level);
            if level > 0 {
                // The previous level would have aliased.
                assert!(table.level_harmonics(level - 1) as f32 * hz >= sr * 0.5);
            }
        }
    }

    #[test]
    fn position_crossfades_between_frames() {
        let mut osc = WavetableOscillator::new(48000.0);
        osc.load_tables(Wavetable::basic_set(256).unwrap()).unwrap();
        osc.set_frequency(100.0);

        // Position 0 is the sine frame.
        osc.reset_phase(0.25);
        assert!((osc.advance() - 1.0).abs() < 1e-3);

        // One third of the way is the triangle frame exactly.
        osc.set_table_position(1.0 / 3.0);
        osc.reset_phase(0.25);
        let y = osc.advance();
        assert!((y - 1.0).abs() < 0.05, "{}", y);
    }

    #[test]
    fn empty_oscillator_is_silent() {
        let mut osc = WavetableOscillator::new(48000.0);
        assert_eq!(osc.advance(), 0.0);
    }

    #[test]
    fn output_stays_bounded_across_the_range() {
        let mut osc = WavetableOscillator::new(48000.0);
        osc.load_tables(Wavetable::basic_set(512).unwrap()).unwrap();
        osc.set_table_position(1.0);
        for hz in [30.0, 400.0, 3000.0, 12000.0] {
            osc.set_frequency(hz);
            for _ in 0..4800 {
                assert!(osc.advance().abs() < 1.5);
            }
        }
    }
}

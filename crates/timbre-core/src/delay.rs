//! Circular delay line with fractional reads.
//!
//! Storage is allocated once, by [`DelayLine::new`] or
//! [`DelayLine::resize`]; reads and writes never allocate. The read/write
//! convention is *read first, then write*: `read(d)` followed by
//! `write(x)` delays `x` by exactly `d` samples, which is what feedback
//! paths need.
//!
//! | User | Typical range | Interpolation |
//! |------|---------------|---------------|
//! | Flanger | 0.5-10 ms | Hermite |
//! | Chorus | 5-30 ms | Hermite |
//! | Echo | 10 ms-2 s | Linear |
//! | Reverb pre-delay | 0-200 ms | Linear |

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std as alloc;

use alloc::vec;
use alloc::vec::Vec;

use crate::math::hermite;

// Extra slots so Hermite reads at the maximum delay stay in range.
const GUARD: usize = 3;

/// Fractional read kernel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interpolation {
    /// Two-point linear
    #[default]
    Linear,
    /// Four-point Hermite
    Hermite,
}

/// Heap-backed circular delay line.
///
/// ```rust
/// use timbre_core::DelayLine;
///
/// let mut line = DelayLine::new(16);
/// let mut out = Vec::new();
/// for x in [1.0, 0.0, 0.0, 0.0] {
///     out.push(line.read(2.0));
///     line.write(x);
/// }
/// assert_eq!(out, vec![0.0, 0.0, 1.0, 0.0]);
/// ```
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
    max_delay: usize,
    interpolation: Interpolation,
}

impl DelayLine {
    /// Delay line able to hold `max_delay_samples` (at least one).
    pub fn new(max_delay_samples: usize) -> Self {
        let max_delay = max_delay_samples.max(1);
        Self {
            buffer: vec![0.0; max_delay + GUARD],
            write_pos: 0,
            max_delay,
            interpolation: Interpolation::Linear,
        }
    }

    /// Delay line long enough for `max_seconds` at `sample_rate`.
    pub fn from_time(sample_rate: f32, max_seconds: f32) -> Self {
        Self::new((sample_rate * max_seconds.max(0.0)) as usize + 1)
    }

    /// Reallocate for a new maximum delay and clear the contents.
    ///
    /// Configuration-time only.
    pub fn resize(&mut self, max_delay_samples: usize) {
        self.max_delay = max_delay_samples.max(1);
        self.buffer.clear();
        self.buffer.resize(self.max_delay + GUARD, 0.0);
        self.write_pos = 0;
    }

    /// Select the fractional read kernel.
    pub fn set_interpolation(&mut self, interpolation: Interpolation) {
        self.interpolation = interpolation;
    }

    /// Largest delay [`read`](Self::read) honours, in samples.
    pub fn max_delay(&self) -> usize {
        self.max_delay
    }

    /// Read the sample `delay` samples behind the next write.
    ///
    /// `delay` is clamped to `1 ..= max_delay`.
    #[inline]
    pub fn read(&self, delay: f32) -> f32 {
        let delay = if delay.is_finite() { delay } else { 1.0 };
        let delay = delay.clamp(1.0, self.max_delay as f32);
        let whole = delay as usize;
        let frac = delay - whole as f32;

        match self.interpolation {
            Interpolation::Linear => {
                let a = self.at(whole);
                let b = self.at(whole + 1);
                a + (b - a) * frac
            }
            Interpolation::Hermite => {
                let y0 = self.at(whole - 1);
                let y1 = self.at(whole);
                let y2 = self.at(whole + 1);
                let y3 = self.at(whole + 2);
                hermite(y0, y1, y2, y3, frac)
            }
        }
    }

    /// Push one sample.
    #[inline]
    pub fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos += 1;
        if self.write_pos == self.buffer.len() {
            self.write_pos = 0;
        }
    }

    /// `read(delay)` then `write(sample)`.
    #[inline]
    pub fn read_write(&mut self, sample: f32, delay: f32) -> f32 {
        let out = self.read(delay);
        self.write(sample);
        out
    }

    /// Zero the contents.
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }

    // Sample written `age` writes ago (age >= 1, age == 0 reads the slot
    // about to be written, which only happens for Hermite at delay 1).
    #[inline]
    fn at(&self, age: usize) -> f32 {
        let len = self.buffer.len();
        let idx = (self.write_pos + len - (age % len)) % len;
        self.buffer[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_delay_is_exact() {
        let mut line = DelayLine::new(100);
        let mut outputs = Vec::new();
        for i in 0..20 {
            let x = if i == 0 { 1.0 } else { 0.0 };
            outputs.push(line.read_write(x, 7.0));
        }
        assert_eq!(outputs[7], 1.0);
        assert_eq!(outputs.iter().filter(|&&v| v != 0.0).count(), 1);
    }

    #[test]
    fn fractional_linear_read() {
        let mut line = DelayLine::new(8);
        line.write(0.0);
        line.write(1.0);
        // delay 1 -> 1.0, delay 2 -> 0.0
        assert!((line.read(1.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn hermite_matches_linear_on_a_ramp() {
        let mut line = DelayLine::new(32);
        line.set_interpolation(Interpolation::Hermite);
        for i in 0..32 {
            line.write(i as f32);
        }
        // Last write was 31; delay 3.25 sits between 29 and 28.
        assert!((line.read(3.25) - 28.75).abs() < 1e-4);
    }

    #[test]
    fn delay_is_clamped() {
        let mut line = DelayLine::new(4);
        for i in 0..10 {
            line.write(i as f32);
        }
        assert_eq!(line.read(100.0), line.read(4.0));
        assert_eq!(line.read(-5.0), line.read(1.0));
        assert_eq!(line.read(f32::NAN), 9.0);
    }

    #[test]
    fn resize_clears() {
        let mut line = DelayLine::new(4);
        line.write(1.0);
        line.resize(64);
        assert_eq!(line.max_delay(), 64);
        assert_eq!(line.read(1.0), 0.0);
    }
}

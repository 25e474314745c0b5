//! Decoded audio and the metadata that maps it onto the keyboard.

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(feature = "std")]
extern crate std as alloc;

use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::error::SampleError;

/// Decoded mono or stereo audio at its own sample rate.
///
/// Decoding and file access belong to the host; this type only holds
/// the samples.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    left: Vec<f32>,
    right: Option<Vec<f32>>,
    sample_rate: f32,
}

impl SampleBuffer {
    /// Single-channel buffer.
    pub fn mono(samples: Vec<f32>, sample_rate: f32) -> Result<Self, SampleError> {
        check_rate(sample_rate)?;
        if samples.is_empty() {
            return Err(SampleError::EmptyBuffer);
        }
        Ok(Self {
            left: samples,
            right: None,
            sample_rate,
        })
    }

    /// Two-channel buffer. Both channels must have the same length.
    pub fn stereo(left: Vec<f32>, right: Vec<f32>, sample_rate: f32) -> Result<Self, SampleError> {
        check_rate(sample_rate)?;
        if left.is_empty() {
            return Err(SampleError::EmptyBuffer);
        }
        if left.len() != right.len() {
            return Err(SampleError::ChannelMismatch {
                left: left.len(),
                right: right.len(),
            });
        }
        Ok(Self {
            left,
            right: Some(right),
            sample_rate,
        })
    }

    /// Length in frames.
    pub fn len(&self) -> usize {
        self.left.len()
    }

    /// Always false: empty buffers are rejected.
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Rate the samples were recorded at.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Has a right channel.
    pub fn is_stereo(&self) -> bool {
        self.right.is_some()
    }

    /// Frame `index` as `(left, right)`; mono buffers repeat the left
    /// channel. Out-of-range frames are silent.
    #[inline]
    pub fn frame(&self, index: usize) -> (f32, f32) {
        let Some(&l) = self.left.get(index) else {
            return (0.0, 0.0);
        };
        let r = match &self.right {
            Some(right) => right[index],
            None => l,
        };
        (l, r)
    }
}

fn check_rate(sample_rate: f32) -> Result<(), SampleError> {
    if sample_rate.is_finite() && sample_rate > 0.0 {
        Ok(())
    } else {
        Err(SampleError::InvalidSampleRate(sample_rate))
    }
}

/// Loop behaviour of a zone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoopMode {
    /// Play to the end once
    #[default]
    Off,
    /// Jump from loop end back to loop start
    Forward,
    /// Forward loop with a crossfade of the given length in frames
    /// before the loop end. The tail blends with the frames before the
    /// loop start, or with the loop's own head when there are too few,
    /// in which case the fade is capped at half the loop.
    Crossfade(u32),
}

/// One buffer mapped to a key and velocity rectangle.
///
/// ```rust
/// use std::sync::Arc;
/// use timbre_synth::sampler::{LoopMode, SampleBuffer, SampleZone};
///
/// let buffer = Arc::new(SampleBuffer::mono(vec![0.0; 4800], 48000.0).unwrap());
/// let zone = SampleZone::new(buffer, 60)
///     .with_keys(48, 72)
///     .with_velocities(1, 100)
///     .with_loop(LoopMode::Crossfade(256), 1000, 4000)
///     .with_round_robin(0, 1);
/// assert!(zone.validate().is_ok());
/// assert!(zone.contains(60, 64));
/// assert!(!zone.contains(60, 120));
/// ```
#[derive(Debug, Clone)]
pub struct SampleZone {
    buffer: Arc<SampleBuffer>,
    /// Lowest key, inclusive
    pub key_low: u8,
    /// Highest key, inclusive
    pub key_high: u8,
    /// Lowest velocity, inclusive
    pub vel_low: u8,
    /// Highest velocity, inclusive
    pub vel_high: u8,
    /// Key that plays the buffer at its recorded pitch
    pub root: u8,
    /// Loop behaviour
    pub loop_mode: LoopMode,
    /// First frame of the loop
    pub loop_start: usize,
    /// One past the last frame of the loop
    pub loop_end: usize,
    /// Round-robin group, 0..16
    pub rr_group: u8,
    /// Position within the round-robin group
    pub rr_index: u8,
    /// Level in dB
    pub gain_db: f32,
    /// Pan, -1..=1
    pub pan: f32,
    /// Tuning in cents
    pub tune_cents: f32,
}

impl SampleZone {
    /// Full key and velocity range, no loop, unity gain.
    pub fn new(buffer: Arc<SampleBuffer>, root: u8) -> Self {
        let len = buffer.len();
        Self {
            buffer,
            key_low: 0,
            key_high: 127,
            vel_low: 0,
            vel_high: 127,
            root,
            loop_mode: LoopMode::Off,
            loop_start: 0,
            loop_end: len,
            rr_group: 0,
            rr_index: 0,
            gain_db: 0.0,
            pan: 0.0,
            tune_cents: 0.0,
        }
    }

    /// Key range.
    pub fn with_keys(mut self, low: u8, high: u8) -> Self {
        self.key_low = low;
        self.key_high = high;
        self
    }

    /// Velocity range in MIDI units.
    pub fn with_velocities(mut self, low: u8, high: u8) -> Self {
        self.vel_low = low;
        self.vel_high = high;
        self
    }

    /// Loop mode and region.
    pub fn with_loop(mut self, mode: LoopMode, start: usize, end: usize) -> Self {
        self.loop_mode = mode;
        self.loop_start = start;
        self.loop_end = end;
        self
    }

    /// Round-robin group and index.
    pub fn with_round_robin(mut self, group: u8, index: u8) -> Self {
        self.rr_group = group;
        self.rr_index = index;
        self
    }

    /// Level, pan and tuning.
    pub fn with_mix(mut self, gain_db: f32, pan: f32, tune_cents: f32) -> Self {
        self.gain_db = gain_db;
        self.pan = pan;
        self.tune_cents = tune_cents;
        self
    }

    /// Shared audio.
    pub fn buffer(&self) -> &Arc<SampleBuffer> {
        &self.buffer
    }

    /// Check ranges and loop points against the buffer.
    pub fn validate(&self) -> Result<(), SampleError> {
        if self.key_low > self.key_high || self.key_high > 127 || self.root > 127 {
            return Err(SampleError::KeyRange {
                low: self.key_low,
                high: self.key_high,
            });
        }
        if self.vel_low > self.vel_high || self.vel_high > 127 {
            return Err(SampleError::VelocityRange {
                low: self.vel_low,
                high: self.vel_high,
            });
        }
        if self.loop_mode != LoopMode::Off
            && (self.loop_start >= self.loop_end || self.loop_end > self.buffer.len())
        {
            return Err(SampleError::LoopOutOfRange {
                start: self.loop_start,
                end: self.loop_end,
                len: self.buffer.len(),
            });
        }
        Ok(())
    }

    /// Whether `note` at MIDI `velocity` falls inside the zone.
    #[inline]
    pub fn contains(&self, note: u8, velocity: u8) -> bool {
        (self.key_low..=self.key_high).contains(&note)
            && (self.vel_low..=self.vel_high).contains(&velocity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn buffer(len: usize) -> Arc<SampleBuffer> {
        Arc::new(SampleBuffer::mono(vec![0.5; len], 44100.0).unwrap())
    }

    #[test]
    fn buffers_reject_bad_input() {
        assert_eq!(
            SampleBuffer::mono(vec![], 48000.0).unwrap_err(),
            SampleError::EmptyBuffer
        );
        assert_eq!(
            SampleBuffer::stereo(vec![0.0; 3], vec![0.0; 2], 48000.0).unwrap_err(),
            SampleError::ChannelMismatch { left: 3, right: 2 }
        );
        assert!(matches!(
            SampleBuffer::mono(vec![0.0], f32::NAN),
            Err(SampleError::InvalidSampleRate(_))
        ));
    }

    #[test]
    fn mono_frames_duplicate_and_end_silently() {
        let b = SampleBuffer::mono(vec![0.1, 0.2], 48000.0).unwrap();
        assert_eq!(b.frame(1), (0.2, 0.2));
        assert_eq!(b.frame(2), (0.0, 0.0));
        let s = SampleBuffer::stereo(vec![0.1], vec![-0.1], 48000.0).unwrap();
        assert_eq!(s.frame(0), (0.1, -0.1));
    }

    #[test]
    fn validation_catches_inverted_ranges_and_bad_loops() {
        let b = buffer(100);
        assert!(matches!(
            SampleZone::new(Arc::clone(&b), 60).with_keys(70, 60).validate(),
            Err(SampleError::KeyRange { .. })
        ));
        assert!(matches!(
            SampleZone::new(Arc::clone(&b), 60)
                .with_velocities(10, 200)
                .validate(),
            Err(SampleError::VelocityRange { .. })
        ));
        assert_eq!(
            SampleZone::new(Arc::clone(&b), 60)
                .with_loop(LoopMode::Forward, 50, 101)
                .validate(),
            Err(SampleError::LoopOutOfRange {
                start: 50,
                end: 101,
                len: 100
            })
        );
        // Loop points are ignored when looping is off.
        assert!(
            SampleZone::new(b, 60)
                .with_loop(LoopMode::Off, 90, 10)
                .validate()
                .is_ok()
        );
    }
}

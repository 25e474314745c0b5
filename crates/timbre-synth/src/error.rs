//! Configuration-time errors.
//!
//! Nothing on the per-block path returns these. They come back from
//! calls that build or swap state: preparing the engine, loading
//! wavetables, building sample zones and planning the phase vocoder.

use thiserror::Error;

/// Errors reported by [`Engine::prepare`](crate::Engine::prepare) and
/// engine configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Sample rate outside the supported range or not finite.
    #[error("invalid sample rate: {0} Hz")]
    InvalidSampleRate(f32),

    /// Maximum block size of zero or beyond the supported limit.
    #[error("invalid block size: {0} frames")]
    InvalidBlockSize(usize),

    /// Polyphony outside `1..=max`.
    #[error("polyphony {requested} outside 1..={max}")]
    Polyphony {
        /// Requested voice count.
        requested: usize,
        /// Largest accepted voice count.
        max: usize,
    },

    /// The built-in wavetables could not be generated.
    #[error("wavetable setup failed: {0}")]
    Wavetable(#[from] WavetableError),
}

/// Errors from building a [`Wavetable`](crate::Wavetable) or
/// [`WavetableSet`](crate::WavetableSet).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WavetableError {
    /// No frames or no samples were supplied.
    #[error("wavetable is empty")]
    Empty,

    /// Frame length must be a power of two within the supported range.
    #[error("frame length {0} is not a power of two in 16..=4096")]
    BadLength(usize),

    /// Every table in a set must have the same frame length.
    #[error("frame length mismatch: expected {expected}, found {found}")]
    LengthMismatch {
        /// Length of the first table.
        expected: usize,
        /// Length of the offending table.
        found: usize,
    },

    /// More tables than a set can hold.
    #[error("{0} tables exceed the limit of 64")]
    TooManyTables(usize),
}

/// Errors from building sample buffers, zones and instruments.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SampleError {
    /// A buffer with no frames.
    #[error("sample buffer is empty")]
    EmptyBuffer,

    /// Left and right channels of different lengths.
    #[error("channel length mismatch: left {left}, right {right}")]
    ChannelMismatch {
        /// Left channel length.
        left: usize,
        /// Right channel length.
        right: usize,
    },

    /// Buffer sample rate not finite or not positive.
    #[error("invalid buffer sample rate: {0} Hz")]
    InvalidSampleRate(f32),

    /// Loop region empty or past the end of the buffer.
    #[error("loop {start}..{end} out of range for {len} frames")]
    LoopOutOfRange {
        /// First frame of the loop.
        start: usize,
        /// One past the last frame of the loop.
        end: usize,
        /// Buffer length in frames.
        len: usize,
    },

    /// Low key above high key, or a key above 127.
    #[error("invalid key range {low}..={high}")]
    KeyRange {
        /// Lowest key.
        low: u8,
        /// Highest key.
        high: u8,
    },

    /// Low velocity above high velocity, or a velocity above 127.
    #[error("invalid velocity range {low}..={high}")]
    VelocityRange {
        /// Lowest velocity.
        low: u8,
        /// Highest velocity.
        high: u8,
    },

    /// Layer index not present in the instrument.
    #[error("no layer at index {0}")]
    NoSuchLayer(usize),

    /// Phase vocoder frame size not a power of two, or hop not smaller than the frame.
    #[error("invalid analysis frame: size {size}, hop {hop}")]
    InvalidFrame {
        /// FFT size.
        size: usize,
        /// Hop size.
        hop: usize,
    },
}

//! Musical time for tempo-synced LFOs and delays.
//!
//! Hosts may or may not report a tempo. Everything that syncs to tempo
//! accepts an `Option<f32>` or a raw BPM and runs it through
//! [`sanitize_bpm`], which falls back to [`DEFAULT_BPM`] for anything
//! missing, non-finite or outside [`MIN_BPM`]..=[`MAX_BPM`].

/// Tempo used when the host supplies none.
pub const DEFAULT_BPM: f32 = 140.0;
/// Slowest tempo accepted from a host.
pub const MIN_BPM: f32 = 20.0;
/// Fastest tempo accepted from a host.
pub const MAX_BPM: f32 = 999.0;

/// Map a host tempo to a usable one.
///
/// ```rust
/// use timbre_core::{sanitize_bpm, DEFAULT_BPM};
///
/// assert_eq!(sanitize_bpm(Some(120.0)), 120.0);
/// assert_eq!(sanitize_bpm(None), DEFAULT_BPM);
/// assert_eq!(sanitize_bpm(Some(f32::NAN)), DEFAULT_BPM);
/// assert_eq!(sanitize_bpm(Some(-3.0)), DEFAULT_BPM);
/// ```
#[inline]
pub fn sanitize_bpm(bpm: Option<f32>) -> f32 {
    match bpm {
        Some(b) if b.is_finite() && (MIN_BPM..=MAX_BPM).contains(&b) => b,
        _ => DEFAULT_BPM,
    }
}

/// Note lengths a synced rate or time can lock to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NoteDivision {
    /// Two bars of 4/4
    DoubleWhole,
    /// 4 beats
    Whole,
    /// 2 beats
    Half,
    /// 1 beat
    #[default]
    Quarter,
    /// 1/2 beat
    Eighth,
    /// 1/4 beat
    Sixteenth,
    /// 1/8 beat
    ThirtySecond,
    /// 3 beats
    DottedHalf,
    /// 1.5 beats
    DottedQuarter,
    /// 3/4 beat
    DottedEighth,
    /// 3/8 beat
    DottedSixteenth,
    /// 4/3 beats
    TripletHalf,
    /// 2/3 beat
    TripletQuarter,
    /// 1/3 beat
    TripletEighth,
    /// 1/6 beat
    TripletSixteenth,
}

impl NoteDivision {
    /// Every division, longest first within each family. Index order is
    /// stable so hosts can expose it as an enumerated parameter.
    pub const ALL: [NoteDivision; 15] = [
        NoteDivision::DoubleWhole,
        NoteDivision::Whole,
        NoteDivision::Half,
        NoteDivision::Quarter,
        NoteDivision::Eighth,
        NoteDivision::Sixteenth,
        NoteDivision::ThirtySecond,
        NoteDivision::DottedHalf,
        NoteDivision::DottedQuarter,
        NoteDivision::DottedEighth,
        NoteDivision::DottedSixteenth,
        NoteDivision::TripletHalf,
        NoteDivision::TripletQuarter,
        NoteDivision::TripletEighth,
        NoteDivision::TripletSixteenth,
    ];

    /// Division at a host parameter index. Out-of-range indices clamp to the
    /// last entry.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }

    /// Length in beats (quarter notes).
    pub fn beats(self) -> f32 {
        match self {
            NoteDivision::DoubleWhole => 8.0,
            NoteDivision::Whole => 4.0,
            NoteDivision::Half => 2.0,
            NoteDivision::Quarter => 1.0,
            NoteDivision::Eighth => 0.5,
            NoteDivision::Sixteenth => 0.25,
            NoteDivision::ThirtySecond => 0.125,
            NoteDivision::DottedHalf => 3.0,
            NoteDivision::DottedQuarter => 1.5,
            NoteDivision::DottedEighth => 0.75,
            NoteDivision::DottedSixteenth => 0.375,
            NoteDivision::TripletHalf => 4.0 / 3.0,
            NoteDivision::TripletQuarter => 2.0 / 3.0,
            NoteDivision::TripletEighth => 1.0 / 3.0,
            NoteDivision::TripletSixteenth => 1.0 / 6.0,
        }
    }

    /// Repetition rate in Hz at `bpm`.
    ///
    /// ```rust
    /// use timbre_core::NoteDivision;
    ///
    /// assert!((NoteDivision::Quarter.to_hz(120.0) - 2.0).abs() < 1e-4);
    /// assert!((NoteDivision::Eighth.to_hz(120.0) - 4.0).abs() < 1e-4);
    /// ```
    pub fn to_hz(self, bpm: f32) -> f32 {
        (bpm / 60.0) / self.beats()
    }

    /// Length in milliseconds at `bpm`.
    pub fn to_ms(self, bpm: f32) -> f32 {
        self.beats() * 60_000.0 / bpm
    }

    /// Length in samples at `bpm` and `sample_rate`.
    pub fn to_samples(self, bpm: f32, sample_rate: f32) -> f32 {
        self.to_ms(bpm) * 0.001 * sample_rate
    }
}

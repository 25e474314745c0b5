//! Multi-zone sample playback.
//!
//! - [`SampleBuffer`] / [`SampleZone`]: decoded audio and its key,
//!   velocity, loop and round-robin mapping
//! - [`SampleInstrument`]: zone arena plus layers, addressed by [`ZoneId`]
//! - [`SamplePlayerVoice`] / [`SamplePlayer`]: interpolating voices and
//!   their fixed pool
//! - [`SampleSynth`]: one sample across the keyboard
//! - [`PhaseVocoder`]: offline time-stretch and pitch-shift (`std` only)

pub mod instrument;
pub mod player;
pub mod sample_synth;
#[cfg(feature = "std")]
pub mod vocoder;
pub mod voice;
pub mod zone;

pub use instrument::{MAX_SELECTED, RR_GROUPS, SampleInstrument, SampleLayer, ZoneId, ZoneSelection};
pub use player::SamplePlayer;
pub use sample_synth::{SAMPLE_SYNTH_VOICES, SampleSynth};
#[cfg(feature = "std")]
pub use vocoder::PhaseVocoder;
pub use voice::SamplePlayerVoice;
pub use zone::{LoopMode, SampleBuffer, SampleZone};

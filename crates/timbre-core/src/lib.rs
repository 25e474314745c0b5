//! Timbre Core - leaf DSP primitives for the timbre instrument engine
//!
//! Everything in this crate is a self-contained building block with no
//! knowledge of voices, notes or the effect rack. All processing methods
//! are allocation-free; buffers are sized when an object is built or
//! resized at configuration time.
//!
//! # Filters
//!
//! - [`StateVariableFilter`] - ZDF two-pole filter with low/high/band/notch/peak/shelf
//!   responses and [`StateVariableFilter::process_multimode`]
//! - [`LadderFilter`] - ZDF four-stage ladder with 6/12/18/24 dB taps
//! - [`OnePole`] - 6 dB/oct tone control
//!
//! # Modulation
//!
//! - [`Lfo`] - seven shapes, free or tempo-synced, fade-in and retrigger
//! - [`EnvelopeFollower`] - attack/release peak detector
//! - [`SmoothedParam`] - zipper-free control values
//!
//! # Time
//!
//! - [`DelayLine`] - circular buffer with linear or Hermite reads
//! - [`NoteDivision`] and [`sanitize_bpm`] - musical lengths at a host tempo
//!
//! # Effects
//!
//! - [`Effect`] - the stereo processing trait implemented by every rack effect
//! - [`ParameterInfo`] / [`ParamDescriptor`] - index-addressed parameter access
//!
//! # no_std
//!
//! Disable the default `std` feature to build for targets without an OS:
//!
//! ```toml
//! [dependencies]
//! timbre-core = { version = "0.1", default-features = false }
//! ```
//!
//! # Example
//!
//! ```rust
//! use timbre_core::{LadderFilter, Lfo, LfoWaveform};
//!
//! let mut lfo = Lfo::new(48000.0);
//! lfo.set_waveform(LfoWaveform::Triangle);
//! lfo.set_frequency(0.5);
//!
//! let mut ladder = LadderFilter::new(48000.0);
//! ladder.set_resonance(0.7);
//!
//! let mut out = 0.0;
//! for i in 0..480 {
//!     ladder.set_cutoff(800.0 + 600.0 * lfo.advance());
//!     out = ladder.process(if i % 100 < 50 { 0.5 } else { -0.5 });
//! }
//! assert!(out.is_finite());
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod delay;
pub mod effect;
pub mod follower;
pub mod ladder;
pub mod lfo;
pub mod math;
pub mod one_pole;
pub mod param;
pub mod param_info;
pub mod svf;
pub mod tempo;

pub use delay::{DelayLine, Interpolation};
pub use effect::Effect;
pub use follower::EnvelopeFollower;
pub use ladder::{LadderFilter, LadderSlope};
pub use lfo::{Lfo, LfoRate, LfoWaveform, MAX_LFO_HZ};
pub use math::{
    XorShift32, asymmetric_clip, cents_to_ratio, db_to_linear, equal_power_pan, flush_denormal,
    foldback, freq_to_midi, hard_clip, hermite, lerp, linear_to_db, midi_to_freq, ms_to_samples,
    quantize, semitones_to_ratio, soft_clip, wet_dry_mix, wet_dry_mix_stereo,
};
pub use one_pole::OnePole;
pub use param::SmoothedParam;
pub use param_info::{ParamDescriptor, ParamScale, ParamUnit, ParameterInfo};
pub use svf::{StateVariableFilter, SvfOutputs, SvfType, resonance_to_damping};
pub use tempo::{DEFAULT_BPM, MAX_BPM, MIN_BPM, NoteDivision, sanitize_bpm};

//! Timbre Effects - the FX rack for the timbre engine
//!
//! Seven stereo effects built on timbre-core, each with its own dry/wet mix
//! and indexed parameters:
//!
//! - [`Reverb`] - Freeverb-style room with width, pre-delay and freeze
//! - [`Delay`] - Ping-pong delay with independent channel times and tempo sync
//! - [`Chorus`] - Modulated delay with feedback
//! - [`Flanger`] - Short swept delay with bipolar feedback
//! - [`Distortion`] - Five waveshaping curves and a tone control
//! - [`Compressor`] - Soft-knee compressor with linked detection
//! - [`ThreeBandEq`] - Low shelf, bell and high shelf
//!
//! [`EffectChain`] runs them in series. [`EffectKind`] is the closed set of
//! effect types the chain can hold.
//!
//! ## Example
//!
//! ```rust
//! use timbre_core::Effect;
//! use timbre_effects::{EffectChain, EffectType};
//!
//! let mut chain = EffectChain::default_rack(48000.0);
//! chain.prepare(48000.0, 128);
//! if let Some(i) = chain.find(EffectType::Delay) {
//!     chain.set_enabled(i, true);
//! }
//!
//! let mut left = [0.25_f32; 128];
//! let mut right = [0.25_f32; 128];
//! chain.process(&mut left, &mut right);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod chain;
pub mod chorus;
pub mod compressor;
pub mod delay;
pub mod distortion;
pub mod eq;
pub mod flanger;
pub mod reverb;

pub use chain::{ChainFull, EffectChain, EffectKind, EffectSlot, EffectType, MAX_EFFECTS};
pub use chorus::Chorus;
pub use compressor::Compressor;
pub use delay::Delay;
pub use distortion::{Distortion, WaveShape};
pub use eq::ThreeBandEq;
pub use flanger::Flanger;
pub use reverb::Reverb;

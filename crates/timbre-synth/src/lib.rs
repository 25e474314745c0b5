//! Timbre Synth - synthesis and sampling engine for timbre
//!
//! Everything between a MIDI event and a stereo sample: oscillators,
//! envelopes, the modulation matrix, voices and their allocator, a
//! multi-zone sampler, and the block-level [`Engine`] that ties them to
//! the effect rack.
//!
//! # Core Components
//!
//! ## Oscillators
//!
//! - [`Oscillator`] - PolyBLEP sine, triangle, saw, square, pulse and noise
//! - [`WavetableOscillator`] - Band-limited mip-mapped tables with morphing
//!
//! ```rust
//! use timbre_synth::{Oscillator, Waveform};
//!
//! let mut osc = Oscillator::new(48000.0);
//! osc.set_frequency(440.0);
//! osc.set_waveform(Waveform::Saw);
//! let sample = osc.advance();
//! assert!(sample.abs() <= 1.1);
//! ```
//!
//! ## Envelopes and Modulation
//!
//! - [`AdsrEnvelope`] - Sample-counted ADSR with per-segment curves
//! - [`ModulationMatrix`] - Fixed-capacity routing of [`ModSource`]s to
//!   [`ModDestination`]s
//!
//! ```rust
//! use timbre_synth::{AdsrEnvelope, EnvelopeState};
//!
//! let mut env = AdsrEnvelope::new(48000.0);
//! env.set_times(0.01, 0.1, 0.2);
//! env.set_sustain(0.7);
//! env.note_on(1.0);
//! let level = env.advance();
//! assert_eq!(env.state(), EnvelopeState::Attack);
//! assert!(level > 0.0);
//! ```
//!
//! ## Voices
//!
//! - [`SynthVoice`] - Two oscillators, noise, filter, three envelopes, two LFOs
//! - [`VoiceManager`] - Poly, mono and legato allocation with unison,
//!   stealing and sustain pedal
//! - [`SynthParams`] - The parameter snapshot every voice reads
//!
//! ## Sampler
//!
//! [`sampler`] holds zones, layers with round robin, interpolating sample
//! voices, the [`SamplePlayer`](sampler::SamplePlayer) pool and the
//! phase vocoder.
//!
//! # no_std Support
//!
//! Everything except [`Engine`], [`Telemetry`] and the phase vocoder
//! builds without `std`:
//!
//! ```toml
//! [dependencies]
//! timbre-synth = { version = "0.1", default-features = false }
//! ```
//!
//! # Example: Engine
//!
//! ```rust
//! use timbre_synth::{Engine, EngineConfig, MidiEvent, SynthParams, VoiceMode};
//!
//! let mut engine = Engine::new(EngineConfig::default());
//! engine.prepare(48000.0, 512).unwrap();
//!
//! let mut params = SynthParams::default();
//! params.voice_mode = VoiceMode::Legato;
//! params.glide_time = 0.08;
//! engine.set_params(&params);
//!
//! let (mut left, mut right) = (vec![0.0f32; 512], vec![0.0f32; 512]);
//! engine.process(
//!     &mut left,
//!     &mut right,
//!     &[MidiEvent::note_on(0, 60, 0.9), MidiEvent::note_on(256, 67, 0.9)],
//! );
//! assert_eq!(engine.active_voice_count(), 1);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(feature = "std")]
pub mod engine;
pub mod envelope;
pub mod error;
pub mod midi;
pub mod mod_matrix;
pub mod oscillator;
pub mod params;
pub mod sampler;
#[cfg(feature = "std")]
pub mod telemetry;
pub mod voice;
pub mod voice_manager;
pub mod wavetable;

#[cfg(feature = "std")]
pub use engine::{Engine, EngineConfig};
pub use envelope::{AdsrEnvelope, EnvelopeState};
pub use error::{EngineError, SampleError, WavetableError};
pub use midi::{MidiEvent, MidiMessage};
pub use mod_matrix::{
    MAX_ROUTINGS, ModDestination, ModRouting, ModSource, ModulationMatrix, Polarity,
};
pub use oscillator::{Oscillator, Waveform};
pub use params::{
    EnvParams, FilterMode, FilterParams, GlideMode, LfoParams, MAX_POLYPHONY, MAX_UNISON,
    OscParams, OscWaveform, StealPolicy, SynthParams, VoiceMode,
};
#[cfg(feature = "std")]
pub use telemetry::{Telemetry, TelemetryReader, TelemetryWriter};
pub use voice::{SynthVoice, UnisonLayer};
pub use voice_manager::{MAX_VOICES, VoiceManager, unison_offsets};
pub use wavetable::{Wavetable, WavetableOscillator, WavetableSet};

// Re-export the timbre-core types that appear in this crate's parameters
pub use timbre_core::{LadderSlope, LfoRate, LfoWaveform, NoteDivision, SvfType};

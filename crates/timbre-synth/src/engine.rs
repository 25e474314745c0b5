//! Block-level engine: MIDI in, stereo audio out.
//!
//! ## Signal flow per block
//!
//! ```text
//! events ─► VoiceManager ─┐
//!        └► SamplePlayer ─┴─► EffectChain ─► output ─► telemetry
//! ```
//!
//! The block is split at every event frame so notes start on the exact
//! sample they were stamped with. Blocks longer than the prepared maximum
//! are rendered in chunks of at most that size.

use std::sync::Arc;

use timbre_core::sanitize_bpm;
use timbre_effects::EffectChain;

use crate::error::EngineError;
use crate::midi::{MidiEvent, MidiMessage};
use crate::mod_matrix::MAX_ROUTINGS;
use crate::params::{MAX_POLYPHONY, SynthParams};
use crate::sampler::SamplePlayer;
use crate::telemetry::TelemetryWriter;
use crate::voice_manager::VoiceManager;
use crate::wavetable::WavetableSet;

/// Lowest sample rate [`Engine::prepare`] accepts.
pub const MIN_SAMPLE_RATE: f32 = 8000.0;
/// Highest sample rate [`Engine::prepare`] accepts.
pub const MAX_SAMPLE_RATE: f32 = 384_000.0;
/// Largest block [`Engine::prepare`] accepts.
pub const MAX_BLOCK_SIZE: usize = 8192;
/// Voices in the engine's sample player.
pub const SAMPLER_VOICES: usize = 32;
/// Frame length of the built-in wavetables.
pub const WAVETABLE_LEN: usize = 1024;

/// Startup configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Output sample rate in Hz
    pub sample_rate: f32,
    /// Largest block the host will ask for
    pub max_block: usize,
    /// Upper bound on simultaneous notes
    pub polyphony: usize,
    /// Tempo used until the host reports one
    pub default_tempo: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            max_block: 512,
            polyphony: 16,
            default_tempo: timbre_core::DEFAULT_BPM,
        }
    }
}

impl EngineConfig {
    fn validate(&self) -> Result<(), EngineError> {
        if !self.sample_rate.is_finite()
            || !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&self.sample_rate)
        {
            return Err(EngineError::InvalidSampleRate(self.sample_rate));
        }
        if !(1..=MAX_BLOCK_SIZE).contains(&self.max_block) {
            return Err(EngineError::InvalidBlockSize(self.max_block));
        }
        if !(1..=MAX_POLYPHONY).contains(&self.polyphony) {
            return Err(EngineError::Polyphony {
                requested: self.polyphony,
                max: MAX_POLYPHONY,
            });
        }
        Ok(())
    }
}

/// The complete instrument.
///
/// ```rust
/// use timbre_synth::{Engine, EngineConfig, MidiEvent};
///
/// let mut engine = Engine::new(EngineConfig::default());
/// engine.prepare(48000.0, 256).unwrap();
///
/// let (mut l, mut r) = (vec![0.0f32; 256], vec![0.0f32; 256]);
/// engine.process(&mut l, &mut r, &[MidiEvent::note_on(0, 60, 0.8)]);
/// assert!(l.iter().any(|&s| s != 0.0));
/// assert_eq!(engine.active_voice_count(), 1);
/// ```
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    prepared: bool,
    voices: VoiceManager,
    sampler: SamplePlayer<SAMPLER_VOICES>,
    effects: EffectChain,
    params: SynthParams,
    tempo: f32,
    telemetry: Option<TelemetryWriter>,
    #[cfg(test)]
    effect_passes: usize,
}

impl Engine {
    /// Build every component at the configured rate. Silent until
    /// [`prepare`](Self::prepare) succeeds.
    pub fn new(config: EngineConfig) -> Self {
        let sr = if config.sample_rate.is_finite() && config.sample_rate > 0.0 {
            config.sample_rate
        } else {
            EngineConfig::default().sample_rate
        };
        let tempo = sanitize_bpm(Some(config.default_tempo));
        let mut voices = VoiceManager::new(sr);
        voices.set_tempo(Some(tempo));
        let mut effects = EffectChain::default_rack(sr);
        effects.set_tempo(Some(tempo));
        let mut params = SynthParams::default();
        params.routings.reserve(MAX_ROUTINGS);
        Self {
            config,
            prepared: false,
            voices,
            sampler: SamplePlayer::new(sr),
            effects,
            params,
            tempo,
            telemetry: None,
            #[cfg(test)]
            effect_passes: 0,
        }
    }

    /// Validate and apply the stream format. Configuration-time only.
    pub fn prepare(&mut self, sample_rate: f32, max_block: usize) -> Result<(), EngineError> {
        let config = EngineConfig {
            sample_rate,
            max_block,
            ..self.config
        };
        config.validate()?;
        let tables = Arc::new(WavetableSet::basic(WAVETABLE_LEN)?);

        self.config = config;
        self.voices.set_sample_rate(sample_rate);
        self.voices.set_wavetables(&tables);
        self.voices.reset();
        self.sampler.set_sample_rate(sample_rate);
        self.effects.prepare(sample_rate, max_block);
        self.apply_params();
        self.prepared = true;

        tracing::info!(
            sample_rate,
            max_block,
            polyphony = config.polyphony,
            "engine prepared"
        );
        Ok(())
    }

    /// Whether [`prepare`](Self::prepare) has succeeded.
    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Apply a parameter snapshot. Polyphony is capped by the
    /// configuration.
    ///
    /// Allocation-free while the snapshot holds at most [`MAX_ROUTINGS`]
    /// routings, so it may be called between blocks on the audio thread.
    pub fn set_params(&mut self, params: &SynthParams) {
        self.params.clone_from(params);
        self.apply_params();
    }

    fn apply_params(&mut self) {
        self.params.polyphony = self.params.polyphony.min(self.config.polyphony);
        self.voices.set_params(&self.params);
    }

    /// Host tempo. `None` or invalid values fall back to 140 BPM.
    pub fn set_tempo(&mut self, bpm: Option<f32>) {
        self.tempo = sanitize_bpm(bpm);
        self.voices.set_tempo(Some(self.tempo));
        self.effects.set_tempo(Some(self.tempo));
    }

    /// Current tempo.
    pub fn tempo(&self) -> f32 {
        self.tempo
    }

    /// Render one block, applying `events` at their frame offsets.
    ///
    /// Events are taken in slice order. One stamped earlier than an event
    /// before it is applied as soon as it is reached; frames past the end
    /// of the block land on its last frame. Voices and the sampler render
    /// between event frames; the effect chain then runs once over each
    /// chunk of at most the prepared block size. Output is overwritten.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32], events: &[MidiEvent]) {
        let len = left.len().min(right.len());
        left.fill(0.0);
        right.fill(0.0);
        if !self.prepared || len == 0 {
            return;
        }
        let (left, right) = (&mut left[..len], &mut right[..len]);

        let last = len - 1;
        let mut pending = events.iter().peekable();
        let mut chunk_start = 0;
        while chunk_start < len {
            let chunk_end = (chunk_start + self.config.max_block).min(len);
            let mut pos = chunk_start;
            while pos < chunk_end {
                while let Some(event) = pending.next_if(|e| (e.frame as usize).min(last) <= pos) {
                    self.apply(&event.message);
                }
                let next_event = pending.peek().map_or(len, |e| (e.frame as usize).min(last));
                let end = next_event.min(chunk_end);
                self.voices.render(&mut left[pos..end], &mut right[pos..end]);
                self.sampler.render(&mut left[pos..end], &mut right[pos..end]);
                pos = end;
            }
            self.effects
                .process(&mut left[chunk_start..chunk_end], &mut right[chunk_start..chunk_end]);
            #[cfg(test)]
            {
                self.effect_passes += 1;
            }
            chunk_start = chunk_end;
        }

        if let Some(telemetry) = self.telemetry.as_mut() {
            let voices = self.voices.active_voice_count() + self.sampler.active_voice_count();
            telemetry.push_block(left, right, voices);
        }
    }

    fn apply(&mut self, message: &MidiMessage) {
        self.voices.handle_midi(message);
        self.sampler.handle_midi(message);
    }

    /// Silence everything and clear effect state.
    pub fn reset(&mut self) {
        self.voices.reset();
        self.sampler.reset();
        self.effects.reset();
    }

    /// The effect chain, for reordering and parameter changes.
    pub fn effects_mut(&mut self) -> &mut EffectChain {
        &mut self.effects
    }

    /// Read-only effect chain.
    pub fn effects(&self) -> &EffectChain {
        &self.effects
    }

    /// Synth voices, for introspection.
    pub fn voices(&self) -> &VoiceManager {
        &self.voices
    }

    /// Synth voices sounding or releasing.
    pub fn active_voice_count(&self) -> usize {
        self.voices.active_voice_count()
    }

    /// Frequency of the mono/legato voice, if one is sounding.
    pub fn mono_frequency(&self) -> Option<f32> {
        self.voices.mono_frequency()
    }

    /// The sample player, to load instruments and set its envelope.
    pub fn sampler_mut(&mut self) -> &mut SamplePlayer<SAMPLER_VOICES> {
        &mut self.sampler
    }

    /// Read-only sample player.
    pub fn sampler(&self) -> &SamplePlayer<SAMPLER_VOICES> {
        &self.sampler
    }

    /// Start publishing scope samples and meters. Returns the previous
    /// writer, if any.
    pub fn attach_telemetry(&mut self, writer: TelemetryWriter) -> Option<TelemetryWriter> {
        self.telemetry.replace(writer)
    }

    /// Stop publishing telemetry.
    pub fn detach_telemetry(&mut self) -> Option<TelemetryWriter> {
        self.telemetry.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::VoiceMode;
    use crate::telemetry::Telemetry;

    fn prepared(block: usize) -> Engine {
        let mut e = Engine::new(EngineConfig::default());
        e.prepare(48000.0, block).unwrap();
        e
    }

    #[test]
    fn prepare_rejects_bad_formats() {
        let mut e = Engine::new(EngineConfig::default());
        assert_eq!(
            e.prepare(0.0, 256),
            Err(EngineError::InvalidSampleRate(0.0))
        );
        assert_eq!(
            e.prepare(48000.0, 0),
            Err(EngineError::InvalidBlockSize(0))
        );
        assert!(!e.is_prepared());

        let mut e = Engine::new(EngineConfig {
            polyphony: 65,
            ..EngineConfig::default()
        });
        assert_eq!(
            e.prepare(48000.0, 256),
            Err(EngineError::Polyphony {
                requested: 65,
                max: MAX_POLYPHONY
            })
        );
    }

    #[test]
    fn unprepared_engine_is_silent() {
        let mut e = Engine::new(EngineConfig::default());
        let (mut l, mut r) = ([1.0f32; 64], [1.0f32; 64]);
        e.process(&mut l, &mut r, &[MidiEvent::note_on(0, 60, 1.0)]);
        assert!(l.iter().chain(r.iter()).all(|&s| s == 0.0));
    }

    #[test]
    fn events_land_on_their_frame() {
        let mut e = prepared(512);
        let (mut l, mut r) = ([0.0f32; 256], [0.0f32; 256]);
        e.process(&mut l, &mut r, &[MidiEvent::note_on(100, 60, 1.0)]);
        assert!(l[..100].iter().all(|&s| s == 0.0));
        assert!(l[100..].iter().any(|&s| s != 0.0));
    }

    #[test]
    fn oversized_blocks_are_chunked() {
        let mut e = prepared(64);
        let (mut l, mut r) = (vec![0.0f32; 1000], vec![0.0f32; 1000]);
        e.process(&mut l, &mut r, &[MidiEvent::note_on(0, 60, 1.0)]);
        assert!(l[900..].iter().any(|&s| s != 0.0));
    }

    #[test]
    fn effects_run_once_per_block_however_many_events() {
        let mut e = prepared(256);
        let events: Vec<MidiEvent> = (0..8)
            .map(|i| MidiEvent::note_on(i * 30, 60 + i as u8, 1.0))
            .collect();
        let (mut l, mut r) = (vec![0.0f32; 256], vec![0.0f32; 256]);
        e.process(&mut l, &mut r, &events);
        assert_eq!(e.effect_passes, 1);

        // Twice the prepared size: one pass per chunk.
        let (mut l, mut r) = (vec![0.0f32; 512], vec![0.0f32; 512]);
        e.process(&mut l, &mut r, &events);
        assert_eq!(e.effect_passes, 3);
    }

    #[test]
    fn late_events_keep_arrival_order() {
        let mut e = prepared(512);
        let mut params = SynthParams::default();
        params.voice_mode = VoiceMode::Mono;
        e.set_params(&params);
        let (mut l, mut r) = ([0.0f32; 128], [0.0f32; 128]);
        e.process(
            &mut l,
            &mut r,
            &[
                MidiEvent::note_on(50, 60, 1.0),
                MidiEvent::note_on(10, 64, 1.0),
            ],
        );
        // 64 arrives second, so it is the note left sounding.
        let freq = e.mono_frequency().unwrap();
        assert!((freq - 329.63).abs() < 0.5, "{freq}");
    }

    #[test]
    fn polyphony_is_capped_by_config() {
        let mut e = Engine::new(EngineConfig {
            polyphony: 2,
            ..EngineConfig::default()
        });
        e.prepare(48000.0, 128).unwrap();
        let events: Vec<MidiEvent> = (60..66).map(|n| MidiEvent::note_on(0, n, 1.0)).collect();
        let (mut l, mut r) = ([0.0f32; 128], [0.0f32; 128]);
        e.process(&mut l, &mut r, &events);
        assert_eq!(e.active_voice_count(), 2);
    }

    #[test]
    fn telemetry_sees_output() {
        let mut e = prepared(256);
        let (writer, mut reader) = Telemetry::new(1024);
        assert!(e.attach_telemetry(writer).is_none());
        let (mut l, mut r) = ([0.0f32; 256], [0.0f32; 256]);
        e.process(&mut l, &mut r, &[MidiEvent::note_on(0, 60, 1.0)]);
        assert_eq!(reader.active_voices(), 1);
        assert!(reader.peak() > 0.0);
        let mut scope = [0.0f32; 512];
        assert_eq!(reader.pop_into(&mut scope), 256);
    }
}

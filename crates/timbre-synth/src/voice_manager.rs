//! Voice allocation: polyphony, stealing, unison, mono/legato and sustain.
//!
//! The manager owns a fixed pool of [`MAX_VOICES`] [`SynthVoice`]s, built
//! once. The part of the pool in use is `polyphony * unison_count`
//! (capped at the pool size); voices beyond it are never started.
//!
//! ## Poly
//!
//! Every note-on claims `unison_count` free voices as one *group*. When
//! there are not enough free voices, whole groups are stolen: voices
//! already releasing go first, then the [`StealPolicy`] decides, then
//! age breaks ties. Stealing is deterministic for a given event history.
//!
//! ## Mono and Legato
//!
//! The first `unison_count` voices form the single mono group. Held keys
//! live on a last-note-priority stack; releasing the sounding key falls
//! back to the previous held key. Mono restarts the envelopes on every
//! change, Legato only moves the pitch (gliding when enabled).
//!
//! ## Sustain
//!
//! While CC 64 is down a released key leaves its voices sounding and
//! marks them as pedal-held; lifting the pedal releases them.

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(feature = "std")]
extern crate std as alloc;

use alloc::sync::Arc;
use alloc::vec::Vec;

use libm::sqrtf;
use timbre_core::{midi_to_freq, sanitize_bpm};

use crate::midi::{CC_MOD_WHEEL, CC_SUSTAIN, MidiMessage};
use crate::mod_matrix::{MAX_ROUTINGS, ModSource};
use crate::params::{StealPolicy, SynthParams, VoiceMode};
use crate::voice::{SynthVoice, UnisonLayer};
use crate::wavetable::WavetableSet;

/// Size of the preallocated voice pool.
pub const MAX_VOICES: usize = 64;

/// Held keys remembered in mono and legato modes.
const NOTE_STACK_SIZE: usize = 16;

/// Detune (cents) and pan offsets of unison layer `index` out of `count`.
///
/// Layers are spread evenly over `-detune/2 ..= detune/2` and
/// `-spread/2 ..= spread/2`, so the set is symmetric about zero. A
/// single layer sits at zero.
///
/// ```rust
/// use timbre_synth::unison_offsets;
///
/// assert_eq!(unison_offsets(0, 4, 20.0, 1.0), (-10.0, -0.5));
/// assert_eq!(unison_offsets(3, 4, 20.0, 1.0), (10.0, 0.5));
/// assert_eq!(unison_offsets(0, 1, 20.0, 1.0), (0.0, 0.0));
/// ```
pub fn unison_offsets(index: usize, count: usize, detune_cents: f32, spread: f32) -> (f32, f32) {
    if count < 2 {
        return (0.0, 0.0);
    }
    let t = 2.0 * index as f32 / (count - 1) as f32 - 1.0;
    (t * detune_cents * 0.5, t * spread * 0.5)
}

/// Last-note-priority stack of held keys.
#[derive(Debug, Clone)]
struct NoteStack {
    notes: [u8; NOTE_STACK_SIZE],
    len: usize,
}

impl NoteStack {
    fn new() -> Self {
        Self {
            notes: [0; NOTE_STACK_SIZE],
            len: 0,
        }
    }

    fn push(&mut self, note: u8) {
        self.remove(note);
        if self.len == NOTE_STACK_SIZE {
            self.notes.copy_within(1.., 0);
            self.len -= 1;
        }
        self.notes[self.len] = note;
        self.len += 1;
    }

    /// Remove `note`; true if it was on the stack.
    fn remove(&mut self, note: u8) -> bool {
        let Some(pos) = self.notes[..self.len].iter().position(|&n| n == note) else {
            return false;
        };
        self.notes.copy_within(pos + 1..self.len, pos);
        self.len -= 1;
        true
    }

    fn top(&self) -> Option<u8> {
        self.len.checked_sub(1).map(|i| self.notes[i])
    }

    fn clear(&mut self) {
        self.len = 0;
    }
}

/// Pool of synth voices driven by note and controller events.
///
/// # Example
///
/// ```rust
/// use timbre_synth::{MidiMessage, SynthParams, VoiceManager};
///
/// let mut params = SynthParams::default();
/// params.polyphony = 4;
/// params.unison_count = 2;
///
/// let mut manager = VoiceManager::new(48000.0);
/// manager.set_params(&params);
/// for note in 60..70 {
///     manager.handle_midi(&MidiMessage::NoteOn { note, velocity: 0.8 });
/// }
/// assert_eq!(manager.active_voice_count(), 8);
///
/// let (mut l, mut r) = ([0.0f32; 64], [0.0f32; 64]);
/// manager.render(&mut l, &mut r);
/// ```
#[derive(Debug, Clone)]
pub struct VoiceManager {
    voices: Vec<SynthVoice>,
    params: SynthParams,
    sample_rate: f32,
    age_counter: u64,
    group_counter: u64,
    stack: NoteStack,
    sustain: bool,
    /// Mono group waiting for pedal-up to release.
    mono_deferred: bool,
    last_velocity: f32,
    last_freq: Option<f32>,
}

impl VoiceManager {
    /// Build the full voice pool with default parameters.
    pub fn new(sample_rate: f32) -> Self {
        let voices = (0..MAX_VOICES)
            .map(|i| SynthVoice::new(sample_rate, i as u32 + 1))
            .collect();
        let mut params = SynthParams::default();
        params.routings.reserve(MAX_ROUTINGS);
        Self {
            voices,
            params,
            sample_rate,
            age_counter: 0,
            group_counter: 0,
            stack: NoteStack::new(),
            sustain: false,
            mono_deferred: false,
            last_velocity: 1.0,
            last_freq: None,
        }
    }

    /// Apply a parameter snapshot to every voice.
    ///
    /// Allocation-free as long as the routing list fits the reserved
    /// capacity. A voice-mode change releases everything.
    pub fn set_params(&mut self, params: &SynthParams) {
        let old_mode = self.params.voice_mode;
        let old_unison = self.params.unison_count;
        self.params.clone_from(params);
        self.params.sanitize();

        if self.params.voice_mode != old_mode || self.params.unison_count != old_unison {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                mode = ?self.params.voice_mode,
                unison = self.params.unison_count,
                "voice layout changed, releasing all notes"
            );
            self.release_all();
            self.stack.clear();
            self.mono_deferred = false;
        }

        let pool = self.pool_size();
        for (i, voice) in self.voices.iter_mut().enumerate() {
            voice.set_params(&self.params);
            if i >= pool && voice.is_active() {
                voice.kill();
            }
        }
    }

    /// Current (sanitized) parameters.
    pub fn params(&self) -> &SynthParams {
        &self.params
    }

    /// Host tempo for synced LFOs. `None` or nonsense falls back to 140 BPM.
    pub fn set_tempo(&mut self, bpm: Option<f32>) {
        let bpm = sanitize_bpm(bpm);
        for voice in &mut self.voices {
            voice.set_tempo(bpm);
        }
    }

    /// Share a wavetable set with every voice.
    pub fn set_wavetables(&mut self, set: &Arc<WavetableSet>) {
        for voice in &mut self.voices {
            voice.set_wavetables(set);
        }
    }

    /// Change the sample rate of every voice.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        for voice in &mut self.voices {
            voice.set_sample_rate(sample_rate);
        }
    }

    /// Voices allowed to sound: `polyphony * unison` in poly mode,
    /// `unison` in mono and legato.
    pub fn pool_size(&self) -> usize {
        let notes = match self.params.voice_mode {
            VoiceMode::Poly => self.params.polyphony,
            VoiceMode::Mono | VoiceMode::Legato => 1,
        };
        (notes * self.params.unison_count).min(MAX_VOICES)
    }

    /// Every voice in the pool, including unused ones.
    pub fn voices(&self) -> &[SynthVoice] {
        &self.voices
    }

    /// Voices currently sounding or releasing.
    pub fn active_voice_count(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }

    /// Pitch of the sounding mono voice, or of the newest poly note.
    pub fn mono_frequency(&self) -> Option<f32> {
        match self.params.voice_mode {
            VoiceMode::Mono | VoiceMode::Legato => self.voices[0]
                .is_active()
                .then(|| self.voices[0].frequency()),
            VoiceMode::Poly => self
                .voices
                .iter()
                .filter(|v| v.is_active())
                .max_by_key(|v| v.age())
                .map(SynthVoice::frequency),
        }
    }

    /// Sustain pedal state.
    pub fn sustain(&self) -> bool {
        self.sustain
    }

    /// Apply one event.
    pub fn handle_midi(&mut self, message: &MidiMessage) {
        match *message {
            MidiMessage::NoteOn { note, velocity } => self.note_on(note, velocity),
            MidiMessage::NoteOff { note, .. } => self.note_off(note),
            MidiMessage::ControlChange { controller, value } => match controller {
                CC_MOD_WHEEL => self.broadcast(ModSource::ModWheel, value),
                CC_SUSTAIN => self.set_sustain(value >= 0.5),
                _ => {}
            },
            MidiMessage::PitchBend(bend) => self.broadcast(ModSource::PitchBend, bend.clamp(-1.0, 1.0)),
            MidiMessage::Aftertouch(pressure) => {
                self.broadcast(ModSource::Aftertouch, pressure.clamp(0.0, 1.0));
            }
            MidiMessage::AllNotesOff => self.all_notes_off(),
            MidiMessage::AllSoundOff => self.all_sound_off(),
        }
    }

    /// Start a note.
    pub fn note_on(&mut self, note: u8, velocity: f32) {
        let note = note.min(127);
        if velocity <= 0.0 {
            self.note_off(note);
            return;
        }
        self.last_velocity = velocity;
        match self.params.voice_mode {
            VoiceMode::Poly => self.poly_note_on(note, velocity),
            VoiceMode::Mono | VoiceMode::Legato => self.mono_note_on(note, velocity),
        }
        self.last_freq = Some(midi_to_freq(f32::from(note)));
    }

    /// Release a note, honouring the sustain pedal.
    pub fn note_off(&mut self, note: u8) {
        match self.params.voice_mode {
            VoiceMode::Poly => {
                let sustain = self.sustain;
                for voice in &mut self.voices {
                    if voice.is_active() && voice.key_down() && voice.note() == note {
                        if sustain {
                            voice.hold_for_pedal();
                        } else {
                            voice.note_off();
                        }
                    }
                }
            }
            VoiceMode::Mono | VoiceMode::Legato => self.mono_note_off(note),
        }
    }

    /// Press or lift the sustain pedal.
    pub fn set_sustain(&mut self, down: bool) {
        if self.sustain == down {
            return;
        }
        self.sustain = down;
        if down {
            return;
        }
        for voice in &mut self.voices {
            if voice.is_active() && voice.pedal_held() {
                voice.note_off();
            }
        }
        self.mono_deferred = false;
    }

    /// Release every note, including pedal-held ones.
    pub fn all_notes_off(&mut self) {
        self.release_all();
        self.stack.clear();
        self.mono_deferred = false;
    }

    /// Silence every voice now.
    pub fn all_sound_off(&mut self) {
        for voice in &mut self.voices {
            voice.kill();
        }
        self.stack.clear();
        self.mono_deferred = false;
    }

    /// Kill every voice and clear filter state and controller history.
    pub fn reset(&mut self) {
        for voice in &mut self.voices {
            voice.reset();
        }
        self.stack.clear();
        self.sustain = false;
        self.mono_deferred = false;
        self.age_counter = 0;
        self.group_counter = 0;
        self.last_freq = None;
    }

    /// Add every active voice into `left` and `right`.
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        for voice in self.voices.iter_mut().filter(|v| v.is_active()) {
            voice.render(left, right);
        }
    }

    fn broadcast(&mut self, source: ModSource, value: f32) {
        for voice in &mut self.voices {
            voice.set_controller(source, value);
        }
    }

    fn release_all(&mut self) {
        for voice in &mut self.voices {
            if voice.is_active() {
                voice.note_off();
            }
        }
    }

    fn layer(&self, index: usize, count: usize) -> UnisonLayer {
        let (detune_cents, pan) = unison_offsets(
            index,
            count,
            self.params.unison_detune,
            self.params.unison_spread,
        );
        UnisonLayer {
            detune_cents,
            pan,
            gain: 1.0 / sqrtf(count as f32),
            phase: index as f32 / count as f32,
        }
    }

    fn next_stamps(&mut self) -> (u64, u64) {
        self.age_counter += 1;
        self.group_counter += 1;
        (self.age_counter, self.group_counter)
    }

    fn poly_note_on(&mut self, note: u8, velocity: f32) {
        // A repeated key replaces its previous group.
        for voice in &mut self.voices {
            if voice.is_active() && voice.note() == note && (voice.key_down() || voice.pedal_held())
            {
                voice.note_off();
            }
        }

        let pool = self.pool_size();
        let count = self.params.unison_count.min(pool);
        while self.voices[..pool].iter().filter(|v| !v.is_active()).count() < count {
            let Some(victim) = self.pick_victim(pool) else {
                break;
            };
            let group = self.voices[victim].group();
            for voice in &mut self.voices[..pool] {
                if voice.is_active() && voice.group() == group {
                    voice.kill();
                }
            }
        }

        let (age, group) = self.next_stamps();
        let from = self.last_freq;
        let mut layer_index = 0;
        for i in 0..pool {
            if layer_index == count {
                break;
            }
            if self.voices[i].is_active() {
                continue;
            }
            let layer = self.layer(layer_index, count);
            let voice = &mut self.voices[i];
            voice.set_unison(layer);
            voice.set_age(age);
            voice.set_group(group);
            voice.note_on(note, velocity, false, from);
            layer_index += 1;
        }
    }

    /// Index of the voice whose group should be stolen.
    fn pick_victim(&self, pool: usize) -> Option<usize> {
        let policy = self.params.steal_policy;
        let mut best: Option<(usize, (bool, f32, u64))> = None;
        for (i, voice) in self.voices[..pool].iter().enumerate() {
            if !voice.is_active() {
                continue;
            }
            let score = match policy {
                StealPolicy::Oldest => 0.0,
                StealPolicy::Quietest => voice.amp_level(),
                StealPolicy::Highest => -f32::from(voice.note()),
                StealPolicy::Lowest => f32::from(voice.note()),
            };
            let key = (!voice.is_releasing(), score, voice.age());
            if best.is_none_or(|(_, b)| key < b) {
                best = Some((i, key));
            }
        }
        best.map(|(i, _)| i)
    }

    fn mono_note_on(&mut self, note: u8, velocity: f32) {
        let had_held = self.stack.top().is_some();
        self.stack.push(note);
        self.mono_deferred = false;

        let legato = self.params.voice_mode == VoiceMode::Legato && had_held;
        self.trigger_mono(note, velocity, legato);
    }

    fn mono_note_off(&mut self, note: u8) {
        let was_top = self.stack.top() == Some(note);
        if !self.stack.remove(note) || !was_top {
            return;
        }
        match self.stack.top() {
            Some(previous) => {
                let legato = self.params.voice_mode == VoiceMode::Legato;
                self.trigger_mono(previous, self.last_velocity, legato);
            }
            None if self.sustain => {
                self.mono_deferred = true;
                let count = self.params.unison_count;
                for voice in &mut self.voices[..count] {
                    if voice.is_active() {
                        voice.hold_for_pedal();
                    }
                }
            }
            None => {
                let count = self.params.unison_count;
                for voice in &mut self.voices[..count] {
                    voice.note_off();
                }
            }
        }
    }

    fn trigger_mono(&mut self, note: u8, velocity: f32, legato: bool) {
        let count = self.params.unison_count.min(MAX_VOICES);
        let from = if self.voices[0].is_active() {
            Some(self.voices[0].frequency())
        } else {
            self.last_freq
        };
        let fresh = !self.voices[0].is_active();
        let (age, group) = if fresh {
            self.next_stamps()
        } else {
            (self.voices[0].age(), self.voices[0].group())
        };
        for i in 0..count {
            let layer = self.layer(i, count);
            let voice = &mut self.voices[i];
            voice.set_unison(layer);
            voice.set_age(age);
            voice.set_group(group);
            voice.note_on(note, velocity, legato, from);
        }
    }
}

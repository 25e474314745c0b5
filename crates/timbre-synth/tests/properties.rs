//! Property-based tests for envelopes, voice allocation and the sampler.

use std::sync::Arc;

use proptest::prelude::*;
use timbre_synth::sampler::{LoopMode, SampleBuffer, SampleInstrument, SamplePlayer, SampleZone};
use timbre_synth::{
    AdsrEnvelope, MidiMessage, StealPolicy, SynthParams, SynthVoice, VoiceManager, VoiceMode,
};

const SR: f32 = 48000.0;

fn steal_policy(index: usize) -> StealPolicy {
    [
        StealPolicy::Oldest,
        StealPolicy::Quietest,
        StealPolicy::Highest,
        StealPolicy::Lowest,
    ][index % 4]
}

fn voice_mode(index: usize) -> VoiceMode {
    [VoiceMode::Poly, VoiceMode::Mono, VoiceMode::Legato][index % 3]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn envelope_output_stays_in_unit_range(
        attack in 0.0f32..0.05,
        decay in 0.0f32..0.05,
        sustain in 0.0f32..=1.0,
        release in 0.0f32..0.05,
        curves in prop::array::uniform3(-1.0f32..=1.0),
        gate in 1usize..4000,
    ) {
        let mut env = AdsrEnvelope::new(SR);
        env.set_times(attack, decay, release);
        env.set_sustain(sustain);
        env.set_curves(curves[0], curves[1], curves[2]);
        env.note_on(1.0);
        for _ in 0..gate {
            let v = env.advance();
            prop_assert!((0.0..=1.0).contains(&v), "{}", v);
        }
        env.note_off();
        for _ in 0..3000 {
            let v = env.advance();
            prop_assert!((0.0..=1.0).contains(&v), "{}", v);
        }
        prop_assert!(!env.is_active());
    }

    #[test]
    fn voice_pool_bound_holds_for_any_event_stream(
        notes in prop::collection::vec((0u8..128, any::<bool>()), 1..200),
        polyphony in 1usize..12,
        unison in 1usize..5,
        policy in 0usize..4,
        mode in 0usize..3,
    ) {
        let mut mgr = VoiceManager::new(SR);
        let mut params = SynthParams::default();
        params.polyphony = polyphony;
        params.unison_count = unison;
        params.steal_policy = steal_policy(policy);
        params.voice_mode = voice_mode(mode);
        mgr.set_params(&params);
        let bound = mgr.pool_size();

        let (mut l, mut r) = ([0.0f32; 16], [0.0f32; 16]);
        for (note, on) in notes {
            let message = if on {
                MidiMessage::NoteOn { note, velocity: 0.9 }
            } else {
                MidiMessage::NoteOff { note, velocity: 0.5 }
            };
            mgr.handle_midi(&message);
            mgr.render(&mut l, &mut r);
            prop_assert!(mgr.active_voice_count() <= bound);
        }
    }

    #[test]
    fn resonant_voice_output_stays_finite(
        cutoff in 20.0f32..20000.0,
        resonance in 0.0f32..0.95,
        ladder in any::<bool>(),
        note in 24u8..108,
    ) {
        let mut params = SynthParams::default();
        params.filter.cutoff = cutoff;
        params.filter.resonance = resonance;
        if ladder {
            params.filter.mode = timbre_synth::FilterMode::Ladder(timbre_synth::LadderSlope::Db24);
        }
        let mut voice = SynthVoice::new(SR, 7);
        voice.set_params(&params);
        voice.note_on(note, 1.0, false, None);
        for _ in 0..10_000 {
            let (l, r) = voice.process_sample();
            prop_assert!(l.is_finite() && r.is_finite());
            prop_assert!(l.abs() < 32.0 && r.abs() < 32.0, "{} {}", l, r);
        }
    }

    #[test]
    fn looping_sample_voices_stay_bounded(
        loop_start in 0usize..400,
        loop_len in 8usize..400,
        fade in 0u32..200,
        note in 0u8..128,
    ) {
        let data: Vec<f32> = (0..1000).map(|i| if i % 2 == 0 { 0.9 } else { -0.9 }).collect();
        let buffer = Arc::new(SampleBuffer::mono(data, 44100.0).unwrap());
        let mut inst = SampleInstrument::new();
        let layer = inst.add_layer();
        let zone = SampleZone::new(buffer, 60).with_loop(
            LoopMode::Crossfade(fade),
            loop_start,
            loop_start + loop_len,
        );
        prop_assert!(inst.add_zone(layer, zone).is_ok());

        let mut player: SamplePlayer<2> = SamplePlayer::new(SR);
        player.set_instrument(Some(inst));
        player.note_on(note, 1.0);
        let (mut l, mut r) = ([0.0f32; 512], [0.0f32; 512]);
        for _ in 0..8 {
            l.fill(0.0);
            r.fill(0.0);
            player.render(&mut l, &mut r);
            for s in l.iter().chain(r.iter()) {
                prop_assert!(s.is_finite() && s.abs() < 4.0, "{}", s);
            }
        }
        prop_assert_eq!(player.active_voice_count(), 1);
    }
}

//! Integration tests for timbre-synth.
//!
//! Tests cover envelopes, the modulation matrix, voice allocation and
//! unison, sampler round robin, and whole-engine scenarios.

use std::sync::Arc;

use timbre_effects::EffectChain;
use timbre_synth::sampler::{SampleBuffer, SampleInstrument, SamplePlayer, SampleZone, ZoneId};
use timbre_synth::{
    AdsrEnvelope, Engine, EngineConfig, EnvelopeState, MidiEvent, MidiMessage, ModDestination,
    ModRouting, ModSource, ModulationMatrix, StealPolicy, SynthParams, VoiceManager, VoiceMode,
    unison_offsets,
};

const SR: f32 = 48000.0;

fn silent(buf: &[f32]) -> bool {
    buf.iter().all(|&s| s == 0.0)
}

// ---------------------------------------------------------------------------
// 1. Envelopes
// ---------------------------------------------------------------------------

#[test]
fn envelope_reaches_sustain_and_idle_on_time() {
    let mut env = AdsrEnvelope::new(SR);
    env.set_times(0.01, 0.01, 0.01);
    env.set_sustain(0.5);
    env.note_on(1.0);

    // 480 attack samples + 480 decay samples.
    for _ in 0..959 {
        env.advance();
    }
    assert_ne!(env.state(), EnvelopeState::Sustain);
    env.advance();
    assert_eq!(env.state(), EnvelopeState::Sustain);
    assert_eq!(env.level(), 0.5);

    env.note_off();
    for _ in 0..480 {
        env.advance();
    }
    assert_eq!(env.state(), EnvelopeState::Idle);
    assert_eq!(env.level(), 0.0);
}

#[test]
fn linear_envelope_is_monotonic_per_stage() {
    let mut env = AdsrEnvelope::new(SR);
    env.set_times(0.005, 0.02, 0.03);
    env.set_sustain(0.3);
    env.note_on(1.0);

    let mut prev = 0.0;
    while env.state() == EnvelopeState::Attack {
        let v = env.advance();
        assert!(v >= prev, "attack fell: {prev} -> {v}");
        prev = v;
    }
    while env.state() == EnvelopeState::Decay {
        let v = env.advance();
        assert!(v <= prev, "decay rose: {prev} -> {v}");
        prev = v;
    }
    env.note_off();
    while env.is_active() {
        let v = env.advance();
        assert!(v <= prev, "release rose: {prev} -> {v}");
        prev = v;
    }
    assert_eq!(prev, 0.0);
}

// ---------------------------------------------------------------------------
// 2. Modulation
// ---------------------------------------------------------------------------

#[test]
fn modulation_amounts_add() {
    let mut m = ModulationMatrix::new();
    m.add_routing(ModRouting::new(ModSource::ModWheel, ModDestination::Pan, 0.75));
    m.add_routing(ModRouting::new(ModSource::ModWheel, ModDestination::Pan, -0.25));
    m.set_source_value(ModSource::ModWheel, 0.6);
    m.process();
    assert!((m.destination_value(ModDestination::Pan) - 0.3).abs() < 1e-6);
}

// ---------------------------------------------------------------------------
// 3. Voice allocation and unison
// ---------------------------------------------------------------------------

#[test]
fn active_voices_never_exceed_polyphony_times_unison() {
    let mut mgr = VoiceManager::new(SR);
    let mut params = SynthParams::default();
    params.polyphony = 3;
    params.unison_count = 2;
    mgr.set_params(&params);

    for note in 40..80 {
        mgr.note_on(note, 0.8);
        assert!(mgr.active_voice_count() <= 6);
    }
    assert_eq!(mgr.active_voice_count(), 6);
}

#[test]
fn four_voice_unison_is_symmetric() {
    let offsets: Vec<(f32, f32)> = (0..4).map(|i| unison_offsets(i, 4, 20.0, 1.0)).collect();
    let detune_sum: f32 = offsets.iter().map(|o| o.0).sum();
    let pan_sum: f32 = offsets.iter().map(|o| o.1).sum();
    assert!(detune_sum.abs() < 1e-5);
    assert!(pan_sum.abs() < 1e-5);
    for i in 0..2 {
        assert!((offsets[i].0 + offsets[3 - i].0).abs() < 1e-5);
        assert!((offsets[i].1 + offsets[3 - i].1).abs() < 1e-5);
    }
    assert!((offsets[0].0 + 10.0).abs() < 1e-5);
    assert!((offsets[3].1 - 0.5).abs() < 1e-5);

    let mut mgr = VoiceManager::new(SR);
    let mut params = SynthParams::default();
    params.unison_count = 4;
    params.unison_detune = 20.0;
    params.unison_spread = 1.0;
    mgr.set_params(&params);
    mgr.note_on(60, 1.0);
    let mut layers: Vec<f32> = mgr
        .voices()
        .iter()
        .filter(|v| v.is_active())
        .map(|v| v.unison().detune_cents)
        .collect();
    layers.sort_by(f32::total_cmp);
    assert_eq!(layers.len(), 4);
    assert!((layers[0] + layers[3]).abs() < 1e-5);
}

#[test]
fn quietest_policy_steals_the_released_note() {
    let mut mgr = VoiceManager::new(SR);
    let mut params = SynthParams::default();
    params.polyphony = 2;
    params.steal_policy = StealPolicy::Quietest;
    params.amp_env.release = 1.0;
    mgr.set_params(&params);

    let (mut l, mut r) = ([0.0f32; 2048], [0.0f32; 2048]);
    mgr.note_on(60, 1.0);
    mgr.note_on(64, 1.0);
    mgr.render(&mut l, &mut r);
    mgr.note_off(64);
    mgr.render(&mut l, &mut r);
    mgr.note_on(67, 1.0);

    let notes: Vec<u8> = mgr
        .voices()
        .iter()
        .filter(|v| v.is_active())
        .map(|v| v.note())
        .collect();
    assert!(notes.contains(&60) && notes.contains(&67), "{notes:?}");
}

#[test]
fn sustain_pedal_defers_release_until_lifted() {
    let mut mgr = VoiceManager::new(SR);
    mgr.handle_midi(&MidiMessage::ControlChange {
        controller: 64,
        value: 1.0,
    });
    mgr.note_on(60, 1.0);
    mgr.note_off(60);
    assert!(!mgr.voices().iter().any(|v| v.is_releasing()));

    mgr.handle_midi(&MidiMessage::ControlChange {
        controller: 64,
        value: 0.0,
    });
    assert!(mgr.voices().iter().any(|v| v.is_releasing()));
}

// ---------------------------------------------------------------------------
// 4. Sampler
// ---------------------------------------------------------------------------

#[test]
fn round_robin_selects_each_zone_twice_in_order() {
    let buffer = Arc::new(SampleBuffer::mono(vec![0.5; 256], SR).unwrap());
    let mut inst = SampleInstrument::new();
    let layer = inst.add_layer();
    let ids: Vec<ZoneId> = (0..4)
        .map(|i| {
            inst.add_zone(
                layer,
                SampleZone::new(Arc::clone(&buffer), 38).with_round_robin(1, i),
            )
            .unwrap()
        })
        .collect();

    let picks: Vec<ZoneId> = (0..8)
        .map(|_| {
            let sel = inst.trigger(38, 0.7);
            assert_eq!(sel.len(), 1);
            sel.iter().next().unwrap()
        })
        .collect();
    for id in &ids {
        assert_eq!(picks.iter().filter(|p| *p == id).count(), 2);
    }
    assert_eq!(picks[..4], picks[4..]);
}

#[test]
fn sampler_swap_leaves_no_voice_on_old_zones() {
    let buffer = Arc::new(SampleBuffer::mono(vec![0.5; 48000], SR).unwrap());
    let build = |root| {
        let mut inst = SampleInstrument::new();
        let layer = inst.add_layer();
        inst.add_zone(layer, SampleZone::new(Arc::clone(&buffer), root))
            .unwrap();
        inst
    };

    let mut player: SamplePlayer<8> = SamplePlayer::new(SR);
    player.set_instrument(Some(build(60)));
    for note in [60, 62, 64] {
        player.note_on(note, 1.0);
    }
    let old = player.set_instrument(Some(build(48)));
    assert!(old.is_some());
    assert_eq!(player.active_voice_count(), 0);
    assert!(player.voices().iter().all(|v| v.zone().is_none()));

    let (mut l, mut r) = ([0.0f32; 64], [0.0f32; 64]);
    player.render(&mut l, &mut r);
    assert!(silent(&l) && silent(&r));
}

// ---------------------------------------------------------------------------
// 5. Engine scenarios
// ---------------------------------------------------------------------------

#[test]
fn single_note_block_is_audible_and_bounded() {
    let mut engine = Engine::new(EngineConfig::default());
    engine.prepare(48000.0, 512).unwrap();
    let (mut l, mut r) = (vec![0.0f32; 512], vec![0.0f32; 512]);
    engine.process(&mut l, &mut r, &[MidiEvent::note_on(0, 60, 1.0)]);

    assert!(!silent(&l) && !silent(&r));
    assert!(l.iter().chain(r.iter()).all(|s| (-1.0..=1.0).contains(s)));
}

#[test]
fn mono_mode_falls_back_to_the_held_note() {
    let mut engine = Engine::new(EngineConfig::default());
    engine.prepare(48000.0, 256).unwrap();
    let mut params = SynthParams::default();
    params.voice_mode = VoiceMode::Mono;
    engine.set_params(&params);

    let (mut l, mut r) = (vec![0.0f32; 256], vec![0.0f32; 256]);
    engine.process(
        &mut l,
        &mut r,
        &[MidiEvent::note_on(0, 60, 1.0), MidiEvent::note_on(64, 64, 1.0)],
    );
    let f = engine.mono_frequency().unwrap();
    assert!((f - 329.63).abs() < 0.5, "{f}");

    engine.process(&mut l, &mut r, &[MidiEvent::note_off(0, 64, 0.5)]);
    let f = engine.mono_frequency().unwrap();
    assert!((f - 261.63).abs() < 0.5, "{f}");
    assert!(!silent(&l));
}

#[test]
fn disabled_chain_passes_audio_through_exactly() {
    let mut chain = EffectChain::default_rack(SR);
    chain.prepare(SR, 256);
    for i in 0..chain.len() {
        chain.set_enabled(i, false);
    }
    let input_l: Vec<f32> = (0..256).map(|i| ((i * 37) % 101) as f32 / 50.0 - 1.0).collect();
    let input_r: Vec<f32> = input_l.iter().map(|s| -0.5 * s).collect();
    let (mut l, mut r) = (input_l.clone(), input_r.clone());
    chain.process(&mut l, &mut r);
    assert_eq!(l, input_l);
    assert_eq!(r, input_r);
}

#[test]
fn engine_sampler_and_synth_share_the_block() {
    let mut engine = Engine::new(EngineConfig::default());
    engine.prepare(48000.0, 128).unwrap();
    let buffer = Arc::new(SampleBuffer::stereo(vec![0.25; 4800], vec![-0.25; 4800], SR).unwrap());
    let mut inst = SampleInstrument::new();
    let layer = inst.add_layer();
    inst.add_zone(layer, SampleZone::new(buffer, 60).with_keys(72, 84))
        .unwrap();
    engine.sampler_mut().set_instrument(Some(inst));

    let (mut l, mut r) = (vec![0.0f32; 128], vec![0.0f32; 128]);
    engine.process(
        &mut l,
        &mut r,
        &[MidiEvent::note_on(0, 48, 1.0), MidiEvent::note_on(0, 72, 1.0)],
    );
    // Both notes reach the synth; only 72 falls inside the zone.
    assert_eq!(engine.active_voice_count(), 2);
    assert_eq!(engine.sampler().active_voice_count(), 1);
    assert!(!silent(&l));
}

#[cfg(feature = "serde")]
#[test]
fn params_round_trip_through_json() {
    let mut params = SynthParams::default();
    params.voice_mode = VoiceMode::Legato;
    params.routings.push(ModRouting::new(
        ModSource::Lfo1,
        ModDestination::FilterCutoff,
        0.5,
    ));
    let json = serde_json::to_string(&params).unwrap();
    let back: SynthParams = serde_json::from_str(&json).unwrap();
    assert_eq!(back, params);
}

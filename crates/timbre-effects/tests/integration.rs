//! Whole-rack behaviour: ordering, enabling and tempo forwarding.

use timbre_core::{Effect, NoteDivision};
use timbre_effects::{Delay, EffectChain, EffectKind, EffectType, Reverb};

const SR: f32 = 48000.0;

fn impulse(len: usize) -> (Vec<f32>, Vec<f32>) {
    let mut left = vec![0.0; len];
    left[0] = 1.0;
    (left.clone(), left)
}

#[test]
fn enabling_one_effect_changes_only_its_contribution() {
    let mut chain = EffectChain::default_rack(SR);
    chain.prepare(SR, 4096);
    let idx = chain.find(EffectType::Delay).unwrap();
    chain.set_enabled(idx, true);
    {
        let delay = chain.get_mut(idx).and_then(EffectKind::as_delay_mut).unwrap();
        delay.set_time_ms(10.0);
        delay.set_feedback(0.0);
        delay.set_mix(1.0);
        delay.reset();
    }

    let (mut left, mut right) = impulse(4096);
    chain.process(&mut left, &mut right);
    assert!((left[480] - 1.0).abs() < 1e-6);
    assert_eq!(left.iter().filter(|s| s.abs() > 1e-6).count(), 1);
}

#[test]
fn tempo_reaches_synced_delay_through_the_chain() {
    let mut chain = EffectChain::default_rack(SR);
    let idx = chain.find(EffectType::Delay).unwrap();
    chain
        .get_mut(idx)
        .and_then(EffectKind::as_delay_mut)
        .unwrap()
        .set_sync(Some(NoteDivision::Sixteenth));
    chain.set_tempo(Some(150.0));
    let delay = chain.get(idx).and_then(EffectKind::as_delay).unwrap();
    assert!((delay.left_time_ms() - 100.0).abs() < 0.01);
}

#[test]
fn block_size_does_not_change_the_result() {
    let mut a = EffectChain::new(SR);
    let mut reverb = Reverb::new(SR);
    reverb.set_mix(0.5);
    a.push(EffectKind::Reverb(reverb), true).unwrap();
    a.push(EffectKind::Delay(Delay::new(SR)), true).unwrap();
    a.prepare(SR, 1024);
    let mut b = a.clone();

    let source: Vec<f32> = (0..1024).map(|i| ((i * 7919) % 200) as f32 / 100.0 - 1.0).collect();

    let (mut la, mut ra) = (source.clone(), source.clone());
    a.process(&mut la, &mut ra);

    let (mut lb, mut rb) = (source.clone(), source);
    for (l, r) in lb.chunks_mut(100).zip(rb.chunks_mut(100)) {
        b.process(l, r);
    }
    assert_eq!(la, lb);
    assert_eq!(ra, rb);
}

#[test]
fn reverb_latency_is_reported_when_enabled() {
    let mut chain = EffectChain::default_rack(SR);
    let idx = chain.find(EffectType::Reverb).unwrap();
    chain
        .get_mut(idx)
        .and_then(EffectKind::as_reverb_mut)
        .unwrap()
        .set_predelay_ms(10.0);
    assert_eq!(chain.latency_samples(), 0);
    chain.set_enabled(idx, true);
    assert_eq!(chain.latency_samples(), 480);
}

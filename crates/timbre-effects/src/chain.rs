//! The FX rack: a fixed-capacity, reorderable series of effects.
//!
//! Effects are held as [`EffectKind`], a closed enum over every effect in the
//! crate. Dispatch is one `match` per call, and typed access for parameter
//! wiring goes through accessors such as [`EffectKind::as_reverb_mut`] rather
//! than trait-object downcasts.
//!
//! Disabled slots are skipped entirely. A chain with every slot disabled
//! leaves the buffers bit-for-bit untouched.

use timbre_core::{Effect, ParamDescriptor, ParameterInfo};

use crate::{Chorus, Compressor, Delay, Distortion, Flanger, Reverb, ThreeBandEq};

/// Most effects a chain can hold.
pub const MAX_EFFECTS: usize = 8;

/// Discriminant of [`EffectKind`], for lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EffectType {
    /// [`Reverb`]
    Reverb,
    /// [`Delay`]
    Delay,
    /// [`Chorus`]
    Chorus,
    /// [`Flanger`]
    Flanger,
    /// [`Distortion`]
    Distortion,
    /// [`Compressor`]
    Compressor,
    /// [`ThreeBandEq`]
    Eq,
}

impl EffectType {
    /// Display name.
    pub const fn name(self) -> &'static str {
        match self {
            EffectType::Reverb => "Reverb",
            EffectType::Delay => "Delay",
            EffectType::Chorus => "Chorus",
            EffectType::Flanger => "Flanger",
            EffectType::Distortion => "Distortion",
            EffectType::Compressor => "Compressor",
            EffectType::Eq => "EQ",
        }
    }

    /// A freshly constructed effect of this type.
    pub fn instantiate(self, sample_rate: f32) -> EffectKind {
        match self {
            EffectType::Reverb => EffectKind::Reverb(Reverb::new(sample_rate)),
            EffectType::Delay => EffectKind::Delay(Delay::new(sample_rate)),
            EffectType::Chorus => EffectKind::Chorus(Chorus::new(sample_rate)),
            EffectType::Flanger => EffectKind::Flanger(Flanger::new(sample_rate)),
            EffectType::Distortion => EffectKind::Distortion(Distortion::new(sample_rate)),
            EffectType::Compressor => EffectKind::Compressor(Compressor::new(sample_rate)),
            EffectType::Eq => EffectKind::Eq(ThreeBandEq::new(sample_rate)),
        }
    }
}

/// One effect of any supported type.
#[derive(Debug, Clone)]
pub enum EffectKind {
    /// Freeverb-style reverb
    Reverb(Reverb),
    /// Ping-pong delay
    Delay(Delay),
    /// Stereo chorus
    Chorus(Chorus),
    /// Stereo flanger
    Flanger(Flanger),
    /// Waveshaper
    Distortion(Distortion),
    /// Compressor
    Compressor(Compressor),
    /// Three-band EQ
    Eq(ThreeBandEq),
}

macro_rules! dispatch {
    ($self:expr, $fx:ident => $body:expr) => {
        match $self {
            EffectKind::Reverb($fx) => $body,
            EffectKind::Delay($fx) => $body,
            EffectKind::Chorus($fx) => $body,
            EffectKind::Flanger($fx) => $body,
            EffectKind::Distortion($fx) => $body,
            EffectKind::Compressor($fx) => $body,
            EffectKind::Eq($fx) => $body,
        }
    };
}

macro_rules! accessors {
    ($($variant:ident, $ty:ty, $get:ident, $get_mut:ident;)*) => {
        $(
            #[doc = concat!("The inner [`", stringify!($ty), "`], if this is one.")]
            pub fn $get(&self) -> Option<&$ty> {
                match self {
                    EffectKind::$variant(fx) => Some(fx),
                    _ => None,
                }
            }

            #[doc = concat!("Mutable access to the inner [`", stringify!($ty), "`].")]
            pub fn $get_mut(&mut self) -> Option<&mut $ty> {
                match self {
                    EffectKind::$variant(fx) => Some(fx),
                    _ => None,
                }
            }
        )*
    };
}

impl EffectKind {
    /// Which effect this is.
    pub fn effect_type(&self) -> EffectType {
        match self {
            EffectKind::Reverb(_) => EffectType::Reverb,
            EffectKind::Delay(_) => EffectType::Delay,
            EffectKind::Chorus(_) => EffectType::Chorus,
            EffectKind::Flanger(_) => EffectType::Flanger,
            EffectKind::Distortion(_) => EffectType::Distortion,
            EffectKind::Compressor(_) => EffectType::Compressor,
            EffectKind::Eq(_) => EffectType::Eq,
        }
    }

    /// Forward the host tempo to the effects that sync to it.
    pub fn set_tempo(&mut self, bpm: Option<f32>) {
        if let EffectKind::Delay(delay) = self {
            delay.set_tempo(bpm);
        }
    }

    accessors! {
        Reverb, Reverb, as_reverb, as_reverb_mut;
        Delay, Delay, as_delay, as_delay_mut;
        Chorus, Chorus, as_chorus, as_chorus_mut;
        Flanger, Flanger, as_flanger, as_flanger_mut;
        Distortion, Distortion, as_distortion, as_distortion_mut;
        Compressor, Compressor, as_compressor, as_compressor_mut;
        Eq, ThreeBandEq, as_eq, as_eq_mut;
    }
}

impl Effect for EffectKind {
    #[inline]
    fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
        dispatch!(self, fx => fx.process_stereo(left, right))
    }

    fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        dispatch!(self, fx => fx.process_block(left, right))
    }

    fn prepare(&mut self, sample_rate: f32, max_block_size: usize) {
        dispatch!(self, fx => fx.prepare(sample_rate, max_block_size))
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        dispatch!(self, fx => fx.set_sample_rate(sample_rate))
    }

    fn reset(&mut self) {
        dispatch!(self, fx => fx.reset())
    }

    fn mix(&self) -> f32 {
        dispatch!(self, fx => fx.mix())
    }

    fn set_mix(&mut self, mix: f32) {
        dispatch!(self, fx => fx.set_mix(mix))
    }

    fn latency_samples(&self) -> usize {
        dispatch!(self, fx => fx.latency_samples())
    }
}

impl ParameterInfo for EffectKind {
    fn param_count(&self) -> usize {
        dispatch!(self, fx => fx.param_count())
    }

    fn param_info(&self, index: usize) -> Option<ParamDescriptor> {
        dispatch!(self, fx => fx.param_info(index))
    }

    fn get_param(&self, index: usize) -> f32 {
        dispatch!(self, fx => fx.get_param(index))
    }

    fn set_param(&mut self, index: usize, value: f32) {
        dispatch!(self, fx => fx.set_param(index, value))
    }
}

/// A rack slot.
#[derive(Debug, Clone)]
pub struct EffectSlot {
    /// The effect
    pub kind: EffectKind,
    /// Whether the effect runs
    pub enabled: bool,
}

/// Error returned when a chain is already at [`MAX_EFFECTS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainFull;

impl core::fmt::Display for ChainFull {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "effect chain is full ({MAX_EFFECTS} slots)")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ChainFull {}

/// Ordered series of effects.
///
/// # Example
///
/// ```rust
/// use timbre_effects::{EffectChain, EffectType};
///
/// let mut chain = EffectChain::default_rack(48000.0);
/// chain.prepare(48000.0, 256);
///
/// let reverb = chain.find(EffectType::Reverb).unwrap();
/// chain.set_enabled(reverb, true);
/// if let Some(r) = chain.get_mut(reverb).and_then(|fx| fx.as_reverb_mut()) {
///     r.set_room_size(0.9);
/// }
///
/// let mut left = vec![0.0; 256];
/// let mut right = vec![0.0; 256];
/// left[0] = 1.0;
/// chain.process(&mut left, &mut right);
/// ```
#[derive(Debug, Clone)]
pub struct EffectChain {
    slots: storage::Slots,
    sample_rate: f32,
    max_block: usize,
}

/// Inline slot storage: no allocation when effects are added or moved.
mod storage {
    use super::{EffectSlot, MAX_EFFECTS};

    #[derive(Debug, Clone)]
    pub struct Slots {
        items: [Option<EffectSlot>; MAX_EFFECTS],
        len: usize,
    }

    impl Slots {
        pub fn new() -> Self {
            Self {
                items: core::array::from_fn(|_| None),
                len: 0,
            }
        }

        pub fn len(&self) -> usize {
            self.len
        }

        pub fn push(&mut self, slot: EffectSlot) -> Result<usize, EffectSlot> {
            if self.len == MAX_EFFECTS {
                return Err(slot);
            }
            self.items[self.len] = Some(slot);
            self.len += 1;
            Ok(self.len - 1)
        }

        pub fn remove(&mut self, index: usize) -> Option<EffectSlot> {
            if index >= self.len {
                return None;
            }
            let removed = self.items[index].take();
            self.items[index..self.len].rotate_left(1);
            self.len -= 1;
            removed
        }

        pub fn move_item(&mut self, from: usize, to: usize) {
            if from < to {
                self.items[from..=to].rotate_left(1);
            } else if to < from {
                self.items[to..=from].rotate_right(1);
            }
        }

        pub fn swap(&mut self, a: usize, b: usize) {
            self.items.swap(a, b);
        }

        pub fn get(&self, index: usize) -> Option<&EffectSlot> {
            self.items.get(..self.len)?.get(index)?.as_ref()
        }

        pub fn get_mut(&mut self, index: usize) -> Option<&mut EffectSlot> {
            let len = self.len;
            self.items.get_mut(..len)?.get_mut(index)?.as_mut()
        }

        pub fn iter(&self) -> impl Iterator<Item = &EffectSlot> {
            self.items[..self.len].iter().flatten()
        }

        pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut EffectSlot> {
            self.items[..self.len].iter_mut().flatten()
        }
    }
}

impl EffectChain {
    /// An empty chain.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            slots: storage::Slots::new(),
            sample_rate,
            max_block: 0,
        }
    }

    /// All seven effects in the standard order (Distortion, Chorus, Flanger,
    /// Delay, Reverb, Compressor, EQ), every one disabled.
    pub fn default_rack(sample_rate: f32) -> Self {
        let mut chain = Self::new(sample_rate);
        for effect_type in [
            EffectType::Distortion,
            EffectType::Chorus,
            EffectType::Flanger,
            EffectType::Delay,
            EffectType::Reverb,
            EffectType::Compressor,
            EffectType::Eq,
        ] {
            let pushed = chain.slots.push(EffectSlot {
                kind: effect_type.instantiate(sample_rate),
                enabled: false,
            });
            debug_assert!(pushed.is_ok());
        }
        chain
    }

    /// Configure every effect. Configuration-time only.
    pub fn prepare(&mut self, sample_rate: f32, max_block: usize) {
        self.sample_rate = sample_rate;
        self.max_block = max_block;
        for slot in self.slots.iter_mut() {
            slot.kind.prepare(sample_rate, max_block);
            slot.kind.reset();
        }
    }

    /// Append an effect, returning its index.
    pub fn push(&mut self, mut kind: EffectKind, enabled: bool) -> Result<usize, ChainFull> {
        kind.prepare(self.sample_rate, self.max_block);
        self.slots
            .push(EffectSlot { kind, enabled })
            .map_err(|_| ChainFull)
    }

    /// Remove and return the effect at `index`; later slots shift down.
    pub fn remove(&mut self, index: usize) -> Option<EffectSlot> {
        self.slots.remove(index)
    }

    /// Number of slots in use.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if the chain holds no effects.
    pub fn is_empty(&self) -> bool {
        self.slots.len() == 0
    }

    /// Run every enabled effect over the block, in slot order.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        debug_assert_eq!(left.len(), right.len());
        for slot in self.slots.iter_mut().filter(|s| s.enabled) {
            slot.kind.process_block(left, right);
        }
    }

    /// Clear every effect's state.
    pub fn reset(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.kind.reset();
        }
    }

    /// Enable or disable the slot at `index`. Out-of-range indices are ignored.
    pub fn set_enabled(&mut self, index: usize, enabled: bool) {
        if let Some(slot) = self.slots.get_mut(index) {
            if enabled && !slot.enabled {
                // Stale tails from the last time it ran must not leak in.
                slot.kind.reset();
            }
            slot.enabled = enabled;
        }
    }

    /// Whether the slot at `index` is enabled.
    pub fn is_enabled(&self, index: usize) -> bool {
        self.slots.get(index).is_some_and(|s| s.enabled)
    }

    /// Move the effect at `from` to position `to`, shifting the ones between.
    ///
    /// Returns false if either index is out of range.
    pub fn move_effect(&mut self, from: usize, to: usize) -> bool {
        let len = self.slots.len();
        if from >= len || to >= len {
            return false;
        }
        self.slots.move_item(from, to);
        #[cfg(feature = "tracing")]
        tracing::debug!(from, to, "moved effect");
        true
    }

    /// Exchange two slots. Returns false if either index is out of range.
    pub fn swap(&mut self, a: usize, b: usize) -> bool {
        let len = self.slots.len();
        if a >= len || b >= len {
            return false;
        }
        self.slots.swap(a, b);
        true
    }

    /// Index of the first slot holding an effect of `effect_type`.
    pub fn find(&self, effect_type: EffectType) -> Option<usize> {
        (0..self.slots.len()).find(|&i| {
            self.slots
                .get(i)
                .is_some_and(|s| s.kind.effect_type() == effect_type)
        })
    }

    /// The effect at `index`.
    pub fn get(&self, index: usize) -> Option<&EffectKind> {
        self.slots.get(index).map(|s| &s.kind)
    }

    /// Mutable access to the effect at `index`.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut EffectKind> {
        self.slots.get_mut(index).map(|s| &mut s.kind)
    }

    /// Effect types in slot order.
    pub fn order(&self) -> impl Iterator<Item = EffectType> + '_ {
        self.slots.iter().map(|s| s.kind.effect_type())
    }

    /// Forward the host tempo to every effect.
    pub fn set_tempo(&mut self, bpm: Option<f32>) {
        for slot in self.slots.iter_mut() {
            slot.kind.set_tempo(bpm);
        }
    }

    /// Total latency of the enabled effects, in samples.
    pub fn latency_samples(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.enabled)
            .map(|s| s.kind.latency_samples())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noise(len: usize, seed: u32) -> Vec<f32> {
        let mut rng = timbre_core::XorShift32::new(seed);
        (0..len).map(|_| rng.next_bipolar()).collect()
    }

    #[test]
    fn default_rack_order_and_state() {
        let chain = EffectChain::default_rack(48000.0);
        let order: Vec<_> = chain.order().collect();
        assert_eq!(
            order,
            vec![
                EffectType::Distortion,
                EffectType::Chorus,
                EffectType::Flanger,
                EffectType::Delay,
                EffectType::Reverb,
                EffectType::Compressor,
                EffectType::Eq,
            ]
        );
        assert!((0..chain.len()).all(|i| !chain.is_enabled(i)));
    }

    #[test]
    fn all_disabled_is_exact_passthrough() {
        let mut chain = EffectChain::default_rack(48000.0);
        chain.prepare(48000.0, 512);
        let left_in = noise(512, 1);
        let right_in = noise(512, 2);
        let mut left = left_in.clone();
        let mut right = right_in.clone();
        chain.process(&mut left, &mut right);
        assert_eq!(left, left_in);
        assert_eq!(right, right_in);
    }

    #[test]
    fn move_effect_shifts_neighbours() {
        let mut chain = EffectChain::default_rack(48000.0);
        assert!(chain.move_effect(4, 0));
        let order: Vec<_> = chain.order().collect();
        assert_eq!(order[0], EffectType::Reverb);
        assert_eq!(order[1], EffectType::Distortion);
        assert_eq!(order[4], EffectType::Delay);
        assert_eq!(chain.find(EffectType::Reverb), Some(0));
        assert!(!chain.move_effect(0, 7));
    }

    #[test]
    fn swap_and_find() {
        let mut chain = EffectChain::default_rack(48000.0);
        assert!(chain.swap(0, 6));
        assert_eq!(chain.find(EffectType::Eq), Some(0));
        assert_eq!(chain.find(EffectType::Distortion), Some(6));
    }

    #[test]
    fn order_changes_the_result() {
        let mut a = EffectChain::new(48000.0);
        let mut dist = Distortion::new(48000.0);
        dist.set_drive_db(30.0);
        a.push(EffectKind::Distortion(dist), true).unwrap();
        let mut eq = ThreeBandEq::new(48000.0);
        eq.set_high_gain_db(18.0);
        a.push(EffectKind::Eq(eq), true).unwrap();
        a.prepare(48000.0, 256);

        let mut b = a.clone();
        b.swap(0, 1);

        let input = noise(256, 7);
        let (mut la, mut ra) = (input.clone(), input.clone());
        let (mut lb, mut rb) = (input.clone(), input);
        a.process(&mut la, &mut ra);
        b.process(&mut lb, &mut rb);
        assert_ne!(la, lb);
    }

    #[test]
    fn accessors_match_variant() {
        let mut chain = EffectChain::default_rack(48000.0);
        let idx = chain.find(EffectType::Delay).unwrap();
        assert!(chain.get_mut(idx).unwrap().as_delay_mut().is_some());
        assert!(chain.get(idx).unwrap().as_reverb().is_none());
    }

    #[test]
    fn capacity_is_enforced() {
        let mut chain = EffectChain::default_rack(48000.0);
        assert!(chain.push(EffectType::Delay.instantiate(48000.0), false).is_ok());
        assert_eq!(
            chain.push(EffectType::Delay.instantiate(48000.0), false),
            Err(ChainFull)
        );
        assert_eq!(chain.len(), MAX_EFFECTS);
        assert!(chain.remove(0).is_some());
        assert_eq!(chain.len(), MAX_EFFECTS - 1);
    }

    #[test]
    fn generic_params_reach_the_effect() {
        let mut fx = EffectType::Reverb.instantiate(48000.0);
        let idx = fx.find_param_by_name("Room Size").unwrap();
        fx.set_param(idx, 0.9);
        assert_eq!(fx.as_reverb().unwrap().room_size(), 0.9);
    }
}

//! Zone arena, layers and round-robin selection.
//!
//! A [`SampleInstrument`] owns every zone in one `Vec`. Layers and
//! playing voices refer to zones by [`ZoneId`], an index into that
//! arena, never by reference. Swapping the instrument out of a
//! [`SamplePlayer`](super::SamplePlayer) releases its voices first, so
//! an id is never resolved against the wrong arena.

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(feature = "std")]
extern crate std as alloc;

use alloc::vec::Vec;

use super::zone::SampleZone;
use crate::error::SampleError;

/// Independent round-robin counters per instrument.
pub const RR_GROUPS: usize = 16;

/// Most zones one trigger can start.
pub const MAX_SELECTED: usize = 8;

/// Handle of a zone inside its instrument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZoneId(u32);

impl ZoneId {
    pub(crate) const fn from_index(index: u32) -> Self {
        Self(index)
    }

    /// Arena index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Zones chosen for one note, without allocation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ZoneSelection {
    ids: [Option<ZoneId>; MAX_SELECTED],
    len: usize,
}

impl ZoneSelection {
    fn push(&mut self, id: ZoneId) {
        if self.len < MAX_SELECTED {
            self.ids[self.len] = Some(id);
            self.len += 1;
        }
    }

    /// Number of zones chosen.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Nothing matched.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Chosen zones in layer order.
    pub fn iter(&self) -> impl Iterator<Item = ZoneId> + '_ {
        self.ids[..self.len].iter().flatten().copied()
    }
}

/// A set of zones that sound together.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SampleLayer {
    zones: Vec<ZoneId>,
}

impl SampleLayer {
    /// Zones in this layer.
    pub fn zones(&self) -> &[ZoneId] {
        &self.zones
    }

    /// Add to `out` the zones of this layer that answer `note` and
    /// `velocity`.
    ///
    /// Zones in a round-robin group take turns: with indices `0..=m`
    /// in the group, only index `counters[group] % (m + 1)` plays.
    pub fn select(
        &self,
        zones: &[SampleZone],
        note: u8,
        velocity: u8,
        counters: &[u32; RR_GROUPS],
        out: &mut ZoneSelection,
    ) {
        for &id in &self.zones {
            let zone = &zones[id.index()];
            if !zone.contains(note, velocity) {
                continue;
            }
            let group = usize::from(zone.rr_group) % RR_GROUPS;
            let span = self.round_robin_span(zones, group, note, velocity);
            if u32::from(zone.rr_index) == counters[group] % span {
                out.push(id);
            }
        }
    }

    /// Number of round-robin slots competing in `group`.
    fn round_robin_span(&self, zones: &[SampleZone], group: usize, note: u8, velocity: u8) -> u32 {
        self.zones
            .iter()
            .map(|id| &zones[id.index()])
            .filter(|z| usize::from(z.rr_group) % RR_GROUPS == group && z.contains(note, velocity))
            .map(|z| u32::from(z.rr_index) + 1)
            .max()
            .unwrap_or(1)
    }
}

/// Layers of zones plus round-robin state.
///
/// ```rust
/// use std::sync::Arc;
/// use timbre_synth::sampler::{SampleBuffer, SampleInstrument, SampleZone};
///
/// let hit = Arc::new(SampleBuffer::mono(vec![0.5; 64], 48000.0).unwrap());
/// let mut kit = SampleInstrument::new();
/// let layer = kit.add_layer();
/// let a = kit
///     .add_zone(layer, SampleZone::new(Arc::clone(&hit), 38).with_round_robin(0, 0))
///     .unwrap();
/// let b = kit
///     .add_zone(layer, SampleZone::new(hit, 38).with_round_robin(0, 1))
///     .unwrap();
///
/// let first: Vec<_> = kit.trigger(38, 0.8).iter().collect();
/// let second: Vec<_> = kit.trigger(38, 0.8).iter().collect();
/// assert_eq!(first, vec![a]);
/// assert_eq!(second, vec![b]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct SampleInstrument {
    zones: Vec<SampleZone>,
    layers: Vec<SampleLayer>,
    counters: [u32; RR_GROUPS],
}

impl SampleInstrument {
    /// Empty instrument.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an empty layer and return its index.
    pub fn add_layer(&mut self) -> usize {
        self.layers.push(SampleLayer::default());
        self.layers.len() - 1
    }

    /// Validate `zone` and add it to `layer`.
    pub fn add_zone(&mut self, layer: usize, zone: SampleZone) -> Result<ZoneId, SampleError> {
        zone.validate()?;
        let Some(target) = self.layers.get_mut(layer) else {
            return Err(SampleError::NoSuchLayer(layer));
        };
        let id = ZoneId::from_index(self.zones.len() as u32);
        self.zones.push(zone);
        target.zones.push(id);
        Ok(id)
    }

    /// Zone for `id`.
    pub fn zone(&self, id: ZoneId) -> Option<&SampleZone> {
        self.zones.get(id.index())
    }

    /// Every zone, indexed by [`ZoneId::index`].
    pub fn zones(&self) -> &[SampleZone] {
        &self.zones
    }

    /// Every layer.
    pub fn layers(&self) -> &[SampleLayer] {
        &self.layers
    }

    /// Pick the zones for a note and advance the round-robin counters of
    /// every group that took part. `velocity` is 0..=1.
    pub fn trigger(&mut self, note: u8, velocity: f32) -> ZoneSelection {
        let velocity = midi_velocity(velocity);
        let mut selection = ZoneSelection::default();
        for layer in &self.layers {
            layer.select(&self.zones, note, velocity, &self.counters, &mut selection);
        }

        let mut used = 0u32;
        for layer in &self.layers {
            for id in &layer.zones {
                let zone = &self.zones[id.index()];
                if zone.contains(note, velocity) {
                    used |= 1 << (usize::from(zone.rr_group) % RR_GROUPS);
                }
            }
        }
        for (group, counter) in self.counters.iter_mut().enumerate() {
            if used & (1 << group) != 0 {
                *counter = counter.wrapping_add(1);
            }
        }
        selection
    }

    /// Restart every round-robin sequence.
    pub fn reset_round_robin(&mut self) {
        self.counters = [0; RR_GROUPS];
    }
}

/// Normalised velocity to MIDI units, never zero.
fn midi_velocity(velocity: f32) -> u8 {
    let v = if velocity.is_finite() { velocity } else { 1.0 };
    libm::roundf(v.clamp(0.0, 1.0) * 127.0).max(1.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::zone::SampleBuffer;
    use alloc::sync::Arc;
    use alloc::vec;

    fn buffer() -> Arc<SampleBuffer> {
        Arc::new(SampleBuffer::mono(vec![0.0; 32], 48000.0).unwrap())
    }

    #[test]
    fn round_robin_cycles_deterministically() {
        let b = buffer();
        let mut inst = SampleInstrument::new();
        let layer = inst.add_layer();
        let ids: Vec<ZoneId> = (0..3)
            .map(|i| {
                inst.add_zone(layer, SampleZone::new(Arc::clone(&b), 60).with_round_robin(2, i))
                    .unwrap()
            })
            .collect();

        let picked: Vec<ZoneId> = (0..6)
            .flat_map(|_| inst.trigger(60, 1.0).iter().collect::<Vec<_>>())
            .collect();
        assert_eq!(picked, vec![ids[0], ids[1], ids[2], ids[0], ids[1], ids[2]]);
    }

    #[test]
    fn velocity_splits_pick_one_zone() {
        let b = buffer();
        let mut inst = SampleInstrument::new();
        let layer = inst.add_layer();
        let soft = inst
            .add_zone(layer, SampleZone::new(Arc::clone(&b), 60).with_velocities(1, 63))
            .unwrap();
        let hard = inst
            .add_zone(layer, SampleZone::new(b, 60).with_velocities(64, 127))
            .unwrap();
        assert_eq!(inst.trigger(60, 0.2).iter().collect::<Vec<_>>(), vec![soft]);
        assert_eq!(inst.trigger(60, 0.9).iter().collect::<Vec<_>>(), vec![hard]);
    }

    #[test]
    fn layers_stack_and_misses_are_empty() {
        let b = buffer();
        let mut inst = SampleInstrument::new();
        let body = inst.add_layer();
        let click = inst.add_layer();
        inst.add_zone(body, SampleZone::new(Arc::clone(&b), 60).with_keys(36, 84))
            .unwrap();
        inst.add_zone(click, SampleZone::new(b, 60).with_keys(36, 84))
            .unwrap();
        assert_eq!(inst.trigger(60, 0.5).len(), 2);
        assert!(inst.trigger(20, 0.5).is_empty());
    }

    #[test]
    fn bad_layer_is_rejected() {
        let mut inst = SampleInstrument::new();
        assert_eq!(
            inst.add_zone(3, SampleZone::new(buffer(), 60)).unwrap_err(),
            SampleError::NoSuchLayer(3)
        );
    }
}

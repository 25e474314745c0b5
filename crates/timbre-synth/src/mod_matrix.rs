//! Per-voice modulation matrix.
//!
//! A fixed table of routings from named sources to named destinations.
//! The owning voice writes every live source once per sample with
//! [`ModulationMatrix::set_source_value`], calls
//! [`ModulationMatrix::process`], then reads each destination. Routings
//! to the same destination add.
//!
//! A routing may name a second "via" source that scales its depth, e.g.
//! the mod wheel opening up LFO vibrato:
//!
//! ```rust
//! use timbre_synth::{ModDestination, ModRouting, ModSource, ModulationMatrix};
//!
//! let mut matrix = ModulationMatrix::new();
//! matrix.add_routing(
//!     ModRouting::new(ModSource::Lfo1, ModDestination::Osc1Pitch, 0.05)
//!         .with_via(ModSource::ModWheel, 1.0),
//! );
//!
//! matrix.set_source_value(ModSource::Lfo1, 1.0);
//! matrix.set_source_value(ModSource::ModWheel, 0.0);
//! matrix.process();
//! assert_eq!(matrix.destination_value(ModDestination::Osc1Pitch), 0.0);
//!
//! matrix.set_source_value(ModSource::ModWheel, 1.0);
//! matrix.process();
//! assert!((matrix.destination_value(ModDestination::Osc1Pitch) - 0.05).abs() < 1e-6);
//! ```

/// Most routings one matrix holds.
pub const MAX_ROUTINGS: usize = 32;

/// Modulation sources.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ModSource {
    /// LFO 1, -1..1
    Lfo1,
    /// LFO 2, -1..1
    Lfo2,
    /// Amplitude envelope, 0..1
    AmpEnv,
    /// Filter envelope, 0..1
    FilterEnv,
    /// Auxiliary envelope, 0..1
    AuxEnv,
    /// Note-on velocity, 0..1
    Velocity,
    /// Note number, -1..1 around middle C
    KeyTrack,
    /// Mod wheel (CC1), 0..1
    ModWheel,
    /// Pitch wheel, -1..1
    PitchBend,
    /// Channel or key pressure, 0..1
    Aftertouch,
    /// Random value drawn at note-on, -1..1
    Noise,
}

impl ModSource {
    /// Number of sources.
    pub const COUNT: usize = 11;

    /// Every source, in index order.
    pub const ALL: [ModSource; Self::COUNT] = [
        ModSource::Lfo1,
        ModSource::Lfo2,
        ModSource::AmpEnv,
        ModSource::FilterEnv,
        ModSource::AuxEnv,
        ModSource::Velocity,
        ModSource::KeyTrack,
        ModSource::ModWheel,
        ModSource::PitchBend,
        ModSource::Aftertouch,
        ModSource::Noise,
    ];

    /// Dense index for table storage.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Whether the source swings negative.
    pub const fn is_bipolar(self) -> bool {
        matches!(
            self,
            ModSource::Lfo1
                | ModSource::Lfo2
                | ModSource::KeyTrack
                | ModSource::PitchBend
                | ModSource::Noise
        )
    }
}

/// Modulation destinations.
///
/// Values are unitless sums of `amount * source`; the voice decides the
/// scaling (pitch is in octaves, cutoff in units of four octaves, levels
/// and pan are additive offsets).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ModDestination {
    /// Oscillator 1 pitch
    Osc1Pitch,
    /// Oscillator 2 pitch
    Osc2Pitch,
    /// Oscillator 1 level
    Osc1Level,
    /// Oscillator 2 level
    Osc2Level,
    /// Noise level
    NoiseLevel,
    /// Pulse width of both oscillators
    PulseWidth,
    /// Wavetable position of both oscillators
    TablePosition,
    /// Filter cutoff
    FilterCutoff,
    /// Filter resonance
    FilterResonance,
    /// Output level
    Amp,
    /// Stereo position
    Pan,
    /// LFO 1 rate
    Lfo1Rate,
    /// LFO 2 rate
    Lfo2Rate,
}

impl ModDestination {
    /// Number of destinations.
    pub const COUNT: usize = 13;

    /// Dense index for table storage.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// How a source value enters a routing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Polarity {
    /// Use the source as it is
    #[default]
    Bipolar,
    /// Fold bipolar sources into 0..1 first
    Unipolar,
}

/// One source-to-destination connection.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModRouting {
    /// Where the value comes from
    pub source: ModSource,
    /// Where it goes
    pub destination: ModDestination,
    /// Signed depth
    pub amount: f32,
    /// Source conversion
    pub polarity: Polarity,
    /// Optional source scaling the depth
    pub via: Option<ModSource>,
    /// How much `via` controls the depth, 0..1
    pub via_amount: f32,
}

impl ModRouting {
    /// Bipolar routing without a via source.
    pub fn new(source: ModSource, destination: ModDestination, amount: f32) -> Self {
        Self {
            source,
            destination,
            amount: sanitize_amount(amount),
            polarity: Polarity::Bipolar,
            via: None,
            via_amount: 0.0,
        }
    }

    /// Same routing with a different polarity.
    pub fn with_polarity(mut self, polarity: Polarity) -> Self {
        self.polarity = polarity;
        self
    }

    /// Scale the depth by `via`. At `via_amount = 1` the depth follows
    /// the via source fully; at 0 the via source is ignored.
    pub fn with_via(mut self, via: ModSource, via_amount: f32) -> Self {
        self.via = Some(via);
        self.via_amount = if via_amount.is_finite() {
            via_amount.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    #[inline]
    fn source_value(&self, sources: &[f32; ModSource::COUNT]) -> f32 {
        let raw = sources[self.source.index()];
        match self.polarity {
            Polarity::Unipolar if self.source.is_bipolar() => (raw + 1.0) * 0.5,
            _ => raw,
        }
    }

    #[inline]
    fn depth(&self, sources: &[f32; ModSource::COUNT]) -> f32 {
        match self.via {
            Some(via) => {
                let v = sources[via.index()];
                self.amount * (1.0 - self.via_amount + self.via_amount * v)
            }
            None => self.amount,
        }
    }
}

fn sanitize_amount(amount: f32) -> f32 {
    if amount.is_finite() {
        amount.clamp(-4.0, 4.0)
    } else {
        0.0
    }
}

/// Fixed-capacity modulation matrix.
#[derive(Debug, Clone)]
pub struct ModulationMatrix {
    routings: [Option<ModRouting>; MAX_ROUTINGS],
    count: usize,
    sources: [f32; ModSource::COUNT],
    destinations: [f32; ModDestination::COUNT],
}

impl Default for ModulationMatrix {
    fn default() -> Self {
        Self::new()
    }
}

impl ModulationMatrix {
    /// Empty matrix with every source at zero.
    pub fn new() -> Self {
        Self {
            routings: [None; MAX_ROUTINGS],
            count: 0,
            sources: [0.0; ModSource::COUNT],
            destinations: [0.0; ModDestination::COUNT],
        }
    }

    /// Append a routing. Returns its index, or `None` when full.
    pub fn add_routing(&mut self, routing: ModRouting) -> Option<usize> {
        if self.count >= MAX_ROUTINGS {
            return None;
        }
        let index = self.count;
        self.routings[index] = Some(routing);
        self.count += 1;
        Some(index)
    }

    /// Remove the routing at `index`, shifting later routings down.
    pub fn remove_routing(&mut self, index: usize) -> Option<ModRouting> {
        if index >= self.count {
            return None;
        }
        let removed = self.routings[index].take();
        for i in index..self.count - 1 {
            self.routings[i] = self.routings[i + 1].take();
        }
        self.count -= 1;
        removed
    }

    /// Remove every routing.
    pub fn clear(&mut self) {
        self.routings = [None; MAX_ROUTINGS];
        self.count = 0;
        self.destinations = [0.0; ModDestination::COUNT];
    }

    /// Replace all routings. Anything past [`MAX_ROUTINGS`] is ignored.
    pub fn set_routings(&mut self, routings: &[ModRouting]) {
        self.clear();
        for routing in routings.iter().take(MAX_ROUTINGS) {
            self.routings[self.count] = Some(*routing);
            self.count += 1;
        }
    }

    /// Number of routings.
    pub fn routing_count(&self) -> usize {
        self.count
    }

    /// Routing at `index`.
    pub fn routing(&self, index: usize) -> Option<&ModRouting> {
        if index < self.count {
            self.routings[index].as_ref()
        } else {
            None
        }
    }

    /// Iterate over routings in order.
    pub fn iter(&self) -> impl Iterator<Item = &ModRouting> {
        self.routings[..self.count].iter().filter_map(|r| r.as_ref())
    }

    /// Latest value of `source`.
    #[inline]
    pub fn set_source_value(&mut self, source: ModSource, value: f32) {
        self.sources[source.index()] = if value.is_finite() { value } else { 0.0 };
    }

    /// Current value of `source`.
    pub fn source_value(&self, source: ModSource) -> f32 {
        self.sources[source.index()]
    }

    /// Recompute every destination from the current source values.
    #[inline]
    pub fn process(&mut self) {
        self.destinations = [0.0; ModDestination::COUNT];
        for routing in self.routings[..self.count].iter().flatten() {
            let depth = routing.depth(&self.sources);
            if depth == 0.0 {
                continue;
            }
            self.destinations[routing.destination.index()] +=
                depth * routing.source_value(&self.sources);
        }
    }

    /// Summed modulation for `destination` from the last
    /// [`process`](Self::process).
    #[inline]
    pub fn destination_value(&self, destination: ModDestination) -> f32 {
        self.destinations[destination.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routings_to_one_destination_add() {
        let mut m = ModulationMatrix::new();
        m.add_routing(ModRouting::new(ModSource::Lfo1, ModDestination::FilterCutoff, 0.3));
        m.add_routing(ModRouting::new(ModSource::Lfo1, ModDestination::FilterCutoff, 0.2));
        m.set_source_value(ModSource::Lfo1, 0.8);
        m.process();
        assert!((m.destination_value(ModDestination::FilterCutoff) - 0.4).abs() < 1e-6);
        assert_eq!(m.destination_value(ModDestination::Amp), 0.0);
    }

    #[test]
    fn unipolar_folds_bipolar_sources_only() {
        let mut m = ModulationMatrix::new();
        m.add_routing(
            ModRouting::new(ModSource::Lfo1, ModDestination::Pan, 1.0)
                .with_polarity(Polarity::Unipolar),
        );
        m.add_routing(
            ModRouting::new(ModSource::Velocity, ModDestination::Amp, 1.0)
                .with_polarity(Polarity::Unipolar),
        );
        m.set_source_value(ModSource::Lfo1, -1.0);
        m.set_source_value(ModSource::Velocity, 0.25);
        m.process();
        assert_eq!(m.destination_value(ModDestination::Pan), 0.0);
        assert_eq!(m.destination_value(ModDestination::Amp), 0.25);
    }

    #[test]
    fn partial_via_keeps_a_floor() {
        let mut m = ModulationMatrix::new();
        m.add_routing(
            ModRouting::new(ModSource::Lfo2, ModDestination::Osc2Pitch, 1.0)
                .with_via(ModSource::Aftertouch, 0.5),
        );
        m.set_source_value(ModSource::Lfo2, 1.0);
        m.process();
        assert_eq!(m.destination_value(ModDestination::Osc2Pitch), 0.5);
    }

    #[test]
    fn capacity_and_removal() {
        let mut m = ModulationMatrix::new();
        for i in 0..MAX_ROUTINGS {
            assert_eq!(
                m.add_routing(ModRouting::new(ModSource::Noise, ModDestination::Amp, 0.01)),
                Some(i)
            );
        }
        assert_eq!(
            m.add_routing(ModRouting::new(ModSource::Noise, ModDestination::Amp, 0.01)),
            None
        );

        m.set_routings(&[
            ModRouting::new(ModSource::Lfo1, ModDestination::Pan, 0.1),
            ModRouting::new(ModSource::Lfo2, ModDestination::Pan, 0.2),
            ModRouting::new(ModSource::AuxEnv, ModDestination::Pan, 0.3),
        ]);
        let removed = m.remove_routing(1).map(|r| r.source);
        assert_eq!(removed, Some(ModSource::Lfo2));
        assert_eq!(m.routing_count(), 2);
        assert_eq!(m.routing(1).map(|r| r.source), Some(ModSource::AuxEnv));
        assert!(m.remove_routing(2).is_none());
    }

    #[test]
    fn source_indices_are_dense() {
        for (i, s) in ModSource::ALL.iter().enumerate() {
            assert_eq!(s.index(), i);
        }
        assert_eq!(ModDestination::Lfo2Rate.index(), ModDestination::COUNT - 1);
    }
}

//! Three-band equalizer: low shelf, bell, high shelf.
//!
//! Each band is a [`StateVariableFilter`] in a shelf or bell mode, one per
//! channel. At 0 dB every band is exactly flat, so a neutral EQ only costs
//! CPU.

use timbre_core::{
    Effect, ParamDescriptor, ParamUnit, ParameterInfo, SmoothedParam, StateVariableFilter,
    SvfType, wet_dry_mix_stereo,
};

/// Resonance giving a Butterworth-like Q of about 0.7 on the shelves.
const SHELF_RESONANCE: f32 = 0.3;

/// Bell Q to SVF resonance (`k = 1/Q = 2 - 1.96 r`).
fn q_to_resonance(q: f32) -> f32 {
    ((2.0 - 1.0 / q) / 1.96).clamp(0.0, 1.0)
}

#[derive(Debug, Clone)]
struct Band {
    left: StateVariableFilter,
    right: StateVariableFilter,
}

impl Band {
    fn new(sample_rate: f32, filter_type: SvfType, freq: f32, resonance: f32) -> Self {
        let mut filter = StateVariableFilter::new(sample_rate);
        filter.set_filter_type(filter_type);
        filter.set_cutoff(freq);
        filter.set_resonance(resonance);
        filter.set_gain_db(0.0);
        Self {
            left: filter.clone(),
            right: filter,
        }
    }

    fn configure(&mut self, f: impl Fn(&mut StateVariableFilter)) {
        f(&mut self.left);
        f(&mut self.right);
    }

    #[inline]
    fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        (self.left.process(left), self.right.process(right))
    }

    fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }
}

/// Three-band shelf/bell equalizer.
///
/// ## Parameter Indices (`ParameterInfo`)
///
/// | Index | Name | Range | Default |
/// |-------|------|-------|---------|
/// | 0 | Low Freq | 20–1000 Hz | 120.0 |
/// | 1 | Low Gain | -18–18 dB | 0.0 |
/// | 2 | Mid Freq | 200–8000 Hz | 1000.0 |
/// | 3 | Mid Gain | -18–18 dB | 0.0 |
/// | 4 | Mid Q | 0.5–5.0 | 1.0 |
/// | 5 | High Freq | 1000–16000 Hz | 6000.0 |
/// | 6 | High Gain | -18–18 dB | 0.0 |
/// | 7 | Mix | 0–1 | 1.0 |
///
/// # Example
///
/// ```rust
/// use timbre_core::Effect;
/// use timbre_effects::ThreeBandEq;
///
/// let mut eq = ThreeBandEq::new(48000.0);
/// eq.set_low_gain_db(4.0);
/// eq.set_mid(800.0, -3.0, 1.5);
/// eq.set_high_gain_db(2.0);
///
/// let (l, r) = eq.process_stereo(0.25, 0.25);
/// assert!(l.is_finite() && r.is_finite());
/// ```
#[derive(Debug, Clone)]
pub struct ThreeBandEq {
    low: Band,
    mid: Band,
    high: Band,
    low_freq: f32,
    low_gain_db: f32,
    mid_freq: f32,
    mid_gain_db: f32,
    mid_q: f32,
    high_freq: f32,
    high_gain_db: f32,
    mix: SmoothedParam,
}

impl ThreeBandEq {
    /// Flat EQ: shelves at 120 Hz and 6 kHz, bell at 1 kHz.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            low: Band::new(sample_rate, SvfType::LowShelf, 120.0, SHELF_RESONANCE),
            mid: Band::new(sample_rate, SvfType::Peak, 1000.0, q_to_resonance(1.0)),
            high: Band::new(sample_rate, SvfType::HighShelf, 6000.0, SHELF_RESONANCE),
            low_freq: 120.0,
            low_gain_db: 0.0,
            mid_freq: 1000.0,
            mid_gain_db: 0.0,
            mid_q: 1.0,
            high_freq: 6000.0,
            high_gain_db: 0.0,
            mix: SmoothedParam::standard(1.0, sample_rate),
        }
    }

    /// Low shelf corner in Hz, 20..=1000.
    pub fn set_low_freq(&mut self, hz: f32) {
        self.low_freq = clamp_or(hz, 20.0, 1000.0, 120.0);
        let hz = self.low_freq;
        self.low.configure(|f| f.set_cutoff(hz));
    }

    /// Low shelf gain in dB, ±18.
    pub fn set_low_gain_db(&mut self, db: f32) {
        self.low_gain_db = clamp_or(db, -18.0, 18.0, 0.0);
        let db = self.low_gain_db;
        self.low.configure(|f| f.set_gain_db(db));
    }

    /// Bell centre, gain and Q in one call.
    pub fn set_mid(&mut self, hz: f32, gain_db: f32, q: f32) {
        self.set_mid_freq(hz);
        self.set_mid_gain_db(gain_db);
        self.set_mid_q(q);
    }

    /// Bell centre in Hz, 200..=8000.
    pub fn set_mid_freq(&mut self, hz: f32) {
        self.mid_freq = clamp_or(hz, 200.0, 8000.0, 1000.0);
        let hz = self.mid_freq;
        self.mid.configure(|f| f.set_cutoff(hz));
    }

    /// Bell gain in dB, ±18.
    pub fn set_mid_gain_db(&mut self, db: f32) {
        self.mid_gain_db = clamp_or(db, -18.0, 18.0, 0.0);
        let db = self.mid_gain_db;
        self.mid.configure(|f| f.set_gain_db(db));
    }

    /// Bell Q, 0.5..=5.
    pub fn set_mid_q(&mut self, q: f32) {
        self.mid_q = clamp_or(q, 0.5, 5.0, 1.0);
        let resonance = q_to_resonance(self.mid_q);
        self.mid.configure(|f| f.set_resonance(resonance));
    }

    /// High shelf corner in Hz, 1000..=16000.
    pub fn set_high_freq(&mut self, hz: f32) {
        self.high_freq = clamp_or(hz, 1000.0, 16_000.0, 6000.0);
        let hz = self.high_freq;
        self.high.configure(|f| f.set_cutoff(hz));
    }

    /// High shelf gain in dB, ±18.
    pub fn set_high_gain_db(&mut self, db: f32) {
        self.high_gain_db = clamp_or(db, -18.0, 18.0, 0.0);
        let db = self.high_gain_db;
        self.high.configure(|f| f.set_gain_db(db));
    }
}

impl Effect for ThreeBandEq {
    #[inline]
    fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
        let mix = self.mix.advance();
        let (l, r) = self.low.process(left, right);
        let (l, r) = self.mid.process(l, r);
        let (l, r) = self.high.process(l, r);
        wet_dry_mix_stereo(left, right, l, r, mix)
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        for band in [&mut self.low, &mut self.mid, &mut self.high] {
            band.configure(|f| f.set_sample_rate(sample_rate));
        }
        self.mix.set_sample_rate(sample_rate);
    }

    fn reset(&mut self) {
        self.low.reset();
        self.mid.reset();
        self.high.reset();
        self.mix.snap_to_target();
    }

    fn mix(&self) -> f32 {
        self.mix.target()
    }

    fn set_mix(&mut self, mix: f32) {
        self.mix.set_target(clamp_or(mix, 0.0, 1.0, 1.0));
    }
}

impl ParameterInfo for ThreeBandEq {
    fn param_count(&self) -> usize {
        8
    }

    fn param_info(&self, index: usize) -> Option<ParamDescriptor> {
        match index {
            0 => Some(ParamDescriptor::hertz("Low Freq", "Lo Freq", 20.0, 1000.0, 120.0)),
            1 => Some(ParamDescriptor::gain_db("Low Gain", "Lo Gain", -18.0, 18.0, 0.0)),
            2 => Some(ParamDescriptor::hertz("Mid Freq", "Md Freq", 200.0, 8000.0, 1000.0)),
            3 => Some(ParamDescriptor::gain_db("Mid Gain", "Md Gain", -18.0, 18.0, 0.0)),
            4 => Some(ParamDescriptor::new(
                "Mid Q",
                "Md Q",
                ParamUnit::None,
                0.5,
                5.0,
                1.0,
                0.05,
            )),
            5 => Some(ParamDescriptor::hertz("High Freq", "Hi Freq", 1000.0, 16_000.0, 6000.0)),
            6 => Some(ParamDescriptor::gain_db("High Gain", "Hi Gain", -18.0, 18.0, 0.0)),
            7 => Some(ParamDescriptor::mix(1.0)),
            _ => None,
        }
    }

    fn get_param(&self, index: usize) -> f32 {
        match index {
            0 => self.low_freq,
            1 => self.low_gain_db,
            2 => self.mid_freq,
            3 => self.mid_gain_db,
            4 => self.mid_q,
            5 => self.high_freq,
            6 => self.high_gain_db,
            7 => self.mix(),
            _ => 0.0,
        }
    }

    fn set_param(&mut self, index: usize, value: f32) {
        let Some(desc) = self.param_info(index) else {
            return;
        };
        let value = desc.clamp(value);
        match index {
            0 => self.set_low_freq(value),
            1 => self.set_low_gain_db(value),
            2 => self.set_mid_freq(value),
            3 => self.set_mid_gain_db(value),
            4 => self.set_mid_q(value),
            5 => self.set_high_freq(value),
            6 => self.set_high_gain_db(value),
            7 => self.set_mix(value),
            _ => {}
        }
    }
}

#[inline]
fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

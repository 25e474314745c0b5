//! Indexed parameter descriptions for host-driven control.
//!
//! A host shell (plugin wrapper, UI, MIDI-learn table) does not know the
//! concrete effect types. It talks to them through [`ParameterInfo`]:
//! a count, a [`ParamDescriptor`] per index, and clamped get/set by index.
//!
//! ```rust
//! use timbre_core::{ParamDescriptor, ParamUnit, ParameterInfo};
//!
//! struct Trim {
//!     gain_db: f32,
//! }
//!
//! impl ParameterInfo for Trim {
//!     fn param_count(&self) -> usize { 1 }
//!
//!     fn param_info(&self, index: usize) -> Option<ParamDescriptor> {
//!         (index == 0).then(|| ParamDescriptor::gain_db("Trim", "Trim", -24.0, 24.0, 0.0))
//!     }
//!
//!     fn get_param(&self, index: usize) -> f32 {
//!         if index == 0 { self.gain_db } else { 0.0 }
//!     }
//!
//!     fn set_param(&mut self, index: usize, value: f32) {
//!         if let Some(desc) = self.param_info(index) {
//!             self.gain_db = desc.clamp(value);
//!         }
//!     }
//! }
//!
//! let mut trim = Trim { gain_db: 0.0 };
//! trim.set_param(0, 100.0);
//! assert_eq!(trim.get_param(0), 24.0);
//! assert_eq!(trim.find_param_by_name("trim"), Some(0));
//! ```

use libm::{logf, powf};

/// Display unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamUnit {
    /// dB
    Decibels,
    /// Hz
    Hertz,
    /// ms
    Milliseconds,
    /// 0..=1 shown as a percentage
    Normalized,
    /// n:1
    Ratio,
    /// Index into a list of choices
    Choice,
    /// Dimensionless
    None,
}

impl ParamUnit {
    /// Suffix for display.
    pub const fn suffix(self) -> &'static str {
        match self {
            ParamUnit::Decibels => " dB",
            ParamUnit::Hertz => " Hz",
            ParamUnit::Milliseconds => " ms",
            ParamUnit::Normalized => "%",
            ParamUnit::Ratio => ":1",
            ParamUnit::Choice | ParamUnit::None => "",
        }
    }
}

/// Mapping between the plain range and a host's 0..=1 knob.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ParamScale {
    /// Straight line
    #[default]
    Linear,
    /// Equal ratios per knob travel. Requires `min > 0`.
    Logarithmic,
}

/// Static description of one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamDescriptor {
    /// Display name
    pub name: &'static str,
    /// Name for narrow displays, at most 8 characters
    pub short_name: &'static str,
    /// Display unit
    pub unit: ParamUnit,
    /// Lowest accepted value
    pub min: f32,
    /// Highest accepted value
    pub max: f32,
    /// Value after construction
    pub default: f32,
    /// Suggested increment for encoders
    pub step: f32,
    /// Knob curve
    pub scale: ParamScale,
}

impl ParamDescriptor {
    /// A linear parameter.
    pub const fn new(
        name: &'static str,
        short_name: &'static str,
        unit: ParamUnit,
        min: f32,
        max: f32,
        default: f32,
        step: f32,
    ) -> Self {
        Self {
            name,
            short_name,
            unit,
            min,
            max,
            default,
            step,
            scale: ParamScale::Linear,
        }
    }

    /// Dry/wet mix, 0..=1.
    pub const fn mix(default: f32) -> Self {
        Self::new("Mix", "Mix", ParamUnit::Normalized, 0.0, 1.0, default, 0.01)
    }

    /// A 0..=1 amount such as depth or damping.
    pub const fn amount(name: &'static str, short_name: &'static str, default: f32) -> Self {
        Self::new(name, short_name, ParamUnit::Normalized, 0.0, 1.0, default, 0.01)
    }

    /// A time in milliseconds.
    pub const fn time_ms(
        name: &'static str,
        short_name: &'static str,
        min: f32,
        max: f32,
        default: f32,
    ) -> Self {
        Self::new(name, short_name, ParamUnit::Milliseconds, min, max, default, 1.0)
    }

    /// A level in dB.
    pub const fn gain_db(
        name: &'static str,
        short_name: &'static str,
        min: f32,
        max: f32,
        default: f32,
    ) -> Self {
        Self::new(name, short_name, ParamUnit::Decibels, min, max, default, 0.1)
    }

    /// A frequency in Hz on a logarithmic knob.
    pub const fn hertz(
        name: &'static str,
        short_name: &'static str,
        min: f32,
        max: f32,
        default: f32,
    ) -> Self {
        Self::new(name, short_name, ParamUnit::Hertz, min, max, default, 1.0)
            .with_scale(ParamScale::Logarithmic)
    }

    /// An index into `count` choices.
    pub const fn choice(
        name: &'static str,
        short_name: &'static str,
        count: usize,
        default: usize,
    ) -> Self {
        Self::new(
            name,
            short_name,
            ParamUnit::Choice,
            0.0,
            (count - 1) as f32,
            default as f32,
            1.0,
        )
    }

    /// Replace the knob curve.
    pub const fn with_scale(mut self, scale: ParamScale) -> Self {
        self.scale = scale;
        self
    }

    /// Clamp into `min..=max`. Non-finite input yields the default.
    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_finite() {
            value.clamp(self.min, self.max)
        } else {
            self.default
        }
    }

    /// Plain value to 0..=1.
    pub fn normalize(&self, value: f32) -> f32 {
        let range = self.max - self.min;
        if range <= 0.0 {
            return 0.0;
        }
        let value = self.clamp(value);
        match self.scale {
            ParamScale::Linear => (value - self.min) / range,
            ParamScale::Logarithmic if self.min > 0.0 => {
                logf(value / self.min) / logf(self.max / self.min)
            }
            ParamScale::Logarithmic => (value - self.min) / range,
        }
    }

    /// 0..=1 to plain value.
    pub fn denormalize(&self, normalized: f32) -> f32 {
        let n = if normalized.is_finite() {
            normalized.clamp(0.0, 1.0)
        } else {
            0.0
        };
        match self.scale {
            ParamScale::Logarithmic if self.min > 0.0 => {
                self.min * powf(self.max / self.min, n)
            }
            _ => self.min + n * (self.max - self.min),
        }
    }
}

/// Index-addressed parameter access.
pub trait ParameterInfo {
    /// Number of parameters.
    fn param_count(&self) -> usize;

    /// Description of parameter `index`, `None` past the end.
    fn param_info(&self, index: usize) -> Option<ParamDescriptor>;

    /// Current plain value. Out-of-range indices return 0.
    fn get_param(&self, index: usize) -> f32;

    /// Set a plain value, clamped to the descriptor's range. Out-of-range
    /// indices are ignored.
    fn set_param(&mut self, index: usize, value: f32);

    /// Index of the parameter whose name or short name matches,
    /// ignoring ASCII case.
    fn find_param_by_name(&self, name: &str) -> Option<usize> {
        (0..self.param_count()).find(|&i| {
            self.param_info(i).is_some_and(|d| {
                d.name.eq_ignore_ascii_case(name) || d.short_name.eq_ignore_ascii_case(name)
            })
        })
    }
}

//! The [`Effect`] trait shared by every processor in the FX rack.
//!
//! Effects are stereo in, stereo out, and own their wet/dry balance: a chain
//! never mixes dry signal back in on an effect's behalf. All methods except
//! [`Effect::prepare`] must be callable from the audio thread, so none of
//! them allocate.

/// A stereo audio effect with its own dry/wet mix.
///
/// # Example
///
/// ```rust
/// use timbre_core::Effect;
///
/// struct Width {
///     mix: f32,
/// }
///
/// impl Effect for Width {
///     fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
///         let mid = (left + right) * 0.5;
///         let side = (left - right) * 0.5;
///         let wide = (mid + side * 2.0, mid - side * 2.0);
///         (
///             left + (wide.0 - left) * self.mix,
///             right + (wide.1 - right) * self.mix,
///         )
///     }
///
///     fn set_sample_rate(&mut self, _sample_rate: f32) {}
///     fn reset(&mut self) {}
///     fn mix(&self) -> f32 { self.mix }
///     fn set_mix(&mut self, mix: f32) { self.mix = mix.clamp(0.0, 1.0); }
/// }
///
/// let mut fx = Width { mix: 0.0 };
/// assert_eq!(fx.process_stereo(0.3, -0.2), (0.3, -0.2));
/// ```
pub trait Effect {
    /// Process one stereo frame.
    fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32);

    /// Process a block in place. Both slices must be the same length.
    fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        debug_assert_eq!(left.len(), right.len());
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let (out_l, out_r) = self.process_stereo(*l, *r);
            *l = out_l;
            *r = out_r;
        }
    }

    /// Configure for a sample rate and maximum block length.
    ///
    /// This is the one place an effect may (re)allocate. The default just
    /// forwards the sample rate.
    fn prepare(&mut self, sample_rate: f32, max_block_size: usize) {
        let _ = max_block_size;
        self.set_sample_rate(sample_rate);
    }

    /// Recompute sample-rate-dependent coefficients.
    fn set_sample_rate(&mut self, sample_rate: f32);

    /// Clear delay lines, filter history and envelopes. Parameters are kept.
    fn reset(&mut self);

    /// Dry/wet balance in [0, 1].
    fn mix(&self) -> f32;

    /// Set the dry/wet balance. Values are clamped to [0, 1].
    fn set_mix(&mut self, mix: f32);

    /// Latency introduced by the effect, in samples.
    fn latency_samples(&self) -> usize {
        0
    }
}

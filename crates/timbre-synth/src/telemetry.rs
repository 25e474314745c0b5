//! Lock-free scope and meter feed from the audio thread to a UI.
//!
//! The audio side pushes mono-summed samples into an `rtrb` ring and
//! publishes RMS, peak and voice count as `f32` bit patterns in atomics.
//! It never blocks: when the ring is full, samples are dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use rtrb::{Consumer, Producer, RingBuffer};

#[derive(Debug)]
struct Meters {
    rms: AtomicU32,
    peak: AtomicU32,
    voices: AtomicU32,
}

impl Meters {
    #[inline]
    fn store(slot: &AtomicU32, value: f32) {
        slot.store(value.to_bits(), Ordering::Release);
    }

    #[inline]
    fn load(slot: &AtomicU32) -> f32 {
        f32::from_bits(slot.load(Ordering::Acquire))
    }
}

/// Constructor for the writer/reader pair.
#[derive(Debug)]
pub struct Telemetry;

impl Telemetry {
    /// Ring of `capacity` scope samples plus shared meters.
    ///
    /// ```rust
    /// use timbre_synth::Telemetry;
    ///
    /// let (mut writer, mut reader) = Telemetry::new(64);
    /// writer.push_block(&[0.5; 8], &[0.5; 8], 3);
    ///
    /// let mut scope = [0.0f32; 16];
    /// assert_eq!(reader.pop_into(&mut scope), 8);
    /// assert_eq!(reader.active_voices(), 3);
    /// assert!((reader.peak() - 0.5).abs() < 1e-6);
    /// ```
    #[allow(clippy::new_ret_no_self)]
    pub fn new(capacity: usize) -> (TelemetryWriter, TelemetryReader) {
        let (producer, consumer) = RingBuffer::new(capacity.max(1));
        let meters = Arc::new(Meters {
            rms: AtomicU32::new(0),
            peak: AtomicU32::new(0),
            voices: AtomicU32::new(0),
        });
        (
            TelemetryWriter {
                producer,
                meters: Arc::clone(&meters),
            },
            TelemetryReader { consumer, meters },
        )
    }
}

/// Audio-thread half.
pub struct TelemetryWriter {
    producer: Producer<f32>,
    meters: Arc<Meters>,
}

impl core::fmt::Debug for TelemetryWriter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TelemetryWriter")
            .field("free", &self.producer.slots())
            .finish_non_exhaustive()
    }
}

impl TelemetryWriter {
    /// Publish one block. Allocation-free and wait-free.
    pub fn push_block(&mut self, left: &[f32], right: &[f32], active_voices: usize) {
        let len = left.len().min(right.len());
        let mut sum_sq = 0.0f32;
        let mut peak = 0.0f32;
        for (&l, &r) in left.iter().zip(right).take(len) {
            let mono = 0.5 * (l + r);
            sum_sq += mono * mono;
            peak = peak.max(l.abs()).max(r.abs());
            // Full ring: drop the sample.
            let _ = self.producer.push(mono);
        }
        let rms = if len > 0 {
            libm::sqrtf(sum_sq / len as f32)
        } else {
            0.0
        };
        Meters::store(&self.meters.rms, rms);
        Meters::store(&self.meters.peak, peak);
        Meters::store(&self.meters.voices, active_voices as f32);
    }
}

/// UI-thread half.
pub struct TelemetryReader {
    consumer: Consumer<f32>,
    meters: Arc<Meters>,
}

impl core::fmt::Debug for TelemetryReader {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TelemetryReader")
            .field("available", &self.consumer.slots())
            .finish_non_exhaustive()
    }
}

impl TelemetryReader {
    /// Move waiting scope samples into `out`; returns how many were written.
    pub fn pop_into(&mut self, out: &mut [f32]) -> usize {
        let mut n = 0;
        for slot in out.iter_mut() {
            match self.consumer.pop() {
                Ok(s) => {
                    *slot = s;
                    n += 1;
                }
                Err(_) => break,
            }
        }
        n
    }

    /// Samples waiting in the ring.
    pub fn available(&self) -> usize {
        self.consumer.slots()
    }

    /// RMS of the mono sum over the last block.
    pub fn rms(&self) -> f32 {
        Meters::load(&self.meters.rms)
    }

    /// Peak of either channel over the last block.
    pub fn peak(&self) -> f32 {
        Meters::load(&self.meters.peak)
    }

    /// Voice count reported with the last block.
    pub fn active_voices(&self) -> usize {
        Meters::load(&self.meters.voices) as usize
    }
}

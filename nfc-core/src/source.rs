//! Sample producer contract and interleaved-format conversion.
//!
//! spec.md §6 "Sample producer (in)": the core never reads a radio or a
//! file directly, only this trait. SPEC_FULL.md §4.8 grounds
//! [`SampleConverter`] on `original_source/src/devices/SampleBuffer.h`'s
//! templated int16/int32/float32 -> float conversion.

use num_complex::Complex32;

pub type IqSample = Complex32;

/// Abstract contract for anything that can hand the decoder IQ samples.
/// Implemented outside `nfc-core` (a WAV file, a radio, a synthetic test
/// generator); the core only ever calls through this trait.
pub trait SampleSource {
    /// Block up to `timeout_ms` for more samples to become available.
    /// Returns `false` on timeout with nothing ready.
    fn wait_for_samples(&mut self, timeout_ms: u32) -> bool;

    /// Read up to `dst.len()` IQ samples, returning how many were written.
    /// Zero means the source is exhausted.
    fn read_iq_block(&mut self, dst: &mut [IqSample]) -> usize;

    fn sample_rate(&self) -> u32;

    fn center_freq(&self) -> u32;
}

/// Converts one interleaved-format input sample to the core's `f32`
/// magnitude domain. `original_source/src/devices/SampleBuffer.h` applies
/// this per-channel before handing samples to the signal front-end.
pub trait SampleConverter {
    fn to_f32(&self) -> f32;
}

impl SampleConverter for i16 {
    fn to_f32(&self) -> f32 {
        *self as f32 / i16::MAX as f32
    }
}

impl SampleConverter for i32 {
    fn to_f32(&self) -> f32 {
        *self as f32 / i32::MAX as f32
    }
}

impl SampleConverter for f32 {
    fn to_f32(&self) -> f32 {
        *self
    }
}

/// Build an [`IqSample`] from one interleaved I/Q pair in any supported
/// wire format.
pub fn iq_from_pair<T: SampleConverter>(i: T, q: T) -> IqSample {
    Complex32::new(i.to_f32(), q.to_f32())
}

/// Analogue of [`SampleSource`] for the ISO-7816 four-channel logic
/// capture. SPEC_FULL.md §3: a separate producer contract since the
/// contact decoder has no IQ stream to read.
pub trait LogicSampleSource {
    fn wait_for_samples(&mut self, timeout_ms: u32) -> bool;
    fn read_logic_block(&mut self, dst: &mut [crate::logic::LogicSample]) -> usize;
    fn sample_rate(&self) -> u32;
}

/// Runs a [`SampleSource`] on a background thread and hands its blocks back
/// over a bounded `crossbeam::channel`, so the dispatcher's pull loop never
/// blocks on the underlying source directly. SPEC_FULL.md §5: the SPSC
/// handoff between a radio prefetch thread and the decode task.
pub struct PrefetchSampleSource {
    rx: crossbeam::channel::Receiver<Vec<IqSample>>,
    sample_rate: u32,
    center_freq: u32,
    pending: Vec<IqSample>,
    pending_pos: usize,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl PrefetchSampleSource {
    /// Spawns the prefetch thread. `block_size` bounds one channel message;
    /// `queue_depth` bounds how many blocks may sit in the channel at once.
    pub fn spawn<S>(mut source: S, block_size: usize, queue_depth: usize) -> Self
    where
        S: SampleSource + Send + 'static,
    {
        let sample_rate = source.sample_rate();
        let center_freq = source.center_freq();
        let (tx, rx) = crossbeam::channel::bounded(queue_depth);

        let handle = std::thread::spawn(move || {
            let mut scratch = vec![IqSample::default(); block_size.max(1)];
            loop {
                let n = source.read_iq_block(&mut scratch);
                if n == 0 {
                    if !source.wait_for_samples(50) {
                        break;
                    }
                    continue;
                }
                if tx.send(scratch[..n].to_vec()).is_err() {
                    break;
                }
            }
        });

        Self { rx, sample_rate, center_freq, pending: Vec::new(), pending_pos: 0, handle: Some(handle) }
    }

    fn refill(&mut self, timeout_ms: u32) -> bool {
        match self.rx.recv_timeout(std::time::Duration::from_millis(timeout_ms as u64)) {
            Ok(block) => {
                self.pending = block;
                self.pending_pos = 0;
                true
            }
            Err(_) => false,
        }
    }
}

impl SampleSource for PrefetchSampleSource {
    fn wait_for_samples(&mut self, timeout_ms: u32) -> bool {
        if self.pending_pos < self.pending.len() {
            return true;
        }
        self.refill(timeout_ms)
    }

    fn read_iq_block(&mut self, dst: &mut [IqSample]) -> usize {
        if self.pending_pos >= self.pending.len() && !self.refill(0) {
            return 0;
        }
        let remaining = self.pending.len() - self.pending_pos;
        let n = remaining.min(dst.len());
        dst[..n].copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + n]);
        self.pending_pos += n;
        n
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn center_freq(&self) -> u32 {
        self.center_freq
    }
}

impl Drop for PrefetchSampleSource {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i16_full_scale_maps_to_unit_amplitude() {
        let sample = iq_from_pair(i16::MAX, 0i16);
        assert!((sample.re - 1.0).abs() < 1e-4);
        assert_eq!(sample.im, 0.0);
    }

    #[test]
    fn f32_passes_through_unchanged() {
        let sample = iq_from_pair(0.25f32, -0.5f32);
        assert_eq!(sample.re, 0.25);
        assert_eq!(sample.im, -0.5);
    }

    struct FixedSource {
        samples: Vec<IqSample>,
        position: usize,
    }

    impl SampleSource for FixedSource {
        fn wait_for_samples(&mut self, _timeout_ms: u32) -> bool {
            self.position < self.samples.len()
        }

        fn read_iq_block(&mut self, dst: &mut [IqSample]) -> usize {
            let remaining = self.samples.len() - self.position;
            let n = remaining.min(dst.len());
            dst[..n].copy_from_slice(&self.samples[self.position..self.position + n]);
            self.position += n;
            n
        }

        fn sample_rate(&self) -> u32 {
            1_000_000
        }

        fn center_freq(&self) -> u32 {
            0
        }
    }

    #[test]
    fn prefetch_source_hands_back_every_sample_in_order() {
        let samples: Vec<IqSample> = (0..10).map(|i| IqSample::new(i as f32, 0.0)).collect();
        let source = FixedSource { samples: samples.clone(), position: 0 };
        let mut prefetch = PrefetchSampleSource::spawn(source, 4, 2);

        let mut collected = Vec::new();
        let mut scratch = [IqSample::default(); 3];
        loop {
            let n = prefetch.read_iq_block(&mut scratch);
            if n == 0 {
                if !prefetch.wait_for_samples(1000) {
                    break;
                }
                continue;
            }
            collected.extend_from_slice(&scratch[..n]);
        }
        assert_eq!(collected, samples);
    }
}

//! WAV-backed implementations of `nfc-core`'s two producer traits.
//!
//! Batch mode only: the whole file is decoded into memory up front rather
//! than streaming sample-by-sample from a live device.

use color_eyre::eyre::{eyre, Context, Result};
use hound::{SampleFormat, WavReader};
use nfc_core::logic::LogicSample;
use nfc_core::source::{iq_from_pair, IqSample, LogicSampleSource, SampleSource};
use std::path::Path;

/// Two-channel (I, Q) WAV capture fed to [`nfc_core::Dispatcher`].
pub struct WavIqSource {
    samples: Vec<IqSample>,
    position: usize,
    sample_rate: u32,
}

impl WavIqSource {
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader =
            WavReader::open(path).wrap_err_with(|| format!("Failed to open WAV file: {}", path.display()))?;
        let spec = reader.spec();
        if spec.channels != 2 {
            return Err(eyre!(
                "RF capture {} has {} channel(s); expected 2 (I, Q)",
                path.display(),
                spec.channels
            ));
        }

        let samples: Vec<IqSample> = match spec.sample_format {
            SampleFormat::Float => read_pairs(reader.samples::<f32>())?,
            SampleFormat::Int if spec.bits_per_sample == 16 => read_pairs(reader.samples::<i16>())?,
            SampleFormat::Int => read_pairs(reader.samples::<i32>())?,
        };

        Ok(Self { samples, position: 0, sample_rate: spec.sample_rate })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

fn read_pairs<T, I>(mut samples: I) -> Result<Vec<IqSample>>
where
    T: hound::Sample + nfc_core::source::SampleConverter,
    I: Iterator<Item = hound::Result<T>>,
{
    let mut out = Vec::new();
    loop {
        let Some(i) = samples.next() else { break };
        let Some(q) = samples.next() else { break };
        out.push(iq_from_pair(i.wrap_err("malformed WAV sample")?, q.wrap_err("malformed WAV sample")?));
    }
    Ok(out)
}

impl SampleSource for WavIqSource {
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
        self.sample_rate
    }

    fn center_freq(&self) -> u32 {
        0
    }
}

/// Four-channel (IO, CLK, RST, VCC) WAV capture fed to
/// [`nfc_core::ContactDispatcher`]. Each channel is thresholded at zero to
/// recover a digital level.
pub struct WavLogicSource {
    samples: Vec<LogicSample>,
    position: usize,
    sample_rate: u32,
}

impl WavLogicSource {
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader =
            WavReader::open(path).wrap_err_with(|| format!("Failed to open WAV file: {}", path.display()))?;
        let spec = reader.spec();
        if spec.channels != 4 {
            return Err(eyre!(
                "Contact capture {} has {} channel(s); expected 4 (IO, CLK, RST, VCC)",
                path.display(),
                spec.channels
            ));
        }

        let mut samples = Vec::new();
        let mut frame = [0f32; 4];
        let mut slot = 0usize;
        for value in reader.samples::<f32>() {
            frame[slot] = value.wrap_err("malformed WAV sample")?;
            slot += 1;
            if slot == 4 {
                samples.push(LogicSample {
                    io: frame[0] > 0.0,
                    clk: frame[1] > 0.0,
                    rst: frame[2] > 0.0,
                    vcc: frame[3] > 0.0,
                });
                slot = 0;
            }
        }

        Ok(Self { samples, position: 0, sample_rate: spec.sample_rate })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl LogicSampleSource for WavLogicSource {
    fn wait_for_samples(&mut self, _timeout_ms: u32) -> bool {
        self.position < self.samples.len()
    }

    fn read_logic_block(&mut self, dst: &mut [LogicSample]) -> usize {
        let remaining = self.samples.len() - self.position;
        let n = remaining.min(dst.len());
        dst[..n].copy_from_slice(&self.samples[self.position..self.position + n]);
        self.position += n;
        n
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

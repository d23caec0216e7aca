//! Frame dispatcher: picks the next technology to run and drives the
//! sample-pull loop. spec.md §4.7.

use crate::config::DecoderConfig;
use crate::errors::Result;
use crate::frame::{FrameType, RawFrame, Tech as TechKind};
use crate::logic::LogicRing;
use crate::ring::SignalRing;
use crate::sfe::SignalFrontEnd;
use crate::source::{LogicSampleSource, SampleSource};
use crate::tech::iso7816::Iso7816;
use crate::tech::nfca::NfcA;
use crate::tech::nfcb::NfcB;
use crate::tech::nfcf::NfcF;
use crate::tech::{DecodeOutcome, Tech};

/// Which RF technology currently holds lock, if any. spec.md §3 invariant:
/// "at most one ModulationStatus is locked at a time per technology; the
/// dispatcher guarantees only one tech is decoding".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Locked {
    None,
    NfcA,
    NfcB,
    NfcF,
}

/// Batch-mode RF dispatcher: owns the signal front-end, the shared ring,
/// and the three RF technology decoders, and implements the single public
/// `next_frame` operation from spec.md §4.7.
pub struct Dispatcher<S: SampleSource> {
    source: S,
    sfe: SignalFrontEnd,
    ring: SignalRing,
    nfca: NfcA,
    nfcb: NfcB,
    nfcf: NfcF,
    locked: Locked,
    scratch: Vec<crate::source::IqSample>,
}

impl<S: SampleSource> Dispatcher<S> {
    pub fn new(source: S, config: &DecoderConfig) -> Result<Self> {
        let sample_rate = source.sample_rate() as f64;
        let mut sfe = SignalFrontEnd::new(sample_rate);
        sfe.power_level_threshold = config.power_level_threshold;
        let ring = SignalRing::new(config.ring_capacity)?;

        let mut nfca = NfcA::new(config.max_frame_size);
        let mut nfcb = NfcB::new(config.max_frame_size);
        let mut nfcf = NfcF::new(config.max_frame_size);
        nfca.initialize(sample_rate)?;
        nfcb.initialize(sample_rate)?;
        nfcf.initialize(sample_rate)?;

        Ok(Self {
            source,
            sfe,
            ring,
            nfca,
            nfcb,
            nfcf,
            locked: Locked::None,
            scratch: vec![crate::source::IqSample::default(); 256],
        })
    }

    fn pull_sample(&mut self, timeout_ms: u32) -> Option<crate::source::IqSample> {
        loop {
            let n = self.source.read_iq_block(&mut self.scratch[..1]);
            if n > 0 {
                return Some(self.scratch[0]);
            }
            if !self.source.wait_for_samples(timeout_ms.min(50)) {
                return None;
            }
        }
    }

    /// spec.md §4.7 algorithm. Returns `None` once the sample producer is
    /// exhausted (the `End` outcome); a timeout or undetected carrier is
    /// returned as a synthetic `RawFrame` rather than an error.
    pub fn next_frame(&mut self, timeout_ms: u32) -> Option<RawFrame> {
        let deadline = self.ring.clock() + (timeout_ms as u64 * self.source.sample_rate() as u64) / 1000;

        loop {
            let Some(iq) = self.pull_sample(timeout_ms) else { return None };
            self.sfe.process(iq, &mut self.ring);

            if !self.ring.is_filled() {
                continue;
            }

            if self.locked == Locked::None {
                if !self.sfe.has_carrier() {
                    if self.ring.clock() > deadline {
                        return Some(RawFrame::carrier_timeout(self.ring.clock(), self.current_time()));
                    }
                    continue;
                }

                if self.nfca.detect(&self.ring) {
                    self.locked = Locked::NfcA;
                } else if self.nfcb.detect(&self.ring) {
                    self.locked = Locked::NfcB;
                } else if self.nfcf.detect(&self.ring) {
                    self.locked = Locked::NfcF;
                } else if self.ring.clock() > deadline {
                    return Some(RawFrame::pattern_timeout(TechKind::NfcA, self.ring.clock(), self.current_time()));
                }
                continue;
            }

            let outcome = match self.locked {
                Locked::NfcA => self.nfca.decode(&self.ring),
                Locked::NfcB => self.nfcb.decode(&self.ring),
                Locked::NfcF => self.nfcf.decode(&self.ring),
                Locked::None => unreachable!(),
            };

            match outcome {
                DecodeOutcome::Frame(frame) => {
                    if !matches!(frame.frame_type, FrameType::ListenFrame) {
                        // stay locked through the paired listen frame; only
                        // release after a listen frame completes, matching
                        // the poll<->listen expectation flip.
                    } else {
                        self.locked = Locked::None;
                    }
                    return Some(frame);
                }
                DecodeOutcome::SearchReset => {
                    self.locked = Locked::None;
                }
                DecodeOutcome::Pending => {
                    if self.ring.clock() > deadline {
                        let tech = match self.locked {
                            Locked::NfcA => TechKind::NfcA,
                            Locked::NfcB => TechKind::NfcB,
                            Locked::NfcF => TechKind::NfcF,
                            Locked::None => unreachable!(),
                        };
                        self.locked = Locked::None;
                        return Some(RawFrame::pattern_timeout(tech, self.ring.clock(), self.current_time()));
                    }
                }
            }
        }
    }

    fn current_time(&self) -> f64 {
        self.ring.clock() as f64 / self.source.sample_rate().max(1) as f64
    }
}

/// Batch-mode contact dispatcher: drives [`Iso7816`] against a
/// [`LogicSampleSource`]. Distinct from [`Dispatcher`] because the contact
/// capture has no carrier/envelope concept to multiplex detectors over —
/// there is exactly one technology.
pub struct ContactDispatcher<S: LogicSampleSource> {
    source: S,
    ring: LogicRing,
    decoder: Iso7816,
    scratch: Vec<crate::logic::LogicSample>,
}

impl<S: LogicSampleSource> ContactDispatcher<S> {
    pub fn new(source: S, config: &DecoderConfig) -> Result<Self> {
        let sample_rate = source.sample_rate() as f64;
        let ring = LogicRing::new(config.ring_capacity)?;
        let mut decoder = Iso7816::new(config.max_frame_size);
        decoder.initialize(sample_rate)?;
        Ok(Self { source, ring, decoder, scratch: vec![crate::logic::LogicSample::default(); 256] })
    }

    fn pull_sample(&mut self, timeout_ms: u32) -> Option<crate::logic::LogicSample> {
        loop {
            let n = self.source.read_logic_block(&mut self.scratch[..1]);
            if n > 0 {
                return Some(self.scratch[0]);
            }
            if !self.source.wait_for_samples(timeout_ms.min(50)) {
                return None;
            }
        }
    }

    pub fn next_frame(&mut self, timeout_ms: u32) -> Option<RawFrame> {
        loop {
            let sample = self.pull_sample(timeout_ms)?;
            self.ring.push(sample);
            if !self.ring.is_filled() {
                continue;
            }
            if let Some(frame) = self.decoder.step(&self.ring) {
                return Some(frame);
            }
        }
    }
}

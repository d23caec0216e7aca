//! ISO/IEC 14443-B (NFC-B) decoder. spec.md §4.4.

use crate::bitrate::BitrateTable;
use crate::crc::crc_mismatch;
use crate::errors::{DspError, Result};
use crate::frame::{FrameFlags, FramePhase, FrameStatus, FrameType, RawFrame, Tech as TechKind};
use crate::protocol::ProtocolStatus;
use crate::ring::SignalRing;
use crate::stream::StreamStatus;
use crate::symbol::{ModulationStatus, PatternType};

use super::{DecodeOutcome, Tech};

/// spec.md §4.4: lower/upper modulation-depth bounds that separate NFC-B
/// on-off ASK from NFC-A's ~100% modulation.
pub const DEFAULT_MINIMUM_MODULATION_DEEP: f32 = 0.08;
pub const DEFAULT_MAXIMUM_MODULATION_DEEP: f32 = 0.60;

/// ISO/IEC 7816-3 Fi/Di style FWT table index lookup for NFC-B: spec.md
/// "`byte[11][hi]` is FWI -> `frameWaitingTime = FWT[fwi]`".
pub fn fwt_samples(fwi: u8, sample_rate: f64) -> u64 {
    let fwt_seconds = (256.0 * 16.0 / crate::bitrate::CARRIER_FREQ_HZ) * 2f64.powi(fwi as i32);
    (fwt_seconds * sample_rate).round() as u64
}

/// `FDS[fdsi]` max-frame-size table, ISO/IEC 14443-3 Table: `FDS[i] = 2^(i+3)`
/// capped at 256, with `i == 8` meaning "RFU, use default (256)".
pub fn max_frame_size_from_fdsi(fdsi: u8) -> usize {
    match fdsi {
        0..=7 => (1usize << (fdsi as usize + 3)).min(256),
        _ => 256,
    }
}

/// spec.md §4.4 symbol alphabet: `PatternH` (no modulation, bit 1),
/// `PatternL` (modulated, bit 0).
pub fn classify_poll_symbol(modulation_depth: f32, threshold_min: f32) -> PatternType {
    if modulation_depth > threshold_min {
        PatternType::PatternL
    } else {
        PatternType::PatternH
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Poll,
    Listen,
}

/// Listen-side BPSK subcarrier windows, in symbol periods. spec.md §4.4:
/// "walks a three-state machine `TR1 -> S1 -> S2`, each with hard min/max
/// windows in ETU".
const TR1_MIN_ETU: u64 = 80;
const TR1_MAX_ETU: u64 = 200;
const LISTEN_S1_MIN_ETU: u64 = 10;
const LISTEN_S1_MAX_ETU: u64 = 14;
const LISTEN_S2_MIN_ETU: u64 = 2;
const LISTEN_S2_MAX_ETU: u64 = 3;

/// Listen-side three-state machine: any stage whose window expires without
/// the expected transition drops back to `Tr1`, spec.md §4.4 "failure at
/// any stage resets the machine".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListenStage {
    Tr1,
    S1,
    S2,
    Payload,
}

#[derive(Debug)]
pub struct NfcB {
    sample_rate: f64,
    bitrate: Option<BitrateTable>,
    rate_index: usize,
    modulation: ModulationStatus,
    stream: StreamStatus,
    protocol: ProtocolStatus,
    frame_status: FrameStatus,
    direction: Direction,
    minimum_modulation_deep: f32,
    maximum_modulation_deep: f32,
    consecutive_high: u8,
    frame_start: u64,
    listen_stage: ListenStage,
    stage_start: u64,
}

impl NfcB {
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            sample_rate: 0.0,
            bitrate: None,
            rate_index: 0,
            modulation: ModulationStatus::default(),
            stream: StreamStatus::new(max_frame_size, false),
            protocol: ProtocolStatus::nfc_b(),
            frame_status: FrameStatus::default(),
            direction: Direction::Poll,
            minimum_modulation_deep: DEFAULT_MINIMUM_MODULATION_DEEP,
            maximum_modulation_deep: DEFAULT_MAXIMUM_MODULATION_DEEP,
            consecutive_high: 0,
            frame_start: 0,
            listen_stage: ListenStage::Tr1,
            stage_start: 0,
        }
    }

    fn bitrate(&self) -> Result<&BitrateTable> {
        self.bitrate.as_ref().ok_or(DspError::ProducerClosed.into())
    }

    /// Converts the TR1/S1/S2 windows into sample counts at the current
    /// symbol rate and stores them on [`ProtocolStatus`], spec.md §4.4
    /// "hard min/max windows in ETU derived from protocol constants".
    fn apply_listen_timing_defaults(&mut self) {
        let Some(period) =
            self.bitrate.as_ref().and_then(|t| t.get(self.rate_index)).map(|p| p.period as u64)
        else {
            return;
        };
        self.protocol.tr1_minimum_time = TR1_MIN_ETU * period;
        self.protocol.tr1_maximum_time = TR1_MAX_ETU * period;
        self.protocol.listen_s1_min = LISTEN_S1_MIN_ETU * period;
        self.protocol.listen_s1_max = LISTEN_S1_MAX_ETU * period;
        self.protocol.listen_s2_min = LISTEN_S2_MIN_ETU * period;
        self.protocol.listen_s2_max = LISTEN_S2_MAX_ETU * period;
    }

    fn decode_bits(&mut self, ring: &SignalRing) -> DecodeOutcome {
        let Some(latest) = ring.get(0) else { return DecodeOutcome::Pending };

        let pattern = classify_poll_symbol(latest.modulation_depth, self.minimum_modulation_deep);
        match pattern {
            PatternType::PatternL => {
                self.consecutive_high = 0;
                self.stream.push_bit(false);
            }
            PatternType::PatternH => {
                self.consecutive_high += 1;
                if self.consecutive_high >= 10 && self.stream.bytes() > 0 {
                    return DecodeOutcome::Frame(self.emit_frame(ring.clock()));
                }
                self.stream.push_bit(true);
            }
            _ => {}
        }
        DecodeOutcome::Pending
    }

    /// Walks `TR1 -> S1 -> S2` ahead of the listen payload. TR1 is silence
    /// followed by subcarrier onset; S1 and S2 are the two BPSK preamble
    /// phases before data bits start. Each stage resets to `Tr1` if its
    /// window expires without the expected transition.
    fn advance_listen_stage(&mut self, ring: &SignalRing) -> DecodeOutcome {
        let Some(latest) = ring.get(0) else { return DecodeOutcome::Pending };
        let clock = ring.clock();
        let elapsed = clock.saturating_sub(self.stage_start);
        let subcarrier_present = latest.modulation_depth > self.minimum_modulation_deep;

        match self.listen_stage {
            ListenStage::Tr1 => {
                if subcarrier_present {
                    if elapsed < self.protocol.tr1_minimum_time {
                        self.stage_start = clock;
                        return DecodeOutcome::Pending;
                    }
                    self.listen_stage = ListenStage::S1;
                    self.stage_start = clock;
                } else if elapsed > self.protocol.tr1_maximum_time {
                    return DecodeOutcome::SearchReset;
                }
            }
            ListenStage::S1 => {
                if elapsed > self.protocol.listen_s1_max {
                    self.listen_stage = ListenStage::Tr1;
                    self.stage_start = clock;
                } else if elapsed >= self.protocol.listen_s1_min {
                    self.listen_stage = ListenStage::S2;
                    self.stage_start = clock;
                }
            }
            ListenStage::S2 => {
                if elapsed > self.protocol.listen_s2_max {
                    self.listen_stage = ListenStage::Tr1;
                    self.stage_start = clock;
                } else if elapsed >= self.protocol.listen_s2_min {
                    self.listen_stage = ListenStage::Payload;
                    self.frame_start = clock;
                }
            }
            ListenStage::Payload => unreachable!("decode() routes Payload to decode_bits"),
        }
        DecodeOutcome::Pending
    }

    fn emit_frame(&mut self, end_clock: u64) -> RawFrame {
        let data = std::mem::take(&mut self.stream.buffer);
        let mut flags = self.stream.flags;
        if !data.is_empty() && crc_mismatch(&data, crate::crc::crc16_b) {
            flags |= FrameFlags::CRC_ERROR;
        }

        let frame_type = match self.direction {
            Direction::Poll => FrameType::PollFrame,
            Direction::Listen => FrameType::ListenFrame,
        };

        let symbol_rate = self.bitrate.as_ref().and_then(|t| t.get(self.rate_index)).map(|p| p.rate_bps).unwrap_or(0);

        let frame = RawFrame {
            tech: Some(TechKind::NfcB),
            frame_type,
            // spec.md S4: NFC-B has no dedicated sense tag, REQB lands in
            // ApplicationFrame.
            phase: FramePhase::ApplicationFrame,
            sample_start: self.frame_start,
            sample_end: end_clock,
            time_start: self.frame_start as f64 / self.sample_rate.max(1.0),
            time_end: end_clock as f64 / self.sample_rate.max(1.0),
            symbol_rate,
            flags,
            data,
            timestamp: None,
        };

        self.frame_status.clear_frame_bounds();
        self.frame_status.flip_expected();
        self.direction = match self.direction {
            Direction::Poll => Direction::Listen,
            Direction::Listen => Direction::Poll,
        };
        self.stream.reset();
        self.consecutive_high = 0;
        self.modulation.reset();

        if self.direction == Direction::Listen {
            self.listen_stage = ListenStage::Tr1;
            self.stage_start = end_clock;
        }

        frame
    }
}

impl Tech for NfcB {
    fn tech(&self) -> TechKind {
        TechKind::NfcB
    }

    fn initialize(&mut self, sample_rate: f64) -> Result<()> {
        self.sample_rate = sample_rate;
        self.bitrate = Some(BitrateTable::new(sample_rate)?);
        self.reset();
        self.apply_listen_timing_defaults();
        Ok(())
    }

    fn detect(&mut self, ring: &SignalRing) -> bool {
        let Some(latest) = ring.get(0) else { return false };
        if latest.modulation_depth <= self.minimum_modulation_deep
            || latest.modulation_depth >= self.maximum_modulation_deep
        {
            return false;
        }
        self.modulation.symbol_start_time = ring.clock();
        self.modulation.locked = true;
        self.frame_start = ring.clock();
        true
    }

    fn decode(&mut self, ring: &SignalRing) -> DecodeOutcome {
        let Ok(bitrate) = self.bitrate() else { return DecodeOutcome::SearchReset };
        if bitrate.get(self.rate_index).is_none() {
            return DecodeOutcome::SearchReset;
        }

        match self.direction {
            Direction::Poll => self.decode_bits(ring),
            Direction::Listen => match self.listen_stage {
                ListenStage::Payload => self.decode_bits(ring),
                _ => self.advance_listen_stage(ring),
            },
        }
    }

    fn reset(&mut self) {
        self.modulation.reset();
        self.stream.reset();
        self.consecutive_high = 0;
        self.frame_status.clear_frame_bounds();
        self.listen_stage = ListenStage::Tr1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_modulation_depth_is_pattern_l() {
        assert_eq!(classify_poll_symbol(0.5, 0.08), PatternType::PatternL);
    }

    #[test]
    fn low_modulation_depth_is_pattern_h() {
        assert_eq!(classify_poll_symbol(0.01, 0.08), PatternType::PatternH);
    }

    #[test]
    fn fds_table_caps_at_256() {
        assert_eq!(max_frame_size_from_fdsi(0), 8);
        assert_eq!(max_frame_size_from_fdsi(7), 256);
        assert_eq!(max_frame_size_from_fdsi(8), 256);
    }

    #[test]
    fn fwt_grows_with_fwi() {
        let sample_rate = 10_000_000.0;
        assert!(fwt_samples(4, sample_rate) > fwt_samples(1, sample_rate));
    }

    use crate::ring::{Sample, SignalRing};

    fn push_sample(ring: &mut SignalRing, modulation_depth: f32) {
        ring.push(Sample { magnitude: 1.0, filtered: 0.0, modulation_depth, mean_deviation: 0.0 });
    }

    #[test]
    fn listen_stage_walks_tr1_s1_s2_before_payload_bits() {
        let mut nfcb = NfcB::new(256);
        nfcb.initialize(10_000_000.0).unwrap();
        nfcb.direction = Direction::Listen;
        nfcb.listen_stage = ListenStage::Tr1;
        nfcb.stage_start = 0;

        let mut ring = SignalRing::new(4096).unwrap();
        for _ in 0..4096 {
            push_sample(&mut ring, 0.0);
        }

        // Silence for less than tr1_minimum_time keeps resetting TR1.
        for _ in 0..(nfcb.protocol.tr1_minimum_time + 5) {
            push_sample(&mut ring, 0.0);
            let _ = nfcb.decode(&ring);
        }
        // Subcarrier onset advances TR1 -> S1.
        push_sample(&mut ring, 0.5);
        let _ = nfcb.decode(&ring);
        assert_eq!(nfcb.listen_stage, ListenStage::S1);

        for _ in 0..(nfcb.protocol.listen_s1_min + 1) {
            push_sample(&mut ring, 0.5);
            let _ = nfcb.decode(&ring);
        }
        assert_eq!(nfcb.listen_stage, ListenStage::S2);

        for _ in 0..(nfcb.protocol.listen_s2_min + 1) {
            push_sample(&mut ring, 0.5);
            let _ = nfcb.decode(&ring);
        }
        assert_eq!(nfcb.listen_stage, ListenStage::Payload);
    }

    #[test]
    fn listen_stage_resets_to_tr1_when_s1_window_expires() {
        let mut nfcb = NfcB::new(256);
        nfcb.initialize(10_000_000.0).unwrap();
        nfcb.direction = Direction::Listen;
        nfcb.listen_stage = ListenStage::S1;
        nfcb.stage_start = 0;

        let mut ring = SignalRing::new(4096).unwrap();
        for _ in 0..4096 {
            push_sample(&mut ring, 0.5);
        }

        for _ in 0..(nfcb.protocol.listen_s1_max + 5) {
            push_sample(&mut ring, 0.5);
            let _ = nfcb.decode(&ring);
        }
        assert_eq!(nfcb.listen_stage, ListenStage::Tr1);
    }
}

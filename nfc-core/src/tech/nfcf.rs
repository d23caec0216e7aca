//! NFC-F (FeliCa) decoder. spec.md §4.5. Runs at 212/424 kbit/s only.

use crate::bitrate::BitrateTable;
use crate::crc::crc16_nfcf;
use crate::errors::{DspError, Result};
use crate::frame::{FrameFlags, FramePhase, FrameStatus, FrameType, RawFrame, Tech as TechKind};
use crate::ring::SignalRing;
use crate::stream::StreamStatus;
use crate::symbol::{ModulationStatus, PatternType};

use super::{DecodeOutcome, Tech};

/// The two synchronisation bytes every NFC-F frame must begin with.
/// spec.md §4.5: stripped from the emitted payload; their absence sets
/// `SyncError`.
pub const SYNC_BYTES: [u8; 2] = [0xB2, 0x4D];

/// Minimum number of half-symbol correlation peaks above
/// `correlation_threshold * envelope` required before lock, spec.md §4.5.
pub const MINIMUM_PREAMBLE_PEAKS: u32 = 94;

/// spec.md §4.5: Manchester classification, polarity-aware. `reversed`
/// records the polarity decided at lock time from the sign of the last
/// integrated correlation.
pub fn classify_symbol(s0: f32, s1: f32, reversed: bool) -> PatternType {
    let high_first = s0 > s1;
    let bit_one = high_first != reversed;
    if bit_one {
        PatternType::PatternH
    } else {
        PatternType::PatternL
    }
}

/// Verify and strip the `0xB2 0x4D` sync prefix. Returns `None` (and the
/// caller sets `SyncError`) if the prefix doesn't match.
pub fn strip_sync_bytes(data: &[u8]) -> Option<&[u8]> {
    if data.len() >= 2 && data[0..2] == SYNC_BYTES {
        Some(&data[2..])
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Poll,
    Listen,
}

#[derive(Debug)]
pub struct NfcF {
    sample_rate: f64,
    bitrate: Option<BitrateTable>,
    rate_index: usize,
    modulation: ModulationStatus,
    stream: StreamStatus,
    frame_status: FrameStatus,
    direction: Direction,
    correlation_threshold: f32,
    preamble_peaks: u32,
    reversed: bool,
    frame_start: u64,
    idle_halves: u8,
}

impl NfcF {
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            sample_rate: 0.0,
            bitrate: None,
            // NFC-F only runs at 212/424k: rate indices 1 and 2.
            rate_index: 1,
            modulation: ModulationStatus::default(),
            stream: StreamStatus::new(max_frame_size, false),
            frame_status: FrameStatus::default(),
            direction: Direction::Poll,
            correlation_threshold: 0.5,
            preamble_peaks: 0,
            reversed: false,
            frame_start: 0,
            idle_halves: 0,
        }
    }

    fn bitrate(&self) -> Result<&BitrateTable> {
        self.bitrate.as_ref().ok_or(DspError::ProducerClosed.into())
    }

    fn emit_frame(&mut self, end_clock: u64) -> RawFrame {
        let raw = std::mem::take(&mut self.stream.buffer);
        let mut flags = self.stream.flags;

        let data = match strip_sync_bytes(&raw) {
            Some(payload) => payload.to_vec(),
            None => {
                flags |= FrameFlags::SYNC_ERROR;
                raw
            }
        };

        if !data.is_empty() && crate::crc::crc_mismatch(&data, crc16_nfcf) {
            flags |= FrameFlags::CRC_ERROR;
        }

        let frame_type = match self.direction {
            Direction::Poll => FrameType::PollFrame,
            Direction::Listen => FrameType::ListenFrame,
        };
        let symbol_rate = self.bitrate.as_ref().and_then(|t| t.get(self.rate_index)).map(|p| p.rate_bps).unwrap_or(0);

        let frame = RawFrame {
            tech: Some(TechKind::NfcF),
            frame_type,
            phase: FramePhase::SenseFrame,
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
        self.preamble_peaks = 0;
        self.idle_halves = 0;
        self.modulation.reset();

        frame
    }

    /// Manchester bit decode shared by both directions, spec.md §4.5: unlike
    /// NFC-A/NFC-B, the listen side uses the same alphabet as the poll side
    /// rather than a distinct subcarrier scheme, so there is no separate
    /// listen-only classifier to dispatch to.
    fn decode_manchester(&mut self, ring: &SignalRing) -> DecodeOutcome {
        let Ok(bitrate) = self.bitrate() else { return DecodeOutcome::SearchReset };
        let Some(params) = bitrate.get(self.rate_index) else { return DecodeOutcome::SearchReset };
        let half = (params.half_period as i64).max(1);

        let Some(s1) = ring.get(0) else { return DecodeOutcome::Pending };
        let Some(s0) = ring.get(half) else { return DecodeOutcome::Pending };

        if s0.modulation_depth < self.correlation_threshold && s1.modulation_depth < self.correlation_threshold {
            self.idle_halves += 1;
            if self.idle_halves >= 2 && self.stream.bytes() > 0 {
                return DecodeOutcome::Frame(self.emit_frame(ring.clock()));
            }
            return DecodeOutcome::Pending;
        }
        self.idle_halves = 0;

        let pattern = classify_symbol(s0.filtered, s1.filtered, self.reversed);
        self.stream.push_bit(pattern == PatternType::PatternH);
        DecodeOutcome::Pending
    }
}

impl Tech for NfcF {
    fn tech(&self) -> TechKind {
        TechKind::NfcF
    }

    fn initialize(&mut self, sample_rate: f64) -> Result<()> {
        self.sample_rate = sample_rate;
        self.bitrate = Some(BitrateTable::new(sample_rate)?);
        self.reset();
        Ok(())
    }

    fn detect(&mut self, ring: &SignalRing) -> bool {
        let Some(latest) = ring.get(0) else { return false };
        if latest.modulation_depth > self.correlation_threshold {
            self.preamble_peaks += 1;
        } else {
            self.preamble_peaks = 0;
        }

        if self.preamble_peaks >= MINIMUM_PREAMBLE_PEAKS {
            self.reversed = latest.filtered < 0.0;
            self.modulation.locked = true;
            self.frame_start = ring.clock();
            return true;
        }
        false
    }

    fn decode(&mut self, ring: &SignalRing) -> DecodeOutcome {
        match self.direction {
            Direction::Poll => self.decode_manchester(ring),
            Direction::Listen => self.decode_manchester(ring),
        }
    }

    fn reset(&mut self) {
        self.modulation.reset();
        self.stream.reset();
        self.preamble_peaks = 0;
        self.idle_halves = 0;
        self.frame_status.clear_frame_bounds();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_valid_sync_bytes() {
        let framed = [0xB2, 0x4D, 0x01, 0x02];
        assert_eq!(strip_sync_bytes(&framed), Some(&[0x01, 0x02][..]));
    }

    #[test]
    fn missing_sync_bytes_is_none() {
        assert_eq!(strip_sync_bytes(&[0x01, 0x02, 0x03]), None);
    }

    #[test]
    fn polarity_flips_classification() {
        assert_eq!(classify_symbol(0.8, 0.1, false), PatternType::PatternH);
        assert_eq!(classify_symbol(0.8, 0.1, true), PatternType::PatternL);
    }
}

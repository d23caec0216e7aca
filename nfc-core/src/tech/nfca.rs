//! ISO/IEC 14443-A (NFC-A) decoder. spec.md §4.3.

use crate::bitrate::BitrateTable;
use crate::crc::crc_mismatch;
use crate::errors::{DspError, Result};
use crate::frame::{FramePhase, FrameFlags, FrameStatus, FrameType, RawFrame, Tech as TechKind};
use crate::protocol::ProtocolStatus;
use crate::ring::SignalRing;
use crate::stream::StreamStatus;
use crate::symbol::{ModulationStatus, PatternType};

use super::{DecodeOutcome, Tech};

/// spec.md §4.3 step 2 default.
pub const DEFAULT_MINIMUM_MODULATION_DEEP: f32 = 0.90;

/// Poll-side symbol classification (spec.md §4.3 step 5): `S0`/`S1` are the
/// correlation integrals over the first and second half-symbol.
/// `SD = (S0 - S1) / (T/2)` already folded into `sd`.
pub fn classify_poll_symbol(sd: f32, s0: f32, s1: f32, threshold: f32) -> PatternType {
    if sd.abs() < threshold {
        PatternType::PatternY
    } else if s0 > s1 {
        PatternType::PatternZ
    } else {
        PatternType::PatternX
    }
}

/// Listen-side Manchester classification at 106 kbit/s: `PatternD` (high
/// first half) vs `PatternE` (low first half), `PatternF` for no edge
/// (EOF candidate).
pub fn classify_listen_manchester(s0: f32, s1: f32, threshold: f32) -> PatternType {
    if (s0 - s1).abs() < threshold {
        PatternType::PatternF
    } else if s0 > s1 {
        PatternType::PatternD
    } else {
        PatternType::PatternE
    }
}

/// Listen-side BPSK classification at 212/424/848: a zero-crossing of
/// `phase_integrate` flips M<->N; `|phase_integrate| < threshold` emits the
/// EOF token `PatternO`. spec.md §4.3.
pub fn classify_listen_bpsk(phase_integrate: f32, previous: PatternType, threshold: f32) -> PatternType {
    if phase_integrate.abs() < threshold {
        return PatternType::PatternO;
    }
    match previous {
        PatternType::PatternM => PatternType::PatternN,
        _ => PatternType::PatternM,
    }
}

/// spec.md §4.3 "Frame post-processing": classify by first command byte.
/// Returns the frame phase and whether the `Encrypted` chained flag should
/// latch (Mifare AUTH, 0x60/0x61).
pub fn classify_phase(first_byte: u8) -> (FramePhase, bool) {
    match first_byte {
        0x26 | 0x52 => (FramePhase::SenseFrame, false),
        0x93 | 0x95 | 0x97 | 0xE0 => (FramePhase::SelectionFrame, false),
        b if (0xD0..=0xDF).contains(&b) => (FramePhase::SelectionFrame, false),
        0x60 | 0x61 => (FramePhase::ApplicationFrame, true),
        _ => (FramePhase::ApplicationFrame, false),
    }
}

/// ISO/IEC 14443-4 PCB block-type classification, used only for adaptive
/// bookkeeping (the core does not otherwise distinguish I/R/S blocks).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    IBlock,
    RBlock,
    SBlock,
}

pub fn classify_block(pcb: u8) -> BlockKind {
    if pcb & 0x80 == 0x00 {
        BlockKind::IBlock
    } else if pcb & 0xE0 == 0xA0 {
        BlockKind::RBlock
    } else {
        BlockKind::SBlock
    }
}

/// Parse the RATS response's TB byte (`0xN1N0`) into `(fwi, sfgi)`.
/// spec.md §4.3: `frameWaitingTime = FWT[fwi]`, `startUpGuardTime = SFGT[sfgi]`.
pub fn parse_tb(tb: u8) -> (u8, u8) {
    (tb >> 4, tb & 0x0F)
}

/// `FWT[fwi] = (256 * 16 / fC) * 2^fwi` seconds, spec.md property #6;
/// returned in samples at `sample_rate`.
pub fn fwt_samples(fwi: u8, sample_rate: f64) -> u64 {
    let fwt_seconds = (256.0 * 16.0 / crate::bitrate::CARRIER_FREQ_HZ) * 2f64.powi(fwi as i32);
    (fwt_seconds * sample_rate).round() as u64
}

pub fn sfgt_samples(sfgi: u8, sample_rate: f64) -> u64 {
    if sfgi == 0 {
        return fwt_samples(0, sample_rate);
    }
    let sfgt_seconds = (256.0 * 16.0 / crate::bitrate::CARRIER_FREQ_HZ) * 2f64.powi(sfgi as i32);
    (sfgt_seconds * sample_rate).round() as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Poll,
    Listen,
}

#[derive(Debug)]
pub struct NfcA {
    sample_rate: f64,
    bitrate: Option<BitrateTable>,
    rate_index: usize,
    modulation: ModulationStatus,
    stream: StreamStatus,
    protocol: ProtocolStatus,
    frame_status: FrameStatus,
    direction: Direction,
    minimum_modulation_deep: f32,
    previous_pattern: PatternType,
    consecutive_y: u8,
    frame_start: u64,
    /// Latched once a Mifare AUTH command (0x60/0x61) is seen; subsequent
    /// frames bypass CRC/phase classification (spec.md §7 `Encrypted`).
    encrypted: bool,
    /// Set when a poll frame's first byte was RATS (0xE0); the next listen
    /// frame is then the ATS carrying TA/TB/TC, spec.md §4.3.
    pending_rats: bool,
}

impl NfcA {
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            sample_rate: 0.0,
            bitrate: None,
            rate_index: 0,
            modulation: ModulationStatus::default(),
            stream: StreamStatus::new(max_frame_size, true),
            protocol: ProtocolStatus::nfc_a(),
            frame_status: FrameStatus::default(),
            direction: Direction::Poll,
            minimum_modulation_deep: DEFAULT_MINIMUM_MODULATION_DEEP,
            previous_pattern: PatternType::PatternNone,
            consecutive_y: 0,
            frame_start: 0,
            encrypted: false,
            pending_rats: false,
        }
    }

    fn bitrate(&self) -> Result<&BitrateTable> {
        self.bitrate.as_ref().ok_or(DspError::ProducerClosed.into())
    }

    /// ATS layout `TL | T0 | [TA1] | [TB1] | [TC1] | historical`; `T0` bits
    /// 4/5/6 mark TA1/TB1/TC1 presence. spec.md §4.3: parsing TB1 updates
    /// `frameWaitingTime`/`startUpGuardTime` for the rest of the session.
    fn apply_ats_tb(&mut self, ats: &[u8]) {
        let Some(&t0) = ats.get(1) else { return };
        let mut idx = 2usize;
        if t0 & 0x10 != 0 {
            idx += 1; // TA1 present
        }
        if t0 & 0x20 == 0 {
            return; // no TB1
        }
        let Some(&tb) = ats.get(idx) else { return };
        let (fwi, sfgi) = parse_tb(tb);
        self.protocol.frame_waiting_time = fwt_samples(fwi, self.sample_rate);
        self.protocol.start_up_guard_time = sfgt_samples(sfgi, self.sample_rate);
        self.frame_status.frame_waiting_time = self.protocol.frame_waiting_time;
        self.frame_status.start_up_guard_time = self.protocol.start_up_guard_time;
    }

    fn emit_frame(&mut self, end_clock: u64) -> RawFrame {
        let data = std::mem::take(&mut self.stream.buffer);
        let mut flags = self.stream.flags;

        if matches!(data.first(), Some(0x26) | Some(0x52)) {
            // REQA/WUPA: adaptive session state resets (spec.md §3 lifecycle).
            self.encrypted = false;
            self.protocol = ProtocolStatus::nfc_a();
        }

        if self.direction == Direction::Poll {
            self.pending_rats = data.first() == Some(&0xE0);
        } else if self.pending_rats {
            self.pending_rats = false;
            self.apply_ats_tb(&data);
        }

        if data.len() == 1 {
            flags |= FrameFlags::SHORT_FRAME;
        } else if !self.encrypted && !data.is_empty() && crc_mismatch(&data, crate::crc::crc16_nfca) {
            flags |= FrameFlags::CRC_ERROR;
        }

        let phase = if self.encrypted {
            FramePhase::ApplicationFrame
        } else {
            let (phase, latch_encrypted) = data.first().map(|&b| classify_phase(b)).unwrap_or((FramePhase::Carrier, false));
            if latch_encrypted {
                self.encrypted = true;
                flags |= FrameFlags::ENCRYPTED;
            }
            phase
        };

        let frame_type = match self.direction {
            Direction::Poll => FrameType::PollFrame,
            Direction::Listen => FrameType::ListenFrame,
        };

        let symbol_rate = self.bitrate.as_ref().and_then(|t| t.get(self.rate_index)).map(|p| p.rate_bps).unwrap_or(0);

        let frame = RawFrame {
            tech: Some(TechKind::NfcA),
            frame_type,
            phase,
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
        self.consecutive_y = 0;
        self.modulation.reset();

        frame
    }
}

impl Tech for NfcA {
    fn tech(&self) -> TechKind {
        TechKind::NfcA
    }

    fn initialize(&mut self, sample_rate: f64) -> Result<()> {
        self.sample_rate = sample_rate;
        self.bitrate = Some(BitrateTable::new(sample_rate)?);
        self.reset();
        Ok(())
    }

    fn detect(&mut self, ring: &SignalRing) -> bool {
        let Ok(bitrate) = self.bitrate() else { return false };
        let Some(params) = bitrate.get(self.rate_index) else { return false };
        let Some(latest) = ring.get(0) else { return false };

        if latest.modulation_depth < self.minimum_modulation_deep {
            return false;
        }

        let period = params.period as u64;
        self.modulation.symbol_start_time = ring.clock().saturating_sub(period / 2);
        self.modulation.symbol_end_time = ring.clock();
        self.modulation.locked = true;
        self.frame_start = self.modulation.symbol_start_time;
        true
    }

    fn decode(&mut self, ring: &SignalRing) -> DecodeOutcome {
        let half = {
            let Ok(bitrate) = self.bitrate() else { return DecodeOutcome::SearchReset };
            let Some(params) = bitrate.get(self.rate_index) else { return DecodeOutcome::SearchReset };
            (params.half_period as i64).max(1)
        };

        match self.direction {
            Direction::Poll => self.decode_poll(ring, half),
            Direction::Listen if self.rate_index == 0 => self.decode_listen_manchester(ring, half),
            Direction::Listen => self.decode_listen_bpsk(ring, half),
        }
    }

    fn reset(&mut self) {
        self.modulation.reset();
        self.stream.reset();
        self.previous_pattern = PatternType::PatternNone;
        self.consecutive_y = 0;
        self.frame_status.clear_frame_bounds();
    }
}

impl NfcA {
    /// Poll-side Miller decode, spec.md §4.3 step 5.
    fn decode_poll(&mut self, ring: &SignalRing, half: i64) -> DecodeOutcome {
        let Some(s1) = ring.get(0) else { return DecodeOutcome::Pending };
        let Some(s0) = ring.get(half) else { return DecodeOutcome::Pending };

        let sd = s0.filtered - s1.filtered;
        let pattern = classify_poll_symbol(sd, s0.filtered, s1.filtered, 0.02);

        match pattern {
            PatternType::PatternY => {
                self.consecutive_y += 1;
                if self.consecutive_y >= 2
                    || (self.previous_pattern == PatternType::PatternZ && self.consecutive_y >= 1)
                {
                    self.previous_pattern = PatternType::PatternNone;
                    if self.stream.has_partial_byte() {
                        // short frame (REQA/WUPA/HLTA): 7 bits, no parity.
                        self.stream.flush_partial();
                    }
                    return DecodeOutcome::Frame(self.emit_frame(ring.clock()));
                }
            }
            PatternType::PatternZ => {
                self.consecutive_y = 0;
                self.stream.push_bit(false);
            }
            PatternType::PatternX => {
                self.consecutive_y = 0;
                self.stream.push_bit(true);
            }
            _ => {}
        }
        self.previous_pattern = pattern;
        DecodeOutcome::Pending
    }

    /// Listen-side Manchester decode at 106 kbit/s, spec.md §4.3: ATQA/SAK
    /// responses use the D/E/F alphabet rather than poll-side Miller.
    fn decode_listen_manchester(&mut self, ring: &SignalRing, half: i64) -> DecodeOutcome {
        let Some(s1) = ring.get(0) else { return DecodeOutcome::Pending };
        let Some(s0) = ring.get(half) else { return DecodeOutcome::Pending };

        let pattern = classify_listen_manchester(s0.filtered, s1.filtered, 0.02);
        match pattern {
            PatternType::PatternD => self.stream.push_bit(true),
            PatternType::PatternE => self.stream.push_bit(false),
            PatternType::PatternF => {
                if self.stream.bytes() > 0 || self.stream.has_partial_byte() {
                    if self.stream.has_partial_byte() {
                        self.stream.flush_partial();
                    }
                    self.previous_pattern = PatternType::PatternNone;
                    return DecodeOutcome::Frame(self.emit_frame(ring.clock()));
                }
            }
            _ => {}
        }
        self.previous_pattern = pattern;
        DecodeOutcome::Pending
    }

    /// Listen-side BPSK decode at 212/424/848 kbit/s, spec.md §4.3: the ring
    /// carries no raw phase, so the product of consecutive half-symbol
    /// deltas stands in for `integrationData[i] = s[i]*s[i-T]`.
    fn decode_listen_bpsk(&mut self, ring: &SignalRing, half: i64) -> DecodeOutcome {
        let Some(s1) = ring.get(0) else { return DecodeOutcome::Pending };
        let Some(s0) = ring.get(half) else { return DecodeOutcome::Pending };

        self.modulation.phase_integrate = (s0.filtered - s1.filtered) * 10.0;
        let pattern = classify_listen_bpsk(self.modulation.phase_integrate, self.previous_pattern, 0.02);

        match pattern {
            PatternType::PatternM => self.stream.push_bit(true),
            PatternType::PatternN => self.stream.push_bit(false),
            PatternType::PatternO => {
                if self.stream.bytes() > 0 || self.stream.has_partial_byte() {
                    if self.stream.has_partial_byte() {
                        self.stream.flush_partial();
                    }
                    self.previous_pattern = PatternType::PatternNone;
                    return DecodeOutcome::Frame(self.emit_frame(ring.clock()));
                }
            }
            _ => {}
        }
        self.previous_pattern = pattern;
        DecodeOutcome::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weak_signal_is_pattern_y() {
        assert_eq!(classify_poll_symbol(0.001, 0.5, 0.5, 0.02), PatternType::PatternY);
    }

    #[test]
    fn falling_half_is_pattern_z() {
        assert_eq!(classify_poll_symbol(0.5, 0.9, 0.1, 0.02), PatternType::PatternZ);
    }

    #[test]
    fn rising_half_is_pattern_x() {
        assert_eq!(classify_poll_symbol(-0.5, 0.1, 0.9, 0.02), PatternType::PatternX);
    }

    #[test]
    fn reqa_and_hlta_are_sense_frame() {
        assert_eq!(classify_phase(0x26).0, FramePhase::SenseFrame);
        assert_eq!(classify_phase(0x52).0, FramePhase::SenseFrame);
    }

    #[test]
    fn select_and_rats_are_selection_frame() {
        assert_eq!(classify_phase(0x93).0, FramePhase::SelectionFrame);
        assert_eq!(classify_phase(0xE0).0, FramePhase::SelectionFrame);
        assert_eq!(classify_phase(0xD3).0, FramePhase::SelectionFrame);
    }

    #[test]
    fn mifare_auth_sets_encrypted_latch() {
        let (phase, encrypted) = classify_phase(0x60);
        assert_eq!(phase, FramePhase::ApplicationFrame);
        assert!(encrypted);
    }

    #[test]
    fn pcb_block_classification() {
        assert_eq!(classify_block(0x02), BlockKind::IBlock);
        assert_eq!(classify_block(0xA2), BlockKind::RBlock);
        assert_eq!(classify_block(0xC2), BlockKind::SBlock);
    }

    #[test]
    fn tb_byte_splits_into_fwi_and_sfgi() {
        assert_eq!(parse_tb(0x78), (7, 8));
    }

    #[test]
    fn fwt_grows_with_fwi() {
        let sample_rate = 10_000_000.0;
        assert!(fwt_samples(4, sample_rate) > fwt_samples(1, sample_rate));
    }

    use crate::ring::{Sample, SignalRing};

    fn push_symbol(ring: &mut SignalRing, s0: f32, s1: f32, half: usize) {
        ring.push(Sample { magnitude: 1.0, filtered: s0, modulation_depth: 0.95, mean_deviation: 0.0 });
        for _ in 0..(half - 1) {
            ring.push(Sample { magnitude: 1.0, filtered: 0.0, modulation_depth: 0.95, mean_deviation: 0.0 });
        }
        ring.push(Sample { magnitude: 1.0, filtered: s1, modulation_depth: 0.95, mean_deviation: 0.0 });
    }

    #[test]
    fn listen_manchester_decodes_byte_and_emits_on_pattern_f() {
        let mut nfca = NfcA::new(256);
        nfca.initialize(10_000_000.0).unwrap();
        nfca.direction = Direction::Listen;

        let mut ring = SignalRing::new(4096).unwrap();
        for _ in 0..4096 {
            ring.push(Sample { magnitude: 1.0, filtered: 0.0, modulation_depth: 0.95, mean_deviation: 0.0 });
        }

        let half = 47usize;
        // 0x01 LSB-first (1,0,0,0,0,0,0,0), then the odd-parity bit (0, since
        // popcount(0x01) is odd).
        for bit in [true, false, false, false, false, false, false, false, false] {
            if bit {
                push_symbol(&mut ring, 0.9, 0.1, half); // PatternD
            } else {
                push_symbol(&mut ring, 0.1, 0.9, half); // PatternE
            }
            let _ = nfca.decode(&ring);
        }
        // No edge (PatternF) ends the frame once a byte has committed.
        push_symbol(&mut ring, 0.0, 0.0, half);
        match nfca.decode(&ring) {
            DecodeOutcome::Frame(frame) => {
                assert_eq!(frame.frame_type, FrameType::ListenFrame);
                assert_eq!(frame.data, vec![0x01]);
            }
            other => panic!("expected a completed listen frame, got {other:?}"),
        }
    }

    #[test]
    fn listen_bpsk_emits_on_pattern_o_once_a_byte_has_committed() {
        let mut nfca = NfcA::new(256);
        nfca.initialize(10_000_000.0).unwrap();
        nfca.direction = Direction::Listen;
        nfca.rate_index = 1; // 212 kbit/s -> BPSK listen alphabet.

        let mut ring = SignalRing::new(4096).unwrap();
        for _ in 0..4096 {
            ring.push(Sample { magnitude: 1.0, filtered: 0.0, modulation_depth: 0.95, mean_deviation: 0.0 });
        }

        let half = 23usize; // half_period at 212k/10MHz: round(10e6*64/13.56e6)/2.
        // classify_listen_bpsk toggles M<->N on every above-threshold call;
        // nine toggles from PatternNone commit 0x55 plus a matching parity bit.
        for _ in 0..9 {
            push_symbol(&mut ring, 0.9, 0.1, half);
            let _ = nfca.decode(&ring);
        }
        // Equal halves collapse phase_integrate to ~0 -> PatternO (EOF).
        push_symbol(&mut ring, 0.0, 0.0, half);
        match nfca.decode(&ring) {
            DecodeOutcome::Frame(frame) => {
                assert_eq!(frame.frame_type, FrameType::ListenFrame);
                assert_eq!(frame.data, vec![0x55]);
            }
            other => panic!("expected a completed listen frame, got {other:?}"),
        }
    }

    #[test]
    fn rats_poll_frame_arms_tb_application_for_the_paired_ats() {
        let mut nfca = NfcA::new(256);
        nfca.initialize(10_000_000.0).unwrap();

        nfca.stream.buffer = vec![0xE0, 0x80];
        let _ = nfca.emit_frame(100);
        assert!(nfca.pending_rats);

        // ATS: TL | T0 (TB1 present, no TA1) | TB1 (fwi=7, sfgi=8) | historical.
        nfca.stream.buffer = vec![0x04, 0x20, 0x78, 0x80];
        let frame = nfca.emit_frame(200);
        assert_eq!(frame.frame_type, FrameType::ListenFrame);
        assert!(!nfca.pending_rats);
        assert_eq!(nfca.protocol.frame_waiting_time, fwt_samples(7, 10_000_000.0));
        assert_eq!(nfca.protocol.start_up_guard_time, sfgt_samples(8, 10_000_000.0));
    }
}

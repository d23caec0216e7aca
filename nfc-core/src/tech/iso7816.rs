//! ISO/IEC 7816-3 contact decoder. spec.md §4.6.
//!
//! Runs against a four-channel logic capture ([`crate::logic::LogicRing`]),
//! not the RF [`crate::ring::SignalRing`] the other three technologies
//! share — there is no carrier or envelope on a contact interface. This is
//! why [`Iso7816`] does not implement [`super::Tech`]; its `detect`/`decode`
//! take a [`crate::logic::LogicRing`] instead (SPEC_FULL.md §3).

use crate::crc::{crc_mismatch, lrc, reflect8};
use crate::errors::Result;
use crate::frame::{FrameFlags, FramePhase, FrameType, RawFrame, Tech as TechKind};
use crate::logic::LogicRing;
use crate::protocol::{ErrorCodeType, ProtocolStatus, ProtocolType, SymbolConvention};

/// TA/TB/TC/TD clock-rate conversion (`Fi`) table, ISO/IEC 7816-3 Table 7.
/// `0` marks an RFU entry; SPEC_FULL.md §4.6 resolves those to the ISO
/// default `Fi = 372` (the original header defining this literal table was
/// filtered out of the retrieval pack as a non-code file).
const F_TABLE: [u32; 16] = [372, 372, 558, 744, 1116, 1488, 1860, 0, 0, 512, 768, 1024, 1536, 2048, 0, 0];
/// Baud-rate adjustment (`Di`) table, ISO/IEC 7816-3 Table 8.
const D_TABLE: [u32; 16] = [0, 1, 2, 4, 8, 16, 32, 64, 12, 20, 0, 0, 0, 0, 0, 0];

/// Half-ETU margin applied to guard/waiting windows. SPEC_FULL.md §4.6.
pub const GT_THRESHOLD: f64 = 0.5;
pub const WT_THRESHOLD: f64 = 0.5;

/// spec.md §4.6 SYNC state: `ETUsamples = (edge2 - edge1) / 3` — three bits
/// of TS's fixed `0011` pattern span the gap between the first two falling
/// edges.
pub fn measure_etu_samples(edge1: u64, edge2: u64) -> u64 {
    edge2.saturating_sub(edge1) / 3
}

/// spec.md §4.6 TS state: `0x3B` -> direct convention, `0x03` -> inverse
/// convention (and the byte is then stored as `0x3F`). Any other value
/// means reset.
pub fn detect_convention(ts: u8) -> Option<(SymbolConvention, u8)> {
    match ts {
        0x3B => Some((SymbolConvention::Direct, 0x3B)),
        0x03 => Some((SymbolConvention::Inverse, apply_inverse_convention(0x03))),
        _ => None,
    }
}

/// Inverse convention: bit order reversed, then logic-inverted. Applied to
/// every byte after TS when `symbol_convention == Inverse`.
pub fn apply_inverse_convention(byte: u8) -> u8 {
    !reflect8(byte)
}

/// TA1 nibbles -> `(Fi, Di)`, falling back to the ISO default `(372, 1)`
/// for RFU table entries (`0` in either table).
pub fn fi_di_from_ta1(ta1: u8) -> (u32, u32) {
    let fi = F_TABLE[(ta1 >> 4) as usize];
    let di = D_TABLE[(ta1 & 0x0F) as usize];
    (if fi == 0 { 372 } else { fi }, if di == 0 { 1 } else { di })
}

/// `BWT = 11 + 2^bwi` ETU, `CWT = 11 + 2^cwi` ETU (TB3 nibbles).
pub fn bwt_etu(bwi: u8) -> u64 {
    11 + (1u64 << bwi.min(31))
}

pub fn cwt_etu(cwi: u8) -> u64 {
    11 + (1u64 << cwi.min(31))
}

/// TC1 extra guard time `N` -> character guard time in ETU. `N = 255` is
/// reserved: minimum guard with no extra margin.
pub fn character_guard_time_etu(n: u8, protocol: ProtocolType) -> u64 {
    match (n, protocol) {
        (255, ProtocolType::T1) => 11,
        (255, ProtocolType::T0) => 12,
        (n, ProtocolType::T0) => 12 + n as u64,
        (n, ProtocolType::T1) => 11 + n as u64,
    }
}

/// TC2 -> character waiting time in ETU, resolving Open Question "TC2
/// waiting-time formula ... verify against ISO 7816-3" per SPEC_FULL.md
/// §4.6: `tc2 * 960 * Di` when present and nonzero, else the ISO default.
pub const CWT_DEFAULT_ETU: u64 = 9600;

pub fn character_waiting_time_etu(tc2: Option<u8>, di: u32) -> u64 {
    match tc2 {
        Some(tc) if tc > 0 => tc as u64 * 960 * di as u64,
        _ => CWT_DEFAULT_ETU,
    }
}

/// Parsed interface-byte content of an ATR, spec.md §4.6 "ATR" state.
#[derive(Debug, Clone, Default)]
pub struct AtrInfo {
    pub convention: SymbolConvention,
    pub ts_raw: u8,
    pub historical_bytes: Vec<u8>,
    pub fi: u32,
    pub di: u32,
    pub protocol_type: ProtocolType,
    pub extra_guard_time: u8,
    pub bwi: u8,
    pub cwi: u8,
    pub tc2: Option<u8>,
    pub error_code_type: ErrorCodeType,
}

/// Walk T0 and the chained TA/TB/TC/TD interface-byte groups.
/// spec.md §4.6: "parse T0 to count TAi/TBi/TCi/TDi bytes".
pub fn parse_atr(atr: &[u8]) -> Option<AtrInfo> {
    let (convention, ts_raw) = detect_convention(*atr.first()?)?;
    let mut idx = 1usize;
    let t0 = *atr.get(idx)?;
    idx += 1;
    let historical_count = (t0 & 0x0F) as usize;

    let mut y = t0 >> 4;
    let mut group = 1u8;
    let mut ta1 = None;
    let mut tb3 = None;
    let mut tc1 = None;
    let mut tc2 = None;
    let mut tc3 = None;
    let mut protocol_type = ProtocolType::T0;

    loop {
        if y & 0x1 != 0 {
            let v = *atr.get(idx)?;
            idx += 1;
            if group == 1 {
                ta1 = Some(v);
            }
        }
        if y & 0x2 != 0 {
            let v = *atr.get(idx)?;
            idx += 1;
            if group == 3 {
                tb3 = Some(v);
            }
        }
        if y & 0x4 != 0 {
            let v = *atr.get(idx)?;
            idx += 1;
            match group {
                1 => tc1 = Some(v),
                2 => tc2 = Some(v),
                3 => tc3 = Some(v),
                _ => {}
            }
        }
        if y & 0x8 != 0 {
            let td = *atr.get(idx)?;
            idx += 1;
            if group == 1 {
                protocol_type = if td & 0x0F == 1 { ProtocolType::T1 } else { ProtocolType::T0 };
            }
            y = td >> 4;
            group += 1;
        } else {
            break;
        }
    }

    let historical_bytes = atr.get(idx..idx + historical_count)?.to_vec();
    let (fi, di) = ta1.map(fi_di_from_ta1).unwrap_or((372, 1));
    let error_code_type = match tc3 {
        Some(v) if v & 0x01 == 1 => ErrorCodeType::Crc,
        _ => ErrorCodeType::Lrc,
    };

    Some(AtrInfo {
        convention,
        ts_raw,
        historical_bytes,
        fi,
        di,
        protocol_type,
        extra_guard_time: tc1.unwrap_or(0),
        bwi: tb3.map(|v| v >> 4).unwrap_or(4),
        cwi: tb3.map(|v| v & 0x0F).unwrap_or(4),
        tc2,
        error_code_type,
    })
}

/// Fold a parsed ATR into the running [`ProtocolStatus`] for this session.
pub fn apply_atr(status: &mut ProtocolStatus, info: &AtrInfo) {
    status.symbol_convention = info.convention;
    status.frequency_factor = info.fi;
    status.baud_rate_factor = info.di;
    status.recompute_etu();
    status.protocol_type = info.protocol_type;
    status.error_code_type = info.error_code_type;
    status.extra_guard_time = info.extra_guard_time as u32;
    status.character_guard_time = character_guard_time_etu(info.extra_guard_time, info.protocol_type);
    status.character_waiting_time = match info.protocol_type {
        ProtocolType::T0 => character_waiting_time_etu(info.tc2, info.di),
        ProtocolType::T1 => cwt_etu(info.cwi),
    };
    status.block_waiting_time = bwt_etu(info.bwi);
    status.block_guard_time = character_guard_time_etu(info.extra_guard_time, ProtocolType::T1);
}

/// Decode one UART-style character from its sampled bit levels.
/// `bits[0]` is the start bit, `bits[1..9]` the 8 data bits LSB-first (pre
/// any convention transform), `bits[9]` the parity bit. ISO-7816 uses even
/// parity (unlike NFC-A's odd parity, spec.md property #4). Returns the
/// convention-corrected byte and whether parity checked out.
pub fn decode_character(bits: &[bool; 10], convention: SymbolConvention) -> (u8, bool) {
    let mut byte = 0u8;
    for (i, &bit) in bits[1..9].iter().enumerate() {
        if bit {
            byte |= 1 << i;
        }
    }
    let parity_ok = (byte.count_ones() + bits[9] as u32) % 2 == 0;
    let byte = match convention {
        SymbolConvention::Direct => byte,
        SymbolConvention::Inverse => apply_inverse_convention(byte),
    };
    (byte, parity_ok)
}

/// T=0 procedure byte classification, spec.md §4.6 "T=0 TPDU".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcedureByte {
    /// `ACK == INS`: transfer all `p3` remaining data bytes.
    Ack,
    /// `ACK == INS ^ 0xFF`: transfer exactly one more byte.
    AckComplement,
    /// `0x60`: NULL, keep waiting.
    Null,
    /// `0x6X`/`0x9X`: status bytes, frame ends.
    Status,
}

pub fn classify_procedure_byte(byte: u8, ins: u8) -> ProcedureByte {
    if byte == 0x60 {
        ProcedureByte::Null
    } else if byte == ins {
        ProcedureByte::Ack
    } else if byte == (ins ^ 0xFF) {
        ProcedureByte::AckComplement
    } else if (0x60..=0x6F).contains(&byte) || (0x90..=0x9F).contains(&byte) {
        ProcedureByte::Status
    } else {
        ProcedureByte::Null
    }
}

/// Parsed PPS request/response, spec.md §4.6 "PPS (request CLA=0xFF)".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PpsParams {
    pub has_pps1: bool,
    pub has_pps2: bool,
    pub has_pps3: bool,
    pub fi_di: Option<u8>,
}

/// `PPSS=0xFF`, `PPS0` byte[1] carries the T-protocol nibble plus the
/// PPS1/PPS2/PPS3 presence mask in bits 4-6. Returns `None` if `PPSS` isn't
/// the PPS request/response marker.
pub fn parse_pps(bytes: &[u8]) -> Option<PpsParams> {
    if bytes.first().copied() != Some(0xFF) {
        return None;
    }
    let pps0 = *bytes.get(1)?;
    let has_pps1 = pps0 & 0x10 != 0;
    let has_pps2 = pps0 & 0x20 != 0;
    let has_pps3 = pps0 & 0x40 != 0;
    let fi_di = if has_pps1 { bytes.get(2).copied() } else { None };
    Some(PpsParams { has_pps1, has_pps2, has_pps3, fi_di })
}

/// T=1 block layout: `NAD|PCB|LEN|INF[0..LEN]|EDC`. spec.md §4.6.
#[derive(Debug, Clone, PartialEq)]
pub struct T1Block {
    pub nad: u8,
    pub pcb: u8,
    pub information: Vec<u8>,
}

/// Parse a complete T=1 block and validate its epilogue (LRC or CRC per
/// `error_code_type`). Returns `None` if the frame is too short or the
/// declared length doesn't fit.
pub fn parse_t1_block(data: &[u8], error_code_type: ErrorCodeType) -> Option<(T1Block, bool)> {
    if data.len() < 4 {
        return None;
    }
    let nad = data[0];
    let pcb = data[1];
    let len = data[2] as usize;
    let edc_len = match error_code_type {
        ErrorCodeType::Lrc => 1,
        ErrorCodeType::Crc => 2,
    };
    if data.len() != 3 + len + edc_len {
        return None;
    }
    let information = data[3..3 + len].to_vec();
    let epilogue_ok = match error_code_type {
        ErrorCodeType::Lrc => lrc(&data[..data.len() - 1]) == 0,
        ErrorCodeType::Crc => !crc_mismatch(data, crate::crc::crc16_b),
    };
    Some((T1Block { nad, pcb, information }, epilogue_ok))
}

/// Synthetic zero-length events emitted on VCC/RST edges, spec.md §4.6:
/// "the decoder also emits synthetic frames IsoVccHigh/Low and
/// IsoRstHigh/Low ... used by consumers to render power state".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerEvent {
    VccHigh,
    VccLow,
    RstHigh,
    RstLow,
}

impl PowerEvent {
    pub fn into_frame(self, sample_at: u64, time_at: f64) -> RawFrame {
        RawFrame {
            tech: Some(TechKind::Iso7816),
            frame_type: FrameType::None,
            phase: FramePhase::Startup,
            sample_start: sample_at,
            sample_end: sample_at,
            time_start: time_at,
            time_end: time_at,
            symbol_rate: 0,
            flags: FrameFlags::empty(),
            data: vec![self as u8],
            timestamp: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Reset,
    Sync { first_falling_edge: Option<u64> },
    Ts,
    Atr,
    /// Optional PPS request/response exchange, spec.md §4.6 "After ATR".
    /// Any character not starting with `0xFF` falls through to `Transport`.
    Pps,
    /// T=0 TPDU or T=1 block framing, selected by the ATR's `protocol_type`.
    Transport,
}

/// Tracks one UART character's bit-level timing recovery between falling
/// edges. `bits[0]` is the start bit, `bits[1..9]` data LSB-first,
/// `bits[9]` parity, matching [`decode_character`]'s layout.
#[derive(Debug, Clone, Copy)]
struct CharacterProgress {
    bit_index: usize,
    next_sample_at: u64,
    bits: [bool; 10],
}

/// Stateful contact decoder. Owns the session-adaptive [`ProtocolStatus`]
/// and the in-progress character/transport assembly buffers.
#[derive(Debug)]
pub struct Iso7816 {
    sample_rate: f64,
    state: State,
    protocol: ProtocolStatus,
    /// Bytes accumulated for whichever framing the current state expects:
    /// ATR bytes, a PPS exchange, or a T=0/T=1 transaction.
    pending_bytes: Vec<u8>,
    char_progress: Option<CharacterProgress>,
    t0_ins: Option<u8>,
    t0_status_pending: Option<u8>,
    previous: crate::logic::LogicSample,
    max_frame_size: usize,
}

impl Iso7816 {
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            sample_rate: 0.0,
            state: State::Reset,
            protocol: ProtocolStatus::iso7816(),
            pending_bytes: Vec::new(),
            char_progress: None,
            t0_ins: None,
            t0_status_pending: None,
            previous: crate::logic::LogicSample::default(),
            max_frame_size,
        }
    }

    pub fn initialize(&mut self, sample_rate: f64) -> Result<()> {
        self.sample_rate = sample_rate;
        self.reset();
        Ok(())
    }

    pub fn reset(&mut self) {
        self.state = State::Reset;
        self.pending_bytes.clear();
        self.char_progress = None;
        self.t0_ins = None;
        self.t0_status_pending = None;
        self.protocol = ProtocolStatus::iso7816();
    }

    fn etu_samples(&self) -> u64 {
        (self.protocol.elementary_time_unit.as_secs_f64() * self.sample_rate.max(1.0)).round().max(1.0) as u64
    }

    /// Walk edges on VCC/RST/IO, advancing the ATR/transport state machine.
    /// Returns any frame (power event, ATR, PPS, or transport frame) ready
    /// for emission.
    pub fn step(&mut self, ring: &LogicRing) -> Option<RawFrame> {
        let current = ring.get(0)?;
        let clock = ring.clock();
        let time = clock as f64 / self.sample_rate.max(1.0);
        let previous = self.previous;
        self.previous = current;

        if current.vcc != previous.vcc {
            let event = if current.vcc { PowerEvent::VccHigh } else { PowerEvent::VccLow };
            return Some(event.into_frame(clock, time));
        }
        if current.rst != previous.rst {
            let event = if current.rst { PowerEvent::RstHigh } else { PowerEvent::RstLow };
            if current.rst && current.vcc {
                self.state = State::Sync { first_falling_edge: None };
                self.char_progress = None;
            }
            return Some(event.into_frame(clock, time));
        }

        match self.state {
            State::Reset => None,
            State::Sync { first_falling_edge } => {
                let falling = previous.io && !current.io;
                if !falling {
                    return None;
                }
                match first_falling_edge {
                    None => self.state = State::Sync { first_falling_edge: Some(clock) },
                    Some(edge1) => {
                        let etu = measure_etu_samples(edge1, clock);
                        self.protocol.elementary_time_unit =
                            std::time::Duration::from_secs_f64(etu as f64 / self.sample_rate.max(1.0));
                        self.state = State::Ts;

                        // `edge1` is the TS character's own start-bit edge
                        // (spec.md §4.6): backfill whichever bit slots have
                        // already passed from ring history, then resume live
                        // sampling for the rest.
                        let mut bits = [false; 10];
                        let mut bit_index = 0usize;
                        while bit_index < 10 {
                            let sample_time = edge1 + etu / 2 + (bit_index as u64) * etu;
                            if sample_time > clock {
                                break;
                            }
                            let offset_back = (clock - sample_time) as i64;
                            bits[bit_index] = ring.get(offset_back).map(|s| s.io).unwrap_or(false);
                            bit_index += 1;
                        }
                        let next_sample_at = edge1 + etu / 2 + (bit_index as u64) * etu;
                        self.char_progress = Some(CharacterProgress { bit_index, next_sample_at, bits });
                    }
                }
                None
            }
            State::Ts | State::Atr | State::Pps | State::Transport => {
                self.advance_character_clock(current, previous, clock)
            }
        }
    }

    /// Detects the start-bit falling edge when idle, then samples `io` at
    /// the middle of each of the ten bit slots of a UART character.
    fn advance_character_clock(
        &mut self,
        current: crate::logic::LogicSample,
        previous: crate::logic::LogicSample,
        clock: u64,
    ) -> Option<RawFrame> {
        match self.char_progress {
            None => {
                if previous.io && !current.io {
                    let etu = self.etu_samples();
                    self.char_progress =
                        Some(CharacterProgress { bit_index: 0, next_sample_at: clock + etu / 2, bits: [false; 10] });
                }
                None
            }
            Some(mut progress) => {
                if clock < progress.next_sample_at {
                    return None;
                }
                progress.bits[progress.bit_index] = current.io;
                progress.bit_index += 1;
                if progress.bit_index >= 10 {
                    self.char_progress = None;
                    return self.handle_character(&progress.bits, clock);
                }
                progress.next_sample_at += self.etu_samples();
                self.char_progress = Some(progress);
                None
            }
        }
    }

    /// Decode one fully-sampled character and advance whichever framing the
    /// current state is assembling.
    fn handle_character(&mut self, bits: &[bool; 10], clock: u64) -> Option<RawFrame> {
        let convention = self.protocol.symbol_convention;
        let (byte, parity_ok) = decode_character(bits, convention);

        match self.state {
            State::Ts => {
                let (convention, _ts_raw) = detect_convention(byte)?;
                self.protocol.symbol_convention = convention;
                self.pending_bytes.clear();
                self.pending_bytes.push(byte);
                self.state = State::Atr;
                None
            }
            State::Atr => {
                self.pending_bytes.push(byte);
                if !parity_ok || self.pending_bytes.len() > 32 {
                    // retransmission/parity failure drops the partial
                    // character; the caller re-clocks on the next start bit.
                    self.pending_bytes.pop();
                }
                if let Some(info) = parse_atr(&self.pending_bytes) {
                    apply_atr(&mut self.protocol, &info);
                    let data = std::mem::take(&mut self.pending_bytes);
                    self.state = State::Pps;
                    return Some(RawFrame {
                        tech: Some(TechKind::Iso7816),
                        frame_type: FrameType::AtrFrame,
                        phase: FramePhase::Startup,
                        sample_start: 0,
                        sample_end: clock,
                        time_start: 0.0,
                        time_end: clock as f64 / self.sample_rate.max(1.0),
                        symbol_rate: 0,
                        flags: FrameFlags::empty(),
                        data: data.into_iter().take(self.max_frame_size).collect(),
                        timestamp: None,
                    });
                }
                None
            }
            State::Pps => self.handle_pps_byte(byte, clock),
            State::Transport => self.handle_transport_byte(byte, clock),
            State::Reset | State::Sync { .. } => None,
        }
    }

    /// PPS request and response share the same `0xFF PPS0 [PPS1] [PPS2]
    /// [PPS3] PCK` layout. A byte that doesn't start a new PPS exchange
    /// falls through to the transport framing instead.
    fn handle_pps_byte(&mut self, byte: u8, clock: u64) -> Option<RawFrame> {
        if self.pending_bytes.is_empty() && byte != 0xFF {
            self.state = State::Transport;
            return self.handle_transport_byte(byte, clock);
        }
        self.pending_bytes.push(byte);
        if self.pending_bytes.len() < 2 {
            return None;
        }
        let pps0 = self.pending_bytes[1];
        let expected_len =
            2 + (pps0 & 0x10 != 0) as usize + (pps0 & 0x20 != 0) as usize + (pps0 & 0x40 != 0) as usize + 1;
        if self.pending_bytes.len() < expected_len {
            return None;
        }

        let frame_bytes = std::mem::take(&mut self.pending_bytes);
        let checksum = frame_bytes[..frame_bytes.len() - 1].iter().fold(0u8, |acc, b| acc ^ b);
        let mut flags = FrameFlags::empty();
        if checksum != *frame_bytes.last().expect("expected_len >= 3") {
            flags |= FrameFlags::CRC_ERROR;
        }
        if let Some(pps) = parse_pps(&frame_bytes[..frame_bytes.len() - 1]) {
            if let Some(fi_di_byte) = pps.fi_di {
                let (fi, di) = fi_di_from_ta1(fi_di_byte);
                self.protocol.frequency_factor = fi;
                self.protocol.baud_rate_factor = di;
                self.protocol.recompute_etu();
            }
        }
        Some(self.make_transport_frame(FrameType::PpsFrame, FramePhase::SelectionFrame, frame_bytes, clock, flags))
    }

    fn handle_transport_byte(&mut self, byte: u8, clock: u64) -> Option<RawFrame> {
        match self.protocol.protocol_type {
            ProtocolType::T0 => self.handle_t0_byte(byte, clock),
            ProtocolType::T1 => self.handle_t1_byte(byte, clock),
        }
    }

    /// T=0 TPDU: `CLA INS P1 P2 P3` header, then procedure bytes until the
    /// SW1/SW2 status pair. SW2 is accepted unconditionally once SW1 has
    /// been classified, since ISO/IEC 7816-3 leaves its value unconstrained.
    fn handle_t0_byte(&mut self, byte: u8, clock: u64) -> Option<RawFrame> {
        self.pending_bytes.push(byte);

        if self.t0_ins.is_none() {
            if self.pending_bytes.len() < 5 {
                return None;
            }
            self.t0_ins = Some(self.pending_bytes[1]);
            return None;
        }

        if self.t0_status_pending.is_some() {
            let data = std::mem::take(&mut self.pending_bytes);
            self.t0_ins = None;
            self.t0_status_pending = None;
            return Some(self.make_transport_frame(
                FrameType::TpduFrame,
                FramePhase::ApplicationFrame,
                data,
                clock,
                FrameFlags::empty(),
            ));
        }

        let ins = self.t0_ins.expect("checked above");
        if classify_procedure_byte(byte, ins) == ProcedureByte::Status {
            self.t0_status_pending = Some(byte);
        }
        None
    }

    /// T=1 block: `NAD|PCB|LEN|INF[0..LEN]|EDC`, epilogue checked per the
    /// ATR-negotiated `error_code_type`.
    fn handle_t1_byte(&mut self, byte: u8, clock: u64) -> Option<RawFrame> {
        self.pending_bytes.push(byte);
        if self.pending_bytes.len() < 3 {
            return None;
        }
        let len = self.pending_bytes[2] as usize;
        let edc_len = match self.protocol.error_code_type {
            ErrorCodeType::Lrc => 1,
            ErrorCodeType::Crc => 2,
        };
        if self.pending_bytes.len() < 3 + len + edc_len {
            return None;
        }

        let data = std::mem::take(&mut self.pending_bytes);
        let flags = match parse_t1_block(&data, self.protocol.error_code_type) {
            Some((_block, true)) => FrameFlags::empty(),
            Some((_block, false)) => FrameFlags::CRC_ERROR,
            None => FrameFlags::TRUNCATED,
        };
        Some(self.make_transport_frame(FrameType::T1Frame, FramePhase::ApplicationFrame, data, clock, flags))
    }

    fn make_transport_frame(
        &self,
        frame_type: FrameType,
        phase: FramePhase,
        data: Vec<u8>,
        clock: u64,
        flags: FrameFlags,
    ) -> RawFrame {
        let time = clock as f64 / self.sample_rate.max(1.0);
        RawFrame {
            tech: Some(TechKind::Iso7816),
            frame_type,
            phase,
            sample_start: clock,
            sample_end: clock,
            time_start: time,
            time_end: time,
            symbol_rate: 0,
            flags,
            data: data.into_iter().take(self.max_frame_size).collect(),
            timestamp: None,
        }
    }
}

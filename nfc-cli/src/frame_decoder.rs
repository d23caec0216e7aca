//! Turns a [`RawFrame`] into a structured hex dump and a human-readable
//! command description.

use crate::logging::{DecodedFrame, FrameDecodeEvent, FrameHexDump};
use chrono::Utc;
use nfc_core::{FrameFlags, FrameType, RawFrame, Tech};

/// Well-known NFC-A command bytes, spec.md §4.3 "Frame post-processing".
fn describe_nfca_command(data: &[u8]) -> &'static str {
    match data.first() {
        Some(0x26) => "REQA",
        Some(0x52) => "WUPA",
        Some(0x50) => "HLTA",
        Some(0x93) => "SELECT (cascade level 1)",
        Some(0x95) => "SELECT (cascade level 2)",
        Some(0x97) => "SELECT (cascade level 3)",
        Some(0xE0) => "RATS",
        Some(0x60) => "AUTH (key A)",
        Some(0x61) => "AUTH (key B)",
        Some(_) => "APPLICATION",
        None => "(empty)",
    }
}

fn describe_nfcb_command(data: &[u8]) -> &'static str {
    match data.first() {
        Some(0x05) => "REQB/WUPB",
        Some(0x1D) => "ATTRIB",
        Some(0x50) => "HLTB",
        Some(_) => "APPLICATION",
        None => "(empty)",
    }
}

fn describe_nfcf_command(data: &[u8]) -> &'static str {
    match data.first() {
        Some(0x00) => "SENSF_REQ/RES (polling)",
        Some(_) => "APPLICATION",
        None => "(empty)",
    }
}

fn describe_iso7816_command(frame_type: FrameType, data: &[u8]) -> &'static str {
    match frame_type {
        FrameType::AtrFrame => "ATR",
        FrameType::PpsFrame => "PPS",
        FrameType::TpduFrame => "TPDU",
        FrameType::T1Frame => "T=1 BLOCK",
        _ if data.is_empty() => "(power event)",
        _ => "APPLICATION",
    }
}

fn flag_names(flags: FrameFlags) -> Vec<String> {
    let mut names = Vec::new();
    if flags.contains(FrameFlags::PARITY_ERROR) {
        names.push("PARITY_ERROR".to_string());
    }
    if flags.contains(FrameFlags::CRC_ERROR) {
        names.push("CRC_ERROR".to_string());
    }
    if flags.contains(FrameFlags::TRUNCATED) {
        names.push("TRUNCATED".to_string());
    }
    if flags.contains(FrameFlags::SHORT_FRAME) {
        names.push("SHORT_FRAME".to_string());
    }
    if flags.contains(FrameFlags::SYNC_ERROR) {
        names.push("SYNC_ERROR".to_string());
    }
    if flags.contains(FrameFlags::ENCRYPTED) {
        names.push("ENCRYPTED".to_string());
    }
    names
}

fn to_hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02X}", b)).collect::<Vec<_>>().join(" ")
}

pub struct FrameDecoder;

impl FrameDecoder {
    pub fn new() -> Self {
        Self
    }

    pub fn decode_frame(&self, frame_index: usize, frame: &RawFrame) -> FrameDecodeEvent {
        let tech_name = match frame.tech {
            Some(Tech::NfcA) => "NFC-A",
            Some(Tech::NfcB) => "NFC-B",
            Some(Tech::NfcF) => "NFC-F",
            Some(Tech::Iso7816) => "ISO-7816",
            None => "none",
        };

        let command = match frame.tech {
            Some(Tech::NfcA) => describe_nfca_command(&frame.data),
            Some(Tech::NfcB) => describe_nfcb_command(&frame.data),
            Some(Tech::NfcF) => describe_nfcf_command(&frame.data),
            Some(Tech::Iso7816) => describe_iso7816_command(frame.frame_type, &frame.data),
            None => "(no carrier)",
        };

        let decoded = DecodedFrame {
            tech: tech_name.to_string(),
            frame_type: format!("{:?}", frame.frame_type),
            phase: format!("{:?}", frame.phase),
            flags: flag_names(frame.flags),
            command: command.to_string(),
            sample_start: frame.sample_start,
            sample_end: frame.sample_end,
            time_start: frame.time_start,
            time_end: frame.time_end,
        };

        FrameDecodeEvent {
            timestamp: Utc::now(),
            frame_index,
            hex_dump: FrameHexDump { payload: to_hex(&frame.data) },
            decoded,
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

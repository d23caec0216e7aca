//! Frame value types and the per-session frame timing state.
//!
//! spec.md §3 "FrameStatus" / "RawFrame", §6 "Frame consumer (out)".

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Radio/contact technology a [`RawFrame`] was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tech {
    NfcA,
    NfcB,
    NfcF,
    Iso7816,
}

/// spec.md §6 `frame_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FrameType {
    #[default]
    None,
    PollFrame,
    ListenFrame,
    AtrFrame,
    /// PPS request or response, spec.md §4.6 "After ATR".
    PpsFrame,
    /// T=0 TPDU, terminated by its SW1/SW2 status byte pair.
    TpduFrame,
    /// T=1 block, `NAD|PCB|LEN|INF|EDC`.
    T1Frame,
    /// Timeout with carrier present but no pattern locked.
    NoFrame,
    /// Timeout with no carrier detected at all.
    NoSignal,
}

/// spec.md §3 `FrameStatus.phase` / §6 `phase`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FramePhase {
    #[default]
    Carrier,
    SenseFrame,
    SelectionFrame,
    ApplicationFrame,
    Startup,
}

bitflags! {
    /// Per-frame condition flags. Bit values fixed by spec.md §6.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct FrameFlags: u32 {
        const PARITY_ERROR = 0x01;
        const CRC_ERROR    = 0x02;
        const TRUNCATED    = 0x04;
        const SHORT_FRAME  = 0x08;
        const SYNC_ERROR   = 0x10;
        const ENCRYPTED    = 0x20;
    }
}

/// Immutable output value produced by the dispatcher for each decoded frame
/// or synthetic timeout event. spec.md §3 "RawFrame (output)".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFrame {
    pub tech: Option<Tech>,
    pub frame_type: FrameType,
    pub phase: FramePhase,
    pub sample_start: u64,
    pub sample_end: u64,
    pub time_start: f64,
    pub time_end: f64,
    pub symbol_rate: u32,
    pub flags: FrameFlags,
    pub data: Vec<u8>,
    /// Wall-clock timestamp, `stream_time + sample_start / sample_rate`, if
    /// the capture carries an absolute start time.
    pub timestamp: Option<f64>,
}

impl RawFrame {
    pub fn carrier_timeout(sample_at: u64, time_at: f64) -> Self {
        Self {
            tech: None,
            frame_type: FrameType::NoSignal,
            phase: FramePhase::Carrier,
            sample_start: sample_at,
            sample_end: sample_at,
            time_start: time_at,
            time_end: time_at,
            symbol_rate: 0,
            flags: FrameFlags::empty(),
            data: Vec::new(),
            timestamp: None,
        }
    }

    pub fn pattern_timeout(tech: Tech, sample_at: u64, time_at: f64) -> Self {
        Self {
            tech: Some(tech),
            frame_type: FrameType::NoFrame,
            phase: FramePhase::Carrier,
            sample_start: sample_at,
            sample_end: sample_at,
            time_start: time_at,
            time_end: time_at,
            symbol_rate: 0,
            flags: FrameFlags::empty(),
            data: Vec::new(),
            timestamp: None,
        }
    }
}

/// Expected direction of the next frame: a listen frame must follow a poll
/// frame and vice versa (spec.md §4.7, §5 "Ordering").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpectedDirection {
    #[default]
    Poll,
    Listen,
}

/// Per-session frame timing window, spec.md §3 "FrameStatus".
#[derive(Debug, Clone, Default)]
pub struct FrameStatus {
    pub frame_type: FrameType,
    pub frame_start: u64,
    pub frame_end: u64,
    pub guard_end: u64,
    pub waiting_end: u64,
    pub symbol_rate: u32,
    pub last_command: Option<u8>,
    pub frame_guard_time: u64,
    pub frame_waiting_time: u64,
    pub start_up_guard_time: u64,
    pub request_guard_time: u64,
    pub expected: ExpectedDirection,
}

impl FrameStatus {
    /// spec.md invariant: after emitting a frame, start/end reset to 0.
    pub fn clear_frame_bounds(&mut self) {
        self.frame_start = 0;
        self.frame_end = 0;
        self.frame_type = FrameType::None;
    }

    pub fn flip_expected(&mut self) {
        self.expected = match self.expected {
            ExpectedDirection::Poll => ExpectedDirection::Listen,
            ExpectedDirection::Listen => ExpectedDirection::Poll,
        };
    }

    pub fn set_response_window(&mut self, frame_end: u64, symbol_delay_detect: u64) {
        self.guard_end = frame_end + self.frame_guard_time + symbol_delay_detect;
        self.waiting_end = frame_end + self.frame_waiting_time + symbol_delay_detect;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_frame_bounds_resets_start_end_and_type() {
        let mut status = FrameStatus {
            frame_type: FrameType::PollFrame,
            frame_start: 10,
            frame_end: 20,
            ..Default::default()
        };
        status.clear_frame_bounds();
        assert_eq!(status.frame_start, 0);
        assert_eq!(status.frame_end, 0);
        assert_eq!(status.frame_type, FrameType::None);
    }

    #[test]
    fn flip_expected_toggles() {
        let mut status = FrameStatus::default();
        assert_eq!(status.expected, ExpectedDirection::Poll);
        status.flip_expected();
        assert_eq!(status.expected, ExpectedDirection::Listen);
        status.flip_expected();
        assert_eq!(status.expected, ExpectedDirection::Poll);
    }

    #[test]
    fn response_window_respects_guard_before_waiting_invariant() {
        let mut status = FrameStatus {
            frame_guard_time: 100,
            frame_waiting_time: 500,
            ..Default::default()
        };
        status.set_response_window(1000, 10);
        assert_eq!(status.guard_end, 1110);
        assert_eq!(status.waiting_end, 1510);
        assert!(status.guard_end <= status.waiting_end);
    }
}

//! Run-wide frame statistics aggregation.

use crate::logging::StatisticsEvent;
use chrono::Utc;
use nfc_core::{FrameFlags, FrameType, RawFrame};

/// Accumulates per-frame counters across a decode run.
#[derive(Debug, Default)]
pub struct TelemetryAggregator {
    total_frames: usize,
    poll_frames: usize,
    listen_frames: usize,
    atr_frames: usize,
    transport_frames: usize,
    timeouts: usize,
    crc_errors: usize,
    parity_errors: usize,
}

impl TelemetryAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, frame: &RawFrame) {
        self.total_frames += 1;
        match frame.frame_type {
            FrameType::PollFrame => self.poll_frames += 1,
            FrameType::ListenFrame => self.listen_frames += 1,
            FrameType::AtrFrame => self.atr_frames += 1,
            FrameType::PpsFrame | FrameType::TpduFrame | FrameType::T1Frame => self.transport_frames += 1,
            FrameType::NoFrame | FrameType::NoSignal => self.timeouts += 1,
            FrameType::None => {}
        }
        if frame.flags.contains(FrameFlags::CRC_ERROR) {
            self.crc_errors += 1;
        }
        if frame.flags.contains(FrameFlags::PARITY_ERROR) {
            self.parity_errors += 1;
        }
    }

    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    pub fn summary(&self, duration_secs: f64) -> StatisticsEvent {
        StatisticsEvent {
            timestamp: Utc::now(),
            duration_secs,
            total_frames: self.total_frames,
            poll_frames: self.poll_frames,
            listen_frames: self.listen_frames,
            atr_frames: self.atr_frames,
            transport_frames: self.transport_frames,
            timeouts: self.timeouts,
            crc_errors: self.crc_errors,
            parity_errors: self.parity_errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nfc_core::FramePhase;

    fn frame(frame_type: FrameType, flags: FrameFlags) -> RawFrame {
        RawFrame {
            tech: None,
            frame_type,
            phase: FramePhase::Carrier,
            sample_start: 0,
            sample_end: 0,
            time_start: 0.0,
            time_end: 0.0,
            symbol_rate: 0,
            flags,
            data: Vec::new(),
            timestamp: None,
        }
    }

    #[test]
    fn counts_frames_by_type_and_error_flag() {
        let mut agg = TelemetryAggregator::new();
        agg.record(&frame(FrameType::PollFrame, FrameFlags::empty()));
        agg.record(&frame(FrameType::ListenFrame, FrameFlags::CRC_ERROR));
        agg.record(&frame(FrameType::NoSignal, FrameFlags::empty()));

        let summary = agg.summary(1.5);
        assert_eq!(summary.total_frames, 3);
        assert_eq!(summary.poll_frames, 1);
        assert_eq!(summary.listen_frames, 1);
        assert_eq!(summary.timeouts, 1);
        assert_eq!(summary.crc_errors, 1);
    }

    #[test]
    fn buckets_pps_tpdu_and_t1_frames_as_transport() {
        let mut agg = TelemetryAggregator::new();
        agg.record(&frame(FrameType::PpsFrame, FrameFlags::empty()));
        agg.record(&frame(FrameType::TpduFrame, FrameFlags::empty()));
        agg.record(&frame(FrameType::T1Frame, FrameFlags::empty()));

        let summary = agg.summary(0.5);
        assert_eq!(summary.transport_frames, 3);
        assert_eq!(summary.atr_frames, 0);
    }
}

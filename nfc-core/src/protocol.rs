//! Per-technology adaptive protocol parameters.
//!
//! spec.md §3 "ProtocolStatus (per technology)". Populated once from a
//! technology's defaults, then adjusted at runtime as ATS/ATR/PPS frames
//! negotiate different timings (spec.md §4.3-§4.6 "Adaptive timing").

use std::time::Duration;

/// ISO-7816 symbol convention negotiated by the ATR's first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SymbolConvention {
    #[default]
    Direct,
    Inverse,
}

/// ISO-7816 protocol type selected by TD1 (T=0 byte/char framing, T=1 block
/// framing). spec.md §4.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolType {
    #[default]
    T0,
    T1,
}

/// Epilogue error-detection code selected by TC3. spec.md §4.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorCodeType {
    #[default]
    Lrc,
    Crc,
}

/// Adaptive per-session timing and framing parameters, one instance per
/// active technology. Fields not meaningful to a given technology are left
/// at their type default.
#[derive(Debug, Clone)]
pub struct ProtocolStatus {
    pub max_frame_size: usize,
    pub frame_guard_time: u64,
    pub frame_waiting_time: u64,
    pub start_up_guard_time: u64,
    pub request_guard_time: u64,

    // NFC-B extensions (spec.md §4.4).
    pub tr1_minimum_time: u64,
    pub tr1_maximum_time: u64,
    pub listen_s1_min: u64,
    pub listen_s1_max: u64,
    pub listen_s2_min: u64,
    pub listen_s2_max: u64,

    // ISO-7816 extensions (spec.md §4.6).
    pub protocol_type: ProtocolType,
    pub error_code_type: ErrorCodeType,
    pub symbol_convention: SymbolConvention,
    pub clock_frequency_hz: f64,
    pub elementary_time_unit: Duration,
    pub frequency_factor: u32,
    pub baud_rate_factor: u32,
    pub extra_guard_time: u32,
    pub character_guard_time: u64,
    pub character_waiting_time: u64,
    pub block_guard_time: u64,
    pub block_waiting_time: u64,
    pub maximum_information_size: usize,
    pub protocol_parameters_change: bool,
}

impl Default for ProtocolStatus {
    fn default() -> Self {
        Self {
            max_frame_size: 256,
            frame_guard_time: 0,
            frame_waiting_time: 0,
            start_up_guard_time: 0,
            request_guard_time: 0,
            tr1_minimum_time: 0,
            tr1_maximum_time: 0,
            listen_s1_min: 0,
            listen_s1_max: 0,
            listen_s2_min: 0,
            listen_s2_max: 0,
            protocol_type: ProtocolType::T0,
            error_code_type: ErrorCodeType::Lrc,
            symbol_convention: SymbolConvention::Direct,
            clock_frequency_hz: 3_579_545.0,
            elementary_time_unit: Duration::from_secs_f64(372.0 / 3_579_545.0),
            frequency_factor: 372,
            baud_rate_factor: 1,
            extra_guard_time: 0,
            character_guard_time: 0,
            character_waiting_time: 0,
            block_guard_time: 0,
            block_waiting_time: 0,
            maximum_information_size: 32,
            protocol_parameters_change: false,
        }
    }
}

impl ProtocolStatus {
    pub fn nfc_a() -> Self {
        Self {
            max_frame_size: 256,
            frame_guard_time: 0,
            frame_waiting_time: 0,
            start_up_guard_time: 0,
            request_guard_time: 0,
            ..Default::default()
        }
    }

    pub fn nfc_b() -> Self {
        Self {
            max_frame_size: 256,
            ..Default::default()
        }
    }

    pub fn nfc_f() -> Self {
        Self {
            max_frame_size: 256,
            ..Default::default()
        }
    }

    pub fn iso7816() -> Self {
        Self {
            max_frame_size: 256,
            ..Default::default()
        }
    }

    /// Recompute `elementary_time_unit` from `frequency_factor` /
    /// `baud_rate_factor` after a PPS/TA1 negotiation. spec.md §4.6
    /// "ETU = Fi / (Di * f)".
    pub fn recompute_etu(&mut self) {
        self.elementary_time_unit = Duration::from_secs_f64(
            self.frequency_factor as f64 / (self.baud_rate_factor as f64 * self.clock_frequency_hz),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_etu_matches_iso_default_clock_rate_conversion() {
        let status = ProtocolStatus::iso7816();
        // Fi=372, Di=1 at the ISO default 3.579545 MHz -> ETU ~= 103.96 us
        let expected = 372.0 / 3_579_545.0;
        assert!((status.elementary_time_unit.as_secs_f64() - expected).abs() < 1e-9);
    }

    #[test]
    fn recompute_etu_reflects_negotiated_factors() {
        let mut status = ProtocolStatus::iso7816();
        status.frequency_factor = 512;
        status.baud_rate_factor = 8;
        status.recompute_etu();
        let expected = 512.0 / (8.0 * status.clock_frequency_hz);
        assert!((status.elementary_time_unit.as_secs_f64() - expected).abs() < 1e-9);
    }
}

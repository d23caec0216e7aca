//! Per-rate sample-count table shared read-only by all detectors.
//!
//! spec.md §4.2: for each `r ∈ {0..3}` (rates `106 * 2^r` kbit/s), precompute
//! the number of samples in one symbol period and its fractions, plus the
//! cumulative "detection delay" so that higher rates observe the same
//! wall-clock instant after shifting.

use crate::errors::{DspError, Result};

/// NFC carrier frequency, 13.56 MHz.
pub const CARRIER_FREQ_HZ: f64 = 13_560_000.0;

/// Number of supported bit rates: 106, 212, 424, 848 kbit/s.
pub const NUM_RATES: usize = 4;

/// Per-rate sample counts and ring offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BitrateParams {
    /// Bit rate in bits per second (106_000 * 2^r).
    pub rate_bps: u32,
    /// Samples per full symbol period.
    pub period: usize,
    pub half_period: usize,
    pub quarter_period: usize,
    pub eighth_period: usize,
    pub double_period: usize,
    /// Cumulative samples needed so this rate "sees" the same wall-clock
    /// moment as rate 0 after shifting: sum of periods of all lower rates.
    pub symbol_delay_detect: usize,
}

impl BitrateParams {
    fn compute(sample_rate: f64, rate_index: usize) -> Result<Self> {
        let divisor = 128u32 >> rate_index;
        let period_f = sample_rate * divisor as f64 / CARRIER_FREQ_HZ;
        let period = period_f.round() as usize;
        if period < 4 {
            return Err(DspError::UndersampledRate {
                rate_index,
                samples: period,
                sample_rate,
            }
            .into());
        }
        Ok(Self {
            rate_bps: 106_000 * (1u32 << rate_index),
            period,
            half_period: period / 2,
            quarter_period: period / 4,
            eighth_period: period / 8,
            double_period: period * 2,
            symbol_delay_detect: 0, // filled in by BitrateTable::new
        })
    }
}

/// Immutable, shared table of [`BitrateParams`] for the four supported rates.
///
/// A rate whose period is undersampled (`T < 4` samples) at the configured
/// sample rate is *skipped* rather than making table construction fail
/// wholesale — spec.md §7: "that rate is skipped rather than fatal".
#[derive(Debug, Clone)]
pub struct BitrateTable {
    sample_rate: f64,
    rates: [Option<BitrateParams>; NUM_RATES],
}

impl BitrateTable {
    pub fn new(sample_rate: f64) -> Result<Self> {
        if sample_rate <= 0.0 {
            return Err(crate::errors::ConfigError::InvalidSampleRate { rate: sample_rate }.into());
        }

        let mut rates: [Option<BitrateParams>; NUM_RATES] = [None, None, None, None];
        let mut cumulative = 0usize;
        for r in 0..NUM_RATES {
            match BitrateParams::compute(sample_rate, r) {
                Ok(mut params) => {
                    params.symbol_delay_detect = cumulative;
                    cumulative += params.period;
                    rates[r] = Some(params);
                }
                Err(_) => rates[r] = None,
            }
        }

        Ok(Self { sample_rate, rates })
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Parameters for rate index `r`, or `None` if that rate is undersampled
    /// at this sample rate.
    pub fn get(&self, rate_index: usize) -> Option<&BitrateParams> {
        self.rates.get(rate_index).and_then(|o| o.as_ref())
    }

    pub fn supported_rates(&self) -> impl Iterator<Item = (usize, &BitrateParams)> {
        self.rates.iter().enumerate().filter_map(|(i, p)| p.as_ref().map(|p| (i, p)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_sample_rate() {
        assert!(BitrateTable::new(0.0).is_err());
        assert!(BitrateTable::new(-1.0).is_err());
    }

    #[test]
    fn period_106k_at_10mhz() {
        // T = round(10e6 * 128 / 13.56e6) = round(94.395...) = 94
        let table = BitrateTable::new(10_000_000.0).unwrap();
        let p0 = table.get(0).unwrap();
        assert_eq!(p0.period, 94);
        assert_eq!(p0.half_period, 47);
        assert_eq!(p0.rate_bps, 106_000);
    }

    #[test]
    fn higher_rates_have_shorter_periods() {
        let table = BitrateTable::new(10_000_000.0).unwrap();
        let p0 = table.get(0).unwrap().period;
        let p1 = table.get(1).unwrap().period;
        let p2 = table.get(2).unwrap().period;
        let p3 = table.get(3).unwrap().period;
        assert!(p0 > p1);
        assert!(p1 > p2);
        assert!(p2 > p3);
    }

    #[test]
    fn undersampled_rate_is_skipped_not_fatal() {
        // At a very low sample rate, 848k (r=3) collapses below 4 samples/symbol
        // while 106k (r=0) stays well-sampled.
        let table = BitrateTable::new(60_000.0).unwrap();
        assert!(table.get(0).is_some());
        assert!(table.get(3).is_none());
    }

    #[test]
    fn symbol_delay_detect_is_cumulative() {
        let table = BitrateTable::new(10_000_000.0).unwrap();
        let p0 = table.get(0).unwrap();
        let p1 = table.get(1).unwrap();
        assert_eq!(p0.symbol_delay_detect, 0);
        assert_eq!(p1.symbol_delay_detect, p0.period);
    }
}

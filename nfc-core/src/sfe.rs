//! Signal front-end: per-sample IQ -> magnitude/mean/deviation/depth.
//!
//! spec.md §4.1. Maintains three exponential moving averages (power, mean,
//! mean-absolute-deviation) and writes a [`crate::ring::Sample`] into the
//! shared ring for every incoming IQ sample.

use num_complex::Complex32;

use crate::ring::{Sample, SignalRing};

/// Below this envelope (mean magnitude), all detectors idle. spec.md §4.1
/// default `0.05`.
pub const DEFAULT_POWER_LEVEL_THRESHOLD: f32 = 0.05;

#[derive(Debug, Clone)]
pub struct SignalFrontEnd {
    sample_rate: f64,
    power: f32,
    mean: f32,
    mean_deviation: f32,
    pub power_level_threshold: f32,
}

impl SignalFrontEnd {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            power: 0.0,
            mean: 0.0,
            mean_deviation: 0.0,
            power_level_threshold: DEFAULT_POWER_LEVEL_THRESHOLD,
        }
    }

    fn weight(&self, time_constant_hz: f64) -> f32 {
        (1.0 - time_constant_hz / self.sample_rate) as f32
    }

    /// Process one IQ sample, update the EMAs, and push the resulting
    /// [`Sample`] record into `ring`.
    pub fn process(&mut self, iq: Complex32, ring: &mut SignalRing) -> Sample {
        let magnitude = iq.norm();

        let w_power = self.weight(1_000.0);
        self.power = self.power * w_power + magnitude * (1.0 - w_power);

        let w_mean = self.weight(100_000.0);
        self.mean = self.mean * w_mean + magnitude * (1.0 - w_mean);

        self.mean_deviation =
            self.mean_deviation * w_mean + (magnitude - self.mean).abs() * (1.0 - w_mean);

        let filtered = magnitude - self.mean;
        let modulation_depth = if self.mean > 0.0 {
            ((self.mean - magnitude) / self.mean).max(0.0)
        } else {
            0.0
        };

        let sample = Sample {
            magnitude,
            filtered,
            modulation_depth,
            mean_deviation: self.mean_deviation,
        };
        ring.push(sample);
        sample
    }

    /// Long-term average envelope power — used by detectors to early-exit
    /// when no carrier is present.
    pub fn envelope(&self) -> f32 {
        self.power
    }

    pub fn has_carrier(&self) -> bool {
        self.envelope() > self.power_level_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_keeps_envelope_below_threshold() {
        let mut sfe = SignalFrontEnd::new(10_000_000.0);
        let mut ring = SignalRing::new(256).unwrap();
        for _ in 0..5000 {
            sfe.process(Complex32::new(0.0, 0.0), &mut ring);
        }
        assert!(!sfe.has_carrier());
    }

    #[test]
    fn strong_carrier_exceeds_threshold() {
        let mut sfe = SignalFrontEnd::new(10_000_000.0);
        let mut ring = SignalRing::new(256).unwrap();
        for _ in 0..20_000 {
            sfe.process(Complex32::new(1.0, 0.0), &mut ring);
        }
        assert!(sfe.has_carrier());
    }

    #[test]
    fn modulation_depth_nonnegative() {
        let mut sfe = SignalFrontEnd::new(10_000_000.0);
        let mut ring = SignalRing::new(256).unwrap();
        // warm up the mean with a strong carrier, then dip below it.
        for _ in 0..10_000 {
            sfe.process(Complex32::new(1.0, 0.0), &mut ring);
        }
        let s = sfe.process(Complex32::new(1.5, 0.0), &mut ring);
        assert!(s.modulation_depth >= 0.0);
    }
}

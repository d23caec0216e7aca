//! Decoder configuration, spec.md §6 "CLI / environment surface" table.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModulationThreshold {
    pub min: f32,
    pub max: f32,
}

impl Default for ModulationThreshold {
    fn default() -> Self {
        Self { min: 0.90, max: 1.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Below this envelope, every detector idles. spec.md §4.1 default 0.05.
    pub power_level_threshold: f32,
    /// Per-tech accept-lock modulation depth window.
    pub modulation_threshold: ModulationThreshold,
    /// Fraction of envelope required as a correlation peak before lock.
    pub correlation_threshold: f32,
    /// Cap on bytes per frame, spec.md §5 "Memory discipline" default 256.
    pub max_frame_size: usize,
    /// Ring capacity in samples, must be a power of two >= 256.
    pub ring_capacity: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            power_level_threshold: 0.05,
            modulation_threshold: ModulationThreshold::default(),
            correlation_threshold: 0.5,
            max_frame_size: 256,
            ring_capacity: 4096,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_values() {
        let config = DecoderConfig::default();
        assert_eq!(config.power_level_threshold, 0.05);
        assert_eq!(config.max_frame_size, 256);
        assert_eq!(config.modulation_threshold.min, 0.90);
    }
}

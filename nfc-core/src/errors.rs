//! Error types for the NFC/ISO-7816 decoding pipeline.

use thiserror::Error;

/// Top-level error type for all `nfc-core` operations.
#[derive(Debug, Error)]
pub enum NfcError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("DSP processing error: {0}")]
    Dsp(#[from] DspError),

    #[error("frame assembly error: {0}")]
    Frame(#[from] FrameError),
}

/// Configuration-time errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid sample rate: {rate} Hz (must be > 0)")]
    InvalidSampleRate { rate: f64 },

    #[error("ring capacity {capacity} is not a power of two >= {minimum}")]
    InvalidRingCapacity { capacity: usize, minimum: usize },

    #[error("max frame size {size} is too small (must be >= 1)")]
    InvalidMaxFrameSize { size: usize },
}

/// Errors raised while running the signal front-end or a technology detector.
#[derive(Debug, Error)]
pub enum DspError {
    #[error("bitrate {rate_index} undersampled: T = {samples} samples (< 4 minimum) at {sample_rate} Hz")]
    UndersampledRate { rate_index: usize, samples: usize, sample_rate: f64 },

    #[error("ring read at offset {offset} would read a sample not yet written (clock={clock}, capacity={capacity})")]
    RingNotFilled { offset: i64, clock: u64, capacity: usize },

    #[error("sample producer closed the stream")]
    ProducerClosed,
}

/// Errors raised while assembling bytes into a `RawFrame`.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame exceeds max size: attempted {attempted}, limit {limit}")]
    Overflow { attempted: usize, limit: usize },

    #[error("guardEnd ({guard_end}) is after waitingEnd ({waiting_end})")]
    InvalidTimingWindow { guard_end: u64, waiting_end: u64 },
}

/// Result type alias for `nfc-core` operations.
pub type Result<T> = std::result::Result<T, NfcError>;

//! CLI-specific configuration structures for TOML-based configuration.

use color_eyre::eyre::{Context, Result};
use nfc_core::config::DecoderConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which capture kind a WAV file holds. spec.md §6: the core's two producer
/// contracts, `SampleSource` (RF IQ) and `LogicSampleSource` (contact).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// Two-channel I/Q capture decoded by one of NFC-A/B/F.
    Rf,
    /// Four-channel logic capture (IO, CLK, RST, VCC) decoded by ISO-7816.
    Contact,
}

/// Complete CLI configuration bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Path to the WAV capture to decode.
    pub input: PathBuf,

    #[serde(default = "default_mode")]
    pub mode: CaptureMode,

    /// Per-sample and per-frame timeout for `next_frame`, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u32,

    #[serde(default)]
    pub decoder: DecoderConfig,

    #[serde(default)]
    pub terminal: TerminalConfig,
}

fn default_mode() -> CaptureMode {
    CaptureMode::Rf
}

fn default_timeout_ms() -> u32 {
    1000
}

/// Terminal interface configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TerminalConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_target")]
    pub target: LogTarget,

    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default = "default_log_format")]
    pub format: LogFormat,

    #[serde(default = "default_log_level")]
    pub level: LogLevel,
}

fn default_log_target() -> LogTarget {
    LogTarget::Stdout
}

fn default_log_format() -> LogFormat {
    LogFormat::Json
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            target: default_log_target(),
            file_path: None,
            format: default_log_format(),
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    /// Convert CLI logging config to the core's decoder-internal log config.
    pub fn to_core_log_config(&self) -> nfc_core::logging::LogConfig {
        use nfc_core::logging::{LogConfig as CoreLogConfig, LogLevel as CoreLogLevel};

        let level = match self.level {
            LogLevel::Debug => CoreLogLevel::Debug,
            LogLevel::Info => CoreLogLevel::Info,
            LogLevel::Warn => CoreLogLevel::Warn,
            LogLevel::Error => CoreLogLevel::Error,
        };

        CoreLogConfig { level, ..Default::default() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    Stdout,
    Stderr,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Logfmt,
    Pretty,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl CliConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CliConfig =
            toml::from_str(&content).wrap_err("Failed to parse TOML configuration")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_fills_in_defaults() {
        let toml_src = "input = \"capture.wav\"\n";
        let config: CliConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(config.mode, CaptureMode::Rf);
        assert_eq!(config.timeout_ms, 1000);
        assert_eq!(config.decoder.ring_capacity, DecoderConfig::default().ring_capacity);
    }

    #[test]
    fn contact_mode_round_trips() {
        let toml_src = "input = \"iso.wav\"\nmode = \"contact\"\n";
        let config: CliConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(config.mode, CaptureMode::Contact);
    }
}

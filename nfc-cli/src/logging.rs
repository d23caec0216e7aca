//! Structured logging for decoded frames and run statistics.

use crate::config::{LogFormat, LogTarget, LoggingConfig};
use chrono::{DateTime, Utc};
use color_eyre::eyre::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Write};

/// Structured log event types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEvent {
    /// One decoded (or synthetic timeout) frame.
    FrameDecode(FrameDecodeEvent),

    /// End-of-run statistical summary.
    Statistics(StatisticsEvent),

    Info { message: String },
    Warn { message: String },
    Error { message: String, details: Option<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameDecodeEvent {
    pub timestamp: DateTime<Utc>,
    pub frame_index: usize,
    pub hex_dump: FrameHexDump,
    pub decoded: DecodedFrame,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameHexDump {
    pub payload: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedFrame {
    pub tech: String,
    pub frame_type: String,
    pub phase: String,
    pub flags: Vec<String>,
    pub command: String,
    pub sample_start: u64,
    pub sample_end: u64,
    pub time_start: f64,
    pub time_end: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsEvent {
    pub timestamp: DateTime<Utc>,
    pub duration_secs: f64,
    pub total_frames: usize,
    pub poll_frames: usize,
    pub listen_frames: usize,
    pub atr_frames: usize,
    pub transport_frames: usize,
    pub timeouts: usize,
    pub crc_errors: usize,
    pub parity_errors: usize,
}

/// Logger that writes one `LogEvent` per line in the configured format.
pub struct StructuredLogger {
    config: LoggingConfig,
    writer: Box<dyn Write + Send>,
    start_time: DateTime<Utc>,
}

impl StructuredLogger {
    pub fn new(config: LoggingConfig) -> Result<Self> {
        let writer: Box<dyn Write + Send> = match &config.target {
            LogTarget::Stdout => Box::new(io::stdout()),
            LogTarget::Stderr => Box::new(io::stderr()),
            LogTarget::File => {
                let path = config
                    .file_path
                    .as_ref()
                    .ok_or_else(|| color_eyre::eyre::eyre!("File path required for file logging"))?;
                Box::new(BufWriter::new(File::create(path)?))
            }
        };

        Ok(Self { config, writer, start_time: Utc::now() })
    }

    pub fn log(&mut self, event: LogEvent) -> Result<()> {
        let output = match self.config.format {
            LogFormat::Json => self.format_json(&event)?,
            LogFormat::Logfmt => self.format_logfmt(&event),
            LogFormat::Pretty => self.format_pretty(&event),
        };

        writeln!(self.writer, "{}", output)?;
        self.writer.flush()?;

        Ok(())
    }

    fn format_json(&self, event: &LogEvent) -> Result<String> {
        Ok(serde_json::to_string(event)?)
    }

    fn format_logfmt(&self, event: &LogEvent) -> String {
        let ts = Utc::now().to_rfc3339();

        match event {
            LogEvent::FrameDecode(f) => format!(
                "ts=\"{}\" type=frame_decode frame={} tech={} frame_type={} command=\"{}\"",
                ts, f.frame_index, f.decoded.tech, f.decoded.frame_type, f.decoded.command
            ),
            LogEvent::Statistics(s) => format!(
                "ts=\"{}\" type=statistics duration_secs={:.2} total_frames={} crc_errors={} parity_errors={} timeouts={}",
                ts, s.duration_secs, s.total_frames, s.crc_errors, s.parity_errors, s.timeouts
            ),
            LogEvent::Info { message } => format!("ts=\"{}\" level=info msg=\"{}\"", ts, message),
            LogEvent::Warn { message } => format!("ts=\"{}\" level=warn msg=\"{}\"", ts, message),
            LogEvent::Error { message, details } => match details {
                Some(d) => format!("ts=\"{}\" level=error msg=\"{}\" details=\"{}\"", ts, message, d),
                None => format!("ts=\"{}\" level=error msg=\"{}\"", ts, message),
            },
        }
    }

    fn format_pretty(&self, event: &LogEvent) -> String {
        let ts = Utc::now().format("%Y-%m-%d %H:%M:%S%.3f");

        match event {
            LogEvent::FrameDecode(f) => format!(
                "[{}] FRAME[{}]: {} {} | {} | {}",
                ts, f.frame_index, f.decoded.tech, f.decoded.frame_type, f.decoded.command, f.hex_dump.payload
            ),
            LogEvent::Statistics(s) => format!(
                "[{}] STATISTICS ({:.2}s): frames={} (poll={} listen={} atr={} transport={}) timeouts={} crc_errors={} parity_errors={}",
                ts, s.duration_secs, s.total_frames, s.poll_frames, s.listen_frames, s.atr_frames, s.transport_frames, s.timeouts, s.crc_errors, s.parity_errors
            ),
            LogEvent::Info { message } => format!("[{}] INFO: {}", ts, message),
            LogEvent::Warn { message } => format!("[{}] WARN: {}", ts, message),
            LogEvent::Error { message, details } => match details {
                Some(d) => format!("[{}] ERROR: {} | {}", ts, message, d),
                None => format!("[{}] ERROR: {}", ts, message),
            },
        }
    }

    pub fn elapsed(&self) -> f64 {
        (Utc::now() - self.start_time).num_milliseconds() as f64 / 1000.0
    }
}

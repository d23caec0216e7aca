mod config;
mod frame_decoder;
mod logging;
mod telemetry;
mod wav_source;

use clap::Parser;
use color_eyre::eyre::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use config::{CaptureMode, CliConfig};
use frame_decoder::FrameDecoder;
use logging::{LogEvent, StructuredLogger};
use nfc_core::source::PrefetchSampleSource;
use nfc_core::{ContactDispatcher, Dispatcher, RawFrame};
use telemetry::TelemetryAggregator;
use wav_source::{WavIqSource, WavLogicSource};

fn progress_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} samples ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}

#[derive(Parser, Debug)]
#[command(author, version, about = "NFC/ISO-7816 baseband capture decoder", long_about = None)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<String>,

    /// WAV capture to decode, overrides the config file's `input`.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Capture kind: `rf` (I/Q) or `contact` (4-channel logic), overrides
    /// the config file's `mode`.
    #[arg(short, long)]
    mode: Option<String>,

    /// Enable verbose diagnostic output.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();

    let mut config = if let Some(config_path) = &args.config {
        CliConfig::from_file(config_path).wrap_err_with(|| format!("Failed to load config from {}", config_path))?
    } else if let Some(input) = &args.input {
        CliConfig {
            input: input.clone(),
            mode: CaptureMode::Rf,
            timeout_ms: 1000,
            decoder: Default::default(),
            terminal: Default::default(),
        }
    } else {
        eprintln!("Error: --config or --input is required. Example: --input capture.wav");
        std::process::exit(1);
    };

    if let Some(input) = args.input {
        config.input = input;
    }
    if let Some(mode) = args.mode.as_deref() {
        config.mode = match mode {
            "rf" => CaptureMode::Rf,
            "contact" => CaptureMode::Contact,
            other => {
                eprintln!("Error: unknown --mode \"{}\", expected \"rf\" or \"contact\"", other);
                std::process::exit(1);
            }
        };
    }

    let mut logger = StructuredLogger::new(config.terminal.logging.clone())?;

    logger.log(LogEvent::Info { message: format!("decoding {}", config.input.display()) })?;

    let decoder = FrameDecoder::new();
    let mut telemetry = TelemetryAggregator::new();
    let mut frame_index = 0usize;

    match config.mode {
        CaptureMode::Rf => {
            let source = WavIqSource::load(&config.input)
                .wrap_err_with(|| format!("Failed to load RF capture {}", config.input.display()))?;
            let total_samples = source.len() as u64;
            let prefetch = PrefetchSampleSource::spawn(source, 4096, 8);
            let mut dispatcher = Dispatcher::new(prefetch, &config.decoder)?;
            let bar = progress_bar(total_samples);
            while let Some(frame) = dispatcher.next_frame(config.timeout_ms) {
                bar.set_position(frame.sample_end.min(total_samples));
                log_frame(&mut logger, &decoder, &mut telemetry, &mut frame_index, &frame)?;
            }
            bar.finish_and_clear();
        }
        CaptureMode::Contact => {
            let source = WavLogicSource::load(&config.input)
                .wrap_err_with(|| format!("Failed to load contact capture {}", config.input.display()))?;
            let total_samples = source.len() as u64;
            let mut dispatcher = ContactDispatcher::new(source, &config.decoder)?;
            let bar = progress_bar(total_samples);
            while let Some(frame) = dispatcher.next_frame(config.timeout_ms) {
                bar.set_position(frame.sample_end.min(total_samples));
                log_frame(&mut logger, &decoder, &mut telemetry, &mut frame_index, &frame)?;
            }
            bar.finish_and_clear();
        }
    }

    let stats_event = telemetry.summary(logger.elapsed());
    logger.log(LogEvent::Statistics(stats_event))?;

    if args.verbose {
        logger.log(LogEvent::Info {
            message: format!("decoded {} frames total", telemetry.total_frames()),
        })?;
    }

    Ok(())
}

fn log_frame(
    logger: &mut StructuredLogger,
    decoder: &FrameDecoder,
    telemetry: &mut TelemetryAggregator,
    frame_index: &mut usize,
    frame: &RawFrame,
) -> Result<()> {
    telemetry.record(frame);
    let event = decoder.decode_frame(*frame_index, frame);
    *frame_index += 1;
    logger.log(LogEvent::FrameDecode(event))
}

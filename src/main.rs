// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-signal-analyzer project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Main entry point for the signal analyzer

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use rust_signal_analyzer::acquisition;
use rust_signal_analyzer::config::{output_config_schema, Config};
use rust_signal_analyzer::diagnostics::LogSink;
use rust_signal_analyzer::hardware::{FixedFrequencyProvider, MockRegisters};
use rust_signal_analyzer::processing::SignalAnalyzer;
use rust_signal_analyzer::AnalysisSummary;

/// Spectral density analyzer for FPGA-based instruments
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (YAML); created with defaults if missing
    #[arg(short, long, default_value = "analyzer.yaml")]
    config: PathBuf,

    /// Acquisition duration in seconds
    #[arg(long, default_value_t = 2.0)]
    duration: f64,

    /// CIC decimation rate
    #[arg(long)]
    rate: Option<u32>,

    /// Window index (0: boxcar, 1: Hann, 2: flat top, 3: Blackman-Harris)
    #[arg(long)]
    window: Option<u32>,

    /// Input channel (0, 1, or 2 for the combined channel)
    #[arg(long)]
    channel: Option<u32>,

    /// Combined-channel operation (0: subtract, 1: add)
    #[arg(long)]
    operation: Option<u32>,

    /// Simulated tone frequency in Hz
    #[arg(long)]
    tone_frequency: Option<f64>,

    /// Output file for the analysis summary (JSON)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print the configuration JSON schema and exit
    #[arg(long)]
    show_config_schema: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.show_config_schema {
        return output_config_schema();
    }

    let mut config = Config::from_file(&args.config)?;
    config.apply_args(
        args.rate,
        args.window,
        args.channel,
        args.operation,
        args.tone_frequency,
    );

    let source = acquisition::get_sample_source(&config)?;
    let registers = Arc::new(MockRegisters::new());
    let clock = FixedFrequencyProvider::new(config.acquisition.adc_sampling_frequency);

    let mut analyzer = SignalAnalyzer::new(
        &config.analyzer,
        source,
        registers,
        &clock,
        Arc::new(LogSink),
    );

    println!("Signal Analyzer");
    println!("---------------");
    let params = analyzer.get_control_parameters();
    println!("- Sampling frequency: {} Hz", params.fs);
    println!("- Decimation rate: {}", params.rate);
    println!("- Window index: {}", params.window_index);
    println!(
        "- Averages per cycle: {}",
        analyzer.number_of_averages()
    );

    if config.acquisition.enabled {
        analyzer.start();
        thread::sleep(Duration::from_secs_f64(args.duration));
    } else {
        println!("Acquisition disabled in configuration; reporting the empty snapshot");
    }

    let snapshot = analyzer.psd_snapshot();
    let stats = analyzer.stream_stats();
    let params = analyzer.get_control_parameters();
    analyzer.stop();

    let fft_size = analyzer.fft_size();
    let (peak_bin, peak_density) = snapshot
        .calibrated
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(k, &v)| (k, v))
        .unwrap_or((0, 0.0));

    let summary = AnalysisSummary {
        peak_frequency: snapshot.bin_frequency(peak_bin, fft_size),
        peak_density,
        sampling_frequency: params.fs,
        cycles: stats.published_cycles,
        timestamp: chrono::Utc::now(),
    };

    if let Some(output_path) = args.output {
        println!("Saving results to: {}", output_path.display());
        std::fs::write(output_path, serde_json::to_string_pretty(&summary)?)?;
    } else {
        println!("Results:");
        println!("- Cycles published: {}", summary.cycles);
        println!("- Peak frequency: {:.2} Hz", summary.peak_frequency);
        println!("- Peak density: {:.3e} W/Hz", summary.peak_density);
    }

    Ok(())
}

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rust_signal_analyzer::acquisition::{
    AcquisitionError, SampleBlock, SampleSource, SimulatedSource,
};
use rust_signal_analyzer::config::{AcquisitionMode, AnalyzerConfig};
use rust_signal_analyzer::diagnostics::{DiagnosticsSink, MemorySink, Severity};
use rust_signal_analyzer::hardware::{
    FixedFrequencyProvider, HardwareRegisterInterface, MockRegisters,
};
use rust_signal_analyzer::processing::{
    AnalyzerController, LoopState, PsdResult, SharedPsdStream, SignalAnalyzer,
};
use rust_signal_analyzer::spectral::{PeriodogramAccumulator, Window, WindowKind};

const FFT_SIZE: usize = 1024;
const SEGMENTS: usize = 8;
const RATE: u32 = 32;
/// Effective sampling frequency for the block-segmented runs:
/// fs = fs_adc / (2 * rate) = 102.4 kHz, so bin k sits at k * 100 Hz.
const FS_ADC: f64 = 6_553_600.0;
const FS: f64 = 102_400.0;

fn test_config() -> AnalyzerConfig {
    AnalyzerConfig {
        fft_size: FFT_SIZE,
        segments: SEGMENTS,
        default_rate: RATE,
        ..AnalyzerConfig::default()
    }
}

fn build_analyzer(
    config: &AnalyzerConfig,
    source: SimulatedSource,
) -> (SignalAnalyzer, Arc<MemorySink>, Arc<MockRegisters>) {
    let registers = Arc::new(MockRegisters::new());
    let sink = Arc::new(MemorySink::new());
    let clock = FixedFrequencyProvider::new(FS_ADC);
    let analyzer = SignalAnalyzer::new(
        config,
        Box::new(source),
        Arc::clone(&registers) as Arc<dyn HardwareRegisterInterface>,
        &clock,
        Arc::clone(&sink) as Arc<dyn DiagnosticsSink>,
    );
    (analyzer, sink, registers)
}

fn wait_for<F: Fn() -> bool>(predicate: F, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if predicate() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    predicate()
}

fn peak_bin(psd: &[f64]) -> usize {
    psd.iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(k, _)| k)
        .unwrap()
}

fn bins_above_half_maximum(psd: &[f64]) -> usize {
    let max = psd.iter().cloned().fold(0.0f64, f64::max);
    psd.iter().filter(|&&v| v > max / 2.0).count()
}

#[test]
fn test_peak_bin_matches_tone_frequency() {
    // Tone at exactly bin 100 of the 1024-point transform.
    let tone = 100.0 * FS / FFT_SIZE as f64;
    let source = SimulatedSource::new(tone, 1.0, 0.001, 42);
    let (mut analyzer, _, _) = build_analyzer(&test_config(), source);

    analyzer.start();
    assert!(wait_for(
        || analyzer.stream_stats().published_cycles >= 1,
        Duration::from_secs(5)
    ));
    let (raw, calibrated) = analyzer.get_psd();
    analyzer.stop();

    assert_eq!(raw.len(), FFT_SIZE / 2 + 1);
    let peak = peak_bin(&calibrated);
    assert!(
        (99..=101).contains(&peak),
        "peak at bin {}, expected 100 +/- 1",
        peak
    );

    // Raw and calibrated halves are one consistent pair.
    let cal = analyzer.get_control_parameters().calibration[0];
    for (r, c) in raw.iter().zip(calibrated.iter()) {
        assert!((c - r * cal).abs() <= 1e-12 * c.abs().max(1.0));
    }
}

#[test]
fn test_boxcar_main_lobe_narrower_than_hann() {
    // Tone a quarter bin off bin 100, so the half-maximum width differs
    // between the windows.
    let tone = 100.25 * FS / FFT_SIZE as f64;

    let run = |window_id: u32| -> Vec<f64> {
        let config = AnalyzerConfig {
            default_window: window_id,
            ..test_config()
        };
        let source = SimulatedSource::new(tone, 1.0, 0.0, 42);
        let (mut analyzer, _, _) = build_analyzer(&config, source);
        analyzer.start();
        assert!(wait_for(
            || analyzer.stream_stats().published_cycles >= 1,
            Duration::from_secs(5)
        ));
        let (_, calibrated) = analyzer.get_psd();
        analyzer.stop();
        calibrated
    };

    let hann = run(1);
    let boxcar = run(0);

    assert!((99..=101).contains(&peak_bin(&hann)));
    assert!((99..=101).contains(&peak_bin(&boxcar)));

    let hann_width = bins_above_half_maximum(&hann);
    let boxcar_width = bins_above_half_maximum(&boxcar);
    assert!(
        boxcar_width < hann_width,
        "boxcar lobe ({} bins) not narrower than Hann ({} bins)",
        boxcar_width,
        hann_width
    );
}

#[test]
fn test_more_averaging_reduces_variance() {
    // Estimate one bin of a white-noise density with 1 and with 16 averaged
    // segments; the spread across repeated estimates must shrink.
    const N: usize = 512;

    let estimate = |seed: u64, count: usize| -> f64 {
        let mut source = SimulatedSource::new(0.0, 0.0, 1.0, seed);
        let window = Window::new(WindowKind::Hann, N);
        let mut acc = PeriodogramAccumulator::new(N);
        let block = source.wait_for_block(N * count, 51_200.0).unwrap();
        for segment in block.segments(N) {
            acc.accumulate(segment, &window);
        }
        acc.finalize(count)[50]
    };

    let variance = |count: usize| -> f64 {
        let values: Vec<f64> = (0..16).map(|s| estimate(1000 + s, count)).collect();
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
    };

    let single = variance(1);
    let averaged = variance(16);
    assert!(
        averaged < single,
        "variance did not decrease: single {}, averaged {}",
        single,
        averaged
    );
}

#[test]
fn test_rate_clamping_leaves_configuration_unchanged() {
    let source = SimulatedSource::new(10_000.0, 1.0, 0.0, 42);
    let config = test_config();
    let (analyzer, sink, _) = build_analyzer(&config, source);

    let before = analyzer.get_control_parameters();
    let errors_before = sink.count(Severity::Error);

    analyzer.set_rate(0);
    analyzer.set_rate(config.rate_max + 1);

    let after = analyzer.get_control_parameters();
    assert_eq!(after.rate, before.rate);
    assert_eq!(after.fs, before.fs);
    assert_eq!(after.calibration, before.calibration);
    assert_eq!(sink.count(Severity::Error), errors_before + 2);
}

#[test]
fn test_window_changes_are_atomic_under_concurrent_reads() {
    let registers = Arc::new(MockRegisters::new());
    let sink = Arc::new(MemorySink::new());
    let clock = FixedFrequencyProvider::new(FS_ADC);
    let controller = Arc::new(AnalyzerController::new(
        &test_config(),
        Arc::clone(&registers) as Arc<dyn HardwareRegisterInterface>,
        &clock,
        sink as Arc<dyn DiagnosticsSink>,
    ));

    // Exact correction pairs for the windows involved.
    let pair_for = |kind: WindowKind| {
        let w = Window::new(kind, FFT_SIZE);
        (w.w1(), w.w2())
    };
    let boxcar = pair_for(WindowKind::Boxcar);
    let blackman_harris = pair_for(WindowKind::BlackmanHarris);
    let hann = pair_for(WindowKind::Hann);

    let writer = {
        let controller = Arc::clone(&controller);
        thread::spawn(move || {
            for i in 0..500 {
                controller.select_window(if i % 2 == 0 { 0 } else { 3 });
            }
        })
    };

    loop {
        let finished = writer.is_finished();
        let params = controller.snapshot();
        let pair = (params.w1, params.w2);
        // The scalars must always belong to a single window, never a mix,
        // and must agree with the reported index.
        let matches_index = match params.window_index {
            0 => pair == boxcar,
            3 => pair == blackman_harris,
            // Startup default, still visible before the first toggle lands.
            1 => pair == hann,
            _ => false,
        };
        assert!(
            matches_index,
            "torn configuration: index {} with W1/W2 {:?}",
            params.window_index, pair
        );
        if finished {
            break;
        }
    }
    writer.join().unwrap();

    // The hardware coefficient table settles together with the scalars.
    let params = controller.snapshot();
    assert!(params.window_index == 0 || params.window_index == 3);
    let kind = WindowKind::from_index(params.window_index).unwrap();
    let expected_table = Window::new(kind, FFT_SIZE).hardware_table();
    assert_eq!(
        registers.array(rust_signal_analyzer::hardware::fields::WINDOW_COEFFICIENTS),
        expected_table
    );
}

#[test]
fn test_snapshots_never_mix_cycles() {
    // Publish results whose halves are correlated, and verify from many
    // reader threads that a snapshot is always internally consistent.
    let stream = Arc::new(SharedPsdStream::new(64, 1000.0));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let stream = Arc::clone(&stream);
            thread::spawn(move || {
                for _ in 0..2000 {
                    let snapshot = stream.snapshot();
                    let first = snapshot.raw[0];
                    assert!(snapshot.raw.iter().all(|&v| v == first));
                    assert!(snapshot.calibrated.iter().all(|&v| v == first * 2.0));
                    assert_eq!(snapshot.cycle, first as u64);
                }
            })
        })
        .collect();

    for cycle in 1..=2000u64 {
        let value = cycle as f64;
        let mut result = PsdResult::zeroed(64, 1000.0);
        result.raw = vec![value; 64];
        result.calibrated = vec![value * 2.0; 64];
        result.cycle = cycle;
        stream.publish(result);
    }

    for reader in readers {
        reader.join().unwrap();
    }
}

#[test]
fn test_stop_reaches_stopped_and_freezes_publication() {
    let tone = 100.0 * FS / FFT_SIZE as f64;
    let source = SimulatedSource::new(tone, 1.0, 0.0, 42);
    let (mut analyzer, _, _) = build_analyzer(&test_config(), source);

    analyzer.start();
    assert!(analyzer.is_running());
    assert!(wait_for(
        || analyzer.stream_stats().published_cycles >= 1,
        Duration::from_secs(5)
    ));

    analyzer.stop();
    assert_eq!(analyzer.state(), LoopState::Stopped);

    let frozen = analyzer.stream_stats().published_cycles;
    thread::sleep(Duration::from_millis(100));
    assert_eq!(analyzer.stream_stats().published_cycles, frozen);

    // stop() is idempotent, start() after stop is refused.
    analyzer.stop();
    analyzer.start();
    assert_eq!(analyzer.state(), LoopState::Stopped);
}

#[test]
fn test_get_psd_is_zero_before_first_cycle() {
    let source = SimulatedSource::new(10_000.0, 1.0, 0.0, 42);
    let (analyzer, _, _) = build_analyzer(&test_config(), source);

    let (raw, calibrated) = analyzer.get_psd();
    assert_eq!(raw.len(), FFT_SIZE / 2 + 1);
    assert_eq!(calibrated.len(), FFT_SIZE / 2 + 1);
    assert!(raw.iter().all(|&v| v == 0.0));
    assert!(calibrated.iter().all(|&v| v == 0.0));
}

#[test]
fn test_persistent_stall_surfaces_and_stops() {
    let config = AnalyzerConfig {
        max_consecutive_failures: 3,
        ..test_config()
    };
    let tone = 100.0 * FS / FFT_SIZE as f64;
    let source = SimulatedSource::new(tone, 1.0, 0.0, 42).with_stall_after(1);
    let (mut analyzer, sink, _) = build_analyzer(&config, source);

    analyzer.start();
    assert!(wait_for(
        || analyzer.state() == LoopState::Stopped,
        Duration::from_secs(5)
    ));

    // The good cycle made it out before the failure budget ran out.
    assert_eq!(analyzer.stream_stats().published_cycles, 1);
    assert!(sink.count(Severity::Error) >= 3);
}

/// Stand-in for the FPGA accumulator core: the progress counter advances by
/// one accumulation per poll and the readout is a canned raw average.
struct HardwareAveragedSource {
    counter: u64,
    step: u64,
    raw: Vec<f64>,
}

impl SampleSource for HardwareAveragedSource {
    fn wait_for_block(
        &mut self,
        size: usize,
        expected_rate: f64,
    ) -> Result<SampleBlock, AcquisitionError> {
        assert_eq!(size, self.raw.len());
        Ok(SampleBlock::new(self.raw.clone(), expected_rate))
    }

    fn read_cycle_counter(&mut self) -> u64 {
        self.counter += self.step;
        self.counter
    }
}

#[test]
fn test_cycle_averaged_mode_applies_channel_calibration() {
    let config = AnalyzerConfig {
        fft_size: 256,
        n_cycles: 4,
        mode: AcquisitionMode::CycleAveraged,
        ..AnalyzerConfig::default()
    };
    let raw: Vec<f64> = (0..128).map(|k| (k + 1) as f64).collect();
    let source = HardwareAveragedSource {
        counter: 0,
        step: 4,
        raw: raw.clone(),
    };

    let registers = Arc::new(MockRegisters::new());
    let sink = Arc::new(MemorySink::new());
    let clock = FixedFrequencyProvider::new(15_000_000.0);
    let mut analyzer = SignalAnalyzer::new(
        &config,
        Box::new(source),
        registers,
        &clock,
        sink as Arc<dyn DiagnosticsSink>,
    );

    analyzer.start();
    assert!(wait_for(
        || analyzer.stream_stats().published_cycles >= 1,
        Duration::from_secs(5)
    ));
    let snapshot = analyzer.psd_snapshot();
    analyzer.stop();

    assert_eq!(snapshot.raw.len(), 128);
    assert_eq!(snapshot.raw, raw);

    // Channel A is selected at startup; its calibration scalar converts the
    // raw readout.
    let cal = analyzer.get_control_parameters().calibration[0];
    assert!(cal > 0.0);
    for (r, c) in snapshot.raw.iter().zip(snapshot.calibrated.iter()) {
        assert!((c - r * cal).abs() <= 1e-15 * c.abs().max(1.0));
    }
}

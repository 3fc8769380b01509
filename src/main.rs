//! # Flight Core
//!
//! Host runner for the flight controller input pipeline.
//!
//! Decodes SBUS frames from a receiver on a serial port into the receiver
//! channel array, brings up the accelerometer through the detection chain and
//! keeps its trims calibrated and persisted.

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use flight_core::config::{Config, LoggingConfig};
use flight_core::persist::{run_save_task, save_channel, ConfigStore};
use flight_core::rx::packed::SbusChannels16;
use flight_core::rx::sbus_channels::{sbus_channels_decode, sbus_channels_init, SbusVariant};
use flight_core::rx::{FrameStatus, RxRuntimeState};
use flight_core::sensors::acc_detect::AccProber;
use flight_core::sensors::acceleration::{Accelerometer, GyroDev};
use flight_core::sensors::fake::{requests_physical_part, FakeAcc, FakeAccBus};
use flight_core::sensors::SensorRegistry;
use flight_core::serial::SbusSerial;

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Frames the receive task may queue ahead of the control loop
const FRAME_QUEUE_DEPTH: usize = 8;

/// Seconds between status log messages
const STATUS_INTERVAL_S: u64 = 5;

/// Mounting offset of the simulated accelerometer, in raw units
const FAKE_ACC_OFFSET: [i16; 3] = [18, -6, 11];

/// Set up stdout logging, plus a daily rolling file when a log dir is set.
///
/// The returned guard must be held for the file writer to flush.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    use tracing_subscriber::prelude::*;

    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    match &config.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "flight-core.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

/// Loop ticks between accelerometer updates.
fn acc_update_divider(loop_rate_hz: u16, acc_sample_rate_hz: u16) -> u64 {
    if acc_sample_rate_hz == 0 {
        return 1;
    }
    u64::from((loop_rate_hz / acc_sample_rate_hz).max(1))
}

/// Forward frames from the receiver port until it closes or fails.
async fn run_rx_task(mut serial: SbusSerial, tx: mpsc::Sender<SbusChannels16>) {
    loop {
        match serial.read_frame().await {
            Ok(Some(frame)) => {
                if tx.send(frame).await.is_err() {
                    break;
                }
            }
            Ok(None) => {
                warn!("SBUS receiver port closed");
                break;
            }
            Err(e) => {
                warn!("SBUS receive failed: {}", e);
                break;
            }
        }
    }
    info!(
        "SBUS receive stopped after {} frames ({} resyncs)",
        serial.frame_count(),
        serial.resync_count()
    );
}

/// Main entry point for Flight Core
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration, set up logging
///    - Restore persisted calibration, if any
///    - Bind SBUS to the receiver runtime, open the receiver port
///    - Detect and initialize the accelerometer
///    - Start a calibration run if the trims were never calibrated
///
/// 2. **Main Loop**
///    - Decode queued SBUS frames at the configured loop rate
///    - Feed the accelerometer at its sample rate
///    - Log channel and attitude status periodically
///    - Handle Ctrl+C for graceful shutdown
///
/// 3. **Graceful Shutdown**
///    - Close the save queue and wait for pending saves
///
/// # Errors
///
/// Returns error if:
/// - Configuration cannot be loaded
/// - The receiver port cannot be opened
/// - No accelerometer is detected
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let mut config = Config::load(&config_path)?;

    let _log_guard = init_logging(&config.logging);

    info!("Flight Core v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", config_path);

    // Restore calibration saved by an earlier run
    let store = ConfigStore::new(&config.persist.path);
    match store.load() {
        Ok(Some(state)) => {
            info!("Restored calibration saved at {}", state.saved_at);
            config.accelerometer.acc_zero = state.accelerometer.acc_zero;
            config.accelerometer.trims = state.accelerometer.trims;
        }
        Ok(None) => debug!("No stored calibration at {}", store.path().display()),
        Err(e) => warn!("Ignoring stored calibration: {}", e),
    }

    // Receiver
    let mut rx_state = RxRuntimeState::new();
    sbus_channels_init(&config.rx, &mut rx_state, SbusVariant::Channels16);

    let (frame_tx, mut frame_rx) = mpsc::channel(FRAME_QUEUE_DEPTH);
    if config.rx.port.is_empty() {
        info!("No receiver port configured, channels stay centered");
        drop(frame_tx);
    } else {
        let serial = SbusSerial::open(&config.rx.port, config.rx.read_buffer_size)?;
        tokio::spawn(run_rx_task(serial, frame_tx));
    }

    // Accelerometer
    let mut registry = SensorRegistry::new();
    let mut bus = FakeAccBus::new();
    if requests_physical_part(config.accelerometer.hardware) {
        info!(
            "Host build has only the simulated accelerometer driver, {:?} will fall back to it",
            config.accelerometer.hardware
        );
    }
    let mut accel = Accelerometer::init(
        config.scheduler.acc_sample_rate_hz,
        &config.accelerometer,
        &config.gyro,
        &GyroDev::default(),
        &mut bus,
        &AccProber::new(),
        &mut registry,
    )?;
    let mut acc_source = FakeAcc::new(FAKE_ACC_OFFSET);

    let (mut notifier, save_rx) = save_channel();
    let save_task = tokio::spawn(run_save_task(save_rx, store));

    if !config.accelerometer.acc_has_been_calibrated() {
        accel.start_calibration();
    }

    let loop_rate_hz = config.scheduler.loop_rate_hz;
    let acc_divider = acc_update_divider(loop_rate_hz, config.scheduler.acc_sample_rate_hz);
    let mut loop_interval = interval(Duration::from_micros(1_000_000 / u64::from(loop_rate_hz)));
    let status_ticks = STATUS_INTERVAL_S * u64::from(loop_rate_hz);

    info!("Starting control loop at {}Hz", loop_rate_hz);
    info!("Press Ctrl+C to exit");

    let mut ticks: u64 = 0;
    let mut frames: u64 = 0;
    let mut last_status = FrameStatus::PENDING;

    loop {
        tokio::select! {
            _ = loop_interval.tick() => {
                while let Ok(frame) = frame_rx.try_recv() {
                    let status = sbus_channels_decode(&mut rx_state, &frame);
                    if status.is_failsafe() && !last_status.is_failsafe() {
                        warn!("Receiver reports failsafe");
                    } else if !status.is_failsafe() && last_status.is_failsafe() {
                        info!("Receiver recovered from failsafe");
                    }
                    last_status = status;
                    frames += 1;
                }

                if ticks % acc_divider == 0 {
                    let sample = acc_source.sample(accel.acc.dev.acc_1g);
                    accel.update(sample, &mut config.accelerometer, &mut notifier);
                }

                ticks += 1;

                if ticks % status_ticks == 0 {
                    let sticks: Vec<f32> = (0..4).filter_map(|chan| rx_state.read_raw(chan)).collect();
                    info!(
                        "frames={} status={:?} sticks={:?} acc={:?} calibrating={}",
                        frames,
                        last_status,
                        sticks,
                        accel.acc.acc_smoothed,
                        !accel.is_calibration_complete()
                    );
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                info!("Total frames decoded: {}", frames);
                break;
            }
        }
    }

    drop(notifier);
    if let Err(e) = save_task.await {
        warn!("Save task ended abnormally: {}", e);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acc_divider() {
        assert_eq!(acc_update_divider(1000, 1000), 1);
        assert_eq!(acc_update_divider(8000, 1000), 8);
        assert_eq!(acc_update_divider(1000, 0), 1);
        // Never zero, even if the acc rate exceeds the loop rate
        assert_eq!(acc_update_divider(500, 1000), 1);
    }

    #[test]
    fn test_loop_period_calculation() {
        let period = Duration::from_micros(1_000_000 / 1000);
        assert_eq!(period, Duration::from_millis(1));
    }
}

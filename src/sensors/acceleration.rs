//! # Acceleration
//!
//! Accelerometer bring-up, per-tick sample processing and trim calibration.
//!
//! ## Calibration
//!
//! Calibration averages [`CALIBRATING_ACC_CYCLES`] consecutive aligned
//! samples with the board held level. On the last cycle the average is
//! written as the new trims (Z minus one g), the trims are flagged as
//! calibrated and a configuration save is requested.
//!
//! While calibration runs the live sample reads as zero and the trims read
//! as zero.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::acc_detect::{AccBus, AccHardware, AccProber, MpuDetectionResult};
use super::alignment::{build_rotation_matrix_from_alignment, rotate, RotationMatrix, SensorAlign, ROTATION_IDENTITY};
use super::SensorRegistry;
use crate::config::GyroConfig;
use crate::error::{FlightCoreError, Result};
use crate::filter::Pt1Filter;
use crate::persist::SaveNotifier;

/// Samples averaged by one calibration run
pub const CALIBRATING_ACC_CYCLES: u16 = 400;

/// Nominal one-g reading before the driver overrides it
pub const ACC_1G_DEFAULT: u16 = 256;

const X: usize = 0;
const Y: usize = 1;
const Z: usize = 2;

/// Driver init hook bound during detection.
pub type AccDriverInitFn = fn(&mut AccDev);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusType {
    #[default]
    None,
    I2c,
    Spi,
}

/// Bus link to a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BusDevice {
    pub bus_type: BusType,
    pub address: u8,
}

/// Gyro state the accelerometer shares with, as it sits on the same IMU.
#[derive(Debug, Clone, Copy, Default)]
pub struct GyroDev {
    pub bus: BusDevice,
    pub mpu_detection_result: MpuDetectionResult,
}

/// Bound accelerometer driver and its static parameters.
#[derive(Debug, Clone)]
pub struct AccDev {
    pub gyro: Option<BusDevice>,
    pub mpu_detection_result: MpuDetectionResult,
    pub acc_high_fsr: bool,
    pub acc_align: SensorAlign,
    pub rotation_matrix: RotationMatrix,
    /// Raw reading for one g
    pub acc_1g: u16,
    pub acc_1g_rec: f32,
    pub hardware: AccHardware,
    pub init_fn: Option<AccDriverInitFn>,
}

impl Default for AccDev {
    fn default() -> Self {
        Self {
            gyro: None,
            mpu_detection_result: MpuDetectionResult::default(),
            acc_high_fsr: false,
            acc_align: SensorAlign::Default,
            rotation_matrix: ROTATION_IDENTITY,
            acc_1g: 0,
            acc_1g_rec: 0.0,
            hardware: AccHardware::None,
            init_fn: None,
        }
    }
}

/// Accelerometer instance.
#[derive(Debug, Clone, Default)]
pub struct Acc {
    pub dev: AccDev,
    pub sample_rate_hz: u16,
    /// Latest aligned, trimmed sample
    pub acc_adc: [i32; 3],
    pub acc_smoothed: [f32; 3],
}

/// Per-axis zero offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FlightDynamicsTrims {
    /// X, Y, Z offsets in raw units
    #[serde(default)]
    pub raw: [i16; 3],
    #[serde(default)]
    pub calibration_completed: bool,
}

/// Small level adjustments applied on top of the zero offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RollAndPitchTrims {
    #[serde(default)]
    pub roll: i16,
    #[serde(default)]
    pub pitch: i16,
}

/// Persisted accelerometer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccelerometerConfig {
    /// Hardware preference for detection
    #[serde(default)]
    pub hardware: AccHardware,

    #[serde(default)]
    pub high_fsr: bool,

    /// Smoothing cutoff; 0 disables the lowpass
    #[serde(default = "default_lpf_hz")]
    pub lpf_hz: u16,

    #[serde(default)]
    pub acc_zero: FlightDynamicsTrims,

    #[serde(default)]
    pub trims: RollAndPitchTrims,
}

fn default_lpf_hz() -> u16 {
    10
}

impl Default for AccelerometerConfig {
    fn default() -> Self {
        Self {
            hardware: AccHardware::Default,
            high_fsr: false,
            lpf_hz: default_lpf_hz(),
            acc_zero: FlightDynamicsTrims::default(),
            trims: RollAndPitchTrims::default(),
        }
    }
}

impl AccelerometerConfig {
    /// Whether a calibration has ever completed for these trims.
    #[must_use]
    pub fn acc_has_been_calibrated(&self) -> bool {
        self.acc_zero.calibration_completed
    }

    pub fn acc_reset_roll_and_pitch_trims(&mut self) {
        self.trims = RollAndPitchTrims::default();
    }

    /// Nudge the roll/pitch trims, saturating at the `i16` range.
    pub fn apply_accelerometer_trims_delta(&mut self, delta: &RollAndPitchTrims) {
        self.trims.roll = self.trims.roll.saturating_add(delta.roll);
        self.trims.pitch = self.trims.pitch.saturating_add(delta.pitch);
    }
}

/// Calibration and filter state of the acceleration pipeline.
#[derive(Debug, Clone, Default)]
pub struct AccelerationRuntime {
    calibrating_a: u16,
    calibration_sum: [i32; 3],
    acc_lpf_cut_hz: u16,
    acc_filter: [Pt1Filter; 3],
}

impl AccelerationRuntime {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a calibration run.
    ///
    /// Restarting mid-run discards the samples gathered so far.
    pub fn start_calibration(&mut self) {
        info!("Accelerometer calibration started ({} cycles)", CALIBRATING_ACC_CYCLES);
        self.calibrating_a = CALIBRATING_ACC_CYCLES;
    }

    #[must_use]
    pub fn is_calibration_complete(&self) -> bool {
        self.calibrating_a == 0
    }

    #[must_use]
    pub fn calibration_cycles_remaining(&self) -> u16 {
        self.calibrating_a
    }

    fn is_on_first_calibration_cycle(&self) -> bool {
        self.calibrating_a == CALIBRATING_ACC_CYCLES
    }

    fn is_on_final_calibration_cycle(&self) -> bool {
        self.calibrating_a == 1
    }

    /// Run one calibration cycle over the current sample.
    ///
    /// Accumulates `acc.acc_adc`, then zeroes it and the trims. On the final
    /// cycle writes the averaged trims into `config`, marks them calibrated
    /// and asks `saver` to persist them. Does nothing once complete.
    pub fn perform_calibration(&mut self, acc: &mut Acc, config: &mut AccelerometerConfig, saver: &mut dyn SaveNotifier) {
        if self.is_calibration_complete() {
            return;
        }

        let half = i32::from(CALIBRATING_ACC_CYCLES / 2);
        let cycles = i32::from(CALIBRATING_ACC_CYCLES);

        for axis in 0..3 {
            if self.is_on_first_calibration_cycle() {
                self.calibration_sum[axis] = 0;
            }
            self.calibration_sum[axis] += acc.acc_adc[axis];
            acc.acc_adc[axis] = 0;
            config.acc_zero.raw[axis] = 0;
        }

        if self.is_on_final_calibration_cycle() {
            let avg = |sum: i32| (sum + half) / cycles;
            config.acc_zero.raw[X] = saturate_i16(avg(self.calibration_sum[X]));
            config.acc_zero.raw[Y] = saturate_i16(avg(self.calibration_sum[Y]));
            config.acc_zero.raw[Z] = saturate_i16(avg(self.calibration_sum[Z]) - i32::from(acc.dev.acc_1g));
            config.acc_zero.calibration_completed = true;

            info!(
                "Accelerometer calibrated: trims [{}, {}, {}]",
                config.acc_zero.raw[X], config.acc_zero.raw[Y], config.acc_zero.raw[Z]
            );
            saver.save_config_and_notify(config);
        }

        self.calibrating_a -= 1;
    }

    /// Set up the smoothing filters for `sample_rate_hz`.
    ///
    /// The cutoff is only armed when a sample rate is known.
    pub fn init_filters(&mut self, sample_rate_hz: u16, lpf_hz: u16) {
        self.acc_lpf_cut_hz = if sample_rate_hz > 0 { lpf_hz } else { 0 };

        if self.acc_lpf_cut_hz > 0 {
            let filter = Pt1Filter::new(f32::from(self.acc_lpf_cut_hz), f32::from(sample_rate_hz));
            self.acc_filter = [filter; 3];
        }
        debug!("Accelerometer lowpass: {} Hz", self.acc_lpf_cut_hz);
    }

    #[must_use]
    pub fn lpf_cut_hz(&self) -> u16 {
        self.acc_lpf_cut_hz
    }
}

fn saturate_i16(value: i32) -> i16 {
    // Clamped into range, so the cast is lossless
    value.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

/// Detected accelerometer together with its processing state.
#[derive(Debug, Clone)]
pub struct Accelerometer {
    pub acc: Acc,
    pub runtime: AccelerationRuntime,
}

impl Accelerometer {
    /// Detect and initialize the accelerometer.
    ///
    /// # Arguments
    ///
    /// * `sample_rate_hz` - Rate `update` will be called at
    /// * `config` - Accelerometer settings
    /// * `gyro_config` - Selects the device whose alignment is used
    /// * `gyro` - Bus link and detection result shared with the gyro
    /// * `bus` - Driver probe entry points
    /// * `prober` - Probe table to scan
    /// * `registry` - Records the detected accelerometer
    ///
    /// # Errors
    ///
    /// Returns `FlightCoreError::SensorUnavailable` if no accelerometer was
    /// detected.
    pub fn init<B: AccBus + ?Sized>(
        sample_rate_hz: u16,
        config: &AccelerometerConfig,
        gyro_config: &GyroConfig,
        gyro: &GyroDev,
        bus: &mut B,
        prober: &AccProber,
        registry: &mut SensorRegistry,
    ) -> Result<Self> {
        let mut acc = Acc::default();

        acc.dev.gyro = Some(gyro.bus);
        acc.dev.mpu_detection_result = gyro.mpu_detection_result;
        acc.dev.acc_high_fsr = config.high_fsr;

        let device = gyro_config.active_device();
        acc.dev.acc_align = device.alignment;
        acc.dev.rotation_matrix = build_rotation_matrix_from_alignment(&device.custom_alignment);

        if !prober.detect(bus, &mut acc.dev, config.hardware, registry) {
            return Err(FlightCoreError::SensorUnavailable("accelerometer"));
        }

        acc.dev.acc_1g = ACC_1G_DEFAULT;
        if let Some(init_fn) = acc.dev.init_fn {
            init_fn(&mut acc.dev);
        }
        acc.dev.acc_1g_rec = 1.0 / f32::from(acc.dev.acc_1g.max(1));
        acc.sample_rate_hz = sample_rate_hz;

        let mut runtime = AccelerationRuntime::new();
        runtime.init_filters(sample_rate_hz, config.lpf_hz);

        info!(
            "Accelerometer {:?} ready: 1g = {}, align {:?}, {} Hz",
            acc.dev.hardware, acc.dev.acc_1g, acc.dev.acc_align, sample_rate_hz
        );

        Ok(Self { acc, runtime })
    }

    pub fn start_calibration(&mut self) {
        self.runtime.start_calibration();
    }

    #[must_use]
    pub fn is_calibration_complete(&self) -> bool {
        self.runtime.is_calibration_complete()
    }

    fn align(&self, raw: [i16; 3]) -> [i32; 3] {
        let v = raw.map(i32::from);
        match self.acc.dev.acc_align {
            SensorAlign::Custom => {
                let rotated = rotate(&self.acc.dev.rotation_matrix, v.map(|c| c as f32));
                rotated.map(|c| c.round() as i32)
            }
            align => align.apply(v),
        }
    }

    /// Process one raw sample.
    ///
    /// Aligns the sample, then either runs a calibration cycle (the sample
    /// reads as zero and the filters are left untouched) or removes the trims
    /// and feeds the smoothing filters.
    pub fn update(&mut self, raw: [i16; 3], config: &mut AccelerometerConfig, saver: &mut dyn SaveNotifier) {
        self.acc.acc_adc = self.align(raw);

        if !self.runtime.is_calibration_complete() {
            // Trims committed on the final cycle apply from the next sample
            self.runtime.perform_calibration(&mut self.acc, config, saver);
            return;
        }

        for axis in 0..3 {
            self.acc.acc_adc[axis] -= i32::from(config.acc_zero.raw[axis]);
        }

        let filtering = self.runtime.acc_lpf_cut_hz > 0;
        for axis in 0..3 {
            let sample = self.acc.acc_adc[axis] as f32;
            self.acc.acc_smoothed[axis] = if filtering {
                self.runtime.acc_filter[axis].apply(sample)
            } else {
                sample
            };
        }
    }
}

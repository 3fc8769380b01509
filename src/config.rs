//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{FlightCoreError, Result};
use crate::sensors::acceleration::AccelerometerConfig;
use crate::sensors::alignment::{SensorAlign, SensorAlignment};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub rx: RxConfig,

    #[serde(default)]
    pub accelerometer: AccelerometerConfig,

    #[serde(default)]
    pub gyro: GyroConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub persist: PersistConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Receiver configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RxConfig {
    /// Serial device the SBUS receiver is on; empty runs without receiver
    #[serde(default)]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Stick center in microseconds
    #[serde(default = "default_rc_center")]
    pub rc_center: u16,

    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
}

/// Which gyro the flight loop uses
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GyroToUse {
    #[default]
    First,
    Second,
    Both,
}

/// Mounting of one gyro device (the accelerometer shares it)
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct GyroDeviceConfig {
    #[serde(default)]
    pub alignment: SensorAlign,

    #[serde(default)]
    pub custom_alignment: SensorAlignment,
}

/// Gyro configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct GyroConfig {
    #[serde(default)]
    pub gyro_to_use: GyroToUse,

    #[serde(default = "default_gyro_devices")]
    pub devices: Vec<GyroDeviceConfig>,
}

/// Loop timing
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    #[serde(default = "default_loop_rate_hz")]
    pub loop_rate_hz: u16,

    /// Rate the accelerometer is sampled at; 0 disables acc smoothing
    #[serde(default = "default_acc_sample_rate_hz")]
    pub acc_sample_rate_hz: u16,
}

/// Calibration store
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct PersistConfig {
    #[serde(default = "default_persist_path")]
    pub path: String,
}

/// Log output
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Directory for daily rolling log files; stdout only when unset
    #[serde(default)]
    pub dir: Option<String>,
}

// Default value functions
fn default_baud_rate() -> u32 { crate::rx::reader::SBUS_BAUDRATE }
fn default_rc_center() -> u16 { 1500 }
fn default_read_buffer_size() -> usize { 256 }

fn default_gyro_devices() -> Vec<GyroDeviceConfig> { vec![GyroDeviceConfig::default()] }

fn default_loop_rate_hz() -> u16 { 1000 }
fn default_acc_sample_rate_hz() -> u16 { 1000 }

fn default_persist_path() -> String { "./calibration.json".to_string() }

impl Default for RxConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: default_baud_rate(),
            rc_center: default_rc_center(),
            read_buffer_size: default_read_buffer_size(),
        }
    }
}

impl Default for GyroConfig {
    fn default() -> Self {
        Self {
            gyro_to_use: GyroToUse::default(),
            devices: default_gyro_devices(),
        }
    }
}

impl GyroConfig {
    /// Device whose alignment applies to the accelerometer.
    ///
    /// The second device is used only when `gyro_to_use` is `second`.
    #[must_use]
    pub fn active_device(&self) -> GyroDeviceConfig {
        let index = usize::from(self.gyro_to_use == GyroToUse::Second);
        self.devices.get(index).copied().unwrap_or_default()
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            loop_rate_hz: default_loop_rate_hz(),
            acc_sample_rate_hz: default_acc_sample_rate_hz(),
        }
    }
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self { path: default_persist_path() }
    }
}

fn invalid(msg: impl std::fmt::Display) -> FlightCoreError {
    FlightCoreError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use flight_core::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        // SBUS has a single fixed line rate
        if self.rx.baud_rate != crate::rx::reader::SBUS_BAUDRATE {
            return Err(invalid("baud_rate must be 100000 for SBUS"));
        }

        if !(1400..=1600).contains(&self.rx.rc_center) {
            return Err(invalid("rc_center must be between 1400 and 1600"));
        }

        if self.rx.read_buffer_size < crate::rx::reader::SBUS_FRAME_SIZE {
            return Err(invalid(format!(
                "read_buffer_size must be at least {}",
                crate::rx::reader::SBUS_FRAME_SIZE
            )));
        }

        if self.accelerometer.lpf_hz > 500 {
            return Err(invalid("accelerometer lpf_hz must be between 0 and 500"));
        }

        if self.gyro.devices.is_empty() || self.gyro.devices.len() > 2 {
            return Err(invalid("gyro devices must have 1 or 2 entries"));
        }

        if self.gyro.gyro_to_use != GyroToUse::First && self.gyro.devices.len() < 2 {
            return Err(invalid("gyro_to_use second/both requires two gyro devices"));
        }

        if !(50..=8000).contains(&self.scheduler.loop_rate_hz) {
            return Err(invalid("loop_rate_hz must be between 50 and 8000"));
        }

        if self.scheduler.acc_sample_rate_hz > self.scheduler.loop_rate_hz {
            return Err(invalid("acc_sample_rate_hz cannot exceed loop_rate_hz"));
        }

        if self.persist.path.is_empty() {
            return Err(invalid("persist path cannot be empty"));
        }

        if matches!(&self.logging.dir, Some(dir) if dir.is_empty()) {
            return Err(invalid("logging dir cannot be empty when set"));
        }

        Ok(())
    }
}

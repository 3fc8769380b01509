//! # Sensors Module
//!
//! Accelerometer detection, initialization and calibration.
//!
//! This module handles:
//! - Probing accelerometer driver families in a fixed priority order
//! - Binding the detected driver and its alignment
//! - Calibrating accelerometer trims over a fixed number of loop cycles
//! - Tracking which sensors were detected at bring-up

pub mod acc_detect;
pub mod acceleration;
pub mod alignment;
pub mod fake;

use acc_detect::AccHardware;

/// Sensors the flight controller can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensor {
    Gyro,
    Acc,
    Baro,
    Mag,
    Rangefinder,
    Gps,
}

impl Sensor {
    const fn mask(self) -> u32 {
        match self {
            Self::Gyro => 1 << 0,
            Self::Acc => 1 << 1,
            Self::Baro => 1 << 2,
            Self::Mag => 1 << 3,
            Self::Rangefinder => 1 << 4,
            Self::Gps => 1 << 5,
        }
    }
}

/// Record of sensors found during bring-up.
///
/// Written by the detection routines before the control loop starts and
/// read-only afterwards.
///
/// # Examples
///
/// ```
/// use flight_core::sensors::{Sensor, SensorRegistry};
///
/// let mut registry = SensorRegistry::new();
/// registry.set(Sensor::Acc);
/// assert!(registry.is_present(Sensor::Acc));
/// assert!(!registry.is_present(Sensor::Baro));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensorRegistry {
    present: u32,
    detected_acc: Option<AccHardware>,
}

impl SensorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a sensor as present.
    pub fn set(&mut self, sensor: Sensor) {
        self.present |= sensor.mask();
    }

    /// Mark a sensor as absent.
    pub fn clear(&mut self, sensor: Sensor) {
        self.present &= !sensor.mask();
    }

    #[must_use]
    pub fn is_present(&self, sensor: Sensor) -> bool {
        self.present & sensor.mask() != 0
    }

    /// Concrete accelerometer variant, once detected
    #[must_use]
    pub fn detected_acc(&self) -> Option<AccHardware> {
        self.detected_acc
    }

    pub fn set_detected_acc(&mut self, hardware: AccHardware) {
        self.detected_acc = Some(hardware);
    }
}

//! # Accelerometer Detection
//!
//! Binds an accelerometer driver by probing driver families in a fixed
//! priority order.
//!
//! ## Probe Order
//!
//! The probe table is an ordered list of steps. A configured preference
//! enters the table at the step that handles it and falls through every
//! later step until a probe succeeds:
//!
//! | Preference | Entry point |
//! |------------|-------------|
//! | `default` | First step |
//! | `none` | Nothing is probed |
//! | explicit variant | Step listing that variant |
//!
//! When an explicit preference finds nothing, the whole table is scanned
//! once more as if `default` had been configured.
//!
//! ## Shared Families
//!
//! Some steps cover several variants behind one probe (MPU6500 compatible
//! parts, ICM426xx). The concrete variant is resolved from the detection
//! result the probe leaves in [`AccDev::mpu_detection_result`].

#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::acceleration::AccDev;
use super::{Sensor, SensorRegistry};

/// Accelerometer hardware selection and detected variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccHardware {
    /// Probe everything in table order
    #[default]
    Default,
    /// Accelerometer disabled
    None,
    Adxl345,
    Mpu6050,
    Mma8452,
    Bma280,
    Lsm303dlhc,
    Mpu6000,
    Mpu6500,
    Mpu9250,
    Icm20601,
    Icm20602,
    Icm20608g,
    Icm20649,
    Icm20689,
    Icm42605,
    Icm42688p,
    Bmi160,
    Bmi088,
    Bmi270,
    Lsm6dso,
    /// Simulated accelerometer
    Fake,
}

/// Driver probe entry points, one per bus driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccFamily {
    Adxl345,
    Lsm303dlhc,
    Mpu6050,
    Mma8452,
    Bma280,
    Mpu6000Spi,
    Mpu9250Spi,
    /// MPU6500 compatible part on I2C
    Mpu6500,
    /// MPU6500 compatible part on SPI
    Mpu6500Spi,
    Icm20649Spi,
    Icm20689Spi,
    Icm426xxSpi,
    Bmi160Spi,
    Bmi270Spi,
    Bmi088Spi,
    Lsm6dsoSpi,
    Fake,
}

/// Chip identified while probing an MPU-style bus device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MpuSensor {
    #[default]
    None,
    Mpu65xxSpi,
    Mpu9250Spi,
    Icm20601Spi,
    Icm20602Spi,
    Icm20608Spi,
    Icm42605Spi,
    Icm42688pSpi,
    Bmi270Spi,
}

/// Result of the WHO_AM_I style identification done by a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MpuDetectionResult {
    pub sensor: MpuSensor,
}

/// How a successful probe maps to a concrete variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolve {
    /// The probe identifies exactly one variant
    Fixed(AccHardware),
    /// MPU6500 compatible family, refined by the detection result
    Mpu65xx,
    /// ICM426xx family; an unknown part resolves to `None`
    Icm426xx,
}

impl Resolve {
    #[must_use]
    pub fn resolve(self, result: &MpuDetectionResult) -> AccHardware {
        match self {
            Self::Fixed(hardware) => hardware,
            Self::Mpu65xx => match result.sensor {
                MpuSensor::Mpu9250Spi => AccHardware::Mpu9250,
                MpuSensor::Icm20601Spi => AccHardware::Icm20601,
                MpuSensor::Icm20602Spi => AccHardware::Icm20602,
                MpuSensor::Icm20608Spi => AccHardware::Icm20608g,
                _ => AccHardware::Mpu6500,
            },
            Self::Icm426xx => match result.sensor {
                MpuSensor::Icm42605Spi => AccHardware::Icm42605,
                MpuSensor::Icm42688pSpi => AccHardware::Icm42688p,
                _ => AccHardware::None,
            },
        }
    }
}

/// One step of the probe table.
#[derive(Debug, Clone, Copy)]
pub struct ProbeStep {
    /// Preferences that start scanning at this step
    pub entry: &'static [AccHardware],
    /// Probes tried, in order; the first success wins
    pub families: &'static [AccFamily],
    pub resolve: Resolve,
}

/// Default probe order.
pub const ACC_PROBE_TABLE: &[ProbeStep] = &[
    ProbeStep {
        entry: &[AccHardware::Adxl345],
        families: &[AccFamily::Adxl345],
        resolve: Resolve::Fixed(AccHardware::Adxl345),
    },
    ProbeStep {
        entry: &[AccHardware::Lsm303dlhc],
        families: &[AccFamily::Lsm303dlhc],
        resolve: Resolve::Fixed(AccHardware::Lsm303dlhc),
    },
    ProbeStep {
        entry: &[AccHardware::Mpu6050],
        families: &[AccFamily::Mpu6050],
        resolve: Resolve::Fixed(AccHardware::Mpu6050),
    },
    ProbeStep {
        entry: &[AccHardware::Mma8452],
        families: &[AccFamily::Mma8452],
        resolve: Resolve::Fixed(AccHardware::Mma8452),
    },
    ProbeStep {
        entry: &[AccHardware::Bma280],
        families: &[AccFamily::Bma280],
        resolve: Resolve::Fixed(AccHardware::Bma280),
    },
    ProbeStep {
        entry: &[AccHardware::Mpu6000],
        families: &[AccFamily::Mpu6000Spi],
        resolve: Resolve::Fixed(AccHardware::Mpu6000),
    },
    ProbeStep {
        entry: &[AccHardware::Mpu9250],
        families: &[AccFamily::Mpu9250Spi],
        resolve: Resolve::Fixed(AccHardware::Mpu9250),
    },
    ProbeStep {
        entry: &[
            AccHardware::Mpu6500,
            AccHardware::Icm20601,
            AccHardware::Icm20602,
            AccHardware::Icm20608g,
        ],
        families: &[AccFamily::Mpu6500, AccFamily::Mpu6500Spi],
        resolve: Resolve::Mpu65xx,
    },
    ProbeStep {
        entry: &[AccHardware::Icm20649],
        families: &[AccFamily::Icm20649Spi],
        resolve: Resolve::Fixed(AccHardware::Icm20649),
    },
    ProbeStep {
        entry: &[AccHardware::Icm20689],
        families: &[AccFamily::Icm20689Spi],
        resolve: Resolve::Fixed(AccHardware::Icm20689),
    },
    ProbeStep {
        entry: &[AccHardware::Icm42605, AccHardware::Icm42688p],
        families: &[AccFamily::Icm426xxSpi],
        resolve: Resolve::Icm426xx,
    },
    ProbeStep {
        entry: &[AccHardware::Bmi160],
        families: &[AccFamily::Bmi160Spi],
        resolve: Resolve::Fixed(AccHardware::Bmi160),
    },
    ProbeStep {
        entry: &[AccHardware::Bmi270],
        families: &[AccFamily::Bmi270Spi],
        resolve: Resolve::Fixed(AccHardware::Bmi270),
    },
    ProbeStep {
        entry: &[AccHardware::Bmi088],
        families: &[AccFamily::Bmi088Spi],
        resolve: Resolve::Fixed(AccHardware::Bmi088),
    },
    ProbeStep {
        entry: &[AccHardware::Lsm6dso],
        families: &[AccFamily::Lsm6dsoSpi],
        resolve: Resolve::Fixed(AccHardware::Lsm6dso),
    },
    ProbeStep {
        entry: &[AccHardware::Fake],
        families: &[AccFamily::Fake],
        resolve: Resolve::Fixed(AccHardware::Fake),
    },
];

/// Bus-level probe entry points supplied by the board's drivers.
#[cfg_attr(test, automock)]
pub trait AccBus {
    /// Probe one driver family.
    ///
    /// On success the driver binds itself into `dev` (init function,
    /// detection result) and returns `true`. A failed probe must not be
    /// fatal; the scan simply moves on.
    fn detect(&mut self, family: AccFamily, dev: &mut AccDev) -> bool;
}

/// Accelerometer probe over a fixed table.
#[derive(Debug, Clone, Copy)]
pub struct AccProber {
    table: &'static [ProbeStep],
}

impl Default for AccProber {
    fn default() -> Self {
        Self::new()
    }
}

impl AccProber {
    /// Prober over [`ACC_PROBE_TABLE`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            table: ACC_PROBE_TABLE,
        }
    }

    /// Prober over a board-specific table.
    #[must_use]
    pub const fn with_table(table: &'static [ProbeStep]) -> Self {
        Self { table }
    }

    /// Detect and bind an accelerometer.
    ///
    /// # Arguments
    ///
    /// * `bus` - Driver probe entry points
    /// * `dev` - Device the detected driver binds into
    /// * `requested` - Configured hardware preference
    /// * `registry` - Updated with the detected variant on success
    ///
    /// # Returns
    ///
    /// `true` if an accelerometer was bound. On `false` the registry is left
    /// untouched.
    pub fn detect<B: AccBus + ?Sized>(
        &self,
        bus: &mut B,
        dev: &mut AccDev,
        requested: AccHardware,
        registry: &mut SensorRegistry,
    ) -> bool {
        let mut found = self.scan(bus, dev, requested);

        if found == AccHardware::None && !matches!(requested, AccHardware::Default | AccHardware::None) {
            warn!("Configured accelerometer {:?} not found, probing all", requested);
            found = self.scan(bus, dev, AccHardware::Default);
        }

        if found == AccHardware::None {
            warn!("No accelerometer detected");
            return false;
        }

        info!("Detected accelerometer {:?}", found);
        dev.hardware = found;
        registry.set_detected_acc(found);
        registry.set(Sensor::Acc);
        true
    }

    fn entry_index(&self, requested: AccHardware) -> Option<usize> {
        match requested {
            AccHardware::Default => Some(0),
            AccHardware::None => None,
            hardware => self.table.iter().position(|step| step.entry.contains(&hardware)),
        }
    }

    fn scan<B: AccBus + ?Sized>(&self, bus: &mut B, dev: &mut AccDev, requested: AccHardware) -> AccHardware {
        let Some(start) = self.entry_index(requested) else {
            return AccHardware::None;
        };

        for step in &self.table[start..] {
            for &family in step.families {
                if bus.detect(family, dev) {
                    return step.resolve.resolve(&dev.mpu_detection_result);
                }
                debug!("Accelerometer probe {:?} failed", family);
            }
        }

        AccHardware::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total_probes() -> usize {
        ACC_PROBE_TABLE.iter().map(|step| step.families.len()).sum()
    }

    fn detect(bus: &mut MockAccBus, requested: AccHardware) -> (bool, AccDev, SensorRegistry) {
        let mut dev = AccDev::default();
        let mut registry = SensorRegistry::new();
        let ok = AccProber::new().detect(bus, &mut dev, requested, &mut registry);
        (ok, dev, registry)
    }

    // ==================== Table Tests ====================

    #[test]
    fn test_table_covers_every_variant() {
        let variants = [
            AccHardware::Adxl345,
            AccHardware::Mpu6050,
            AccHardware::Mma8452,
            AccHardware::Bma280,
            AccHardware::Lsm303dlhc,
            AccHardware::Mpu6000,
            AccHardware::Mpu6500,
            AccHardware::Mpu9250,
            AccHardware::Icm20601,
            AccHardware::Icm20602,
            AccHardware::Icm20608g,
            AccHardware::Icm20649,
            AccHardware::Icm20689,
            AccHardware::Icm42605,
            AccHardware::Icm42688p,
            AccHardware::Bmi160,
            AccHardware::Bmi088,
            AccHardware::Bmi270,
            AccHardware::Lsm6dso,
            AccHardware::Fake,
        ];
        let prober = AccProber::new();
        for hw in variants {
            assert!(prober.entry_index(hw).is_some(), "{:?} has no entry step", hw);
        }
        assert_eq!(prober.entry_index(AccHardware::Default), Some(0));
        assert_eq!(prober.entry_index(AccHardware::None), None);
    }

    #[test]
    fn test_resolve_mpu65xx_family() {
        let r = |sensor| Resolve::Mpu65xx.resolve(&MpuDetectionResult { sensor });
        assert_eq!(r(MpuSensor::Mpu9250Spi), AccHardware::Mpu9250);
        assert_eq!(r(MpuSensor::Icm20601Spi), AccHardware::Icm20601);
        assert_eq!(r(MpuSensor::Icm20602Spi), AccHardware::Icm20602);
        assert_eq!(r(MpuSensor::Icm20608Spi), AccHardware::Icm20608g);
        assert_eq!(r(MpuSensor::Mpu65xxSpi), AccHardware::Mpu6500);
        assert_eq!(r(MpuSensor::None), AccHardware::Mpu6500);
    }

    #[test]
    fn test_resolve_icm426xx_family() {
        let r = |sensor| Resolve::Icm426xx.resolve(&MpuDetectionResult { sensor });
        assert_eq!(r(MpuSensor::Icm42605Spi), AccHardware::Icm42605);
        assert_eq!(r(MpuSensor::Icm42688pSpi), AccHardware::Icm42688p);
        assert_eq!(r(MpuSensor::Mpu65xxSpi), AccHardware::None);
    }

    #[test]
    fn test_hardware_deserializes_snake_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            hardware: AccHardware,
        }
        let w: Wrapper = toml::from_str("hardware = \"icm42688p\"").unwrap();
        assert_eq!(w.hardware, AccHardware::Icm42688p);
        let w: Wrapper = toml::from_str("hardware = \"default\"").unwrap();
        assert_eq!(w.hardware, AccHardware::Default);
    }

    // ==================== Scan Tests ====================

    #[test]
    fn test_default_stops_at_first_success() {
        let mut bus = MockAccBus::new();
        bus.expect_detect()
            .returning(|family, _| family == AccFamily::Mpu6000Spi || family == AccFamily::Bmi270Spi);

        let (ok, dev, registry) = detect(&mut bus, AccHardware::Default);

        assert!(ok);
        assert_eq!(dev.hardware, AccHardware::Mpu6000);
        assert_eq!(registry.detected_acc(), Some(AccHardware::Mpu6000));
        assert!(registry.is_present(Sensor::Acc));
    }

    #[test]
    fn test_explicit_preference_enters_at_its_step() {
        let mut bus = MockAccBus::new();
        bus.expect_detect()
            .withf(|family, _| *family == AccFamily::Adxl345)
            .never();
        bus.expect_detect().returning(|family, _| family == AccFamily::Bmi270Spi);

        let (ok, dev, _) = detect(&mut bus, AccHardware::Bmi270);

        assert!(ok);
        assert_eq!(dev.hardware, AccHardware::Bmi270);
    }

    #[test]
    fn test_explicit_preference_falls_through_later_steps() {
        let mut bus = MockAccBus::new();
        bus.expect_detect().returning(|family, _| family == AccFamily::Bmi160Spi);

        let (ok, dev, _) = detect(&mut bus, AccHardware::Icm20649);

        assert!(ok);
        assert_eq!(dev.hardware, AccHardware::Bmi160);
    }

    #[test]
    fn test_missing_preference_falls_back_to_default_scan() {
        // Mpu6050 sits before Lsm6dso, so only the second pass can find it
        let mut bus = MockAccBus::new();
        bus.expect_detect().returning(|family, _| family == AccFamily::Mpu6050);

        let (ok, dev, registry) = detect(&mut bus, AccHardware::Lsm6dso);

        assert!(ok);
        assert_eq!(dev.hardware, AccHardware::Mpu6050);
        assert_ne!(dev.hardware, AccHardware::Lsm6dso);
        assert_eq!(registry.detected_acc(), Some(AccHardware::Mpu6050));
        assert!(registry.is_present(Sensor::Acc));
    }

    #[test]
    fn test_fallback_is_a_single_retry() {
        // Fake is the last step: one probe in the first pass, a full second pass
        let mut bus = MockAccBus::new();
        bus.expect_detect().times(1 + total_probes()).returning(|_, _| false);

        let (ok, _, _) = detect(&mut bus, AccHardware::Fake);
        assert!(!ok);
    }

    #[test]
    fn test_nothing_detected() {
        let mut bus = MockAccBus::new();
        bus.expect_detect().times(total_probes()).returning(|_, _| false);

        let (ok, dev, registry) = detect(&mut bus, AccHardware::Default);

        assert!(!ok);
        assert_eq!(dev.hardware, AccHardware::None);
        assert!(!registry.is_present(Sensor::Acc));
        assert_eq!(registry.detected_acc(), None);
    }

    #[test]
    fn test_none_probes_nothing() {
        let mut bus = MockAccBus::new();
        bus.expect_detect().never();

        let (ok, _, registry) = detect(&mut bus, AccHardware::None);

        assert!(!ok);
        assert!(!registry.is_present(Sensor::Acc));
    }

    #[test]
    fn test_mpu6500_family_resolves_subvariant() {
        let mut bus = MockAccBus::new();
        bus.expect_detect().returning(|family, dev| {
            if family == AccFamily::Mpu6500Spi {
                dev.mpu_detection_result.sensor = MpuSensor::Icm20602Spi;
                true
            } else {
                false
            }
        });

        let (ok, dev, registry) = detect(&mut bus, AccHardware::Default);

        assert!(ok);
        assert_eq!(dev.hardware, AccHardware::Icm20602);
        assert_eq!(registry.detected_acc(), Some(AccHardware::Icm20602));
    }

    #[test]
    fn test_unknown_icm426xx_ends_scan() {
        let mut bus = MockAccBus::new();
        bus.expect_detect()
            .withf(|family, _| *family == AccFamily::Bmi270Spi)
            .never();
        bus.expect_detect()
            .returning(|family, _| family == AccFamily::Icm426xxSpi || family == AccFamily::Bmi270Spi);

        let (ok, _, registry) = detect(&mut bus, AccHardware::Default);

        assert!(!ok);
        assert!(!registry.is_present(Sensor::Acc));
    }

    #[test]
    fn test_icm42688p_resolved() {
        let mut bus = MockAccBus::new();
        bus.expect_detect().returning(|family, dev| {
            if family == AccFamily::Icm426xxSpi {
                dev.mpu_detection_result.sensor = MpuSensor::Icm42688pSpi;
                true
            } else {
                false
            }
        });

        let (ok, dev, _) = detect(&mut bus, AccHardware::Icm42688p);

        assert!(ok);
        assert_eq!(dev.hardware, AccHardware::Icm42688p);
    }

    #[test]
    fn test_custom_table_without_requested_variant() {
        static BOARD_TABLE: &[ProbeStep] = &[ProbeStep {
            entry: &[AccHardware::Bmi270],
            families: &[AccFamily::Bmi270Spi],
            resolve: Resolve::Fixed(AccHardware::Bmi270),
        }];

        let mut bus = MockAccBus::new();
        bus.expect_detect().times(1).returning(|family, _| family == AccFamily::Bmi270Spi);

        let mut dev = AccDev::default();
        let mut registry = SensorRegistry::new();
        let ok = AccProber::with_table(BOARD_TABLE).detect(&mut bus, &mut dev, AccHardware::Mpu6000, &mut registry);

        assert!(ok);
        assert_eq!(dev.hardware, AccHardware::Bmi270);
    }
}

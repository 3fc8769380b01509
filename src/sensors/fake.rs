//! # Simulated Accelerometer
//!
//! Stand-in driver for running the flight core on a host without an IMU.

use tracing::debug;

use super::acc_detect::{AccBus, AccFamily, AccHardware};
use super::acceleration::AccDev;

/// Bus that answers only the `Fake` probe.
#[derive(Debug, Clone, Default)]
pub struct FakeAccBus;

impl FakeAccBus {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// True when `hardware` names a physical part, which this bus never answers.
///
/// Such a preference ends up on the simulated driver through the `Default`
/// retry.
#[must_use]
pub fn requests_physical_part(hardware: AccHardware) -> bool {
    !matches!(hardware, AccHardware::Default | AccHardware::None | AccHardware::Fake)
}

fn fake_acc_init(dev: &mut AccDev) {
    debug!("Fake accelerometer init, 1g = {}", dev.acc_1g);
}

impl AccBus for FakeAccBus {
    fn detect(&mut self, family: AccFamily, dev: &mut AccDev) -> bool {
        if family != AccFamily::Fake {
            return false;
        }
        dev.init_fn = Some(fake_acc_init);
        true
    }
}

/// Sample source for a board sitting level with a fixed mounting offset.
///
/// Alternates a one-count dither on every axis so averaging sees more than
/// a constant.
///
/// # Examples
///
/// ```
/// use flight_core::sensors::fake::FakeAcc;
///
/// let mut acc = FakeAcc::new([5, -5, 0]);
/// let a = acc.sample(256);
/// let b = acc.sample(256);
/// assert_eq!(a[2] + b[2], 2 * 256);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FakeAcc {
    offset: [i16; 3],
    tick: u32,
}

impl FakeAcc {
    #[must_use]
    pub fn new(offset: [i16; 3]) -> Self {
        Self { offset, tick: 0 }
    }

    /// Next raw sample for a sensor reading `acc_1g` per g.
    pub fn sample(&mut self, acc_1g: u16) -> [i16; 3] {
        let dither: i16 = if self.tick % 2 == 0 { 1 } else { -1 };
        self.tick = self.tick.wrapping_add(1);

        let one_g = i16::try_from(acc_1g).unwrap_or(i16::MAX);
        [
            self.offset[0].saturating_add(dither),
            self.offset[1].saturating_sub(dither),
            self.offset[2].saturating_add(one_g).saturating_add(dither),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GyroConfig;
    use crate::persist::SaveNotifier;
    use crate::sensors::acc_detect::AccProber;
    use crate::sensors::acceleration::{
        Accelerometer, AccelerometerConfig, GyroDev, CALIBRATING_ACC_CYCLES,
    };
    use crate::sensors::SensorRegistry;

    struct NullSaver;

    impl SaveNotifier for NullSaver {
        fn save_config_and_notify(&mut self, _config: &AccelerometerConfig) {}
    }

    #[test]
    fn test_bus_only_answers_fake() {
        let mut bus = FakeAccBus::new();
        let mut dev = AccDev::default();

        assert!(!bus.detect(AccFamily::Mpu6000Spi, &mut dev));
        assert!(dev.init_fn.is_none());
        assert!(bus.detect(AccFamily::Fake, &mut dev));
        assert!(dev.init_fn.is_some());
    }

    #[test]
    fn test_default_scan_finds_fake() {
        let mut bus = FakeAccBus::new();
        let mut dev = AccDev::default();
        let mut registry = SensorRegistry::new();

        assert!(AccProber::new().detect(&mut bus, &mut dev, AccHardware::Default, &mut registry));
        assert_eq!(dev.hardware, AccHardware::Fake);
    }

    #[test]
    fn test_physical_preference_lands_on_fake() {
        assert!(requests_physical_part(AccHardware::Bmi270));
        assert!(requests_physical_part(AccHardware::Mpu6000));
        assert!(!requests_physical_part(AccHardware::Default));
        assert!(!requests_physical_part(AccHardware::Fake));
        assert!(!requests_physical_part(AccHardware::None));

        let mut bus = FakeAccBus::new();
        let mut dev = AccDev::default();
        let mut registry = SensorRegistry::new();
        assert!(AccProber::new().detect(&mut bus, &mut dev, AccHardware::Bmi270, &mut registry));
        assert_eq!(dev.hardware, AccHardware::Fake);
    }

    #[test]
    fn test_dither_averages_out() {
        let mut acc = FakeAcc::new([7, -3, 2]);
        let mut sum = [0i32; 3];
        for _ in 0..400 {
            let s = acc.sample(256);
            for axis in 0..3 {
                sum[axis] += i32::from(s[axis]);
            }
        }
        assert_eq!(sum, [7 * 400, -3 * 400, 258 * 400]);
    }

    #[test]
    fn test_calibration_recovers_offset() {
        let mut bus = FakeAccBus::new();
        let mut registry = SensorRegistry::new();
        let mut config = AccelerometerConfig::default();
        let mut accel = Accelerometer::init(
            1000,
            &config,
            &GyroConfig::default(),
            &GyroDev::default(),
            &mut bus,
            &AccProber::new(),
            &mut registry,
        )
        .unwrap();

        let mut source = FakeAcc::new([30, 12, 9]);
        accel.start_calibration();
        for _ in 0..CALIBRATING_ACC_CYCLES {
            let sample = source.sample(accel.acc.dev.acc_1g);
            accel.update(sample, &mut config, &mut NullSaver);
        }

        assert_eq!(config.acc_zero.raw, [30, 12, 9]);
        assert!(config.acc_has_been_calibrated());
    }
}

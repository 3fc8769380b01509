//! # Lowpass Filter
//!
//! First-order (PT1) lowpass used to smooth accelerometer samples.
//!
//! The filter is seeded with the first sample it sees so there is no
//! start-up ramp from zero.

use std::f32::consts::PI;

/// Gain for a PT1 filter with cutoff `cutoff_hz` sampled every `dt` seconds.
#[must_use]
pub fn pt1_filter_gain(cutoff_hz: f32, dt: f32) -> f32 {
    let rc = 1.0 / (2.0 * PI * cutoff_hz);
    dt / (rc + dt)
}

/// First-order lowpass filter.
///
/// # Examples
///
/// ```
/// use flight_core::filter::Pt1Filter;
///
/// let mut lpf = Pt1Filter::new(10.0, 1000.0);
/// assert_eq!(lpf.apply(100.0), 100.0); // seeded
/// assert!(lpf.apply(0.0) > 90.0);      // then smoothed
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Pt1Filter {
    state: f32,
    k: f32,
    initialized: bool,
}

impl Pt1Filter {
    /// Creates a filter for the given cutoff and sample rate.
    #[must_use]
    pub fn new(cutoff_hz: f32, sample_rate_hz: f32) -> Self {
        Self {
            state: 0.0,
            k: pt1_filter_gain(cutoff_hz, 1.0 / sample_rate_hz),
            initialized: false,
        }
    }

    /// Filter one sample.
    pub fn apply(&mut self, input: f32) -> f32 {
        if self.initialized {
            self.state += self.k * (input - self.state);
        } else {
            self.state = input;
            self.initialized = true;
        }
        self.state
    }

    /// Current output
    #[must_use]
    pub fn output(&self) -> f32 {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain_range() {
        let k = pt1_filter_gain(10.0, 0.001);
        assert!(k > 0.0 && k < 1.0);
        // Higher cutoff passes more of each step
        assert!(pt1_filter_gain(100.0, 0.001) > k);
    }

    #[test]
    fn test_first_sample_seeds_state() {
        let mut lpf = Pt1Filter::new(10.0, 1000.0);
        assert_eq!(lpf.apply(256.0), 256.0);
        assert_eq!(lpf.output(), 256.0);
    }

    #[test]
    fn test_converges_to_step() {
        let mut lpf = Pt1Filter::new(10.0, 1000.0);
        lpf.apply(0.0);
        for _ in 0..2000 {
            lpf.apply(100.0);
        }
        assert!((lpf.output() - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_attenuates_single_spike() {
        let mut lpf = Pt1Filter::new(10.0, 1000.0);
        lpf.apply(0.0);
        let out = lpf.apply(1000.0);
        assert!(out < 100.0);
    }
}

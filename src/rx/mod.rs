//! # Receiver Module
//!
//! SBUS receiver input handling.
//!
//! This module handles:
//! - Unpacking SBUS payloads into 11-bit channel fields
//! - Syncing SBUS frames out of a raw byte stream
//! - Decoding channel fields and flags into the receiver channel array
//! - Converting raw channel values to control pulse widths

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

pub mod packed;
pub mod reader;
pub mod sbus_channels;

/// Channel array capacity (24 proportional + 2 digital channels)
pub const MAX_SUPPORTED_RC_CHANNEL_COUNT: usize = 26;

/// Raw channel read function installed by a protocol init routine.
///
/// Returns the channel value in control pulse units (microseconds).
pub type RcReadRawFn = fn(&RxRuntimeState, usize) -> f32;

/// Outcome of a frame decode, as a bitmask.
///
/// # Examples
///
/// ```
/// use flight_core::rx::FrameStatus;
///
/// let status = FrameStatus::COMPLETE | FrameStatus::FAILSAFE;
/// assert!(status.is_complete());
/// assert!(status.is_failsafe());
/// assert!(!status.is_dropped());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStatus(u8);

impl FrameStatus {
    /// No complete frame available yet
    pub const PENDING: Self = Self(0);
    /// Frame fully decoded, channel data usable
    pub const COMPLETE: Self = Self(1 << 0);
    /// Transmitter-side failsafe engaged
    pub const FAILSAFE: Self = Self(1 << 1);
    /// Further protocol processing needed (unused by SBUS)
    pub const PROCESSING_REQUIRED: Self = Self(1 << 2);
    /// Receiver lost signal, data is a repeat
    pub const DROPPED: Self = Self(1 << 3);

    /// Raw bit value
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True if every bit of `other` is set in `self`
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn is_complete(self) -> bool {
        self.contains(Self::COMPLETE)
    }

    #[must_use]
    pub const fn is_failsafe(self) -> bool {
        self.contains(Self::FAILSAFE)
    }

    #[must_use]
    pub const fn is_dropped(self) -> bool {
        self.contains(Self::DROPPED)
    }
}

impl BitOr for FrameStatus {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for FrameStatus {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for FrameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.is_complete() {
            names.push("COMPLETE");
        }
        if self.is_failsafe() {
            names.push("FAILSAFE");
        }
        if self.contains(Self::PROCESSING_REQUIRED) {
            names.push("PROCESSING_REQUIRED");
        }
        if self.is_dropped() {
            names.push("DROPPED");
        }
        if names.is_empty() {
            names.push("PENDING");
        }
        write!(f, "FrameStatus({})", names.join(" | "))
    }
}

/// Receiver runtime state.
///
/// Owns the channel array that protocol decoders overwrite in place every
/// frame, and the raw-read function installed by the protocol init routine.
#[derive(Clone)]
pub struct RxRuntimeState {
    /// Raw channel values, indexed by logical channel number
    pub channel_data: [u16; MAX_SUPPORTED_RC_CHANNEL_COUNT],
    /// Number of channels the active protocol provides
    pub channel_count: usize,
    read_raw_fn: Option<RcReadRawFn>,
}

impl Default for RxRuntimeState {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RxRuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let active = self.channel_count.min(MAX_SUPPORTED_RC_CHANNEL_COUNT);
        f.debug_struct("RxRuntimeState")
            .field("channel_data", &&self.channel_data[..active])
            .field("channel_count", &self.channel_count)
            .finish_non_exhaustive()
    }
}

impl RxRuntimeState {
    /// Creates an empty runtime state with no protocol bound.
    #[must_use]
    pub fn new() -> Self {
        Self {
            channel_data: [0; MAX_SUPPORTED_RC_CHANNEL_COUNT],
            channel_count: 0,
            read_raw_fn: None,
        }
    }

    /// Installs the protocol's raw-read function.
    pub fn set_read_raw_fn(&mut self, read_raw_fn: RcReadRawFn) {
        self.read_raw_fn = Some(read_raw_fn);
    }

    /// Reads one channel in control pulse units.
    ///
    /// # Returns
    ///
    /// `None` if no protocol is bound or `chan` is outside the active channel count.
    #[must_use]
    pub fn read_raw(&self, chan: usize) -> Option<f32> {
        if chan >= self.channel_count.min(MAX_SUPPORTED_RC_CHANNEL_COUNT) {
            return None;
        }
        self.read_raw_fn.map(|read| read(self, chan))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_status_bits() {
        assert_eq!(FrameStatus::PENDING.bits(), 0);
        assert_eq!(FrameStatus::COMPLETE.bits(), 0x01);
        assert_eq!(FrameStatus::FAILSAFE.bits(), 0x02);
        assert_eq!(FrameStatus::PROCESSING_REQUIRED.bits(), 0x04);
        assert_eq!(FrameStatus::DROPPED.bits(), 0x08);
    }

    #[test]
    fn test_frame_status_or() {
        let mut status = FrameStatus::COMPLETE;
        status |= FrameStatus::DROPPED;
        assert!(status.is_complete());
        assert!(status.is_dropped());
        assert!(!status.is_failsafe());
        assert_eq!(status, FrameStatus::COMPLETE | FrameStatus::DROPPED);
    }

    #[test]
    fn test_frame_status_debug() {
        let status = FrameStatus::COMPLETE | FrameStatus::FAILSAFE;
        assert_eq!(format!("{:?}", status), "FrameStatus(COMPLETE | FAILSAFE)");
        assert_eq!(format!("{:?}", FrameStatus::PENDING), "FrameStatus(PENDING)");
    }

    #[test]
    fn test_read_raw_without_protocol() {
        let mut state = RxRuntimeState::new();
        state.channel_count = 4;
        assert_eq!(state.read_raw(0), None);
    }

    #[test]
    fn test_read_raw_out_of_range() {
        let mut state = RxRuntimeState::new();
        state.set_read_raw_fn(|s, chan| s.channel_data[chan] as f32);
        state.channel_count = 2;
        state.channel_data[1] = 42;

        assert_eq!(state.read_raw(1), Some(42.0));
        assert_eq!(state.read_raw(2), None);
        assert_eq!(state.read_raw(100), None);
    }
}

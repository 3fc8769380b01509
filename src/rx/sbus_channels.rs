//! # SBUS Channel Decoder
//!
//! Maps an unpacked SBUS payload into the receiver channel array.
//!
//! ## Channel Assignments
//!
//! | Slots | Source |
//! |-------|--------|
//! | `0..N` | Numeric channel fields, copied unchanged |
//! | `N` | Digital channel 17 (flag bit 0) |
//! | `N + 1` | Digital channel 18 (flag bit 1) |
//!
//! Digital channels are presented as if they were proportional channels at
//! full deflection: [`SBUS_DIGITAL_CHANNEL_MIN`] when the bit is clear,
//! [`SBUS_DIGITAL_CHANNEL_MAX`] when set.
//!
//! ## Usage
//!
//! ```
//! use flight_core::rx::RxRuntimeState;
//! use flight_core::rx::packed::{SbusChannels16, SBUS_FLAG_CHANNEL_17};
//! use flight_core::rx::sbus_channels::sbus_channels_decode;
//!
//! let mut state = RxRuntimeState::new();
//! let frame = SbusChannels16::new([992; 16], SBUS_FLAG_CHANNEL_17);
//! let status = sbus_channels_decode(&mut state, &frame);
//!
//! assert!(status.is_complete());
//! assert_eq!(state.channel_data[16], 1812);
//! assert_eq!(state.channel_data[17], 173);
//! ```

use super::packed::{
    SbusChannels, SBUS_FLAG_CHANNEL_17, SBUS_FLAG_CHANNEL_18, SBUS_FLAG_FAILSAFE_ACTIVE,
    SBUS_FLAG_SIGNAL_LOSS,
};
use super::{FrameStatus, RxRuntimeState, MAX_SUPPORTED_RC_CHANNEL_COUNT};
use crate::config::RxConfig;

/// Digital channel value for a clear flag bit
pub const SBUS_DIGITAL_CHANNEL_MIN: u16 = 173;

/// Digital channel value for a set flag bit
pub const SBUS_DIGITAL_CHANNEL_MAX: u16 = 1812;

/// Number of digital channels carried in the flags byte
pub const SBUS_DIGITAL_CHANNEL_COUNT: usize = 2;

/// SBUS channel layout in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SbusVariant {
    Channels8,
    #[default]
    Channels16,
    Channels24,
}

impl SbusVariant {
    /// Number of 11-bit numeric fields in the payload
    #[must_use]
    pub const fn numeric_channel_count(self) -> usize {
        match self {
            Self::Channels8 => 8,
            Self::Channels16 => 16,
            Self::Channels24 => 24,
        }
    }

    /// Numeric plus digital channels
    #[must_use]
    pub const fn channel_count(self) -> usize {
        self.numeric_channel_count() + SBUS_DIGITAL_CHANNEL_COUNT
    }
}

struct SlotsFit<const N: usize>;

impl<const N: usize> SlotsFit<N> {
    const OK: () = assert!(
        N + SBUS_DIGITAL_CHANNEL_COUNT <= MAX_SUPPORTED_RC_CHANNEL_COUNT,
        "SBUS layout does not fit the receiver channel array"
    );
}

#[inline]
fn digital_channel_value(flags: u8, flag: u8) -> u16 {
    if flags & flag != 0 {
        SBUS_DIGITAL_CHANNEL_MAX
    } else {
        SBUS_DIGITAL_CHANNEL_MIN
    }
}

/// Decode an SBUS payload into the receiver channel array.
///
/// The payload is assumed structurally complete; framing errors are handled
/// by the byte-stream reader before this runs. Works for every layout
/// (8, 16 or 24 numeric channels).
///
/// # Arguments
///
/// * `state` - Receiver runtime state whose channel array is overwritten
/// * `channels` - Unpacked payload
///
/// # Returns
///
/// * `COMPLETE | FAILSAFE` if the failsafe flag is set (checked first)
/// * `COMPLETE | DROPPED` if the signal-loss flag is set
/// * `COMPLETE` otherwise
pub fn sbus_channels_decode<const N: usize>(
    state: &mut RxRuntimeState,
    channels: &SbusChannels<N>,
) -> FrameStatus {
    #[allow(clippy::let_unit_value)]
    let () = SlotsFit::<N>::OK;

    let data = &mut state.channel_data;
    data[..N].copy_from_slice(&channels.chan);
    data[N] = digital_channel_value(channels.flags, SBUS_FLAG_CHANNEL_17);
    data[N + 1] = digital_channel_value(channels.flags, SBUS_FLAG_CHANNEL_18);

    if channels.flags & SBUS_FLAG_FAILSAFE_ACTIVE != 0 {
        // Receiver keeps sending its last known good (or preset) values.
        return FrameStatus::COMPLETE | FrameStatus::FAILSAFE;
    }

    if channels.flags & SBUS_FLAG_SIGNAL_LOSS != 0 {
        // Repeat of the last valid frame, still complete.
        return FrameStatus::COMPLETE | FrameStatus::DROPPED;
    }

    FrameStatus::COMPLETE
}

/// Convert a raw SBUS channel value to a control pulse width.
///
/// Linear fit of the reference mapping 173 → 988 µs, 1812 → 2012 µs,
/// evaluated in floating point so repeated reads carry no rounding bias.
///
/// # Examples
///
/// ```
/// use flight_core::rx::sbus_channels::sbus_raw_to_pulse;
///
/// assert_eq!(sbus_raw_to_pulse(0), 880.0);
/// assert_eq!(sbus_raw_to_pulse(992), 1500.0);
/// ```
#[must_use]
pub fn sbus_raw_to_pulse(raw: u16) -> f32 {
    (5.0 * f32::from(raw) / 8.0) + 880.0
}

fn sbus_channels_read_raw_rc(state: &RxRuntimeState, chan: usize) -> f32 {
    sbus_raw_to_pulse(state.channel_data[chan])
}

/// Raw value that [`sbus_raw_to_pulse`] maps (approximately) onto `rc_center`.
#[must_use]
pub fn sbus_center_value(rc_center: u16) -> u16 {
    let raw = (16 * i32::from(rc_center)) / 10 - 1408;
    raw.clamp(0, i32::from(u16::MAX)) as u16
}

/// Bind SBUS to the receiver runtime.
///
/// Installs the SBUS raw-read function and fills every slot of the layout
/// with the value corresponding to the configured stick center, so reads
/// before the first frame see centered sticks.
pub fn sbus_channels_init(rx_config: &RxConfig, state: &mut RxRuntimeState, variant: SbusVariant) {
    state.set_read_raw_fn(sbus_channels_read_raw_rc);
    state.channel_count = variant.channel_count();

    let center = sbus_center_value(rx_config.rc_center);
    state.channel_data[..variant.channel_count()].fill(center);
}

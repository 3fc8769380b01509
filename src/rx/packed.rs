//! # SBUS Packed Channel Layouts
//!
//! Bit-exact SBUS payload layouts: N channel fields of 11 bits each, packed
//! LSB-first as one continuous bitstream, followed by a single flags byte.
//!
//! | Layout | Channel bytes | Payload bytes |
//! |--------|---------------|---------------|
//! | 8ch    | 11            | 12            |
//! | 16ch   | 22            | 23            |
//! | 24ch   | 33            | 34            |
//!
//! ## Flags byte
//!
//! | Bit | Meaning |
//! |-----|---------|
//! | 0 | Digital channel 17 |
//! | 1 | Digital channel 18 |
//! | 2 | Signal loss (frame is a repeat) |
//! | 3 | Failsafe active |

use crate::error::{FlightCoreError, Result};

/// Width of one packed channel field
pub const SBUS_CHANNEL_BITS: usize = 11;

/// Largest value an 11-bit field can carry
pub const SBUS_CHANNEL_VALUE_MAX: u16 = 0x07FF;

/// Digital channel 17 state
pub const SBUS_FLAG_CHANNEL_17: u8 = 1 << 0;
/// Digital channel 18 state
pub const SBUS_FLAG_CHANNEL_18: u8 = 1 << 1;
/// Receiver lost signal and repeats stale data
pub const SBUS_FLAG_SIGNAL_LOSS: u8 = 1 << 2;
/// Transmitter-side failsafe engaged
pub const SBUS_FLAG_FAILSAFE_ACTIVE: u8 = 1 << 3;

/// One decoded-from-wire SBUS payload: N numeric channels plus flags.
///
/// Field values are kept exactly as received; nothing here validates ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SbusChannels<const N: usize> {
    /// Numeric channel fields in wire order
    pub chan: [u16; N],
    /// Flags byte (digital channels, signal loss, failsafe)
    pub flags: u8,
}

/// Standard 16 channel SBUS payload
pub type SbusChannels16 = SbusChannels<16>;
/// Reduced 8 channel layout
pub type SbusChannels8 = SbusChannels<8>;
/// Extended 24 channel layout
pub type SbusChannels24 = SbusChannels<24>;

impl<const N: usize> Default for SbusChannels<N> {
    fn default() -> Self {
        Self {
            chan: [0; N],
            flags: 0,
        }
    }
}

impl<const N: usize> SbusChannels<N> {
    /// Number of bytes holding the packed channel fields
    pub const CHANNEL_BYTES: usize = (N * SBUS_CHANNEL_BITS + 7) / 8;

    /// Channel bytes plus the flags byte
    pub const PAYLOAD_SIZE: usize = Self::CHANNEL_BYTES + 1;

    #[must_use]
    pub fn new(chan: [u16; N], flags: u8) -> Self {
        Self { chan, flags }
    }

    /// Returns true if `flag` is set in the flags byte.
    #[must_use]
    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }

    /// Unpack a payload (channel bytes + flags byte).
    ///
    /// # Arguments
    ///
    /// * `payload` - Exactly [`Self::PAYLOAD_SIZE`] bytes
    ///
    /// # Errors
    ///
    /// Returns [`FlightCoreError::SbusFrame`] if the payload length is wrong.
    ///
    /// # Examples
    ///
    /// ```
    /// use flight_core::rx::packed::SbusChannels16;
    ///
    /// let mut payload = vec![0u8; SbusChannels16::PAYLOAD_SIZE];
    /// payload[0] = 0xFF;
    /// payload[1] = 0x07;
    /// let frame = SbusChannels16::from_payload(&payload)?;
    /// assert_eq!(frame.chan[0], 2047);
    /// assert_eq!(frame.chan[1], 0);
    /// # Ok::<(), flight_core::error::FlightCoreError>(())
    /// ```
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        if payload.len() != Self::PAYLOAD_SIZE {
            return Err(FlightCoreError::SbusFrame(format!(
                "{}ch payload must be {} bytes, got {}",
                N,
                Self::PAYLOAD_SIZE,
                payload.len()
            )));
        }

        let mut chan = [0u16; N];
        let mut acc: u32 = 0;
        let mut acc_bits = 0;
        let mut index = 0;

        for &byte in &payload[..Self::CHANNEL_BYTES] {
            acc |= u32::from(byte) << acc_bits;
            acc_bits += 8;

            while acc_bits >= SBUS_CHANNEL_BITS && index < N {
                chan[index] = (acc & u32::from(SBUS_CHANNEL_VALUE_MAX)) as u16;
                acc >>= SBUS_CHANNEL_BITS;
                acc_bits -= SBUS_CHANNEL_BITS;
                index += 1;
            }
        }

        Ok(Self {
            chan,
            flags: payload[Self::CHANNEL_BYTES],
        })
    }

    /// Pack channels and flags into a payload.
    ///
    /// Channel values above 2047 are clamped to the 11-bit maximum.
    #[must_use]
    pub fn to_payload(&self) -> Vec<u8> {
        let mut payload = vec![0u8; Self::PAYLOAD_SIZE];
        let mut bit_index = 0;

        for &channel in &self.chan {
            let value = channel.min(SBUS_CHANNEL_VALUE_MAX);

            for bit in 0..SBUS_CHANNEL_BITS {
                if (value >> bit) & 1 == 1 {
                    payload[bit_index / 8] |= 1 << (bit_index % 8);
                }
                bit_index += 1;
            }
        }

        payload[Self::CHANNEL_BYTES] = self.flags;
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_sizes() {
        assert_eq!(SbusChannels8::PAYLOAD_SIZE, 12);
        assert_eq!(SbusChannels16::PAYLOAD_SIZE, 23);
        assert_eq!(SbusChannels24::PAYLOAD_SIZE, 34);
    }

    #[test]
    fn test_flag_constants() {
        assert_eq!(SBUS_FLAG_CHANNEL_17, 0x01);
        assert_eq!(SBUS_FLAG_CHANNEL_18, 0x02);
        assert_eq!(SBUS_FLAG_SIGNAL_LOSS, 0x04);
        assert_eq!(SBUS_FLAG_FAILSAFE_ACTIVE, 0x08);
    }

    #[test]
    fn test_from_payload_wrong_length() {
        assert!(SbusChannels16::from_payload(&[0u8; 22]).is_err());
        assert!(SbusChannels16::from_payload(&[0u8; 24]).is_err());
        assert!(SbusChannels8::from_payload(&[0u8; 23]).is_err());
    }

    #[test]
    fn test_from_payload_known_bit_layout() {
        // ch0 = 0x7FF occupies bits 0..10, ch1 = 0x001 is bit 11
        let mut payload = vec![0u8; SbusChannels16::PAYLOAD_SIZE];
        payload[0] = 0xFF;
        payload[1] = 0x0F;
        payload[22] = SBUS_FLAG_FAILSAFE_ACTIVE;

        let frame = SbusChannels16::from_payload(&payload).unwrap();
        assert_eq!(frame.chan[0], 0x7FF);
        assert_eq!(frame.chan[1], 0x001);
        assert!(frame.chan[2..].iter().all(|&c| c == 0));
        assert!(frame.has_flag(SBUS_FLAG_FAILSAFE_ACTIVE));
        assert!(!frame.has_flag(SBUS_FLAG_SIGNAL_LOSS));
    }

    #[test]
    fn test_last_channel_uses_final_bits() {
        let mut payload = vec![0u8; SbusChannels8::PAYLOAD_SIZE];
        // ch7 occupies bits 77..87, i.e. top 3 bits of byte 9 and all of byte 10
        payload[9] = 0xE0;
        payload[10] = 0xFF;

        let frame = SbusChannels8::from_payload(&payload).unwrap();
        assert_eq!(frame.chan[7], 0x7FF);
        assert!(frame.chan[..7].iter().all(|&c| c == 0));
    }

    #[test]
    fn test_to_payload_all_max() {
        let frame = SbusChannels16::new([SBUS_CHANNEL_VALUE_MAX; 16], 0);
        let payload = frame.to_payload();
        assert_eq!(&payload[..22], &[0xFFu8; 22][..]);
        assert_eq!(payload[22], 0);
    }

    #[test]
    fn test_to_payload_clamps_values() {
        let mut chan = [0u16; 8];
        chan[0] = 5000;
        let payload = SbusChannels8::new(chan, 0).to_payload();
        assert_eq!(payload[0], 0xFF);
        assert_eq!(payload[1] & 0x07, 0x07);
    }

    #[test]
    fn test_typical_24ch_frame_survives_wire() {
        let mut chan = [0u16; 24];
        for (i, c) in chan.iter_mut().enumerate() {
            *c = 173 + (i as u16) * 68;
        }
        let frame = SbusChannels24::new(chan, SBUS_FLAG_CHANNEL_18);
        let decoded = SbusChannels24::from_payload(&frame.to_payload()).unwrap();
        assert_eq!(decoded, frame);
    }
}

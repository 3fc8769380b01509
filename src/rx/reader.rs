//! # SBUS Frame Reader
//!
//! Syncs complete SBUS frames out of a raw serial byte stream.
//!
//! ## Frame Structure
//!
//! ```text
//! [0x0F] [22 channel bytes] [flags] [footer]
//! ```
//!
//! The footer is `0x00` for plain SBUS; SBUS2 receivers send a footer whose
//! low nibble is `0x04`. A frame with any other footer is treated as a false
//! sync and the reader resyncs one byte further on.

use bytes::{Buf, BytesMut};
use tracing::{debug, trace};

use super::packed::SbusChannels16;

/// Start-of-frame byte
pub const SBUS_FRAME_BEGIN_BYTE: u8 = 0x0F;

/// Plain SBUS footer
pub const SBUS_FRAME_END_BYTE: u8 = 0x00;

/// Complete frame size: start byte + payload + footer
pub const SBUS_FRAME_SIZE: usize = 1 + SbusChannels16::PAYLOAD_SIZE + 1;

/// Serial baud rate SBUS runs at (8E2, inverted line)
pub const SBUS_BAUDRATE: u32 = 100_000;

const SBUS2_FOOTER_MASK: u8 = 0x0F;
const SBUS2_FOOTER_TAG: u8 = 0x04;

/// Upper bound on buffered bytes before old data is discarded
const MAX_BUFFERED_BYTES: usize = SBUS_FRAME_SIZE * 8;

fn is_valid_footer(byte: u8) -> bool {
    byte == SBUS_FRAME_END_BYTE || byte & SBUS2_FOOTER_MASK == SBUS2_FOOTER_TAG
}

/// Incremental SBUS framer.
///
/// # Examples
///
/// ```
/// use flight_core::rx::packed::SbusChannels16;
/// use flight_core::rx::reader::{SbusFrameReader, SBUS_FRAME_BEGIN_BYTE};
///
/// let frame = SbusChannels16::new([992; 16], 0);
/// let mut bytes = vec![SBUS_FRAME_BEGIN_BYTE];
/// bytes.extend_from_slice(&frame.to_payload());
/// bytes.push(0x00);
///
/// let mut reader = SbusFrameReader::new();
/// reader.push_bytes(&bytes);
/// assert_eq!(reader.next_frame(), Some(frame));
/// assert_eq!(reader.next_frame(), None);
/// ```
#[derive(Debug, Default)]
pub struct SbusFrameReader {
    buffer: BytesMut,
    frames: u64,
    resyncs: u64,
}

impl SbusFrameReader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(MAX_BUFFERED_BYTES),
            frames: 0,
            resyncs: 0,
        }
    }

    /// Append received bytes.
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);

        if self.buffer.len() > MAX_BUFFERED_BYTES {
            let excess = self.buffer.len() - MAX_BUFFERED_BYTES;
            debug!("SBUS reader overflow, discarding {} bytes", excess);
            self.buffer.advance(excess);
        }
    }

    /// Pop the next complete frame, if one is buffered.
    pub fn next_frame(&mut self) -> Option<SbusChannels16> {
        loop {
            match self.buffer.iter().position(|&b| b == SBUS_FRAME_BEGIN_BYTE) {
                Some(start) => self.buffer.advance(start),
                None => {
                    self.buffer.clear();
                    return None;
                }
            }

            if self.buffer.len() < SBUS_FRAME_SIZE {
                return None;
            }

            if !is_valid_footer(self.buffer[SBUS_FRAME_SIZE - 1]) {
                trace!("Bad SBUS footer 0x{:02X}, resyncing", self.buffer[SBUS_FRAME_SIZE - 1]);
                self.resyncs += 1;
                self.buffer.advance(1);
                continue;
            }

            let frame = self.buffer.split_to(SBUS_FRAME_SIZE);
            let payload = &frame[1..SBUS_FRAME_SIZE - 1];
            // Length is fixed by SBUS_FRAME_SIZE, so unpacking cannot fail here
            if let Ok(channels) = SbusChannels16::from_payload(payload) {
                self.frames += 1;
                return Some(channels);
            }
        }
    }

    /// Frames delivered so far
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// False syncs skipped so far
    #[must_use]
    pub fn resync_count(&self) -> u64 {
        self.resyncs
    }
}

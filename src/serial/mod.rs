//! # Serial Communication Module
//!
//! Handles the serial link to the SBUS receiver.
//!
//! This module handles:
//! - Opening the serial port at 100,000 baud, 8 data bits, even parity, 2 stop bits
//! - Async reads into the SBUS framer
//! - Yielding complete channel frames to the receive task

use crate::error::{FlightCoreError, Result};
use crate::rx::packed::SbusChannels16;
use crate::rx::reader::{SbusFrameReader, SBUS_BAUDRATE};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

/// Default read chunk size
pub const DEFAULT_READ_BUFFER_SIZE: usize = 256;

/// SBUS receiver port.
///
/// Generic over the byte source so the framing path can run against any
/// `AsyncRead`; in the binary it is a `tokio_serial::SerialStream`.
pub struct SbusSerial<R = tokio_serial::SerialStream> {
    port: R,
    device_path: String,
    reader: SbusFrameReader,
    buf: Vec<u8>,
}

impl<R> std::fmt::Debug for SbusSerial<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SbusSerial")
            .field("device_path", &self.device_path)
            .field("frames", &self.reader.frame_count())
            .finish_non_exhaustive()
    }
}

impl SbusSerial<tokio_serial::SerialStream> {
    /// Open the receiver port
    ///
    /// # Arguments
    ///
    /// * `path` - Device path (e.g., "/dev/ttyS1")
    /// * `read_buffer_size` - Bytes requested per read
    ///
    /// # Errors
    ///
    /// Returns error if the port cannot be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use flight_core::serial::SbusSerial;
    ///
    /// let serial = SbusSerial::open("/dev/ttyS1", 256)?;
    /// println!("Receiver on {}", serial.device_path());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(path: &str, read_buffer_size: usize) -> Result<Self> {
        Self::open_with_paths(&[path], read_buffer_size)
    }

    /// Open the first port that succeeds out of `paths`
    ///
    /// # Errors
    ///
    /// Returns `SerialPortNotFound` listing every path tried if none opened
    pub fn open_with_paths(paths: &[&str], read_buffer_size: usize) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open_port(path) {
                Ok(port) => {
                    info!("Opened SBUS receiver at {}", path);
                    return Ok(Self::with_port(port, path, read_buffer_size));
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                }
            }
        }

        Err(FlightCoreError::SerialPortNotFound(paths.join(", ")))
    }

    /// Open a specific serial port with SBUS line settings
    fn open_port(path: &str) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, SBUS_BAUDRATE)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::Even)
            .stop_bits(tokio_serial::StopBits::Two)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| FlightCoreError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }
}

impl<R: AsyncRead + Unpin> SbusSerial<R> {
    /// Wrap an already open byte source
    pub fn with_port(port: R, device_path: &str, read_buffer_size: usize) -> Self {
        Self {
            port,
            device_path: device_path.to_string(),
            reader: SbusFrameReader::new(),
            buf: vec![0; read_buffer_size.max(1)],
        }
    }

    /// Read until the next complete frame
    ///
    /// # Returns
    ///
    /// * `Ok(Some(frame))` - Next decoded frame
    /// * `Ok(None)` - Port reached end of stream
    ///
    /// # Errors
    ///
    /// Returns `Serial` if the underlying read fails
    pub async fn read_frame(&mut self) -> Result<Option<SbusChannels16>> {
        loop {
            if let Some(frame) = self.reader.next_frame() {
                return Ok(Some(frame));
            }

            let n = self
                .port
                .read(&mut self.buf)
                .await
                .map_err(|e| FlightCoreError::Serial(format!("Failed to read {}: {}", self.device_path, e)))?;

            if n == 0 {
                debug!("SBUS port {} closed", self.device_path);
                return Ok(None);
            }
            self.reader.push_bytes(&self.buf[..n]);
        }
    }

    /// Path of the opened device
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Frames decoded so far
    pub fn frame_count(&self) -> u64 {
        self.reader.frame_count()
    }

    /// False syncs skipped so far
    pub fn resync_count(&self) -> u64 {
        self.reader.resync_count()
    }
}

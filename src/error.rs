//! # Error Types
//!
//! Custom error types for Flight Core using `thiserror`.

use thiserror::Error;

/// Main error type for Flight Core
#[derive(Debug, Error)]
pub enum FlightCoreError {
    /// SBUS wire-format errors (bad payload length, framing)
    #[error("SBUS frame error: {0}")]
    SbusFrame(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// None of the candidate serial devices could be opened
    #[error("No serial device found (tried: {0})")]
    SerialPortNotFound(String),

    /// A required sensor was not detected
    #[error("Sensor unavailable: {0}")]
    SensorUnavailable(&'static str),

    /// Calibration store (de)serialization errors
    #[error("Persistence error: {0}")]
    Persist(#[from] serde_json::Error),
}

/// Result type alias for Flight Core
pub type Result<T> = std::result::Result<T, FlightCoreError>;

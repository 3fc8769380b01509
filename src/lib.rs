//! # Flight Core Library
//!
//! Receiver and accelerometer plumbing for a flight controller.
//!
//! This library provides:
//! - SBUS channel decoding (8, 16 and 24 channel layouts) and raw-to-pulse scaling
//! - SBUS byte-stream framing and serial input
//! - Accelerometer hardware detection with a fallback probe chain
//! - Multi-cycle accelerometer trim calibration with persistence

pub mod config;
pub mod error;
pub mod filter;
pub mod persist;
pub mod rx;
pub mod sensors;
pub mod serial;

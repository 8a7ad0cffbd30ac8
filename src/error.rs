//! Error types for the broadcast protocol and telemetry processing.
//!
//! All errors implement `std::error::Error` and carry enough structured
//! context to decide whether the failing operation can be retried.
//!
//! ## Error categories
//!
//! - **Codec errors**: malformed wire frames (short buffers, bad length
//!   prefixes, protocol bound violations). These abort only the current
//!   frame; the transport keeps reading.
//! - **Transport errors**: socket open/read/write failures, read timeouts
//!   and partial writes.
//! - **Protocol state errors**: operations attempted without a registered
//!   connection, unknown inbound discriminators.
//! - **Validation errors**: field-level violations (car index, cup
//!   category, session phase and friends).
//! - **Shared memory errors**: region mapping and consistency failures.
//! - **Config errors**: missing or unparsable `broadcasting.json`.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for telemetry operations.
pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;

/// Wire-level decoding and encoding failures.
///
/// A codec error invalidates exactly one frame. The sender is
/// authoritative, so repeated codec errors are not aggregated or healed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CodecError {
    #[error("short buffer: needed {needed} more byte(s) at offset {offset}")]
    ShortBuffer { offset: usize, needed: usize },

    #[error("length prefix {declared} at offset {offset} exceeds remaining {remaining} byte(s)")]
    InvalidLength { offset: usize, declared: usize, remaining: usize },

    #[error("string of {len} bytes does not fit a u16 length prefix")]
    StringTooLong { len: usize },

    #[error("{field} = {value} exceeds protocol bound {max}")]
    BoundExceeded { field: &'static str, value: i64, max: i64 },

    #[error("{field} = {value} outside [{min}, {max}]")]
    OutOfRange { field: &'static str, value: i64, min: i64, max: i64 },

    #[error("unknown inbound message type {0}")]
    UnknownMessageType(u8),
}

/// Main error type for the crate.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TelemetryError {
    #[error("codec failure")]
    Codec(#[from] CodecError),

    #[error("transport {op} failed")]
    Transport {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("read timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("partial write: {written} of {expected} bytes")]
    PartialWrite { written: usize, expected: usize },

    #[error("no attached broadcast session")]
    NotConnected,

    #[error("invalid {field} = {value}: {rule}")]
    Validation { field: &'static str, value: i64, rule: &'static str },

    #[error("shared memory region '{region}': {reason}")]
    SharedMemory { region: &'static str, reason: String },

    #[error("shared memory reader not connected")]
    NotMapped,

    #[error("{feature} is only available on {required_platform}")]
    UnsupportedPlatform { feature: &'static str, required_platform: &'static str },

    #[error("configuration file {path}: {reason}")]
    Config { path: PathBuf, reason: String },
}

impl TelemetryError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            TelemetryError::Transport { .. } => true,
            TelemetryError::Timeout { .. } => true,
            TelemetryError::SharedMemory { .. } => true,
            TelemetryError::NotMapped => true,
            TelemetryError::NotConnected => true,
            TelemetryError::Codec(_) => false,
            TelemetryError::PartialWrite { .. } => false,
            TelemetryError::Validation { .. } => false,
            TelemetryError::UnsupportedPlatform { .. } => false,
            TelemetryError::Config { .. } => false,
        }
    }

    /// Helper constructor for transport errors.
    pub fn transport(op: &'static str, source: std::io::Error) -> Self {
        TelemetryError::Transport { op, source }
    }

    /// Helper constructor for field-level validation errors.
    pub fn validation(field: &'static str, value: i64, rule: &'static str) -> Self {
        TelemetryError::Validation { field, value, rule }
    }

    /// Helper constructor for shared memory errors.
    pub fn shared_memory(region: &'static str, reason: impl Into<String>) -> Self {
        TelemetryError::SharedMemory { region, reason: reason.into() }
    }

    /// Helper constructor for unsupported platform errors.
    pub fn unsupported_platform(
        feature: &'static str,
        required_platform: &'static str,
    ) -> Self {
        TelemetryError::UnsupportedPlatform { feature, required_platform }
    }

    /// Helper constructor for config errors.
    pub fn config(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        TelemetryError::Config { path: path.into(), reason: reason.into() }
    }
}

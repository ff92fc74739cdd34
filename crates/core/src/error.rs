//! Error types for configuration and save states.
//!
//! The drivers themselves have no failure paths; these only cover the
//! host-side plumbing around them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported ADC division factor {0} (expected 4, 8, 16, 32, 64 or 128)")]
    DivisionFactor(u32),
    #[error("ADC channel {0} out of range (expected 0-7)")]
    Channel(u8),
    #[error("baud rate must be non-zero")]
    ZeroBaud,
    #[error("baud rate {baud} is not reachable from a {clock_hz} Hz clock")]
    BaudOutOfRange { baud: u32, clock_hz: u32 },
    #[error("threshold {0} exceeds the 10-bit ADC range")]
    Threshold(u16),
    #[error("missing value for {0}")]
    MissingValue(String),
    #[error("invalid value {value:?} for {flag}")]
    InvalidValue { flag: String, value: String },
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("save state I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("save state encoding: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("save state decompression: {0}")]
    Inflate(String),
    #[error("file too small ({0} bytes)")]
    Truncated(usize),
    #[error("invalid save state file (bad magic)")]
    BadMagic,
    #[error("unsupported save state version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },
}

//! Save state for the simulated board.
//!
//! Captures the register image, the peripheral models and the serial wire
//! capture using bincode serialization with deflate compression, so a run of
//! the headless monitor can be resumed or inspected later.
//!
//! ## File format
//!
//! ```text
//! +------------------+
//! | Magic "UNOS"     |  4 bytes
//! +------------------+
//! | Format version   |  u32 little-endian (currently 1)
//! +------------------+
//! | Compressed data  |  deflate-compressed bincode payload
//! +------------------+
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::StateError;

/// Magic bytes identifying a board save state file.
const MAGIC: &[u8; 4] = b"UNOS";
/// Current save state format version.
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 8;

// ─── Per-component state structs ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdcState {
    pub inputs: Vec<u16>,
    pub stalled: bool,
    pub conversions: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsartState {
    pub wire: Vec<u8>,
    pub udrie_enables: u32,
    pub udrie_disables: u32,
    pub dropped: u32,
}

// ─── Top-level save state ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardState {
    /// Register image, 0x00..0xFF
    pub io: Vec<u8>,
    /// External levels on port B input pins
    pub pins_b: u8,
    pub adc: AdcState,
    pub usart: UsartState,
}

// ─── Encoding ───────────────────────────────────────────────────────────────

/// Encode a state with header and deflate compression.
pub fn encode(state: &BoardState) -> Result<Vec<u8>, StateError> {
    let payload = bincode::serialize(state)?;
    let compressed = miniz_oxide::deflate::compress_to_vec(&payload, 6);

    let mut out = Vec::with_capacity(HEADER_LEN + compressed.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&compressed);
    Ok(out)
}

/// Decode a state, verifying magic and version.
pub fn decode(data: &[u8]) -> Result<BoardState, StateError> {
    if data.len() < HEADER_LEN {
        return Err(StateError::Truncated(data.len()));
    }
    if &data[0..4] != MAGIC {
        return Err(StateError::BadMagic);
    }
    let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    if version != FORMAT_VERSION {
        return Err(StateError::Version { found: version, expected: FORMAT_VERSION });
    }

    let decompressed = miniz_oxide::inflate::decompress_to_vec(&data[HEADER_LEN..])
        .map_err(|e| StateError::Inflate(format!("{:?}", e)))?;

    Ok(bincode::deserialize(&decompressed)?)
}

// ─── File I/O ───────────────────────────────────────────────────────────────

pub fn save_to_file(state: &BoardState, path: &Path) -> Result<(), StateError> {
    let out = encode(state)?;
    std::fs::write(path, out)?;
    Ok(())
}

pub fn load_from_file(path: &Path) -> Result<BoardState, StateError> {
    let data = std::fs::read(path)?;
    decode(&data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> BoardState {
        let mut io = vec![0u8; 256];
        io[0x7C] = 0x40;
        io[0xC1] = 0x08;
        BoardState {
            io,
            pins_b: 0x10,
            adc: AdcState { inputs: vec![600; 16], stalled: false, conversions: 3 },
            usart: UsartState { wire: b"600\r\n".to_vec(), udrie_enables: 1, udrie_disables: 1, dropped: 0 },
        }
    }

    #[test]
    fn test_encode_header() {
        let bytes = encode(&sample_state()).unwrap();
        assert_eq!(&bytes[0..4], b"UNOS");
        assert_eq!(u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]), 1);
        assert_eq!(decode(&bytes).unwrap(), sample_state());
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut bytes = encode(&sample_state()).unwrap();
        bytes[0] = b'X';
        assert!(matches!(decode(&bytes), Err(StateError::BadMagic)));
    }

    #[test]
    fn test_rejects_future_version() {
        let mut bytes = encode(&sample_state()).unwrap();
        bytes[4..8].copy_from_slice(&2u32.to_le_bytes());
        assert!(matches!(decode(&bytes), Err(StateError::Version { found: 2, expected: 1 })));
    }

    #[test]
    fn test_rejects_truncated() {
        assert!(matches!(decode(b"UNO"), Err(StateError::Truncated(3))));
        assert!(matches!(decode(b"UNOS\x01\x00\x00\x00garbage"), Err(StateError::Inflate(_))));
    }

    #[test]
    fn test_file_roundtrip() {
        let path = std::env::temp_dir().join(format!("uno-state-{}.state", std::process::id()));
        save_to_file(&sample_state(), &path).unwrap();
        let loaded = load_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, sample_state());
    }
}

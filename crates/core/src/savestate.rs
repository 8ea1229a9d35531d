//! Save states.
//!
//! Captures the CPU registers, SRAM, program memory, interrupt lines and the
//! banked scheduler ticks of an [`Emulator`](crate::Emulator). Peripheral
//! models own their state and are not included.
//!
//! ## File format
//!
//! ```text
//! +------------------+
//! | Magic "AVRS"     |  4 bytes
//! +------------------+
//! | Format version   |  u32 little-endian (currently 1)
//! +------------------+
//! | Compressed data  |  deflate-compressed bincode payload
//! +------------------+
//! ```

use bincode::Options;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cpu::CpuState;
use crate::error::{Error, Result};

const MAGIC: &[u8; 4] = b"AVRS";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 8;
/// Upper bound on the decompressed payload. The largest program memory
/// (2^22 words) plus a full 64K data space fits well inside it.
const MAX_PAYLOAD: usize = 16 << 20;

/// Fixed-width integers, as written by `bincode::serialize`, with a size cap
/// so a corrupt length prefix cannot request an unbounded allocation.
fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .with_limit(MAX_PAYLOAD as u64)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveState {
    /// Chip label; a state only restores onto the same chip.
    pub chip: String,
    pub cpu: CpuState,
    pub ram: Vec<u8>,
    pub program: Vec<u16>,
    pub excess_ticks: u64,
    pub irq_flags: u64,
    pub irq_enabled: u64,
}

impl SaveState {
    /// Serialize with header and deflate compression.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let payload = codec().serialize(self)?;
        let compressed = miniz_oxide::deflate::compress_to_vec(&payload, 6);

        let mut out = Vec::with_capacity(HEADER_LEN + compressed.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&compressed);
        Ok(out)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(Error::SaveState("file too small".into()));
        }
        if &data[0..4] != MAGIC {
            return Err(Error::SaveState("bad magic".into()));
        }
        let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        if version != FORMAT_VERSION {
            return Err(Error::SaveState(format!(
                "unsupported version {} (expected {})", version, FORMAT_VERSION
            )));
        }
        let decompressed =
            miniz_oxide::inflate::decompress_to_vec_with_limit(&data[HEADER_LEN..], MAX_PAYLOAD)
                .map_err(|e| Error::SaveState(format!("decompress: {:?}", e.status)))?;
        Ok(codec().deserialize(&decompressed)?)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChipConfig, Emulator};

    #[test]
    fn test_restore_resumes_execution() {
        // LDI R16, 1; INC R16 (x3)
        let prog = [0xE001, 0x9503, 0x9503, 0x9503];
        let mut em = Emulator::new(ChipConfig::atmega88()).unwrap();
        em.write_program(0, &prog).unwrap();
        em.step().unwrap();
        em.step().unwrap();
        em.store_byte(0x0100, 0xEE);

        let bytes = em.save_state().to_bytes().unwrap();
        assert_eq!(&bytes[0..4], b"AVRS");

        let mut other = Emulator::new(ChipConfig::atmega88()).unwrap();
        other.restore_state(SaveState::from_bytes(&bytes).unwrap()).unwrap();
        assert_eq!(other.cpu(), em.cpu());
        assert_eq!(other.load_byte(0x0100), 0xEE);
        other.step().unwrap();
        assert_eq!(other.reg(16), 3);
    }

    #[test]
    fn test_rejects_other_chip() {
        let em = Emulator::new(ChipConfig::atmega88()).unwrap();
        let mut other = Emulator::new(ChipConfig::atmega168()).unwrap();
        assert!(matches!(other.restore_state(em.save_state()), Err(Error::SaveState(_))));
    }

    #[test]
    fn test_bad_header() {
        assert!(SaveState::from_bytes(b"AVR").is_err());
        assert!(SaveState::from_bytes(b"ABES\x01\x00\x00\x00").is_err());
        assert!(SaveState::from_bytes(b"AVRS\x09\x00\x00\x00").is_err());
    }

    fn framed(payload: &[u8]) -> Vec<u8> {
        let mut out = b"AVRS\x01\x00\x00\x00".to_vec();
        out.extend_from_slice(&miniz_oxide::deflate::compress_to_vec(payload, 6));
        out
    }

    #[test]
    fn test_rejects_huge_length_prefix() {
        // Chip label claiming 2^63 bytes
        let bytes = framed(&(1u64 << 63).to_le_bytes());
        assert!(matches!(SaveState::from_bytes(&bytes), Err(Error::Bincode(_))));
    }

    #[test]
    fn test_rejects_oversized_payload() {
        let bytes = framed(&vec![0u8; MAX_PAYLOAD + 1]);
        assert!(matches!(SaveState::from_bytes(&bytes), Err(Error::SaveState(_))));
    }

    #[test]
    fn test_payload_is_plain_bincode() {
        // Files written before the size cap used bincode::serialize directly
        let em = Emulator::new(ChipConfig::attiny10()).unwrap();
        let state = em.save_state();
        let bytes = framed(&bincode::serialize(&state).unwrap());
        assert_eq!(SaveState::from_bytes(&bytes).unwrap(), state);
    }
}

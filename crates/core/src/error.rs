//! Error and diagnostic types.
//!
//! [`Error`] aborts the current operation. [`Warning`] describes a
//! recoverable condition raised while executing guest code (bad opcode,
//! access outside the mapped address space); the emulator keeps going and
//! only reports warnings when diagnostics are enabled.

use crate::instruction::Instruction;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("instruction {instruction} at PC ${pc:06X} is not implemented")]
    Unimplemented { pc: u32, instruction: Instruction },

    #[error("{len} words at word address ${address:06X} exceed program memory of {size} words")]
    ProgramOutOfRange { address: u32, len: usize, size: usize },

    #[error("chip {chip} has no port named {name:?}")]
    UnknownPort { chip: String, name: String },

    #[error("chip {chip} has no interrupt vector named {name:?}")]
    UnknownVector { chip: String, name: String },

    #[error("invalid chip configuration for {chip}: {reason}")]
    InvalidChip { chip: String, reason: String },

    #[error("intel hex line {line}: {reason}")]
    Hex { line: usize, reason: String },

    #[error("save state: {0}")]
    SaveState(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Bincode(#[from] bincode::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Non-fatal condition raised during execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Warning {
    #[error("invalid instruction word ${word:04X} (at PC ${pc:06X})")]
    InvalidInstruction { pc: u32, word: u16 },

    #[error("instruction {instruction} is not available on {chip} (at PC ${pc:06X})")]
    UnavailableInstruction { pc: u32, instruction: Instruction, chip: String },

    #[error("access of unmapped data memory address ${address:04X} (at PC ${pc:06X})")]
    UnmappedAddress { pc: u32, address: u16 },

    #[error("access of unmapped I/O port at address ${index:04X} in I/O bank {bank} (at PC ${pc:06X})")]
    UnmappedPort { pc: u32, bank: usize, index: u16 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let w = Warning::UnmappedAddress { pc: 0x12, address: 0x0ABC };
        assert_eq!(w.to_string(), "access of unmapped data memory address $0ABC (at PC $000012)");
        let e = Error::Unimplemented { pc: 0x40, instruction: Instruction::SLEEP };
        assert_eq!(e.to_string(), "instruction SLEEP at PC $000040 is not implemented");
    }
}

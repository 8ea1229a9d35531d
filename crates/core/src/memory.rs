//! Data address space regions and program memory.
//!
//! The 16-bit data address space is a list of non-overlapping regions, each
//! backed by one store:
//!
//! | Kind          | Backing store                       | Typical ATmega168 range |
//! |---------------|-------------------------------------|-------------------------|
//! | `Regs`        | general registers R0–R31            | 0x0000–0x001F |
//! | `Io { bank }` | port registry, bank `bank`          | 0x0020–0x00FF |
//! | `Ram`         | internal SRAM                       | 0x0100–0x04FF |
//!
//! Addresses not covered by any region are unmapped. Program memory is a
//! separate word-addressed space.

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Regs,
    Io { bank: usize },
    Ram,
}

/// A contiguous range of the data address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub start: u16,
    pub size: u32,
    pub kind: RegionKind,
}

impl Region {
    pub const fn new(start: u16, size: u32, kind: RegionKind) -> Self {
        Region { start, size, kind }
    }

    #[inline(always)]
    pub fn contains(&self, addr: u16) -> bool {
        addr >= self.start && ((addr - self.start) as u32) < self.size
    }
}

/// Ordered region list; the first region containing an address wins.
#[derive(Debug, Clone)]
pub struct RegionTable {
    regions: Vec<Region>,
}

impl RegionTable {
    pub fn new(regions: Vec<Region>) -> Self {
        RegionTable { regions }
    }

    /// Resolve an address to its region kind and the offset within it.
    #[inline]
    pub fn demap(&self, addr: u16) -> Option<(RegionKind, u16)> {
        self.regions
            .iter()
            .find(|r| r.contains(addr))
            .map(|r| (r.kind, addr - r.start))
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }
}

/// Word-addressed program memory (flash).
#[derive(Debug, Clone)]
pub struct ProgramMemory {
    words: Vec<u16>,
}

impl ProgramMemory {
    pub fn new(words: usize) -> Self {
        ProgramMemory { words: vec![0; words] }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Word-address mask; program memory size is always a power of two.
    pub fn mask(&self) -> u32 {
        (self.words.len() as u32).wrapping_sub(1)
    }

    #[inline(always)]
    pub fn read(&self, addr: u32) -> u16 {
        self.words[(addr & self.mask()) as usize]
    }

    /// Read one byte by byte address (little-endian words).
    pub fn read_byte(&self, byte_addr: u32) -> u8 {
        let word = self.read(byte_addr >> 1);
        if byte_addr & 1 == 0 { word as u8 } else { (word >> 8) as u8 }
    }

    /// Copy `words` into program memory starting at word `address`.
    ///
    /// Fails without writing anything if the range does not fit.
    pub fn write(&mut self, address: u32, words: &[u16]) -> Result<()> {
        let start = address as usize;
        let end = start.checked_add(words.len()).filter(|&e| e <= self.words.len());
        match end {
            Some(end) => {
                self.words[start..end].copy_from_slice(words);
                Ok(())
            }
            None => Err(Error::ProgramOutOfRange {
                address,
                len: words.len(),
                size: self.words.len(),
            }),
        }
    }

    /// Copy bytes into program memory starting at byte address `byte_addr`.
    ///
    /// Partial words at either end are merged with the existing contents.
    pub fn write_bytes(&mut self, byte_addr: u32, bytes: &[u8]) -> Result<()> {
        let end = byte_addr as usize + bytes.len();
        if end > self.words.len() * 2 {
            return Err(Error::ProgramOutOfRange {
                address: byte_addr >> 1,
                len: (bytes.len() + 1) / 2,
                size: self.words.len(),
            });
        }
        for (i, &b) in bytes.iter().enumerate() {
            let addr = byte_addr as usize + i;
            let word = &mut self.words[addr >> 1];
            *word = if addr & 1 == 0 {
                (*word & 0xFF00) | b as u16
            } else {
                (*word & 0x00FF) | ((b as u16) << 8)
            };
        }
        Ok(())
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.words
    }
}

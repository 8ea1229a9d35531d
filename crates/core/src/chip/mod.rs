//! Chip descriptions.
//!
//! A [`ChipConfig`] is an immutable description of one AVR part: core
//! family, memory sizes, how the 16-bit data address space is carved into
//! regions, the names of its I/O ports and interrupt vectors, and which
//! opcodes the core implements. It is built once and handed to
//! [`Emulator::new`](crate::Emulator::new), which validates it.
//!
//! Built-in parts:
//!
//! | Name       | Family            | Flash  | RAM   | Vectors |
//! |------------|-------------------|--------|-------|---------|
//! | ATmega48   | EnhancedCore8K    | 4 KB   | 512 B | 1 word  |
//! | ATmega88   | EnhancedCore128K  | 8 KB   | 1 KB  | 2 words |
//! | ATmega168  | EnhancedCore128K  | 16 KB  | 1 KB  | 2 words |
//! | ATmega2560 | EnhancedCore4M    | 256 KB | 8 KB  | 2 words |
//! | ATtiny4/5  | ReducedCore       | 512 B  | 32 B  | 1 word  |
//! | ATtiny9/10 | ReducedCore       | 1 KB   | 32 B  | 1 word  |

mod mega;
mod tiny;

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::instruction::Instruction;
use crate::interrupt::VECTOR_COUNT;
use crate::memory::{Region, RegionKind};

/// AVR core family, which determines instruction availability and some
/// cycle counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    ReducedCore,
    MinimalCore,
    ClassicCore8K,
    ClassicCore128K,
    EnhancedCore8K,
    EnhancedCore128K,
    EnhancedCore4M,
    Xmega,
}

/// Address of an I/O port: bank number and index within the bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortRef {
    pub bank: usize,
    pub index: u16,
}

impl PortRef {
    pub const fn new(bank: usize, index: u16) -> Self {
        PortRef { bank, index }
    }
}

#[derive(Debug, Clone)]
pub struct ChipConfig {
    pub label: String,
    pub family: Family,
    /// Number of general-purpose registers (32, or 16 on the reduced core).
    pub num_regs: u16,
    /// log2 of program memory size in 16-bit words.
    pub log_prog_mem_size: u8,
    /// log2 of the data address space size in bytes.
    pub log_data_space_size: u8,
    /// log2 of internal SRAM size in bytes.
    pub log_ram_size: u8,
    /// log2 of EEPROM size in bytes (0 when there is none).
    pub log_eeprom_size: u8,
    pub io_bank_sizes: Vec<u16>,
    pub regions: Vec<Region>,
    pub ports: BTreeMap<String, PortRef>,
    /// Interrupt vector numbers by name (e.g. `TIMER0_OVF`).
    pub vectors: BTreeMap<String, u8>,
    /// Size of one interrupt vector table entry in words.
    pub vector_words: u8,
    pub available: [bool; Instruction::COUNT],
}

impl ChipConfig {
    pub fn atmega48() -> Self {
        mega::atmega_x8("ATmega48", Family::EnhancedCore8K, 11, 9, 8, 1)
    }

    pub fn atmega88() -> Self {
        mega::atmega_x8("ATmega88", Family::EnhancedCore128K, 12, 10, 9, 2)
    }

    pub fn atmega168() -> Self {
        mega::atmega_x8("ATmega168", Family::EnhancedCore128K, 13, 10, 9, 2)
    }

    pub fn atmega2560() -> Self {
        mega::atmega2560()
    }

    pub fn attiny4() -> Self {
        tiny::attiny("ATtiny4", 8, false)
    }

    pub fn attiny5() -> Self {
        tiny::attiny("ATtiny5", 8, true)
    }

    pub fn attiny9() -> Self {
        tiny::attiny("ATtiny9", 9, false)
    }

    pub fn attiny10() -> Self {
        tiny::attiny("ATtiny10", 9, true)
    }

    /// Names accepted by [`ChipConfig::by_name`].
    pub const NAMES: [&'static str; 8] = [
        "atmega48", "atmega88", "atmega168", "atmega2560",
        "attiny4", "attiny5", "attiny9", "attiny10",
    ];

    /// Look up a built-in chip by case-insensitive name.
    pub fn by_name(name: &str) -> Option<Self> {
        let chip = match name.to_ascii_lowercase().as_str() {
            "atmega48" => Self::atmega48(),
            "atmega88" => Self::atmega88(),
            "atmega168" => Self::atmega168(),
            "atmega2560" => Self::atmega2560(),
            "attiny4" => Self::attiny4(),
            "attiny5" => Self::attiny5(),
            "attiny9" => Self::attiny9(),
            "attiny10" => Self::attiny10(),
            _ => return None,
        };
        Some(chip)
    }

    pub fn is_reduced_core(&self) -> bool {
        self.family == Family::ReducedCore
    }

    pub fn is_xmega(&self) -> bool {
        self.family == Family::Xmega
    }

    #[inline(always)]
    pub fn is_available(&self, inst: Instruction) -> bool {
        self.available[inst.index()]
    }

    pub fn prog_words(&self) -> usize {
        1 << self.log_prog_mem_size
    }

    pub fn ram_size(&self) -> usize {
        1 << self.log_ram_size
    }

    /// True when the program counter needs three bytes on the stack.
    pub fn has_22bit_pc(&self) -> bool {
        self.log_prog_mem_size > 16
    }

    pub fn port(&self, name: &str) -> Option<PortRef> {
        self.ports.get(name).copied()
    }

    pub fn vector(&self, name: &str) -> Option<u8> {
        self.vectors.get(name).copied()
    }

    /// Check the address map and sizes for consistency.
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| Error::InvalidChip { chip: self.label.clone(), reason };

        if self.log_data_space_size > 16 {
            return Err(fail(format!("data space of 2^{} bytes exceeds 16 bits", self.log_data_space_size)));
        }
        if self.log_prog_mem_size > 22 {
            return Err(fail(format!("program memory of 2^{} words exceeds 22 bits", self.log_prog_mem_size)));
        }
        if self.log_ram_size > 16 {
            return Err(fail(format!("RAM of 2^{} bytes exceeds 16 bits", self.log_ram_size)));
        }
        if self.num_regs > 32 {
            return Err(fail(format!("{} general registers exceeds 32", self.num_regs)));
        }
        let space = 1u32 << self.log_data_space_size;

        for r in &self.regions {
            let limit = match r.kind {
                RegionKind::Regs => self.num_regs as u32,
                RegionKind::Io { bank } => match self.io_bank_sizes.get(bank) {
                    Some(&size) => size as u32,
                    None => return Err(fail(format!("region at ${:04X} uses missing I/O bank {}", r.start, bank))),
                },
                RegionKind::Ram => self.ram_size() as u32,
            };
            if r.size > limit {
                return Err(fail(format!("region at ${:04X} is larger than its backing store", r.start)));
            }
            if r.start as u32 + r.size > space {
                return Err(fail(format!("region at ${:04X} extends past the data space", r.start)));
            }
        }

        for (i, a) in self.regions.iter().enumerate() {
            for b in &self.regions[i + 1..] {
                let a_end = a.start as u32 + a.size;
                let b_end = b.start as u32 + b.size;
                if (a.start as u32) < b_end && (b.start as u32) < a_end {
                    return Err(fail(format!("regions at ${:04X} and ${:04X} overlap", a.start, b.start)));
                }
            }
        }

        for (name, &v) in &self.vectors {
            if v >= VECTOR_COUNT {
                return Err(fail(format!("vector {} = {} exceeds the {} interrupt lines", name, v, VECTOR_COUNT)));
            }
        }

        for (name, p) in &self.ports {
            match self.io_bank_sizes.get(p.bank) {
                Some(&size) if p.index < size => {}
                _ => return Err(fail(format!("port {} outside I/O bank {}", name, p.bank))),
            }
        }
        Ok(())
    }
}

use Instruction as I;

const REDUCED_ONLY: &[Instruction] =
    &[I::LD_Y, I::LD_Z, I::ST_Y, I::ST_Z, I::LDS_SHORT, I::STS_SHORT];

const REDUCED_MISSING: &[Instruction] = &[
    I::ADIW, I::CALL, I::DES, I::EICALL, I::EIJMP, I::ELPM_R0, I::ELPM, I::ELPM_INC,
    I::FMUL, I::FMULS, I::FMULSU, I::JMP, I::LAC, I::LAS, I::LAT, I::LDD_Y, I::LDD_Z,
    I::LDS, I::LPM_R0, I::LPM, I::LPM_INC, I::MOVW, I::MUL, I::MULS, I::MULSU, I::SBIW,
    I::SPM, I::SPM_2, I::STD_Y, I::STD_Z, I::STS, I::XCH,
];

// Cores without SRAM: only Z-indirect access and no stack instructions.
const MINIMAL_MISSING: &[Instruction] = &[
    I::ADIW, I::SBIW, I::IJMP, I::ICALL, I::LDS, I::STS, I::PUSH, I::POP,
    I::LD_X, I::LD_X_INC, I::LD_X_DEC, I::LD_Y_INC, I::LD_Y_DEC, I::LDD_Y,
    I::LD_Z_INC, I::LD_Z_DEC, I::ST_X, I::ST_X_INC, I::ST_X_DEC,
    I::ST_Y_INC, I::ST_Y_DEC, I::STD_Y, I::ST_Z_INC, I::ST_Z_DEC,
];

const LONG_JUMPS: &[Instruction] = &[I::JMP, I::CALL];

const ENHANCED: &[Instruction] = &[
    I::MUL, I::MULS, I::MULSU, I::FMUL, I::FMULS, I::FMULSU,
    I::MOVW, I::LPM, I::LPM_INC, I::SPM, I::BREAK,
];

const EXTENDED_LPM: &[Instruction] = &[I::ELPM, I::ELPM_INC];

const EXTENDED_INDIRECT: &[Instruction] = &[I::EICALL, I::EIJMP];

const XMEGA_ONLY: &[Instruction] = &[I::DES, I::LAC, I::LAS, I::LAT, I::XCH, I::SPM_2];

fn set(table: &mut [bool; Instruction::COUNT], list: &[Instruction], value: bool) {
    for inst in list {
        table[inst.index()] = value;
    }
}

/// Instruction availability table for a core family.
pub fn availability(family: Family) -> [bool; Instruction::COUNT] {
    let mut table = [true; Instruction::COUNT];
    if family == Family::ReducedCore {
        set(&mut table, REDUCED_MISSING, false);
        return table;
    }

    set(&mut table, REDUCED_ONLY, false);
    set(&mut table, LONG_JUMPS, false);
    set(&mut table, ENHANCED, false);
    set(&mut table, &[I::ELPM_R0], false);
    set(&mut table, EXTENDED_LPM, false);
    set(&mut table, EXTENDED_INDIRECT, false);
    set(&mut table, XMEGA_ONLY, false);

    match family {
        Family::ReducedCore | Family::ClassicCore8K => {}
        Family::MinimalCore => set(&mut table, MINIMAL_MISSING, false),
        Family::ClassicCore128K => {
            set(&mut table, LONG_JUMPS, true);
            set(&mut table, &[I::ELPM_R0], true);
        }
        Family::EnhancedCore8K => set(&mut table, ENHANCED, true),
        Family::EnhancedCore128K | Family::EnhancedCore4M | Family::Xmega => {
            set(&mut table, ENHANCED, true);
            set(&mut table, LONG_JUMPS, true);
            set(&mut table, &[I::ELPM_R0], true);
            set(&mut table, EXTENDED_LPM, true);
            if family != Family::EnhancedCore128K {
                set(&mut table, EXTENDED_INDIRECT, true);
            }
            if family == Family::Xmega {
                set(&mut table, XMEGA_ONLY, true);
            }
        }
    }
    table
}

/// Build a name table from `(name, bank, index)` triples.
pub(crate) fn port_table(entries: &[(&str, usize, u16)]) -> BTreeMap<String, PortRef> {
    entries
        .iter()
        .map(|&(name, bank, index)| (name.to_string(), PortRef::new(bank, index)))
        .collect()
}

pub(crate) fn vector_table(entries: &[(&str, u8)]) -> BTreeMap<String, u8> {
    entries.iter().map(|&(name, n)| (name.to_string(), n)).collect()
}

//! # avrem-core
//!
//! Cycle-counting emulation core for 8-bit AVR microcontrollers.
//!
//! Decodes the AVR instruction stream, executes every instruction with its
//! register, flag, memory and I/O effects, and advances a shared clock so
//! the CPU and peripheral models stay within one instruction of each other.
//! Supports the reduced core (ATtiny4/5/9/10), the classic and enhanced
//! megaAVR cores up to 22-bit program counters (ATmega2560) and the XMEGA
//! additions.
//!
//! ## Architecture
//!
//! - [`Instruction`] — the 103 opcodes, in canonical order
//! - [`decode`] — mask/match decoder and per-core lookup table
//! - [`ChipConfig`] — chip description: memory sizes, region map, port and
//!   vector names, instruction availability
//! - [`Emulator`] — CPU state, data space, program memory, port registry
//!   and the execution engine
//! - [`Port`] — peripheral register trait; ports are bound by bank/index or
//!   by name
//! - [`Interrupts`] — interrupt request lines shared with peripherals
//! - [`Clock`] / [`Process`] — scheduler that drives the CPU and
//!   peripherals with the same tick budget
//! - [`peripherals`] — GPIO and 8-bit timer models
//! - [`hex`] — Intel HEX loader
//! - [`savestate`] — compressed save states
//!
//! ## Example
//!
//! ```no_run
//! use avrem_core::{ChipConfig, Clock, Emulator};
//! use std::{cell::RefCell, rc::Rc};
//!
//! # fn main() -> avrem_core::Result<()> {
//! let mut em = Emulator::new(ChipConfig::atmega168())?;
//! avrem_core::hex::load_hex(&mut em, &std::fs::read_to_string("blink.hex")?)?;
//! let mut clock = Clock::new();
//! clock.add(Rc::new(RefCell::new(em)));
//! clock.run(16_000_000)?;
//! # Ok(())
//! # }
//! ```

pub mod chip;
pub mod clock;
pub mod cpu;
pub mod decode;
pub mod emulator;
pub mod error;
pub mod hex;
pub mod instruction;
pub mod interrupt;
pub mod memory;
pub mod peripherals;
pub mod port;
pub mod savestate;

pub use chip::{ChipConfig, Family, PortRef};
pub use clock::{Clock, Divider, Process};
pub use cpu::CpuState;
pub use emulator::Emulator;
pub use error::{Error, Result, Warning};
pub use instruction::Instruction;
pub use interrupt::Interrupts;
pub use port::Port;
pub use savestate::SaveState;

// SREG bit positions
pub const SREG_C: u8 = 0;
pub const SREG_Z: u8 = 1;
pub const SREG_N: u8 = 2;
pub const SREG_V: u8 = 3;
pub const SREG_S: u8 = 4;
pub const SREG_H: u8 = 5;
pub const SREG_T: u8 = 6;
pub const SREG_I: u8 = 7;

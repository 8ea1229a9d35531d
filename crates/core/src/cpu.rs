//! AVR CPU register state.
//!
//! [`CpuState`] holds everything the execution engine mutates besides
//! memory: the register file, SREG, program counter, stack pointer, the
//! RAMP extension bytes and EIND. The status-register helpers compute flags
//! from the operands `a`, `b` and the result `x` using the bitwise carry and
//! overflow vectors from the AVR instruction set manual.
//!
//! Multi-byte SBC/SBCI/CPC chains never set Z, they only clear it, so a
//! comparison of a multi-byte value leaves Z set only if every byte matched.

use serde::{Deserialize, Serialize};

use crate::{SREG_C, SREG_H, SREG_N, SREG_S, SREG_V, SREG_Z};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuState {
    pub regs: [u8; 32],
    /// Status register: I T H S V N Z C (bits 7..0)
    pub sreg: u8,
    /// Program counter (word address, up to 22 bits)
    pub pc: u32,
    /// Stack pointer (byte address in data space)
    pub sp: u16,
    pub rampx: u8,
    pub rampy: u8,
    pub rampz: u8,
    pub rampd: u8,
    pub eind: u8,
    /// Monotonic cycle counter
    pub tick: u64,
}

impl Default for CpuState {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuState {
    pub fn new() -> Self {
        CpuState {
            regs: [0; 32],
            sreg: 0,
            pc: 0,
            sp: 0,
            rampx: 0,
            rampy: 0,
            rampz: 0,
            rampd: 0,
            eind: 0,
            tick: 0,
        }
    }

    #[inline(always)]
    pub fn flag(&self, bit: u8) -> bool {
        self.sreg & (1 << bit) != 0
    }

    #[inline(always)]
    pub fn set_flag(&mut self, bit: u8, v: bool) {
        if v { self.sreg |= 1 << bit; } else { self.sreg &= !(1 << bit); }
    }

    /// Read 16-bit register pair starting at `lo` (little-endian).
    #[inline(always)]
    pub fn pair(&self, lo: usize) -> u16 {
        self.regs[lo] as u16 | ((self.regs[lo + 1] as u16) << 8)
    }

    #[inline(always)]
    pub fn set_pair(&mut self, lo: usize, v: u16) {
        self.regs[lo] = v as u8;
        self.regs[lo + 1] = (v >> 8) as u8;
    }

    /// X register (R27:R26)
    pub fn x(&self) -> u16 {
        self.pair(26)
    }

    /// Y register (R29:R28)
    pub fn y(&self) -> u16 {
        self.pair(28)
    }

    /// Z register (R31:R30)
    pub fn z(&self) -> u16 {
        self.pair(30)
    }

    /// Flags for an 8-bit addition `x = a + b (+ C)`.
    ///
    /// With `chain` set (ADC), Z is only cleared, never set.
    pub fn flags_add(&mut self, a: u8, b: u8, x: u8, chain: bool) {
        let c = (a & b) | (b & !x) | (!x & a);
        let v = (a & b & !x) | (!a & !b & x);
        self.set_arith(c, v, x, chain);
    }

    /// Flags for an 8-bit subtraction `x = a - b (- C)`.
    ///
    /// With `chain` set (SBC, SBCI, CPC), Z is only cleared, never set.
    pub fn flags_sub(&mut self, a: u8, b: u8, x: u8, chain: bool) {
        let c = (!a & b) | (b & x) | (x & !a);
        let v = (a & !b & !x) | (!a & b & x);
        self.set_arith(c, v, x, chain);
    }

    fn set_arith(&mut self, c: u8, v: u8, x: u8, chain: bool) {
        let n = x & 0x80 != 0;
        let v = v & 0x80 != 0;
        let z = x == 0 && (!chain || self.flag(SREG_Z));
        self.set_flag(SREG_H, c & 0x08 != 0);
        self.set_flag(SREG_C, c & 0x80 != 0);
        self.set_flag(SREG_V, v);
        self.set_flag(SREG_N, n);
        self.set_flag(SREG_Z, z);
        self.set_flag(SREG_S, n ^ v);
    }

    /// Flags for AND/OR/EOR and friends: V cleared, N and Z from result.
    pub fn flags_logic(&mut self, x: u8) {
        let n = x & 0x80 != 0;
        self.set_flag(SREG_V, false);
        self.set_flag(SREG_N, n);
        self.set_flag(SREG_Z, x == 0);
        self.set_flag(SREG_S, n);
    }

    /// Flags for right shifts and rotates, where `carry` is the bit shifted out.
    pub fn flags_shift(&mut self, x: u8, carry: bool) {
        let n = x & 0x80 != 0;
        let v = n ^ carry;
        self.set_flag(SREG_C, carry);
        self.set_flag(SREG_N, n);
        self.set_flag(SREG_Z, x == 0);
        self.set_flag(SREG_V, v);
        self.set_flag(SREG_S, n ^ v);
    }

    /// Flags for 16-bit results (ADIW/SBIW): N, Z and S from `x`, given V and C.
    pub fn flags_word(&mut self, x: u16, v: bool, c: bool) {
        let n = x & 0x8000 != 0;
        self.set_flag(SREG_V, v);
        self.set_flag(SREG_C, c);
        self.set_flag(SREG_N, n);
        self.set_flag(SREG_Z, x == 0);
        self.set_flag(SREG_S, n ^ v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_overflow_to_zero() {
        let mut cpu = CpuState::new();
        cpu.flags_add(0xFF, 0x01, 0x00, false);
        assert!(cpu.flag(SREG_Z));
        assert!(cpu.flag(SREG_C));
        assert!(cpu.flag(SREG_H));
        assert!(!cpu.flag(SREG_N));
        assert!(!cpu.flag(SREG_V));
        assert!(!cpu.flag(SREG_S));
    }

    #[test]
    fn test_add_signed_overflow() {
        let mut cpu = CpuState::new();
        cpu.flags_add(0x7F, 0x01, 0x80, false);
        assert!(cpu.flag(SREG_V));
        assert!(cpu.flag(SREG_N));
        assert!(!cpu.flag(SREG_S));
        assert!(!cpu.flag(SREG_C));
    }

    #[test]
    fn test_sub_borrow() {
        let mut cpu = CpuState::new();
        cpu.flags_sub(0x00, 0x01, 0xFF, false);
        assert!(cpu.flag(SREG_C));
        assert!(cpu.flag(SREG_H));
        assert!(cpu.flag(SREG_N));
        assert!(!cpu.flag(SREG_Z));
        assert!(cpu.flag(SREG_S));
    }

    #[test]
    fn test_chain_only_clears_z() {
        let mut cpu = CpuState::new();
        cpu.set_flag(SREG_Z, false);
        cpu.flags_sub(0x10, 0x10, 0x00, true);
        assert!(!cpu.flag(SREG_Z), "chained zero must not set Z");
        cpu.set_flag(SREG_Z, true);
        cpu.flags_sub(0x10, 0x10, 0x00, true);
        assert!(cpu.flag(SREG_Z));
        cpu.flags_sub(0x10, 0x0F, 0x01, true);
        assert!(!cpu.flag(SREG_Z));
    }

    #[test]
    fn test_shift_flags() {
        let mut cpu = CpuState::new();
        // LSR 0x01 -> 0x00, carry out
        cpu.flags_shift(0x00, true);
        assert!(cpu.flag(SREG_C));
        assert!(cpu.flag(SREG_Z));
        assert!(cpu.flag(SREG_V));
        assert!(cpu.flag(SREG_S));
    }

    #[test]
    fn test_pairs() {
        let mut cpu = CpuState::new();
        cpu.set_pair(30, 0x1234);
        assert_eq!(cpu.regs[30], 0x34);
        assert_eq!(cpu.regs[31], 0x12);
        assert_eq!(cpu.z(), 0x1234);
        cpu.set_pair(26, 0xBEEF);
        assert_eq!(cpu.x(), 0xBEEF);
        assert_eq!(cpu.y(), 0);
    }
}

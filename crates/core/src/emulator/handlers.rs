//! Instruction execution.
//!
//! One handler per [`Instruction`], collected into [`HANDLERS`] in opcode
//! order. Each handler receives the first instruction word (the PC already
//! points past it), extracts its own operands, and returns the cycle count.
//!
//! Operand fields:
//!
//! | Field | Bits | Used by |
//! |-------|------|---------|
//! | `d` (5-bit) | `w[8:4]` | most register forms |
//! | `r` (5-bit) | `w[9], w[3:0]` | two-register forms |
//! | `d` (4-bit, R16+) | `w[7:4]` | immediate forms |
//! | `K` (8-bit) | `w[11:8], w[3:0]` | immediate forms |
//! | `A` (6-bit) | `w[10:9], w[3:0]` | IN/OUT |
//! | `A` (5-bit) | `w[7:3]` | CBI/SBI/SBIC/SBIS |
//! | `q` (6-bit) | `w[13], w[11:10], w[2:0]` | LDD/STD |
//! | `k` (7-bit) | `w[9:3]` signed | BRBS/BRBC |
//! | `k` (12-bit) | `w[11:0]` signed | RJMP/RCALL |

use super::Emulator;
use crate::error::Result;
use crate::instruction::Instruction;
use crate::{SREG_C, SREG_I, SREG_N, SREG_S, SREG_T, SREG_V, SREG_Z};

type Handler = fn(&mut Emulator, u16) -> Result<u32>;

static HANDLERS: [Handler; Instruction::COUNT] = {
    let mut table = [nop as Handler; Instruction::COUNT];
    let mut i = 0;
    while i < Instruction::COUNT {
        table[i] = handler_for(Instruction::ALL[i]);
        i += 1;
    }
    table
};

#[inline(always)]
pub(super) fn dispatch(em: &mut Emulator, inst: Instruction, word: u16) -> Result<u32> {
    HANDLERS[inst.index()](em, word)
}

const fn handler_for(inst: Instruction) -> Handler {
    use Instruction as I;
    match inst {
        I::ADC => adc,
        I::ADD => add,
        I::ADIW => adiw,
        I::AND => and,
        I::ANDI => andi,
        I::ASR => asr,
        I::BCLR => bclr,
        I::BLD => bld,
        I::BRBC => brbc,
        I::BRBS => brbs,
        I::BREAK => break_,
        I::BSET => bset,
        I::BST => bst,
        I::CALL => call,
        I::CBI => cbi,
        I::COM => com,
        I::CP => cp,
        I::CPC => cpc,
        I::CPI => cpi,
        I::CPSE => cpse,
        I::DEC => dec,
        I::DES => des,
        I::EICALL => eicall,
        I::EIJMP => eijmp,
        I::ELPM_R0 => elpm_r0,
        I::ELPM => elpm,
        I::ELPM_INC => elpm_inc,
        I::EOR => eor,
        I::FMUL => fmul,
        I::FMULS => fmuls,
        I::FMULSU => fmulsu,
        I::ICALL => icall,
        I::IJMP => ijmp,
        I::IN => in_,
        I::INC => inc,
        I::JMP => jmp,
        I::LAC => lac,
        I::LAS => las,
        I::LAT => lat,
        I::LD_X => ld_x,
        I::LD_X_INC => ld_x_inc,
        I::LD_X_DEC => ld_x_dec,
        I::LD_Y => ld_y,
        I::LD_Y_INC => ld_y_inc,
        I::LD_Y_DEC => ld_y_dec,
        I::LDD_Y => ldd_y,
        I::LD_Z => ld_z,
        I::LD_Z_INC => ld_z_inc,
        I::LD_Z_DEC => ld_z_dec,
        I::LDD_Z => ldd_z,
        I::LDI => ldi,
        I::LDS => lds,
        I::LDS_SHORT => lds_short,
        I::LPM_R0 => lpm_r0,
        I::LPM => lpm,
        I::LPM_INC => lpm_inc,
        I::LSR => lsr,
        I::MOV => mov,
        I::MOVW => movw,
        I::MUL => mul,
        I::MULS => muls,
        I::MULSU => mulsu,
        I::NEG => neg,
        I::NOP => nop,
        I::OR => or,
        I::ORI => ori,
        I::OUT => out,
        I::POP => pop,
        I::PUSH => push,
        I::RCALL => rcall,
        I::RET => ret,
        I::RETI => reti,
        I::RJMP => rjmp,
        I::ROR => ror,
        I::SBC => sbc,
        I::SBCI => sbci,
        I::SBI => sbi,
        I::SBIC => sbic,
        I::SBIS => sbis,
        I::SBIW => sbiw,
        I::SBRC => sbrc,
        I::SBRS => sbrs,
        I::SLEEP => sleep,
        I::SPM => spm,
        I::SPM_2 => spm_2,
        I::ST_X => st_x,
        I::ST_X_INC => st_x_inc,
        I::ST_X_DEC => st_x_dec,
        I::ST_Y => st_y,
        I::ST_Y_INC => st_y_inc,
        I::ST_Y_DEC => st_y_dec,
        I::STD_Y => std_y,
        I::ST_Z => st_z,
        I::ST_Z_INC => st_z_inc,
        I::ST_Z_DEC => st_z_dec,
        I::STD_Z => std_z,
        I::STS => sts,
        I::STS_SHORT => sts_short,
        I::SUB => sub,
        I::SUBI => subi,
        I::SWAP => swap,
        I::WDR => wdr,
        I::XCH => xch,
    }
}

// --- Operand fields ---

#[inline(always)]
fn rd(w: u16) -> usize {
    ((w >> 4) & 0x1F) as usize
}

#[inline(always)]
fn rr(w: u16) -> usize {
    (((w & 0x0200) >> 5) | (w & 0x000F)) as usize
}

#[inline(always)]
fn rd_hi(w: u16) -> usize {
    16 + ((w >> 4) & 0x0F) as usize
}

#[inline(always)]
fn imm8(w: u16) -> u8 {
    (((w & 0x0F00) >> 4) | (w & 0x000F)) as u8
}

#[inline(always)]
fn io6(w: u16) -> u16 {
    ((w & 0x0600) >> 5) | (w & 0x000F)
}

#[inline(always)]
fn io5(w: u16) -> u16 {
    (w & 0x00F8) >> 3
}

#[inline(always)]
fn bit(w: u16) -> u8 {
    (w & 0x0007) as u8
}

#[inline(always)]
fn sreg_bit(w: u16) -> u8 {
    ((w >> 4) & 0x07) as u8
}

#[inline(always)]
fn displacement(w: u16) -> u16 {
    ((w & 0x2000) >> 8) | ((w & 0x0C00) >> 7) | (w & 0x0007)
}

#[inline(always)]
fn rel7(w: u16) -> i32 {
    (((w & 0x03F8) as i16) << 6 >> 9) as i32
}

#[inline(always)]
fn rel12(w: u16) -> i32 {
    (((w & 0x0FFF) as i16) << 4 >> 4) as i32
}

// --- Shared helpers ---

impl Emulator {
    fn jump_relative(&mut self, k: i32) {
        self.cpu.pc = (self.cpu.pc as i32).wrapping_add(k) as u32 & self.prog.mask();
    }

    fn jump(&mut self, target: u32) {
        self.cpu.pc = target & self.prog.mask();
    }

    /// Data pointer in the register pair starting at `lo`. Chips with a data
    /// space of 256 bytes or less only use the low register.
    fn pointer(&self, lo: usize) -> u16 {
        if self.chip.log_data_space_size > 8 {
            self.cpu.pair(lo)
        } else {
            self.cpu.regs[lo] as u16
        }
    }

    fn set_pointer(&mut self, lo: usize, v: u16) {
        if self.chip.log_data_space_size > 8 {
            self.cpu.set_pair(lo, v);
        } else {
            self.cpu.regs[lo] = v as u8;
        }
    }

    /// Cycle cost of a call: `base`, one more with a 3-byte PC, one less on XMEGA.
    fn call_cycles(&self, base: u32) -> u32 {
        let mut cycles = base;
        if self.chip.has_22bit_pc() { cycles += 1; }
        if self.chip.is_xmega() { cycles -= 1; }
        cycles
    }

    fn ret_cycles(&self) -> u32 {
        if self.chip.has_22bit_pc() { 5 } else { 4 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Plain,
    PostInc,
    PreDec,
    Disp(u16),
}

/// X, Y and Z pointer registers (low register index).
const X: usize = 26;
const Y: usize = 28;
const Z: usize = 30;

fn indirect_address(em: &mut Emulator, ptr: usize, mode: Mode) -> u16 {
    let p = em.pointer(ptr);
    match mode {
        Mode::Plain => p,
        Mode::PostInc => {
            em.set_pointer(ptr, p.wrapping_add(1));
            p
        }
        Mode::PreDec => {
            let p = p.wrapping_sub(1);
            em.set_pointer(ptr, p);
            p
        }
        Mode::Disp(q) => p.wrapping_add(q),
    }
}

fn load_indirect(em: &mut Emulator, w: u16, ptr: usize, mode: Mode) -> Result<u32> {
    let addr = indirect_address(em, ptr, mode);
    let v = em.load_byte(addr);
    em.cpu.regs[rd(w)] = v;
    let cycles = if em.chip.is_xmega() {
        match mode {
            Mode::PreDec | Mode::Disp(_) => 2,
            _ => 1,
        }
    } else {
        match mode {
            Mode::PostInc => 2,
            Mode::PreDec => 3,
            _ => 1,
        }
    };
    Ok(cycles)
}

fn store_indirect(em: &mut Emulator, w: u16, ptr: usize, mode: Mode) -> Result<u32> {
    let v = em.cpu.regs[rd(w)];
    let addr = indirect_address(em, ptr, mode);
    em.store_byte(addr, v);
    let cycles = if em.chip.is_xmega() {
        match mode {
            Mode::PreDec | Mode::Disp(_) => 2,
            _ => 1,
        }
    } else if em.chip.is_reduced_core() {
        if mode == Mode::PreDec { 2 } else { 1 }
    } else {
        2
    };
    Ok(cycles)
}

/// `Rd - b (- C)`; stores the result unless this is a compare.
fn sub_with(em: &mut Emulator, d: usize, b: u8, chained: bool, store: bool) {
    let a = em.cpu.regs[d];
    let c = if chained { em.cpu.flag(SREG_C) as u8 } else { 0 };
    let x = a.wrapping_sub(b).wrapping_sub(c);
    em.cpu.flags_sub(a, b, x, chained);
    if store {
        em.cpu.regs[d] = x;
    }
}

// --- Arithmetic ---

fn add(em: &mut Emulator, w: u16) -> Result<u32> {
    let (d, b) = (rd(w), em.cpu.regs[rr(w)]);
    let a = em.cpu.regs[d];
    let x = a.wrapping_add(b);
    em.cpu.flags_add(a, b, x, false);
    em.cpu.regs[d] = x;
    Ok(1)
}

fn adc(em: &mut Emulator, w: u16) -> Result<u32> {
    let b = em.cpu.regs[rr(w)];
    let d = rd(w);
    let a = em.cpu.regs[d];
    let x = a.wrapping_add(b).wrapping_add(em.cpu.flag(SREG_C) as u8);
    em.cpu.flags_add(a, b, x, true);
    em.cpu.regs[d] = x;
    Ok(1)
}

fn sub(em: &mut Emulator, w: u16) -> Result<u32> {
    let b = em.cpu.regs[rr(w)];
    sub_with(em, rd(w), b, false, true);
    Ok(1)
}

fn subi(em: &mut Emulator, w: u16) -> Result<u32> {
    sub_with(em, rd_hi(w), imm8(w), false, true);
    Ok(1)
}

fn sbc(em: &mut Emulator, w: u16) -> Result<u32> {
    let b = em.cpu.regs[rr(w)];
    sub_with(em, rd(w), b, true, true);
    Ok(1)
}

fn sbci(em: &mut Emulator, w: u16) -> Result<u32> {
    sub_with(em, rd_hi(w), imm8(w), true, true);
    Ok(1)
}

fn cp(em: &mut Emulator, w: u16) -> Result<u32> {
    let b = em.cpu.regs[rr(w)];
    sub_with(em, rd(w), b, false, false);
    Ok(1)
}

fn cpc(em: &mut Emulator, w: u16) -> Result<u32> {
    let b = em.cpu.regs[rr(w)];
    sub_with(em, rd(w), b, true, false);
    Ok(1)
}

fn cpi(em: &mut Emulator, w: u16) -> Result<u32> {
    sub_with(em, rd_hi(w), imm8(w), false, false);
    Ok(1)
}

fn neg(em: &mut Emulator, w: u16) -> Result<u32> {
    let d = rd(w);
    let a = em.cpu.regs[d];
    let x = 0u8.wrapping_sub(a);
    em.cpu.flags_sub(0, a, x, false);
    em.cpu.regs[d] = x;
    Ok(1)
}

fn inc(em: &mut Emulator, w: u16) -> Result<u32> {
    let d = rd(w);
    let a = em.cpu.regs[d];
    let x = a.wrapping_add(1);
    set_nzvs(em, x, a == 0x7F);
    em.cpu.regs[d] = x;
    Ok(1)
}

fn dec(em: &mut Emulator, w: u16) -> Result<u32> {
    let d = rd(w);
    let a = em.cpu.regs[d];
    let x = a.wrapping_sub(1);
    set_nzvs(em, x, a == 0x80);
    em.cpu.regs[d] = x;
    Ok(1)
}

fn set_nzvs(em: &mut Emulator, x: u8, v: bool) {
    let n = x & 0x80 != 0;
    em.cpu.set_flag(SREG_N, n);
    em.cpu.set_flag(SREG_Z, x == 0);
    em.cpu.set_flag(SREG_V, v);
    em.cpu.set_flag(SREG_S, n ^ v);
}

fn adiw(em: &mut Emulator, w: u16) -> Result<u32> {
    let d = 24 + ((w & 0x0030) >> 3) as usize;
    let k = ((w & 0x00C0) >> 2) | (w & 0x000F);
    let a = em.cpu.pair(d);
    let x = a.wrapping_add(k);
    em.cpu.flags_word(x, !a & x & 0x8000 != 0, !x & a & 0x8000 != 0);
    em.cpu.set_pair(d, x);
    Ok(2)
}

fn sbiw(em: &mut Emulator, w: u16) -> Result<u32> {
    let d = 24 + ((w & 0x0030) >> 3) as usize;
    let k = ((w & 0x00C0) >> 2) | (w & 0x000F);
    let a = em.cpu.pair(d);
    let x = a.wrapping_sub(k);
    em.cpu.flags_word(x, a & !x & 0x8000 != 0, x & !a & 0x8000 != 0);
    em.cpu.set_pair(d, x);
    Ok(2)
}

// --- Logic ---

fn and(em: &mut Emulator, w: u16) -> Result<u32> {
    let d = rd(w);
    let x = em.cpu.regs[d] & em.cpu.regs[rr(w)];
    em.cpu.flags_logic(x);
    em.cpu.regs[d] = x;
    Ok(1)
}

fn andi(em: &mut Emulator, w: u16) -> Result<u32> {
    let d = rd_hi(w);
    let x = em.cpu.regs[d] & imm8(w);
    em.cpu.flags_logic(x);
    em.cpu.regs[d] = x;
    Ok(1)
}

fn or(em: &mut Emulator, w: u16) -> Result<u32> {
    let d = rd(w);
    let x = em.cpu.regs[d] | em.cpu.regs[rr(w)];
    em.cpu.flags_logic(x);
    em.cpu.regs[d] = x;
    Ok(1)
}

fn ori(em: &mut Emulator, w: u16) -> Result<u32> {
    let d = rd_hi(w);
    let x = em.cpu.regs[d] | imm8(w);
    em.cpu.flags_logic(x);
    em.cpu.regs[d] = x;
    Ok(1)
}

fn eor(em: &mut Emulator, w: u16) -> Result<u32> {
    let d = rd(w);
    let x = em.cpu.regs[d] ^ em.cpu.regs[rr(w)];
    em.cpu.flags_logic(x);
    em.cpu.regs[d] = x;
    Ok(1)
}

fn com(em: &mut Emulator, w: u16) -> Result<u32> {
    let d = rd(w);
    let x = !em.cpu.regs[d];
    em.cpu.flags_logic(x);
    em.cpu.set_flag(SREG_C, true);
    em.cpu.regs[d] = x;
    Ok(1)
}

// --- Shifts ---

fn asr(em: &mut Emulator, w: u16) -> Result<u32> {
    let d = rd(w);
    let a = em.cpu.regs[d];
    let x = (a >> 1) | (a & 0x80);
    em.cpu.flags_shift(x, a & 1 != 0);
    em.cpu.regs[d] = x;
    Ok(1)
}

fn lsr(em: &mut Emulator, w: u16) -> Result<u32> {
    let d = rd(w);
    let a = em.cpu.regs[d];
    let x = a >> 1;
    em.cpu.flags_shift(x, a & 1 != 0);
    em.cpu.regs[d] = x;
    Ok(1)
}

fn ror(em: &mut Emulator, w: u16) -> Result<u32> {
    let d = rd(w);
    let a = em.cpu.regs[d];
    let x = (a >> 1) | ((em.cpu.flag(SREG_C) as u8) << 7);
    em.cpu.flags_shift(x, a & 1 != 0);
    em.cpu.regs[d] = x;
    Ok(1)
}

fn swap(em: &mut Emulator, w: u16) -> Result<u32> {
    let d = rd(w);
    em.cpu.regs[d] = em.cpu.regs[d].rotate_left(4);
    Ok(1)
}

// --- Multiply ---

/// Store a product in R1:R0. Fractional forms shift left once; C always
/// comes from bit 15 of the unshifted product and Z from the stored value.
fn store_product(em: &mut Emulator, p: u16, fractional: bool) -> Result<u32> {
    let x = if fractional { p << 1 } else { p };
    em.cpu.set_flag(SREG_C, p & 0x8000 != 0);
    em.cpu.set_flag(SREG_Z, x == 0);
    em.cpu.set_pair(0, x);
    Ok(2)
}

fn mul(em: &mut Emulator, w: u16) -> Result<u32> {
    let p = em.cpu.regs[rd(w)] as u16 * em.cpu.regs[rr(w)] as u16;
    store_product(em, p, false)
}

fn muls(em: &mut Emulator, w: u16) -> Result<u32> {
    let a = em.cpu.regs[rd_hi(w)] as i8 as i16;
    let b = em.cpu.regs[16 + (w & 0x000F) as usize] as i8 as i16;
    store_product(em, (a * b) as u16, false)
}

/// Registers R16–R23 used by MULSU and the FMUL family.
fn mul3(em: &Emulator, w: u16) -> (u8, u8) {
    let d = 16 + ((w >> 4) & 0x07) as usize;
    let r = 16 + (w & 0x0007) as usize;
    (em.cpu.regs[d], em.cpu.regs[r])
}

fn mulsu(em: &mut Emulator, w: u16) -> Result<u32> {
    let (a, b) = mul3(em, w);
    store_product(em, (a as i8 as i16 * b as i16) as u16, false)
}

fn fmul(em: &mut Emulator, w: u16) -> Result<u32> {
    let (a, b) = mul3(em, w);
    store_product(em, a as u16 * b as u16, true)
}

fn fmuls(em: &mut Emulator, w: u16) -> Result<u32> {
    let (a, b) = mul3(em, w);
    store_product(em, (a as i8 as i16 * b as i8 as i16) as u16, true)
}

fn fmulsu(em: &mut Emulator, w: u16) -> Result<u32> {
    let (a, b) = mul3(em, w);
    store_product(em, (a as i8 as i16 * b as i16) as u16, true)
}

// --- Data transfer ---

fn mov(em: &mut Emulator, w: u16) -> Result<u32> {
    em.cpu.regs[rd(w)] = em.cpu.regs[rr(w)];
    Ok(1)
}

fn movw(em: &mut Emulator, w: u16) -> Result<u32> {
    let d = (((w >> 4) & 0x0F) * 2) as usize;
    let r = ((w & 0x0F) * 2) as usize;
    let v = em.cpu.pair(r);
    em.cpu.set_pair(d, v);
    Ok(1)
}

fn ldi(em: &mut Emulator, w: u16) -> Result<u32> {
    em.cpu.regs[rd_hi(w)] = imm8(w);
    Ok(1)
}

fn ld_x(em: &mut Emulator, w: u16) -> Result<u32> { load_indirect(em, w, X, Mode::Plain) }
fn ld_x_inc(em: &mut Emulator, w: u16) -> Result<u32> { load_indirect(em, w, X, Mode::PostInc) }
fn ld_x_dec(em: &mut Emulator, w: u16) -> Result<u32> { load_indirect(em, w, X, Mode::PreDec) }
fn ld_y(em: &mut Emulator, w: u16) -> Result<u32> { load_indirect(em, w, Y, Mode::Plain) }
fn ld_y_inc(em: &mut Emulator, w: u16) -> Result<u32> { load_indirect(em, w, Y, Mode::PostInc) }
fn ld_y_dec(em: &mut Emulator, w: u16) -> Result<u32> { load_indirect(em, w, Y, Mode::PreDec) }
fn ldd_y(em: &mut Emulator, w: u16) -> Result<u32> { load_indirect(em, w, Y, Mode::Disp(displacement(w))) }
fn ld_z(em: &mut Emulator, w: u16) -> Result<u32> { load_indirect(em, w, Z, Mode::Plain) }
fn ld_z_inc(em: &mut Emulator, w: u16) -> Result<u32> { load_indirect(em, w, Z, Mode::PostInc) }
fn ld_z_dec(em: &mut Emulator, w: u16) -> Result<u32> { load_indirect(em, w, Z, Mode::PreDec) }
fn ldd_z(em: &mut Emulator, w: u16) -> Result<u32> { load_indirect(em, w, Z, Mode::Disp(displacement(w))) }

fn st_x(em: &mut Emulator, w: u16) -> Result<u32> { store_indirect(em, w, X, Mode::Plain) }
fn st_x_inc(em: &mut Emulator, w: u16) -> Result<u32> { store_indirect(em, w, X, Mode::PostInc) }
fn st_x_dec(em: &mut Emulator, w: u16) -> Result<u32> { store_indirect(em, w, X, Mode::PreDec) }
fn st_y(em: &mut Emulator, w: u16) -> Result<u32> { store_indirect(em, w, Y, Mode::Plain) }
fn st_y_inc(em: &mut Emulator, w: u16) -> Result<u32> { store_indirect(em, w, Y, Mode::PostInc) }
fn st_y_dec(em: &mut Emulator, w: u16) -> Result<u32> { store_indirect(em, w, Y, Mode::PreDec) }
fn std_y(em: &mut Emulator, w: u16) -> Result<u32> { store_indirect(em, w, Y, Mode::Disp(displacement(w))) }
fn st_z(em: &mut Emulator, w: u16) -> Result<u32> { store_indirect(em, w, Z, Mode::Plain) }
fn st_z_inc(em: &mut Emulator, w: u16) -> Result<u32> { store_indirect(em, w, Z, Mode::PostInc) }
fn st_z_dec(em: &mut Emulator, w: u16) -> Result<u32> { store_indirect(em, w, Z, Mode::PreDec) }
fn std_z(em: &mut Emulator, w: u16) -> Result<u32> { store_indirect(em, w, Z, Mode::Disp(displacement(w))) }

fn lds(em: &mut Emulator, w: u16) -> Result<u32> {
    let k = em.fetch();
    em.cpu.regs[rd(w)] = em.load_byte(k);
    Ok(2)
}

fn sts(em: &mut Emulator, w: u16) -> Result<u32> {
    let k = em.fetch();
    let v = em.cpu.regs[rd(w)];
    em.store_byte(k, v);
    Ok(2)
}

/// 7-bit address of the reduced-core LDS/STS: `!w8 w8 w10 w9 w3 w2 w1 w0`.
fn short_address(w: u16) -> u16 {
    let b8 = (w >> 8) & 1;
    ((b8 ^ 1) << 7) | (b8 << 6) | (((w >> 9) & 0x03) << 4) | (w & 0x000F)
}

fn lds_short(em: &mut Emulator, w: u16) -> Result<u32> {
    em.cpu.regs[rd_hi(w)] = em.load_byte(short_address(w));
    Ok(1)
}

fn sts_short(em: &mut Emulator, w: u16) -> Result<u32> {
    let v = em.cpu.regs[rd_hi(w)];
    em.store_byte(short_address(w), v);
    Ok(1)
}

fn push(em: &mut Emulator, w: u16) -> Result<u32> {
    let v = em.cpu.regs[rd(w)];
    em.push(v);
    Ok(if em.chip.is_xmega() { 1 } else { 2 })
}

fn pop(em: &mut Emulator, w: u16) -> Result<u32> {
    em.cpu.regs[rd(w)] = em.pop();
    Ok(2)
}

// XMEGA read-modify-write on (Z). Not checked against silicon.

fn lac(em: &mut Emulator, w: u16) -> Result<u32> {
    let (z, d) = (em.cpu.z(), rd(w));
    let v = em.load_byte(z);
    em.store_byte(z, v & !em.cpu.regs[d]);
    em.cpu.regs[d] = v;
    Ok(1)
}

fn las(em: &mut Emulator, w: u16) -> Result<u32> {
    let (z, d) = (em.cpu.z(), rd(w));
    let v = em.load_byte(z);
    em.store_byte(z, v | em.cpu.regs[d]);
    em.cpu.regs[d] = v;
    Ok(1)
}

fn lat(em: &mut Emulator, w: u16) -> Result<u32> {
    let (z, d) = (em.cpu.z(), rd(w));
    let v = em.load_byte(z);
    em.store_byte(z, v ^ em.cpu.regs[d]);
    em.cpu.regs[d] = v;
    Ok(1)
}

fn xch(em: &mut Emulator, w: u16) -> Result<u32> {
    let (z, d) = (em.cpu.z(), rd(w));
    let v = em.load_byte(z);
    em.store_byte(z, em.cpu.regs[d]);
    em.cpu.regs[d] = v;
    Ok(1)
}

// --- Program memory loads ---

fn lpm_r0(em: &mut Emulator, _w: u16) -> Result<u32> {
    em.cpu.regs[0] = em.prog.read_byte(em.cpu.z() as u32);
    Ok(3)
}

fn lpm(em: &mut Emulator, w: u16) -> Result<u32> {
    em.cpu.regs[rd(w)] = em.prog.read_byte(em.cpu.z() as u32);
    Ok(3)
}

fn lpm_inc(em: &mut Emulator, w: u16) -> Result<u32> {
    let z = em.cpu.z();
    em.cpu.regs[rd(w)] = em.prog.read_byte(z as u32);
    em.cpu.set_pair(Z, z.wrapping_add(1));
    Ok(3)
}

fn extended_z(em: &Emulator) -> u32 {
    ((em.cpu.rampz as u32) << 16) | em.cpu.z() as u32
}

fn elpm_r0(em: &mut Emulator, _w: u16) -> Result<u32> {
    em.cpu.regs[0] = em.prog.read_byte(extended_z(em));
    Ok(3)
}

fn elpm(em: &mut Emulator, w: u16) -> Result<u32> {
    em.cpu.regs[rd(w)] = em.prog.read_byte(extended_z(em));
    Ok(3)
}

fn elpm_inc(em: &mut Emulator, w: u16) -> Result<u32> {
    let addr = extended_z(em);
    em.cpu.regs[rd(w)] = em.prog.read_byte(addr);
    let next = addr.wrapping_add(1) & 0x00FF_FFFF;
    em.cpu.rampz = (next >> 16) as u8;
    em.cpu.set_pair(Z, next as u16);
    Ok(3)
}

// --- I/O ---

fn in_(em: &mut Emulator, w: u16) -> Result<u32> {
    em.cpu.regs[rd(w)] = em.read_port(0, io6(w));
    Ok(1)
}

fn out(em: &mut Emulator, w: u16) -> Result<u32> {
    let v = em.cpu.regs[rd(w)];
    em.write_port(0, io6(w), v);
    Ok(1)
}

fn bit_io_cycles(em: &Emulator) -> u32 {
    if em.chip.is_xmega() || em.chip.is_reduced_core() { 1 } else { 2 }
}

fn cbi(em: &mut Emulator, w: u16) -> Result<u32> {
    let a = io5(w);
    let v = em.read_port(0, a);
    em.write_port(0, a, v & !(1 << bit(w)));
    Ok(bit_io_cycles(em))
}

fn sbi(em: &mut Emulator, w: u16) -> Result<u32> {
    let a = io5(w);
    let v = em.read_port(0, a);
    em.write_port(0, a, v | (1 << bit(w)));
    Ok(bit_io_cycles(em))
}

// --- Skips ---

fn skip_if(em: &mut Emulator, cond: bool) -> Result<u32> {
    if cond { Ok(1 + em.skip()) } else { Ok(1) }
}

fn cpse(em: &mut Emulator, w: u16) -> Result<u32> {
    let eq = em.cpu.regs[rd(w)] == em.cpu.regs[rr(w)];
    skip_if(em, eq)
}

fn sbrc(em: &mut Emulator, w: u16) -> Result<u32> {
    let set = em.cpu.regs[rd(w)] & (1 << bit(w)) != 0;
    skip_if(em, !set)
}

fn sbrs(em: &mut Emulator, w: u16) -> Result<u32> {
    let set = em.cpu.regs[rd(w)] & (1 << bit(w)) != 0;
    skip_if(em, set)
}

fn sbic(em: &mut Emulator, w: u16) -> Result<u32> {
    let set = em.read_port(0, io5(w)) & (1 << bit(w)) != 0;
    skip_if(em, !set)
}

fn sbis(em: &mut Emulator, w: u16) -> Result<u32> {
    let set = em.read_port(0, io5(w)) & (1 << bit(w)) != 0;
    skip_if(em, set)
}

// --- Status register bits ---

fn bset(em: &mut Emulator, w: u16) -> Result<u32> {
    em.cpu.set_flag(sreg_bit(w), true);
    Ok(1)
}

fn bclr(em: &mut Emulator, w: u16) -> Result<u32> {
    em.cpu.set_flag(sreg_bit(w), false);
    Ok(1)
}

fn bst(em: &mut Emulator, w: u16) -> Result<u32> {
    let set = em.cpu.regs[rd(w)] & (1 << bit(w)) != 0;
    em.cpu.set_flag(SREG_T, set);
    Ok(1)
}

fn bld(em: &mut Emulator, w: u16) -> Result<u32> {
    let d = rd(w);
    let mask = 1 << bit(w);
    if em.cpu.flag(SREG_T) {
        em.cpu.regs[d] |= mask;
    } else {
        em.cpu.regs[d] &= !mask;
    }
    Ok(1)
}

// --- Control flow ---

fn brbs(em: &mut Emulator, w: u16) -> Result<u32> {
    if em.cpu.flag(bit(w)) {
        em.jump_relative(rel7(w));
        Ok(2)
    } else {
        Ok(1)
    }
}

fn brbc(em: &mut Emulator, w: u16) -> Result<u32> {
    if !em.cpu.flag(bit(w)) {
        em.jump_relative(rel7(w));
        Ok(2)
    } else {
        Ok(1)
    }
}

fn rjmp(em: &mut Emulator, w: u16) -> Result<u32> {
    em.jump_relative(rel12(w));
    Ok(2)
}

fn rcall(em: &mut Emulator, w: u16) -> Result<u32> {
    let ret = em.cpu.pc;
    em.push_pc(ret);
    em.jump_relative(rel12(w));
    Ok(if em.chip.is_reduced_core() { 4 } else { em.call_cycles(3) })
}

/// 22-bit target of JMP/CALL: `w[8:4], w[0]` then the second word.
fn long_target(em: &mut Emulator, w: u16) -> u32 {
    let hi = (((w & 0x01F0) >> 3) | (w & 0x0001)) as u32;
    let lo = em.fetch() as u32;
    (hi << 16) | lo
}

fn jmp(em: &mut Emulator, w: u16) -> Result<u32> {
    let target = long_target(em, w);
    em.jump(target);
    Ok(3)
}

fn call(em: &mut Emulator, w: u16) -> Result<u32> {
    let target = long_target(em, w);
    let ret = em.cpu.pc;
    em.push_pc(ret);
    em.jump(target);
    Ok(em.call_cycles(4))
}

fn ijmp(em: &mut Emulator, _w: u16) -> Result<u32> {
    let target = em.cpu.z() as u32;
    em.jump(target);
    Ok(2)
}

fn eijmp(em: &mut Emulator, _w: u16) -> Result<u32> {
    let target = ((em.cpu.eind as u32) << 16) | em.cpu.z() as u32;
    em.jump(target);
    Ok(2)
}

fn icall(em: &mut Emulator, _w: u16) -> Result<u32> {
    let ret = em.cpu.pc;
    em.push_pc(ret);
    let target = em.cpu.z() as u32;
    em.jump(target);
    Ok(em.call_cycles(3))
}

fn eicall(em: &mut Emulator, _w: u16) -> Result<u32> {
    let ret = em.cpu.pc;
    em.push_pc(ret);
    let target = ((em.cpu.eind as u32) << 16) | em.cpu.z() as u32;
    em.jump(target);
    Ok(if em.chip.is_xmega() { 3 } else { 4 })
}

fn ret(em: &mut Emulator, _w: u16) -> Result<u32> {
    let target = em.pop_pc();
    em.jump(target);
    Ok(em.ret_cycles())
}

fn reti(em: &mut Emulator, _w: u16) -> Result<u32> {
    let target = em.pop_pc();
    em.jump(target);
    em.cpu.set_flag(SREG_I, true);
    Ok(em.ret_cycles())
}

fn nop(_em: &mut Emulator, _w: u16) -> Result<u32> {
    Ok(1)
}

// --- Not emulated ---

fn break_(em: &mut Emulator, _w: u16) -> Result<u32> { em.unimplemented(Instruction::BREAK) }
fn des(em: &mut Emulator, _w: u16) -> Result<u32> { em.unimplemented(Instruction::DES) }
fn sleep(em: &mut Emulator, _w: u16) -> Result<u32> { em.unimplemented(Instruction::SLEEP) }
fn spm(em: &mut Emulator, _w: u16) -> Result<u32> { em.unimplemented(Instruction::SPM) }
fn spm_2(em: &mut Emulator, _w: u16) -> Result<u32> { em.unimplemented(Instruction::SPM_2) }
fn wdr(em: &mut Emulator, _w: u16) -> Result<u32> { em.unimplemented(Instruction::WDR) }

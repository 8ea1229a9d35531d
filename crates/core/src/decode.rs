//! AVR instruction decoder.
//!
//! Every opcode is described by a `(mask, match)` pair: a word decodes to
//! the opcode when `word & mask == match`. A handful of encodings mean
//! different things on the reduced core (ATtiny4/5/9/10 class) and on the
//! full core, so each definition also records which core variant it belongs
//! to:
//!
//! | Core      | Only decoded when                    | Opcodes |
//! |-----------|--------------------------------------|---------|
//! | `Any`     | always                               | everything else |
//! | `Reduced` | the chip has the reduced core        | LD_Y, LD_Z, ST_Y, ST_Z, LDS_SHORT, STS_SHORT |
//! | `Full`    | the chip does not have the reduced core | LDD_Y, LDD_Z, STD_Y, STD_Z, LDS, STS |
//!
//! Within one core variant the match sets are disjoint, so table order does
//! not matter. [`Decoder`] precomputes all 65536 words for one core variant.

use crate::instruction::Instruction;

/// Core variant a definition applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Core {
    Any,
    Reduced,
    Full,
}

impl Core {
    #[inline(always)]
    fn accepts(self, reduced_core: bool) -> bool {
        match self {
            Core::Any => true,
            Core::Reduced => reduced_core,
            Core::Full => !reduced_core,
        }
    }
}

/// One decoding rule.
#[derive(Debug, Clone, Copy)]
pub struct InstDef {
    pub inst: Instruction,
    pub mask: u16,
    pub bits: u16,
    pub core: Core,
}

const fn def(inst: Instruction, mask: u16, bits: u16, core: Core) -> InstDef {
    InstDef { inst, mask, bits, core }
}

use Core::{Any, Full, Reduced};
use Instruction as I;

/// Decoding rules, one per opcode.
pub const INST_DEFS: [InstDef; Instruction::COUNT] = [
    def(I::ADC, 0xFC00, 0x1C00, Any),
    def(I::ADD, 0xFC00, 0x0C00, Any),
    def(I::ADIW, 0xFF00, 0x9600, Any),
    def(I::AND, 0xFC00, 0x2000, Any),
    def(I::ANDI, 0xF000, 0x7000, Any),
    def(I::ASR, 0xFE0F, 0x9405, Any),
    def(I::BCLR, 0xFF8F, 0x9488, Any),
    def(I::BLD, 0xFE08, 0xF800, Any),
    def(I::BRBC, 0xFC00, 0xF400, Any),
    def(I::BRBS, 0xFC00, 0xF000, Any),
    def(I::BREAK, 0xFFFF, 0x9598, Any),
    def(I::BSET, 0xFF8F, 0x9408, Any),
    def(I::BST, 0xFE08, 0xFA00, Any),
    def(I::CALL, 0xFE0E, 0x940E, Any),
    def(I::CBI, 0xFF00, 0x9800, Any),
    def(I::COM, 0xFE0F, 0x9400, Any),
    def(I::CP, 0xFC00, 0x1400, Any),
    def(I::CPC, 0xFC00, 0x0400, Any),
    def(I::CPI, 0xF000, 0x3000, Any),
    def(I::CPSE, 0xFC00, 0x1000, Any),
    def(I::DEC, 0xFE0F, 0x940A, Any),
    def(I::DES, 0xFF0F, 0x940B, Any),
    def(I::EICALL, 0xFFFF, 0x9519, Any),
    def(I::EIJMP, 0xFFFF, 0x9419, Any),
    def(I::ELPM_R0, 0xFFFF, 0x95D8, Any),
    def(I::ELPM, 0xFE0F, 0x9006, Any),
    def(I::ELPM_INC, 0xFE0F, 0x9007, Any),
    def(I::EOR, 0xFC00, 0x2400, Any),
    def(I::FMUL, 0xFF88, 0x0308, Any),
    def(I::FMULS, 0xFF88, 0x0380, Any),
    def(I::FMULSU, 0xFF88, 0x0388, Any),
    def(I::ICALL, 0xFFFF, 0x9509, Any),
    def(I::IJMP, 0xFFFF, 0x9409, Any),
    def(I::IN, 0xF800, 0xB000, Any),
    def(I::INC, 0xFE0F, 0x9403, Any),
    def(I::JMP, 0xFE0E, 0x940C, Any),
    def(I::LAC, 0xFE0F, 0x9206, Any),
    def(I::LAS, 0xFE0F, 0x9205, Any),
    def(I::LAT, 0xFE0F, 0x9207, Any),
    def(I::LD_X, 0xFE0F, 0x900C, Any),
    def(I::LD_X_INC, 0xFE0F, 0x900D, Any),
    def(I::LD_X_DEC, 0xFE0F, 0x900E, Any),
    def(I::LD_Y, 0xFE0F, 0x8008, Reduced),
    def(I::LD_Y_INC, 0xFE0F, 0x9009, Any),
    def(I::LD_Y_DEC, 0xFE0F, 0x900A, Any),
    def(I::LDD_Y, 0xD208, 0x8008, Full),
    def(I::LD_Z, 0xFE0F, 0x8000, Reduced),
    def(I::LD_Z_INC, 0xFE0F, 0x9001, Any),
    def(I::LD_Z_DEC, 0xFE0F, 0x9002, Any),
    def(I::LDD_Z, 0xD208, 0x8000, Full),
    def(I::LDI, 0xF000, 0xE000, Any),
    def(I::LDS, 0xFE0F, 0x9000, Full),
    def(I::LDS_SHORT, 0xF800, 0xA000, Reduced),
    def(I::LPM_R0, 0xFFFF, 0x95C8, Any),
    def(I::LPM, 0xFE0F, 0x9004, Any),
    def(I::LPM_INC, 0xFE0F, 0x9005, Any),
    def(I::LSR, 0xFE0F, 0x9406, Any),
    def(I::MOV, 0xFC00, 0x2C00, Any),
    def(I::MOVW, 0xFF00, 0x0100, Any),
    def(I::MUL, 0xFC00, 0x9C00, Any),
    def(I::MULS, 0xFF00, 0x0200, Any),
    def(I::MULSU, 0xFF88, 0x0300, Any),
    def(I::NEG, 0xFE0F, 0x9401, Any),
    def(I::NOP, 0xFFFF, 0x0000, Any),
    def(I::OR, 0xFC00, 0x2800, Any),
    def(I::ORI, 0xF000, 0x6000, Any),
    def(I::OUT, 0xF800, 0xB800, Any),
    def(I::POP, 0xFE0F, 0x900F, Any),
    def(I::PUSH, 0xFE0F, 0x920F, Any),
    def(I::RCALL, 0xF000, 0xD000, Any),
    def(I::RET, 0xFFFF, 0x9508, Any),
    def(I::RETI, 0xFFFF, 0x9518, Any),
    def(I::RJMP, 0xF000, 0xC000, Any),
    def(I::ROR, 0xFE0F, 0x9407, Any),
    def(I::SBC, 0xFC00, 0x0800, Any),
    def(I::SBCI, 0xF000, 0x4000, Any),
    def(I::SBI, 0xFF00, 0x9A00, Any),
    def(I::SBIC, 0xFF00, 0x9900, Any),
    def(I::SBIS, 0xFF00, 0x9B00, Any),
    def(I::SBIW, 0xFF00, 0x9700, Any),
    def(I::SBRC, 0xFE08, 0xFC00, Any),
    def(I::SBRS, 0xFE08, 0xFE00, Any),
    def(I::SLEEP, 0xFFFF, 0x9588, Any),
    def(I::SPM, 0xFFFF, 0x95E8, Any),
    def(I::SPM_2, 0xFFFF, 0x95F8, Any),
    def(I::ST_X, 0xFE0F, 0x920C, Any),
    def(I::ST_X_INC, 0xFE0F, 0x920D, Any),
    def(I::ST_X_DEC, 0xFE0F, 0x920E, Any),
    def(I::ST_Y, 0xFE0F, 0x8208, Reduced),
    def(I::ST_Y_INC, 0xFE0F, 0x9209, Any),
    def(I::ST_Y_DEC, 0xFE0F, 0x920A, Any),
    def(I::STD_Y, 0xD208, 0x8208, Full),
    def(I::ST_Z, 0xFE0F, 0x8200, Reduced),
    def(I::ST_Z_INC, 0xFE0F, 0x9201, Any),
    def(I::ST_Z_DEC, 0xFE0F, 0x9202, Any),
    def(I::STD_Z, 0xD208, 0x8200, Full),
    def(I::STS, 0xFE0F, 0x9200, Full),
    def(I::STS_SHORT, 0xF800, 0xA800, Reduced),
    def(I::SUB, 0xFC00, 0x1800, Any),
    def(I::SUBI, 0xF000, 0x5000, Any),
    def(I::SWAP, 0xFE0F, 0x9402, Any),
    def(I::WDR, 0xFFFF, 0x95A8, Any),
    def(I::XCH, 0xFE0F, 0x9204, Any),
];

/// Decode one instruction word by scanning the rule table.
///
/// Returns `None` for words that match no rule for the given core variant.
pub fn decode(word: u16, reduced_core: bool) -> Option<Instruction> {
    INST_DEFS
        .iter()
        .find(|d| d.core.accepts(reduced_core) && word & d.mask == d.bits)
        .map(|d| d.inst)
}

/// Precomputed decoder for one core variant.
pub struct Decoder {
    reduced_core: bool,
    table: Box<[Option<Instruction>]>,
}

impl Decoder {
    pub fn new(reduced_core: bool) -> Self {
        let table = (0..=u16::MAX).map(|w| decode(w, reduced_core)).collect();
        Decoder { reduced_core, table }
    }

    #[inline(always)]
    pub fn decode(&self, word: u16) -> Option<Instruction> {
        self.table[word as usize]
    }

    pub fn reduced_core(&self) -> bool {
        self.reduced_core
    }
}

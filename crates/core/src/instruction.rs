//! AVR opcode enumeration.
//!
//! [`Instruction`] names every opcode the decoder can produce, without
//! operands. Operands are extracted from the raw instruction word by the
//! execution handlers, so a decoded instruction is just an index into the
//! handler table.

use std::fmt;

macro_rules! instructions {
    ($($name:ident),+ $(,)?) => {
        /// AVR opcode, in canonical (alphabetical) order.
        #[allow(non_camel_case_types)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum Instruction {
            $($name),+
        }

        impl Instruction {
            /// Every opcode, ordered by [`Instruction::index`].
            pub const ALL: [Instruction; Instruction::COUNT] = [$(Instruction::$name),+];

            /// Upper-case assembler mnemonic (e.g. `LD_Z_DEC`).
            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Instruction::$name => stringify!($name)),+
                }
            }
        }
    };
}

instructions! {
    ADC, ADD, ADIW, AND, ANDI, ASR, BCLR, BLD, BRBC, BRBS, BREAK, BSET, BST,
    CALL, CBI, COM, CP, CPC, CPI, CPSE, DEC, DES, EICALL, EIJMP, ELPM_R0, ELPM,
    ELPM_INC, EOR, FMUL, FMULS, FMULSU, ICALL, IJMP, IN, INC, JMP, LAC, LAS, LAT,
    LD_X, LD_X_INC, LD_X_DEC, LD_Y, LD_Y_INC, LD_Y_DEC, LDD_Y,
    LD_Z, LD_Z_INC, LD_Z_DEC, LDD_Z, LDI, LDS, LDS_SHORT, LPM_R0, LPM, LPM_INC,
    LSR, MOV, MOVW, MUL, MULS, MULSU, NEG, NOP, OR, ORI, OUT, POP, PUSH, RCALL,
    RET, RETI, RJMP, ROR, SBC, SBCI, SBI, SBIC, SBIS, SBIW, SBRC, SBRS, SLEEP,
    SPM, SPM_2, ST_X, ST_X_INC, ST_X_DEC, ST_Y, ST_Y_INC, ST_Y_DEC, STD_Y,
    ST_Z, ST_Z_INC, ST_Z_DEC, STD_Z, STS, STS_SHORT, SUB, SUBI, SWAP, WDR, XCH,
}

impl Instruction {
    /// Number of distinct opcodes.
    pub const COUNT: usize = 103;

    #[inline(always)]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Instruction> {
        Self::ALL.get(index).copied()
    }

    /// True for opcodes followed by a second 16-bit operand word.
    pub fn is_two_word(self) -> bool {
        matches!(
            self,
            Instruction::CALL | Instruction::JMP | Instruction::LDS | Instruction::STS
        )
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

use serde::Serialize;

use crate::isa::mips32::{funct, opcode};

/// Operand shape of the I-type instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImmForm {
    /// `rt, rs, imm`, sign-extended
    Arith,
    /// `rt, rs, imm`, zero-extended
    Logical,
    /// `rt, imm`
    Upper,
    /// `rt, imm(rs)`
    Memory,
}

impl ImmForm {
    /// Values the 16-bit immediate field can hold for this form.
    pub fn range(self) -> (i64, i64) {
        match self {
            ImmForm::Arith | ImmForm::Memory => (i16::MIN as i64, i16::MAX as i64),
            ImmForm::Logical | ImmForm::Upper => (0, u16::MAX as i64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Format {
    /// `rd, rs, rt`
    R,
    /// `rd, rt, shamt`
    Shift,
    /// `rs`
    JumpReg,
    I(ImmForm),
    /// `rs, rt, label`
    Branch,
    /// `label` or absolute address
    J,
    Syscall,
    /// `.word` directive
    Word,
    /// `.byte` directive
    Byte,
}

impl Format {
    pub fn is_directive(self) -> bool {
        matches!(self, Format::Word | Format::Byte)
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct InstrDesc {
    pub mnemonic: &'static str,
    pub format: Format,
    /// Opcode and function bits, pre-shifted to their final position.
    pub bits: u32,
}

const fn desc(mnemonic: &'static str, format: Format, bits: u32) -> InstrDesc {
    InstrDesc {
        mnemonic,
        format,
        bits,
    }
}

pub const TABLE: &[InstrDesc] = &[
    desc("and", Format::R, opcode::SPECIAL | funct::AND),
    desc("or", Format::R, opcode::SPECIAL | funct::OR),
    desc("ori", Format::I(ImmForm::Logical), opcode::ORI),
    desc("add", Format::R, opcode::SPECIAL | funct::ADD),
    desc("addu", Format::R, opcode::SPECIAL | funct::ADDU),
    desc("addi", Format::I(ImmForm::Arith), opcode::ADDI),
    desc("addiu", Format::I(ImmForm::Arith), opcode::ADDIU),
    desc("sll", Format::Shift, opcode::SPECIAL | funct::SLL),
    desc("srl", Format::Shift, opcode::SPECIAL | funct::SRL),
    desc("sra", Format::Shift, opcode::SPECIAL | funct::SRA),
    desc("sub", Format::R, opcode::SPECIAL | funct::SUB),
    desc("slt", Format::R, opcode::SPECIAL | funct::SLT),
    desc("slti", Format::I(ImmForm::Arith), opcode::SLTI),
    desc("sltu", Format::R, opcode::SPECIAL | funct::SLTU),
    desc("sltiu", Format::I(ImmForm::Arith), opcode::SLTIU),
    desc("beq", Format::Branch, opcode::BEQ),
    desc("bne", Format::Branch, opcode::BNE),
    desc("lui", Format::I(ImmForm::Upper), opcode::LUI),
    desc("lw", Format::I(ImmForm::Memory), opcode::LW),
    desc("sw", Format::I(ImmForm::Memory), opcode::SW),
    desc("j", Format::J, opcode::J),
    desc("jr", Format::JumpReg, opcode::SPECIAL | funct::JR),
    desc("jal", Format::J, opcode::JAL),
    desc("syscall", Format::Syscall, opcode::SPECIAL | funct::SYSCALL),
    desc(".word", Format::Word, 0),
    desc(".byte", Format::Byte, 0),
];

/// Case-insensitive mnemonic lookup.
pub fn lookup(mnemonic: &str) -> Option<&'static InstrDesc> {
    TABLE
        .iter()
        .find(|d| d.mnemonic.eq_ignore_ascii_case(mnemonic))
}

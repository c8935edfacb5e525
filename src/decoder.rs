use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::registers::{RA, V0};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Op {
    And,
    Or,
    Ori,
    Add,
    Addu,
    Addi,
    Addiu,
    Sll,
    Srl,
    Sra,
    Sub,
    Slt,
    Slti,
    Sltu,
    Sltiu,
    Beq,
    Bne,
    Lui,
    Lw,
    Sw,
    J,
    Jr,
    Jal,
    Syscall,
}

impl Op {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Op::And => "and",
            Op::Or => "or",
            Op::Ori => "ori",
            Op::Add => "add",
            Op::Addu => "addu",
            Op::Addi => "addi",
            Op::Addiu => "addiu",
            Op::Sll => "sll",
            Op::Srl => "srl",
            Op::Sra => "sra",
            Op::Sub => "sub",
            Op::Slt => "slt",
            Op::Slti => "slti",
            Op::Sltu => "sltu",
            Op::Sltiu => "sltiu",
            Op::Beq => "beq",
            Op::Bne => "bne",
            Op::Lui => "lui",
            Op::Lw => "lw",
            Op::Sw => "sw",
            Op::J => "j",
            Op::Jr => "jr",
            Op::Jal => "jal",
            Op::Syscall => "syscall",
        }
    }
}

bitflags! {
/// Control signals derived from the opcode, consumed by the hazard unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ctrl: u8 {
const REG_WRITE = 1 << 0;
const MEM_READ = 1 << 1;
const MEM_WRITE = 1 << 2;
const BRANCH = 1 << 3;
const JUMP = 1 << 4;
const LINK = 1 << 5; // jal writes $ra
const SYSCALL = 1 << 6;
}
}

/// Raw fields of one instruction word. Every field is extracted regardless of
/// format; `op` decides which of them carry meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decoded {
    pub op: Op,
    pub rs: u8,
    pub rt: u8,
    pub rd: u8,
    pub shamt: u8,
    pub imm: u16,
    pub target: u32, // 26-bit J-type field
}

impl Decoded {
    /// Immediate sign-extended to 32 bits.
    pub fn simm(&self) -> i32 {
        self.imm as i16 as i32
    }

    /// Immediate zero-extended to 32 bits.
    pub fn zimm(&self) -> u32 {
        self.imm as u32
    }

    pub fn ctrl(&self) -> Ctrl {
        match self.op {
            Op::And
            | Op::Or
            | Op::Add
            | Op::Addu
            | Op::Sub
            | Op::Slt
            | Op::Sltu
            | Op::Sll
            | Op::Srl
            | Op::Sra
            | Op::Ori
            | Op::Addi
            | Op::Addiu
            | Op::Slti
            | Op::Sltiu
            | Op::Lui => Ctrl::REG_WRITE,
            Op::Lw => Ctrl::REG_WRITE | Ctrl::MEM_READ,
            Op::Sw => Ctrl::MEM_WRITE,
            Op::Beq | Op::Bne => Ctrl::BRANCH,
            Op::J | Op::Jr => Ctrl::JUMP,
            Op::Jal => Ctrl::JUMP | Ctrl::LINK | Ctrl::REG_WRITE,
            Op::Syscall => Ctrl::SYSCALL,
        }
    }

    /// Destination register, or `None` when nothing observable is written.
    pub fn dest(&self) -> Option<u8> {
        let r = match self.op {
            Op::And
            | Op::Or
            | Op::Add
            | Op::Addu
            | Op::Sub
            | Op::Slt
            | Op::Sltu
            | Op::Sll
            | Op::Srl
            | Op::Sra => self.rd,
            Op::Ori | Op::Addi | Op::Addiu | Op::Slti | Op::Sltiu | Op::Lui | Op::Lw => self.rt,
            Op::Jal => RA,
            Op::Sw | Op::Beq | Op::Bne | Op::J | Op::Jr | Op::Syscall => return None,
        };
        (r != 0).then_some(r)
    }

    /// Registers read, as `(rs slot, rt slot)`. `syscall` reads `$v0` through
    /// the rs slot.
    pub fn reads(&self) -> (Option<u8>, Option<u8>) {
        match self.op {
            Op::And | Op::Or | Op::Add | Op::Addu | Op::Sub | Op::Slt | Op::Sltu => {
                (Some(self.rs), Some(self.rt))
            }
            Op::Beq | Op::Bne | Op::Sw => (Some(self.rs), Some(self.rt)),
            Op::Sll | Op::Srl | Op::Sra => (None, Some(self.rt)),
            Op::Ori | Op::Addi | Op::Addiu | Op::Slti | Op::Sltiu | Op::Lw | Op::Jr => {
                (Some(self.rs), None)
            }
            Op::Syscall => (Some(V0), None),
            Op::Lui | Op::J | Op::Jal => (None, None),
        }
    }
}

pub trait Decoder {
    fn decode(&self, raw32: u32) -> Option<Decoded>;
}

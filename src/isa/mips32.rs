use crate::decoder::{Decoded, Decoder, Op};

/// Primary opcodes, already shifted into bits 31..26.
pub mod opcode {
    pub const SPECIAL: u32 = 0x00 << 26;
    pub const J: u32 = 0x02 << 26;
    pub const JAL: u32 = 0x03 << 26;
    pub const BEQ: u32 = 0x04 << 26;
    pub const BNE: u32 = 0x05 << 26;
    pub const ADDI: u32 = 0x08 << 26;
    pub const ADDIU: u32 = 0x09 << 26;
    pub const SLTI: u32 = 0x0A << 26;
    pub const SLTIU: u32 = 0x0B << 26;
    pub const ORI: u32 = 0x0D << 26;
    pub const LUI: u32 = 0x0F << 26;
    pub const LW: u32 = 0x23 << 26;
    pub const SW: u32 = 0x2B << 26;
}

/// Function codes of the SPECIAL opcode (bits 5..0).
pub mod funct {
    pub const SLL: u32 = 0x00;
    pub const SRL: u32 = 0x02;
    pub const SRA: u32 = 0x03;
    pub const JR: u32 = 0x08;
    pub const SYSCALL: u32 = 0x0C;
    pub const ADD: u32 = 0x20;
    pub const ADDU: u32 = 0x21;
    pub const SUB: u32 = 0x22;
    pub const AND: u32 = 0x24;
    pub const OR: u32 = 0x25;
    pub const SLT: u32 = 0x2A;
    pub const SLTU: u32 = 0x2B;
}

pub const RS_SHIFT: u32 = 21;
pub const RT_SHIFT: u32 = 16;
pub const RD_SHIFT: u32 = 11;
pub const SHAMT_SHIFT: u32 = 6;

pub const OPCODE_MASK: u32 = 0x3F << 26;
pub const FUNCT_MASK: u32 = 0x3F;
pub const REG_MASK: u32 = 0x1F;
pub const IMM_MASK: u32 = 0xFFFF;
pub const TARGET_MASK: u32 = 0x03FF_FFFF;

/// Decoder for the supported MIPS32 subset.
#[derive(Debug, Default, Clone, Copy)]
pub struct Mips32Decoder;

impl Mips32Decoder {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for Mips32Decoder {
    fn decode(&self, raw32: u32) -> Option<Decoded> {
        let op = match raw32 & OPCODE_MASK {
            opcode::SPECIAL => match raw32 & FUNCT_MASK {
                funct::SLL => Op::Sll,
                funct::SRL => Op::Srl,
                funct::SRA => Op::Sra,
                funct::JR => Op::Jr,
                funct::SYSCALL => Op::Syscall,
                funct::ADD => Op::Add,
                funct::ADDU => Op::Addu,
                funct::SUB => Op::Sub,
                funct::AND => Op::And,
                funct::OR => Op::Or,
                funct::SLT => Op::Slt,
                funct::SLTU => Op::Sltu,
                _ => return None,
            },
            opcode::J => Op::J,
            opcode::JAL => Op::Jal,
            opcode::BEQ => Op::Beq,
            opcode::BNE => Op::Bne,
            opcode::ADDI => Op::Addi,
            opcode::ADDIU => Op::Addiu,
            opcode::SLTI => Op::Slti,
            opcode::SLTIU => Op::Sltiu,
            opcode::ORI => Op::Ori,
            opcode::LUI => Op::Lui,
            opcode::LW => Op::Lw,
            opcode::SW => Op::Sw,
            _ => return None,
        };
        Some(Decoded {
            op,
            rs: ((raw32 >> RS_SHIFT) & REG_MASK) as u8,
            rt: ((raw32 >> RT_SHIFT) & REG_MASK) as u8,
            rd: ((raw32 >> RD_SHIFT) & REG_MASK) as u8,
            shamt: ((raw32 >> SHAMT_SHIFT) & REG_MASK) as u8,
            imm: (raw32 & IMM_MASK) as u16,
            target: raw32 & TARGET_MASK,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_word_is_sll_nop() {
        let d = Mips32Decoder::new().decode(0).unwrap();
        assert_eq!(d.op, Op::Sll);
        assert_eq!(d.dest(), None);
    }

    #[test]
    fn unknown_funct_is_rejected() {
        // SPECIAL with funct 0x3F
        assert!(Mips32Decoder::new().decode(0x0000_003F).is_none());
        // opcode 0x3F
        assert!(Mips32Decoder::new().decode(0xFC00_0000).is_none());
    }

    #[test]
    fn control_signals() {
        use crate::decoder::Ctrl;
        let dec = Mips32Decoder::new();
        let lw = dec.decode(opcode::LW | (8 << RT_SHIFT)).unwrap();
        assert_eq!(lw.ctrl(), Ctrl::REG_WRITE | Ctrl::MEM_READ);
        assert_eq!(lw.dest(), Some(8));
        let jal = dec.decode(opcode::JAL).unwrap();
        assert!(jal.ctrl().contains(Ctrl::LINK | Ctrl::JUMP));
        assert_eq!(jal.dest(), Some(31));
        let sys = dec.decode(opcode::SPECIAL | funct::SYSCALL).unwrap();
        assert_eq!(sys.ctrl(), Ctrl::SYSCALL);
        assert_eq!(sys.reads(), (Some(2), None));
    }

    #[test]
    fn i_type_fields() {
        // addi $t0, $zero, -1
        let raw = opcode::ADDI | (8 << RT_SHIFT) | 0xFFFF;
        let d = Mips32Decoder::new().decode(raw).unwrap();
        assert_eq!(d.op, Op::Addi);
        assert_eq!(d.rt, 8);
        assert_eq!(d.rs, 0);
        assert_eq!(d.simm(), -1);
        assert_eq!(d.zimm(), 0xFFFF);
    }
}

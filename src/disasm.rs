use crate::decoder::{Decoded, Decoder, Op};
use crate::memory::Word;
use crate::registers::name;

pub fn fmt_decoded(d: &Decoded) -> String {
    let mn = d.op.mnemonic();
    match d.op {
        Op::And | Op::Or | Op::Add | Op::Addu | Op::Sub | Op::Slt | Op::Sltu => {
            format!("{mn} {}, {}, {}", reg(d.rd), reg(d.rs), reg(d.rt))
        }
        Op::Sll | Op::Srl | Op::Sra => {
            if d.op == Op::Sll && d.rd == 0 && d.rt == 0 && d.shamt == 0 {
                return "nop".to_string();
            }
            format!("{mn} {}, {}, {}", reg(d.rd), reg(d.rt), d.shamt)
        }
        Op::Ori => format!("{mn} {}, {}, {:#x}", reg(d.rt), reg(d.rs), d.imm),
        Op::Addi | Op::Addiu | Op::Slti | Op::Sltiu => {
            format!("{mn} {}, {}, {}", reg(d.rt), reg(d.rs), d.simm())
        }
        Op::Lui => format!("{mn} {}, {:#x}", reg(d.rt), d.imm),
        Op::Lw | Op::Sw => format!("{mn} {}, {}({})", reg(d.rt), d.simm(), reg(d.rs)),
        Op::Beq | Op::Bne => format!("{mn} {}, {}, {}", reg(d.rs), reg(d.rt), d.simm()),
        Op::J | Op::Jal => format!("{mn} {:#x}", d.target << 2),
        Op::Jr => format!("{mn} {}", reg(d.rs)),
        Op::Syscall => mn.to_string(),
    }
}

/// Render a memory word the way the simulator sees it at `pc`.
///
/// Branch and jump targets are shown as absolute addresses in a trailing
/// comment since they depend on where the word sits.
pub fn fmt_word<D: Decoder>(word: Word, pc: u32, dec: &D) -> String {
    if word.is_data {
        return format!(".word {:#010x}", word.value);
    }
    let Some(d) = dec.decode(word.value) else {
        return format!(".word {:#010x} # invalid", word.value);
    };
    let text = fmt_decoded(&d);
    match d.op {
        Op::Beq | Op::Bne => {
            let target = pc.wrapping_add(4).wrapping_add((d.simm() << 2) as u32);
            format!("{text} # {target:#x}")
        }
        Op::J | Op::Jal => {
            let target = (pc.wrapping_add(4) & 0xF000_0000) | (d.target << 2);
            format!("{} {target:#x}", d.op.mnemonic())
        }
        _ => text,
    }
}

fn reg(r: u8) -> String {
    format!("${}", name(r))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::mips32::Mips32Decoder;

    #[test]
    fn data_and_invalid_words() {
        let dec = Mips32Decoder::new();
        assert_eq!(fmt_word(Word::data(0x2A), 0, &dec), ".word 0x0000002a");
        assert_eq!(
            fmt_word(Word::instr(0xFC00_0000), 0, &dec),
            ".word 0xfc000000 # invalid"
        );
        assert_eq!(fmt_word(Word::instr(0), 0, &dec), "nop");
    }

    #[test]
    fn jumps_use_the_pc_region() {
        let dec = Mips32Decoder::new();
        assert_eq!(fmt_word(Word::instr(0x0800_0004), 0x1000_0000, &dec), "j 0x10000010");
        assert_eq!(
            fmt_word(Word::instr(0x1000_FFFF), 0x10, &dec),
            "beq $zero, $zero, -1 # 0x10"
        );
    }
}

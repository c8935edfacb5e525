use serde::Serialize;
use tracing::trace;

use crate::cpu::{Cpu, Trap};
use crate::decoder::{Decoded, Op};
use crate::memory::Bus;

/// Value `$v0` must hold for `syscall` to terminate the program.
pub const SYSCALL_EXIT: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MemOp {
    Load { addr: u32 },
    Store { addr: u32, value: u32 },
}

/// Everything one instruction does to architectural state, computed without
/// touching it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Effect {
    pub dest: Option<u8>,
    /// Value for `dest`; for loads it is filled in by the memory access.
    pub value: i32,
    pub mem: Option<MemOp>,
    pub next_pc: u32,
    pub exit: bool,
    pub cycles: u64,
    pub mem_refs: u64,
}

impl Effect {
    /// Effect of a slot that does nothing but fall through.
    pub fn nop(pc: u32) -> Self {
        Self {
            dest: None,
            value: 0,
            mem: None,
            next_pc: pc.wrapping_add(4),
            exit: false,
            cycles: 0,
            mem_refs: 0,
        }
    }

    /// Control flow left the sequential path.
    pub fn redirects(&self, pc: u32) -> bool {
        self.next_pc != pc.wrapping_add(4)
    }
}

/// Fixed clock cost of an instruction in the single-cycle model.
pub fn cost(d: &Decoded) -> u64 {
    match d.op {
        Op::Sll | Op::Srl | Op::Sra => d.shamt as u64 + 5,
        Op::Beq | Op::Bne | Op::J | Op::Jr | Op::Jal => 3,
        Op::Lw => 5,
        Op::Sw => 4,
        Op::Syscall => 1,
        _ => 4,
    }
}

fn jump_target(pc: u32, target: u32) -> u32 {
    (pc.wrapping_add(4) & 0xF000_0000) | (target << 2)
}

/// Compute the effect of `d` at `pc` given the values of its source operands
/// (see [`Decoded::reads`] for which register feeds which slot).
pub fn evaluate(d: &Decoded, pc: u32, rs: i32, rt: i32) -> Effect {
    let mut e = Effect::nop(pc);
    e.dest = d.dest();
    e.cycles = cost(d);
    let seq = pc.wrapping_add(4);
    e.value = match d.op {
        Op::And => rs & rt,
        Op::Or => rs | rt,
        Op::Ori => ((rs as u32) | d.zimm()) as i32,
        Op::Add | Op::Addu => rs.wrapping_add(rt),
        Op::Addi | Op::Addiu => rs.wrapping_add(d.simm()),
        Op::Sub => rs.wrapping_sub(rt),
        Op::Sll => ((rt as u32) << d.shamt) as i32,
        Op::Srl => ((rt as u32) >> d.shamt) as i32,
        Op::Sra => rt >> d.shamt,
        Op::Slt => (rs < rt) as i32,
        Op::Sltu => ((rs as u32) < (rt as u32)) as i32,
        Op::Slti => (rs < d.simm()) as i32,
        Op::Sltiu => ((rs as u32) < (d.simm() as u32)) as i32,
        Op::Lui => {
            e.mem_refs = 1;
            (d.zimm() << 16) as i32
        }
        Op::Lw => {
            e.mem_refs = 1;
            e.mem = Some(MemOp::Load {
                addr: (rs.wrapping_add(d.simm())) as u32,
            });
            0
        }
        Op::Sw => {
            e.mem_refs = 1;
            e.mem = Some(MemOp::Store {
                addr: (rs.wrapping_add(d.simm())) as u32,
                value: rt as u32,
            });
            0
        }
        Op::Beq | Op::Bne => {
            let taken = (rs == rt) == (d.op == Op::Beq);
            if taken {
                e.next_pc = seq.wrapping_add((d.simm() << 2) as u32);
            }
            0
        }
        Op::J => {
            e.next_pc = jump_target(pc, d.target);
            0
        }
        Op::Jal => {
            e.next_pc = jump_target(pc, d.target);
            pc.wrapping_add(8) as i32
        }
        Op::Jr => {
            e.next_pc = rs as u32;
            0
        }
        Op::Syscall => {
            e.exit = rs == SYSCALL_EXIT;
            0
        }
    };
    e
}

/// Perform the memory half of an effect, filling in load results.
pub fn access<B: Bus>(bus: &mut B, pc: u32, e: &mut Effect) -> Result<(), Trap> {
    match e.mem {
        Some(MemOp::Load { addr }) => {
            let v = bus
                .read_u32(addr)
                .map_err(|source| Trap::Bus { pc, addr, source })?;
            e.value = v as i32;
        }
        Some(MemOp::Store { addr, value }) => {
            bus.write_u32(addr, value)
                .map_err(|source| Trap::Bus { pc, addr, source })?;
        }
        None => {}
    }
    Ok(())
}

pub trait Executor {
    fn exec<B: Bus>(&self, cpu: &mut Cpu, bus: &mut B, pc: u32, d: Decoded)
        -> Result<Effect, Trap>;
}

/// Integer executor for the single-cycle model: operands straight from the
/// register file, everything committed at once.
#[derive(Debug, Default, Clone, Copy)]
pub struct IntExecutor;

impl Executor for IntExecutor {
    fn exec<B: Bus>(
        &self,
        cpu: &mut Cpu,
        bus: &mut B,
        pc: u32,
        d: Decoded,
    ) -> Result<Effect, Trap> {
        let (rs, rt) = d.reads();
        let rs = rs.map_or(0, |r| cpu.regs.read(r));
        let rt = rt.map_or(0, |r| cpu.regs.read(r));
        let mut e = evaluate(&d, pc, rs, rt);
        access(bus, pc, &mut e)?;
        trace!(pc, ?e, "exec");
        cpu.commit(&e);
        Ok(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Decoder;
    use crate::isa::mips32::{
        funct, opcode, Mips32Decoder, RD_SHIFT, RS_SHIFT, RT_SHIFT, SHAMT_SHIFT,
    };

    fn dec(raw: u32) -> Decoded {
        Mips32Decoder::new().decode(raw).unwrap()
    }

    fn special(code: u32, rs: u32, rt: u32, rd: u32, shamt: u32) -> Decoded {
        dec(opcode::SPECIAL
            | code
            | rs << RS_SHIFT
            | rt << RT_SHIFT
            | rd << RD_SHIFT
            | shamt << SHAMT_SHIFT)
    }

    #[test]
    fn signed_and_unsigned_compare() {
        let slt = special(funct::SLT, 1, 2, 3, 0);
        let sltu = special(funct::SLTU, 1, 2, 3, 0);
        assert_eq!(evaluate(&slt, 0, -1, 1).value, 1);
        assert_eq!(evaluate(&sltu, 0, -1, 1).value, 0);
    }

    #[test]
    fn immediate_extension() {
        let ori = dec(opcode::ORI | (8 << RT_SHIFT) | 0x8000);
        assert_eq!(evaluate(&ori, 0, 0, 0).value, 0x8000);
        let addi = dec(opcode::ADDI | (8 << RT_SHIFT) | 0x8000);
        assert_eq!(evaluate(&addi, 0, 0, 0).value, -0x8000);
        // sltiu compares against the sign-extended immediate, unsigned
        let sltiu = dec(opcode::SLTIU | (8 << RT_SHIFT) | 0xFFFF);
        assert_eq!(evaluate(&sltiu, 0, 5, 0).value, 1);
        let lui = dec(opcode::LUI | (8 << RT_SHIFT) | 0x1234);
        let e = evaluate(&lui, 0, 0, 0);
        assert_eq!(e.value, 0x1234_0000);
        assert_eq!(e.mem_refs, 1);
    }

    #[test]
    fn shifts_are_logical_or_arithmetic() {
        let srl = special(funct::SRL, 0, 2, 3, 4);
        let sra = special(funct::SRA, 0, 2, 3, 4);
        assert_eq!(evaluate(&srl, 0, 0, -16).value, 0x0FFF_FFFF);
        assert_eq!(evaluate(&sra, 0, 0, -16).value, -1);
        assert_eq!(evaluate(&sra, 0, 0, -16).cycles, 9);
    }

    #[test]
    fn control_flow_targets() {
        // beq $0, $0, -1 at 0x10 loops on itself
        let beq = dec(opcode::BEQ | 0xFFFF);
        let e = evaluate(&beq, 0x10, 0, 0);
        assert_eq!(e.next_pc, 0x10);
        assert!(e.redirects(0x10));
        let bne = dec(opcode::BNE | 0xFFFF);
        assert!(!evaluate(&bne, 0x10, 0, 0).redirects(0x10));

        let jal = dec(opcode::JAL | 0x40);
        let e = evaluate(&jal, 0x20, 0, 0);
        assert_eq!(e.next_pc, 0x100);
        assert_eq!(e.dest, Some(31));
        assert_eq!(e.value, 0x28);

        let jr = dec(opcode::SPECIAL | funct::JR | (31 << RS_SHIFT));
        assert_eq!(evaluate(&jr, 0x100, 0x28, 0).next_pc, 0x28);
    }

    #[test]
    fn syscall_exits_only_on_ten() {
        let sys = dec(opcode::SPECIAL | funct::SYSCALL);
        assert!(evaluate(&sys, 0, SYSCALL_EXIT, 0).exit);
        assert!(!evaluate(&sys, 0, 4, 0).exit);
    }
}

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decoder::Decoder;
use crate::disasm::fmt_decoded;
use crate::exec::{Effect, Executor};
use crate::memory::{Bus, BusError};
use crate::registers::{RegisterFile, GP, RA, SP};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuConfig {
    pub base_pc: u32,
    pub gp: u32, // global pointer at reset
    pub sp: u32, // stack pointer at reset
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            base_pc: 0,
            gp: 0x2000_0000,
            sp: 0x7FFF_FFF8,
        }
    }
}

/// Cumulative work done since reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub instructions: u64,
    pub memory_refs: u64,
    pub cycles: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cpu {
    pub pc: u32,
    pub regs: RegisterFile,
    pub counters: Counters,
    pub cfg: CpuConfig,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Trap {
    #[error("invalid instruction {word:#010x} at {pc:#010x}")]
    InvalidInstruction { pc: u32, word: u32 },
    #[error("bus error at {pc:#010x} accessing {addr:#010x}: {source}")]
    Bus {
        pc: u32,
        addr: u32,
        #[source]
        source: BusError,
    },
}

impl Trap {
    pub fn pc(&self) -> u32 {
        match *self {
            Trap::InvalidInstruction { pc, .. } | Trap::Bus { pc, .. } => pc,
        }
    }
}

/// Why execution stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Halt {
    /// `syscall` with `$v0 == 10`.
    Exit,
    /// The program counter left the assembled image.
    PcOutOfRange { pc: u32 },
    /// `run` executed its instruction budget without halting.
    StepLimit { limit: u64 },
    /// A trap stopped the machine; only `reset` clears it.
    Trapped { pc: u32 },
}

impl Halt {
    /// Halts that persist until reset.
    pub fn is_final(&self) -> bool {
        !matches!(self, Halt::StepLimit { .. })
    }
}

impl Cpu {
    pub fn new(cfg: CpuConfig) -> Self {
        let mut cpu = Self {
            pc: 0,
            regs: RegisterFile::new(),
            counters: Counters::default(),
            cfg,
        };
        cpu.reset(cfg.base_pc);
        cpu
    }

    pub fn reset(&mut self, reset_pc: u32) {
        self.pc = reset_pc;
        self.regs = RegisterFile::new();
        self.regs.write(GP, self.cfg.gp as i32);
        self.regs.write(SP, self.cfg.sp as i32);
        self.regs.write(RA, reset_pc as i32);
        self.counters = Counters::default();
    }

    /// Apply a fully resolved effect: register write, pc and counters.
    pub fn commit(&mut self, e: &Effect) {
        if let Some(rd) = e.dest {
            self.regs.write(rd, e.value);
        }
        self.pc = e.next_pc;
        self.counters.instructions += 1;
        self.counters.memory_refs += e.mem_refs;
        self.counters.cycles += e.cycles;
    }

    /// Execute the instruction at `pc` to completion.
    ///
    /// Returns `Ok(Some(_))` when the machine halts instead of (or by)
    /// executing. A trap leaves the state exactly as before the call.
    pub fn step<B: Bus, D: Decoder, X: Executor>(
        &mut self,
        bus: &mut B,
        dec: &D,
        exec: &X,
    ) -> Result<Option<Halt>, Trap> {
        let pc = self.pc;
        if !bus.contains(pc) {
            return Ok(Some(Halt::PcOutOfRange { pc }));
        }
        let word = bus
            .fetch(pc)
            .map_err(|source| Trap::Bus { pc, addr: pc, source })?;
        if word.is_data {
            debug!(pc, value = word.value, "data word executed as nop");
            self.commit(&Effect::nop(pc));
            return Ok(None);
        }
        let d = dec.decode(word.value).ok_or(Trap::InvalidInstruction {
            pc,
            word: word.value,
        })?;
        let e = exec.exec(self, bus, pc, d)?;
        debug!(pc, insn = %fmt_decoded(&d), next = e.next_pc, "step");
        Ok(e.exit.then_some(Halt::Exit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::IntExecutor;
    use crate::isa::mips32::Mips32Decoder;
    use crate::memory::{ProgramMemory, Word};

    #[test]
    fn reset_sets_conventional_pointers() {
        let cpu = Cpu::new(CpuConfig {
            base_pc: 0x40,
            ..CpuConfig::default()
        });
        assert_eq!(cpu.pc, 0x40);
        assert_eq!(cpu.regs.read(GP), 0x2000_0000);
        assert_eq!(cpu.regs.read(SP), 0x7FFF_FFF8);
        assert_eq!(cpu.regs.read(RA), 0x40);
    }

    #[test]
    fn invalid_word_traps_without_side_effects() {
        let mut mem = ProgramMemory::new(0, vec![Word::instr(0xFC00_0000)]);
        let mut cpu = Cpu::new(CpuConfig::default());
        let err = cpu
            .step(&mut mem, &Mips32Decoder::new(), &IntExecutor)
            .unwrap_err();
        assert_eq!(
            err,
            Trap::InvalidInstruction {
                pc: 0,
                word: 0xFC00_0000
            }
        );
        assert_eq!(cpu.pc, 0);
        assert_eq!(cpu.counters, Counters::default());
    }

    #[test]
    fn data_word_falls_through() {
        let mut mem = ProgramMemory::new(0, vec![Word::data(0xFFFF_FFFF)]);
        let mut cpu = Cpu::new(CpuConfig::default());
        let halt = cpu
            .step(&mut mem, &Mips32Decoder::new(), &IntExecutor)
            .unwrap();
        assert_eq!(halt, None);
        assert_eq!(cpu.pc, 4);
        assert_eq!(cpu.counters.instructions, 1);
        let halt = cpu
            .step(&mut mem, &Mips32Decoder::new(), &IntExecutor)
            .unwrap();
        assert_eq!(halt, Some(Halt::PcOutOfRange { pc: 4 }));
    }
}

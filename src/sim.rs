//! The simulator facade: one assembled program, one engine, and the
//! bookkeeping shared by the front-ends.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::asm::Program;
use crate::cpu::{Counters, Cpu, CpuConfig, Halt, Trap};
use crate::disasm::fmt_word;
use crate::exec::IntExecutor;
use crate::isa::mips32::Mips32Decoder;
use crate::memory::{Bus, ProgramMemory};
use crate::pipeline::{Pipeline, PipelineStats};
use crate::registers::NUM_REGISTERS;

pub const DEFAULT_STEP_LIMIT: u64 = 1_000_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    #[default]
    SingleCycle,
    Pipelined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub mode: Mode,
    /// Instructions one `run` may execute before it gives up.
    pub step_limit: u64,
    pub cpu: CpuConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            step_limit: DEFAULT_STEP_LIMIT,
            cpu: CpuConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineView {
    /// PC held by each stage, Fetch first.
    pub stages: [Option<u32>; 5],
    pub fetch_pc: u32,
    pub stats: PipelineStats,
}

/// Snapshot of the architectural state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MachineState {
    pub pc: u32,
    pub registers: [i32; NUM_REGISTERS],
    pub counters: Counters,
    pub halt: Option<Halt>,
    pub pipeline: Option<PipelineView>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepReport {
    /// Address of the instruction the step executed.
    pub pc: u32,
    pub delta: Counters,
    pub totals: Counters,
    pub halt: Option<Halt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub delta: Counters,
    pub totals: Counters,
    pub halt: Halt,
}

#[derive(thiserror::Error, Debug)]
pub enum SimError {
    #[error("machine fault at pc {:#010x}", .trap.pc())]
    Fault {
        #[source]
        trap: Trap,
        state: Box<MachineState>,
    },
}

fn delta(before: Counters, after: Counters) -> Counters {
    Counters {
        instructions: after.instructions - before.instructions,
        memory_refs: after.memory_refs - before.memory_refs,
        cycles: after.cycles - before.cycles,
    }
}

#[derive(Debug, Clone)]
pub struct Simulator {
    cfg: SimConfig,
    image: ProgramMemory,
    mem: ProgramMemory,
    cpu: Cpu,
    pipeline: Pipeline,
    dec: Mips32Decoder,
    halt: Option<Halt>,
}

impl Simulator {
    /// Load `program`; execution starts at its base address.
    pub fn new(program: &Program, mut cfg: SimConfig) -> Self {
        cfg.cpu.base_pc = program.base;
        let image = program.memory();
        Self {
            cpu: Cpu::new(cfg.cpu),
            pipeline: Pipeline::new(cfg.cpu.base_pc),
            mem: image.clone(),
            image,
            dec: Mips32Decoder::new(),
            halt: None,
            cfg,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.cfg
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn memory(&self) -> &ProgramMemory {
        &self.mem
    }

    pub fn halt(&self) -> Option<Halt> {
        self.halt
    }

    pub fn pipeline_stats(&self) -> Option<PipelineStats> {
        (self.cfg.mode == Mode::Pipelined).then_some(self.pipeline.stats)
    }

    /// Poke a register, e.g. to pass arguments before `run`. Writes to `$zero`
    /// are dropped.
    pub fn set_register(&mut self, index: u8, value: i32) {
        self.cpu.regs.write(index, value);
    }

    /// Disassembly of the next instruction to execute.
    pub fn next_instruction(&self) -> Option<String> {
        let pc = self.cpu.pc;
        let word = self.mem.fetch(pc).ok()?;
        Some(fmt_word(word, pc, &self.dec))
    }

    pub fn state(&self) -> MachineState {
        MachineState {
            pc: self.cpu.pc,
            registers: self.cpu.regs.values(),
            counters: self.cpu.counters,
            halt: self.halt,
            pipeline: (self.cfg.mode == Mode::Pipelined).then(|| PipelineView {
                stages: self.pipeline.occupancy(),
                fetch_pc: self.pipeline.fetch_pc(),
                stats: self.pipeline.stats,
            }),
        }
    }

    /// Execute one instruction.
    ///
    /// Once the machine has exited, left the image or trapped, further steps
    /// do nothing and report the same halt.
    pub fn step(&mut self) -> Result<StepReport, SimError> {
        let pc = self.cpu.pc;
        let before = self.cpu.counters;
        if let Some(h) = self.halt.filter(Halt::is_final) {
            return Ok(StepReport {
                pc,
                delta: Counters::default(),
                totals: before,
                halt: Some(h),
            });
        }
        let r = match self.cfg.mode {
            Mode::SingleCycle => self.cpu.step(&mut self.mem, &self.dec, &IntExecutor),
            Mode::Pipelined => self.pipeline.step(&mut self.cpu, &mut self.mem, &self.dec),
        };
        match r {
            Ok(halt) => {
                self.halt = halt;
                if let Some(h) = halt {
                    debug!(?h, "halted");
                }
                Ok(StepReport {
                    pc,
                    delta: delta(before, self.cpu.counters),
                    totals: self.cpu.counters,
                    halt,
                })
            }
            Err(trap) => {
                warn!(%trap, "trap");
                self.halt = Some(Halt::Trapped { pc: trap.pc() });
                Err(SimError::Fault {
                    trap,
                    state: Box::new(self.state()),
                })
            }
        }
    }

    /// Step until the machine halts or `step_limit` instructions have run.
    pub fn run(&mut self) -> Result<RunReport, SimError> {
        let start = self.cpu.counters;
        let limit = self.cfg.step_limit;
        let mut steps = 0u64;
        let halt = loop {
            if let Some(h) = self.halt.filter(Halt::is_final) {
                break h;
            }
            if steps >= limit {
                let h = Halt::StepLimit { limit };
                self.halt = Some(h);
                break h;
            }
            self.step()?;
            steps += 1;
        };
        debug!(?halt, steps, "run finished");
        Ok(RunReport {
            delta: delta(start, self.cpu.counters),
            totals: self.cpu.counters,
            halt,
        })
    }

    /// Back to the freshly loaded program.
    pub fn reset(&mut self) {
        let base = self.cfg.cpu.base_pc;
        self.mem = self.image.clone();
        self.cpu.reset(base);
        self.pipeline.reset(base);
        self.halt = None;
        debug!(base, "reset");
    }
}

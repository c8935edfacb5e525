pub mod asm;
pub mod cpu;
pub mod decoder;
pub mod disasm;
pub mod exec;
pub mod instructions;
pub mod memory;
pub mod pipeline;
pub mod registers;
pub mod sim;

pub mod isa {
    pub mod mips32; // MIPS32 integer subset
}

pub use asm::{assemble, AsmConfig, AsmError, Assembler, Program};
pub use cpu::{Counters, Cpu, CpuConfig, Halt, Trap};
pub use memory::{Bus, BusError, ProgramMemory, Word};
pub use sim::{Mode, SimConfig, SimError, Simulator};

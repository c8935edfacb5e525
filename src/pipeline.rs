//! Five-stage pipelined execution engine.
//!
//! Stages are processed from WriteBack back to Fetch on every clock so a slot
//! only moves into a stage the downstream slot has already vacated. Work
//! happens as a slot enters a stage:
//!
//! - **Decode**: fields are extracted from the raw word.
//! - **Execute**: operands are read from the register file, overridden by
//!   forwarding from the Memory and WriteBack slots, and the effect is
//!   computed. Taken branches and jumps flush the Fetch slot.
//! - **Memory**: loads and stores hit the bus.
//! - leaving **WriteBack** commits the effect to the architectural state.
//!
//! A load that entered Memory on this clock has no value yet, so an
//! instruction that needs it waits one clock in Decode (load-use stall).
//! Faults travel with their slot. Once a faulting slot reaches Memory the
//! younger slots are squashed and fetch stops; the trap is raised when the
//! slot would retire, so everything older has committed and nothing younger
//! has touched memory.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::cpu::{Cpu, Halt, Trap};
use crate::decoder::{Ctrl, Decoded, Decoder};
use crate::exec::{access, evaluate, Effect, MemOp};
use crate::memory::{Bus, Word};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Fetch,
    Decode,
    Execute,
    Memory,
    WriteBack,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Fetch,
        Stage::Decode,
        Stage::Execute,
        Stage::Memory,
        Stage::WriteBack,
    ];

    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Fetch => Some(Stage::Decode),
            Stage::Decode => Some(Stage::Execute),
            Stage::Execute => Some(Stage::Memory),
            Stage::Memory => Some(Stage::WriteBack),
            Stage::WriteBack => None,
        }
    }

    fn idx(self) -> usize {
        self as usize
    }
}

/// One in-flight instruction.
#[derive(Debug, Clone)]
pub struct Slot {
    pub pc: u32,
    pub word: Word,
    /// `None` for data words, which flow through as no-ops.
    pub decoded: Option<Decoded>,
    pub effect: Option<Effect>,
    pub fault: Option<Trap>,
}

impl Slot {
    fn fetched(pc: u32, word: Word) -> Self {
        Self {
            pc,
            word,
            decoded: None,
            effect: None,
            fault: None,
        }
    }

    fn faulted(pc: u32, fault: Trap) -> Self {
        Self {
            fault: Some(fault),
            ..Self::fetched(pc, Word::default())
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub stalls: u64,
    pub flushes: u64,
    pub forwards: u64,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    slots: [Option<Slot>; 5],
    fetch_pc: u32,
    /// An exit syscall has resolved; nothing younger may be fetched.
    draining: bool,
    pub stats: PipelineStats,
}

impl Pipeline {
    pub fn new(start_pc: u32) -> Self {
        Self {
            slots: Default::default(),
            fetch_pc: start_pc,
            draining: false,
            stats: PipelineStats::default(),
        }
    }

    pub fn reset(&mut self, start_pc: u32) {
        *self = Self::new(start_pc);
    }

    pub fn fetch_pc(&self) -> u32 {
        self.fetch_pc
    }

    /// PC held by each stage, Fetch first.
    pub fn occupancy(&self) -> [Option<u32>; 5] {
        let mut out = [None; 5];
        for (o, s) in out.iter_mut().zip(&self.slots) {
            *o = s.as_ref().map(|s| s.pc);
        }
        out
    }

    pub fn slot(&self, stage: Stage) -> Option<&Slot> {
        self.slots[stage.idx()].as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    fn take(&mut self, stage: Stage) -> Option<Slot> {
        self.slots[stage.idx()].take()
    }

    fn put(&mut self, stage: Stage, slot: Slot) {
        trace!(?stage, pc = slot.pc, "advance");
        debug_assert!(self.slots[stage.idx()].is_none());
        self.slots[stage.idx()] = Some(slot);
    }

    /// Hand `slot` from `from` to the stage after it.
    fn advance(&mut self, from: Stage, slot: Slot) {
        if let Some(to) = from.next() {
            self.put(to, slot);
        }
    }

    fn retire(cpu: &mut Cpu, slot: &Slot) -> bool {
        let e = slot.effect.unwrap_or_else(|| Effect::nop(slot.pc));
        if let Some(rd) = e.dest {
            cpu.regs.write(rd, e.value);
        }
        cpu.pc = e.next_pc;
        cpu.counters.instructions += 1;
        cpu.counters.memory_refs += e.mem_refs;
        debug!(pc = slot.pc, next = e.next_pc, "retire");
        e.exit
    }

    /// Empty every stage and fetch from `pc` again, as the single-cycle
    /// engine would continue after an exit or a trap.
    fn restart(&mut self, pc: u32) {
        self.slots = Default::default();
        self.fetch_pc = pc;
        self.draining = false;
    }

    /// Drop everything behind a faulting slot and stop fetching.
    fn squash_younger(&mut self) {
        for stage in [Stage::Fetch, Stage::Decode] {
            if self.take(stage).is_some() {
                self.stats.flushes += 1;
            }
        }
        self.draining = true;
    }

    fn flush_fetch(&mut self) {
        if let Some(slot) = self.take(Stage::Fetch) {
            trace!(pc = slot.pc, "flush");
            self.stats.flushes += 1;
        }
    }

    /// Slots fetched from a word a store just overwrote now hold the new data.
    fn snoop_store(&mut self, addr: u32, value: u32) {
        for stage in [Stage::Fetch, Stage::Decode] {
            if let Some(s) = self.slots[stage.idx()].as_mut().filter(|s| s.pc == addr) {
                trace!(?stage, pc = addr, "store hit in-flight slot");
                *s = Slot::fetched(addr, Word::data(value));
            }
        }
    }

    /// The slot about to enter Execute needs a value a load is still fetching.
    fn load_use_hazard(&self, d: &Decoded) -> bool {
        let Some(load) = self
            .slot(Stage::Memory)
            .and_then(|s| s.decoded)
            .filter(|m| m.ctrl().contains(Ctrl::MEM_READ))
        else {
            return false;
        };
        let (rs, rt) = d.reads();
        let dest = load.dest();
        dest.is_some() && (dest == rs || dest == rt)
    }

    /// Register value as seen by the slot entering Execute.
    fn operand(&mut self, cpu: &Cpu, reg: Option<u8>) -> i32 {
        let Some(r) = reg else { return 0 };
        if r == 0 {
            return 0;
        }
        for stage in [Stage::Memory, Stage::WriteBack] {
            if let Some(e) = self.slot(stage).and_then(|s| s.effect) {
                if e.dest == Some(r) {
                    self.stats.forwards += 1;
                    return e.value;
                }
            }
        }
        cpu.regs.read(r)
    }

    /// Advance the machine by one clock.
    pub fn cycle<B: Bus, D: Decoder>(
        &mut self,
        cpu: &mut Cpu,
        bus: &mut B,
        dec: &D,
    ) -> Result<Option<Halt>, Trap> {
        if self.is_empty() && !bus.contains(self.fetch_pc) {
            return Ok(Some(Halt::PcOutOfRange { pc: self.fetch_pc }));
        }
        cpu.counters.cycles += 1;

        // WriteBack: retire, or raise the fault the slot carries.
        if let Some(mut slot) = self.take(Stage::WriteBack) {
            if let Some(trap) = slot.fault.take() {
                self.restart(cpu.pc);
                return Err(trap);
            }
            if Self::retire(cpu, &slot) {
                self.restart(cpu.pc);
                return Ok(Some(Halt::Exit));
            }
        }

        // Memory -> WriteBack.
        if let Some(slot) = self.take(Stage::Memory) {
            self.advance(Stage::Memory, slot);
        }

        // Execute -> Memory: the bus access.
        if let Some(mut slot) = self.take(Stage::Execute) {
            if slot.fault.is_none() {
                if let Some(e) = slot.effect.as_mut() {
                    match access(bus, slot.pc, e) {
                        Ok(()) => {
                            if let Some(MemOp::Store { addr, value }) = e.mem {
                                self.snoop_store(addr, value);
                            }
                        }
                        Err(trap) => slot.fault = Some(trap),
                    }
                }
            }
            if slot.fault.is_some() {
                debug!(pc = slot.pc, "fault in flight");
                self.squash_younger();
            }
            self.advance(Stage::Execute, slot);
        }

        // Decode -> Execute.
        if let Some(d) = self.slot(Stage::Decode).map(|s| s.decoded) {
            let stalled = d.is_some_and(|d| self.load_use_hazard(&d));
            if stalled {
                self.stats.stalls += 1;
                trace!("load-use stall");
            } else if let Some(mut slot) = self.take(Stage::Decode) {
                if slot.fault.is_none() {
                    let e = match d {
                        Some(d) => {
                            let (rs, rt) = d.reads();
                            let rs = self.operand(cpu, rs);
                            let rt = self.operand(cpu, rt);
                            evaluate(&d, slot.pc, rs, rt)
                        }
                        None => Effect::nop(slot.pc),
                    };
                    if e.exit {
                        self.flush_fetch();
                        self.draining = true;
                    } else if d.is_some_and(|d| d.ctrl().intersects(Ctrl::BRANCH | Ctrl::JUMP))
                        && e.redirects(slot.pc)
                    {
                        self.flush_fetch();
                        self.fetch_pc = e.next_pc;
                    }
                    slot.effect = Some(e);
                }
                self.advance(Stage::Decode, slot);
            }
        }

        // Fetch -> Decode.
        if self.slot(Stage::Decode).is_none() {
            if let Some(mut slot) = self.take(Stage::Fetch) {
                if slot.fault.is_none() && !slot.word.is_data {
                    slot.decoded = dec.decode(slot.word.value);
                    if slot.decoded.is_none() {
                        slot.fault = Some(Trap::InvalidInstruction {
                            pc: slot.pc,
                            word: slot.word.value,
                        });
                    }
                }
                self.advance(Stage::Fetch, slot);
            }
        }

        // Fetch.
        if self.slot(Stage::Fetch).is_none() && !self.draining && bus.contains(self.fetch_pc) {
            let pc = self.fetch_pc;
            let slot = match bus.fetch(pc) {
                Ok(word) => Slot::fetched(pc, word),
                Err(source) => Slot::faulted(pc, Trap::Bus { pc, addr: pc, source }),
            };
            self.put(Stage::Fetch, slot);
            self.fetch_pc = pc.wrapping_add(4);
        }
        Ok(None)
    }

    /// Clock until one instruction retires or the machine halts.
    pub fn step<B: Bus, D: Decoder>(
        &mut self,
        cpu: &mut Cpu,
        bus: &mut B,
        dec: &D,
    ) -> Result<Option<Halt>, Trap> {
        let retired = cpu.counters.instructions;
        loop {
            if let Some(halt) = self.cycle(cpu, bus, dec)? {
                return Ok(Some(halt));
            }
            if cpu.counters.instructions != retired {
                return Ok(None);
            }
        }
    }
}

//! Register naming and the architectural register file.

use serde::{Deserialize, Serialize};

pub const NUM_REGISTERS: usize = 32;

pub const ZERO: u8 = 0;
pub const V0: u8 = 2;
pub const GP: u8 = 28;
pub const SP: u8 = 29;
pub const RA: u8 = 31;

/// Conventional names, indexed by register number.
pub const ABI_NAMES: [&str; NUM_REGISTERS] = [
    "zero", "at", "v0", "v1", "a0", "a1", "a2", "a3", "t0", "t1", "t2", "t3", "t4", "t5", "t6",
    "t7", "s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7", "t8", "t9", "k0", "k1", "gp", "sp",
    "fp", "ra",
];

/// Resolve a register operand to its index.
///
/// Accepts `$name`, `name`, `$N` and `N`, in any case, and tolerates the
/// closing parenthesis left over from `offset(reg)` syntax.
pub fn resolve(token: &str) -> Option<u8> {
    let t = token.trim();
    let t = t.strip_suffix(')').unwrap_or(t);
    let t = t.strip_prefix('$').unwrap_or(t).trim();
    if t.is_empty() {
        return None;
    }
    if t.bytes().all(|b| b.is_ascii_digit()) {
        return t.parse::<u8>().ok().filter(|&n| (n as usize) < NUM_REGISTERS);
    }
    let lower = t.to_ascii_lowercase();
    if lower == "s8" {
        return Some(30);
    }
    ABI_NAMES.iter().position(|&n| n == lower).map(|i| i as u8)
}

pub fn name(index: u8) -> &'static str {
    ABI_NAMES[index as usize & (NUM_REGISTERS - 1)]
}

/// 32 signed registers with `$zero` hard-wired to 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterFile {
    regs: [i32; NUM_REGISTERS],
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self {
            regs: [0; NUM_REGISTERS],
        }
    }
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self, index: u8) -> i32 {
        match index {
            ZERO => 0,
            i => self.regs[i as usize & (NUM_REGISTERS - 1)],
        }
    }

    pub fn write(&mut self, index: u8, value: i32) {
        if index != ZERO {
            self.regs[index as usize & (NUM_REGISTERS - 1)] = value;
        }
    }

    pub fn values(&self) -> [i32; NUM_REGISTERS] {
        let mut out = self.regs;
        out[ZERO as usize] = 0;
        out
    }
}

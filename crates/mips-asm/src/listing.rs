//! Text and JSON renderings of an assembled [`Program`].

use std::fmt::Write as _;

use mips_rs::asm::{AsmError, Program, Symbol};
use mips_rs::disasm::fmt_word;
use mips_rs::isa::mips32::Mips32Decoder;
use serde::Serialize;

/// One hex word per line, in load order.
pub fn render_words(p: &Program) -> String {
    let mut out = String::new();
    for w in &p.words {
        let _ = writeln!(out, "{:08X}", w.value);
    }
    out
}

pub fn render_symbols(p: &Program) -> String {
    let mut out = String::new();
    for s in p.symbols.iter() {
        let _ = writeln!(out, "{:<16} {:#010x}  line {}", s.name, s.address, s.line);
    }
    out
}

/// Address, encoded words and source text for every line that emitted code.
pub fn render_listing(p: &Program) -> String {
    let mut out = String::new();
    for l in &p.listing {
        let start = (l.addr.wrapping_sub(p.base) / 4) as usize;
        for (k, w) in p.words[start..start + l.words].iter().enumerate() {
            let addr = l.addr.wrapping_add(4 * k as u32);
            if let Some(name) = p.symbols.name_at(addr) {
                let _ = writeln!(out, "{name}:");
            }
            if k == 0 {
                let _ = writeln!(out, "{addr:08x}  {:08X}  {:>4}  {}", w.value, l.line, l.text);
            } else {
                let _ = writeln!(out, "{addr:08x}  {:08X}", w.value);
            }
        }
    }
    out
}

/// Raw little-endian image.
pub fn to_le_bytes(p: &Program) -> Vec<u8> {
    p.words.iter().flat_map(|w| w.value.to_le_bytes()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisasmLine {
    pub addr: u32,
    pub word: u32,
    pub label: Option<String>,
    pub text: String,
}

pub fn disassemble(p: &Program) -> Vec<DisasmLine> {
    let dec = Mips32Decoder::new();
    p.words
        .iter()
        .enumerate()
        .map(|(i, w)| {
            let addr = p.base.wrapping_add(4 * i as u32);
            DisasmLine {
                addr,
                word: w.value,
                label: p.symbols.name_at(addr).map(str::to_string),
                text: fmt_word(*w, addr, &dec),
            }
        })
        .collect()
}

/// Machine-readable summary for `--format json`.
#[derive(Debug, Clone, Serialize)]
pub struct Report<'a> {
    pub base: u32,
    pub words: Vec<u32>,
    pub data: Vec<bool>,
    pub symbols: Vec<&'a Symbol>,
    pub warnings: &'a [AsmError],
}

impl<'a> From<&'a Program> for Report<'a> {
    fn from(p: &'a Program) -> Self {
        Self {
            base: p.base,
            words: p.words.iter().map(|w| w.value).collect(),
            data: p.words.iter().map(|w| w.is_data).collect(),
            symbols: p.symbols.iter().collect(),
            warnings: &p.warnings,
        }
    }
}

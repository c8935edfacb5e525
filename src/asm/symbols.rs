//! Pass 1: label addresses.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use super::error::AsmError;
use super::lexer::{self, Line};
use crate::instructions::{lookup, Format};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Symbol {
    pub name: String,
    pub address: u32,
    /// Line the label was defined on.
    pub line: usize,
}

/// Label table in definition order with name lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SymbolTable {
    entries: Vec<Symbol>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define `name`. A second definition is rejected and the first kept.
    pub fn insert(&mut self, name: &str, address: u32, line: usize) -> Result<(), AsmError> {
        if let Some(&i) = self.index.get(name) {
            return Err(AsmError::DuplicateSymbol {
                line,
                name: name.to_string(),
                first: self.entries[i].line,
            });
        }
        self.index.insert(name.to_string(), self.entries.len());
        self.entries.push(Symbol {
            name: name.to_string(),
            address,
            line,
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        self.symbol(name).map(|s| s.address)
    }

    pub fn symbol(&self, name: &str) -> Option<&Symbol> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// Label defined exactly at `address`, if any.
    pub fn name_at(&self, address: u32) -> Option<&str> {
        self.entries
            .iter()
            .find(|s| s.address == address)
            .map(|s| s.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Number of words `line` will occupy once encoded.
pub fn slot_count(line: &Line<'_>) -> usize {
    let Some(desc) = line.mnemonic().and_then(lookup) else {
        return 0;
    };
    match desc.format {
        Format::Word => line.operands().len(),
        Format::Byte => (line.operands().len() + 3) / 4,
        _ => 1,
    }
}

/// Walk the source once and assign every label its byte address.
///
/// Duplicate definitions come back as diagnostics; the table keeps the first.
pub fn build<S: AsRef<str>>(lines: &[S], base_pc: u32) -> (SymbolTable, Vec<AsmError>) {
    let mut table = SymbolTable::new();
    let mut diagnostics = Vec::new();
    let mut words: u32 = 0;
    for (i, text) in lines.iter().enumerate() {
        let line = lexer::tokenize(i + 1, text.as_ref());
        if let Some(name) = line.label {
            let address = base_pc.wrapping_add(words.wrapping_mul(4));
            if let Err(e) = table.insert(name, address, line.number) {
                diagnostics.push(e);
            }
        }
        words = words.wrapping_add(slot_count(&line) as u32);
    }
    debug!(symbols = table.len(), words, "symbol pass done");
    (table, diagnostics)
}

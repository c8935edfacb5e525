//! Two-pass assembler: [`symbols::build`] assigns label addresses, then
//! [`encoder::encode_line`] emits words line by line.

pub mod encoder;
pub mod error;
pub mod lexer;
pub mod symbols;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use error::AsmError;
pub use symbols::{Symbol, SymbolTable};

use crate::memory::{ProgramMemory, Word};

/// Upper bound on emitted words unless configured otherwise.
pub const DEFAULT_MAX_WORDS: usize = 0x0020_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsmConfig {
    /// Byte address of the first emitted word.
    pub base_pc: u32,
    pub max_words: usize,
    /// Treat every diagnostic as an error.
    pub strict: bool,
}

impl Default for AsmConfig {
    fn default() -> Self {
        Self {
            base_pc: 0,
            max_words: DEFAULT_MAX_WORDS,
            strict: false,
        }
    }
}

/// Source line that produced words.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingLine {
    pub line: usize,
    pub addr: u32,
    /// Number of words emitted starting at `addr`.
    pub words: usize,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Program {
    pub base: u32,
    pub words: Vec<Word>,
    pub symbols: SymbolTable,
    pub listing: Vec<ListingLine>,
    pub warnings: Vec<AsmError>,
}

impl Program {
    /// Fresh memory image holding the assembled words.
    pub fn memory(&self) -> ProgramMemory {
        ProgramMemory::new(self.base, self.words.clone())
    }

    pub fn end(&self) -> u32 {
        self.base
            .wrapping_add((self.words.len() as u32).wrapping_mul(4))
    }

    /// Listing entry covering `addr`.
    pub fn source_at(&self, addr: u32) -> Option<&ListingLine> {
        self.listing.iter().find(|l| {
            let off = addr.wrapping_sub(l.addr);
            off % 4 == 0 && off / 4 < l.words as u32
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Assembler {
    cfg: AsmConfig,
}

impl Assembler {
    pub fn new(cfg: AsmConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &AsmConfig {
        &self.cfg
    }

    /// Collect `diags`, or fail on the first one in strict mode.
    fn report(&self, diags: Vec<AsmError>, into: &mut Vec<AsmError>) -> Result<(), AsmError> {
        for d in diags {
            if self.cfg.strict {
                return Err(d);
            }
            warn!(line = d.line(), "{d}");
            into.push(d);
        }
        Ok(())
    }

    pub fn assemble<S: AsRef<str>>(&self, lines: &[S]) -> Result<Program, AsmError> {
        let base = self.cfg.base_pc;
        let (symbols, diags) = symbols::build(lines, base);
        let mut warnings = Vec::new();
        self.report(diags, &mut warnings)?;

        let mut words: Vec<Word> = Vec::new();
        let mut listing = Vec::new();
        for (i, text) in lines.iter().enumerate() {
            let line = lexer::tokenize(i + 1, text.as_ref());
            let addr = base.wrapping_add((words.len() as u32).wrapping_mul(4));
            let encoded = encoder::encode_line(&line, addr, &symbols)?;
            debug_assert_eq!(encoded.words.len(), symbols::slot_count(&line));
            self.report(encoded.warnings, &mut warnings)?;
            if encoded.words.is_empty() {
                continue;
            }
            if words.len() + encoded.words.len() > self.cfg.max_words {
                return Err(AsmError::ProgramTooLarge {
                    limit: self.cfg.max_words,
                });
            }
            listing.push(ListingLine {
                line: line.number,
                addr,
                words: encoded.words.len(),
                text: text.as_ref().trim().to_string(),
            });
            words.extend(encoded.words);
        }
        debug!(
            words = words.len(),
            symbols = symbols.len(),
            warnings = warnings.len(),
            "assembled"
        );
        Ok(Program {
            base,
            words,
            symbols,
            listing,
            warnings,
        })
    }

    pub fn assemble_str(&self, source: &str) -> Result<Program, AsmError> {
        let lines: Vec<&str> = source.lines().collect();
        self.assemble(&lines)
    }
}

/// Assemble `source` with the default configuration.
pub fn assemble(source: &str) -> Result<Program, AsmError> {
    Assembler::default().assemble_str(source)
}

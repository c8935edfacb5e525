use serde::Serialize;

/// Assembler diagnostics. Every variant tied to a source line carries its
/// 1-based line number.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AsmError {
    #[error("line {line}: {msg}")]
    Syntax { line: usize, msg: String },
    #[error("line {line}: unknown mnemonic `{mnemonic}`")]
    UnknownMnemonic { line: usize, mnemonic: String },
    #[error("line {line}: unresolved symbol `{name}`")]
    UnresolvedSymbol { line: usize, name: String },
    #[error("line {line}: `{token}` does not fit in {bits} bits, truncated")]
    MalformedImmediate {
        line: usize,
        token: String,
        bits: u32,
    },
    #[error("line {line}: symbol `{name}` already defined on line {first}")]
    DuplicateSymbol {
        line: usize,
        name: String,
        first: usize,
    },
    #[error("program does not fit in {limit} words")]
    ProgramTooLarge { limit: usize },
}

impl AsmError {
    pub fn line(&self) -> Option<usize> {
        match *self {
            AsmError::Syntax { line, .. }
            | AsmError::UnknownMnemonic { line, .. }
            | AsmError::UnresolvedSymbol { line, .. }
            | AsmError::MalformedImmediate { line, .. }
            | AsmError::DuplicateSymbol { line, .. } => Some(line),
            AsmError::ProgramTooLarge { .. } => None,
        }
    }

    /// Errors that abort assembly even in permissive mode.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AsmError::UnresolvedSymbol { .. } | AsmError::ProgramTooLarge { .. }
        )
    }
}

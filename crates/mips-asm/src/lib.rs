pub mod listing;

pub use listing::{
    disassemble, render_listing, render_symbols, render_words, to_le_bytes, DisasmLine, Report,
};

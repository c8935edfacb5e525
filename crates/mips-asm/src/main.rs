use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use mips_asm::{disassemble, render_listing, render_symbols, render_words, to_le_bytes, Report};
use mips_rs::asm::{AsmConfig, Assembler, DEFAULT_MAX_WORDS};

#[derive(Parser, Debug)]
#[command(author, version, about = "MIPS assembler CLI", long_about = None)]
struct Cli {
    /// Load address of the first word (hex or dec)
    #[arg(long, default_value = "0", value_parser = parse_u32)]
    base: u32,
    /// Fail on the first diagnostic instead of warning
    #[arg(long)]
    strict: bool,
    /// Largest program accepted, in words
    #[arg(long, default_value_t = DEFAULT_MAX_WORDS)]
    max_words: usize,
    /// Input assembly file
    #[arg(value_name = "SOURCE")]
    input: String,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assemble and emit the program
    Assemble {
        #[arg(long, value_enum, default_value_t = OutputFormat::Hex)]
        format: OutputFormat,
        /// Write output to file instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<String>,
    },
    /// Print the symbol table
    Symbols,
    /// Disassemble the assembled image
    Disasm {
        /// Show the raw word next to each instruction
        #[arg(long)]
        show_words: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// One hex word per line
    Hex,
    /// Addresses, words and source
    Listing,
    /// Little-endian binary image
    Bin,
    Json,
}

fn parse_u32(s: &str) -> Result<u32> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Ok(u32::from_str_radix(hex, 16)?)
    } else {
        Ok(s.parse::<u32>()?)
    }
}

fn emit(out: Option<&str>, bytes: &[u8]) -> Result<()> {
    match out {
        Some(path) => std::fs::write(path, bytes).with_context(|| format!("writing {path}")),
        None => {
            use std::io::Write;
            std::io::stdout().write_all(bytes)?;
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let source =
        std::fs::read_to_string(&cli.input).with_context(|| format!("reading {}", cli.input))?;
    let asm = Assembler::new(AsmConfig {
        base_pc: cli.base,
        max_words: cli.max_words,
        strict: cli.strict,
    });
    let program = asm
        .assemble_str(&source)
        .with_context(|| format!("assembling {}", cli.input))?;
    for w in &program.warnings {
        eprintln!("warning: {w}");
    }

    match cli.cmd {
        Command::Assemble { format, out } => {
            let bytes = match format {
                OutputFormat::Hex => render_words(&program).into_bytes(),
                OutputFormat::Listing => render_listing(&program).into_bytes(),
                OutputFormat::Bin => to_le_bytes(&program),
                OutputFormat::Json => {
                    let mut s = serde_json::to_string_pretty(&Report::from(&program))?;
                    s.push('\n');
                    s.into_bytes()
                }
            };
            emit(out.as_deref(), &bytes)?;
        }
        Command::Symbols => print!("{}", render_symbols(&program)),
        Command::Disasm { show_words } => {
            for l in disassemble(&program) {
                if let Some(label) = &l.label {
                    println!("{label}:");
                }
                if show_words {
                    println!("  {:08x}:  {:08X}  {}", l.addr, l.word, l.text);
                } else {
                    println!("  {:08x}:  {}", l.addr, l.text);
                }
            }
        }
    }
    Ok(())
}

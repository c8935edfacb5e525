use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use mips_rs::pipeline::Stage;
use mips_rs::sim::{MachineState, StepReport};
use mips_rs::{AsmConfig, Assembler, Counters, Mode, SimConfig, SimError, Simulator};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EngineArg {
    Single,
    Pipelined,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Assemble a MIPS source file and run it on the mips-rs simulator"
)]
struct Opts {
    /// Execution engine (overrides the config file)
    #[arg(short, long, value_enum)]
    mode: Option<EngineArg>,
    /// Load address of the first word (hex or dec)
    #[arg(long, value_parser = parse_u32)]
    base: Option<u32>,
    /// Instructions a single `run` may execute
    #[arg(long)]
    step_limit: Option<u64>,
    /// Largest program the assembler accepts, in words
    #[arg(long)]
    max_words: Option<usize>,
    /// Fail on the first assembler diagnostic
    #[arg(long)]
    strict: bool,
    /// Run to completion without prompting
    #[arg(long)]
    batch: bool,
    /// Print the final machine state as JSON (batch mode)
    #[arg(long)]
    json: bool,
    /// JSON file with `asm` and `sim` sections
    #[arg(long, value_name = "FILE")]
    config: Option<String>,
    #[arg(value_name = "SOURCE")]
    input: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    asm: AsmConfig,
    sim: SimConfig,
}

fn parse_u32(s: &str) -> Result<u32> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Ok(u32::from_str_radix(hex, 16)?)
    } else {
        Ok(s.parse::<u32>()?)
    }
}

fn load_config(opts: &Opts) -> Result<FileConfig> {
    let mut cfg = match &opts.config {
        Some(path) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {path}"))?
        }
        None => FileConfig::default(),
    };
    if let Some(m) = opts.mode {
        cfg.sim.mode = match m {
            EngineArg::Single => Mode::SingleCycle,
            EngineArg::Pipelined => Mode::Pipelined,
        };
    }
    if let Some(base) = opts.base {
        cfg.asm.base_pc = base;
    }
    if let Some(limit) = opts.step_limit {
        cfg.sim.step_limit = limit;
    }
    if let Some(max) = opts.max_words {
        cfg.asm.max_words = max;
    }
    cfg.asm.strict |= opts.strict;
    Ok(cfg)
}

fn print_registers(state: &MachineState) {
    for (j, r) in state.registers.iter().enumerate() {
        println!("R{j} = {:08X}", *r as u32);
    }
}

fn print_step(report: &StepReport, sim: &Simulator) {
    println!("Instructions executed (step): {}", report.delta.instructions);
    println!("Instructions executed (total): {}", report.totals.instructions);
    println!("Memory references: {}", report.totals.memory_refs);
    println!("Clock cycles (step): {}", report.delta.cycles);
    println!("Clock cycles (total): {}", report.totals.cycles);
    let state = sim.state();
    if let Some(view) = &state.pipeline {
        for (stage, pc) in Stage::ALL.iter().zip(view.stages) {
            match pc {
                Some(pc) => println!("{stage:?}: {pc:08X}"),
                None => println!("{stage:?}: -"),
            }
        }
    }
    print_registers(&state);
}

fn print_totals(totals: &Counters, sim: &Simulator) {
    println!("Instructions executed: {}", totals.instructions);
    println!("Memory references: {}", totals.memory_refs);
    println!("Clock cycles: {}", totals.cycles);
    if let Some(stats) = sim.pipeline_stats() {
        println!(
            "Stalls: {}  Flushes: {}  Forwards: {}",
            stats.stalls, stats.flushes, stats.forwards
        );
    }
    print_registers(&sim.state());
}

fn report_fault(err: &SimError) {
    let SimError::Fault { trap, state } = err;
    eprintln!("TRAP: {trap}");
    eprintln!("pc = {:08X}", state.pc);
}

fn interactive(sim: &mut Simulator) -> Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("Enter command (s for single step, r for run, x for reset, q for quit): ");
        io::stdout().flush()?;
        let Some(line) = lines.next().transpose()? else {
            return Ok(());
        };
        match line.trim() {
            "s" | "step" => {
                if let Some(text) = sim.next_instruction() {
                    println!("{:08X}: {text}", sim.cpu().pc);
                }
                match sim.step() {
                    Ok(report) => {
                        print_step(&report, sim);
                        if let Some(halt) = report.halt {
                            println!("Halted: {halt:?}");
                        }
                    }
                    Err(e) => report_fault(&e),
                }
            }
            "r" | "run" => match sim.run() {
                Ok(report) => {
                    print_totals(&report.totals, sim);
                    println!("Halted: {:?}", report.halt);
                }
                Err(e) => report_fault(&e),
            },
            "x" | "reset" => {
                sim.reset();
                println!("Reset.");
            }
            "q" | "quit" => return Ok(()),
            "" => {}
            _ => println!("Invalid Command."),
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let opts = Opts::parse();
    let cfg = load_config(&opts)?;

    let source = std::fs::read_to_string(&opts.input)
        .with_context(|| format!("reading {}", opts.input))?;
    let program = Assembler::new(cfg.asm)
        .assemble_str(&source)
        .with_context(|| format!("assembling {}", opts.input))?;
    for w in &program.warnings {
        eprintln!("warning: {w}");
    }

    let mut sim = Simulator::new(&program, cfg.sim);
    if !opts.batch {
        return interactive(&mut sim);
    }

    match sim.run() {
        Ok(report) if opts.json => {
            println!("{}", serde_json::to_string_pretty(&(report, sim.state()))?);
        }
        Ok(report) => {
            print_totals(&report.totals, &sim);
            println!("Halted: {:?}", report.halt);
        }
        Err(SimError::Fault { trap, state }) if opts.json => {
            println!("{}", serde_json::to_string_pretty(&state)?);
            return Err(trap.into());
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

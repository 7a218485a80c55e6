//! `kpu-runner`: loads a configuration and a Data Movement ISA program and
//! drives it to completion, printing the final statistics.
//!
//! A program file is either a `.kpubin` binary (the canonical on-disk
//! format) or a `.json` textual encoding of a `DMProgram`; the extension
//! picks the decoder. Configuration defaults to `Config::default()` when no
//! `--config` file is given.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use kpu_core::exec::{ConcurrentExecutor, ExecutionState, HardwareContext};
use kpu_core::isa::{binary, validate_program, DMProgram};
use kpu_core::{Config, KpuError, KpuResult};

#[derive(Parser, Debug)]
#[command(name = "kpu-runner", author, version, about = "KPU behavioral simulator runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a program to completion (or until `--max-cycles` is hit).
    Run {
        /// Path to a `.kpubin` or `.json` program file.
        program: PathBuf,
        /// Optional JSON configuration file; defaults to `Config::default()`.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Cycle budget; 0 means unbounded.
        #[arg(long, default_value_t = 0)]
        max_cycles: u64,
        /// Print each retired trace entry as it happens.
        #[arg(long)]
        trace: bool,
    },
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Run { program, config, max_cycles, trace }) => cmd_run(&program, config.as_deref(), max_cycles, trace),
        None => {
            eprintln!("usage: kpu-runner run <program> [--config <file>] [--max-cycles <n>] [--trace]");
            process::exit(1);
        }
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        process::exit(err.exit_code());
    }
}

fn load_config(path: Option<&Path>) -> KpuResult<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let text = fs::read_to_string(path).map_err(|e| KpuError::InvalidProgram(format!("reading {}: {e}", path.display())))?;
    serde_json::from_str(&text).map_err(|e| KpuError::InvalidProgram(format!("parsing config {}: {e}", path.display())))
}

fn load_program(path: &Path) -> KpuResult<DMProgram> {
    if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
        let text = fs::read_to_string(path).map_err(|e| KpuError::InvalidProgram(format!("reading {}: {e}", path.display())))?;
        return binary::from_json(&text);
    }
    let bytes = fs::read(path).map_err(|e| KpuError::InvalidProgram(format!("reading {}: {e}", path.display())))?;
    binary::read_program(&bytes)
}

fn cmd_run(program_path: &Path, config_path: Option<&Path>, max_cycles: u64, trace: bool) -> KpuResult<()> {
    let config = load_config(config_path)?;
    let program = load_program(program_path)?;
    validate_program(&program, &config)?;

    println!(
        "config: {} dma, {} block movers, {} streamers, {} compute tile(s) ({}x{} array)",
        config.engines.dma_engine_count,
        config.engines.block_mover_count,
        config.engines.streamer_count,
        config.compute.compute_tile_count,
        config.compute.processor_array_rows,
        config.compute.processor_array_cols,
    );
    println!("program: {} instruction(s)", program.len());

    let mut executor = ConcurrentExecutor::new(HardwareContext::new(&config));
    executor.load_program(program);

    let completed = executor.run(max_cycles)?;
    if trace {
        for entry in executor.trace() {
            println!("{entry:?}");
        }
    }

    if !completed {
        return Err(KpuError::Timeout(max_cycles));
    }
    if executor.state() != ExecutionState::Completed {
        return Err(KpuError::InvalidProgram("execution stopped before completion".to_string()));
    }

    let stats = executor.statistics();
    println!("completed in {} cycle(s)", stats.total_cycles);
    println!(
        "  dma={} block_mover={} streamer={} compute={} barriers={}",
        stats.dma_operations, stats.block_mover_operations, stats.streamer_operations, stats.compute_operations, stats.barriers_hit,
    );
    println!(
        "  bytes: external={} l3={} l2={}",
        stats.external_bytes_transferred, stats.l3_bytes_transferred, stats.l2_bytes_transferred,
    );
    Ok(())
}

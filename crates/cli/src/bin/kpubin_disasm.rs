//! `kpubin-disasm`: prints the textual disassembly of a `.kpubin` file.

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use kpu_core::isa::{binary, disassemble_program};

#[derive(Parser, Debug)]
#[command(name = "kpubin-disasm", author, version, about = "Disassemble a .kpubin program", long_about = None)]
struct Cli {
    /// Path to a `.kpubin` file.
    path: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    let bytes = match fs::read(&cli.path) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("error: reading {}: {err}", cli.path.display());
            process::exit(1);
        }
    };

    let program = match binary::read_program(&bytes) {
        Ok(program) => program,
        Err(err) => {
            eprintln!("error: {err}");
            process::exit(err.exit_code());
        }
    };

    print!("{}", disassemble_program(&program));
}

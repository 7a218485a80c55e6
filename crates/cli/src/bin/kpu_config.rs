//! `kpu-config`: inspect, validate, and convert simulator configuration
//! files.
//!
//! Every subcommand reads JSON through `kpu_core::Config`, so a partial
//! file (only the fields that differ from default) is accepted everywhere
//! a full one is.

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use kpu_core::Config;

#[derive(Parser, Debug)]
#[command(name = "kpu-config", author, version, about = "Inspect and validate KPU simulator configuration files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse a config file and report whether it is well-formed.
    Validate {
        /// Path to a JSON config file.
        path: PathBuf,
    },
    /// Parse a (possibly partial) config file and print it fully expanded.
    Convert {
        /// Path to a JSON config file.
        path: PathBuf,
    },
    /// Print a config file's effective settings, defaults included.
    Show {
        /// Path to a JSON config file.
        path: PathBuf,
    },
    /// Print `Config::default()` as JSON, suitable as a starting template.
    Generate,
    /// Print a single dotted field path's value, e.g. `memory.bank_count`.
    Get {
        /// Path to a JSON config file.
        path: PathBuf,
        /// Dotted field path.
        field: String,
    },
    /// Print the fields that differ between two config files.
    Diff {
        /// First config file.
        left: PathBuf,
        /// Second config file.
        right: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(message) = run(cli.command) {
        eprintln!("error: {message}");
        process::exit(1);
    }
}

fn read_config(path: &PathBuf) -> Result<Config, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("reading {}: {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("parsing {}: {e}", path.display()))
}

fn run(command: Commands) -> Result<(), String> {
    match command {
        Commands::Validate { path } => {
            read_config(&path)?;
            println!("{} is valid", path.display());
            Ok(())
        }
        Commands::Convert { path } | Commands::Show { path } => {
            let config = read_config(&path)?;
            let json = serde_json::to_string_pretty(&config).map_err(|e| e.to_string())?;
            println!("{json}");
            Ok(())
        }
        Commands::Generate => {
            let json = serde_json::to_string_pretty(&Config::default()).map_err(|e| e.to_string())?;
            println!("{json}");
            Ok(())
        }
        Commands::Get { path, field } => {
            let config = read_config(&path)?;
            let value = serde_json::to_value(&config).map_err(|e| e.to_string())?;
            let found = lookup(&value, &field).ok_or_else(|| format!("no such field: {field}"))?;
            println!("{found}");
            Ok(())
        }
        Commands::Diff { left, right } => {
            let left_config = read_config(&left)?;
            let right_config = read_config(&right)?;
            let left_value = serde_json::to_value(&left_config).map_err(|e| e.to_string())?;
            let right_value = serde_json::to_value(&right_config).map_err(|e| e.to_string())?;
            let mut differences = Vec::new();
            collect_diffs(&left_value, &right_value, String::new(), &mut differences);
            if differences.is_empty() {
                println!("no differences");
            } else {
                for (field, left_val, right_val) in differences {
                    println!("{field}: {left_val} -> {right_val}");
                }
            }
            Ok(())
        }
    }
}

fn lookup<'a>(value: &'a serde_json::Value, field: &str) -> Option<&'a serde_json::Value> {
    field.split('.').try_fold(value, |node, key| node.get(key))
}

fn collect_diffs(left: &serde_json::Value, right: &serde_json::Value, prefix: String, out: &mut Vec<(String, serde_json::Value, serde_json::Value)>) {
    match (left, right) {
        (serde_json::Value::Object(left_map), serde_json::Value::Object(right_map)) => {
            for key in left_map.keys() {
                let path = if prefix.is_empty() { key.clone() } else { format!("{prefix}.{key}") };
                match right_map.get(key) {
                    Some(right_val) => collect_diffs(&left_map[key], right_val, path, out),
                    None => out.push((path, left_map[key].clone(), serde_json::Value::Null)),
                }
            }
        }
        _ if left != right => out.push((prefix, left.clone(), right.clone())),
        _ => {}
    }
}

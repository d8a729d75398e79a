use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::output::OutputFormat;

/// Inspect, query and trial-load ELF kernel images.
#[derive(Parser, Debug)]
#[command(name = "bootelf-dump", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output format for all subcommands.
    #[arg(long, value_enum, default_value = "human", global = true)]
    pub output: OutputFormat,

    /// Print informational loader messages to stderr.
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show header, segment and section information.
    Info(ImageArg),

    /// Resolve symbol names to addresses.
    Lookup(LookupArgs),

    /// Load the image into a scratch buffer and report the result.
    Load(LoadArgs),
}

#[derive(Args, Debug)]
pub struct ImageArg {
    /// ELF image to read.
    pub image: PathBuf,
}

#[derive(Args, Debug)]
pub struct LookupArgs {
    /// ELF image to read.
    pub image: PathBuf,

    /// Symbol names to resolve.
    #[arg(required = true)]
    pub symbols: Vec<String>,
}

#[derive(Args, Debug)]
pub struct LoadArgs {
    /// ELF image to read.
    pub image: PathBuf,

    /// Destination address at which `pstart` is mapped.
    #[arg(long, value_parser = parse_addr, default_value = "0")]
    pub dest_base: u64,

    /// Append the debug symbol tables after the loaded segments.
    #[arg(long)]
    pub bsd_syms: bool,

    /// Write the loaded memory image to this file.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

/// Parse an address given in hex (`0x` prefix) or decimal.
pub fn parse_addr(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => s.replace('_', "").parse(),
    };
    parsed.map_err(|e| format!("invalid address '{s}': {e}"))
}

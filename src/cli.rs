//! CLI argument parsing

use clap::{Parser, Subcommand};
use scpflash_core::layout::PARTITIONS;
use scpflash_lib::DEFAULT_DEVICE_PATH;
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Render the built-in partition table
pub fn partition_table() -> String {
    let rule = "-----------+----------+----------+-----------------------------------";
    let mut out = format!(
        "{}\n Partition | Offset   | Size     | Description\n{}\n",
        rule, rule
    );
    for p in PARTITIONS {
        out.push_str(&format!(
            " {:<9} | 0x{:06x} | 0x{:06x} | {}\n",
            p.name, p.offset, p.size, p.description
        ));
    }
    out.push_str(rule);
    out
}

fn after_help() -> String {
    format!(
        "Offsets and sizes are rounded up to a 32-byte boundary.\n\n\
         Available built-in partitions:\n{}",
        partition_table()
    )
}

#[derive(Parser)]
#[command(name = "scpflash")]
#[command(author, version, about = "SCP boot flash utility", long_about = None)]
#[command(after_help = after_help())]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only print errors and confirmation prompts
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Flash device node
    #[arg(long, global = true, default_value = DEFAULT_DEVICE_PATH)]
    pub device: PathBuf,

    /// Use an in-process emulated flash instead of the device node
    #[arg(long, global = true)]
    pub emulate: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flash region options shared across commands
#[derive(clap::Args, Debug, Clone, Default)]
pub struct RegionArgs {
    /// Flash offset (hex or decimal)
    #[arg(short, long, value_parser = parse_hex_u32)]
    pub offset: Option<u32>,

    /// Size in bytes (hex or decimal)
    #[arg(short, long, value_parser = parse_hex_u32)]
    pub size: Option<u32>,

    /// Use the offset and size of a built-in partition
    #[arg(short, long)]
    pub part: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read flash contents to file
    Read {
        /// Output file path
        file: PathBuf,

        #[command(flatten)]
        region: RegionArgs,
    },

    /// Write file to flash (erase, write, verify)
    Write {
        /// Input file path
        file: PathBuf,

        #[command(flatten)]
        region: RegionArgs,

        /// Bytes to skip at the start of the input file (hex or decimal)
        #[arg(short = 'k', long, value_parser = parse_hex_u32, default_value = "0")]
        skip: u32,

        /// Don't read back and compare after writing
        #[arg(short, long)]
        no_verify: bool,

        /// Don't ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Erase flash contents
    Erase {
        #[command(flatten)]
        region: RegionArgs,

        /// Don't ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Show tool, library and driver versions
    Version,

    /// List built-in partitions
    Partitions,
}

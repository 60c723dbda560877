//! CLI argument definitions for extmem

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use extmem::PointerWidth;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "extmem")]
#[command(about = "Materialize foreign structures from memory dumps", long_about = None)]
pub struct Cli {
    /// Log debug output to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read one structure and print its fields
    #[command(visible_alias = "r")]
    Read {
        #[command(flatten)]
        target: Target,
    },

    /// Read a dynamic array (data pointer, count, capacity) of structures
    #[command(visible_alias = "a")]
    Array {
        #[command(flatten)]
        target: Target,

        /// Elements are stored inline instead of behind pointers
        #[arg(long)]
        inline: bool,

        /// Use the capacity field as the element count
        #[arg(long)]
        use_capacity: bool,

        /// Refuse counts above this bound
        #[arg(long)]
        max_carry: Option<usize>,

        /// Bytes after every element in the data block
        #[arg(long)]
        padding: Option<usize>,

        /// Print at most this many elements
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Show sizes and resolution order of every structure in a layout file
    #[command(visible_alias = "l")]
    Layout {
        /// Layout file (TOML)
        layout: PathBuf,

        /// Pointer width (32 or 64)
        #[arg(short, long)]
        width: Option<PointerWidth>,
    },

    /// Configure default settings
    #[command(visible_alias = "c")]
    Configure {
        /// Maximum characters decoded from text fields
        #[arg(long)]
        max_text_len: Option<usize>,

        /// Default pointer width (32 or 64)
        #[arg(long)]
        width: Option<PointerWidth>,

        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

/// Where and what to read
#[derive(Args, Debug)]
pub struct Target {
    /// Memory dump (minidump, or raw with an optional .maps sidecar)
    pub dump: PathBuf,

    /// Layout file (TOML)
    #[arg(short, long)]
    pub layout: PathBuf,

    /// Structure name from the layout file
    #[arg(short = 't', long = "type")]
    pub type_name: String,

    /// Base address (hex with 0x prefix, or decimal)
    #[arg(short, long, value_parser = parse_address)]
    pub address: u64,

    /// Maps file describing the dump's regions
    #[arg(long)]
    pub maps: Option<PathBuf>,

    /// Pointer width (32 or 64)
    #[arg(short, long)]
    pub width: Option<PointerWidth>,

    /// Print JSON instead of a field tree
    #[arg(long)]
    pub json: bool,
}

/// Parse a hex or decimal address string
pub fn parse_address(address: &str) -> Result<u64> {
    match address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16).context("Invalid hex address"),
        None => address.parse::<u64>().context("Invalid address"),
    }
}

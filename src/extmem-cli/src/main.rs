mod cli;
mod commands;
mod config;
mod layout_file;
mod render;

use anyhow::Result;
use clap::Parser;
use config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load()?;
    config.apply();

    match cli.command {
        Commands::Read { target } => {
            commands::read::handle(&target, &config)?;
        }

        Commands::Array {
            target,
            inline,
            use_capacity,
            max_carry,
            padding,
            limit,
        } => {
            let overrides = commands::array::Overrides {
                inline,
                use_capacity,
                max_carry,
                padding,
            };
            commands::array::handle(&target, overrides, limit, &config)?;
        }

        Commands::Layout { layout, width } => {
            commands::layout::handle(&layout, config.pointer_width(width))?;
        }

        Commands::Configure {
            max_text_len,
            width,
            show,
        } => {
            commands::configure::handle(max_text_len, width, show)?;
        }
    }

    Ok(())
}

/// Log to stderr, filtered by RUST_LOG when set
fn init_tracing(verbose: bool) {
    // The binary and the library share the `extmem` target prefix
    let default = if verbose { "extmem=debug" } else { "extmem=warn" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

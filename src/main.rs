//! atfprog - ATF22V10 fuse programmer
//!
//! Programs a JEDEC fuse map into an ATF22V10 through a GPIO adapter.
//!
//! # Architecture
//!
//! - `atfprog-core` parses the fuse map and runs the programming sequence
//!   over any `GpioMaster`
//! - backend crates provide `GpioMaster` (Linux GPIO character device, an
//!   in-memory emulator)
//! - this binary picks a backend, asks for confirmation and reports progress

mod cli;
mod commands;
mod programmers;

use clap::Parser;
use cli::Cli;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logger, RUST_LOG overrides the verbosity flags
    let default_filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if cli.list_programmers {
        programmers::list_programmers();
        return Ok(());
    }

    let Some(input) = cli.input else {
        return Err("No input file given".into());
    };

    commands::install_interrupt_handler()?;

    // Errors carry multi-line hints, print them with Display
    if let Err(e) = commands::run_program(&input, &cli.programmer, cli.config.as_deref(), cli.yes)
    {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

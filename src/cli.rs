//! CLI argument parsing

use crate::programmers;
use clap::Parser;
use std::path::PathBuf;

/// Generate dynamic help text for the programmer argument
fn programmer_help() -> String {
    format!(
        "Programmer to use, with optional name:key=value,... options [available: {}]",
        programmers::programmer_names_short()
    )
}

#[derive(Parser)]
#[command(name = "atfprog")]
#[command(author, version, about = "ATF22V10 fuse programmer", long_about = None)]
pub struct Cli {
    /// JEDEC fuse map to program
    #[arg(required_unless_present = "list_programmers")]
    pub input: Option<PathBuf>,

    #[arg(short, long, default_value = "linux_gpio", help = programmer_help())]
    pub programmer: String,

    /// Wiring and timing configuration file (TOML format)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Don't wait for confirmation before programming
    #[arg(short, long)]
    pub yes: bool,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// List available programmers and exit
    #[arg(long)]
    pub list_programmers: bool,
}

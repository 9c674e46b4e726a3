//! Programmer registration and dispatch
//!
//! This module provides a centralized registry for all programmers, with support
//! for feature-gated inclusion and dynamic help text generation.

use atfprog_core::pins::PinMap;
use atfprog_core::programmer::GpioMaster;

/// Information about a programmer
pub struct ProgrammerInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// An opened programmer backend and the wiring it was opened with
pub type OpenedProgrammer = (Box<dyn GpioMaster + Send>, PinMap);

/// Get information about all available programmers (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_programmers() -> Vec<ProgrammerInfo> {
    let mut programmers = Vec::new();

    #[cfg(feature = "dummy")]
    programmers.push(ProgrammerInfo {
        name: "dummy",
        aliases: &[],
        description: "In-memory ATF22V10 emulator for testing",
    });

    #[cfg(feature = "linux-gpio")]
    programmers.push(ProgrammerInfo {
        name: "linux_gpio",
        aliases: &["linux-gpio", "gpio"],
        description: "Linux GPIO character device (dev=/dev/gpiochipN or gpiochip=N, <role>=<line>)",
    });

    programmers
}

/// Generate help text listing all available programmers
pub fn programmer_help() -> String {
    let programmers = available_programmers();

    if programmers.is_empty() {
        return "No programmers available (recompile with programmer features enabled)".to_string();
    }

    let mut help = String::from("Available programmers:\n");

    for p in &programmers {
        help.push_str(&format!("  {:12} - {}\n", p.name, p.description));
        if !p.aliases.is_empty() {
            help.push_str(&format!("  {:12}   aliases: {}\n", "", p.aliases.join(", ")));
        }
    }

    help
}

/// Print all available programmers
pub fn list_programmers() {
    print!("{}", programmer_help());
    println!();
    println!("Role options: program, write, erase, olmc, clock, data_in, data_out, strobe");
}

/// Generate a short list of programmer names for CLI help
pub fn programmer_names_short() -> String {
    let programmers = available_programmers();
    let names: Vec<&str> = programmers.iter().map(|p| p.name).collect();
    names.join(", ")
}

/// Resolve a programmer name or alias to its primary name
pub fn find_programmer(name: &str) -> Option<&'static str> {
    available_programmers()
        .into_iter()
        .find(|p| p.name == name || p.aliases.contains(&name))
        .map(|p| p.name)
}

/// Open the programmer described by `programmer`
///
/// The programmer string can be just the name (e.g., "linux_gpio") or include
/// parameters (e.g., "linux_gpio:gpiochip=1,clock=4"). `pins` is the base
/// wiring; backends apply their role options on top of it.
#[allow(unused_variables)]
pub fn open_programmer(
    programmer: &str,
    pins: PinMap,
) -> Result<OpenedProgrammer, Box<dyn std::error::Error>> {
    let (name, options) = parse_programmer_string(programmer);

    let canonical_name = match find_programmer(name) {
        Some(n) => n,
        None => {
            return Err(unknown_programmer_error(name));
        }
    };

    match canonical_name {
        #[cfg(feature = "dummy")]
        "dummy" => {
            log::info!("Using dummy ATF22V10 emulator");
            atfprog_dummy::open_dummy(&options, pins)
        }

        #[cfg(feature = "linux-gpio")]
        "linux_gpio" => {
            log::info!("Opening Linux GPIO programmer...");
            atfprog_linux_gpio::open_linux_gpio(&options, pins).map_err(|e| {
                format!(
                    "Failed to open Linux GPIO programmer: {}\n\
                     Make sure the GPIO chip exists and you have read/write permissions.\n\
                     You may need to: sudo usermod -aG gpio $USER",
                    e
                )
                .into()
            })
        }

        _ => Err(unknown_programmer_error(name)),
    }
}

/// Parse a programmer string into name and options
///
/// Format: "name" or "name:option1=value1,option2=value2"
pub fn parse_programmer_string(s: &str) -> (&str, Vec<(&str, &str)>) {
    if let Some((name, opts)) = s.split_once(':') {
        let options: Vec<_> = opts
            .split(',')
            .filter_map(|opt| opt.split_once('='))
            .collect();
        (name, options)
    } else {
        (s, Vec::new())
    }
}

fn unknown_programmer_error(name: &str) -> Box<dyn std::error::Error> {
    let mut msg = format!("Unknown programmer: {}\n\n", name);
    msg.push_str(&programmer_help());
    msg.push_str("\nUse 'atfprog --list-programmers' for more details");
    msg.into()
}

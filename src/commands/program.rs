//! Program command implementation
//!
//! Loads the fuse map, opens the programmer, waits for confirmation and runs
//! the programming sequence with a progress bar.

use atfprog_core::config::Config;
use atfprog_core::{jedec, Atf22v10Programmer, ProgramProgress};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use crate::programmers;

/// Nothing has touched the device yet; an interrupt is a clean abort
const PHASE_IDLE: u8 = 0;
/// The programming sequence is running; an interrupt leaves the device undefined
const PHASE_PROGRAMMING: u8 = 1;

static PHASE: AtomicU8 = AtomicU8::new(PHASE_IDLE);

/// Exit status after an interrupt during programming (128 + SIGINT)
const EXIT_INTERRUPTED: i32 = 130;

/// Install the Ctrl-C handler
///
/// Before programming starts, Ctrl-C prints "Aborted." and exits cleanly.
/// Once the sequence is running the device can't be left in a known state,
/// so the user is told to power-cycle it.
pub fn install_interrupt_handler() -> Result<(), Box<dyn std::error::Error>> {
    ctrlc::set_handler(|| {
        if PHASE.load(Ordering::SeqCst) == PHASE_PROGRAMMING {
            eprintln!();
            eprintln!("Interrupted while programming.");
            eprintln!("The device is in an undefined state; power-cycle it before retrying.");
            std::process::exit(EXIT_INTERRUPTED);
        }
        println!();
        println!("Aborted.");
        std::process::exit(0);
    })?;
    Ok(())
}

// =============================================================================
// Progress reporting
// =============================================================================

/// Create the row progress bar
fn create_progress_bar(total: u64) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} rows ({eta}) {msg}")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Create a standard spinner style
fn create_spinner_style() -> Result<ProgressStyle, Box<dyn std::error::Error>> {
    Ok(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?)
}

/// Progress reporter using indicatif progress bars
pub struct IndicatifProgress {
    current_bar: Option<ProgressBar>,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        Self { current_bar: None }
    }

    fn create_spinner(&mut self, message: &str) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(create_spinner_style().unwrap_or_else(|_| ProgressStyle::default_spinner()));
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        self.current_bar = Some(pb);
    }

    fn finish(&mut self, message: &str) {
        if let Some(pb) = self.current_bar.take() {
            pb.finish_with_message(message.to_string());
        }
    }

    /// Stop the current bar where it is
    pub fn abandon(&mut self) {
        if let Some(pb) = self.current_bar.take() {
            pb.abandon_with_message("failed");
        }
    }
}

impl Default for IndicatifProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramProgress for IndicatifProgress {
    fn erasing(&mut self) {
        self.create_spinner("Erasing...");
    }

    fn writing_matrix(&mut self, total_rows: usize) {
        self.finish("Erase complete");
        let pb = create_progress_bar(total_rows as u64)
            .unwrap_or_else(|_| ProgressBar::new(total_rows as u64));
        pb.set_message("Writing");
        self.current_bar = Some(pb);
    }

    fn row_written(&mut self, rows_done: usize) {
        if let Some(pb) = &self.current_bar {
            pb.set_position(rows_done as u64);
        }
    }

    fn writing_olmc(&mut self) {
        self.finish("Matrix written");
        self.create_spinner("Writing OLMC configuration...");
    }

    fn complete(&mut self) {
        self.finish("OLMC configuration written");
    }
}

// =============================================================================
// Program
// =============================================================================

/// Wait for Enter; false if stdin is closed
fn confirm() -> io::Result<bool> {
    print!("Press Enter to write image, or Ctrl-C to abort.");
    io::stdout().flush()?;
    let mut line = String::new();
    let read = io::stdin().lock().read_line(&mut line)?;
    Ok(read > 0)
}

/// Program a JEDEC file into the device
pub fn run_program(
    input: &Path,
    programmer: &str,
    config: Option<&Path>,
    yes: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    // Everything that can fail on bad input happens before a line is touched
    let map = jedec::parse(input)?;
    log::info!("{} fuses set", map.fuse_count());

    let config = match config {
        Some(path) => Config::from_toml_file(path)?,
        None => Config::default(),
    };

    let (gpio, pins) = programmers::open_programmer(programmer, config.pins)?;
    let mut device = Atf22v10Programmer::new(gpio, pins, config.timing)?;
    device.setup_lines()?;

    if !yes && !confirm()? {
        println!();
        println!("Aborted.");
        return Ok(());
    }

    let rows = map.matrix.rows();
    log::debug!(
        "Programming will wait at least {} ms",
        config.timing.total_wait(rows.len()).as_millis()
    );

    let mut progress = IndicatifProgress::new();
    PHASE.store(PHASE_PROGRAMMING, Ordering::SeqCst);
    let result = device.program_with_progress(rows, &map.olmc, &mut progress);
    PHASE.store(PHASE_IDLE, Ordering::SeqCst);

    if let Err(e) = result {
        progress.abandon();
        return Err(format!(
            "Programming failed: {}\n\
             The device is in an undefined state; power-cycle it before retrying.",
            e
        )
        .into());
    }

    println!("Complete.");
    Ok(())
}

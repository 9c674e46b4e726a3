//! atfprog-linux-gpio - Linux GPIO backend for atfprog
//!
//! This crate drives the ATF22V10 programming adapter from the Linux
//! character device GPIO interface (gpiocdev).
//!
//! The implementation uses the gpiocdev crate which provides a pure Rust
//! implementation of the GPIO character device interface, which is the modern
//! way to access GPIO on Linux, replacing the deprecated sysfs interface.
//!
//! # Example
//!
//! ```no_run
//! use atfprog_core::{Atf22v10Programmer, FuseMap, PinMap, Timing};
//! use atfprog_linux_gpio::{LinuxGpio, LinuxGpioConfig};
//!
//! let map = atfprog_core::jedec::parse("design.jed")?;
//! let gpio = LinuxGpio::open(&LinuxGpioConfig::new("/dev/gpiochip0", PinMap::default()))?;
//!
//! let mut programmer = Atf22v10Programmer::new(gpio, PinMap::default(), Timing::default())?;
//! programmer.setup_lines()?;
//! programmer.program_fuse_map(&map)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Usage with atfprog CLI
//!
//! ```bash
//! # Stock Raspberry Pi adapter on /dev/gpiochip0
//! atfprog design.jed
//!
//! # Different chip and clock line
//! atfprog -p linux_gpio:gpiochip=1,clock=4 design.jed
//! ```
//!
//! # GPIO Pin Wiring
//!
//! Default assignment (BCM numbering on a Raspberry Pi):
//!
//! | Role        | Line | Direction |
//! |-------------|------|-----------|
//! | PROGRAM     | 14   | output (switches +12V) |
//! | WRITE       | 15   | output |
//! | ERASE       | 23   | output |
//! | ACCESS_OLMC | 18   | output |
//! | CLOCK       | 24   | output |
//! | DATA_IN     | 15   | output (shared with WRITE) |
//! | DATA_OUT    | 7    | input |
//! | STROBE      | 8    | output |
//!
//! # System Requirements
//!
//! - Linux kernel 4.8+ with GPIO character device support (kernel 5.5+ for v2 API)
//! - Access to `/dev/gpiochipN` devices (may require root or udev rules)

pub mod device;
pub mod error;

// Re-exports
pub use device::{parse_options, LinuxGpio, LinuxGpioConfig, DEFAULT_DEVICE};
pub use error::{LinuxGpioError, Result};

use atfprog_core::pins::PinMap;
use atfprog_core::programmer::GpioMaster;

/// Open a Linux GPIO programmer and return a boxed GpioMaster
///
/// This is a convenience function for use in the CLI programmer dispatch.
/// `pins` is the wiring from the configuration file; role options override
/// it. The final wiring is returned alongside the backend.
///
/// # Arguments
///
/// * `options` - Slice of (key, value) pairs from programmer string parsing
/// * `pins` - Base role assignment
pub fn open_linux_gpio(
    options: &[(&str, &str)],
    pins: PinMap,
) -> std::result::Result<(Box<dyn GpioMaster + Send>, PinMap), Box<dyn std::error::Error>> {
    let config = parse_options(options, pins)?;
    let gpio = LinuxGpio::open(&config)?;
    Ok((Box::new(gpio), config.pins))
}

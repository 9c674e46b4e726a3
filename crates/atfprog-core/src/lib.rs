//! atfprog-core - Core library for ATF22V10 fuse programming
//!
//! This crate loads JEDEC fuse maps and drives the ATF22V10 bit-serial
//! programming protocol over a set of GPIO lines. It is designed to be
//! `no_std` compatible so the sequence can run from a microcontroller as
//! well as from a Linux host.
//!
//! # Features
//!
//! - `std` - Enable standard library support: JEDEC file loading and TOML
//!   configuration files
//!
//! # Example
//!
//! ```ignore
//! use atfprog_core::{FuseMap, PinMap, Timing, Atf22v10Programmer, programmer::GpioMaster};
//!
//! fn burn<G: GpioMaster>(gpio: G, jedec: &str) -> atfprog_core::Result<()> {
//!     let map = FuseMap::from_jedec_str(jedec)?;
//!     let mut programmer = Atf22v10Programmer::new(gpio, PinMap::default(), Timing::default())?;
//!     programmer.setup_lines()?;
//!     programmer.program_fuse_map(&map)
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(any(feature = "std", test))]
extern crate std;

#[cfg(feature = "std")]
pub mod config;
pub mod error;
pub mod fuses;
pub mod jedec;
pub mod pins;
pub mod programmer;
pub mod protocol;
pub mod timing;

pub use error::{Error, FormatError, FormatErrorKind, Result};
pub use fuses::{FuseArray, FuseMap, LogicMatrix, MatrixRow, OlmcConfig};
pub use pins::{Pin, PinMap, Role, Roles};
pub use protocol::{Atf22v10Programmer, NoProgress, ProgramProgress, ProgramState};
pub use timing::Timing;

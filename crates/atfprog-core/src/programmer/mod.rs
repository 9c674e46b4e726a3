//! Programmer traits and abstractions
//!
//! This module defines the trait every programmer backend implements to
//! give the protocol code access to the device's control lines.

mod traits;

pub use traits::*;

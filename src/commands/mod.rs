//! Command implementations

pub mod program;

pub use program::{install_interrupt_handler, run_program};

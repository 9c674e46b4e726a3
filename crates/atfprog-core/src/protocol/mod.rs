//! Protocol implementations
//!
//! This module contains the device programming sequences and the progress
//! reporting hooks they call into.

mod atf22v10;

pub use atf22v10::*;

/// Callback for progress reporting during a programming run
pub trait ProgramProgress {
    /// Called before the device is erased
    fn erasing(&mut self);

    /// Called before the first matrix row is shifted in
    fn writing_matrix(&mut self, total_rows: usize);

    /// Called after each matrix row is committed
    fn row_written(&mut self, rows_done: usize);

    /// Called before the OLMC configuration is shifted in
    fn writing_olmc(&mut self);

    /// Called once the device has left programming mode
    fn complete(&mut self);
}

/// A no-op progress reporter
pub struct NoProgress;

impl ProgramProgress for NoProgress {
    fn erasing(&mut self) {}
    fn writing_matrix(&mut self, _total_rows: usize) {}
    fn row_written(&mut self, _rows_done: usize) {}
    fn writing_olmc(&mut self) {}
    fn complete(&mut self) {}
}

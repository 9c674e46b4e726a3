//! ATF22V10 fuse layout
//!
//! A JEDEC file addresses the device as one flat array of fuses. The
//! programming protocol never sees that array directly: it shifts the AND
//! matrix in row by row, and the output macrocell (OLMC) configuration as one
//! separate 20-bit word. This module holds the flat array and the two
//! projections of it.
//!
//! The flat array is column-major with respect to the matrix: fuse `c * 44 + r`
//! is row `r`, column `c`. The OLMC bits follow the matrix at index 5808, two
//! per output port, and are transmitted high bit first within each port.

use core::fmt::{self, Write};

use crate::error::FormatErrorKind;

/// Number of addressable matrix rows
pub const MATRIX_ROWS: usize = 44;

/// Number of fuses in one matrix row (one per input line)
pub const MATRIX_COLUMNS: usize = 132;

/// Size of the flat fuse array
pub const FUSE_COUNT: usize = 132 * 64;

/// Flat index of the first OLMC configuration fuse
pub const OLMC_BASE: usize = 5808;

/// Number of output ports with an OLMC
pub const OLMC_PORTS: usize = 10;

/// Number of OLMC configuration bits transmitted to the device
pub const OLMC_BITS: usize = 2 * OLMC_PORTS;

/// Interpret a fuse character: `'0'` is an intact fuse, anything else is set
#[inline]
pub fn fuse_from_char(c: char) -> bool {
    c != '0'
}

fn write_bits(f: &mut fmt::Formatter<'_>, bits: &[bool]) -> fmt::Result {
    for &bit in bits {
        f.write_char(if bit { '1' } else { '0' })?;
    }
    Ok(())
}

fn bits_from_str<const N: usize>(s: &str) -> Option<[bool; N]> {
    let mut bits = [false; N];
    let mut count = 0;
    for c in s.chars() {
        if count == N {
            return None;
        }
        bits[count] = fuse_from_char(c);
        count += 1;
    }
    (count == N).then_some(bits)
}

/// The flat fuse array, zeroed on creation and patched by fuse records
#[derive(Clone, PartialEq, Eq)]
pub struct FuseArray {
    fuses: [bool; FUSE_COUNT],
}

impl FuseArray {
    /// Create a fuse array with every fuse cleared
    pub const fn new() -> Self {
        Self {
            fuses: [false; FUSE_COUNT],
        }
    }

    /// Overwrite fuses starting at `base` with the characters of `run`
    ///
    /// The record is rejected as a whole, leaving the array untouched, if any
    /// part of it falls outside the array.
    pub fn apply_record(&mut self, base: usize, run: &str) -> Result<(), FormatErrorKind> {
        let len = run.chars().count();
        match base.checked_add(len) {
            Some(end) if end <= FUSE_COUNT => {}
            _ => return Err(FormatErrorKind::OutOfRange { base, len }),
        }

        for (fuse, c) in self.fuses[base..].iter_mut().zip(run.chars()) {
            *fuse = fuse_from_char(c);
        }
        Ok(())
    }

    /// Get a single fuse by flat index
    pub fn get(&self, index: usize) -> Option<bool> {
        self.fuses.get(index).copied()
    }

    /// Number of set fuses
    pub fn count_set(&self) -> usize {
        self.fuses.iter().filter(|&&f| f).count()
    }

    /// Project the array onto the logic matrix, in transmission order
    pub fn logic_matrix(&self) -> LogicMatrix {
        let mut rows = [MatrixRow::zeroed(); MATRIX_ROWS];
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, fuse) in row.0.iter_mut().enumerate() {
                *fuse = self.fuses[c * MATRIX_ROWS + r];
            }
        }
        LogicMatrix { rows }
    }

    /// Project the array onto the OLMC configuration word, in transmission order
    pub fn olmc_config(&self) -> OlmcConfig {
        let mut bits = [false; OLMC_BITS];
        for port in 0..OLMC_PORTS {
            let base = OLMC_BASE + 2 * port;
            bits[2 * port] = self.fuses[base + 1];
            bits[2 * port + 1] = self.fuses[base];
        }
        OlmcConfig(bits)
    }
}

impl Default for FuseArray {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FuseArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuseArray")
            .field("len", &FUSE_COUNT)
            .field("set", &self.count_set())
            .finish()
    }
}

/// One row of the AND matrix, 132 fuses in transmission order
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct MatrixRow(pub [bool; MATRIX_COLUMNS]);

impl MatrixRow {
    /// A row with every fuse cleared
    pub const fn zeroed() -> Self {
        Self([false; MATRIX_COLUMNS])
    }

    /// Build a row from a string of 132 fuse characters
    pub fn from_bits_str(s: &str) -> Option<Self> {
        bits_from_str(s).map(Self)
    }

    /// Fuses in transmission order
    pub fn bits(&self) -> &[bool; MATRIX_COLUMNS] {
        &self.0
    }
}

impl Default for MatrixRow {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl fmt::Display for MatrixRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_bits(f, &self.0)
    }
}

impl fmt::Debug for MatrixRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MatrixRow({})", self)
    }
}

/// The full AND matrix, rows in transmission order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicMatrix {
    rows: [MatrixRow; MATRIX_ROWS],
}

impl LogicMatrix {
    /// All rows, row 0 first
    pub fn rows(&self) -> &[MatrixRow] {
        &self.rows
    }

    /// A single row by address
    pub fn row(&self, index: usize) -> Option<&MatrixRow> {
        self.rows.get(index)
    }
}

/// The OLMC configuration word, 20 bits in transmission order
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct OlmcConfig(pub [bool; OLMC_BITS]);

impl OlmcConfig {
    /// Build the word from a string of 20 fuse characters
    pub fn from_bits_str(s: &str) -> Option<Self> {
        bits_from_str(s).map(Self)
    }

    /// Bits in transmission order
    pub fn bits(&self) -> &[bool; OLMC_BITS] {
        &self.0
    }
}

impl fmt::Display for OlmcConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_bits(f, &self.0)
    }
}

impl fmt::Debug for OlmcConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OlmcConfig({})", self)
    }
}

/// A parsed fuse map, ready to be programmed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuseMap {
    /// AND matrix rows
    pub matrix: LogicMatrix,
    /// OLMC configuration word
    pub olmc: OlmcConfig,
}

impl FuseMap {
    /// Project a flat fuse array into its programmable form
    pub fn from_fuse_array(fuses: &FuseArray) -> Self {
        Self {
            matrix: fuses.logic_matrix(),
            olmc: fuses.olmc_config(),
        }
    }

    /// Number of set fuses that will be programmed
    pub fn fuse_count(&self) -> usize {
        let matrix = self
            .matrix
            .rows()
            .iter()
            .map(|row| row.0.iter().filter(|&&f| f).count())
            .sum::<usize>();
        matrix + self.olmc.0.iter().filter(|&&f| f).count()
    }
}

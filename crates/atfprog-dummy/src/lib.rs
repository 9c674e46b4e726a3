//! atfprog-dummy - In-memory ATF22V10 emulator for testing
//!
//! This crate provides a dummy programmer that emulates an ATF22V10 on the
//! other end of the GPIO lines. It decodes the shifted data back into fuse
//! rows and OLMC bits, and records every line operation, which makes it
//! useful for testing and development without real hardware.
//!
//! Delays are recorded, never slept.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::time::Duration;

use atfprog_core::error::{Error, Result};
use atfprog_core::fuses::{MatrixRow, OlmcConfig, MATRIX_COLUMNS, MATRIX_ROWS, OLMC_BITS};
use atfprog_core::pins::{Pin, PinMap, Role, Roles};
use atfprog_core::programmer::{Direction, GpioMaster};
use atfprog_core::protocol::{POWER_DOWN_ROW, ROW_ADDRESS_BITS};

/// Bits shifted in for one row write: fuse data followed by the address
const ROW_WORD_BITS: usize = MATRIX_COLUMNS + ROW_ADDRESS_BITS as usize;

/// One recorded line operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// `set_direction`
    Direction(Pin, Direction),
    /// `write_pin`
    Write(Pin, bool),
    /// `read_pin`
    Read(Pin),
    /// `delay`
    Delay(Duration),
}

#[derive(Debug, Clone, Copy)]
struct Line {
    direction: Direction,
    high: bool,
}

/// Dummy ATF22V10 programmer
///
/// Tracks line levels and emulates the device's programming logic:
///
/// - CLOCK rising edge in programming mode shifts the DATA_IN level in
/// - STROBE rising edge with PROGRAM and WRITE high commits the shifted word:
///   a bulk erase if ERASE is high, the OLMC word if ACCESS_OLMC is high, a
///   matrix row otherwise
///
/// When WRITE shares its line with DATA_IN, the line can't tell the two apart
/// and write mode counts as enabled for the whole time PROGRAM is high.
pub struct DummyAtf22v10 {
    pins: PinMap,
    lines: BTreeMap<Pin, Line>,
    events: Vec<Event>,
    total_delay: Duration,
    shift: Vec<bool>,
    matrix: [Option<MatrixRow>; MATRIX_ROWS],
    olmc: Option<OlmcConfig>,
    erase_count: usize,
    power_down_disabled: bool,
    data_out: bool,
}

impl DummyAtf22v10 {
    /// Create an emulator wired according to `pins`
    ///
    /// Every line starts as a low input until configured.
    pub fn new(pins: PinMap) -> Self {
        let lines = pins
            .lines()
            .map(|(pin, _)| {
                (
                    pin,
                    Line {
                        direction: Direction::Input,
                        high: false,
                    },
                )
            })
            .collect();

        Self {
            pins,
            lines,
            events: Vec::new(),
            total_delay: Duration::ZERO,
            shift: Vec::new(),
            matrix: [None; MATRIX_ROWS],
            olmc: None,
            erase_count: 0,
            power_down_disabled: false,
            data_out: false,
        }
    }

    /// Every line operation so far, in order
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Forget the recorded events
    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Row latched at `address` since the last erase
    pub fn matrix_row(&self, address: usize) -> Option<&MatrixRow> {
        self.matrix.get(address).and_then(Option::as_ref)
    }

    /// Number of matrix rows latched since the last erase
    pub fn rows_written(&self) -> usize {
        self.matrix.iter().filter(|row| row.is_some()).count()
    }

    /// OLMC word latched since the last erase
    pub fn olmc(&self) -> Option<&OlmcConfig> {
        self.olmc.as_ref()
    }

    /// Number of bulk erases
    pub fn erase_count(&self) -> usize {
        self.erase_count
    }

    /// Whether the power-down disable row has been written since the last erase
    pub fn power_down_disabled(&self) -> bool {
        self.power_down_disabled
    }

    /// Sum of all requested delays
    pub fn total_delay(&self) -> Duration {
        self.total_delay
    }

    /// Current level of the line behind `role`
    pub fn level(&self, role: Role) -> bool {
        self.lines
            .get(&self.pins.pin(role))
            .is_some_and(|line| line.high)
    }

    /// Whether PROGRAM is asserted
    pub fn in_programming_mode(&self) -> bool {
        self.level(Role::Program)
    }

    /// Level presented on DATA_OUT
    pub fn set_data_out(&mut self, high: bool) {
        self.data_out = high;
    }

    fn write_enabled(&self) -> bool {
        self.in_programming_mode()
            && (self.pins.shared_line().is_some() || self.level(Role::Write))
    }

    fn clock_rising(&mut self) {
        if self.in_programming_mode() {
            self.shift.push(self.level(Role::DataIn));
        }
    }

    fn strobe_rising(&mut self) {
        if !self.write_enabled() {
            return;
        }

        if self.level(Role::Erase) {
            self.erase();
        } else if self.level(Role::AccessOlmc) {
            self.latch_olmc();
        } else {
            self.latch_row();
        }
        self.shift.clear();
    }

    fn erase(&mut self) {
        log::debug!("dummy: bulk erase");
        self.matrix = [None; MATRIX_ROWS];
        self.olmc = None;
        self.power_down_disabled = false;
        self.erase_count += 1;
    }

    fn latch_olmc(&mut self) {
        if self.shift.len() < OLMC_BITS {
            log::warn!("dummy: OLMC strobe after only {} bits", self.shift.len());
            return;
        }
        let mut olmc = OlmcConfig::default();
        olmc.0.copy_from_slice(&self.shift[self.shift.len() - OLMC_BITS..]);
        log::debug!("dummy: OLMC {}", olmc);
        self.olmc = Some(olmc);
    }

    fn latch_row(&mut self) {
        if self.shift.len() < ROW_WORD_BITS {
            log::warn!("dummy: row strobe after only {} bits", self.shift.len());
            return;
        }
        let word = &self.shift[self.shift.len() - ROW_WORD_BITS..];
        let (data, address_bits) = word.split_at(MATRIX_COLUMNS);
        let address = address_bits
            .iter()
            .fold(0usize, |acc, &bit| (acc << 1) | bit as usize);

        if address == POWER_DOWN_ROW as usize {
            log::debug!("dummy: power-down disabled");
            self.power_down_disabled = true;
        } else if address < MATRIX_ROWS {
            let mut row = MatrixRow::zeroed();
            row.0.copy_from_slice(data);
            log::trace!("dummy: row {} = {}", address, row);
            self.matrix[address] = Some(row);
        } else {
            log::warn!("dummy: row strobe at unused address {}", address);
        }
    }
}

impl GpioMaster for DummyAtf22v10 {
    fn set_direction(&mut self, pin: Pin, direction: Direction) -> Result<()> {
        self.events.push(Event::Direction(pin, direction));
        let line = self
            .lines
            .get_mut(&pin)
            .ok_or(Error::LineConfigFailed { pin })?;
        line.direction = direction;
        line.high = false;
        Ok(())
    }

    fn write_pin(&mut self, pin: Pin, high: bool) -> Result<()> {
        self.events.push(Event::Write(pin, high));
        let line = match self.lines.get_mut(&pin) {
            Some(line) if line.direction == Direction::Output => line,
            _ => return Err(Error::LineWriteFailed { pin }),
        };
        let rising = !line.high && high;
        line.high = high;

        if rising {
            let roles = self.pins.roles_on(pin);
            if roles.contains(Roles::CLOCK) {
                self.clock_rising();
            }
            if roles.contains(Roles::STROBE) {
                self.strobe_rising();
            }
        }
        Ok(())
    }

    fn read_pin(&mut self, pin: Pin) -> Result<bool> {
        self.events.push(Event::Read(pin));
        match self.lines.get(&pin) {
            Some(line) if line.direction == Direction::Input => {
                if pin == self.pins.pin(Role::DataOut) {
                    Ok(self.data_out)
                } else {
                    Ok(line.high)
                }
            }
            _ => Err(Error::LineReadFailed { pin }),
        }
    }

    fn delay(&mut self, duration: Duration) {
        self.events.push(Event::Delay(duration));
        self.total_delay += duration;
    }
}

/// Create a boxed dummy programmer for the CLI programmer dispatch
///
/// The dummy takes no options; any given are ignored with a warning.
#[cfg(feature = "std")]
pub fn open_dummy(
    options: &[(&str, &str)],
    pins: PinMap,
) -> std::result::Result<(Box<dyn GpioMaster + Send>, PinMap), Box<dyn std::error::Error>> {
    for (key, value) in options {
        log::warn!("dummy: Unknown option: {}={}", key, value);
    }
    pins.validate()?;
    Ok((Box::new(DummyAtf22v10::new(pins)), pins))
}

#[cfg(test)]
mod tests {
    use super::*;
    use atfprog_core::{Atf22v10Programmer, ProgramState, Timing};

    fn split_pins() -> PinMap {
        PinMap::default().with_pin(Role::DataIn, 25)
    }

    fn row_with(bits: &[usize]) -> MatrixRow {
        let mut row = MatrixRow::zeroed();
        for &b in bits {
            row.0[b] = true;
        }
        row
    }

    #[test]
    fn test_unconfigured_line_rejects_writes() {
        let mut dummy = DummyAtf22v10::new(PinMap::default());
        assert_eq!(
            dummy.write_pin(24, true),
            Err(Error::LineWriteFailed { pin: 24 })
        );
        assert_eq!(
            dummy.write_pin(99, true),
            Err(Error::LineWriteFailed { pin: 99 })
        );
        assert_eq!(
            dummy.set_direction(99, Direction::Output),
            Err(Error::LineConfigFailed { pin: 99 })
        );
        assert_eq!(dummy.events().len(), 3);
        dummy.clear_events();
        assert!(dummy.events().is_empty());
    }

    #[test]
    fn test_clock_ignored_outside_programming_mode() {
        let mut dummy = DummyAtf22v10::new(split_pins());
        dummy.set_direction(24, Direction::Output).unwrap();
        dummy.write_pin(24, true).unwrap();
        assert!(dummy.shift.is_empty());
    }

    #[test]
    fn test_program_rows() {
        let pins = split_pins();
        let mut programmer =
            Atf22v10Programmer::new(DummyAtf22v10::new(pins), pins, Timing::default()).unwrap();
        let rows = [row_with(&[0, 131]), row_with(&[]), row_with(&[7])];
        let olmc = OlmcConfig::from_bits_str("01000000000000000010").unwrap();

        programmer.program(&rows, &olmc).unwrap();
        assert_eq!(programmer.state(), ProgramState::Idle);

        let dummy = programmer.release();
        assert_eq!(dummy.erase_count(), 1);
        assert_eq!(dummy.rows_written(), 3);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(dummy.matrix_row(i), Some(row));
        }
        assert_eq!(dummy.matrix_row(3), None);
        assert_eq!(dummy.olmc(), Some(&olmc));
        assert!(dummy.power_down_disabled());
        assert!(!dummy.in_programming_mode());
    }

    #[test]
    fn test_shared_write_data_in_line() {
        let pins = PinMap::default();
        let mut programmer =
            Atf22v10Programmer::new(DummyAtf22v10::new(pins), pins, Timing::default()).unwrap();
        let rows = [row_with(&[1, 2, 3]), row_with(&[130])];

        programmer.program(&rows, &OlmcConfig::default()).unwrap();

        let dummy = programmer.release();
        assert_eq!(dummy.matrix_row(0), Some(&rows[0]));
        assert_eq!(dummy.matrix_row(1), Some(&rows[1]));
        assert!(dummy.power_down_disabled());
    }

    #[test]
    fn test_delays_recorded_not_slept() {
        let pins = split_pins();
        let timing = Timing::default();
        let mut programmer =
            Atf22v10Programmer::new(DummyAtf22v10::new(pins), pins, timing).unwrap();
        programmer
            .program(&[MatrixRow::zeroed(); MATRIX_ROWS], &OlmcConfig::default())
            .unwrap();
        assert_eq!(
            programmer.gpio().total_delay(),
            timing.total_wait(MATRIX_ROWS)
        );
    }

    #[test]
    fn test_reprogram_erases_previous_image() {
        let pins = split_pins();
        let mut programmer =
            Atf22v10Programmer::new(DummyAtf22v10::new(pins), pins, Timing::default()).unwrap();
        programmer
            .program(&[row_with(&[5]), row_with(&[6])], &OlmcConfig::default())
            .unwrap();
        programmer
            .program(&[row_with(&[9])], &OlmcConfig::default())
            .unwrap();

        let dummy = programmer.release();
        assert_eq!(dummy.erase_count(), 2);
        assert_eq!(dummy.matrix_row(0), Some(&row_with(&[9])));
        assert_eq!(dummy.matrix_row(1), None);
    }

    #[test]
    fn test_data_out_sampled() {
        let pins = split_pins();
        let mut dummy = DummyAtf22v10::new(pins);
        dummy.set_data_out(true);
        let mut programmer = Atf22v10Programmer::new(dummy, pins, Timing::default()).unwrap();
        programmer.setup_lines().unwrap();
        assert!(programmer.exchange_bit(false).unwrap());
        let events = programmer.gpio().events();
        assert_eq!(events[events.len() - 4], Event::Read(7));
    }
}

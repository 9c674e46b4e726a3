//! ATF22V10 programming sequence
//!
//! The device is programmed through a serial shift register clocked by the
//! host. Data is presented on DATA_IN while CLOCK is low and latched on the
//! rising edge; a low pulse on STROBE then commits the shifted word. The
//! mode lines (PROGRAM, WRITE, ERASE, ACCESS_OLMC) select what a strobe does.
//!
//! A full run is a fixed, linear sequence:
//!
//! 1. Enter programming mode (+12V on PROGRAM)
//! 2. Enable write mode
//! 3. Bulk erase
//! 4. Write each matrix row: 132 fuse bits, then the 6-bit row address
//! 5. Write the 20 OLMC configuration bits
//! 6. Write the power-down disable row at address 59
//! 7. Disable write mode
//! 8. Leave programming mode
//!
//! There is no read-back and no retry. If any line operation fails, the
//! sequence stops where it is and the device is left in an undefined state;
//! it has to be power-cycled before another attempt.

use core::time::Duration;

use super::{NoProgress, ProgramProgress};
use crate::error::{Error, Result};
use crate::fuses::{FuseMap, MatrixRow, OlmcConfig, MATRIX_COLUMNS, MATRIX_ROWS};
use crate::pins::{Pin, PinMap, Role, Roles};
use crate::programmer::{Direction, GpioMaster};
use crate::timing::Timing;

/// Width of a row address, shifted in MSB first
pub const ROW_ADDRESS_BITS: u32 = 6;

/// Row address that disables the device's power-down mode
///
/// Written last with an all-zero row. It is not a matrix row.
pub const POWER_DOWN_ROW: u8 = 59;

/// Position in the programming sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramState {
    /// Not programming
    Idle,
    /// PROGRAM asserted
    ProgrammingModeEntered,
    /// WRITE asserted
    WriteModeEnabled,
    /// Bulk erase done
    Erased,
    /// All matrix rows committed
    MatrixWritten,
    /// OLMC configuration committed
    OlmcWritten,
    /// Power-down disable row committed
    PowerDownRowWritten,
    /// WRITE released
    WriteModeDisabled,
    /// PROGRAM released
    ProgrammingModeExited,
}

/// Ownership of the line shared by WRITE and DATA_IN within one step
#[derive(Debug, Clone, Copy)]
struct SharedLine {
    pin: Option<Pin>,
    driven: Option<(Role, bool)>,
}

/// ATF22V10 programmer
///
/// Owns the GPIO backend for the duration of a programming run. Typical use:
///
/// ```ignore
/// let mut programmer = Atf22v10Programmer::new(gpio, PinMap::default(), Timing::default())?;
/// programmer.setup_lines()?;
/// programmer.program_fuse_map(&fuse_map)?;
/// let gpio = programmer.release();
/// ```
pub struct Atf22v10Programmer<G: GpioMaster> {
    gpio: G,
    pins: PinMap,
    timing: Timing,
    state: ProgramState,
    lines_ready: bool,
    shared: SharedLine,
}

impl<G: GpioMaster> Atf22v10Programmer<G> {
    /// Create a programmer, validating the pin map and delays
    pub fn new(gpio: G, pins: PinMap, timing: Timing) -> Result<Self> {
        pins.validate()?;
        timing.validate()?;

        Ok(Self {
            gpio,
            pins,
            timing,
            state: ProgramState::Idle,
            lines_ready: false,
            shared: SharedLine {
                pin: pins.shared_line(),
                driven: None,
            },
        })
    }

    /// Current position in the programming sequence
    pub fn state(&self) -> ProgramState {
        self.state
    }

    /// Pin assignment in use
    pub fn pins(&self) -> &PinMap {
        &self.pins
    }

    /// Delays in use
    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// The GPIO backend
    pub fn gpio(&self) -> &G {
        &self.gpio
    }

    /// The GPIO backend, mutably
    pub fn gpio_mut(&mut self) -> &mut G {
        &mut self.gpio
    }

    /// Give the GPIO backend back to the caller
    pub fn release(self) -> G {
        self.gpio
    }

    // =========================================================================
    // Line primitives
    // =========================================================================

    /// Configure every control line as a low output and DATA_OUT as input
    ///
    /// A line shared by WRITE and DATA_IN is configured once. Safe to call
    /// more than once.
    pub fn setup_lines(&mut self) -> Result<()> {
        for (pin, roles) in self.pins.lines() {
            if roles.contains(Roles::DATA_OUT) {
                self.gpio.set_direction(pin, Direction::Input)?;
            } else {
                self.gpio.set_direction(pin, Direction::Output)?;
                self.gpio.write_pin(pin, false)?;
            }
            log::debug!("atf22v10: line {} set up for {:?}", pin, roles);
        }
        self.lines_ready = true;
        Ok(())
    }

    /// Exchange one bit with the device
    ///
    /// Samples DATA_OUT, then clocks `out` in on DATA_IN. The sampled bit is
    /// what the device presented before this clock edge.
    pub fn exchange_bit(&mut self, out: bool) -> Result<bool> {
        self.begin_step();
        let input = self.gpio.read_pin(self.pins.pin(Role::DataOut))?;
        self.drive(Role::Clock, false)?;
        self.drive(Role::DataIn, out)?;
        self.drive(Role::Clock, true)?;
        Ok(input)
    }

    /// Pulse STROBE low for `duration` to commit the shifted word
    ///
    /// A zero duration toggles the line without waiting.
    pub fn strobe_pulse(&mut self, duration: Duration) -> Result<()> {
        self.begin_step();
        self.drive(Role::Strobe, false)?;
        if !duration.is_zero() {
            self.gpio.delay(duration);
        }
        self.drive(Role::Strobe, true)
    }

    fn shift_bits(&mut self, bits: &[bool]) -> Result<()> {
        for &bit in bits {
            self.exchange_bit(bit)?;
        }
        Ok(())
    }

    fn shift_address(&mut self, address: u8) -> Result<()> {
        for i in (0..ROW_ADDRESS_BITS).rev() {
            self.exchange_bit((address >> i) & 1 != 0)?;
        }
        Ok(())
    }

    fn wait(&mut self, duration: Duration) {
        self.gpio.delay(duration);
    }

    /// Start a new protocol step; resets shared-line ownership
    fn begin_step(&mut self) {
        self.shared.driven = None;
    }

    /// Drive the line behind `role`
    ///
    /// Within one step, WRITE and DATA_IN may not drive their shared line to
    /// different levels.
    fn drive(&mut self, role: Role, high: bool) -> Result<()> {
        let pin = self.pins.pin(role);
        if self.shared.pin == Some(pin) {
            match self.shared.driven {
                Some((owner, level)) if owner != role && level != high => {
                    return Err(Error::SharedLineConflict { pin });
                }
                _ => self.shared.driven = Some((role, high)),
            }
        }
        self.gpio.write_pin(pin, high)
    }

    fn transition(&mut self, next: ProgramState) {
        log::debug!("atf22v10: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    // =========================================================================
    // Programming sequence
    // =========================================================================

    /// Erase the device and program a parsed fuse map
    pub fn program_fuse_map(&mut self, map: &FuseMap) -> Result<()> {
        self.program(map.matrix.rows(), &map.olmc)
    }

    /// Erase the device and program the given rows and OLMC configuration
    ///
    /// Rows are written to addresses `0..rows.len()`; at most 44 rows fit.
    pub fn program(&mut self, rows: &[MatrixRow], olmc: &OlmcConfig) -> Result<()> {
        self.program_with_progress(rows, olmc, &mut NoProgress)
    }

    /// Like [`program`](Self::program), reporting progress along the way
    pub fn program_with_progress<P: ProgramProgress + ?Sized>(
        &mut self,
        rows: &[MatrixRow],
        olmc: &OlmcConfig,
        progress: &mut P,
    ) -> Result<()> {
        if rows.len() > MATRIX_ROWS {
            return Err(Error::TooManyRows { rows: rows.len() });
        }
        if !self.lines_ready {
            self.setup_lines()?;
        }

        let result = self.run_sequence(rows, olmc, progress);
        if let Err(e) = &result {
            log::error!(
                "atf22v10: programming aborted after {:?}: {}",
                self.state,
                e
            );
            log::error!("atf22v10: device state is undefined, power-cycle it before retrying");
        }
        result
    }

    fn run_sequence<P: ProgramProgress + ?Sized>(
        &mut self,
        rows: &[MatrixRow],
        olmc: &OlmcConfig,
        progress: &mut P,
    ) -> Result<()> {
        let t = self.timing;

        self.enter_programming_mode(&t)?;
        self.enable_write_mode()?;

        progress.erasing();
        self.erase(&t)?;

        progress.writing_matrix(rows.len());
        log::info!("Programming {} matrix rows", rows.len());
        for (address, row) in rows.iter().enumerate() {
            // rows.len() <= 44, so the address always fits in 6 bits
            self.write_row(&row.0, address as u8, &t)?;
            progress.row_written(address + 1);
        }
        self.transition(ProgramState::MatrixWritten);

        progress.writing_olmc();
        self.write_olmc(olmc, &t)?;

        self.write_row(&[false; MATRIX_COLUMNS], POWER_DOWN_ROW, &t)?;
        self.transition(ProgramState::PowerDownRowWritten);

        self.disable_write_mode()?;
        self.exit_programming_mode(&t)?;

        progress.complete();
        Ok(())
    }

    fn enter_programming_mode(&mut self, t: &Timing) -> Result<()> {
        self.begin_step();
        self.drive(Role::Clock, true)?;
        self.drive(Role::Strobe, true)?;
        self.wait(t.mode_settle);
        self.drive(Role::Program, true)?;
        self.wait(t.mode_settle);
        self.transition(ProgramState::ProgrammingModeEntered);
        Ok(())
    }

    fn enable_write_mode(&mut self) -> Result<()> {
        self.begin_step();
        self.drive(Role::Write, true)?;
        self.drive(Role::AccessOlmc, false)?;
        self.drive(Role::Erase, false)?;
        self.transition(ProgramState::WriteModeEnabled);
        Ok(())
    }

    fn erase(&mut self, t: &Timing) -> Result<()> {
        log::info!("Erasing device");
        self.begin_step();
        self.drive(Role::Erase, true)?;
        self.wait(t.erase_settle);
        self.strobe_pulse(t.erase_strobe)?;
        self.wait(t.erase_settle);
        self.begin_step();
        self.drive(Role::Erase, false)?;
        self.transition(ProgramState::Erased);
        Ok(())
    }

    fn write_row(&mut self, bits: &[bool], address: u8, t: &Timing) -> Result<()> {
        log::trace!("atf22v10: writing row {}", address);
        self.shift_bits(bits)?;
        self.shift_address(address)?;
        self.strobe_pulse(t.row_strobe)?;
        self.wait(t.row_settle);
        Ok(())
    }

    fn write_olmc(&mut self, olmc: &OlmcConfig, t: &Timing) -> Result<()> {
        log::debug!("atf22v10: writing OLMC configuration {}", olmc);
        self.begin_step();
        self.drive(Role::AccessOlmc, true)?;
        self.shift_bits(&olmc.0)?;
        self.strobe_pulse(t.row_strobe)?;
        self.wait(t.row_settle);
        self.begin_step();
        self.drive(Role::AccessOlmc, false)?;
        self.transition(ProgramState::OlmcWritten);
        Ok(())
    }

    fn disable_write_mode(&mut self) -> Result<()> {
        self.begin_step();
        self.drive(Role::Write, false)?;
        self.drive(Role::DataIn, false)?;
        self.transition(ProgramState::WriteModeDisabled);
        Ok(())
    }

    fn exit_programming_mode(&mut self, t: &Timing) -> Result<()> {
        self.begin_step();
        self.drive(Role::Program, false)?;
        self.wait(t.mode_settle);
        self.drive(Role::Strobe, false)?;
        self.drive(Role::Clock, false)?;
        self.wait(t.mode_settle);
        self.transition(ProgramState::ProgrammingModeExited);
        self.transition(ProgramState::Idle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::format;
    use std::string::{String, ToString};
    use std::vec;
    use std::vec::Vec;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Event {
        Direction(Pin, Direction),
        Write(Pin, bool),
        Read(Pin),
        Delay(Duration),
    }

    /// Records line activity; DATA_OUT always reads `input`
    #[derive(Default)]
    struct Recorder {
        events: Vec<Event>,
        input: bool,
        fail_write_on: Option<usize>,
    }

    impl GpioMaster for Recorder {
        fn set_direction(&mut self, pin: Pin, direction: Direction) -> Result<()> {
            self.events.push(Event::Direction(pin, direction));
            Ok(())
        }

        fn write_pin(&mut self, pin: Pin, high: bool) -> Result<()> {
            let writes = self
                .events
                .iter()
                .filter(|e| matches!(e, Event::Write(..)))
                .count();
            if self.fail_write_on == Some(writes) {
                return Err(Error::LineWriteFailed { pin });
            }
            self.events.push(Event::Write(pin, high));
            Ok(())
        }

        fn read_pin(&mut self, pin: Pin) -> Result<bool> {
            self.events.push(Event::Read(pin));
            Ok(self.input)
        }

        fn delay(&mut self, duration: Duration) {
            self.events.push(Event::Delay(duration));
        }
    }

    /// Wiring with WRITE and DATA_IN on separate lines, so traces are unambiguous
    fn split_pins() -> PinMap {
        PinMap::default().with_pin(Role::DataIn, 25)
    }

    fn programmer(pins: PinMap) -> Atf22v10Programmer<Recorder> {
        let mut p = Atf22v10Programmer::new(Recorder::default(), pins, Timing::default()).unwrap();
        p.setup_lines().unwrap();
        p.gpio_mut().events.clear();
        p
    }

    fn role_name(pins: &PinMap, pin: Pin) -> &'static str {
        Role::ALL
            .iter()
            .find(|&&role| pins.pin(role) == pin)
            .map(|role| role.name())
            .unwrap_or("?")
    }

    /// Render a trace compactly, folding each bit exchange into a shift token
    fn render(events: &[Event], pins: &PinMap) -> Vec<String> {
        let dout = pins.pin(Role::DataOut);
        let clk = pins.pin(Role::Clock);
        let din = pins.pin(Role::DataIn);

        let mut out = Vec::new();
        let mut shift = String::new();
        let mut i = 0;
        while i < events.len() {
            if let [Event::Read(r), Event::Write(c0, false), Event::Write(d, bit), Event::Write(c1, true), ..] =
                events[i..]
            {
                if r == dout && c0 == clk && d == din && c1 == clk {
                    shift.push(if bit { '1' } else { '0' });
                    i += 4;
                    continue;
                }
            }
            if !shift.is_empty() {
                out.push(format!("shift {}", shift));
                shift.clear();
            }
            out.push(match events[i] {
                Event::Write(pin, high) => {
                    format!("{}={}", role_name(pins, pin), high as u8)
                }
                Event::Delay(d) => format!("wait {}ms", d.as_millis()),
                Event::Read(pin) => format!("read {}", role_name(pins, pin)),
                Event::Direction(pin, dir) => format!("{} {:?}", role_name(pins, pin), dir),
            });
            i += 1;
        }
        if !shift.is_empty() {
            out.push(format!("shift {}", shift));
        }
        out
    }

    fn strings(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|s| s.to_string()).collect()
    }

    fn row_cycle(data: &str, address: &str) -> Vec<String> {
        vec![
            format!("shift {}{}", data, address),
            "STROBE=0".to_string(),
            "wait 5ms".to_string(),
            "STROBE=1".to_string(),
            "wait 10ms".to_string(),
        ]
    }

    #[test]
    fn test_setup_lines() {
        let mut p = Atf22v10Programmer::new(Recorder::default(), PinMap::default(), Timing::default())
            .unwrap();
        p.setup_lines().unwrap();
        let events = &p.gpio().events;

        // 7 distinct lines: 6 outputs driven low, DATA_OUT as input
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, Event::Direction(_, Direction::Output)))
                .count(),
            6
        );
        assert!(events.contains(&Event::Direction(7, Direction::Input)));
        assert!(!events.contains(&Event::Write(7, false)));
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, Event::Write(15, false)))
                .count(),
            1
        );
        assert!(events
            .iter()
            .all(|e| !matches!(e, Event::Write(_, true) | Event::Delay(_))));
    }

    #[test]
    fn test_exchange_bit_ordering() {
        let pins = split_pins();
        for bit in [false, true] {
            let mut p = programmer(pins);
            p.gpio_mut().input = !bit;
            let sampled = p.exchange_bit(bit).unwrap();
            assert_eq!(sampled, !bit);
            assert_eq!(
                p.gpio().events,
                vec![
                    Event::Read(7),
                    Event::Write(24, false),
                    Event::Write(25, bit),
                    Event::Write(24, true),
                ]
            );
        }
    }

    #[test]
    fn test_strobe_pulse_zero_does_not_wait() {
        let mut p = programmer(split_pins());
        p.strobe_pulse(Duration::ZERO).unwrap();
        assert_eq!(
            p.gpio().events,
            vec![Event::Write(8, false), Event::Write(8, true)]
        );
    }

    #[test]
    fn test_strobe_pulse_waits() {
        let mut p = programmer(split_pins());
        p.strobe_pulse(Duration::from_millis(30)).unwrap();
        assert_eq!(
            p.gpio().events,
            vec![
                Event::Write(8, false),
                Event::Delay(Duration::from_millis(30)),
                Event::Write(8, true),
            ]
        );
    }

    #[test]
    fn test_two_row_trace() {
        let pins = split_pins();
        let mut p = programmer(pins);
        let rows = [MatrixRow::zeroed(); 2];
        p.program(&rows, &OlmcConfig::default()).unwrap();

        let zeros_row = "0".repeat(MATRIX_COLUMNS);
        let mut expected = strings(&[
            // enter programming mode
            "CLOCK=1",
            "STROBE=1",
            "wait 5ms",
            "PROGRAM=1",
            "wait 5ms",
            // enable write mode
            "WRITE=1",
            "ACCESS_OLMC=0",
            "ERASE=0",
            // erase
            "ERASE=1",
            "wait 10ms",
            "STROBE=0",
            "wait 30ms",
            "STROBE=1",
            "wait 10ms",
            "ERASE=0",
        ]);
        expected.extend(row_cycle(&zeros_row, "000000"));
        expected.extend(row_cycle(&zeros_row, "000001"));
        expected.push("ACCESS_OLMC=1".to_string());
        expected.extend(row_cycle(&"0".repeat(20), ""));
        expected.push("ACCESS_OLMC=0".to_string());
        expected.extend(row_cycle(&zeros_row, "111011"));
        expected.extend(strings(&[
            // disable write mode
            "WRITE=0",
            "DATA_IN=0",
            // leave programming mode
            "PROGRAM=0",
            "wait 5ms",
            "STROBE=0",
            "CLOCK=0",
            "wait 5ms",
        ]));

        assert_eq!(render(&p.gpio().events, &pins), expected);
        assert_eq!(p.state(), ProgramState::Idle);
    }

    #[test]
    fn test_row_data_order() {
        let pins = split_pins();
        let mut p = programmer(pins);
        let mut bits = "0".repeat(MATRIX_COLUMNS);
        bits.replace_range(0..1, "1");
        bits.replace_range(MATRIX_COLUMNS - 2.., "11");
        let row = MatrixRow::from_bits_str(&bits).unwrap();
        let olmc = OlmcConfig::from_bits_str("10000000000000000001").unwrap();

        p.program(&[row], &olmc).unwrap();
        let shifts: Vec<String> = render(&p.gpio().events, &pins)
            .into_iter()
            .filter_map(|t| t.strip_prefix("shift ").map(|s| s.to_string()))
            .collect();

        assert_eq!(shifts.len(), 3);
        assert_eq!(shifts[0], format!("{}000000", bits));
        assert_eq!(shifts[1], "10000000000000000001");
        assert_eq!(shifts[2], format!("{}111011", "0".repeat(MATRIX_COLUMNS)));
    }

    #[test]
    fn test_power_down_row_is_last_and_at_59() {
        let pins = split_pins();
        let mut p = programmer(pins);
        let rows = [MatrixRow::zeroed(); MATRIX_ROWS];
        p.program(&rows, &OlmcConfig::default()).unwrap();

        let addresses: Vec<u8> = render(&p.gpio().events, &pins)
            .iter()
            .filter_map(|t| t.strip_prefix("shift "))
            .filter(|s| s.len() == MATRIX_COLUMNS + ROW_ADDRESS_BITS as usize)
            .map(|s| u8::from_str_radix(&s[MATRIX_COLUMNS..], 2).unwrap())
            .collect();

        let mut expected: Vec<u8> = (0..MATRIX_ROWS as u8).collect();
        expected.push(POWER_DOWN_ROW);
        assert_eq!(addresses, expected);
        assert!(!addresses[..MATRIX_ROWS].contains(&POWER_DOWN_ROW));
    }

    #[test]
    fn test_shared_line_default_wiring() {
        let pins = PinMap::default();
        let mut p = programmer(pins);
        p.program(&[MatrixRow::zeroed()], &OlmcConfig::default())
            .unwrap();
        assert_eq!(p.state(), ProgramState::Idle);
        // WRITE and DATA_IN end low on the shared line
        let last_level = p.gpio().events.iter().rev().find_map(|e| match e {
            Event::Write(15, level) => Some(*level),
            _ => None,
        });
        assert_eq!(last_level, Some(false));
    }

    #[test]
    fn test_shared_line_conflict_detected() {
        let mut p = programmer(PinMap::default());
        p.begin_step();
        p.drive(Role::Write, true).unwrap();
        assert_eq!(
            p.drive(Role::DataIn, false),
            Err(Error::SharedLineConflict { pin: 15 })
        );

        // Same level through both roles is fine
        p.begin_step();
        p.drive(Role::Write, false).unwrap();
        p.drive(Role::DataIn, false).unwrap();

        // A new step releases ownership
        p.begin_step();
        p.drive(Role::DataIn, true).unwrap();
    }

    #[test]
    fn test_too_many_rows_rejected_before_touching_lines() {
        let mut p = programmer(split_pins());
        let rows = [MatrixRow::zeroed(); MATRIX_ROWS + 1];
        let err = p.program(&rows, &OlmcConfig::default()).unwrap_err();
        assert_eq!(err, Error::TooManyRows { rows: MATRIX_ROWS + 1 });
        assert!(p.gpio().events.is_empty());
        assert_eq!(p.state(), ProgramState::Idle);
    }

    #[test]
    fn test_line_failure_aborts_sequence() {
        let mut p = programmer(split_pins());
        // 3 writes entering programming mode and 3 enabling write mode, then ERASE=1 fails
        p.gpio_mut().fail_write_on = Some(6);
        let err = p
            .program(&[MatrixRow::zeroed()], &OlmcConfig::default())
            .unwrap_err();
        assert_eq!(err, Error::LineWriteFailed { pin: 23 });
        assert_eq!(p.state(), ProgramState::WriteModeEnabled);
        assert!(!p
            .gpio()
            .events
            .contains(&Event::Delay(Duration::from_millis(30))));
    }

    #[test]
    fn test_program_sets_up_lines_when_needed() {
        let mut p = Atf22v10Programmer::new(Recorder::default(), split_pins(), Timing::default())
            .unwrap();
        p.program(&[], &OlmcConfig::default()).unwrap();
        assert!(matches!(p.gpio().events[0], Event::Direction(..)));
    }

    #[test]
    fn test_invalid_configuration_rejected() {
        let pins = PinMap::default().with_pin(Role::Erase, 14);
        assert!(matches!(
            Atf22v10Programmer::new(Recorder::default(), pins, Timing::default()),
            Err(Error::PinConflict { pin: 14 })
        ));

        let timing = Timing {
            row_strobe: Duration::from_millis(1),
            ..Timing::default()
        };
        assert!(matches!(
            Atf22v10Programmer::new(Recorder::default(), PinMap::default(), timing),
            Err(Error::TimingBelowMinimum)
        ));
    }
}

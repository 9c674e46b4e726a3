//! Programmer trait definitions
//!
//! The ATF22V10 is programmed by toggling plain GPIO lines, so a programmer
//! backend only has to provide line control and a blocking delay. Everything
//! protocol specific lives in [`crate::protocol`].

use core::time::Duration;

use crate::error::Result;
use crate::pins::Pin;

/// Direction of a GPIO line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Line is sampled by the host
    Input,
    /// Line is driven by the host
    Output,
}

/// GPIO master trait
///
/// This trait represents a programmer that can drive and sample individual
/// GPIO lines. Line identifiers are backend specific (for Linux, the line
/// offset on the GPIO chip).
///
/// Implementations must not reorder line operations: the device latches data
/// on clock edges, so the order of `write_pin` calls is the protocol.
pub trait GpioMaster {
    /// Configure a line as input or output
    ///
    /// Lines switched to output start low.
    fn set_direction(&mut self, pin: Pin, direction: Direction) -> Result<()>;

    /// Drive an output line high or low
    fn write_pin(&mut self, pin: Pin, high: bool) -> Result<()>;

    /// Sample an input line
    fn read_pin(&mut self, pin: Pin) -> Result<bool>;

    /// Block for at least `duration`
    fn delay(&mut self, duration: Duration);
}

impl<G: GpioMaster + ?Sized> GpioMaster for &mut G {
    fn set_direction(&mut self, pin: Pin, direction: Direction) -> Result<()> {
        (**self).set_direction(pin, direction)
    }

    fn write_pin(&mut self, pin: Pin, high: bool) -> Result<()> {
        (**self).write_pin(pin, high)
    }

    fn read_pin(&mut self, pin: Pin) -> Result<bool> {
        (**self).read_pin(pin)
    }

    fn delay(&mut self, duration: Duration) {
        (**self).delay(duration)
    }
}

// Blanket impl for boxed masters so the CLI can pick a backend at runtime
#[cfg(feature = "std")]
impl GpioMaster for std::boxed::Box<dyn GpioMaster + Send> {
    fn set_direction(&mut self, pin: Pin, direction: Direction) -> Result<()> {
        (**self).set_direction(pin, direction)
    }

    fn write_pin(&mut self, pin: Pin, high: bool) -> Result<()> {
        (**self).write_pin(pin, high)
    }

    fn read_pin(&mut self, pin: Pin) -> Result<bool> {
        (**self).read_pin(pin)
    }

    fn delay(&mut self, duration: Duration) {
        (**self).delay(duration)
    }
}

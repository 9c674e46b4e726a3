//! Linux GPIO device implementation
//!
//! This module provides the `LinuxGpio` struct that implements the `GpioMaster`
//! trait using Linux's GPIO character device interface (gpiocdev).
//!
//! All lines used by the programmer are requested in a single line request.
//! A physical line carrying two roles (WRITE and DATA_IN on the stock
//! adapter) is requested once.

use crate::error::{LinuxGpioError, Result};

use std::time::Duration;

use gpiocdev::line::Value;
use gpiocdev::request::{Config, Request};

use atfprog_core::error::{Error as CoreError, Result as CoreResult};
use atfprog_core::pins::{Pin, PinMap, Role, Roles};
use atfprog_core::programmer::{Direction, GpioMaster};

/// Device used when neither `dev` nor `gpiochip` is given
pub const DEFAULT_DEVICE: &str = "/dev/gpiochip0";

/// Consumer label shown by `gpioinfo` for requested lines
const CONSUMER: &str = "atfprog";

/// Configuration for opening a Linux GPIO programmer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinuxGpioConfig {
    /// Device path (e.g., "/dev/gpiochip0")
    pub device: String,
    /// Role to line offset assignment
    pub pins: PinMap,
}

impl Default for LinuxGpioConfig {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            pins: PinMap::default(),
        }
    }
}

impl LinuxGpioConfig {
    /// Create a new configuration with the given device path and wiring
    pub fn new(device: impl Into<String>, pins: PinMap) -> Self {
        Self {
            device: device.into(),
            pins,
        }
    }
}

fn level(high: bool) -> Value {
    if high {
        Value::Active
    } else {
        Value::Inactive
    }
}

/// Linux GPIO programmer
///
/// This struct implements the `GpioMaster` trait for Linux systems using
/// GPIO lines controlled via the gpiocdev crate (character device interface).
pub struct LinuxGpio {
    /// GPIO line request handle
    request: Request,
    /// Configuration of every requested line, kept for reconfiguration
    config: Config,
}

impl LinuxGpio {
    /// Open the GPIO chip and request every line of the pin map
    ///
    /// Control lines start as outputs driven low, DATA_OUT as an input.
    pub fn open(config: &LinuxGpioConfig) -> Result<Self> {
        if config.device.is_empty() {
            return Err(LinuxGpioError::NoDevice);
        }
        config.pins.validate()?;

        log::debug!("linux_gpio: Opening device {}", config.device);

        let mut req_config = Config::default();
        for (pin, roles) in config.pins.lines() {
            if roles.contains(Roles::DATA_OUT) {
                req_config.with_line(pin).as_input();
            } else {
                req_config
                    .with_line(pin)
                    .as_output(Value::Inactive);
            }
        }

        let request = Request::from_config(req_config.clone())
            .on_chip(&config.device)
            .with_consumer(CONSUMER)
            .request()
            .map_err(|source| LinuxGpioError::LineRequestFailed {
                device: config.device.clone(),
                source,
            })?;

        let pins = &config.pins;
        log::info!(
            "linux_gpio: Opened {} (program={}, write={}, erase={}, olmc={}, clock={}, data_in={}, data_out={}, strobe={})",
            config.device,
            pins.pin(Role::Program),
            pins.pin(Role::Write),
            pins.pin(Role::Erase),
            pins.pin(Role::AccessOlmc),
            pins.pin(Role::Clock),
            pins.pin(Role::DataIn),
            pins.pin(Role::DataOut),
            pins.pin(Role::Strobe),
        );

        Ok(Self {
            request,
            config: req_config,
        })
    }
}

impl GpioMaster for LinuxGpio {
    fn set_direction(&mut self, pin: Pin, direction: Direction) -> CoreResult<()> {
        let mut cfg = self.config.clone();
        match direction {
            Direction::Input => cfg.with_line(pin).as_input(),
            Direction::Output => cfg.with_line(pin).as_output(Value::Inactive),
        };

        if let Err(e) = self.request.reconfigure(&cfg) {
            log::error!("linux_gpio: Failed to configure line {}: {}", pin, e);
            return Err(CoreError::LineConfigFailed { pin });
        }
        self.config = cfg;
        Ok(())
    }

    fn write_pin(&mut self, pin: Pin, high: bool) -> CoreResult<()> {
        if let Err(e) = self.request.set_value(pin, level(high)) {
            log::error!("linux_gpio: Failed to set line {}: {}", pin, e);
            return Err(CoreError::LineWriteFailed { pin });
        }
        Ok(())
    }

    fn read_pin(&mut self, pin: Pin) -> CoreResult<bool> {
        match self.request.value(pin) {
            Ok(value) => Ok(value == Value::Active),
            Err(e) => {
                log::error!("linux_gpio: Failed to read line {}: {}", pin, e);
                Err(CoreError::LineReadFailed { pin })
            }
        }
    }

    fn delay(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Parse programmer options from a list of key-value pairs
///
/// # Supported Options
///
/// - `dev=/dev/gpiochipN` - GPIO chip device path
/// - `gpiochip=N` - GPIO chip number (alternative to dev)
/// - `program=N`, `write=N`, `erase=N`, `olmc=N`, `clock=N`, `data_in=N`,
///   `data_out=N`, `strobe=N` - line offset for each role
///
/// Roles that are not given keep their assignment from `pins`. Without `dev`
/// or `gpiochip`, `/dev/gpiochip0` is used.
pub fn parse_options(
    options: &[(&str, &str)],
    pins: PinMap,
) -> std::result::Result<LinuxGpioConfig, String> {
    let mut config = LinuxGpioConfig {
        device: String::new(),
        pins,
    };
    let mut gpiochip: Option<u32> = None;

    for (key, value) in options {
        match *key {
            "dev" => {
                config.device = value.to_string();
            }
            "gpiochip" => {
                gpiochip = Some(
                    value
                        .parse()
                        .map_err(|_| format!("Invalid gpiochip value: {}", value))?,
                );
            }
            _ => match Role::from_key(key) {
                Some(role) => {
                    let pin: Pin = value
                        .parse()
                        .map_err(|_| format!("Invalid {} value: {}", key, value))?;
                    config.pins.set(role, pin);
                }
                None => {
                    log::warn!("linux_gpio: Unknown option: {}={}", key, value);
                }
            },
        }
    }

    // Handle dev vs gpiochip
    if config.device.is_empty() {
        config.device = match gpiochip {
            Some(n) => format!("/dev/gpiochip{}", n),
            None => DEFAULT_DEVICE.to_string(),
        };
    } else if gpiochip.is_some() {
        return Err("Only one of 'dev' or 'gpiochip' can be specified".to_string());
    }

    config.pins.validate().map_err(|e| e.to_string())?;

    Ok(config)
}

//! Logical programming signals and their physical GPIO lines
//!
//! The programming adapter wires eight logical signals to the device. The
//! WRITE enable and the serial DATA_IN input are never needed at the same
//! time, so an adapter may feed both from a single GPIO line. Every other
//! signal must have a line of its own.

use bitflags::bitflags;

use crate::error::{Error, Result};

/// Physical GPIO line identifier (line offset on the GPIO chip)
pub type Pin = u32;

/// A logical signal of the programming interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Enables programming mode (switches +12V onto device pin 2)
    Program,
    /// Program read/write select (device pin 3)
    Write,
    /// Erase mode (device pins 4, 6, 7, 9)
    Erase,
    /// Selects the output configuration bits (device pin 8)
    AccessOlmc,
    /// Serial clock (device pin 10)
    Clock,
    /// Serial data into the device (device pin 11)
    DataIn,
    /// Serial data out of the device (device pin 14), the only input line
    DataOut,
    /// Latches shifted data (device pin 13)
    Strobe,
}

impl Role {
    /// Number of logical roles
    pub const COUNT: usize = 8;

    /// Every role, in a fixed order
    pub const ALL: [Role; Role::COUNT] = [
        Role::Program,
        Role::Write,
        Role::Erase,
        Role::AccessOlmc,
        Role::Clock,
        Role::DataIn,
        Role::DataOut,
        Role::Strobe,
    ];

    /// Signal name as printed on the adapter schematic
    pub fn name(self) -> &'static str {
        match self {
            Role::Program => "PROGRAM",
            Role::Write => "WRITE",
            Role::Erase => "ERASE",
            Role::AccessOlmc => "ACCESS_OLMC",
            Role::Clock => "CLOCK",
            Role::DataIn => "DATA_IN",
            Role::DataOut => "DATA_OUT",
            Role::Strobe => "STROBE",
        }
    }

    /// Look a role up by its option key (`program`, `data_in`, `olmc`, ...)
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "program" => Some(Role::Program),
            "write" => Some(Role::Write),
            "erase" => Some(Role::Erase),
            "olmc" | "access_olmc" => Some(Role::AccessOlmc),
            "clock" | "clk" => Some(Role::Clock),
            "data_in" | "din" => Some(Role::DataIn),
            "data_out" | "dout" => Some(Role::DataOut),
            "strobe" => Some(Role::Strobe),
            _ => None,
        }
    }

    /// The single-role flag for this role
    pub fn flag(self) -> Roles {
        match self {
            Role::Program => Roles::PROGRAM,
            Role::Write => Roles::WRITE,
            Role::Erase => Roles::ERASE,
            Role::AccessOlmc => Roles::ACCESS_OLMC,
            Role::Clock => Roles::CLOCK,
            Role::DataIn => Roles::DATA_IN,
            Role::DataOut => Roles::DATA_OUT,
            Role::Strobe => Roles::STROBE,
        }
    }

    /// Whether the programmer drives this signal (everything but DATA_OUT)
    pub fn is_output(self) -> bool {
        self != Role::DataOut
    }

    fn index(self) -> usize {
        self as usize
    }
}

bitflags! {
    /// A set of logical roles, e.g. the roles sharing one physical line
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Roles: u8 {
        /// PROGRAM
        const PROGRAM     = 1 << 0;
        /// WRITE
        const WRITE       = 1 << 1;
        /// ERASE
        const ERASE       = 1 << 2;
        /// ACCESS_OLMC
        const ACCESS_OLMC = 1 << 3;
        /// CLOCK
        const CLOCK       = 1 << 4;
        /// DATA_IN
        const DATA_IN     = 1 << 5;
        /// DATA_OUT
        const DATA_OUT    = 1 << 6;
        /// STROBE
        const STROBE      = 1 << 7;

        /// The two roles allowed to share a physical line
        const WRITE_DATA_IN = Self::WRITE.bits() | Self::DATA_IN.bits();
    }
}

/// Assignment of logical roles to physical GPIO lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinMap {
    pins: [Pin; Role::COUNT],
}

impl Default for PinMap {
    /// Raspberry Pi adapter wiring (BCM numbering), WRITE and DATA_IN shared
    fn default() -> Self {
        let mut pins = [0; Role::COUNT];
        pins[Role::Program.index()] = 14;
        pins[Role::Write.index()] = 15;
        pins[Role::Erase.index()] = 23;
        pins[Role::AccessOlmc.index()] = 18;
        pins[Role::Clock.index()] = 24;
        pins[Role::DataIn.index()] = 15;
        pins[Role::DataOut.index()] = 7;
        pins[Role::Strobe.index()] = 8;
        Self { pins }
    }
}

impl PinMap {
    /// Build a validated pin map from per-role line offsets
    pub fn new(assignments: &[(Role, Pin)]) -> Result<Self> {
        let mut map = Self::default();
        for &(role, pin) in assignments {
            map.set(role, pin);
        }
        map.validate()?;
        Ok(map)
    }

    /// Reassign one role
    pub fn set(&mut self, role: Role, pin: Pin) {
        self.pins[role.index()] = pin;
    }

    /// Reassign one role (builder style)
    pub fn with_pin(mut self, role: Role, pin: Pin) -> Self {
        self.set(role, pin);
        self
    }

    /// Physical line for a role
    pub fn pin(&self, role: Role) -> Pin {
        self.pins[role.index()]
    }

    /// All roles resolving to `pin`
    pub fn roles_on(&self, pin: Pin) -> Roles {
        Role::ALL
            .iter()
            .filter(|&&role| self.pin(role) == pin)
            .fold(Roles::empty(), |acc, &role| acc | role.flag())
    }

    /// The line WRITE and DATA_IN share, if the adapter aliases them
    pub fn shared_line(&self) -> Option<Pin> {
        let write = self.pin(Role::Write);
        (write == self.pin(Role::DataIn)).then_some(write)
    }

    /// Check that only WRITE and DATA_IN share a physical line
    pub fn validate(&self) -> Result<()> {
        for (pin, roles) in self.lines() {
            if roles.bits().count_ones() > 1 && roles != Roles::WRITE_DATA_IN {
                return Err(Error::PinConflict { pin });
            }
        }
        Ok(())
    }

    /// Each distinct physical line once, with the roles it carries
    pub fn lines(&self) -> impl Iterator<Item = (Pin, Roles)> + '_ {
        Role::ALL
            .iter()
            .enumerate()
            .filter(move |&(i, &role)| {
                !Role::ALL[..i]
                    .iter()
                    .any(|&earlier| self.pin(earlier) == self.pin(role))
            })
            .map(move |(_, &role)| {
                let pin = self.pin(role);
                (pin, self.roles_on(pin))
            })
    }
}

//! # System Configuration
//!
//! Everything the assembler needs to wire a computer: bus width, clock
//! speed and mode, where RAM and ROM sit in the address space, chip
//! capacities, and the polling intervals of the component loops.
//!
//! Configurations are usually read from TOML. Missing keys take their
//! defaults, so an empty document is a valid configuration.
//!
//! ```rust
//! use sim65c02::config::SystemConfig;
//! use sim65c02::clock::ClockMode;
//!
//! let config = SystemConfig::from_toml_str(
//!     r#"
//!     clock_hz = 250.0
//!     clock_mode = "monostable"
//!
//!     [timing]
//!     bus_timeout_ms = 20
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.clock_hz, 250.0);
//! assert_eq!(config.clock_mode, ClockMode::Monostable);
//! assert_eq!(config.timing.bus_timeout_ms, 20);
//! assert_eq!(config.rom_start, 0x8000); // default
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bus::{line, BusError, DEFAULT_WIDTH, MIN_WIDTH};
use crate::clock::ClockMode;
use crate::devices::{ram, rom};
use crate::image::RESET_VECTOR;
use crate::pins::MAX_PINS;

/// Narrowest bus an assembled computer can run on: the CPU and the clock
/// drive RWB, CLOCK and SYNC above the data lines.
pub const CONTROL_WIDTH: u8 = line::SYNC + 1;

/// Errors raised while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("a {0}-line bus cannot carry the control lines, at least {min} are needed", min = CONTROL_WIDTH)]
    NarrowBus(u8),

    #[error("clock speed must be a positive number of Hz, got {0}")]
    InvalidClockSpeed(f32),

    #[error("timing value `{0}` must be greater than zero")]
    InvalidTiming(&'static str),

    #[error("{name} range 0x{start:04X}-0x{end:04X} ends before it starts")]
    InvalidRange {
        name: &'static str,
        start: u16,
        end: u16,
    },

    #[error("{name} capacity {capacity} is outside 1..=65536 bytes")]
    InvalidCapacity { name: &'static str, capacity: usize },

    #[error("{name} window of {window} bytes exceeds the {capacity}-byte chip")]
    WindowExceedsChip {
        name: &'static str,
        window: usize,
        capacity: usize,
    },

    #[error("RAM and ROM windows overlap")]
    Overlap,

    #[error("ROM window 0x{start:04X}-0x{end:04X} does not cover the reset vector")]
    ResetVectorUnmapped { start: u16, end: u16 },
}

/// Polling intervals and timeouts of the component loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Longest a component waits for bus ownership.
    pub bus_timeout_ms: u64,
    /// Chip poll interval while a cycle is in progress.
    pub chip_active_poll_us: u64,
    /// Chip poll interval while disconnected or idle.
    pub chip_idle_poll_ms: u64,
    /// CPU loop poll interval.
    pub cpu_poll_us: u64,
    /// Oscillator poll interval in monostable mode.
    pub clock_idle_poll_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            bus_timeout_ms: 100,
            chip_active_poll_us: 100,
            chip_idle_poll_ms: 5,
            cpu_poll_us: 50,
            clock_idle_poll_ms: 1,
        }
    }
}

impl Timing {
    pub fn bus_timeout(&self) -> Duration {
        Duration::from_millis(self.bus_timeout_ms)
    }

    pub fn chip_active_poll(&self) -> Duration {
        Duration::from_micros(self.chip_active_poll_us)
    }

    pub fn chip_idle_poll(&self) -> Duration {
        Duration::from_millis(self.chip_idle_poll_ms)
    }

    pub fn cpu_poll(&self) -> Duration {
        Duration::from_micros(self.cpu_poll_us)
    }

    pub fn clock_idle_poll(&self) -> Duration {
        Duration::from_millis(self.clock_idle_poll_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("bus_timeout_ms", self.bus_timeout_ms),
            ("chip_active_poll_us", self.chip_active_poll_us),
            ("chip_idle_poll_ms", self.chip_idle_poll_ms),
            ("cpu_poll_us", self.cpu_poll_us),
            ("clock_idle_poll_ms", self.clock_idle_poll_ms),
        ];
        match fields.iter().find(|(_, value)| *value == 0) {
            Some((name, _)) => Err(ConfigError::InvalidTiming(name)),
            None => Ok(()),
        }
    }
}

/// Wiring of a complete computer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub bus_width: u8,
    pub clock_hz: f32,
    pub clock_mode: ClockMode,
    pub ram_start: u16,
    pub ram_end: u16,
    pub ram_capacity: usize,
    pub rom_start: u16,
    pub rom_end: u16,
    pub rom_capacity: usize,
    pub timing: Timing,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            bus_width: DEFAULT_WIDTH,
            clock_hz: 1000.0,
            clock_mode: ClockMode::Astable,
            ram_start: 0x0000,
            ram_end: 0x3FFF,
            ram_capacity: ram::DEFAULT_CAPACITY,
            rom_start: 0x8000,
            rom_end: 0xFFFF,
            rom_capacity: rom::DEFAULT_CAPACITY,
            timing: Timing::default(),
        }
    }
}

/// Length of `start..=end`; an inverted range counts as empty.
fn window_len(start: u16, end: u16) -> usize {
    match end.checked_sub(start) {
        Some(span) => usize::from(span) + 1,
        None => 0,
    }
}

fn check_window(
    name: &'static str,
    start: u16,
    end: u16,
    capacity: usize,
) -> Result<(), ConfigError> {
    if end < start {
        return Err(ConfigError::InvalidRange { name, start, end });
    }
    if capacity == 0 || capacity > 0x10000 {
        return Err(ConfigError::InvalidCapacity { name, capacity });
    }
    let window = window_len(start, end);
    if window > capacity {
        return Err(ConfigError::WindowExceedsChip {
            name,
            window,
            capacity,
        });
    }
    Ok(())
}

impl SystemConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SystemConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Renders the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    /// Checks every value the assembler relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_WIDTH..=MAX_PINS).contains(&self.bus_width) {
            return Err(BusError::InvalidWidth(self.bus_width).into());
        }
        if self.bus_width < CONTROL_WIDTH {
            return Err(ConfigError::NarrowBus(self.bus_width));
        }
        if !(self.clock_hz.is_finite() && self.clock_hz > 0.0) {
            return Err(ConfigError::InvalidClockSpeed(self.clock_hz));
        }
        self.timing.validate()?;

        check_window("RAM", self.ram_start, self.ram_end, self.ram_capacity)?;
        check_window("ROM", self.rom_start, self.rom_end, self.rom_capacity)?;

        if self.ram_start <= self.rom_end && self.rom_start <= self.ram_end {
            return Err(ConfigError::Overlap);
        }
        if self.rom_start > RESET_VECTOR || self.rom_end < RESET_VECTOR + 1 {
            return Err(ConfigError::ResetVectorUnmapped {
                start: self.rom_start,
                end: self.rom_end,
            });
        }
        Ok(())
    }

    /// Number of addresses decoded to RAM. Zero if the range is inverted.
    pub fn ram_window(&self) -> usize {
        window_len(self.ram_start, self.ram_end)
    }

    /// Number of addresses decoded to ROM. Zero if the range is inverted.
    pub fn rom_window(&self) -> usize {
        window_len(self.rom_start, self.rom_end)
    }
}

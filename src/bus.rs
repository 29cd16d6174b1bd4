//! # Shared System Bus
//!
//! The bus is the only state shared between components. It carries a word of
//! signal lines (address, data and a handful of control signals) and owns the
//! arbitration that decides which component may run a transaction.
//!
//! ## Line Layout
//!
//! | Lines   | Signal                                   |
//! |---------|------------------------------------------|
//! | 0-15    | Address A0..A15                          |
//! | 16-23   | Data D0..D7                              |
//! | 24      | RWB (high = read, low = write)           |
//! | 25      | Clock (PHI0 source)                      |
//! | 26      | SYNC (opcode fetch in progress)          |
//!
//! ## Arbitration
//!
//! [`Bus::request`] blocks until ownership is free or the timeout elapses;
//! [`Bus::release`] hands ownership back and wakes one waiter. A timed-out
//! request is normal contention, never an error. [`Bus::acquire`] wraps the
//! pair in a [`BusGuard`] that releases on drop.
//!
//! The line accessors serialize individual reads and writes but do not order
//! a sequence of them against other components: a transaction (address then
//! data) must be bracketed by ownership.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;

use crate::pins::{Pins, MAX_PINS};

/// Named line positions on the bus.
pub mod line {
    /// First address line (A0).
    pub const ADDRESS: u8 = 0;
    /// Number of address lines.
    pub const ADDRESS_WIDTH: u8 = 16;
    /// First data line (D0).
    pub const DATA: u8 = 16;
    /// Number of data lines.
    pub const DATA_WIDTH: u8 = 8;
    /// Read (high) / write (low).
    pub const RWB: u8 = 24;
    /// Clock line driven by the clock generator.
    pub const CLOCK: u8 = 25;
    /// High while the CPU fetches an opcode.
    pub const SYNC: u8 = 26;
}

/// Smallest width that still carries the address and data lines.
pub const MIN_WIDTH: u8 = line::DATA + line::DATA_WIDTH;

/// Width used by [`Bus::new`].
pub const DEFAULT_WIDTH: u8 = 32;

/// Identifies the component holding (or requesting) the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusOwner {
    Cpu,
    /// A memory chip, by its chip id.
    Chip(u8),
    Clock,
    /// Test harnesses and other external drivers.
    External(u8),
}

/// Errors that can occur while constructing a bus.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("bus width {0} is outside the supported range 24..=64")]
    InvalidWidth(u8),
}

#[derive(Debug)]
struct BusLines {
    power: bool,
    pins: Pins,
    owner: Option<BusOwner>,
}

/// The shared bus.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use sim65c02::{Bus, BusOwner};
///
/// let bus = Bus::new();
///
/// assert!(bus.request(BusOwner::Cpu, Duration::from_millis(10)));
/// bus.write_address(0x8000);
/// bus.write_data(0xA9);
/// bus.release(BusOwner::Cpu);
///
/// assert_eq!(bus.read_address(), 0x8000);
/// assert_eq!(bus.read_data(), 0xA9);
/// assert_eq!(bus.owner(), None);
/// ```
#[derive(Debug)]
pub struct Bus {
    width: u8,
    lines: Mutex<BusLines>,
    released: Condvar,
}

impl Bus {
    /// Creates a powered bus of [`DEFAULT_WIDTH`] lines, all low, unowned.
    pub fn new() -> Self {
        Self::build(DEFAULT_WIDTH)
    }

    /// Creates a powered bus with `width` lines.
    ///
    /// # Errors
    ///
    /// [`BusError::InvalidWidth`] unless `MIN_WIDTH <= width <= 64`.
    pub fn with_width(width: u8) -> Result<Self, BusError> {
        if !(MIN_WIDTH..=MAX_PINS).contains(&width) {
            return Err(BusError::InvalidWidth(width));
        }
        Ok(Self::build(width))
    }

    fn build(width: u8) -> Self {
        Self {
            width,
            lines: Mutex::new(BusLines {
                power: true,
                pins: Pins::new(),
                owner: None,
            }),
            released: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BusLines> {
        // Bus state is plain data: a panic elsewhere cannot leave it torn.
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========== Arbitration ==========

    /// Attempts to take exclusive ownership of the bus.
    ///
    /// Blocks until the bus is free (ownership is then granted atomically) or
    /// `timeout` elapses. Returns `false` on timeout with ownership unchanged.
    ///
    /// A component that already holds the bus is not granted it again; it
    /// waits like any other requester.
    pub fn request(&self, owner: BusOwner, timeout: Duration) -> bool {
        let guard = self.lock();
        let (mut lines, result) = self
            .released
            .wait_timeout_while(guard, timeout, |lines| lines.owner.is_some())
            .unwrap_or_else(PoisonError::into_inner);

        if result.timed_out() && lines.owner.is_some() {
            return false;
        }
        lines.owner = Some(owner);
        true
    }

    /// Gives up ownership if `owner` currently holds the bus; otherwise does nothing.
    pub fn release(&self, owner: BusOwner) {
        let mut lines = self.lock();
        if lines.owner == Some(owner) {
            lines.owner = None;
            drop(lines);
            self.released.notify_one();
        }
    }

    /// Requests the bus and returns a guard that releases it when dropped.
    ///
    /// Returns `None` if the bus could not be acquired within `timeout`.
    pub fn acquire(&self, owner: BusOwner, timeout: Duration) -> Option<BusGuard<'_>> {
        if self.request(owner, timeout) {
            Some(BusGuard { bus: self, owner })
        } else {
            None
        }
    }

    /// Current owner of the bus, if any.
    pub fn owner(&self) -> Option<BusOwner> {
        self.lock().owner
    }

    // ========== Lines ==========

    /// Drives the address lines.
    pub fn write_address(&self, addr: u16) {
        self.lock()
            .pins
            .set_field(line::ADDRESS, line::ADDRESS_WIDTH, u64::from(addr));
    }

    /// Samples the address lines.
    pub fn read_address(&self) -> u16 {
        self.lock().pins.field(line::ADDRESS, line::ADDRESS_WIDTH) as u16
    }

    /// Drives the data lines.
    pub fn write_data(&self, value: u8) {
        self.lock()
            .pins
            .set_field(line::DATA, line::DATA_WIDTH, u64::from(value));
    }

    /// Samples the data lines.
    pub fn read_data(&self) -> u8 {
        self.lock().pins.field(line::DATA, line::DATA_WIDTH) as u8
    }

    /// Drives a single line. Lines beyond the bus width do not exist and are ignored.
    pub fn set_pin(&self, pin: u8, level: bool) {
        if pin < self.width {
            self.lock().pins.set(pin, level);
        }
    }

    /// Samples a single line. Lines beyond the bus width read low.
    pub fn get_pin(&self, pin: u8) -> bool {
        pin < self.width && self.lock().pins.get(pin)
    }

    /// Samples every line at once.
    pub fn pins(&self) -> Pins {
        self.lock().pins
    }

    /// Pulls every line low. Power and ownership are unaffected.
    pub fn reset(&self) {
        self.lock().pins = Pins::new();
    }

    /// Number of lines on the bus.
    pub fn width(&self) -> u8 {
        self.width
    }

    // ========== Power ==========

    pub fn is_powered(&self) -> bool {
        self.lock().power
    }

    pub fn power_on(&self) {
        self.lock().power = true;
    }

    pub fn power_off(&self) {
        self.lock().power = false;
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped bus ownership returned by [`Bus::acquire`].
///
/// The guard exposes the same line accessors as the bus so a transaction reads
/// as a sequence of calls on the guard. Ownership is released on drop.
#[derive(Debug)]
pub struct BusGuard<'a> {
    bus: &'a Bus,
    owner: BusOwner,
}

impl BusGuard<'_> {
    pub fn owner(&self) -> BusOwner {
        self.owner
    }

    pub fn write_address(&self, addr: u16) {
        self.bus.write_address(addr);
    }

    pub fn read_address(&self) -> u16 {
        self.bus.read_address()
    }

    pub fn write_data(&self, value: u8) {
        self.bus.write_data(value);
    }

    pub fn read_data(&self) -> u8 {
        self.bus.read_data()
    }

    pub fn set_pin(&self, pin: u8, level: bool) {
        self.bus.set_pin(pin, level);
    }

    pub fn get_pin(&self, pin: u8) -> bool {
        self.bus.get_pin(pin)
    }
}

impl Drop for BusGuard<'_> {
    fn drop(&mut self) {
        self.bus.release(self.owner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHORT: Duration = Duration::from_millis(20);

    #[test]
    fn test_new_bus_state() {
        let bus = Bus::new();
        assert_eq!(bus.width(), DEFAULT_WIDTH);
        assert!(bus.is_powered());
        assert_eq!(bus.owner(), None);
        assert_eq!(bus.pins().bits(), 0);
    }

    #[test]
    fn test_width_validation() {
        assert_eq!(Bus::with_width(23).unwrap_err(), BusError::InvalidWidth(23));
        assert_eq!(Bus::with_width(65).unwrap_err(), BusError::InvalidWidth(65));
        assert_eq!(Bus::with_width(24).unwrap().width(), 24);
        assert_eq!(Bus::with_width(64).unwrap().width(), 64);
    }

    #[test]
    fn test_address_and_data_are_independent() {
        let bus = Bus::new();
        bus.write_address(0xFFFF);
        bus.write_data(0x00);
        assert_eq!(bus.read_address(), 0xFFFF);
        assert_eq!(bus.read_data(), 0x00);

        bus.write_data(0xA5);
        assert_eq!(bus.read_address(), 0xFFFF);
        assert_eq!(bus.read_data(), 0xA5);
        assert_eq!(bus.pins().field(line::DATA, 8), 0xA5);
    }

    #[test]
    fn test_pins_beyond_width_do_not_exist() {
        let bus = Bus::with_width(24).unwrap();
        bus.set_pin(line::CLOCK, true);
        assert!(!bus.get_pin(line::CLOCK));

        bus.set_pin(3, true);
        assert!(bus.get_pin(3));
        assert_eq!(bus.read_address(), 0x0008);
    }

    #[test]
    fn test_reset_keeps_power_and_owner() {
        let bus = Bus::new();
        bus.write_address(0x1234);
        bus.set_pin(line::RWB, true);
        bus.power_off();
        assert!(bus.request(BusOwner::Cpu, SHORT));

        bus.reset();
        assert_eq!(bus.pins().bits(), 0);
        assert!(!bus.is_powered());
        assert_eq!(bus.owner(), Some(BusOwner::Cpu));
    }

    #[test]
    fn test_request_times_out_while_held() {
        let bus = Bus::new();
        assert!(bus.request(BusOwner::Cpu, SHORT));
        assert!(!bus.request(BusOwner::Chip(0), SHORT));
        assert_eq!(bus.owner(), Some(BusOwner::Cpu));
    }

    #[test]
    fn test_release_by_non_owner_is_ignored() {
        let bus = Bus::new();
        assert!(bus.request(BusOwner::Chip(1), SHORT));
        bus.release(BusOwner::Chip(2));
        bus.release(BusOwner::Cpu);
        assert_eq!(bus.owner(), Some(BusOwner::Chip(1)));

        bus.release(BusOwner::Chip(1));
        assert_eq!(bus.owner(), None);
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let bus = Bus::new();
        {
            let guard = bus.acquire(BusOwner::Cpu, SHORT).unwrap();
            guard.write_address(0xFFFC);
            assert_eq!(bus.owner(), Some(BusOwner::Cpu));
            assert!(bus.acquire(BusOwner::Clock, SHORT).is_none());
        }
        assert_eq!(bus.owner(), None);
        assert_eq!(bus.read_address(), 0xFFFC);
    }
}

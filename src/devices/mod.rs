//! Memory chips attached to the system bus.
//!
//! Every memory-like part (the EEPROM and the SRAM, and any future chip kind)
//! implements the [`Chip`] capability. A chip has two faces:
//!
//! - **Pin protocol**: active-low chip-enable (CE), output-enable (OE) and
//!   write-enable (WE) lines plus address and data lines, sampled by the
//!   chip's own polling loop ([`spawn_monitor`]). One poll is one call to
//!   [`Chip::service`]. A bus owner that already holds the bus runs the same
//!   protocol synchronously with [`Chip::cycle`]; the address decoder does
//!   this for every CPU access, so the polling loop only ever answers
//!   drivers that work the pins by hand.
//! - **Direct accessors**: [`Chip::read_byte`], [`Chip::write_byte`],
//!   [`Chip::read_word`] and [`Chip::write_word`] with offset-based
//!   addressing, used by the address decoder.
//!
//! # Bounds
//!
//! An offset at or beyond the chip's capacity never touches storage: reads
//! return [`SENTINEL_BYTE`] / [`SENTINEL_WORD`], writes are dropped, and the
//! access is reported as a warning. Nothing panics.
//!
//! # Example
//!
//! ```rust
//! use sim65c02::devices::{Chip, RamChip};
//! use sim65c02::diagnostics::tracing_sink;
//!
//! let ram = RamChip::new(0, 32 * 1024, tracing_sink());
//!
//! ram.write_word(0x0200, 0x1234);
//! assert_eq!(ram.read_byte(0x0200), 0x34); // little-endian
//! assert_eq!(ram.read_byte(0x0201), 0x12);
//!
//! // Out of range: sentinel, storage untouched
//! assert_eq!(ram.read_byte(0x8000), 0xFF);
//! ```

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::bus::{Bus, BusGuard, BusOwner};
use crate::component::{self, ComponentHandle};
use crate::config::Timing;
use crate::diagnostics::Diagnostics;
use crate::pins::{Pins, SharedPins};

// Device implementations
pub mod ram;
pub mod rom;

// Re-export device types
pub use ram::RamChip;
pub use rom::RomChip;

/// Value returned by byte reads outside a chip's capacity.
pub const SENTINEL_BYTE: u8 = 0xFF;

/// Value returned by word reads that do not fit inside a chip's capacity.
pub const SENTINEL_WORD: u16 = 0xFFFF;

// ========== Chip Pins ==========

/// Line positions within a chip's pin word.
pub mod chip_line {
    /// First address line (A0).
    pub const ADDRESS: u8 = 0;
    pub const ADDRESS_WIDTH: u8 = 16;
    /// First data line (IO0).
    pub const DATA: u8 = 16;
    pub const DATA_WIDTH: u8 = 8;
    /// Chip enable, active low.
    pub const CE: u8 = 24;
    /// Output enable, active low.
    pub const OE: u8 = 25;
    /// Write enable, active low.
    pub const WE: u8 = 26;
}

/// A chip's electrical interface.
///
/// The control lines are active-low: the `set_*` helpers take whether the
/// signal is *asserted* and drive the line low for `true`. A new pin set is
/// disconnected (CE, OE and WE all high).
///
/// A driver that selects the chip and disconnects it again as one cycle holds
/// [`ChipPins::hold`] for the duration; [`Chip::service`] takes the same lock,
/// so the polling loop never acts on another driver's half-finished cycle.
#[derive(Debug)]
pub struct ChipPins {
    pins: SharedPins,
    cycle: Mutex<()>,
}

impl ChipPins {
    pub fn new() -> Self {
        let mut pins = Pins::new();
        pins.set(chip_line::CE, true);
        pins.set(chip_line::OE, true);
        pins.set(chip_line::WE, true);
        Self {
            pins: SharedPins::new(pins),
            cycle: Mutex::new(()),
        }
    }

    /// Claims the pins for one select-to-disconnect cycle.
    pub fn hold(&self) -> MutexGuard<'_, ()> {
        self.cycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Samples every line at once.
    pub fn snapshot(&self) -> Pins {
        self.pins.load()
    }

    pub fn chip_enabled(&self) -> bool {
        !self.snapshot().get(chip_line::CE)
    }

    pub fn output_enabled(&self) -> bool {
        !self.snapshot().get(chip_line::OE)
    }

    pub fn write_enabled(&self) -> bool {
        !self.snapshot().get(chip_line::WE)
    }

    pub fn set_chip_enable(&self, asserted: bool) {
        self.pins.update(|p| p.set(chip_line::CE, !asserted));
    }

    pub fn set_output_enable(&self, asserted: bool) {
        self.pins.update(|p| p.set(chip_line::OE, !asserted));
    }

    pub fn set_write_enable(&self, asserted: bool) {
        self.pins.update(|p| p.set(chip_line::WE, !asserted));
    }

    pub fn address(&self) -> u16 {
        self.snapshot()
            .field(chip_line::ADDRESS, chip_line::ADDRESS_WIDTH) as u16
    }

    pub fn set_address(&self, addr: u16) {
        self.pins.update(|p| {
            p.set_field(
                chip_line::ADDRESS,
                chip_line::ADDRESS_WIDTH,
                u64::from(addr),
            )
        });
    }

    pub fn data(&self) -> u8 {
        self.snapshot().field(chip_line::DATA, chip_line::DATA_WIDTH) as u8
    }

    pub fn set_data(&self, value: u8) {
        self.pins.update(|p| {
            p.set_field(chip_line::DATA, chip_line::DATA_WIDTH, u64::from(value))
        });
    }

    /// Presents a read cycle in one step: address, CE and OE asserted, WE released.
    pub fn select_read(&self, addr: u16) {
        self.pins.update(|p| {
            p.set_field(
                chip_line::ADDRESS,
                chip_line::ADDRESS_WIDTH,
                u64::from(addr),
            );
            p.set(chip_line::WE, true);
            p.set(chip_line::CE, false);
            p.set(chip_line::OE, false);
        });
    }

    /// Presents a write cycle in one step: address and data, CE and WE asserted,
    /// OE released.
    pub fn select_write(&self, addr: u16, value: u8) {
        self.pins.update(|p| {
            p.set_field(
                chip_line::ADDRESS,
                chip_line::ADDRESS_WIDTH,
                u64::from(addr),
            );
            p.set_field(chip_line::DATA, chip_line::DATA_WIDTH, u64::from(value));
            p.set(chip_line::OE, true);
            p.set(chip_line::CE, false);
            p.set(chip_line::WE, false);
        });
    }

    /// Releases CE, OE and WE, taking the chip off the bus.
    pub fn disconnect(&self) {
        self.pins.update(|p| {
            p.set(chip_line::CE, true);
            p.set(chip_line::OE, true);
            p.set(chip_line::WE, true);
        });
    }
}

impl Default for ChipPins {
    fn default() -> Self {
        Self::new()
    }
}

// ========== Storage ==========

/// Fixed-capacity backing array of a chip.
///
/// Every accessor checks bounds and reports a miss as `None`/`false` instead
/// of panicking. Word accesses are little-endian and all-or-nothing: both
/// bytes must lie inside the capacity.
#[derive(Debug)]
pub struct ChipStorage {
    cells: Mutex<Vec<u8>>,
    capacity: usize,
}

impl ChipStorage {
    /// Creates storage of `capacity` bytes, every byte set to `fill`.
    pub fn filled(capacity: usize, fill: u8) -> Self {
        Self::from_bytes(vec![fill; capacity])
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            capacity: bytes.len(),
            cells: Mutex::new(bytes),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.cells.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, addr: u16) -> Option<u8> {
        self.lock().get(usize::from(addr)).copied()
    }

    pub fn set(&self, addr: u16, value: u8) -> bool {
        match self.lock().get_mut(usize::from(addr)) {
            Some(cell) => {
                *cell = value;
                true
            }
            None => false,
        }
    }

    pub fn get_word(&self, addr: u16) -> Option<u16> {
        let start = usize::from(addr);
        let cells = self.lock();
        let bytes = cells.get(start..start + 2)?;
        Some(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn set_word(&self, addr: u16, value: u16) -> bool {
        let start = usize::from(addr);
        let mut cells = self.lock();
        match cells.get_mut(start..start + 2) {
            Some(bytes) => {
                bytes.copy_from_slice(&value.to_le_bytes());
                true
            }
            None => false,
        }
    }

    /// Copies `bytes` in starting at `offset`. Nothing is written unless the
    /// whole slice fits.
    pub fn load(&self, offset: usize, bytes: &[u8]) -> bool {
        let mut cells = self.lock();
        match cells.get_mut(offset..offset.saturating_add(bytes.len())) {
            Some(dest) => {
                dest.copy_from_slice(bytes);
                true
            }
            None => false,
        }
    }

    /// Returns a copy of the whole array.
    pub fn snapshot(&self) -> Vec<u8> {
        self.lock().clone()
    }
}

// ========== Chip Capability ==========

/// Outcome of one poll of a chip's pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    /// CE released: the chip is electrically off the bus.
    Disconnected,
    /// CE asserted but no read or write cycle presented (or both at once).
    Idle,
    /// Bus to chip: `value` was latched from the data pins into storage.
    Stored { addr: u16, value: u8 },
    /// Chip to bus: `value` was driven onto the data pins and, if `on_bus`,
    /// onto the shared bus data lines.
    Driven { addr: u16, value: u8, on_bus: bool },
    /// The address pins point past the chip's capacity; nothing happened.
    OutOfRange { addr: u16 },
}

impl Activity {
    /// True while the chip is selected with a read or write cycle in progress.
    pub fn is_engaged(&self) -> bool {
        !matches!(self, Activity::Disconnected | Activity::Idle)
    }
}

/// Capability shared by every memory chip.
///
/// Implementors supply identity, storage and pins; the read/write contract
/// and the pin protocol are provided.
pub trait Chip: Send + Sync {
    /// Part name used in diagnostics (e.g. `"AT28C256"`).
    fn name(&self) -> &str;

    /// Identifies the chip as a bus owner.
    fn id(&self) -> u8;

    fn storage(&self) -> &ChipStorage;

    fn pins(&self) -> &ChipPins;

    fn diagnostics(&self) -> &dyn Diagnostics;

    /// Whether writes currently reach storage. Chips with write protection
    /// override this.
    fn accepts_writes(&self) -> bool {
        true
    }

    /// Number of addressable bytes.
    fn capacity(&self) -> usize {
        self.storage().capacity()
    }

    /// Reads one byte at a local offset.
    fn read_byte(&self, addr: u16) -> u8 {
        self.storage().get(addr).unwrap_or_else(|| {
            report_out_of_range(self, "read", addr);
            SENTINEL_BYTE
        })
    }

    /// Writes one byte at a local offset.
    fn write_byte(&self, addr: u16, value: u8) {
        if !self.accepts_writes() {
            report_protected(self, addr);
            return;
        }
        if !self.storage().set(addr, value) {
            report_out_of_range(self, "write", addr);
        }
    }

    /// Reads a little-endian word from `addr` and `addr + 1`.
    fn read_word(&self, addr: u16) -> u16 {
        self.storage().get_word(addr).unwrap_or_else(|| {
            report_out_of_range(self, "word read", addr);
            SENTINEL_WORD
        })
    }

    /// Writes a little-endian word to `addr` and `addr + 1`.
    fn write_word(&self, addr: u16, value: u16) {
        if !self.accepts_writes() {
            report_protected(self, addr);
            return;
        }
        if !self.storage().set_word(addr, value) {
            report_out_of_range(self, "word write", addr);
        }
    }

    /// Runs one iteration of the pin protocol.
    ///
    /// 1. CE released: [`Activity::Disconnected`].
    /// 2. WE asserted, OE released: latch the data pins into storage at the
    ///    address pins (bus to chip).
    /// 3. OE asserted, WE released: drive the stored byte onto the data pins,
    ///    then onto the bus data lines if the bus can be acquired within
    ///    `bus_timeout` (chip to bus).
    /// 4. Anything else: [`Activity::Idle`].
    fn service(&self, bus: &Bus, bus_timeout: Duration) -> Activity {
        let activity = {
            let _held = self.pins().hold();
            run_cycle(self)
        };
        match activity {
            Activity::Driven { addr, value, .. } => {
                let on_bus = match bus.acquire(BusOwner::Chip(self.id()), bus_timeout) {
                    Some(guard) => {
                        guard.write_data(value);
                        true
                    }
                    None => false,
                };
                Activity::Driven {
                    addr,
                    value,
                    on_bus,
                }
            }
            other => other,
        }
    }

    /// Runs the pin protocol once on behalf of the current bus owner.
    ///
    /// Same as [`Chip::service`], except that a driven byte goes straight
    /// onto `bus` without arbitration and the pins are not locked: the caller
    /// holds [`ChipPins::hold`] around its select and disconnect.
    fn cycle(&self, bus: &BusGuard<'_>) -> Activity {
        match run_cycle(self) {
            Activity::Driven { addr, value, .. } => {
                bus.write_data(value);
                Activity::Driven {
                    addr,
                    value,
                    on_bus: true,
                }
            }
            other => other,
        }
    }
}

/// One pass of the pin protocol against storage and the chip's own pins.
/// A read cycle comes back as `Driven` with `on_bus` false.
fn run_cycle<C: Chip + ?Sized>(chip: &C) -> Activity {
    let pins = chip.pins();
    let snapshot = pins.snapshot();
    let ce = !snapshot.get(chip_line::CE);
    let oe = !snapshot.get(chip_line::OE);
    let we = !snapshot.get(chip_line::WE);
    let addr = snapshot.field(chip_line::ADDRESS, chip_line::ADDRESS_WIDTH) as u16;

    if !ce {
        return Activity::Disconnected;
    }

    if we && !oe {
        let value = snapshot.field(chip_line::DATA, chip_line::DATA_WIDTH) as u8;
        if !chip.accepts_writes() {
            return Activity::Idle;
        }
        if !chip.storage().set(addr, value) {
            return Activity::OutOfRange { addr };
        }
        return Activity::Stored { addr, value };
    }

    if oe && !we {
        let Some(value) = chip.storage().get(addr) else {
            return Activity::OutOfRange { addr };
        };
        pins.set_data(value);
        return Activity::Driven {
            addr,
            value,
            on_bus: false,
        };
    }

    Activity::Idle
}

fn report_out_of_range<C: Chip + ?Sized>(chip: &C, access: &str, addr: u16) {
    chip.diagnostics().warning(
        chip.name(),
        &format!(
            "Out-of-range {access} at 0x{addr:04X} (capacity 0x{:04X})",
            chip.capacity()
        ),
    );
}

fn report_protected<C: Chip + ?Sized>(chip: &C, addr: u16) {
    chip.diagnostics().warning(
        chip.name(),
        &format!("Write to 0x{addr:04X} ignored: chip is write-protected"),
    );
}

// ========== Polling Loop ==========

/// Starts the chip's polling loop on its own thread.
///
/// The loop calls [`Chip::service`] until stopped, sleeping
/// `timing.chip_active_poll()` while the chip is engaged and
/// `timing.chip_idle_poll()` otherwise. Out-of-range addresses and bus
/// timeouts are reported once per change of activity rather than once per
/// poll.
pub fn spawn_monitor(
    chip: Arc<dyn Chip>,
    bus: Arc<Bus>,
    timing: Timing,
) -> io::Result<ComponentHandle> {
    let name = chip.name().to_string();
    component::spawn(name.clone(), move |flag| {
        let diagnostics = chip.diagnostics();
        diagnostics.info(&name, "Started monitoring bus");

        let mut last = Activity::Disconnected;
        while flag.is_running() {
            let activity = chip.service(&bus, timing.bus_timeout());

            if activity != last {
                match activity {
                    Activity::OutOfRange { addr } => diagnostics.warning(
                        &name,
                        &format!("Address pins 0x{addr:04X} beyond capacity, cycle ignored"),
                    ),
                    Activity::Driven { on_bus: false, .. } => {
                        diagnostics.warning(&name, "Bus busy, data not driven this cycle")
                    }
                    _ => {}
                }
                last = activity;
            }

            if activity.is_engaged() {
                flag.sleep(timing.chip_active_poll());
            } else {
                flag.sleep(timing.chip_idle_poll());
            }
        }

        diagnostics.info(&name, "Monitor thread stopped");
    })
}

//! # Address Decoder
//!
//! Routes the flat 16-bit CPU address space onto chips. Each [`Mapping`]
//! claims an inclusive address range; an access inside the range is passed to
//! the chip with the offset `addr - start`.
//!
//! Routing is a pure table lookup and needs no bus arbitration. Mappings are
//! scanned in insertion order and the first match wins, so overlapping ranges
//! are resolved in favour of whichever was registered first. Overlaps are a
//! wiring mistake the decoder does not detect.
//!
//! An address no mapping covers reads as 0xFF and swallows writes; both are
//! reported as errors to the diagnostics sink.
//!
//! [`AddressDecoder::read_cycle`] and [`AddressDecoder::write_cycle`] are the
//! bus-owner forms used by the CPU: instead of calling the chip's accessors
//! they select the chip through its CE/OE/WE pins, run one pin-protocol cycle
//! and disconnect it again.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use sim65c02::devices::{Chip, RamChip, RomChip};
//! use sim65c02::diagnostics::tracing_sink;
//! use sim65c02::AddressDecoder;
//!
//! let sink = tracing_sink();
//! let ram = Arc::new(RamChip::new(0, 32 * 1024, sink.clone()));
//! let rom = Arc::new(RomChip::new(1, 32 * 1024, sink.clone()));
//!
//! let mut decoder = AddressDecoder::new(sink);
//! decoder.add_mapping(0x0000, 0x3FFF, ram.clone());
//! decoder.add_mapping(0x8000, 0xFFFF, rom.clone());
//!
//! decoder.write(0x0200, 0x01);
//! assert_eq!(ram.read_byte(0x0200), 0x01);
//! assert_eq!(decoder.read(0x9000), rom.read_byte(0x1000));
//! assert_eq!(decoder.read(0x5000), 0xFF); // unmapped
//! ```

use std::fmt;
use std::sync::Arc;

use crate::bus::BusGuard;
use crate::devices::{Activity, Chip};
use crate::diagnostics::Diagnostics;

/// Value read from an address no chip is mapped at.
pub const UNMAPPED: u8 = 0xFF;

const COMPONENT: &str = "decoder";

/// An inclusive address range routed to one chip.
#[derive(Clone)]
pub struct Mapping {
    pub start: u16,
    pub end: u16,
    pub chip: Arc<dyn Chip>,
}

impl Mapping {
    pub fn contains(&self, addr: u16) -> bool {
        (self.start..=self.end).contains(&addr)
    }
}

impl fmt::Debug for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapping")
            .field("start", &format_args!("0x{:04X}", self.start))
            .field("end", &format_args!("0x{:04X}", self.end))
            .field("chip", &self.chip.name())
            .finish()
    }
}

/// Static routing table from address ranges to chips.
pub struct AddressDecoder {
    mappings: Vec<Mapping>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl AddressDecoder {
    pub fn new(diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self {
            mappings: Vec::new(),
            diagnostics,
        }
    }

    /// Appends a mapping covering `start..=end`.
    ///
    /// Earlier mappings take priority over later ones where ranges overlap.
    pub fn add_mapping(&mut self, start: u16, end: u16, chip: Arc<dyn Chip>) {
        self.mappings.push(Mapping { start, end, chip });
    }

    /// Registered mappings in priority order.
    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    /// Finds the chip owning `addr` and the local offset within it.
    pub fn resolve(&self, addr: u16) -> Option<(&Arc<dyn Chip>, u16)> {
        self.mappings
            .iter()
            .find(|m| m.contains(addr))
            .map(|m| (&m.chip, addr - m.start))
    }

    /// Reads the byte at `addr`, or [`UNMAPPED`] if no chip covers it.
    pub fn read(&self, addr: u16) -> u8 {
        match self.resolve(addr) {
            Some((chip, offset)) => chip.read_byte(offset),
            None => self.unmapped_read(addr),
        }
    }

    /// Writes `value` to `addr`. Dropped if no chip covers it.
    pub fn write(&self, addr: u16, value: u8) {
        match self.resolve(addr) {
            Some((chip, offset)) => chip.write_byte(offset, value),
            None => self.unmapped_write(addr, value),
        }
    }

    /// Runs a read cycle at `addr` while the caller holds `bus`.
    ///
    /// The owning chip is selected with CE and OE at its local offset, drives
    /// its byte onto the bus data lines and is disconnected. A cycle the chip
    /// cannot complete falls back to [`Chip::read_byte`], which reports it.
    pub fn read_cycle(&self, bus: &BusGuard<'_>, addr: u16) -> u8 {
        let Some((chip, offset)) = self.resolve(addr) else {
            return self.unmapped_read(addr);
        };
        let pins = chip.pins();
        let _held = pins.hold();
        pins.select_read(offset);
        let value = match chip.cycle(bus) {
            Activity::Driven { value, .. } => value,
            _ => chip.read_byte(offset),
        };
        pins.disconnect();
        value
    }

    /// Runs a write cycle of `value` at `addr` while the caller holds `bus`.
    ///
    /// The owning chip is selected with CE and WE, latches the data pins and
    /// is disconnected. A protected or out-of-range cycle is reported by
    /// [`Chip::write_byte`] and stores nothing.
    pub fn write_cycle(&self, bus: &BusGuard<'_>, addr: u16, value: u8) {
        let Some((chip, offset)) = self.resolve(addr) else {
            self.unmapped_write(addr, value);
            return;
        };
        let pins = chip.pins();
        let _held = pins.hold();
        pins.select_write(offset, value);
        if !matches!(chip.cycle(bus), Activity::Stored { .. }) {
            chip.write_byte(offset, value);
        }
        pins.disconnect();
    }

    fn unmapped_read(&self, addr: u16) -> u8 {
        self.diagnostics
            .error(COMPONENT, &format!("Unmapped read at 0x{addr:04X}"));
        UNMAPPED
    }

    fn unmapped_write(&self, addr: u16, value: u8) {
        self.diagnostics.error(
            COMPONENT,
            &format!("Unmapped write of 0x{value:02X} to 0x{addr:04X}"),
        );
    }
}

impl fmt::Debug for AddressDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressDecoder")
            .field("mappings", &self.mappings)
            .finish_non_exhaustive()
    }
}

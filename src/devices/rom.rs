//! EEPROM chip (AT28C256-style, 32 KiB).
//!
//! An erased part reads back all-ones. Unlike a mask ROM the EEPROM can be
//! reprogrammed through its write-enable pin or the direct accessors, unless
//! write protection is switched on, in which case every write is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{Chip, ChipPins, ChipStorage};
use crate::diagnostics::Diagnostics;
use crate::image::RomImage;

/// Part name reported in diagnostics.
pub const PART_NAME: &str = "AT28C256";

/// Capacity of the AT28C256 part.
pub const DEFAULT_CAPACITY: usize = 32 * 1024;

/// Value of every byte in an erased part.
pub const ERASED: u8 = 0xFF;

/// Programmable read-only memory chip.
///
/// # Examples
///
/// ```rust
/// use sim65c02::devices::{Chip, RomChip};
/// use sim65c02::diagnostics::tracing_sink;
///
/// let rom = RomChip::new(1, 32 * 1024, tracing_sink());
/// assert_eq!(rom.read_byte(0x0000), 0xFF); // erased
///
/// rom.write_byte(0x0000, 0xEA);
/// assert_eq!(rom.read_byte(0x0000), 0xEA);
///
/// rom.set_write_protect(true);
/// rom.write_byte(0x0000, 0x00);
/// assert_eq!(rom.read_byte(0x0000), 0xEA); // write dropped
/// ```
pub struct RomChip {
    id: u8,
    storage: ChipStorage,
    pins: ChipPins,
    write_protect: AtomicBool,
    diagnostics: Arc<dyn Diagnostics>,
}

impl RomChip {
    /// Creates an erased chip of `capacity` bytes.
    pub fn new(id: u8, capacity: usize, diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self::with_storage(id, ChipStorage::filled(capacity, ERASED), diagnostics)
    }

    /// Creates a chip programmed with `image`. The capacity is the image size.
    pub fn from_image(id: u8, image: RomImage, diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self::with_storage(id, ChipStorage::from_bytes(image.into_bytes()), diagnostics)
    }

    fn with_storage(id: u8, storage: ChipStorage, diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self {
            id,
            storage,
            pins: ChipPins::new(),
            write_protect: AtomicBool::new(false),
            diagnostics,
        }
    }

    /// Enables or disables write protection.
    pub fn set_write_protect(&self, enabled: bool) {
        self.write_protect.store(enabled, Ordering::Release);
    }

    pub fn is_write_protected(&self) -> bool {
        self.write_protect.load(Ordering::Acquire)
    }

    /// Reprograms the chip from `image`, starting at offset 0.
    ///
    /// Returns `false`, leaving the chip untouched, if the image is larger
    /// than the chip. Write protection does not apply to the programmer.
    pub fn program(&self, image: &RomImage) -> bool {
        self.storage.load(0, image.bytes())
    }
}

impl Chip for RomChip {
    fn name(&self) -> &str {
        PART_NAME
    }

    fn id(&self) -> u8 {
        self.id
    }

    fn storage(&self) -> &ChipStorage {
        &self.storage
    }

    fn pins(&self) -> &ChipPins {
        &self.pins
    }

    fn diagnostics(&self) -> &dyn Diagnostics {
        self.diagnostics.as_ref()
    }

    fn accepts_writes(&self) -> bool {
        !self.is_write_protected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Bus;
    use crate::devices::Activity;
    use crate::diagnostics::{tracing_sink, CapturedDiagnostics, Severity};
    use std::time::Duration;

    #[test]
    fn test_rom_new_is_erased() {
        let rom = RomChip::new(1, 256, tracing_sink());
        assert_eq!(rom.capacity(), 256);
        assert_eq!(rom.name(), "AT28C256");
        assert!(rom.storage().snapshot().iter().all(|&b| b == ERASED));
    }

    #[test]
    fn test_rom_from_image() {
        let image = RomImage::with_program(0x8000, 0x8000, &[0xA9, 0x42, 0x00]).unwrap();
        let rom = RomChip::from_image(1, image, tracing_sink());

        assert_eq!(rom.capacity(), 0x8000);
        assert_eq!(rom.read_byte(0x0000), 0xA9);
        assert_eq!(rom.read_byte(0x0001), 0x42);
        assert_eq!(rom.read_word(0x7FFC), 0x8000);
    }

    #[test]
    fn test_rom_write_protect_direct() {
        let sink = Arc::new(CapturedDiagnostics::new());
        let rom = RomChip::new(1, 256, sink.clone());
        rom.set_write_protect(true);

        rom.write_byte(0, 0x00);
        rom.write_word(10, 0x0000);

        assert_eq!(rom.read_byte(0), ERASED);
        assert_eq!(rom.read_word(10), 0xFFFF);
        assert_eq!(sink.count(Severity::Warning), 2);
    }

    #[test]
    fn test_rom_write_protect_pin_cycle() {
        let rom = RomChip::new(1, 256, tracing_sink());
        let bus = Bus::new();
        rom.set_write_protect(true);
        rom.pins().select_write(0x0010, 0x12);

        assert_eq!(rom.service(&bus, Duration::from_millis(10)), Activity::Idle);
        assert_eq!(rom.read_byte(0x0010), ERASED);
    }

    #[test]
    fn test_rom_program_ignores_protection() {
        let rom = RomChip::new(1, 0x8000, tracing_sink());
        rom.set_write_protect(true);

        let mut image = RomImage::new(0x8000, 0x8000);
        image.load(0x8000, &[0xEA, 0xEA]).unwrap();
        assert!(rom.program(&image));
        assert_eq!(rom.read_byte(0), 0xEA);

        let too_big = RomImage::new(0x0000, 0x10000);
        assert!(!rom.program(&too_big));
    }
}

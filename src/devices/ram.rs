//! SRAM chip (HM62256B-style, 32 KiB).
//!
//! Storage powers up cleared to zero and is freely readable and writable.

use std::sync::Arc;

use super::{Chip, ChipPins, ChipStorage};
use crate::diagnostics::Diagnostics;

/// Part name reported in diagnostics.
pub const PART_NAME: &str = "HM62256B";

/// Capacity of the HM62256B part.
pub const DEFAULT_CAPACITY: usize = 32 * 1024;

/// Static RAM chip.
///
/// # Examples
///
/// ```rust
/// use sim65c02::devices::{Chip, RamChip};
/// use sim65c02::diagnostics::tracing_sink;
///
/// let ram = RamChip::new(0, 1024, tracing_sink()); // 1KB RAM
///
/// ram.write_byte(0x42, 0xAA);
/// assert_eq!(ram.read_byte(0x42), 0xAA);
/// assert_eq!(ram.read_byte(0x43), 0x00);
/// ```
pub struct RamChip {
    id: u8,
    storage: ChipStorage,
    pins: ChipPins,
    diagnostics: Arc<dyn Diagnostics>,
}

impl RamChip {
    /// Creates a cleared RAM chip of `capacity` bytes.
    ///
    /// `id` distinguishes the chip as a bus owner.
    pub fn new(id: u8, capacity: usize, diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self {
            id,
            storage: ChipStorage::filled(capacity, 0x00),
            pins: ChipPins::new(),
            diagnostics,
        }
    }

    /// Load bytes into RAM at the specified offset.
    ///
    /// Returns `false`, leaving RAM untouched, if the bytes do not fit.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sim65c02::devices::{Chip, RamChip};
    /// use sim65c02::diagnostics::tracing_sink;
    ///
    /// let ram = RamChip::new(0, 1024, tracing_sink());
    /// assert!(ram.load_bytes(0x100, &[0x01, 0x02, 0x03]));
    ///
    /// assert_eq!(ram.read_byte(0x100), 0x01);
    /// assert_eq!(ram.read_byte(0x102), 0x03);
    /// assert!(!ram.load_bytes(0x3FF, &[0x01, 0x02]));
    /// ```
    pub fn load_bytes(&self, offset: u16, bytes: &[u8]) -> bool {
        self.storage.load(usize::from(offset), bytes)
    }
}

impl Chip for RamChip {
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
}

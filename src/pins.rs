//! # Pin Words
//!
//! Every chip in the simulator exposes its electrical interface as a word of
//! single-bit signal lines. Instead of aliasing named bitfields over an
//! integer, a [`Pins`] value is a plain `u64` with accessors that compute the
//! mask and shift for each line or group of lines.
//!
//! [`SharedPins`] is the same layout stored in an atomic, for pin sets that
//! are driven by one thread and sampled by another (a chip's control pins,
//! for example).

use std::sync::atomic::{AtomicU64, Ordering};

/// Maximum number of lines a pin word can carry.
pub const MAX_PINS: u8 = 64;

/// A fixed-width word of signal lines.
///
/// Line `n` is bit `n` of the word. Lines at or beyond [`MAX_PINS`] do not
/// exist: writing them is a no-op and reading them yields `false`.
///
/// # Examples
///
/// ```
/// use sim65c02::Pins;
///
/// let mut pins = Pins::new();
/// pins.set_field(0, 16, 0xFFFC);
/// pins.set(24, true);
///
/// assert_eq!(pins.field(0, 16), 0xFFFC);
/// assert!(pins.get(24));
/// assert!(!pins.get(25));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Pins(u64);

impl Pins {
    /// Creates a pin word with every line low.
    pub const fn new() -> Self {
        Self(0)
    }

    /// Creates a pin word from raw line state.
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the raw line state.
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Returns the level of a single line.
    pub const fn get(self, line: u8) -> bool {
        if line >= MAX_PINS {
            return false;
        }
        (self.0 >> line) & 1 != 0
    }

    /// Drives a single line high (`true`) or low (`false`).
    pub fn set(&mut self, line: u8, level: bool) {
        if line >= MAX_PINS {
            return;
        }
        let mask = 1u64 << line;
        if level {
            self.0 |= mask;
        } else {
            self.0 &= !mask;
        }
    }

    /// Reads `width` consecutive lines starting at `offset` as an unsigned value
    /// (line `offset` is the least significant bit).
    pub const fn field(self, offset: u8, width: u8) -> u64 {
        if offset >= MAX_PINS {
            return 0;
        }
        (self.0 >> offset) & field_mask(width)
    }

    /// Drives `width` consecutive lines starting at `offset` from `value`.
    ///
    /// Bits of `value` above `width` are discarded.
    pub fn set_field(&mut self, offset: u8, width: u8, value: u64) {
        if offset >= MAX_PINS {
            return;
        }
        let mask = field_mask(width) << offset;
        self.0 = (self.0 & !mask) | ((value << offset) & mask);
    }
}

const fn field_mask(width: u8) -> u64 {
    if width >= MAX_PINS {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// A [`Pins`] word that can be driven and sampled from several threads.
///
/// Individual loads and stores are atomic; a read-modify-write goes through
/// [`SharedPins::update`], so concurrent drivers of different lines never lose
/// each other's changes.
#[derive(Debug, Default)]
pub struct SharedPins {
    bits: AtomicU64,
}

impl SharedPins {
    pub fn new(initial: Pins) -> Self {
        Self {
            bits: AtomicU64::new(initial.bits()),
        }
    }

    /// Samples every line at once.
    pub fn load(&self) -> Pins {
        Pins::from_bits(self.bits.load(Ordering::Acquire))
    }

    /// Overwrites every line at once.
    pub fn store(&self, pins: Pins) {
        self.bits.store(pins.bits(), Ordering::Release);
    }

    /// Applies `f` to the current state atomically and returns the new state.
    pub fn update(&self, mut f: impl FnMut(&mut Pins)) -> Pins {
        let mut current = self.bits.load(Ordering::Acquire);
        loop {
            let mut next = Pins::from_bits(current);
            f(&mut next);
            match self.bits.compare_exchange_weak(
                current,
                next.bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }
}

//! # Program Images
//!
//! A [`RomImage`] is the byte-for-byte contents of a ROM chip, addressed by
//! the CPU addresses the chip will be mapped at. It replaces hand-computing
//! offsets such as "reset vector at 0xFFFC lives at offset 0x7FFC of a ROM
//! mapped at 0x8000".
//!
//! ```
//! use sim65c02::RomImage;
//!
//! // 32KB ROM mapped at 0x8000, program at the base, reset vector -> 0x8000
//! let image = RomImage::with_program(0x8000, 0x8000, &[0xA9, 0x42, 0x00]).unwrap();
//!
//! assert_eq!(image.bytes()[0], 0xA9);
//! assert_eq!(image.bytes()[3], 0xEA);      // padding is NOP
//! assert_eq!(image.bytes()[0x7FFC], 0x00); // vector low byte
//! assert_eq!(image.bytes()[0x7FFD], 0x80); // vector high byte
//! ```

use thiserror::Error;

/// Address of the two-byte reset vector.
pub const RESET_VECTOR: u16 = 0xFFFC;

/// Opcode used to pad program images.
pub const NOP: u8 = 0xEA;

/// Errors raised while building an image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    /// Bytes would land outside the addresses covered by the image.
    #[error("{len} bytes at 0x{addr:04X} fall outside the image 0x{base:04X}..0x{end:05X}")]
    OutOfRange {
        addr: u16,
        len: usize,
        base: u16,
        end: u32,
    },
}

/// Contents of a ROM chip positioned in the CPU address space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomImage {
    base: u16,
    bytes: Vec<u8>,
}

impl RomImage {
    /// Creates an erased (all 0xFF) image of `capacity` bytes mapped at `base`.
    pub fn new(base: u16, capacity: usize) -> Self {
        Self {
            base,
            bytes: vec![0xFF; capacity],
        }
    }

    /// Creates a NOP-padded image with `code` at `base` and the reset vector
    /// pointing at `base`.
    ///
    /// # Errors
    ///
    /// [`ImageError::OutOfRange`] if the code does not fit or the image does
    /// not cover the reset vector.
    pub fn with_program(base: u16, capacity: usize, code: &[u8]) -> Result<Self, ImageError> {
        let mut image = Self::new(base, capacity);
        image.fill(NOP);
        image.load(base, code)?;
        image.reset_vector(base)?;
        Ok(image)
    }

    /// First CPU address covered by the image.
    pub fn base(&self) -> u16 {
        self.base
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// One past the last CPU address covered.
    fn end(&self) -> u32 {
        u32::from(self.base) + self.bytes.len() as u32
    }

    /// Copies `bytes` to CPU address `addr`.
    pub fn load(&mut self, addr: u16, bytes: &[u8]) -> Result<(), ImageError> {
        let out_of_range = ImageError::OutOfRange {
            addr,
            len: bytes.len(),
            base: self.base,
            end: self.end(),
        };
        if addr < self.base || u32::from(addr) + bytes.len() as u32 > self.end() {
            return Err(out_of_range);
        }
        let offset = usize::from(addr - self.base);
        self.bytes[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Points the reset vector at `target` (little-endian at 0xFFFC/0xFFFD).
    pub fn reset_vector(&mut self, target: u16) -> Result<(), ImageError> {
        self.load(RESET_VECTOR, &target.to_le_bytes())
    }

    /// Sets every byte to `value`.
    pub fn fill(&mut self, value: u8) {
        self.bytes.fill(value);
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_image_is_erased() {
        let image = RomImage::new(0xC000, 0x4000);
        assert_eq!(image.base(), 0xC000);
        assert_eq!(image.capacity(), 0x4000);
        assert!(image.bytes().iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_load_translates_addresses() {
        let mut image = RomImage::new(0x8000, 0x8000);
        image.load(0x9000, &[1, 2, 3]).unwrap();
        assert_eq!(&image.bytes()[0x1000..0x1003], &[1, 2, 3]);
    }

    #[test]
    fn test_load_rejects_outside_bytes() {
        let mut image = RomImage::new(0x8000, 0x4000);

        // Below the base
        assert!(image.load(0x7FFF, &[1]).is_err());
        // Straddling the end
        assert!(matches!(
            image.load(0xBFFF, &[1, 2]),
            Err(ImageError::OutOfRange { addr: 0xBFFF, len: 2, .. })
        ));
        // Reset vector not covered by a 0x8000-0xBFFF image
        assert!(image.reset_vector(0x8000).is_err());
        assert!(image.bytes().iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_with_program_layout() {
        let code = [0xA9, 0xFF, 0x8D, 0x02, 0x60, 0x4C, 0x05, 0x80];
        let image = RomImage::with_program(0x8000, 0x8000, &code).unwrap();

        assert_eq!(&image.bytes()[..code.len()], &code);
        assert_eq!(image.bytes()[code.len()], NOP);
        assert_eq!(image.bytes()[0x7FFC], 0x00);
        assert_eq!(image.bytes()[0x7FFD], 0x80);
        assert_eq!(image.bytes()[0x7FFE], NOP);
    }

    #[test]
    fn test_full_address_space_image() {
        let mut image = RomImage::new(0x0000, 0x10000);
        image.reset_vector(0x1234).unwrap();
        image.load(0xFFFF, &[0x42]).unwrap();
        assert_eq!(image.bytes()[0xFFFC], 0x34);
        assert_eq!(image.bytes()[0xFFFD], 0x12);
        assert_eq!(image.bytes()[0xFFFF], 0x42);
    }
}

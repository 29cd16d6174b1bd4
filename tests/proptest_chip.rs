//! Property-based tests for the chip read/write contract and decoder routing.

use std::sync::Arc;

use proptest::prelude::*;
use sim65c02::devices::{Chip, RamChip, RomChip, SENTINEL_BYTE, SENTINEL_WORD};
use sim65c02::{AddressDecoder, CapturedDiagnostics};

const CAPACITY: usize = 0x1000;

fn ram() -> RamChip {
    RamChip::new(0, CAPACITY, Arc::new(CapturedDiagnostics::new()))
}

proptest! {
    #[test]
    fn prop_byte_round_trip(addr in 0u16..CAPACITY as u16, value in any::<u8>()) {
        let chip = ram();
        chip.write_byte(addr, value);
        prop_assert_eq!(chip.read_byte(addr), value);
    }

    #[test]
    fn prop_word_round_trip_little_endian(addr in 0u16..(CAPACITY as u16 - 1), value in any::<u16>()) {
        let chip = ram();
        chip.write_word(addr, value);
        prop_assert_eq!(chip.read_word(addr), value);
        prop_assert_eq!(chip.read_byte(addr), value as u8);
        prop_assert_eq!(chip.read_byte(addr + 1), (value >> 8) as u8);
    }

    #[test]
    fn prop_out_of_range_never_mutates(addr in CAPACITY as u16..=u16::MAX, value in any::<u8>()) {
        let chip = ram();
        let before = chip.storage().snapshot();

        chip.write_byte(addr, value);
        chip.write_word(addr, u16::from(value) << 8 | u16::from(value));

        prop_assert_eq!(chip.read_byte(addr), SENTINEL_BYTE);
        prop_assert_eq!(chip.read_word(addr), SENTINEL_WORD);
        prop_assert_eq!(chip.storage().snapshot(), before);
    }

    #[test]
    fn prop_write_touches_only_its_cell(addr in 0u16..CAPACITY as u16, value in 1u8..=0xFF) {
        let chip = ram();
        chip.write_byte(addr, value);

        let snapshot = chip.storage().snapshot();
        for (offset, &byte) in snapshot.iter().enumerate() {
            if offset == usize::from(addr) {
                prop_assert_eq!(byte, value);
            } else {
                prop_assert_eq!(byte, 0);
            }
        }
    }

    #[test]
    fn prop_decoder_routes_by_window(addr in any::<u16>()) {
        let sink = Arc::new(CapturedDiagnostics::new());
        let low = Arc::new(RamChip::new(0, 0x4000, sink.clone()));
        let high = Arc::new(RomChip::new(1, 0x8000, sink.clone()));
        for offset in [0u16, 0x1000, 0x3FFF] {
            low.write_byte(offset, (offset >> 8) as u8 ^ 0x5A);
        }

        let mut decoder = AddressDecoder::new(sink.clone());
        decoder.add_mapping(0x0000, 0x3FFF, low.clone());
        decoder.add_mapping(0x8000, 0xFFFF, high.clone());

        let value = decoder.read(addr);
        match addr {
            0x0000..=0x3FFF => prop_assert_eq!(value, low.read_byte(addr)),
            0x8000..=0xFFFF => prop_assert_eq!(value, high.read_byte(addr - 0x8000)),
            _ => {
                prop_assert_eq!(value, 0xFF);
                prop_assert_eq!(sink.entries().len(), 1);
            }
        }
    }
}

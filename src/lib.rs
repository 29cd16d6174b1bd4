//! # 65C02 Breadboard Computer Simulator
//!
//! A simulator of a small 8-bit computer built from discrete chips: a 65C02
//! CPU, an EEPROM, an SRAM, a clock generator and an address decoder, all
//! talking over a shared bus of named signal lines.
//!
//! Every part runs as its own component thread. The bus is the only shared
//! resource; components take exclusive ownership of it for each multi-step
//! transaction, and a failed acquisition is an ordinary "try again next
//! round" outcome rather than an error.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use sim65c02::{AddressDecoder, Bus, Chip, Cpu, CpuState};
//! use sim65c02::devices::RamChip;
//! use sim65c02::diagnostics::tracing_sink;
//!
//! let sink = tracing_sink();
//!
//! // 64 KiB of RAM with a program at 0x8000: LDA #$42, BRK
//! let ram = Arc::new(RamChip::new(0, 0x10000, Arc::clone(&sink)));
//! ram.load_bytes(0x8000, &[0xA9, 0x42, 0x00]);
//! ram.write_word(0xFFFC, 0x8000);
//!
//! let mut decoder = AddressDecoder::new(Arc::clone(&sink));
//! decoder.add_mapping(0x0000, 0xFFFF, ram.clone());
//!
//! let mut cpu = Cpu::new(Arc::new(Bus::new()), Arc::new(decoder), sink);
//! cpu.power_on();
//! cpu.run_until_halt(10).unwrap();
//!
//! assert_eq!(cpu.a(), 0x42);
//! assert_eq!(cpu.state(), CpuState::Halted);
//! ```
//!
//! For the fully threaded machine see [`Computer`].
//!
//! ## Modules
//!
//! - `pins` - fixed-width signal words
//! - `bus` - shared bus and ownership arbitration
//! - `devices` - chip protocol, ROM and RAM chips
//! - `decoder` - address range routing
//! - `clock` - clock generator
//! - `cpu` - CPU state machine and instruction loop
//! - `opcodes` / `addressing` - opcode metadata table
//! - `image` - ROM program images
//! - `config` - TOML system configuration
//! - `system` - whole-computer assembly
//! - `diagnostics` - injected logging sink
//! - `component` - component thread lifecycle

use thiserror::Error;

pub mod addressing;
pub mod bus;
pub mod clock;
pub mod component;
pub mod config;
pub mod cpu;
pub mod decoder;
pub mod devices;
pub mod diagnostics;
pub mod image;
pub mod opcodes;
pub mod pins;
pub mod system;

// Internal instruction implementations (not part of public API)
mod instructions;

// Re-export public API
pub use addressing::AddressingMode;
pub use bus::{Bus, BusError, BusGuard, BusOwner};
pub use clock::{ClockGenerator, ClockMode};
pub use config::{ConfigError, SystemConfig, Timing};
pub use cpu::{Cpu, CpuState, Step};
pub use decoder::AddressDecoder;
pub use devices::Chip;
pub use diagnostics::{CapturedDiagnostics, Diagnostics, Severity};
pub use image::{ImageError, RomImage};
pub use opcodes::{OpcodeMetadata, OPCODE_TABLE};
pub use pins::Pins;
pub use system::{Computer, SystemError};

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// The fetched opcode is not in the instruction table. The CPU halts.
    #[error("Opcode 0x{opcode:02X} at 0x{pc:04X} is not implemented")]
    UnimplementedOpcode { opcode: u8, pc: u16 },

    /// PC points at an address no chip is mapped at. The CPU halts.
    #[error("Instruction fetch from unmapped address 0x{pc:04X}")]
    UnmappedFetch { pc: u16 },
}

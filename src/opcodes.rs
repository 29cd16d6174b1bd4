//! # Opcode Metadata Table
//!
//! The 256-entry opcode table is the single source of truth for decoding.
//! Entries for instructions the simulator executes carry their mnemonic,
//! addressing mode, base cycle cost and size; every other opcode is marked
//! `"???"` with `implemented: false`, and fetching one halts the CPU.
//!
//! Implemented 65C02 subset:
//!
//! | Group        | Instructions                               |
//! |--------------|--------------------------------------------|
//! | Load/store   | LDA, LDX, LDY, STA, STX, STY               |
//! | Inc/dec      | INX, INY, DEX, DEY                         |
//! | Transfer     | TAX, TAY, TXA, TYA, TSX, TXS               |
//! | Stack        | PHA, PHP, PLA, PLP                         |
//! | Control      | JMP, JSR, RTS, NOP, BRK, STP               |
//! | Flags        | CLC, SEC, CLI, SEI, CLD, SED, CLV          |

use crate::addressing::AddressingMode;

/// Metadata for a single opcode.
///
/// # Examples
///
/// ```
/// use sim65c02::{AddressingMode, OPCODE_TABLE};
///
/// let lda_imm = &OPCODE_TABLE[0xA9];
/// assert_eq!(lda_imm.mnemonic, "LDA");
/// assert_eq!(lda_imm.addressing_mode, AddressingMode::Immediate);
/// assert_eq!(lda_imm.base_cycles, 2);
/// assert_eq!(lda_imm.size_bytes, 2);
/// assert!(lda_imm.implemented);
///
/// assert!(!OPCODE_TABLE[0x02].implemented);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeMetadata {
    /// Instruction mnemonic (e.g., "LDA", "???" for opcodes not executed).
    pub mnemonic: &'static str,

    /// Addressing mode for this instruction.
    pub addressing_mode: AddressingMode,

    /// Base cycle cost (before page crossing penalties).
    pub base_cycles: u8,

    /// Total instruction size in bytes (opcode + operands).
    pub size_bytes: u8,

    /// Whether the CPU executes this opcode.
    pub implemented: bool,
}

const UNIMPLEMENTED: OpcodeMetadata = OpcodeMetadata {
    mnemonic: "???",
    addressing_mode: AddressingMode::Implicit,
    base_cycles: 0,
    size_bytes: 1,
    implemented: false,
};

const fn op(
    mnemonic: &'static str,
    addressing_mode: AddressingMode,
    base_cycles: u8,
) -> OpcodeMetadata {
    OpcodeMetadata {
        mnemonic,
        addressing_mode,
        base_cycles,
        size_bytes: 1 + addressing_mode.operand_bytes(),
        implemented: true,
    }
}

/// Complete 256-entry opcode metadata table indexed by opcode byte value.
pub const OPCODE_TABLE: [OpcodeMetadata; 256] = build_table();

const fn build_table() -> [OpcodeMetadata; 256] {
    use AddressingMode::*;

    let mut t = [UNIMPLEMENTED; 256];

    // ========== Load ==========
    t[0xA9] = op("LDA", Immediate, 2);
    t[0xA5] = op("LDA", ZeroPage, 3);
    t[0xB5] = op("LDA", ZeroPageX, 4);
    t[0xAD] = op("LDA", Absolute, 4);
    t[0xBD] = op("LDA", AbsoluteX, 4);
    t[0xB9] = op("LDA", AbsoluteY, 4);
    t[0xA1] = op("LDA", IndirectX, 6);
    t[0xB1] = op("LDA", IndirectY, 5);

    t[0xA2] = op("LDX", Immediate, 2);
    t[0xA6] = op("LDX", ZeroPage, 3);
    t[0xB6] = op("LDX", ZeroPageY, 4);
    t[0xAE] = op("LDX", Absolute, 4);
    t[0xBE] = op("LDX", AbsoluteY, 4);

    t[0xA0] = op("LDY", Immediate, 2);
    t[0xA4] = op("LDY", ZeroPage, 3);
    t[0xB4] = op("LDY", ZeroPageX, 4);
    t[0xAC] = op("LDY", Absolute, 4);
    t[0xBC] = op("LDY", AbsoluteX, 4);

    // ========== Store ==========
    t[0x85] = op("STA", ZeroPage, 3);
    t[0x95] = op("STA", ZeroPageX, 4);
    t[0x8D] = op("STA", Absolute, 4);
    t[0x9D] = op("STA", AbsoluteX, 5);
    t[0x99] = op("STA", AbsoluteY, 5);
    t[0x81] = op("STA", IndirectX, 6);
    t[0x91] = op("STA", IndirectY, 6);

    t[0x86] = op("STX", ZeroPage, 3);
    t[0x96] = op("STX", ZeroPageY, 4);
    t[0x8E] = op("STX", Absolute, 4);

    t[0x84] = op("STY", ZeroPage, 3);
    t[0x94] = op("STY", ZeroPageX, 4);
    t[0x8C] = op("STY", Absolute, 4);

    // ========== Increment / Decrement ==========
    t[0xE8] = op("INX", Implicit, 2);
    t[0xC8] = op("INY", Implicit, 2);
    t[0xCA] = op("DEX", Implicit, 2);
    t[0x88] = op("DEY", Implicit, 2);

    // ========== Transfer ==========
    t[0xAA] = op("TAX", Implicit, 2);
    t[0xA8] = op("TAY", Implicit, 2);
    t[0x8A] = op("TXA", Implicit, 2);
    t[0x98] = op("TYA", Implicit, 2);
    t[0xBA] = op("TSX", Implicit, 2);
    t[0x9A] = op("TXS", Implicit, 2);

    // ========== Stack ==========
    t[0x48] = op("PHA", Implicit, 3);
    t[0x08] = op("PHP", Implicit, 3);
    t[0x68] = op("PLA", Implicit, 4);
    t[0x28] = op("PLP", Implicit, 4);

    // ========== Control ==========
    t[0x4C] = op("JMP", Absolute, 3);
    t[0x6C] = op("JMP", Indirect, 6);
    t[0x20] = op("JSR", Absolute, 6);
    t[0x60] = op("RTS", Implicit, 6);
    t[0xEA] = op("NOP", Implicit, 2);
    t[0x00] = op("BRK", Implicit, 7);
    t[0xDB] = op("STP", Implicit, 3);

    // ========== Flags ==========
    t[0x18] = op("CLC", Implicit, 2);
    t[0x38] = op("SEC", Implicit, 2);
    t[0x58] = op("CLI", Implicit, 2);
    t[0x78] = op("SEI", Implicit, 2);
    t[0xD8] = op("CLD", Implicit, 2);
    t[0xF8] = op("SED", Implicit, 2);
    t[0xB8] = op("CLV", Implicit, 2);

    t
}

//! # Addressing Modes
//!
//! The addressing modes used by the implemented 65C02 instructions. Each mode
//! determines how many operand bytes follow the opcode and how the CPU forms
//! the effective address from them.

/// 65C02 addressing mode enumeration.
///
/// # Operand Sizes
///
/// - **0 bytes**: Implicit
/// - **1 byte**: Immediate, ZeroPage, ZeroPageX, ZeroPageY, IndirectX, IndirectY
/// - **2 bytes**: Absolute, AbsoluteX, AbsoluteY, Indirect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    /// No operand, operation implied by instruction.
    ///
    /// Examples: CLC, RTS, NOP
    Implicit,

    /// 8-bit constant operand in instruction.
    ///
    /// Example: LDA #$10
    Immediate,

    /// 8-bit address in zero page (0x00-0xFF).
    ///
    /// Example: LDA $80
    ZeroPage,

    /// Zero page address indexed by X, wrapping within zero page.
    ///
    /// Example: LDA $80,X
    ZeroPageX,

    /// Zero page address indexed by Y, wrapping within zero page.
    ///
    /// Example: LDX $80,Y
    ZeroPageY,

    /// Full 16-bit address.
    ///
    /// Example: STA $0200
    Absolute,

    /// 16-bit address indexed by X. Crossing a page costs a cycle on loads.
    AbsoluteX,

    /// 16-bit address indexed by Y. Crossing a page costs a cycle on loads.
    AbsoluteY,

    /// Indirect jump through a 16-bit pointer.
    ///
    /// The 65C02 reads the pointer's high byte from `ptr + 1` even when the
    /// pointer sits at the end of a page.
    Indirect,

    /// Indexed indirect: (ZP + X) then dereference.
    ///
    /// Example: LDA ($40,X)
    IndirectX,

    /// Indirect indexed: ZP dereference then + Y.
    ///
    /// Example: LDA ($40),Y
    IndirectY,
}

impl AddressingMode {
    /// Number of operand bytes following the opcode.
    pub const fn operand_bytes(self) -> u8 {
        match self {
            AddressingMode::Implicit => 0,
            AddressingMode::Immediate
            | AddressingMode::ZeroPage
            | AddressingMode::ZeroPageX
            | AddressingMode::ZeroPageY
            | AddressingMode::IndirectX
            | AddressingMode::IndirectY => 1,
            AddressingMode::Absolute
            | AddressingMode::AbsoluteX
            | AddressingMode::AbsoluteY
            | AddressingMode::Indirect => 2,
        }
    }
}

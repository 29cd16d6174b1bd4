//! # 65C02 Instruction Implementations
//!
//! The implementations of the supported instructions, organized by category.
//! Each instruction is a standalone function taking the CPU, the bus
//! transaction the instruction runs in, and the opcode byte.
//!
//! ## Categories
//!
//! - **load_store**: Load and store instructions (LDA, LDX, LDY, STA, STX, STY)
//! - **inc_dec**: Register increment and decrement (INX, INY, DEX, DEY)
//! - **transfer**: Register transfer operations (TAX, TAY, TXA, TYA, TSX, TXS)
//! - **stack**: Stack operations (PHA, PHP, PLA, PLP)
//! - **control**: Control flow (JMP, JSR, RTS, NOP, BRK, STP)
//! - **flags**: Status flag manipulation (CLC, SEC, CLI, SEI, CLD, SED, CLV)

use crate::bus::BusGuard;
use crate::cpu::{Cpu, CpuState};
use crate::{ExecutionError, OPCODE_TABLE};

pub mod control;
pub mod flags;
pub mod inc_dec;
pub mod load_store;
pub mod stack;
pub mod transfer;

/// Dispatches `opcode` to its implementation by mnemonic.
pub(crate) fn execute(
    cpu: &mut Cpu,
    bus: &BusGuard<'_>,
    opcode: u8,
) -> Result<(), ExecutionError> {
    match OPCODE_TABLE[opcode as usize].mnemonic {
        "LDA" => load_store::execute_lda(cpu, bus, opcode),
        "LDX" => load_store::execute_ldx(cpu, bus, opcode),
        "LDY" => load_store::execute_ldy(cpu, bus, opcode),
        "STA" => load_store::execute_sta(cpu, bus, opcode),
        "STX" => load_store::execute_stx(cpu, bus, opcode),
        "STY" => load_store::execute_sty(cpu, bus, opcode),

        "INX" => inc_dec::execute_inx(cpu, opcode),
        "INY" => inc_dec::execute_iny(cpu, opcode),
        "DEX" => inc_dec::execute_dex(cpu, opcode),
        "DEY" => inc_dec::execute_dey(cpu, opcode),

        "TAX" => transfer::execute_tax(cpu, opcode),
        "TAY" => transfer::execute_tay(cpu, opcode),
        "TXA" => transfer::execute_txa(cpu, opcode),
        "TYA" => transfer::execute_tya(cpu, opcode),
        "TSX" => transfer::execute_tsx(cpu, opcode),
        "TXS" => transfer::execute_txs(cpu, opcode),

        "PHA" => stack::execute_pha(cpu, bus, opcode),
        "PHP" => stack::execute_php(cpu, bus, opcode),
        "PLA" => stack::execute_pla(cpu, bus, opcode),
        "PLP" => stack::execute_plp(cpu, bus, opcode),

        "JMP" => control::execute_jmp(cpu, bus, opcode),
        "JSR" => control::execute_jsr(cpu, bus, opcode),
        "RTS" => control::execute_rts(cpu, bus, opcode),
        "NOP" => control::execute_nop(cpu, opcode),
        "BRK" => control::execute_brk(cpu, opcode),
        "STP" => control::execute_stp(cpu, opcode),

        "CLC" => flags::execute_clc(cpu, opcode),
        "SEC" => flags::execute_sec(cpu, opcode),
        "CLI" => flags::execute_cli(cpu, opcode),
        "SEI" => flags::execute_sei(cpu, opcode),
        "CLD" => flags::execute_cld(cpu, opcode),
        "SED" => flags::execute_sed(cpu, opcode),
        "CLV" => flags::execute_clv(cpu, opcode),

        _ => {
            cpu.state = CpuState::Halted;
            Err(ExecutionError::UnimplementedOpcode { opcode, pc: cpu.pc })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::bus::{Bus, BusOwner};
    use crate::decoder::AddressDecoder;
    use crate::devices::{Chip, RamChip};
    use crate::diagnostics::tracing_sink;

    fn setup_cpu(program: &[u8]) -> Cpu {
        let sink = tracing_sink();
        let ram = Arc::new(RamChip::new(0, 0x10000, Arc::clone(&sink)));
        ram.write_word(0xFFFC, 0x8000);
        ram.load_bytes(0x8000, program);
        let mut decoder = AddressDecoder::new(Arc::clone(&sink));
        decoder.add_mapping(0x0000, 0xFFFF, ram);
        let mut cpu = Cpu::new(Arc::new(Bus::new()), Arc::new(decoder), sink);
        cpu.power_on();
        cpu
    }

    #[test]
    fn test_every_implemented_opcode_dispatches() {
        for (opcode, metadata) in OPCODE_TABLE.iter().enumerate() {
            if !metadata.implemented {
                continue;
            }
            let opcode = opcode as u8;
            let mut cpu = setup_cpu(&[opcode, 0x00, 0x02]);
            let bus = Arc::clone(cpu.bus());
            let guard = bus.acquire(BusOwner::Cpu, Duration::from_millis(10)).unwrap();

            assert_eq!(
                execute(&mut cpu, &guard, opcode),
                Ok(()),
                "{} (0x{opcode:02X})",
                metadata.mnemonic
            );
        }
    }

    #[test]
    fn test_unknown_mnemonic_halts() {
        let mut cpu = setup_cpu(&[0x02]);
        let bus = Arc::clone(cpu.bus());
        let guard = bus.acquire(BusOwner::Cpu, Duration::from_millis(10)).unwrap();

        assert_eq!(
            execute(&mut cpu, &guard, 0x02),
            Err(ExecutionError::UnimplementedOpcode {
                opcode: 0x02,
                pc: 0x8000
            })
        );
        assert_eq!(cpu.state(), CpuState::Halted);
    }
}
